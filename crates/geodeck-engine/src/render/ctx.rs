use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

use crate::device::{DeviceError, FramebufferId, GlContext, ProgramDesc, ProgramId};
use crate::layer::LayerContext;
use crate::time::FrameTime;
use crate::viewport::Viewport;

use super::stats::RenderStats;

/// Programs shared by all layers, keyed by name.
#[derive(Debug, Default)]
pub struct ProgramCache {
    programs: HashMap<&'static str, ProgramId>,
}

impl ProgramCache {
    pub fn get_or_create(&mut self, gl: &mut dyn GlContext, desc: &ProgramDesc) -> Result<ProgramId, DeviceError> {
        if let Some(id) = self.programs.get(desc.name) {
            return Ok(*id);
        }
        let id = gl.create_program(desc)?;
        log::trace!("program `{}` created", desc.name);
        self.programs.insert(desc.name, id);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn release(&mut self, gl: &mut dyn GlContext) {
        for (_, id) in self.programs.drain() {
            gl.delete_program(id);
        }
    }
}

/// Object under the pointer after the last hover pick.
#[derive(Debug, Clone, PartialEq)]
pub struct LastPicked {
    /// Id of the drawing (leaf) layer.
    pub layer_id: Option<String>,
    pub index: i64,
}

impl Default for LastPicked {
    fn default() -> Self {
        Self {
            layer_id: None,
            index: -1,
        }
    }
}

/// State shared by the manager, the layers and both passes.
pub struct RenderContext<G: GlContext> {
    pub gl: G,
    /// Viewport of the current draw or pick. Replaced only by the manager.
    pub viewport: Rc<Viewport>,
    pub programs: ProgramCache,
    /// Created on the first pick, resized to the drawing buffer before each.
    pub picking_framebuffer: Option<FramebufferId>,
    pub last_picked: LastPicked,
    pub animation: FrameTime,
    pub use_device_pixels: bool,
    pub user_data: Option<Rc<dyn Any>>,
    pub stats: RenderStats,
}

impl<G: GlContext> RenderContext<G> {
    pub fn new(gl: G) -> Self {
        Self {
            gl,
            viewport: Rc::new(Viewport::default_initial()),
            programs: ProgramCache::default(),
            picking_framebuffer: None,
            last_picked: LastPicked::default(),
            animation: FrameTime::ZERO,
            use_device_pixels: true,
            user_data: None,
            stats: RenderStats::default(),
        }
    }

    /// Device pixels per CSS pixel used for viewports and picking.
    pub fn pixel_ratio(&self) -> f64 {
        if self.use_device_pixels {
            self.gl.device_pixel_ratio()
        } else {
            1.0
        }
    }

    /// Borrowed view handed to layer hooks.
    pub fn layer_context(&mut self) -> LayerContext<'_> {
        LayerContext {
            gl: &mut self.gl,
            viewport: &self.viewport,
            programs: &mut self.programs,
            animation: self.animation,
            user_data: self.user_data.as_ref(),
        }
    }

    /// Creates the picking framebuffer or resizes it to the drawing buffer.
    /// No-op when the size already matches.
    pub fn prepare_picking_framebuffer(&mut self) -> Result<FramebufferId, DeviceError> {
        let (width, height) = self.gl.drawing_buffer_size();
        match self.picking_framebuffer {
            Some(fb) => {
                if self.gl.framebuffer_size(fb) != Some((width, height)) {
                    self.gl.resize_framebuffer(fb, width, height)?;
                }
                Ok(fb)
            }
            None => {
                let fb = self.gl.create_framebuffer(width, height)?;
                self.picking_framebuffer = Some(fb);
                Ok(fb)
            }
        }
    }

    /// Releases shared resources.
    pub fn release(&mut self) {
        if let Some(fb) = self.picking_framebuffer.take() {
            self.gl.delete_framebuffer(fb);
        }
        self.programs.release(&mut self.gl);
    }
}
