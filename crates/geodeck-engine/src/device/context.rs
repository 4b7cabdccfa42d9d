use crate::coords::DeviceRect;

use super::error::DeviceError;
use super::params::{FramebufferBinding, GlParameters, GlState};
use super::resources::{BufferId, DrawCall, FramebufferId, ProgramDesc, ProgramId};

/// Buffers affected by [`GlContext::clear`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ClearMask {
    pub color: bool,
    pub depth: bool,
}

impl ClearMask {
    pub const COLOR: ClearMask = ClearMask { color: true, depth: false };
    pub const ALL: ClearMask = ClearMask { color: true, depth: true };
}

/// Immediate-mode drawing surface.
///
/// All rectangles are device pixels with a bottom-left origin. `clear` and
/// `draw` honor the current viewport, scissor and framebuffer binding.
pub trait GlContext {
    /// Canvas size in CSS pixels.
    fn canvas_size(&self) -> (f64, f64);

    /// Default framebuffer size in device pixels.
    fn drawing_buffer_size(&self) -> (u32, u32);

    fn device_pixel_ratio(&self) -> f64;

    /// Follows a host canvas resize. The default framebuffer is reallocated
    /// when its device size changes.
    fn set_canvas_size(&mut self, width: f64, height: f64, pixel_ratio: f64);

    fn state(&self) -> GlState;

    fn set_parameters(&mut self, params: &GlParameters);

    fn clear(&mut self, mask: ClearMask) -> Result<(), DeviceError>;

    // ── framebuffers ────────────────────────────────────────────────────

    fn create_framebuffer(&mut self, width: u32, height: u32) -> Result<FramebufferId, DeviceError>;

    fn framebuffer_size(&self, id: FramebufferId) -> Option<(u32, u32)>;

    /// Resizes and clears an offscreen framebuffer.
    fn resize_framebuffer(&mut self, id: FramebufferId, width: u32, height: u32) -> Result<(), DeviceError>;

    fn delete_framebuffer(&mut self, id: FramebufferId);

    // ── buffers & programs ──────────────────────────────────────────────

    fn create_buffer(&mut self, data: &[u8]) -> BufferId;

    fn write_buffer(&mut self, id: BufferId, data: &[u8]) -> Result<(), DeviceError>;

    fn delete_buffer(&mut self, id: BufferId);

    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, DeviceError>;

    fn delete_program(&mut self, id: ProgramId);

    // ── drawing ─────────────────────────────────────────────────────────

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), DeviceError>;

    /// Reads RGBA pixels, rows bottom to top. The rect must lie inside the
    /// framebuffer.
    fn read_pixels(&mut self, framebuffer: FramebufferBinding, rect: DeviceRect) -> Result<Vec<[u8; 4]>, DeviceError>;
}

/// Applies `params`, runs `f`, then restores the previous state whatever `f`
/// returned.
pub fn with_parameters<G, R>(gl: &mut G, params: &GlParameters, f: impl FnOnce(&mut G) -> R) -> R
where
    G: GlContext + ?Sized,
{
    let saved = gl.state();
    gl.set_parameters(params);
    let result = f(gl);
    gl.set_parameters(&saved.to_parameters());
    result
}
