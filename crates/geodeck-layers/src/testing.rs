//! Headless harness for the layer tests.

use std::rc::Rc;

use geodeck_engine::device::{GlParameters, SoftwareContext};
use geodeck_engine::layer::{LayerList, LayerRef, PickInfo};
use geodeck_engine::manager::{DrawPass, LayerManager, PickRequest};
use geodeck_engine::pick::PickMode;
use geodeck_engine::viewport::{Viewport, ViewportOptions};

pub(crate) const SIZE: f64 = 64.0;

pub(crate) struct Harness {
    pub manager: LayerManager<SoftwareContext>,
    pub viewport: Rc<Viewport>,
}

impl Harness {
    /// 64x64 canvas centered on `[lng, lat]`.
    pub fn new(center: [f64; 2], zoom: f64) -> Self {
        let viewport = Viewport::new(ViewportOptions {
            id: "main".into(),
            width: SIZE,
            height: SIZE,
            longitude: center[0],
            latitude: center[1],
            zoom,
            ..ViewportOptions::default()
        })
        .unwrap();
        Self {
            manager: LayerManager::new(SoftwareContext::new(SIZE, SIZE, 1.0)),
            viewport: Rc::new(viewport),
        }
    }

    pub fn set(&mut self, layers: Vec<LayerRef>) {
        self.manager.set_layers(layers.into_iter().collect::<LayerList>()).unwrap();
    }

    pub fn draw(&mut self) {
        let viewports = [Rc::clone(&self.viewport)];
        self.manager
            .draw_layers(DrawPass {
                pass: "test",
                viewports: &viewports,
                views: &[],
                redraw_reason: "test",
                custom_render: false,
                parameters: GlParameters::default(),
            })
            .unwrap();
    }

    /// Pixel at CSS coordinates, top-left origin.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.manager.gl().pixel(x, SIZE as u32 - 1 - y).unwrap()
    }

    pub fn pick(&mut self, x: f64, y: f64) -> Option<PickInfo> {
        let viewports = [Rc::clone(&self.viewport)];
        self.manager
            .pick_object(PickRequest {
                x,
                y,
                radius: 0.0,
                layer_ids: None,
                viewports: &viewports,
                views: &[],
                mode: PickMode::Query,
                depth: 1,
            })
            .unwrap()
            .into_iter()
            .next()
    }
}
