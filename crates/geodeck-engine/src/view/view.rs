use crate::coords::Rect;
use crate::viewport::{Viewport, ViewportError, ViewportOptions};

use super::state::ViewState;

/// Absolute pixels or a percentage of the canvas.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Dimension {
    Pixels(f64),
    Percent(f64),
}

impl Dimension {
    #[inline]
    pub fn resolve(self, extent: f64) -> f64 {
        match self {
            Dimension::Pixels(px) => px,
            Dimension::Percent(pct) => extent * pct / 100.0,
        }
    }
}

/// Gesture bindings the host's input handler should enable for a view.
///
/// The engine stores and forwards these; it does not interpret input.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    pub scroll_zoom: bool,
    pub drag_pan: bool,
    pub drag_rotate: bool,
    pub double_click_zoom: bool,
    pub touch_zoom: bool,
    pub touch_rotate: bool,
    pub keyboard: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            scroll_zoom: true,
            drag_pan: true,
            drag_rotate: true,
            double_click_zoom: true,
            touch_zoom: true,
            touch_rotate: false,
            keyboard: true,
        }
    }
}

/// Buffers a view clears before its layers draw.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClearOptions {
    pub color: Option<[f32; 4]>,
    pub depth: bool,
}

/// A named region of the canvas rendered by one map camera.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub id: String,
    pub x: Dimension,
    pub y: Dimension,
    pub width: Dimension,
    pub height: Dimension,
    pub controller: Option<ControllerOptions>,
    pub clear: Option<ClearOptions>,
    pub orthographic: bool,
    pub far_z_multiplier: f64,
}

impl View {
    /// A full-canvas web-mercator view.
    pub fn map_view(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            x: Dimension::Pixels(0.0),
            y: Dimension::Pixels(0.0),
            width: Dimension::Percent(100.0),
            height: Dimension::Percent(100.0),
            controller: None,
            clear: None,
            orthographic: false,
            far_z_multiplier: 10.0,
        }
    }

    pub fn with_controller(mut self, controller: ControllerOptions) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn with_bounds(mut self, x: Dimension, y: Dimension, width: Dimension, height: Dimension) -> Self {
        self.x = x;
        self.y = y;
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_clear(mut self, clear: ClearOptions) -> Self {
        self.clear = Some(clear);
        self
    }

    /// Canvas-space rectangle this view occupies.
    pub fn dimensions(&self, canvas_width: f64, canvas_height: f64) -> Rect {
        Rect::new(
            self.x.resolve(canvas_width),
            self.y.resolve(canvas_height),
            self.width.resolve(canvas_width),
            self.height.resolve(canvas_height),
        )
    }

    /// Builds this view's viewport for a canvas size and camera.
    pub fn make_viewport(
        &self,
        canvas_width: f64,
        canvas_height: f64,
        state: &ViewState,
    ) -> Result<Viewport, ViewportError> {
        let rect = self.dimensions(canvas_width, canvas_height);
        Viewport::new(ViewportOptions {
            id: self.id.clone(),
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            longitude: state.longitude,
            latitude: state.latitude,
            zoom: state.zoom,
            pitch: state.pitch,
            bearing: state.bearing,
            altitude: state.altitude,
            far_z_multiplier: self.far_z_multiplier,
            orthographic: self.orthographic,
            ..ViewportOptions::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_view_fills_canvas() {
        let view = View::map_view("default-view");
        assert_eq!(view.dimensions(800.0, 600.0), Rect::new(0.0, 0.0, 800.0, 600.0));
    }

    #[test]
    fn percent_bounds_resolve_against_canvas() {
        let view = View::map_view("right").with_bounds(
            Dimension::Percent(50.0),
            Dimension::Pixels(0.0),
            Dimension::Percent(50.0),
            Dimension::Percent(100.0),
        );
        let vp = view.make_viewport(800.0, 600.0, &ViewState::default()).unwrap();
        assert_eq!(vp.id(), "right");
        assert_eq!(vp.x(), 400.0);
        assert_eq!(vp.width(), 400.0);
        assert_eq!(vp.height(), 600.0);
    }

    #[test]
    fn bad_camera_fails_viewport_creation() {
        let state = ViewState {
            zoom: f64::NAN,
            ..ViewState::default()
        };
        assert!(View::map_view("v").make_viewport(10.0, 10.0, &state).is_err());
    }
}
