use std::rc::Rc;

use crate::coords::Rect;
use crate::viewport::{Viewport, ViewportError};

use super::state::{ViewState, ViewStates};
use super::view::View;

/// Owns the view list, canvas size and view state, and caches the viewports
/// derived from them.
///
/// Viewports are rebuilt only when one of the inputs changes; every rebuild
/// raises the manager's redraw flag.
#[derive(Debug)]
pub struct ViewManager {
    views: Vec<View>,
    view_states: ViewStates,
    width: f64,
    height: f64,
    viewports: Vec<Rc<Viewport>>,
    needs_redraw: Option<String>,
}

impl ViewManager {
    pub fn new() -> Self {
        Self {
            views: Vec::new(),
            view_states: ViewStates::default(),
            width: 100.0,
            height: 100.0,
            viewports: Vec::new(),
            needs_redraw: Some("Initial render".to_string()),
        }
    }

    // ── inputs ──────────────────────────────────────────────────────────

    pub fn set_views(&mut self, views: Vec<View>) -> Result<(), ViewportError> {
        if views == self.views {
            return Ok(());
        }
        self.views = views;
        self.rebuild("views changed")
    }

    pub fn set_view_states(&mut self, view_states: ViewStates) -> Result<(), ViewportError> {
        if view_states == self.view_states {
            return Ok(());
        }
        self.view_states = view_states;
        self.rebuild("view state changed")
    }

    pub fn set_size(&mut self, width: f64, height: f64) -> Result<(), ViewportError> {
        if width == self.width && height == self.height {
            return Ok(());
        }
        self.width = width;
        self.height = height;
        self.rebuild("size changed")
    }

    fn rebuild(&mut self, reason: &str) -> Result<(), ViewportError> {
        let viewports = self
            .views
            .iter()
            .map(|view| {
                view.make_viewport(self.width, self.height, self.view_states.get(&view.id))
                    .map(Rc::new)
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.viewports = viewports;
        self.set_needs_redraw(reason);
        Ok(())
    }

    // ── queries ─────────────────────────────────────────────────────────

    /// Viewports in view order. With a rect, only viewports containing its
    /// origin.
    pub fn get_viewports(&self, rect: Option<Rect>) -> Vec<Rc<Viewport>> {
        match rect {
            None => self.viewports.clone(),
            Some(rect) => self
                .viewports
                .iter()
                .filter(|vp| vp.contains_pixel(rect.origin()))
                .cloned()
                .collect(),
        }
    }

    pub fn get_viewport(&self, view_id: &str) -> Option<Rc<Viewport>> {
        self.viewports.iter().find(|vp| vp.id() == view_id).cloned()
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn get_view(&self, view_id: &str) -> Option<&View> {
        self.views.iter().find(|v| v.id == view_id)
    }

    pub fn get_view_state(&self, view_id: &str) -> &ViewState {
        self.view_states.get(view_id)
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    // ── redraw ──────────────────────────────────────────────────────────

    pub fn set_needs_redraw(&mut self, reason: &str) {
        if self.needs_redraw.is_none() {
            self.needs_redraw = Some(reason.to_string());
        }
    }

    /// Returns the pending redraw reason, clearing it when `clear` is set.
    pub fn needs_redraw(&mut self, clear: bool) -> Option<String> {
        if clear {
            self.needs_redraw.take()
        } else {
            self.needs_redraw.clone()
        }
    }
}

impl Default for ViewManager {
    fn default() -> Self {
        Self::new()
    }
}
