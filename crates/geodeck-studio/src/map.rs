//! A minimal interactive map camera standing in for a real basemap library.

use geodeck_engine::glam::DVec2;
use geodeck_engine::host::{HostEventKind, HostListener, HostListeners, HostMap, ListenerKey};
use geodeck_engine::view::ViewState;
use geodeck_engine::viewport::{Viewport, ViewportOptions};

/// Pointer travel, in CSS pixels, before a press becomes a drag.
const DRAG_THRESHOLD: f64 = 3.0;
const MIN_ZOOM: f64 = 0.0;
const MAX_ZOOM: f64 = 20.0;
const MAX_PITCH: f64 = 60.0;
/// Degrees per pixel of right-button drag.
const ROTATE_SPEED: f64 = 0.4;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DragButton {
    Pan,
    Rotate,
}

#[derive(Debug, Copy, Clone)]
struct Drag {
    button: DragButton,
    origin: DVec2,
    last: DVec2,
    /// `[lng, lat]` under the pointer at press time.
    anchor: DVec2,
    moving: bool,
}

/// Camera plus input handling of a slippy map.
///
/// Emits the same event kinds a browser basemap would: `MoveStart` once a
/// drag starts, `CenterChange` for every camera step, then `MoveEnd`,
/// `ZoomEnd` or `RotateEnd`.
pub struct SlippyMap {
    view_state: ViewState,
    size: (f64, f64),
    pixel_ratio: f64,
    listeners: HostListeners,
    drag: Option<Drag>,
}

impl SlippyMap {
    pub fn new(view_state: ViewState, size: (f64, f64), pixel_ratio: f64) -> Self {
        Self {
            view_state,
            size,
            pixel_ratio,
            listeners: HostListeners::new(),
            drag: None,
        }
    }

    /// A button is down, dragging or not.
    pub fn is_pressed(&self) -> bool {
        self.drag.is_some()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some_and(|drag| drag.moving)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn resize(&mut self, size: (f64, f64), pixel_ratio: f64) {
        if (size, pixel_ratio) == (self.size, self.pixel_ratio) {
            return;
        }
        self.size = size;
        self.pixel_ratio = pixel_ratio;
        self.listeners.emit(HostEventKind::SizeChange);
    }

    pub fn press(&mut self, button: DragButton, pixel: DVec2) {
        let anchor = self.viewport().map_or(DVec2::ZERO, |vp| vp.unproject(pixel));
        self.drag = Some(Drag {
            button,
            origin: pixel,
            last: pixel,
            anchor,
            moving: false,
        });
    }

    /// Returns `true` while the pointer drives the camera.
    pub fn drag_to(&mut self, pixel: DVec2) -> bool {
        let Some(mut drag) = self.drag else {
            return false;
        };
        if !drag.moving {
            if drag.origin.distance(pixel) < DRAG_THRESHOLD {
                return false;
            }
            drag.moving = true;
            self.listeners.emit(HostEventKind::MoveStart);
        }

        match drag.button {
            DragButton::Pan => {
                if let Some(viewport) = self.viewport() {
                    let center = viewport.map_center_by_lng_lat_position(drag.anchor, pixel);
                    self.view_state.longitude = center.x;
                    self.view_state.latitude = center.y;
                }
            }
            DragButton::Rotate => {
                let delta = pixel - drag.last;
                self.view_state.bearing = (self.view_state.bearing + delta.x * ROTATE_SPEED).rem_euclid(360.0);
                self.view_state.pitch = (self.view_state.pitch - delta.y * ROTATE_SPEED).clamp(0.0, MAX_PITCH);
            }
        }
        drag.last = pixel;
        self.drag = Some(drag);
        self.listeners.emit(HostEventKind::CenterChange);
        true
    }

    /// Ends a press. Returns `true` when it was a click rather than a drag.
    pub fn release(&mut self) -> bool {
        let Some(drag) = self.drag.take() else {
            return false;
        };
        if !drag.moving {
            return drag.button == DragButton::Pan;
        }
        self.listeners.emit(match drag.button {
            DragButton::Pan => HostEventKind::MoveEnd,
            DragButton::Rotate => HostEventKind::RotateEnd,
        });
        false
    }

    /// Zooms by `delta` levels keeping the point under `pixel` in place.
    pub fn zoom_at(&mut self, pixel: DVec2, delta: f64) {
        let zoom = (self.view_state.zoom + delta).clamp(MIN_ZOOM, MAX_ZOOM);
        if zoom == self.view_state.zoom {
            return;
        }
        let anchor = self.viewport().map(|vp| vp.unproject(pixel));
        self.view_state.zoom = zoom;
        if let (Some(anchor), Some(viewport)) = (anchor, self.viewport()) {
            let center = viewport.map_center_by_lng_lat_position(anchor, pixel);
            self.view_state.longitude = center.x;
            self.view_state.latitude = center.y;
        }
        self.listeners.emit(HostEventKind::CenterChange);
        self.listeners.emit(HostEventKind::ZoomEnd);
    }

    fn viewport(&self) -> Option<Viewport> {
        let vs = &self.view_state;
        let result = Viewport::new(ViewportOptions {
            id: "slippy-map".into(),
            width: self.size.0,
            height: self.size.1,
            longitude: vs.longitude,
            latitude: vs.latitude,
            zoom: vs.zoom,
            pitch: vs.pitch,
            bearing: vs.bearing,
            altitude: vs.altitude,
            ..ViewportOptions::default()
        });
        match result {
            Ok(viewport) => Some(viewport),
            Err(err) => {
                log::warn!("map camera has no valid viewport: {err}");
                None
            }
        }
    }
}

impl HostMap for SlippyMap {
    fn view_state(&self) -> ViewState {
        self.view_state
    }

    fn size(&self) -> (f64, f64) {
        self.size
    }

    fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    fn subscribe(&mut self, kind: HostEventKind, listener: HostListener) -> ListenerKey {
        self.listeners.subscribe(kind, listener)
    }

    fn unsubscribe(&mut self, key: ListenerKey) -> bool {
        self.listeners.unsubscribe(key)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn map() -> SlippyMap {
        SlippyMap::new(ViewState::new(-122.4, 37.8, 12.0), (800.0, 600.0), 1.0)
    }

    fn record(map: &mut SlippyMap) -> Rc<RefCell<Vec<HostEventKind>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        for kind in HostEventKind::ALL {
            let seen = Rc::clone(&seen);
            map.subscribe(kind, Rc::new(move |k| seen.borrow_mut().push(k)));
        }
        seen
    }

    #[test]
    fn drag_keeps_the_anchor_under_the_pointer() {
        let mut m = map();
        let anchor = m.viewport().unwrap().unproject(DVec2::new(400.0, 300.0));
        m.press(DragButton::Pan, DVec2::new(400.0, 300.0));
        assert!(m.drag_to(DVec2::new(450.0, 320.0)));
        let under = m.viewport().unwrap().unproject(DVec2::new(450.0, 320.0));
        assert!(under.distance(anchor) < 1e-9);
        assert!(m.view_state().longitude < -122.4);
    }

    #[test]
    fn drag_emits_move_events_in_order() {
        let mut m = map();
        let seen = record(&mut m);
        m.press(DragButton::Pan, DVec2::new(10.0, 10.0));
        m.drag_to(DVec2::new(30.0, 10.0));
        m.drag_to(DVec2::new(40.0, 10.0));
        assert!(!m.release());
        assert_eq!(
            *seen.borrow(),
            [
                HostEventKind::MoveStart,
                HostEventKind::CenterChange,
                HostEventKind::CenterChange,
                HostEventKind::MoveEnd
            ]
        );
    }

    #[test]
    fn small_motion_is_a_click() {
        let mut m = map();
        let seen = record(&mut m);
        let before = m.view_state();
        m.press(DragButton::Pan, DVec2::new(10.0, 10.0));
        assert!(!m.drag_to(DVec2::new(11.0, 11.0)));
        assert!(m.release());
        assert!(seen.borrow().is_empty());
        assert_eq!(m.view_state(), before);
    }

    #[test]
    fn right_drag_rotates_and_pitches() {
        let mut m = map();
        let seen = record(&mut m);
        m.press(DragButton::Rotate, DVec2::new(100.0, 100.0));
        m.drag_to(DVec2::new(150.0, 50.0));
        m.release();
        let vs = m.view_state();
        assert!((vs.bearing - 20.0).abs() < 1e-9);
        assert!((vs.pitch - 20.0).abs() < 1e-9);
        assert_eq!(seen.borrow().last(), Some(&HostEventKind::RotateEnd));
    }

    #[test]
    fn wheel_zoom_is_anchored_and_clamped() {
        let mut m = map();
        let pixel = DVec2::new(100.0, 500.0);
        let anchor = m.viewport().unwrap().unproject(pixel);
        m.zoom_at(pixel, 1.0);
        assert_eq!(m.view_state().zoom, 13.0);
        assert!(m.viewport().unwrap().unproject(pixel).distance(anchor) < 1e-9);

        let seen = record(&mut m);
        m.zoom_at(pixel, 100.0);
        assert_eq!(m.view_state().zoom, MAX_ZOOM);
        m.zoom_at(pixel, 1.0);
        assert_eq!(*seen.borrow(), [HostEventKind::CenterChange, HostEventKind::ZoomEnd]);
    }

    #[test]
    fn resize_notifies_only_on_change() {
        let mut m = map();
        let seen = record(&mut m);
        m.resize((800.0, 600.0), 1.0);
        m.resize((640.0, 480.0), 2.0);
        assert_eq!(*seen.borrow(), [HostEventKind::SizeChange]);
        assert_eq!(m.size(), (640.0, 480.0));
    }
}
