use crate::coords::Point;
use crate::view::ViewState;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PointerEventKind {
    Click,
    Move,
    Leave,
}

/// Pointer input forwarded by the host.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerEventKind,
    /// Offset in CSS pixels relative to the canvas.
    pub position: Option<Point>,
    /// Pressed buttons bitmask; moves with buttons down are drags.
    pub buttons: u8,
}

impl PointerEvent {
    pub fn click(x: f64, y: f64) -> Self {
        Self {
            kind: PointerEventKind::Click,
            position: Some(Point::new(x, y)),
            buttons: 0,
        }
    }

    pub fn hover(x: f64, y: f64) -> Self {
        Self {
            kind: PointerEventKind::Move,
            position: Some(Point::new(x, y)),
            buttons: 0,
        }
    }

    pub fn leave() -> Self {
        Self {
            kind: PointerEventKind::Leave,
            position: None,
            buttons: 0,
        }
    }
}

/// Interaction state reported by the host's controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct InteractiveState {
    pub is_dragging: bool,
    /// Set while the pointer is over a pickable object.
    pub is_hovering: bool,
}

/// A camera change proposed by the host's controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewStateChange {
    pub view_id: String,
    pub view_state: ViewState,
    pub interactive_state: InteractiveState,
}
