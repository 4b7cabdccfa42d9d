//! Screen and device coordinate types shared by the pipeline and the host.
//!
//! Two spaces are used:
//! - screen space: CSS pixels, origin top-left, +Y down (pointer events, viewports)
//! - device space: drawing-buffer pixels, origin bottom-left, +Y up (GL viewport,
//!   scissor, pixel reads)

mod device_rect;
mod rect;

pub use device_rect::DeviceRect;
pub use rect::{Point, Rect};
