//! Views and the view manager.
//!
//! A [`View`] describes where in the canvas a camera renders and which input
//! gestures the host's controller should enable. The [`ViewManager`] turns the
//! view list, canvas size and view state into the frame's viewports.

mod manager;
mod state;
mod view;

pub use manager::ViewManager;
pub use state::{ViewState, ViewStates};
pub use view::{ClearOptions, ControllerOptions, Dimension, View};
