//! Render context and the draw pipeline.
//!
//! [`RenderContext`] is the state shared by every layer and by both passes:
//! the device, the active viewport, the program cache, the picking
//! framebuffer and the last-picked record. The draw functions are stateless
//! over it.

mod ctx;
mod draw;
mod stats;

pub use ctx::{LastPicked, ProgramCache, RenderContext};
pub use draw::{
    draw_layers, draw_picking_buffer, gl_viewport, DrawLayersParams, LayerFilter, LayerFilterArgs,
};
pub use stats::{PassStats, RenderStats};

pub(crate) use draw::clear_canvas;
