//! GL-like drawing device.
//!
//! The engine draws through the [`GlContext`] trait: an immediate-mode surface
//! with GL semantics (bottom-left device coordinates, viewport and scissor
//! rectangles, constant-colour blending, offscreen framebuffers, byte buffers
//! and pixel reads). Layers upload attributes into buffers and issue
//! [`DrawCall`]s against cached programs.
//!
//! [`SoftwareContext`] is a complete CPU implementation. It backs headless
//! rendering, the test suite and the demo host, which uploads its default
//! framebuffer to a window surface each frame.

mod context;
mod error;
mod params;
mod raster;
mod resources;
mod software;

pub use context::{with_parameters, ClearMask, GlContext};
pub use error::DeviceError;
pub use params::{BlendEquation, BlendFactor, BlendFunc, FramebufferBinding, GlParameters, GlState};
pub use resources::{
    BufferId, DrawCall, FramebufferId, PickingUniforms, ProgramDesc, ProgramId, Topology, Uniforms,
};
pub use software::{DeviceCounters, SoftwareContext};
