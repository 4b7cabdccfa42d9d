use crate::coords::DeviceRect;

use super::resources::{BufferId, FramebufferId, ProgramId};

/// Failures reported by a [`GlContext`](super::GlContext).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeviceError {
    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferId),

    #[error("unknown framebuffer {0:?}")]
    UnknownFramebuffer(FramebufferId),

    #[error("unknown program {0:?}")]
    UnknownProgram(ProgramId),

    #[error("buffer {buffer:?} holds {len} bytes, draw needs {needed}")]
    BufferTooSmall { buffer: BufferId, needed: usize, len: usize },

    #[error("rect {rect:?} is outside the {width}x{height} framebuffer")]
    OutOfBounds { rect: DeviceRect, width: u32, height: u32 },

    #[error("invalid framebuffer size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
}
