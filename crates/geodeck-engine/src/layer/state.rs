use std::any::Any;
use std::fmt;

use crate::device::{BufferId, GlContext};

/// Internal state of one layer, carried across frames by the manager.
///
/// The buffers listed here are owned exclusively by the layer and released on
/// finalization. Kind-specific data lives in `kind`.
pub struct LayerState {
    buffers: Vec<BufferId>,
    /// Number of pickable objects (data length after filtering).
    pub object_count: usize,
    kind: Box<dyn Any>,
}

impl LayerState {
    pub fn new<T: Any>(kind: T) -> Self {
        Self {
            buffers: Vec::new(),
            object_count: 0,
            kind: Box::new(kind),
        }
    }

    pub fn empty() -> Self {
        Self::new(())
    }

    /// Registers a buffer so it is released with the layer.
    pub fn track_buffer(&mut self, id: BufferId) -> BufferId {
        self.buffers.push(id);
        id
    }

    pub fn create_buffer(&mut self, gl: &mut dyn GlContext, data: &[u8]) -> BufferId {
        let id = gl.create_buffer(data);
        self.track_buffer(id)
    }

    pub fn buffers(&self) -> &[BufferId] {
        &self.buffers
    }

    /// Replaces the kind-specific data, keeping tracked buffers.
    pub fn set_kind<T: Any>(&mut self, kind: T) {
        self.kind = Box::new(kind);
    }

    pub fn kind<T: Any>(&self) -> Option<&T> {
        self.kind.downcast_ref()
    }

    pub fn kind_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.kind.downcast_mut()
    }

    /// Deletes every tracked buffer.
    pub fn release(&mut self, gl: &mut dyn GlContext) {
        for id in self.buffers.drain(..) {
            gl.delete_buffer(id);
        }
    }
}

impl fmt::Debug for LayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerState")
            .field("buffers", &self.buffers)
            .field("object_count", &self.object_count)
            .finish_non_exhaustive()
    }
}
