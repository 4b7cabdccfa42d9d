use crate::device::{BufferId, DeviceError, DrawCall, GlContext, ProgramId, Uniforms};

use super::picking::encode_picking_color;
use super::state::LayerState;

/// CPU-side vertex attributes, one entry per vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    /// Zoom-independent mercator `[x, y]` plus elevation in meters.
    pub positions: Vec<[f64; 3]>,
    pub colors: Vec<[u8; 4]>,
    pub picking_colors: Vec<[u8; 3]>,
    pub sizes: Vec<f32>,
}

impl Attributes {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            positions: Vec::with_capacity(n),
            colors: Vec::with_capacity(n),
            picking_colors: Vec::with_capacity(n),
            sizes: Vec::with_capacity(n),
        }
    }

    /// Appends one vertex belonging to object `object_index`.
    #[inline]
    pub fn push(&mut self, position: [f64; 3], color: [u8; 4], size: f32, object_index: usize) {
        self.positions.push(position);
        self.colors.push(color);
        self.picking_colors.push(encode_picking_color(object_index));
        self.sizes.push(size);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// GPU copies of [`Attributes`], allocated once per layer and rewritten on
/// update.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AttributeBuffers {
    pub positions: BufferId,
    pub colors: BufferId,
    pub picking_colors: BufferId,
    pub sizes: BufferId,
    pub vertex_count: usize,
}

impl AttributeBuffers {
    /// Creates empty buffers tracked by `state`.
    pub fn allocate(gl: &mut dyn GlContext, state: &mut LayerState) -> Self {
        Self {
            positions: state.create_buffer(gl, &[]),
            colors: state.create_buffer(gl, &[]),
            picking_colors: state.create_buffer(gl, &[]),
            sizes: state.create_buffer(gl, &[]),
            vertex_count: 0,
        }
    }

    pub fn upload(&mut self, gl: &mut dyn GlContext, attrs: &Attributes) -> Result<(), DeviceError> {
        gl.write_buffer(self.positions, bytemuck::cast_slice(&attrs.positions))?;
        gl.write_buffer(self.colors, bytemuck::cast_slice(&attrs.colors))?;
        gl.write_buffer(self.picking_colors, bytemuck::cast_slice(&attrs.picking_colors))?;
        gl.write_buffer(self.sizes, bytemuck::cast_slice(&attrs.sizes))?;
        self.vertex_count = attrs.len();
        Ok(())
    }

    pub fn draw_call<'a>(&self, program: ProgramId, uniforms: &'a Uniforms) -> DrawCall<'a> {
        DrawCall {
            program,
            vertex_count: self.vertex_count,
            positions: self.positions,
            colors: self.colors,
            picking_colors: Some(self.picking_colors),
            sizes: Some(self.sizes),
            uniforms,
        }
    }
}
