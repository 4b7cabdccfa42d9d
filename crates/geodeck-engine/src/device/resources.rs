use glam::DMat4;

/// Handle to a byte buffer owned by one layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub(crate) u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferId(pub(crate) u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub(crate) u32);

/// How vertices are assembled.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Topology {
    /// One disc per vertex, radius from the size attribute.
    Points,
    /// One segment per vertex pair, width from the size attribute.
    Lines,
    /// One triangle per vertex triple.
    Triangles,
}

/// Program description. Programs are cached by name in the render context.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ProgramDesc {
    pub name: &'static str,
    pub topology: Topology,
}

/// Picking module state for one draw.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PickingUniforms {
    /// Output picking colours instead of colours.
    pub active: bool,
    /// Picking colour of the highlighted object, if any.
    pub selected_color: Option<[u8; 3]>,
    pub highlight_color: [u8; 4],
    /// Picking colours treated as unpickable (already picked objects).
    pub excluded: Vec<[u8; 3]>,
}

/// Per-draw uniforms.
#[derive(Debug, Clone, PartialEq)]
pub struct Uniforms {
    /// Position attribute → clip space.
    pub project: DMat4,
    pub opacity: f32,
    /// Size attribute → device pixels.
    pub size_scale: f64,
    pub size_min_pixels: f64,
    pub size_max_pixels: f64,
    pub picking: PickingUniforms,
}

impl Default for Uniforms {
    fn default() -> Self {
        Self {
            project: DMat4::IDENTITY,
            opacity: 1.0,
            size_scale: 1.0,
            size_min_pixels: 0.0,
            size_max_pixels: f64::MAX,
            picking: PickingUniforms::default(),
        }
    }
}

/// A draw of `vertex_count` vertices.
///
/// Attribute layouts, one element per vertex:
/// - `positions`: `[f64; 3]`
/// - `colors`: `[u8; 4]` straight-alpha RGBA
/// - `picking_colors`: `[u8; 3]`
/// - `sizes`: `f32`
#[derive(Debug, Clone)]
pub struct DrawCall<'a> {
    pub program: ProgramId,
    pub vertex_count: usize,
    pub positions: BufferId,
    pub colors: BufferId,
    pub picking_colors: Option<BufferId>,
    pub sizes: Option<BufferId>,
    pub uniforms: &'a Uniforms,
}
