use std::any::Any;
use std::rc::Rc;

use crate::device::{GlContext, PickingUniforms, ProgramDesc, ProgramId, Uniforms, DeviceError};
use crate::render::ProgramCache;
use crate::time::FrameTime;
use crate::viewport::Viewport;

use super::core::LayerCore;
use super::flags::ChangeFlags;
use super::list::LayerNode;
use super::picking::PickInfo;
use super::props::LayerProps;
use super::state::LayerState;

/// Shared handle to a layer. Identity (not equality) is what the manager
/// compares.
pub type LayerRef = Rc<dyn Layer>;

/// Whether two handles point at the same layer instance.
#[inline]
pub fn same_layer(a: &LayerRef, b: &LayerRef) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// What a layer sees of the render context during lifecycle hooks.
///
/// Layers may read the viewport; only the manager replaces it.
pub struct LayerContext<'a> {
    pub gl: &'a mut dyn GlContext,
    pub viewport: &'a Viewport,
    pub programs: &'a mut ProgramCache,
    pub animation: FrameTime,
    pub user_data: Option<&'a Rc<dyn Any>>,
}

impl LayerContext<'_> {
    /// Shared program for `desc`, created on first use.
    pub fn program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, DeviceError> {
        self.programs.get_or_create(&mut *self.gl, desc)
    }
}

/// Inputs of [`Layer::update_state`].
pub struct UpdateParams<'a> {
    /// Instance whose state was transferred, `None` right after initialization.
    pub old: Option<&'a dyn Layer>,
    pub change_flags: &'a ChangeFlags,
}

/// Picking-module state handed to a draw.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleParameters {
    pub picking_active: bool,
    pub device_pixel_ratio: f64,
    /// Picking colour of the object to highlight.
    pub selected_color: Option<[u8; 3]>,
    /// Objects hidden from this picking pass.
    pub excluded_colors: Vec<[u8; 3]>,
}

/// Inputs of [`Layer::draw`].
pub struct DrawOptions<'a> {
    pub viewport: &'a Viewport,
    pub module: ModuleParameters,
    /// Position in the drawn list; encoded as picking alpha.
    pub layer_index: usize,
    pub animation: FrameTime,
}

impl DrawOptions<'_> {
    /// Base uniforms for a layer with `props`: projection, opacity and picking.
    pub fn uniforms(&self, props: &LayerProps) -> Uniforms {
        Uniforms {
            project: self.viewport.common_to_clip(),
            opacity: props.opacity,
            size_scale: self.module.device_pixel_ratio,
            size_min_pixels: 0.0,
            size_max_pixels: f64::MAX,
            picking: PickingUniforms {
                active: self.module.picking_active,
                selected_color: self.module.selected_color,
                highlight_color: props.highlight_color,
                excluded: self.module.excluded_colors.clone(),
            },
        }
    }
}

/// A drawable unit.
///
/// Hooks receive the layer's own [`LayerState`]; the manager owns the
/// transitions between them:
///
/// - first sighting: `initialize_state`, then `update_state` with every flag set
/// - matched by id: state moves over, `update_state` if `should_update_state`
/// - dropped: `finalize_state`
///
/// Hook errors are isolated to the layer and reported by the manager.
pub trait Layer: Any {
    fn core(&self) -> &LayerCore;

    /// Kind name for logs, e.g. `"ScatterplotLayer"`.
    fn layer_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    #[inline]
    fn id(&self) -> &str {
        self.core().id()
    }

    #[inline]
    fn props(&self) -> &LayerProps {
        self.core().props()
    }

    /// Composite layers draw nothing themselves and expand into sublayers.
    fn is_composite(&self) -> bool {
        false
    }

    fn initialize_state(&self, ctx: &mut LayerContext<'_>) -> anyhow::Result<LayerState>;

    fn should_update_state(&self, params: &UpdateParams<'_>) -> bool {
        params.change_flags.needs_recompute()
    }

    fn update_state(
        &self,
        params: &UpdateParams<'_>,
        state: &mut LayerState,
        ctx: &mut LayerContext<'_>,
    ) -> anyhow::Result<()>;

    fn finalize_state(&self, state: &mut LayerState, ctx: &mut LayerContext<'_>) -> anyhow::Result<()> {
        state.release(&mut *ctx.gl);
        Ok(())
    }

    /// Kind-specific prop diff against the previous instance. Common props
    /// are compared by the manager.
    fn diff_props(&self, _old: &dyn Layer) -> ChangeFlags {
        ChangeFlags::default()
    }

    fn draw(&self, _state: &LayerState, _opts: &DrawOptions<'_>, _gl: &mut dyn GlContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Sublayers of a composite layer, regenerated every reconciliation.
    fn render_layers(&self, _state: &LayerState, _ctx: &LayerContext<'_>) -> anyhow::Result<Vec<LayerNode>> {
        Ok(Vec::new())
    }

    /// Data object behind a picked index.
    fn picked_object(&self, _state: &LayerState, _index: i64) -> Option<Rc<dyn Any>> {
        None
    }

    /// Rewrites a pick that hit this layer or, for composites, one of its
    /// sublayers (`source`).
    fn picking_info(&self, info: PickInfo, _source: &dyn Layer) -> PickInfo {
        info
    }
}
