use std::any::Any;
use std::rc::Rc;
use std::time::Instant;

use crate::device::{GlContext, GlParameters};
use crate::error::{DeckError, LayerError};
use crate::layer::{ChangeFlags, LayerList, LayerRef, PickInfo};
use crate::pick::{pick_object, pick_objects, PickMode, PickObjectParams, PickObjectsParams};
use crate::render::{draw_layers, DrawLayersParams, LayerFilter, PassStats, RenderContext};
use crate::time::FrameTime;
use crate::view::View;
use crate::viewport::Viewport;

use super::reconcile::{finalize_layer, layer_name, reconcile, update_layer};

/// Props the manager takes from the Deck.
#[derive(Clone)]
pub struct LayerManagerProps {
    pub layers: LayerList,
    pub layer_filter: Option<LayerFilter>,
    pub draw_picking_colors: bool,
    pub user_data: Option<Rc<dyn Any>>,
    pub use_device_pixels: bool,
}

impl Default for LayerManagerProps {
    fn default() -> Self {
        Self {
            layers: LayerList::empty(),
            layer_filter: None,
            draw_picking_colors: false,
            user_data: None,
            use_device_pixels: true,
        }
    }
}

/// One screen (or custom) pass over a set of viewports.
pub struct DrawPass<'a> {
    pub pass: &'a str,
    pub viewports: &'a [Rc<Viewport>],
    pub views: &'a [View],
    pub redraw_reason: &'a str,
    pub custom_render: bool,
    pub parameters: GlParameters,
}

/// Point pick request.
#[derive(Clone)]
pub struct PickRequest<'a> {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    /// Only these layers, or composites containing them. `None` for all.
    pub layer_ids: Option<&'a [&'a str]>,
    pub viewports: &'a [Rc<Viewport>],
    pub views: &'a [View],
    pub mode: PickMode,
    pub depth: usize,
}

/// Rectangle pick request.
#[derive(Clone)]
pub struct PickRectRequest<'a> {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub layer_ids: Option<&'a [&'a str]>,
    pub viewports: &'a [Rc<Viewport>],
    pub views: &'a [View],
    pub max_objects: Option<usize>,
}

/// Owns the layer list across frames.
///
/// Each [`set_layers`](Self::set_layers) matches the new list against the
/// current one by id: matched layers inherit state, new ones are
/// initialized, the rest are finalized. Draws and picks go through the
/// shared [`RenderContext`].
pub struct LayerManager<G: GlContext> {
    context: RenderContext<G>,
    layers: Vec<LayerRef>,
    last_list: Option<LayerList>,
    layer_filter: Option<LayerFilter>,
    draw_picking_colors: bool,
    needs_redraw: Option<String>,
    needs_update: Option<String>,
}

impl<G: GlContext> LayerManager<G> {
    pub fn new(gl: G) -> Self {
        Self {
            context: RenderContext::new(gl),
            layers: Vec::new(),
            last_list: None,
            layer_filter: None,
            draw_picking_colors: false,
            needs_redraw: Some("Initial render".to_string()),
            needs_update: None,
        }
    }

    // ── accessors ───────────────────────────────────────────────────────

    pub fn context(&self) -> &RenderContext<G> {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut RenderContext<G> {
        &mut self.context
    }

    pub fn gl(&self) -> &G {
        &self.context.gl
    }

    pub fn gl_mut(&mut self) -> &mut G {
        &mut self.context.gl
    }

    /// Current flat list, sublayers included.
    pub fn layers(&self) -> &[LayerRef] {
        &self.layers
    }

    /// Layers whose id, or an ancestor composite's id, is in `layer_ids`.
    pub fn get_layers(&self, layer_ids: Option<&[&str]>) -> Vec<LayerRef> {
        match layer_ids {
            None => self.layers.clone(),
            Some(ids) => self
                .layers
                .iter()
                .filter(|layer| in_scope(layer, ids))
                .cloned()
                .collect(),
        }
    }

    // ── flags ───────────────────────────────────────────────────────────

    pub fn set_needs_redraw(&mut self, reason: &str) {
        if self.needs_redraw.is_none() {
            self.needs_redraw = Some(reason.to_string());
        }
    }

    pub fn set_needs_update(&mut self, reason: &str) {
        if self.needs_update.is_none() {
            self.needs_update = Some(reason.to_string());
        }
    }

    /// Manager or layer redraw reason. With `clear`, every flag is cleared,
    /// so a reason is reported exactly once.
    pub fn needs_redraw(&mut self, clear: bool) -> Option<String> {
        let mut reason = if clear {
            self.needs_redraw.take()
        } else {
            self.needs_redraw.clone()
        };
        for layer in &self.layers {
            let layer_reason = layer.core().needs_redraw(clear);
            if reason.is_none() {
                reason = layer_reason;
            }
        }
        reason
    }

    /// Manager reason, or the first layer that asked for an update.
    pub fn needs_update(&self) -> Option<String> {
        self.needs_update.clone().or_else(|| {
            self.layers
                .iter()
                .find(|l| l.core().has_needs_update())
                .map(|l| format!("{} needs update", l.id()))
        })
    }

    // ── props ───────────────────────────────────────────────────────────

    pub fn set_props(&mut self, props: LayerManagerProps) -> Result<(), LayerError> {
        let filter_changed = match (&self.layer_filter, &props.layer_filter) {
            (None, None) => false,
            (Some(a), Some(b)) => !Rc::ptr_eq(a, b),
            _ => true,
        };
        if filter_changed {
            self.layer_filter = props.layer_filter;
            self.set_needs_redraw("layerFilter changed");
        }
        if props.draw_picking_colors != self.draw_picking_colors {
            self.draw_picking_colors = props.draw_picking_colors;
            self.set_needs_redraw("drawPickingColors changed");
        }
        if props.use_device_pixels != self.context.use_device_pixels {
            self.context.use_device_pixels = props.use_device_pixels;
            self.set_needs_redraw("useDevicePixels changed");
        }
        self.context.user_data = props.user_data;
        self.set_layers(props.layers)
    }

    pub fn set_animation(&mut self, animation: FrameTime) {
        self.context.animation = animation;
    }

    // ── reconciliation ──────────────────────────────────────────────────

    /// Reconciles `list` against the current layers.
    ///
    /// A list identical to the previous one is ignored. Per-layer failures do
    /// not stop the pass; the first one is returned once every layer was
    /// processed.
    pub fn set_layers(&mut self, list: LayerList) -> Result<(), LayerError> {
        if self.last_list.as_ref().is_some_and(|last| last.same(&list)) {
            return Ok(());
        }
        log::debug!("updating {} layers", list.nodes().len());

        let started = Instant::now();
        let new_layers = list.flatten();
        self.last_list = Some(list);

        let result = reconcile(&mut self.context, &self.layers, new_layers);
        self.layers = result.layers;
        if let Some(reason) = result.redraw {
            self.set_needs_redraw(&reason);
        }
        self.needs_update = None;
        self.context.stats.update_time += started.elapsed();

        match result.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Re-runs reconciliation on the last list if an update was requested.
    pub fn update_layers(&mut self) -> Result<(), LayerError> {
        let Some(reason) = self.needs_update() else {
            return Ok(());
        };
        self.set_needs_redraw(&format!("updating layers: {reason}"));
        let list = self.last_list.as_ref().map(LayerList::shallow_copy).unwrap_or_default();
        self.set_layers(list)
    }

    /// Makes `viewport` current. On change every layer is flagged and
    /// updated against it.
    pub fn activate_viewport(&mut self, viewport: &Rc<Viewport>) {
        activate_viewport(&mut self.context, &self.layers, viewport);
    }

    // ── draw & pick ─────────────────────────────────────────────────────

    pub fn draw_layers(&mut self, pass: DrawPass<'_>) -> Result<Vec<PassStats>, DeckError> {
        let started = Instant::now();
        let layers = self.layers.clone();
        let result = draw_layers(
            &mut self.context,
            DrawLayersParams {
                layers: &layers,
                viewports: pass.viewports,
                views: pass.views,
                on_viewport_active: &mut |ctx, viewport| activate_viewport(ctx, &layers, viewport),
                draw_picking_colors: self.draw_picking_colors,
                layer_filter: self.layer_filter.as_ref(),
                pass: pass.pass,
                parameters: pass.parameters,
                redraw_reason: pass.redraw_reason,
                custom_render: pass.custom_render,
                excluded: &[],
            },
        );
        self.context.stats.draw_time += started.elapsed();
        result
    }

    pub fn pick_object(&mut self, request: PickRequest<'_>) -> Result<Vec<PickInfo>, DeckError> {
        let all = self.layers.clone();
        let layers = self.get_layers(request.layer_ids);
        pick_object(
            &mut self.context,
            PickObjectParams {
                layers: &layers,
                viewports: request.viewports,
                views: request.views,
                on_viewport_active: &mut |ctx, viewport| activate_viewport(ctx, &all, viewport),
                layer_filter: self.layer_filter.as_ref(),
                x: request.x,
                y: request.y,
                radius: request.radius,
                depth: request.depth,
                mode: request.mode,
            },
        )
    }

    pub fn pick_objects(&mut self, request: PickRectRequest<'_>) -> Result<Vec<PickInfo>, DeckError> {
        let all = self.layers.clone();
        let layers = self.get_layers(request.layer_ids);
        pick_objects(
            &mut self.context,
            PickObjectsParams {
                layers: &layers,
                viewports: request.viewports,
                views: request.views,
                on_viewport_active: &mut |ctx, viewport| activate_viewport(ctx, &all, viewport),
                layer_filter: self.layer_filter.as_ref(),
                x: request.x,
                y: request.y,
                width: request.width,
                height: request.height,
                max_objects: request.max_objects,
            },
        )
    }

    /// Finalizes every layer and releases shared resources.
    pub fn finalize(&mut self) {
        for layer in std::mem::take(&mut self.layers) {
            if let Err(err) = finalize_layer(&mut self.context, &layer) {
                log::warn!("{err}");
            }
        }
        self.last_list = None;
        self.context.release();
    }
}

fn activate_viewport<G: GlContext>(ctx: &mut RenderContext<G>, layers: &[LayerRef], viewport: &Rc<Viewport>) {
    if ctx.viewport.equals(viewport) {
        return;
    }
    log::trace!("viewport changed to {}", viewport.id());
    ctx.viewport = Rc::clone(viewport);
    for layer in layers {
        layer.core().set_change_flags(ChangeFlags::viewport("Viewport changed"));
        if let Err(err) = update_layer(ctx, layer) {
            log::warn!("error during viewport update of {}: {err:#}", layer_name(layer.as_ref()));
        }
    }
}

fn in_scope(layer: &LayerRef, ids: &[&str]) -> bool {
    if ids.contains(&layer.id()) {
        return true;
    }
    let mut parent = layer.core().parent();
    while let Some(p) = parent {
        if ids.contains(&p.id()) {
            return true;
        }
        parent = p.core().parent();
    }
    false
}
