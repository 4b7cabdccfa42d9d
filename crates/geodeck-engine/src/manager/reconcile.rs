//! Matching a new layer list against the previous one.

use std::collections::HashMap;

use anyhow::anyhow;

use crate::device::GlContext;
use crate::error::{LayerError, LayerStage};
use crate::layer::{same_layer, ChangeFlags, Layer, LayerProps, LayerRef, Lifecycle, UpdateParams};
use crate::render::RenderContext;

/// `"Kind(id)"`, for logs.
pub(crate) fn layer_name(layer: &dyn Layer) -> String {
    format!("{}({})", layer.layer_name(), layer.id())
}

/// Output of one reconciliation pass.
pub(crate) struct Reconciled {
    /// Flat list, sublayers right after their parent.
    pub layers: Vec<LayerRef>,
    pub error: Option<LayerError>,
    pub redraw: Option<String>,
}

enum Slot {
    Unmatched(LayerRef),
    Consumed,
}

/// Old layers by id, in their original order.
struct OldLayers {
    slots: Vec<(String, Slot)>,
    index: HashMap<String, usize>,
}

impl OldLayers {
    fn new(old: &[LayerRef]) -> Self {
        let mut slots = Vec::with_capacity(old.len());
        let mut index = HashMap::with_capacity(old.len());
        for layer in old {
            if index.contains_key(layer.id()) {
                // Unreachable by id; finalized with the other leftovers.
                log::warn!("Multiple old layers with same id {}", layer_name(layer.as_ref()));
            } else {
                index.insert(layer.id().to_string(), slots.len());
            }
            slots.push((layer.id().to_string(), Slot::Unmatched(layer.clone())));
        }
        Self { slots, index }
    }

    /// Consumes the old layer with `id`. `Err(())` when a previous new layer
    /// already consumed it.
    fn take(&mut self, id: &str) -> Result<Option<LayerRef>, ()> {
        let Some(&i) = self.index.get(id) else {
            self.index.insert(id.to_string(), self.slots.len());
            self.slots.push((id.to_string(), Slot::Consumed));
            return Ok(None);
        };
        match std::mem::replace(&mut self.slots[i].1, Slot::Consumed) {
            Slot::Unmatched(layer) => Ok(Some(layer)),
            Slot::Consumed => Err(()),
        }
    }

    fn into_unmatched(self) -> impl Iterator<Item = LayerRef> {
        self.slots.into_iter().filter_map(|(_, slot)| match slot {
            Slot::Unmatched(layer) => Some(layer),
            Slot::Consumed => None,
        })
    }
}

/// Reconciles `new_layers` against `old_layers`.
///
/// Per-layer failures are logged and isolated: the failing layer is left out
/// of the result and the first error is returned alongside it.
pub(crate) fn reconcile<G: GlContext>(
    ctx: &mut RenderContext<G>,
    old_layers: &[LayerRef],
    new_layers: Vec<LayerRef>,
) -> Reconciled {
    let mut pass = Reconciler {
        ctx,
        old: OldLayers::new(old_layers),
        generated: Vec::with_capacity(new_layers.len()),
        error: None,
        redraw: None,
    };
    pass.update_sublayers_recursively(new_layers);
    pass.finish()
}

struct Reconciler<'a, G: GlContext> {
    ctx: &'a mut RenderContext<G>,
    old: OldLayers,
    generated: Vec<LayerRef>,
    error: Option<LayerError>,
    redraw: Option<String>,
}

impl<G: GlContext> Reconciler<'_, G> {
    fn update_sublayers_recursively(&mut self, new_layers: Vec<LayerRef>) {
        for layer in new_layers {
            let old = match self.old.take(layer.id()) {
                Ok(old) => old,
                Err(()) => {
                    log::warn!("Multiple new layers with same id {}", layer_name(layer.as_ref()));
                    None
                }
            };

            if let Err(err) = self.match_layer(&layer, old) {
                self.record(err);
                continue;
            }
            self.generated.push(layer.clone());

            if !layer.is_composite() {
                continue;
            }
            match sublayers(self.ctx, &layer) {
                Ok(sublayers) => self.update_sublayers_recursively(sublayers),
                Err(err) => self.record(err),
            }
        }
    }

    fn match_layer(&mut self, layer: &LayerRef, old: Option<LayerRef>) -> Result<(), LayerError> {
        if layer.core().lifecycle() == Lifecycle::Finalized {
            return Err(LayerError::new(
                layer.id(),
                LayerStage::Lifecycle,
                anyhow!("{} was finalized and cannot be reused", layer_name(layer.as_ref())),
            ));
        }
        match old {
            Some(old) if old.core().has_state() || same_layer(&old, layer) => {
                transfer_layer_state(&old, layer);
                update_layer(self.ctx, layer).inspect_err(|_| self.discard(layer))
            }
            Some(old) => {
                // Never got a state; start over.
                old.core().set_lifecycle(Lifecycle::AwaitingGc);
                initialize_layer(self.ctx, layer)
            }
            None => initialize_layer(self.ctx, layer),
        }
    }

    /// Releases the state of a layer that failed after the transfer.
    fn discard(&mut self, layer: &LayerRef) {
        if let Err(err) = finalize_layer(self.ctx, layer) {
            log::warn!("{err}");
        }
    }

    fn record(&mut self, err: LayerError) {
        log::warn!("error during matching of {}: {err:#}", err.layer_id);
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn finish(mut self) -> Reconciled {
        let old = std::mem::replace(
            &mut self.old,
            OldLayers {
                slots: Vec::new(),
                index: HashMap::new(),
            },
        );
        for layer in old.into_unmatched() {
            if self.redraw.is_none() {
                self.redraw = Some(format!("finalized {}", layer_name(layer.as_ref())));
            }
            if let Err(err) = finalize_layer(self.ctx, &layer) {
                self.record(err);
            }
        }
        Reconciled {
            layers: self.generated,
            error: self.error,
            redraw: self.redraw,
        }
    }
}

fn sublayers<G: GlContext>(ctx: &mut RenderContext<G>, layer: &LayerRef) -> Result<Vec<LayerRef>, LayerError> {
    let Some(state) = layer.core().state() else {
        return Ok(Vec::new());
    };
    let nodes = layer
        .render_layers(&state, &ctx.layer_context())
        .map_err(|source| LayerError::new(layer.id(), LayerStage::SubLayers, source))?;
    drop(state);

    let sublayers = crate::layer::flatten_nodes(&nodes);
    for sublayer in &sublayers {
        sublayer.core().set_parent(layer);
    }
    Ok(sublayers)
}

/// Allocates state, runs the first update with every flag set.
pub(crate) fn initialize_layer<G: GlContext>(ctx: &mut RenderContext<G>, layer: &LayerRef) -> Result<(), LayerError> {
    log::debug!("initializing {}", layer_name(layer.as_ref()));
    let fail = |stage: LayerStage| move |source: anyhow::Error| LayerError::new(layer.id(), stage, source);

    let mut lc = ctx.layer_context();
    let mut state = layer.initialize_state(&mut lc).map_err(fail(LayerStage::Initialize))?;

    let flags = ChangeFlags::all("initial");
    let params = UpdateParams {
        old: None,
        change_flags: &flags,
    };
    if let Err(source) = layer.update_state(&params, &mut state, &mut lc) {
        if let Err(err) = layer.finalize_state(&mut state, &mut lc) {
            log::warn!("cleanup of {} failed: {err:#}", layer.id());
        }
        return Err(fail(LayerStage::Update)(source));
    }

    let core = layer.core();
    core.put_state(state);
    core.take_change_flags();
    core.take_needs_update();
    core.set_lifecycle(Lifecycle::Initialized);
    core.set_needs_redraw("initialized");
    Ok(())
}

/// Moves state from `old` to `new` and records what changed between them.
pub(crate) fn transfer_layer_state(old: &LayerRef, new: &LayerRef) {
    if same_layer(old, new) {
        log::trace!("Matching layer is unchanged {}", new.id());
        new.core().set_lifecycle(Lifecycle::Matched);
        return;
    }
    log::trace!("matched {}", layer_name(new.as_ref()));

    let (old_core, new_core) = (old.core(), new.core());
    if let Some(state) = old_core.take_state() {
        new_core.put_state(state);
    }
    let mut flags = old_core.take_change_flags();
    flags.merge(diff_common_props(new.props(), old.props()));
    flags.merge(new.diff_props(old.as_ref()));
    new_core.set_change_flags(flags);
    if let Some(reason) = old_core.take_needs_update() {
        new_core.set_needs_update(&reason);
    }
    new_core.set_previous(Some(old.clone()));

    old_core.set_lifecycle(Lifecycle::AwaitingGc);
    new_core.set_lifecycle(Lifecycle::Matched);
}

/// Runs `update_state` if the pending change flags call for it. A layer that
/// requested an update itself is always updated.
pub(crate) fn update_layer<G: GlContext>(ctx: &mut RenderContext<G>, layer: &LayerRef) -> Result<(), LayerError> {
    let core = layer.core();
    let flags = core.take_change_flags();
    let previous = core.take_previous();
    let requested = core.take_needs_update();
    if requested.is_none() && !flags.something_changed() {
        return Ok(());
    }

    let params = UpdateParams {
        old: previous.as_deref(),
        change_flags: &flags,
    };
    if requested.is_none() && !layer.should_update_state(&params) {
        return Ok(());
    }
    let Some(mut state) = core.take_state() else {
        return Ok(());
    };

    log::trace!("updating {}", layer_name(layer.as_ref()));
    let result = layer.update_state(&params, &mut state, &mut ctx.layer_context());
    core.put_state(state);
    result.map_err(|source| LayerError::new(layer.id(), LayerStage::Update, source))?;
    core.set_needs_redraw("layer updated");
    Ok(())
}

/// Releases the layer's state. The layer is terminal afterwards.
pub(crate) fn finalize_layer<G: GlContext>(ctx: &mut RenderContext<G>, layer: &LayerRef) -> Result<(), LayerError> {
    log::debug!("finalizing {}", layer_name(layer.as_ref()));
    let core = layer.core();
    core.set_lifecycle(Lifecycle::AwaitingFinalization);
    let result = match core.take_state() {
        Some(mut state) => layer.finalize_state(&mut state, &mut ctx.layer_context()),
        None => Ok(()),
    };
    core.set_lifecycle(Lifecycle::Finalized);
    result.map_err(|source| LayerError::new(layer.id(), LayerStage::Finalize, source))
}

fn diff_common_props(new: &LayerProps, old: &LayerProps) -> ChangeFlags {
    let mut flags = ChangeFlags::default();
    let changed = if new.visible != old.visible {
        Some("visible")
    } else if new.pickable != old.pickable {
        Some("pickable")
    } else if new.opacity != old.opacity {
        Some("opacity")
    } else if new.parameters != old.parameters {
        Some("parameters")
    } else if new.auto_highlight != old.auto_highlight
        || new.highlight_color != old.highlight_color
        || new.highlighted_object_index != old.highlighted_object_index
    {
        Some("highlight")
    } else {
        None
    };
    flags.props_changed = changed.map(|prop| format!("props.{prop} changed"));

    if new.update_triggers != old.update_triggers {
        let keys: Vec<&str> = new
            .update_triggers
            .keys()
            .chain(old.update_triggers.keys())
            .filter(|k| new.update_triggers.get(*k) != old.update_triggers.get(*k))
            .map(String::as_str)
            .collect();
        flags.update_triggers_changed = Some(format!("updateTriggers changed: {}", keys.join(", ")));
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_props_diff() {
        let old = LayerProps::new("a");
        assert_eq!(diff_common_props(&old.clone(), &old), ChangeFlags::default());

        let flags = diff_common_props(&LayerProps::new("a").opacity(0.5), &old);
        assert_eq!(flags.props_changed.as_deref(), Some("props.opacity changed"));
        assert!(flags.update_triggers_changed.is_none());

        let flags = diff_common_props(&LayerProps::new("a").update_trigger("get_color", 2), &old);
        assert!(flags.props_changed.is_none());
        assert_eq!(
            flags.update_triggers_changed.as_deref(),
            Some("updateTriggers changed: get_color")
        );
    }
}
