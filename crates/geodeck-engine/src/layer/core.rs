use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use super::flags::ChangeFlags;
use super::layer::{Layer, LayerRef};
use super::lifecycle::Lifecycle;
use super::props::LayerProps;
use super::state::LayerState;

/// Common props plus the interior state the engine manages for a layer.
///
/// Props are fixed at construction. Everything else is interior-mutable: the
/// manager moves state between instances, flips lifecycle and flags, and
/// links generated sublayers to their parent while hosts and the pick
/// pipeline hold shared references.
pub struct LayerCore {
    props: LayerProps,
    lifecycle: Cell<Lifecycle>,
    state: RefCell<Option<LayerState>>,
    change_flags: RefCell<ChangeFlags>,
    needs_redraw: RefCell<Option<String>>,
    needs_update: RefCell<Option<String>>,
    parent: RefCell<Option<Weak<dyn Layer>>>,
    /// Previous instance whose state was moved here; cleared by the next update.
    previous: RefCell<Option<LayerRef>>,
}

impl LayerCore {
    pub fn new(props: LayerProps) -> Self {
        Self {
            props,
            lifecycle: Cell::new(Lifecycle::AwaitingInit),
            state: RefCell::new(None),
            change_flags: RefCell::new(ChangeFlags::default()),
            needs_redraw: RefCell::new(None),
            needs_update: RefCell::new(None),
            parent: RefCell::new(None),
            previous: RefCell::new(None),
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.props.id
    }

    #[inline]
    pub fn props(&self) -> &LayerProps {
        &self.props
    }

    #[inline]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.get()
    }

    pub(crate) fn set_lifecycle(&self, lifecycle: Lifecycle) {
        self.lifecycle.set(lifecycle);
    }

    // ── state ───────────────────────────────────────────────────────────

    pub fn has_state(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Borrows the internal state, if the layer holds one.
    pub fn state(&self) -> Option<Ref<'_, LayerState>> {
        Ref::filter_map(self.state.borrow(), Option::as_ref).ok()
    }

    pub fn state_mut(&self) -> Option<RefMut<'_, LayerState>> {
        RefMut::filter_map(self.state.borrow_mut(), Option::as_mut).ok()
    }

    pub(crate) fn take_state(&self) -> Option<LayerState> {
        self.state.borrow_mut().take()
    }

    pub(crate) fn put_state(&self, state: LayerState) {
        *self.state.borrow_mut() = Some(state);
    }

    pub(crate) fn set_previous(&self, previous: Option<LayerRef>) {
        *self.previous.borrow_mut() = previous;
    }

    pub(crate) fn take_previous(&self) -> Option<LayerRef> {
        self.previous.borrow_mut().take()
    }

    // ── parent ──────────────────────────────────────────────────────────

    /// Composite layer that generated this one.
    pub fn parent(&self) -> Option<LayerRef> {
        self.parent.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn set_parent(&self, parent: &LayerRef) {
        *self.parent.borrow_mut() = Some(Rc::downgrade(parent));
    }

    // ── flags ───────────────────────────────────────────────────────────

    pub fn change_flags(&self) -> ChangeFlags {
        self.change_flags.borrow().clone()
    }

    /// Merges flags into the pending set.
    pub fn set_change_flags(&self, flags: ChangeFlags) {
        self.change_flags.borrow_mut().merge(flags);
    }

    pub(crate) fn take_change_flags(&self) -> ChangeFlags {
        std::mem::take(&mut *self.change_flags.borrow_mut())
    }

    pub fn set_needs_redraw(&self, reason: &str) {
        let mut slot = self.needs_redraw.borrow_mut();
        if slot.is_none() {
            *slot = Some(reason.to_string());
        }
    }

    /// Pending redraw reason; cleared when `clear` is set.
    pub fn needs_redraw(&self, clear: bool) -> Option<String> {
        if clear {
            self.needs_redraw.borrow_mut().take()
        } else {
            self.needs_redraw.borrow().clone()
        }
    }

    /// Asks the manager for a reconciliation pass, typically after data
    /// resolved outside of a props change.
    pub fn set_needs_update(&self, reason: &str) {
        self.set_change_flags(ChangeFlags {
            state_changed: Some(reason.to_string()),
            ..ChangeFlags::default()
        });
        let mut slot = self.needs_update.borrow_mut();
        if slot.is_none() {
            *slot = Some(reason.to_string());
        }
    }

    pub(crate) fn take_needs_update(&self) -> Option<String> {
        self.needs_update.borrow_mut().take()
    }

    pub(crate) fn has_needs_update(&self) -> bool {
        self.needs_update.borrow().is_some()
    }
}

impl std::fmt::Debug for LayerCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerCore")
            .field("id", &self.props.id)
            .field("lifecycle", &self.lifecycle.get())
            .field("has_state", &self.has_state())
            .finish_non_exhaustive()
    }
}
