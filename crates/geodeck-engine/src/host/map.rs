use std::rc::Rc;

use crate::view::ViewState;

/// Host map events the overlay reacts to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HostEventKind {
    SizeChange,
    ZoomEnd,
    RotateEnd,
    MoveStart,
    MoveEnd,
    CenterChange,
}

impl HostEventKind {
    pub const ALL: [HostEventKind; 6] = [
        HostEventKind::SizeChange,
        HostEventKind::ZoomEnd,
        HostEventKind::RotateEnd,
        HostEventKind::MoveStart,
        HostEventKind::MoveEnd,
        HostEventKind::CenterChange,
    ];
}

/// Handle returned by [`HostMap::subscribe`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ListenerKey(pub u64);

pub type HostListener = Rc<dyn Fn(HostEventKind)>;

/// The map a Deck is embedded in.
pub trait HostMap {
    /// Current camera in the host's own zoom convention.
    fn view_state(&self) -> ViewState;

    /// Canvas size in CSS pixels.
    fn size(&self) -> (f64, f64);

    fn pixel_ratio(&self) -> f64;

    fn subscribe(&mut self, kind: HostEventKind, listener: HostListener) -> ListenerKey;

    /// Returns `false` for an unknown key.
    fn unsubscribe(&mut self, key: ListenerKey) -> bool;
}

/// Listener registry for [`HostMap`] implementations.
#[derive(Default)]
pub struct HostListeners {
    next_key: u64,
    entries: Vec<(ListenerKey, HostEventKind, HostListener)>,
}

impl HostListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, kind: HostEventKind, listener: HostListener) -> ListenerKey {
        let key = ListenerKey(self.next_key);
        self.next_key += 1;
        self.entries.push((key, kind, listener));
        key
    }

    pub fn unsubscribe(&mut self, key: ListenerKey) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _, _)| *k != key);
        self.entries.len() != before
    }

    /// Calls every listener of `kind`, in subscription order.
    pub fn emit(&self, kind: HostEventKind) {
        let listeners: Vec<HostListener> = self
            .entries
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(kind);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, kind: HostEventKind) -> usize {
        self.entries.iter().filter(|(_, k, _)| *k == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn emit_reaches_only_matching_listeners() {
        let hits = Rc::new(Cell::new(0));
        let mut listeners = HostListeners::new();
        let h = hits.clone();
        let key = listeners.subscribe(HostEventKind::MoveEnd, Rc::new(move |_| h.set(h.get() + 1)));
        listeners.subscribe(HostEventKind::ZoomEnd, Rc::new(|_| panic!("wrong kind")));

        listeners.emit(HostEventKind::MoveEnd);
        assert_eq!(hits.get(), 1);

        assert!(listeners.unsubscribe(key));
        assert!(!listeners.unsubscribe(key));
        listeners.emit(HostEventKind::MoveEnd);
        assert_eq!(hits.get(), 1);
        assert_eq!(listeners.len(), 1);
    }
}
