//! Embedding a Deck in a host map.
//!
//! The host owns the camera and the canvas; [`DeckOverlay`] listens to its
//! camera and size events, mirrors its camera into the Deck and re-renders.

mod map;
mod overlay;

pub use map::{HostEventKind, HostListener, HostListeners, HostMap, ListenerKey};
pub use overlay::{DeckOverlay, OverlayOptions};
