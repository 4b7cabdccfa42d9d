//! geodeck engine crate.
//!
//! Retained-mode geospatial layers over an immediate-mode drawing device:
//! viewports and views, the layer lifecycle, reconciliation, the draw and
//! pick pipeline and the Deck that ties them to a host.

pub mod device;
pub mod time;
pub mod logging;
pub mod coords;
pub mod error;

pub mod viewport;
pub mod view;
pub mod layer;
pub mod render;
pub mod pick;
pub mod manager;
pub mod deck;
pub mod host;

pub use glam;

pub use deck::{Deck, DeckProps, DeckPropsUpdate};
pub use error::{DeckError, LayerError, LayerStage};
pub use layer::{Layer, LayerList, LayerProps, LayerRef, PickInfo};
pub use manager::LayerManager;
pub use view::{View, ViewManager, ViewState};
pub use viewport::Viewport;
