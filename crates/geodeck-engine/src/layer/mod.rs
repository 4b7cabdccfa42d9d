//! The layer contract.
//!
//! A layer is a descriptor the host rebuilds every frame (id + props) plus
//! internal state the engine carries across frames. Hosts hand layers over as
//! [`LayerRef`]s inside a [`LayerList`]; the layer manager matches them by id,
//! moves [`LayerState`] from the previous instance to the new one and drives
//! the [`Lifecycle`] transitions.
//!
//! Concrete kinds implement [`Layer`] and embed a [`LayerCore`], which holds the
//! common props and the engine-managed interior state.

mod attributes;
mod core;
mod flags;
mod layer;
mod lifecycle;
mod list;
mod picking;
mod props;
mod state;

pub use attributes::{AttributeBuffers, Attributes};
pub use core::LayerCore;
pub use flags::ChangeFlags;
pub use layer::{same_layer, DrawOptions, Layer, LayerContext, LayerRef, ModuleParameters, UpdateParams};
pub use lifecycle::Lifecycle;
pub use list::{LayerList, LayerNode};
pub(crate) use list::flatten as flatten_nodes;
pub use picking::{decode_picking_color, encode_picking_color, PickInfo};
pub use props::LayerProps;
pub use state::LayerState;

#[cfg(test)]
pub(crate) mod testing;
