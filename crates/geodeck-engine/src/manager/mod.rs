//! Layer reconciliation and the manager that owns the layer list.

mod layer_manager;
mod reconcile;

pub use layer_manager::{DrawPass, LayerManager, LayerManagerProps, PickRectRequest, PickRequest};
