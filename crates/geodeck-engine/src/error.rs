//! Engine error types.

use std::fmt;

use crate::device::DeviceError;
use crate::viewport::ViewportError;

/// Lifecycle hook that failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LayerStage {
    Initialize,
    Update,
    Finalize,
    SubLayers,
    Draw,
    /// The layer was handed back after being finalized.
    Lifecycle,
}

impl fmt::Display for LayerStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LayerStage::Initialize => "initialize",
            LayerStage::Update => "update",
            LayerStage::Finalize => "finalize",
            LayerStage::SubLayers => "sublayer generation",
            LayerStage::Draw => "draw",
            LayerStage::Lifecycle => "lifecycle check",
        };
        f.write_str(s)
    }
}

/// A failure isolated to one layer.
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed for layer `{layer_id}`: {source}")]
pub struct LayerError {
    pub layer_id: String,
    pub stage: LayerStage,
    pub source: anyhow::Error,
}

impl LayerError {
    pub fn new(layer_id: impl Into<String>, stage: LayerStage, source: anyhow::Error) -> Self {
        Self {
            layer_id: layer_id.into(),
            stage,
            source,
        }
    }
}

/// Errors surfaced by the layer manager and the Deck.
#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    #[error(transparent)]
    Viewport(#[from] ViewportError),

    #[error(transparent)]
    Layer(#[from] LayerError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}
