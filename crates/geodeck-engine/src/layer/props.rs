use std::collections::BTreeMap;

use crate::device::GlParameters;

/// Props shared by every layer kind.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerProps {
    pub id: String,
    pub visible: bool,
    pub pickable: bool,
    pub opacity: f32,
    /// GL state for this layer's draws. Pass-wide parameters take precedence.
    pub parameters: GlParameters,
    /// Highlight the hovered object.
    pub auto_highlight: bool,
    pub highlight_color: [u8; 4],
    /// Explicit highlight; wins over `auto_highlight`.
    pub highlighted_object_index: Option<i64>,
    /// Accessor versions. Changing a value recomputes the matching attributes.
    pub update_triggers: BTreeMap<String, u64>,
}

impl LayerProps {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            visible: true,
            pickable: false,
            opacity: 1.0,
            parameters: GlParameters::default(),
            auto_highlight: false,
            highlight_color: [0, 0, 128, 128],
            highlighted_object_index: None,
            update_triggers: BTreeMap::new(),
        }
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn pickable(mut self, pickable: bool) -> Self {
        self.pickable = pickable;
        self
    }

    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn parameters(mut self, parameters: GlParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn auto_highlight(mut self, auto_highlight: bool) -> Self {
        self.auto_highlight = auto_highlight;
        self
    }

    pub fn highlight_color(mut self, color: [u8; 4]) -> Self {
        self.highlight_color = color;
        self
    }

    pub fn highlighted_object_index(mut self, index: Option<i64>) -> Self {
        self.highlighted_object_index = index;
        self
    }

    pub fn update_trigger(mut self, accessor: impl Into<String>, version: u64) -> Self {
        self.update_triggers.insert(accessor.into(), version);
        self
    }

    /// Props for a generated sublayer: inherits everything but the id and
    /// update triggers.
    pub fn sublayer(&self, suffix: &str) -> Self {
        Self {
            id: format!("{}-{}", self.id, suffix),
            update_triggers: BTreeMap::new(),
            ..self.clone()
        }
    }
}
