/// Why a layer needs to recompute its state. Each flag carries the first
/// reason recorded since the last update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeFlags {
    pub data_changed: Option<String>,
    pub props_changed: Option<String>,
    pub update_triggers_changed: Option<String>,
    pub viewport_changed: Option<String>,
    pub state_changed: Option<String>,
}

impl ChangeFlags {
    /// Every flag set; used for the update that follows initialization.
    pub fn all(reason: &str) -> Self {
        Self {
            data_changed: Some(reason.to_string()),
            props_changed: Some(reason.to_string()),
            update_triggers_changed: Some(reason.to_string()),
            viewport_changed: Some(reason.to_string()),
            state_changed: Some(reason.to_string()),
        }
    }

    pub fn viewport(reason: &str) -> Self {
        Self {
            viewport_changed: Some(reason.to_string()),
            ..Self::default()
        }
    }

    #[inline]
    pub fn props_or_data_changed(&self) -> bool {
        self.data_changed.is_some() || self.props_changed.is_some() || self.update_triggers_changed.is_some()
    }

    /// Props, data or the layer's own state moved; the viewport alone does
    /// not count.
    #[inline]
    pub fn needs_recompute(&self) -> bool {
        self.props_or_data_changed() || self.state_changed.is_some()
    }

    #[inline]
    pub fn something_changed(&self) -> bool {
        self.props_or_data_changed() || self.viewport_changed.is_some() || self.state_changed.is_some()
    }

    /// Keeps existing reasons, fills unset flags from `other`.
    pub fn merge(&mut self, other: ChangeFlags) {
        fn keep(slot: &mut Option<String>, new: Option<String>) {
            if slot.is_none() {
                *slot = new;
            }
        }
        keep(&mut self.data_changed, other.data_changed);
        keep(&mut self.props_changed, other.props_changed);
        keep(&mut self.update_triggers_changed, other.update_triggers_changed);
        keep(&mut self.viewport_changed, other.viewport_changed);
        keep(&mut self.state_changed, other.state_changed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_first_reason() {
        let mut flags = ChangeFlags {
            data_changed: Some("first".into()),
            ..ChangeFlags::default()
        };
        flags.merge(ChangeFlags {
            data_changed: Some("second".into()),
            state_changed: Some("async".into()),
            ..ChangeFlags::default()
        });
        assert_eq!(flags.data_changed.as_deref(), Some("first"));
        assert_eq!(flags.state_changed.as_deref(), Some("async"));
    }

    #[test]
    fn viewport_alone_is_not_props_or_data() {
        let flags = ChangeFlags::viewport("moved");
        assert!(flags.something_changed());
        assert!(!flags.props_or_data_changed());
        assert!(!flags.needs_recompute());
    }

    #[test]
    fn own_state_change_needs_recompute() {
        let flags = ChangeFlags {
            state_changed: Some("tiles loaded".into()),
            ..ChangeFlags::default()
        };
        assert!(!flags.props_or_data_changed());
        assert!(flags.needs_recompute());
    }
}
