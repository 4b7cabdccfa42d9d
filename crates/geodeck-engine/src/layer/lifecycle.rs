use std::fmt;

/// Layer lifecycle.
///
/// ```text
/// AwaitingInit ──► Initialized ──► Matched ◄─┐
///                       │             └──────┘
///   any ──► AwaitingGc            (superseded by a newer instance)
///   any ──► AwaitingFinalization ──► Finalized (terminal)
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Lifecycle {
    #[default]
    AwaitingInit,
    Initialized,
    Matched,
    AwaitingGc,
    AwaitingFinalization,
    Finalized,
}

impl Lifecycle {
    /// Whether the layer may sit in the manager's active list.
    #[inline]
    pub fn is_live(self) -> bool {
        matches!(self, Lifecycle::Initialized | Lifecycle::Matched)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Lifecycle::AwaitingInit => "Awaiting state",
            Lifecycle::Initialized => "Initialized",
            Lifecycle::Matched => "Matched. State transferred from previous layer",
            Lifecycle::AwaitingGc => "Awaiting garbage collection",
            Lifecycle::AwaitingFinalization => "Awaiting finalization",
            Lifecycle::Finalized => "Finalized! Awaiting garbage collection",
        };
        f.write_str(s)
    }
}
