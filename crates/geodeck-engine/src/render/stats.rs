use std::time::Duration;

/// Counts of one pass over one viewport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassStats {
    pub pass: String,
    pub viewport_id: String,
    pub total: usize,
    pub visible: usize,
    pub composite: usize,
    pub pickable: usize,
    pub drawn: usize,
}

/// Running diagnostics of a render context.
#[derive(Debug, Clone, Default)]
pub struct RenderStats {
    /// Draw passes issued per viewport (screen and picking).
    pub render_count: u64,
    pub pick_count: u64,
    /// Frames the Deck actually redrew.
    pub redraw_count: u64,
    pub set_props_count: u64,
    pub last_pass: Vec<PassStats>,
    pub update_time: Duration,
    pub draw_time: Duration,
}

impl RenderStats {
    /// Logs a summary and resets the timers. Called about once per second.
    pub fn log_summary(&mut self) {
        log::debug!(
            "stats: {} redraws, {} renders, {} picks, update {:.2?}, draw {:.2?}",
            self.redraw_count,
            self.render_count,
            self.pick_count,
            self.update_time,
            self.draw_time,
        );
        self.update_time = Duration::ZERO;
        self.draw_time = Duration::ZERO;
    }
}
