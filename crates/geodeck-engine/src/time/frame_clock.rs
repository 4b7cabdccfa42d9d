use std::time::{Duration, Instant};

/// Timing of one rendered frame, handed to layers as `animation`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameTime {
    /// Seconds since the previous frame, at most the clock's `max_step`.
    pub dt: f64,
    /// Animation seconds: the sum of every `dt` so far.
    pub elapsed: f64,
    pub frame_index: u64,
}

impl FrameTime {
    /// Time of a frame drawn without a clock (tests, forced redraws).
    pub const ZERO: FrameTime = FrameTime {
        dt: 0.0,
        elapsed: 0.0,
        frame_index: 0,
    };
}

/// Animation clock of one Deck.
///
/// The first frame has `dt == 0`. Gaps longer than `max_step` (a hidden
/// window, a debugger pause) count as `max_step`, so trails never skip ahead.
#[derive(Debug, Clone)]
pub struct FrameClock {
    previous: Option<Instant>,
    elapsed: f64,
    frames: u64,
    max_step: Duration,
}

impl FrameClock {
    pub const DEFAULT_MAX_STEP: Duration = Duration::from_millis(250);

    pub fn new() -> Self {
        Self::with_max_step(Self::DEFAULT_MAX_STEP)
    }

    pub fn with_max_step(max_step: Duration) -> Self {
        Self {
            previous: None,
            elapsed: 0.0,
            frames: 0,
            max_step,
        }
    }

    /// Frames produced so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Forgets the previous frame; the next tick has `dt == 0`.
    pub fn pause(&mut self) {
        self.previous = None;
    }

    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let step = self
            .previous
            .map_or(Duration::ZERO, |prev| now.saturating_duration_since(prev));
        self.previous = Some(now);
        self.step(step)
    }

    fn step(&mut self, step: Duration) -> FrameTime {
        let dt = step.min(self.max_step).as_secs_f64();
        self.elapsed += dt;
        let frame = FrameTime {
            dt,
            elapsed: self.elapsed,
            frame_index: self.frames,
        };
        self.frames += 1;
        frame
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_has_no_delta() {
        let mut clock = FrameClock::new();
        let first = clock.tick();
        assert_eq!(first.dt, 0.0);
        assert_eq!(first.frame_index, 0);
        assert_eq!(clock.frames(), 1);
    }

    #[test]
    fn long_gaps_are_capped() {
        let mut clock = FrameClock::with_max_step(Duration::from_millis(50));
        clock.step(Duration::from_millis(20));
        let late = clock.step(Duration::from_secs(3));
        assert!((late.dt - 0.05).abs() < 1e-9);
        assert!((late.elapsed - 0.07).abs() < 1e-9);
        assert_eq!(late.frame_index, 1);
    }

    #[test]
    fn pause_restarts_the_delta() {
        let mut clock = FrameClock::new();
        clock.tick();
        clock.pause();
        assert_eq!(clock.tick().dt, 0.0);
    }
}
