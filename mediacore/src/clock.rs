//! A wall clock that advances `position` by `elapsed_real_time * speed_ratio`
//! while running (spec §3, "RealTimeClock").

use std::time::{Duration, Instant};

/// A real-time clock with a reported `position`, a `speed_ratio` and a
/// running flag.
///
/// `position()` is computed lazily from the last anchor (`Instant`,
/// `Duration`) pair rather than updated on a timer, so reading it never
/// races a writer beyond the lock the caller already holds (spec §5:
/// "Clocks — protected by a lock inside the Timing Controller").
#[derive(Debug, Clone)]
pub struct RealTimeClock {
    anchor_position: Duration,
    anchor_instant: Instant,
    speed_ratio: f64,
    is_running: bool,
}

impl RealTimeClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            anchor_position: Duration::ZERO,
            anchor_instant: Instant::now(),
            speed_ratio: 1.0,
            is_running: false,
        }
    }

    /// The current position: the anchor plus elapsed real time scaled by
    /// `speed_ratio`, or exactly the anchor when paused.
    #[must_use]
    pub fn position(&self) -> Duration {
        if !self.is_running {
            return self.anchor_position;
        }
        let elapsed = self.anchor_instant.elapsed();
        let scaled = elapsed.mul_f64(self.speed_ratio.max(0.0));
        self.anchor_position + scaled
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.is_running
    }

    #[must_use]
    pub fn speed_ratio(&self) -> f64 {
        self.speed_ratio
    }

    pub fn set_speed_ratio(&mut self, speed_ratio: f64) {
        // re-anchor first so the rate change takes effect from "now", not
        // from whenever this clock was last anchored.
        self.rebase();
        self.speed_ratio = speed_ratio.max(0.0);
    }

    /// Sets the clock's position without changing its running state.
    pub fn update(&mut self, position: Duration) {
        self.anchor_position = position;
        self.anchor_instant = Instant::now();
    }

    pub fn play(&mut self) {
        if !self.is_running {
            self.anchor_instant = Instant::now();
            self.is_running = true;
        }
    }

    pub fn pause(&mut self) {
        if self.is_running {
            self.anchor_position = self.position();
            self.anchor_instant = Instant::now();
            self.is_running = false;
        }
    }

    /// Stops the clock and resets its position to zero.
    pub fn reset(&mut self) {
        self.anchor_position = Duration::ZERO;
        self.anchor_instant = Instant::now();
        self.is_running = false;
    }

    /// Folds accumulated elapsed time into the anchor without changing the
    /// running state or reported position; used before a speed change.
    fn rebase(&mut self) {
        let now_position = self.position();
        self.anchor_position = now_position;
        self.anchor_instant = Instant::now();
    }
}

impl Default for RealTimeClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn paused_clock_does_not_advance() {
        let clock = RealTimeClock::new();
        assert_eq!(clock.position(), Duration::ZERO);
        assert!(!clock.is_running());
    }

    #[test]
    fn update_sets_position_while_paused() {
        let mut clock = RealTimeClock::new();
        clock.update(Duration::from_secs(5));
        assert_eq!(clock.position(), Duration::from_secs(5));
    }

    #[test]
    fn play_then_pause_preserves_position_monotonically() {
        let mut clock = RealTimeClock::new();
        clock.update(Duration::from_secs(1));
        clock.play();
        std::thread::sleep(Duration::from_millis(20));
        let during = clock.position();
        assert!(during >= Duration::from_secs(1));
        clock.pause();
        let after = clock.position();
        assert!(after >= during);
        // once paused, position must stop moving
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(clock.position(), after);
    }

    #[test]
    fn reset_zeroes_and_stops() {
        let mut clock = RealTimeClock::new();
        clock.update(Duration::from_secs(9));
        clock.play();
        clock.reset();
        assert_eq!(clock.position(), Duration::ZERO);
        assert!(!clock.is_running());
    }
}
