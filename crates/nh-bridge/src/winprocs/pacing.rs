//! `delay_output` pacing.
//!
//! The engine animates faster than the host can paint. Each delay call is
//! stretched so the engine advances at roughly `steps_per_second`. When
//! the host has been falling behind (render elements dropped on more than
//! two consecutive frames) a short catch-up pause is taken instead.

use std::time::{Duration, Instant};

/// Consecutive lossy frames tolerated before catching up.
pub const MAX_COALESCED_FRAMES: u32 = 2;
pub const CATCH_UP_PAUSE: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaceDecision {
    /// The host is behind; pause briefly without dispatching.
    CatchUp(Duration),
    /// Dispatch a frame, then sleep for the remainder of the step.
    Step(Duration),
}

#[derive(Debug)]
pub struct Pacer {
    step: Option<Duration>,
    last: Option<Instant>,
    last_dropped: u64,
    lossy_frames: u32,
}

impl Pacer {
    /// `steps_per_second == 0` disables pacing.
    pub fn new(steps_per_second: u32) -> Self {
        Self {
            step: (steps_per_second > 0).then(|| Duration::from_secs(1) / steps_per_second),
            last: None,
            last_dropped: 0,
            lossy_frames: 0,
        }
    }

    /// Decide what one `delay_output` call does, given the render queue's
    /// drop counter.
    pub fn next(&mut self, now: Instant, dropped: u64) -> PaceDecision {
        if dropped > self.last_dropped {
            self.lossy_frames += 1;
        } else {
            self.lossy_frames = 0;
        }
        self.last_dropped = dropped;

        if self.lossy_frames > MAX_COALESCED_FRAMES {
            self.last = Some(now);
            return PaceDecision::CatchUp(CATCH_UP_PAUSE);
        }

        let sleep = match (self.step, self.last) {
            (Some(step), Some(last)) => step.saturating_sub(now.saturating_duration_since(last)),
            _ => Duration::ZERO,
        };
        self.last = Some(now + sleep);
        PaceDecision::Step(sleep)
    }

    pub fn reset(&mut self) {
        self.last = None;
        self.lossy_frames = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paces_to_step_rate() {
        let mut pacer = Pacer::new(25);
        let t0 = Instant::now();
        assert_eq!(pacer.next(t0, 0), PaceDecision::Step(Duration::ZERO));
        let t1 = t0 + Duration::from_millis(10);
        assert_eq!(pacer.next(t1, 0), PaceDecision::Step(Duration::from_millis(30)));
        let t2 = t1 + Duration::from_millis(100);
        assert_eq!(pacer.next(t2, 0), PaceDecision::Step(Duration::ZERO));
    }

    #[test]
    fn test_catches_up_after_consecutive_drops() {
        let mut pacer = Pacer::new(30);
        let t = Instant::now();
        assert!(matches!(pacer.next(t, 1), PaceDecision::Step(_)));
        assert!(matches!(pacer.next(t, 2), PaceDecision::Step(_)));
        assert_eq!(pacer.next(t, 3), PaceDecision::CatchUp(CATCH_UP_PAUSE));
        assert!(matches!(pacer.next(t, 3), PaceDecision::Step(_)));
    }

    #[test]
    fn test_disabled() {
        let mut pacer = Pacer::new(0);
        let t = Instant::now();
        pacer.next(t, 0);
        assert_eq!(pacer.next(t, 0), PaceDecision::Step(Duration::ZERO));
    }
}
