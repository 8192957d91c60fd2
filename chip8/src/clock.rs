//! Instruction and frame cadence.
use std::time::Duration;

use crate::constants::*;

/// Upper bound of elapsed time accounted for in a single step.
///
/// When the host stalls, for example while paused in a debugger, the
/// machine continues at its usual speed instead of racing to catch up.
const MAX_CATCH_UP: Duration = Duration::from_millis(250);

/// Clock frequency, in hertz (per second)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct Hz(pub u64);

impl From<Hz> for Duration {
    fn from(freq: Hz) -> Self {
        if freq.0 == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(NANOS_IN_SECOND / freq.0)
        }
    }
}

/// Work that is due after time has elapsed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Number of instructions to execute.
    pub ticks: u32,
    /// Whether a render pass is due.
    pub frame: bool,
}

/// Accumulates elapsed wall time and splits it into instruction ticks and frames.
///
/// It never reads the time itself. The host measures elapsed time
/// between calls, which keeps the scheduler deterministic.
#[derive(Debug, Clone)]
pub struct Scheduler {
    tick_period: Duration,
    frame_period: Duration,
    tick_elapsed: Duration,
    frame_elapsed: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(Hz(TICK_RATE), Hz(FRAME_RATE))
    }
}

impl Scheduler {
    /// A rate of zero disables that cadence.
    pub fn new(tick_rate: Hz, frame_rate: Hz) -> Self {
        Self {
            tick_period: tick_rate.into(),
            frame_period: frame_rate.into(),
            tick_elapsed: Duration::ZERO,
            frame_elapsed: Duration::ZERO,
        }
    }

    /// Set the clock state back to zero.
    pub fn reset(&mut self) {
        self.tick_elapsed = Duration::ZERO;
        self.frame_elapsed = Duration::ZERO;
    }

    pub fn advance(&mut self, elapsed: Duration) -> Schedule {
        let elapsed = elapsed.min(MAX_CATCH_UP);
        let mut schedule = Schedule::default();

        if !self.tick_period.is_zero() {
            self.tick_elapsed += elapsed;
            let ticks = self.tick_elapsed.as_nanos() / self.tick_period.as_nanos();
            // Remainder carries over to the next step.
            self.tick_elapsed -= self.tick_period * ticks as u32;
            schedule.ticks = ticks as u32;
        }

        if !self.frame_period.is_zero() {
            self.frame_elapsed += elapsed;
            if self.frame_elapsed >= self.frame_period {
                // Reset back to zero, rather than trying to catch up on missed frames.
                self.frame_elapsed = Duration::ZERO;
                schedule.frame = true;
            }
        }

        schedule
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clock_hz() {
        let interval: Duration = Hz(60).into();
        assert_eq!(interval.as_millis(), 16);
        let interval: Duration = Hz(0).into();
        assert!(interval.is_zero());
    }

    #[test]
    fn test_tick_remainder_carries() {
        let mut scheduler = Scheduler::new(Hz(1000), Hz(0));

        assert_eq!(scheduler.advance(Duration::from_micros(2500)).ticks, 2);
        // 0.5ms left over from the previous step.
        assert_eq!(scheduler.advance(Duration::from_micros(500)).ticks, 1);
        assert_eq!(scheduler.advance(Duration::from_micros(999)).ticks, 0);
        assert_eq!(scheduler.advance(Duration::from_micros(1)).ticks, 1);
    }

    #[test]
    fn test_default_rates() {
        let mut scheduler = Scheduler::default();
        let mut ticks = 0;
        let mut frames = 0;

        // One second in 1ms steps.
        for _ in 0..1000 {
            let schedule = scheduler.advance(Duration::from_millis(1));
            ticks += schedule.ticks;
            frames += schedule.frame as u32;
        }

        assert_eq!(ticks, 700);
        // Frame remainders are dropped, so a 16.67ms period lands on every 17th millisecond.
        assert_eq!(frames, 58);
    }

    #[test]
    fn test_at_most_one_frame_per_step() {
        let mut scheduler = Scheduler::default();
        let schedule = scheduler.advance(Duration::from_millis(100));
        assert!(schedule.frame);
        assert_eq!(schedule.ticks, 70);
        assert!(!scheduler.advance(Duration::from_millis(1)).frame);
    }

    #[test]
    fn test_catch_up_is_bounded() {
        let mut scheduler = Scheduler::new(Hz(1000), Hz(60));
        let schedule = scheduler.advance(Duration::from_secs(30));
        assert_eq!(schedule.ticks, 250);
        assert!(schedule.frame);
    }
}
