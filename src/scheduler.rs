// This file is part of nova64.
// Grounded on spec.md §4.3 in full; the cycle-counting half of the idiom
// follows zinc64-core/src/core/clock.rs's `Clock` (a plain counter this
// module advances from wall time instead of per-instruction ticks).

/// Supplies a monotonic timestamp and the frequency it ticks at. Lets the
/// host inject any clock source (a real one, or a fake one in tests)
/// without the scheduler depending on `std::time` directly.
pub trait TimestampSource {
    fn now(&self) -> u64;
    fn frequency(&self) -> u64;
}

/// `std::time::Instant`-backed source for real hosts: ticks in
/// nanoseconds since the scheduler's own construction.
pub struct MonotonicClock {
    origin: std::time::Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimestampSource for MonotonicClock {
    fn now(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn frequency(&self) -> u64 {
        1_000_000_000
    }
}

/// Converts elapsed wall-clock time into a cycle budget for the main
/// loop. Not thread-safe by design (spec §4.3/§5): the host must call it
/// from a single serialized loop.
pub struct Scheduler {
    target_cycles_per_second: u64,
    max_backlog_cycles: u64,
    last_timestamp: Option<u64>,
    owed_cycles: u64,
    /// Fractional cycle remainder carried between calls so repeated
    /// small elapsed-time deltas don't get truncated away.
    remainder: u64,
}

impl Scheduler {
    pub fn new(target_cycles_per_second: u64, max_backlog_cycles: u64) -> Self {
        Self {
            target_cycles_per_second,
            max_backlog_cycles,
            last_timestamp: None,
            owed_cycles: 0,
            remainder: 0,
        }
    }

    /// Returns a cycle budget for this call, clamped to `max_backlog_cycles`
    /// and, if given, to `max`. The first call always returns zero (it
    /// only has a chance to record the starting timestamp).
    pub fn take_cycle_budget(&mut self, source: &dyn TimestampSource, max: Option<u64>) -> u64 {
        let now = source.now();
        let last = match self.last_timestamp.replace(now) {
            Some(last) => last,
            None => return 0,
        };

        let elapsed_ticks = now.saturating_sub(last);
        let freq = source.frequency().max(1);
        let numerator = u128::from(elapsed_ticks) * u128::from(self.target_cycles_per_second) + u128::from(self.remainder);
        let new_cycles = (numerator / u128::from(freq)) as u64;
        self.remainder = (numerator % u128::from(freq)) as u64;

        self.owed_cycles = self.owed_cycles.saturating_add(new_cycles).min(self.max_backlog_cycles);

        let budget = match max {
            Some(m) => self.owed_cycles.min(m),
            None => self.owed_cycles,
        };
        self.owed_cycles -= budget;
        budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeClock {
        now: std::cell::Cell<u64>,
        freq: u64,
    }

    impl TimestampSource for FakeClock {
        fn now(&self) -> u64 {
            self.now.get()
        }
        fn frequency(&self) -> u64 {
            self.freq
        }
    }

    #[test]
    fn first_call_returns_zero_and_records_timestamp() {
        let mut s = Scheduler::new(1_000_000, 1_000_000);
        let clock = FakeClock { now: std::cell::Cell::new(100), freq: 1_000 };
        assert_eq!(s.take_cycle_budget(&clock, None), 0);
    }

    #[test]
    fn elapsed_time_converts_to_cycles_at_target_rate() {
        let mut s = Scheduler::new(2_000_000, u64::MAX);
        let clock = FakeClock { now: std::cell::Cell::new(0), freq: 1_000_000 };
        s.take_cycle_budget(&clock, None);
        clock.now.set(500_000); // half a second
        assert_eq!(s.take_cycle_budget(&clock, None), 1_000_000);
    }

    #[test]
    fn backlog_is_clamped_after_a_long_pause() {
        let mut s = Scheduler::new(1_000_000, 100_000);
        let clock = FakeClock { now: std::cell::Cell::new(0), freq: 1_000_000 };
        s.take_cycle_budget(&clock, None);
        clock.now.set(10_000_000); // 10 seconds worth, way over backlog cap
        assert_eq!(s.take_cycle_budget(&clock, None), 100_000);
    }

    #[test]
    fn per_call_max_is_honored_and_remainder_stays_owed() {
        let mut s = Scheduler::new(1_000_000, u64::MAX);
        let clock = FakeClock { now: std::cell::Cell::new(0), freq: 1_000_000 };
        s.take_cycle_budget(&clock, None);
        clock.now.set(1_000_000);
        assert_eq!(s.take_cycle_budget(&clock, Some(300_000)), 300_000);
        // remaining 700_000 owed cycles are still available next call
        clock.now.set(1_000_000);
        assert_eq!(s.take_cycle_budget(&clock, None), 700_000);
    }
}
