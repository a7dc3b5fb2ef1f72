//! Simulated processing load
//!
//! Both daemons pause for a random number of seconds in
//! `[SIMULATE_SLEEP_MIN, SIMULATE_SLEEP_MAX]` after each unit of work.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct SimulatedLoad {
    min_secs: u64,
    max_secs: u64,
}

impl SimulatedLoad {
    /// A reversed range is normalized rather than rejected
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs: min_secs.min(max_secs),
            max_secs: min_secs.max(max_secs),
        }
    }

    /// No pause at all
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    pub fn pick(&self) -> Duration {
        let secs = rand::thread_rng().gen_range(self.min_secs..=self.max_secs);
        Duration::from_secs(secs)
    }

    /// Sleep for a random interval, logging who is paused
    pub fn pause(&self, context: &str) {
        let delay = self.pick();
        if delay.is_zero() {
            return;
        }
        log::info!("{}: simulated load of {}s", context, delay.as_secs());
        std::thread::sleep(delay);
    }
}
