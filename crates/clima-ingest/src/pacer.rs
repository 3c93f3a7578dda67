//! Fixed-interval pacing between batched writes

use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Spaces successive `tick` calls at least `period` apart.
///
/// A zero period disables pacing entirely.
#[derive(Debug)]
pub struct Pacer {
    interval: Option<Interval>,
}

impl Pacer {
    pub fn new(period: Duration) -> Self {
        if period.is_zero() {
            return Self { interval: None };
        }
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval: Some(interval),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    pub async fn tick(&mut self) {
        if let Some(interval) = self.interval.as_mut() {
            interval.tick().await;
        }
    }
}
