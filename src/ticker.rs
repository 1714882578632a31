// =============================================================================
// Ticker Port
// =============================================================================
//
// Emits ticks; cadence is configuration, not part of the Engine's contract
// (spec §6). Grounded on the teacher's `tokio::time::interval` + `loop`
// background-task idiom used throughout `main.rs` for periodic work.

use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait Ticker: Send + Sync {
    /// Suspends until the next tick.
    async fn tick(&mut self);
}

pub struct IntervalTicker {
    interval: tokio::time::Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}
