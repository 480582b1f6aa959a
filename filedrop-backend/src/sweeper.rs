//! Optional background removal of expired files.
//!
//! Lazy expiry on read is enough for correctness; this only reclaims space for
//! files nobody asks for again. A swept file answers 404 where a lazily
//! expired one would have answered 410 once.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, trace, warn};

use crate::SharedState;

pub fn spawn_sweeper(state: SharedState, every: Duration) -> JoinHandle<()> {
    info!("Sweeping expired files every {}s", every.as_secs());
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match state.controller.sweep_expired().await {
                Ok(0) => trace!("sweep found nothing to remove"),
                Ok(removed) => info!(removed, "swept expired files"),
                Err(err) => warn!("sweep failed: {}", err),
            }
        }
    })
}
