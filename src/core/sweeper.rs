//! Background expiry sweep.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error};

use crate::core::itinerary::ItineraryWorkflow;

/// Runs [`ItineraryWorkflow::sweep_expired`] every `period` until the returned
/// handle is aborted.
///
/// A failed sweep is logged and the next tick tries again.
pub fn spawn_expiry_sweeper(workflow: ItineraryWorkflow, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match workflow.sweep_expired(Utc::now()).await {
                Ok(report) => debug!(expired = report.expired.len(), "Sweep tick"),
                Err(e) => error!(error = %e, "Expiry sweep failed"),
            }
        }
    })
}
