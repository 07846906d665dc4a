//! Background expiry of stale sessions.

use std::sync::Arc;
use std::time::Duration;

use agentweb_ledger::LedgerClient;
use agentweb_registry::DomainOwnershipVerifier;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::protocol::Protocol;

/// Expire stale sessions every `interval` until `shutdown` flips to true.
///
/// Returns the number of sessions expired over the sweeper's lifetime.
pub async fn run_sweeper<L, V>(
    protocol: Arc<Protocol<L, V>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> usize
where
    L: LedgerClient,
    V: DomainOwnershipVerifier,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut total = 0;

    info!(interval_ms = interval.as_millis(), "expiry sweeper started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let expired = protocol.sweep_expired().await;
                if !expired.is_empty() {
                    info!(count = expired.len(), "expired stale sessions");
                }
                debug!(outstanding = %protocol.escrow().outstanding(), "sweep complete");
                total += expired.len();
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!(total_expired = total, "expiry sweeper shutting down");
                    break;
                }
            }
        }
    }

    total
}
