//! Bounded confirmation polling.
//!
//! [`ConfirmationWatcher`] polls a ledger's pending-transaction endpoint until
//! the transaction is confirmed, rejected by the pool, the attempt budget runs
//! out, or the caller cancels. Lookup errors are logged and retried; they
//! consume an attempt like any other poll.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::LedgerClient;
use crate::transaction::{ConfirmedInfo, TxRef};

/// Default number of polls before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default delay between polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// Polling budget for confirmation waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Maximum number of status lookups.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between lookups in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WatcherConfig {
    /// Set the attempt budget.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the poll interval.
    #[must_use]
    pub const fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Poll interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Ways a confirmation wait can end without a confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchError {
    /// Attempt budget exhausted.
    #[error("transaction {tx_ref} not confirmed after {attempts} attempts")]
    Timeout {
        /// Watched transaction.
        tx_ref: TxRef,
        /// Polls performed.
        attempts: u32,
    },

    /// The ledger dropped the transaction from its pool.
    #[error("transaction {tx_ref} rejected: {reason}")]
    Rejected {
        /// Watched transaction.
        tx_ref: TxRef,
        /// Pool error reported by the ledger.
        reason: String,
    },

    /// The caller cancelled the wait.
    #[error("confirmation wait for {tx_ref} cancelled after {attempts} attempts")]
    Cancelled {
        /// Watched transaction.
        tx_ref: TxRef,
        /// Polls performed before cancellation.
        attempts: u32,
    },
}

impl WatchError {
    /// The watched transaction.
    #[must_use]
    pub fn tx_ref(&self) -> &TxRef {
        match self {
            Self::Timeout { tx_ref, .. }
            | Self::Rejected { tx_ref, .. }
            | Self::Cancelled { tx_ref, .. } => tx_ref,
        }
    }
}

/// Sending half of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<watch::Sender<bool>>);

impl CancelHandle {
    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    /// Whether cancellation was signalled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// True if both handles signal the same token.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Receiving half of a cancellation signal.
pub type CancelToken = watch::Receiver<bool>;

/// Create a linked cancellation handle and token.
#[must_use]
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(Arc::new(tx)), rx)
}

/// Polls a ledger until a transaction confirms.
pub struct ConfirmationWatcher<L> {
    ledger: Arc<L>,
    config: WatcherConfig,
}

impl<L> Clone for ConfirmationWatcher<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            config: self.config,
        }
    }
}

impl<L: LedgerClient> ConfirmationWatcher<L> {
    /// Create a watcher over `ledger`.
    #[must_use]
    pub fn new(ledger: Arc<L>, config: WatcherConfig) -> Self {
        Self { ledger, config }
    }

    /// The polling budget.
    #[must_use]
    pub const fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Wait using the configured budget with no cancellation.
    pub async fn await_confirmation(&self, tx_ref: &TxRef) -> Result<ConfirmedInfo, WatchError> {
        self.await_confirmation_with(
            tx_ref,
            self.config.max_attempts,
            self.config.poll_interval(),
            None,
        )
        .await
    }

    /// Wait using the configured budget, stopping early on `cancel`.
    pub async fn await_cancellable(
        &self,
        tx_ref: &TxRef,
        cancel: CancelToken,
    ) -> Result<ConfirmedInfo, WatchError> {
        self.await_confirmation_with(
            tx_ref,
            self.config.max_attempts,
            self.config.poll_interval(),
            Some(cancel),
        )
        .await
    }

    /// Poll at most `max_attempts` times, `interval` apart.
    ///
    /// Confirmed means a positive confirmation height. A non-empty pool error
    /// ends the wait immediately with [`WatchError::Rejected`]. There is no
    /// sleep after the final attempt.
    pub async fn await_confirmation_with(
        &self,
        tx_ref: &TxRef,
        max_attempts: u32,
        interval: Duration,
        mut cancel: Option<CancelToken>,
    ) -> Result<ConfirmedInfo, WatchError> {
        let mut attempts = 0;

        while attempts < max_attempts {
            if cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
                return Err(WatchError::Cancelled {
                    tx_ref: tx_ref.clone(),
                    attempts,
                });
            }

            attempts += 1;
            match self.ledger.get_pending_info(tx_ref).await {
                Ok(info) => {
                    if let Some(reason) = info.rejection() {
                        warn!(tx_ref = %tx_ref, reason, "transaction rejected by pool");
                        return Err(WatchError::Rejected {
                            tx_ref: tx_ref.clone(),
                            reason: reason.to_string(),
                        });
                    }
                    if info.is_confirmed() {
                        info!(
                            tx_ref = %tx_ref,
                            height = info.confirmed_height,
                            attempts,
                            "transaction confirmed"
                        );
                        return Ok(ConfirmedInfo {
                            tx_ref: tx_ref.clone(),
                            confirmed_height: info.confirmed_height,
                            attempts,
                        });
                    }
                    debug!(tx_ref = %tx_ref, attempt = attempts, "transaction still pending");
                }
                Err(e) => {
                    debug!(tx_ref = %tx_ref, attempt = attempts, error = %e, "pending lookup failed");
                }
            }

            if attempts < max_attempts && sleep_or_cancel(interval, cancel.as_mut()).await {
                return Err(WatchError::Cancelled {
                    tx_ref: tx_ref.clone(),
                    attempts,
                });
            }
        }

        warn!(tx_ref = %tx_ref, attempts, "confirmation timed out");
        Err(WatchError::Timeout {
            tx_ref: tx_ref.clone(),
            attempts,
        })
    }
}

/// Sleep for `interval`; returns `true` if cancelled first.
async fn sleep_or_cancel(interval: Duration, cancel: Option<&mut CancelToken>) -> bool {
    let deadline = Instant::now() + interval;
    let Some(rx) = cancel else {
        tokio::time::sleep_until(deadline).await;
        return false;
    };

    loop {
        tokio::select! {
            () = tokio::time::sleep_until(deadline) => return false,
            changed = rx.changed() => {
                if changed.is_err() {
                    // Sender gone: nobody can cancel any more.
                    tokio::time::sleep_until(deadline).await;
                    return false;
                }
                if *rx.borrow() {
                    return true;
                }
            }
        }
    }
}
