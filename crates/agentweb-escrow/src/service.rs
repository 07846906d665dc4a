//! Escrow session lifecycle.
//!
//! [`EscrowService`] owns every payment session. Each operation takes the
//! session's async lock, so transitions on one session are serialized while
//! different sessions proceed independently. Ledger failures move the
//! session to `FAILED` and are returned with the session id; nothing here
//! retries a ledger call.

use std::collections::HashMap;
use std::sync::Arc;

use agentweb_core::Amount;
use agentweb_ledger::{
    cancel_pair, CancelHandle, ConfirmationWatcher, LedgerClient, TxRef, WatchError,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::EscrowConfig;
use crate::error::{EscrowError, Result, SettlementError};
use crate::session::{NewSession, PaymentSession, SessionId, SessionState};
use crate::settlement::{SettlementEngine, SettlementRequest};
use crate::store::{InMemorySessionStore, SessionStore};

/// Payment session state machine over a ledger and a session store.
pub struct EscrowService<L, S = InMemorySessionStore> {
    ledger: Arc<L>,
    store: Arc<S>,
    settlement: SettlementEngine<L>,
    watcher: ConfirmationWatcher<L>,
    config: EscrowConfig,
    locks: Mutex<HashMap<SessionId, Arc<tokio::sync::Mutex<()>>>>,
    watches: Mutex<HashMap<SessionId, Vec<CancelHandle>>>,
}

impl<L: LedgerClient> EscrowService<L> {
    /// Create a service with an in-memory session store.
    #[must_use]
    pub fn new(ledger: Arc<L>, config: EscrowConfig) -> Self {
        Self::with_store(ledger, Arc::new(InMemorySessionStore::new()), config)
    }
}

impl<L: LedgerClient, S: SessionStore> EscrowService<L, S> {
    /// Create a service over an existing session store.
    #[must_use]
    pub fn with_store(ledger: Arc<L>, store: Arc<S>, config: EscrowConfig) -> Self {
        Self {
            settlement: SettlementEngine::new(Arc::clone(&ledger), config.min_payment),
            watcher: ConfirmationWatcher::new(Arc::clone(&ledger), config.confirmation),
            ledger,
            store,
            config,
            locks: Mutex::new(HashMap::new()),
            watches: Mutex::new(HashMap::new()),
        }
    }

    /// Service configuration.
    #[must_use]
    pub const fn config(&self) -> &EscrowConfig {
        &self.config
    }

    /// The underlying ledger.
    #[must_use]
    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    /// Look up a session.
    pub fn session(&self, id: &SessionId) -> Result<PaymentSession> {
        self.store.get(id).ok_or_else(|| EscrowError::not_found(id))
    }

    /// All sessions, oldest first.
    #[must_use]
    pub fn sessions(&self) -> Vec<PaymentSession> {
        self.store.list()
    }

    /// Sessions flagged for manual reconciliation.
    #[must_use]
    pub fn needing_reconciliation(&self) -> Vec<PaymentSession> {
        self.store
            .list()
            .into_iter()
            .filter(|s| s.needs_reconciliation)
            .collect()
    }

    /// The async lock serializing transitions on `id`.
    ///
    /// Only open sessions get a shared entry. Unknown and terminal sessions
    /// can no longer change, so they get a private lock and leave the map
    /// untouched. The store is read under the map lock so a concurrent
    /// [`release`](Self::release) cannot be undone.
    fn session_lock(&self, id: &SessionId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        if let Some(lock) = locks.get(id) {
            return Arc::clone(lock);
        }
        match self.store.get(id) {
            Some(session) if !session.state.is_terminal() => {
                Arc::clone(locks.entry(id.clone()).or_default())
            }
            _ => Arc::default(),
        }
    }

    fn release(&self, id: &SessionId) {
        self.locks.lock().remove(id);
        for handle in self.watches.lock().remove(id).unwrap_or_default() {
            handle.cancel();
        }
    }

    fn watch(&self, id: &SessionId, handle: CancelHandle) {
        self.watches.lock().entry(id.clone()).or_default().push(handle);
    }

    fn unwatch(&self, id: &SessionId, handle: &CancelHandle) {
        let mut watches = self.watches.lock();
        if let Some(handles) = watches.get_mut(id) {
            handles.retain(|h| !h.same_as(handle));
            if handles.is_empty() {
                watches.remove(id);
            }
        }
    }

    fn transition(session: &mut PaymentSession, target: SessionState) -> Result<()> {
        session
            .transition_to(target)
            .map_err(|from| EscrowError::InvalidTransition {
                session_id: session.id.clone(),
                from,
                to: target,
            })
    }

    /// Persist `session` as failed with `reason`.
    fn fail(&self, mut session: PaymentSession, reason: String) {
        if session.fail(reason) {
            warn!(
                session_id = %session.id,
                reason = session.failure_reason.as_deref().unwrap_or_default(),
                "session failed"
            );
            let id = session.id.clone();
            self.store.put(session);
            self.release(&id);
        }
    }

    /// Open a session and allocate its escrow destination.
    ///
    /// A zero amount, or one below the settlement minimum, is rejected
    /// before the ledger is touched.
    pub async fn create(&self, request: NewSession) -> Result<PaymentSession> {
        if request.amount.is_zero() {
            return Err(EscrowError::InvalidAmount {
                amount: request.amount,
            });
        }

        let id = SessionId::new();
        if request.amount < self.config.min_payment {
            return Err(EscrowError::PaymentTooSmall {
                session_id: id,
                amount: request.amount,
                minimum: self.config.min_payment,
            });
        }

        let handle = self
            .ledger
            .create_escrow_destination()
            .await
            .map_err(|e| EscrowError::ledger(&id, e))?;

        let session = PaymentSession::with_id(id, request, handle.address, Utc::now());
        self.store.put(session.clone());

        info!(
            session_id = %session.id,
            agent_id = %session.agent_id,
            website = %session.website_domain,
            amount = %session.amount,
            asset = %session.asset,
            escrow = %session.escrow,
            "session created"
        );
        Ok(session)
    }

    /// Record the agent's funding transaction.
    pub async fn mark_submitted(&self, id: &SessionId, tx_ref: TxRef) -> Result<PaymentSession> {
        let lock = self.session_lock(id);
        let _guard = lock.lock().await;

        let mut outcome = Ok(());
        let session = self
            .store
            .update(id, |s| match s.transition_to(SessionState::AwaitingConfirmation) {
                Ok(()) => s.tx_ref = Some(tx_ref),
                Err(from) => outcome = Err(from),
            })
            .ok_or_else(|| EscrowError::not_found(id))?;

        outcome.map_err(|from| EscrowError::InvalidTransition {
            session_id: id.clone(),
            from,
            to: SessionState::AwaitingConfirmation,
        })?;

        info!(
            session_id = %id,
            tx_ref = session.tx_ref.as_ref().map(ToString::to_string).unwrap_or_default(),
            "funding submitted"
        );
        Ok(session)
    }

    /// Check the escrow balance after the funding transaction is final.
    ///
    /// Returns `true` once the session is verified. A short escrow fails the
    /// session for good.
    pub async fn verify(&self, id: &SessionId) -> Result<bool> {
        let lock = self.session_lock(id);
        let _guard = lock.lock().await;

        let mut session = self.session(id)?;
        match session.state {
            SessionState::Verified | SessionState::Settled => return Ok(true),
            SessionState::AwaitingConfirmation => {}
            from => {
                return Err(EscrowError::InvalidTransition {
                    session_id: id.clone(),
                    from,
                    to: SessionState::Verified,
                });
            }
        }

        let balance = match self.ledger.get_balance(&session.escrow, session.asset).await {
            Ok(balance) => balance,
            Err(e) => {
                self.fail(session, format!("balance lookup failed: {e}"));
                return Err(EscrowError::ledger(id, e));
            }
        };

        if balance < session.amount {
            let need = session.amount;
            self.fail(
                session,
                format!("escrow holds {balance}, expected {need}"),
            );
            return Err(EscrowError::InsufficientEscrowBalance {
                session_id: id.clone(),
                have: balance,
                need,
            });
        }

        Self::transition(&mut session, SessionState::Verified)?;
        self.store.put(session);
        info!(session_id = %id, balance = %balance, "escrow verified");
        Ok(true)
    }

    /// Release escrowed funds to the website and the platform.
    ///
    /// A session that is already settled returns its stored reference
    /// without touching the ledger.
    pub async fn settle(&self, id: &SessionId) -> Result<TxRef> {
        let lock = self.session_lock(id);
        let _guard = lock.lock().await;

        let mut session = self.session(id)?;
        if let Some(tx_ref) = session.settlement_tx() {
            info!(session_id = %id, tx_ref = %tx_ref, "session already settled");
            return Ok(tx_ref.clone());
        }
        if session.state != SessionState::Verified {
            return Err(EscrowError::InvalidTransition {
                session_id: id.clone(),
                from: session.state,
                to: SessionState::Settled,
            });
        }

        let request = SettlementRequest {
            amount: session.amount,
            asset: session.asset,
            escrow: session.escrow.clone(),
            website: session.website_address.clone(),
            platform: self.config.platform_address.clone(),
            fee_bps: self.config.fee_basis_points,
        };

        match self.settlement.settle(&request).await {
            Ok(receipt) => {
                let tx_ref = receipt.primary().clone();
                Self::transition(&mut session, SessionState::Settled)?;
                session.settlement = Some(receipt);
                self.store.put(session);
                self.release(id);
                info!(session_id = %id, tx_ref = %tx_ref, "session settled");
                Ok(tx_ref)
            }
            Err(SettlementError::PaymentTooSmall { amount, minimum }) => {
                Err(EscrowError::PaymentTooSmall {
                    session_id: id.clone(),
                    amount,
                    minimum,
                })
            }
            Err(SettlementError::InvalidFee { bps }) => Err(EscrowError::Config(format!(
                "fee_basis_points {bps} exceeds 10000"
            ))),
            Err(SettlementError::Ledger(e)) => {
                self.fail(session, format!("settlement failed: {e}"));
                Err(EscrowError::ledger(id, e))
            }
            Err(SettlementError::PartialFailure {
                website_tx,
                reason,
                reversal,
            }) => {
                error!(
                    session_id = %id,
                    website_tx = %website_tx,
                    reversal = reversal.as_ref().map(ToString::to_string).unwrap_or_default(),
                    reason = %reason,
                    "settlement partially failed, manual reconciliation required"
                );
                session.needs_reconciliation = true;
                self.fail(session, format!("partial settlement: {reason}"));
                Err(EscrowError::SettlementPartialFailure {
                    session_id: id.clone(),
                    website_tx,
                    reason,
                })
            }
        }
    }

    /// Expire the session if it is still open and past its TTL.
    ///
    /// Returns the session's resulting state. Calling it again is a no-op.
    pub async fn expire(&self, id: &SessionId) -> Result<SessionState> {
        self.expire_at(id, Utc::now()).await
    }

    /// [`expire`](Self::expire) against an explicit clock.
    pub async fn expire_at(&self, id: &SessionId, now: DateTime<Utc>) -> Result<SessionState> {
        let lock = self.session_lock(id);
        let _guard = lock.lock().await;

        let mut session = self.session(id)?;
        if !session.is_stale(self.config.session_ttl(), now) {
            return Ok(session.state);
        }

        let from = session.state;
        Self::transition(&mut session, SessionState::Expired)?;
        self.store.put(session);
        self.release(id);
        info!(session_id = %id, from = %from, "session expired");
        Ok(SessionState::Expired)
    }

    /// Expire every stale session. Returns the ids that expired.
    pub async fn sweep_expired(&self) -> Vec<SessionId> {
        self.sweep_expired_at(Utc::now()).await
    }

    /// [`sweep_expired`](Self::sweep_expired) against an explicit clock.
    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> Vec<SessionId> {
        let ttl = self.config.session_ttl();
        let mut expired = Vec::new();

        for session in self.store.list().into_iter().filter(|s| s.is_stale(ttl, now)) {
            match self.expire_at(&session.id, now).await {
                Ok(SessionState::Expired) => expired.push(session.id),
                Ok(_) => {}
                Err(e) => warn!(session_id = %session.id, error = %e, "expiry failed"),
            }
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "expired stale sessions");
        }
        expired
    }

    /// Wait for the funding transaction to confirm, then verify the escrow.
    ///
    /// The wait is cancelled if the session expires meanwhile. Timeouts and
    /// pool rejections fail the session.
    pub async fn confirm_and_verify(&self, id: &SessionId) -> Result<bool> {
        let session = self.session(id)?;
        let tx_ref = match (&session.state, &session.tx_ref) {
            (SessionState::AwaitingConfirmation, Some(tx_ref)) => tx_ref.clone(),
            (from, _) => {
                return Err(EscrowError::InvalidTransition {
                    session_id: id.clone(),
                    from: *from,
                    to: SessionState::Verified,
                });
            }
        };

        let (handle, token) = cancel_pair();
        self.watch(id, handle.clone());
        // An expiry between the state read and the registration above found
        // no handle to cancel.
        if self.session(id)?.state.is_terminal() {
            handle.cancel();
        }
        let outcome = self.watcher.await_cancellable(&tx_ref, token).await;
        self.unwatch(id, &handle);

        match outcome {
            Ok(_) => self.verify(id).await,
            Err(e @ WatchError::Cancelled { .. }) => Err(EscrowError::from_watch(id, e)),
            Err(e) => {
                let lock = self.session_lock(id);
                let _guard = lock.lock().await;
                let session = self.session(id)?;
                self.fail(session, e.to_string());
                Err(EscrowError::from_watch(id, e))
            }
        }
    }

    /// Run [`confirm_and_verify`](Self::confirm_and_verify) on its own task.
    pub fn spawn_confirmation(self: &Arc<Self>, id: SessionId) -> JoinHandle<Result<bool>> {
        let service = Arc::clone(self);
        tokio::spawn(async move { service.confirm_and_verify(&id).await })
    }

    /// Total amount held by sessions that are funded but not yet settled.
    #[must_use]
    pub fn outstanding(&self) -> Amount {
        self.store
            .list()
            .iter()
            .filter(|s| {
                matches!(
                    s.state,
                    SessionState::AwaitingConfirmation | SessionState::Verified
                )
            })
            .fold(Amount::ZERO, |acc, s| acc.saturating_add(s.amount))
    }
}
