//! Payment sessions and their state machine.
//!
//! A session models exactly one attempted payment. States only move forward
//! through `Pending -> AwaitingConfirmation -> Verified -> Settled`; `Failed`
//! and `Expired` absorb any non-terminal session. A retry is a new session.

use agentweb_core::{Address, Amount, AssetId};
use agentweb_ledger::TxRef;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::settlement::SettlementReceipt;

/// Unique session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new random session ID.
    #[must_use]
    pub fn new() -> Self {
        Self(format!("session-{}", Uuid::new_v4()))
    }

    /// Create from a string.
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the ID as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a payment session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Created, waiting for the agent's funding transfer.
    Pending,
    /// Funding transfer submitted, waiting for finality.
    AwaitingConfirmation,
    /// Escrow balance checked and sufficient.
    Verified,
    /// Funds released to website and platform.
    Settled,
    /// Terminal failure.
    Failed,
    /// Timed out before completing.
    Expired,
}

impl SessionState {
    /// Position on the happy path. Absorbing states rank above everything.
    const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::AwaitingConfirmation => 1,
            Self::Verified => 2,
            Self::Settled | Self::Failed | Self::Expired => 3,
        }
    }

    /// Checks if a transition to the target state is valid.
    #[must_use]
    pub const fn can_transition_to(&self, target: &Self) -> bool {
        use SessionState::{AwaitingConfirmation, Expired, Failed, Pending, Settled, Verified};

        matches!(
            (self, target),
            (Pending, AwaitingConfirmation)
                | (AwaitingConfirmation, Verified)
                | (Verified, Settled)
                | (Pending | AwaitingConfirmation | Verified, Failed | Expired)
        )
    }

    /// Settled, failed and expired sessions never change again.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled | Self::Failed | Self::Expired)
    }

    /// True if `target` is strictly later in the lifecycle.
    #[must_use]
    pub const fn precedes(&self, target: &Self) -> bool {
        self.rank() < target.rank()
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::AwaitingConfirmation => write!(f, "AWAITING_CONFIRMATION"),
            Self::Verified => write!(f, "VERIFIED"),
            Self::Settled => write!(f, "SETTLED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Everything needed to open a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    /// Paying agent.
    pub agent_id: String,
    /// Website being paid.
    pub website_domain: String,
    /// Website owner address that receives the website share.
    pub website_address: Address,
    /// Requested amount.
    pub amount: Amount,
    /// Asset the payment is made in.
    pub asset: AssetId,
}

/// One attempted payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    /// Session ID.
    pub id: SessionId,
    /// Paying agent.
    pub agent_id: String,
    /// Website being paid.
    pub website_domain: String,
    /// Website owner address.
    pub website_address: Address,
    /// Requested amount.
    pub amount: Amount,
    /// Payment asset.
    pub asset: AssetId,
    /// Escrow destination allocated for this session.
    pub escrow: Address,
    /// Current state.
    pub state: SessionState,
    /// Funding transaction, set on submission.
    pub tx_ref: Option<TxRef>,
    /// Settlement outcome, set once settled.
    pub settlement: Option<SettlementReceipt>,
    /// Set when a partial settlement needs manual attention.
    pub needs_reconciliation: bool,
    /// Why the session failed.
    pub failure_reason: Option<String>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl PaymentSession {
    /// Create a pending session paying into `escrow`.
    #[must_use]
    pub fn new(request: NewSession, escrow: Address) -> Self {
        Self::with_id(SessionId::new(), request, escrow, Utc::now())
    }

    /// Create a pending session with explicit id and creation time.
    #[must_use]
    pub fn with_id(
        id: SessionId,
        request: NewSession,
        escrow: Address,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            agent_id: request.agent_id,
            website_domain: request.website_domain,
            website_address: request.website_address,
            amount: request.amount,
            asset: request.asset,
            escrow,
            state: SessionState::Pending,
            tx_ref: None,
            settlement: None,
            needs_reconciliation: false,
            failure_reason: None,
            created_at,
            completed_at: None,
        }
    }

    /// Move to `target`, stamping the completion time on terminal states.
    ///
    /// Returns the current state when the move is not allowed.
    pub fn transition_to(&mut self, target: SessionState) -> Result<(), SessionState> {
        if !self.state.can_transition_to(&target) {
            return Err(self.state);
        }
        self.state = target;
        if target.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Fail with `reason`. No-op on terminal sessions.
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        if self.transition_to(SessionState::Failed).is_ok() {
            self.failure_reason = Some(reason.into());
            true
        } else {
            false
        }
    }

    /// True if still open and older than `ttl` at `now`.
    #[must_use]
    pub fn is_stale(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        !self.state.is_terminal() && now - self.created_at > ttl
    }

    /// The stored settlement reference, if settled.
    #[must_use]
    pub fn settlement_tx(&self) -> Option<&TxRef> {
        self.settlement.as_ref().map(SettlementReceipt::primary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL: [SessionState; 6] = [
        SessionState::Pending,
        SessionState::AwaitingConfirmation,
        SessionState::Verified,
        SessionState::Settled,
        SessionState::Failed,
        SessionState::Expired,
    ];

    fn session() -> PaymentSession {
        PaymentSession::new(
            NewSession {
                agent_id: "agent-1".into(),
                website_domain: "news.example.com".into(),
                website_address: Address::new("WEBSITE").unwrap(),
                amount: Amount::from_micro(5000),
                asset: AssetId::NATIVE,
            },
            Address::new("ESCROW").unwrap(),
        )
    }

    #[test]
    fn happy_path_transitions() {
        assert!(SessionState::Pending.can_transition_to(&SessionState::AwaitingConfirmation));
        assert!(SessionState::AwaitingConfirmation.can_transition_to(&SessionState::Verified));
        assert!(SessionState::Verified.can_transition_to(&SessionState::Settled));

        assert!(!SessionState::Pending.can_transition_to(&SessionState::Verified));
        assert!(!SessionState::Pending.can_transition_to(&SessionState::Settled));
        assert!(!SessionState::Verified.can_transition_to(&SessionState::AwaitingConfirmation));
    }

    #[test]
    fn failure_reachable_from_every_open_state() {
        for state in ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(state.can_transition_to(&SessionState::Failed));
            assert!(state.can_transition_to(&SessionState::Expired));
        }
    }

    #[test]
    fn terminal_states_are_absorbing() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in &ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn no_self_transitions() {
        for state in &ALL {
            assert!(!state.can_transition_to(state));
        }
    }

    #[test]
    fn new_session_is_pending() {
        let s = session();
        assert_eq!(s.state, SessionState::Pending);
        assert!(s.id.as_str().starts_with("session-"));
        assert!(s.tx_ref.is_none());
        assert!(s.completed_at.is_none());
    }

    #[test]
    fn terminal_transition_stamps_completion() {
        let mut s = session();
        s.transition_to(SessionState::AwaitingConfirmation).unwrap();
        assert!(s.completed_at.is_none());
        assert!(s.fail("boom"));
        assert!(s.completed_at.is_some());
        assert_eq!(s.failure_reason.as_deref(), Some("boom"));
        // A second failure is ignored.
        assert!(!s.fail("again"));
        assert_eq!(s.failure_reason.as_deref(), Some("boom"));
    }

    #[test]
    fn invalid_transition_reports_current_state() {
        let mut s = session();
        assert_eq!(s.transition_to(SessionState::Settled), Err(SessionState::Pending));
    }

    #[test]
    fn staleness_uses_ttl() {
        let s = session();
        let ttl = Duration::seconds(900);
        assert!(!s.is_stale(ttl, s.created_at + Duration::seconds(899)));
        assert!(s.is_stale(ttl, s.created_at + Duration::seconds(901)));
    }

    #[test]
    fn state_serializes_screaming_case() {
        let json = serde_json::to_string(&SessionState::AwaitingConfirmation).unwrap();
        assert_eq!(json, "\"AWAITING_CONFIRMATION\"");
    }

    proptest! {
        #[test]
        fn transitions_never_move_backward(path in proptest::collection::vec(0usize..6, 0..12)) {
            let mut s = session();
            for i in path {
                let before = s.state;
                if s.transition_to(ALL[i]).is_ok() {
                    prop_assert!(before.precedes(&s.state));
                    prop_assert!(!before.is_terminal());
                }
            }
        }
    }
}
