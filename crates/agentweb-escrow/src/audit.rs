//! Append-only record of served queries and settled payments.

use std::collections::BTreeMap;

use agentweb_core::{Amount, AssetId, ContentClass};
use agentweb_ledger::TxRef;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::session::{PaymentSession, SessionId};

/// One query an agent made against a website.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInteraction {
    /// Querying agent.
    pub agent_id: String,
    /// Website queried.
    pub website_domain: String,
    /// Classification of the query.
    pub query_class: ContentClass,
    /// Amount charged for the query.
    pub amount: Amount,
    /// Whether the website returned a result.
    pub success: bool,
    /// Session that paid for the query, if any.
    pub session_id: Option<SessionId>,
    /// When the interaction was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// One settled payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Settled session.
    pub session_id: SessionId,
    /// Paying agent.
    pub agent_id: String,
    /// Paid website.
    pub website_domain: String,
    /// Gross amount.
    pub amount: Amount,
    /// Payment asset.
    pub asset: AssetId,
    /// Settlement transaction.
    pub tx_ref: TxRef,
    /// When it settled.
    pub settled_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Build a record from a settled session. `None` if it is not settled.
    #[must_use]
    pub fn from_session(session: &PaymentSession) -> Option<Self> {
        let tx_ref = session.settlement_tx()?.clone();
        Some(Self {
            session_id: session.id.clone(),
            agent_id: session.agent_id.clone(),
            website_domain: session.website_domain.clone(),
            amount: session.amount,
            asset: session.asset,
            tx_ref,
            settled_at: session.completed_at.unwrap_or_else(Utc::now),
        })
    }
}

/// Per-website aggregates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteAnalytics {
    /// Settled payments.
    pub total_payments: u64,
    /// Sum of settled amounts across assets.
    pub total_revenue: Amount,
    /// Revenue split by asset.
    pub revenue_by_asset: BTreeMap<AssetId, Amount>,
    /// Interactions that returned a result.
    pub successful_interactions: u64,
    /// Interactions that did not.
    pub failed_interactions: u64,
}

#[derive(Debug, Default)]
struct LogInner {
    interactions: Vec<AgentInteraction>,
    payments: Vec<PaymentRecord>,
}

/// Append-only interaction and payment log.
#[derive(Debug, Default)]
pub struct InteractionLog {
    inner: RwLock<LogInner>,
}

impl InteractionLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interaction.
    pub fn record(&self, interaction: AgentInteraction) {
        self.inner.write().interactions.push(interaction);
    }

    /// Append a settled payment.
    pub fn record_payment(&self, payment: PaymentRecord) {
        self.inner.write().payments.push(payment);
    }

    /// Interactions against `domain`, in recording order.
    #[must_use]
    pub fn for_website(&self, domain: &str) -> Vec<AgentInteraction> {
        self.inner
            .read()
            .interactions
            .iter()
            .filter(|i| i.website_domain == domain)
            .cloned()
            .collect()
    }

    /// Interactions made by `agent_id`, in recording order.
    #[must_use]
    pub fn for_agent(&self, agent_id: &str) -> Vec<AgentInteraction> {
        self.inner
            .read()
            .interactions
            .iter()
            .filter(|i| i.agent_id == agent_id)
            .cloned()
            .collect()
    }

    /// Payments received by `domain`.
    #[must_use]
    pub fn payments_for(&self, domain: &str) -> Vec<PaymentRecord> {
        self.inner
            .read()
            .payments
            .iter()
            .filter(|p| p.website_domain == domain)
            .cloned()
            .collect()
    }

    /// Aggregates for `domain`. Unknown domains yield zeros.
    #[must_use]
    pub fn analytics(&self, domain: &str) -> WebsiteAnalytics {
        let inner = self.inner.read();
        let mut out = WebsiteAnalytics::default();

        for payment in inner.payments.iter().filter(|p| p.website_domain == domain) {
            out.total_payments += 1;
            out.total_revenue = out.total_revenue.saturating_add(payment.amount);
            let by_asset = out.revenue_by_asset.entry(payment.asset).or_default();
            *by_asset = by_asset.saturating_add(payment.amount);
        }
        for interaction in inner.interactions.iter().filter(|i| i.website_domain == domain) {
            if interaction.success {
                out.successful_interactions += 1;
            } else {
                out.failed_interactions += 1;
            }
        }
        out
    }
}
