//! Protocol facade.
//!
//! [`Protocol`] is the public surface of a node: it prices access, opens and
//! drives escrow sessions, and fronts the registry. Collaborators are built
//! at startup and injected; nothing here is global.

use std::collections::HashSet;
use std::sync::Arc;

use agentweb_core::{Address, Amount, AssetId, PricingPolicy, ReputationScore};
use agentweb_escrow::{
    AgentInteraction, EscrowService, InteractionLog, NewSession, PaymentRecord, PaymentSession,
    SessionId, SessionState, WebsiteAnalytics,
};
use agentweb_ledger::{ConfirmationWatcher, ConfirmedInfo, LedgerClient, TxRef};
use agentweb_registry::{
    Agent, AgentRegistration, DomainOwnershipVerifier, Registry, Subject, Website,
    WebsiteRegistration,
};
use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::NodeConfig;
use crate::error::Result;

/// The AgentWeb protocol over a ledger `L` and ownership verifier `V`.
pub struct Protocol<L, V> {
    pricing: PricingPolicy,
    registry: Arc<Registry<V>>,
    escrow: Arc<EscrowService<L>>,
    log: Arc<InteractionLog>,
    credited: Mutex<HashSet<SessionId>>,
}

impl<L: LedgerClient, V: DomainOwnershipVerifier> Protocol<L, V> {
    /// Build a protocol from already-constructed parts.
    #[must_use]
    pub fn new(
        pricing: PricingPolicy,
        registry: Arc<Registry<V>>,
        escrow: Arc<EscrowService<L>>,
        log: Arc<InteractionLog>,
    ) -> Self {
        Self {
            pricing,
            registry,
            escrow,
            log,
            credited: Mutex::new(HashSet::new()),
        }
    }

    /// Build a protocol from node configuration.
    pub fn from_config(config: &NodeConfig, ledger: Arc<L>, verifier: V) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            config.pricing.clone(),
            Arc::new(Registry::new(config.registry.clone(), verifier)),
            Arc::new(EscrowService::new(ledger, config.escrow.clone())),
            Arc::new(InteractionLog::new()),
        ))
    }

    /// The registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry<V>> {
        &self.registry
    }

    /// The escrow service.
    #[must_use]
    pub fn escrow(&self) -> &Arc<EscrowService<L>> {
        &self.escrow
    }

    /// The interaction log.
    #[must_use]
    pub fn log(&self) -> &Arc<InteractionLog> {
        &self.log
    }

    /// The pricing policy.
    #[must_use]
    pub const fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }

    // ---- pricing ----

    /// Price one access to a registered website.
    pub fn price(&self, domain: &str, content_descriptor: &str) -> Result<Amount> {
        let website = self.registry.website(domain)?;
        Ok(self.pricing.price(&website, content_descriptor))
    }

    // ---- sessions ----

    /// Open a session for a registered, active agent paying a registered website.
    pub async fn create_session(
        &self,
        agent_id: &str,
        domain: &str,
        amount: Amount,
        asset: AssetId,
    ) -> Result<PaymentSession> {
        self.registry.active_agent(agent_id)?;
        let website = self.registry.website(domain)?;

        let session = self
            .escrow
            .create(NewSession {
                agent_id: agent_id.to_string(),
                website_domain: website.domain,
                website_address: website.owner,
                amount,
                asset,
            })
            .await?;
        Ok(session)
    }

    /// Price the content and open a session for that amount.
    pub async fn create_priced_session(
        &self,
        agent_id: &str,
        domain: &str,
        content_descriptor: &str,
        asset: AssetId,
    ) -> Result<PaymentSession> {
        let amount = self.price(domain, content_descriptor)?;
        self.create_session(agent_id, domain, amount, asset).await
    }

    /// Record the agent's funding transaction.
    pub async fn mark_submitted(&self, session_id: &SessionId, tx_ref: TxRef) -> Result<PaymentSession> {
        Ok(self.escrow.mark_submitted(session_id, tx_ref).await?)
    }

    /// Check the escrow balance of a session whose funding is final.
    pub async fn verify(&self, session_id: &SessionId) -> Result<bool> {
        Ok(self.escrow.verify(session_id).await?)
    }

    /// Wait for funding to confirm, then verify.
    pub async fn confirm_and_verify(&self, session_id: &SessionId) -> Result<bool> {
        Ok(self.escrow.confirm_and_verify(session_id).await?)
    }

    /// Run confirmation and verification on a background task.
    pub fn spawn_confirmation(
        &self,
        session_id: SessionId,
    ) -> JoinHandle<agentweb_escrow::Result<bool>> {
        self.escrow.spawn_confirmation(session_id)
    }

    /// Settle a verified session and credit the website's earnings.
    ///
    /// Settling an already settled session returns the stored reference and
    /// credits nothing new.
    pub async fn settle(&self, session_id: &SessionId) -> Result<TxRef> {
        let tx_ref = self.escrow.settle(session_id).await?;
        if !self.credited.lock().insert(session_id.clone()) {
            return Ok(tx_ref);
        }

        let session = self.escrow.session(session_id)?;
        if let Err(e) = self.registry.record_payment(&session.website_domain, session.amount) {
            warn!(session_id = %session_id, error = %e, "could not credit website earnings");
        }
        if let Some(record) = PaymentRecord::from_session(&session) {
            self.log.record_payment(record);
        }
        Ok(tx_ref)
    }

    /// Expire a session past its TTL.
    pub async fn expire(&self, session_id: &SessionId) -> Result<SessionState> {
        Ok(self.escrow.expire(session_id).await?)
    }

    /// Expire every stale session.
    pub async fn sweep_expired(&self) -> Vec<SessionId> {
        self.escrow.sweep_expired().await
    }

    /// Look up a session.
    pub fn session(&self, session_id: &SessionId) -> Result<PaymentSession> {
        Ok(self.escrow.session(session_id)?)
    }

    // ---- registry ----

    /// Register an agent.
    pub fn register_agent(&self, registration: AgentRegistration) -> Result<Agent> {
        Ok(self.registry.register_agent(registration)?)
    }

    /// Register a website after ownership verification.
    pub async fn register_website(&self, registration: WebsiteRegistration) -> Result<Website> {
        Ok(self.registry.register_website(registration).await?)
    }

    /// Adjust a reputation. Admin only.
    pub fn update_reputation(
        &self,
        caller: &Address,
        subject: &Subject,
        delta: i64,
    ) -> Result<ReputationScore> {
        Ok(self.registry.update_reputation(caller, subject, delta)?)
    }

    /// Page through registered websites.
    #[must_use]
    pub fn discover(&self, category: Option<&str>, limit: i64, offset: i64) -> Vec<Website> {
        self.registry.discover(category, limit, offset)
    }

    /// Stop an agent from opening new sessions.
    pub fn deactivate_agent(&self, agent_id: &str) -> Result<Agent> {
        Ok(self.registry.deactivate_agent(agent_id)?)
    }

    /// Wait for a website's registration transaction and anchor it.
    pub async fn confirm_website_registration(
        &self,
        domain: &str,
        tx_ref: TxRef,
    ) -> Result<ConfirmedInfo> {
        let watcher = ConfirmationWatcher::new(
            Arc::clone(self.escrow.ledger()),
            self.escrow.config().confirmation,
        );
        Ok(self
            .registry
            .confirm_website_registration(domain, tx_ref, &watcher)
            .await?)
    }

    // ---- audit ----

    /// Record a served query.
    pub fn record_interaction(
        &self,
        agent_id: &str,
        domain: &str,
        content_descriptor: &str,
        amount: Amount,
        success: bool,
        session_id: Option<SessionId>,
    ) -> Result<()> {
        let website = self.registry.website(domain)?;
        let query_class = self.pricing.classify(content_descriptor);
        self.log.record(AgentInteraction {
            agent_id: agent_id.to_string(),
            website_domain: website.domain,
            query_class,
            amount,
            success,
            session_id,
            recorded_at: Utc::now(),
        });
        info!(agent_id, domain, ?query_class, success, "interaction recorded");
        Ok(())
    }

    /// Payment and interaction aggregates for a website.
    pub fn analytics(&self, domain: &str) -> Result<WebsiteAnalytics> {
        let website = self.registry.website(domain)?;
        Ok(self.log.analytics(&website.domain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentweb_core::{ContentClass, Keypair};
    use agentweb_escrow::EscrowConfig;
    use agentweb_ledger::{SimulatedLedger, Transfer, WatcherConfig};
    use agentweb_registry::{RegistryConfig, StaticOwnershipVerifier};

    const ASSET: AssetId = AssetId::new(31_566_704);

    struct Node {
        ledger: Arc<SimulatedLedger>,
        protocol: Protocol<SimulatedLedger, StaticOwnershipVerifier>,
        agent: Keypair,
        owner: Address,
    }

    async fn node() -> Node {
        let ledger = Arc::new(SimulatedLedger::testnet());
        let agent = Keypair::generate();
        ledger
            .fund(&agent.address(), ASSET, Amount::from_units(1))
            .unwrap();

        let config = NodeConfig {
            escrow: EscrowConfig::default()
                .with_platform_address(Keypair::generate().address())
                .with_confirmation(
                    WatcherConfig::default()
                        .with_max_attempts(3)
                        .with_poll_interval_ms(1),
                ),
            registry: RegistryConfig::default().with_admin(Address::new("ADMIN").unwrap()),
            ..NodeConfig::default()
        };
        let verifier = StaticOwnershipVerifier::new();
        verifier.allow("news.example.com", "tok");
        let protocol = Protocol::from_config(&config, Arc::clone(&ledger), verifier).unwrap();

        protocol
            .register_agent(AgentRegistration::new(
                "agent-1",
                agent.public_key(),
                agent.sign_registration("agent-1"),
            ))
            .unwrap();
        let owner = Keypair::generate().address();
        protocol
            .register_website(
                WebsiteRegistration::new("news.example.com", owner.clone(), "tok")
                    .with_avg_payment(Amount::from_micro(5000)),
            )
            .await
            .unwrap();

        Node {
            ledger,
            protocol,
            agent,
            owner,
        }
    }

    impl Node {
        async fn funded_session(&self, amount: u64) -> SessionId {
            let session = self
                .protocol
                .create_session("agent-1", "news.example.com", Amount::from_micro(amount), ASSET)
                .await
                .unwrap();
            let tx = self
                .ledger
                .submit_transfer(&Transfer::new(
                    self.agent.address(),
                    session.escrow.clone(),
                    Amount::from_micro(amount),
                    ASSET,
                ))
                .await
                .unwrap();
            self.protocol.mark_submitted(&session.id, tx).await.unwrap();
            session.id
        }
    }

    #[tokio::test]
    async fn settle_credits_website_once() {
        let n = node().await;
        let id = n.funded_session(5000).await;

        assert!(n.protocol.confirm_and_verify(&id).await.unwrap());
        let first = n.protocol.settle(&id).await.unwrap();
        let second = n.protocol.settle(&id).await.unwrap();
        assert_eq!(first, second);

        let website = n.protocol.registry().website("news.example.com").unwrap();
        assert_eq!(website.payment_count, 1);
        assert_eq!(website.total_earned, Amount::from_micro(5000));
        assert_eq!(n.ledger.balance_of(&n.owner, ASSET), Amount::from_micro(4950));

        let analytics = n.protocol.analytics("news.example.com").unwrap();
        assert_eq!(analytics.total_payments, 1);
        assert_eq!(analytics.total_revenue, Amount::from_micro(5000));
    }

    #[tokio::test]
    async fn inactive_agent_cannot_open_sessions() {
        let n = node().await;
        n.protocol.deactivate_agent("agent-1").unwrap();

        let err = n
            .protocol
            .create_session("agent-1", "news.example.com", Amount::from_micro(5000), ASSET)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "Inactive");
        assert!(n.protocol.escrow().sessions().is_empty());
    }

    #[tokio::test]
    async fn unknown_website_is_not_found() {
        let n = node().await;
        let err = n
            .protocol
            .create_session("agent-1", "missing.example.com", Amount::from_micro(5000), ASSET)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(n.protocol.price("missing.example.com", "anything").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn priced_session_uses_policy() {
        let n = node().await;
        let expected = n.protocol.price("news.example.com", "full dataset export").unwrap();
        let session = n
            .protocol
            .create_priced_session("agent-1", "news.example.com", "full dataset export", ASSET)
            .await
            .unwrap();
        assert_eq!(session.amount, expected);
        assert!(expected >= n.protocol.pricing().minimum_amount);
    }

    #[tokio::test]
    async fn interactions_are_classified() {
        let n = node().await;
        n.protocol
            .record_interaction(
                "agent-1",
                "News.Example.com",
                "article summary",
                Amount::from_micro(5000),
                true,
                None,
            )
            .unwrap();

        let logged = n.protocol.log().for_agent("agent-1");
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].website_domain, "news.example.com");
        assert_eq!(
            logged[0].query_class,
            n.protocol.pricing().classify("article summary")
        );
        assert_ne!(logged[0].query_class, ContentClass::Premium);

        let analytics = n.protocol.analytics("news.example.com").unwrap();
        assert_eq!(analytics.successful_interactions, 1);
    }

    #[tokio::test]
    async fn reputation_updates_need_admin() {
        let n = node().await;
        let subject = Subject::Website("news.example.com".into());

        let err = n
            .protocol
            .update_reputation(&Address::new("MALLORY").unwrap(), &subject, 50)
            .unwrap_err();
        assert_eq!(err.kind(), "Unauthorized");

        let score = n
            .protocol
            .update_reputation(&Address::new("ADMIN").unwrap(), &subject, 50)
            .unwrap();
        assert_eq!(score.value(), 150);
    }
}
