//! Identity and reputation registry.
//!
//! Holds every registered agent and website. Reputation changes are
//! admin-gated and clamped to `[0, 1000]` under the write lock, so concurrent
//! updates to the same subject never lose an increment. Websites are kept in
//! registration order so discovery pages are stable.

use std::collections::HashMap;

use agentweb_core::{Address, Amount, ReputationScore};
use agentweb_ledger::{ConfirmationWatcher, ConfirmedInfo, LedgerClient, TxRef};
use chrono::Utc;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::agent::{Agent, AgentRegistration};
use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result, Subject};
use crate::verifier::DomainOwnershipVerifier;
use crate::website::{derive_alias, normalize_domain, Website, WebsiteRegistration};

#[derive(Debug, Default)]
struct RegistryState {
    agents: HashMap<String, Agent>,
    websites: Vec<Website>,
    website_index: HashMap<String, usize>,
}

impl RegistryState {
    fn website_mut(&mut self, domain: &str) -> Result<&mut Website> {
        let idx = *self
            .website_index
            .get(domain)
            .ok_or_else(|| RegistryError::website_not_found(domain))?;
        Ok(&mut self.websites[idx])
    }
}

/// Registry of agents and websites.
pub struct Registry<V> {
    config: RegistryConfig,
    verifier: V,
    state: RwLock<RegistryState>,
}

impl<V: DomainOwnershipVerifier> Registry<V> {
    /// Create an empty registry.
    #[must_use]
    pub fn new(config: RegistryConfig, verifier: V) -> Self {
        Self {
            config,
            verifier,
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Registry configuration.
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// The ownership verifier.
    #[must_use]
    pub const fn verifier(&self) -> &V {
        &self.verifier
    }

    /// Register an agent after checking its signature.
    pub fn register_agent(&self, registration: AgentRegistration) -> Result<Agent> {
        registration.validate()?;

        let mut state = self.state.write();
        if state.agents.contains_key(&registration.agent_id) {
            return Err(RegistryError::AlreadyRegistered(Subject::Agent(
                registration.agent_id,
            )));
        }

        let agent = Agent {
            id: registration.agent_id,
            public_key: registration.public_key,
            signature: registration.signature,
            reputation: self.config.initial_reputation,
            capabilities: registration.capabilities,
            active: true,
            registered_at: Utc::now(),
        };
        state.agents.insert(agent.id.clone(), agent.clone());

        info!(agent_id = %agent.id, public_key = %agent.public_key, "agent registered");
        Ok(agent)
    }

    /// Register a website once its owner proves control of the domain.
    ///
    /// Nothing is stored when verification fails.
    pub async fn register_website(&self, registration: WebsiteRegistration) -> Result<Website> {
        let domain = normalize_domain(&registration.domain)?;
        if self.state.read().website_index.contains_key(&domain) {
            return Err(RegistryError::AlreadyRegistered(Subject::Website(domain)));
        }

        if !self.verifier.verify(&domain, &registration.proof_token).await {
            warn!(domain = %domain, "ownership verification failed");
            return Err(RegistryError::OwnershipVerificationFailed { domain });
        }

        let website = Website {
            alias: derive_alias(&domain, &self.config.alias_suffix),
            owner: registration.owner,
            reputation: self.config.initial_reputation,
            declared_avg_payment: registration
                .avg_payment
                .unwrap_or(self.config.default_avg_payment),
            total_earned: Amount::ZERO,
            payment_count: 0,
            category: registration
                .category
                .unwrap_or_else(|| self.config.default_category.clone()),
            verified: true,
            registration_tx: None,
            registered_at: Utc::now(),
            domain,
        };

        let mut state = self.state.write();
        // Re-check: another registration may have won while we were verifying.
        if state.website_index.contains_key(&website.domain) {
            return Err(RegistryError::AlreadyRegistered(Subject::Website(
                website.domain,
            )));
        }
        let idx = state.websites.len();
        state.website_index.insert(website.domain.clone(), idx);
        state.websites.push(website.clone());

        info!(
            domain = %website.domain,
            alias = %website.alias,
            owner = %website.owner,
            category = %website.category,
            "website registered"
        );
        Ok(website)
    }

    /// Adjust a reputation by `delta`, clamped to `[0, 1000]`. Admin only.
    pub fn update_reputation(
        &self,
        caller: &Address,
        subject: &Subject,
        delta: i64,
    ) -> Result<ReputationScore> {
        if !self.config.is_admin(caller) {
            warn!(caller = %caller, subject = %subject, "unauthorized reputation update");
            return Err(RegistryError::Unauthorized {
                caller: caller.clone(),
            });
        }

        let mut state = self.state.write();
        let score = match subject {
            Subject::Agent(id) => {
                let agent = state
                    .agents
                    .get_mut(id)
                    .ok_or_else(|| RegistryError::agent_not_found(id.as_str()))?;
                agent.reputation = agent.reputation.adjusted(delta);
                agent.reputation
            }
            Subject::Website(domain) => {
                let website = state.website_mut(&normalize_domain(domain)?)?;
                website.reputation = website.reputation.adjusted(delta);
                website.reputation
            }
        };

        info!(subject = %subject, delta, reputation = %score, "reputation updated");
        Ok(score)
    }

    /// A page of websites in registration order.
    ///
    /// Negative `limit` or `offset` count as zero; an offset past the end
    /// yields an empty page.
    #[must_use]
    pub fn discover(&self, category: Option<&str>, limit: i64, offset: i64) -> Vec<Website> {
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);

        self.state
            .read()
            .websites
            .iter()
            .filter(|w| w.verified)
            .filter(|w| category.is_none_or(|c| w.category.eq_ignore_ascii_case(c)))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Look up an agent.
    pub fn agent(&self, agent_id: &str) -> Result<Agent> {
        self.state
            .read()
            .agents
            .get(agent_id)
            .cloned()
            .ok_or_else(|| RegistryError::agent_not_found(agent_id))
    }

    /// Look up an agent that may open sessions.
    pub fn active_agent(&self, agent_id: &str) -> Result<Agent> {
        let agent = self.agent(agent_id)?;
        if !agent.active {
            return Err(RegistryError::Inactive {
                agent_id: agent.id,
            });
        }
        Ok(agent)
    }

    /// Look up a website. The domain is normalized first.
    pub fn website(&self, domain: &str) -> Result<Website> {
        let domain = normalize_domain(domain)?;
        let state = self.state.read();
        state
            .website_index
            .get(&domain)
            .map(|&idx| state.websites[idx].clone())
            .ok_or_else(|| RegistryError::website_not_found(domain))
    }

    /// Number of registered agents.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.state.read().agents.len()
    }

    /// Number of registered websites.
    #[must_use]
    pub fn website_count(&self) -> usize {
        self.state.read().websites.len()
    }

    /// Mark an agent inactive. Idempotent.
    pub fn deactivate_agent(&self, agent_id: &str) -> Result<Agent> {
        let mut state = self.state.write();
        let agent = state
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| RegistryError::agent_not_found(agent_id))?;
        if agent.active {
            agent.active = false;
            info!(agent_id, "agent deactivated");
        }
        Ok(agent.clone())
    }

    /// Add a settled payment to a website's earnings.
    pub fn record_payment(&self, domain: &str, amount: Amount) -> Result<Website> {
        let domain = normalize_domain(domain)?;
        let mut state = self.state.write();
        let website = state.website_mut(&domain)?;
        website.record_payment(amount);
        Ok(website.clone())
    }

    /// Wait for the transaction anchoring a website's registration and store it.
    pub async fn confirm_website_registration<L: LedgerClient>(
        &self,
        domain: &str,
        tx_ref: TxRef,
        watcher: &ConfirmationWatcher<L>,
    ) -> Result<ConfirmedInfo> {
        let domain = normalize_domain(domain)?;
        if !self.state.read().website_index.contains_key(&domain) {
            return Err(RegistryError::website_not_found(domain));
        }

        let confirmed = watcher
            .await_confirmation(&tx_ref)
            .await
            .map_err(|source| RegistryError::Confirmation {
                domain: domain.clone(),
                source,
            })?;

        let mut state = self.state.write();
        state.website_mut(&domain)?.registration_tx = Some(tx_ref);
        info!(
            domain = %domain,
            tx_ref = %confirmed.tx_ref,
            height = confirmed.confirmed_height,
            "website registration anchored"
        );
        Ok(confirmed)
    }
}
