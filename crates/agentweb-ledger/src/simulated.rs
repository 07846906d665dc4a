//! In-process simulated ledger.
//!
//! Keeps balances and submitted transactions in memory and confirms them
//! after a configurable number of pending-info polls. Fault hooks let tests
//! reject submissions, fail transfers to particular recipients, drop atomic
//! group support and inject transient lookup errors.

use std::collections::{HashMap, HashSet};

use agentweb_core::{Address, Amount, AssetId, Keypair};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::client::{LedgerClient, Network};
use crate::error::{LedgerError, Result};
use crate::transaction::{EscrowHandle, PendingInfo, SuggestedParams, Transfer, TxRef};

/// Base fee reported in suggested params.
const SIMULATED_FEE: Amount = Amount::from_micro(1_000);

/// Validity window reported in suggested params.
const VALIDITY_ROUNDS: u64 = 1_000;

/// Simulated transaction record.
#[derive(Debug, Clone)]
struct SimulatedTx {
    transfers: Vec<Transfer>,
    polls_remaining: u32,
    confirmed_height: u64,
    pool_error: Option<String>,
}

/// Mutable simulator state.
#[derive(Debug, Default)]
struct SimulatedState {
    round: u64,
    balances: HashMap<(Address, AssetId), Amount>,
    transactions: HashMap<TxRef, SimulatedTx>,
    failing_recipients: HashSet<Address>,
    reject_next: Option<String>,
    lookup_errors: u32,
    never_confirm: bool,
    transfers_applied: u64,
    lookups: u64,
}

impl SimulatedState {
    fn balance(&self, address: &Address, asset: AssetId) -> Amount {
        self.balances
            .get(&(address.clone(), asset))
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// Checks a batch against current balances without applying it.
    fn check(&self, transfers: &[Transfer]) -> Result<()> {
        let mut debits: HashMap<(Address, AssetId), Amount> = HashMap::new();
        for transfer in transfers {
            if self.failing_recipients.contains(&transfer.to) {
                return Err(LedgerError::transfer_failed(format!(
                    "receiver {} rejected asset {}",
                    transfer.to, transfer.asset
                )));
            }
            let key = (transfer.from.clone(), transfer.asset);
            let debit = debits.entry(key).or_insert(Amount::ZERO);
            *debit = debit.saturating_add(transfer.amount);

            let have = self.balance(&transfer.from, transfer.asset);
            if have < *debit {
                return Err(LedgerError::InsufficientBalance {
                    address: transfer.from.clone(),
                    have,
                    need: *debit,
                });
            }
        }
        Ok(())
    }

    fn apply(&mut self, transfers: &[Transfer]) {
        for transfer in transfers {
            let from = self
                .balances
                .entry((transfer.from.clone(), transfer.asset))
                .or_insert(Amount::ZERO);
            *from = from.saturating_sub(transfer.amount);

            let to = self
                .balances
                .entry((transfer.to.clone(), transfer.asset))
                .or_insert(Amount::ZERO);
            *to = to.saturating_add(transfer.amount);

            self.transfers_applied += 1;
        }
    }

    /// Validates, applies and records a batch as one transaction.
    fn submit(&mut self, transfers: Vec<Transfer>, confirm_after: u32) -> Result<TxRef> {
        let tx_ref = TxRef::generate();

        if let Some(reason) = self.reject_next.take() {
            // Rejected transactions stay in the pool with an error and move nothing.
            self.transactions.insert(
                tx_ref.clone(),
                SimulatedTx {
                    transfers,
                    polls_remaining: 0,
                    confirmed_height: 0,
                    pool_error: Some(reason),
                },
            );
            return Ok(tx_ref);
        }

        self.check(&transfers)?;
        self.apply(&transfers);
        self.transactions.insert(
            tx_ref.clone(),
            SimulatedTx {
                transfers,
                polls_remaining: confirm_after,
                confirmed_height: 0,
                pool_error: None,
            },
        );
        Ok(tx_ref)
    }
}

/// Simulated ledger backend.
pub struct SimulatedLedger {
    network: Network,
    confirm_after_polls: u32,
    atomic_groups: bool,
    state: Mutex<SimulatedState>,
}

impl SimulatedLedger {
    /// Create a simulator for `network` that confirms on the first poll.
    #[must_use]
    pub fn new(network: Network) -> Self {
        Self {
            network,
            confirm_after_polls: 1,
            atomic_groups: true,
            state: Mutex::new(SimulatedState {
                round: 1,
                ..SimulatedState::default()
            }),
        }
    }

    /// Create a testnet simulator.
    #[must_use]
    pub fn testnet() -> Self {
        Self::new(Network::Testnet)
    }

    /// Confirm transactions only after `polls` pending-info lookups.
    #[must_use]
    pub fn with_confirm_after_polls(mut self, polls: u32) -> Self {
        self.confirm_after_polls = polls.max(1);
        self
    }

    /// Enable or disable native atomic groups.
    #[must_use]
    pub fn with_atomic_groups(mut self, enabled: bool) -> Self {
        self.atomic_groups = enabled;
        self
    }

    /// The simulated network.
    #[must_use]
    pub fn network(&self) -> Network {
        self.network
    }

    /// Credit `address` out of thin air (test networks only).
    ///
    /// # Errors
    ///
    /// Returns error on mainnet.
    pub fn fund(&self, address: &Address, asset: AssetId, amount: Amount) -> Result<()> {
        if self.network == Network::Mainnet {
            return Err(LedgerError::unsupported("funding on mainnet"));
        }
        let mut state = self.state.lock();
        let balance = state
            .balances
            .entry((address.clone(), asset))
            .or_insert(Amount::ZERO);
        *balance = balance.saturating_add(amount);

        info!(address = %address, asset = %asset, amount = %amount, "account funded");
        Ok(())
    }

    /// Current balance without going through the async interface.
    #[must_use]
    pub fn balance_of(&self, address: &Address, asset: AssetId) -> Amount {
        self.state.lock().balance(address, asset)
    }

    /// Make every transfer credited to `address` fail.
    pub fn fail_transfers_to(&self, address: &Address) {
        self.state.lock().failing_recipients.insert(address.clone());
    }

    /// Stop failing transfers credited to `address`.
    pub fn clear_failures(&self, address: &Address) {
        self.state.lock().failing_recipients.remove(address);
    }

    /// The next submitted transaction is dropped from the pool with `reason`.
    pub fn reject_next_submission(&self, reason: impl Into<String>) {
        self.state.lock().reject_next = Some(reason.into());
    }

    /// The next `count` pending-info lookups fail with a network error.
    pub fn inject_lookup_errors(&self, count: u32) {
        self.state.lock().lookup_errors = count;
    }

    /// Keep every transaction pending forever.
    pub fn never_confirm(&self) {
        self.state.lock().never_confirm = true;
    }

    /// Number of individual transfers applied so far.
    #[must_use]
    pub fn transfers_applied(&self) -> u64 {
        self.state.lock().transfers_applied
    }

    /// Number of pending-info lookups served (including failed ones).
    #[must_use]
    pub fn pending_lookups(&self) -> u64 {
        self.state.lock().lookups
    }

    /// Transfers recorded under `tx_ref`.
    #[must_use]
    pub fn transfers_of(&self, tx_ref: &TxRef) -> Option<Vec<Transfer>> {
        self.state
            .lock()
            .transactions
            .get(tx_ref)
            .map(|tx| tx.transfers.clone())
    }
}

impl LedgerClient for SimulatedLedger {
    async fn create_escrow_destination(&self) -> Result<EscrowHandle> {
        let address = Keypair::generate().address();
        debug!(address = %address, "escrow destination allocated");
        Ok(EscrowHandle { address })
    }

    async fn get_balance(&self, address: &Address, asset: AssetId) -> Result<Amount> {
        Ok(self.balance_of(address, asset))
    }

    async fn submit_transfer(&self, transfer: &Transfer) -> Result<TxRef> {
        let tx_ref = self
            .state
            .lock()
            .submit(vec![transfer.clone()], self.confirm_after_polls)?;

        debug!(
            tx_ref = %tx_ref,
            from = %transfer.from,
            to = %transfer.to,
            amount = %transfer.amount,
            "transfer submitted"
        );
        Ok(tx_ref)
    }

    async fn submit_atomic_group(&self, transfers: &[Transfer]) -> Result<TxRef> {
        if !self.atomic_groups {
            return Err(LedgerError::unsupported("atomic transfer groups"));
        }
        let tx_ref = self
            .state
            .lock()
            .submit(transfers.to_vec(), self.confirm_after_polls)?;

        debug!(tx_ref = %tx_ref, size = transfers.len(), "atomic group submitted");
        Ok(tx_ref)
    }

    async fn get_pending_info(&self, tx_ref: &TxRef) -> Result<PendingInfo> {
        let mut state = self.state.lock();
        state.lookups += 1;

        if state.lookup_errors > 0 {
            state.lookup_errors -= 1;
            return Err(LedgerError::network("node temporarily unavailable"));
        }

        let never_confirm = state.never_confirm;
        let round = state.round;
        let tx = state
            .transactions
            .get_mut(tx_ref)
            .ok_or_else(|| LedgerError::TransactionNotFound {
                tx_ref: tx_ref.clone(),
            })?;

        if let Some(reason) = &tx.pool_error {
            return Ok(PendingInfo::rejected(reason.clone()));
        }
        if tx.confirmed_height > 0 {
            return Ok(PendingInfo::confirmed(tx.confirmed_height));
        }
        if never_confirm {
            return Ok(PendingInfo::pending());
        }

        tx.polls_remaining = tx.polls_remaining.saturating_sub(1);
        if tx.polls_remaining == 0 {
            tx.confirmed_height = round;
            let height = tx.confirmed_height;
            state.round += 1;
            return Ok(PendingInfo::confirmed(height));
        }
        Ok(PendingInfo::pending())
    }

    async fn suggested_params(&self) -> Result<SuggestedParams> {
        let round = self.state.lock().round;
        Ok(SuggestedParams {
            fee: SIMULATED_FEE,
            first_valid: round,
            last_valid: round + VALIDITY_ROUNDS,
            genesis_id: self.network.genesis_id().to_string(),
        })
    }

    fn supports_atomic_groups(&self) -> bool {
        self.atomic_groups
    }
}

#[allow(clippy::missing_fields_in_debug)]
impl std::fmt::Debug for SimulatedLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedLedger")
            .field("network", &self.network)
            .field("atomic_groups", &self.atomic_groups)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASSET: AssetId = AssetId::new(10_458_941);

    fn funded(amount: u64) -> (SimulatedLedger, Address) {
        let ledger = SimulatedLedger::testnet();
        let agent = Keypair::generate().address();
        ledger.fund(&agent, ASSET, Amount::from_micro(amount)).unwrap();
        (ledger, agent)
    }

    #[tokio::test]
    async fn transfer_moves_balance() {
        let (ledger, agent) = funded(10_000);
        let escrow = ledger.create_escrow_destination().await.unwrap().address;

        ledger
            .submit_transfer(&Transfer::new(agent.clone(), escrow.clone(), Amount::from_micro(4_000), ASSET))
            .await
            .unwrap();

        assert_eq!(ledger.balance_of(&agent, ASSET), Amount::from_micro(6_000));
        assert_eq!(ledger.get_balance(&escrow, ASSET).await.unwrap(), Amount::from_micro(4_000));
    }

    #[tokio::test]
    async fn transfer_insufficient_funds() {
        let (ledger, agent) = funded(100);
        let to = Keypair::generate().address();

        let result = ledger
            .submit_transfer(&Transfer::new(agent, to, Amount::from_micro(200), ASSET))
            .await;
        assert!(matches!(result, Err(LedgerError::InsufficientBalance { .. })));
        assert_eq!(ledger.transfers_applied(), 0);
    }

    #[tokio::test]
    async fn atomic_group_is_all_or_nothing() {
        let (ledger, escrow) = funded(5_000);
        let website = Keypair::generate().address();
        let platform = Keypair::generate().address();
        ledger.fail_transfers_to(&platform);

        let group = [
            Transfer::new(escrow.clone(), website.clone(), Amount::from_micro(4_950), ASSET),
            Transfer::new(escrow.clone(), platform, Amount::from_micro(50), ASSET),
        ];
        assert!(ledger.submit_atomic_group(&group).await.is_err());
        assert_eq!(ledger.balance_of(&website, ASSET), Amount::ZERO);
        assert_eq!(ledger.balance_of(&escrow, ASSET), Amount::from_micro(5_000));
    }

    #[tokio::test]
    async fn atomic_group_checks_cumulative_debits() {
        let (ledger, escrow) = funded(100);
        let a = Keypair::generate().address();
        let group = [
            Transfer::new(escrow.clone(), a.clone(), Amount::from_micro(60), ASSET),
            Transfer::new(escrow.clone(), a, Amount::from_micro(60), ASSET),
        ];
        assert!(matches!(
            ledger.submit_atomic_group(&group).await,
            Err(LedgerError::InsufficientBalance { .. })
        ));
    }

    #[tokio::test]
    async fn atomic_groups_can_be_disabled() {
        let ledger = SimulatedLedger::testnet().with_atomic_groups(false);
        assert!(!ledger.supports_atomic_groups());
        assert!(matches!(
            ledger.submit_atomic_group(&[]).await,
            Err(LedgerError::Unsupported { .. })
        ));
    }

    #[tokio::test]
    async fn confirms_after_configured_polls() {
        let ledger = SimulatedLedger::testnet().with_confirm_after_polls(3);
        let agent = Keypair::generate().address();
        ledger.fund(&agent, ASSET, Amount::from_micro(10)).unwrap();
        let tx = ledger
            .submit_transfer(&Transfer::new(agent.clone(), agent, Amount::from_micro(1), ASSET))
            .await
            .unwrap();

        assert!(!ledger.get_pending_info(&tx).await.unwrap().is_confirmed());
        assert!(!ledger.get_pending_info(&tx).await.unwrap().is_confirmed());
        let info = ledger.get_pending_info(&tx).await.unwrap();
        assert!(info.is_confirmed());
        // Stays confirmed at the same height.
        assert_eq!(ledger.get_pending_info(&tx).await.unwrap(), info);
    }

    #[tokio::test]
    async fn rejected_submission_reports_pool_error_and_moves_nothing() {
        let (ledger, agent) = funded(1_000);
        let to = Keypair::generate().address();
        ledger.reject_next_submission("overspend");

        let tx = ledger
            .submit_transfer(&Transfer::new(agent.clone(), to.clone(), Amount::from_micro(500), ASSET))
            .await
            .unwrap();

        let info = ledger.get_pending_info(&tx).await.unwrap();
        assert_eq!(info.rejection(), Some("overspend"));
        assert_eq!(ledger.balance_of(&to, ASSET), Amount::ZERO);
    }

    #[tokio::test]
    async fn injected_lookup_errors_are_consumed() {
        let (ledger, agent) = funded(10);
        let tx = ledger
            .submit_transfer(&Transfer::new(agent.clone(), agent, Amount::from_micro(1), ASSET))
            .await
            .unwrap();
        ledger.inject_lookup_errors(2);

        assert!(ledger.get_pending_info(&tx).await.is_err());
        assert!(ledger.get_pending_info(&tx).await.is_err());
        assert!(ledger.get_pending_info(&tx).await.unwrap().is_confirmed());
        assert_eq!(ledger.pending_lookups(), 3);
    }

    #[tokio::test]
    async fn unknown_tx_is_not_found() {
        let ledger = SimulatedLedger::testnet();
        let result = ledger.get_pending_info(&TxRef::from_string("NOPE")).await;
        assert!(matches!(result, Err(LedgerError::TransactionNotFound { .. })));
    }

    #[test]
    fn funding_mainnet_fails() {
        let ledger = SimulatedLedger::new(Network::Mainnet);
        let addr = Keypair::generate().address();
        assert!(ledger.fund(&addr, ASSET, Amount::from_micro(1)).is_err());
    }

    #[tokio::test]
    async fn suggested_params_track_network() {
        let ledger = SimulatedLedger::new(Network::Localnet);
        let params = ledger.suggested_params().await.unwrap();
        assert_eq!(params.genesis_id, "sandnet-v1");
        assert!(params.last_valid > params.first_valid);
    }
}
