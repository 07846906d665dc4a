//! Fee split and fund release.
//!
//! Settling a verified session moves the escrowed amount out in two parts:
//! the website share to the website owner and the platform fee to the
//! platform address.
//!
//! # Precision Guarantees
//!
//! - **No floating-point**: the fee is `floor(amount × fee_bps / 10_000)` in
//!   integer arithmetic with a `u128` intermediate
//! - **Conservation**: `website_share + platform_fee == amount` for every input
//! - **Website-friendly rounding**: the fractional remainder of the fee stays
//!   with the website
//!
//! # Atomicity
//!
//! When the ledger supports atomic groups both transfers are submitted as one
//! group. Otherwise they go out one after the other; if the fee transfer fails
//! after the website was paid, the engine submits a compensating reversal and
//! reports [`SettlementError::PartialFailure`] so the session can be flagged
//! for manual reconciliation.

use std::sync::Arc;

use agentweb_core::amount::BPS_DENOMINATOR;
use agentweb_core::{Address, Amount, AssetId};
use agentweb_ledger::{LedgerClient, Transfer, TxRef};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SettlementError;

/// Platform fee and website share of one payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    /// Amount released to the website owner.
    pub website_share: Amount,
    /// Amount kept by the platform.
    pub platform_fee: Amount,
}

/// Splits `amount` into website share and platform fee.
///
/// Fee rates above 100% are clamped to 100%.
///
/// # Examples
/// ```
/// use agentweb_core::Amount;
/// use agentweb_escrow::settlement::split_fee;
///
/// let split = split_fee(Amount::from_micro(5000), 100);
/// assert_eq!(split.platform_fee, Amount::from_micro(50));
/// assert_eq!(split.website_share, Amount::from_micro(4950));
/// ```
#[must_use]
pub const fn split_fee(amount: Amount, fee_bps: u32) -> FeeSplit {
    let bps = if fee_bps as u64 > BPS_DENOMINATOR {
        BPS_DENOMINATOR as u32
    } else {
        fee_bps
    };
    let platform_fee = amount.basis_points(bps);
    FeeSplit {
        website_share: amount.saturating_sub(platform_fee),
        platform_fee,
    }
}

/// Input for one settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRequest {
    /// Amount held in escrow.
    pub amount: Amount,
    /// Payment asset.
    pub asset: AssetId,
    /// Escrow address the funds leave from.
    pub escrow: Address,
    /// Website owner address.
    pub website: Address,
    /// Platform fee address.
    pub platform: Address,
    /// Platform fee in basis points.
    pub fee_bps: u32,
}

/// Outcome of a successful settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    /// Atomic group reference, or the website transfer when sequential.
    pub tx_ref: TxRef,
    /// Separate fee transfer on the sequential path.
    pub fee_tx: Option<TxRef>,
    /// Amounts moved.
    pub split: FeeSplit,
    /// Whether both transfers went out as one atomic group.
    pub atomic: bool,
}

impl SettlementReceipt {
    /// Reference reported to callers.
    #[must_use]
    pub const fn primary(&self) -> &TxRef {
        &self.tx_ref
    }

    /// Every transaction reference produced by the settlement.
    #[must_use]
    pub fn tx_refs(&self) -> Vec<&TxRef> {
        std::iter::once(&self.tx_ref).chain(self.fee_tx.as_ref()).collect()
    }
}

/// Issues settlement transfers through a ledger client.
pub struct SettlementEngine<L> {
    ledger: Arc<L>,
    minimum_payment: Amount,
}

impl<L: LedgerClient> SettlementEngine<L> {
    /// Create an engine enforcing `minimum_payment`.
    #[must_use]
    pub fn new(ledger: Arc<L>, minimum_payment: Amount) -> Self {
        Self {
            ledger,
            minimum_payment,
        }
    }

    /// The configured minimum payment.
    #[must_use]
    pub const fn minimum_payment(&self) -> Amount {
        self.minimum_payment
    }

    /// Settle one payment.
    ///
    /// Validation runs before any ledger call. Ledger failures before the
    /// website is paid surface as [`SettlementError::Ledger`] with nothing
    /// moved.
    pub async fn settle(
        &self,
        request: &SettlementRequest,
    ) -> Result<SettlementReceipt, SettlementError> {
        if u64::from(request.fee_bps) > BPS_DENOMINATOR {
            return Err(SettlementError::InvalidFee {
                bps: request.fee_bps,
            });
        }
        if request.amount < self.minimum_payment {
            return Err(SettlementError::PaymentTooSmall {
                amount: request.amount,
                minimum: self.minimum_payment,
            });
        }

        let params = self.ledger.suggested_params().await?;
        debug!(
            first_valid = params.first_valid,
            last_valid = params.last_valid,
            fee = %params.fee,
            "settlement params"
        );

        let split = split_fee(request.amount, request.fee_bps);
        let website = Transfer::new(
            request.escrow.clone(),
            request.website.clone(),
            split.website_share,
            request.asset,
        );
        let fee = (!split.platform_fee.is_zero()).then(|| {
            Transfer::new(
                request.escrow.clone(),
                request.platform.clone(),
                split.platform_fee,
                request.asset,
            )
        });

        if self.ledger.supports_atomic_groups() {
            let group: Vec<Transfer> = std::iter::once(website).chain(fee).collect();
            let tx_ref = self.ledger.submit_atomic_group(&group).await?;
            info!(
                tx_ref = %tx_ref,
                website_share = %split.website_share,
                platform_fee = %split.platform_fee,
                "settled atomically"
            );
            return Ok(SettlementReceipt {
                tx_ref,
                fee_tx: None,
                split,
                atomic: true,
            });
        }

        let website_tx = self.ledger.submit_transfer(&website).await?;
        let Some(fee) = fee else {
            info!(tx_ref = %website_tx, website_share = %split.website_share, "settled without fee");
            return Ok(SettlementReceipt {
                tx_ref: website_tx,
                fee_tx: None,
                split,
                atomic: false,
            });
        };

        match self.ledger.submit_transfer(&fee).await {
            Ok(fee_tx) => {
                info!(
                    tx_ref = %website_tx,
                    fee_tx = %fee_tx,
                    website_share = %split.website_share,
                    platform_fee = %split.platform_fee,
                    "settled sequentially"
                );
                Ok(SettlementReceipt {
                    tx_ref: website_tx,
                    fee_tx: Some(fee_tx),
                    split,
                    atomic: false,
                })
            }
            Err(fee_err) => {
                warn!(website_tx = %website_tx, error = %fee_err, "fee transfer failed, reversing website share");
                let reversal = match self.ledger.submit_transfer(&website.reversed()).await {
                    Ok(tx) => Some(tx),
                    Err(e) => {
                        warn!(website_tx = %website_tx, error = %e, "reversal failed");
                        None
                    }
                };
                Err(SettlementError::PartialFailure {
                    website_tx,
                    reason: fee_err.to_string(),
                    reversal,
                })
            }
        }
    }
}

impl<L> Clone for SettlementEngine<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            minimum_payment: self.minimum_payment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentweb_core::Keypair;
    use agentweb_ledger::SimulatedLedger;
    use proptest::prelude::*;
    use test_case::test_case;

    const ASSET: AssetId = AssetId::new(31_566_704);

    struct Fixture {
        ledger: Arc<SimulatedLedger>,
        engine: SettlementEngine<SimulatedLedger>,
        request: SettlementRequest,
    }

    fn fixture(ledger: SimulatedLedger, amount: u64) -> Fixture {
        let ledger = Arc::new(ledger);
        let request = SettlementRequest {
            amount: Amount::from_micro(amount),
            asset: ASSET,
            escrow: Keypair::generate().address(),
            website: Keypair::generate().address(),
            platform: Keypair::generate().address(),
            fee_bps: 100,
        };
        ledger.fund(&request.escrow, ASSET, request.amount).unwrap();
        Fixture {
            engine: SettlementEngine::new(Arc::clone(&ledger), Amount::from_micro(1000)),
            ledger,
            request,
        }
    }

    #[test_case(5000, 100, 50, 4950 ; "one percent")]
    #[test_case(1000, 100, 10, 990 ; "minimum payment")]
    #[test_case(1099, 100, 10, 1089 ; "fee rounds down")]
    #[test_case(5000, 0, 0, 5000 ; "no fee")]
    #[test_case(5000, 10_000, 5000, 0 ; "full fee")]
    #[test_case(5000, 20_000, 5000, 0 ; "fee clamped")]
    fn split(amount: u64, bps: u32, fee: u64, share: u64) {
        let split = split_fee(Amount::from_micro(amount), bps);
        assert_eq!(split.platform_fee, Amount::from_micro(fee));
        assert_eq!(split.website_share, Amount::from_micro(share));
    }

    #[tokio::test]
    async fn atomic_settlement_moves_both_shares() {
        let f = fixture(SimulatedLedger::testnet(), 5000);

        let receipt = f.engine.settle(&f.request).await.unwrap();

        assert!(receipt.atomic);
        assert_eq!(receipt.tx_refs().len(), 1);
        assert_eq!(f.ledger.balance_of(&f.request.website, ASSET), Amount::from_micro(4950));
        assert_eq!(f.ledger.balance_of(&f.request.platform, ASSET), Amount::from_micro(50));
        assert_eq!(f.ledger.balance_of(&f.request.escrow, ASSET), Amount::ZERO);
    }

    #[tokio::test]
    async fn sequential_settlement_without_atomic_groups() {
        let f = fixture(SimulatedLedger::testnet().with_atomic_groups(false), 5000);

        let receipt = f.engine.settle(&f.request).await.unwrap();

        assert!(!receipt.atomic);
        assert!(receipt.fee_tx.is_some());
        assert_eq!(f.ledger.balance_of(&f.request.website, ASSET), Amount::from_micro(4950));
        assert_eq!(f.ledger.balance_of(&f.request.platform, ASSET), Amount::from_micro(50));
    }

    #[tokio::test]
    async fn payment_too_small_moves_nothing() {
        let f = fixture(SimulatedLedger::testnet(), 500);

        let result = f.engine.settle(&f.request).await;

        assert!(matches!(result, Err(SettlementError::PaymentTooSmall { .. })));
        assert_eq!(f.ledger.transfers_applied(), 0);
    }

    #[tokio::test]
    async fn invalid_fee_rejected_before_ledger() {
        let mut f = fixture(SimulatedLedger::testnet(), 5000);
        f.request.fee_bps = 10_001;

        let result = f.engine.settle(&f.request).await;
        assert!(matches!(result, Err(SettlementError::InvalidFee { bps: 10_001 })));
        assert_eq!(f.ledger.transfers_applied(), 0);
    }

    #[tokio::test]
    async fn atomic_failure_moves_nothing() {
        let f = fixture(SimulatedLedger::testnet(), 5000);
        f.ledger.fail_transfers_to(&f.request.platform);

        let result = f.engine.settle(&f.request).await;

        assert!(matches!(result, Err(SettlementError::Ledger(_))));
        assert_eq!(f.ledger.balance_of(&f.request.escrow, ASSET), Amount::from_micro(5000));
        assert_eq!(f.ledger.balance_of(&f.request.website, ASSET), Amount::ZERO);
    }

    #[tokio::test]
    async fn fee_failure_triggers_reversal() {
        let f = fixture(SimulatedLedger::testnet().with_atomic_groups(false), 5000);
        f.ledger.fail_transfers_to(&f.request.platform);

        let result = f.engine.settle(&f.request).await;

        let Err(SettlementError::PartialFailure { reversal, .. }) = result else {
            panic!("expected partial failure, got {result:?}");
        };
        assert!(reversal.is_some());
        assert_eq!(f.ledger.balance_of(&f.request.escrow, ASSET), Amount::from_micro(5000));
        assert_eq!(f.ledger.balance_of(&f.request.website, ASSET), Amount::ZERO);
    }

    #[tokio::test]
    async fn website_failure_on_sequential_path_is_plain_ledger_error() {
        let f = fixture(SimulatedLedger::testnet().with_atomic_groups(false), 5000);
        f.ledger.fail_transfers_to(&f.request.website);

        let result = f.engine.settle(&f.request).await;
        assert!(matches!(result, Err(SettlementError::Ledger(_))));
        assert_eq!(f.ledger.transfers_applied(), 0);
    }

    #[tokio::test]
    async fn zero_fee_skips_fee_transfer() {
        let mut f = fixture(SimulatedLedger::testnet().with_atomic_groups(false), 5000);
        f.request.fee_bps = 0;

        let receipt = f.engine.settle(&f.request).await.unwrap();
        assert!(receipt.fee_tx.is_none());
        assert_eq!(f.ledger.transfers_applied(), 1);
    }

    proptest! {
        #[test]
        fn split_conserves_amount(amount in any::<u64>(), bps in 0u32..=10_000) {
            let split = split_fee(Amount::from_micro(amount), bps);
            prop_assert_eq!(
                split.website_share.as_micro() + split.platform_fee.as_micro(),
                amount
            );
            let expected = (u128::from(amount) * u128::from(bps) / 10_000) as u64;
            prop_assert_eq!(split.platform_fee.as_micro(), expected);
        }
    }
}
