//! Capped issuance and the minting-rate feedback loop.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use proofs::Proof;

use crate::config::{RateConfig, SupplyConfig};
use crate::retry::{retry_on_conflict, RetryPolicy};
use crate::store::{LedgerStore, MintCommit, MintReceipt};
use crate::types::{
    ConservationReport, EconomicIndicators, InflationStats, LedgerAlert, MintError,
    MintTransaction, ProofStatus, Result,
};

/// Process-wide issuance state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyState {
    pub total_supply: u64,
    pub max_supply: u64,
    pub minting_rate: f64,
    /// Bumped on every mutation, for optimistic updates
    pub version: u64,
}

impl SupplyState {
    pub fn new(max_supply: u64, minting_rate: f64) -> Self {
        Self {
            total_supply: 0,
            max_supply,
            minting_rate,
            version: 0,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.max_supply.saturating_sub(self.total_supply)
    }

    /// Total supply after minting `amount`, if the cap allows it.
    pub fn check_mint(&self, amount: u64) -> Result<u64> {
        if amount == 0 {
            return Err(MintError::InvalidAmount("mint amount must be positive".to_string()));
        }
        let would_have = self
            .total_supply
            .checked_add(amount)
            .ok_or(MintError::Overflow)?;
        if would_have > self.max_supply {
            return Err(MintError::SupplyCapExceeded {
                max: self.max_supply,
                would_have,
            });
        }
        Ok(would_have)
    }

    pub fn block_index(&self, block_size: u64) -> u64 {
        self.total_supply.checked_div(block_size).unwrap_or(0)
    }

    pub fn inflation(&self) -> InflationStats {
        let inflation_rate_pct = if self.max_supply == 0 {
            0.0
        } else {
            self.total_supply as f64 / self.max_supply as f64 * 100.0
        };
        InflationStats {
            current_supply: self.total_supply,
            max_supply: self.max_supply,
            remaining_supply: self.remaining(),
            inflation_rate_pct,
            minting_rate: self.minting_rate,
        }
    }
}

/// Next minting rate for the given market signals.
///
/// Always lands in `[config.floor, config.ceiling]`, including for
/// non-finite or negative indicators.
pub fn next_minting_rate(current: f64, indicators: &EconomicIndicators, config: &RateConfig) -> f64 {
    let demand = indicators.demand_index;
    let supply = indicators.supply_index;

    let next = if demand > config.imbalance_threshold * supply {
        current * config.increase_factor
    } else if supply > config.imbalance_threshold * demand {
        current * config.decrease_factor
    } else {
        current
    };

    if next.is_nan() {
        return config.ceiling;
    }
    next.clamp(config.floor, config.ceiling)
}

/// Capped minting over a [`LedgerStore`].
pub struct SupplyLedger {
    store: Arc<dyn LedgerStore>,
    config: SupplyConfig,
    rate: RateConfig,
    retry: RetryPolicy,
    alerts: broadcast::Sender<LedgerAlert>,
}

impl SupplyLedger {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        config: SupplyConfig,
        rate: RateConfig,
        retry: RetryPolicy,
    ) -> Self {
        let (alerts, _) = broadcast::channel(64);
        Self {
            store,
            config,
            rate,
            retry,
            alerts,
        }
    }

    /// Receive operational alerts, such as the cap being hit.
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<LedgerAlert> {
        self.alerts.subscribe()
    }

    /// Issue `amount` against `proof` and credit it to the recipient in
    /// `currency`, in one unit of work.
    ///
    /// Supply never grows without the paired credit.
    pub(crate) async fn mint(
        &self,
        recipient: &str,
        amount: u64,
        proof: &Proof,
        currency: &str,
    ) -> Result<MintReceipt> {
        self.commit(recipient, amount, proof, currency.to_string()).await
    }

    pub async fn state(&self) -> Result<SupplyState> {
        self.store.supply().await
    }

    pub async fn calculate_inflation(&self) -> Result<InflationStats> {
        Ok(self.store.supply().await?.inflation())
    }

    /// Where `proof` sits in its lifecycle.
    pub async fn proof_status(&self, proof: &Proof) -> Result<ProofStatus> {
        if !proof.verified {
            return Ok(ProofStatus::Unvalidated);
        }
        if self.store.is_consumed(&proof.idempotency_key()).await? {
            Ok(ProofStatus::Consumed)
        } else {
            Ok(ProofStatus::Verified)
        }
    }

    /// Consistent comparison of issued supply with balances in `currency`.
    pub async fn audit(&self, currency: &str) -> Result<ConservationReport> {
        self.store.audit(currency).await
    }

    /// Up to `limit` mints, newest first.
    pub async fn recent_mints(&self, limit: usize) -> Result<Vec<MintTransaction>> {
        self.store.mint_log(limit).await
    }

    /// Apply one step of the feedback loop and return the new rate.
    pub async fn adjust_minting_rate(&self, indicators: EconomicIndicators) -> Result<f64> {
        let store = Arc::clone(&self.store);
        let rate_config = self.rate.clone();

        let (previous, next) = retry_on_conflict(self.retry, "adjust_minting_rate", || {
            let store = Arc::clone(&store);
            let rate_config = rate_config.clone();
            async move {
                let state = store.supply().await?;
                let next = next_minting_rate(state.minting_rate, &indicators, &rate_config);
                if store.compare_and_set_rate(state.version, next).await? {
                    Ok((state.minting_rate, next))
                } else {
                    Err(MintError::ConcurrentUpdateConflict { attempts: 1 })
                }
            }
        })
        .await?;

        info!(
            previous,
            next,
            demand_index = indicators.demand_index,
            supply_index = indicators.supply_index,
            velocity_index = indicators.velocity_index,
            "Minting rate adjusted"
        );
        Ok(next)
    }

    async fn commit(
        &self,
        recipient: &str,
        amount: u64,
        proof: &Proof,
        credit_currency: String,
    ) -> Result<MintReceipt> {
        crate::wallet::validate_account(recipient)?;
        if !proof.verified {
            return Err(MintError::InvalidProof(format!(
                "proof for activity {} is not verified",
                proof.activity_id
            )));
        }

        let commit = MintCommit {
            recipient: recipient.to_string(),
            amount,
            proof_hash: proof.content_hash.clone(),
            idempotency_key: proof.idempotency_key(),
            credit_currency: Some(credit_currency),
            block_size: self.config.block_size,
        };
        let store = Arc::clone(&self.store);
        let result = retry_on_conflict(self.retry, "mint", || {
            let store = Arc::clone(&store);
            let commit = commit.clone();
            async move { store.commit_mint(commit).await }
        })
        .await;

        match result {
            Ok(receipt) => {
                info!(
                    mint_id = %receipt.transaction.id,
                    recipient = %recipient,
                    amount,
                    block_index = receipt.transaction.block_index,
                    "Mint committed"
                );
                Ok(receipt)
            }
            Err(MintError::SupplyCapExceeded { max, would_have }) => {
                error!(
                    target: "azora_mint::alerts",
                    recipient = %recipient,
                    amount,
                    max,
                    would_have,
                    "Supply cap exceeded"
                );
                // No subscribers is fine.
                let _ = self.alerts.send(LedgerAlert::SupplyCapExceeded {
                    recipient: recipient.to_string(),
                    max,
                    would_have,
                });
                Err(MintError::SupplyCapExceeded { max, would_have })
            }
            Err(e) => {
                debug!(recipient = %recipient, amount, error = %e, "Mint rejected");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLedgerStore;
    use proofs::{ActivityClaim, ProofValidator};

    fn ledger(max_supply: u64) -> SupplyLedger {
        let store = Arc::new(MemoryLedgerStore::new(
            SupplyState::new(max_supply, 1.0),
            vec!["AZR".to_string()],
        ));
        SupplyLedger::new(
            store,
            SupplyConfig::default(),
            RateConfig::default(),
            RetryPolicy::default(),
        )
    }

    fn proof(id: &str) -> Proof {
        ProofValidator::generate()
            .validate(&ActivityClaim::new(id, "student", "quiz_passed"))
            .unwrap()
    }

    fn indicators(demand: f64, supply: f64) -> EconomicIndicators {
        EconomicIndicators {
            demand_index: demand,
            supply_index: supply,
            velocity_index: 1.0,
        }
    }

    #[tokio::test]
    async fn test_mint_increments_supply() {
        let ledger = ledger(10_000);
        let receipt = ledger.mint("student", 25, &proof("a1"), "AZR").await.unwrap();

        assert_eq!(receipt.transaction.amount, 25);
        assert_eq!(receipt.transaction.block_index, 0);
        assert_eq!(receipt.balance, Some(25));
        assert_eq!(ledger.state().await.unwrap().total_supply, 25);
        assert!(ledger.audit("AZR").await.unwrap().balanced);
    }

    #[tokio::test]
    async fn test_block_index_uses_supply_before_mint() {
        let ledger = ledger(10_000);
        ledger.mint("student", 999, &proof("a1"), "AZR").await.unwrap();
        let second = ledger.mint("student", 1, &proof("a2"), "AZR").await.unwrap();
        let third = ledger.mint("student", 5, &proof("a3"), "AZR").await.unwrap();

        assert_eq!(second.transaction.block_index, 0);
        assert_eq!(third.transaction.block_index, 1);
    }

    #[tokio::test]
    async fn test_mint_rejects_cap_and_signals() {
        let ledger = ledger(30);
        let mut alerts = ledger.subscribe_alerts();
        ledger.mint("student", 25, &proof("a1"), "AZR").await.unwrap();

        let err = ledger.mint("student", 25, &proof("a2"), "AZR").await.unwrap_err();
        assert_eq!(err, MintError::SupplyCapExceeded { max: 30, would_have: 50 });
        assert_eq!(ledger.state().await.unwrap().total_supply, 25);
        assert!(matches!(
            alerts.try_recv(),
            Ok(LedgerAlert::SupplyCapExceeded { would_have: 50, .. })
        ));
    }

    #[tokio::test]
    async fn test_mint_rejects_unverified_and_replayed_proofs() {
        let ledger = ledger(1_000);
        let mut unverified = proof("a1");
        unverified.verified = false;
        assert!(matches!(
            ledger.mint("student", 10, &unverified, "AZR").await,
            Err(MintError::InvalidProof(_))
        ));

        let p = proof("a2");
        assert_eq!(ledger.proof_status(&p).await.unwrap(), ProofStatus::Verified);
        ledger.mint("student", 10, &p, "AZR").await.unwrap();
        assert_eq!(ledger.proof_status(&p).await.unwrap(), ProofStatus::Consumed);
        assert_eq!(
            ledger.proof_status(&unverified).await.unwrap(),
            ProofStatus::Unvalidated
        );
        assert!(matches!(
            ledger.mint("student", 10, &p, "AZR").await,
            Err(MintError::ProofAlreadyConsumed(_))
        ));
        assert_eq!(ledger.state().await.unwrap().total_supply, 10);
    }

    #[tokio::test]
    async fn test_calculate_inflation() {
        let ledger = ledger(1_000);
        ledger.mint("student", 250, &proof("a1"), "AZR").await.unwrap();

        let stats = ledger.calculate_inflation().await.unwrap();
        assert_eq!(stats.current_supply, 250);
        assert_eq!(stats.remaining_supply, 750);
        assert!((stats.inflation_rate_pct - 25.0).abs() < f64::EPSILON);
        assert_eq!(stats.minting_rate, 1.0);
        // Reading twice changes nothing.
        assert_eq!(ledger.calculate_inflation().await.unwrap(), stats);
    }

    #[test]
    fn test_next_minting_rate_rules() {
        let config = RateConfig::default();
        assert!((next_minting_rate(0.8, &indicators(2.0, 1.0), &config) - 0.84).abs() < 1e-9);
        assert!((next_minting_rate(0.8, &indicators(1.0, 2.0), &config) - 0.76).abs() < 1e-9);
        assert_eq!(next_minting_rate(0.8, &indicators(1.1, 1.0), &config), 0.8);
        assert_eq!(next_minting_rate(0.99, &indicators(10.0, 1.0), &config), 1.0);
        assert_eq!(next_minting_rate(0.51, &indicators(1.0, 10.0), &config), 0.5);
    }

    #[test]
    fn test_next_minting_rate_always_bounded() {
        let config = RateConfig::default();
        let extremes = [
            0.0,
            -1.0,
            1e300,
            -1e300,
            f64::NAN,
            f64::INFINITY,
            f64::NEG_INFINITY,
        ];
        for &demand in &extremes {
            for &supply in &extremes {
                for current in [0.5, 0.75, 1.0] {
                    let next = next_minting_rate(current, &indicators(demand, supply), &config);
                    assert!((0.5..=1.0).contains(&next), "{demand} {supply} -> {next}");
                }
            }
        }
    }

    #[tokio::test]
    async fn test_adjust_minting_rate_updates_state() {
        let ledger = ledger(1_000);
        for _ in 0..50 {
            ledger.adjust_minting_rate(indicators(1.0, 5.0)).await.unwrap();
        }
        assert_eq!(ledger.state().await.unwrap().minting_rate, 0.5);

        let rate = ledger.adjust_minting_rate(indicators(5.0, 1.0)).await.unwrap();
        assert!((rate - 0.525).abs() < 1e-9);
    }
}
