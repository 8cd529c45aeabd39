//! MiningCoordinator - the proof-to-wallet pipeline.
//!
//! Orchestrates validation, reward calculation, capped minting and the
//! reward credit, and exposes aggregate statistics.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use proofs::{ActivityClaim, Multipliers, Proof, ProofValidator, RewardCalculator};

use crate::config::MintConfig;
use crate::retry::RetryPolicy;
use crate::settlement::{SettlementDispatcher, SettlementEvent, SettlementSink};
use crate::store::{LedgerStore, MemoryLedgerStore};
use crate::supply::{SupplyLedger, SupplyState};
use crate::types::{
    ConservationReport, EconomicIndicators, GlobalMiningStats, LedgerAlert, MintError,
    MiningResult, MiningStats, Result, TransferRecord, WalletTransaction,
};
use crate::wallet::WalletLedger;

/// Reward credits considered by [`MiningCoordinator::get_mining_stats`].
const STATS_WINDOW: usize = 10;

/// Orchestrates proofs, supply and wallets.
pub struct MiningCoordinator {
    /// Configuration
    config: MintConfig,
    /// Claim validator and issuer
    validator: ProofValidator,
    /// Reward lookup
    calculator: RewardCalculator,
    /// Supply ledger
    supply: SupplyLedger,
    /// Wallet ledger
    wallets: WalletLedger,
    /// Optional settlement hand-off
    settlement: Option<SettlementDispatcher>,
}

impl MiningCoordinator {
    /// Create a coordinator with default configuration and in-memory state.
    pub fn new() -> Result<Self> {
        Self::with_config(MintConfig::default())
    }

    /// Create with custom configuration and in-memory state.
    pub fn with_config(config: MintConfig) -> Result<Self> {
        config.validate()?;
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedgerStore::new(
            SupplyState::new(config.supply.max_supply, config.supply.initial_minting_rate),
            config.wallet.supported_currencies.clone(),
        ));
        Self::with_store(config, store)
    }

    /// Create over an existing ledger store.
    pub fn with_store(config: MintConfig, store: Arc<dyn LedgerStore>) -> Result<Self> {
        config.validate()?;

        let validator = match &config.proofs.issuer_key {
            Some(key) => ProofValidator::from_hex(key)?,
            None => ProofValidator::generate(),
        };
        let calculator = RewardCalculator::with_bounds(
            config.rewards.multiplier_min,
            config.rewards.multiplier_max,
        )?;
        let retry = RetryPolicy::from(&config.retry);

        let supply = SupplyLedger::new(
            Arc::clone(&store),
            config.supply.clone(),
            config.rate.clone(),
            retry,
        );
        let wallets = WalletLedger::new(store, config.wallet.clone(), retry);

        info!(
            max_supply = config.supply.max_supply,
            reward_currency = %config.wallet.reward_currency,
            "MiningCoordinator initialized"
        );

        Ok(Self {
            config,
            validator,
            calculator,
            supply,
            wallets,
            settlement: None,
        })
    }

    /// Forward finalized mints and transfers to a settlement sink.
    ///
    /// Spawns the dispatch worker, so must be called within a Tokio runtime.
    pub fn with_settlement(mut self, sink: Arc<dyn SettlementSink>) -> Self {
        self.settlement = Some(SettlementDispatcher::spawn(
            sink,
            self.config.settlement.queue_capacity,
        ));
        self
    }

    pub fn config(&self) -> &MintConfig {
        &self.config
    }

    /// The validator issuing proofs for this coordinator.
    pub fn validator(&self) -> &ProofValidator {
        &self.validator
    }

    pub fn supply(&self) -> &SupplyLedger {
        &self.supply
    }

    pub fn wallets(&self) -> &WalletLedger {
        &self.wallets
    }

    /// Receive operational alerts.
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<LedgerAlert> {
        self.supply.subscribe_alerts()
    }

    /// Mine a claim with default multipliers.
    pub async fn mine(&self, user_id: &str, activity: &ActivityClaim) -> Result<MiningResult> {
        self.mine_with(user_id, activity, &Multipliers::default()).await
    }

    /// Mine a claim with multipliers from the gamification system.
    pub async fn mine_with(
        &self,
        user_id: &str,
        activity: &ActivityClaim,
        multipliers: &Multipliers,
    ) -> Result<MiningResult> {
        let proof = self.validator.validate(activity)?;
        self.redeem(user_id, proof, multipliers).await
    }

    /// Mint the reward for an already-issued proof.
    ///
    /// The proof must carry this coordinator's issuer signature and belong
    /// to `user_id`. Each activity can be redeemed once.
    pub async fn redeem(
        &self,
        user_id: &str,
        proof: Proof,
        multipliers: &Multipliers,
    ) -> Result<MiningResult> {
        if !proof.verified {
            return Err(MintError::InvalidProof(format!(
                "proof for activity {} is not verified",
                proof.activity_id
            )));
        }
        self.validator.authenticate(&proof)?;
        if proof.student_id != user_id {
            return Err(MintError::InvalidProof(format!(
                "activity {} was claimed by another student",
                proof.activity_id
            )));
        }

        let mut reward = self.calculator.calculate_reward(&proof, multipliers);
        if self.config.rewards.throttle_by_minting_rate {
            let rate = self.supply.state().await?.minting_rate;
            reward = (reward as f64 * rate).floor() as u64;
        }
        if reward == 0 {
            return Err(MintError::InvalidAmount(format!(
                "activity {} earns no reward",
                proof.activity_id
            )));
        }

        let currency = &self.config.wallet.reward_currency;
        let receipt = self
            .supply
            .mint(user_id, reward, &proof, currency)
            .await?;
        let new_balance = receipt
            .balance
            .ok_or_else(|| MintError::StoreError("mint committed without credit".to_string()))?;

        debug!(
            user_id = %user_id,
            activity_id = %proof.activity_id,
            activity_type = %proof.activity_type,
            reward,
            new_balance,
            "Activity mined"
        );

        self.settle(SettlementEvent::Mint(receipt.transaction.clone()));

        Ok(MiningResult {
            reward,
            proof,
            transaction: receipt.transaction,
            new_balance,
        })
    }

    /// Move tokens between two users, all-or-nothing.
    pub async fn transfer(
        &self,
        from_user_id: &str,
        to_user_id: &str,
        currency: &str,
        amount: u64,
    ) -> Result<TransferRecord> {
        let record = self
            .wallets
            .transfer(from_user_id, to_user_id, currency, amount)
            .await?;
        self.settle(SettlementEvent::Transfer(record.clone()));
        Ok(record)
    }

    /// Up to `limit` wallet entries, newest first.
    pub async fn get_history(&self, user_id: &str, limit: usize) -> Result<Vec<WalletTransaction>> {
        self.wallets.get_history(user_id, limit).await
    }

    /// Apply one step of the minting-rate feedback loop.
    pub async fn adjust_minting_rate(&self, indicators: EconomicIndicators) -> Result<f64> {
        self.supply.adjust_minting_rate(indicators).await
    }

    pub async fn get_mining_stats(&self, user_id: &str) -> Result<MiningStats> {
        let currency = &self.config.wallet.reward_currency;
        let balance = self.wallets.balance(user_id, currency).await?;
        let recent_rewards = self
            .wallets
            .recent_rewards(user_id, currency, STATS_WINDOW)
            .await?;
        let minting_rate = self.supply.state().await?.minting_rate;
        let average_reward = if recent_rewards.is_empty() {
            0.0
        } else {
            recent_rewards.iter().map(|tx| tx.amount as f64).sum::<f64>() / recent_rewards.len() as f64
        };

        Ok(MiningStats {
            user_id: user_id.to_string(),
            balance,
            recent_rewards,
            average_reward,
            minting_rate,
        })
    }

    pub async fn get_global_mining_stats(&self) -> Result<GlobalMiningStats> {
        let state = self.supply.state().await?;
        Ok(GlobalMiningStats {
            total_supply: state.total_supply,
            max_supply: state.max_supply,
            minting_rate: state.minting_rate,
            inflation: state.inflation(),
        })
    }

    /// Compare issued supply with reward-currency balances.
    pub async fn audit_conservation(&self) -> Result<ConservationReport> {
        self.supply
            .audit(&self.config.wallet.reward_currency)
            .await
    }

    fn settle(&self, event: SettlementEvent) {
        if let Some(settlement) = &self.settlement {
            settlement.dispatch(event);
        }
    }
}
