//! Per-user, per-currency balances with an append-only entry log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::WalletConfig;
use crate::retry::{retry_on_conflict, RetryPolicy};
use crate::store::{LedgerStore, TransferCommit, WalletEntry};
use crate::types::{Direction, EntrySource, MintError, Result, TransferRecord, WalletTransaction};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// A user's wallet.
///
/// Balances are unsigned, so a negative balance is unrepresentable; every
/// mutation goes through [`Wallet::credit`] or [`Wallet::debit`], which check
/// before they write and append exactly one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Wallet {
    pub user_id: String,
    pub address: String,
    pub balances: BTreeMap<String, u64>,
    /// Oldest first
    pub transactions: Vec<WalletTransaction>,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// Create an empty wallet holding a zero balance in each currency.
    pub fn new(user_id: impl Into<String>, currencies: &[String]) -> Self {
        let user_id = user_id.into();
        Self {
            address: derive_address(&user_id),
            user_id,
            balances: currencies.iter().map(|c| (c.clone(), 0)).collect(),
            transactions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Balance in `currency`, zero if unsupported.
    pub fn balance(&self, currency: &str) -> u64 {
        self.balances.get(currency).copied().unwrap_or(0)
    }

    /// Check a credit would succeed without applying it.
    pub fn ensure_can_credit(&self, currency: &str, amount: u64) -> Result<()> {
        let current = self.current(currency, amount)?;
        current.checked_add(amount).ok_or(MintError::Overflow)?;
        Ok(())
    }

    /// Check a debit would succeed without applying it.
    pub fn ensure_can_debit(&self, currency: &str, amount: u64) -> Result<()> {
        let current = self.current(currency, amount)?;
        if current < amount {
            return Err(MintError::InsufficientBalance {
                have: current,
                need: amount,
            });
        }
        Ok(())
    }

    pub fn credit(
        &mut self,
        currency: &str,
        amount: u64,
        source: EntrySource,
    ) -> Result<WalletTransaction> {
        self.ensure_can_credit(currency, amount)?;
        self.apply(Direction::Credit, currency, amount, source)
    }

    pub fn debit(
        &mut self,
        currency: &str,
        amount: u64,
        source: EntrySource,
    ) -> Result<WalletTransaction> {
        self.ensure_can_debit(currency, amount)?;
        self.apply(Direction::Debit, currency, amount, source)
    }

    /// Up to `limit` entries, newest first.
    pub fn history(&self, limit: usize) -> Vec<WalletTransaction> {
        self.transactions.iter().rev().take(limit).cloned().collect()
    }

    /// Up to `limit` mining rewards in `currency`, newest first.
    pub fn recent_rewards(&self, currency: &str, limit: usize) -> Vec<WalletTransaction> {
        self.transactions
            .iter()
            .rev()
            .filter(|tx| tx.is_reward_in(currency))
            .take(limit)
            .cloned()
            .collect()
    }

    fn current(&self, currency: &str, amount: u64) -> Result<u64> {
        if amount == 0 {
            return Err(MintError::InvalidAmount("amount must be positive".to_string()));
        }
        self.balances
            .get(currency)
            .copied()
            .ok_or_else(|| MintError::UnsupportedCurrency(currency.to_string()))
    }

    // Callers have already run the matching `ensure_can_*` check.
    fn apply(
        &mut self,
        direction: Direction,
        currency: &str,
        amount: u64,
        source: EntrySource,
    ) -> Result<WalletTransaction> {
        let balance = self
            .balances
            .get_mut(currency)
            .ok_or_else(|| MintError::UnsupportedCurrency(currency.to_string()))?;
        *balance = match direction {
            Direction::Credit => balance.checked_add(amount).ok_or(MintError::Overflow)?,
            Direction::Debit => balance.checked_sub(amount).ok_or(MintError::InsufficientBalance {
                have: *balance,
                need: amount,
            })?,
        };

        let entry = WalletTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            direction,
            currency: currency.to_string(),
            amount,
            timestamp: Utc::now(),
            source,
        };
        self.transactions.push(entry.clone());
        Ok(entry)
    }
}

/// Deterministic display address for a user.
fn derive_address(user_id: &str) -> String {
    let digest = Sha256::digest(user_id.as_bytes());
    format!("azr1{}", hex::encode(&digest[..20]))
}

/// Wallet operations over a [`LedgerStore`].
pub struct WalletLedger {
    store: Arc<dyn LedgerStore>,
    config: WalletConfig,
    retry: RetryPolicy,
}

impl WalletLedger {
    pub fn new(store: Arc<dyn LedgerStore>, config: WalletConfig, retry: RetryPolicy) -> Self {
        Self {
            store,
            config,
            retry,
        }
    }

    /// Currencies every wallet holds.
    pub fn supported_currencies(&self) -> &[String] {
        &self.config.supported_currencies
    }

    /// Fetch a wallet, creating it with zero balances on first access.
    pub async fn get_or_create_wallet(&self, user_id: &str) -> Result<Wallet> {
        validate_account(user_id)?;
        self.store.wallet(user_id).await
    }

    /// Balance in `currency`; zero for users without a wallet.
    pub async fn balance(&self, user_id: &str, currency: &str) -> Result<u64> {
        validate_account(user_id)?;
        self.ensure_supported(currency)?;
        self.store.balance(user_id, currency).await
    }

    /// Credit a non-reward currency.
    ///
    /// The reward currency is refused with [`MintError::ReservedCurrency`]:
    /// it only enters wallets through a mint.
    pub async fn credit(&self, user_id: &str, currency: &str, amount: u64) -> Result<WalletTransaction> {
        self.apply(user_id, currency, Direction::Credit, amount).await
    }

    /// Debit a non-reward currency. The reward currency only leaves a wallet
    /// by transfer.
    pub async fn debit(&self, user_id: &str, currency: &str, amount: u64) -> Result<WalletTransaction> {
        self.apply(user_id, currency, Direction::Debit, amount).await
    }

    /// Up to `limit` mining rewards in `currency`, newest first.
    pub async fn recent_rewards(
        &self,
        user_id: &str,
        currency: &str,
        limit: usize,
    ) -> Result<Vec<WalletTransaction>> {
        validate_account(user_id)?;
        self.ensure_supported(currency)?;
        self.store
            .recent_rewards(user_id, currency, limit.min(self.config.max_history))
            .await
    }

    /// Move `amount` between two wallets, all-or-nothing.
    pub async fn transfer(
        &self,
        from_user_id: &str,
        to_user_id: &str,
        currency: &str,
        amount: u64,
    ) -> Result<TransferRecord> {
        validate_account(from_user_id)?;
        validate_account(to_user_id)?;
        if from_user_id == to_user_id {
            return Err(MintError::SelfTransfer);
        }
        self.ensure_supported(currency)?;
        ensure_positive(amount)?;

        let commit = TransferCommit {
            from: from_user_id.to_string(),
            to: to_user_id.to_string(),
            currency: currency.to_string(),
            amount,
        };
        let store = Arc::clone(&self.store);
        let record = retry_on_conflict(self.retry, "transfer", || {
            let store = Arc::clone(&store);
            let commit = commit.clone();
            async move { store.commit_transfer(commit).await }
        })
        .await?;

        info!(
            transfer_id = %record.id,
            from = %record.from,
            to = %record.to,
            currency = %record.currency,
            amount = record.amount,
            "Transfer committed"
        );
        Ok(record)
    }

    /// Up to `limit` entries, newest first. `limit` is capped by `max_history`.
    pub async fn get_history(&self, user_id: &str, limit: usize) -> Result<Vec<WalletTransaction>> {
        validate_account(user_id)?;
        self.store
            .history(user_id, limit.min(self.config.max_history))
            .await
    }

    async fn apply(
        &self,
        user_id: &str,
        currency: &str,
        direction: Direction,
        amount: u64,
    ) -> Result<WalletTransaction> {
        validate_account(user_id)?;
        self.ensure_supported(currency)?;
        if currency == self.config.reward_currency {
            return Err(MintError::ReservedCurrency(currency.to_string()));
        }
        ensure_positive(amount)?;

        let entry = WalletEntry {
            user_id: user_id.to_string(),
            currency: currency.to_string(),
            direction,
            amount,
            source: EntrySource::Direct,
        };
        let store = Arc::clone(&self.store);
        let (transaction, balance) = retry_on_conflict(self.retry, "wallet_entry", || {
            let store = Arc::clone(&store);
            let entry = entry.clone();
            async move { store.apply_entry(entry).await }
        })
        .await?;

        debug!(
            user_id = %user_id,
            currency = %currency,
            direction = ?direction,
            amount,
            balance,
            "Wallet entry applied"
        );
        Ok(transaction)
    }

    fn ensure_supported(&self, currency: &str) -> Result<()> {
        if self.config.supported_currencies.iter().any(|c| c == currency) {
            Ok(())
        } else {
            Err(MintError::UnsupportedCurrency(currency.to_string()))
        }
    }
}

pub(crate) fn validate_account(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(MintError::InvalidAccount("user id is empty".to_string()));
    }
    Ok(())
}

fn ensure_positive(amount: u64) -> Result<()> {
    if amount == 0 {
        return Err(MintError::InvalidAmount("amount must be positive".to_string()));
    }
    Ok(())
}
