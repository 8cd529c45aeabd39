//! Ledger persistence seam.
//!
//! Every [`LedgerStore`] method is one atomic unit of work: a durable backend
//! must commit each call in a single transaction, or not at all. The
//! in-memory [`MemoryLedgerStore`] gets the same guarantee from short-held
//! locks, always taken in one global order:
//!
//! 1. the supply book,
//! 2. wallets, in ascending user-id order.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::supply::SupplyState;
use crate::types::{
    ConservationReport, Direction, EntrySource, MintError, MintTransaction, Result,
    TransferRecord, WalletTransaction,
};
use crate::wallet::Wallet;

/// A mint to commit, optionally paired with the recipient's credit.
#[derive(Debug, Clone)]
pub struct MintCommit {
    pub recipient: String,
    pub amount: u64,
    pub proof_hash: String,
    /// Consumed atomically with the mint
    pub idempotency_key: String,
    /// Credit the recipient in this currency within the same unit of work
    pub credit_currency: Option<String>,
    pub block_size: u64,
}

/// What a committed mint produced.
#[derive(Debug, Clone)]
pub struct MintReceipt {
    pub transaction: MintTransaction,
    pub credit: Option<WalletTransaction>,
    /// Recipient balance after the credit
    pub balance: Option<u64>,
}

/// A single credit or debit to apply.
#[derive(Debug, Clone)]
pub struct WalletEntry {
    pub user_id: String,
    pub currency: String,
    pub direction: Direction,
    pub amount: u64,
    pub source: EntrySource,
}

/// A transfer to commit.
#[derive(Debug, Clone)]
pub struct TransferCommit {
    pub from: String,
    pub to: String,
    pub currency: String,
    pub amount: u64,
}

/// Repository interface for supply and wallet state.
///
/// Implementations may return [`MintError::ConcurrentUpdateConflict`] when an
/// optimistic write loses a race; callers retry those.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Snapshot of the supply state.
    async fn supply(&self) -> Result<SupplyState>;

    /// Consume the proof, check the cap, append the mint and bump supply,
    /// plus the optional credit. All-or-nothing.
    async fn commit_mint(&self, commit: MintCommit) -> Result<MintReceipt>;

    /// Set the minting rate if the supply version still matches.
    async fn compare_and_set_rate(&self, expected_version: u64, rate: f64) -> Result<bool>;

    /// Whether a proof idempotency key has been consumed.
    async fn is_consumed(&self, idempotency_key: &str) -> Result<bool>;

    /// Up to `limit` mints, newest first.
    async fn mint_log(&self, limit: usize) -> Result<Vec<MintTransaction>>;

    /// Fetch a wallet, creating it on first access.
    async fn wallet(&self, user_id: &str) -> Result<Wallet>;

    /// Apply one entry; returns it with the resulting balance.
    async fn apply_entry(&self, entry: WalletEntry) -> Result<(WalletTransaction, u64)>;

    /// Debit the sender and credit the recipient. All-or-nothing.
    async fn commit_transfer(&self, transfer: TransferCommit) -> Result<TransferRecord>;

    /// Up to `limit` entries for a user, newest first; empty for unknown users.
    async fn history(&self, user_id: &str, limit: usize) -> Result<Vec<WalletTransaction>>;

    /// Balance in `currency`; zero for unknown users.
    async fn balance(&self, user_id: &str, currency: &str) -> Result<u64>;

    /// Up to `limit` mining rewards in `currency`, newest first; empty for
    /// unknown users.
    async fn recent_rewards(
        &self,
        user_id: &str,
        currency: &str,
        limit: usize,
    ) -> Result<Vec<WalletTransaction>>;

    /// Consistent snapshot of supply, mints and balances in `currency`.
    async fn audit(&self, currency: &str) -> Result<ConservationReport>;
}

#[derive(Debug)]
struct SupplyBook {
    state: SupplyState,
    consumed: HashSet<String>,
    log: Vec<MintTransaction>,
}

/// In-memory [`LedgerStore`].
pub struct MemoryLedgerStore {
    supply: Mutex<SupplyBook>,
    wallets: DashMap<String, Arc<Mutex<Wallet>>>,
    currencies: Vec<String>,
}

impl MemoryLedgerStore {
    pub fn new(state: SupplyState, currencies: Vec<String>) -> Self {
        Self {
            supply: Mutex::new(SupplyBook {
                state,
                consumed: HashSet::new(),
                log: Vec::new(),
            }),
            wallets: DashMap::new(),
            currencies,
        }
    }

    /// Number of wallets created so far.
    pub fn wallet_count(&self) -> usize {
        self.wallets.len()
    }

    fn handle(&self, user_id: &str) -> Arc<Mutex<Wallet>> {
        let entry = self
            .wallets
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Wallet::new(user_id, &self.currencies))));
        Arc::clone(entry.value())
    }

    fn existing(&self, user_id: &str) -> Option<Arc<Mutex<Wallet>>> {
        self.wallets.get(user_id).map(|entry| Arc::clone(entry.value()))
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn supply(&self) -> Result<SupplyState> {
        Ok(self.supply.lock().await.state.clone())
    }

    async fn commit_mint(&self, commit: MintCommit) -> Result<MintReceipt> {
        let mut book = self.supply.lock().await;

        if book.consumed.contains(&commit.idempotency_key) {
            return Err(MintError::ProofAlreadyConsumed(commit.proof_hash));
        }
        let new_total = book.state.check_mint(commit.amount)?;

        let transaction = MintTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            recipient: commit.recipient.clone(),
            amount: commit.amount,
            proof_hash: commit.proof_hash.clone(),
            idempotency_key: commit.idempotency_key.clone(),
            timestamp: Utc::now(),
            block_index: book.state.block_index(commit.block_size),
        };

        // The credit is the last fallible step; supply is only touched after it.
        let (credit, balance) = match &commit.credit_currency {
            Some(currency) => {
                let handle = self.handle(&commit.recipient);
                let mut wallet = handle.lock().await;
                let entry = wallet.credit(
                    currency,
                    commit.amount,
                    EntrySource::Mint {
                        mint_id: transaction.id.clone(),
                    },
                )?;
                (Some(entry), Some(wallet.balance(currency)))
            }
            None => (None, None),
        };

        book.state.total_supply = new_total;
        book.state.version += 1;
        book.consumed.insert(commit.idempotency_key);
        book.log.push(transaction.clone());

        Ok(MintReceipt {
            transaction,
            credit,
            balance,
        })
    }

    async fn compare_and_set_rate(&self, expected_version: u64, rate: f64) -> Result<bool> {
        let mut book = self.supply.lock().await;
        if book.state.version != expected_version {
            return Ok(false);
        }
        book.state.minting_rate = rate;
        book.state.version += 1;
        Ok(true)
    }

    async fn is_consumed(&self, idempotency_key: &str) -> Result<bool> {
        Ok(self.supply.lock().await.consumed.contains(idempotency_key))
    }

    async fn mint_log(&self, limit: usize) -> Result<Vec<MintTransaction>> {
        let book = self.supply.lock().await;
        Ok(book.log.iter().rev().take(limit).cloned().collect())
    }

    async fn wallet(&self, user_id: &str) -> Result<Wallet> {
        let handle = self.handle(user_id);
        let wallet = handle.lock().await;
        Ok(wallet.clone())
    }

    async fn apply_entry(&self, entry: WalletEntry) -> Result<(WalletTransaction, u64)> {
        let handle = self.handle(&entry.user_id);
        let mut wallet = handle.lock().await;
        let transaction = match entry.direction {
            Direction::Credit => wallet.credit(&entry.currency, entry.amount, entry.source)?,
            Direction::Debit => wallet.debit(&entry.currency, entry.amount, entry.source)?,
        };
        Ok((transaction, wallet.balance(&entry.currency)))
    }

    async fn commit_transfer(&self, transfer: TransferCommit) -> Result<TransferRecord> {
        if transfer.from == transfer.to {
            return Err(MintError::SelfTransfer);
        }

        let from_handle = self.handle(&transfer.from);
        let to_handle = self.handle(&transfer.to);

        let (mut from, mut to) = if transfer.from < transfer.to {
            let from = from_handle.lock().await;
            let to = to_handle.lock().await;
            (from, to)
        } else {
            let to = to_handle.lock().await;
            let from = from_handle.lock().await;
            (from, to)
        };

        from.ensure_can_debit(&transfer.currency, transfer.amount)?;
        to.ensure_can_credit(&transfer.currency, transfer.amount)?;

        let id = uuid::Uuid::new_v4().to_string();
        let debit = from.debit(
            &transfer.currency,
            transfer.amount,
            EntrySource::Transfer {
                transfer_id: id.clone(),
                counterparty: transfer.to.clone(),
            },
        )?;
        let credit = to.credit(
            &transfer.currency,
            transfer.amount,
            EntrySource::Transfer {
                transfer_id: id.clone(),
                counterparty: transfer.from.clone(),
            },
        )?;

        Ok(TransferRecord {
            id,
            from: transfer.from,
            to: transfer.to,
            currency: transfer.currency,
            amount: transfer.amount,
            timestamp: credit.timestamp,
            debit,
            credit,
        })
    }

    async fn history(&self, user_id: &str, limit: usize) -> Result<Vec<WalletTransaction>> {
        match self.existing(user_id) {
            Some(handle) => Ok(handle.lock().await.history(limit)),
            None => Ok(Vec::new()),
        }
    }

    async fn balance(&self, user_id: &str, currency: &str) -> Result<u64> {
        match self.existing(user_id) {
            Some(handle) => Ok(handle.lock().await.balance(currency)),
            None => Ok(0),
        }
    }

    async fn recent_rewards(
        &self,
        user_id: &str,
        currency: &str,
        limit: usize,
    ) -> Result<Vec<WalletTransaction>> {
        match self.existing(user_id) {
            Some(handle) => Ok(handle.lock().await.recent_rewards(currency, limit)),
            None => Ok(Vec::new()),
        }
    }

    async fn audit(&self, currency: &str) -> Result<ConservationReport> {
        let book = self.supply.lock().await;

        let mut user_ids: Vec<String> = self.wallets.iter().map(|e| e.key().clone()).collect();
        user_ids.sort();
        let handles: Vec<Arc<Mutex<Wallet>>> =
            user_ids.iter().filter_map(|id| self.existing(id)).collect();

        let mut guards = Vec::with_capacity(handles.len());
        for handle in &handles {
            guards.push(handle.lock().await);
        }

        let circulating = guards
            .iter()
            .try_fold(0u64, |acc, w| acc.checked_add(w.balance(currency)))
            .ok_or(MintError::Overflow)?;
        let minted_total = book
            .log
            .iter()
            .try_fold(0u64, |acc, tx| acc.checked_add(tx.amount))
            .ok_or(MintError::Overflow)?;
        let total_supply = book.state.total_supply;

        Ok(ConservationReport {
            currency: currency.to_string(),
            total_supply,
            minted_total,
            circulating,
            balanced: circulating == minted_total && minted_total == total_supply,
        })
    }
}
