//! Core types for the mint engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use proofs::{Proof, ProofError};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Currency credited by mining.
pub const REWARD_CURRENCY: &str = "AZR";

/// Record of newly issued tokens. Immutable once committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct MintTransaction {
    /// Unique mint ID
    pub id: String,
    /// Receiving user
    pub recipient: String,
    /// Tokens issued
    pub amount: u64,
    /// Content hash of the consumed proof
    pub proof_hash: String,
    /// Replay-protection token of the consumed proof
    pub idempotency_key: String,
    /// When the mint was committed
    pub timestamp: DateTime<Utc>,
    /// `total_supply / block_size` before this mint
    pub block_index: u64,
}

/// Direction of a wallet entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Credit,
    Debit,
}

/// What caused a wallet entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntrySource {
    /// Reward credit for a mint
    Mint { mint_id: String },
    /// One side of a transfer
    Transfer {
        transfer_id: String,
        counterparty: String,
    },
    /// Direct credit or debit
    Direct,
}

/// A single balance change. Immutable, owned by one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct WalletTransaction {
    /// Unique entry ID
    pub id: String,
    /// Credit or debit
    pub direction: Direction,
    /// Currency code
    pub currency: String,
    /// Amount moved
    pub amount: u64,
    /// When the entry was applied
    pub timestamp: DateTime<Utc>,
    /// Cause of the entry
    pub source: EntrySource,
}

impl WalletTransaction {
    /// Whether this entry is a mining reward in `currency`.
    pub fn is_reward_in(&self, currency: &str) -> bool {
        self.direction == Direction::Credit
            && self.currency == currency
            && matches!(self.source, EntrySource::Mint { .. })
    }
}

/// Both sides of a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct TransferRecord {
    /// Unique transfer ID
    pub id: String,
    /// Sending user
    pub from: String,
    /// Receiving user
    pub to: String,
    /// Currency code
    pub currency: String,
    /// Amount moved
    pub amount: u64,
    /// Entry appended to the sender's wallet
    pub debit: WalletTransaction,
    /// Entry appended to the recipient's wallet
    pub credit: WalletTransaction,
    /// When the transfer was committed
    pub timestamp: DateTime<Utc>,
}

/// Market signals fed to the minting-rate feedback loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct EconomicIndicators {
    pub demand_index: f64,
    pub supply_index: f64,
    pub velocity_index: f64,
}

/// Issuance snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct InflationStats {
    pub current_supply: u64,
    pub max_supply: u64,
    pub remaining_supply: u64,
    /// Share of the cap already issued, in percent
    pub inflation_rate_pct: f64,
    pub minting_rate: f64,
}

/// Outcome of a successful `mine`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct MiningResult {
    /// Tokens minted and credited
    pub reward: u64,
    /// The consumed proof
    pub proof: Proof,
    /// The committed mint
    pub transaction: MintTransaction,
    /// Recipient balance in the reward currency after the credit
    pub new_balance: u64,
}

/// Per-user mining statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct MiningStats {
    pub user_id: String,
    /// Current reward-currency balance
    pub balance: u64,
    /// Most recent reward credits, newest first
    pub recent_rewards: Vec<WalletTransaction>,
    /// Mean of `recent_rewards`, 0 when empty
    pub average_reward: f64,
    /// Current global minting rate
    pub minting_rate: f64,
}

/// System-wide mining statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct GlobalMiningStats {
    pub total_supply: u64,
    pub max_supply: u64,
    pub minting_rate: f64,
    pub inflation: InflationStats,
}

/// Consistent snapshot comparing issued supply with wallet balances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ConservationReport {
    pub currency: String,
    pub total_supply: u64,
    /// Sum of all committed mint amounts
    pub minted_total: u64,
    /// Sum of all wallet balances in `currency`
    pub circulating: u64,
    pub balanced: bool,
}

/// Lifecycle of a proof: `Unvalidated -> Verified -> Consumed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ProofStatus {
    Unvalidated,
    Verified,
    /// Terminal; a mint has used it
    Consumed,
}

/// Operational signals raised by the ledgers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerAlert {
    /// A mint was refused because it would pass the cap
    SupplyCapExceeded {
        recipient: String,
        max: u64,
        would_have: u64,
    },
}

/// Error types for the mint engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MintError {
    /// Activity type is not rewardable
    #[error("Invalid activity type: {0}")]
    InvalidActivityType(String),

    /// Proof is unverified, forged or belongs to someone else
    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    /// Proof was already used by a mint
    #[error("Proof already consumed: {0}")]
    ProofAlreadyConsumed(String),

    /// Mint would push supply past the cap
    #[error("Supply cap exceeded: max {max}, would have {would_have}")]
    SupplyCapExceeded { max: u64, would_have: u64 },

    /// Balance cannot cover a debit
    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: u64, need: u64 },

    /// Optimistic update lost every attempt
    #[error("Concurrent update conflict after {attempts} attempts")]
    ConcurrentUpdateConflict { attempts: usize },

    /// Amount is zero or otherwise unusable
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Currency is not held by wallets
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    /// Reward currency only enters wallets through mining
    #[error("Currency {0} cannot be credited or debited directly")]
    ReservedCurrency(String),

    /// User ID is unusable
    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    /// Sender and recipient are the same wallet
    #[error("Cannot transfer to the same wallet")]
    SelfTransfer,

    /// Arithmetic overflow
    #[error("Arithmetic overflow")]
    Overflow,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Settlement event could not be handed off
    #[error("Settlement error: {0}")]
    SettlementError(String),

    /// Ledger store backend error
    #[error("Store error: {0}")]
    StoreError(String),
}

impl MintError {
    /// Only optimistic-concurrency conflicts are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentUpdateConflict { .. })
    }
}

impl From<ProofError> for MintError {
    fn from(err: ProofError) -> Self {
        match err {
            ProofError::InvalidActivityType(t) => Self::InvalidActivityType(t),
            ProofError::MalformedClaim(reason) => Self::InvalidProof(reason),
            ProofError::InvalidSignature => Self::InvalidProof("signature mismatch".to_string()),
            ProofError::InvalidKey(reason) | ProofError::InvalidBounds(reason) => {
                Self::ConfigError(reason)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, MintError>;
