//! Azora Mint - proof-gated token issuance
//!
//! Converts verified learning activity into a capped-supply reward token and
//! keeps per-user, multi-currency wallet ledgers:
//!
//! - **Supply ledger**: capped minting, anti-replay, inflation stats, and a
//!   bounded minting-rate feedback loop
//! - **Wallet ledger**: credit, debit and atomic transfer over an
//!   append-only entry log
//! - **Ledger store**: the persistence seam; every call is one unit of work
//! - **Settlement**: fire-and-forget hand-off of finalized transactions
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     MiningCoordinator                        │
//! │                                                              │
//! │  ┌────────────────┐  ┌──────────────────┐  ┌──────────────┐  │
//! │  │ ProofValidator │──│ RewardCalculator │──│ SupplyLedger │  │
//! │  └────────────────┘  └──────────────────┘  └──────┬───────┘  │
//! │                                    mint + credit  │          │
//! │  ┌──────────────┐                         ┌───────▼───────┐  │
//! │  │ WalletLedger │────────────────────────▶│  LedgerStore  │  │
//! │  └──────────────┘                         └───────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod coordinator;
pub mod retry;
pub mod settlement;
pub mod store;
pub mod supply;
pub mod types;
pub mod wallet;

// Re-export main types
pub use config::MintConfig;
pub use coordinator::MiningCoordinator;
pub use settlement::{LoggingSettlementSink, SettlementDispatcher, SettlementEvent, SettlementSink};
pub use store::{LedgerStore, MemoryLedgerStore};
pub use supply::{SupplyLedger, SupplyState};
pub use types::*;
pub use wallet::{Wallet, WalletLedger};

pub use proofs::{
    ActivityClaim, ActivityType, Multipliers, Proof, ProofValidator, RewardCalculator,
};
