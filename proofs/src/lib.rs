//! Proof-of-Knowledge claims for Azora Mint
//!
//! Turns activity-completion events into signed proofs that gate token issuance:
//!
//! - **Validation**: only the five rewardable activity types are accepted
//! - **Authenticity**: SHA-256 content hash plus HMAC-SHA256 issuer signature
//! - **Ordering**: proof chains are audited for timestamp regressions
//! - **Rewards**: fixed base rewards scaled by bounded multipliers
//!
//! # Example
//!
//! ```ignore
//! use proofs::{ActivityClaim, Multipliers, ProofValidator, RewardCalculator};
//!
//! let validator = ProofValidator::from_hex(&issuer_key_hex)?;
//! let proof = validator.validate(&ActivityClaim::new("act-1", "student-1", "quiz_passed"))?;
//! let reward = RewardCalculator::default().calculate_reward(&proof, &Multipliers::default());
//! assert_eq!(reward, 25);
//! ```

pub mod reward;
pub mod types;
pub mod validator;

// Re-export main types
pub use reward::{base_reward, Multipliers, RewardCalculator};
pub use types::*;
pub use validator::ProofValidator;
