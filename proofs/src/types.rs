//! Core types for proof-of-knowledge claims.
//!
//! With the `typescript` feature enabled, these types can be exported to TypeScript
//! using ts-rs for consistency with the progress-tracking frontend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Learning or building activity that can earn a reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    /// A lesson was completed
    LessonComplete,
    /// A quiz was passed
    QuizPassed,
    /// A project was submitted
    ProjectSubmitted,
    /// Another learner was helped
    PeerHelp,
    /// Educational content was published
    ContentCreated,
}

impl ActivityType {
    /// Wire name, as emitted by the progress-tracking system.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LessonComplete => "lesson_complete",
            Self::QuizPassed => "quiz_passed",
            Self::ProjectSubmitted => "project_submitted",
            Self::PeerHelp => "peer_help",
            Self::ContentCreated => "content_created",
        }
    }

    /// Every rewardable activity.
    pub fn all() -> [Self; 5] {
        [
            Self::LessonComplete,
            Self::QuizPassed,
            Self::ProjectSubmitted,
            Self::PeerHelp,
            Self::ContentCreated,
        ]
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = ProofError;

    fn from_str(s: &str) -> Result<Self> {
        Self::all()
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ProofError::InvalidActivityType(s.to_string()))
    }
}

/// Raw activity-completion event, before validation.
///
/// The type is kept as the collaborator sent it so that unknown
/// activity names surface as `InvalidActivityType` rather than a
/// deserialization failure upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ActivityClaim {
    /// Activity ID in the progress-tracking system
    pub id: String,
    /// Student who completed the activity
    pub student_id: String,
    /// Activity type name
    #[serde(rename = "type")]
    pub activity_type: String,
    /// When the activity was completed
    pub timestamp: DateTime<Utc>,
}

impl ActivityClaim {
    /// Create a claim stamped with the current time.
    pub fn new(
        id: impl Into<String>,
        student_id: impl Into<String>,
        activity_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            student_id: student_id.into(),
            activity_type: activity_type.into(),
            timestamp: Utc::now(),
        }
    }

    /// Override the completion time.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A validated claim that an activity occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Proof {
    /// Activity ID
    pub activity_id: String,
    /// Claiming student
    pub student_id: String,
    /// Activity type
    pub activity_type: ActivityType,
    /// Activity completion time
    pub timestamp: DateTime<Utc>,
    /// Per-validation nonce folded into the content hash
    pub nonce: String,
    /// SHA-256 over the canonical fields (hex)
    pub content_hash: String,
    /// HMAC-SHA256 of `content_hash` under the issuer key (hex)
    pub signature: String,
    /// Set by the validator
    pub verified: bool,
}

impl Proof {
    /// Replay-protection token for this claim.
    ///
    /// Derived from the claimant, activity and type only, so two proofs
    /// validated from the same activity share it regardless of nonce.
    pub fn idempotency_key(&self) -> String {
        let mut hasher = Sha256::new();
        for field in [
            self.student_id.as_str(),
            self.activity_id.as_str(),
            self.activity_type.as_str(),
        ] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Result of auditing a proof chain for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainAudit {
    /// Timestamps never decrease
    Ordered,
    /// The proof at `index` is earlier than its predecessor
    OutOfOrder { index: usize },
}

impl ChainAudit {
    pub fn is_ordered(&self) -> bool {
        matches!(self, Self::Ordered)
    }
}

/// Error types for proof handling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProofError {
    /// Activity type is not one of the rewardable types
    #[error("Invalid activity type: {0}")]
    InvalidActivityType(String),

    /// Claim is missing a required field
    #[error("Malformed claim: {0}")]
    MalformedClaim(String),

    /// Content hash or issuer signature does not match
    #[error("Invalid proof signature")]
    InvalidSignature,

    /// Issuer key cannot be used
    #[error("Invalid issuer key: {0}")]
    InvalidKey(String),

    /// Reward multiplier bounds cannot be used
    #[error("Invalid multiplier bounds: {0}")]
    InvalidBounds(String),
}

pub type Result<T> = std::result::Result<T, ProofError>;
