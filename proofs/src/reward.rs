//! Reward lookup for verified proofs.

use serde::{Deserialize, Serialize};

use crate::types::{ActivityType, Proof, ProofError, Result};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Base reward per activity, in the smallest reward-token unit.
pub fn base_reward(activity_type: ActivityType) -> u64 {
    match activity_type {
        ActivityType::LessonComplete => 10,
        ActivityType::QuizPassed => 25,
        ActivityType::ProjectSubmitted => 50,
        ActivityType::PeerHelp => 15,
        ActivityType::ContentCreated => 100,
    }
}

/// Multipliers supplied by the gamification system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(default)]
pub struct Multipliers {
    /// Learning streak bonus
    pub streak: f64,
    /// Quality of the submission
    pub quality: f64,
    /// Difficulty of the activity
    pub difficulty: f64,
}

impl Default for Multipliers {
    fn default() -> Self {
        Self {
            streak: 1.0,
            quality: 1.0,
            difficulty: 1.0,
        }
    }
}

/// Maps proofs and multipliers to integer rewards.
#[derive(Debug, Clone, Copy)]
pub struct RewardCalculator {
    min_multiplier: f64,
    max_multiplier: f64,
}

impl Default for RewardCalculator {
    fn default() -> Self {
        Self {
            min_multiplier: 0.0,
            max_multiplier: 5.0,
        }
    }
}

impl RewardCalculator {
    /// Create a calculator clamping every multiplier into `[min, max]`.
    ///
    /// Both bounds must be finite and non-negative with `min <= max`.
    pub fn with_bounds(min_multiplier: f64, max_multiplier: f64) -> Result<Self> {
        let finite = min_multiplier.is_finite() && max_multiplier.is_finite();
        if !finite || min_multiplier < 0.0 || min_multiplier > max_multiplier {
            return Err(ProofError::InvalidBounds(format!(
                "multiplier bounds [{min_multiplier}, {max_multiplier}] are invalid"
            )));
        }
        Ok(Self {
            min_multiplier,
            max_multiplier,
        })
    }

    /// `floor(base × streak × quality × difficulty)` with clamped multipliers.
    pub fn calculate_reward(&self, proof: &Proof, multipliers: &Multipliers) -> u64 {
        let factor = self.clamp(multipliers.streak)
            * self.clamp(multipliers.quality)
            * self.clamp(multipliers.difficulty);
        // Saturates at u64::MAX; bounded multipliers keep it far below that.
        (base_reward(proof.activity_type) as f64 * factor).floor() as u64
    }

    fn clamp(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return 1.0;
        }
        value.clamp(self.min_multiplier, self.max_multiplier)
    }
}
