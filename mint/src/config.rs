//! Configuration for the mint engine.

use serde::{Deserialize, Serialize};

use crate::types::{MintError, Result, REWARD_CURRENCY};

/// Configuration for a mining coordinator and its ledgers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MintConfig {
    /// Supply configuration
    pub supply: SupplyConfig,
    /// Minting-rate feedback configuration
    pub rate: RateConfig,
    /// Reward configuration
    pub rewards: RewardConfig,
    /// Wallet configuration
    pub wallet: WalletConfig,
    /// Conflict retry configuration
    pub retry: RetryConfig,
    /// Proof issuer configuration
    pub proofs: ProofConfig,
    /// Settlement configuration
    pub settlement: SettlementConfig,
}

impl MintConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Reject settings the ledgers cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.supply.max_supply == 0 {
            return Err(MintError::ConfigError("max_supply must be positive".to_string()));
        }
        if self.supply.block_size == 0 {
            return Err(MintError::ConfigError("block_size must be positive".to_string()));
        }
        if !(self.rate.floor > 0.0 && self.rate.floor <= self.rate.ceiling) {
            return Err(MintError::ConfigError(format!(
                "rate bounds [{}, {}] are invalid",
                self.rate.floor, self.rate.ceiling
            )));
        }
        if !(self.rate.floor..=self.rate.ceiling).contains(&self.supply.initial_minting_rate) {
            return Err(MintError::ConfigError(format!(
                "initial_minting_rate {} outside [{}, {}]",
                self.supply.initial_minting_rate, self.rate.floor, self.rate.ceiling
            )));
        }
        if !(self.rewards.multiplier_min >= 0.0
            && self.rewards.multiplier_min <= self.rewards.multiplier_max
            && self.rewards.multiplier_max.is_finite())
        {
            return Err(MintError::ConfigError("multiplier bounds are invalid".to_string()));
        }
        if self.wallet.supported_currencies.is_empty() {
            return Err(MintError::ConfigError("no supported currencies".to_string()));
        }
        if !self
            .wallet
            .supported_currencies
            .contains(&self.wallet.reward_currency)
        {
            return Err(MintError::ConfigError(format!(
                "reward currency {} is not supported",
                self.wallet.reward_currency
            )));
        }
        Ok(())
    }
}

/// Supply configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplyConfig {
    /// Hard cap on issued tokens
    pub max_supply: u64,
    /// Minting rate at startup
    pub initial_minting_rate: f64,
    /// Supply units per block, for `block_index`
    pub block_size: u64,
}

impl Default for SupplyConfig {
    fn default() -> Self {
        Self {
            max_supply: 21_000_000,
            initial_minting_rate: 1.0,
            block_size: 1000,
        }
    }
}

/// Minting-rate feedback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    /// Lowest allowed rate
    pub floor: f64,
    /// Highest allowed rate
    pub ceiling: f64,
    /// Factor applied when demand outpaces supply
    pub increase_factor: f64,
    /// Factor applied when supply outpaces demand
    pub decrease_factor: f64,
    /// Ratio one index must exceed the other by to trigger a change
    pub imbalance_threshold: f64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            floor: 0.5,
            ceiling: 1.0,
            increase_factor: 1.05,
            decrease_factor: 0.95,
            imbalance_threshold: 1.2,
        }
    }
}

/// Reward configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Lower clamp for each multiplier
    pub multiplier_min: f64,
    /// Upper clamp for each multiplier
    pub multiplier_max: f64,
    /// Scale calculated rewards by the current minting rate
    pub throttle_by_minting_rate: bool,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            multiplier_min: 0.0,
            multiplier_max: 5.0,
            throttle_by_minting_rate: false,
        }
    }
}

/// Wallet configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Currencies every wallet holds a balance in
    pub supported_currencies: Vec<String>,
    /// Currency credited by mining
    pub reward_currency: String,
    /// Upper bound on any history request
    pub max_history: usize,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            supported_currencies: vec![REWARD_CURRENCY.to_string(), "LEARN".to_string()],
            reward_currency: REWARD_CURRENCY.to_string(),
            max_history: 100,
        }
    }
}

/// Conflict retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: usize,
    /// Base backoff delay (ms), multiplied by the attempt number
    pub retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 5,
        }
    }
}

/// Proof issuer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProofConfig {
    /// Hex-encoded HMAC key; a random key is generated when absent
    pub issuer_key: Option<String>,
}

/// Settlement configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Events buffered before new ones are dropped
    pub queue_capacity: usize,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
        }
    }
}
