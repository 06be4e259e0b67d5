//! # Protocol Configuration & Constants
//!
//! Every magic number in strata lives here, together with the
//! [`DeploymentConfig`] a factory is created with. A deployment config is
//! validated once, before anything is deployed; a config that fails
//! validation never reaches a running vault.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use anyhow::Context;

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

/// Basis-point denominator. 10_000 bps = 100%.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Fixed-point scale for price-per-share and the high-water mark.
/// A price of `PPS_SCALE` means one asset unit per share.
pub const PPS_SCALE: u128 = 1_000_000_000_000_000_000;

/// Reserved "maximum" sentinel: use the caller's full available balance or
/// position, computed from current state at call time.
pub const MAX_AMOUNT: u64 = u64::MAX;

/// Allowance sentinel that is never decremented.
pub const UNLIMITED_ALLOWANCE: u64 = u64::MAX;

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

/// Hard ceiling on the performance fee: 50% of gains above the high-water
/// mark. Deployments may configure a lower ceiling, never a higher one.
pub const MAX_PERFORMANCE_FEE_BPS: u16 = 5_000;

/// Performance fee applied when a vault is created without an explicit rate.
pub const DEFAULT_PERFORMANCE_FEE_BPS: u16 = 1_000;

// ---------------------------------------------------------------------------
// Strategy changes
// ---------------------------------------------------------------------------

/// Default cooling-off delay between queueing and activating a strategy: 48h.
pub const DEFAULT_STRATEGY_TIMELOCK_SECS: u64 = 172_800;

/// Longest delay a deployment may configure: 30 days.
pub const MAX_STRATEGY_TIMELOCK_SECS: u64 = 2_592_000;

// ---------------------------------------------------------------------------
// Router & registry
// ---------------------------------------------------------------------------

/// Upper bound on legs per router batch. Keeps one atomic unit bounded.
pub const MAX_BATCH_LEGS: usize = 32;

/// Maximum market tag length in bytes.
pub const MAX_MARKET_TAG_LEN: usize = 32;

/// Placeholder bytecode installed at every vault address, so vaults are
/// recognisable as contracts by any [`CodeInspector`](crate::code::CodeInspector).
pub const VAULT_BYTECODE: &[u8] = b"\x60\x80\x60\x40strata-vault-v1";

// ---------------------------------------------------------------------------
// DeploymentConfig
// ---------------------------------------------------------------------------

/// Configuration validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Configured fee ceiling exceeds the protocol maximum.
    #[error("fee ceiling {configured} bps exceeds protocol maximum {max} bps")]
    FeeCeilingTooHigh {
        /// Configured ceiling.
        configured: u16,
        /// Protocol maximum.
        max: u16,
    },

    /// Default fee exceeds the configured ceiling.
    #[error("default fee {default} bps exceeds ceiling {ceiling} bps")]
    DefaultFeeAboveCeiling {
        /// Configured default.
        default: u16,
        /// Configured ceiling.
        ceiling: u16,
    },

    /// Timelock exceeds [`MAX_STRATEGY_TIMELOCK_SECS`].
    #[error("strategy timelock {0}s exceeds maximum {MAX_STRATEGY_TIMELOCK_SECS}s")]
    TimelockTooLong(u64),

    /// Batch size must be between 1 and [`MAX_BATCH_LEGS`].
    #[error("max batch legs {0} outside 1..={MAX_BATCH_LEGS}")]
    InvalidBatchSize(usize),
}

/// Parameters shared by every vault a factory deploys.
///
/// There is exactly one strategy-change policy per deployment: queue, wait
/// `strategy_timelock_secs` on the logical clock, then activate. A zero delay
/// makes a queued change eligible immediately but still goes through the
/// same two phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeploymentConfig {
    /// Delay between queueing and activating a strategy change.
    pub strategy_timelock_secs: u64,
    /// Highest performance fee a vault owner may set.
    pub max_fee_rate_bps: u16,
    /// Fee used when vault parameters do not specify one.
    pub default_fee_rate_bps: u16,
    /// Upper bound on router batch legs.
    pub max_batch_legs: usize,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            strategy_timelock_secs: DEFAULT_STRATEGY_TIMELOCK_SECS,
            max_fee_rate_bps: MAX_PERFORMANCE_FEE_BPS,
            default_fee_rate_bps: DEFAULT_PERFORMANCE_FEE_BPS,
            max_batch_legs: MAX_BATCH_LEGS,
        }
    }
}

impl DeploymentConfig {
    /// Checks every field against protocol limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_fee_rate_bps > MAX_PERFORMANCE_FEE_BPS {
            return Err(ConfigError::FeeCeilingTooHigh {
                configured: self.max_fee_rate_bps,
                max: MAX_PERFORMANCE_FEE_BPS,
            });
        }
        if self.default_fee_rate_bps > self.max_fee_rate_bps {
            return Err(ConfigError::DefaultFeeAboveCeiling {
                default: self.default_fee_rate_bps,
                ceiling: self.max_fee_rate_bps,
            });
        }
        if self.strategy_timelock_secs > MAX_STRATEGY_TIMELOCK_SECS {
            return Err(ConfigError::TimelockTooLong(self.strategy_timelock_secs));
        }
        if self.max_batch_legs == 0 || self.max_batch_legs > MAX_BATCH_LEGS {
            return Err(ConfigError::InvalidBatchSize(self.max_batch_legs));
        }
        Ok(())
    }

    /// Parses and validates a JSON config. Missing fields take defaults.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json).context("malformed deployment config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading deployment config {}", path.display()))?;
        let config = Self::from_json(&raw)
            .with_context(|| format!("loading deployment config {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            timelock_secs = config.strategy_timelock_secs,
            max_fee_bps = config.max_fee_rate_bps,
            "deployment config loaded"
        );
        Ok(config)
    }
}
