//! # Vault Errors
//!
//! Every failure is synchronous, specific and enumerable. Nothing is
//! retried internally; an error aborts the whole operation and the vault,
//! the asset ledgers and the event log are restored to their prior state.
//!
//! [`ErrorKind`] groups the variants into the coarse classes monitoring and
//! callers branch on.

use strata_protocol::{Address, TokenError};
use thiserror::Error;

use crate::access::AccessError;
use crate::strategy::{GateError, StrategyError};

/// Coarse failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Wrong caller class or insufficient allowance.
    Authorization,
    /// Strategy not active, not whitelisted, not genuine code, or tampering.
    StrategyGate,
    /// Not enough assets, shares or liquidity.
    InsufficientFunds,
    /// Invalid configuration: zero identifiers, fee above ceiling, duplicates.
    Configuration,
    /// The strategy module itself failed.
    StrategyFailure,
    /// Operations are paused.
    Paused,
    /// Zero-sized request or overflow.
    InvalidAmount,
}

/// Errors raised by vault operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// Caller-class check failed.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Strategy gate refused the invocation.
    #[error(transparent)]
    Gate(#[from] GateError),

    /// The strategy module returned an error.
    #[error("strategy {module} failed: {source}")]
    Strategy {
        /// Module that failed.
        module: Address,
        /// Underlying failure.
        #[source]
        source: StrategyError,
    },

    /// Asset or share ledger failure (balance, allowance, overflow).
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Deposits, mints, withdrawals and redemptions are paused.
    #[error("vault is paused")]
    Paused,

    /// A zero amount was requested.
    #[error("amount must be greater than zero")]
    ZeroAmount,

    /// The deposit is too small to mint a single share.
    #[error("deposit of {assets} assets would mint zero shares")]
    ZeroShares {
        /// Assets offered.
        assets: u64,
    },

    /// The redemption is too small to return a single asset unit.
    #[error("redeeming {shares} shares would return zero assets")]
    ZeroAssets {
        /// Shares offered.
        shares: u64,
    },

    /// The share owner does not hold enough shares.
    #[error("insufficient shares: {owner} holds {available}, operation needs {required}")]
    InsufficientShares {
        /// Share owner.
        owner: Address,
        /// Shares held.
        available: u64,
        /// Shares required.
        required: u64,
    },

    /// Even after divesting, the vault cannot pay out the request.
    #[error("insufficient liquidity: {idle} idle after divesting, {required} required")]
    InsufficientLiquidity {
        /// Idle balance after divesting.
        idle: u64,
        /// Amount required.
        required: u64,
    },

    /// Shares are outstanding but back no value; pricing is undefined.
    #[error("vault is insolvent: {shares} shares outstanding against zero value")]
    Insolvent {
        /// Outstanding supply.
        shares: u64,
    },

    /// Fee rate above the deployment ceiling.
    #[error("fee rate {rate} bps exceeds ceiling {ceiling} bps")]
    FeeTooHigh {
        /// Requested rate.
        rate: u16,
        /// Configured ceiling.
        ceiling: u16,
    },

    /// A required identifier was the zero address.
    #[error("zero address supplied for {0}")]
    ZeroAddress(&'static str),

    /// Intermediate arithmetic overflowed.
    #[error("arithmetic overflow")]
    Overflow,
}

impl VaultError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::Access(_) => ErrorKind::Authorization,
            VaultError::Gate(g) if g.is_configuration() => ErrorKind::Configuration,
            VaultError::Gate(_) => ErrorKind::StrategyGate,
            VaultError::Strategy { .. } => ErrorKind::StrategyFailure,
            VaultError::Token(TokenError::InsufficientAllowance { .. }) => ErrorKind::Authorization,
            VaultError::Token(TokenError::InsufficientBalance { .. }) => ErrorKind::InsufficientFunds,
            VaultError::Token(TokenError::ZeroAddress) | VaultError::Token(TokenError::UnknownAsset(_)) => {
                ErrorKind::Configuration
            }
            VaultError::Token(TokenError::Overflow) | VaultError::Overflow => ErrorKind::InvalidAmount,
            VaultError::Paused => ErrorKind::Paused,
            VaultError::ZeroAmount | VaultError::ZeroShares { .. } | VaultError::ZeroAssets { .. } => {
                ErrorKind::InvalidAmount
            }
            VaultError::InsufficientShares { .. }
            | VaultError::InsufficientLiquidity { .. }
            | VaultError::Insolvent { .. } => ErrorKind::InsufficientFunds,
            VaultError::FeeTooHigh { .. } | VaultError::ZeroAddress(_) => ErrorKind::Configuration,
        }
    }

    /// `true` if the error is an authorization failure.
    pub fn is_authorization(&self) -> bool {
        self.kind() == ErrorKind::Authorization
    }
}
