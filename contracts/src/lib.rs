//! # strata Contracts
//!
//! Pooled-asset vaults with swappable yield strategies, fronted by a
//! multi-vault router:
//!
//! - **Vault**: share accounting over one asset: deposit, mint, withdraw,
//!   redeem, with the `MAX_AMOUNT` sentinel and vault-favouring rounding.
//! - **Strategy gate**: the three per-call checks (active, whitelisted,
//!   genuine code) guarding shared-storage strategy invocation, plus the
//!   queue-then-activate lifecycle.
//! - **Fees**: high-water-mark performance fees that never charge for loss
//!   recovery.
//! - **Access**: owner, router and explicitly authorized operators.
//! - **Registry / Factory**: deterministic vault addresses and an
//!   append-only `(asset, market)` directory.
//! - **Router**: single and batched operations across vaults, refusing to
//!   act on anyone's shares but the caller's own.
//!
//! ## Design Principles
//!
//! 1. Every operation is an indivisible unit. Failures restore vault
//!    storage, asset ledgers and the event log.
//! 2. Identity is an explicit `caller` parameter on every entry point.
//! 3. Strategy modules are trusted with the vault's storage only after the
//!    gate says so, on every call, and are checked again afterwards.
//! 4. Integer arithmetic in `u128` intermediates; overflow is an error.

pub mod access;
pub mod chain;
pub mod error;
pub mod events;
pub mod factory;
pub mod fees;
pub mod registry;
pub mod router;
pub mod strategies;
pub mod strategy;
pub mod vault;

pub use access::{AccessControl, AccessError};
pub use chain::{Chain, Host};
pub use error::{ErrorKind, VaultError};
pub use events::{EventLog, EventRecord, VaultEvent, WithdrawKind};
pub use factory::{Factory, FactoryError, VaultParams};
pub use fees::{FeeAssessment, FeeState};
pub use registry::{Registry, RegistryEntry, RegistryError};
pub use router::{BatchLeg, Router, RouterError};
pub use strategies::{HoldStrategy, PoolStrategy};
pub use strategy::{GateError, ModuleTable, QueuedChange, Strategy, StrategyContext, StrategyError, StrategyGate, StrategyView};
pub use vault::{Vault, VaultStorage};
