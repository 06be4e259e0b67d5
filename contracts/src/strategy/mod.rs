//! # Strategy Modules
//!
//! A strategy deploys a vault's idle assets into some external yield source
//! and reports what it holds. Modules are not isolated peers: they run with
//! a [`StrategyContext`] that hands them the vault's own storage and the
//! vault's transfer authority over the asset ledger. That makes them
//! powerful and dangerous in equal measure, which is why every call goes
//! through the [`StrategyGate`] first and every mutating call is checked
//! afterwards for writes outside the module's own storage slots.
//!
//! Modules are "deployed" by installing them in the host [`ModuleTable`]
//! under an address that also carries code in the host code registry.

pub mod gate;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use strata_protocol::{Address, AssetBook, FungibleToken, TokenError};
use thiserror::Error;

use crate::vault::VaultStorage;

pub use gate::{GateError, QueuedChange, StrategyGate};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures raised by a strategy module itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    /// An asset transfer made by the module failed.
    #[error("asset transfer failed: {0}")]
    Token(#[from] TokenError),

    /// The yield source cannot release the requested amount.
    #[error("yield source holds {available}, cannot release {requested}")]
    InsufficientLiquidity {
        /// Amount the source can release.
        available: u64,
        /// Amount requested.
        requested: u64,
    },

    /// Module-specific failure.
    #[error("{0}")]
    Failed(String),
}

// ---------------------------------------------------------------------------
// Execution context
// ---------------------------------------------------------------------------

/// Shared-storage handle passed to `invest` and `divest`.
///
/// `storage` is the vault's complete storage. Modules are expected to touch
/// only [`VaultStorage::slots`]; anything else trips the post-call check.
///
/// The asset ledgers are not exposed. A module moves funds only through
/// [`send`](Self::send), which debits the vault, and
/// [`receive`](Self::receive), which pulls against an allowance granted to
/// the vault.
pub struct StrategyContext<'a> {
    /// The vault the module is running as.
    pub vault: Address,
    /// The vault's underlying asset.
    pub asset: Address,
    /// Logical time of the enclosing operation.
    pub now: DateTime<Utc>,
    /// The vault's own storage.
    pub storage: &'a mut VaultStorage,
    assets: &'a mut AssetBook,
}

impl<'a> StrategyContext<'a> {
    pub(crate) fn new(
        vault: Address,
        asset: Address,
        now: DateTime<Utc>,
        storage: &'a mut VaultStorage,
        assets: &'a mut AssetBook,
    ) -> Self {
        Self {
            vault,
            asset,
            now,
            storage,
            assets,
        }
    }
}

impl StrategyContext<'_> {
    /// The vault's idle asset balance.
    pub fn idle(&self) -> u64 {
        self.balance_of(&self.vault)
    }

    /// Balance of `holder` in the vault's asset.
    pub fn balance_of(&self, holder: &Address) -> u64 {
        self.assets.balance_of(&self.asset, holder)
    }

    /// Sends `amount` of the vault's asset to `to`.
    pub fn send(&mut self, to: &Address, amount: u64) -> Result<(), StrategyError> {
        self.assets
            .token_mut(&self.asset)?
            .transfer(&self.vault, to, amount)?;
        Ok(())
    }

    /// Pulls `amount` of the asset from `from` back to the vault. `from` must
    /// have approved the vault as spender.
    pub fn receive(&mut self, from: &Address, amount: u64) -> Result<(), StrategyError> {
        let vault = self.vault;
        self.assets
            .token_mut(&self.asset)?
            .transfer_from(&vault, from, &vault, amount)?;
        Ok(())
    }

    /// Reads a module storage slot.
    pub fn slot(&self, key: &str) -> u64 {
        self.storage.slot(key)
    }

    /// Writes a module storage slot.
    pub fn set_slot(&mut self, key: impl Into<String>, value: u64) {
        self.storage.set_slot(key, value);
    }

    /// Read-only view of the same state.
    pub fn view(&self) -> StrategyView<'_> {
        StrategyView {
            vault: self.vault,
            asset: self.asset,
            now: self.now,
            storage: &*self.storage,
            assets: &*self.assets,
        }
    }
}

/// Read-only handle passed to `report_balance`.
pub struct StrategyView<'a> {
    pub vault: Address,
    pub asset: Address,
    pub now: DateTime<Utc>,
    pub storage: &'a VaultStorage,
    pub assets: &'a AssetBook,
}

impl StrategyView<'_> {
    /// Balance of `holder` in the vault's asset.
    pub fn balance_of(&self, holder: &Address) -> u64 {
        self.assets.balance_of(&self.asset, holder)
    }

    pub fn slot(&self, key: &str) -> u64 {
        self.storage.slot(key)
    }
}

// ---------------------------------------------------------------------------
// Module interface
// ---------------------------------------------------------------------------

/// A pluggable yield strategy.
pub trait Strategy: Send + Sync {
    /// Human-readable module name for logs.
    fn name(&self) -> &str;

    /// Deploys `amount` of the vault's idle assets.
    fn invest(&self, ctx: &mut StrategyContext<'_>, amount: u64) -> Result<(), StrategyError>;

    /// Returns up to `amount` to the vault's idle balance. Returns the amount
    /// actually released.
    fn divest(&self, ctx: &mut StrategyContext<'_>, amount: u64) -> Result<u64, StrategyError>;

    /// Current value held by the module on the vault's behalf.
    fn report_balance(&self, view: &StrategyView<'_>) -> Result<u64, StrategyError>;
}

/// Deployed strategy modules, keyed by address.
#[derive(Clone, Default)]
pub struct ModuleTable {
    modules: BTreeMap<Address, Arc<dyn Strategy>>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `module` at `address`, replacing any previous module.
    pub fn install(&mut self, address: Address, module: Arc<dyn Strategy>) {
        tracing::debug!(%address, name = module.name(), "strategy module installed");
        self.modules.insert(address, module);
    }

    pub fn remove(&mut self, address: &Address) -> Option<Arc<dyn Strategy>> {
        self.modules.remove(address)
    }

    pub fn get(&self, address: &Address) -> Option<Arc<dyn Strategy>> {
        self.modules.get(address).cloned()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.modules.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl fmt::Debug for ModuleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.modules.iter().map(|(a, m)| (a, m.name())))
            .finish()
    }
}
