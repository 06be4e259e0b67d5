//! # Vault
//!
//! A pooled-asset vault issuing fungible shares against one underlying
//! asset and delegating deployment to a single active strategy module.
//!
//! ## Storage
//!
//! [`VaultStorage`] is the vault's whole mutable state. It is also exactly
//! what a strategy module receives through shared-storage invocation, so its
//! fields are public: the module *can* write any of them. The vault
//! therefore:
//!
//! 1. runs the [`StrategyGate`] checks before every invocation;
//! 2. compares the protected part of storage (everything except the module
//!    slots) before and after every `invest`/`divest`, failing the whole
//!    operation on any difference.
//!
//! ## Atomicity
//!
//! Every mutating entry point runs inside [`Vault::atomically`]: vault
//! storage, the host asset book and the event log are snapshotted and
//! restored if anything fails, strategy failures included. A partially
//! invested or divested state is never observable.
//!
//! ## Entry points
//!
//! - ledger operations and views: `ledger.rs`
//! - owner-only administration: `admin.rs`

mod admin;
mod ledger;
pub mod math;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strata_protocol::{Address, MarketTag, TokenLedger};

use crate::access::AccessControl;
use crate::chain::Host;
use crate::error::VaultError;
use crate::fees::FeeState;
use crate::strategy::{GateError, Strategy, StrategyContext, StrategyError, StrategyGate, StrategyView};

pub use math::Rounding;

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// The vault's own storage, shared with its active strategy module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultStorage {
    /// Share token ledger.
    pub shares: TokenLedger,
    /// Fee parameters and high-water mark.
    pub fees: FeeState,
    /// Fee rate ceiling fixed at creation.
    pub fee_ceiling_bps: u16,
    /// Owner, router and authorized callers.
    pub access: AccessControl,
    /// Whitelist, active slot and pending change.
    pub gate: StrategyGate,
    /// Deposits, mints, withdrawals and redemptions blocked.
    pub paused: bool,
    /// Words owned by strategy modules.
    pub slots: BTreeMap<String, u64>,
}

impl VaultStorage {
    pub fn new(access: AccessControl, fees: FeeState, fee_ceiling_bps: u16, gate: StrategyGate) -> Self {
        Self {
            shares: TokenLedger::new(),
            fees,
            fee_ceiling_bps,
            access,
            gate,
            paused: false,
            slots: BTreeMap::new(),
        }
    }

    /// Reads a module slot; unset slots read as 0.
    pub fn slot(&self, key: &str) -> u64 {
        self.slots.get(key).copied().unwrap_or(0)
    }

    /// Writes a module slot; writing 0 clears it.
    pub fn set_slot(&mut self, key: impl Into<String>, value: u64) {
        let key = key.into();
        if value == 0 {
            self.slots.remove(&key);
        } else {
            self.slots.insert(key, value);
        }
    }

    /// `true` if everything but the module slots is identical.
    fn protected_matches(&self, other: &Self) -> bool {
        self.shares == other.shares
            && self.fees == other.fees
            && self.fee_ceiling_bps == other.fee_ceiling_bps
            && self.access == other.access
            && self.gate == other.gate
            && self.paused == other.paused
    }
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// One deployed vault.
#[derive(Debug, Clone)]
pub struct Vault {
    address: Address,
    asset: Address,
    market: MarketTag,
    created_at: DateTime<Utc>,
    storage: VaultStorage,
}

impl Vault {
    /// Assembles a vault around prepared storage. Deployment (address
    /// derivation, code installation, registration) is the factory's job.
    pub fn new(
        address: Address,
        asset: Address,
        market: MarketTag,
        created_at: DateTime<Utc>,
        storage: VaultStorage,
    ) -> Self {
        Self {
            address,
            asset,
            market,
            created_at,
            storage,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// The underlying asset. Immutable.
    pub fn asset(&self) -> Address {
        self.asset
    }

    pub fn market(&self) -> &MarketTag {
        &self.market
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Read-only storage, for inspection and tests.
    pub fn storage(&self) -> &VaultStorage {
        &self.storage
    }

    /// Runs `op` as one atomic unit.
    pub(crate) fn atomically<T>(
        &mut self,
        host: &mut Host,
        op: impl FnOnce(&mut Self, &mut Host) -> Result<T, VaultError>,
    ) -> Result<T, VaultError> {
        let storage = self.storage.clone();
        let assets = host.assets.clone();
        let events = host.events.len();

        let result = op(self, host);
        if let Err(err) = &result {
            tracing::debug!(vault = %self.address, error = %err, "operation rolled back");
            self.storage = storage;
            host.assets = assets;
            host.events.truncate(events);
        }
        result
    }

    fn ensure_live(&self) -> Result<(), VaultError> {
        if self.storage.paused {
            return Err(VaultError::Paused);
        }
        Ok(())
    }

    fn active_reference(&self) -> Result<Address, VaultError> {
        Ok(self.storage.gate.active().ok_or(GateError::NoActiveStrategy)?)
    }

    fn module_at(host: &Host, reference: &Address) -> Result<std::sync::Arc<dyn Strategy>, VaultError> {
        Ok(host
            .modules
            .get(reference)
            .ok_or(GateError::ModuleMissing(*reference))?)
    }

    /// Gated shared-storage invocation of `reference`.
    fn invoke<R>(
        &mut self,
        host: &mut Host,
        reference: Address,
        op: impl FnOnce(&dyn Strategy, &mut StrategyContext<'_>) -> Result<R, StrategyError>,
    ) -> Result<R, VaultError> {
        self.storage.gate.authorize(&reference, &host.code)?;
        let module = Self::module_at(host, &reference)?;

        let before = self.storage.clone();
        let mut ctx = StrategyContext::new(
            self.address,
            self.asset,
            host.clock.now(),
            &mut self.storage,
            &mut host.assets,
        );
        let out = op(module.as_ref(), &mut ctx).map_err(|source| {
            tracing::warn!(vault = %self.address, module = %reference, error = %source, "strategy call failed");
            VaultError::Strategy {
                module: reference,
                source,
            }
        })?;

        if !self.storage.protected_matches(&before) {
            tracing::error!(vault = %self.address, module = %reference, "strategy wrote protected vault storage");
            return Err(GateError::StorageTampered(reference).into());
        }
        Ok(out)
    }

    /// Deploys `amount` of idle assets through the active strategy.
    fn invest(&mut self, host: &mut Host, amount: u64) -> Result<(), VaultError> {
        if amount == 0 {
            return Ok(());
        }
        let reference = self.active_reference()?;
        self.invoke(host, reference, |module, ctx| module.invest(ctx, amount))?;
        tracing::debug!(vault = %self.address, strategy = %reference, amount, "invested");
        Ok(())
    }

    /// Pulls `amount` back from the active strategy, returning what it
    /// released.
    fn divest(&mut self, host: &mut Host, amount: u64) -> Result<u64, VaultError> {
        if amount == 0 {
            return Ok(0);
        }
        let reference = self.active_reference()?;
        let released = self.invoke(host, reference, |module, ctx| module.divest(ctx, amount))?;
        tracing::debug!(vault = %self.address, strategy = %reference, amount, released, "divested");
        Ok(released)
    }

    /// Value held by the active strategy, read through the gate.
    fn strategy_balance(&self, host: &Host) -> Result<u64, VaultError> {
        let reference = self.active_reference()?;
        self.storage.gate.authorize(&reference, &host.code)?;
        let module = Self::module_at(host, &reference)?;
        let view = StrategyView {
            vault: self.address,
            asset: self.asset,
            now: host.clock.now(),
            storage: &self.storage,
            assets: &host.assets,
        };
        module
            .report_balance(&view)
            .map_err(|source| VaultError::Strategy {
                module: reference,
                source,
            })
    }

    /// Makes sure at least `required` assets sit idle, divesting the
    /// shortfall if needed.
    fn ensure_liquidity(&mut self, host: &mut Host, required: u64) -> Result<(), VaultError> {
        let idle = self.idle_assets(host);
        if idle >= required {
            return Ok(());
        }
        self.divest(host, required - idle)?;
        let idle = self.idle_assets(host);
        if idle < required {
            return Err(VaultError::InsufficientLiquidity { idle, required });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
