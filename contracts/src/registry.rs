//! # Vault Registry
//!
//! Append-only map `(asset, market) -> vault`, plus an optional preferred
//! market per asset that the router falls back to. Entries are created once
//! and never removed or overwritten.
//!
//! After bootstrap the registry is owned by the factory, so only
//! factory-mediated creation can add entries. The factory owner can hand
//! ownership back if the factory is retired.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strata_protocol::{Address, MarketTag};
use thiserror::Error;

/// Registry failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unauthorized: {0} does not own the registry")]
    NotOwner(Address),

    /// `(asset, market)` already maps to a vault.
    #[error("vault for asset {asset} in market {market} already registered at {existing}")]
    AlreadyRegistered {
        asset: Address,
        market: MarketTag,
        existing: Address,
    },

    #[error("no vault registered for asset {asset} in market {market}")]
    NotRegistered { asset: Address, market: MarketTag },

    #[error("zero address supplied for {0}")]
    ZeroAddress(&'static str),
}

/// One registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub asset: Address,
    pub market: MarketTag,
    pub vault: Address,
}

/// Append-only vault directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    owner: Address,
    vaults: BTreeMap<(Address, MarketTag), Address>,
    preferred: BTreeMap<Address, MarketTag>,
}

impl Registry {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            vaults: BTreeMap::new(),
            preferred: BTreeMap::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    fn ensure_owner(&self, caller: &Address) -> Result<(), RegistryError> {
        if *caller != self.owner {
            return Err(RegistryError::NotOwner(*caller));
        }
        Ok(())
    }

    /// Hands the registry to `new_owner`. Owner-only.
    pub fn transfer_ownership(&mut self, caller: &Address, new_owner: Address) -> Result<(), RegistryError> {
        self.ensure_owner(caller)?;
        if new_owner.is_zero() {
            return Err(RegistryError::ZeroAddress("registry owner"));
        }
        tracing::info!(from = %self.owner, to = %new_owner, "registry ownership transferred");
        self.owner = new_owner;
        Ok(())
    }

    /// Records `vault` for `(asset, market)`. Owner-only; duplicates fail.
    pub fn register(
        &mut self,
        caller: &Address,
        asset: Address,
        market: MarketTag,
        vault: Address,
    ) -> Result<(), RegistryError> {
        self.ensure_owner(caller)?;
        if asset.is_zero() {
            return Err(RegistryError::ZeroAddress("asset"));
        }
        if vault.is_zero() {
            return Err(RegistryError::ZeroAddress("vault"));
        }
        if let Some(existing) = self.vaults.get(&(asset, market.clone())) {
            return Err(RegistryError::AlreadyRegistered {
                asset,
                market,
                existing: *existing,
            });
        }
        tracing::info!(%asset, %market, %vault, "vault registered");
        self.vaults.insert((asset, market), vault);
        Ok(())
    }

    pub fn vault_for(&self, asset: &Address, market: &MarketTag) -> Option<Address> {
        self.vaults.get(&(*asset, market.clone())).copied()
    }

    pub fn preferred_market(&self, asset: &Address) -> Option<&MarketTag> {
        self.preferred.get(asset)
    }

    /// Sets the market the router uses when none is given. The entry must
    /// already exist. Owner-only.
    pub fn set_preferred_market(
        &mut self,
        caller: &Address,
        asset: Address,
        market: MarketTag,
    ) -> Result<(), RegistryError> {
        self.ensure_owner(caller)?;
        if self.vault_for(&asset, &market).is_none() {
            return Err(RegistryError::NotRegistered { asset, market });
        }
        self.preferred.insert(asset, market);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.vaults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vaults.is_empty()
    }

    /// All entries in `(asset, market)` order.
    pub fn entries(&self) -> impl Iterator<Item = RegistryEntry> + '_ {
        self.vaults.iter().map(|((asset, market), vault)| RegistryEntry {
            asset: *asset,
            market: market.clone(),
            vault: *vault,
        })
    }
}
