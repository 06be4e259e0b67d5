//! # Router
//!
//! Stateless façade over every registered vault. Resolves `(asset, market)`
//! through the registry and forwards the four ledger operations, singly or
//! in atomic batches.
//!
//! ## Fund flow
//!
//! Deposits and mints pull the caller's assets into the router using the
//! caller's asset allowance to the router, approve the vault for exactly
//! that amount, and call the vault as its designated router. Withdrawals
//! and redemptions call the vault directly; the vault then spends the
//! owner's share allowance to the router.
//!
//! ## Identity rule
//!
//! For withdraw and redeem the `owner` must be the caller. The router never
//! acts on a third party's shares, even when that party's allowance would
//! let it; one user's allowance mistake must not be reachable through the
//! shared entry point.

use strata_protocol::config::MAX_AMOUNT;
use strata_protocol::{Address, ConfigError, DeploymentConfig, FungibleToken, MarketTag, TokenError};
use thiserror::Error;

use crate::chain::{Chain, Host};
use crate::error::{ErrorKind, VaultError};
use crate::events::VaultEvent;
use crate::vault::Vault;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Router failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// Withdraw/redeem named an owner other than the caller.
    #[error("unauthorized: caller {caller} cannot act for owner {owner}")]
    OwnerMismatch { caller: Address, owner: Address },

    #[error("unauthorized: {0} does not own the router")]
    NotOwner(Address),

    #[error("no vault registered for asset {asset} in market {market}")]
    UnknownVault { asset: Address, market: MarketTag },

    /// No market given and no preferred market set.
    #[error("no market given and no preferred market for asset {0}")]
    NoPreferredMarket(Address),

    #[error("batch is empty")]
    EmptyBatch,

    #[error("batch of {len} legs exceeds limit {max}")]
    BatchTooLarge { len: usize, max: usize },

    #[error("zero address supplied for {0}")]
    ZeroAddress(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Vault(#[from] VaultError),
}

impl RouterError {
    /// Classifies the error, delegating to the vault where it failed.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RouterError::OwnerMismatch { .. } | RouterError::NotOwner(_) => ErrorKind::Authorization,
            RouterError::Token(TokenError::InsufficientAllowance { .. }) => ErrorKind::Authorization,
            RouterError::Token(TokenError::InsufficientBalance { .. }) => ErrorKind::InsufficientFunds,
            RouterError::Token(_) => ErrorKind::Configuration,
            RouterError::Vault(e) => e.kind(),
            RouterError::EmptyBatch => ErrorKind::InvalidAmount,
            RouterError::UnknownVault { .. }
            | RouterError::NoPreferredMarket(_)
            | RouterError::BatchTooLarge { .. }
            | RouterError::ZeroAddress(_)
            | RouterError::Config(_) => ErrorKind::Configuration,
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// One leg of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLeg {
    pub asset: Address,
    pub market: MarketTag,
    pub amount: u64,
}

impl BatchLeg {
    pub fn new(asset: Address, market: MarketTag, amount: u64) -> Self {
        Self { asset, market, amount }
    }
}

/// Multi-vault router. Holds no balances of its own between calls.
#[derive(Debug, Clone)]
pub struct Router {
    address: Address,
    owner: Address,
    max_batch_legs: usize,
}

impl Router {
    pub fn new(address: Address, owner: Address, config: &DeploymentConfig) -> Result<Self, RouterError> {
        config.validate()?;
        if address.is_zero() {
            return Err(RouterError::ZeroAddress("router"));
        }
        if owner.is_zero() {
            return Err(RouterError::ZeroAddress("router owner"));
        }
        Ok(Self {
            address,
            owner,
            max_batch_legs: config.max_batch_legs,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Resolves the vault for `asset` in `market`, or in the asset's
    /// preferred market when `market` is `None`.
    pub fn vault_for(
        &self,
        chain: &Chain,
        asset: &Address,
        market: Option<&MarketTag>,
    ) -> Result<Address, RouterError> {
        let market = match market {
            Some(m) => m,
            None => chain
                .registry
                .preferred_market(asset)
                .ok_or(RouterError::NoPreferredMarket(*asset))?,
        };
        chain
            .registry
            .vault_for(asset, market)
            .ok_or_else(|| RouterError::UnknownVault {
                asset: *asset,
                market: market.clone(),
            })
    }

    // -- single operations --------------------------------------------------

    /// Deposits `assets` of the caller's into the vault for `(asset, market)`.
    /// Returns the shares minted to `receiver`.
    pub fn deposit(
        &self,
        chain: &mut Chain,
        caller: &Address,
        asset: &Address,
        market: &MarketTag,
        assets: u64,
        receiver: &Address,
    ) -> Result<u64, RouterError> {
        chain.atomically(|chain| self.deposit_leg(chain, caller, asset, market, assets, receiver))
    }

    /// Mints exactly `shares` to `receiver`. Returns the assets pulled.
    pub fn mint(
        &self,
        chain: &mut Chain,
        caller: &Address,
        asset: &Address,
        market: &MarketTag,
        shares: u64,
        receiver: &Address,
    ) -> Result<u64, RouterError> {
        chain.atomically(|chain| self.mint_leg(chain, caller, asset, market, shares, receiver))
    }

    /// Withdraws `assets` from the caller's own position.
    #[allow(clippy::too_many_arguments)]
    pub fn withdraw(
        &self,
        chain: &mut Chain,
        caller: &Address,
        asset: &Address,
        market: &MarketTag,
        assets: u64,
        receiver: &Address,
        owner: &Address,
    ) -> Result<u64, RouterError> {
        Self::ensure_self(caller, owner)?;
        chain.atomically(|chain| self.withdraw_leg(chain, caller, asset, market, assets, receiver))
    }

    /// Redeems `shares` from the caller's own position.
    #[allow(clippy::too_many_arguments)]
    pub fn redeem(
        &self,
        chain: &mut Chain,
        caller: &Address,
        asset: &Address,
        market: &MarketTag,
        shares: u64,
        receiver: &Address,
        owner: &Address,
    ) -> Result<u64, RouterError> {
        Self::ensure_self(caller, owner)?;
        chain.atomically(|chain| self.redeem_leg(chain, caller, asset, market, shares, receiver))
    }

    // -- batches ------------------------------------------------------------

    /// Deposits into every leg's vault. All legs succeed or none do.
    pub fn deposit_batch(
        &self,
        chain: &mut Chain,
        caller: &Address,
        legs: &[BatchLeg],
        receiver: &Address,
    ) -> Result<Vec<u64>, RouterError> {
        self.check_batch(legs)?;
        chain.atomically(|chain| {
            legs.iter()
                .map(|leg| self.deposit_leg(chain, caller, &leg.asset, &leg.market, leg.amount, receiver))
                .collect()
        })
    }

    pub fn mint_batch(
        &self,
        chain: &mut Chain,
        caller: &Address,
        legs: &[BatchLeg],
        receiver: &Address,
    ) -> Result<Vec<u64>, RouterError> {
        self.check_batch(legs)?;
        chain.atomically(|chain| {
            legs.iter()
                .map(|leg| self.mint_leg(chain, caller, &leg.asset, &leg.market, leg.amount, receiver))
                .collect()
        })
    }

    /// Withdraws from every leg's vault on the caller's own behalf.
    pub fn withdraw_batch(
        &self,
        chain: &mut Chain,
        caller: &Address,
        legs: &[BatchLeg],
        receiver: &Address,
        owner: &Address,
    ) -> Result<Vec<u64>, RouterError> {
        Self::ensure_self(caller, owner)?;
        self.check_batch(legs)?;
        chain.atomically(|chain| {
            legs.iter()
                .map(|leg| self.withdraw_leg(chain, caller, &leg.asset, &leg.market, leg.amount, receiver))
                .collect()
        })
    }

    pub fn redeem_batch(
        &self,
        chain: &mut Chain,
        caller: &Address,
        legs: &[BatchLeg],
        receiver: &Address,
        owner: &Address,
    ) -> Result<Vec<u64>, RouterError> {
        Self::ensure_self(caller, owner)?;
        self.check_batch(legs)?;
        chain.atomically(|chain| {
            legs.iter()
                .map(|leg| self.redeem_leg(chain, caller, &leg.asset, &leg.market, leg.amount, receiver))
                .collect()
        })
    }

    // -- recovery -----------------------------------------------------------

    /// Redeems every share of the `(asset, market)` vault stranded at the
    /// router to `recovery`. Owner-only. Returns the assets recovered, 0 when
    /// nothing was stranded.
    pub fn sweep(
        &self,
        chain: &mut Chain,
        caller: &Address,
        asset: &Address,
        market: &MarketTag,
        recovery: &Address,
    ) -> Result<u64, RouterError> {
        if *caller != self.owner {
            return Err(RouterError::NotOwner(*caller));
        }
        if recovery.is_zero() {
            return Err(RouterError::ZeroAddress("recovery"));
        }
        chain.atomically(|chain| {
            let vault_address = self.vault_for(chain, asset, Some(market))?;
            let (vault, host) = self.vault_and_host(chain, &vault_address, asset, market)?;
            let shares = vault.balance_of(&self.address);
            if shares == 0 {
                return Ok(0);
            }
            let assets = vault.redeem(host, &self.address, shares, recovery, &self.address)?;
            tracing::warn!(vault = %vault_address, %recovery, shares, assets, "stranded router shares swept");
            host.emit(VaultEvent::SharesSwept {
                vault: vault_address,
                recovery: *recovery,
                shares,
                assets,
            });
            Ok(assets)
        })
    }

    // -- internals ----------------------------------------------------------

    fn ensure_self(caller: &Address, owner: &Address) -> Result<(), RouterError> {
        if caller != owner {
            tracing::warn!(%caller, %owner, "router refused to act for a different owner");
            return Err(RouterError::OwnerMismatch {
                caller: *caller,
                owner: *owner,
            });
        }
        Ok(())
    }

    fn check_batch(&self, legs: &[BatchLeg]) -> Result<(), RouterError> {
        if legs.is_empty() {
            return Err(RouterError::EmptyBatch);
        }
        if legs.len() > self.max_batch_legs {
            return Err(RouterError::BatchTooLarge {
                len: legs.len(),
                max: self.max_batch_legs,
            });
        }
        Ok(())
    }

    fn vault_and_host<'c>(
        &self,
        chain: &'c mut Chain,
        vault: &Address,
        asset: &Address,
        market: &MarketTag,
    ) -> Result<(&'c mut Vault, &'c mut Host), RouterError> {
        chain
            .vault_and_host(vault)
            .ok_or_else(|| RouterError::UnknownVault {
                asset: *asset,
                market: market.clone(),
            })
    }

    /// Moves `amount` of the caller's asset to the router and approves the
    /// vault for it.
    fn pull(
        chain: &mut Chain,
        router: &Address,
        caller: &Address,
        asset: &Address,
        vault: &Address,
        amount: u64,
    ) -> Result<(), RouterError> {
        let ledger = chain.host.assets.token_mut(asset)?;
        ledger.transfer_from(router, caller, router, amount)?;
        ledger.approve(router, vault, amount)?;
        Ok(())
    }

    fn deposit_leg(
        &self,
        chain: &mut Chain,
        caller: &Address,
        asset: &Address,
        market: &MarketTag,
        assets: u64,
        receiver: &Address,
    ) -> Result<u64, RouterError> {
        let vault_address = self.vault_for(chain, asset, Some(market))?;
        let assets = if assets == MAX_AMOUNT {
            chain.host.assets.balance_of(asset, caller)
        } else {
            assets
        };
        Self::pull(chain, &self.address, caller, asset, &vault_address, assets)?;
        let (vault, host) = self.vault_and_host(chain, &vault_address, asset, market)?;
        Ok(vault.deposit(host, &self.address, assets, receiver)?)
    }

    fn mint_leg(
        &self,
        chain: &mut Chain,
        caller: &Address,
        asset: &Address,
        market: &MarketTag,
        shares: u64,
        receiver: &Address,
    ) -> Result<u64, RouterError> {
        let vault_address = self.vault_for(chain, asset, Some(market))?;
        let (vault, host) = self.vault_and_host(chain, &vault_address, asset, market)?;
        // Price after any pending fees, so the preview matches the mint.
        vault.crystallize_fees(host, &self.address)?;
        let shares = if shares == MAX_AMOUNT {
            vault.convert_to_shares(host, host.assets.balance_of(asset, caller))?
        } else {
            shares
        };
        let cost = vault.preview_mint(host, shares)?;

        Self::pull(chain, &self.address, caller, asset, &vault_address, cost)?;
        let (vault, host) = self.vault_and_host(chain, &vault_address, asset, market)?;
        Ok(vault.mint(host, &self.address, shares, receiver)?)
    }

    fn withdraw_leg(
        &self,
        chain: &mut Chain,
        caller: &Address,
        asset: &Address,
        market: &MarketTag,
        assets: u64,
        receiver: &Address,
    ) -> Result<u64, RouterError> {
        let vault_address = self.vault_for(chain, asset, Some(market))?;
        let (vault, host) = self.vault_and_host(chain, &vault_address, asset, market)?;
        Ok(vault.withdraw(host, &self.address, assets, receiver, caller)?)
    }

    fn redeem_leg(
        &self,
        chain: &mut Chain,
        caller: &Address,
        asset: &Address,
        market: &MarketTag,
        shares: u64,
        receiver: &Address,
    ) -> Result<u64, RouterError> {
        let vault_address = self.vault_for(chain, asset, Some(market))?;
        let (vault, host) = self.vault_and_host(chain, &vault_address, asset, market)?;
        Ok(vault.redeem(host, &self.address, shares, receiver, caller)?)
    }
}
