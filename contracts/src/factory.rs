//! # Vault Factory
//!
//! Deploys vaults at deterministic addresses and records them in the
//! registry.
//!
//! ## Lifecycle
//!
//! 1. The registry owner calls [`Factory::bootstrap`], handing registry
//!    ownership to the factory.
//! 2. The factory owner calls [`Factory::create_vault`] per `(asset, market)`.
//!    The address is known in advance via [`Factory::predict_address`]:
//!
//!    ```text
//!    salt    = BLAKE3("strata/vault" 0x00 asset 0x00 market)
//!    address = SHA-256(0xff || factory || salt || BLAKE3(vault code))[12..]
//!    ```
//!
//! 3. If the factory is retired, [`Factory::release_registry`] gives direct
//!    registry control back to a chosen owner.
//!
//! Every configuration check runs before anything is deployed, and creation
//! is atomic across the chain: a vault that fails validation never reaches
//! a running state.

use strata_protocol::config::VAULT_BYTECODE;
use strata_protocol::hash::{blake3_hash, derive_contract_address, vault_salt};
use strata_protocol::{Address, CodeInspector, ConfigError, DeploymentConfig, MarketTag};
use thiserror::Error;

use crate::access::{AccessControl, AccessError};
use crate::chain::Chain;
use crate::events::VaultEvent;
use crate::fees::FeeState;
use crate::registry::RegistryError;
use crate::strategy::{GateError, StrategyGate};
use crate::vault::{Vault, VaultStorage};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Factory failures. All are configuration-time errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactoryError {
    #[error("unauthorized: {0} does not own the factory")]
    NotOwner(Address),

    #[error("zero address supplied for {0}")]
    ZeroAddress(&'static str),

    /// The asset has no ledger on this chain.
    #[error("unknown asset {0}")]
    UnknownAsset(Address),

    #[error("fee rate {rate} bps exceeds ceiling {ceiling} bps")]
    FeeTooHigh { rate: u16, ceiling: u16 },

    /// Something already lives at the derived address.
    #[error("address {0} is already occupied")]
    AddressOccupied(Address),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The initial strategy failed the gate's code checks.
    #[error(transparent)]
    Strategy(#[from] GateError),

    #[error(transparent)]
    Access(#[from] AccessError),
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Parameters of one vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultParams {
    pub asset: Address,
    pub market: MarketTag,
    /// Initial strategy, bound directly.
    pub strategy: Address,
    /// Defaults to the deployment's default rate.
    pub fee_rate_bps: Option<u16>,
    pub fee_recipient: Address,
}

/// Deterministic vault deployer.
#[derive(Debug, Clone)]
pub struct Factory {
    address: Address,
    owner: Address,
    router: Address,
    config: DeploymentConfig,
}

impl Factory {
    /// Creates a factory. Vaults it deploys are owned by `owner` and accept
    /// `router` as their designated router.
    pub fn new(
        address: Address,
        owner: Address,
        router: Address,
        config: DeploymentConfig,
    ) -> Result<Self, FactoryError> {
        config.validate()?;
        for (account, what) in [(address, "factory"), (owner, "factory owner"), (router, "router")] {
            if account.is_zero() {
                return Err(FactoryError::ZeroAddress(what));
            }
        }
        Ok(Self {
            address,
            owner,
            router,
            config,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn router(&self) -> Address {
        self.router
    }

    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    fn ensure_owner(&self, caller: &Address) -> Result<(), FactoryError> {
        if *caller != self.owner {
            return Err(FactoryError::NotOwner(*caller));
        }
        Ok(())
    }

    /// Takes registry ownership. `caller` must currently own the registry.
    pub fn bootstrap(&self, chain: &mut Chain, caller: &Address) -> Result<(), FactoryError> {
        chain.registry.transfer_ownership(caller, self.address)?;
        tracing::info!(factory = %self.address, "registry bootstrapped to factory");
        Ok(())
    }

    /// Address the vault for `(asset, market)` will be deployed at.
    pub fn predict_address(&self, asset: &Address, market: &MarketTag) -> Address {
        let salt = vault_salt(asset, market);
        derive_contract_address(&self.address, &salt, &blake3_hash(VAULT_BYTECODE))
    }

    /// Deploys, binds and registers a new vault. Owner-only.
    pub fn create_vault(
        &self,
        chain: &mut Chain,
        caller: &Address,
        params: VaultParams,
    ) -> Result<Address, FactoryError> {
        self.ensure_owner(caller)?;
        chain.atomically(|chain| self.deploy(chain, params))
    }

    fn deploy(&self, chain: &mut Chain, params: VaultParams) -> Result<Address, FactoryError> {
        let VaultParams {
            asset,
            market,
            strategy,
            fee_rate_bps,
            fee_recipient,
        } = params;

        if asset.is_zero() {
            return Err(FactoryError::ZeroAddress("asset"));
        }
        if strategy.is_zero() {
            return Err(FactoryError::ZeroAddress("strategy"));
        }
        if fee_recipient.is_zero() {
            return Err(FactoryError::ZeroAddress("fee recipient"));
        }
        if !chain.host.assets.is_registered(&asset) {
            return Err(FactoryError::UnknownAsset(asset));
        }
        let ceiling = self.config.max_fee_rate_bps;
        let rate = fee_rate_bps.unwrap_or(self.config.default_fee_rate_bps);
        if rate > ceiling {
            return Err(FactoryError::FeeTooHigh { rate, ceiling });
        }
        if let Some(existing) = chain.registry.vault_for(&asset, &market) {
            return Err(RegistryError::AlreadyRegistered {
                asset,
                market,
                existing,
            }
            .into());
        }

        let address = self.predict_address(&asset, &market);
        if chain.vault(&address).is_some() || chain.host.code.has_code(&address) {
            return Err(FactoryError::AddressOccupied(address));
        }

        let mut gate = StrategyGate::new(self.config.strategy_timelock_secs);
        gate.bind_initial(strategy, &chain.host.code)?;
        let storage = VaultStorage::new(
            AccessControl::new(self.owner, self.router)?,
            FeeState::new(rate, fee_recipient),
            ceiling,
            gate,
        );
        let vault = Vault::new(address, asset, market.clone(), chain.host.clock.now(), storage);

        chain.registry.register(&self.address, asset, market.clone(), address)?;
        chain.host.code.deploy(address, VAULT_BYTECODE.to_vec());
        chain.insert_vault(vault);

        tracing::info!(vault = %address, %asset, %market, %strategy, fee_bps = rate, "vault created");
        chain.host.emit(VaultEvent::VaultRegistered {
            vault: address,
            asset,
            market,
        });
        Ok(address)
    }

    /// Sets the router's fallback market for `asset` in the factory-owned
    /// registry. Factory-owner only.
    pub fn set_preferred_market(
        &self,
        chain: &mut Chain,
        caller: &Address,
        asset: Address,
        market: MarketTag,
    ) -> Result<(), FactoryError> {
        self.ensure_owner(caller)?;
        chain.registry.set_preferred_market(&self.address, asset, market)?;
        Ok(())
    }

    /// Hands direct registry control to `new_owner`. Factory-owner only.
    pub fn release_registry(
        &self,
        chain: &mut Chain,
        caller: &Address,
        new_owner: Address,
    ) -> Result<(), FactoryError> {
        self.ensure_owner(caller)?;
        chain.registry.transfer_ownership(&self.address, new_owner)?;
        tracing::warn!(factory = %self.address, %new_owner, "registry released");
        Ok(())
    }
}
