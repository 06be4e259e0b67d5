//! Shared fixture: a full chain with one asset, a pool strategy, a
//! bootstrapped factory and a router.

#![allow(dead_code)]

use std::sync::Arc;

use strata_contracts::{Chain, Factory, PoolStrategy, Router, Strategy, Vault, VaultParams};
use strata_protocol::config::UNLIMITED_ALLOWANCE;
use strata_protocol::logging::{try_init_logging, LogFormat};
use strata_protocol::{Address, DeploymentConfig, FungibleToken, LogicalClock, MarketTag};

pub const STARTING_BALANCE: u64 = 1_000_000;

pub fn addr(label: &str) -> Address {
    Address::derive(label)
}

pub fn tag(market: &str) -> MarketTag {
    MarketTag::new(market).unwrap()
}

pub struct Deployment {
    pub chain: Chain,
    pub factory: Factory,
    pub router: Router,
    pub deployer: Address,
    pub treasury: Address,
    pub asset: Address,
    pools: Vec<Address>,
}

impl Deployment {
    /// Deploys registry, router and factory, and registers the `usdc` asset.
    pub fn new(config: DeploymentConfig) -> Self {
        // Every test in the binary shares one subscriber.
        let _ = try_init_logging("warn", LogFormat::Pretty);
        let deployer = addr("deployer");
        let mut chain = Chain::new(deployer, LogicalClock::default());
        let router = Router::new(addr("router"), deployer, &config).unwrap();
        let factory = Factory::new(addr("factory"), deployer, router.address(), config).unwrap();
        factory.bootstrap(&mut chain, &deployer).unwrap();

        let asset = addr("usdc");
        chain.host.assets.register_asset(asset).unwrap();

        Self {
            chain,
            factory,
            router,
            deployer,
            treasury: addr("treasury"),
            asset,
            pools: Vec::new(),
        }
    }

    /// Default config with an immediate timelock.
    pub fn instant() -> Self {
        Self::new(DeploymentConfig {
            strategy_timelock_secs: 0,
            ..DeploymentConfig::default()
        })
    }

    /// Deploys a pool strategy at `strategy/<label>` backed by the `label`
    /// account. Returns `(strategy, pool)`.
    ///
    /// Every pool approves every vault, present and future, so divests work
    /// after migrations too.
    pub fn pool_strategy(&mut self, label: &str) -> (Address, Address) {
        let strategy = addr(&format!("strategy/{label}"));
        let pool = addr(label);
        self.install(strategy, Arc::new(PoolStrategy::new(label, pool)));
        self.register_pool(pool);
        (strategy, pool)
    }

    /// Has `pool` approve every vault as a spender.
    pub fn register_pool(&mut self, pool: Address) {
        self.pools.push(pool);
        self.approve_pools();
    }

    fn approve_pools(&mut self) {
        let vaults: Vec<Address> = self.chain.vaults().map(Vault::address).collect();
        let ledger = self.chain.host.assets.token_mut(&self.asset).unwrap();
        for pool in &self.pools {
            for vault in &vaults {
                ledger.approve(pool, vault, UNLIMITED_ALLOWANCE).unwrap();
            }
        }
    }

    /// Deploys genuine code at `strategy` with `module` behind it.
    pub fn install(&mut self, strategy: Address, module: Arc<dyn Strategy>) {
        let code = [b"\x60\x80".as_slice(), strategy.as_bytes().as_slice()].concat();
        self.chain.host.deploy_strategy(strategy, code, module);
    }

    /// Creates the `(usdc, market)` vault on `strategy`.
    pub fn vault(&mut self, market: &str, strategy: Address, fee_rate_bps: u16) -> Address {
        let params = VaultParams {
            asset: self.asset,
            market: tag(market),
            strategy,
            fee_rate_bps: Some(fee_rate_bps),
            fee_recipient: self.treasury,
        };
        let vault = self.factory.create_vault(&mut self.chain, &self.deployer, params).unwrap();
        self.approve_pools();
        vault
    }

    /// Funds `user` and grants the router unlimited allowances over their
    /// assets and over their shares in each of `vaults`.
    pub fn enroll(&mut self, user: Address, vaults: &[Address]) {
        let router = self.router.address();
        self.chain.host.assets.mint(&self.asset, &user, STARTING_BALANCE).unwrap();
        self.chain
            .host
            .assets
            .token_mut(&self.asset)
            .unwrap()
            .approve(&user, &router, UNLIMITED_ALLOWANCE)
            .unwrap();
        for vault in vaults {
            self.vault_ref_mut(vault).approve(&user, &router, UNLIMITED_ALLOWANCE).unwrap();
        }
    }

    pub fn vault_ref(&self, vault: &Address) -> &Vault {
        self.chain.vault(vault).unwrap()
    }

    pub fn vault_ref_mut(&mut self, vault: &Address) -> &mut Vault {
        self.chain.vault_mut(vault).unwrap()
    }

    pub fn balance(&self, holder: &Address) -> u64 {
        self.chain.host.assets.balance_of(&self.asset, holder)
    }

    pub fn shares(&self, vault: &Address, holder: &Address) -> u64 {
        self.vault_ref(vault).balance_of(holder)
    }

    pub fn total_assets(&self, vault: &Address) -> u64 {
        self.vault_ref(vault).total_assets(&self.chain.host).unwrap()
    }

    /// Yield (positive) or loss (negative) accruing directly in `pool`.
    pub fn accrue(&mut self, pool: &Address, delta: i64) {
        let asset = self.asset;
        if delta >= 0 {
            self.chain.host.assets.mint(&asset, pool, delta as u64).unwrap();
        } else {
            self.chain.host.assets.burn(&asset, pool, delta.unsigned_abs()).unwrap();
        }
    }

    /// Crystallizes fees on `vault` as the deployer (the vault owner).
    pub fn crystallize(&mut self, vault: &Address) -> Option<strata_contracts::FeeAssessment> {
        let deployer = self.deployer;
        let (v, host) = self.chain.vault_and_host(vault).unwrap();
        v.crystallize_fees(host, &deployer).unwrap()
    }

    pub fn deposit(&mut self, user: Address, market: &str, assets: u64) -> u64 {
        let asset = self.asset;
        self.router
            .deposit(&mut self.chain, &user, &asset, &tag(market), assets, &user)
            .unwrap()
    }

    pub fn redeem(&mut self, user: Address, market: &str, shares: u64) -> u64 {
        let asset = self.asset;
        self.router
            .redeem(&mut self.chain, &user, &asset, &tag(market), shares, &user, &user)
            .unwrap()
    }
}
