use std::sync::Arc;

use strata_protocol::config::{MAX_AMOUNT, PPS_SCALE, UNLIMITED_ALLOWANCE, VAULT_BYTECODE};
use strata_protocol::{Address, FungibleToken, MarketTag};

use super::*;
use crate::access::AccessError;
use crate::error::ErrorKind;
use crate::events::{VaultEvent, WithdrawKind};
use crate::strategies::PoolStrategy;

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

struct Fixture {
    host: Host,
    vault: Vault,
    asset: Address,
    owner: Address,
    keeper: Address,
    alice: Address,
    treasury: Address,
    strategy: Address,
    pool: Address,
}

fn addr(label: &str) -> Address {
    Address::derive(label)
}

/// Lets `vault` pull from `pool` when divesting.
fn approve_vault(host: &mut Host, asset: Address, pool: Address, vault: Address) {
    host.assets
        .token_mut(&asset)
        .unwrap()
        .approve(&pool, &vault, UNLIMITED_ALLOWANCE)
        .unwrap();
}

fn fixture(fee_bps: u16, timelock_secs: u64) -> Fixture {
    let mut host = Host::default();
    let asset = addr("usdc");
    host.assets.register_asset(asset).unwrap();

    let strategy = addr("strategy/pool-a");
    let pool = addr("pool-a");
    host.deploy_strategy(strategy, b"\x60\x80pool-a".to_vec(), Arc::new(PoolStrategy::new("pool-a", pool)));

    let owner = addr("owner");
    let keeper = addr("keeper");
    let alice = addr("alice");
    let treasury = addr("treasury");

    let mut gate = StrategyGate::new(timelock_secs);
    gate.bind_initial(strategy, &host.code).unwrap();
    let mut access = AccessControl::new(owner, addr("router")).unwrap();
    access.set_authorized(&owner, keeper, true).unwrap();
    let storage = VaultStorage::new(access, FeeState::new(fee_bps, treasury), 5_000, gate);

    let address = addr("vault");
    host.code.deploy(address, VAULT_BYTECODE.to_vec());
    let vault = Vault::new(address, asset, MarketTag::new("lending").unwrap(), host.clock.now(), storage);

    approve_vault(&mut host, asset, pool, address);
    for holder in [owner, keeper, alice] {
        host.assets.mint(&asset, &holder, 10_000).unwrap();
        host.assets
            .token_mut(&asset)
            .unwrap()
            .approve(&holder, &address, UNLIMITED_ALLOWANCE)
            .unwrap();
    }

    Fixture {
        host,
        vault,
        asset,
        owner,
        keeper,
        alice,
        treasury,
        strategy,
        pool,
    }
}

impl Fixture {
    fn balance(&self, holder: &Address) -> u64 {
        self.host.assets.balance_of(&self.asset, holder)
    }

    fn deposit(&mut self, caller: Address, assets: u64) -> Result<u64, VaultError> {
        self.vault.deposit(&mut self.host, &caller, assets, &caller)
    }

    fn gain(&mut self, amount: u64) {
        let (asset, pool) = (self.asset, self.pool);
        self.host.assets.mint(&asset, &pool, amount).unwrap();
    }

    fn deploy_pool_strategy(&mut self, label: &str) -> (Address, Address) {
        let strategy = addr(&format!("strategy/{label}"));
        let pool = addr(label);
        self.host
            .deploy_strategy(strategy, label.as_bytes().to_vec(), Arc::new(PoolStrategy::new(label, pool)));
        let (asset, vault) = (self.asset, self.vault.address());
        approve_vault(&mut self.host, asset, pool, vault);
        (strategy, pool)
    }
}

// ---------------------------------------------------------------------------
// Misbehaving modules
// ---------------------------------------------------------------------------

/// Fails every invest.
struct BrokenStrategy;

impl Strategy for BrokenStrategy {
    fn name(&self) -> &str {
        "broken"
    }
    fn invest(&self, _ctx: &mut StrategyContext<'_>, _amount: u64) -> Result<(), StrategyError> {
        Err(StrategyError::Failed("yield source offline".into()))
    }
    fn divest(&self, _ctx: &mut StrategyContext<'_>, _amount: u64) -> Result<u64, StrategyError> {
        Ok(0)
    }
    fn report_balance(&self, _view: &StrategyView<'_>) -> Result<u64, StrategyError> {
        Ok(0)
    }
}

/// Mints itself shares through shared storage on invest.
struct SkimmingStrategy {
    thief: Address,
}

impl Strategy for SkimmingStrategy {
    fn name(&self) -> &str {
        "skimmer"
    }
    fn invest(&self, ctx: &mut StrategyContext<'_>, amount: u64) -> Result<(), StrategyError> {
        ctx.storage.shares.mint(&self.thief, amount)?;
        Ok(())
    }
    fn divest(&self, _ctx: &mut StrategyContext<'_>, _amount: u64) -> Result<u64, StrategyError> {
        Ok(0)
    }
    fn report_balance(&self, _view: &StrategyView<'_>) -> Result<u64, StrategyError> {
        Ok(0)
    }
}

fn swap_module(f: &mut Fixture, module: Arc<dyn Strategy>) {
    f.host.modules.install(f.strategy, module);
}

// ---------------------------------------------------------------------------
// Ledger operations
// ---------------------------------------------------------------------------

#[test]
fn first_deposit_is_one_to_one_and_invested() {
    let mut f = fixture(0, 0);
    let shares = f.deposit(f.owner, 1_000).unwrap();

    assert_eq!(shares, 1_000);
    assert_eq!(f.vault.balance_of(&f.owner), 1_000);
    assert_eq!(f.balance(&f.pool), 1_000);
    assert_eq!(f.vault.idle_assets(&f.host), 0);
    assert_eq!(f.vault.total_assets(&f.host).unwrap(), 1_000);
    assert!(matches!(
        f.host.events.events().last(),
        Some(VaultEvent::Deposited { assets: 1_000, shares: 1_000, .. })
    ));
}

#[test]
fn pool_principal_is_tracked_in_vault_slots() {
    let mut f = fixture(0, 0);
    f.deposit(f.owner, 1_000).unwrap();
    let module = PoolStrategy::new("pool-a", f.pool);
    assert_eq!(f.vault.storage().slot(&module.principal_slot()), 1_000);
}

#[test]
fn max_sentinel_deposits_full_balance() {
    let mut f = fixture(0, 0);
    let shares = f.deposit(f.keeper, MAX_AMOUNT).unwrap();
    assert_eq!(shares, 10_000);
    assert_eq!(f.balance(&f.keeper), 0);
}

#[test]
fn zero_deposit_is_rejected() {
    let mut f = fixture(0, 0);
    assert_eq!(f.deposit(f.owner, 0), Err(VaultError::ZeroAmount));
}

#[test]
fn non_operator_is_rejected_despite_allowance() {
    let mut f = fixture(0, 0);
    let err = f.deposit(f.alice, 100).unwrap_err();
    assert_eq!(err, VaultError::Access(AccessError::NotOperator(f.alice)));
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(f.balance(&f.alice), 10_000);
}

#[test]
fn withdraw_divests_only_the_shortfall() {
    let mut f = fixture(0, 0);
    f.deposit(f.owner, 1_000).unwrap();
    let owner = f.owner;
    let burned = f.vault.withdraw(&mut f.host, &owner, 400, &owner, &owner).unwrap();

    assert_eq!(burned, 400);
    assert_eq!(f.balance(&f.pool), 600);
    assert_eq!(f.balance(&owner), 9_400);
    assert!(matches!(
        f.host.events.events().last(),
        Some(VaultEvent::Withdrawn { kind: WithdrawKind::Withdraw, assets: 400, shares: 400, .. })
    ));
}

#[test]
fn divest_needs_the_pools_approval() {
    let mut f = fixture(0, 0);
    f.deposit(f.owner, 1_000).unwrap();
    let (asset, pool, vault, owner) = (f.asset, f.pool, f.vault.address(), f.owner);
    f.host.assets.token_mut(&asset).unwrap().approve(&pool, &vault, 0).unwrap();

    let err = f.vault.withdraw(&mut f.host, &owner, 400, &owner, &owner).unwrap_err();
    assert!(matches!(err, VaultError::Strategy { source: StrategyError::Token(_), .. }));
    assert_eq!(f.balance(&pool), 1_000);
    assert_eq!(f.balance(&owner), 9_000);
    assert_eq!(f.vault.balance_of(&owner), 1_000);
}

#[test]
fn redeem_max_exits_completely() {
    let mut f = fixture(0, 0);
    f.deposit(f.owner, 1_000).unwrap();
    f.gain(100);
    let owner = f.owner;
    let paid = f.vault.redeem(&mut f.host, &owner, MAX_AMOUNT, &owner, &owner).unwrap();

    assert_eq!(paid, 1_100);
    assert_eq!(f.vault.total_supply(), 0);
    assert_eq!(f.balance(&owner), 10_100);
}

#[test]
fn withdraw_rounds_shares_up() {
    let mut f = fixture(0, 0);
    f.deposit(f.owner, 3).unwrap();
    f.gain(7); // 3 shares back 10 assets
    let owner = f.owner;
    // 5 assets = 1.5 shares, burns 2.
    let burned = f.vault.withdraw(&mut f.host, &owner, 5, &owner, &owner).unwrap();
    assert_eq!(burned, 2);
}

#[test]
fn mint_rounds_assets_up() {
    let mut f = fixture(0, 0);
    f.deposit(f.owner, 3).unwrap();
    f.gain(7);
    let owner = f.owner;
    // 1 share = 3.33 assets, costs 4.
    let cost = f.vault.mint(&mut f.host, &owner, 1, &owner).unwrap();
    assert_eq!(cost, 4);
    assert_eq!(f.vault.balance_of(&owner), 4);
}

#[test]
fn operator_needs_allowance_for_other_holders() {
    let mut f = fixture(0, 0);
    f.deposit(f.owner, 1_000).unwrap();
    let (owner, keeper) = (f.owner, f.keeper);

    let err = f.vault.redeem(&mut f.host, &keeper, 100, &keeper, &owner).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    f.vault.approve(&owner, &keeper, 150).unwrap();
    f.vault.redeem(&mut f.host, &keeper, 100, &keeper, &owner).unwrap();
    assert_eq!(f.vault.allowance(&owner, &keeper), 50);
    assert_eq!(f.balance(&keeper), 10_100);
}

#[test]
fn unlimited_share_allowance_is_not_decremented() {
    let mut f = fixture(0, 0);
    f.deposit(f.owner, 1_000).unwrap();
    let (owner, keeper) = (f.owner, f.keeper);
    f.vault.approve(&owner, &keeper, UNLIMITED_ALLOWANCE).unwrap();
    f.vault.redeem(&mut f.host, &keeper, 300, &keeper, &owner).unwrap();
    assert_eq!(f.vault.allowance(&owner, &keeper), UNLIMITED_ALLOWANCE);
}

#[test]
fn redeeming_more_than_held_fails() {
    let mut f = fixture(0, 0);
    f.deposit(f.owner, 100).unwrap();
    let owner = f.owner;
    assert!(matches!(
        f.vault.redeem(&mut f.host, &owner, 101, &owner, &owner),
        Err(VaultError::InsufficientShares { available: 100, required: 101, .. })
    ));
}

#[test]
fn share_transfers_keep_supply_equal_to_balances() {
    let mut f = fixture(0, 0);
    f.deposit(f.owner, 1_000).unwrap();
    let (owner, alice, keeper) = (f.owner, f.alice, f.keeper);
    f.vault.transfer(&owner, &alice, 300).unwrap();
    f.vault.approve(&alice, &keeper, 100).unwrap();
    f.vault.transfer_from(&keeper, &alice, &keeper, 100).unwrap();

    assert_eq!(f.vault.balance_of(&alice), 200);
    assert_eq!(f.vault.balance_of(&keeper), 100);
    assert_eq!(f.vault.storage().shares.sum_of_balances(), f.vault.total_supply() as u128);
}

#[test]
fn pause_blocks_ledger_operations() {
    let mut f = fixture(0, 0);
    f.deposit(f.owner, 500).unwrap();
    let owner = f.owner;
    f.vault.pause(&mut f.host, &owner).unwrap();

    assert_eq!(f.deposit(owner, 100), Err(VaultError::Paused));
    assert_eq!(
        f.vault.redeem(&mut f.host, &owner, 100, &owner, &owner),
        Err(VaultError::Paused)
    );
    f.vault.unpause(&mut f.host, &owner).unwrap();
    assert!(f.deposit(owner, 100).is_ok());
}

#[test]
fn insolvent_vault_refuses_deposits() {
    let mut f = fixture(0, 0);
    f.deposit(f.owner, 1_000).unwrap();
    let (asset, pool) = (f.asset, f.pool);
    f.host.assets.burn(&asset, &pool, 1_000).unwrap();
    assert_eq!(f.deposit(f.owner, 100), Err(VaultError::Insolvent { shares: 1_000 }));
}

// ---------------------------------------------------------------------------
// Atomicity and the gate
// ---------------------------------------------------------------------------

#[test]
fn strategy_failure_rolls_back_everything() {
    let mut f = fixture(0, 0);
    swap_module(&mut f, Arc::new(BrokenStrategy));
    let events_before = f.host.events.len();

    let err = f.deposit(f.owner, 1_000).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StrategyFailure);
    assert_eq!(f.balance(&f.owner), 10_000);
    assert_eq!(f.vault.idle_assets(&f.host), 0);
    assert_eq!(f.vault.total_supply(), 0);
    assert_eq!(f.host.events.len(), events_before);
}

#[test]
fn writes_to_protected_storage_are_refused() {
    let mut f = fixture(0, 0);
    let thief = addr("thief");
    swap_module(&mut f, Arc::new(SkimmingStrategy { thief }));

    let err = f.deposit(f.owner, 1_000).unwrap_err();
    assert_eq!(err, VaultError::Gate(GateError::StorageTampered(f.strategy)));
    assert_eq!(f.vault.balance_of(&thief), 0);
    assert_eq!(f.vault.total_supply(), 0);
}

#[test]
fn revoked_strategy_blocks_deposit_and_withdraw() {
    let mut f = fixture(0, 0);
    f.deposit(f.owner, 1_000).unwrap();
    let (owner, strategy) = (f.owner, f.strategy);
    f.vault.revoke_strategy(&mut f.host, &owner, &strategy).unwrap();

    let err = f.deposit(owner, 100).unwrap_err();
    assert_eq!(err, VaultError::Gate(GateError::NotWhitelisted(strategy)));
    let err = f.vault.withdraw(&mut f.host, &owner, 100, &owner, &owner).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StrategyGate);
}

#[test]
fn revoked_active_strategy_must_be_rewhitelisted_to_migrate() {
    let mut f = fixture(0, 0);
    f.deposit(f.owner, 1_000).unwrap();
    let (owner, old) = (f.owner, f.strategy);
    let (next, next_pool) = f.deploy_pool_strategy("pool-b");
    f.vault.revoke_strategy(&mut f.host, &owner, &old).unwrap();
    f.vault.whitelist_strategy(&mut f.host, &owner, next).unwrap();
    f.vault.queue_strategy(&mut f.host, &owner, next).unwrap();

    // Both exits divest the old strategy through the gate.
    let blocked = VaultError::Gate(GateError::NotWhitelisted(old));
    assert_eq!(f.vault.activate_strategy(&mut f.host, &owner).unwrap_err(), blocked);
    assert_eq!(f.vault.emergency_withdraw(&mut f.host, &owner).unwrap_err(), blocked);
    assert_eq!(f.vault.active_strategy(), Some(old));
    assert!(f.vault.pending_strategy().is_some());
    assert!(!f.vault.is_paused());
    assert_eq!(f.balance(&f.pool), 1_000);

    f.vault.whitelist_strategy(&mut f.host, &owner, old).unwrap();
    assert_eq!(f.vault.activate_strategy(&mut f.host, &owner).unwrap(), next);
    assert_eq!(f.balance(&f.pool), 0);
    assert_eq!(f.balance(&next_pool), 1_000);
}

#[test]
fn strategy_turned_delegated_account_is_refused() {
    let mut f = fixture(0, 0);
    f.deposit(f.owner, 1_000).unwrap();
    let strategy = f.strategy;
    f.host.code.delegate(strategy, &addr("attacker"));
    assert_eq!(
        f.deposit(f.owner, 100),
        Err(VaultError::Gate(GateError::DelegatedAccount(strategy)))
    );
}

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

#[test]
fn crystallization_mints_fee_shares_on_new_high() {
    let mut f = fixture(1_000, 0);
    f.deposit(f.owner, 1_000).unwrap();
    f.gain(100);
    let keeper = f.keeper;

    let assessment = f.vault.crystallize_fees(&mut f.host, &keeper).unwrap().unwrap();
    assert_eq!(assessment.fee_assets, 10);
    assert_eq!(assessment.fee_shares, 9);
    assert_eq!(f.vault.balance_of(&f.treasury), 9);
    assert_eq!(f.vault.high_water_mark(), PPS_SCALE * 11 / 10);

    // Nothing new: informational no-op.
    assert_eq!(f.vault.crystallize_fees(&mut f.host, &keeper).unwrap(), None);
}

#[test]
fn crystallization_with_zero_supply_is_a_noop() {
    let mut f = fixture(1_000, 0);
    let owner = f.owner;
    assert_eq!(f.vault.crystallize_fees(&mut f.host, &owner).unwrap(), None);
}

#[test]
fn deposits_crystallize_before_pricing() {
    let mut f = fixture(1_000, 0);
    f.deposit(f.owner, 1_000).unwrap();
    f.gain(100);
    f.deposit(f.keeper, 1_100).unwrap();
    // Fee minted before the keeper joined, so the keeper pays none of it.
    assert_eq!(f.vault.balance_of(&f.treasury), 9);
}

#[test]
fn fee_rate_is_capped_and_owner_only() {
    let mut f = fixture(1_000, 0);
    let (owner, keeper) = (f.owner, f.keeper);
    assert_eq!(
        f.vault.set_fee_rate(&mut f.host, &owner, 5_001),
        Err(VaultError::FeeTooHigh {
            rate: 5_001,
            ceiling: 5_000
        })
    );
    assert!(f.vault.set_fee_rate(&mut f.host, &keeper, 100).unwrap_err().is_authorization());
    f.vault.set_fee_rate(&mut f.host, &owner, 2_000).unwrap();
    assert_eq!(f.vault.fee_rate_bps(), 2_000);
}

// ---------------------------------------------------------------------------
// Strategy lifecycle
// ---------------------------------------------------------------------------

#[test]
fn activation_migrates_funds_after_timelock() {
    let mut f = fixture(0, 3_600);
    f.deposit(f.owner, 1_000).unwrap();
    let (next, next_pool) = f.deploy_pool_strategy("pool-b");
    let owner = f.owner;

    f.vault.whitelist_strategy(&mut f.host, &owner, next).unwrap();
    f.vault.queue_strategy(&mut f.host, &owner, next).unwrap();
    assert!(matches!(
        f.vault.activate_strategy(&mut f.host, &owner),
        Err(VaultError::Gate(GateError::Timelocked { .. }))
    ));
    assert_eq!(f.vault.active_strategy(), Some(f.strategy));

    f.host.clock.advance_secs(3_600);
    assert_eq!(f.vault.activate_strategy(&mut f.host, &owner).unwrap(), next);
    assert_eq!(f.balance(&f.pool), 0);
    assert_eq!(f.balance(&next_pool), 1_000);
    assert_eq!(f.vault.total_assets(&f.host).unwrap(), 1_000);
    assert!(f.vault.pending_strategy().is_none());
}

#[test]
fn codeless_strategy_cannot_be_whitelisted() {
    let mut f = fixture(0, 0);
    let owner = f.owner;
    let key_account = addr("eoa");
    assert_eq!(
        f.vault.whitelist_strategy(&mut f.host, &owner, key_account),
        Err(VaultError::Gate(GateError::NoCode(key_account)))
    );
}

#[test]
fn cancel_drops_queued_change() {
    let mut f = fixture(0, 60);
    let (next, _) = f.deploy_pool_strategy("pool-b");
    let owner = f.owner;
    f.vault.whitelist_strategy(&mut f.host, &owner, next).unwrap();
    f.vault.queue_strategy(&mut f.host, &owner, next).unwrap();
    assert_eq!(f.vault.cancel_strategy(&mut f.host, &owner).unwrap().target, next);
    f.host.clock.advance_secs(60);
    assert!(f.vault.activate_strategy(&mut f.host, &owner).is_err());
}

#[test]
fn emergency_withdraw_recovers_and_pauses() {
    let mut f = fixture(0, 0);
    f.deposit(f.owner, 1_000).unwrap();
    f.gain(50);
    let owner = f.owner;

    assert_eq!(f.vault.emergency_withdraw(&mut f.host, &owner).unwrap(), 1_050);
    assert!(f.vault.is_paused());
    assert_eq!(f.vault.idle_assets(&f.host), 1_050);
    assert_eq!(f.vault.total_assets(&f.host).unwrap(), 1_050);

    let keeper = f.keeper;
    assert!(f.vault.emergency_withdraw(&mut f.host, &keeper).unwrap_err().is_authorization());
}
