//! # Reference Strategies
//!
//! - [`PoolStrategy`] deposits into an external yield-source account and
//!   reports that account's balance, so yield or losses accruing there show
//!   up in the vault's total value.
//! - [`HoldStrategy`] keeps everything idle.
//!
//! A pool account must serve exactly one vault; its whole balance is
//! reported as the vault's position. The pool must approve the vault as a
//! spender of the asset before anything can be divested.

use strata_protocol::Address;

use crate::strategy::{Strategy, StrategyContext, StrategyError, StrategyView};

/// Deploys assets into a single pool account.
#[derive(Debug, Clone)]
pub struct PoolStrategy {
    name: String,
    pool: Address,
}

impl PoolStrategy {
    pub fn new(name: impl Into<String>, pool: Address) -> Self {
        Self {
            name: name.into(),
            pool,
        }
    }

    pub fn pool(&self) -> Address {
        self.pool
    }

    /// Storage slot holding the principal currently deployed.
    pub fn principal_slot(&self) -> String {
        format!("pool/{}/principal", self.pool.to_hex())
    }

    /// Principal deployed, as recorded in the vault's storage.
    pub fn principal(&self, view: &StrategyView<'_>) -> u64 {
        view.slot(&self.principal_slot())
    }
}

impl Strategy for PoolStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn invest(&self, ctx: &mut StrategyContext<'_>, amount: u64) -> Result<(), StrategyError> {
        ctx.send(&self.pool, amount)?;
        let slot = self.principal_slot();
        let principal = ctx.slot(&slot).saturating_add(amount);
        ctx.set_slot(slot, principal);
        Ok(())
    }

    fn divest(&self, ctx: &mut StrategyContext<'_>, amount: u64) -> Result<u64, StrategyError> {
        let available = ctx.balance_of(&self.pool);
        if amount > available {
            return Err(StrategyError::InsufficientLiquidity {
                available,
                requested: amount,
            });
        }
        ctx.receive(&self.pool, amount)?;
        let slot = self.principal_slot();
        let principal = ctx.slot(&slot).saturating_sub(amount);
        ctx.set_slot(slot, principal);
        Ok(amount)
    }

    fn report_balance(&self, view: &StrategyView<'_>) -> Result<u64, StrategyError> {
        Ok(view.balance_of(&self.pool))
    }
}

/// Holds nothing; every asset stays idle in the vault.
#[derive(Debug, Clone, Default)]
pub struct HoldStrategy;

impl Strategy for HoldStrategy {
    fn name(&self) -> &str {
        "hold"
    }

    fn invest(&self, _ctx: &mut StrategyContext<'_>, _amount: u64) -> Result<(), StrategyError> {
        Ok(())
    }

    fn divest(&self, _ctx: &mut StrategyContext<'_>, _amount: u64) -> Result<u64, StrategyError> {
        Ok(0)
    }

    fn report_balance(&self, _view: &StrategyView<'_>) -> Result<u64, StrategyError> {
        Ok(0)
    }
}
