//! Views, the four ledger operations, fee crystallization and the share
//! token surface.
//!
//! Every ledger operation follows the same order: caller class, pause,
//! crystallize, re-read total value, convert, move funds through the gate,
//! mint or burn, emit. The `MAX_AMOUNT` sentinel is resolved from live
//! balances after crystallization.

use strata_protocol::config::MAX_AMOUNT;
use strata_protocol::{Address, FungibleToken};

use super::math::{to_assets, to_shares, Rounding};
use super::Vault;
use crate::chain::Host;
use crate::error::VaultError;
use crate::events::{VaultEvent, WithdrawKind};
use crate::fees::{self, FeeAssessment};

fn ensure_nonzero(account: &Address, what: &'static str) -> Result<(), VaultError> {
    if account.is_zero() {
        return Err(VaultError::ZeroAddress(what));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

impl Vault {
    /// Assets sitting in the vault, not deployed.
    pub fn idle_assets(&self, host: &Host) -> u64 {
        host.assets.balance_of(&self.asset, &self.address)
    }

    /// Idle assets plus what the active strategy reports. Fails if the
    /// strategy no longer passes the gate.
    pub fn total_assets(&self, host: &Host) -> Result<u64, VaultError> {
        let deployed = self.strategy_balance(host)?;
        self.idle_assets(host)
            .checked_add(deployed)
            .ok_or(VaultError::Overflow)
    }

    pub fn total_supply(&self) -> u64 {
        self.storage.shares.total_supply()
    }

    pub fn balance_of(&self, holder: &Address) -> u64 {
        self.storage.shares.balance_of(holder)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> u64 {
        self.storage.shares.allowance(owner, spender)
    }

    /// Price per share scaled by `PPS_SCALE`; `None` with no shares.
    pub fn price_per_share(&self, host: &Host) -> Result<Option<u128>, VaultError> {
        Ok(fees::price_per_share(self.total_assets(host)?, self.total_supply()))
    }

    pub fn convert_to_shares(&self, host: &Host, assets: u64) -> Result<u64, VaultError> {
        to_shares(assets, self.total_supply(), self.total_assets(host)?, Rounding::Down)
    }

    pub fn convert_to_assets(&self, host: &Host, shares: u64) -> Result<u64, VaultError> {
        to_assets(shares, self.total_supply(), self.total_assets(host)?, Rounding::Down)
    }

    /// Shares a deposit of `assets` would mint right now. Does not account
    /// for fees a crystallization would mint first.
    pub fn preview_deposit(&self, host: &Host, assets: u64) -> Result<u64, VaultError> {
        to_shares(assets, self.total_supply(), self.total_assets(host)?, Rounding::Down)
    }

    /// Assets a mint of `shares` would pull right now.
    pub fn preview_mint(&self, host: &Host, shares: u64) -> Result<u64, VaultError> {
        let supply = self.total_supply();
        let value = self.total_assets(host)?;
        if supply > 0 && value == 0 {
            return Err(VaultError::Insolvent { shares: supply });
        }
        to_assets(shares, supply, value, Rounding::Up)
    }

    /// Shares a withdrawal of `assets` would burn right now.
    pub fn preview_withdraw(&self, host: &Host, assets: u64) -> Result<u64, VaultError> {
        to_shares(assets, self.total_supply(), self.total_assets(host)?, Rounding::Up)
    }

    /// Assets a redemption of `shares` would return right now.
    pub fn preview_redeem(&self, host: &Host, shares: u64) -> Result<u64, VaultError> {
        to_assets(shares, self.total_supply(), self.total_assets(host)?, Rounding::Down)
    }

    /// Most assets `owner` could withdraw.
    pub fn max_withdraw(&self, host: &Host, owner: &Address) -> Result<u64, VaultError> {
        self.convert_to_assets(host, self.balance_of(owner))
    }

    /// Most shares `owner` could redeem.
    pub fn max_redeem(&self, owner: &Address) -> u64 {
        self.balance_of(owner)
    }

    pub fn high_water_mark(&self) -> u128 {
        self.storage.fees.high_water_mark
    }

    pub fn fee_rate_bps(&self) -> u16 {
        self.storage.fees.rate_bps
    }

    pub fn fee_recipient(&self) -> Address {
        self.storage.fees.recipient
    }

    pub fn active_strategy(&self) -> Option<Address> {
        self.storage.gate.active()
    }

    pub fn pending_strategy(&self) -> Option<&crate::strategy::QueuedChange> {
        self.storage.gate.pending()
    }

    pub fn is_whitelisted(&self, reference: &Address) -> bool {
        self.storage.gate.is_whitelisted(reference)
    }

    pub fn is_paused(&self) -> bool {
        self.storage.paused
    }

    pub fn owner(&self) -> Address {
        self.storage.access.owner()
    }

    pub fn router(&self) -> Address {
        self.storage.access.router()
    }

    pub fn is_authorized(&self, account: &Address) -> bool {
        self.storage.access.is_authorized(account)
    }
}

// ---------------------------------------------------------------------------
// Ledger operations
// ---------------------------------------------------------------------------

impl Vault {
    /// Pulls `assets` from `caller`, deploys them and mints shares to
    /// `receiver`. Returns the shares minted.
    pub fn deposit(
        &mut self,
        host: &mut Host,
        caller: &Address,
        assets: u64,
        receiver: &Address,
    ) -> Result<u64, VaultError> {
        self.atomically(host, |vault, host| {
            vault.storage.access.ensure_operator(caller)?;
            vault.ensure_live()?;
            ensure_nonzero(receiver, "receiver")?;
            vault.crystallize(host)?;

            let assets = if assets == MAX_AMOUNT {
                host.assets.balance_of(&vault.asset, caller)
            } else {
                assets
            };
            if assets == 0 {
                return Err(VaultError::ZeroAmount);
            }
            let shares = to_shares(assets, vault.total_supply(), vault.total_assets(host)?, Rounding::Down)?;
            if shares == 0 {
                return Err(VaultError::ZeroShares { assets });
            }

            vault.enter(host, caller, receiver, assets, shares)?;
            Ok(shares)
        })
    }

    /// Mints exactly `shares` to `receiver`, pulling whatever they cost
    /// from `caller`. Returns the assets pulled.
    pub fn mint(
        &mut self,
        host: &mut Host,
        caller: &Address,
        shares: u64,
        receiver: &Address,
    ) -> Result<u64, VaultError> {
        self.atomically(host, |vault, host| {
            vault.storage.access.ensure_operator(caller)?;
            vault.ensure_live()?;
            ensure_nonzero(receiver, "receiver")?;
            vault.crystallize(host)?;

            let supply = vault.total_supply();
            let value = vault.total_assets(host)?;
            if supply > 0 && value == 0 {
                return Err(VaultError::Insolvent { shares: supply });
            }
            let shares = if shares == MAX_AMOUNT {
                let available = host.assets.balance_of(&vault.asset, caller);
                to_shares(available, supply, value, Rounding::Down)?
            } else {
                shares
            };
            if shares == 0 {
                return Err(VaultError::ZeroAmount);
            }
            let assets = to_assets(shares, supply, value, Rounding::Up)?;

            vault.enter(host, caller, receiver, assets, shares)?;
            Ok(assets)
        })
    }

    /// Pays exactly `assets` to `receiver`, burning `owner`'s shares.
    /// Returns the shares burned.
    pub fn withdraw(
        &mut self,
        host: &mut Host,
        caller: &Address,
        assets: u64,
        receiver: &Address,
        owner: &Address,
    ) -> Result<u64, VaultError> {
        self.atomically(host, |vault, host| {
            vault.storage.access.ensure_operator(caller)?;
            vault.ensure_live()?;
            ensure_nonzero(receiver, "receiver")?;
            ensure_nonzero(owner, "owner")?;
            vault.crystallize(host)?;

            let supply = vault.total_supply();
            let value = vault.total_assets(host)?;
            let assets = if assets == MAX_AMOUNT {
                to_assets(vault.balance_of(owner), supply, value, Rounding::Down)?
            } else {
                assets
            };
            if assets == 0 {
                return Err(VaultError::ZeroAmount);
            }
            let shares = to_shares(assets, supply, value, Rounding::Up)?;

            vault.exit(host, WithdrawKind::Withdraw, caller, receiver, owner, assets, shares)?;
            Ok(shares)
        })
    }

    /// Burns exactly `shares` of `owner`'s and pays what they are worth to
    /// `receiver`. Returns the assets paid.
    pub fn redeem(
        &mut self,
        host: &mut Host,
        caller: &Address,
        shares: u64,
        receiver: &Address,
        owner: &Address,
    ) -> Result<u64, VaultError> {
        self.atomically(host, |vault, host| {
            vault.storage.access.ensure_operator(caller)?;
            vault.ensure_live()?;
            ensure_nonzero(receiver, "receiver")?;
            ensure_nonzero(owner, "owner")?;
            vault.crystallize(host)?;

            let shares = if shares == MAX_AMOUNT {
                vault.balance_of(owner)
            } else {
                shares
            };
            if shares == 0 {
                return Err(VaultError::ZeroAmount);
            }
            let assets = to_assets(shares, vault.total_supply(), vault.total_assets(host)?, Rounding::Down)?;
            if assets == 0 {
                return Err(VaultError::ZeroAssets { shares });
            }

            vault.exit(host, WithdrawKind::Redeem, caller, receiver, owner, assets, shares)?;
            Ok(assets)
        })
    }

    /// Crystallizes pending performance fees. Callable by any operator.
    /// `Ok(None)` means there was nothing to crystallize.
    pub fn crystallize_fees(
        &mut self,
        host: &mut Host,
        caller: &Address,
    ) -> Result<Option<FeeAssessment>, VaultError> {
        self.atomically(host, |vault, host| {
            vault.storage.access.ensure_operator(caller)?;
            vault.crystallize(host)
        })
    }

    /// Applies the high-water-mark rule at current totals. Never touches the
    /// strategy when no shares exist.
    pub(super) fn crystallize(&mut self, host: &mut Host) -> Result<Option<FeeAssessment>, VaultError> {
        let supply = self.total_supply();
        if supply == 0 {
            return Ok(None);
        }
        let value = self.total_assets(host)?;
        let Some(assessment) = self.storage.fees.assess(value, supply) else {
            return Ok(None);
        };

        let recipient = self.storage.fees.recipient;
        if assessment.fee_shares > 0 {
            self.storage.shares.mint(&recipient, assessment.fee_shares)?;
        }
        self.storage.fees.high_water_mark = assessment.price_per_share;

        tracing::info!(
            vault = %self.address,
            fee_shares = assessment.fee_shares,
            fee_assets = assessment.fee_assets,
            mark = %assessment.price_per_share,
            "fees crystallized"
        );
        host.emit(VaultEvent::FeeCrystallized {
            vault: self.address,
            recipient,
            fee_assets: assessment.fee_assets,
            fee_shares: assessment.fee_shares,
            previous_mark: assessment.previous_mark,
            new_mark: assessment.price_per_share,
        });
        Ok(Some(assessment))
    }

    /// Pull, invest, mint, emit.
    fn enter(
        &mut self,
        host: &mut Host,
        caller: &Address,
        receiver: &Address,
        assets: u64,
        shares: u64,
    ) -> Result<(), VaultError> {
        host.assets
            .token_mut(&self.asset)?
            .transfer_from(&self.address, caller, &self.address, assets)?;
        self.invest(host, assets)?;
        self.storage.shares.mint(receiver, shares)?;

        tracing::info!(vault = %self.address, %caller, %receiver, assets, shares, "deposit");
        host.emit(VaultEvent::Deposited {
            vault: self.address,
            caller: *caller,
            receiver: *receiver,
            assets,
            shares,
        });
        Ok(())
    }

    /// Check shares and allowance, free liquidity, burn, pay, emit.
    #[allow(clippy::too_many_arguments)]
    fn exit(
        &mut self,
        host: &mut Host,
        kind: WithdrawKind,
        caller: &Address,
        receiver: &Address,
        owner: &Address,
        assets: u64,
        shares: u64,
    ) -> Result<(), VaultError> {
        let held = self.balance_of(owner);
        if shares > held {
            return Err(VaultError::InsufficientShares {
                owner: *owner,
                available: held,
                required: shares,
            });
        }
        self.storage.shares.spend_allowance(owner, caller, shares)?;

        self.ensure_liquidity(host, assets)?;
        self.storage.shares.burn(owner, shares)?;
        host.assets
            .token_mut(&self.asset)?
            .transfer(&self.address, receiver, assets)?;

        tracing::info!(vault = %self.address, ?kind, %caller, %owner, %receiver, assets, shares, "withdrawal");
        host.emit(VaultEvent::Withdrawn {
            vault: self.address,
            kind,
            caller: *caller,
            receiver: *receiver,
            owner: *owner,
            assets,
            shares,
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Share token
// ---------------------------------------------------------------------------

impl Vault {
    /// Moves `caller`'s shares to `to`.
    pub fn transfer(&mut self, caller: &Address, to: &Address, shares: u64) -> Result<(), VaultError> {
        self.storage.shares.transfer(caller, to, shares)?;
        Ok(())
    }

    /// Sets `spender`'s allowance over `caller`'s shares.
    pub fn approve(&mut self, caller: &Address, spender: &Address, shares: u64) -> Result<(), VaultError> {
        self.storage.shares.approve(caller, spender, shares)?;
        Ok(())
    }

    /// Moves `from`'s shares to `to` against `caller`'s allowance.
    pub fn transfer_from(
        &mut self,
        caller: &Address,
        from: &Address,
        to: &Address,
        shares: u64,
    ) -> Result<(), VaultError> {
        self.storage.shares.transfer_from(caller, from, to, shares)?;
        Ok(())
    }
}
