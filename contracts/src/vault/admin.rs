//! Owner-only administration.
//!
//! Shaped like the ledger operations: explicit caller, atomic, emits on
//! success. Strategy lifecycle calls are thin wrappers over the gate plus
//! the fund migration that activation and emergency withdrawal imply.

use strata_protocol::Address;

use super::Vault;
use crate::chain::Host;
use crate::error::VaultError;
use crate::events::VaultEvent;
use crate::strategy::QueuedChange;

impl Vault {
    /// Blocks deposits, mints, withdrawals and redemptions.
    pub fn pause(&mut self, host: &mut Host, caller: &Address) -> Result<(), VaultError> {
        self.atomically(host, |vault, host| {
            vault.storage.access.ensure_owner(caller)?;
            if !vault.storage.paused {
                vault.storage.paused = true;
                tracing::warn!(vault = %vault.address, "vault paused");
                host.emit(VaultEvent::Paused { vault: vault.address });
            }
            Ok(())
        })
    }

    pub fn unpause(&mut self, host: &mut Host, caller: &Address) -> Result<(), VaultError> {
        self.atomically(host, |vault, host| {
            vault.storage.access.ensure_owner(caller)?;
            if vault.storage.paused {
                vault.storage.paused = false;
                tracing::info!(vault = %vault.address, "vault unpaused");
                host.emit(VaultEvent::Unpaused { vault: vault.address });
            }
            Ok(())
        })
    }

    /// Changes the performance fee. Gains accrued so far are crystallized at
    /// the old rate first.
    pub fn set_fee_rate(&mut self, host: &mut Host, caller: &Address, rate_bps: u16) -> Result<(), VaultError> {
        self.atomically(host, |vault, host| {
            vault.storage.access.ensure_owner(caller)?;
            let ceiling = vault.storage.fee_ceiling_bps;
            if rate_bps > ceiling {
                return Err(VaultError::FeeTooHigh {
                    rate: rate_bps,
                    ceiling,
                });
            }
            vault.crystallize(host)?;
            let old_rate_bps = std::mem::replace(&mut vault.storage.fees.rate_bps, rate_bps);
            host.emit(VaultEvent::FeeUpdated {
                vault: vault.address,
                old_rate_bps,
                new_rate_bps: rate_bps,
            });
            Ok(())
        })
    }

    /// Changes the fee recipient. Fees accrued so far go to the old one.
    pub fn set_fee_recipient(
        &mut self,
        host: &mut Host,
        caller: &Address,
        recipient: Address,
    ) -> Result<(), VaultError> {
        self.atomically(host, |vault, host| {
            vault.storage.access.ensure_owner(caller)?;
            if recipient.is_zero() {
                return Err(VaultError::ZeroAddress("fee recipient"));
            }
            vault.crystallize(host)?;
            vault.storage.fees.recipient = recipient;
            Ok(())
        })
    }

    pub fn whitelist_strategy(
        &mut self,
        host: &mut Host,
        caller: &Address,
        strategy: Address,
    ) -> Result<(), VaultError> {
        self.atomically(host, |vault, host| {
            vault.storage.access.ensure_owner(caller)?;
            vault.storage.gate.whitelist(strategy, &host.code)?;
            host.emit(VaultEvent::StrategyWhitelisted {
                vault: vault.address,
                strategy,
            });
            Ok(())
        })
    }

    /// De-whitelists `strategy`. If it is active, every later invocation
    /// fails until the owner re-whitelists it. Activating a replacement and
    /// emergency withdrawal both divest the old strategy through the gate,
    /// so they fail too.
    pub fn revoke_strategy(
        &mut self,
        host: &mut Host,
        caller: &Address,
        strategy: &Address,
    ) -> Result<(), VaultError> {
        self.atomically(host, |vault, host| {
            vault.storage.access.ensure_owner(caller)?;
            vault.storage.gate.revoke(strategy)?;
            tracing::warn!(vault = %vault.address, %strategy, "strategy revoked");
            host.emit(VaultEvent::StrategyRevoked {
                vault: vault.address,
                strategy: *strategy,
            });
            Ok(())
        })
    }

    /// Queues a change of the active strategy, eligible after the timelock.
    pub fn queue_strategy(
        &mut self,
        host: &mut Host,
        caller: &Address,
        strategy: Address,
    ) -> Result<QueuedChange, VaultError> {
        self.atomically(host, |vault, host| {
            vault.storage.access.ensure_owner(caller)?;
            let queued = vault.storage.gate.queue(strategy, &host.code, host.clock.now())?.clone();
            host.emit(VaultEvent::StrategyQueued {
                vault: vault.address,
                strategy,
                eligible_at: queued.eligible_at,
            });
            Ok(queued)
        })
    }

    /// Activates the queued strategy once eligible. Everything held by the
    /// old strategy is divested; idle assets are then invested in the new
    /// one unless the vault is paused. Returns the new active strategy.
    pub fn activate_strategy(&mut self, host: &mut Host, caller: &Address) -> Result<Address, VaultError> {
        self.atomically(host, |vault, host| {
            vault.storage.access.ensure_owner(caller)?;
            let target = vault.storage.gate.take_ready(host.clock.now(), &host.code)?;
            let previous = vault.storage.gate.active();

            if previous.is_some() {
                let held = vault.strategy_balance(host)?;
                vault.divest(host, held)?;
            }
            vault.storage.gate.install(target);

            let migrated = if vault.storage.paused {
                0
            } else {
                let idle = vault.idle_assets(host);
                vault.invest(host, idle)?;
                idle
            };

            tracing::info!(vault = %vault.address, ?previous, current = %target, migrated, "strategy changed");
            host.emit(VaultEvent::StrategyChanged {
                vault: vault.address,
                previous,
                current: target,
                migrated,
            });
            Ok(target)
        })
    }

    /// Drops the queued strategy change.
    pub fn cancel_strategy(&mut self, host: &mut Host, caller: &Address) -> Result<QueuedChange, VaultError> {
        self.atomically(host, |vault, _host| {
            vault.storage.access.ensure_owner(caller)?;
            Ok(vault.storage.gate.cancel()?)
        })
    }

    /// Pulls everything out of the active strategy to idle and pauses the
    /// vault. Returns the amount recovered.
    pub fn emergency_withdraw(&mut self, host: &mut Host, caller: &Address) -> Result<u64, VaultError> {
        self.atomically(host, |vault, host| {
            vault.storage.access.ensure_owner(caller)?;
            let strategy = vault.active_reference()?;
            let held = vault.strategy_balance(host)?;
            let recovered = vault.divest(host, held)?;

            tracing::warn!(vault = %vault.address, %strategy, recovered, "emergency withdrawal");
            host.emit(VaultEvent::EmergencyWithdrawal {
                vault: vault.address,
                strategy,
                recovered,
            });
            if !vault.storage.paused {
                vault.storage.paused = true;
                host.emit(VaultEvent::Paused { vault: vault.address });
            }
            Ok(recovered)
        })
    }

    pub fn set_router(&mut self, caller: &Address, router: Address) -> Result<(), VaultError> {
        Ok(self.storage.access.set_router(caller, router)?)
    }

    pub fn set_authorized(&mut self, caller: &Address, account: Address, authorized: bool) -> Result<(), VaultError> {
        Ok(self.storage.access.set_authorized(caller, account, authorized)?)
    }

    pub fn transfer_ownership(&mut self, caller: &Address, new_owner: Address) -> Result<(), VaultError> {
        Ok(self.storage.access.transfer_ownership(caller, new_owner)?)
    }
}
