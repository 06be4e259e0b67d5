//! # Strategy Gate
//!
//! Three independent checks run before **every** strategy invocation,
//! all-or-nothing:
//!
//! 1. the reference is the vault's active strategy slot;
//! 2. the reference is on the whitelist right now, so revocation bites
//!    immediately, even while the module is active;
//! 3. the reference is genuine deployed code: key accounts have no code and
//!    are rejected, delegated key accounts carry a designator and are
//!    rejected by marker and code shape.
//!
//! Changing the active slot is a two-phase state machine run against the
//! logical clock:
//!
//! ```text
//!   queue(target) ──► Queued { target, eligible_at } ──take_ready(now >= eligible_at)──► Active
//!                           │
//!                           └── cancel / revoke(target) ──► (nothing pending)
//! ```
//!
//! The delay is defense in depth; it never replaces the per-call checks.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strata_protocol::code::{DELEGATION_CODE_LEN, DELEGATION_MARKER};
use strata_protocol::config::MAX_STRATEGY_TIMELOCK_SECS;
use strata_protocol::{Address, CodeInspector};
use thiserror::Error;

/// Gate and strategy-lifecycle failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// The vault has no active strategy.
    #[error("vault has no active strategy")]
    NoActiveStrategy,

    /// Check 1: the reference is not the active slot.
    #[error("strategy {requested} is not the active strategy (active: {active:?})")]
    NotActive {
        /// Reference that was about to be invoked.
        requested: Address,
        /// The active slot.
        active: Option<Address>,
    },

    /// Check 2: the reference is not whitelisted.
    #[error("strategy {0} is not whitelisted")]
    NotWhitelisted(Address),

    /// Check 3: the reference holds no code (signing-key account).
    #[error("strategy {0} has no deployed code")]
    NoCode(Address),

    /// Check 3: the reference is a delegated signing-key account.
    #[error("strategy {0} is a delegated key account, not a contract")]
    DelegatedAccount(Address),

    /// Genuine code, but no module is installed behind it.
    #[error("no strategy module installed at {0}")]
    ModuleMissing(Address),

    /// The module wrote vault storage outside its own slots.
    #[error("strategy {0} modified protected vault storage")]
    StorageTampered(Address),

    /// Zero address given as a strategy.
    #[error("zero address is not a valid strategy")]
    ZeroAddress,

    /// Whitelisting a reference twice.
    #[error("strategy {0} is already whitelisted")]
    AlreadyWhitelisted(Address),

    /// Queueing the strategy that is already active.
    #[error("strategy {0} is already active")]
    AlreadyActive(Address),

    /// Activating or cancelling with nothing queued.
    #[error("no strategy change is queued")]
    NothingQueued,

    /// The queued change is still inside its timelock.
    #[error("strategy change to {target} is timelocked until {eligible_at}")]
    Timelocked {
        /// Queued target.
        target: Address,
        /// Earliest activation time.
        eligible_at: DateTime<Utc>,
    },
}

impl GateError {
    /// Whether this is a configuration-time mistake rather than a per-call
    /// gate refusal.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            GateError::ZeroAddress
                | GateError::AlreadyWhitelisted(_)
                | GateError::AlreadyActive(_)
                | GateError::NothingQueued
        )
    }
}

/// A strategy change waiting out its timelock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedChange {
    pub target: Address,
    pub queued_at: DateTime<Utc>,
    pub eligible_at: DateTime<Utc>,
}

/// Whitelist, active slot and pending change of one vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyGate {
    active: Option<Address>,
    whitelist: BTreeSet<Address>,
    pending: Option<QueuedChange>,
    timelock_secs: u64,
}

impl StrategyGate {
    /// Creates an empty gate. The delay is capped at
    /// [`MAX_STRATEGY_TIMELOCK_SECS`].
    pub fn new(timelock_secs: u64) -> Self {
        Self {
            active: None,
            whitelist: BTreeSet::new(),
            pending: None,
            timelock_secs: timelock_secs.min(MAX_STRATEGY_TIMELOCK_SECS),
        }
    }

    pub fn active(&self) -> Option<Address> {
        self.active
    }

    pub fn pending(&self) -> Option<&QueuedChange> {
        self.pending.as_ref()
    }

    pub fn timelock_secs(&self) -> u64 {
        self.timelock_secs
    }

    pub fn is_whitelisted(&self, reference: &Address) -> bool {
        self.whitelist.contains(reference)
    }

    pub fn whitelisted(&self) -> impl Iterator<Item = &Address> {
        self.whitelist.iter()
    }

    /// Check 3 alone: `reference` must hold genuine contract code.
    pub fn verify_code(reference: &Address, code: &impl CodeInspector) -> Result<(), GateError> {
        if !code.has_code(reference) {
            return Err(GateError::NoCode(*reference));
        }
        let prefix = code.code_prefix(reference, DELEGATION_MARKER.len());
        let designator_shaped =
            code.code_len(reference) == DELEGATION_CODE_LEN && prefix.first() == Some(&DELEGATION_MARKER[0]);
        if prefix == DELEGATION_MARKER || designator_shaped {
            return Err(GateError::DelegatedAccount(*reference));
        }
        Ok(())
    }

    /// Runs all three per-call checks.
    pub fn authorize(&self, reference: &Address, code: &impl CodeInspector) -> Result<(), GateError> {
        match self.active {
            None => return Err(GateError::NoActiveStrategy),
            Some(active) if active != *reference => {
                return Err(GateError::NotActive {
                    requested: *reference,
                    active: Some(active),
                })
            }
            Some(_) => {}
        }
        if !self.whitelist.contains(reference) {
            tracing::warn!(strategy = %reference, "invocation of revoked strategy refused");
            return Err(GateError::NotWhitelisted(*reference));
        }
        Self::verify_code(reference, code).map_err(|e| {
            tracing::warn!(strategy = %reference, error = %e, "strategy failed code check");
            e
        })
    }

    /// Adds a genuine contract to the whitelist.
    pub fn whitelist(&mut self, reference: Address, code: &impl CodeInspector) -> Result<(), GateError> {
        if reference.is_zero() {
            return Err(GateError::ZeroAddress);
        }
        if self.whitelist.contains(&reference) {
            return Err(GateError::AlreadyWhitelisted(reference));
        }
        Self::verify_code(&reference, code)?;
        self.whitelist.insert(reference);
        Ok(())
    }

    /// Removes a reference from the whitelist. Takes effect on the next
    /// invocation even if the reference is active; a queued change to it is
    /// dropped.
    pub fn revoke(&mut self, reference: &Address) -> Result<(), GateError> {
        if !self.whitelist.remove(reference) {
            return Err(GateError::NotWhitelisted(*reference));
        }
        if self.pending.as_ref().is_some_and(|p| p.target == *reference) {
            self.pending = None;
        }
        Ok(())
    }

    /// Queues a change to `target`, replacing any earlier queued change.
    pub fn queue(
        &mut self,
        target: Address,
        code: &impl CodeInspector,
        now: DateTime<Utc>,
    ) -> Result<&QueuedChange, GateError> {
        if target.is_zero() {
            return Err(GateError::ZeroAddress);
        }
        if self.active == Some(target) {
            return Err(GateError::AlreadyActive(target));
        }
        if !self.whitelist.contains(&target) {
            return Err(GateError::NotWhitelisted(target));
        }
        Self::verify_code(&target, code)?;
        // timelock_secs is capped well inside i64 range.
        let eligible_at = now + Duration::seconds(self.timelock_secs as i64);
        Ok(&*self.pending.insert(QueuedChange {
            target,
            queued_at: now,
            eligible_at,
        }))
    }

    /// Takes the queued target once its timelock has elapsed. The target is
    /// re-checked against the whitelist and code registry at this point.
    ///
    /// The caller installs the target with [`install`](Self::install) after
    /// migrating funds out of the current strategy.
    pub fn take_ready(&mut self, now: DateTime<Utc>, code: &impl CodeInspector) -> Result<Address, GateError> {
        let pending = self.pending.as_ref().ok_or(GateError::NothingQueued)?;
        if now < pending.eligible_at {
            return Err(GateError::Timelocked {
                target: pending.target,
                eligible_at: pending.eligible_at,
            });
        }
        let target = pending.target;
        if !self.whitelist.contains(&target) {
            return Err(GateError::NotWhitelisted(target));
        }
        Self::verify_code(&target, code)?;
        self.pending = None;
        Ok(target)
    }

    /// Drops the queued change.
    pub fn cancel(&mut self) -> Result<QueuedChange, GateError> {
        self.pending.take().ok_or(GateError::NothingQueued)
    }

    /// Binds the first strategy of a freshly created vault. This is the only
    /// assignment that skips the queue.
    pub fn bind_initial(&mut self, target: Address, code: &impl CodeInspector) -> Result<(), GateError> {
        if let Some(active) = self.active {
            return Err(GateError::AlreadyActive(active));
        }
        self.whitelist(target, code)?;
        self.active = Some(target);
        Ok(())
    }

    pub(crate) fn install(&mut self, target: Address) {
        self.active = Some(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_protocol::CodeRegistry;

    fn setup() -> (StrategyGate, CodeRegistry, Address) {
        let mut code = CodeRegistry::new();
        let module = Address::derive("module");
        code.deploy(module, b"\x60\x80module".to_vec());
        let mut gate = StrategyGate::new(3_600);
        gate.bind_initial(module, &code).unwrap();
        (gate, code, module)
    }

    #[test]
    fn bound_module_passes_all_checks() {
        let (gate, code, module) = setup();
        assert!(gate.authorize(&module, &code).is_ok());
    }

    #[test]
    fn check_one_rejects_non_active_reference() {
        let (mut gate, mut code, _) = setup();
        let other = Address::derive("other");
        code.deploy(other, b"\x60\x80other".to_vec());
        gate.whitelist(other, &code).unwrap();
        assert!(matches!(
            gate.authorize(&other, &code),
            Err(GateError::NotActive { .. })
        ));
    }

    #[test]
    fn check_two_revocation_is_immediate() {
        let (mut gate, code, module) = setup();
        gate.revoke(&module).unwrap();
        assert_eq!(gate.authorize(&module, &code), Err(GateError::NotWhitelisted(module)));
    }

    #[test]
    fn check_three_code_removed_after_binding() {
        let (gate, mut code, module) = setup();
        code.clear(&module);
        assert_eq!(gate.authorize(&module, &code), Err(GateError::NoCode(module)));
    }

    #[test]
    fn check_three_delegated_account_after_binding() {
        let (gate, mut code, module) = setup();
        code.delegate(module, &Address::derive("attacker"));
        assert_eq!(
            gate.authorize(&module, &code),
            Err(GateError::DelegatedAccount(module))
        );
    }

    #[test]
    fn designator_shaped_code_is_rejected() {
        let mut code = CodeRegistry::new();
        let odd = Address::derive("odd");
        let mut bytes = vec![0xef, 0x02, 0x00];
        bytes.extend_from_slice(&[0u8; 20]);
        code.deploy(odd, bytes);
        assert_eq!(
            StrategyGate::verify_code(&odd, &code),
            Err(GateError::DelegatedAccount(odd))
        );
    }

    #[test]
    fn codeless_address_cannot_be_bound() {
        let code = CodeRegistry::new();
        let key = Address::derive("eoa");
        let mut gate = StrategyGate::new(0);
        assert_eq!(gate.bind_initial(key, &code), Err(GateError::NoCode(key)));
        assert_eq!(gate.active(), None);
    }

    #[test]
    fn queue_then_activate_after_delay() {
        let (mut gate, mut code, _) = setup();
        let next = Address::derive("next");
        code.deploy(next, b"\x60\x80next".to_vec());
        gate.whitelist(next, &code).unwrap();

        let t0 = Utc::now();
        let eligible_at = gate.queue(next, &code, t0).unwrap().eligible_at;
        assert_eq!(eligible_at, t0 + Duration::seconds(3_600));

        assert!(matches!(
            gate.take_ready(t0 + Duration::seconds(3_599), &code),
            Err(GateError::Timelocked { .. })
        ));
        assert_eq!(gate.take_ready(eligible_at, &code), Ok(next));
        assert!(gate.pending().is_none());
    }

    #[test]
    fn zero_delay_still_queues() {
        let mut code = CodeRegistry::new();
        let a = Address::derive("a");
        let b = Address::derive("b");
        code.deploy(a, vec![1]);
        code.deploy(b, vec![2]);
        let mut gate = StrategyGate::new(0);
        gate.bind_initial(a, &code).unwrap();
        gate.whitelist(b, &code).unwrap();
        let now = Utc::now();
        assert_eq!(gate.take_ready(now, &code), Err(GateError::NothingQueued));
        gate.queue(b, &code, now).unwrap();
        assert_eq!(gate.take_ready(now, &code), Ok(b));
    }

    #[test]
    fn revoking_queued_target_drops_the_change() {
        let (mut gate, mut code, _) = setup();
        let next = Address::derive("next");
        code.deploy(next, vec![7]);
        gate.whitelist(next, &code).unwrap();
        gate.queue(next, &code, Utc::now()).unwrap();
        gate.revoke(&next).unwrap();
        assert!(gate.pending().is_none());
    }

    #[test]
    fn queue_validation() {
        let (mut gate, code, module) = setup();
        let now = Utc::now();
        assert_eq!(gate.queue(module, &code, now), Err(GateError::AlreadyActive(module)));
        assert_eq!(gate.queue(Address::ZERO, &code, now), Err(GateError::ZeroAddress));
        let stranger = Address::derive("stranger");
        assert_eq!(
            gate.queue(stranger, &code, now),
            Err(GateError::NotWhitelisted(stranger))
        );
        assert_eq!(gate.cancel(), Err(GateError::NothingQueued));
    }

    #[test]
    fn timelock_is_capped() {
        assert_eq!(StrategyGate::new(u64::MAX).timelock_secs(), MAX_STRATEGY_TIMELOCK_SECS);
    }
}
