//! # Access Control
//!
//! Three caller classes may drive a vault's ledger directly: the owner, the
//! designated router, and accounts the owner has explicitly authorized.
//! Everyone else is turned away before any allowance is even looked at, so
//! holding an allowance never substitutes for being an operator.
//!
//! Administrative entry points (pause, fees, strategies, emergency
//! withdrawal, role changes) are owner-only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strata_protocol::Address;
use thiserror::Error;

/// Caller-class failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// Owner-only entry point called by someone else.
    #[error("unauthorized: {0} is not the vault owner")]
    NotOwner(Address),

    /// Ledger operation called by an account outside the operator classes.
    #[error("unauthorized: {0} is not permitted to operate this vault")]
    NotOperator(Address),

    /// Roles cannot be assigned to the zero address.
    #[error("zero address cannot hold a vault role")]
    ZeroAddress,
}

/// Owner, router and explicitly-authorized callers of one vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    owner: Address,
    router: Address,
    authorized: BTreeSet<Address>,
}

impl AccessControl {
    /// Creates access control with the given owner and router.
    pub fn new(owner: Address, router: Address) -> Result<Self, AccessError> {
        if owner.is_zero() || router.is_zero() {
            return Err(AccessError::ZeroAddress);
        }
        Ok(Self {
            owner,
            router,
            authorized: BTreeSet::new(),
        })
    }

    /// Current owner.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Designated router.
    pub fn router(&self) -> Address {
        self.router
    }

    /// Whether `account` was explicitly authorized.
    pub fn is_authorized(&self, account: &Address) -> bool {
        self.authorized.contains(account)
    }

    /// Whether `caller` belongs to one of the three operator classes.
    pub fn is_operator(&self, caller: &Address) -> bool {
        *caller == self.owner || *caller == self.router || self.authorized.contains(caller)
    }

    /// Fails unless `caller` is the owner.
    pub fn ensure_owner(&self, caller: &Address) -> Result<(), AccessError> {
        if *caller != self.owner {
            tracing::warn!(%caller, "owner-only call rejected");
            return Err(AccessError::NotOwner(*caller));
        }
        Ok(())
    }

    /// Fails unless `caller` is the owner, the router, or authorized.
    pub fn ensure_operator(&self, caller: &Address) -> Result<(), AccessError> {
        if !self.is_operator(caller) {
            tracing::warn!(%caller, "ledger call from non-operator rejected");
            return Err(AccessError::NotOperator(*caller));
        }
        Ok(())
    }

    /// Replaces the designated router. Owner-only.
    pub fn set_router(&mut self, caller: &Address, router: Address) -> Result<(), AccessError> {
        self.ensure_owner(caller)?;
        if router.is_zero() {
            return Err(AccessError::ZeroAddress);
        }
        self.router = router;
        Ok(())
    }

    /// Grants or revokes explicit authorization. Owner-only.
    pub fn set_authorized(
        &mut self,
        caller: &Address,
        account: Address,
        authorized: bool,
    ) -> Result<(), AccessError> {
        self.ensure_owner(caller)?;
        if account.is_zero() {
            return Err(AccessError::ZeroAddress);
        }
        if authorized {
            self.authorized.insert(account);
        } else {
            self.authorized.remove(&account);
        }
        Ok(())
    }

    /// Hands ownership to `new_owner`. Owner-only.
    pub fn transfer_ownership(&mut self, caller: &Address, new_owner: Address) -> Result<(), AccessError> {
        self.ensure_owner(caller)?;
        if new_owner.is_zero() {
            return Err(AccessError::ZeroAddress);
        }
        self.owner = new_owner;
        Ok(())
    }
}
