//! # Fungible Token Ledger
//!
//! One interface, two uses: the underlying asset a vault accepts, and the
//! vault's own shares. Both expose the same balance / transfer / allowance
//! shape, so both are backed by [`TokenLedger`].
//!
//! The ledger itself does not authenticate anyone. `transfer(from, ..)`
//! moves `from`'s tokens unconditionally; callers (vaults, the router) are
//! responsible for only invoking it with authority over `from`.
//! [`FungibleToken::transfer_from`] is the allowance-checked path used when
//! a contract pulls funds it does not own.
//!
//! ## Allowances
//!
//! An allowance of [`UNLIMITED_ALLOWANCE`] is never decremented. Every other
//! allowance is consumed exactly once per pull.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::address::Address;
pub use crate::config::UNLIMITED_ALLOWANCE;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by token ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The holder does not have enough tokens.
    #[error("insufficient balance for {holder}: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Account being debited.
        holder: Address,
        /// Its current balance.
        available: u64,
        /// Amount requested.
        requested: u64,
    },

    /// The spender's allowance does not cover the pull.
    #[error("insufficient allowance: {spender} may spend {allowed} of {owner}'s tokens, requested {requested}")]
    InsufficientAllowance {
        /// Token owner.
        owner: Address,
        /// Account trying to spend.
        spender: Address,
        /// Remaining allowance.
        allowed: u64,
        /// Amount requested.
        requested: u64,
    },

    /// A balance or the total supply would overflow `u64`.
    #[error("token supply overflow")]
    Overflow,

    /// No ledger is registered for this asset.
    #[error("unknown asset: {0}")]
    UnknownAsset(Address),

    /// The zero address cannot hold, send or approve tokens.
    #[error("zero address is not a valid token account")]
    ZeroAddress,
}

// ---------------------------------------------------------------------------
// Interface
// ---------------------------------------------------------------------------

/// The balance / transfer / allowance shape shared by assets and shares.
pub trait FungibleToken {
    /// Total tokens in existence.
    fn total_supply(&self) -> u64;

    /// Tokens held by `holder`.
    fn balance_of(&self, holder: &Address) -> u64;

    /// Remaining amount `spender` may pull from `owner`.
    fn allowance(&self, owner: &Address, spender: &Address) -> u64;

    /// Moves `amount` from `from` to `to`. The caller must hold authority over `from`.
    fn transfer(&mut self, from: &Address, to: &Address, amount: u64) -> Result<(), TokenError>;

    /// Sets `spender`'s allowance over `owner`'s tokens (overwrites).
    fn approve(&mut self, owner: &Address, spender: &Address, amount: u64) -> Result<(), TokenError>;

    /// Pulls `amount` from `from` to `to`, consuming `spender`'s allowance.
    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), TokenError>;
}

// ---------------------------------------------------------------------------
// TokenLedger
// ---------------------------------------------------------------------------

/// In-memory fungible token ledger.
///
/// `BTreeMap` rather than `HashMap` so that iteration (and therefore any
/// serialized snapshot) is deterministic across nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLedger {
    total_supply: u64,
    balances: BTreeMap<Address, u64>,
    allowances: BTreeMap<(Address, Address), u64>,
}

impl TokenLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `amount` new tokens for `to`.
    pub fn mint(&mut self, to: &Address, amount: u64) -> Result<(), TokenError> {
        if to.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        let balance = self.balances.entry(*to).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(TokenError::Overflow)?;
        self.total_supply = supply;
        Ok(())
    }

    /// Destroys `amount` of `from`'s tokens.
    pub fn burn(&mut self, from: &Address, amount: u64) -> Result<(), TokenError> {
        self.debit(from, amount)?;
        // Supply is always >= any single balance, so this cannot underflow.
        self.total_supply -= amount;
        Ok(())
    }

    /// Consumes `amount` of `spender`'s allowance over `owner`'s tokens.
    ///
    /// Self-spends (`owner == spender`) are free. The unlimited sentinel is
    /// never decremented.
    pub fn spend_allowance(
        &mut self,
        owner: &Address,
        spender: &Address,
        amount: u64,
    ) -> Result<(), TokenError> {
        if owner == spender {
            return Ok(());
        }
        let allowed = self.allowance(owner, spender);
        if allowed == UNLIMITED_ALLOWANCE {
            return Ok(());
        }
        if allowed < amount {
            return Err(TokenError::InsufficientAllowance {
                owner: *owner,
                spender: *spender,
                allowed,
                requested: amount,
            });
        }
        let remaining = allowed - amount;
        if remaining == 0 {
            self.allowances.remove(&(*owner, *spender));
        } else {
            self.allowances.insert((*owner, *spender), remaining);
        }
        Ok(())
    }

    /// Number of accounts with a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Sum of all balances. Equal to [`total_supply`](FungibleToken::total_supply)
    /// by construction; exposed so tests can assert it.
    pub fn sum_of_balances(&self) -> u128 {
        self.balances.values().map(|b| *b as u128).sum()
    }

    fn debit(&mut self, from: &Address, amount: u64) -> Result<(), TokenError> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                holder: *from,
                available,
                requested: amount,
            });
        }
        let remaining = available - amount;
        if remaining == 0 {
            self.balances.remove(from);
        } else {
            self.balances.insert(*from, remaining);
        }
        Ok(())
    }

    fn credit(&mut self, to: &Address, amount: u64) -> Result<(), TokenError> {
        if amount == 0 {
            return Ok(());
        }
        let balance = self.balances.entry(*to).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(TokenError::Overflow)?;
        Ok(())
    }
}

impl FungibleToken for TokenLedger {
    fn total_supply(&self) -> u64 {
        self.total_supply
    }

    fn balance_of(&self, holder: &Address) -> u64 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> u64 {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: u64) -> Result<(), TokenError> {
        if to.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        if from == to {
            // Still enforce the balance check so a self-transfer cannot
            // "prove" funds the holder does not have.
            let available = self.balance_of(from);
            if available < amount {
                return Err(TokenError::InsufficientBalance {
                    holder: *from,
                    available,
                    requested: amount,
                });
            }
            return Ok(());
        }
        self.debit(from, amount)?;
        self.credit(to, amount)
    }

    fn approve(&mut self, owner: &Address, spender: &Address, amount: u64) -> Result<(), TokenError> {
        if owner.is_zero() || spender.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        if amount == 0 {
            self.allowances.remove(&(*owner, *spender));
        } else {
            self.allowances.insert((*owner, *spender), amount);
        }
        Ok(())
    }

    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), TokenError> {
        // Check the balance before touching the allowance so a failed pull
        // leaves both untouched.
        let available = self.balance_of(from);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                holder: *from,
                available,
                requested: amount,
            });
        }
        self.spend_allowance(from, spender, amount)?;
        self.transfer(from, to, amount)
    }
}

// ---------------------------------------------------------------------------
// AssetBook
// ---------------------------------------------------------------------------

/// All underlying asset ledgers known to the host, keyed by asset address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetBook {
    ledgers: BTreeMap<Address, TokenLedger>,
}

impl AssetBook {
    /// Creates an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new asset with an empty ledger. Re-registering is a no-op.
    pub fn register_asset(&mut self, asset: Address) -> Result<(), TokenError> {
        if asset.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        self.ledgers.entry(asset).or_default();
        Ok(())
    }

    /// Returns `true` if the asset has a ledger.
    pub fn is_registered(&self, asset: &Address) -> bool {
        self.ledgers.contains_key(asset)
    }

    /// Immutable access to an asset's ledger.
    pub fn token(&self, asset: &Address) -> Result<&TokenLedger, TokenError> {
        self.ledgers
            .get(asset)
            .ok_or(TokenError::UnknownAsset(*asset))
    }

    /// Mutable access to an asset's ledger.
    pub fn token_mut(&mut self, asset: &Address) -> Result<&mut TokenLedger, TokenError> {
        self.ledgers
            .get_mut(asset)
            .ok_or(TokenError::UnknownAsset(*asset))
    }

    /// Balance of `holder` in `asset`, 0 for unknown assets.
    pub fn balance_of(&self, asset: &Address, holder: &Address) -> u64 {
        self.ledgers
            .get(asset)
            .map(|l| l.balance_of(holder))
            .unwrap_or(0)
    }

    /// Issues new units of `asset` to `to`.
    ///
    /// Stands in for the asset issuer. Tests also use it to simulate yield
    /// accruing at an external yield source.
    pub fn mint(&mut self, asset: &Address, to: &Address, amount: u64) -> Result<(), TokenError> {
        self.token_mut(asset)?.mint(to, amount)
    }

    /// Destroys units of `asset` held by `from` (simulated market loss).
    pub fn burn(&mut self, asset: &Address, from: &Address, amount: u64) -> Result<(), TokenError> {
        self.token_mut(asset)?.burn(from, amount)
    }
}
