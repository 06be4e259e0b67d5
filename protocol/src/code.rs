//! # Code Inspection
//!
//! The strategy gate needs to know, on every call, whether a module
//! reference points at genuine deployed code. Three kinds of account exist:
//!
//! 1. **Signing-key accounts**: no code at all.
//! 2. **Contracts**: arbitrary deployed bytecode.
//! 3. **Delegated signing-key accounts**: a key account upgraded at runtime
//!    to run someone else's code while its private key can still sign. They
//!    carry a 23-byte *delegation designator*: the marker `0xef0100`
//!    followed by the 20-byte target address.
//!
//! Only kind 2 is an acceptable strategy. The designator is detectable from
//! the code length and leading bytes, which is all [`CodeInspector`] exposes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::address::{Address, ADDRESS_LENGTH};
use crate::hash::blake3_hash;

/// Leading bytes of a delegation designator.
pub const DELEGATION_MARKER: [u8; 3] = [0xef, 0x01, 0x00];

/// Exact length of a delegation designator: marker plus target address.
pub const DELEGATION_CODE_LEN: usize = DELEGATION_MARKER.len() + ADDRESS_LENGTH;

/// Read-only view of deployed code.
pub trait CodeInspector {
    /// `true` if the account currently holds any code.
    fn has_code(&self, account: &Address) -> bool;

    /// Length of the account's code in bytes (0 for key accounts).
    fn code_len(&self, account: &Address) -> usize;

    /// Up to `n` leading bytes of the account's code.
    fn code_prefix(&self, account: &Address, n: usize) -> Vec<u8>;

    /// BLAKE3 hash of the code, `None` for key accounts.
    fn code_hash(&self, account: &Address) -> Option<[u8; 32]>;
}

/// Returns `true` if `code` has the shape of a delegation designator.
pub fn is_delegation_designator(code: &[u8]) -> bool {
    code.len() == DELEGATION_CODE_LEN && code.starts_with(&DELEGATION_MARKER)
}

/// Deployed code, keyed by account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeRegistry {
    code: BTreeMap<Address, Vec<u8>>,
}

impl CodeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `bytecode` at `account`, replacing whatever was there.
    ///
    /// Empty bytecode is equivalent to [`clear`](Self::clear).
    pub fn deploy(&mut self, account: Address, bytecode: Vec<u8>) {
        if bytecode.is_empty() {
            self.code.remove(&account);
        } else {
            self.code.insert(account, bytecode);
        }
    }

    /// Upgrades the key account `signer` to delegate execution to `target`.
    pub fn delegate(&mut self, signer: Address, target: &Address) {
        let mut designator = Vec::with_capacity(DELEGATION_CODE_LEN);
        designator.extend_from_slice(&DELEGATION_MARKER);
        designator.extend_from_slice(target.as_bytes());
        self.code.insert(signer, designator);
    }

    /// Removes any code at `account`.
    pub fn clear(&mut self, account: &Address) {
        self.code.remove(account);
    }

    /// Raw code at `account`.
    pub fn code(&self, account: &Address) -> Option<&[u8]> {
        self.code.get(account).map(Vec::as_slice)
    }
}

impl CodeInspector for CodeRegistry {
    fn has_code(&self, account: &Address) -> bool {
        self.code.contains_key(account)
    }

    fn code_len(&self, account: &Address) -> usize {
        self.code.get(account).map_or(0, Vec::len)
    }

    fn code_prefix(&self, account: &Address, n: usize) -> Vec<u8> {
        self.code
            .get(account)
            .map(|c| c[..n.min(c.len())].to_vec())
            .unwrap_or_default()
    }

    fn code_hash(&self, account: &Address) -> Option<[u8; 32]> {
        self.code.get(account).map(|c| blake3_hash(c))
    }
}
