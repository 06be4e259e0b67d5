//! # Hashing & Deterministic Addresses
//!
//! Two hash functions, each with one job:
//!
//! - **BLAKE3**: internal identifiers: labelled principals, code hashes,
//!   vault salts.
//! - **SHA-256**: the CREATE2-style contract address derivation, where the
//!   preimage layout is fixed and shared with off-chain tooling.
//!
//! The factory uses [`derive_contract_address`] to know a vault's address
//! before the vault exists, so routers and indexers can compute it from
//! `(asset, market)` alone.

use sha2::{Digest, Sha256};

use crate::address::{Address, MarketTag, ADDRESS_LENGTH};

/// Prefix byte of the contract address preimage.
const CREATE2_PREFIX: u8 = 0xff;

/// Compute the SHA-256 hash and return a fixed-size array.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute the BLAKE3 hash of the input data.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Salt for the vault of `(asset, market)`.
///
/// `BLAKE3("strata/vault" || 0x00 || asset || 0x00 || market)`. The separator
/// bytes keep a market tag from being confused with trailing asset bytes.
pub fn vault_salt(asset: &Address, market: &MarketTag) -> [u8; 32] {
    let mut preimage = Vec::with_capacity(14 + ADDRESS_LENGTH + market.as_str().len());
    preimage.extend_from_slice(b"strata/vault");
    preimage.push(0x00);
    preimage.extend_from_slice(asset.as_bytes());
    preimage.push(0x00);
    preimage.extend_from_slice(market.as_str().as_bytes());
    blake3_hash(&preimage)
}

/// Derives the address a deployer will create a contract at.
///
/// `SHA-256(0xff || deployer || salt || code_hash)[12..]`. Same inputs, same
/// address, on every node, before anything is deployed.
pub fn derive_contract_address(deployer: &Address, salt: &[u8; 32], code_hash: &[u8; 32]) -> Address {
    let mut preimage = Vec::with_capacity(1 + ADDRESS_LENGTH + 64);
    preimage.push(CREATE2_PREFIX);
    preimage.extend_from_slice(deployer.as_bytes());
    preimage.extend_from_slice(salt);
    preimage.extend_from_slice(code_hash);
    let digest = sha256_array(&preimage);
    let mut bytes = [0u8; ADDRESS_LENGTH];
    bytes.copy_from_slice(&digest[32 - ADDRESS_LENGTH..]);
    Address::from_bytes(bytes)
}
