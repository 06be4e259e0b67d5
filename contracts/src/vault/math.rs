//! Share/asset conversion with explicit rounding.
//!
//! `shares = assets * total_shares / total_value`, 1:1 while no shares
//! exist. Entry paths that fix the asset side round shares down (deposit)
//! or assets up (mint); exit paths round shares up (withdraw) or assets
//! down (redeem). The vault never gives away a rounding unit.

use crate::error::VaultError;

/// Rounding direction of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Down,
    Up,
}

/// `x * y / denominator` in `u128`, rounded as requested.
pub fn mul_div(x: u64, y: u64, denominator: u64, rounding: Rounding) -> Result<u64, VaultError> {
    if denominator == 0 {
        return Err(VaultError::Overflow);
    }
    let product = x as u128 * y as u128;
    let d = denominator as u128;
    let mut quotient = product / d;
    if rounding == Rounding::Up && product % d != 0 {
        quotient += 1;
    }
    u64::try_from(quotient).map_err(|_| VaultError::Overflow)
}

/// Shares worth `assets` at the given totals.
pub fn to_shares(assets: u64, total_shares: u64, total_value: u64, rounding: Rounding) -> Result<u64, VaultError> {
    if total_shares == 0 {
        return Ok(assets);
    }
    if total_value == 0 {
        return Err(VaultError::Insolvent { shares: total_shares });
    }
    mul_div(assets, total_shares, total_value, rounding)
}

/// Assets worth `shares` at the given totals.
pub fn to_assets(shares: u64, total_shares: u64, total_value: u64, rounding: Rounding) -> Result<u64, VaultError> {
    if total_shares == 0 {
        return Ok(shares);
    }
    mul_div(shares, total_value, total_shares, rounding)
}
