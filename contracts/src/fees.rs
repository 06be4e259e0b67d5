//! # High-Water-Mark Performance Fees
//!
//! A fee is charged only on appreciation above the best price per share the
//! vault has ever crystallized, never on recovery from a loss.
//!
//! ```text
//! pps = total_value * PPS_SCALE / total_shares
//! pps <= mark  ->  nothing happens, mark unchanged
//! pps >  mark  ->  fee_assets = (pps - mark) * total_shares / PPS_SCALE * rate / 10_000
//!                  fee_shares = fee_assets * total_shares / total_value
//!                  mark       = pps
//! ```
//!
//! Fee shares are priced at the pre-mint price. Every division rounds down,
//! so rounding only ever favours existing holders. The mark moves even when
//! the rate is zero.

use serde::{Deserialize, Serialize};
use strata_protocol::config::{BPS_DENOMINATOR, PPS_SCALE};
use strata_protocol::Address;

/// Fee parameters and the high-water mark of one vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeState {
    /// Performance fee in basis points.
    pub rate_bps: u16,
    /// Account credited with fee shares.
    pub recipient: Address,
    /// Highest crystallized price per share, scaled by `PPS_SCALE`.
    pub high_water_mark: u128,
}

/// Outcome of one assessment that found a new high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeAssessment {
    /// Price per share that set the new mark.
    pub price_per_share: u128,
    /// Mark before this assessment.
    pub previous_mark: u128,
    /// Fee in asset units.
    pub fee_assets: u64,
    /// Shares to mint to the recipient.
    pub fee_shares: u64,
}

/// Fixed-point price per share, `None` when no shares exist.
pub fn price_per_share(total_value: u64, total_shares: u64) -> Option<u128> {
    if total_shares == 0 {
        return None;
    }
    Some(total_value as u128 * PPS_SCALE / total_shares as u128)
}

impl FeeState {
    /// Starts the mark at the 1:1 bootstrap price.
    pub fn new(rate_bps: u16, recipient: Address) -> Self {
        Self {
            rate_bps,
            recipient,
            high_water_mark: PPS_SCALE,
        }
    }

    /// Evaluates the fee owed at the given totals. Pure; the caller applies
    /// the result.
    ///
    /// Returns `None` when supply is zero or the price is not a strict new
    /// high. Never fails: all intermediates fit in `u128`.
    pub fn assess(&self, total_value: u64, total_shares: u64) -> Option<FeeAssessment> {
        let pps = price_per_share(total_value, total_shares)?;
        if pps <= self.high_water_mark {
            return None;
        }
        let gain_per_share = pps - self.high_water_mark;
        // gain_per_share * shares <= value * PPS_SCALE < 2^64 * 2^60
        let gain_assets = gain_per_share * total_shares as u128 / PPS_SCALE;
        let fee_assets = gain_assets * self.rate_bps as u128 / BPS_DENOMINATOR as u128;
        // pps > mark >= 0 implies total_value > 0
        let fee_shares = fee_assets * total_shares as u128 / total_value as u128;

        Some(FeeAssessment {
            price_per_share: pps,
            previous_mark: self.high_water_mark,
            fee_assets: fee_assets as u64,
            fee_shares: fee_shares as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(rate: u16) -> FeeState {
        FeeState::new(rate, Address::derive("treasury"))
    }

    #[test]
    fn zero_supply_is_a_noop() {
        assert_eq!(state(1_000).assess(500, 0), None);
        assert_eq!(price_per_share(500, 0), None);
    }

    #[test]
    fn no_fee_at_or_below_mark() {
        let s = state(1_000);
        assert_eq!(s.assess(1_000, 1_000), None);
        assert_eq!(s.assess(900, 1_000), None);
    }

    #[test]
    fn ten_percent_of_gain() {
        // 1000 shares now worth 1100: gain 100, fee 10 assets.
        let a = state(1_000).assess(1_100, 1_000).unwrap();
        assert_eq!(a.fee_assets, 10);
        // 10 assets at the pre-mint price of 1.1 buy 9 shares (rounded down).
        assert_eq!(a.fee_shares, 9);
        assert_eq!(a.price_per_share, PPS_SCALE * 11 / 10);
        assert_eq!(a.previous_mark, PPS_SCALE);
    }

    #[test]
    fn zero_rate_still_moves_mark() {
        let a = state(0).assess(1_100, 1_000).unwrap();
        assert_eq!(a.fee_assets, 0);
        assert_eq!(a.fee_shares, 0);
        assert!(a.price_per_share > a.previous_mark);
    }

    #[test]
    fn recovery_below_prior_high_is_free() {
        let mut s = state(2_000);
        s.high_water_mark = PPS_SCALE * 12 / 10;
        // 1.15 is a gain from 1.0 but still below the 1.2 mark.
        assert_eq!(s.assess(1_150, 1_000), None);
        let a = s.assess(1_300, 1_000).unwrap();
        // Only the 0.1/share above the mark is charged: 100 * 20% = 20.
        assert_eq!(a.fee_assets, 20);
    }

    #[test]
    fn extreme_values_do_not_overflow() {
        let a = state(5_000).assess(u64::MAX, 1).unwrap();
        assert!(a.fee_shares <= 1);
        let a = state(5_000).assess(u64::MAX, u64::MAX / 2).unwrap();
        assert!(a.fee_assets <= u64::MAX / 2);
    }
}
