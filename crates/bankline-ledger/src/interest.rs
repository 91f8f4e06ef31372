//! Interest math
//!
//! Interest is simple (non-compounding between touches) and computed with a
//! single truncating division so repeated reads at the same instant agree.

use bankline_core::{Wei, BPS_DENOMINATOR, SECONDS_PER_YEAR};

/// Interest earned by `principal` at `rate_bps` per year over `elapsed_secs`
///
/// `principal * rate_bps * elapsed / (10_000 * 365 days)`. Returns `None` on overflow.
pub fn accrued_interest(principal: Wei, rate_bps: u32, elapsed_secs: u128) -> Option<Wei> {
    if principal.is_zero() || rate_bps == 0 || elapsed_secs == 0 {
        return Some(Wei::zero());
    }
    let numerator = principal
        .0
        .checked_mul(rate_bps as u128)?
        .checked_mul(elapsed_secs)?;
    Some(Wei(numerator / (BPS_DENOMINATOR * SECONDS_PER_YEAR)))
}

/// Interest a balance would earn if left untouched for `days`
pub fn projected_interest(principal: Wei, rate_bps: u32, days: u32) -> Option<Wei> {
    accrued_interest(principal, rate_bps, days as u128 * 24 * 60 * 60)
}
