//! Money representation and rounding policy.
//!
//! CRITICAL: every monetary quantity in this crate is a `Decimal`, never a
//! binary float. External surfaces (API responses, persisted transaction
//! rows) are rounded to 2 fractional digits; the internal platform-fee
//! split is rounded to 6, per the settlement contract in `crate::settlement`.

use rust_decimal::{Decimal, RoundingStrategy};

/// A monetary amount. Signed: debits and accruals are negative/positive
/// the same way a bank statement line is.
pub type Money = Decimal;

const EXTERNAL_SCALE: u32 = 2;
const INTERNAL_SCALE: u32 = 6;

/// Round to the 2 decimal places used at every external boundary.
pub fn round_external(amount: Money) -> Money {
    amount.round_dp_with_strategy(EXTERNAL_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Round to the 6 decimal places used for the internal platform-fee split.
pub fn round_internal(amount: Money) -> Money {
    amount.round_dp_with_strategy(INTERNAL_SCALE, RoundingStrategy::MidpointNearestEven)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_half_to_even() {
        assert_eq!(round_external(dec!(1.005)), dec!(1.00));
        assert_eq!(round_external(dec!(1.015)), dec!(1.02));
    }

    #[test]
    fn internal_scale_keeps_six_digits() {
        let fee = round_internal(dec!(2) * dec!(10) / dec!(100));
        assert_eq!(fee, dec!(0.200000));
    }
}
