//! Money helpers.
//!
//! Amounts are integers in the smallest currency unit. Percent splits are computed in
//! integer arithmetic so two shares of one amount always add back up exactly.

/// Amount in the smallest currency unit.
pub type Amount = i64;

/// `round(amount * percent / 100)` with half-up rounding (ties go toward +infinity).
pub fn round_half_up_percent(amount: Amount, percent: i64) -> Amount {
    let scaled = amount as i128 * percent as i128;
    // floor(scaled / 100 + 1/2) == floor((2 * scaled + 100) / 200)
    (2 * scaled + 100).div_euclid(200) as Amount
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn exact_percentages_are_not_rounded() {
        assert_eq!(round_half_up_percent(10_000, 70), 7_000);
        assert_eq!(round_half_up_percent(10_000, 100), 10_000);
        assert_eq!(round_half_up_percent(10_000, 0), 0);
    }

    #[test]
    fn ties_round_up() {
        // 15 * 50 / 100 = 7.5
        assert_eq!(round_half_up_percent(15, 50), 8);
        // 33 * 33 / 100 = 10.89
        assert_eq!(round_half_up_percent(33, 33), 11);
        // 101 * 30 / 100 = 30.3
        assert_eq!(round_half_up_percent(101, 30), 30);
    }

    #[test]
    fn negative_ties_round_toward_positive_infinity() {
        // -15 * 50 / 100 = -7.5
        assert_eq!(round_half_up_percent(-15, 50), -7);
    }

    proptest! {
        #[test]
        fn share_never_exceeds_amount(amount in 0i64..1_000_000_000, percent in 0i64..=100) {
            let share = round_half_up_percent(amount, percent);
            prop_assert!(share >= 0);
            prop_assert!(share <= amount);
        }
    }
}
