//! Discount combination and application.

use chrono::{DateTime, Utc};

use crate::MAX_PERCENT;
use crate::time_promotion::TimePromotion;

/// Highest discount among promotions active at `at`; 0 when none is active.
///
/// Promotions never stack with each other.
pub fn best_active_discount<'a, I>(promotions: I, at: DateTime<Utc>) -> u8
where
    I: IntoIterator<Item = &'a TimePromotion>,
{
    promotions
        .into_iter()
        .filter(|p| p.is_active_at(at))
        .map(TimePromotion::discount_percent)
        .max()
        .unwrap_or(0)
}

/// Discount for one basket line, clamped to `[0, 100]`.
///
/// The product's happy-hour discount and the active promotions are both
/// time-bound and do not stack: the best one of them counts. The order's
/// flat discount is added on top.
pub fn combined_percent<'a, I>(
    order_discount: u8,
    happy_hour_discount: u8,
    promotions: I,
    at: DateTime<Utc>,
) -> u8
where
    I: IntoIterator<Item = &'a TimePromotion>,
{
    let best = best_active_discount(promotions, at).max(happy_hour_discount);
    let combined = u16::from(order_discount) + u16::from(best);
    combined.min(u16::from(MAX_PERCENT)) as u8
}

/// `amount * (100 - percent) / 100`, truncated toward zero.
///
/// Percentages above 100 are treated as 100.
pub fn apply_discount(amount: u64, percent: u8) -> u64 {
    let keep = u128::from(MAX_PERCENT - percent.min(MAX_PERCENT));
    // The result never exceeds `amount`, so narrowing back is lossless.
    (u128::from(amount) * keep / u128::from(MAX_PERCENT)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_promotion::{
        SetTimePromotionDiscount, SetTimePromotionRange, TimePromotionCommand, TimePromotionId,
    };
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use storefront_core::AggregateId;
    use storefront_events::execute;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 5, 30, 15, 33, 0).unwrap()
    }

    fn promotion(start: DateTime<Utc>, end: DateTime<Utc>, discount: u8) -> TimePromotion {
        let id = TimePromotionId::new(AggregateId::new());
        let mut p = TimePromotion::empty(id);
        execute(
            &mut p,
            &TimePromotionCommand::SetRange(SetTimePromotionRange {
                time_promotion_id: id,
                start_time: start,
                end_time: end,
                occurred_at: t0(),
            }),
        )
        .unwrap();
        execute(
            &mut p,
            &TimePromotionCommand::SetDiscount(SetTimePromotionDiscount {
                time_promotion_id: id,
                discount,
                occurred_at: t0(),
            }),
        )
        .unwrap();
        p
    }

    #[test]
    fn truncates_instead_of_rounding() {
        assert_eq!(apply_discount(20, 49), 10);
        assert_eq!(apply_discount(20, 60), 8);
        assert_eq!(apply_discount(60, 60), 24);
        assert_eq!(apply_discount(20, 40), 12);
        assert_eq!(apply_discount(20, 0), 20);
        assert_eq!(apply_discount(20, 100), 0);
    }

    #[test]
    fn only_best_active_promotion_counts() {
        let day = Duration::days(1);
        let promotions = vec![
            promotion(t0() - day, t0() + day, 49),
            promotion(t0(), t0() + day, 1),
            promotion(t0() - day * 2, t0() - day, 10),
            promotion(t0() + day, t0() + day * 2, 15),
        ];

        assert_eq!(best_active_discount(&promotions, t0()), 49);
        assert_eq!(combined_percent(0, 0, &promotions, t0()), 49);
    }

    #[test]
    fn flat_discount_adds_to_best_promotion() {
        let day = Duration::days(1);
        let promotions = vec![
            promotion(t0() - day, t0() + day, 50),
            promotion(t0() - day, t0() + day, 30),
        ];
        assert_eq!(combined_percent(10, 0, &promotions, t0()), 60);
    }

    #[test]
    fn combined_is_clamped_at_hundred() {
        let day = Duration::days(1);
        let promotions = vec![promotion(t0() - day, t0() + day, 80)];
        assert_eq!(combined_percent(50, 0, &promotions, t0()), 100);
    }

    #[test]
    fn boundary_instants() {
        let t_start = t0();
        let t_end = t0() + Duration::seconds(1);
        let promotions = vec![promotion(t_start, t_end, 25)];
        let eps = Duration::milliseconds(1);

        assert_eq!(best_active_discount(&promotions, t_start), 25);
        assert_eq!(best_active_discount(&promotions, t_start - eps), 0);
        assert_eq!(best_active_discount(&promotions, t_end + eps), 0);
    }

    #[test]
    fn no_promotions_contribute_zero() {
        let none: Vec<TimePromotion> = Vec::new();
        assert_eq!(combined_percent(10, 0, &none, t0()), 10);
    }

    #[test]
    fn happy_hour_competes_with_promotions_and_adds_to_flat() {
        let day = Duration::days(1);
        let promotions = vec![promotion(t0() - day, t0() + day, 30)];

        assert_eq!(combined_percent(0, 20, &promotions, t0()), 30);
        assert_eq!(combined_percent(0, 45, &promotions, t0()), 45);
        assert_eq!(combined_percent(10, 45, &promotions, t0()), 55);

        let none: Vec<TimePromotion> = Vec::new();
        assert_eq!(combined_percent(10, 25, &none, t0()), 35);
        assert_eq!(combined_percent(90, 25, &none, t0()), 100);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 512,
            ..ProptestConfig::default()
        })]

        /// Property: the discounted amount never exceeds the amount and matches
        /// integer truncation.
        #[test]
        fn apply_discount_is_truncated_and_bounded(amount in 0u64..10_000_000u64, percent in 0u8..=100u8) {
            let discounted = apply_discount(amount, percent);
            prop_assert!(discounted <= amount);
            prop_assert_eq!(discounted, amount * u64::from(100 - percent) / 100);
        }

        /// Property: combined percent is always within [0, 100].
        #[test]
        fn combined_percent_is_clamped(flat in 0u8..=100u8, promo in 0u8..=100u8) {
            let day = Duration::days(1);
            let promotions = vec![promotion(t0() - day, t0() + day, promo)];
            let combined = combined_percent(flat, 0, &promotions, t0());
            prop_assert!(combined <= 100);
            prop_assert_eq!(u16::from(combined), (u16::from(flat) + u16::from(promo)).min(100));
        }
    }
}
