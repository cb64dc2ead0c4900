//! Per-card reward arithmetic.
//!
//! Spend beyond a category cap is not lost: it spills over to the card's
//! base rate, the same way an uncategorized purchase would earn. A card with
//! a zero base rate therefore earns nothing past its cap.
//!
//! Products saturate at the `Decimal` range instead of panicking; a validated
//! profile keeps spend itself well inside it.

use rust_decimal::Decimal;

use crate::models::{CategoryReward, CreditCard, MerchantCategory, Yield};

pub const MONTHS_PER_YEAR: Decimal = Decimal::from_parts(12, 0, 0, false, 0);

/// Reward for `amount` spent in `category` within a single month.
pub fn effective_yield(card: &CreditCard, category: MerchantCategory, amount: Decimal) -> Yield {
    let base_rate = card.rewards.base_rate;
    let units = match active_rule(card, category) {
        Some(rule) => {
            let rewarded = cap(amount, rule.monthly_cap);
            rewarded
                .saturating_mul(rule.rate)
                .saturating_add((amount - rewarded).saturating_mul(base_rate))
        }
        None => amount.saturating_mul(base_rate),
    };
    earn(card, units)
}

/// Reward for a year of flat monthly spend of `monthly_amount` in `category`.
///
/// Monthly caps constrain each month on their own; an annual cap then bounds
/// the year's total of bonus-rate spend.
pub fn annual_yield(
    card: &CreditCard,
    category: MerchantCategory,
    monthly_amount: Decimal,
) -> Yield {
    let Some(rule) = active_rule(card, category) else {
        return effective_yield(card, category, monthly_amount).scaled(MONTHS_PER_YEAR);
    };
    let Some(annual_cap) = rule.annual_cap else {
        return effective_yield(card, category, monthly_amount).scaled(MONTHS_PER_YEAR);
    };

    let annual_amount = monthly_amount.saturating_mul(MONTHS_PER_YEAR);
    let bonus_per_month = cap(monthly_amount, rule.monthly_cap);
    let bonus_spend = bonus_per_month
        .saturating_mul(MONTHS_PER_YEAR)
        .min(annual_cap.max(Decimal::ZERO));
    let units = bonus_spend.saturating_mul(rule.rate).saturating_add(
        (annual_amount - bonus_spend).saturating_mul(card.rewards.base_rate),
    );
    earn(card, units)
}

/// Rate applied to in-cap spend for `category` on this card.
pub fn category_rate(card: &CreditCard, category: MerchantCategory) -> Decimal {
    active_rule(card, category).map_or(card.rewards.base_rate, |rule| rule.rate)
}

/// The category's bonus rule, unless it has been switched off.
fn active_rule(card: &CreditCard, category: MerchantCategory) -> Option<&CategoryReward> {
    card.rewards
        .categories
        .get(&category)
        .filter(|rule| rule.is_active)
}

/// A card is eligible unless the declared income falls below its floor.
/// An undeclared income never excludes a card.
pub fn is_eligible(card: &CreditCard, income: Option<Decimal>) -> bool {
    match (income, card.minimum_income) {
        (Some(income), Some(floor)) => income >= floor,
        _ => true,
    }
}

fn cap(amount: Decimal, ceiling: Option<Decimal>) -> Decimal {
    match ceiling {
        Some(ceiling) => amount.min(ceiling).max(Decimal::ZERO),
        None => amount,
    }
}

/// Turns reward units into cashback or points depending on the card.
fn earn(card: &CreditCard, units: Decimal) -> Yield {
    if card.reward_type().earns_points() {
        Yield {
            cashback: Decimal::ZERO,
            points: units,
            point_value: units.saturating_mul(card.effective_point_value()),
        }
    } else {
        Yield {
            cashback: units,
            ..Yield::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CardType, RewardRule};
    use rust_decimal_macros::dec;

    fn cashback_card(rewards: RewardRule) -> CreditCard {
        CreditCard {
            id: 1,
            bank: "Maybank".into(),
            name: "2 Cards".into(),
            card_type: CardType::Cashback,
            annual_fee: Decimal::ZERO,
            minimum_income: Some(dec!(24000)),
            point_value: Decimal::ZERO,
            is_active: true,
            rewards,
        }
    }

    fn points_card() -> CreditCard {
        CreditCard {
            id: 2,
            bank: "Maybank".into(),
            name: "Treats".into(),
            card_type: CardType::Points,
            annual_fee: dec!(150),
            minimum_income: None,
            point_value: dec!(0.01),
            is_active: true,
            rewards: RewardRule::with_base(dec!(1))
                .bonus(MerchantCategory::Dining, CategoryReward::uncapped(dec!(5))),
        }
    }

    #[test]
    fn test_uncapped_yield_is_linear() {
        let card = cashback_card(
            RewardRule::with_base(dec!(0.005))
                .bonus(MerchantCategory::Dining, CategoryReward::uncapped(dec!(0.05))),
        );
        for category in [MerchantCategory::Dining, MerchantCategory::Travel] {
            let single = effective_yield(&card, category, dec!(123.45));
            let double = effective_yield(&card, category, dec!(246.90));
            assert_eq!(double, single.scaled(dec!(2)));
        }
    }

    #[test]
    fn test_unlisted_category_earns_base_rate() {
        let card = cashback_card(RewardRule::with_base(dec!(0.01)));
        let y = effective_yield(&card, MerchantCategory::Healthcare, dec!(200));
        assert_eq!(y.cashback, dec!(2));
        assert_eq!(y.points, Decimal::ZERO);
    }

    #[test]
    fn test_excess_over_monthly_cap_spills_to_base() {
        let card = cashback_card(
            RewardRule::with_base(dec!(0.005))
                .bonus(MerchantCategory::Groceries, CategoryReward::monthly(dec!(0.02), dec!(300))),
        );
        let y = effective_yield(&card, MerchantCategory::Groceries, dec!(500));
        // 300 at 2% plus 200 at 0.5%
        assert_eq!(y.cashback, dec!(6) + dec!(1));
        assert_eq!(y.cashback - dec!(6), (dec!(500) - dec!(300)) * dec!(0.005));
    }

    #[test]
    fn test_excess_earns_nothing_without_base_rate() {
        let card = cashback_card(
            RewardRule::default()
                .bonus(MerchantCategory::Petrol, CategoryReward::monthly(dec!(0.08), dec!(300))),
        );
        let y = effective_yield(&card, MerchantCategory::Petrol, dec!(1000));
        assert_eq!(y.cashback, dec!(24));
    }

    #[test]
    fn test_annual_yield_matches_monthly_without_annual_cap() {
        let card = cashback_card(
            RewardRule::with_base(dec!(0.005))
                .bonus(MerchantCategory::Petrol, CategoryReward::monthly(dec!(0.02), dec!(300)))
                .bonus(MerchantCategory::Dining, CategoryReward::uncapped(dec!(0.05))),
        );
        for category in MerchantCategory::ALL {
            let annual = annual_yield(&card, category, dec!(450));
            let monthly = effective_yield(&card, category, dec!(450));
            assert_eq!(annual, monthly.scaled(dec!(12)));
        }
    }

    #[test]
    fn test_annual_cap_bounds_bonus_spend() {
        let card = cashback_card(RewardRule::with_base(dec!(0.01)).bonus(
            MerchantCategory::Travel,
            CategoryReward {
                rate: dec!(0.05),
                monthly_cap: None,
                annual_cap: Some(dec!(2000)),
                is_active: true,
            },
        ));
        // 3600 a year: 2000 at 5%, 1600 at 1%
        let y = annual_yield(&card, MerchantCategory::Travel, dec!(300));
        assert_eq!(y.cashback, dec!(100) + dec!(16));
    }

    #[test]
    fn test_monthly_and_annual_caps_combine() {
        let card = cashback_card(RewardRule::with_base(dec!(0.01)).bonus(
            MerchantCategory::Travel,
            CategoryReward {
                rate: dec!(0.05),
                monthly_cap: Some(dec!(100)),
                annual_cap: Some(dec!(1000)),
                is_active: true,
            },
        ));
        // monthly cap leaves 1200 a year, annual cap trims it to 1000
        let y = annual_yield(&card, MerchantCategory::Travel, dec!(300));
        assert_eq!(y.cashback, dec!(1000) * dec!(0.05) + dec!(2600) * dec!(0.01));
    }

    #[test]
    fn test_points_convert_through_point_value() {
        let card = points_card();
        let y = effective_yield(&card, MerchantCategory::Dining, dec!(100));
        assert_eq!(y.cashback, Decimal::ZERO);
        assert_eq!(y.points, dec!(500));
        assert_eq!(y.point_value, dec!(5));
        assert_eq!(y.value(), dec!(5));
    }

    #[test]
    fn test_category_rate_falls_back_to_base() {
        let card = points_card();
        assert_eq!(category_rate(&card, MerchantCategory::Dining), dec!(5));
        assert_eq!(category_rate(&card, MerchantCategory::Bills), dec!(1));
    }

    #[test]
    fn test_income_eligibility() {
        let card = cashback_card(RewardRule::default());
        assert!(is_eligible(&card, Some(dec!(24000))));
        assert!(!is_eligible(&card, Some(dec!(23999.99))));
        assert!(is_eligible(&card, None));
        assert!(is_eligible(&points_card(), Some(Decimal::ZERO)));
    }

    #[test]
    fn test_inactive_rule_falls_back_to_base() {
        let mut promo = CategoryReward::monthly(dec!(0.08), dec!(300));
        promo.is_active = false;
        let card = cashback_card(
            RewardRule::with_base(dec!(0.01)).bonus(MerchantCategory::Petrol, promo),
        );
        let y = effective_yield(&card, MerchantCategory::Petrol, dec!(200));
        assert_eq!(y.cashback, dec!(2));
        assert_eq!(annual_yield(&card, MerchantCategory::Petrol, dec!(200)).cashback, dec!(24));
        assert_eq!(category_rate(&card, MerchantCategory::Petrol), dec!(0.01));
    }

    #[test]
    fn test_extreme_rates_saturate_instead_of_panicking() {
        let card = cashback_card(
            RewardRule::with_base(Decimal::MAX)
                .bonus(MerchantCategory::Dining, CategoryReward::uncapped(Decimal::MAX)),
        );
        let y = annual_yield(&card, MerchantCategory::Dining, dec!(1000));
        assert_eq!(y.cashback, Decimal::MAX);
        let y = effective_yield(&card, MerchantCategory::Bills, dec!(1000));
        assert_eq!(y.cashback, Decimal::MAX);
    }
}
