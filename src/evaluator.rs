//! Standalone projection of one card against a spending profile.

use std::cmp::Ordering;

use crate::models::{CardEvaluation, CategoryBreakdown, CreditCard, RankedEvaluation, Yield};
use crate::profile::SpendingProfile;
use crate::reward::{MONTHS_PER_YEAR, annual_yield, category_rate};

pub fn evaluate(card: &CreditCard, profile: &SpendingProfile) -> CardEvaluation {
    let mut total = Yield::ZERO;
    let mut breakdown = Vec::new();

    for (category, monthly) in profile.iter() {
        let reward = annual_yield(card, category, monthly);
        total += reward;
        breakdown.push(CategoryBreakdown {
            category,
            annual_spend: monthly * MONTHS_PER_YEAR,
            rate: category_rate(card, category),
            reward_type: card.reward_type(),
            reward,
        });
    }

    CardEvaluation {
        card: card.summary(),
        annual_cashback: total.cashback,
        annual_points: total.points,
        annual_point_value: total.point_value,
        annual_fee: card.annual_fee,
        net_benefit: total.value() - card.annual_fee,
        breakdown,
    }
}

/// Evaluates each card on its own and ranks them, best first.
pub fn compare_cards(cards: &[CreditCard], profile: &SpendingProfile) -> Vec<RankedEvaluation> {
    let mut evaluations: Vec<CardEvaluation> =
        cards.iter().map(|card| evaluate(card, profile)).collect();
    evaluations.sort_by(rank_order);
    evaluations
        .into_iter()
        .enumerate()
        .map(|(i, evaluation)| RankedEvaluation {
            rank: i + 1,
            evaluation,
        })
        .collect()
}

fn rank_order(a: &CardEvaluation, b: &CardEvaluation) -> Ordering {
    b.net_benefit
        .cmp(&a.net_benefit)
        .then_with(|| a.annual_fee.cmp(&b.annual_fee))
        .then_with(|| a.card.id.cmp(&b.card.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CardType, CategoryReward, MerchantCategory, RewardRule};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn card(id: i64, card_type: CardType, fee: Decimal, rewards: RewardRule) -> CreditCard {
        CreditCard {
            id,
            bank: "Bank".into(),
            name: format!("Card {id}"),
            card_type,
            annual_fee: fee,
            minimum_income: None,
            point_value: dec!(0.01),
            is_active: true,
            rewards,
        }
    }

    fn profile() -> SpendingProfile {
        SpendingProfile::from_f64([
            (MerchantCategory::Dining, 500.0),
            (MerchantCategory::Groceries, 300.0),
            (MerchantCategory::Petrol, 200.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_evaluate_cashback_card() {
        let c = card(
            1,
            CardType::Cashback,
            Decimal::ZERO,
            RewardRule::default()
                .bonus(MerchantCategory::Dining, CategoryReward::monthly(dec!(0.05), dec!(1000))),
        );
        let eval = evaluate(&c, &profile());
        assert_eq!(eval.annual_cashback, dec!(300));
        assert_eq!(eval.annual_points, Decimal::ZERO);
        assert_eq!(eval.net_benefit, dec!(300));
        assert_eq!(eval.breakdown.len(), 3);
        let dining = &eval.breakdown[0];
        assert_eq!(dining.category, MerchantCategory::Dining);
        assert_eq!(dining.annual_spend, dec!(6000));
        assert_eq!(dining.rate, dec!(0.05));
    }

    #[test]
    fn test_evaluate_points_card_subtracts_fee() {
        let c = card(
            2,
            CardType::Points,
            dec!(150),
            RewardRule::with_base(dec!(1))
                .bonus(MerchantCategory::Dining, CategoryReward::uncapped(dec!(5))),
        );
        let eval = evaluate(&c, &profile());
        // dining 6000 * 5 + (3600 + 2400) * 1 points
        assert_eq!(eval.annual_points, dec!(36000));
        assert_eq!(eval.annual_point_value, dec!(360));
        assert_eq!(eval.annual_cashback, Decimal::ZERO);
        assert_eq!(eval.net_benefit, dec!(210));
    }

    #[test]
    fn test_monthly_cap_applied_per_month() {
        let c = card(
            3,
            CardType::Cashback,
            Decimal::ZERO,
            RewardRule::default()
                .bonus(MerchantCategory::Petrol, CategoryReward::monthly(dec!(0.08), dec!(100))),
        );
        let eval = evaluate(&c, &profile());
        // 100 a month at 8%, the other 100 earns nothing
        assert_eq!(eval.annual_cashback, dec!(96));
    }

    #[test]
    fn test_zero_profile_nets_minus_fee() {
        let c = card(4, CardType::Cashback, dec!(80), RewardRule::with_base(dec!(0.01)));
        let eval = evaluate(&c, &SpendingProfile::default());
        assert_eq!(eval.net_benefit, dec!(-80));
        assert!(eval.breakdown.is_empty());
    }

    #[test]
    fn test_compare_cards_ranks_by_net_then_fee() {
        let flat = RewardRule::with_base(dec!(0.01));
        let cards = vec![
            card(1, CardType::Cashback, dec!(50), flat.clone()),
            card(2, CardType::Cashback, Decimal::ZERO, RewardRule::default()),
            card(3, CardType::Cashback, Decimal::ZERO, flat),
        ];
        let ranked = compare_cards(&cards, &profile());
        let order: Vec<i64> = ranked.iter().map(|r| r.evaluation.card.id).collect();
        // 120 net, 70 net, 0 net
        assert_eq!(order, vec![3, 1, 2]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[2].rank, 3);
    }
}
