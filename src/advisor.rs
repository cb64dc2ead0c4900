//! "Which card for this purchase" against the cards a user already holds.

use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{OptimizerError, OptimizerResult};
use crate::models::{Advice, CreditCard, MerchantCategory, PurchaseAdvice};
use crate::reward::effective_yield;

/// Picks the held card earning the most on `amount` in `category`.
///
/// The purchase is treated as that month's only spend in the category, so a
/// monthly cap applies to the purchase alone. Ties go to the lower annual fee,
/// then the lower id. Holding no active card is a normal state, not an error.
pub fn advise(
    held_cards: &[CreditCard],
    category: MerchantCategory,
    amount: Decimal,
) -> OptimizerResult<Advice> {
    if amount < Decimal::ZERO {
        return Err(OptimizerError::invalid_amount(category, amount));
    }

    let best = held_cards
        .iter()
        .filter(|card| card.is_active)
        .map(|card| (card, effective_yield(card, category, amount)))
        .min_by(|(a, ya), (b, yb)| {
            yb.value()
                .cmp(&ya.value())
                .then_with(|| a.annual_fee.cmp(&b.annual_fee))
                .then_with(|| a.id.cmp(&b.id))
        });

    let Some((card, reward)) = best else {
        debug!(%category, "No held card to advise on");
        return Ok(Advice::NoEligibleCard);
    };

    debug!(card_id = card.id, %category, reward = %reward.value(), "Purchase advice");
    Ok(Advice::Recommended(PurchaseAdvice {
        recommended_card: card.summary(),
        category,
        amount,
        reward_amount: reward.value(),
        reward_type: card.reward_type(),
        points: reward.points,
    }))
}
