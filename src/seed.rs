//! Sample catalog of Malaysian cards for demos and first runs.

use rusqlite::Connection;
use rust_decimal::Decimal;
use tracing::info;

use crate::db;
use crate::models::{CardType, CategoryReward, CreditCard, MerchantCategory, RewardRule};

/// Default currency value of one rewards point (RM 0.01).
pub const DEFAULT_POINT_VALUE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

fn rate(mantissa: i64, scale: u32) -> Decimal {
    Decimal::new(mantissa, scale)
}

fn rm(amount: i64) -> Decimal {
    Decimal::from(amount)
}

fn cashback(id: i64, bank: &str, name: &str, minimum_income: i64, rewards: RewardRule) -> CreditCard {
    CreditCard {
        id,
        bank: bank.to_string(),
        name: name.to_string(),
        card_type: CardType::Cashback,
        annual_fee: Decimal::ZERO,
        minimum_income: Some(rm(minimum_income)),
        point_value: Decimal::ZERO,
        is_active: true,
        rewards,
    }
}

fn points(id: i64, bank: &str, name: &str, minimum_income: i64, rewards: RewardRule) -> CreditCard {
    CreditCard {
        id,
        bank: bank.to_string(),
        name: name.to_string(),
        card_type: CardType::Points,
        annual_fee: rm(150),
        minimum_income: Some(rm(minimum_income)),
        point_value: DEFAULT_POINT_VALUE,
        is_active: true,
        rewards,
    }
}

pub fn sample_catalog() -> Vec<CreditCard> {
    use MerchantCategory::*;

    vec![
        cashback(
            1,
            "Maybank",
            "Maybank 2 Cards",
            24000,
            RewardRule::with_base(rate(5, 3))
                .bonus(Dining, CategoryReward::uncapped(rate(5, 2)))
                .bonus(Groceries, CategoryReward::monthly(rate(2, 2), rm(300)))
                .bonus(Petrol, CategoryReward::monthly(rate(2, 2), rm(300))),
        ),
        cashback(
            2,
            "CIMB",
            "CIMB Cash Rebate Platinum",
            36000,
            RewardRule::with_base(rate(2, 3))
                .bonus(Petrol, CategoryReward::monthly(rate(8, 2), rm(500))),
        ),
        cashback(
            3,
            "Public Bank",
            "Public Bank Quantum Visa",
            24000,
            RewardRule::with_base(rate(1, 2))
                .bonus(Petrol, CategoryReward::monthly(rate(5, 2), rm(300))),
        ),
        cashback(
            4,
            "RHB",
            "RHB Easy Visa",
            24000,
            RewardRule::with_base(rate(5, 3))
                .bonus(Groceries, CategoryReward::monthly(rate(5, 2), rm(500)))
                .bonus(Petrol, CategoryReward::monthly(rate(5, 2), rm(500))),
        ),
        cashback(
            5,
            "Hong Leong",
            "Hong Leong Wise Platinum",
            36000,
            RewardRule::with_base(rate(5, 3))
                .bonus(Petrol, CategoryReward::monthly(rate(5, 2), rm(400)))
                .bonus(Groceries, CategoryReward::monthly(rate(5, 2), rm(400))),
        ),
        cashback(
            6,
            "AmBank",
            "AmBank True Cash Back",
            30000,
            RewardRule::with_base(rate(1, 2))
                .bonus(Petrol, CategoryReward::monthly(rate(5, 2), rm(200))),
        ),
        points(
            7,
            "Maybank",
            "Maybank Treats General Card",
            36000,
            RewardRule::with_base(rm(1))
                .bonus(Dining, CategoryReward::uncapped(rm(5)))
                .bonus(Shopping, CategoryReward::uncapped(rm(3)))
                .bonus(Travel, CategoryReward::uncapped(rm(3))),
        ),
        points(
            8,
            "Standard Chartered",
            "Standard Chartered Platinum",
            42000,
            RewardRule::with_base(rm(1))
                .bonus(Dining, CategoryReward::uncapped(rm(4)))
                .bonus(Shopping, CategoryReward::uncapped(rm(2))),
        ),
    ]
}

/// Loads the sample catalog into an empty store. Returns how many cards were
/// written; a store that already has cards is left alone.
pub fn seed(conn: &Connection) -> rusqlite::Result<usize> {
    if db::count_cards(conn)? > 0 {
        info!("Card catalog already initialized");
        return Ok(0);
    }
    let catalog = sample_catalog();
    for card in &catalog {
        db::add_card(conn, card)?;
    }
    info!(cards = catalog.len(), "Seeded sample card catalog");
    Ok(catalog.len())
}
