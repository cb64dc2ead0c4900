use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Result, Row, params};
use rust_decimal::Decimal;
use tracing::debug;

use crate::models::{CategoryReward, CreditCard, Expense, MerchantCategory, RewardRule};
use crate::profile::{SpendingProfile, window_start};

/// Creates tables on the given connection.
pub fn init_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS cards (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            bank            TEXT NOT NULL,
            name            TEXT NOT NULL,
            card_type       TEXT NOT NULL,
            annual_fee      TEXT NOT NULL DEFAULT '0',
            minimum_income  TEXT,
            point_value     TEXT NOT NULL DEFAULT '0',
            is_active       INTEGER NOT NULL DEFAULT 1
        );
        CREATE TABLE IF NOT EXISTS card_rewards (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            card_id      INTEGER NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
            category     TEXT,
            rate         TEXT NOT NULL,
            monthly_cap  TEXT,
            annual_cap   TEXT,
            is_active    INTEGER NOT NULL DEFAULT 1
        );
        CREATE TABLE IF NOT EXISTS expenses (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            expense_date  TEXT NOT NULL,
            category      TEXT NOT NULL,
            amount        TEXT NOT NULL,
            description   TEXT
        );
        CREATE TABLE IF NOT EXISTS held_cards (
            card_id  INTEGER PRIMARY KEY REFERENCES cards(id) ON DELETE CASCADE
        );",
    )?;
    Ok(())
}

/// Opens (or creates) the SQLite database file and ensures tables exist.
pub fn init_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    init_tables(&conn)?;
    Ok(conn)
}

/// Inserts a card and its reward schedule; the card's `id` is ignored and the
/// new row id returned.
pub fn add_card(conn: &Connection, card: &CreditCard) -> Result<i64> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO cards (bank, name, card_type, annual_fee, minimum_income, point_value, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            card.bank,
            card.name,
            card.card_type.to_string(),
            card.annual_fee.to_string(),
            card.minimum_income.map(|d| d.to_string()),
            card.point_value.to_string(),
            card.is_active,
        ],
    )?;
    let id = tx.last_insert_rowid();

    insert_reward(&tx, id, None, &CategoryReward::uncapped(card.rewards.base_rate))?;
    for (category, reward) in &card.rewards.categories {
        insert_reward(&tx, id, Some(*category), reward)?;
    }
    tx.commit()?;
    debug!(card_id = id, name = %card.name, "Card stored");
    Ok(id)
}

/// Sets the rate for one category of a card, or its base rate when
/// `category` is `None`. Replaces any existing rule for that slot.
pub fn set_reward(
    conn: &Connection,
    card_id: i64,
    category: Option<MerchantCategory>,
    reward: &CategoryReward,
) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM card_rewards WHERE card_id = ?1 AND category IS ?2",
        params![card_id, category.map(|c| c.to_string())],
    )?;
    insert_reward(&tx, card_id, category, reward)?;
    tx.commit()
}

fn insert_reward(
    conn: &Connection,
    card_id: i64,
    category: Option<MerchantCategory>,
    reward: &CategoryReward,
) -> Result<()> {
    conn.execute(
        "INSERT INTO card_rewards (card_id, category, rate, monthly_cap, annual_cap, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            card_id,
            category.map(|c| c.to_string()),
            reward.rate.to_string(),
            reward.monthly_cap.map(|d| d.to_string()),
            reward.annual_cap.map(|d| d.to_string()),
            reward.is_active,
        ],
    )?;
    Ok(())
}

/// Switches a category bonus on or off without deleting it. Returns false
/// when the card has no rule for that category.
pub fn set_reward_active(
    conn: &Connection,
    card_id: i64,
    category: MerchantCategory,
    active: bool,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE card_rewards SET is_active = ?3 WHERE card_id = ?1 AND category = ?2",
        params![card_id, category.to_string(), active],
    )?;
    Ok(changed > 0)
}

pub fn list_cards(conn: &Connection, active_only: bool) -> Result<Vec<CreditCard>> {
    let mut stmt = conn.prepare(
        "SELECT id, bank, name, card_type, annual_fee, minimum_income, point_value, is_active
         FROM cards
         WHERE is_active = 1 OR ?1 = 0
         ORDER BY id",
    )?;
    let rows = stmt.query_map(params![active_only], card_from_row)?;

    let mut cards = Vec::new();
    for card in rows {
        cards.push(card?);
    }

    let mut rewards = load_rewards(conn)?;
    for card in &mut cards {
        if let Some(rule) = rewards.remove(&card.id) {
            card.rewards = rule;
        }
    }
    Ok(cards)
}

pub fn get_card(conn: &Connection, id: i64) -> Result<Option<CreditCard>> {
    let card = conn
        .query_row(
            "SELECT id, bank, name, card_type, annual_fee, minimum_income, point_value, is_active
             FROM cards WHERE id = ?1",
            params![id],
            card_from_row,
        )
        .optional()?;
    let Some(mut card) = card else {
        return Ok(None);
    };
    if let Some(rule) = load_rewards(conn)?.remove(&id) {
        card.rewards = rule;
    }
    Ok(Some(card))
}

pub fn remove_card(conn: &Connection, id: i64) -> Result<bool> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM card_rewards WHERE card_id = ?1", params![id])?;
    tx.execute("DELETE FROM held_cards WHERE card_id = ?1", params![id])?;
    let changed = tx.execute("DELETE FROM cards WHERE id = ?1", params![id])?;
    tx.commit()?;
    Ok(changed > 0)
}

pub fn set_card_active(conn: &Connection, id: i64, active: bool) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE cards SET is_active = ?2 WHERE id = ?1",
        params![id, active],
    )?;
    Ok(changed > 0)
}

pub fn count_cards(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))
}

pub fn add_expense(conn: &Connection, expense: &Expense) -> Result<i64> {
    conn.execute(
        "INSERT INTO expenses (expense_date, category, amount, description)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            expense.date,
            expense.category.to_string(),
            expense.amount.to_string(),
            expense.description,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Expenses dated after `since`, oldest first.
pub fn list_expenses_since(conn: &Connection, since: NaiveDate) -> Result<Vec<Expense>> {
    let mut stmt = conn.prepare(
        "SELECT expense_date, category, amount, description
         FROM expenses
         WHERE expense_date > ?1
         ORDER BY expense_date, id",
    )?;
    let rows = stmt.query_map(params![since], |row| {
        Ok(Expense {
            date: row.get(0)?,
            category: category_at(row, 1)?,
            amount: decimal_at(row, 2)?,
            description: row.get(3)?,
        })
    })?;

    let mut expenses = Vec::new();
    for expense in rows {
        expenses.push(expense?);
    }
    Ok(expenses)
}

/// Monthly spending profile over the trailing window ending at `as_of`.
pub fn load_profile(
    conn: &Connection,
    window_months: u32,
    as_of: NaiveDate,
) -> crate::error::OptimizerResult<SpendingProfile> {
    let expenses = list_expenses_since(conn, window_start(window_months, as_of)?)?;
    SpendingProfile::from_expenses(&expenses, window_months, as_of)
}

pub fn hold_card(conn: &Connection, card_id: i64) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO held_cards (card_id) SELECT id FROM cards WHERE id = ?1",
        params![card_id],
    )?;
    Ok(changed > 0)
}

pub fn release_card(conn: &Connection, card_id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM held_cards WHERE card_id = ?1", params![card_id])?;
    Ok(changed > 0)
}

/// Cards the user holds, including inactive ones.
pub fn held_cards(conn: &Connection) -> Result<Vec<CreditCard>> {
    let mut stmt = conn.prepare("SELECT card_id FROM held_cards ORDER BY card_id")?;
    let ids = stmt.query_map([], |row| row.get::<_, i64>(0))?;
    let mut held = Vec::new();
    for id in ids {
        held.push(id?);
    }
    let cards = list_cards(conn, false)?;
    Ok(cards.into_iter().filter(|c| held.contains(&c.id)).collect())
}

fn card_from_row(row: &Row<'_>) -> Result<CreditCard> {
    let card_type: String = row.get(3)?;
    Ok(CreditCard {
        id: row.get(0)?,
        bank: row.get(1)?,
        name: row.get(2)?,
        card_type: card_type
            .parse()
            .map_err(|e: String| conversion_error(3, e.into()))?,
        annual_fee: decimal_at(row, 4)?,
        minimum_income: opt_decimal_at(row, 5)?,
        point_value: decimal_at(row, 6)?,
        is_active: row.get(7)?,
        rewards: RewardRule::default(),
    })
}

fn load_rewards(conn: &Connection) -> Result<HashMap<i64, RewardRule>> {
    let mut stmt = conn.prepare(
        "SELECT card_id, category, rate, monthly_cap, annual_cap, is_active
         FROM card_rewards ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        let category: Option<String> = row.get(1)?;
        let category = category
            .map(|c| MerchantCategory::from_str(&c))
            .transpose()
            .map_err(|e| conversion_error(1, Box::new(e)))?;
        Ok((
            row.get::<_, i64>(0)?,
            category,
            CategoryReward {
                rate: decimal_at(row, 2)?,
                monthly_cap: opt_decimal_at(row, 3)?,
                annual_cap: opt_decimal_at(row, 4)?,
                is_active: row.get(5)?,
            },
        ))
    })?;

    let mut rules: HashMap<i64, RewardRule> = HashMap::new();
    for row in rows {
        let (card_id, category, reward) = row?;
        let rule = rules.entry(card_id).or_default();
        match category {
            Some(category) => {
                rule.categories.insert(category, reward);
            }
            None => rule.base_rate = reward.rate,
        }
    }
    Ok(rules)
}

fn decimal_at(row: &Row<'_>, idx: usize) -> Result<Decimal> {
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e: rust_decimal::Error| conversion_error(idx, Box::new(e)))
}

fn opt_decimal_at(row: &Row<'_>, idx: usize) -> Result<Option<Decimal>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| t.parse())
        .transpose()
        .map_err(|e: rust_decimal::Error| conversion_error(idx, Box::new(e)))
}

fn category_at(row: &Row<'_>, idx: usize) -> Result<MerchantCategory> {
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e: crate::error::OptimizerError| conversion_error(idx, Box::new(e)))
}

fn conversion_error(
    idx: usize,
    err: Box<dyn std::error::Error + Send + Sync + 'static>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err)
}
