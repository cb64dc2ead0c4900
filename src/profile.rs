use std::collections::BTreeMap;

use chrono::{NaiveDate, TimeDelta};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::{OptimizerError, OptimizerResult};
use crate::models::{Expense, MerchantCategory};
use crate::reward::MONTHS_PER_YEAR;

/// Days counted per month when sizing the trailing window.
pub const DAYS_PER_MONTH: i64 = 30;

pub const DEFAULT_WINDOW_MONTHS: u32 = 3;

/// Monthly spend per category. Construction validates every amount, so a
/// profile in hand is always non-negative and its annual total is
/// representable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<MerchantCategory, Decimal>", into = "BTreeMap<MerchantCategory, Decimal>")]
pub struct SpendingProfile {
    monthly: BTreeMap<MerchantCategory, Decimal>,
}

impl SpendingProfile {
    pub fn new(monthly: BTreeMap<MerchantCategory, Decimal>) -> OptimizerResult<Self> {
        let mut total = Decimal::ZERO;
        for (category, amount) in &monthly {
            if *amount < Decimal::ZERO {
                return Err(OptimizerError::invalid_amount(*category, *amount));
            }
            total = total
                .checked_add(*amount)
                .and_then(|t| t.checked_mul(MONTHS_PER_YEAR).map(|_| t))
                .ok_or_else(|| OptimizerError::invalid_amount(*category, *amount))?;
        }
        Ok(Self { monthly })
    }

    /// Builds a profile from floating-point figures, rejecting NaN and infinities.
    pub fn from_f64<I>(amounts: I) -> OptimizerResult<Self>
    where
        I: IntoIterator<Item = (MerchantCategory, f64)>,
    {
        let mut monthly = BTreeMap::new();
        for (category, amount) in amounts {
            let value = Decimal::from_f64(amount).ok_or_else(|| OptimizerError::InvalidProfile {
                category,
                amount: amount.to_string(),
            })?;
            *monthly.entry(category).or_insert(Decimal::ZERO) += value;
        }
        Self::new(monthly)
    }

    /// Averages the expenses dated within `window_months` before `as_of`
    /// (inclusive) into a monthly figure per category.
    pub fn from_expenses(
        expenses: &[Expense],
        window_months: u32,
        as_of: NaiveDate,
    ) -> OptimizerResult<Self> {
        if window_months == 0 {
            return Err(OptimizerError::Configuration(
                "window_months must be at least 1".to_string(),
            ));
        }
        let start = window_start(window_months, as_of)?;
        let mut totals: BTreeMap<MerchantCategory, Decimal> = BTreeMap::new();
        for expense in expenses.iter().filter(|e| e.date > start && e.date <= as_of) {
            let total = totals.entry(expense.category).or_insert(Decimal::ZERO);
            *total = total
                .checked_add(expense.amount)
                .ok_or_else(|| OptimizerError::invalid_amount(expense.category, expense.amount))?;
        }

        let months = Decimal::from(window_months);
        let monthly = totals
            .into_iter()
            .map(|(category, total)| {
                // refunds can outweigh purchases in a quiet category
                (category, (total / months).max(Decimal::ZERO))
            })
            .collect();
        Self::new(monthly)
    }

    pub fn monthly(&self, category: MerchantCategory) -> Decimal {
        self.monthly.get(&category).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MerchantCategory, Decimal)> + '_ {
        self.monthly.iter().map(|(category, amount)| (*category, *amount))
    }

    /// Categories with spend above zero.
    pub fn active_categories(&self) -> impl Iterator<Item = (MerchantCategory, Decimal)> + '_ {
        self.iter().filter(|(_, amount)| *amount > Decimal::ZERO)
    }

    pub fn total_monthly(&self) -> Decimal {
        self.monthly.values().copied().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_monthly().is_zero()
    }
}

impl TryFrom<BTreeMap<MerchantCategory, Decimal>> for SpendingProfile {
    type Error = OptimizerError;

    fn try_from(monthly: BTreeMap<MerchantCategory, Decimal>) -> Result<Self, Self::Error> {
        Self::new(monthly)
    }
}

impl From<SpendingProfile> for BTreeMap<MerchantCategory, Decimal> {
    fn from(profile: SpendingProfile) -> Self {
        profile.monthly
    }
}

/// Exclusive lower bound of the trailing window.
pub fn window_start(window_months: u32, as_of: NaiveDate) -> OptimizerResult<NaiveDate> {
    TimeDelta::try_days(i64::from(window_months) * DAYS_PER_MONTH)
        .and_then(|span| as_of.checked_sub_signed(span))
        .ok_or_else(|| {
            OptimizerError::Configuration(format!(
                "window_months {window_months} reaches before the earliest representable date"
            ))
        })
}
