use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{OptimizerError, OptimizerResult};
use crate::models::{Expense, MerchantCategory};
use crate::profile::{SpendingProfile, window_start};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: MerchantCategory,
    pub monthly_amount: Decimal,
    /// Share of total monthly spend, 0-100
    pub percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendingAnalysis {
    pub total_monthly_spending: Decimal,
    pub breakdown: Vec<CategoryShare>,
    pub top_categories: Vec<CategoryShare>,
}

/// Breaks a profile down by share of spend, largest category first.
pub fn analyze(profile: &SpendingProfile, top: usize) -> SpendingAnalysis {
    let total = profile.total_monthly();
    let mut breakdown: Vec<CategoryShare> = profile
        .iter()
        .map(|(category, monthly_amount)| CategoryShare {
            category,
            monthly_amount,
            percentage: if total.is_zero() {
                Decimal::ZERO
            } else {
                (monthly_amount / total * Decimal::ONE_HUNDRED).round_dp(2)
            },
        })
        .collect();
    breakdown.sort_by(|a, b| {
        b.monthly_amount
            .cmp(&a.monthly_amount)
            .then_with(|| a.category.cmp(&b.category))
    });
    let top_categories = breakdown.iter().take(top).cloned().collect();

    SpendingAnalysis {
        total_monthly_spending: total,
        breakdown,
        top_categories,
    }
}

/// Spend and transaction count for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTrend {
    /// `YYYY-MM`
    pub month: String,
    pub total_amount: Decimal,
    pub transaction_count: usize,
    pub average_transaction: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendingTrends {
    pub period_months: u32,
    pub trends: Vec<MonthlyTrend>,
    pub total_spending: Decimal,
    /// Averaged over months that had expenses
    pub average_monthly: Decimal,
}

/// Groups expenses in the trailing `months` window by calendar month, oldest
/// first. Months without expenses are left out.
pub fn spending_trends(
    expenses: &[Expense],
    months: u32,
    as_of: NaiveDate,
) -> OptimizerResult<SpendingTrends> {
    if months == 0 {
        return Err(OptimizerError::Configuration(
            "months must be at least 1".to_string(),
        ));
    }
    let start = window_start(months, as_of)?;

    let mut by_month: BTreeMap<(i32, u32), (Decimal, usize)> = BTreeMap::new();
    for expense in expenses.iter().filter(|e| e.date > start && e.date <= as_of) {
        let entry = by_month
            .entry((expense.date.year(), expense.date.month()))
            .or_insert((Decimal::ZERO, 0));
        entry.0 = entry.0.saturating_add(expense.amount);
        entry.1 += 1;
    }

    let trends: Vec<MonthlyTrend> = by_month
        .into_iter()
        .map(|((year, month), (total_amount, transaction_count))| MonthlyTrend {
            month: format!("{year}-{month:02}"),
            total_amount,
            transaction_count,
            average_transaction: total_amount / Decimal::from(transaction_count),
        })
        .collect();
    let total_spending = trends
        .iter()
        .fold(Decimal::ZERO, |acc, t| acc.saturating_add(t.total_amount));
    let average_monthly = if trends.is_empty() {
        Decimal::ZERO
    } else {
        total_spending / Decimal::from(trends.len())
    };

    Ok(SpendingTrends {
        period_months: months,
        trends,
        total_spending,
        average_monthly,
    })
}
