use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::OptimizerError;

/// Fixed set of merchant categories every spend and every reward rate is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MerchantCategory {
    Dining,
    Groceries,
    Petrol,
    ECommerce,
    Bills,
    Entertainment,
    Travel,
    Healthcare,
    Transportation,
    Shopping,
    Uncategorized,
}

impl MerchantCategory {
    pub const ALL: [MerchantCategory; 11] = [
        MerchantCategory::Dining,
        MerchantCategory::Groceries,
        MerchantCategory::Petrol,
        MerchantCategory::ECommerce,
        MerchantCategory::Bills,
        MerchantCategory::Entertainment,
        MerchantCategory::Travel,
        MerchantCategory::Healthcare,
        MerchantCategory::Transportation,
        MerchantCategory::Shopping,
        MerchantCategory::Uncategorized,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MerchantCategory::Dining => "dining",
            MerchantCategory::Groceries => "groceries",
            MerchantCategory::Petrol => "petrol",
            MerchantCategory::ECommerce => "e-commerce",
            MerchantCategory::Bills => "bills",
            MerchantCategory::Entertainment => "entertainment",
            MerchantCategory::Travel => "travel",
            MerchantCategory::Healthcare => "healthcare",
            MerchantCategory::Transportation => "transportation",
            MerchantCategory::Shopping => "shopping",
            MerchantCategory::Uncategorized => "uncategorized",
        }
    }
}

impl fmt::Display for MerchantCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MerchantCategory {
    type Err = OptimizerError;

    /// Case-insensitive; accepts a few aliases used by statement exports.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let category = match normalized.as_str() {
            "dining" | "food" | "restaurants" => MerchantCategory::Dining,
            "groceries" | "grocery" => MerchantCategory::Groceries,
            "petrol" | "fuel" | "gas" => MerchantCategory::Petrol,
            "e-commerce" | "ecommerce" | "online" => MerchantCategory::ECommerce,
            "bills" | "bills & utilities" | "utilities" => MerchantCategory::Bills,
            "entertainment" => MerchantCategory::Entertainment,
            "travel" => MerchantCategory::Travel,
            "healthcare" | "health" => MerchantCategory::Healthcare,
            "transportation" | "transport" => MerchantCategory::Transportation,
            "shopping" | "retail" => MerchantCategory::Shopping,
            "uncategorized" | "general" | "other" => MerchantCategory::Uncategorized,
            _ => return Err(OptimizerError::UnknownCategory(s.to_string())),
        };
        Ok(category)
    }
}

/// Card classification. Only decides which reward currency a card emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    Cashback,
    Points,
    Miles,
    Islamic,
}

impl CardType {
    /// Islamic cards pay rebates, so they are treated like cashback cards.
    pub fn reward_type(self) -> RewardType {
        match self {
            CardType::Cashback | CardType::Islamic => RewardType::Cashback,
            CardType::Points => RewardType::Points,
            CardType::Miles => RewardType::Miles,
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CardType::Cashback => "cashback",
            CardType::Points => "points",
            CardType::Miles => "miles",
            CardType::Islamic => "islamic",
        };
        f.write_str(s)
    }
}

impl FromStr for CardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cashback" => Ok(CardType::Cashback),
            "points" => Ok(CardType::Points),
            "miles" => Ok(CardType::Miles),
            "islamic" => Ok(CardType::Islamic),
            other => Err(format!("unknown card type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardType {
    Cashback,
    Points,
    Miles,
}

impl RewardType {
    pub fn earns_points(self) -> bool {
        !matches!(self, RewardType::Cashback)
    }
}

impl fmt::Display for RewardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RewardType::Cashback => "cashback",
            RewardType::Points => "points",
            RewardType::Miles => "miles",
        };
        f.write_str(s)
    }
}

/// Bonus rate for one category. Rate is a fraction for cashback cards and
/// points per currency unit for points/miles cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReward {
    pub rate: Decimal,
    /// Ceiling on rewarded spend per month
    #[serde(default)]
    pub monthly_cap: Option<Decimal>,
    /// Ceiling on rewarded spend per year
    #[serde(default)]
    pub annual_cap: Option<Decimal>,
    /// Switched-off promotions earn the base rate instead
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl CategoryReward {
    pub fn uncapped(rate: Decimal) -> Self {
        Self {
            rate,
            monthly_cap: None,
            annual_cap: None,
            is_active: true,
        }
    }

    pub fn monthly(rate: Decimal, cap: Decimal) -> Self {
        Self {
            rate,
            monthly_cap: Some(cap),
            annual_cap: None,
            is_active: true,
        }
    }
}

/// A card's reward schedule. `base_rate` applies to unlisted categories and
/// to spend beyond a category cap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardRule {
    #[serde(default)]
    pub base_rate: Decimal,
    #[serde(default)]
    pub categories: BTreeMap<MerchantCategory, CategoryReward>,
}

impl RewardRule {
    pub fn with_base(base_rate: Decimal) -> Self {
        Self {
            base_rate,
            categories: BTreeMap::new(),
        }
    }

    pub fn bonus(mut self, category: MerchantCategory, reward: CategoryReward) -> Self {
        self.categories.insert(category, reward);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditCard {
    pub id: i64,
    pub bank: String,
    pub name: String,
    pub card_type: CardType,
    #[serde(default)]
    pub annual_fee: Decimal,
    /// Eligibility floor on declared annual income
    #[serde(default)]
    pub minimum_income: Option<Decimal>,
    /// Currency value of one point; ignored for cashback cards
    #[serde(default)]
    pub point_value: Decimal,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub rewards: RewardRule,
}

fn default_active() -> bool {
    true
}

impl CreditCard {
    pub fn reward_type(&self) -> RewardType {
        self.card_type.reward_type()
    }

    /// Point value actually applied: zero unless the card earns points.
    pub fn effective_point_value(&self) -> Decimal {
        if self.reward_type().earns_points() {
            self.point_value
        } else {
            Decimal::ZERO
        }
    }

    pub fn summary(&self) -> CardSummary {
        CardSummary {
            id: self.id,
            bank: self.bank.clone(),
            name: self.name.clone(),
            annual_fee: self.annual_fee,
        }
    }

    /// Rejects schedules that would make the objective meaningless.
    pub fn validate(&self) -> Result<(), OptimizerError> {
        let invalid = |reason: String| OptimizerError::InvalidCard {
            card_id: self.id,
            reason,
        };
        if self.annual_fee < Decimal::ZERO {
            return Err(invalid(format!("negative annual fee {}", self.annual_fee)));
        }
        if self.point_value < Decimal::ZERO {
            return Err(invalid(format!("negative point value {}", self.point_value)));
        }
        if self.rewards.base_rate < Decimal::ZERO {
            return Err(invalid(format!("negative base rate {}", self.rewards.base_rate)));
        }
        for (category, reward) in &self.rewards.categories {
            if reward.rate < Decimal::ZERO {
                return Err(invalid(format!("negative rate for {category}")));
            }
            let negative_cap = [reward.monthly_cap, reward.annual_cap]
                .into_iter()
                .flatten()
                .any(|cap| cap < Decimal::ZERO);
            if negative_cap {
                return Err(invalid(format!("negative cap for {category}")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSummary {
    pub id: i64,
    pub bank: String,
    pub name: String,
    pub annual_fee: Decimal,
}

/// Reward produced by one card for one slice of spend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Yield {
    pub cashback: Decimal,
    pub points: Decimal,
    pub point_value: Decimal,
}

impl Yield {
    pub const ZERO: Yield = Yield {
        cashback: Decimal::ZERO,
        points: Decimal::ZERO,
        point_value: Decimal::ZERO,
    };

    /// Monetary value: cashback plus the currency value of points.
    pub fn value(&self) -> Decimal {
        self.cashback.saturating_add(self.point_value)
    }

    pub fn scaled(self, factor: Decimal) -> Yield {
        Yield {
            cashback: self.cashback.saturating_mul(factor),
            points: self.points.saturating_mul(factor),
            point_value: self.point_value.saturating_mul(factor),
        }
    }
}

impl std::ops::Add for Yield {
    type Output = Yield;

    fn add(self, rhs: Yield) -> Yield {
        Yield {
            cashback: self.cashback.saturating_add(rhs.cashback),
            points: self.points.saturating_add(rhs.points),
            point_value: self.point_value.saturating_add(rhs.point_value),
        }
    }
}

impl std::ops::AddAssign for Yield {
    fn add_assign(&mut self, rhs: Yield) {
        *self = *self + rhs;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBreakdown {
    pub category: MerchantCategory,
    pub annual_spend: Decimal,
    /// Rate applied to spend inside the cap
    pub rate: Decimal,
    pub reward_type: RewardType,
    pub reward: Yield,
}

/// Standalone projection of one card against a spending profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardEvaluation {
    pub card: CardSummary,
    pub annual_cashback: Decimal,
    pub annual_points: Decimal,
    pub annual_point_value: Decimal,
    pub annual_fee: Decimal,
    pub net_benefit: Decimal,
    pub breakdown: Vec<CategoryBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEvaluation {
    pub rank: usize,
    #[serde(flatten)]
    pub evaluation: CardEvaluation,
}

/// Which wallet member a category's spend was routed to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedCategory {
    pub category: MerchantCategory,
    pub card_id: i64,
    pub reward: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinationResult {
    /// Ascending, no duplicates
    pub card_ids: Vec<i64>,
    pub cards: Vec<CardSummary>,
    pub projected_cashback: Decimal,
    pub projected_points: Decimal,
    pub projected_point_value: Decimal,
    pub total_annual_fee: Decimal,
    pub net_benefit: Decimal,
    pub routing: Vec<RoutedCategory>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    EmptyCatalog,
    NoEligibleCards,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationOutcome {
    pub results: Vec<CombinationResult>,
    pub empty_reason: Option<EmptyReason>,
    /// Cards that entered the subset search
    pub candidates: usize,
    pub subsets_scored: usize,
    /// Set when a wall-clock budget stopped the enumeration early
    pub truncated: bool,
}

impl OptimizationOutcome {
    pub fn empty(reason: EmptyReason) -> Self {
        Self {
            results: Vec::new(),
            empty_reason: Some(reason),
            candidates: 0,
            subsets_scored: 0,
            truncated: false,
        }
    }

    pub fn best(&self) -> Option<&CombinationResult> {
        self.results.first()
    }

    /// Gain of the best combination over the net benefit of what the user holds today.
    pub fn potential_savings(&self, current_net_benefit: Decimal) -> Option<Decimal> {
        self.best().map(|best| best.net_benefit - current_net_benefit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseAdvice {
    pub recommended_card: CardSummary,
    pub category: MerchantCategory,
    pub amount: Decimal,
    pub reward_amount: Decimal,
    pub reward_type: RewardType,
    /// Raw points earned, zero for cashback cards
    pub points: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Advice {
    Recommended(PurchaseAdvice),
    NoEligibleCard,
}

/// One stored expense record, as handed over by the expense store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub date: NaiveDate,
    pub category: MerchantCategory,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}
