//! Wallet search: which subset of the catalog, used together, pays the most.
//!
//! Every subset of up to `max_wallet_size` cards is scored by routing each
//! category's spend to the member card that earns the most on it. Caps stay
//! card-local; a subset never pools one card's cap headroom into another's.
//! The search is exhaustive over the candidate pool, and the pool is bounded
//! by `catalog_ceiling` so enumeration cost stays predictable as the catalog
//! grows.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{OptimizerError, OptimizerResult};
use crate::models::{
    CombinationResult, CreditCard, EmptyReason, MerchantCategory, OptimizationOutcome,
    RoutedCategory, Yield,
};
use crate::profile::SpendingProfile;
use crate::reward::{annual_yield, is_eligible};

pub const DEFAULT_MAX_WALLET_SIZE: usize = 3;
pub const DEFAULT_TOP_N: usize = 5;
pub const DEFAULT_CATALOG_CEILING: usize = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub max_wallet_size: usize,
    pub top_n: usize,
    /// Largest candidate pool searched exhaustively
    pub catalog_ceiling: usize,
    /// Wall-clock budget for the enumeration
    #[serde(default)]
    pub budget: Option<Duration>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_wallet_size: DEFAULT_MAX_WALLET_SIZE,
            top_n: DEFAULT_TOP_N,
            catalog_ceiling: DEFAULT_CATALOG_CEILING,
            budget: None,
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> OptimizerResult<()> {
        if self.max_wallet_size < 1 {
            return Err(OptimizerError::Configuration(
                "max_wallet_size must be at least 1".to_string(),
            ));
        }
        if self.top_n < 1 {
            return Err(OptimizerError::Configuration(
                "top_n must be at least 1".to_string(),
            ));
        }
        if self.catalog_ceiling < 1 {
            return Err(OptimizerError::Configuration(
                "catalog_ceiling must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Stateless search over a catalog; holds only its bounds.
#[derive(Debug, Clone)]
pub struct Optimizer {
    config: OptimizerConfig,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig) -> OptimizerResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Ranks the best wallets for `profile`. Inactive cards are treated as
    /// absent and cards whose income floor exceeds `income` are skipped.
    pub fn optimize(
        &self,
        profile: &SpendingProfile,
        catalog: &[CreditCard],
        income: Option<Decimal>,
    ) -> OptimizerResult<OptimizationOutcome> {
        for card in catalog {
            card.validate()?;
        }

        let mut active: Vec<&CreditCard> = catalog.iter().filter(|c| c.is_active).collect();
        active.sort_by_key(|c| c.id);
        active.dedup_by_key(|c| c.id);
        if active.is_empty() {
            debug!("Catalog has no active cards");
            return Ok(OptimizationOutcome::empty(EmptyReason::EmptyCatalog));
        }

        let eligible: Vec<&CreditCard> = active
            .into_iter()
            .filter(|c| is_eligible(c, income))
            .collect();
        if eligible.is_empty() {
            debug!(income = ?income, "No card passes the income floor");
            return Ok(OptimizationOutcome::empty(EmptyReason::NoEligibleCards));
        }

        let categories: Vec<(MerchantCategory, Decimal)> = profile.active_categories().collect();
        let mut candidates: Vec<Candidate<'_>> = eligible
            .into_iter()
            .map(|card| Candidate::new(card, &categories))
            .collect();

        if candidates.len() > self.config.catalog_ceiling {
            let before = candidates.len();
            candidates = prune(candidates, categories.len(), self.config.catalog_ceiling);
            warn!(
                eligible = before,
                kept = candidates.len(),
                ceiling = self.config.catalog_ceiling,
                "Candidate pool pruned before subset search"
            );
        }

        let deadline = self.config.budget.map(|budget| Instant::now() + budget);
        let largest = self.config.max_wallet_size.min(candidates.len());
        let top_n = self.config.top_n;
        let mut best: BinaryHeap<Tally> = BinaryHeap::with_capacity(top_n + 1);
        let mut subsets_scored = 0usize;
        let mut truncated = false;

        'search: for size in 1..=largest {
            for members in Combinations::new(candidates.len(), size) {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    truncated = true;
                    break 'search;
                }
                subsets_scored += 1;
                let tally = Tally::new(&candidates, members, categories.len());
                if best.len() == top_n && best.peek().is_some_and(|worst| tally >= *worst) {
                    continue;
                }
                best.push(tally);
                if best.len() > top_n {
                    best.pop();
                }
            }
        }

        let results: Vec<CombinationResult> = best
            .into_sorted_vec()
            .iter()
            .map(|tally| score(&candidates, &tally.members, &categories))
            .collect();

        if truncated {
            warn!(subsets_scored, "Wallet search stopped at its time budget");
        }
        info!(
            candidates = candidates.len(),
            subsets_scored,
            returned = results.len(),
            best = ?results.first().map(|r| r.net_benefit),
            "Wallet search complete"
        );

        Ok(OptimizationOutcome {
            results,
            empty_reason: None,
            candidates: candidates.len(),
            subsets_scored,
            truncated,
        })
    }
}

/// Convenience entry point with default catalog ceiling and no income filter.
pub fn optimize(
    profile: &SpendingProfile,
    catalog: &[CreditCard],
    max_wallet_size: usize,
    top_n: usize,
) -> OptimizerResult<OptimizationOutcome> {
    let optimizer = Optimizer::new(OptimizerConfig {
        max_wallet_size,
        top_n,
        ..OptimizerConfig::default()
    })?;
    optimizer.optimize(profile, catalog, None)
}

/// Scores one specific wallet, e.g. the cards a user already holds. Retired
/// cards no longer earn anything and are left out.
pub fn evaluate_wallet(
    cards: &[CreditCard],
    profile: &SpendingProfile,
) -> OptimizerResult<CombinationResult> {
    for card in cards {
        card.validate()?;
    }
    let categories: Vec<(MerchantCategory, Decimal)> = profile.active_categories().collect();
    let mut wallet: Vec<&CreditCard> = cards.iter().filter(|c| c.is_active).collect();
    wallet.sort_by_key(|c| c.id);
    wallet.dedup_by_key(|c| c.id);
    let candidates: Vec<Candidate<'_>> = wallet
        .into_iter()
        .map(|card| Candidate::new(card, &categories))
        .collect();
    let members: Vec<usize> = (0..candidates.len()).collect();
    Ok(score(&candidates, &members, &categories))
}

/// A card with its annual yield per profile category precomputed.
struct Candidate<'a> {
    card: &'a CreditCard,
    yields: Vec<Yield>,
    standalone: Decimal,
}

impl<'a> Candidate<'a> {
    fn new(card: &'a CreditCard, categories: &[(MerchantCategory, Decimal)]) -> Self {
        let yields: Vec<Yield> = categories
            .iter()
            .map(|(category, monthly)| annual_yield(card, *category, *monthly))
            .collect();
        let standalone = yields
            .iter()
            .fold(Decimal::ZERO, |acc, y| acc.saturating_add(y.value()))
            .saturating_sub(card.annual_fee);
        Self {
            card,
            yields,
            standalone,
        }
    }
}

/// Higher yield wins, then the cheaper card, then the lower id.
fn routing_order(a: &Candidate<'_>, b: &Candidate<'_>, category: usize) -> Ordering {
    b.yields[category]
        .value()
        .cmp(&a.yields[category].value())
        .then_with(|| a.card.annual_fee.cmp(&b.card.annual_fee))
        .then_with(|| a.card.id.cmp(&b.card.id))
}

/// Net benefit and fee of one subset, without the per-category detail.
/// Ordered best first, the way results are ranked.
#[derive(PartialEq, Eq)]
struct Tally {
    net_benefit: Decimal,
    annual_fee: Decimal,
    members: Vec<usize>,
}

impl Tally {
    fn new(candidates: &[Candidate<'_>], members: Vec<usize>, category_count: usize) -> Self {
        let value = (0..category_count)
            .filter_map(|index| {
                members
                    .iter()
                    .map(|&m| &candidates[m])
                    .min_by(|a, b| routing_order(a, b, index))
                    .map(|best| best.yields[index].value())
            })
            .fold(Decimal::ZERO, Decimal::saturating_add);
        let annual_fee = wallet_fee(candidates, &members);
        Self {
            net_benefit: value.saturating_sub(annual_fee),
            annual_fee,
            members,
        }
    }
}

impl Ord for Tally {
    fn cmp(&self, other: &Self) -> Ordering {
        // members are ascending indices into an id-sorted pool, so they
        // order the same way as card ids
        other
            .net_benefit
            .cmp(&self.net_benefit)
            .then_with(|| self.annual_fee.cmp(&other.annual_fee))
            .then_with(|| self.members.cmp(&other.members))
    }
}

impl PartialOrd for Tally {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn wallet_fee(candidates: &[Candidate<'_>], members: &[usize]) -> Decimal {
    members
        .iter()
        .fold(Decimal::ZERO, |acc, &m| acc.saturating_add(candidates[m].card.annual_fee))
}

fn score(
    candidates: &[Candidate<'_>],
    members: &[usize],
    categories: &[(MerchantCategory, Decimal)],
) -> CombinationResult {
    let mut total = Yield::ZERO;
    let mut routing = Vec::with_capacity(categories.len());

    for (index, (category, _)) in categories.iter().enumerate() {
        let best = members
            .iter()
            .map(|&m| &candidates[m])
            .min_by(|a, b| routing_order(a, b, index));
        if let Some(best) = best {
            let reward = best.yields[index];
            total += reward;
            routing.push(RoutedCategory {
                category: *category,
                card_id: best.card.id,
                reward: reward.value(),
            });
        }
    }

    let total_annual_fee = wallet_fee(candidates, members);
    CombinationResult {
        card_ids: members.iter().map(|&m| candidates[m].card.id).collect(),
        cards: members.iter().map(|&m| candidates[m].card.summary()).collect(),
        projected_cashback: total.cashback,
        projected_points: total.points,
        projected_point_value: total.point_value,
        total_annual_fee,
        net_benefit: total.value().saturating_sub(total_annual_fee),
        routing,
    }
}

/// Keeps every category's top earner, then fills up with the best standalone
/// cards. Result stays ordered by card id.
fn prune<'a>(
    candidates: Vec<Candidate<'a>>,
    category_count: usize,
    ceiling: usize,
) -> Vec<Candidate<'a>> {
    let mut by_standalone: Vec<usize> = (0..candidates.len()).collect();
    by_standalone.sort_by(|&a, &b| {
        let (a, b) = (&candidates[a], &candidates[b]);
        b.standalone
            .cmp(&a.standalone)
            .then_with(|| a.card.annual_fee.cmp(&b.card.annual_fee))
            .then_with(|| a.card.id.cmp(&b.card.id))
    });

    let champions: HashSet<usize> = (0..category_count)
        .filter_map(|category| {
            (0..candidates.len())
                .min_by(|&a, &b| routing_order(&candidates[a], &candidates[b], category))
        })
        .collect();

    let mut keep: Vec<usize> = by_standalone
        .iter()
        .copied()
        .filter(|i| champions.contains(i))
        .take(ceiling)
        .collect();
    for &i in &by_standalone {
        if keep.len() >= ceiling {
            break;
        }
        if !keep.contains(&i) {
            keep.push(i);
        }
    }

    let keep: HashSet<usize> = keep.into_iter().collect();
    candidates
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep.contains(i))
        .map(|(_, candidate)| candidate)
        .collect()
}

/// Lexicographic k-combinations of `0..n`.
struct Combinations {
    n: usize,
    indices: Vec<usize>,
    started: bool,
    done: bool,
}

impl Combinations {
    fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            indices: (0..k).collect(),
            started: false,
            done: k == 0 || k > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(self.indices.clone());
        }

        let k = self.indices.len();
        let mut i = k;
        while i > 0 {
            i -= 1;
            if self.indices[i] < self.n - k + i {
                self.indices[i] += 1;
                for j in i + 1..k {
                    self.indices[j] = self.indices[j - 1] + 1;
                }
                return Some(self.indices.clone());
            }
        }
        self.done = true;
        None
    }
}
