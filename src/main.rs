use std::process::ExitCode;

use cc_optimizer::config::AppConfig;
use cc_optimizer::db;
use cc_optimizer::models::{
    Advice, CardType, CategoryReward, CombinationResult, CreditCard, EmptyReason, Expense,
    MerchantCategory, RewardRule,
};
use cc_optimizer::optimizer::{Optimizer, evaluate_wallet};
use cc_optimizer::{
    OptimizerError, OptimizerResult, SpendingProfile, advise, analysis, compare_cards, evaluate,
    seed,
};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use rust_decimal::Decimal;
use tabled::{Table, Tabled};
use tracing_subscriber::EnvFilter;

/// Credit card optimizer: which cards to hold and which to swipe
#[derive(Parser)]
#[command(name = "cc-optimizer", version, about)]
struct Cli {
    #[command(flatten)]
    config: AppConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a card to the catalog
    AddCard {
        /// Issuing bank (e.g. "Maybank")
        #[arg(long)]
        bank: String,
        /// Product name (e.g. "Maybank 2 Cards")
        #[arg(long)]
        name: String,
        /// cashback, points, miles or islamic
        #[arg(long, default_value = "cashback")]
        card_type: CardType,
        #[arg(long, default_value = "0")]
        annual_fee: Decimal,
        /// Minimum annual income required to apply
        #[arg(long)]
        minimum_income: Option<Decimal>,
        /// Currency value of one point (defaults to 0.01 for points and miles cards)
        #[arg(long)]
        point_value: Option<Decimal>,
        /// Rate earned on categories without a bonus
        #[arg(long, default_value = "0")]
        base_rate: Decimal,
    },

    /// Set a category bonus rate on a card (omit --category to set the base rate)
    AddReward {
        #[arg(long)]
        card_id: i64,
        #[arg(long)]
        category: Option<MerchantCategory>,
        /// Fraction for cashback cards, points per currency unit otherwise
        #[arg(long)]
        rate: Decimal,
        /// Ceiling on rewarded spend per month
        #[arg(long)]
        monthly_cap: Option<Decimal>,
        /// Ceiling on rewarded spend per year
        #[arg(long)]
        annual_cap: Option<Decimal>,
    },

    /// Switch off a category bonus so that category earns the base rate
    RetireReward {
        #[arg(long)]
        card_id: i64,
        #[arg(long)]
        category: MerchantCategory,
    },

    /// List catalog cards
    ListCards {
        /// Include retired cards
        #[arg(long)]
        all: bool,
    },

    /// Remove a card by ID
    RemoveCard {
        #[arg(long)]
        id: i64,
    },

    /// Mark a card inactive so it is no longer recommended
    Retire {
        #[arg(long)]
        id: i64,
    },

    /// Record an expense
    AddExpense {
        #[arg(long)]
        category: MerchantCategory,
        #[arg(long)]
        amount: Decimal,
        /// Expense date, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        description: Option<String>,
    },

    /// Mark a card as held by you
    Hold {
        #[arg(long)]
        id: i64,
    },

    /// Stop holding a card
    Release {
        #[arg(long)]
        id: i64,
    },

    /// Load the sample catalog into an empty database
    Seed,

    /// Show monthly spending by category
    Spending {
        #[arg(long, default_value_t = 5)]
        top: usize,
    },

    /// Show monthly totals over recent months
    Trends {
        #[arg(long, default_value_t = 6)]
        months: u32,
    },

    /// Project one card against your spending
    Simulate {
        #[arg(long)]
        id: i64,
    },

    /// Rank a few cards against your spending
    Compare {
        #[arg(long, num_args = 1..)]
        id: Vec<i64>,
    },

    /// Find the best card combinations for your spending
    Optimize {
        /// Declared annual income, used for eligibility
        #[arg(long)]
        income: Option<Decimal>,
    },

    /// Find the best held card for a purchase
    Advise {
        #[arg(long)]
        category: MerchantCategory,
        #[arg(long)]
        amount: Decimal,
    },
}

#[derive(Tabled)]
struct CardRow {
    id: i64,
    bank: String,
    name: String,
    #[tabled(rename = "type")]
    card_type: CardType,
    annual_fee: Decimal,
    min_income: String,
    base_rate: Decimal,
    bonuses: String,
    active: bool,
}

impl From<&CreditCard> for CardRow {
    fn from(card: &CreditCard) -> Self {
        let bonuses = card
            .rewards
            .categories
            .iter()
            .filter(|(_, reward)| reward.is_active)
            .map(|(category, reward)| match reward.monthly_cap {
                Some(cap) => format!("{category} {} (cap {cap}/mo)", reward.rate),
                None => format!("{category} {}", reward.rate),
            })
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            id: card.id,
            bank: card.bank.clone(),
            name: card.name.clone(),
            card_type: card.card_type,
            annual_fee: card.annual_fee,
            min_income: card
                .minimum_income
                .map_or_else(|| "-".to_string(), |d| d.to_string()),
            base_rate: card.rewards.base_rate,
            bonuses,
            active: card.is_active,
        }
    }
}

#[derive(Tabled)]
struct CombinationRow {
    rank: usize,
    cards: String,
    cashback: Decimal,
    points: Decimal,
    point_value: Decimal,
    annual_fee: Decimal,
    net_benefit: Decimal,
}

impl CombinationRow {
    fn new(rank: usize, result: &CombinationResult) -> Self {
        Self {
            rank,
            cards: result
                .cards
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(" + "),
            cashback: result.projected_cashback.round_dp(2),
            points: result.projected_points.round_dp(0),
            point_value: result.projected_point_value.round_dp(2),
            annual_fee: result.total_annual_fee.round_dp(2),
            net_benefit: result.net_benefit.round_dp(2),
        }
    }
}

#[derive(Tabled)]
struct EvaluationRow {
    rank: usize,
    card: String,
    cashback: Decimal,
    points: Decimal,
    annual_fee: Decimal,
    net_benefit: Decimal,
}

#[derive(Tabled)]
struct BreakdownRow {
    category: MerchantCategory,
    annual_spend: Decimal,
    rate: Decimal,
    reward: Decimal,
}

#[derive(Tabled)]
struct TrendRow {
    month: String,
    total: Decimal,
    transactions: usize,
    average: Decimal,
}

#[derive(Tabled)]
struct SpendingRow {
    category: MerchantCategory,
    monthly: Decimal,
    percent: Decimal,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "cc_optimizer=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> OptimizerResult<()> {
    let conn = db::init_db(&cli.config.db_path)?;
    let today = Local::now().date_naive();

    match cli.command {
        Commands::AddCard {
            bank,
            name,
            card_type,
            annual_fee,
            minimum_income,
            point_value,
            base_rate,
        } => {
            let point_value = point_value.unwrap_or(if card_type.reward_type().earns_points() {
                seed::DEFAULT_POINT_VALUE
            } else {
                Decimal::ZERO
            });
            let card = CreditCard {
                id: 0,
                bank,
                name,
                card_type,
                annual_fee,
                minimum_income,
                point_value,
                is_active: true,
                rewards: RewardRule::with_base(base_rate),
            };
            card.validate()?;
            let id = db::add_card(&conn, &card)?;
            println!("Added card '{}' with ID {}", card.name, id);
        }

        Commands::AddReward {
            card_id,
            category,
            rate,
            monthly_cap,
            annual_cap,
        } => {
            let mut card = db::get_card(&conn, card_id)?.ok_or(OptimizerError::CardNotFound(card_id))?;
            let reward = CategoryReward {
                rate,
                monthly_cap,
                annual_cap,
                is_active: true,
            };
            match category {
                Some(category) => {
                    card.rewards.categories.insert(category, reward.clone());
                }
                None => card.rewards.base_rate = rate,
            }
            card.validate()?;
            db::set_reward(&conn, card_id, category, &reward)?;
            let slot = category.map_or_else(|| "base".to_string(), |c| c.to_string());
            println!("Set {slot} rate {rate} on card {card_id}");
        }

        Commands::RetireReward { card_id, category } => {
            if db::set_reward_active(&conn, card_id, category, false)? {
                println!("Retired {category} bonus on card {card_id}");
            } else {
                println!("Card {card_id} has no {category} bonus");
            }
        }

        Commands::ListCards { all } => {
            let cards = db::list_cards(&conn, !all)?;
            if cards.is_empty() {
                println!("No cards found. Add one with: cc-optimizer add-card --bank \"...\" --name \"...\", or run: cc-optimizer seed");
            } else {
                let rows: Vec<CardRow> = cards.iter().map(CardRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::RemoveCard { id } => {
            if db::remove_card(&conn, id)? {
                println!("Removed card with ID {id}");
            } else {
                println!("No card found with ID {id}");
            }
        }

        Commands::Retire { id } => {
            if db::set_card_active(&conn, id, false)? {
                println!("Retired card with ID {id}");
            } else {
                println!("No card found with ID {id}");
            }
        }

        Commands::AddExpense {
            category,
            amount,
            date,
            description,
        } => {
            let expense = Expense {
                date: date.unwrap_or(today),
                category,
                amount,
                description,
            };
            let id = db::add_expense(&conn, &expense)?;
            println!("Recorded {amount} on {category} ({}) as expense {id}", expense.date);
        }

        Commands::Hold { id } => {
            if db::hold_card(&conn, id)? {
                println!("Now holding card {id}");
            } else {
                println!("Card {id} is unknown or already held");
            }
        }

        Commands::Release { id } => {
            if db::release_card(&conn, id)? {
                println!("Released card {id}");
            } else {
                println!("Card {id} was not held");
            }
        }

        Commands::Seed => {
            let added = seed::seed(&conn)?;
            if added == 0 {
                println!("Catalog already has cards; nothing seeded");
            } else {
                println!("Seeded {added} cards");
            }
        }

        Commands::Spending { top } => {
            let profile = load_profile(&conn, &cli.config, today)?;
            let report = analysis::analyze(&profile, top);
            if profile.is_empty() {
                println!("No expenses in the last {} months", cli.config.window_months);
            } else {
                let rows: Vec<SpendingRow> = report
                    .top_categories
                    .iter()
                    .map(|share| SpendingRow {
                        category: share.category,
                        monthly: share.monthly_amount.round_dp(2),
                        percent: share.percentage,
                    })
                    .collect();
                println!("Total monthly spending: {}", report.total_monthly_spending.round_dp(2));
                println!("{}", Table::new(rows));
            }
        }

        Commands::Trends { months } => {
            let since = cc_optimizer::profile::window_start(months, today)?;
            let expenses = db::list_expenses_since(&conn, since)?;
            let report = analysis::spending_trends(&expenses, months, today)?;
            let rows: Vec<TrendRow> = report
                .trends
                .iter()
                .map(|t| TrendRow {
                    month: t.month.clone(),
                    total: t.total_amount.round_dp(2),
                    transactions: t.transaction_count,
                    average: t.average_transaction.round_dp(2),
                })
                .collect();
            if rows.is_empty() {
                println!("No expenses in the last {months} months");
            } else {
                println!("{}", Table::new(rows));
                println!(
                    "Total {} | Average per month {}",
                    report.total_spending.round_dp(2),
                    report.average_monthly.round_dp(2),
                );
            }
        }

        Commands::Simulate { id } => {
            let card = db::get_card(&conn, id)?.ok_or(OptimizerError::CardNotFound(id))?;
            let profile = load_profile(&conn, &cli.config, today)?;
            let eval = evaluate(&card, &profile);
            let rows: Vec<BreakdownRow> = eval
                .breakdown
                .iter()
                .map(|b| BreakdownRow {
                    category: b.category,
                    annual_spend: b.annual_spend.round_dp(2),
                    rate: b.rate,
                    reward: b.reward.value().round_dp(2),
                })
                .collect();
            println!("{} ({})", card.name, card.bank);
            println!("{}", Table::new(rows));
            println!(
                "Cashback {} | Points {} (worth {}) | Fee {} | Net {}",
                eval.annual_cashback.round_dp(2),
                eval.annual_points.round_dp(0),
                eval.annual_point_value.round_dp(2),
                eval.annual_fee.round_dp(2),
                eval.net_benefit.round_dp(2),
            );
        }

        Commands::Compare { id } => {
            let mut cards = Vec::with_capacity(id.len());
            for card_id in id {
                cards.push(db::get_card(&conn, card_id)?.ok_or(OptimizerError::CardNotFound(card_id))?);
            }
            let profile = load_profile(&conn, &cli.config, today)?;
            let rows: Vec<EvaluationRow> = compare_cards(&cards, &profile)
                .into_iter()
                .map(|ranked| EvaluationRow {
                    rank: ranked.rank,
                    card: ranked.evaluation.card.name,
                    cashback: ranked.evaluation.annual_cashback.round_dp(2),
                    points: ranked.evaluation.annual_points.round_dp(0),
                    annual_fee: ranked.evaluation.annual_fee.round_dp(2),
                    net_benefit: ranked.evaluation.net_benefit.round_dp(2),
                })
                .collect();
            println!("{}", Table::new(rows));
        }

        Commands::Optimize { income } => {
            let optimizer = Optimizer::new(cli.config.optimizer_config()?)?;
            let profile = load_profile(&conn, &cli.config, today)?;
            let catalog = db::list_cards(&conn, true)?;
            let outcome = optimizer.optimize(&profile, &catalog, income)?;

            if let Some(reason) = outcome.empty_reason {
                match reason {
                    EmptyReason::EmptyCatalog => {
                        println!("No active cards in the catalog. Try: cc-optimizer seed")
                    }
                    EmptyReason::NoEligibleCards => {
                        println!("No card in the catalog accepts that income level")
                    }
                }
                return Ok(());
            }

            let rows: Vec<CombinationRow> = outcome
                .results
                .iter()
                .enumerate()
                .map(|(i, result)| CombinationRow::new(i + 1, result))
                .collect();
            println!("{}", Table::new(rows));

            let held = db::held_cards(&conn)?;
            let current = evaluate_wallet(&held, &profile)?.net_benefit;
            if let Some(savings) = outcome.potential_savings(current) {
                println!("Potential gain over your current cards: {}", savings.round_dp(2));
            }
            if outcome.truncated {
                println!("(search stopped at its time budget; results are partial)");
            }
        }

        Commands::Advise { category, amount } => {
            let held = db::held_cards(&conn)?;
            match advise(&held, category, amount)? {
                Advice::Recommended(advice) => println!(
                    "Use {} ({}): earns {} {} on {amount} of {category}",
                    advice.recommended_card.name,
                    advice.recommended_card.bank,
                    advice.reward_amount.round_dp(2),
                    advice.reward_type,
                ),
                Advice::NoEligibleCard => {
                    println!("No eligible card. Mark cards you hold with: cc-optimizer hold --id <ID>")
                }
            }
        }
    }

    Ok(())
}

fn load_profile(
    conn: &Connection,
    config: &AppConfig,
    today: NaiveDate,
) -> OptimizerResult<SpendingProfile> {
    db::load_profile(conn, config.window_months, today)
}
