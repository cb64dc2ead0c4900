use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::error::{OptimizerError, OptimizerResult};
use crate::optimizer::{
    DEFAULT_CATALOG_CEILING, DEFAULT_MAX_WALLET_SIZE, DEFAULT_TOP_N, OptimizerConfig,
};
use crate::profile::DEFAULT_WINDOW_MONTHS;

/// Settings shared by the CLI and the backend. Every flag can also come
/// from a `CC_OPTIMIZER_*` environment variable.
#[derive(Debug, Clone, Args)]
pub struct AppConfig {
    /// SQLite file holding cards, expenses and held cards
    #[arg(long, env = "CC_OPTIMIZER_DB", default_value = "cc_optimizer.db", global = true)]
    pub db_path: PathBuf,

    /// Trailing months of expenses averaged into the spending profile
    #[arg(long, env = "CC_OPTIMIZER_WINDOW_MONTHS", default_value_t = DEFAULT_WINDOW_MONTHS, global = true)]
    pub window_months: u32,

    /// Largest wallet considered
    #[arg(long, env = "CC_OPTIMIZER_MAX_WALLET", default_value_t = DEFAULT_MAX_WALLET_SIZE, global = true)]
    pub max_wallet_size: usize,

    /// Number of combinations returned
    #[arg(long, env = "CC_OPTIMIZER_TOP_N", default_value_t = DEFAULT_TOP_N, global = true)]
    pub top_n: usize,

    /// Largest candidate pool searched exhaustively
    #[arg(long, env = "CC_OPTIMIZER_CATALOG_CEILING", default_value_t = DEFAULT_CATALOG_CEILING, global = true)]
    pub catalog_ceiling: usize,

    /// Wall-clock budget for the wallet search, in milliseconds
    #[arg(long, env = "CC_OPTIMIZER_BUDGET_MS", global = true)]
    pub budget_ms: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("cc_optimizer.db"),
            window_months: DEFAULT_WINDOW_MONTHS,
            max_wallet_size: DEFAULT_MAX_WALLET_SIZE,
            top_n: DEFAULT_TOP_N,
            catalog_ceiling: DEFAULT_CATALOG_CEILING,
            budget_ms: None,
        }
    }
}

impl AppConfig {
    pub fn optimizer_config(&self) -> OptimizerResult<OptimizerConfig> {
        if self.window_months < 1 {
            return Err(OptimizerError::Configuration(
                "window_months must be at least 1".to_string(),
            ));
        }
        let config = OptimizerConfig {
            max_wallet_size: self.max_wallet_size,
            top_n: self.top_n,
            catalog_ceiling: self.catalog_ceiling,
            budget: self.budget_ms.map(Duration::from_millis),
        };
        config.validate()?;
        Ok(config)
    }
}
