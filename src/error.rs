use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::MerchantCategory;

pub type OptimizerResult<T> = Result<T, OptimizerError>;

#[derive(Error, Debug)]
pub enum OptimizerError {
    #[error("Invalid spending profile: {category} has amount {amount}")]
    InvalidProfile {
        category: MerchantCategory,
        amount: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid card {card_id}: {reason}")]
    InvalidCard { card_id: i64, reason: String },

    #[error("Unknown merchant category '{0}'")]
    UnknownCategory(String),

    #[error("Card {0} not found")]
    CardNotFound(i64),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl OptimizerError {
    pub fn invalid_amount(category: MerchantCategory, amount: Decimal) -> Self {
        OptimizerError::InvalidProfile {
            category,
            amount: amount.to_string(),
        }
    }

    /// Caller mistakes, as opposed to failures of the store behind the core.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, OptimizerError::Storage(_) | OptimizerError::Task(_))
    }
}
