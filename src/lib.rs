//! Credit card wallet optimizer: picks the cards to hold, and the card to
//! use, for a given monthly spending profile.

pub mod advisor;
pub mod analysis;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod evaluator;
pub mod models;
pub mod optimizer;
pub mod profile;
pub mod reward;
pub mod seed;

pub use advisor::advise;
pub use error::{OptimizerError, OptimizerResult};
pub use evaluator::{compare_cards, evaluate};
pub use models::{
    Advice, CardType, CombinationResult, CreditCard, MerchantCategory, OptimizationOutcome,
    RewardRule,
};
pub use optimizer::{Optimizer, OptimizerConfig, optimize};
pub use profile::SpendingProfile;
pub use reward::effective_yield;
