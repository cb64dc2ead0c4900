//! JSON endpoints over the optimizer core.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Local, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::advisor::advise;
use crate::analysis::{SpendingAnalysis, SpendingTrends, analyze, spending_trends};
use crate::db;
use crate::error::{OptimizerError, OptimizerResult};
use crate::evaluator::{compare_cards, evaluate};
use crate::models::{Advice, CardEvaluation, CreditCard, MerchantCategory, OptimizationOutcome, RankedEvaluation};
use crate::optimizer::{Optimizer, OptimizerConfig, evaluate_wallet};
use crate::profile::{SpendingProfile, window_start};

pub const MAX_COMPARED_CARDS: usize = 5;

/// Shared state for all endpoints.
#[derive(Clone)]
pub struct AppState {
    pub conn: Arc<Mutex<Connection>>,
    pub optimizer: OptimizerConfig,
    pub window_months: u32,
}

impl AppState {
    pub fn new(conn: Connection, optimizer: OptimizerConfig, window_months: u32) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            optimizer,
            window_months,
        }
    }

    fn stored_profile(&self, conn: &Connection) -> OptimizerResult<SpendingProfile> {
        db::load_profile(conn, self.window_months, Local::now().date_naive())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/cards", get(handle_list_cards))
        .route("/api/optimize", post(handle_optimize))
        .route("/api/advise", post(handle_advise))
        .route("/api/spending-analysis", get(handle_spending_analysis))
        .route("/api/spending-trends", get(handle_spending_trends))
        .route("/api/simulate-card", post(handle_simulate_card))
        .route("/api/compare", post(handle_compare))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Maps the error taxonomy onto HTTP status codes.
pub struct ApiError(OptimizerError);

impl From<OptimizerError> for ApiError {
    fn from(err: OptimizerError) -> Self {
        ApiError(err)
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError(OptimizerError::Storage(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OptimizerError::CardNotFound(_) => StatusCode::NOT_FOUND,
            err if err.is_client_error() => StatusCode::BAD_REQUEST,
            err => {
                error!(error = %err, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// GET /api/cards: active catalog.
async fn handle_list_cards(State(state): State<AppState>) -> ApiResult<Vec<CreditCard>> {
    let conn = state.conn.lock().await;
    Ok(Json(db::list_cards(&conn, true)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct OptimizeRequest {
    /// Monthly spend per category; the stored expense history when absent
    #[serde(default)]
    pub profile: Option<SpendingProfile>,
    /// Candidate cards; the stored catalog when absent
    #[serde(default)]
    pub catalog: Option<Vec<CreditCard>>,
    #[serde(default)]
    pub income: Option<Decimal>,
    /// Capped at the server's configured wallet size
    #[serde(default)]
    pub max_wallet_size: Option<usize>,
    /// Capped at the server's configured top-n
    #[serde(default)]
    pub top_n: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct OptimizeResponse {
    pub current_spending: SpendingProfile,
    #[serde(flatten)]
    pub outcome: OptimizationOutcome,
    /// Best net benefit minus what the held cards earn today
    pub potential_savings: Option<Decimal>,
    pub generated_at: DateTime<Utc>,
}

/// POST /api/optimize: ranked wallets for a profile.
async fn handle_optimize(
    State(state): State<AppState>,
    Json(request): Json<OptimizeRequest>,
) -> ApiResult<OptimizeResponse> {
    let limits = &state.optimizer;
    let optimizer = Optimizer::new(OptimizerConfig {
        max_wallet_size: request
            .max_wallet_size
            .map_or(limits.max_wallet_size, |n| n.min(limits.max_wallet_size)),
        top_n: request.top_n.map_or(limits.top_n, |n| n.min(limits.top_n)),
        ..limits.clone()
    })?;

    let conn = state.conn.lock().await;
    let profile = match request.profile {
        Some(profile) => profile,
        None => state.stored_profile(&conn)?,
    };
    let catalog = match request.catalog {
        Some(catalog) => catalog,
        None => db::list_cards(&conn, true)?,
    };
    let held = db::held_cards(&conn)?;
    drop(conn);

    let income = request.income;
    let (profile, outcome, current) = tokio::task::spawn_blocking(move || {
        let outcome = optimizer.optimize(&profile, &catalog, income)?;
        let current = evaluate_wallet(&held, &profile)?.net_benefit;
        Ok::<_, OptimizerError>((profile, outcome, current))
    })
    .await
    .map_err(|err| OptimizerError::Task(err.to_string()))??;

    Ok(Json(OptimizeResponse {
        potential_savings: outcome.potential_savings(current),
        current_spending: profile,
        outcome,
        generated_at: Utc::now(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct AdviseRequest {
    pub category: MerchantCategory,
    pub amount: Decimal,
    /// Cards to choose from; the stored held cards when absent
    #[serde(default)]
    pub held_cards: Option<Vec<CreditCard>>,
}

/// POST /api/advise: best held card for one purchase.
async fn handle_advise(
    State(state): State<AppState>,
    Json(request): Json<AdviseRequest>,
) -> ApiResult<Advice> {
    let held = match request.held_cards {
        Some(cards) => cards,
        None => db::held_cards(&*state.conn.lock().await)?,
    };
    Ok(Json(advise(&held, request.category, request.amount)?))
}

#[derive(Debug, Deserialize)]
pub struct AnalysisQuery {
    #[serde(default = "default_top")]
    pub top: usize,
}

fn default_top() -> usize {
    5
}

/// GET /api/spending-analysis: share of spend per category.
async fn handle_spending_analysis(
    State(state): State<AppState>,
    Query(query): Query<AnalysisQuery>,
) -> ApiResult<SpendingAnalysis> {
    let conn = state.conn.lock().await;
    let profile = state.stored_profile(&conn)?;
    Ok(Json(analyze(&profile, query.top)))
}

#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    #[serde(default = "default_trend_months")]
    pub months: u32,
}

fn default_trend_months() -> u32 {
    6
}

/// GET /api/spending-trends: monthly totals and transaction counts.
async fn handle_spending_trends(
    State(state): State<AppState>,
    Query(query): Query<TrendsQuery>,
) -> ApiResult<SpendingTrends> {
    let today = Local::now().date_naive();
    let conn = state.conn.lock().await;
    let expenses = db::list_expenses_since(&conn, window_start(query.months, today)?)?;
    Ok(Json(spending_trends(&expenses, query.months, today)?))
}

#[derive(Debug, Deserialize)]
pub struct SimulateRequest {
    pub card_id: i64,
}

/// POST /api/simulate-card: one card against the stored profile.
async fn handle_simulate_card(
    State(state): State<AppState>,
    Json(request): Json<SimulateRequest>,
) -> ApiResult<CardEvaluation> {
    let conn = state.conn.lock().await;
    let card = db::get_card(&conn, request.card_id)?
        .filter(|card| card.is_active)
        .ok_or(OptimizerError::CardNotFound(request.card_id))?;
    let profile = state.stored_profile(&conn)?;
    Ok(Json(evaluate(&card, &profile)))
}

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub card_ids: Vec<i64>,
}

/// POST /api/compare: side-by-side ranking of a few cards.
async fn handle_compare(
    State(state): State<AppState>,
    Json(request): Json<CompareRequest>,
) -> ApiResult<Vec<RankedEvaluation>> {
    if request.card_ids.len() > MAX_COMPARED_CARDS {
        return Err(OptimizerError::Configuration(format!(
            "at most {MAX_COMPARED_CARDS} cards can be compared"
        ))
        .into());
    }

    let conn = state.conn.lock().await;
    let mut cards = Vec::with_capacity(request.card_ids.len());
    for id in &request.card_ids {
        let card = db::get_card(&conn, *id)?
            .filter(|card| card.is_active)
            .ok_or(OptimizerError::CardNotFound(*id))?;
        cards.push(card);
    }
    let profile = state.stored_profile(&conn)?;
    Ok(Json(compare_cards(&cards, &profile)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Expense;
    use crate::seed;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let conn = Connection::open_in_memory().unwrap();
        db::init_tables(&conn).unwrap();
        seed::seed(&conn).unwrap();
        AppState::new(conn, OptimizerConfig::default(), 3)
    }

    async fn send(app: Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(if method == "GET" {
                Body::empty()
            } else {
                Body::from(body.to_string())
            })
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn decimal(value: &Value) -> Decimal {
        value.as_str().unwrap().parse().unwrap()
    }

    #[tokio::test]
    async fn test_list_cards() {
        let (status, body) = send(router(test_state()), "GET", "/api/cards", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_optimize_with_inline_data() {
        let body = json!({
            "profile": {"dining": 500, "groceries": 300, "petrol": 200},
            "catalog": [
                {"id": 1, "bank": "X", "name": "CardX", "card_type": "cashback", "annual_fee": 0,
                 "rewards": {"categories": {"dining": {"rate": "0.05", "monthly_cap": 1000}}}},
                {"id": 2, "bank": "Y", "name": "CardY", "card_type": "cashback", "annual_fee": 80,
                 "rewards": {"categories": {"petrol": {"rate": "0.08", "monthly_cap": 300}}}}
            ],
            "max_wallet_size": 2,
            "top_n": 1
        });
        let (status, body) = send(router(test_state()), "POST", "/api/optimize", body).await;
        assert_eq!(status, StatusCode::OK);
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["card_ids"], json!([1, 2]));
        assert_eq!(decimal(&results[0]["net_benefit"]), Decimal::from(412));
        // nothing held, so the whole benefit is a saving
        assert_eq!(decimal(&body["potential_savings"]), Decimal::from(412));
        assert!(body["empty_reason"].is_null());
    }

    #[tokio::test]
    async fn test_optimize_empty_catalog() {
        let body = json!({"profile": {"dining": 100}, "catalog": []});
        let (status, body) = send(router(test_state()), "POST", "/api/optimize", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"], json!([]));
        assert_eq!(body["empty_reason"], json!("empty_catalog"));
    }

    #[tokio::test]
    async fn test_optimize_no_eligible_cards() {
        let body = json!({"profile": {"dining": 100}, "income": 1000});
        let (status, body) = send(router(test_state()), "POST", "/api/optimize", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["empty_reason"], json!("no_eligible_cards"));
    }

    #[tokio::test]
    async fn test_optimize_rejects_bad_bounds() {
        let body = json!({"profile": {"dining": 100}, "top_n": 0});
        let (status, body) = send(router(test_state()), "POST", "/api/optimize", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("top_n"));
    }

    #[tokio::test]
    async fn test_optimize_rejects_negative_spend() {
        let body = json!({"profile": {"dining": -100}});
        let (status, _) = send(router(test_state()), "POST", "/api/optimize", body).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn test_advise_without_held_cards() {
        let body = json!({"category": "dining", "amount": 50});
        let (status, body) = send(router(test_state()), "POST", "/api/advise", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "no_eligible_card"}));
    }

    #[tokio::test]
    async fn test_advise_uses_stored_held_cards() {
        let state = test_state();
        {
            let conn = state.conn.lock().await;
            db::hold_card(&conn, 1).unwrap();
            db::hold_card(&conn, 2).unwrap();
        }
        let body = json!({"category": "petrol", "amount": 100});
        let (status, body) = send(router(state), "POST", "/api/advise", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("recommended"));
        assert_eq!(body["recommended_card"]["id"], json!(2));
        assert_eq!(decimal(&body["reward_amount"]), Decimal::from(8));
    }

    #[tokio::test]
    async fn test_spending_analysis_from_stored_expenses() {
        let state = test_state();
        {
            let conn = state.conn.lock().await;
            db::add_expense(
                &conn,
                &Expense {
                    date: Local::now().date_naive(),
                    category: MerchantCategory::Groceries,
                    amount: Decimal::from(300),
                    description: None,
                },
            )
            .unwrap();
        }
        let (status, body) = send(router(state), "GET", "/api/spending-analysis?top=1", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decimal(&body["total_monthly_spending"]), Decimal::from(100));
        assert_eq!(body["top_categories"][0]["category"], json!("groceries"));
    }

    #[tokio::test]
    async fn test_simulate_unknown_card() {
        let body = json!({"card_id": 99});
        let (status, _) = send(router(test_state()), "POST", "/api/simulate-card", body).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_compare_limits_card_count() {
        let body = json!({"card_ids": [1, 2, 3, 4, 5, 6]});
        let (status, _) = send(router(test_state()), "POST", "/api/compare", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let body = json!({"card_ids": [3, 1]});
        let (status, body) = send(router(test_state()), "POST", "/api/compare", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[0]["rank"], json!(1));
    }

    #[tokio::test]
    async fn test_optimize_clamps_request_bounds() {
        let body = json!({"profile": {"dining": 500, "petrol": 300}, "max_wallet_size": 24, "top_n": 1000});
        let (status, body) = send(router(test_state()), "POST", "/api/optimize", body).await;
        assert_eq!(status, StatusCode::OK);
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r["card_ids"].as_array().unwrap().len() <= 3));
        // C(8,1) + C(8,2) + C(8,3)
        assert_eq!(body["subsets_scored"], json!(92));
    }

    #[tokio::test]
    async fn test_potential_savings_ignores_retired_held_card() {
        let state = test_state();
        {
            let conn = state.conn.lock().await;
            db::hold_card(&conn, 2).unwrap();
            db::set_card_active(&conn, 2, false).unwrap();
        }
        let body = json!({"profile": {"petrol": 500}, "max_wallet_size": 1, "top_n": 1});
        let (status, body) = send(router(state), "POST", "/api/optimize", body).await;
        assert_eq!(status, StatusCode::OK);
        // the retired card earns nothing, so the whole best net is a gain
        assert_eq!(decimal(&body["potential_savings"]), decimal(&body["results"][0]["net_benefit"]));
    }

    #[tokio::test]
    async fn test_spending_trends() {
        let state = test_state();
        {
            let conn = state.conn.lock().await;
            for amount in [40, 60] {
                db::add_expense(
                    &conn,
                    &Expense {
                        date: Local::now().date_naive(),
                        category: MerchantCategory::Dining,
                        amount: Decimal::from(amount),
                        description: None,
                    },
                )
                .unwrap();
            }
        }
        let (status, body) = send(router(state), "GET", "/api/spending-trends?months=2", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["period_months"], json!(2));
        assert_eq!(body["trends"][0]["transaction_count"], json!(2));
        assert_eq!(decimal(&body["total_spending"]), Decimal::from(100));

        let (status, _) = send(router(test_state()), "GET", "/api/spending-trends?months=0", Value::Null).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
