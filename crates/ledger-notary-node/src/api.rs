//! # REST API
//!
//! Builds the axum router for the notary node. All handlers share the
//! ledger through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                       | Description                          |
//! |--------|----------------------------|--------------------------------------|
//! | GET    | `/health`                  | Liveness and signing identity      |
//! | GET    | `/transfers/:id/state`     | Signed state envelope                |
//! | GET    | `/transfers/:id`           | Full transfer record                 |
//! | POST   | `/transfers`               | Record a new transfer                |
//! | POST   | `/transfers/:id/prepare`   | `proposed -> prepared`               |
//! | POST   | `/transfers/:id/debits/:account/authorize` | Attach a debit authorization |
//! | POST   | `/transfers/:id/execute`   | `prepared -> executed`               |
//! | POST   | `/transfers/:id/cancel`    | Reject on participant request        |
//! | POST   | `/expiry/sweep`            | Run one expiry sweep now             |
//! | GET    | `/accounts/:name`          | Account (credential omitted)         |

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use ledger_notary::{ExpiryMonitor, Ledger, SweepReport};
use ledger_notary_core::{
    Account, Credit, Debit, SignedEnvelope, Transfer, TransferId, TransferState,
};
use ledger_notary_store::SqliteStore;

use crate::error::ApiError;

/// Shared application state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Ledger<SqliteStore>,
    pub monitor: Arc<ExpiryMonitor<SqliteStore>>,
}

/// Builds the full axum [`Router`] with all API routes and request tracing.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/transfers", post(create_transfer_handler))
        .route("/transfers/:id", get(transfer_handler))
        .route("/transfers/:id/state", get(state_handler))
        .route("/transfers/:id/prepare", post(prepare_handler))
        .route(
            "/transfers/:id/debits/:account/authorize",
            post(authorize_debit_handler),
        )
        .route("/transfers/:id/execute", post(execute_handler))
        .route("/transfers/:id/cancel", post(cancel_handler))
        .route("/expiry/sweep", post(sweep_handler))
        .route("/accounts/:name", get(account_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub signer: String,
    pub algorithm: String,
    pub public_key: String,
}

/// Body of `POST /transfers`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTransferRequest {
    /// Generated when omitted.
    #[serde(default)]
    pub id: Option<TransferId>,
    pub debits: Vec<Debit>,
    pub credits: Vec<Credit>,
    /// `proposed` or `prepared`; defaults to `prepared`.
    #[serde(default)]
    pub state: Option<TransferState>,
    /// Deadline in Unix ms.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl CreateTransferRequest {
    fn into_transfer(self) -> Transfer {
        let mut transfer = Transfer::new(
            self.id.unwrap_or_else(TransferId::new_v4),
            self.debits,
            self.credits,
        );
        if let Some(state) = self.state {
            transfer.state = state;
        }
        transfer.expires_at = self.expires_at;
        transfer
    }
}

/// Body of `POST /transfers/:id/debits/:account/authorize`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorizeDebitRequest {
    /// Opaque artifact proving the account holder's consent.
    pub authorization: String,
}

fn parse_id(raw: &str) -> Result<TransferId, ApiError> {
    TransferId::parse(raw)
        .map_err(|e| ApiError::BadRequest(format!("invalid transfer id {raw:?}: {e}")))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let notary = state.ledger.notary();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        signer: notary.signer().to_string(),
        algorithm: notary.algorithm().to_string(),
        public_key: notary.public_key().to_hex(),
    })
}

async fn state_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SignedEnvelope>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.ledger.get_state(&id).await?))
}

async fn transfer_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Transfer>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.ledger.get_transfer(&id).await?))
}

async fn create_transfer_handler(
    State(state): State<AppState>,
    body: Result<Json<CreateTransferRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Transfer>), ApiError> {
    let Json(request) = body.map_err(|e| ApiError::Validation(e.body_text()))?;
    let created = state.ledger.create_transfer(request.into_transfer()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn prepare_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Transfer>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.ledger.prepare_transfer(&id).await?))
}

async fn authorize_debit_handler(
    State(state): State<AppState>,
    Path((id, account)): Path<(String, String)>,
    body: Result<Json<AuthorizeDebitRequest>, JsonRejection>,
) -> Result<Json<Transfer>, ApiError> {
    let id = parse_id(&id)?;
    let Json(request) = body.map_err(|e| ApiError::Validation(e.body_text()))?;
    Ok(Json(
        state
            .ledger
            .authorize_debit(&id, &account, &request.authorization)
            .await?,
    ))
}

async fn execute_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Transfer>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.ledger.execute_transfer(&id).await?))
}

async fn cancel_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Transfer>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.ledger.cancel_transfer(&id).await?))
}

async fn sweep_handler(State(state): State<AppState>) -> Result<Json<SweepReport>, ApiError> {
    Ok(Json(state.monitor.sweep().await?))
}

async fn account_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Account>, ApiError> {
    Ok(Json(state.ledger.get_account(&name).await?))
}
