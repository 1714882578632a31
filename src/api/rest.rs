// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. `/health` is public; everything else
// requires a valid bearer token resolved to a caller role via `AuthedUser`
// (spec §4.9: the extractor carries the role so handlers cannot bypass
// scoping). CORS is permissive, matching the teacher's development posture.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::api::auth::AuthedUser;
use crate::app_state::AppState;
use crate::errors::EngineError;
use crate::reports::build_role_report;
use crate::types::{RecommendationId, Role};

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/reports/role", get(role_report))
        .route("/api/v1/recommendations", get(recent_recommendations))
        .route("/api/v1/recommendations/:id/dismiss", post(dismiss_recommendation))
        .route("/api/v1/recommendations/:id/dispatch", post(dispatch_recommendation))
        .route("/api/v1/cycles/run", post(run_cycle))
        .layer(cors)
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "state_version": state.current_state_version(),
        "server_time": chrono::Utc::now().timestamp_millis(),
    }))
}

#[derive(Debug, Deserialize)]
struct RoleReportQuery {
    from: chrono::DateTime<chrono::Utc>,
    to: chrono::DateTime<chrono::Utc>,
    owner_id: Option<uuid::Uuid>,
}

async fn role_report(auth: AuthedUser, State(state): State<Arc<AppState>>, Query(query): Query<RoleReportQuery>) -> impl IntoResponse {
    // `employee` ownerId is forced to the caller regardless of the query
    // parameter (spec §4.9 scoping rule).
    let owner_id = match auth.role {
        Role::Employee => Some(auth.user_id),
        _ => query.owner_id,
    };
    let report = build_role_report(state.ledger.as_ref(), auth.role, owner_id, query.from, query.to, None, None, None, None);
    Json(report)
}

async fn recent_recommendations(auth: AuthedUser, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = state.clock.now();
    let recommendations = state.recommendations.recent_for_role(auth.role, 50, 24 * 7, now);
    Json(recommendations)
}

async fn dismiss_recommendation(
    auth: AuthedUser,
    State(state): State<Arc<AppState>>,
    axum::extract::Path(id): axum::extract::Path<RecommendationId>,
) -> Result<impl IntoResponse, ApiError> {
    let recommendation = state.recommendations.dismiss_for_user(id, auth.user_id).map_err(ApiError)?;
    info!(id = %id, user_id = %auth.user_id, "recommendation dismissed");
    Ok(Json(recommendation))
}

async fn dispatch_recommendation(
    _auth: AuthedUser,
    State(state): State<Arc<AppState>>,
    axum::extract::Path(id): axum::extract::Path<RecommendationId>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.dispatcher.dispatch(id).await.map_err(ApiError)?;
    state.bump_state_version();
    Ok(Json(result))
}

async fn run_cycle(_auth: AuthedUser, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let result = state.orchestrator.run().await;
    state.bump_state_version();
    Json(result)
}

/// Wraps `EngineError` for the `IntoResponse` impl without taking ownership
/// of error-to-status mapping anywhere else in the handler layer.
struct ApiError(EngineError);

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            EngineError::NotFound(_) => axum::http::StatusCode::NOT_FOUND,
            EngineError::Validation(_) | EngineError::DuplicateTransaction { .. } | EngineError::EditForbidden(_) => {
                axum::http::StatusCode::BAD_REQUEST
            }
            EngineError::Throttled(_) => axum::http::StatusCode::TOO_MANY_REQUESTS,
            _ => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}
