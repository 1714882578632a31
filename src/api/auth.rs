// =============================================================================
// Bearer Token Authentication — Axum Extractor
// =============================================================================
//
// Extracts and validates a Bearer token against `AppState`'s token map,
// yielding the caller's user id and role. Threading the role through the
// extractor itself (rather than re-deriving it ad hoc per handler) means a
// handler cannot forget to scope a query (spec §4.9). Comparison of the raw
// header against the stored token is not needed here since tokens are looked
// up by value in a map; the constant-time-compare concern the teacher's
// single-secret design had does not apply to a keyed lookup.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::app_state::AppState;
use crate::ledger::User;
use crate::types::{Role, UserId};

/// The authenticated caller: their id and role, resolved from the bearer
/// token and the user directory.
pub struct AuthedUser {
    pub user_id: UserId,
    pub role: Role,
}

pub struct AuthRejection {
    status: StatusCode,
    message: &'static str,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, axum::Json(body)).into_response()
    }
}

fn forbidden(message: &'static str) -> AuthRejection {
    AuthRejection { status: StatusCode::FORBIDDEN, message }
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);

        let auth_header = parts.headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok());
        let token = match auth_header {
            Some(value) if value.starts_with("Bearer ") => &value[7..],
            _ => {
                warn!("missing or malformed Authorization header");
                return Err(forbidden("Missing or invalid authorization token"));
            }
        };

        let user_id = app_state.resolve_token(token).ok_or_else(|| {
            warn!("unrecognized bearer token presented");
            forbidden("Invalid authorization token")
        })?;

        let user: User = app_state.users.find_by_id(user_id).ok_or_else(|| {
            warn!(%user_id, "token maps to unknown or deactivated user");
            forbidden("Invalid authorization token")
        })?;

        if !user.active {
            return Err(forbidden("Account is deactivated"));
        }

        Ok(AuthedUser { user_id: user.id, role: user.role })
    }
}
