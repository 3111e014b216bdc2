use std::collections::HashMap;

use axum::{extract::State, Json};

use super::session::{start_session, CredentialsRequest, SessionResponse};
use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::store::password::{hash_password, meets_policy};

/// POST /api/v1/register - Create an account and start a session
///
/// Usernames containing "admin" are registered as administrators.
/// Responds 201 with the same body as login.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> ApiResult<SessionResponse> {
    let (username, password) = payload.into_parts()?;

    if !meets_policy(&password) {
        let mut field_errors = HashMap::new();
        field_errors.insert(
            "password".to_string(),
            "Must be at least 8 characters with a lowercase letter, an uppercase letter and a digit"
                .to_string(),
        );
        return Err(ApiError::validation_error("Password is not valid", Some(field_errors)));
    }

    let password_hash = hash_password(&password).map_err(|e| {
        tracing::error!("Password hashing failed: {}", e);
        ApiError::internal_server_error("Failed to register account")
    })?;

    let principal = state.directory.register(&username, &password_hash).await?;
    let tokens = start_session(&state, &principal).await?;

    tracing::info!(principal = %principal.id(), role = %principal.kind(), "principal registered");

    Ok(ApiResponse::created(SessionResponse {
        tokens,
        principal: principal.view(),
    }))
}
