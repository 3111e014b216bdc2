use axum::{extract::State, Extension};
use serde::Serialize;

use crate::app::AppState;
use crate::auth::{Principal, PrincipalKind, PrincipalView};
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Serialize)]
pub struct UserListing {
    pub users: Vec<PrincipalView>,
}

/// GET|POST /api/v1/users - List ordinary users (administrators only)
///
/// Sits behind the hinted gate, so a `{"role": "admin"}` body moves the
/// administrator store to the front of the lookup. The admin check itself
/// runs on the resolved principal.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(admin): Extension<Principal>,
) -> ApiResult<UserListing> {
    let accounts = state.directory.store(PrincipalKind::User).list().await?;
    tracing::info!(admin = %admin.id(), count = accounts.len(), "listed users");

    let users = accounts
        .into_iter()
        .map(|account| Principal::User(account).view())
        .collect();

    Ok(ApiResponse::success(UserListing { users }))
}
