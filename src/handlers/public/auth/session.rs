use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::{AuthError, Principal, PrincipalKind, PrincipalView, TokenKind, TokenPair};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::store::password::verify_password;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl CredentialsRequest {
    /// Both fields are required and must be non-empty.
    pub fn into_parts(self) -> Result<(String, String), ApiError> {
        match (self.username, self.password) {
            (Some(username), Some(password)) if !username.trim().is_empty() && !password.is_empty() => {
                Ok((username.trim().to_string(), password))
            }
            _ => Err(ApiError::bad_request(
                "username and password are required! One of them is missing.",
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenExchangeRequest {
    pub refresh_token: Option<String>,
    pub role_hint: Option<String>,
}

/// Token pair plus the public view of the principal it was issued to.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub principal: PrincipalView,
}

/// Issue a pair for `principal` and make its refresh token the only live one.
pub(crate) async fn start_session(state: &AppState, principal: &Principal) -> Result<TokenPair, ApiError> {
    let tokens = state.issuer.issue(principal)?;
    state
        .directory
        .persist_refresh_token(principal, &tokens.refresh_token)
        .await?;
    Ok(tokens)
}

/// POST /api/v1/login - Authenticate and receive an access/refresh pair
///
/// Expected Input:
/// ```json
/// { "username": "alice", "password": "Secret123" }
/// ```
///
/// Expected Output (Success):
/// ```json
/// {
///   "success": true,
///   "data": {
///     "accessToken": "eyJhbGciOiJIUzI1NiI...",
///     "refreshToken": "eyJhbGciOiJIUzI1NiI...",
///     "principal": { "id": "...", "username": "alice", "role": "user", "createdAt": "..." }
///   }
/// }
/// ```
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> ApiResult<SessionResponse> {
    let (username, password) = payload.into_parts()?;

    let principal = state
        .directory
        .find_by_username(&username)
        .await?
        .ok_or_else(|| {
            tracing::warn!("login failed: unknown username");
            ApiError::unauthorized(
                "Invalid credentials, please try again. If you're new to the API, please register first!",
            )
        })?;

    if !verify_password(&password, &principal.account().password_hash) {
        tracing::warn!(principal = %principal.id(), "login failed: wrong password");
        return Err(ApiError::unauthorized("Password is not correct."));
    }

    let tokens = start_session(&state, &principal).await?;
    tracing::info!(principal = %principal.id(), role = %principal.kind(), "login succeeded");

    Ok(ApiResponse::success(SessionResponse {
        tokens,
        principal: principal.view(),
    }))
}

/// POST /api/v1/token - Exchange a refresh token for a new pair
///
/// Expected Input:
/// ```json
/// { "refreshToken": "eyJhbGciOiJIUzI1NiI...", "roleHint": "admin" }
/// ```
///
/// The new refresh token replaces the stored one, so the presented token
/// stops working once this call succeeds.
pub async fn exchange_token(
    State(state): State<AppState>,
    Json(payload): Json<TokenExchangeRequest>,
) -> ApiResult<TokenPair> {
    let refresh_token = payload
        .refresh_token
        .filter(|token| !token.trim().is_empty())
        .ok_or(AuthError::MissingCredential)?;
    let hint = payload.role_hint.as_deref().and_then(PrincipalKind::from_hint);

    let principal = state
        .verifier
        .verify_with_hint(&refresh_token, TokenKind::Refresh, hint)
        .await?;

    let tokens = state.issuer.issue(&principal)?;
    if state.verifier.enforces_refresh_rotation() {
        // Compare-and-swap: of two exchanges racing on one refresh token,
        // only the first to write wins.
        let rotated = state
            .directory
            .rotate_refresh_token(&principal, &refresh_token, &tokens.refresh_token)
            .await?;
        if !rotated {
            tracing::warn!(principal = %principal.id(), "refresh token already spent");
            return Err(AuthError::InvalidToken.into());
        }
    } else {
        state
            .directory
            .persist_refresh_token(&principal, &tokens.refresh_token)
            .await?;
    }
    tracing::info!(principal = %principal.id(), "refresh token exchanged");

    Ok(ApiResponse::success(tokens))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::app::{router, AppState};
    use crate::auth::principal::Account;
    use crate::auth::{AuthKeys, PrincipalKind, TokenLifetimes};
    use crate::store::{MemoryStore, PrincipalDirectory, PrincipalStore, StoreError};

    /// Memory store whose id lookups take as long as a database round-trip.
    struct SlowStore(MemoryStore);

    #[async_trait]
    impl PrincipalStore for SlowStore {
        fn kind(&self) -> PrincipalKind {
            self.0.kind()
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
            let found = self.0.find_by_id(id).await;
            tokio::time::sleep(Duration::from_millis(20)).await;
            found
        }

        async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
            self.0.find_by_username(username).await
        }

        async fn insert(&self, username: &str, password_hash: &str) -> Result<Account, StoreError> {
            self.0.insert(username, password_hash).await
        }

        async fn set_refresh_token(&self, id: Uuid, token: &str) -> Result<(), StoreError> {
            self.0.set_refresh_token(id, token).await
        }

        async fn replace_refresh_token(
            &self,
            id: Uuid,
            expected: &str,
            token: &str,
        ) -> Result<bool, StoreError> {
            self.0.replace_refresh_token(id, expected, token).await
        }

        async fn list(&self) -> Result<Vec<Account>, StoreError> {
            self.0.list().await
        }
    }

    fn exchange(refresh_token: &str) -> Request<Body> {
        Request::post("/api/v1/token")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({ "refreshToken": refresh_token }).to_string(),
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn concurrent_exchanges_spend_a_refresh_token_once() {
        let directory = PrincipalDirectory::new(
            Arc::new(SlowStore(MemoryStore::new(PrincipalKind::User))),
            Arc::new(SlowStore(MemoryStore::new(PrincipalKind::Admin))),
        );
        let keys = AuthKeys::new("race-access", "race-refresh", "0123456789abcdef0123456789abcdef").unwrap();
        let state = AppState::new(Arc::new(keys), TokenLifetimes::default(), directory.clone());

        let principal = directory.register("alice", "h").await.unwrap();
        let tokens = state.issuer.issue(&principal).unwrap();
        directory
            .persist_refresh_token(&principal, &tokens.refresh_token)
            .await
            .unwrap();

        let app = router(state);
        let (first, second) = tokio::join!(
            app.clone().oneshot(exchange(&tokens.refresh_token)),
            app.clone().oneshot(exchange(&tokens.refresh_token)),
        );

        let mut statuses = [first.unwrap().status(), second.unwrap().status()];
        statuses.sort();
        assert_eq!(statuses, [StatusCode::OK, StatusCode::UNAUTHORIZED]);
    }
}
