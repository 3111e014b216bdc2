use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use http_body_util::LengthLimitError;
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::{AuthError, Principal, PrincipalKind, TokenKind};
use crate::error::ApiError;

/// JWT authentication middleware: verifies the bearer access token and
/// injects the resolved [`Principal`] into request extensions.
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(request.headers())?;
    let principal = authenticate(&state, token, None).await?;

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Variant of [`jwt_auth_middleware`] that reads a caller-declared `role`
/// from the JSON body and uses it to order the store lookup. The hint is
/// advisory: verification still searches both stores.
pub async fn hinted_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(request.headers())?.to_string();

    let (parts, body) = request.into_parts();
    let bytes = read_body(body, state.max_body_bytes).await?;
    let hint = role_hint(&bytes);

    let principal = authenticate(&state, &token, hint).await?;

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Must run after one of the authentication middlewares.
pub async fn require_admin_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .ok_or(AuthError::MissingCredential)?;

    if !principal.is_admin() {
        tracing::warn!(principal = %principal.id(), "administrator route denied");
        return Err(ApiError::forbidden("You are not authorized to access this page!"));
    }

    Ok(next.run(request).await)
}

async fn authenticate(
    state: &AppState,
    token: &str,
    hint: Option<PrincipalKind>,
) -> Result<Principal, ApiError> {
    state
        .verifier
        .verify_with_hint(token, TokenKind::Access, hint)
        .await
        .map_err(|err| {
            tracing::debug!("access token rejected: {}", err);
            ApiError::from(err)
        })
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AuthError::MalformedCredential)?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MalformedCredential)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MalformedCredential);
    }
    Ok(token)
}

/// Buffer at most `limit` bytes. Only exceeding the limit is a 413; any other
/// read failure is the client's broken body.
async fn read_body(body: Body, limit: usize) -> Result<Bytes, ApiError> {
    axum::body::to_bytes(body, limit).await.map_err(|err| {
        let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&err);
        while let Some(cause) = source {
            if cause.is::<LengthLimitError>() {
                return ApiError::PayloadTooLarge("Request body too large".to_string());
            }
            source = cause.source();
        }
        tracing::debug!("failed to read request body: {}", err);
        ApiError::bad_request("Request body could not be read")
    })
}

#[derive(Deserialize)]
struct RoleSignal {
    role: Option<String>,
}

fn role_hint(body: &Bytes) -> Option<PrincipalKind> {
    serde_json::from_slice::<RoleSignal>(body)
        .ok()
        .and_then(|signal| signal.role)
        .and_then(|role| PrincipalKind::from_hint(&role))
}
