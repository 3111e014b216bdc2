use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};

use crate::auth::{AuthKeys, KeyError, TokenIssuer, TokenLifetimes, TokenVerifier};
use crate::config::AppConfig;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{hinted_auth_middleware, jwt_auth_middleware, require_admin_middleware};
use crate::store::PrincipalDirectory;

/// Shared request-handling state. Everything here is read-only or internally
/// synchronized, so cloning per request is cheap.
#[derive(Clone)]
pub struct AppState {
    pub issuer: Arc<TokenIssuer>,
    pub verifier: Arc<TokenVerifier>,
    pub directory: PrincipalDirectory,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(keys: Arc<AuthKeys>, lifetimes: TokenLifetimes, directory: PrincipalDirectory) -> Self {
        Self {
            issuer: Arc::new(TokenIssuer::new(keys.clone(), lifetimes)),
            verifier: Arc::new(TokenVerifier::new(keys, lifetimes, directory.clone())),
            directory,
            max_body_bytes: 1024 * 1024,
        }
    }

    pub fn from_config(config: &AppConfig, directory: PrincipalDirectory) -> Result<Self, KeyError> {
        let keys = Arc::new(AuthKeys::from_config(&config.security)?);
        let lifetimes = config.security.lifetimes();

        let verifier = TokenVerifier::new(keys.clone(), lifetimes, directory.clone())
            .with_refresh_rotation(config.security.enforce_refresh_rotation);

        Ok(Self {
            issuer: Arc::new(TokenIssuer::new(keys, lifetimes)),
            verifier: Arc::new(verifier),
            directory,
            max_body_bytes: config.api.max_request_size_bytes,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/health", get(health))
        .merge(auth_public_routes())
        // Protected
        .merge(auth_routes(&state))
        .merge(admin_routes(&state))
        .with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/api/v1/register", post(auth::user_register))
        .route("/api/v1/login", post(auth::session_login))
        .route("/api/v1/token", post(auth::session_token))
}

fn auth_routes(state: &AppState) -> Router<AppState> {
    use protected::auth;

    Router::new()
        .route("/api/v1/whoami", get(auth::session_whoami))
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware))
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    // Layers run outermost-last: authenticate (with role hint), then require admin.
    Router::new()
        .route("/api/v1/users", get(elevated::list_users).post(elevated::list_users))
        .route_layer(middleware::from_fn(require_admin_middleware))
        .route_layer(middleware::from_fn_with_state(state.clone(), hinted_auth_middleware))
}

async fn health() -> axum::Json<Value> {
    axum::Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "timestamp": chrono::Utc::now(),
        }
    }))
}
