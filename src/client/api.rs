use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::coordinator::RefreshCoordinator;
use super::tokens::TokenStore;
use super::transport::{HttpTransport, OutboundRequest, Transport};
use super::ClientError;
use crate::auth::PrincipalView;
use crate::handlers::public::auth::session::SessionResponse;

/// Typed wrapper over the auth endpoints. Every call goes through the
/// coordinator, so an expired access token is refreshed transparently.
pub struct ApiClient<T = HttpTransport> {
    coordinator: RefreshCoordinator<T>,
}

impl ApiClient<HttpTransport> {
    pub fn connect(base_url: &str, tokens: Arc<dyn TokenStore>) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(base_url, HttpTransport::DEFAULT_TIMEOUT)?;
        Ok(Self::new(RefreshCoordinator::new(transport, tokens)))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(coordinator: RefreshCoordinator<T>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &RefreshCoordinator<T> {
        &self.coordinator
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<SessionResponse, ClientError> {
        self.start_session("/api/v1/login", username, password).await
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<SessionResponse, ClientError> {
        self.start_session("/api/v1/register", username, password).await
    }

    pub async fn whoami(&self) -> Result<PrincipalView, ClientError> {
        self.call(OutboundRequest::get("/api/v1/whoami")).await
    }

    /// Administrator listing. `role_hint` goes in the body so the server
    /// resolves the administrator store first.
    pub async fn users(&self, role_hint: Option<&str>) -> Result<Vec<PrincipalView>, ClientError> {
        let request = match role_hint {
            Some(role) => OutboundRequest::post("/api/v1/users", json!({ "role": role })),
            None => OutboundRequest::get("/api/v1/users"),
        };
        let listing: Value = self.call(request).await?;
        Ok(serde_json::from_value(listing["users"].clone())?)
    }

    pub async fn refresh(&self) -> Result<String, ClientError> {
        self.coordinator.refresh().await
    }

    pub fn logout(&self) {
        self.coordinator.tokens().clear();
    }

    async fn start_session(
        &self,
        path: &str,
        username: &str,
        password: &str,
    ) -> Result<SessionResponse, ClientError> {
        let request = OutboundRequest::post(path, json!({ "username": username, "password": password }));
        // Credentials exchanges bypass the coordinator: a 401 here means bad
        // credentials, not an expired access token.
        let response = self.coordinator.transport().dispatch(&request).await?.into_result()?;
        let session: SessionResponse = serde_json::from_value(response.body["data"].clone())?;
        self.coordinator.tokens().store(&session.tokens);
        Ok(session)
    }

    async fn call<R: DeserializeOwned>(&self, request: OutboundRequest) -> Result<R, ClientError> {
        let response = self.coordinator.send(request).await?;
        Ok(serde_json::from_value(response.body["data"].clone())?)
    }
}
