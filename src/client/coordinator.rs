//! Single-flight access-token refresh.
//!
//! Any request answered with 401 waits on one shared refresh exchange and is
//! replayed once with the new access token. While an exchange is in flight,
//! further 401s queue instead of starting their own, so a rotated refresh
//! token is only ever presented once.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::json;
use tokio::sync::oneshot;

use super::tokens::TokenStore;
use super::transport::{InboundResponse, OutboundRequest, Transport};
use super::ClientError;
use crate::auth::TokenPair;

pub const REFRESH_PATH: &str = "/api/v1/token";

/// `None` tells a waiter the refresh failed.
type Waiter = oneshot::Sender<Option<String>>;

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    waiters: Vec<Waiter>,
}

/// Why a refresh was asked for.
#[derive(Debug, Clone, Copy)]
enum Trigger<'a> {
    /// A request carrying this token (or none) was rejected with 401.
    Rejected(Option<&'a str>),
    /// The caller wants a new pair regardless of the stored access token.
    Explicit,
}

/// Clears the in-flight flag if the leading future is dropped mid-exchange.
/// Queued waiters see their sender dropped and fail.
struct InFlight<'a> {
    state: &'a Mutex<RefreshState>,
    armed: bool,
}

impl InFlight<'_> {
    fn finish(mut self) -> Vec<Waiter> {
        self.armed = false;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.refreshing = false;
        std::mem::take(&mut state.waiters)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.refreshing = false;
            state.waiters.clear();
        }
    }
}

pub struct RefreshCoordinator<T> {
    transport: T,
    tokens: Arc<dyn TokenStore>,
    state: Mutex<RefreshState>,
}

impl<T: Transport> RefreshCoordinator<T> {
    pub fn new(transport: T, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            transport,
            tokens,
            state: Mutex::new(RefreshState::default()),
        }
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_refreshing(&self) -> bool {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).refreshing
    }

    /// Send `request` with the stored access token attached. A 401 triggers
    /// at most one shared refresh and one replay; anything else is returned
    /// as-is (non-2xx as [`ClientError::Status`]).
    pub async fn send(&self, mut request: OutboundRequest) -> Result<InboundResponse, ClientError> {
        if let Some(token) = self.tokens.access_token() {
            request.bearer = Some(token);
        }

        let response = self.transport.dispatch(&request).await?;
        if !self.should_refresh(&request, &response) {
            return response.into_result();
        }

        let access_token = self
            .refresh_shared(Trigger::Rejected(request.bearer.as_deref()))
            .await?;

        request.bearer = Some(access_token);
        request.retried = true;
        self.transport.dispatch(&request).await?.into_result()
    }

    /// Exchange the stored refresh token now, joining an exchange already in
    /// flight if there is one.
    pub async fn refresh(&self) -> Result<String, ClientError> {
        self.refresh_shared(Trigger::Explicit).await
    }

    fn should_refresh(&self, request: &OutboundRequest, response: &InboundResponse) -> bool {
        response.is_unauthenticated()
            && !request.retried
            && request.path != REFRESH_PATH
            && self.tokens.refresh_token().is_some()
    }

    async fn refresh_shared(&self, trigger: Trigger<'_>) -> Result<String, ClientError> {
        let queued = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Some(rx)
            } else {
                // A refresh that finished after this request went out already
                // replaced the token it was rejected with.
                if let Trigger::Rejected(stale) = trigger {
                    if let Some(current) = self.tokens.access_token() {
                        if stale != Some(current.as_str()) {
                            return Ok(current);
                        }
                    }
                }
                state.refreshing = true;
                None
            }
        };

        if let Some(rx) = queued {
            return match rx.await {
                Ok(Some(token)) => Ok(token),
                _ => Err(ClientError::RefreshExhausted),
            };
        }

        let guard = InFlight {
            state: &self.state,
            armed: true,
        };

        let outcome = self.exchange().await;

        // Token store is updated before the flag drops, so a 401 arriving
        // after this point sees the new pair instead of starting an exchange
        // with the spent refresh token.
        match &outcome {
            Ok(tokens) => self.tokens.store(tokens),
            Err(e) => {
                tracing::warn!("token refresh failed: {}", e);
                self.tokens.clear();
            }
        }

        let waiters = guard.finish();
        tracing::debug!(queued = waiters.len(), ok = outcome.is_ok(), "refresh settled");

        let access_token = outcome.ok().map(|tokens| tokens.access_token);
        for waiter in waiters {
            let _ = waiter.send(access_token.clone());
        }

        access_token.ok_or(ClientError::RefreshExhausted)
    }

    async fn exchange(&self) -> Result<TokenPair, ClientError> {
        let refresh_token = self
            .tokens
            .refresh_token()
            .ok_or(ClientError::NotAuthenticated)?;

        let request = OutboundRequest::post(REFRESH_PATH, json!({ "refreshToken": refresh_token }));
        let response = self.transport.dispatch(&request).await?.into_result()?;

        Ok(serde_json::from_value(response.body["data"].clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryTokenStore;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Accepts exactly one access token; refresh rotates it to `access-N`.
    #[derive(Default)]
    struct Backend {
        valid: Mutex<String>,
        refresh_hits: AtomicUsize,
        fail_refresh: bool,
        accepted: Mutex<Vec<String>>,
    }

    #[derive(Clone, Default)]
    struct MockTransport(Arc<Backend>);

    impl MockTransport {
        fn failing() -> Self {
            Self(Arc::new(Backend {
                fail_refresh: true,
                ..Backend::default()
            }))
        }

        fn refresh_hits(&self) -> usize {
            self.0.refresh_hits.load(Ordering::SeqCst)
        }
    }

    fn reply(status: u16, body: Value) -> Result<InboundResponse, ClientError> {
        Ok(InboundResponse { status, body })
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn dispatch(&self, request: &OutboundRequest) -> Result<InboundResponse, ClientError> {
            let backend = &self.0;
            match request.path.as_str() {
                REFRESH_PATH => {
                    let n = backend.refresh_hits.fetch_add(1, Ordering::SeqCst) + 1;
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    if backend.fail_refresh {
                        return reply(401, json!({ "success": false, "code": "INVALID_TOKEN" }));
                    }
                    let access = format!("access-{}", n);
                    *backend.valid.lock().unwrap() = access.clone();
                    reply(
                        200,
                        json!({ "success": true, "data": {
                            "accessToken": access,
                            "refreshToken": format!("refresh-{}", n),
                        }}),
                    )
                }
                "/forbidden" => reply(403, json!({ "success": false, "code": "FORBIDDEN" })),
                _ => {
                    let valid = backend.valid.lock().unwrap().clone();
                    match &request.bearer {
                        Some(token) if *token == valid => {
                            backend.accepted.lock().unwrap().push(token.clone());
                            reply(200, json!({ "success": true, "data": token }))
                        }
                        _ => reply(401, json!({ "success": false, "code": "INVALID_TOKEN" })),
                    }
                }
            }
        }
    }

    fn stale_session() -> Arc<dyn TokenStore> {
        Arc::new(MemoryTokenStore::with_tokens(TokenPair {
            access_token: "expired".to_string(),
            refresh_token: "refresh-0".to_string(),
        }))
    }

    #[tokio::test]
    async fn concurrent_rejections_share_one_refresh() {
        let transport = MockTransport::default();
        let coordinator = RefreshCoordinator::new(transport.clone(), stale_session());

        let requests = (0..8).map(|_| coordinator.send(OutboundRequest::get("/api/v1/whoami")));
        let results = futures::future::join_all(requests).await;

        assert_eq!(transport.refresh_hits(), 1);
        for result in results {
            let response = result.expect("replayed request should succeed");
            assert_eq!(response.body["data"], "access-1");
        }
        assert_eq!(transport.0.accepted.lock().unwrap().len(), 8);
        assert_eq!(coordinator.tokens().refresh_token().as_deref(), Some("refresh-1"));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn failed_refresh_rejects_every_waiter_and_clears_tokens() {
        let transport = MockTransport::failing();
        let coordinator = RefreshCoordinator::new(transport.clone(), stale_session());

        let requests = (0..5).map(|_| coordinator.send(OutboundRequest::get("/api/v1/whoami")));
        let results = futures::future::join_all(requests).await;

        assert_eq!(transport.refresh_hits(), 1);
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(ClientError::RefreshExhausted))));
        assert!(coordinator.tokens().access_token().is_none());
        assert!(coordinator.tokens().refresh_token().is_none());
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn non_401_passes_through_without_refresh() {
        let transport = MockTransport::default();
        let coordinator = RefreshCoordinator::new(transport.clone(), stale_session());

        let result = coordinator.send(OutboundRequest::get("/forbidden")).await;
        assert!(matches!(result, Err(ClientError::Status { status: 403, .. })));
        assert_eq!(transport.refresh_hits(), 0);
    }

    #[tokio::test]
    async fn without_refresh_token_401_is_returned() {
        let transport = MockTransport::default();
        let coordinator = RefreshCoordinator::new(transport.clone(), Arc::new(MemoryTokenStore::new()));

        let result = coordinator.send(OutboundRequest::get("/api/v1/whoami")).await;
        assert!(matches!(result, Err(ClientError::Status { status: 401, .. })));
        assert_eq!(transport.refresh_hits(), 0);
    }

    #[tokio::test]
    async fn refresh_endpoint_401_is_not_retried() {
        let transport = MockTransport::failing();
        let coordinator = RefreshCoordinator::new(transport.clone(), stale_session());

        let result = coordinator
            .send(OutboundRequest::post(REFRESH_PATH, json!({ "refreshToken": "x" })))
            .await;
        assert!(matches!(result, Err(ClientError::Status { status: 401, .. })));
        assert_eq!(transport.refresh_hits(), 1);
    }

    #[tokio::test]
    async fn superseded_token_is_reused_without_refresh() {
        let transport = MockTransport::default();
        let coordinator = RefreshCoordinator::new(transport.clone(), stale_session());
        coordinator.tokens().store(&TokenPair {
            access_token: "access-9".to_string(),
            refresh_token: "refresh-9".to_string(),
        });

        let token = coordinator
            .refresh_shared(Trigger::Rejected(Some("expired")))
            .await
            .unwrap();
        assert_eq!(token, "access-9");
        assert_eq!(transport.refresh_hits(), 0);
    }

    #[tokio::test]
    async fn explicit_refresh_always_exchanges() {
        let transport = MockTransport::default();
        let coordinator = RefreshCoordinator::new(transport.clone(), stale_session());

        assert_eq!(coordinator.refresh().await.unwrap(), "access-1");
        assert_eq!(coordinator.refresh().await.unwrap(), "access-2");
        assert_eq!(transport.refresh_hits(), 2);
    }

    #[tokio::test]
    async fn dropped_leader_resets_in_flight_flag() {
        let transport = MockTransport::default();
        let coordinator = RefreshCoordinator::new(transport.clone(), stale_session());

        let leader = coordinator.send(OutboundRequest::get("/api/v1/whoami"));
        let timed_out = tokio::time::timeout(Duration::from_millis(10), leader).await;
        assert!(timed_out.is_err());
        assert!(!coordinator.is_refreshing());

        // The next rejection can lead a fresh exchange.
        let response = coordinator.send(OutboundRequest::get("/api/v1/whoami")).await.unwrap();
        assert_eq!(response.body["data"], "access-2");
    }
}
