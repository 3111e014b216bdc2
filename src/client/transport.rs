use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Method};
use serde_json::Value;

use super::ClientError;

/// A call the coordinator may have to send twice, so it owns its parts.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub bearer: Option<String>,
    pub(crate) retried: bool,
}

impl OutboundRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            bearer: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundResponse {
    pub status: u16,
    pub body: Value,
}

impl InboundResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 401 is the only status that triggers a refresh.
    pub fn is_unauthenticated(&self) -> bool {
        self.status == 401
    }

    /// Non-2xx responses become [`ClientError::Status`] unchanged.
    pub fn into_result(self) -> Result<InboundResponse, ClientError> {
        if self.is_success() {
            return Ok(self);
        }

        Err(ClientError::Status {
            status: self.status,
            code: self.body["code"].as_str().map(str::to_string),
            message: self.body["error"]
                .as_str()
                .unwrap_or("request failed")
                .to_string(),
        })
    }
}

/// Sends one request, no retries.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn dispatch(&self, request: &OutboundRequest) -> Result<InboundResponse, ClientError>;
}

/// reqwest transport. Every call carries `timeout`, which also bounds how
/// long queued requests can wait on a hung refresh.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn dispatch(&self, request: &OutboundRequest) -> Result<InboundResponse, ClientError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.client.request(request.method.clone(), &url);

        if let Some(token) = &request.bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        tracing::debug!(method = %request.method, path = %request.path, status, "dispatched");
        Ok(InboundResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_responses_keep_status_and_code() {
        let response = InboundResponse {
            status: 403,
            body: json!({ "success": false, "error": "nope", "code": "FORBIDDEN" }),
        };
        match response.into_result() {
            Err(ClientError::Status { status, code, message }) => {
                assert_eq!(status, 403);
                assert_eq!(code.as_deref(), Some("FORBIDDEN"));
                assert_eq!(message, "nope");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let transport = HttpTransport::new("http://localhost:3000/", HttpTransport::DEFAULT_TIMEOUT).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:3000");
    }
}
