#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

use mindreveal_api_rust::app::{router, AppState};
use mindreveal_api_rust::auth::{AuthKeys, TokenLifetimes};
use mindreveal_api_rust::store::PrincipalDirectory;

pub const ACCESS_SECRET: &str = "test-access-secret";
pub const REFRESH_SECRET: &str = "test-refresh-secret";
pub const ENCRYPTION_KEY: &str = "0123456789abcdef0123456789abcdef";
pub const PASSWORD: &str = "Secret123";

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub directory: PrincipalDirectory,
}

impl TestServer {
    /// Serve the router on an unused port inside the current runtime, backed
    /// by in-memory stores so every test starts from an empty directory.
    pub async fn spawn(lifetimes: TokenLifetimes) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let keys = Arc::new(AuthKeys::new(ACCESS_SECRET, REFRESH_SECRET, ENCRYPTION_KEY)?);
        let directory = PrincipalDirectory::in_memory();
        let app = router(AppState::new(keys, lifetimes, directory.clone()));

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test port")?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let server = Self { port, base_url, directory };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Register `username` and return the `data` object of the response.
    pub async fn register(&self, username: &str) -> Result<Value> {
        let res = reqwest::Client::new()
            .post(self.url("/api/v1/register"))
            .json(&json!({ "username": username, "password": PASSWORD }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::CREATED, "register failed: {}", res.status());

        let body: Value = res.json().await?;
        Ok(body["data"].clone())
    }
}

pub async fn spawn_server() -> Result<TestServer> {
    TestServer::spawn(TokenLifetimes::default()).await
}

pub fn token(session: &Value, field: &str) -> String {
    session[field].as_str().unwrap_or_default().to_string()
}
