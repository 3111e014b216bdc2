use once_cell::sync::Lazy;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::env;

use crate::auth::TokenLifetimes;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub access_secret: String,
    #[serde(skip_serializing)]
    pub refresh_secret: String,
    #[serde(skip_serializing)]
    pub encryption_key: String,
    pub access_ttl_secs: i64,
    /// `None` issues refresh tokens without expiry.
    pub refresh_ttl_secs: Option<i64>,
    pub enforce_refresh_rotation: bool,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

impl SecurityConfig {
    pub fn lifetimes(&self) -> TokenLifetimes {
        TokenLifetimes {
            access: chrono::Duration::seconds(self.access_ttl_secs),
            refresh: self.refresh_ttl_secs.map(chrono::Duration::seconds),
        }
    }
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("enforce_refresh_rotation", &self.enforce_refresh_rotation)
            .field("enable_cors", &self.enable_cors)
            .field("cors_origins", &self.cors_origins)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
        .with_secrets()
    }

    fn with_env_overrides(mut self) -> Self {
        // API overrides
        if let Some(port) = env::var("MINDREVEAL_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
        {
            self.api.port = port.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ACCESS_TTL_SECS") {
            self.security.access_ttl_secs = v.parse().unwrap_or(self.security.access_ttl_secs);
        }
        if let Ok(v) = env::var("SECURITY_REFRESH_TTL_SECS") {
            self.security.refresh_ttl_secs = match v.as_str() {
                "never" | "none" | "0" => None,
                other => other.parse().ok().or(self.security.refresh_ttl_secs),
            };
        }
        if let Ok(v) = env::var("SECURITY_ENFORCE_REFRESH_ROTATION") {
            self.security.enforce_refresh_rotation =
                v.parse().unwrap_or(self.security.enforce_refresh_rotation);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v).filter(|url| !url.is_empty());
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        self
    }

    /// Signing and encryption secrets. Development falls back to random
    /// per-process secrets; other environments leave them empty so key
    /// construction fails at startup.
    fn with_secrets(mut self) -> Self {
        let fallback = self.environment == Environment::Development;
        self.security.access_secret = secret_from_env("JWT_SECRET", fallback);
        self.security.refresh_secret = secret_from_env("RJWT_SECRET_KEY", fallback);
        self.security.encryption_key = secret_from_env("AES_SECRET_KEY", fallback);
        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_request_size_bytes: 1024 * 1024, // 1MB
            },
            security: SecurityConfig {
                access_secret: String::new(),
                refresh_secret: String::new(),
                encryption_key: String::new(),
                access_ttl_secs: 15,
                refresh_ttl_secs: Some(7 * 24 * 60 * 60),
                enforce_refresh_rotation: true,
                enable_cors: true,
                cors_origins: vec!["http://localhost:5173".to_string()],
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.api.enable_request_logging = true;
        config.security.access_ttl_secs = 30;
        config.security.cors_origins = vec!["https://staging.example.com".to_string()];
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.api.enable_request_logging = false;
        config.security.access_ttl_secs = 30;
        config.security.refresh_ttl_secs = Some(30 * 24 * 60 * 60);
        config.security.cors_origins = vec!["https://app.example.com".to_string()];
        config.database.max_connections = 50;
        config.database.connection_timeout = 5;
        config
    }
}

fn secret_from_env(name: &'static str, fallback: bool) -> String {
    match env::var(name) {
        Ok(value) if !value.is_empty() => value,
        _ if fallback => {
            tracing::warn!("{} not set, using a random secret for this process", name);
            let mut bytes = [0u8; 32];
            OsRng.fill_bytes(&mut bytes);
            hex::encode(bytes)
        }
        _ => String::new(),
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.security.access_ttl_secs, 15);
        assert!(config.security.enforce_refresh_rotation);
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.environment, Environment::Production);
        assert!(!config.api.enable_request_logging);
        assert!(config.security.access_secret.is_empty());
    }

    #[test]
    fn lifetimes_follow_security_config() {
        let mut config = AppConfig::development();
        config.security.refresh_ttl_secs = None;
        let lifetimes = config.security.lifetimes();
        assert_eq!(lifetimes.access, chrono::Duration::seconds(15));
        assert!(lifetimes.refresh.is_none());
    }

    #[test]
    fn random_fallback_secrets_are_long_enough_for_the_cipher() {
        let secret = secret_from_env("MINDREVEAL_TEST_UNSET_SECRET", true);
        assert_eq!(secret.len(), 64);
        assert!(secret_from_env("MINDREVEAL_TEST_UNSET_SECRET", false).is_empty());
    }
}
