use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use crate::auth::TokenPair;

/// Client-side credential storage.
pub trait TokenStore: Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn refresh_token(&self) -> Option<String>;
    fn store(&self, tokens: &TokenPair);
    fn clear(&self);
}

#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> Option<String> {
        let tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        tokens.as_ref().map(|t| t.access_token.clone())
    }

    fn refresh_token(&self) -> Option<String> {
        let tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        tokens.as_ref().map(|t| t.refresh_token.clone())
    }

    fn store(&self, tokens: &TokenPair) {
        *self.tokens.lock().unwrap_or_else(PoisonError::into_inner) = Some(tokens.clone());
    }

    fn clear(&self) {
        *self.tokens.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Tokens persisted as JSON so CLI invocations share one session.
pub struct FileTokenStore {
    path: PathBuf,
    cache: MemoryTokenStore,
}

impl FileTokenStore {
    pub fn open(path: PathBuf) -> Self {
        let cache = fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str::<TokenPair>(&content).ok())
            .map(MemoryTokenStore::with_tokens)
            .unwrap_or_default();

        Self { path, cache }
    }

    fn write(&self, tokens: &TokenPair) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(tokens)?)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn access_token(&self) -> Option<String> {
        self.cache.access_token()
    }

    fn refresh_token(&self) -> Option<String> {
        self.cache.refresh_token()
    }

    fn store(&self, tokens: &TokenPair) {
        self.cache.store(tokens);
        if let Err(e) = self.write(tokens) {
            tracing::warn!("failed to persist tokens to {}: {}", self.path.display(), e);
        }
    }

    fn clear(&self) {
        self.cache.clear();
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                tracing::warn!("failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}
