//! Principal persistence boundary.
//!
//! The auth core only needs to find accounts by id or username, create them,
//! and record the latest refresh token. Two backends implement this: an
//! in-memory map for development and tests, and PostgreSQL via sqlx.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::principal::{Account, Principal, PrincipalKind};

pub mod memory;
pub mod password;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Username '{0}' is already taken")]
    UsernameTaken(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// One backing store per principal variant.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    fn kind(&self) -> PrincipalKind;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError>;

    async fn insert(&self, username: &str, password_hash: &str) -> Result<Account, StoreError>;

    /// Replace the stored refresh token, superseding any previous one.
    async fn set_refresh_token(&self, id: Uuid, token: &str) -> Result<(), StoreError>;

    /// Swap in `token` only while the stored token still equals `expected`.
    /// Returns `false` when another exchange got there first.
    async fn replace_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        token: &str,
    ) -> Result<bool, StoreError>;

    async fn list(&self) -> Result<Vec<Account>, StoreError>;
}

/// Resolves identifiers across the user and administrator stores.
///
/// Lookups go user store first, then administrator store. A hint may move
/// one store to the front; it never removes the other from the search.
#[derive(Clone)]
pub struct PrincipalDirectory {
    users: Arc<dyn PrincipalStore>,
    admins: Arc<dyn PrincipalStore>,
}

impl PrincipalDirectory {
    pub fn new(users: Arc<dyn PrincipalStore>, admins: Arc<dyn PrincipalStore>) -> Self {
        Self { users, admins }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new(PrincipalKind::User)),
            Arc::new(MemoryStore::new(PrincipalKind::Admin)),
        )
    }

    pub fn store(&self, kind: PrincipalKind) -> &Arc<dyn PrincipalStore> {
        match kind {
            PrincipalKind::User => &self.users,
            PrincipalKind::Admin => &self.admins,
        }
    }

    fn lookup_order(&self, hint: Option<PrincipalKind>) -> [&Arc<dyn PrincipalStore>; 2] {
        match hint {
            Some(PrincipalKind::Admin) => [&self.admins, &self.users],
            _ => [&self.users, &self.admins],
        }
    }

    pub async fn resolve(
        &self,
        id: Uuid,
        hint: Option<PrincipalKind>,
    ) -> Result<Option<Principal>, StoreError> {
        for store in self.lookup_order(hint) {
            if let Some(account) = store.find_by_id(id).await? {
                return Ok(Some(Principal::new(store.kind(), account)));
            }
        }
        Ok(None)
    }

    pub async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Principal>, StoreError> {
        let kind = PrincipalKind::for_username(username);
        Ok(self
            .store(kind)
            .find_by_username(username)
            .await?
            .map(|account| Principal::new(kind, account)))
    }

    pub async fn register(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Principal, StoreError> {
        let kind = PrincipalKind::for_username(username);
        let account = self.store(kind).insert(username, password_hash).await?;
        Ok(Principal::new(kind, account))
    }

    /// Record the refresh token just issued to `principal`.
    pub async fn persist_refresh_token(
        &self,
        principal: &Principal,
        token: &str,
    ) -> Result<(), StoreError> {
        self.store(principal.kind())
            .set_refresh_token(principal.id(), token)
            .await
    }

    /// Rotate `principal` from the presented refresh token to a new one.
    pub async fn rotate_refresh_token(
        &self,
        principal: &Principal,
        presented: &str,
        token: &str,
    ) -> Result<bool, StoreError> {
        self.store(principal.kind())
            .replace_refresh_token(principal.id(), presented, token)
            .await
    }
}
