use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{PrincipalStore, StoreError};
use crate::auth::principal::{Account, PrincipalKind};

/// Process-local principal store.
pub struct MemoryStore {
    kind: PrincipalKind,
    accounts: RwLock<HashMap<Uuid, Account>>,
}

impl MemoryStore {
    pub fn new(kind: PrincipalKind) -> Self {
        Self {
            kind,
            accounts: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl PrincipalStore for MemoryStore {
    fn kind(&self) -> PrincipalKind {
        self.kind
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .find(|account| account.username == username)
            .cloned())
    }

    async fn insert(&self, username: &str, password_hash: &str) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write().await;
        if accounts.values().any(|account| account.username == username) {
            return Err(StoreError::UsernameTaken(username.to_string()));
        }

        let account = Account {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            refresh_token: None,
            created_at: Utc::now(),
        };
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn set_refresh_token(&self, id: Uuid, token: &str) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("{} {}", self.kind, id)))?;
        account.refresh_token = Some(token.to_string());
        Ok(())
    }

    async fn replace_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        token: &str,
    ) -> Result<bool, StoreError> {
        let mut accounts = self.accounts.write().await;
        match accounts.get_mut(&id) {
            Some(account) if account.refresh_token.as_deref() == Some(expected) => {
                account.refresh_token = Some(token.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list(&self) -> Result<Vec<Account>, StoreError> {
        let mut accounts: Vec<Account> = self.accounts.read().await.values().cloned().collect();
        accounts.sort_by_key(|account| account.created_at);
        Ok(accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_usernames_are_rejected() {
        let store = MemoryStore::new(PrincipalKind::User);
        store.insert("alice", "h").await.unwrap();
        let err = store.insert("alice", "h2").await.unwrap_err();
        assert!(matches!(err, StoreError::UsernameTaken(name) if name == "alice"));
    }

    #[tokio::test]
    async fn refresh_token_is_replaced() {
        let store = MemoryStore::new(PrincipalKind::User);
        let account = store.insert("alice", "h").await.unwrap();
        store.set_refresh_token(account.id, "r0").await.unwrap();
        store.set_refresh_token(account.id, "r1").await.unwrap();

        let stored = store.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn refresh_token_swaps_only_from_expected_value() {
        let store = MemoryStore::new(PrincipalKind::User);
        let account = store.insert("alice", "h").await.unwrap();
        store.set_refresh_token(account.id, "r0").await.unwrap();

        assert!(store.replace_refresh_token(account.id, "r0", "r1").await.unwrap());
        assert!(!store.replace_refresh_token(account.id, "r0", "r2").await.unwrap());
        assert!(!store.replace_refresh_token(Uuid::new_v4(), "r1", "r2").await.unwrap());

        let stored = store.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn setting_token_on_missing_account_fails() {
        let store = MemoryStore::new(PrincipalKind::Admin);
        let err = store.set_refresh_token(Uuid::new_v4(), "r").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
