use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};
use tracing::info;
use uuid::Uuid;

use super::{PrincipalStore, StoreError};
use crate::auth::principal::{Account, PrincipalKind};
use crate::config::DatabaseConfig;

/// PostgreSQL-backed principal store. Users and administrators live in
/// separate tables with identical shape.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    kind: PrincipalKind,
}

impl PgStore {
    pub fn new(pool: PgPool, kind: PrincipalKind) -> Self {
        Self { pool, kind }
    }

    /// Open a pool against `DATABASE_URL` and make sure both tables exist.
    pub async fn connect(database: &DatabaseConfig) -> Result<PgPool, StoreError> {
        let url = database
            .url
            .as_deref()
            .ok_or_else(|| StoreError::NotFound("DATABASE_URL".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(database.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(database.connection_timeout))
            .connect(url)
            .await?;

        for kind in [PrincipalKind::User, PrincipalKind::Admin] {
            let ddl = format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id UUID PRIMARY KEY,
                    username TEXT NOT NULL UNIQUE,
                    password_hash TEXT NOT NULL,
                    refresh_token TEXT,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
                )
                "#,
                Self::table_for(kind)
            );
            sqlx::query(&ddl).execute(&pool).await?;
        }

        info!("Principal tables ready");
        Ok(pool)
    }

    fn table_for(kind: PrincipalKind) -> &'static str {
        match kind {
            PrincipalKind::User => "users",
            PrincipalKind::Admin => "admins",
        }
    }

    fn table(&self) -> &'static str {
        Self::table_for(self.kind)
    }

    fn account_from_row(row: &PgRow) -> Account {
        Account {
            id: row.get("id"),
            username: row.get("username"),
            password_hash: row.get("password_hash"),
            refresh_token: row.get("refresh_token"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl PrincipalStore for PgStore {
    fn kind(&self) -> PrincipalKind {
        self.kind
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let query = format!(
            "SELECT id, username, password_hash, refresh_token, created_at FROM {} WHERE id = $1",
            self.table()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(Self::account_from_row))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let query = format!(
            "SELECT id, username, password_hash, refresh_token, created_at FROM {} WHERE username = $1",
            self.table()
        );
        let row = sqlx::query(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(Self::account_from_row))
    }

    async fn insert(&self, username: &str, password_hash: &str) -> Result<Account, StoreError> {
        let query = format!(
            r#"
            INSERT INTO {} (id, username, password_hash)
            VALUES ($1, $2, $3)
            ON CONFLICT (username) DO NOTHING
            RETURNING id, username, password_hash, refresh_token, created_at
            "#,
            self.table()
        );
        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(username)
            .bind(password_hash)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref()
            .map(Self::account_from_row)
            .ok_or_else(|| StoreError::UsernameTaken(username.to_string()))
    }

    async fn set_refresh_token(&self, id: Uuid, token: &str) -> Result<(), StoreError> {
        let query = format!("UPDATE {} SET refresh_token = $2 WHERE id = $1", self.table());
        let result = sqlx::query(&query)
            .bind(id)
            .bind(token)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("{} {}", self.kind, id)));
        }
        Ok(())
    }

    async fn replace_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        token: &str,
    ) -> Result<bool, StoreError> {
        let query = format!(
            "UPDATE {} SET refresh_token = $3 WHERE id = $1 AND refresh_token = $2",
            self.table()
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(expected)
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list(&self) -> Result<Vec<Account>, StoreError> {
        let query = format!(
            "SELECT id, username, password_hash, refresh_token, created_at FROM {} ORDER BY created_at",
            self.table()
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(Self::account_from_row).collect())
    }
}
