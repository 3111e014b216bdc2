use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which backing store an identifier resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    User,
    Admin,
}

impl PrincipalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::User => "user",
            PrincipalKind::Admin => "admin",
        }
    }

    /// Parse a caller-declared role signal. Unknown values carry no hint.
    pub fn from_hint(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Some(PrincipalKind::User),
            "admin" | "administrator" => Some(PrincipalKind::Admin),
            _ => None,
        }
    }

    /// Registration rule: usernames mentioning "admin" become administrators.
    pub fn for_username(username: &str) -> Self {
        if username.contains("admin") {
            PrincipalKind::Admin
        } else {
            PrincipalKind::User
        }
    }
}

impl std::fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical account record as held by a principal store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An authenticated identity. The variant is the role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    User(Account),
    Admin(Account),
}

impl Principal {
    pub fn new(kind: PrincipalKind, account: Account) -> Self {
        match kind {
            PrincipalKind::User => Principal::User(account),
            PrincipalKind::Admin => Principal::Admin(account),
        }
    }

    pub fn kind(&self) -> PrincipalKind {
        match self {
            Principal::User(_) => PrincipalKind::User,
            Principal::Admin(_) => PrincipalKind::Admin,
        }
    }

    pub fn account(&self) -> &Account {
        match self {
            Principal::User(account) | Principal::Admin(account) => account,
        }
    }

    pub fn id(&self) -> Uuid {
        self.account().id
    }

    pub fn username(&self) -> &str {
        &self.account().username
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Principal::Admin(_))
    }

    pub fn view(&self) -> PrincipalView {
        PrincipalView::from(self)
    }
}

/// Public fields of a principal, safe to return to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalView {
    pub id: Uuid,
    pub username: String,
    pub role: PrincipalKind,
    pub created_at: DateTime<Utc>,
}

impl From<&Principal> for PrincipalView {
    fn from(principal: &Principal) -> Self {
        let account = principal.account();
        Self {
            id: account.id,
            username: account.username.clone(),
            role: principal.kind(),
            created_at: account.created_at,
        }
    }
}
