use chrono::Duration;
use jsonwebtoken::{Algorithm, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two token namespaces. Issuer and verifier both select secret, lifetime
/// and validation rules through this type, never through separate code paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed JWT body. `data` is the encrypted envelope of [`IdentityClaim`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub data: String,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Plaintext carried inside the envelope. Only the identifier, never secrets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaim {
    pub id: Uuid,
}

/// Lifetimes per token kind. A refresh lifetime of `None` issues refresh
/// tokens without an `exp` claim.
#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Option<Duration>,
}

impl TokenLifetimes {
    pub fn for_kind(&self, kind: TokenKind) -> Option<Duration> {
        match kind {
            TokenKind::Access => Some(self.access),
            TokenKind::Refresh => self.refresh,
        }
    }

    /// JWT validation rules for a kind. Expiry is checked with zero leeway
    /// whenever the kind carries a lifetime.
    pub fn validation(&self, kind: TokenKind) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        if self.for_kind(kind).is_none() {
            validation.required_spec_claims.clear();
            validation.validate_exp = false;
        }

        validation
    }
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: Duration::seconds(15),
            refresh: Some(Duration::days(7)),
        }
    }
}
