use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{encode, Header};
use serde::{Deserialize, Serialize};

use super::claims::{Claims, IdentityClaim, TokenKind, TokenLifetimes};
use super::error::IssueError;
use super::keys::AuthKeys;
use super::principal::Principal;

/// Access/refresh pair handed to clients at login, registration and exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Builds signed, envelope-encrypted tokens for a principal.
///
/// Issuing does not persist anything. Callers store the returned refresh
/// token on the principal's record so only the latest one stays live.
#[derive(Clone)]
pub struct TokenIssuer {
    keys: Arc<AuthKeys>,
    lifetimes: TokenLifetimes,
}

impl TokenIssuer {
    pub fn new(keys: Arc<AuthKeys>, lifetimes: TokenLifetimes) -> Self {
        Self { keys, lifetimes }
    }

    pub fn issue(&self, principal: &Principal) -> Result<TokenPair, IssueError> {
        let pair = TokenPair {
            access_token: self.sign(principal, TokenKind::Access)?,
            refresh_token: self.sign(principal, TokenKind::Refresh)?,
        };

        tracing::info!(
            principal = %principal.id(),
            role = %principal.kind(),
            "issued token pair"
        );
        Ok(pair)
    }

    /// Sign a single token of the given kind.
    pub fn sign(&self, principal: &Principal, kind: TokenKind) -> Result<String, IssueError> {
        let identity = serde_json::to_string(&IdentityClaim { id: principal.id() })?;
        let now = Utc::now();

        let claims = Claims {
            data: self.keys.cipher().encrypt(&identity),
            iat: now.timestamp(),
            exp: self
                .lifetimes
                .for_kind(kind)
                .map(|ttl| (now + ttl).timestamp()),
        };

        Ok(encode(&Header::default(), &claims, self.keys.encoding_key(kind))?)
    }

    pub fn lifetimes(&self) -> &TokenLifetimes {
        &self.lifetimes
    }
}
