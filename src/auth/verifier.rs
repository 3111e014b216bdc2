use std::sync::Arc;

use jsonwebtoken::decode;

use super::claims::{Claims, IdentityClaim, TokenKind, TokenLifetimes};
use super::error::AuthError;
use super::keys::AuthKeys;
use super::principal::{Principal, PrincipalKind};
use crate::store::PrincipalDirectory;

/// Last stage a verification call passed. Diagnostics only: callers get
/// either the resolved principal or `InvalidToken`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStage {
    Received,
    SignatureChecked,
    PayloadDecoded,
    PrincipalResolved,
}

/// Validates bearer strings and resolves them to principals.
#[derive(Clone)]
pub struct TokenVerifier {
    keys: Arc<AuthKeys>,
    lifetimes: TokenLifetimes,
    directory: PrincipalDirectory,
    enforce_refresh_rotation: bool,
}

impl TokenVerifier {
    pub fn new(
        keys: Arc<AuthKeys>,
        lifetimes: TokenLifetimes,
        directory: PrincipalDirectory,
    ) -> Self {
        Self {
            keys,
            lifetimes,
            directory,
            enforce_refresh_rotation: true,
        }
    }

    /// When enabled, a refresh token only verifies while it is still the one
    /// stored on the principal's record.
    pub fn with_refresh_rotation(mut self, enforce: bool) -> Self {
        self.enforce_refresh_rotation = enforce;
        self
    }

    pub fn enforces_refresh_rotation(&self) -> bool {
        self.enforce_refresh_rotation
    }

    pub async fn verify(&self, token: &str, kind: TokenKind) -> Result<Principal, AuthError> {
        self.verify_with_hint(token, kind, None).await
    }

    /// Verify with an optional role hint that only changes lookup order.
    pub async fn verify_with_hint(
        &self,
        token: &str,
        kind: TokenKind,
        hint: Option<PrincipalKind>,
    ) -> Result<Principal, AuthError> {
        self.run(token, kind, hint)
            .await
            .map_err(|(stage, err)| {
                tracing::debug!(kind = %kind, stage = ?stage, reason = %err, "token rejected");
                err.at_boundary()
            })
    }

    async fn run(
        &self,
        token: &str,
        kind: TokenKind,
        hint: Option<PrincipalKind>,
    ) -> Result<Principal, (VerificationStage, AuthError)> {
        let mut stage = VerificationStage::Received;

        let claims = decode::<Claims>(
            token,
            self.keys.decoding_key(kind),
            &self.lifetimes.validation(kind),
        )
        .map_err(|e| {
            tracing::trace!("signature check failed: {}", e);
            (stage, AuthError::InvalidToken)
        })?
        .claims;
        stage = VerificationStage::SignatureChecked;

        let identity: IdentityClaim = self
            .keys
            .cipher()
            .decrypt(&claims.data)
            .map_err(|e| {
                tracing::trace!("payload decrypt failed: {}", e);
                (stage, AuthError::InvalidToken)
            })
            .and_then(|plaintext| {
                serde_json::from_str(&plaintext).map_err(|_| (stage, AuthError::InvalidToken))
            })?;
        stage = VerificationStage::PayloadDecoded;

        let principal = self
            .directory
            .resolve(identity.id, hint)
            .await
            .map_err(|e| (stage, AuthError::from(e)))?
            .ok_or((stage, AuthError::PrincipalNotFound))?;
        stage = VerificationStage::PrincipalResolved;

        if kind == TokenKind::Refresh
            && self.enforce_refresh_rotation
            && principal.account().refresh_token.as_deref() != Some(token)
        {
            return Err((stage, AuthError::InvalidToken));
        }

        Ok(principal)
    }
}
