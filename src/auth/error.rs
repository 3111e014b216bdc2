use thiserror::Error;

use crate::store::StoreError;

/// Failures of the payload cipher. Never shown to HTTP callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("encryption key must be at least {required} bytes, got {actual}")]
    KeyTooShort { required: usize, actual: usize },

    #[error("envelope is missing the ':' delimiter")]
    MissingDelimiter,

    #[error("envelope segment is not valid hex: {0}")]
    InvalidHex(String),

    #[error("initialization vector must be {expected} bytes, got {actual}")]
    InvalidIvLength { expected: usize, actual: usize },

    #[error("ciphertext length {0} is not a positive multiple of the block size")]
    InvalidCiphertextLength(usize),

    #[error("decryption failed")]
    Decrypt,

    #[error("decrypted payload is not valid UTF-8")]
    InvalidUtf8,
}

/// Authentication outcomes that may cross into the request/response layer.
///
/// `PrincipalNotFound` exists so internal code can say what happened; it is
/// folded into `InvalidToken` by [`AuthError::at_boundary`] before a caller
/// outside the verifier ever sees it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingCredential,

    #[error("Authorization header must carry a Bearer token")]
    MalformedCredential,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Token names a principal that no longer exists")]
    PrincipalNotFound,

    /// Client-side outcome of a failed refresh. Never produced by the server;
    /// kept here so the wire code is defined alongside the others.
    #[error("Token refresh failed, sign in again")]
    RefreshExhausted,
}

impl AuthError {
    /// Collapse internal distinctions that would otherwise act as an oracle.
    pub fn at_boundary(self) -> Self {
        match self {
            AuthError::PrincipalNotFound => AuthError::InvalidToken,
            other => other,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "MISSING_CREDENTIAL",
            AuthError::MalformedCredential => "MALFORMED_CREDENTIAL",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::PrincipalNotFound => "INVALID_TOKEN",
            AuthError::RefreshExhausted => "REFRESH_EXHAUSTED",
        }
    }
}

/// Errors raised while building signing material or issuing tokens.
#[derive(Debug, Error)]
pub enum IssueError {
    #[error("failed to serialize claim payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("JWT generation error: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Errors from building process-wide key material out of configuration.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("{0} is not configured")]
    MissingSecret(&'static str),

    #[error("access and refresh signing secrets must differ")]
    SharedSigningSecret,

    #[error(transparent)]
    Cipher(#[from] CipherError),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        tracing::error!("principal store failure during verification: {}", err);
        AuthError::InvalidToken
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_not_found_is_folded_at_boundary() {
        assert_eq!(AuthError::PrincipalNotFound.at_boundary(), AuthError::InvalidToken);
        assert_eq!(AuthError::MissingCredential.at_boundary(), AuthError::MissingCredential);
    }

    #[test]
    fn folded_errors_share_a_code() {
        assert_eq!(AuthError::PrincipalNotFound.code(), AuthError::InvalidToken.code());
    }
}
