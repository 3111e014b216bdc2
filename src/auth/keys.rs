use jsonwebtoken::{DecodingKey, EncodingKey};

use super::cipher::PayloadCipher;
use super::claims::TokenKind;
use super::error::KeyError;
use crate::config::SecurityConfig;

/// Process-wide signing and encryption material, loaded once at startup.
pub struct AuthKeys {
    access: Secret,
    refresh: Secret,
    cipher: PayloadCipher,
}

struct Secret {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Secret {
    fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

impl AuthKeys {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        encryption_key: &str,
    ) -> Result<Self, KeyError> {
        if access_secret.is_empty() {
            return Err(KeyError::MissingSecret("JWT_SECRET"));
        }
        if refresh_secret.is_empty() {
            return Err(KeyError::MissingSecret("RJWT_SECRET_KEY"));
        }
        if encryption_key.is_empty() {
            return Err(KeyError::MissingSecret("AES_SECRET_KEY"));
        }
        if access_secret == refresh_secret {
            return Err(KeyError::SharedSigningSecret);
        }

        Ok(Self {
            access: Secret::new(access_secret.as_bytes()),
            refresh: Secret::new(refresh_secret.as_bytes()),
            cipher: PayloadCipher::new(encryption_key)?,
        })
    }

    pub fn from_config(security: &SecurityConfig) -> Result<Self, KeyError> {
        Self::new(
            &security.access_secret,
            &security.refresh_secret,
            &security.encryption_key,
        )
    }

    pub fn encoding_key(&self, kind: TokenKind) -> &EncodingKey {
        match kind {
            TokenKind::Access => &self.access.encoding,
            TokenKind::Refresh => &self.refresh.encoding,
        }
    }

    pub fn decoding_key(&self, kind: TokenKind) -> &DecodingKey {
        match kind {
            TokenKind::Access => &self.access.decoding,
            TokenKind::Refresh => &self.refresh.decoding,
        }
    }

    pub fn cipher(&self) -> &PayloadCipher {
        &self.cipher
    }
}
