use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::{rngs::OsRng, RngCore};

use super::error::CipherError;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

pub const KEY_LENGTH: usize = 32;
pub const IV_LENGTH: usize = 16;
const BLOCK_SIZE: usize = 16;

/// AES-256-CBC envelope cipher for token claims.
///
/// Envelopes are rendered as `ivHex:cipherHex`. Every call to [`encrypt`]
/// draws a fresh IV from the operating system CSPRNG.
///
/// [`encrypt`]: PayloadCipher::encrypt
#[derive(Clone)]
pub struct PayloadCipher {
    key: [u8; KEY_LENGTH],
}

impl PayloadCipher {
    /// Derive the cipher key from a configured secret.
    ///
    /// The first 32 bytes of the secret become the key. Shorter secrets are
    /// rejected rather than padded.
    pub fn new(secret: &str) -> Result<Self, CipherError> {
        let bytes = secret.as_bytes();
        if bytes.len() < KEY_LENGTH {
            return Err(CipherError::KeyTooShort {
                required: KEY_LENGTH,
                actual: bytes.len(),
            });
        }

        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(&bytes[..KEY_LENGTH]);
        Ok(Self { key })
    }

    pub fn encrypt(&self, plaintext: &str) -> String {
        let mut iv = [0u8; IV_LENGTH];
        OsRng.fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        format!("{}:{}", hex::encode(iv), hex::encode(ciphertext))
    }

    pub fn decrypt(&self, envelope: &str) -> Result<String, CipherError> {
        let (iv_hex, cipher_hex) = envelope
            .split_once(':')
            .ok_or(CipherError::MissingDelimiter)?;

        let iv = hex::decode(iv_hex).map_err(|e| CipherError::InvalidHex(e.to_string()))?;
        if iv.len() != IV_LENGTH {
            return Err(CipherError::InvalidIvLength {
                expected: IV_LENGTH,
                actual: iv.len(),
            });
        }

        let ciphertext =
            hex::decode(cipher_hex).map_err(|e| CipherError::InvalidHex(e.to_string()))?;
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(CipherError::InvalidCiphertextLength(ciphertext.len()));
        }

        let plaintext = Aes256CbcDec::new_from_slices(&self.key, &iv)
            .map_err(|_| CipherError::Decrypt)?
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| CipherError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
    }
}

impl std::fmt::Debug for PayloadCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadCipher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef-extra-ignored";

    fn cipher() -> PayloadCipher {
        PayloadCipher::new(SECRET).unwrap()
    }

    #[test]
    fn decrypt_reverses_encrypt() {
        let cipher = cipher();
        let claim = r#"{"id":"5b0c1f7e-6f0b-4a53-9d38-0c1c2f7e9a10"}"#;
        let envelope = cipher.encrypt(claim);
        assert_eq!(cipher.decrypt(&envelope).unwrap(), claim);
    }

    #[test]
    fn each_encryption_uses_a_fresh_iv() {
        let cipher = cipher();
        let first = cipher.encrypt("same payload");
        let second = cipher.encrypt("same payload");
        assert_ne!(first, second);

        let iv_a = first.split_once(':').unwrap().0;
        let iv_b = second.split_once(':').unwrap().0;
        assert_ne!(iv_a, iv_b);
        assert_eq!(iv_a.len(), IV_LENGTH * 2);
    }

    #[test]
    fn key_is_truncated_to_32_bytes() {
        let long = PayloadCipher::new(SECRET).unwrap();
        let exact = PayloadCipher::new(&SECRET[..KEY_LENGTH]).unwrap();
        let envelope = long.encrypt("payload");
        assert_eq!(exact.decrypt(&envelope).unwrap(), "payload");
    }

    #[test]
    fn short_key_is_rejected() {
        let err = PayloadCipher::new("too-short").unwrap_err();
        assert_eq!(err, CipherError::KeyTooShort { required: 32, actual: 9 });
    }

    #[test]
    fn missing_delimiter_is_rejected() {
        assert_eq!(cipher().decrypt("deadbeef").unwrap_err(), CipherError::MissingDelimiter);
    }

    #[test]
    fn wrong_iv_length_is_rejected() {
        let err = cipher().decrypt("00ff:00112233445566778899aabbccddeeff").unwrap_err();
        assert_eq!(err, CipherError::InvalidIvLength { expected: 16, actual: 2 });
    }

    #[test]
    fn non_hex_segments_are_rejected() {
        let err = cipher().decrypt("zz:00").unwrap_err();
        assert!(matches!(err, CipherError::InvalidHex(_)));
    }

    #[test]
    fn partial_block_is_rejected() {
        let cipher = cipher();
        let envelope = cipher.encrypt("payload");
        let (iv, body) = envelope.split_once(':').unwrap();
        let truncated = format!("{}:{}", iv, &body[..body.len() - 2]);
        assert_eq!(
            cipher.decrypt(&truncated).unwrap_err(),
            CipherError::InvalidCiphertextLength(15)
        );
    }

    #[test]
    fn wrong_key_does_not_recover_plaintext() {
        let envelope = cipher().encrypt("payload");
        let other = PayloadCipher::new("ffffffffffffffffffffffffffffffff").unwrap();
        assert_ne!(other.decrypt(&envelope).ok(), Some("payload".to_string()));
    }
}
