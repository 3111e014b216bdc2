//! bcrypt password hashes and the registration password policy.

use bcrypt::BcryptError;

/// Work factor for stored hashes.
pub const HASH_COST: u32 = 10;

pub fn hash_password(password: &str) -> Result<String, BcryptError> {
    bcrypt::hash(password, HASH_COST)
}

/// A stored value that is not a bcrypt hash never verifies.
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}

/// At least 8 characters with a lowercase letter, an uppercase letter and a digit.
pub fn meets_policy(password: &str) -> bool {
    password.chars().count() >= 8
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_matching_password() {
        let stored = hash_password("Secret123").unwrap();
        assert!(stored.starts_with("$2"));
        assert!(verify_password("Secret123", &stored));
        assert!(!verify_password("secret123", &stored));
    }

    #[test]
    fn salts_differ_per_hash() {
        assert_ne!(hash_password("Secret123").unwrap(), hash_password("Secret123").unwrap());
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("Secret123", "no-delimiter"));
        assert!(!verify_password("Secret123", "zz$abc"));
        assert!(!verify_password("Secret123", ""));
    }

    #[test]
    fn password_policy() {
        assert!(meets_policy("Secret123"));
        assert!(!meets_policy("short1A"));
        assert!(!meets_policy("alllowercase1"));
        assert!(!meets_policy("NoDigitsHere"));
    }
}
