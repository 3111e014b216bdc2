//! Token lifecycle core: envelope cipher, issuer, verifier.

pub mod cipher;
pub mod claims;
pub mod error;
pub mod issuer;
pub mod keys;
pub mod principal;
pub mod verifier;

pub use cipher::PayloadCipher;
pub use claims::{Claims, IdentityClaim, TokenKind, TokenLifetimes};
pub use error::{AuthError, CipherError, IssueError, KeyError};
pub use issuer::{TokenIssuer, TokenPair};
pub use keys::AuthKeys;
pub use principal::{Account, Principal, PrincipalKind, PrincipalView};
pub use verifier::{TokenVerifier, VerificationStage};
