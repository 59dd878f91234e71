//! Folio Crypto Library
//!
//! Credential hashing (Argon2id) and session tokens (HS256 JWT).
//! Both are pure over their inputs plus the read-only signing secret, so a
//! single codec is shared by every request.

pub mod password;
pub mod token;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("password hashing failed")]
    HashingFailure,

    #[error("session token could not be signed")]
    SigningFailure,

    /// Deliberately carries no reason: callers must not tell a bad signature
    /// apart from an expired or malformed token.
    #[error("unauthorized")]
    AuthFailure,
}
