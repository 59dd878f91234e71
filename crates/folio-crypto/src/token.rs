use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{debug, error};

use folio_types::api::Claims;

use crate::CryptoError;

/// The only algorithm tokens are signed with or accepted under.
const ALGORITHM: Algorithm = Algorithm::HS256;

/// Issues and validates HS256 session tokens under one process-wide secret.
///
/// Keys are derived once at construction; after that the codec is read-only
/// and can be shared behind an `Arc` by every request.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, ttl: Duration) -> Result<Self, CryptoError> {
        if secret.is_empty() {
            error!("Token signing secret is empty");
            return Err(CryptoError::SigningFailure);
        }

        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a fresh claim set valid from now until now + TTL.
    pub fn issue(&self, user_id: i64, username: &str, email: &str) -> Result<String, CryptoError> {
        let now = Utc::now();
        let claims = Claims {
            user_id,
            username: username.to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(ALGORITHM), &claims, &self.encoding).map_err(|e| {
            error!("Failed to sign token for user {}: {}", user_id, e);
            CryptoError::SigningFailure
        })
    }

    /// Resolve a token to its claims. Every failure is the same `AuthFailure`.
    pub fn validate(&self, token: &str) -> Result<Claims, CryptoError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!("Token rejected: {}", e);
            CryptoError::AuthFailure
        })?;

        if data.header.alg != ALGORITHM {
            return Err(CryptoError::AuthFailure);
        }

        // The library accepts exp == now; a token is only valid strictly before exp.
        if Utc::now().timestamp() >= data.claims.exp {
            return Err(CryptoError::AuthFailure);
        }

        Ok(data.claims)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
