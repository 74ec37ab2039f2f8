//! # JWT Token Codec
//!
//! Signs and verifies access-token claims as HS256 JSON Web Tokens.
//!
//! The codec checks signature and expiry only. Deciding whether the issuer
//! and subject are acceptable is the session manager's job.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::errors::{AuthError, AuthResult};

/// Registered claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account ID)
    pub sub: String,

    /// Issuer
    pub iss: String,

    /// Issued at timestamp (Unix epoch seconds)
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds)
    pub exp: i64,
}

impl Claims {
    /// Claims for `subject` valid for `ttl` starting at `now`.
    ///
    /// Fails with `TokenGenerationFailed` if the expiry is not representable.
    pub fn new(
        subject: impl ToString,
        issuer: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> AuthResult<Self> {
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or(AuthError::TokenGenerationFailed)?;
        Ok(Self {
            sub: subject.to_string(),
            iss: issuer.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        })
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Compact signed-token primitive
pub trait TokenCodec: Send + Sync {
    /// Sign claims into an opaque string
    fn sign(&self, claims: &Claims) -> AuthResult<String>;

    /// Verify signature and expiry and return the claims.
    ///
    /// Every failure is `Unauthenticated`.
    fn verify(&self, token: &str) -> AuthResult<Claims>;
}

/// HS256 codec keyed by a shared secret
#[derive(Clone)]
pub struct JwtCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is compared against call time exactly
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

impl TokenCodec for JwtCodec {
    fn sign(&self, claims: &Claims) -> AuthResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|_| AuthError::TokenGenerationFailed)
    }

    fn verify(&self, token: &str) -> AuthResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::Unauthenticated)
    }
}
