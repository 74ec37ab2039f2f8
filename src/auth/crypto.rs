//! # Cryptographic Utilities
//!
//! Password hashing and opaque token generation.
//!
//! Passwords are only ever stored as Argon2id hashes, refresh tokens only as
//! SHA-256 digests, and secrets are compared in constant time.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::errors::{AuthError, AuthResult};

/// One-way password hashing
pub trait CredentialHasher: Send + Sync {
    /// Hash a plaintext password
    fn hash(&self, password: &str) -> AuthResult<String>;

    /// Check a plaintext password against a stored hash.
    ///
    /// A mismatch is `Ok(false)`, not an error.
    fn verify(&self, password: &str, hash: &str) -> AuthResult<bool>;
}

/// Argon2id with the crate's default parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

impl Argon2Hasher {
    pub fn new() -> Self {
        Self
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| AuthError::HashingFailed)
    }

    /// Uses constant-time comparison internally (via argon2 crate).
    fn verify(&self, password: &str, hash: &str) -> AuthResult<bool> {
        // A stored value that isn't a PHC string can never match
        let Ok(parsed) = PasswordHash::new(hash) else {
            return Ok(false);
        };
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

/// Generate a cryptographically secure random token
///
/// Returns a 256-bit (32-byte) random value as base64.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}

/// Digest of a token for storage
///
/// The raw token is only given to the client.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, digest)
}

/// Constant-time comparison of two strings
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_and_verify() {
        let hasher = Argon2Hasher::new();
        let hash = hasher.hash("secure_password_123").unwrap();

        assert_ne!(hash, "secure_password_123");
        assert!(hasher.verify("secure_password_123", &hash).unwrap());
        assert!(!hasher.verify("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_password_hash_is_salted() {
        let hasher = Argon2Hasher::new();
        let hash1 = hasher.hash("same_password").unwrap();
        let hash2 = hasher.hash("same_password").unwrap();

        assert_ne!(hash1, hash2);
        assert!(hasher.verify("same_password", &hash1).unwrap());
        assert!(hasher.verify("same_password", &hash2).unwrap());
    }

    #[test]
    fn test_garbage_hash_is_a_mismatch() {
        let hasher = Argon2Hasher::new();
        assert!(!hasher.verify("anything", "not-a-phc-string").unwrap());
    }

    #[test]
    fn test_token_generation() {
        let token1 = generate_token();
        let token2 = generate_token();

        assert_ne!(token1, token2);
        // base64 of 32 bytes without padding
        assert_eq!(token1.len(), 43);
    }

    #[test]
    fn test_token_hashing_is_stable() {
        let token = generate_token();
        let digest = hash_token(&token);

        assert_ne!(token, digest);
        assert_eq!(digest, hash_token(&token));
        assert_ne!(digest, hash_token(&generate_token()));
    }

    #[test]
    fn test_constant_time_comparison() {
        assert!(constant_time_str_eq("hello", "hello"));
        assert!(!constant_time_str_eq("hello", "world"));
        assert!(!constant_time_str_eq("hello", "hello!"));
    }
}
