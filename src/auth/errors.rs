//! # Auth Errors
//!
//! Error types for the authentication module.

use thiserror::Error;

use crate::store::StoreError;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication and session errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password (generic - don't leak which)
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Missing, malformed, expired, revoked or foreign token
    #[error("Authentication required")]
    Unauthenticated,

    /// Password hashing failed
    #[error("Internal error: password hashing failed")]
    HashingFailed,

    /// Token generation failed
    #[error("Internal error: token generation failed")]
    TokenGenerationFailed,

    /// Underlying store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::Unauthenticated => "UNAUTHENTICATED",
            AuthError::HashingFailed => "HASHING_ERROR",
            AuthError::TokenGenerationFailed => "TOKEN_GENERATION_FAILED",
            AuthError::Store(e) => e.code(),
        }
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::InvalidCredentials | AuthError::Unauthenticated => 401,
            AuthError::HashingFailed | AuthError::TokenGenerationFailed => 500,
            AuthError::Store(e) => e.status_code(),
        }
    }

    /// Returns whether this error should be logged at warn level
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(AuthError::InvalidCredentials.status_code(), 401);
        assert_eq!(AuthError::Unauthenticated.status_code(), 401);
        assert_eq!(AuthError::HashingFailed.status_code(), 500);
        assert_eq!(AuthError::Store(StoreError::LockPoisoned).status_code(), 500);
    }

    #[test]
    fn test_error_messages_do_not_leak_info() {
        let msg = AuthError::InvalidCredentials.to_string();
        assert!(!msg.contains("password"));
        assert!(!msg.contains("email"));
    }

    #[test]
    fn test_store_errors_keep_their_code() {
        let err = AuthError::from(StoreError::LockPoisoned);
        assert_eq!(err.code(), "STORAGE_LOCK_POISONED");
        assert!(!err.is_client_error());
    }
}
