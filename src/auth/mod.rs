//! # Auth Module
//!
//! Password hashing, signed access tokens and the session lifecycle built
//! on the document store.

pub mod crypto;
pub mod errors;
pub mod jwt;
pub mod session;

pub use crypto::{Argon2Hasher, CredentialHasher};
pub use errors::{AuthError, AuthResult};
pub use jwt::{Claims, JwtCodec, TokenCodec};
pub use session::{
    bearer_token, AccessToken, LoginGrant, SessionConfig, SessionManager, SessionState,
    DEFAULT_ISSUER,
};
