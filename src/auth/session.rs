//! # Session Management
//!
//! Registration, login and the credential lifecycle on top of the
//! document store.
//!
//! Per account the session moves LoggedOut → Active on login, becomes
//! Expired once the refresh token outlives its expiry, and returns to
//! LoggedOut on revoke. Expiry is only checked lazily, at `refresh` and
//! `authenticate` time; nothing sweeps expired tokens.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::crypto::{generate_token, hash_token, Argon2Hasher, CredentialHasher};
use super::errors::{AuthError, AuthResult};
use super::jwt::{Claims, JwtCodec, TokenCodec};
use crate::observability::Logger;
use crate::store::{Account, AccountId, AccountPatch, DocumentStore};

/// Default issuer claim
pub const DEFAULT_ISSUER: &str = "chirpy";

/// Session manager configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Issuer written into and required from access tokens
    pub issuer: String,

    /// Upper bound (and default) for access token lifetime
    pub access_token_max_ttl: Duration,

    /// Refresh token lifetime
    pub refresh_token_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            access_token_max_ttl: Duration::hours(1),
            refresh_token_ttl: Duration::days(60),
        }
    }
}

/// Signed access token with its expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Everything handed back by a successful login
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub access_token: AccessToken,

    /// Raw refresh token; only its digest is stored
    pub refresh_token: String,

    pub refresh_expires_at: DateTime<Utc>,

    pub account: Account,
}

/// Session state of an account as seen from its stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    LoggedOut,
    Active,
    Expired,
}

impl SessionState {
    fn of(account: &Account, now: DateTime<Utc>) -> Self {
        if !account.has_refresh_token() {
            SessionState::LoggedOut
        } else if account.refresh_expires_at < now {
            SessionState::Expired
        } else {
            SessionState::Active
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value
pub fn bearer_token(header: &str) -> AuthResult<&str> {
    header
        .trim()
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::Unauthenticated)
}

/// Issues, verifies, rotates and revokes credentials
pub struct SessionManager<H = Argon2Hasher, C = JwtCodec> {
    config: SessionConfig,
    store: Arc<DocumentStore>,
    hasher: H,
    codec: C,
}

impl SessionManager<Argon2Hasher, JwtCodec> {
    /// Argon2id hashing and HS256 tokens keyed by `secret`
    pub fn with_secret(config: SessionConfig, store: Arc<DocumentStore>, secret: &str) -> Self {
        Self::new(config, store, Argon2Hasher::new(), JwtCodec::new(secret))
    }
}

impl<H: CredentialHasher, C: TokenCodec> SessionManager<H, C> {
    pub fn new(config: SessionConfig, store: Arc<DocumentStore>, hasher: H, codec: C) -> Self {
        Self {
            config,
            store,
            hasher,
            codec,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Create an account with a hashed password
    pub fn register(&self, email: &str, password: &str) -> AuthResult<Account> {
        let password_hash = self.hasher.hash(password)?;
        Ok(self.store.insert_account(email, &password_hash)?)
    }

    /// Verify credentials and start a session.
    ///
    /// The access token lives for `min(requested_ttl, max)`; an absent or
    /// non-positive request gets the maximum.
    pub fn login(
        &self,
        email: &str,
        password: &str,
        requested_ttl: Option<Duration>,
    ) -> AuthResult<LoginGrant> {
        let account = match self.store.get_account_by_email(email) {
            Ok(account) => account,
            Err(e) if e.is_not_found() => return Err(self.login_failed("unknown_email")),
            Err(e) => return Err(e.into()),
        };

        if !self.hasher.verify(password, &account.password_hash)? {
            return Err(self.login_failed("password_mismatch"));
        }

        let refresh_expires_at = Utc::now()
            .checked_add_signed(self.config.refresh_token_ttl)
            .ok_or(AuthError::TokenGenerationFailed)?;
        let access_token = self.issue_access_token(account.id, self.effective_ttl(requested_ttl))?;

        let refresh_token = generate_token();
        let account = self.store.update_account(
            account.id,
            AccountPatch::new().refresh_token(hash_token(&refresh_token), refresh_expires_at),
        )?;

        self.store.metrics().increment_logins();
        Logger::info(
            "LOGIN_SUCCEEDED",
            &[("account_id", account.id.to_string().as_str())],
        );

        Ok(LoginGrant {
            access_token,
            refresh_token,
            refresh_expires_at,
            account,
        })
    }

    /// Exchange a live refresh token for a new access token.
    ///
    /// The stored refresh token is left as it is.
    pub fn refresh(&self, refresh_token: &str) -> AuthResult<AccessToken> {
        let account = self.resolve_refresh_token(refresh_token)?;

        if account.refresh_expires_at < Utc::now() {
            return Err(self.auth_failed("refresh_token_expired"));
        }

        self.issue_access_token(account.id, self.config.access_token_max_ttl)
    }

    /// Invalidate a refresh token, expired or not
    pub fn revoke(&self, refresh_token: &str) -> AuthResult<()> {
        let account = self.resolve_refresh_token(refresh_token)?;

        self.store.update_account(
            account.id,
            AccountPatch::new().clear_refresh_token(Utc::now()),
        )?;

        Logger::info(
            "SESSION_REVOKED",
            &[("account_id", account.id.to_string().as_str())],
        );
        Ok(())
    }

    /// Resolve an `Authorization` header value to the caller's account id.
    ///
    /// Every failure, including a foreign issuer, is `Unauthenticated`.
    pub fn authenticate(&self, bearer_value: &str) -> AuthResult<AccountId> {
        self.verify_bearer(bearer_value)
            .map_err(|reason| self.auth_failed(reason))
    }

    fn verify_bearer(&self, bearer_value: &str) -> Result<AccountId, &'static str> {
        let token = bearer_token(bearer_value).map_err(|_| "missing_bearer_prefix")?;
        let claims = self.codec.verify(token).map_err(|_| "invalid_token")?;

        if claims.iss != self.config.issuer {
            return Err("issuer_mismatch");
        }

        match claims.sub.parse::<AccountId>() {
            Ok(id) if id > 0 => Ok(id),
            _ => Err("invalid_subject"),
        }
    }

    /// Change email and password.
    ///
    /// Existing refresh tokens stay valid.
    pub fn update_credentials(
        &self,
        account_id: AccountId,
        email: &str,
        password: &str,
    ) -> AuthResult<Account> {
        let password_hash = self.hasher.hash(password)?;
        Ok(self.store.update_account(
            account_id,
            AccountPatch::new().email(email).password_hash(password_hash),
        )?)
    }

    pub fn session_state(&self, account_id: AccountId) -> AuthResult<SessionState> {
        let account = self.store.get_account_by_id(account_id)?;
        Ok(SessionState::of(&account, Utc::now()))
    }

    fn effective_ttl(&self, requested: Option<Duration>) -> Duration {
        let max = self.config.access_token_max_ttl;
        match requested {
            Some(ttl) if ttl > Duration::zero() => ttl.min(max),
            _ => max,
        }
    }

    fn issue_access_token(&self, account_id: AccountId, ttl: Duration) -> AuthResult<AccessToken> {
        let claims = Claims::new(account_id, &self.config.issuer, Utc::now(), ttl)?;
        let token = self.codec.sign(&claims)?;
        let expires_at = claims.expires_at().ok_or(AuthError::TokenGenerationFailed)?;
        Ok(AccessToken { token, expires_at })
    }

    fn resolve_refresh_token(&self, refresh_token: &str) -> AuthResult<Account> {
        match self.store.get_account_by_refresh_token(&hash_token(refresh_token)) {
            Ok(account) => Ok(account),
            Err(e) if e.is_not_found() => Err(self.auth_failed("unknown_refresh_token")),
            Err(e) => Err(e.into()),
        }
    }

    fn login_failed(&self, reason: &str) -> AuthError {
        self.store.metrics().increment_login_failures();
        Logger::warn("LOGIN_FAILED", &[("reason", reason)]);
        AuthError::InvalidCredentials
    }

    fn auth_failed(&self, reason: &str) -> AuthError {
        self.store.metrics().increment_auth_failures();
        Logger::warn("AUTHENTICATION_FAILED", &[("reason", reason)]);
        AuthError::Unauthenticated
    }
}
