//! Payment-provider webhook: API-key check and account upgrade events.
//!
//! This path is parallel to the session manager. It authenticates with a
//! static `ApiKey <key>` header rather than a bearer token.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::crypto::constant_time_str_eq;
use crate::observability::Logger;
use crate::store::{AccountId, AccountPatch, DocumentStore, StoreError};

/// Event name that upgrades an account
pub const UPGRADE_EVENT: &str = "user.upgraded";

/// Result type for webhook handling
pub type WebhookResult<T> = Result<T, WebhookError>;

#[derive(Debug, Error)]
pub enum WebhookError {
    /// Missing or wrong API key
    #[error("Authentication required")]
    Unauthenticated,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WebhookError {
    pub fn code(&self) -> &'static str {
        match self {
            WebhookError::Unauthenticated => "UNAUTHENTICATED",
            WebhookError::Store(e) => e.code(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            WebhookError::Unauthenticated => 401,
            WebhookError::Store(e) => e.status_code(),
        }
    }
}

/// Incoming webhook body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeEvent {
    pub event: String,
    pub data: UpgradeData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeData {
    pub user_id: AccountId,
}

/// What happened to an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Upgraded,
    Ignored,
}

/// Checks `Authorization: ApiKey <key>` against the configured key
#[derive(Debug, Clone)]
pub struct ApiKeyGuard {
    key: String,
}

impl ApiKeyGuard {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn check(&self, header: &str) -> WebhookResult<()> {
        // An unconfigured key rejects everything
        if self.key.is_empty() {
            return Err(WebhookError::Unauthenticated);
        }
        let presented = header
            .trim()
            .strip_prefix("ApiKey ")
            .map(str::trim)
            .ok_or(WebhookError::Unauthenticated)?;

        if constant_time_str_eq(presented, &self.key) {
            Ok(())
        } else {
            Logger::warn("WEBHOOK_REJECTED", &[("reason", "api_key_mismatch")]);
            Err(WebhookError::Unauthenticated)
        }
    }
}

/// Apply an event to the store.
///
/// Only `user.upgraded` changes anything; other events are acknowledged and
/// ignored.
pub fn apply(store: &DocumentStore, event: &UpgradeEvent) -> WebhookResult<WebhookOutcome> {
    if event.event != UPGRADE_EVENT {
        Logger::info("WEBHOOK_IGNORED", &[("event", event.event.as_str())]);
        return Ok(WebhookOutcome::Ignored);
    }

    store.update_account(event.data.user_id, AccountPatch::new().upgraded(true))?;
    Logger::info(
        "ACCOUNT_UPGRADED",
        &[("account_id", event.data.user_id.to_string().as_str())],
    );
    Ok(WebhookOutcome::Upgraded)
}
