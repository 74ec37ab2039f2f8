//! CLI-specific error types

use std::io;

use thiserror::Error;

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::store::StoreError;
use crate::webhook::WebhookError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Error code string written to stdout
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Config(_) => "CLI_CONFIG_ERROR",
            CliError::Store(e) => e.code(),
            CliError::Auth(e) => e.code(),
            CliError::Webhook(e) => e.code(),
            CliError::Io(_) => "CLI_IO_ERROR",
            CliError::Json(_) => "CLI_INVALID_JSON",
        }
    }

    /// Failures that are not the caller's fault
    pub fn is_internal(&self) -> bool {
        match self {
            CliError::Store(e) => e.is_internal(),
            CliError::Auth(e) => !e.is_client_error(),
            CliError::Webhook(e) => e.status_code() >= 500,
            CliError::Config(_) | CliError::Io(_) => true,
            CliError::Json(_) => false,
        }
    }

    /// Message safe to show the caller.
    ///
    /// Internal store and auth failures are reported generically; the
    /// detail goes to the log.
    pub fn public_message(&self) -> String {
        match self {
            CliError::Store(_) | CliError::Auth(_) | CliError::Webhook(_) if self.is_internal() => {
                "Internal error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
