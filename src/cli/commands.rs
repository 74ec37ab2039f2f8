//! CLI command implementations
//!
//! Each invocation loads the config, opens the store and runs exactly one
//! core operation. The result is printed as a single JSON object.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use chrono::Duration;
use serde_json::{json, Value};

use crate::auth::SessionManager;
use crate::config::Config;
use crate::content::censor;
use crate::observability::{Logger, MetricsRegistry};
use crate::store::{validate_body, DocumentStore, SortOrder};
use crate::webhook::{self, ApiKeyGuard, UpgradeEvent};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_stdin_json, write_error, write_response};

/// Everything a command needs, built once per invocation
pub struct Context {
    pub config: Config,
    pub sessions: SessionManager,
}

impl Context {
    /// Open the store and session manager; counts one hit.
    pub fn open(config: Config) -> CliResult<Self> {
        Logger::set_min_severity(config.log_level);
        let store = DocumentStore::open_with(
            &config.database_path,
            config.id_policy,
            Arc::new(MetricsRegistry::new()),
        )?;
        store.metrics().increment_hits();
        let sessions = SessionManager::with_secret(
            config.session_config()?,
            Arc::new(store),
            &config.jwt_secret,
        );
        Ok(Self { config, sessions })
    }

    fn store(&self) -> &DocumentStore {
        self.sessions.store()
    }
}

/// Main CLI entry point
///
/// Prints the outcome on stdout and returns the error, if any, so the
/// process can exit non-zero.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    let outcome = Config::load(&cli.config)
        .map_err(CliError::from)
        .and_then(|config| run_command(config, cli.command));

    match outcome {
        Ok(data) => write_response(data),
        Err(e) => {
            if e.is_internal() {
                Logger::error("COMMAND_FAILED", &[("error", e.to_string().as_str())]);
            }
            write_error(e.code(), &e.public_message())?;
            Err(e)
        }
    }
}

/// Run a command and return its JSON payload
pub fn run_command(config: Config, cmd: Command) -> CliResult<Value> {
    // Reset must not create the file it is about to remove
    let open = || Context::open(config.clone());

    match cmd {
        Command::Reset => reset(&config.database_path),
        Command::Init => Ok(json!({ "path": open()?.store().path() })),
        Command::Register { email, password } => register(&open()?, &email, &password),
        Command::Login {
            email,
            password,
            expires_in_seconds,
        } => login(&open()?, &email, &password, expires_in_seconds),
        Command::Refresh { token } => refresh(&open()?, &token),
        Command::Revoke { token } => revoke(&open()?, &token),
        Command::Whoami { authorization } => whoami(&open()?, &authorization),
        Command::UpdateUser {
            authorization,
            email,
            password,
        } => update_user(&open()?, &authorization, &email, &password),
        Command::Post {
            authorization,
            body,
        } => create_post(&open()?, &authorization, &body),
        Command::GetPost { id } => Ok(serde_json::to_value(open()?.store().get_post(id)?)?),
        Command::ListPosts { author_id, sort } => Ok(serde_json::to_value(
            open()?
                .store()
                .list_posts(author_id, SortOrder::from_token(&sort))?,
        )?),
        Command::DeletePost { authorization, id } => delete_post(&open()?, &authorization, id),
        Command::Webhook {
            authorization,
            payload,
        } => apply_webhook(&open()?, &authorization, payload),
        Command::Metrics { reset } => metrics(&open()?, reset),
    }
}

/// Remove the snapshot file; a missing file is not an error
pub fn reset(path: &Path) -> CliResult<Value> {
    let removed = match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => return Err(e.into()),
    };
    Logger::warn(
        "SNAPSHOT_RESET",
        &[("path", path.display().to_string().as_str())],
    );
    Ok(json!({ "path": path, "removed": removed }))
}

fn register(ctx: &Context, email: &str, password: &str) -> CliResult<Value> {
    let account = ctx.sessions.register(email, password)?;
    Ok(serde_json::to_value(account.public_view())?)
}

fn login(
    ctx: &Context,
    email: &str,
    password: &str,
    expires_in_seconds: Option<i64>,
) -> CliResult<Value> {
    // Out-of-range requests fall back to the configured maximum
    let requested = expires_in_seconds.and_then(Duration::try_seconds);
    let grant = ctx.sessions.login(email, password, requested)?;
    let view = grant.account.public_view();
    Ok(json!({
        "id": view.id,
        "email": view.email,
        "upgraded": view.upgraded,
        "token": grant.access_token.token,
        "expires_at": grant.access_token.expires_at,
        "refresh_token": grant.refresh_token,
        "refresh_expires_at": grant.refresh_expires_at,
    }))
}

fn refresh(ctx: &Context, token: &str) -> CliResult<Value> {
    Ok(serde_json::to_value(ctx.sessions.refresh(token)?)?)
}

fn revoke(ctx: &Context, token: &str) -> CliResult<Value> {
    ctx.sessions.revoke(token)?;
    Ok(json!({ "revoked": true }))
}

fn whoami(ctx: &Context, authorization: &str) -> CliResult<Value> {
    let account_id = ctx.sessions.authenticate(authorization)?;
    let account = ctx.store().get_account_by_id(account_id)?;
    let state = ctx.sessions.session_state(account_id)?;
    Ok(json!({
        "account": account.public_view(),
        "session": state,
    }))
}

fn update_user(
    ctx: &Context,
    authorization: &str,
    email: &str,
    password: &str,
) -> CliResult<Value> {
    let account_id = ctx.sessions.authenticate(authorization)?;
    let account = ctx.sessions.update_credentials(account_id, email, password)?;
    Ok(serde_json::to_value(account.public_view())?)
}

fn create_post(ctx: &Context, authorization: &str, body: &str) -> CliResult<Value> {
    let author_id = ctx.sessions.authenticate(authorization)?;
    // Length is judged on what the author wrote, before masking
    validate_body(body)?;
    let post = ctx.store().insert_post(&censor(body), author_id)?;
    Ok(serde_json::to_value(post)?)
}

fn delete_post(ctx: &Context, authorization: &str, id: u64) -> CliResult<Value> {
    let requester_id = ctx.sessions.authenticate(authorization)?;
    ctx.store().delete_post(id, requester_id)?;
    Ok(json!({ "deleted": id }))
}

fn apply_webhook(
    ctx: &Context,
    authorization: &str,
    payload: Option<String>,
) -> CliResult<Value> {
    ApiKeyGuard::new(ctx.config.webhook_api_key.as_str()).check(authorization)?;

    let event: UpgradeEvent = match payload {
        Some(raw) => serde_json::from_str(&raw)?,
        None => serde_json::from_value(read_stdin_json()?)?,
    };
    let outcome = webhook::apply(ctx.store(), &event)?;
    Ok(json!({ "outcome": outcome }))
}

/// Counters of this invocation, read before an optional reset
fn metrics(ctx: &Context, reset: bool) -> CliResult<Value> {
    let registry = ctx.store().metrics();
    let snapshot = registry.snapshot();
    if reset {
        registry.reset();
        Logger::info("METRICS_RESET", &[("hits", snapshot.hits.to_string().as_str())]);
    }
    Ok(json!({ "metrics": snapshot, "reset": reset }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::MetricsSnapshot;
    use chrono::{DateTime, Utc};
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> Config {
        Config {
            database_path: dir.path().join("database.json"),
            jwt_secret: "cli-test-secret".to_string(),
            webhook_api_key: "hook-key".to_string(),
            ..Config::default()
        }
    }

    fn run(dir: &TempDir, cmd: Command) -> CliResult<Value> {
        run_command(config(dir), cmd)
    }

    fn login_token(dir: &TempDir) -> String {
        run(
            dir,
            Command::Register {
                email: "a@example.com".to_string(),
                password: "pw".to_string(),
            },
        )
        .unwrap();
        let out = run(
            dir,
            Command::Login {
                email: "a@example.com".to_string(),
                password: "pw".to_string(),
                expires_in_seconds: None,
            },
        )
        .unwrap();
        format!("Bearer {}", out["token"].as_str().unwrap())
    }

    #[test]
    fn test_init_then_reset() {
        let dir = TempDir::new().unwrap();
        run(&dir, Command::Init).unwrap();
        assert!(dir.path().join("database.json").exists());

        let out = run(&dir, Command::Reset).unwrap();
        assert_eq!(out["removed"], true);
        assert!(!dir.path().join("database.json").exists());

        let out = run(&dir, Command::Reset).unwrap();
        assert_eq!(out["removed"], false);
    }

    #[test]
    fn test_post_is_censored_and_owned() {
        let dir = TempDir::new().unwrap();
        let auth = login_token(&dir);

        let post = run(
            &dir,
            Command::Post {
                authorization: auth.clone(),
                body: "what a kerfuffle".to_string(),
            },
        )
        .unwrap();
        assert_eq!(post["body"], "what a ****");
        assert_eq!(post["author_id"], 1);

        let out = run(
            &dir,
            Command::DeletePost {
                authorization: auth,
                id: 1,
            },
        )
        .unwrap();
        assert_eq!(out["deleted"], 1);
    }

    #[test]
    fn test_login_output_hides_hash() {
        let dir = TempDir::new().unwrap();
        let auth = login_token(&dir);
        let out = run(&dir, Command::Whoami { authorization: auth }).unwrap();

        assert_eq!(out["account"]["email"], "a@example.com");
        assert_eq!(out["session"], "active");
        assert!(!out.to_string().contains("argon2"));
    }

    #[test]
    fn test_webhook_upgrades_account() {
        let dir = TempDir::new().unwrap();
        let auth = login_token(&dir);

        let out = run(
            &dir,
            Command::Webhook {
                authorization: "ApiKey hook-key".to_string(),
                payload: Some(r#"{"event":"user.upgraded","data":{"user_id":1}}"#.to_string()),
            },
        )
        .unwrap();
        assert_eq!(out["outcome"], "upgraded");

        let me = run(&dir, Command::Whoami { authorization: auth }).unwrap();
        assert_eq!(me["account"]["upgraded"], true);

        let err = run(
            &dir,
            Command::Webhook {
                authorization: "ApiKey nope".to_string(),
                payload: Some(r#"{"event":"user.upgraded","data":{"user_id":1}}"#.to_string()),
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "UNAUTHENTICATED");
    }

    #[test]
    fn test_oversized_ttl_request_gets_max() {
        let dir = TempDir::new().unwrap();
        login_token(&dir);

        let out = run(
            &dir,
            Command::Login {
                email: "a@example.com".to_string(),
                password: "pw".to_string(),
                expires_in_seconds: Some(i64::MAX),
            },
        )
        .unwrap();

        let expires_at: DateTime<Utc> = serde_json::from_value(out["expires_at"].clone()).unwrap();
        assert!(expires_at <= Utc::now() + Duration::hours(1));
        assert!(expires_at > Utc::now() + Duration::minutes(59));
    }

    #[test]
    fn test_huge_refresh_ttl_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            refresh_token_ttl_days: 1_000_000_000,
            ..config(&dir)
        };

        let err = run_command(config, Command::Init).unwrap_err();
        assert_eq!(err.code(), "CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_metrics_read_then_reset() {
        let dir = TempDir::new().unwrap();

        let out = run(&dir, Command::Metrics { reset: false }).unwrap();
        assert_eq!(out["metrics"]["hits"], 1);
        assert_eq!(out["reset"], false);

        let ctx = Context::open(config(&dir)).unwrap();
        ctx.store().insert_post("hello", 1).unwrap();
        let out = metrics(&ctx, true).unwrap();
        assert_eq!(out["metrics"]["posts_created"], 1);
        assert_eq!(out["reset"], true);
        assert_eq!(ctx.store().metrics().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_raw_length_checked_before_censoring() {
        let dir = TempDir::new().unwrap();
        let auth = login_token(&dir);
        // 15 * 10 = 150 characters raw, 90 once masked
        let body = "kerfuffle ".repeat(15);

        let err = run(
            &dir,
            Command::Post {
                authorization: auth,
                body,
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "BODY_TOO_LONG");
    }
}
