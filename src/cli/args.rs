//! CLI argument definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// chirpstore - posts and accounts in a single JSON snapshot
#[derive(Parser, Debug)]
#[command(name = "chirpstore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./chirpstore.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the snapshot file if it does not exist
    Init,

    /// Delete the snapshot file
    Reset,

    /// Register a new account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Log in and print an access/refresh token pair
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Requested access token lifetime, capped by the configured maximum
        #[arg(long)]
        expires_in_seconds: Option<i64>,
    },

    /// Exchange a refresh token for a new access token
    Refresh {
        #[arg(long)]
        token: String,
    },

    /// Revoke a refresh token
    Revoke {
        #[arg(long)]
        token: String,
    },

    /// Resolve an access token to its account
    Whoami {
        /// Full header value: "Bearer <token>"
        #[arg(long)]
        authorization: String,
    },

    /// Change the caller's email and password
    UpdateUser {
        #[arg(long)]
        authorization: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Publish a post as the caller
    Post {
        #[arg(long)]
        authorization: String,
        #[arg(long)]
        body: String,
    },

    /// Show one post
    GetPost { id: u64 },

    /// List posts ordered by id
    ListPosts {
        #[arg(long)]
        author_id: Option<u64>,
        /// "asc" or "desc"; anything else means asc
        #[arg(long, default_value = "asc")]
        sort: String,
    },

    /// Delete one of the caller's posts
    DeletePost {
        #[arg(long)]
        authorization: String,
        id: u64,
    },

    /// Apply a payment webhook event (JSON from --payload or stdin)
    Webhook {
        /// Full header value: "ApiKey <key>"
        #[arg(long)]
        authorization: String,
        #[arg(long)]
        payload: Option<String>,
    },

    /// Print operational counters for this invocation
    Metrics {
        /// Zero the counters after reading them
        #[arg(long)]
        reset: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
