//! CLI module for chirpstore
//!
//! A thin front end over the store and session manager: account
//! registration and login, token refresh/revoke, post CRUD and webhook
//! events, one operation per invocation.

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{reset, run, run_command, Context};
pub use errors::{CliError, CliResult};
pub use io::{read_stdin_json, write_error, write_response};
