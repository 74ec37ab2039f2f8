//! chirpstore - posts and accounts in a file-backed snapshot store, with
//! password login and JWT sessions.

pub mod auth;
pub mod cli;
pub mod config;
pub mod content;
pub mod observability;
pub mod store;
pub mod webhook;
