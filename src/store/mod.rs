//! Document store for posts and accounts.
//!
//! The whole dataset lives in a single JSON snapshot file that is loaded
//! and rewritten as one unit by every operation.
//!
//! # Design Principles
//!
//! - Full-snapshot load/write, no incremental format
//! - Shared lock for reads, exclusive lock for each read-modify-write
//! - Write to temp file, fsync, rename
//! - Typed failures; nothing is persisted when an operation fails

mod document_store;
mod errors;
mod record;

pub use document_store::{validate_body, DocumentStore};
pub use errors::{StoreError, StoreResult};
pub use record::{
    Account, AccountId, AccountPatch, AccountView, IdPolicy, Post, PostId, RefreshGrant,
    Sequences, Snapshot, SortOrder, MAX_BODY_CHARS,
};
