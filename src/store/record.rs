//! Record types persisted in the snapshot file.
//!
//! The snapshot is the unit of durability: it is read whole and rewritten
//! whole by every store operation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a post
pub type PostId = u64;

/// Identifier of an account
pub type AccountId = u64;

/// Maximum post body length in characters
pub const MAX_BODY_CHARS: usize = 140;

/// A short text post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub body: String,
    pub author_id: AccountId,
}

/// A user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,

    pub email: String,

    /// Argon2id PHC string
    pub password_hash: String,

    /// Digest of the current refresh token, empty when logged out
    #[serde(default)]
    pub refresh_token: String,

    #[serde(default)]
    pub refresh_expires_at: DateTime<Utc>,

    #[serde(default)]
    pub upgraded: bool,
}

impl Account {
    pub(crate) fn new(id: AccountId, email: String, password_hash: String) -> Self {
        Self {
            id,
            email,
            password_hash,
            refresh_token: String::new(),
            refresh_expires_at: DateTime::<Utc>::default(),
            upgraded: false,
        }
    }

    /// Whether a refresh token is stored, regardless of expiry
    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// Public view without credential material
    pub fn public_view(&self) -> AccountView {
        AccountView {
            id: self.id,
            email: self.email.clone(),
            upgraded: self.upgraded,
        }
    }
}

/// Account as shown to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    pub id: AccountId,
    pub email: String,
    pub upgraded: bool,
}

/// Field-level update for an account.
///
/// Only the fields that are set are merged into the stored record, so a
/// stale copy held by the caller can never clobber unrelated fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountPatch {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub refresh: Option<RefreshGrant>,
    pub upgraded: Option<bool>,
}

/// Refresh token digest with its expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshGrant {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccountPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    pub fn refresh_token(mut self, token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        self.refresh = Some(RefreshGrant {
            token: token.into(),
            expires_at,
        });
        self
    }

    /// Clear the refresh token, expiring it at `now`
    pub fn clear_refresh_token(self, now: DateTime<Utc>) -> Self {
        self.refresh_token(String::new(), now)
    }

    pub fn upgraded(mut self, upgraded: bool) -> Self {
        self.upgraded = Some(upgraded);
        self
    }

    /// Patch that overwrites every mutable field with `account`'s values
    pub fn replace_with(account: &Account) -> Self {
        Self::new()
            .email(account.email.clone())
            .password_hash(account.password_hash.clone())
            .refresh_token(account.refresh_token.clone(), account.refresh_expires_at)
            .upgraded(account.upgraded)
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password_hash.is_none()
            && self.refresh.is_none()
            && self.upgraded.is_none()
    }

    pub(crate) fn apply(self, account: &mut Account) {
        if let Some(email) = self.email {
            account.email = email;
        }
        if let Some(hash) = self.password_hash {
            account.password_hash = hash;
        }
        if let Some(grant) = self.refresh {
            account.refresh_token = grant.token;
            account.refresh_expires_at = grant.expires_at;
        }
        if let Some(upgraded) = self.upgraded {
            account.upgraded = upgraded;
        }
    }
}

/// High-water marks for the monotonic id policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequences {
    #[serde(default)]
    pub posts: u64,
    #[serde(default)]
    pub accounts: u64,
}

/// The full persisted dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub posts: BTreeMap<PostId, Post>,
    #[serde(default)]
    pub accounts: BTreeMap<AccountId, Account>,
    #[serde(default)]
    pub sequences: Sequences,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty() && self.accounts.is_empty()
    }
}

/// How new identifiers are assigned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdPolicy {
    /// `count + 1`; may collide with a live id after a deletion
    #[default]
    LiveCount,
    /// Persisted high-water mark; ids are never reused
    Monotonic,
}

impl IdPolicy {
    /// Next id for a collection holding `keys`, advancing `sequence`
    pub(crate) fn next_id<'a, I>(self, mut keys: I, len: usize, sequence: &mut u64) -> u64
    where
        I: DoubleEndedIterator<Item = &'a u64>,
    {
        let id = match self {
            IdPolicy::LiveCount => len as u64 + 1,
            IdPolicy::Monotonic => {
                let highest = keys.next_back().copied().unwrap_or(0);
                (*sequence).max(highest) + 1
            }
        };
        *sequence = (*sequence).max(id);
        id
    }
}

/// Ordering of listed posts by id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Parse a sort token; anything other than `desc` is ascending
    pub fn from_token(token: &str) -> Self {
        if token.eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }
}
