//! Snapshot-replace document store.
//!
//! Every operation loads the whole snapshot, applies one change in memory
//! and rewrites the whole file. This costs O(dataset) per call and is only
//! meant for small record counts; a larger deployment needs an indexed or
//! log-structured store instead.
//!
//! A single reader/writer lock guards the file. Reads share it. `save` and
//! every mutating operation hold it exclusively across the full
//! load → mutate → save cycle, so two concurrent inserts cannot both
//! observe the same count.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use subtle::ConstantTimeEq;

use super::errors::{StoreError, StoreResult};
use super::record::{
    Account, AccountId, AccountPatch, IdPolicy, Post, PostId, Snapshot, SortOrder, MAX_BODY_CHARS,
};
use crate::observability::{Logger, MetricsRegistry};

const POSTS: &str = "post";
const ACCOUNTS: &str = "account";

/// File-backed store for posts and accounts
#[derive(Debug)]
pub struct DocumentStore {
    path: PathBuf,
    temp_path: PathBuf,
    policy: IdPolicy,
    lock: RwLock<()>,
    metrics: Arc<MetricsRegistry>,
}

impl DocumentStore {
    /// Open the store at `path`, creating an empty snapshot if absent.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with(path, IdPolicy::default(), Arc::new(MetricsRegistry::new()))
    }

    /// Open with an explicit id policy and a shared metrics registry.
    pub fn open_with(
        path: impl AsRef<Path>,
        policy: IdPolicy,
        metrics: Arc<MetricsRegistry>,
    ) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut temp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        temp_name.push(".tmp");
        let temp_path = path.with_file_name(temp_name);

        let store = Self {
            path,
            temp_path,
            policy,
            lock: RwLock::new(()),
            metrics,
        };
        store.ensure()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn id_policy(&self) -> IdPolicy {
        self.policy
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    // ==================
    // Snapshot I/O
    // ==================

    /// Guarantee the backing file exists. Idempotent.
    pub fn ensure(&self) -> StoreResult<()> {
        if self.file_exists()? {
            return Ok(());
        }

        let _guard = self.lock.write().map_err(|_| StoreError::LockPoisoned)?;
        // Another caller may have created it while we waited
        if self.file_exists()? {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::io("failed to create data directory", parent, e))?;
        }

        self.write_unlocked(&Snapshot::new())?;
        Logger::info(
            "SNAPSHOT_CREATED",
            &[("path", self.path.display().to_string().as_str())],
        );
        Ok(())
    }

    /// Read the whole snapshot under a shared lock.
    pub fn load(&self) -> StoreResult<Snapshot> {
        self.ensure()?;
        let _guard = self.lock.read().map_err(|_| StoreError::LockPoisoned)?;
        self.read_unlocked()
    }

    /// Overwrite the whole snapshot under an exclusive lock.
    pub fn save(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let _guard = self.lock.write().map_err(|_| StoreError::LockPoisoned)?;
        self.write_unlocked(snapshot)
    }

    fn file_exists(&self) -> StoreResult<bool> {
        match fs::metadata(&self.path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io("failed to stat snapshot", &self.path, e)),
        }
    }

    fn read_unlocked(&self) -> StoreResult<Snapshot> {
        let bytes = fs::read(&self.path)
            .map_err(|e| StoreError::io("failed to read snapshot", &self.path, e))?;
        let snapshot = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::format("failed to parse snapshot", &self.path, e))?;
        self.metrics.increment_snapshot_loads();
        Ok(snapshot)
    }

    /// Write to a sibling temp file, fsync, then rename over the target.
    ///
    /// A failure at any step leaves the previous snapshot untouched.
    fn write_unlocked(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let bytes = serde_json::to_vec(snapshot)
            .map_err(|e| StoreError::format("failed to serialize snapshot", &self.path, e))?;

        let result = self.replace_file(&bytes);
        match &result {
            Ok(()) => {
                self.metrics.increment_snapshot_writes();
                Logger::trace(
                    "SNAPSHOT_WRITTEN",
                    &[
                        ("bytes", bytes.len().to_string().as_str()),
                        ("path", self.path.display().to_string().as_str()),
                    ],
                );
            }
            Err(e) => {
                self.metrics.increment_write_failures();
                let _ = fs::remove_file(&self.temp_path);
                Logger::error("SNAPSHOT_WRITE_FAILED", &[("error", e.to_string().as_str())]);
            }
        }
        result
    }

    fn replace_file(&self, bytes: &[u8]) -> StoreResult<()> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options
            .open(&self.temp_path)
            .map_err(|e| StoreError::io("failed to create temp snapshot", &self.temp_path, e))?;
        file.write_all(bytes)
            .map_err(|e| StoreError::io("failed to write snapshot", &self.temp_path, e))?;
        file.sync_all()
            .map_err(|e| StoreError::io("failed to fsync snapshot", &self.temp_path, e))?;
        drop(file);

        fs::rename(&self.temp_path, &self.path)
            .map_err(|e| StoreError::io("failed to replace snapshot", &self.path, e))
    }

    /// Run `f` against a freshly loaded snapshot and persist the result.
    ///
    /// Nothing is written if `f` fails.
    fn mutate<T>(&self, f: impl FnOnce(&mut Snapshot) -> StoreResult<T>) -> StoreResult<T> {
        self.ensure()?;
        let _guard = self.lock.write().map_err(|_| StoreError::LockPoisoned)?;
        let mut snapshot = self.read_unlocked()?;
        let value = f(&mut snapshot)?;
        self.write_unlocked(&snapshot)?;
        Ok(value)
    }

    // ==================
    // Posts
    // ==================

    /// Insert a post and assign its id.
    pub fn insert_post(&self, body: &str, author_id: AccountId) -> StoreResult<Post> {
        validate_body(body)?;

        let policy = self.policy;
        let post = self.mutate(|snapshot| {
            let id = policy.next_id(
                snapshot.posts.keys(),
                snapshot.posts.len(),
                &mut snapshot.sequences.posts,
            );
            let post = Post {
                id,
                body: body.to_string(),
                author_id,
            };
            snapshot.posts.insert(id, post.clone());
            Ok(post)
        })?;

        self.metrics.increment_posts_created();
        Logger::info(
            "POST_CREATED",
            &[
                ("author_id", author_id.to_string().as_str()),
                ("post_id", post.id.to_string().as_str()),
            ],
        );
        Ok(post)
    }

    pub fn get_post(&self, id: PostId) -> StoreResult<Post> {
        self.load()?
            .posts
            .remove(&id)
            .ok_or_else(|| StoreError::not_found(POSTS, id))
    }

    /// All posts, optionally by one author, ordered by id.
    pub fn list_posts(
        &self,
        author_id: Option<AccountId>,
        order: SortOrder,
    ) -> StoreResult<Vec<Post>> {
        let snapshot = self.load()?;
        let mut posts: Vec<Post> = snapshot
            .posts
            .into_values()
            .filter(|p| author_id.map_or(true, |a| p.author_id == a))
            .collect();

        // BTreeMap yields ascending ids already
        if order == SortOrder::Desc {
            posts.reverse();
        }
        Ok(posts)
    }

    /// Delete a post owned by `requester_id`.
    pub fn delete_post(&self, id: PostId, requester_id: AccountId) -> StoreResult<()> {
        self.mutate(|snapshot| {
            let post = snapshot
                .posts
                .get(&id)
                .ok_or_else(|| StoreError::not_found(POSTS, id))?;
            if post.author_id != requester_id {
                return Err(StoreError::Forbidden {
                    collection: POSTS,
                    id,
                });
            }
            snapshot.posts.remove(&id);
            Ok(())
        })?;

        self.metrics.increment_posts_deleted();
        Logger::info(
            "POST_DELETED",
            &[
                ("post_id", id.to_string().as_str()),
                ("requester_id", requester_id.to_string().as_str()),
            ],
        );
        Ok(())
    }

    // ==================
    // Accounts
    // ==================

    /// Insert an account. Emails are unique.
    pub fn insert_account(&self, email: &str, password_hash: &str) -> StoreResult<Account> {
        let policy = self.policy;
        let account = self.mutate(|snapshot| {
            if snapshot.accounts.values().any(|a| a.email == email) {
                return Err(StoreError::Conflict {
                    collection: ACCOUNTS,
                    key: email.to_string(),
                });
            }
            let id = policy.next_id(
                snapshot.accounts.keys(),
                snapshot.accounts.len(),
                &mut snapshot.sequences.accounts,
            );
            let account = Account::new(id, email.to_string(), password_hash.to_string());
            snapshot.accounts.insert(id, account.clone());
            Ok(account)
        })?;

        Logger::info("ACCOUNT_CREATED", &[("account_id", account.id.to_string().as_str())]);
        Ok(account)
    }

    pub fn get_account_by_id(&self, id: AccountId) -> StoreResult<Account> {
        self.load()?
            .accounts
            .remove(&id)
            .ok_or_else(|| StoreError::not_found(ACCOUNTS, id))
    }

    /// Linear scan by email.
    pub fn get_account_by_email(&self, email: &str) -> StoreResult<Account> {
        self.load()?
            .accounts
            .into_values()
            .find(|a| a.email == email)
            .ok_or_else(|| StoreError::not_found(ACCOUNTS, "email"))
    }

    /// Linear scan by stored refresh token. An empty token never matches.
    pub fn get_account_by_refresh_token(&self, token: &str) -> StoreResult<Account> {
        if token.is_empty() {
            return Err(StoreError::not_found(ACCOUNTS, "refresh token"));
        }
        self.load()?
            .accounts
            .into_values()
            .find(|a| {
                a.has_refresh_token() && bool::from(a.refresh_token.as_bytes().ct_eq(token.as_bytes()))
            })
            .ok_or_else(|| StoreError::not_found(ACCOUNTS, "refresh token"))
    }

    /// Merge `patch` into the stored account and persist it.
    ///
    /// Changing the email to one held by another account is a `Conflict`.
    pub fn update_account(&self, id: AccountId, patch: AccountPatch) -> StoreResult<Account> {
        let account = self.mutate(|snapshot| {
            if !snapshot.accounts.contains_key(&id) {
                return Err(StoreError::not_found(ACCOUNTS, id));
            }
            if let Some(email) = &patch.email {
                if snapshot.accounts.values().any(|a| a.id != id && &a.email == email) {
                    return Err(StoreError::Conflict {
                        collection: ACCOUNTS,
                        key: email.clone(),
                    });
                }
            }
            let account = snapshot
                .accounts
                .get_mut(&id)
                .ok_or_else(|| StoreError::not_found(ACCOUNTS, id))?;
            patch.apply(account);
            Ok(account.clone())
        })?;

        Logger::info("ACCOUNT_UPDATED", &[("account_id", id.to_string().as_str())]);
        Ok(account)
    }
}

/// Reject bodies longer than [`MAX_BODY_CHARS`] characters
pub fn validate_body(body: &str) -> StoreResult<()> {
    let len = body.chars().count();
    if len > MAX_BODY_CHARS {
        return Err(StoreError::BodyTooLong {
            len,
            max: MAX_BODY_CHARS,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> DocumentStore {
        DocumentStore::open(dir.path().join("database.json")).unwrap()
    }

    #[test]
    fn test_open_creates_empty_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        assert!(store.path().exists());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::open(dir.path().join("nested/deeper/db.json")).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.insert_post("hello", 1).unwrap();

        store.ensure().unwrap();
        assert_eq!(store.load().unwrap().posts.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_snapshot_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_snapshot_is_format_error() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        fs::write(store.path(), b"{not json").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, StoreError::Format { .. }));
        assert_eq!(err.code(), "STORAGE_FORMAT_ERROR");
    }

    #[test]
    fn test_failed_mutation_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.insert_post("mine", 1).unwrap();
        let writes = store.metrics().snapshot().snapshot_writes;

        assert!(matches!(
            store.delete_post(1, 2),
            Err(StoreError::Forbidden { .. })
        ));
        assert_eq!(store.metrics().snapshot().snapshot_writes, writes);
        assert!(store.get_post(1).is_ok());
    }

    #[test]
    fn test_body_length_is_counted_in_chars() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let exact = "é".repeat(MAX_BODY_CHARS);
        assert!(store.insert_post(&exact, 1).is_ok());

        let over = "a".repeat(MAX_BODY_CHARS + 1);
        assert!(matches!(
            store.insert_post(&over, 1),
            Err(StoreError::BodyTooLong { len: 141, .. })
        ));
    }

    #[test]
    fn test_list_posts_filter_and_order() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.insert_post("a", 1).unwrap();
        store.insert_post("b", 2).unwrap();
        store.insert_post("c", 1).unwrap();

        let ids: Vec<_> = store
            .list_posts(None, SortOrder::Asc)
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let ids: Vec<_> = store
            .list_posts(Some(1), SortOrder::Desc)
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![3, 1]);

        assert!(store.list_posts(Some(9), SortOrder::Asc).unwrap().is_empty());
    }

    #[test]
    fn test_account_lookups() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let account = store.insert_account("a@example.com", "hash").unwrap();
        assert_eq!(account.id, 1);

        assert_eq!(store.get_account_by_id(1).unwrap(), account);
        assert_eq!(store.get_account_by_email("a@example.com").unwrap(), account);
        let err = store.get_account_by_email("b@example.com").unwrap_err();
        assert!(err.is_not_found());
        assert!(!err.to_string().contains("b@example.com"));
        assert!(store.get_account_by_id(2).unwrap_err().is_not_found());
    }

    #[test]
    fn test_duplicate_email_conflicts() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.insert_account("a@example.com", "hash").unwrap();

        assert!(matches!(
            store.insert_account("a@example.com", "other"),
            Err(StoreError::Conflict { .. })
        ));
    }

    #[test]
    fn test_empty_refresh_token_never_matches() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.insert_account("a@example.com", "hash").unwrap();

        assert!(store
            .get_account_by_refresh_token("")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_update_account_patch() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.insert_account("a@example.com", "hash").unwrap();

        let updated = store
            .update_account(1, AccountPatch::new().upgraded(true))
            .unwrap();
        assert!(updated.upgraded);
        assert_eq!(updated.password_hash, "hash");
        assert_eq!(store.get_account_by_id(1).unwrap(), updated);

        assert!(store
            .update_account(7, AccountPatch::new().upgraded(true))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_monotonic_policy_never_reuses_ids() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::open_with(
            dir.path().join("db.json"),
            IdPolicy::Monotonic,
            Arc::new(MetricsRegistry::new()),
        )
        .unwrap();

        for body in ["one", "two", "three"] {
            store.insert_post(body, 1).unwrap();
        }
        store.delete_post(3, 1).unwrap();
        let post = store.insert_post("four", 1).unwrap();
        assert_eq!(post.id, 4);
    }
}
