// ============================
// credgate-lib/src/storage/flat_file.rs
// ============================
//! Flat-file account store: one JSON document per account plus create-new
//! index files for the unique columns.
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use credgate_common::{Account, AccountId};
use sha2::{Digest, Sha256};
use tokio::fs as tokio_fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use super::{AccountStore, StoreError, UniqueField};

const ACCOUNTS_DIR: &str = "accounts";
const USERNAME_INDEX: &str = "index/usernames";
const EMAIL_INDEX: &str = "index/emails";
const RESET_TOKEN_INDEX: &str = "index/reset-tokens";
const LOCKS_DIR: &str = "locks";

/// A record lock older than this was left behind by a crashed writer
const STALE_LOCK_AFTER: Duration = Duration::from_secs(30);
/// How long an update waits for another writer's record lock
const LOCK_WAIT: Duration = Duration::from_secs(5);
const LOCK_RETRY: Duration = Duration::from_millis(2);

/// Flat-file implementation of the `AccountStore` trait.
///
/// Uniqueness comes from the filesystem: an index file is created with
/// `create_new`, which succeeds for exactly one writer. `update` holds a
/// per-record lock file for the whole read-compare-replace, so the version
/// check is atomic across handles and processes sharing the directory.
#[derive(Debug, Clone)]
pub struct FlatFileStore {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FlatFileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        for dir in [ACCOUNTS_DIR, USERNAME_INDEX, EMAIL_INDEX, RESET_TOKEN_INDEX, LOCKS_DIR] {
            fs::create_dir_all(root.join(dir))?;
        }
        Ok(Self {
            root,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn account_path(&self, id: AccountId) -> PathBuf {
        self.root.join(ACCOUNTS_DIR).join(format!("{id}.json"))
    }

    // Index file names are a digest of the value: fixed length, filesystem safe,
    // and case-preserving even on case-insensitive filesystems.
    fn index_path(&self, index: &str, value: &str) -> PathBuf {
        let key = hex::encode(Sha256::digest(value.as_bytes()));
        self.root.join(index).join(key)
    }

    fn token_index_path(&self, token_hash: &str) -> PathBuf {
        self.index_path(RESET_TOKEN_INDEX, token_hash)
    }

    fn lock_path(&self, id: AccountId) -> PathBuf {
        self.root.join(LOCKS_DIR).join(format!("{id}.lock"))
    }

    /// Take the exclusive lock on one record, waiting up to `LOCK_WAIT`
    async fn lock_record(&self, id: AccountId) -> Result<RecordLock, StoreError> {
        let path = self.lock_path(id);
        let deadline = tokio::time::Instant::now() + LOCK_WAIT;
        loop {
            match tokio_fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(_) => return Ok(RecordLock { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if self.clear_stale_lock(&path).await? {
                        continue;
                    }
                    if tokio::time::Instant::now() >= deadline {
                        return Err(StoreError::Unavailable(
                            "timed out waiting for record lock".to_string(),
                        ));
                    }
                    tokio::time::sleep(LOCK_RETRY).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Remove a lock abandoned by a crashed writer. Returns true when the
    /// caller should retry at once.
    async fn clear_stale_lock(&self, path: &Path) -> Result<bool, StoreError> {
        let modified = match tokio_fs::metadata(path).await {
            Ok(meta) => meta.modified()?,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(e.into()),
        };
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        if age < STALE_LOCK_AFTER {
            return Ok(false);
        }
        warn!(path = %path.display(), age_secs = age.as_secs(), "removing stale record lock");
        self.release(path).await?;
        Ok(true)
    }

    /// Create an index entry, failing if it already exists
    async fn claim(&self, path: &Path, id: AccountId) -> Result<bool, StoreError> {
        match tokio_fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(mut file) => {
                file.write_all(id.to_string().as_bytes()).await?;
                file.flush().await?;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Point an index entry at an account, overwriting any previous owner
    async fn write_index(&self, path: &Path, id: AccountId) -> Result<(), StoreError> {
        tokio_fs::write(path, id.to_string()).await?;
        Ok(())
    }

    async fn release(&self, path: &Path) -> Result<(), StoreError> {
        match tokio_fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_index(&self, path: &Path) -> Result<Option<AccountId>, StoreError> {
        match tokio_fs::read_to_string(path).await {
            Ok(content) => match content.trim().parse::<AccountId>() {
                Ok(id) => Ok(Some(id)),
                Err(_) => {
                    warn!(path = %path.display(), "ignoring malformed index entry");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        match tokio_fs::read_to_string(self.account_path(id)).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the record to a temp file and rename it into place
    async fn write_account(&self, account: &Account) -> Result<(), StoreError> {
        let path = self.account_path(account.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(account)?;
        tokio_fs::write(&tmp, json).await?;
        tokio_fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn lookup(
        &self,
        index_path: PathBuf,
        matches: impl Fn(&Account) -> bool + Send,
    ) -> Result<Option<Account>, StoreError> {
        let Some(id) = self.read_index(&index_path).await? else {
            return Ok(None);
        };
        // An index entry can outlive its record if an insert was interrupted
        Ok(self.read_account(id).await?.filter(|a| matches(a)))
    }
}

#[async_trait]
impl AccountStore for FlatFileStore {
    async fn insert(&self, mut account: Account) -> Result<Account, StoreError> {
        let _guard = self.write_lock.lock().await;

        let username_path = self.index_path(USERNAME_INDEX, &account.username);
        if !self.claim(&username_path, account.id).await? {
            return Err(StoreError::Duplicate(UniqueField::Username));
        }

        let email_path = self.index_path(EMAIL_INDEX, &account.email);
        if !self.claim(&email_path, account.id).await? {
            self.release(&username_path).await?;
            return Err(StoreError::Duplicate(UniqueField::Email));
        }

        account.version = 0;
        let token_path = account
            .reset_token
            .as_ref()
            .map(|t| self.token_index_path(&t.token_hash));
        let mut committed = match &token_path {
            Some(path) => self.write_index(path, account.id).await,
            None => Ok(()),
        };
        if committed.is_ok() {
            committed = self.write_account(&account).await;
        }
        if let Err(e) = committed {
            self.release(&username_path).await?;
            self.release(&email_path).await?;
            if let Some(path) = &token_path {
                self.release(path).await?;
            }
            return Err(e);
        }

        Ok(account)
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.read_account(id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        self.lookup(self.index_path(USERNAME_INDEX, username), |a| a.username == username)
            .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        self.lookup(self.index_path(EMAIL_INDEX, email), |a| a.email == email)
            .await
    }

    async fn find_by_reset_token(&self, token_hash: &str) -> Result<Option<Account>, StoreError> {
        self.lookup(self.token_index_path(token_hash), |a| {
            a.reset_token
                .as_ref()
                .is_some_and(|t| t.token_hash == token_hash)
        })
        .await
    }

    async fn update(&self, expected_version: u64, mut account: Account) -> Result<Account, StoreError> {
        let _guard = self.write_lock.lock().await;
        let _record = self.lock_record(account.id).await?;

        let stored = self
            .read_account(account.id)
            .await?
            .ok_or(StoreError::NotFound)?;
        if stored.version != expected_version {
            return Err(StoreError::Conflict);
        }

        if stored.username != account.username {
            let path = self.index_path(USERNAME_INDEX, &account.username);
            if !self.claim(&path, account.id).await? {
                return Err(StoreError::Duplicate(UniqueField::Username));
            }
            self.release(&self.index_path(USERNAME_INDEX, &stored.username)).await?;
        }
        if stored.email != account.email {
            let path = self.index_path(EMAIL_INDEX, &account.email);
            if !self.claim(&path, account.id).await? {
                return Err(StoreError::Duplicate(UniqueField::Email));
            }
            self.release(&self.index_path(EMAIL_INDEX, &stored.email)).await?;
        }

        // The new token index goes in before the record commits; a leftover
        // index entry is filtered out by `lookup`, a missing one is not.
        let old_hash = stored.reset_token.as_ref().map(|t| t.token_hash.clone());
        let new_hash = account.reset_token.as_ref().map(|t| t.token_hash.clone());
        let token_changed = old_hash != new_hash;
        if token_changed {
            if let Some(new) = &new_hash {
                self.write_index(&self.token_index_path(new), account.id).await?;
            }
        }

        account.version = expected_version + 1;
        self.write_account(&account).await?;

        if let (true, Some(old)) = (token_changed, &old_hash) {
            if let Err(e) = self.release(&self.token_index_path(old)).await {
                warn!(account_id = %account.id, error = %e, "could not drop old reset token index");
            }
        }

        Ok(account)
    }
}

/// Exclusive hold on one account record, visible to every process using the
/// same data directory. Released on drop, including when the update future
/// is cancelled by a timeout.
#[derive(Debug)]
struct RecordLock {
    path: PathBuf,
}

impl Drop for RecordLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "could not release record lock");
            }
        }
    }
}
