// ============================
// credgate-lib/src/storage/memory.rs
// ============================
//! Process-local account store.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use credgate_common::{Account, AccountId};
use dashmap::DashMap;
use parking_lot::Mutex;

use super::{AccountStore, StoreError, UniqueField};

/// Secondary unique indexes. Every write takes this lock, which makes the
/// uniqueness check and the insert one step.
#[derive(Debug, Default)]
struct Indexes {
    usernames: HashMap<String, AccountId>,
    emails: HashMap<String, AccountId>,
    reset_tokens: HashMap<String, AccountId>,
}

/// In-memory implementation of the `AccountStore` trait
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    accounts: Arc<DashMap<AccountId, Account>>,
    indexes: Arc<Mutex<Indexes>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(DashMap::new()),
            indexes: Arc::new(Mutex::new(Indexes::default())),
        }
    }

    /// Number of stored accounts
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the store holds no accounts
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn get_cloned(&self, id: Option<AccountId>) -> Option<Account> {
        id.and_then(|id| self.accounts.get(&id).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn insert(&self, mut account: Account) -> Result<Account, StoreError> {
        let mut indexes = self.indexes.lock();

        if indexes.usernames.contains_key(&account.username) {
            return Err(StoreError::Duplicate(UniqueField::Username));
        }
        if indexes.emails.contains_key(&account.email) {
            return Err(StoreError::Duplicate(UniqueField::Email));
        }

        account.version = 0;
        indexes.usernames.insert(account.username.clone(), account.id);
        indexes.emails.insert(account.email.clone(), account.id);
        if let Some(token) = &account.reset_token {
            indexes.reset_tokens.insert(token.token_hash.clone(), account.id);
        }
        self.accounts.insert(account.id, account.clone());

        Ok(account)
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.get_cloned(Some(id)))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let id = self.indexes.lock().usernames.get(username).copied();
        Ok(self.get_cloned(id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let id = self.indexes.lock().emails.get(email).copied();
        Ok(self.get_cloned(id))
    }

    async fn find_by_reset_token(&self, token_hash: &str) -> Result<Option<Account>, StoreError> {
        let id = self.indexes.lock().reset_tokens.get(token_hash).copied();
        Ok(self.get_cloned(id))
    }

    async fn update(&self, expected_version: u64, mut account: Account) -> Result<Account, StoreError> {
        let mut indexes = self.indexes.lock();
        let mut stored = self
            .accounts
            .get_mut(&account.id)
            .ok_or(StoreError::NotFound)?;

        if stored.version != expected_version {
            return Err(StoreError::Conflict);
        }

        if stored.username != account.username {
            if indexes.usernames.contains_key(&account.username) {
                return Err(StoreError::Duplicate(UniqueField::Username));
            }
            indexes.usernames.remove(&stored.username);
            indexes.usernames.insert(account.username.clone(), account.id);
        }
        if stored.email != account.email {
            if indexes.emails.contains_key(&account.email) {
                return Err(StoreError::Duplicate(UniqueField::Email));
            }
            indexes.emails.remove(&stored.email);
            indexes.emails.insert(account.email.clone(), account.id);
        }

        if let Some(old) = &stored.reset_token {
            indexes.reset_tokens.remove(&old.token_hash);
        }
        if let Some(new) = &account.reset_token {
            indexes.reset_tokens.insert(new.token_hash.clone(), account.id);
        }

        account.version = expected_version + 1;
        *stored = account.clone();
        Ok(account)
    }
}
