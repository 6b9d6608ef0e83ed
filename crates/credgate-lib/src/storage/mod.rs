// ============================
// credgate-lib/src/storage/mod.rs
// ============================
//! Account storage abstraction.
//!
//! Stores own two guarantees the credential flows rely on: username and email
//! uniqueness is enforced by the store itself, and `update` is a whole-record
//! compare-and-set on `Account::version`, so concurrent read-modify-write
//! cycles on one account cannot silently overwrite each other.
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use credgate_common::{Account, AccountId};
use thiserror::Error;

mod flat_file;
mod memory;

pub use flat_file::FlatFileStore;
pub use memory::InMemoryStore;

/// Column covered by a uniqueness constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueField::Username => f.write_str("username"),
            UniqueField::Email => f.write_str("email"),
        }
    }
}

/// Storage layer errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("an account with this {0} already exists")]
    Duplicate(UniqueField),

    #[error("account was modified concurrently")]
    Conflict,

    #[error("account not found")]
    NotFound,

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Unavailable(format!("corrupt record: {err}"))
    }
}

/// Trait for account storage backends
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account. Fails with `Duplicate` if the username or email is taken;
    /// of two concurrent inserts with the same username at most one succeeds.
    async fn insert(&self, account: Account) -> Result<Account, StoreError>;

    /// Look up an account by id
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Look up an account by exact username
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError>;

    /// Look up an account by exact email
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    /// Look up the account holding a reset token with this hash
    async fn find_by_reset_token(&self, token_hash: &str) -> Result<Option<Account>, StoreError>;

    /// Replace the whole record if the stored version still equals
    /// `expected_version`. Returns the stored record with its new version,
    /// `Conflict` if another writer got there first.
    async fn update(&self, expected_version: u64, account: Account) -> Result<Account, StoreError>;
}

#[async_trait]
impl<T: AccountStore + ?Sized> AccountStore for Arc<T> {
    async fn insert(&self, account: Account) -> Result<Account, StoreError> {
        (**self).insert(account).await
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        (**self).find_by_id(id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        (**self).find_by_username(username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        (**self).find_by_email(email).await
    }

    async fn find_by_reset_token(&self, token_hash: &str) -> Result<Option<Account>, StoreError> {
        (**self).find_by_reset_token(token_hash).await
    }

    async fn update(&self, expected_version: u64, account: Account) -> Result<Account, StoreError> {
        (**self).update(expected_version, account).await
    }
}
