// ================
// common/src/lib.rs
// ================
//! Common types shared between the `credgate` core and its front ends.
//! This module defines the persisted account record and the secret-free
//! view of it that is safe to hand back to callers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, immutable account identifier
pub type AccountId = Uuid;

/// Key derivation function that produced a credential digest
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// Argon2id (memory-hard, the default)
    #[default]
    Argon2id,
    /// scrypt
    Scrypt,
}

/// A password digest together with the salt it was derived with
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Credential {
    /// KDF used to derive `hash`
    #[serde(default)]
    pub algorithm: HashAlgorithm,
    /// Base64 encoded digest
    pub hash: String,
    /// Base64 encoded salt
    pub salt: String,
    /// When this credential was set
    pub created_at: DateTime<Utc>,
}

// Digests and salts never end up in log lines.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("algorithm", &self.algorithm)
            .field("hash", &"<redacted>")
            .field("salt", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Lockout state of an account
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(tag = "state", content = "until")]
pub enum LockState {
    /// Login attempts are evaluated normally
    #[default]
    Unlocked,
    /// Login attempts are refused until the timestamp passes
    LockedUntil(DateTime<Utc>),
}

impl LockState {
    /// Seconds left on an active lock, `None` if unlocked or the lock has lapsed
    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> Option<u64> {
        match self {
            LockState::LockedUntil(until) if now < *until => {
                let millis = (*until - now).num_milliseconds().max(0) as u64;
                // Round up so a lock with 200ms left still reports 1 second.
                Some(millis.div_ceil(1000))
            }
            _ => None,
        }
    }
}

/// Outstanding password reset token. Only the hash of the raw token is kept.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ResetToken {
    /// Hex encoded SHA-256 of the raw token
    pub token_hash: String,
    /// Token is dead from this instant on
    pub expires_at: DateTime<Utc>,
}

impl ResetToken {
    /// Whether the token can still be used at `now`
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl fmt::Debug for ResetToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetToken")
            .field("token_hash", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Account record as persisted by an account store
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Generated at creation, never changes
    pub id: AccountId,
    /// Unique, case-sensitive
    pub username: String,
    /// Unique, case-sensitive
    pub email: String,
    /// Current password digest
    pub credential: Credential,
    /// Previous credentials, most recent first. Never holds `credential`.
    #[serde(default)]
    pub credential_history: Vec<Credential>,
    /// Consecutive failed logins since the last success or unlock
    #[serde(default)]
    pub failed_login_attempts: u32,
    /// Lockout state
    #[serde(default)]
    pub lock_state: LockState,
    /// At most one outstanding reset token
    #[serde(default)]
    pub reset_token: Option<ResetToken>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Bumped by the store on every successful update; used for compare-and-set
    #[serde(default)]
    pub version: u64,
}

impl Account {
    /// Create a fresh, unlocked account with no history
    pub fn new(username: String, email: String, credential: Credential, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            credential,
            credential_history: Vec::new(),
            failed_login_attempts: 0,
            lock_state: LockState::Unlocked,
            reset_token: None,
            created_at: now,
            version: 0,
        }
    }

    /// The reset token, treating an expired one as absent
    pub fn live_reset_token(&self, now: DateTime<Utc>) -> Option<&ResetToken> {
        self.reset_token.as_ref().filter(|t| t.is_live(now))
    }

    /// Secret-free view of the account
    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
        }
    }
}

/// Account without credential, lockout or token fields
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccountSummary {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}
