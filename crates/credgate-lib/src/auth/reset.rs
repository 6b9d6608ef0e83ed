// ============================
// crates/credgate-lib/src/auth/reset.rs
// ============================
//! Reset token issuance and credential rotation on a single record.
use chrono::{DateTime, Utc};
use credgate_common::{Account, Credential, ResetToken};

use super::lockout;
use super::token_generator::{generate_secure_token, hash_token, token_hashes_match};
use crate::config::PasswordPolicy;

/// Put a fresh token on the account, replacing any earlier one, and return
/// the raw value. Only its hash stays on the record.
pub fn issue(account: &mut Account, policy: &PasswordPolicy, now: DateTime<Utc>) -> String {
    let raw = generate_secure_token();
    account.reset_token = Some(ResetToken {
        token_hash: hash_token(&raw),
        expires_at: now + policy.reset_token_ttl(),
    });
    raw
}

/// Whether the account holds a live token with this hash
pub fn token_matches(account: &Account, token_hash: &str, now: DateTime<Utc>) -> bool {
    account
        .live_reset_token(now)
        .is_some_and(|t| token_hashes_match(&t.token_hash, token_hash))
}

/// Credentials a new password must not match: the current one and up to
/// `history_size` previous ones
pub fn reuse_candidates(account: &Account, history_size: usize) -> Vec<Credential> {
    std::iter::once(account.credential.clone())
        .chain(account.credential_history.iter().take(history_size).cloned())
        .collect()
}

/// Install a new credential. The old one moves to the front of the bounded
/// history; any reset token is dropped and the account is unlocked.
pub fn rotate_credential(account: &mut Account, credential: Credential, history_size: usize) {
    let previous = std::mem::replace(&mut account.credential, credential);
    account.credential_history.insert(0, previous);
    account.credential_history.truncate(history_size);
    account.reset_token = None;
    lockout::record_success(account);
}
