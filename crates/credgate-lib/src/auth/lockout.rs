// ============================
// crates/credgate-lib/src/auth/lockout.rs
// ============================
//! Login lockout state machine.
//!
//! An account cycles between `Unlocked(failed_attempts)` and `LockedUntil(t)`
//! for its whole life. These functions apply one transition to an in-memory
//! record; the caller persists the result with a compare-and-set update.

use chrono::{DateTime, Utc};
use credgate_common::{Account, LockState};

use crate::config::PasswordPolicy;
use crate::error::AuthError;

/// Refuse the attempt if a lock is still running. A lapsed lock is cleared
/// (back to `Unlocked(0)`) so the password can be evaluated.
pub fn check_lock(account: &mut Account, now: DateTime<Utc>) -> Result<(), AuthError> {
    if let Some(seconds_remaining) = account.lock_state.seconds_remaining(now) {
        return Err(AuthError::AccountLocked { seconds_remaining });
    }
    if matches!(account.lock_state, LockState::LockedUntil(_)) {
        unlock(account);
    }
    Ok(())
}

/// Correct password: back to `Unlocked(0)`
pub fn record_success(account: &mut Account) {
    unlock(account);
}

/// Wrong password: count it, locking the account once the policy limit is
/// reached. Returns the error the caller should report.
pub fn record_failure(account: &mut Account, policy: &PasswordPolicy, now: DateTime<Utc>) -> AuthError {
    account.failed_login_attempts = account.failed_login_attempts.saturating_add(1);

    if account.failed_login_attempts >= policy.max_login_attempts {
        let duration = policy.lockout_duration();
        account.lock_state = LockState::LockedUntil(now + duration);
        AuthError::AccountLocked {
            seconds_remaining: duration.num_seconds().max(0) as u64,
        }
    } else {
        AuthError::InvalidCredentials {
            attempts_remaining: Some(policy.max_login_attempts - account.failed_login_attempts),
        }
    }
}

fn unlock(account: &mut Account) {
    account.lock_state = LockState::Unlocked;
    account.failed_login_attempts = 0;
}
