// ==============
// crates/credgate-lib/src/metrics.rs

//! Central place for metric keys
pub const ACCOUNT_REGISTERED: &str = "account.registered";
pub const LOGIN_SUCCEEDED: &str = "login.succeeded";
pub const LOGIN_FAILED: &str = "login.failed";
pub const LOGIN_REFUSED_LOCKED: &str = "login.refused_locked";
pub const ACCOUNT_LOCKED: &str = "account.locked";
pub const PASSWORD_CHANGED: &str = "password.changed";
pub const RESET_ISSUED: &str = "reset.issued";
pub const RESET_CONSUMED: &str = "reset.consumed";
pub const RESET_REJECTED: &str = "reset.rejected";
pub const STORE_CONFLICT_RETRY: &str = "store.conflict_retry";
