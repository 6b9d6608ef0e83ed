use async_trait::async_trait;
use credgate_common::{AccountId, AccountSummary};

use crate::error::AuthResult;
use crate::validation::PasswordCheck;

/// Credential lifecycle operations consumed by a transport layer.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Create an account after checking the password against the policy
    async fn register(&self, username: &str, email: &str, password: &str) -> AuthResult<AccountSummary>;

    /// Evaluate a login attempt under the lockout policy
    async fn login(&self, username: &str, password: &str) -> AuthResult<AccountSummary>;

    /// Rotate the password of an account whose current password is known
    async fn change_password(&self, account_id: AccountId, current: &str, new: &str) -> AuthResult<()>;

    /// Issue a reset token and hand it to the out-of-band channel. Succeeds
    /// whether or not the email belongs to an account.
    async fn request_password_reset(&self, email: &str) -> AuthResult<()>;

    /// Whether a raw reset token is live. Does not consume it.
    async fn verify_reset_token(&self, token: &str) -> AuthResult<bool>;

    /// Consume a reset token and set a new password
    async fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<()>;

    /// Secret-free view of an account
    async fn account(&self, account_id: AccountId) -> AuthResult<Option<AccountSummary>>;

    /// Check a candidate password against the current policy
    fn check_password(&self, password: &str) -> PasswordCheck;
}
