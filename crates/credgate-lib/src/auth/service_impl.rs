use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use credgate_common::{Account, AccountId, AccountSummary, Credential, LockState};
use metrics::counter;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::token_generator::{generate_secure_token, hash_token};
use super::{lockout, reset, AuthService, CredentialHasher};
use crate::clock::{Clock, SystemClock};
use crate::config::{PasswordPolicy, Settings};
use crate::error::{AuthError, AuthResult};
use crate::metrics as keys;
use crate::notifier::ResetNotifier;
use crate::policy::{PolicyProvider, StaticPolicy};
use crate::storage::{AccountStore, StoreError};
use crate::validation::{
    validate_email, validate_password, validate_username, PasswordCheck, Violation,
};

/// Attempts at a read-evaluate-write cycle before giving up on a hot account
const MAX_UPDATE_RETRIES: usize = 8;
const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);
const DECOY_PASSWORD: &str = "credgate-decoy-credential";

/// Outcome of a password check, remembered per credential so a retried
/// update does not pay for the KDF twice
type VerifyCache = Option<(String, bool)>;

/// `AuthService` over any `AccountStore`.
///
/// Every state change is written with a compare-and-set on the record version;
/// on conflict the record is re-read and the transition re-applied, so two
/// concurrent failed logins always count as two.
pub struct DefaultAuth<S> {
    store: S,
    hasher: CredentialHasher,
    policy: Arc<dyn PolicyProvider>,
    notifier: Arc<dyn ResetNotifier>,
    clock: Arc<dyn Clock>,
    storage_timeout: Duration,
    decoy: OnceCell<Credential>,
}

impl<S: AccountStore> DefaultAuth<S> {
    pub fn new(
        store: S,
        hasher: CredentialHasher,
        policy: Arc<dyn PolicyProvider>,
        notifier: Arc<dyn ResetNotifier>,
    ) -> Self {
        Self {
            store,
            hasher,
            policy,
            notifier,
            clock: Arc::new(SystemClock),
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
            decoy: OnceCell::new(),
        }
    }

    /// Build from loaded settings with a fixed policy
    pub fn from_settings(
        store: S,
        settings: &Settings,
        notifier: Arc<dyn ResetNotifier>,
    ) -> AuthResult<Self> {
        let hasher = CredentialHasher::new(settings.hasher.clone())?;
        let policy = Arc::new(StaticPolicy(settings.policy.clone()));
        Ok(Self::new(store, hasher, policy, notifier).with_storage_timeout(settings.storage_timeout()))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_storage_timeout(mut self, timeout: Duration) -> Self {
        self.storage_timeout = timeout;
        self
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    async fn guarded<T: Send>(
        &self,
        op: impl Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.storage_timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable("storage operation timed out".to_string())),
        }
    }

    async fn reload(&self, account_id: AccountId) -> AuthResult<Option<Account>> {
        Ok(self.guarded(self.store.find_by_id(account_id)).await?)
    }

    /// Run KDF work off the async executor
    async fn blocking<T, F>(&self, f: F) -> AuthResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&CredentialHasher) -> AuthResult<T> + Send + 'static,
    {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || f(&hasher))
            .await
            .map_err(|e| AuthError::Internal(format!("hashing task failed: {e}")))?
    }

    async fn verify(&self, password: &Zeroizing<String>, credential: &Credential) -> AuthResult<bool> {
        let password = password.clone();
        let credential = credential.clone();
        self.blocking(move |h| h.verify(&password, &credential)).await
    }

    async fn verify_cached(
        &self,
        password: &Zeroizing<String>,
        account: &Account,
        cache: &mut VerifyCache,
    ) -> AuthResult<bool> {
        if let Some((hash, matched)) = cache {
            if *hash == account.credential.hash {
                return Ok(*matched);
            }
        }
        let matched = self.verify(password, &account.credential).await?;
        *cache = Some((account.credential.hash.clone(), matched));
        Ok(matched)
    }

    async fn new_credential(&self, password: &Zeroizing<String>) -> AuthResult<Credential> {
        let password = password.clone();
        let now = self.clock.now();
        self.blocking(move |h| h.new_credential(&password, now)).await
    }

    /// Unknown usernames pay for one verification too, so they take as long
    /// as a wrong password
    async fn spend_decoy_hash(&self, password: &Zeroizing<String>) -> AuthResult<()> {
        let decoy = self
            .decoy
            .get_or_try_init(|| async {
                self.new_credential(&Zeroizing::new(DECOY_PASSWORD.to_string()))
                    .await
            })
            .await?;
        self.verify(password, decoy).await.map(|_| ())
    }

    /// Unknown emails mint and hash a token and make a second store round
    /// trip, matching the work of a real issue
    async fn spend_decoy_issue(&self) -> AuthResult<()> {
        let raw = Zeroizing::new(generate_secure_token());
        let token_hash = hash_token(&raw);
        self.guarded(self.store.find_by_reset_token(&token_hash)).await?;
        Ok(())
    }

    /// Whether the password matches the current or a recent credential
    async fn recently_used(
        &self,
        password: &Zeroizing<String>,
        account: &Account,
        history_size: usize,
    ) -> AuthResult<bool> {
        let candidates = reset::reuse_candidates(account, history_size);
        let password = password.clone();
        self.blocking(move |h| {
            for candidate in &candidates {
                if h.verify(&password, candidate)? {
                    return Ok(true);
                }
            }
            Ok(false)
        })
        .await
    }

    /// Policy and history checks for a new password, reported together
    async fn vet_new_password(
        &self,
        password: &Zeroizing<String>,
        account: &Account,
        policy: &PasswordPolicy,
    ) -> AuthResult<()> {
        let mut violations = validate_password(password, policy).violations;
        let oversized = violations
            .iter()
            .any(|v| matches!(v, Violation::TooLong { .. }));

        if !oversized && self.recently_used(password, account, policy.history_size).await? {
            violations.push(Violation::RecentlyUsed {
                history_size: policy.history_size,
            });
        }

        if violations.is_empty() {
            Ok(())
        } else {
            debug!(account_id = %account.id, rules = violations.len(), "new password rejected");
            Err(AuthError::PasswordRejected(violations))
        }
    }

    fn finish_login(&self, stored: &Account, outcome: AuthResult<()>) -> AuthResult<AccountSummary> {
        match outcome {
            Ok(()) => {
                counter!(keys::LOGIN_SUCCEEDED).increment(1);
                info!(account_id = %stored.id, "login succeeded");
                Ok(stored.summary())
            }
            Err(err) => {
                counter!(keys::LOGIN_FAILED).increment(1);
                if matches!(err, AuthError::AccountLocked { .. }) {
                    counter!(keys::ACCOUNT_LOCKED).increment(1);
                    warn!(
                        account_id = %stored.id,
                        failed_attempts = stored.failed_login_attempts,
                        "account locked after repeated login failures"
                    );
                } else {
                    debug!(
                        account_id = %stored.id,
                        failed_attempts = stored.failed_login_attempts,
                        "login failed"
                    );
                }
                Err(err)
            }
        }
    }
}

fn contention() -> AuthError {
    AuthError::StorageUnavailable("too many concurrent updates to one account".to_string())
}

#[async_trait]
impl<S: AccountStore> AuthService for DefaultAuth<S> {
    async fn register(&self, username: &str, email: &str, password: &str) -> AuthResult<AccountSummary> {
        let policy = self.policy.current();
        let username = validate_username(username)?;
        let email = validate_email(email)?;
        validate_password(password, &policy).into_result()?;

        let password = Zeroizing::new(password.to_owned());
        let credential = self.new_credential(&password).await?;
        let account = Account::new(
            username.to_string(),
            email.to_string(),
            credential,
            self.clock.now(),
        );

        let stored = match self.guarded(self.store.insert(account)).await {
            Ok(stored) => stored,
            Err(StoreError::Duplicate(field)) => {
                debug!(%field, "registration rejected, already taken");
                return Err(AuthError::DuplicateAccount);
            }
            Err(e) => return Err(e.into()),
        };

        counter!(keys::ACCOUNT_REGISTERED).increment(1);
        info!(account_id = %stored.id, "account registered");
        Ok(stored.summary())
    }

    async fn login(&self, username: &str, password: &str) -> AuthResult<AccountSummary> {
        let policy = self.policy.current();
        let password = Zeroizing::new(password.to_owned());

        let Some(mut account) = self.guarded(self.store.find_by_username(username.trim())).await? else {
            self.spend_decoy_hash(&password).await?;
            counter!(keys::LOGIN_FAILED).increment(1);
            debug!("login attempt for unknown username");
            return Err(AuthError::InvalidCredentials { attempts_remaining: None });
        };

        let mut cache: VerifyCache = None;
        for _ in 0..MAX_UPDATE_RETRIES {
            let now = self.clock.now();
            let expected = account.version;
            let clean = account.failed_login_attempts == 0 && account.lock_state == LockState::Unlocked;

            if let Err(locked) = lockout::check_lock(&mut account, now) {
                counter!(keys::LOGIN_REFUSED_LOCKED).increment(1);
                debug!(account_id = %account.id, "login refused, account locked");
                return Err(locked);
            }

            let outcome = if self.verify_cached(&password, &account, &mut cache).await? {
                if clean {
                    // Nothing to reset, skip the write
                    return self.finish_login(&account, Ok(()));
                }
                lockout::record_success(&mut account);
                Ok(())
            } else {
                Err(lockout::record_failure(&mut account, &policy, now))
            };

            match self.guarded(self.store.update(expected, account.clone())).await {
                Ok(stored) => return self.finish_login(&stored, outcome),
                Err(StoreError::Conflict) => {
                    counter!(keys::STORE_CONFLICT_RETRY).increment(1);
                    account = self
                        .reload(account.id)
                        .await?
                        .ok_or(AuthError::InvalidCredentials { attempts_remaining: None })?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(contention())
    }

    async fn change_password(&self, account_id: AccountId, current: &str, new: &str) -> AuthResult<()> {
        let policy = self.policy.current();
        let current = Zeroizing::new(current.to_owned());
        let new = Zeroizing::new(new.to_owned());

        let mut account = self
            .reload(account_id)
            .await?
            .ok_or(AuthError::InvalidCredentials { attempts_remaining: None })?;

        let mut cache: VerifyCache = None;
        for _ in 0..MAX_UPDATE_RETRIES {
            let now = self.clock.now();
            let expected = account.version;
            lockout::check_lock(&mut account, now)?;

            let failure = if self.verify_cached(&current, &account, &mut cache).await? {
                self.vet_new_password(&new, &account, &policy).await?;
                let credential = self.new_credential(&new).await?;
                reset::rotate_credential(&mut account, credential, policy.history_size);
                None
            } else {
                Some(lockout::record_failure(&mut account, &policy, now))
            };

            match self.guarded(self.store.update(expected, account.clone())).await {
                Ok(stored) => {
                    return match failure {
                        None => {
                            counter!(keys::PASSWORD_CHANGED).increment(1);
                            info!(account_id = %stored.id, "password changed");
                            Ok(())
                        }
                        Some(err) => {
                            warn!(
                                account_id = %stored.id,
                                failed_attempts = stored.failed_login_attempts,
                                "password change with wrong current password"
                            );
                            Err(err)
                        }
                    };
                }
                Err(StoreError::Conflict) => {
                    counter!(keys::STORE_CONFLICT_RETRY).increment(1);
                    account = self
                        .reload(account_id)
                        .await?
                        .ok_or(AuthError::InvalidCredentials { attempts_remaining: None })?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(contention())
    }

    async fn request_password_reset(&self, email: &str) -> AuthResult<()> {
        let policy = self.policy.current();

        let Some(mut account) = self.guarded(self.store.find_by_email(email.trim())).await? else {
            self.spend_decoy_issue().await?;
            debug!("password reset requested for unknown email");
            return Ok(());
        };

        for _ in 0..MAX_UPDATE_RETRIES {
            let expected = account.version;
            let raw = Zeroizing::new(reset::issue(&mut account, &policy, self.clock.now()));

            match self.guarded(self.store.update(expected, account.clone())).await {
                Ok(stored) => {
                    self.notifier
                        .deliver(&stored.email, &raw)
                        .await
                        .map_err(|e| {
                            warn!(account_id = %stored.id, error = %e, "reset token delivery failed");
                            AuthError::Internal("could not deliver reset token".to_string())
                        })?;
                    counter!(keys::RESET_ISSUED).increment(1);
                    info!(
                        account_id = %stored.id,
                        expires_at = ?stored.reset_token.as_ref().map(|t| t.expires_at),
                        "password reset token issued"
                    );
                    return Ok(());
                }
                Err(StoreError::Conflict) => {
                    counter!(keys::STORE_CONFLICT_RETRY).increment(1);
                    match self.reload(account.id).await? {
                        Some(fresh) => account = fresh,
                        None => return Ok(()),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(contention())
    }

    async fn verify_reset_token(&self, token: &str) -> AuthResult<bool> {
        let token_hash = hash_token(token.trim());
        let account = self
            .guarded(self.store.find_by_reset_token(&token_hash))
            .await?;
        let now = self.clock.now();
        Ok(account.is_some_and(|a| reset::token_matches(&a, &token_hash, now)))
    }

    async fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<()> {
        let policy = self.policy.current();
        let token_hash = hash_token(token.trim());
        let new = Zeroizing::new(new_password.to_owned());

        let Some(mut account) = self.guarded(self.store.find_by_reset_token(&token_hash)).await? else {
            counter!(keys::RESET_REJECTED).increment(1);
            debug!("password reset with unknown token");
            return Err(AuthError::InvalidOrExpiredToken);
        };

        for _ in 0..MAX_UPDATE_RETRIES {
            let now = self.clock.now();
            let expected = account.version;

            // Re-checked after every reload: a concurrent reset consumes the token
            if !reset::token_matches(&account, &token_hash, now) {
                counter!(keys::RESET_REJECTED).increment(1);
                debug!(account_id = %account.id, "password reset with dead token");
                return Err(AuthError::InvalidOrExpiredToken);
            }

            self.vet_new_password(&new, &account, &policy).await?;
            let credential = self.new_credential(&new).await?;
            reset::rotate_credential(&mut account, credential, policy.history_size);

            match self.guarded(self.store.update(expected, account.clone())).await {
                Ok(stored) => {
                    counter!(keys::RESET_CONSUMED).increment(1);
                    info!(account_id = %stored.id, "password reset completed");
                    return Ok(());
                }
                Err(StoreError::Conflict) => {
                    counter!(keys::STORE_CONFLICT_RETRY).increment(1);
                    account = self
                        .reload(account.id)
                        .await?
                        .ok_or(AuthError::InvalidOrExpiredToken)?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(contention())
    }

    async fn account(&self, account_id: AccountId) -> AuthResult<Option<AccountSummary>> {
        Ok(self.reload(account_id).await?.map(|a| a.summary()))
    }

    fn check_password(&self, password: &str) -> PasswordCheck {
        validate_password(password, &self.policy.current())
    }
}
