// ============================
// credgate-lib/src/lib.rs
// ============================
//! Core credential lifecycle for `credgate`: registration, login with
//! lockout, password rotation with history, and single-use reset tokens.

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod notifier;
pub mod policy;
pub mod storage;
pub mod validation;

use std::sync::Arc;

use crate::auth::{AuthService, CredentialHasher, DefaultAuth};
use crate::config::Settings;
use crate::error::AuthResult;
use crate::notifier::ResetNotifier;
use crate::policy::SharedPolicy;
use crate::storage::AccountStore;

pub use credgate_common as common;

/// Application state shared by front ends
#[derive(Clone)]
pub struct AppState<S> {
    /// Credential service
    pub auth: Arc<dyn AuthService>,
    /// Live policy; updates apply to the next operation
    pub policy: SharedPolicy,
    /// Settings the state was built from
    pub settings: Arc<Settings>,
    /// Storage backend
    pub storage: S,
}

impl<S> AppState<S>
where
    S: AccountStore + Clone + 'static,
{
    /// Create a new application state
    pub fn new(storage: S, settings: Settings, notifier: Arc<dyn ResetNotifier>) -> AuthResult<Self> {
        let policy = SharedPolicy::new(settings.policy.clone());
        let hasher = CredentialHasher::new(settings.hasher.clone())?;
        let auth = DefaultAuth::new(storage.clone(), hasher, Arc::new(policy.clone()), notifier)
            .with_storage_timeout(settings.storage_timeout());

        Ok(Self {
            auth: Arc::new(auth),
            policy,
            settings: Arc::new(settings),
            storage,
        })
    }
}
