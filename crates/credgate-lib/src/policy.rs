// ============================
// credgate-lib/src/policy.rs
// ============================
//! Read-only access to the password policy.
//!
//! Operations ask the provider for the policy on every call, so an update
//! takes effect on the next operation.
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::config::PasswordPolicy;
use crate::error::{AuthError, AuthResult};

/// Supplies the policy an operation should run under
pub trait PolicyProvider: Send + Sync {
    fn current(&self) -> PasswordPolicy;
}

/// A fixed policy
#[derive(Debug, Clone, Default)]
pub struct StaticPolicy(pub PasswordPolicy);

impl PolicyProvider for StaticPolicy {
    fn current(&self) -> PasswordPolicy {
        self.0.clone()
    }
}

/// A policy administrators can replace at runtime. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct SharedPolicy {
    inner: Arc<RwLock<PasswordPolicy>>,
}

impl SharedPolicy {
    pub fn new(policy: PasswordPolicy) -> Self {
        Self {
            inner: Arc::new(RwLock::new(policy)),
        }
    }

    /// Replace the policy after validating it
    pub fn update(&self, policy: PasswordPolicy) -> AuthResult<()> {
        policy
            .validate()
            .map_err(|e| AuthError::InvalidInput(e.to_string()))?;
        *self.inner.write() = policy;
        info!("password policy updated");
        Ok(())
    }
}

impl PolicyProvider for SharedPolicy {
    fn current(&self) -> PasswordPolicy {
        self.inner.read().clone()
    }
}

impl<P: PolicyProvider + ?Sized> PolicyProvider for Arc<P> {
    fn current(&self) -> PasswordPolicy {
        (**self).current()
    }
}
