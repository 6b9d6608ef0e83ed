// ============================
// credgate-lib/src/notifier.rs
// ============================
//! Out-of-band delivery of raw reset tokens.
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

/// Hands a raw reset token to the account owner, e.g. by email. The core
/// never stores the raw token; this is the only place it leaves.
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn deliver(&self, email: &str, raw_token: &str) -> anyhow::Result<()>;
}

/// A delivered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub email: String,
    pub token: String,
}

/// Notifier that keeps deliveries in memory. Clones share the same outbox.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutbox {
    sent: Arc<Mutex<Vec<Delivery>>>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, oldest first
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.sent.lock().clone()
    }

    /// Most recent token delivered to an address
    pub fn last_token_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .iter()
            .rev()
            .find(|d| d.email == email)
            .map(|d| d.token.clone())
    }
}

#[async_trait]
impl ResetNotifier for MemoryOutbox {
    async fn deliver(&self, email: &str, raw_token: &str) -> anyhow::Result<()> {
        self.sent.lock().push(Delivery {
            email: email.to_string(),
            token: raw_token.to_string(),
        });
        Ok(())
    }
}
