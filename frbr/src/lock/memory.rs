use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::FrbrResult;
use crate::lock::{LockLease, LockService};

#[derive(Debug, Default)]
struct Inner {
    locks: HashMap<String, (Uuid, Instant)>,
}

impl Inner {
    fn purge_expired(&mut self) {
        let now = Instant::now();
        self.locks.retain(|_, (_, deadline)| *deadline > now);
    }
}

/// In-memory lock service for testing and development purposes.
///
/// Honors TTL expiry and token-checked release like the Redis backend, but
/// only within a single process.
#[derive(Debug, Clone, Default)]
pub struct MemoryLockService {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently held, unexpired locks.
    pub async fn held_locks(&self) -> usize {
        let mut inner = self.inner.lock().await;
        inner.purge_expired();
        inner.locks.len()
    }
}

impl LockService for MemoryLockService {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> FrbrResult<Option<LockLease>> {
        let mut inner = self.inner.lock().await;
        inner.purge_expired();

        if inner.locks.contains_key(key) {
            return Ok(None);
        }

        let token = Uuid::new_v4();
        inner
            .locks
            .insert(key.to_string(), (token, Instant::now() + ttl));

        Ok(Some(LockLease {
            key: key.to_string(),
            token,
        }))
    }

    async fn any_locked(&self, keys: &[String]) -> FrbrResult<bool> {
        let mut inner = self.inner.lock().await;
        inner.purge_expired();

        Ok(keys.iter().any(|key| inner.locks.contains_key(key)))
    }

    async fn release(&self, lease: &LockLease) -> FrbrResult<()> {
        let mut inner = self.inner.lock().await;

        if let Some((token, _)) = inner.locks.get(&lease.key)
            && *token == lease.token
        {
            inner.locks.remove(&lease.key);
        }

        Ok(())
    }
}
