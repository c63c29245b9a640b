//! Distributed clustering locks.
//!
//! Every clustering run holds a lock on its seed record so overlapping runs
//! cannot cluster the same neighborhood twice. Blocking additionally probes
//! the locks of every candidate batch and aborts when any is held.

pub mod memory;
pub mod redis;

use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use crate::error::FrbrResult;
use crate::types::RecordId;

/// Lock key for a clustering run seeded by the given record.
pub fn cluster_lock_key(record_id: RecordId) -> String {
    format!("cluster_lock_{record_id}")
}

/// Proof of lock ownership returned by [`LockService::try_acquire`].
///
/// The token guards release: only the holder that acquired the lock can
/// release it, so an expired lock re-acquired by another run is never
/// deleted by the original holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    pub key: String,
    pub token: Uuid,
}

/// Trait for the lock backend used to serialize clustering runs.
pub trait LockService {
    /// Attempts to take the lock, returning a lease on success and [`None`]
    /// when the lock is already held.
    fn try_acquire(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl Future<Output = FrbrResult<Option<LockLease>>> + Send;

    /// Returns true when any of the given keys is currently locked.
    fn any_locked(&self, keys: &[String]) -> impl Future<Output = FrbrResult<bool>> + Send;

    /// Releases a held lease. Releasing an expired or stolen lease is a no-op.
    fn release(&self, lease: &LockLease) -> impl Future<Output = FrbrResult<()>> + Send;
}
