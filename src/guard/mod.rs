//! Per-session mutual exclusion for refresh.
//!
//! A refresh claims a short-lived lease keyed by session id in a
//! [`LeaseStore`]. The lease lives in the store rather than in process memory,
//! so two service instances behind a load balancer exclude each other too. A
//! holder that crashes blocks its session for at most the lease TTL.

mod memory;
mod refresh;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use memory::InMemoryLeaseStore;
pub use refresh::{RefreshGuard, RefreshLease};

use crate::store::StoreError;

/// Storage for time-bounded exclusive leases.
///
/// Implement this trait for shared storage (postgres, redis, ...) when several
/// processes refresh sessions from the same store.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Claims `key` for `holder` until `expires_at`.
    ///
    /// Succeeds when no lease exists or the existing one expired at or
    /// before `now`. Returns `false` while another holder's lease is live.
    async fn try_acquire(
        &self,
        key: &str,
        holder: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Drops the lease on `key` only if `holder` still owns it.
    ///
    /// Returns whether a lease was removed.
    async fn release(&self, key: &str, holder: &str) -> Result<bool, StoreError>;

    /// Removes leases that expired before `now`. Returns the count.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}
