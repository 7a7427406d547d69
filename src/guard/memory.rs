use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::LeaseStore;
use crate::store::StoreError;

#[derive(Debug, Clone)]
struct LeaseRecord {
    holder: String,
    expires_at: DateTime<Utc>,
}

/// Process-local lease storage.
///
/// Only excludes refreshes within one process; the session store's
/// compare-and-swap still catches anything that slips past.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLeaseStore {
    leases: Arc<Mutex<HashMap<String, LeaseRecord>>>,
}

impl InMemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of leases currently recorded, live or not.
    pub fn len(&self) -> usize {
        self.leases.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current holder of `key`, if any lease is recorded.
    pub fn holder(&self, key: &str) -> Option<String> {
        self.leases
            .lock()
            .ok()
            .and_then(|leases| leases.get(key).map(|record| record.holder.clone()))
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("lease lock poisoned".to_owned())
}

#[async_trait]
#[allow(clippy::significant_drop_tightening)]
impl LeaseStore for InMemoryLeaseStore {
    async fn try_acquire(
        &self,
        key: &str,
        holder: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut leases = self.leases.lock().map_err(poisoned)?;

        if let Some(existing) = leases.get(key) {
            if existing.expires_at > now {
                return Ok(false);
            }
        }

        leases.insert(
            key.to_owned(),
            LeaseRecord {
                holder: holder.to_owned(),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn release(&self, key: &str, holder: &str) -> Result<bool, StoreError> {
        let mut leases = self.leases.lock().map_err(poisoned)?;

        match leases.get(key) {
            Some(record) if record.holder == holder => {
                leases.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut leases = self.leases.lock().map_err(poisoned)?;

        let before = leases.len();
        leases.retain(|_, record| record.expires_at >= now);
        let purged = before.saturating_sub(leases.len());

        Ok(u64::try_from(purged).unwrap_or(u64::MAX))
    }
}
