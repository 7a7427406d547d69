//! In-memory session storage.
//!
//! Suitable for tests and single-instance deployments. The compare-and-swap
//! is linearized by a process-local lock, so it does not coordinate several
//! processes; use a shared store for that.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{Session, SessionMutation, SessionStore, StoreError, UserId};

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("lock poisoned".to_owned())
}

/// Sessions in a `HashMap` behind a `RwLock`, keyed by session id.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored sessions, in any status.
    pub fn len(&self) -> usize {
        self.sessions.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: Session) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;

        if sessions.contains_key(&session.session_id) {
            return Err(StoreError::DuplicateId);
        }
        sessions.insert(session.session_id.clone(), session);

        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Session, StoreError> {
        self.sessions
            .read()
            .map_err(poisoned)?
            .get(session_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    #[allow(clippy::significant_drop_tightening)]
    async fn compare_and_swap(
        &self,
        session_id: &str,
        expected_version: u64,
        mutation: SessionMutation,
    ) -> Result<Session, StoreError> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let session = sessions.get_mut(session_id).ok_or(StoreError::NotFound)?;

        if session.version != expected_version {
            return Err(StoreError::VersionConflict);
        }

        session.apply(&mutation);
        session.version += 1;

        Ok(session.clone())
    }

    #[allow(clippy::significant_drop_tightening)]
    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;

        let before = sessions.len();
        sessions.retain(|_, session| !session.is_refresh_expired_at(cutoff));
        let deleted = before.saturating_sub(sessions.len());

        Ok(u64::try_from(deleted).unwrap_or(u64::MAX))
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Session>, StoreError> {
        let sessions = self.sessions.read().map_err(poisoned)?;

        let mut owned: Vec<Session> = sessions
            .values()
            .filter(|session| session.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(owned)
    }
}
