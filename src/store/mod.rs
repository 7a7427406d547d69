//! Session records and the storage contract.
//!
//! The store exclusively owns the durable [`Session`] record. Its only
//! mutation path is [`SessionStore::compare_and_swap`], which applies a
//! [`SessionMutation`] when the record's `version` still matches the caller's
//! expectation. Any storage with an atomic conditional write (an optimistic
//! lock column, a conditional put) can implement it.
//!
//! # Implementations
//!
//! | Type | Description |
//! |------|-------------|
//! | [`InMemorySessionStore`] | `HashMap` behind a lock; single process only |
//! | `PostgresSessionStore` | `sessions` table with a `version` column (feature `sqlx_postgres`) |

mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use memory::InMemorySessionStore;

/// Identifier of the owning principal.
pub type UserId = i64;

/// Lifecycle state of a session. `Revoked` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    Revoked,
    Expired,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Revoked => "REVOKED",
            Self::Expired => "EXPIRED",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "REVOKED" => Ok(Self::Revoked),
            "EXPIRED" => Ok(Self::Expired),
            other => Err(StoreError::Unavailable(format!(
                "unknown session status \"{other}\""
            ))),
        }
    }
}

/// Errors of the storage contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("session id already exists")]
    DuplicateId,
    #[error("session not found")]
    NotFound,
    #[error("session version conflict")]
    VersionConflict,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// The durable unit of authenticated state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: UserId,
    pub status: SessionStatus,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
    /// Advanced by one on every rotation; refresh tokens embed it.
    pub refresh_token_version: u64,
    /// Informational only, never used for authorization.
    pub client_ip: Option<String>,
    /// Informational only, never used for authorization.
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency counter, bumped by the store on every mutation.
    pub version: u64,
}

impl Session {
    /// A fresh `Active` session at refresh version 0.
    pub fn new(
        session_id: impl Into<String>,
        user_id: UserId,
        client_ip: Option<String>,
        user_agent: Option<String>,
        now: DateTime<Utc>,
        access_token_expires_at: DateTime<Utc>,
        refresh_token_expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id,
            status: SessionStatus::Active,
            access_token_expires_at,
            refresh_token_expires_at,
            refresh_token_version: 0,
            client_ip,
            user_agent,
            created_at: now,
            last_activity_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// True once the refresh window has closed, regardless of `status`.
    pub fn is_refresh_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.refresh_token_expires_at < now
    }

    /// Applies `mutation` in place. Does not touch `version`; stores bump it.
    ///
    /// Status changes only ever leave `Active`; a terminal session keeps its
    /// status.
    pub fn apply(&mut self, mutation: &SessionMutation) {
        match *mutation {
            SessionMutation::Rotate {
                access_token_expires_at,
                refresh_token_expires_at,
                at,
            } => {
                self.refresh_token_version += 1;
                self.access_token_expires_at = access_token_expires_at;
                self.refresh_token_expires_at = refresh_token_expires_at;
                self.last_activity_at = at;
                self.updated_at = at;
            }
            SessionMutation::Revoke { at } => {
                if self.is_active() {
                    self.status = SessionStatus::Revoked;
                }
                self.last_activity_at = at;
                self.updated_at = at;
            }
            SessionMutation::Expire { at } => {
                if self.is_active() {
                    self.status = SessionStatus::Expired;
                }
                self.updated_at = at;
            }
        }
    }
}

/// A change applied atomically by [`SessionStore::compare_and_swap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMutation {
    /// Advance `refresh_token_version` and renew the expiries.
    Rotate {
        access_token_expires_at: DateTime<Utc>,
        refresh_token_expires_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// `Active -> Revoked`.
    Revoke { at: DateTime<Utc> },
    /// `Active -> Expired`.
    Expire { at: DateTime<Utc> },
}

impl SessionMutation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rotate { .. } => "rotate",
            Self::Revoke { .. } => "revoke",
            Self::Expire { .. } => "expire",
        }
    }
}

/// Read-only view of a session handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub user_id: UserId,
    pub status: SessionStatus,
    pub refresh_token_version: u64,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.session_id.clone(),
            user_id: session.user_id,
            status: session.status,
            refresh_token_version: session.refresh_token_version,
            client_ip: session.client_ip.clone(),
            user_agent: session.user_agent.clone(),
            access_token_expires_at: session.access_token_expires_at,
            refresh_token_expires_at: session.refresh_token_expires_at,
            created_at: session.created_at,
            last_activity_at: session.last_activity_at,
        }
    }
}

/// Durable keyed storage of sessions with compare-and-swap.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts a new session.
    ///
    /// Fails with `DuplicateId` if the id already exists.
    async fn create(&self, session: Session) -> Result<(), StoreError>;

    /// Loads a session, failing with `NotFound` if absent.
    async fn get(&self, session_id: &str) -> Result<Session, StoreError>;

    /// Applies `mutation` only if the stored `version` equals
    /// `expected_version`, then increments `version` and returns the new
    /// record.
    async fn compare_and_swap(
        &self,
        session_id: &str,
        expected_version: u64,
        mutation: SessionMutation,
    ) -> Result<Session, StoreError>;

    /// Deletes sessions whose refresh window closed before `cutoff`.
    ///
    /// Returns the number of deleted sessions.
    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    /// All sessions owned by `user_id`, in any status.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Session>, StoreError>;
}
