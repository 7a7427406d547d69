//! Session lifecycle core.
//!
//! `warden` issues, rotates, validates and revokes session credentials
//! (access + refresh token pairs). Storage is pluggable through the
//! [`SessionStore`] and [`LeaseStore`] traits; every mutation of a session goes
//! through a version-checked compare-and-swap so that several service
//! instances can share one store.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use warden::{InMemoryLeaseStore, InMemorySessionStore, SessionManager, WardenConfig};
//! use warden::token::{TokenCodec, TokenConfig};
//!
//! let codec = TokenCodec::new(TokenConfig::new("a-signing-secret-of-at-least-32-bytes")?);
//! let manager = SessionManager::new(
//!     InMemorySessionStore::new(),
//!     InMemoryLeaseStore::new(),
//!     codec,
//!     WardenConfig::default(),
//! )?;
//!
//! let issued = manager.login(42, Some("10.0.0.1"), Some("curl/8.0")).await?;
//! let rotated = manager.refresh(issued.tokens.refresh_token.expose_secret(), None, None).await?;
//! ```
//!
//! # Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `mocks` | Re-exports the in-memory stores under their `Mock*` aliases |
//! | `tracing` | Adds `tracing` spans to every action |
//! | `sqlx_postgres` | Postgres-backed [`SessionStore`] and [`LeaseStore`] |

pub mod actions;
pub mod config;
pub mod crypto;
pub mod events;
pub mod guard;
pub mod manager;
#[cfg(feature = "sqlx_postgres")]
pub mod postgres;
mod secret;
pub mod store;
pub mod sweeper;
pub mod token;

pub use actions::{IssuedSession, LogoutTarget, SessionPage};
pub use config::{RefreshPolicy, WardenConfig};
pub use events::{SessionEvent, register_event_listeners};
pub use guard::{InMemoryLeaseStore, LeaseStore, RefreshGuard, RefreshLease};
pub use manager::SessionManager;
pub use secret::SecretString;
pub use store::{
    InMemorySessionStore, Session, SessionInfo, SessionMutation, SessionStatus, SessionStore,
    StoreError,
};
pub use sweeper::{ExpirySweeper, SweepReport};
pub use token::{TokenClaims, TokenCodec, TokenConfig, TokenKind, TokenPair};

#[cfg(any(test, feature = "mocks"))]
pub use guard::InMemoryLeaseStore as MockLeaseStore;
#[cfg(any(test, feature = "mocks"))]
pub use store::InMemorySessionStore as MockSessionStore;

/// Errors returned by the session lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The token's signature did not verify or the token is malformed.
    #[error("invalid token signature")]
    InvalidSignature,
    /// The token's `exp` lies in the past.
    #[error("token has expired")]
    Expired,
    /// An access token was presented where a refresh token was expected, or vice versa.
    #[error("token kind mismatch")]
    KindMismatch,
    /// The session does not exist, is revoked or expired.
    #[error("session is invalid")]
    SessionInvalid,
    /// A rotated refresh token was presented again; the session has been revoked.
    #[error("refresh token reuse detected")]
    TokenReuseDetected,
    /// Another refresh for the same session is in flight.
    #[error("refresh already in progress")]
    RefreshInProgress,
    /// The session changed concurrently and the operation lost the race.
    #[error("session was modified concurrently")]
    ConcurrentModification,
    /// The backing store could not complete the request.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    /// Invalid configuration detected at startup.
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}

impl AuthError {
    /// Transient failures the caller may retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RefreshInProgress | Self::ConcurrentModification)
    }

    /// Failures after which the client has to log in again.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, Self::SessionInvalid | Self::TokenReuseDetected)
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::SessionInvalid,
            StoreError::VersionConflict => Self::ConcurrentModification,
            StoreError::DuplicateId => Self::StoreUnavailable("duplicate session id".to_owned()),
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
        }
    }
}
