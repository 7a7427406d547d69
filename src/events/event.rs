use chrono::{DateTime, Utc};

use crate::store::UserId;

/// Session lifecycle events emitted by the actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SessionCreated {
        session_id: String,
        user_id: UserId,
        at: DateTime<Utc>,
    },
    SessionRefreshed {
        session_id: String,
        user_id: UserId,
        refresh_token_version: u64,
        at: DateTime<Utc>,
    },
    SessionRevoked {
        session_id: String,
        user_id: UserId,
        at: DateTime<Utc>,
    },
    /// A rotated refresh token was replayed; the session was force-revoked.
    TokenReuseDetected {
        session_id: String,
        user_id: UserId,
        presented_version: u64,
        current_version: u64,
        client_ip: Option<String>,
        at: DateTime<Utc>,
    },
    UserSessionsRevoked {
        user_id: UserId,
        count: u64,
        at: DateTime<Utc>,
    },
    SessionsPruned {
        sessions: u64,
        leases: u64,
        at: DateTime<Utc>,
    },
}

impl SessionEvent {
    /// Dot-separated event name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => "session.created",
            Self::SessionRefreshed { .. } => "session.refreshed",
            Self::SessionRevoked { .. } => "session.revoked",
            Self::TokenReuseDetected { .. } => "security.token_reuse",
            Self::UserSessionsRevoked { .. } => "session.user_revoked",
            Self::SessionsPruned { .. } => "session.pruned",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::SessionCreated { at, .. }
            | Self::SessionRefreshed { at, .. }
            | Self::SessionRevoked { at, .. }
            | Self::TokenReuseDetected { at, .. }
            | Self::UserSessionsRevoked { at, .. }
            | Self::SessionsPruned { at, .. } => *at,
        }
    }

    /// True for events that a security log must record.
    pub fn is_security_event(&self) -> bool {
        matches!(self, Self::TokenReuseDetected { .. })
    }
}
