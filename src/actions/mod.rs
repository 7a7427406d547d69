//! One action per lifecycle operation.
//!
//! Each action owns clones of the collaborators it needs and exposes a single
//! `execute`. [`SessionManager`](crate::SessionManager) wires them together;
//! use the actions directly when only one operation is needed.

pub mod list_sessions;
pub mod login;
pub mod logout;
pub mod refresh;
pub mod revoke_sessions;
pub mod validate_access;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use list_sessions::{DEFAULT_PAGE_SIZE, ListSessionsAction, MAX_PAGE_SIZE, SessionPage};
pub use login::LoginAction;
pub use logout::{LogoutAction, LogoutTarget};
pub use refresh::RefreshAction;
pub use revoke_sessions::RevokeUserSessionsAction;
pub use validate_access::ValidateAccessAction;

use crate::AuthError;
use crate::store::{Session, SessionInfo, SessionMutation, SessionStatus, SessionStore, StoreError};
use crate::token::TokenPair;

/// CAS attempts for revocations before giving up with `ConcurrentModification`.
const MAX_REVOKE_ATTEMPTS: usize = 3;

const MAX_CLIENT_IP_LENGTH: usize = 64;
const MAX_USER_AGENT_LENGTH: usize = 512;

/// Tokens and session state returned by login and refresh.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedSession {
    pub tokens: TokenPair,
    pub session: SessionInfo,
}

/// Trims provenance metadata and caps its length. Empty values become `None`.
pub(crate) fn provenance(value: Option<&str>, max_chars: usize) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(max_chars).collect())
}

pub(crate) fn client_ip(value: Option<&str>) -> Option<String> {
    provenance(value, MAX_CLIENT_IP_LENGTH)
}

pub(crate) fn user_agent(value: Option<&str>) -> Option<String> {
    provenance(value, MAX_USER_AGENT_LENGTH)
}

pub(crate) enum RevokeOutcome {
    /// This call moved the session to `Revoked`.
    Revoked(Session),
    /// The session was already terminal when observed.
    AlreadyTerminal(SessionStatus),
}

/// Revokes `session` through CAS, re-reading on version conflicts.
pub(crate) async fn revoke_session<S>(
    store: &S,
    mut session: Session,
) -> Result<RevokeOutcome, AuthError>
where
    S: SessionStore + ?Sized,
{
    for _ in 0..MAX_REVOKE_ATTEMPTS {
        if !session.is_active() {
            return Ok(RevokeOutcome::AlreadyTerminal(session.status));
        }

        let mutation = SessionMutation::Revoke { at: Utc::now() };
        match store
            .compare_and_swap(&session.session_id, session.version, mutation)
            .await
        {
            Ok(updated) => return Ok(RevokeOutcome::Revoked(updated)),
            Err(StoreError::VersionConflict) => {
                session = store.get(&session.session_id).await?;
            }
            Err(e) => return Err(store_failure("revoke", &session.session_id, e)),
        }
    }

    Err(AuthError::ConcurrentModification)
}

/// Moves an `Active` session whose refresh window has closed to `Expired`.
///
/// Best effort: the sweeper reclaims it regardless, and the caller rejects
/// the session either way.
pub(crate) async fn expire_lapsed<S>(store: &S, session: &Session, now: DateTime<Utc>)
where
    S: SessionStore + ?Sized,
{
    let mutation = SessionMutation::Expire { at: now };
    match store
        .compare_and_swap(&session.session_id, session.version, mutation)
        .await
    {
        Ok(_) => log::info!(
            target: "warden_auth",
            "msg=\"session expired\", session_id=\"{}\", user_id={}",
            session.session_id,
            session.user_id
        ),
        Err(e) => log::debug!(
            target: "warden_auth",
            "msg=\"lazy expiry skipped\", session_id=\"{}\", error=\"{e}\"",
            session.session_id
        ),
    }
}

/// Logs a store failure and converts it.
pub(crate) fn store_failure(operation: &str, session_id: &str, err: StoreError) -> AuthError {
    if let StoreError::Unavailable(ref msg) = err {
        log::error!(
            target: "warden_auth",
            "msg=\"store error\", operation=\"{operation}\", session_id=\"{session_id}\", error=\"{msg}\""
        );
    }
    err.into()
}
