use chrono::Utc;

use super::{RevokeOutcome, revoke_session, store_failure};
use crate::events::{SessionEvent, dispatch};
use crate::store::{SessionStore, UserId};
use crate::AuthError;

/// Revokes every active session of a user, e.g. after a password change.
pub struct RevokeUserSessionsAction<S: SessionStore> {
    store: S,
}

impl<S: SessionStore> RevokeUserSessionsAction<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns how many sessions this call revoked. Sessions that were
    /// already terminal are skipped.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "revoke_user_sessions", skip_all, err)
    )]
    pub async fn execute(&self, user_id: UserId) -> Result<u64, AuthError> {
        let sessions = self
            .store
            .list_for_user(user_id)
            .await
            .map_err(|e| store_failure("list_for_user", "-", e))?;

        let mut revoked = 0u64;
        for session in sessions.into_iter().filter(|s| s.is_active()) {
            let session_id = session.session_id.clone();
            if let RevokeOutcome::Revoked(_) = revoke_session(&self.store, session).await? {
                revoked += 1;
                log::debug!(
                    target: "warden_auth",
                    "msg=\"session revoked\", session_id=\"{session_id}\", user_id={user_id}, reason=\"revoke_all\""
                );
            }
        }

        log::info!(
            target: "warden_auth",
            "msg=\"user sessions revoked\", user_id={user_id}, count={revoked}"
        );

        dispatch(SessionEvent::UserSessionsRevoked {
            user_id,
            count: revoked,
            at: Utc::now(),
        })
        .await;

        Ok(revoked)
    }
}
