use chrono::Utc;

use super::{RevokeOutcome, expire_lapsed, revoke_session, store_failure};
use crate::events::{SessionEvent, dispatch};
use crate::store::{SessionStatus, SessionStore, StoreError};
use crate::token::{TokenCodec, TokenKind};
use crate::AuthError;

/// What identifies the session being logged out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutTarget<'a> {
    /// A valid access token; its `sid` and `sub` select the session.
    AccessToken(&'a str),
    /// A session id, for callers that already authenticated the request.
    SessionId(&'a str),
}

pub struct LogoutAction<S: SessionStore> {
    store: S,
    codec: TokenCodec,
}

impl<S: SessionStore> LogoutAction<S> {
    pub fn new(store: S, codec: TokenCodec) -> Self {
        Self { store, codec }
    }

    /// Revokes the targeted session.
    ///
    /// Idempotent: logging out an already revoked session succeeds. Access
    /// tokens already issued for the session stay valid until they expire;
    /// their holders lose only the ability to refresh.
    ///
    /// # Returns
    ///
    /// - `Ok(())` - the session is revoked
    /// - `Err(AuthError::SessionInvalid)` - unknown, expired, or owned by
    ///   another user than the token subject
    /// - `Err(AuthError::Expired | InvalidSignature | KindMismatch)` - bad access token
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "logout", skip_all, err)
    )]
    pub async fn execute(&self, target: LogoutTarget<'_>) -> Result<(), AuthError> {
        let (session_id, expected_user) = match target {
            LogoutTarget::AccessToken(token) => {
                let claims = self.codec.verify(token, TokenKind::Access)?;
                let user_id = claims.user_id()?;
                (claims.sid, Some(user_id))
            }
            LogoutTarget::SessionId(session_id) => (session_id.to_owned(), None),
        };

        let session = match self.store.get(&session_id).await {
            Ok(session) => session,
            Err(StoreError::NotFound) => return Err(AuthError::SessionInvalid),
            Err(e) => return Err(store_failure("get", &session_id, e)),
        };

        if expected_user.is_some_and(|user_id| user_id != session.user_id) {
            log::warn!(
                target: "warden_auth",
                "msg=\"logout subject mismatch\", session_id=\"{session_id}\""
            );
            return Err(AuthError::SessionInvalid);
        }

        match session.status {
            SessionStatus::Revoked => return Ok(()),
            SessionStatus::Expired => return Err(AuthError::SessionInvalid),
            SessionStatus::Active => {}
        }

        let now = Utc::now();
        if session.is_refresh_expired_at(now) {
            expire_lapsed(&self.store, &session, now).await;
            return Err(AuthError::SessionInvalid);
        }

        let user_id = session.user_id;
        match revoke_session(&self.store, session).await? {
            RevokeOutcome::Revoked(_) => {}
            RevokeOutcome::AlreadyTerminal(SessionStatus::Revoked) => return Ok(()),
            RevokeOutcome::AlreadyTerminal(_) => return Err(AuthError::SessionInvalid),
        }

        log::info!(
            target: "warden_auth",
            "msg=\"session revoked\", session_id=\"{session_id}\", user_id={user_id}, reason=\"logout\""
        );

        dispatch(SessionEvent::SessionRevoked {
            session_id,
            user_id,
            at: now,
        })
        .await;

        Ok(())
    }
}
