use chrono::Utc;

use super::{IssuedSession, client_ip, store_failure, user_agent};
use crate::config::expires_after;
use crate::crypto::generate_session_id;
use crate::events::{SessionEvent, dispatch};
use crate::store::{Session, SessionInfo, SessionStore, UserId};
use crate::token::TokenCodec;
use crate::{AuthError, WardenConfig};

/// Opens a new session for an already-authenticated user.
///
/// Credential checks happen upstream; this action trusts `user_id`.
pub struct LoginAction<S: SessionStore> {
    store: S,
    codec: TokenCodec,
    config: WardenConfig,
}

impl<S: SessionStore> LoginAction<S> {
    pub fn new(store: S, codec: TokenCodec, config: WardenConfig) -> Self {
        Self {
            store,
            codec,
            config,
        }
    }

    /// Creates an `Active` session at refresh version 0 and issues its first
    /// token pair.
    ///
    /// # Returns
    ///
    /// - `Ok(issued)` - the token pair and the stored session
    /// - `Err(AuthError::StoreUnavailable)` - the session could not be created;
    ///   nothing was persisted
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "login", skip_all, err)
    )]
    pub async fn execute(
        &self,
        user_id: UserId,
        ip: Option<&str>,
        agent: Option<&str>,
    ) -> Result<IssuedSession, AuthError> {
        let now = Utc::now();
        let refresh_expires_at = expires_after(now, self.config.refresh_token_ttl)?;
        let access_expires_at =
            expires_after(now, self.config.access_token_ttl)?.min(refresh_expires_at);

        let session = Session::new(
            generate_session_id(),
            user_id,
            client_ip(ip),
            user_agent(agent),
            now,
            access_expires_at,
            refresh_expires_at,
        );

        // tokens are pure; issue before the only store write
        let tokens = self.codec.issue_pair(
            &session.session_id,
            user_id,
            session.refresh_token_version,
            now,
            access_expires_at,
            refresh_expires_at,
        )?;

        self.store
            .create(session.clone())
            .await
            .map_err(|e| store_failure("create", &session.session_id, e))?;

        log::info!(
            target: "warden_auth",
            "msg=\"session created\", session_id=\"{}\", user_id={user_id}",
            session.session_id
        );

        dispatch(SessionEvent::SessionCreated {
            session_id: session.session_id.clone(),
            user_id,
            at: now,
        })
        .await;

        Ok(IssuedSession {
            tokens,
            session: SessionInfo::from(&session),
        })
    }
}
