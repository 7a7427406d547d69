//! Refresh-token rotation.
//!
//! A refresh runs under the session's [`RefreshGuard`] lease and commits
//! through the store's compare-and-swap:
//!
//! 1. verify the refresh token (signature, expiry, kind)
//! 2. acquire the lease, or fail with `RefreshInProgress`
//! 3. load the session; it must be `Active` with an open refresh window
//! 4. a version mismatch means a rotated token was replayed: revoke the
//!    session and fail with `TokenReuseDetected`
//! 5. CAS the rotation; on a conflict re-read and retry once
//! 6. issue the new pair bound to the new version
//! 7. release the lease on every path

use chrono::{DateTime, Utc};

use super::{IssuedSession, RevokeOutcome, expire_lapsed, revoke_session, store_failure};
use crate::config::expires_after;
use crate::events::{SessionEvent, dispatch};
use crate::guard::{LeaseStore, RefreshGuard};
use crate::store::{Session, SessionInfo, SessionMutation, SessionStore, StoreError};
use crate::token::{TokenClaims, TokenCodec, TokenKind};
use crate::{AuthError, RefreshPolicy, WardenConfig};

pub struct RefreshAction<S, L>
where
    S: SessionStore,
    L: LeaseStore + Clone + 'static,
{
    store: S,
    guard: RefreshGuard<L>,
    codec: TokenCodec,
    config: WardenConfig,
}

impl<S, L> RefreshAction<S, L>
where
    S: SessionStore,
    L: LeaseStore + Clone + 'static,
{
    pub fn new(store: S, guard: RefreshGuard<L>, codec: TokenCodec, config: WardenConfig) -> Self {
        Self {
            store,
            guard,
            codec,
            config,
        }
    }

    /// Exchanges a refresh token for a new pair, advancing the session's
    /// refresh version by exactly one.
    ///
    /// # Returns
    ///
    /// - `Ok(issued)` - the rotated pair and the updated session
    /// - `Err(AuthError::Expired | InvalidSignature | KindMismatch)` - the token itself is bad
    /// - `Err(AuthError::RefreshInProgress)` - another refresh holds the session; retry later
    /// - `Err(AuthError::SessionInvalid)` - unknown, terminal or lapsed session
    /// - `Err(AuthError::TokenReuseDetected)` - replayed token; the session is now revoked
    /// - `Err(AuthError::ConcurrentModification)` - lost a race that slipped past the lease
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "refresh", skip_all, err)
    )]
    pub async fn execute(
        &self,
        refresh_token: &str,
        client_ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<IssuedSession, AuthError> {
        let claims = self.codec.verify(refresh_token, TokenKind::Refresh)?;

        let lease = self.guard.acquire(&claims.sid).await?;
        let result = self.rotate(&claims, client_ip, user_agent).await;

        if let Err(e) = lease.release().await {
            log::warn!(
                target: "warden_auth",
                "msg=\"refresh lease release failed\", session_id=\"{}\", error=\"{e}\"",
                claims.sid
            );
        }

        result
    }

    async fn rotate(
        &self,
        claims: &TokenClaims,
        client_ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<IssuedSession, AuthError> {
        let user_id = claims.user_id()?;
        let mut session = self.load_refreshable(&claims.sid).await?;

        if session.user_id != user_id {
            log::warn!(
                target: "warden_auth",
                "msg=\"refresh token subject mismatch\", session_id=\"{}\"",
                claims.sid
            );
            return Err(AuthError::SessionInvalid);
        }

        if session.refresh_token_version != claims.ver {
            return Err(self.punish_reuse(session, claims, client_ip).await);
        }

        let mut retried = false;
        loop {
            let now = Utc::now();
            let mutation = self.rotation(&session, now)?;

            match self
                .store
                .compare_and_swap(&session.session_id, session.version, mutation)
                .await
            {
                Ok(updated) => return self.issue(&updated, now, user_agent).await,
                Err(StoreError::VersionConflict) if !retried => {
                    retried = true;
                    session = self.load_refreshable(&claims.sid).await?;

                    // a concurrent refresh already rotated this token
                    if session.refresh_token_version != claims.ver {
                        return Err(AuthError::ConcurrentModification);
                    }
                }
                Err(StoreError::VersionConflict) => {
                    log::warn!(
                        target: "warden_auth",
                        "msg=\"refresh lost cas twice\", session_id=\"{}\"",
                        claims.sid
                    );
                    return Err(AuthError::ConcurrentModification);
                }
                Err(e) => return Err(store_failure("rotate", &claims.sid, e)),
            }
        }
    }

    /// Loads the session and checks it is `Active` with an open refresh window.
    async fn load_refreshable(&self, session_id: &str) -> Result<Session, AuthError> {
        let session = self
            .store
            .get(session_id)
            .await
            .map_err(|e| store_failure("get", session_id, e))?;

        if !session.is_active() {
            return Err(AuthError::SessionInvalid);
        }

        let now = Utc::now();
        if session.is_refresh_expired_at(now) {
            expire_lapsed(&self.store, &session, now).await;
            return Err(AuthError::SessionInvalid);
        }

        Ok(session)
    }

    fn rotation(
        &self,
        session: &Session,
        now: DateTime<Utc>,
    ) -> Result<SessionMutation, AuthError> {
        let refresh_token_expires_at = match self.config.refresh_policy {
            RefreshPolicy::Sliding => expires_after(now, self.config.refresh_token_ttl)?,
            RefreshPolicy::Fixed => session.refresh_token_expires_at,
        };
        let access_token_expires_at =
            expires_after(now, self.config.access_token_ttl)?.min(refresh_token_expires_at);

        Ok(SessionMutation::Rotate {
            access_token_expires_at,
            refresh_token_expires_at,
            at: now,
        })
    }

    async fn issue(
        &self,
        session: &Session,
        now: DateTime<Utc>,
        user_agent: Option<&str>,
    ) -> Result<IssuedSession, AuthError> {
        let tokens = self.codec.issue_pair(
            &session.session_id,
            session.user_id,
            session.refresh_token_version,
            now,
            session.access_token_expires_at,
            session.refresh_token_expires_at,
        )?;

        log::info!(
            target: "warden_auth",
            "msg=\"session refreshed\", session_id=\"{}\", user_id={}, refresh_version={}, user_agent=\"{}\"",
            session.session_id,
            session.user_id,
            session.refresh_token_version,
            user_agent.unwrap_or("-")
        );

        dispatch(SessionEvent::SessionRefreshed {
            session_id: session.session_id.clone(),
            user_id: session.user_id,
            refresh_token_version: session.refresh_token_version,
            at: now,
        })
        .await;

        Ok(IssuedSession {
            tokens,
            session: SessionInfo::from(session),
        })
    }

    /// Revokes a session whose rotated refresh token was presented again.
    ///
    /// Always yields `TokenReuseDetected`; a failed revocation is logged.
    async fn punish_reuse(
        &self,
        session: Session,
        claims: &TokenClaims,
        client_ip: Option<&str>,
    ) -> AuthError {
        let current_version = session.refresh_token_version;
        let session_id = session.session_id.clone();
        let user_id = session.user_id;

        log::warn!(
            target: "warden_auth",
            "msg=\"refresh token reuse detected\", session_id=\"{session_id}\", user_id={user_id}, presented_version={}, current_version={current_version}, client_ip=\"{}\"",
            claims.ver,
            client_ip.unwrap_or("-")
        );

        match revoke_session(&self.store, session).await {
            Ok(RevokeOutcome::Revoked(_)) => {
                log::info!(
                    target: "warden_auth",
                    "msg=\"session revoked\", session_id=\"{session_id}\", reason=\"token_reuse\""
                );
            }
            Ok(RevokeOutcome::AlreadyTerminal(_)) => {}
            Err(e) => {
                log::error!(
                    target: "warden_auth",
                    "msg=\"revocation after token reuse failed\", session_id=\"{session_id}\", error=\"{e}\""
                );
            }
        }

        dispatch(SessionEvent::TokenReuseDetected {
            session_id,
            user_id,
            presented_version: claims.ver,
            current_version,
            client_ip: client_ip.map(str::to_owned),
            at: Utc::now(),
        })
        .await;

        AuthError::TokenReuseDetected
    }
}
