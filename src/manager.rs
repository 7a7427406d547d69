//! Facade over the lifecycle actions.

use crate::actions::{
    IssuedSession, ListSessionsAction, LoginAction, LogoutAction, LogoutTarget, RefreshAction,
    RevokeUserSessionsAction, SessionPage, ValidateAccessAction,
};
use crate::guard::{LeaseStore, RefreshGuard};
use crate::store::{SessionInfo, SessionStore, UserId};
use crate::sweeper::ExpirySweeper;
use crate::token::{TokenClaims, TokenCodec};
use crate::{AuthError, WardenConfig};

/// Owns the stores, the codec and the configuration, and exposes every
/// lifecycle operation.
///
/// Cheap to clone when the stores are (both in-memory stores and the
/// Postgres stores are handles over shared state).
#[derive(Clone)]
pub struct SessionManager<S, L>
where
    S: SessionStore + Clone + 'static,
    L: LeaseStore + Clone + 'static,
{
    store: S,
    guard: RefreshGuard<L>,
    codec: TokenCodec,
    config: WardenConfig,
}

impl<S, L> SessionManager<S, L>
where
    S: SessionStore + Clone + 'static,
    L: LeaseStore + Clone + 'static,
{
    /// Validates `config` and builds the manager.
    pub fn new(
        store: S,
        leases: L,
        codec: TokenCodec,
        config: WardenConfig,
    ) -> Result<Self, AuthError> {
        config.validate()?;

        Ok(Self {
            store,
            guard: RefreshGuard::new(leases, config.refresh_lease_ttl),
            codec,
            config,
        })
    }

    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn guard(&self) -> &RefreshGuard<L> {
        &self.guard
    }

    pub async fn login(
        &self,
        user_id: UserId,
        client_ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<IssuedSession, AuthError> {
        LoginAction::new(self.store.clone(), self.codec.clone(), self.config.clone())
            .execute(user_id, client_ip, user_agent)
            .await
    }

    pub async fn refresh(
        &self,
        refresh_token: &str,
        client_ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<IssuedSession, AuthError> {
        RefreshAction::new(
            self.store.clone(),
            self.guard.clone(),
            self.codec.clone(),
            self.config.clone(),
        )
        .execute(refresh_token, client_ip, user_agent)
        .await
    }

    pub async fn logout(&self, target: LogoutTarget<'_>) -> Result<(), AuthError> {
        LogoutAction::new(self.store.clone(), self.codec.clone())
            .execute(target)
            .await
    }

    pub fn validate_access(&self, access_token: &str) -> Result<TokenClaims, AuthError> {
        ValidateAccessAction::new(self.codec.clone()).execute(access_token)
    }

    /// Revokes every active session of `user_id` and returns how many were revoked.
    pub async fn revoke_all(&self, user_id: UserId) -> Result<u64, AuthError> {
        RevokeUserSessionsAction::new(self.store.clone())
            .execute(user_id)
            .await
    }

    pub async fn active_sessions(&self, user_id: UserId) -> Result<Vec<SessionInfo>, AuthError> {
        ListSessionsAction::new(self.store.clone())
            .execute(user_id)
            .await
    }

    /// Page `page` (zero-based) of the user's usable sessions, most recently
    /// active first. `per_page` of `0` uses the default size.
    pub async fn active_sessions_page(
        &self,
        user_id: UserId,
        page: usize,
        per_page: usize,
    ) -> Result<SessionPage, AuthError> {
        ListSessionsAction::new(self.store.clone())
            .execute_page(user_id, page, per_page)
            .await
    }

    /// Looks up one session, in any status. Unknown ids are `SessionInvalid`.
    pub async fn session(&self, session_id: &str) -> Result<SessionInfo, AuthError> {
        let session = self.store.get(session_id).await?;
        Ok(SessionInfo::from(&session))
    }

    /// A sweeper over this manager's stores at the configured interval.
    pub fn sweeper(&self) -> Result<ExpirySweeper<S, L>, AuthError> {
        let interval = self.config.sweep_interval.to_std().map_err(|_| {
            AuthError::ConfigurationError("sweep_interval must be positive".to_owned())
        })?;

        Ok(ExpirySweeper::new(
            self.store.clone(),
            self.guard.leases().clone(),
            interval,
        ))
    }
}
