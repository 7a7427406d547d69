use chrono::{Duration, Utc};

use super::LeaseStore;
use crate::AuthError;
use crate::config::expires_after;
use crate::crypto::{LEASE_TOKEN_LENGTH, generate_token};

/// Serializes refreshes of the same session through a [`LeaseStore`].
#[derive(Clone)]
pub struct RefreshGuard<L> {
    leases: L,
    lease_ttl: Duration,
}

impl<L> RefreshGuard<L>
where
    L: LeaseStore + Clone + 'static,
{
    pub fn new(leases: L, lease_ttl: Duration) -> Self {
        Self { leases, lease_ttl }
    }

    pub fn lease_ttl(&self) -> Duration {
        self.lease_ttl
    }

    pub fn leases(&self) -> &L {
        &self.leases
    }

    /// Claims the refresh lease for `session_id`.
    ///
    /// # Returns
    ///
    /// - `Ok(lease)` - the caller holds the session until it releases or the
    ///   lease TTL lapses
    /// - `Err(AuthError::RefreshInProgress)` - another refresh holds a live lease
    /// - `Err(AuthError::StoreUnavailable)` - the lease store failed
    pub async fn acquire(&self, session_id: &str) -> Result<RefreshLease<L>, AuthError> {
        let holder = generate_token(LEASE_TOKEN_LENGTH);
        let now = Utc::now();
        let expires_at = expires_after(now, self.lease_ttl)?;

        let acquired = self
            .leases
            .try_acquire(session_id, &holder, now, expires_at)
            .await?;

        if !acquired {
            log::debug!(
                target: "warden_auth",
                "msg=\"refresh lease busy\", session_id=\"{session_id}\""
            );
            return Err(AuthError::RefreshInProgress);
        }

        log::debug!(
            target: "warden_auth",
            "msg=\"refresh lease acquired\", session_id=\"{session_id}\""
        );

        Ok(RefreshLease {
            leases: self.leases.clone(),
            session_id: session_id.to_owned(),
            token: holder,
            released: false,
        })
    }

    /// Releases the lease on `session_id` if `token` is still its holder.
    ///
    /// A lease that expired and was re-acquired by someone else is left alone.
    pub async fn release(&self, session_id: &str, token: &str) -> Result<bool, AuthError> {
        Ok(self.leases.release(session_id, token).await?)
    }
}

/// A held refresh lease.
///
/// Call [`release`](Self::release) on every path. If the lease is dropped
/// unreleased, for example because the refresh future was cancelled, the
/// release is spawned onto the current tokio runtime; outside a runtime the
/// lease lapses at its TTL.
pub struct RefreshLease<L: LeaseStore + Clone + 'static> {
    leases: L,
    session_id: String,
    token: String,
    released: bool,
}

impl<L: LeaseStore + Clone + 'static> RefreshLease<L> {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Holder token identifying this lease in the store.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Releases the lease. Returns `false` if it had already lapsed and been
    /// taken by another holder.
    ///
    /// If this future is cancelled before the store answers, `Drop` still
    /// spawns the release.
    pub async fn release(mut self) -> Result<bool, AuthError> {
        let result = self.leases.release(&self.session_id, &self.token).await;
        self.released = true;
        let released = result?;

        if !released {
            log::warn!(
                target: "warden_auth",
                "msg=\"refresh lease lapsed before release\", session_id=\"{}\"",
                self.session_id
            );
        }

        Ok(released)
    }
}

impl<L: LeaseStore + Clone + 'static> Drop for RefreshLease<L> {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let leases = self.leases.clone();
        let session_id = std::mem::take(&mut self.session_id);
        let token = std::mem::take(&mut self.token);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = leases.release(&session_id, &token).await {
                        log::warn!(
                            target: "warden_auth",
                            "msg=\"deferred lease release failed\", session_id=\"{session_id}\", error=\"{e}\""
                        );
                    }
                });
            }
            Err(_) => {
                log::warn!(
                    target: "warden_auth",
                    "msg=\"lease dropped outside runtime, will lapse at ttl\", session_id=\"{session_id}\""
                );
            }
        }
    }
}
