//! Periodic reclamation of lapsed sessions.
//!
//! Deletes sessions whose refresh window has closed and purges refresh
//! leases past their TTL. Revoked sessions are kept until their refresh
//! window closes as well, so a session is never deleted while a refresh
//! token for it could still verify.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::{SessionEvent, dispatch};
use crate::guard::LeaseStore;
use crate::store::SessionStore;
use crate::AuthError;

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub sessions: u64,
    pub leases: u64,
}

impl SweepReport {
    pub fn total(&self) -> u64 {
        self.sessions + self.leases
    }
}

pub struct ExpirySweeper<S, L> {
    store: S,
    leases: L,
    interval: Duration,
}

impl<S, L> ExpirySweeper<S, L>
where
    S: SessionStore + 'static,
    L: LeaseStore + 'static,
{
    pub fn new(store: S, leases: L, interval: Duration) -> Self {
        Self {
            store,
            leases,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one sweep at the current time.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "sweep_expired", skip_all, err)
    )]
    pub async fn sweep_once(&self) -> Result<SweepReport, AuthError> {
        let now = Utc::now();
        let sessions = self.store.delete_expired_before(now).await?;
        let leases = self.leases.purge_expired(now).await?;

        let report = SweepReport { sessions, leases };
        if report.total() > 0 {
            log::info!(
                target: "warden_auth",
                "msg=\"expired sessions pruned\", sessions={sessions}, leases={leases}"
            );
            dispatch(SessionEvent::SessionsPruned {
                sessions,
                leases,
                at: now,
            })
            .await;
        } else {
            log::debug!(target: "warden_auth", "msg=\"sweep found nothing to prune\"");
        }

        Ok(report)
    }

    /// Sweeps on every interval tick until `cancel` fires.
    ///
    /// The first sweep runs immediately. Failures are logged and the loop
    /// carries on.
    pub async fn run(self, cancel: CancellationToken) {
        log::info!(
            target: "warden_auth",
            "msg=\"expiry sweeper started\", interval_secs={}",
            self.interval.as_secs()
        );

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    log::info!(target: "warden_auth", "msg=\"expiry sweeper stopping\"");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        log::error!(
                            target: "warden_auth",
                            "msg=\"expiry sweep failed\", error=\"{e}\""
                        );
                    }
                }
            }
        }
    }

    /// Spawns [`run`](Self::run) onto the current tokio runtime.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
