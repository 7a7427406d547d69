use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::database_error;
use crate::guard::LeaseStore;
use crate::store::StoreError;

/// Refresh leases in the `refresh_leases` table, shared by all processes
/// using the same database.
#[derive(Clone)]
pub struct PostgresLeaseStore {
    pool: PgPool,
}

impl PostgresLeaseStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeaseStore for PostgresLeaseStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn try_acquire(
        &self,
        key: &str,
        holder: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        // takes over only a lapsed lease; a live one makes the upsert a no-op
        let result = sqlx::query(
            r"INSERT INTO refresh_leases (lease_key, holder, expires_at)
               VALUES ($1, $2, $4)
               ON CONFLICT (lease_key) DO UPDATE
               SET holder = EXCLUDED.holder, expires_at = EXCLUDED.expires_at
               WHERE refresh_leases.expires_at <= $3",
        )
        .bind(key)
        .bind(holder)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| database_error("try_acquire", e))?;

        Ok(result.rows_affected() == 1)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn release(&self, key: &str, holder: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_leases WHERE lease_key = $1 AND holder = $2")
            .bind(key)
            .bind(holder)
            .execute(&self.pool)
            .await
            .map_err(|e| database_error("release", e))?;

        Ok(result.rows_affected() == 1)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_leases WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| database_error("purge_expired", e))?;

        Ok(result.rows_affected())
    }
}
