use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::database_error;
use crate::store::{Session, SessionMutation, SessionStore, StoreError, UserId};

const SESSION_COLUMNS: &str = "session_id, user_id, status, access_token_expires_at, \
     refresh_token_expires_at, refresh_token_version, client_ip, user_agent, created_at, \
     last_activity_at, updated_at, version";

/// Sessions in the `sessions` table.
///
/// The compare-and-swap is a single `UPDATE ... WHERE version = $n`, so any
/// number of processes may share the table.
#[derive(Clone)]
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, session_id: &str) -> Result<bool, StoreError> {
        let row: (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM sessions WHERE session_id = $1)")
                .bind(session_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| database_error("exists", e))?;

        Ok(row.0)
    }
}

#[derive(FromRow)]
struct SessionRecord {
    session_id: String,
    user_id: i64,
    status: String,
    access_token_expires_at: DateTime<Utc>,
    refresh_token_expires_at: DateTime<Utc>,
    refresh_token_version: i64,
    client_ip: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<SessionRecord> for Session {
    type Error = StoreError;

    fn try_from(row: SessionRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            session_id: row.session_id,
            user_id: row.user_id,
            status: row.status.parse()?,
            access_token_expires_at: row.access_token_expires_at,
            refresh_token_expires_at: row.refresh_token_expires_at,
            refresh_token_version: to_u64("refresh_token_version", row.refresh_token_version)?,
            client_ip: row.client_ip,
            user_agent: row.user_agent,
            created_at: row.created_at,
            last_activity_at: row.last_activity_at,
            updated_at: row.updated_at,
            version: to_u64("version", row.version)?,
        })
    }
}

fn to_u64(column: &str, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value)
        .map_err(|_| StoreError::Unavailable(format!("negative {column} in sessions row")))
}

fn to_i64(column: &str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Unavailable(format!("{column} out of range")))
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn create(&self, session: Session) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"INSERT INTO sessions (session_id, user_id, status, access_token_expires_at,
                   refresh_token_expires_at, refresh_token_version, client_ip, user_agent,
                   created_at, last_activity_at, updated_at, version)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(&session.session_id)
        .bind(session.user_id)
        .bind(session.status.as_str())
        .bind(session.access_token_expires_at)
        .bind(session.refresh_token_expires_at)
        .bind(to_i64("refresh_token_version", session.refresh_token_version)?)
        .bind(&session.client_ip)
        .bind(&session.user_agent)
        .bind(session.created_at)
        .bind(session.last_activity_at)
        .bind(session.updated_at)
        .bind(to_i64("version", session.version)?)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateId)
            }
            Err(e) => Err(database_error("create", e)),
        }
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn get(&self, session_id: &str) -> Result<Session, StoreError> {
        let row: Option<SessionRecord> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("get", e))?;

        row.ok_or(StoreError::NotFound)?.try_into()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn compare_and_swap(
        &self,
        session_id: &str,
        expected_version: u64,
        mutation: SessionMutation,
    ) -> Result<Session, StoreError> {
        let mut session = self.get(session_id).await?;
        if session.version != expected_version {
            return Err(StoreError::VersionConflict);
        }
        session.apply(&mutation);

        // the WHERE on version makes the write conditional on nobody else
        // having written since our read
        let row: Option<SessionRecord> = sqlx::query_as(&format!(
            r"UPDATE sessions
               SET status = $3, access_token_expires_at = $4, refresh_token_expires_at = $5,
                   refresh_token_version = $6, last_activity_at = $7, updated_at = $8,
                   version = version + 1
               WHERE session_id = $1 AND version = $2
               RETURNING {SESSION_COLUMNS}"
        ))
        .bind(session_id)
        .bind(to_i64("version", expected_version)?)
        .bind(session.status.as_str())
        .bind(session.access_token_expires_at)
        .bind(session.refresh_token_expires_at)
        .bind(to_i64("refresh_token_version", session.refresh_token_version)?)
        .bind(session.last_activity_at)
        .bind(session.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error(mutation.name(), e))?;

        match row {
            Some(row) => row.try_into(),
            None if self.exists(session_id).await? => Err(StoreError::VersionConflict),
            None => Err(StoreError::NotFound),
        }
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE refresh_token_expires_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| database_error("delete_expired_before", e))?;

        Ok(result.rows_affected())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Session>, StoreError> {
        let rows: Vec<SessionRecord> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = $1 ORDER BY created_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| database_error("list_for_user", e))?;

        rows.into_iter().map(Session::try_from).collect()
    }
}
