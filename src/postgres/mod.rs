//! Postgres-backed stores (feature `sqlx_postgres`).
//!
//! Run [`migrations::run`] once before use.

mod lease_store;
pub mod migrations;
mod session_store;

pub use lease_store::PostgresLeaseStore;
pub use session_store::PostgresSessionStore;

use sqlx::PgPool;

use crate::store::StoreError;

/// Creates both stores over one connection pool.
pub fn create_stores(pool: PgPool) -> (PostgresSessionStore, PostgresLeaseStore) {
    (
        PostgresSessionStore::new(pool.clone()),
        PostgresLeaseStore::new(pool),
    )
}

fn database_error(operation: &str, err: sqlx::Error) -> StoreError {
    log::error!(
        target: "warden_auth",
        "msg=\"database error\", operation=\"{operation}\", error=\"{err}\""
    );
    StoreError::Unavailable(err.to_string())
}
