//! Postgres-backed repositories.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::Instrument;

mod games;
mod sessions;
mod subscriptions;
mod users;

pub const SCHEMA: &str = include_str!("../../../sql/schema.sql");

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Apply `sql/schema.sql`; safe to run on every start.
///
/// # Errors
/// Returns an error if any statement fails.
pub async fn apply_schema(pool: &PgPool) -> Result<()> {
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DDL",
        db.statement = "sql/schema.sql"
    );
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to apply schema")?;
    Ok(())
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
