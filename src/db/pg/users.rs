use super::{PgStore, is_unique_violation};
use crate::db::{InsertUser, UpdateUser, UserRecord, UserRepository};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Connection, Row, postgres::PgRow};
use tracing::Instrument;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, password_hash, created_at, updated_at";

fn user_from_row(row: &PgRow) -> Result<UserRecord, sqlx::Error> {
    Ok(UserRecord {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl UserRepository for PgStore {
    async fn ping(&self) -> Result<()> {
        let acquire_span = tracing::info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool()
            .acquire()
            .instrument(acquire_span)
            .await
            .context("failed to acquire database connection")?;

        let ping_span =
            tracing::info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("failed to ping database")
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND NOT is_deleted");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(self.pool())
            .instrument(span)
            .await
            .context("failed to lookup user by email")?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .context("failed to decode user row")
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND NOT is_deleted");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(self.pool())
            .instrument(span)
            .await
            .context("failed to lookup user by id")?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .context("failed to decode user row")
    }

    async fn insert(&self, email: &str, password_hash: &str) -> Result<InsertUser> {
        let query = format!(
            "INSERT INTO users (id, email, password_hash) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(Uuid::now_v7())
            .bind(email)
            .bind(password_hash)
            .fetch_one(self.pool())
            .instrument(span)
            .await;

        match row {
            Ok(row) => Ok(InsertUser::Created(
                user_from_row(&row).context("failed to decode user row")?,
            )),
            Err(err) if is_unique_violation(&err) => Ok(InsertUser::EmailTaken),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn update(
        &self,
        id: Uuid,
        email: &str,
        password_hash: Option<&str>,
    ) -> Result<UpdateUser> {
        let query = format!(
            r"
            UPDATE users
            SET email = $2,
                password_hash = COALESCE($3, password_hash),
                updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            RETURNING {USER_COLUMNS}
            "
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(email)
            .bind(password_hash)
            .fetch_optional(self.pool())
            .instrument(span)
            .await;

        match row {
            Ok(Some(row)) => Ok(UpdateUser::Updated(
                user_from_row(&row).context("failed to decode user row")?,
            )),
            Ok(None) => Ok(UpdateUser::NotFound),
            Err(err) if is_unique_violation(&err) => Ok(UpdateUser::EmailTaken),
            Err(err) => Err(err).context("failed to update user"),
        }
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool> {
        let query = r"
            UPDATE users
            SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .execute(self.pool())
            .instrument(span)
            .await
            .context("failed to soft delete user")?;

        Ok(result.rows_affected() > 0)
    }
}
