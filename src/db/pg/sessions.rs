use super::PgStore;
use crate::db::{NewSession, SessionRecord, SessionRepository};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, postgres::PgRow};
use tracing::Instrument;
use uuid::Uuid;

fn session_from_row(row: &PgRow) -> Result<SessionRecord, sqlx::Error> {
    Ok(SessionRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
        last_used_at: row.try_get("last_used_at")?,
        expires_at: row.try_get("expires_at")?,
        revoked: row.try_get("revoked")?,
    })
}

#[async_trait]
impl SessionRepository for PgStore {
    async fn insert(&self, session: NewSession) -> Result<()> {
        let query = r"
            INSERT INTO sessions (id, user_id, refresh_token_hash, expires_at)
            VALUES ($1, $2, $3, $4)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(session.id)
            .bind(session.user_id)
            .bind(session.token_hash)
            .bind(session.expires_at)
            .execute(self.pool())
            .instrument(span)
            .await
            .context("failed to insert session")?;
        Ok(())
    }

    async fn find_by_token_hash(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>> {
        let query = r"
            SELECT id, user_id, created_at, last_used_at, expires_at, revoked
            FROM sessions
            WHERE refresh_token_hash = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(self.pool())
            .instrument(span)
            .await
            .context("failed to lookup session")?;

        row.as_ref()
            .map(session_from_row)
            .transpose()
            .context("failed to decode session row")
    }

    async fn touch(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let query = "UPDATE sessions SET last_used_at = $2 WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(at)
            .execute(self.pool())
            .instrument(span)
            .await
            .context("failed to update session last_used_at")?;
        Ok(())
    }

    async fn revoke_by_token_hash(&self, token_hash: &[u8]) -> Result<u64> {
        let query =
            "UPDATE sessions SET revoked = TRUE WHERE refresh_token_hash = $1 AND NOT revoked";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(token_hash)
            .execute(self.pool())
            .instrument(span)
            .await
            .context("failed to revoke session")?;
        Ok(result.rows_affected())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64> {
        let query = "UPDATE sessions SET revoked = TRUE WHERE user_id = $1 AND NOT revoked";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(self.pool())
            .instrument(span)
            .await
            .context("failed to revoke user sessions")?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let query = "DELETE FROM sessions WHERE expires_at < $1 OR revoked = TRUE";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(now)
            .execute(self.pool())
            .instrument(span)
            .await
            .context("failed to delete expired sessions")?;
        Ok(result.rows_affected())
    }
}
