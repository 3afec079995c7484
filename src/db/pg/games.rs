use super::PgStore;
use crate::db::{Game, GameRepository};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, postgres::PgRow};
use tracing::Instrument;

const GAME_COLUMNS: &str = "id, slug, name, description, version, tier_required, manifest_path, size_bytes, created_at, updated_at";

fn game_from_row(row: &PgRow) -> Result<Game, sqlx::Error> {
    Ok(Game {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        version: row.try_get("version")?,
        tier_required: row.try_get("tier_required")?,
        manifest_path: row.try_get("manifest_path")?,
        size_bytes: row.try_get("size_bytes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl GameRepository for PgStore {
    async fn list(&self) -> Result<Vec<Game>> {
        let query = format!("SELECT {GAME_COLUMNS} FROM games ORDER BY name");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let rows = sqlx::query(&query)
            .fetch_all(self.pool())
            .instrument(span)
            .await
            .context("failed to list games")?;

        rows.iter()
            .map(game_from_row)
            .collect::<Result<Vec<_>, _>>()
            .context("failed to decode game row")
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Game>> {
        let query = format!("SELECT {GAME_COLUMNS} FROM games WHERE slug = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(slug)
            .fetch_optional(self.pool())
            .instrument(span)
            .await
            .context("failed to lookup game")?;

        row.as_ref()
            .map(game_from_row)
            .transpose()
            .context("failed to decode game row")
    }
}
