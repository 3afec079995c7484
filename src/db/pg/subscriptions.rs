use super::PgStore;
use crate::db::SubscriptionRepository;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use tracing::Instrument;
use uuid::Uuid;

#[async_trait]
impl SubscriptionRepository for PgStore {
    async fn active_tier_for(&self, user_id: Uuid) -> Result<Option<String>> {
        let query = r"
            SELECT tier
            FROM subscriptions
            WHERE user_id = $1
              AND status = 'active'
              AND (end_date IS NULL OR end_date > NOW())
            ORDER BY created_at DESC
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(self.pool())
            .instrument(span)
            .await
            .context("failed to lookup active subscription")?;

        row.map(|row| row.try_get::<String, _>("tier"))
            .transpose()
            .context("failed to decode subscription tier")
    }
}
