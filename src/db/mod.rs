//! Persistence seam.
//!
//! The auth core only talks to these traits. [`pg`] backs them with Postgres; [`memory`] keeps
//! everything in process and is what the test suites run against.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

pub mod memory;
pub mod pg;

/// A live (not soft-deleted) user row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum InsertUser {
    Created(UserRecord),
    EmailTaken,
}

#[derive(Debug)]
pub enum UpdateUser {
    Updated(UserRecord),
    NotFound,
    EmailTaken,
}

/// Session row keyed by the SHA-256 digest of its refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: Vec<u8>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub tier_required: String,
    pub manifest_path: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Users, excluding soft-deleted rows from every lookup.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn ping(&self) -> Result<()>;
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>>;
    async fn insert(&self, email: &str, password_hash: &str) -> Result<InsertUser>;
    /// Replace the email and, when given, the password hash of a live user.
    async fn update(
        &self,
        id: Uuid,
        email: &str,
        password_hash: Option<&str>,
    ) -> Result<UpdateUser>;
    /// Returns `false` when no live user had this id.
    async fn soft_delete(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert(&self, session: NewSession) -> Result<()>;
    async fn find_by_token_hash(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>>;
    async fn touch(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;
    async fn revoke_by_token_hash(&self, token_hash: &[u8]) -> Result<u64>;
    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64>;
    /// Hard-delete rows with `expires_at < now` or `revoked = true`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Tier label of the newest active, unexpired subscription.
    async fn active_tier_for(&self, user_id: Uuid) -> Result<Option<String>>;
}

#[async_trait]
pub trait GameRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Game>>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Game>>;
}

/// Every repository the service needs, behind trait objects.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub games: Arc<dyn GameRepository>,
}

impl Repositories {
    #[must_use]
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        let store = Arc::new(pg::PgStore::new(pool));
        Self {
            users: store.clone(),
            sessions: store.clone(),
            subscriptions: store.clone(),
            games: store,
        }
    }

    #[must_use]
    pub fn memory(store: Arc<memory::MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            sessions: store.clone(),
            subscriptions: store.clone(),
            games: store,
        }
    }
}
