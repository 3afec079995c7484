//! In-process repositories for tests and local runs without Postgres.
//!
//! Mirrors the constraints the Postgres schema enforces: live-email uniqueness, unique
//! refresh-token digests, and soft deletes hidden from lookups.

use super::{
    Game, GameRepository, InsertUser, NewSession, SessionRecord, SessionRepository,
    SubscriptionRepository, UpdateUser, UserRecord, UserRepository,
};
use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredUser {
    record: UserRecord,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct StoredSession {
    record: SessionRecord,
    token_hash: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Subscription {
    pub user_id: Uuid,
    pub tier: String,
    pub status: String,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, StoredUser>,
    sessions: HashMap<Uuid, StoredSession>,
    // Insertion order stands in for `created_at`.
    subscriptions: Vec<Subscription>,
    games: Vec<Game>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_subscription(&self, subscription: Subscription) {
        self.inner.write().await.subscriptions.push(subscription);
    }

    pub async fn add_game(&self, game: Game) {
        self.inner.write().await.games.push(game);
    }

    /// Number of session rows, revoked ones included.
    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn sessions_for(&self, user_id: Uuid) -> Vec<SessionRecord> {
        self.inner
            .read()
            .await
            .sessions
            .values()
            .filter(|s| s.record.user_id == user_id)
            .map(|s| s.record.clone())
            .collect()
    }

    /// Whether a user row exists, deleted or not, and its deletion flag.
    pub async fn is_deleted(&self, id: Uuid) -> Option<bool> {
        self.inner
            .read()
            .await
            .users
            .get(&id)
            .map(|u| u.deleted_at.is_some())
    }
}

fn email_in_use(inner: &Inner, email: &str, except: Option<Uuid>) -> bool {
    inner.users.values().any(|u| {
        u.deleted_at.is_none() && u.record.email == email && Some(u.record.id) != except
    })
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.deleted_at.is_none() && u.record.email == email)
            .map(|u| u.record.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .get(&id)
            .filter(|u| u.deleted_at.is_none())
            .map(|u| u.record.clone()))
    }

    async fn insert(&self, email: &str, password_hash: &str) -> Result<InsertUser> {
        let mut inner = self.inner.write().await;
        if email_in_use(&inner, email, None) {
            return Ok(InsertUser::EmailTaken);
        }

        let now = Utc::now();
        let record = UserRecord {
            id: Uuid::now_v7(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(
            record.id,
            StoredUser {
                record: record.clone(),
                deleted_at: None,
            },
        );
        Ok(InsertUser::Created(record))
    }

    async fn update(
        &self,
        id: Uuid,
        email: &str,
        password_hash: Option<&str>,
    ) -> Result<UpdateUser> {
        let mut inner = self.inner.write().await;
        if !inner
            .users
            .get(&id)
            .is_some_and(|u| u.deleted_at.is_none())
        {
            return Ok(UpdateUser::NotFound);
        }
        if email_in_use(&inner, email, Some(id)) {
            return Ok(UpdateUser::EmailTaken);
        }

        let Some(user) = inner.users.get_mut(&id) else {
            return Ok(UpdateUser::NotFound);
        };
        user.record.email = email.to_string();
        if let Some(hash) = password_hash {
            user.record.password_hash = hash.to_string();
        }
        user.record.updated_at = Utc::now();
        Ok(UpdateUser::Updated(user.record.clone()))
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.users.get_mut(&id) {
            Some(user) if user.deleted_at.is_none() => {
                let now = Utc::now();
                user.deleted_at = Some(now);
                user.record.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn insert(&self, session: NewSession) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.sessions.contains_key(&session.id)
            || inner
                .sessions
                .values()
                .any(|s| s.token_hash == session.token_hash)
        {
            bail!("duplicate session");
        }

        let now = Utc::now();
        inner.sessions.insert(
            session.id,
            StoredSession {
                record: SessionRecord {
                    id: session.id,
                    user_id: session.user_id,
                    created_at: now,
                    last_used_at: now,
                    expires_at: session.expires_at,
                    revoked: false,
                },
                token_hash: session.token_hash,
            },
        );
        Ok(())
    }

    async fn find_by_token_hash(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .values()
            .find(|s| s.token_hash == token_hash)
            .map(|s| s.record.clone()))
    }

    async fn touch(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        if let Some(session) = self.inner.write().await.sessions.get_mut(&id) {
            session.record.last_used_at = at;
        }
        Ok(())
    }

    async fn revoke_by_token_hash(&self, token_hash: &[u8]) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let mut count = 0;
        for session in inner
            .sessions
            .values_mut()
            .filter(|s| s.token_hash == token_hash && !s.record.revoked)
        {
            session.record.revoked = true;
            count += 1;
        }
        Ok(count)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let mut count = 0;
        for session in inner
            .sessions
            .values_mut()
            .filter(|s| s.record.user_id == user_id && !s.record.revoked)
        {
            session.record.revoked = true;
            count += 1;
        }
        Ok(count)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.sessions.len();
        inner
            .sessions
            .retain(|_, s| !(s.record.expires_at < now || s.record.revoked));
        Ok((before - inner.sessions.len()) as u64)
    }
}

#[async_trait]
impl SubscriptionRepository for MemoryStore {
    async fn active_tier_for(&self, user_id: Uuid) -> Result<Option<String>> {
        let now = Utc::now();
        let inner = self.inner.read().await;
        Ok(inner
            .subscriptions
            .iter()
            .rev()
            .find(|s| {
                s.user_id == user_id
                    && s.status == "active"
                    && s.end_date.is_none_or(|end| end > now)
            })
            .map(|s| s.tier.clone()))
    }
}

#[async_trait]
impl GameRepository for MemoryStore {
    async fn list(&self) -> Result<Vec<Game>> {
        let mut games = self.inner.read().await.games.clone();
        games.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(games)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Game>> {
        Ok(self
            .inner
            .read()
            .await
            .games
            .iter()
            .find(|g| g.slug == slug)
            .cloned())
    }
}
