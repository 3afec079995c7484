//! Server-side refresh-token sessions.
//!
//! One row per refresh token minted. The row, not the token signature, decides whether a
//! refresh token may still be used: revocation flips a flag, the sweeper deletes rows that are
//! expired or revoked.

use crate::db::{NewSession, SessionRepository};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound,
    #[error("Session has been revoked")]
    Revoked,
    #[error("Session has expired")]
    Expired,
    #[error("session store failure: {0:#}")]
    Store(#[from] anyhow::Error),
}

/// Only the digest of a refresh token is ever stored.
#[must_use]
pub fn hash_refresh_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

#[derive(Clone)]
pub struct SessionStore {
    repo: Arc<dyn SessionRepository>,
    refresh_ttl: Duration,
}

impl SessionStore {
    #[must_use]
    pub fn new(repo: Arc<dyn SessionRepository>, refresh_ttl: Duration) -> Self {
        Self { repo, refresh_ttl }
    }

    /// Persist a session for a freshly minted refresh token.
    ///
    /// # Errors
    /// Returns [`SessionError::Store`] if the row cannot be written.
    pub async fn create(&self, user_id: Uuid, refresh_token: &str) -> Result<Uuid, SessionError> {
        let ttl = chrono::Duration::from_std(self.refresh_ttl)
            .map_err(|e| anyhow::anyhow!("refresh TTL out of range: {e}"))?;
        let expires_at = Utc::now().checked_add_signed(ttl).ok_or_else(|| {
            anyhow::anyhow!("refresh TTL of {:?} overflows the session expiry", self.refresh_ttl)
        })?;
        let session = NewSession {
            id: Uuid::new_v4(),
            user_id,
            token_hash: hash_refresh_token(refresh_token),
            expires_at,
        };
        let id = session.id;
        self.repo.insert(session).await?;

        debug!(%user_id, session_id = %id, "session created");
        Ok(id)
    }

    /// Resolve a refresh token to its owner if the session is still usable.
    ///
    /// Revocation is checked before expiry. Updating `last_used_at` is best effort.
    ///
    /// # Errors
    /// [`SessionError::NotFound`], [`SessionError::Revoked`], [`SessionError::Expired`], or
    /// [`SessionError::Store`] when the lookup itself fails.
    pub async fn validate(&self, refresh_token: &str) -> Result<Uuid, SessionError> {
        let session = self
            .repo
            .find_by_token_hash(&hash_refresh_token(refresh_token))
            .await?
            .ok_or(SessionError::NotFound)?;

        if session.revoked {
            return Err(SessionError::Revoked);
        }

        let now = Utc::now();
        if now >= session.expires_at {
            return Err(SessionError::Expired);
        }

        if let Err(err) = self.repo.touch(session.id, now).await {
            warn!(session_id = %session.id, "failed to update session last_used_at: {err:#}");
        }

        Ok(session.user_id)
    }

    /// Revoke the session behind `refresh_token`. Unknown or already revoked tokens are fine.
    ///
    /// # Errors
    /// Returns [`SessionError::Store`] if the update fails.
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), SessionError> {
        let revoked = self
            .repo
            .revoke_by_token_hash(&hash_refresh_token(refresh_token))
            .await?;
        debug!(revoked, "session revoke");
        Ok(())
    }

    /// Revoke every session a user holds.
    ///
    /// # Errors
    /// Returns [`SessionError::Store`] if the update fails.
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, SessionError> {
        let revoked = self.repo.revoke_all_for_user(user_id).await?;
        info!(%user_id, revoked, "revoked all sessions for user");
        Ok(revoked)
    }

    /// Delete sessions that are expired or revoked.
    ///
    /// # Errors
    /// Returns [`SessionError::Store`] if the delete fails.
    pub async fn sweep_expired(&self) -> Result<u64, SessionError> {
        Ok(self.repo.delete_expired(Utc::now()).await?)
    }

    /// Run [`SessionStore::sweep_expired`] now and then every `interval` until `shutdown` fires.
    ///
    /// A failed sweep is logged and retried on the next tick.
    #[must_use]
    pub fn spawn_sweeper(&self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => {
                        debug!("session sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        match store.sweep_expired().await {
                            Ok(deleted) => info!(deleted, "swept expired sessions"),
                            Err(err) => error!("session sweep failed: {err}"),
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use anyhow::Result;

    fn stores(ttl: Duration) -> (Arc<MemoryStore>, SessionStore) {
        let memory = Arc::new(MemoryStore::new());
        let store = SessionStore::new(memory.clone(), ttl);
        (memory, store)
    }

    #[test]
    fn token_digest_is_sha256() {
        let digest = hash_refresh_token("token");
        assert_eq!(digest.len(), 32);
        assert_eq!(digest, hash_refresh_token("token"));
        assert_ne!(digest, hash_refresh_token("token2"));
    }

    #[tokio::test]
    async fn create_then_validate() -> Result<()> {
        let (memory, store) = stores(Duration::from_secs(60));
        let user = Uuid::new_v4();
        store.create(user, "refresh-1").await?;

        assert_eq!(store.validate("refresh-1").await?, user);
        assert_eq!(memory.sessions_for(user).await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn oversized_ttl_is_a_store_error() {
        let user = Uuid::new_v4();
        for ttl in [
            Duration::from_secs(1_000_000 * 365 * 24 * 60 * 60),
            Duration::from_secs(u64::MAX),
        ] {
            let (memory, store) = stores(ttl);
            assert!(
                matches!(store.create(user, "refresh-1").await, Err(SessionError::Store(_))),
                "{ttl:?} should not produce a session"
            );
            assert!(memory.sessions_for(user).await.is_empty());
        }
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let (_, store) = stores(Duration::from_secs(60));
        assert!(matches!(
            store.validate("nope").await,
            Err(SessionError::NotFound)
        ));
    }

    #[tokio::test]
    async fn revoked_wins_over_expired() -> Result<()> {
        let (_, store) = stores(Duration::ZERO);
        store.create(Uuid::new_v4(), "refresh-1").await?;
        assert!(matches!(
            store.validate("refresh-1").await,
            Err(SessionError::Expired)
        ));

        store.revoke("refresh-1").await?;
        assert!(matches!(
            store.validate("refresh-1").await,
            Err(SessionError::Revoked)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn revoke_is_idempotent() -> Result<()> {
        let (_, store) = stores(Duration::from_secs(60));
        store.create(Uuid::new_v4(), "refresh-1").await?;
        store.revoke("refresh-1").await?;
        store.revoke("refresh-1").await?;
        store.revoke("never-issued").await?;
        Ok(())
    }

    #[tokio::test]
    async fn revoke_all_covers_every_session() -> Result<()> {
        let (_, store) = stores(Duration::from_secs(60));
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        store.create(user, "a").await?;
        store.create(user, "b").await?;
        store.create(other, "c").await?;

        assert_eq!(store.revoke_all_for_user(user).await?, 2);
        assert!(matches!(store.validate("a").await, Err(SessionError::Revoked)));
        assert!(matches!(store.validate("b").await, Err(SessionError::Revoked)));
        assert_eq!(store.validate("c").await?, other);
        Ok(())
    }

    #[tokio::test]
    async fn sweep_only_removes_dead_sessions() -> Result<()> {
        let memory = Arc::new(MemoryStore::new());
        let live = SessionStore::new(memory.clone(), Duration::from_secs(3600));
        let short = SessionStore::new(memory.clone(), Duration::ZERO);
        let user = Uuid::new_v4();

        live.create(user, "live").await?;
        live.create(user, "revoked").await?;
        live.revoke("revoked").await?;
        short.create(user, "expired").await?;
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(live.sweep_expired().await?, 2);
        for _ in 0..3 {
            assert_eq!(live.sweep_expired().await?, 0);
        }
        assert_eq!(memory.session_count().await, 1);
        assert_eq!(live.validate("live").await?, user);
        Ok(())
    }

    #[tokio::test]
    async fn sweeper_runs_immediately_and_stops_on_cancel() -> Result<()> {
        let memory = Arc::new(MemoryStore::new());
        let store = SessionStore::new(memory.clone(), Duration::ZERO);
        store.create(Uuid::new_v4(), "expired").await?;
        tokio::time::sleep(Duration::from_millis(5)).await;

        let shutdown = CancellationToken::new();
        let handle = store.spawn_sweeper(Duration::from_secs(3600), shutdown.clone());

        for _ in 0..50 {
            if memory.session_count().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(memory.session_count().await, 0);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle).await??;
        Ok(())
    }
}
