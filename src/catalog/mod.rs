//! Game catalog gated by subscription tier.

use crate::{
    auth::{Identity, TierAuthorizer},
    db::{Game, GameRepository},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

pub const DEFAULT_GAMES_DIR: &str = "games";
const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Game not found")]
    GameNotFound,
    #[error("Subscription tier required: {0}")]
    TierRequired(String),
    #[error("Manifest file not found")]
    ManifestNotFound,
    #[error("Invalid manifest format")]
    InvalidManifest(#[source] serde_json::Error),
    #[error("Database error")]
    Store(#[source] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameManifest {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub entry_point: String,
    #[serde(default)]
    pub assets: Vec<String>,
    #[serde(default)]
    pub total_size: i64,
    #[serde(default)]
    pub last_updated: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameListing {
    pub games: Vec<Game>,
    pub user_tier: String,
    pub is_authenticated: bool,
}

pub struct Catalog {
    games: Arc<dyn GameRepository>,
    tiers: TierAuthorizer,
    games_dir: PathBuf,
}

/// Slugs are path segments under the games directory, so only `[a-z0-9-]+` is accepted.
#[must_use]
pub fn valid_slug(slug: &str) -> bool {
    Regex::new(r"^[a-z0-9-]+$").is_ok_and(|re| re.is_match(slug))
}

impl Catalog {
    #[must_use]
    pub fn new(
        games: Arc<dyn GameRepository>,
        tiers: TierAuthorizer,
        games_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            games,
            tiers,
            games_dir: games_dir.into(),
        }
    }

    #[must_use]
    pub fn games_dir(&self) -> &Path {
        &self.games_dir
    }

    /// Games the caller's tier can open, ordered by name.
    ///
    /// # Errors
    /// [`CatalogError::Store`] when the game table cannot be read.
    #[instrument(skip_all)]
    pub async fn list(&self, identity: Option<Identity>) -> Result<GameListing, CatalogError> {
        let user_id = identity.map(|i| i.user_id);
        let user_tier = self.tiers.resolve_tier(user_id).await;

        let games = self.games.list().await.map_err(CatalogError::Store)?;
        let games = games
            .into_iter()
            .filter(|game| self.tiers.can_access(&user_tier, &game.tier_required))
            .collect::<Vec<_>>();

        debug!(count = games.len(), tier = %user_tier, "games listed");

        Ok(GameListing {
            games,
            user_tier,
            is_authenticated: user_id.is_some(),
        })
    }

    /// # Errors
    /// Unknown slug, insufficient tier, missing file, or a file that is not a manifest.
    #[instrument(skip(self, identity))]
    pub async fn manifest(
        &self,
        identity: Option<Identity>,
        slug: &str,
    ) -> Result<GameManifest, CatalogError> {
        if !valid_slug(slug) {
            return Err(CatalogError::GameNotFound);
        }

        let game = self
            .games
            .find_by_slug(slug)
            .await
            .map_err(CatalogError::Store)?
            .ok_or(CatalogError::GameNotFound)?;

        let user_tier = self.tiers.resolve_tier(identity.map(|i| i.user_id)).await;
        if !self.tiers.can_access(&user_tier, &game.tier_required) {
            return Err(CatalogError::TierRequired(game.tier_required));
        }

        let path = self.games_dir.join(slug).join(MANIFEST_FILE);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    error!(path = %path.display(), "failed to read manifest: {err}");
                }
                return Err(CatalogError::ManifestNotFound);
            }
        };

        serde_json::from_slice(&bytes).map_err(|err| {
            error!(path = %path.display(), "invalid manifest: {err}");
            CatalogError::InvalidManifest(err)
        })
    }
}
