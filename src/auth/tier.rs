//! Subscription tiers and catalog gating.

use crate::db::SubscriptionRepository;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};
use tracing::error;
use uuid::Uuid;

/// Ordered subscription tiers: `Free < Basic < Premium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Basic,
    Premium,
}

impl Tier {
    pub const ALL: [Self; 3] = [Self::Free, Self::Basic, Self::Premium];

    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Free => 0,
            Self::Basic => 1,
            Self::Premium => 2,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Premium => "premium",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tier: {0}")]
pub struct UnknownTier(pub String);

impl FromStr for Tier {
    type Err = UnknownTier;

    /// Exact, case-sensitive labels only.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "basic" => Ok(Self::Basic),
            "premium" => Ok(Self::Premium),
            _ => Err(UnknownTier(s.to_string())),
        }
    }
}

/// `true` iff both labels are known tiers and `user_tier` ranks at least `required_tier`.
#[must_use]
pub fn can_access(user_tier: &str, required_tier: &str) -> bool {
    match (user_tier.parse::<Tier>(), required_tier.parse::<Tier>()) {
        (Ok(user), Ok(required)) => user.rank() >= required.rank(),
        _ => false,
    }
}

#[derive(Clone)]
pub struct TierAuthorizer {
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl TierAuthorizer {
    #[must_use]
    pub fn new(subscriptions: Arc<dyn SubscriptionRepository>) -> Self {
        Self { subscriptions }
    }

    /// Tier label for `user_id`; anonymous callers and users without an active subscription
    /// are `free`. The label is returned as stored, so an unrecognized value still fails
    /// closed in [`can_access`].
    pub async fn resolve_tier(&self, user_id: Option<Uuid>) -> String {
        let Some(user_id) = user_id else {
            return Tier::Free.to_string();
        };

        match self.subscriptions.active_tier_for(user_id).await {
            Ok(Some(tier)) => tier,
            Ok(None) => Tier::Free.to_string(),
            Err(err) => {
                error!(%user_id, "failed to resolve subscription tier: {err:#}");
                Tier::Free.to_string()
            }
        }
    }

    #[must_use]
    pub fn can_access(&self, user_tier: &str, required_tier: &str) -> bool {
        can_access(user_tier, required_tier)
    }
}
