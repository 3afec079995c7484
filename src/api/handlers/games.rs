use super::auth::optional_identity;
use crate::{
    api::error::{ApiError, ErrorBody},
    auth::AuthFlow,
    catalog::{Catalog, GameListing, GameManifest},
};
use axum::{
    Json,
    extract::{Extension, Path},
    http::HeaderMap,
};
use std::sync::Arc;
use tracing::instrument;

#[utoipa::path(
    get,
    path = "/api/games",
    responses(
        (status = 200, description = "Games the caller's tier can open", body = GameListing),
        (status = 500, description = "Database error", body = ErrorBody)
    ),
    tag = "games"
)]
#[instrument(skip_all)]
pub async fn list_games(
    headers: HeaderMap,
    flow: Extension<Arc<AuthFlow>>,
    catalog: Extension<Arc<Catalog>>,
) -> Result<Json<GameListing>, ApiError> {
    let identity = optional_identity(&headers, &flow);
    Ok(Json(catalog.list(identity).await?))
}

#[utoipa::path(
    get,
    path = "/api/games/{slug}/manifest",
    params(("slug" = String, Path, description = "Game slug")),
    responses(
        (status = 200, description = "Game manifest", body = GameManifest),
        (status = 403, description = "Subscription tier required", body = ErrorBody),
        (status = 404, description = "Game or manifest not found", body = ErrorBody),
        (status = 500, description = "Invalid manifest format", body = ErrorBody)
    ),
    tag = "games"
)]
#[instrument(skip(headers, flow, catalog))]
pub async fn game_manifest(
    headers: HeaderMap,
    Path(slug): Path<String>,
    flow: Extension<Arc<AuthFlow>>,
    catalog: Extension<Arc<Catalog>>,
) -> Result<Json<GameManifest>, ApiError> {
    let identity = optional_identity(&headers, &flow);
    Ok(Json(catalog.manifest(identity, &slug).await?))
}
