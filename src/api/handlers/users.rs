//! Profile endpoints. Every route requires an access token and only acts on the caller.

use super::auth::{
    require_identity,
    types::{MessageResponse, UpdateUserRequest, UserView},
};
use crate::{
    api::error::{ApiError, ErrorBody},
    auth::{AuthFlow, ProfileUpdate},
};
use axum::{
    Json,
    extract::{Extension, Path, rejection::JsonRejection},
    http::HeaderMap,
};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

// A path id that is not a UUID cannot be the caller's, so it falls through to the 403 check.
fn parse_id(id: &str) -> Uuid {
    Uuid::parse_str(id).unwrap_or_else(|_| Uuid::nil())
}

#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Current user", body = UserView),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn me(
    headers: HeaderMap,
    flow: Extension<Arc<AuthFlow>>,
) -> Result<Json<UserView>, ApiError> {
    let identity = require_identity(&headers, &flow)?;
    let user = flow.current_user(identity).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User profile", body = UserView),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Not the caller's profile", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn get_user(
    headers: HeaderMap,
    Path(id): Path<String>,
    flow: Extension<Arc<AuthFlow>>,
) -> Result<Json<UserView>, ApiError> {
    let identity = require_identity(&headers, &flow)?;
    let user = flow.profile(identity, parse_id(&id)).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserView),
        (status = 400, description = "Invalid email or password", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Not the caller's profile", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 409, description = "Email already exists", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn update_user(
    headers: HeaderMap,
    Path(id): Path<String>,
    flow: Extension<Arc<AuthFlow>>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserView>, ApiError> {
    let identity = require_identity(&headers, &flow)?;
    let id = parse_id(&id);
    if identity.user_id != id {
        return Err(ApiError::new(
            axum::http::StatusCode::FORBIDDEN,
            "Access denied: You can only update your own profile",
        ));
    }

    let Json(request) = payload.map_err(|rejection| {
        debug!("update payload rejected: {rejection}");
        ApiError::bad_request("Invalid request body")
    })?;

    let user = flow
        .update_profile(
            identity,
            id,
            ProfileUpdate {
                email: request.email,
                password: request.password,
                confirm_password: request.confirm_password,
            },
        )
        .await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Account deleted and sessions revoked", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Not the caller's account", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn delete_user(
    headers: HeaderMap,
    Path(id): Path<String>,
    flow: Extension<Arc<AuthFlow>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let identity = require_identity(&headers, &flow)?;
    flow.delete_account(identity, parse_id(&id)).await?;
    Ok(Json(MessageResponse::new("User deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_falls_back_to_nil() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()), id);
        assert_eq!(parse_id("not-a-uuid"), Uuid::nil());
    }
}
