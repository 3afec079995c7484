//! Login, token refresh and logout.

use super::{
    cookies::{self, REFRESH_COOKIE_NAME},
    types::{
        LoginRequest, LoginResponse, LoginUser, LogoutRequest, MessageResponse, RefreshResponse,
    },
};
use crate::{
    api::error::{ApiError, ErrorBody},
    auth::AuthFlow,
};
use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, instrument};

#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; token cookies set", body = LoginResponse),
        (status = 400, description = "Malformed body", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 500, description = "Session could not be created", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    flow: Extension<Arc<AuthFlow>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let mut headers = cookies::cleared(flow.config());

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!("login payload rejected: {rejection}");
            return (headers, ApiError::bad_request("Bad request")).into_response();
        }
    };

    match flow.login(&request.email, &request.password).await {
        Ok(logged_in) => {
            cookies::append(
                &mut headers,
                cookies::access_cookie(flow.config(), &logged_in.tokens.access_token),
            );
            cookies::append(
                &mut headers,
                cookies::refresh_cookie(flow.config(), &logged_in.tokens.refresh_token),
            );
            let body = LoginResponse {
                token: logged_in.tokens.access_token,
                refresh_token: logged_in.tokens.refresh_token,
                expires_in: logged_in.tokens.expires_in,
                user: LoginUser {
                    email: logged_in.user.email,
                },
            };
            (StatusCode::OK, headers, Json(body)).into_response()
        }
        Err(err) => (headers, ApiError::from(err)).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/refresh",
    responses(
        (status = 200, description = "New access token issued", body = RefreshResponse),
        (status = 401, description = "Refresh token missing, invalid, revoked or expired", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn refresh(headers: HeaderMap, flow: Extension<Arc<AuthFlow>>) -> Response {
    let token = cookies::read(&headers, REFRESH_COOKIE_NAME);

    match flow.refresh(token.as_deref()).await {
        Ok(grant) => {
            let mut response_headers = HeaderMap::new();
            cookies::append(
                &mut response_headers,
                cookies::access_cookie(flow.config(), &grant.access_token),
            );
            let body = RefreshResponse {
                token: grant.access_token,
                expires_in: grant.expires_in,
            };
            (StatusCode::OK, response_headers, Json(body)).into_response()
        }
        Err(err) => ApiError::from(err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/logout",
    request_body(
        content = LogoutRequest,
        description = "Optional. Without a refresh token here the refresh_token cookie is used."
    ),
    responses(
        (status = 200, description = "Session revoked and cookies cleared", body = MessageResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout(
    headers: HeaderMap,
    flow: Extension<Arc<AuthFlow>>,
    payload: Result<Json<LogoutRequest>, JsonRejection>,
) -> Response {
    let from_body = match payload {
        Ok(Json(request)) => request.refresh_token.filter(|t| !t.is_empty()),
        Err(rejection) => {
            debug!("logout without a JSON body: {rejection}");
            None
        }
    };
    let token = from_body.or_else(|| cookies::read(&headers, REFRESH_COOKIE_NAME));
    flow.logout(token.as_deref()).await;

    // Always clear the cookies, even if no session was found.
    let response_headers = cookies::cleared(flow.config());
    (
        StatusCode::OK,
        response_headers,
        Json(MessageResponse::new("Logged out successfully")),
    )
        .into_response()
}
