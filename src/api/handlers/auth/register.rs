use super::{
    cookies,
    types::{RegisterRequest, RegisterResponse},
};
use crate::{
    api::error::{ApiError, ErrorBody},
    auth::AuthFlow,
};
use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, instrument};

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created and logged in", body = RegisterResponse),
        (status = 400, description = "Invalid email, weak password or mismatched confirmation", body = ErrorBody),
        (status = 409, description = "Email already exists", body = ErrorBody),
        (status = 500, description = "User or session could not be persisted", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn register(
    flow: Extension<Arc<AuthFlow>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Response {
    // Any previous login is dropped, success or not.
    let mut headers = cookies::cleared(flow.config());

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!("register payload rejected: {rejection}");
            return (headers, ApiError::bad_request("Invalid request body")).into_response();
        }
    };

    match flow
        .register(
            &request.email,
            &request.password,
            &request.confirm_password,
        )
        .await
    {
        Ok(registered) => {
            cookies::append(
                &mut headers,
                cookies::access_cookie(flow.config(), &registered.tokens.access_token),
            );
            cookies::append(
                &mut headers,
                cookies::refresh_cookie(flow.config(), &registered.tokens.refresh_token),
            );
            let body = RegisterResponse {
                user: registered.user.into(),
                token: registered.tokens.access_token,
                refresh_token: registered.tokens.refresh_token,
            };
            (StatusCode::CREATED, headers, Json(body)).into_response()
        }
        Err(err) => (headers, ApiError::from(err)).into_response(),
    }
}
