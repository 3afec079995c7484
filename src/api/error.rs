//! One error type for every handler, rendered as `{"error": "<message>"}`.

use crate::{
    auth::{AuthError, ErrorCategory},
    catalog::CatalogError,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

const fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorCategory::Conflict => StatusCode::CONFLICT,
        ErrorCategory::Forbidden => StatusCode::FORBIDDEN,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = status_for(err.category());
        if let AuthError::Internal { message, source } = &err {
            error!("{message}: {source:#}");
        }
        Self::new(status, err.to_string())
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        let status = match &err {
            CatalogError::GameNotFound | CatalogError::ManifestNotFound => StatusCode::NOT_FOUND,
            CatalogError::TierRequired(_) => StatusCode::FORBIDDEN,
            CatalogError::InvalidManifest(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CatalogError::Store(source) => {
                error!("catalog store failure: {source:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PolicyViolation;
    use axum::body::to_bytes;

    #[test]
    fn auth_errors_map_to_status() {
        let cases = [
            (AuthError::InvalidEmail, StatusCode::BAD_REQUEST),
            (
                AuthError::WeakPassword(PolicyViolation::MissingSymbol),
                StatusCode::BAD_REQUEST,
            ),
            (AuthError::PasswordMismatch, StatusCode::BAD_REQUEST),
            (AuthError::EmailTaken, StatusCode::CONFLICT),
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::Unauthorized("Invalid token"), StatusCode::UNAUTHORIZED),
            (AuthError::Forbidden("no"), StatusCode::FORBIDDEN),
            (AuthError::NotFound("User not found"), StatusCode::NOT_FOUND),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn internal_error_hides_source() {
        let err = ApiError::from(AuthError::internal(
            "Failed to create session",
            anyhow::anyhow!("duplicate key value violates unique constraint"),
        ));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "Failed to create session");
    }

    #[test]
    fn catalog_errors_map_to_status() {
        assert_eq!(
            ApiError::from(CatalogError::GameNotFound).status(),
            StatusCode::NOT_FOUND
        );
        let tier = ApiError::from(CatalogError::TierRequired("premium".to_string()));
        assert_eq!(tier.status(), StatusCode::FORBIDDEN);
        assert_eq!(tier.message(), "Subscription tier required: premium");
        let store = ApiError::from(CatalogError::Store(anyhow::anyhow!("pool timed out")));
        assert_eq!(store.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(store.message(), "Database error");
    }

    #[tokio::test]
    async fn renders_json_body() -> Result<(), Box<dyn std::error::Error>> {
        let response = ApiError::unauthorized("Missing token").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let value: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(value["error"], "Missing token");
        Ok(())
    }
}
