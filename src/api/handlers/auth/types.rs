//! Request/response types for auth endpoints.

use crate::db::UserRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub email: String,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

/// Public view of a user; never carries the password hash.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub created_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
}

impl From<UserRecord> for UserView {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email,
            created_date: user.created_at,
            modified_date: user.updated_at,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user: UserView,
    pub token: String,
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginUser {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user: LoginUser,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub token: String,
    pub expires_in: u64,
}

/// The refresh cookie is scoped to `/api/refresh`, so browsers never send it to logout.
/// Clients pass the token here instead.
#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn register_request_reads_camel_case() -> Result<()> {
        let request: RegisterRequest = serde_json::from_str(
            r#"{"email":"a@b.com","password":"Abcdef1!","confirmPassword":"Abcdef1!"}"#,
        )?;
        assert_eq!(request.confirm_password, "Abcdef1!");
        Ok(())
    }

    #[test]
    fn update_request_password_is_optional() -> Result<()> {
        let request: UpdateUserRequest = serde_json::from_str(r#"{"email":"a@b.com"}"#)?;
        assert_eq!(request.email, "a@b.com");
        assert!(request.password.is_none());
        assert!(request.confirm_password.is_none());
        Ok(())
    }

    #[test]
    fn logout_request_token_is_optional() -> Result<()> {
        let request: LogoutRequest = serde_json::from_str(r#"{"refreshToken":"r"}"#)?;
        assert_eq!(request.refresh_token.as_deref(), Some("r"));
        let request: LogoutRequest = serde_json::from_str("{}")?;
        assert!(request.refresh_token.is_none());
        Ok(())
    }

    #[test]
    fn user_view_hides_hash() -> Result<()> {
        let now = Utc::now();
        let view = UserView::from(UserRecord {
            id: Uuid::new_v4(),
            email: "a@b.com".to_string(),
            password_hash: "$2b$04$secret".to_string(),
            created_at: now,
            updated_at: now,
        });
        let value = serde_json::to_value(&view)?;
        let object = value.as_object().context("user view is an object")?;
        let mut keys: Vec<_> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["createdDate", "email", "id", "modifiedDate"]);
        Ok(())
    }

    #[test]
    fn login_response_shape() -> Result<()> {
        let value = serde_json::to_value(LoginResponse {
            token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_in: 86_400,
            user: LoginUser {
                email: "a@b.com".to_string(),
            },
        })?;
        assert_eq!(value["refreshToken"], "r");
        assert_eq!(value["expiresIn"], 86_400);
        assert_eq!(value["user"]["email"], "a@b.com");
        Ok(())
    }
}
