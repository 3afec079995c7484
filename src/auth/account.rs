//! Self-service profile operations. Callers may only touch their own account.

use super::{
    error::AuthError,
    flow::{AuthFlow, Identity},
    utils::{normalize_email, valid_email},
};
use crate::db::{UpdateUser, UserRecord};
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Fields a profile update may carry. `email` is required; the password is only changed when
/// `password` is present.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub email: String,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

impl AuthFlow {
    /// # Errors
    /// [`AuthError::NotFound`] when the caller's account no longer exists.
    pub async fn current_user(&self, identity: Identity) -> Result<UserRecord, AuthError> {
        self.users
            .find_by_id(identity.user_id)
            .await
            .map_err(|e| AuthError::internal("Internal server error", e))?
            .ok_or(AuthError::NotFound("User not found"))
    }

    /// # Errors
    /// [`AuthError::Forbidden`] for anyone but the owner, [`AuthError::NotFound`] when gone.
    pub async fn profile(&self, identity: Identity, id: Uuid) -> Result<UserRecord, AuthError> {
        if identity.user_id != id {
            return Err(AuthError::Forbidden(
                "Access denied: You can only view your own profile",
            ));
        }
        self.current_user(identity).await
    }

    /// # Errors
    /// Ownership, then email format, then existence, then email conflicts, then password rules.
    #[instrument(skip_all, fields(user_id = %id))]
    pub async fn update_profile(
        &self,
        identity: Identity,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<UserRecord, AuthError> {
        if identity.user_id != id {
            return Err(AuthError::Forbidden(
                "Access denied: You can only update your own profile",
            ));
        }

        let email = normalize_email(&update.email);
        if !valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }

        self.users
            .find_by_id(id)
            .await
            .map_err(|e| AuthError::internal("Internal server error", e))?
            .ok_or(AuthError::NotFound("User not found"))?;

        if let Some(other) = self
            .users
            .find_by_email(&email)
            .await
            .map_err(|e| AuthError::internal("Internal server error", e))?
        {
            if other.id != id {
                return Err(AuthError::EmailTaken);
            }
        }

        let password_hash = match update.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => {
                if let Some(confirm) = update.confirm_password.as_deref() {
                    if confirm != password {
                        return Err(AuthError::PasswordMismatch);
                    }
                }
                self.passwords().validate_strength(password)?;
                Some(
                    self.passwords()
                        .hash(password)
                        .await
                        .map_err(|e| AuthError::internal("Failed to hash password", e))?,
                )
            }
            None => None,
        };

        match self
            .users
            .update(id, &email, password_hash.as_deref())
            .await
            .map_err(|e| AuthError::internal("Failed to update user", e))?
        {
            UpdateUser::Updated(user) => {
                info!(password_changed = password_hash.is_some(), "profile updated");
                Ok(user)
            }
            UpdateUser::NotFound => Err(AuthError::NotFound("User not found")),
            UpdateUser::EmailTaken => Err(AuthError::EmailTaken),
        }
    }

    /// Soft-delete the caller's account and revoke all of its sessions.
    ///
    /// # Errors
    /// [`AuthError::Forbidden`] for anyone but the owner, [`AuthError::NotFound`] when gone.
    #[instrument(skip_all, fields(user_id = %id))]
    pub async fn delete_account(&self, identity: Identity, id: Uuid) -> Result<(), AuthError> {
        if identity.user_id != id {
            return Err(AuthError::Forbidden(
                "Access denied: You can only delete your own account",
            ));
        }

        let deleted = self
            .users
            .soft_delete(id)
            .await
            .map_err(|e| AuthError::internal("Failed to delete user", e))?;
        if !deleted {
            return Err(AuthError::NotFound("User not found"));
        }

        if let Err(err) = self.sessions.revoke_all_for_user(id).await {
            error!("account deleted but sessions were not revoked: {err}");
        }

        info!("account deleted");
        Ok(())
    }
}
