//! Register, login, refresh and logout.
//!
//! Every successful login or registration mints an access token, mints a refresh token and
//! persists a session for the refresh token. Those three steps either all succeed or the
//! caller gets an error; tokens are never handed out without a revocable session behind them.

use super::{
    config::AuthConfig,
    error::AuthError,
    password::{PasswordError, PasswordPolicy},
    sessions::{SessionError, SessionStore},
    token::{TokenCodec, TokenError, TokenKind},
    utils::{normalize_email, valid_email},
};
use crate::db::{InsertUser, Repositories, UserRecord, UserRepository};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Caller identity proven by a valid access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user: UserRecord,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone)]
pub struct AccessGrant {
    pub access_token: String,
    pub expires_in: u64,
}

pub struct AuthFlow {
    pub(super) config: AuthConfig,
    pub(super) users: Arc<dyn UserRepository>,
    pub(super) sessions: SessionStore,
    pub(super) tokens: TokenCodec,
}

impl AuthFlow {
    /// # Errors
    /// Returns an error if the signing secret is empty.
    pub fn new(config: AuthConfig, repos: &Repositories) -> Result<Self, TokenError> {
        let tokens = TokenCodec::new(
            config.jwt_secret().clone(),
            config.access_token_ttl(),
            config.refresh_token_ttl(),
        )?;
        let sessions = SessionStore::new(repos.sessions.clone(), config.refresh_token_ttl());

        Ok(Self {
            config,
            users: repos.users.clone(),
            sessions,
            tokens,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    pub(super) fn passwords(&self) -> &PasswordPolicy {
        self.config.password_policy()
    }

    /// Liveness of the backing user store.
    ///
    /// # Errors
    /// Returns the store error when it cannot be reached.
    pub async fn ping(&self) -> anyhow::Result<()> {
        self.users.ping().await
    }

    /// # Errors
    /// Validation failures first (email, strength, confirmation), then [`AuthError::EmailTaken`],
    /// then internal failures.
    #[instrument(skip_all)]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<Authenticated, AuthError> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }

        self.passwords().validate_strength(password)?;

        if password != confirm_password {
            return Err(AuthError::PasswordMismatch);
        }

        let existing = self
            .users
            .find_by_email(&email)
            .await
            .map_err(|e| AuthError::internal("Internal server error", e))?;
        if existing.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let hash = self
            .passwords()
            .hash(password)
            .await
            .map_err(|e| AuthError::internal("Failed to hash password", e))?;

        let user = match self
            .users
            .insert(&email, &hash)
            .await
            .map_err(|e| AuthError::internal("Failed to create user", e))?
        {
            InsertUser::Created(user) => user,
            InsertUser::EmailTaken => return Err(AuthError::EmailTaken),
        };

        info!(user_id = %user.id, "user registered");

        let tokens = self.issue_tokens(user.id).await?;
        Ok(Authenticated { user, tokens })
    }

    /// # Errors
    /// [`AuthError::InvalidCredentials`] for an unknown email and for a wrong password alike.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<Authenticated, AuthError> {
        let email = normalize_email(email);
        let user = self
            .users
            .find_by_email(&email)
            .await
            .map_err(|e| AuthError::internal("Internal server error", e))?
            .ok_or(AuthError::InvalidCredentials)?;

        match self.passwords().verify(&user.password_hash, password).await {
            Ok(()) => {}
            Err(PasswordError::Hashing(err)) => {
                error!(user_id = %user.id, "stored password hash is unreadable: {err}");
                return Err(AuthError::InvalidCredentials);
            }
            Err(err @ PasswordError::Task(_)) => {
                return Err(AuthError::internal("Internal server error", err));
            }
            Err(_) => return Err(AuthError::InvalidCredentials),
        }

        let tokens = self.issue_tokens(user.id).await?;
        debug!(user_id = %user.id, "login succeeded");
        Ok(Authenticated { user, tokens })
    }

    /// Mint a new access token from a refresh token. The refresh token itself is not rotated.
    ///
    /// # Errors
    /// [`AuthError::Unauthorized`] when the token is missing, its session is unusable, the
    /// token fails verification or is not a refresh token, or its user no longer exists.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<AccessGrant, AuthError> {
        let token = refresh_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Unauthorized("Refresh token required"))?;

        let user_id = match self.sessions.validate(token).await {
            Ok(user_id) => user_id,
            Err(SessionError::NotFound) => return Err(AuthError::Unauthorized("Session not found")),
            Err(SessionError::Revoked) => {
                return Err(AuthError::Unauthorized("Session has been revoked"));
            }
            Err(SessionError::Expired) => {
                return Err(AuthError::Unauthorized("Session has expired"));
            }
            Err(err @ SessionError::Store(_)) => {
                return Err(AuthError::internal("Internal server error", err));
            }
        };

        let claims = self.tokens.verify(token).map_err(|err| {
            debug!("refresh token rejected: {err}");
            AuthError::Unauthorized("Invalid refresh token")
        })?;
        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::Unauthorized("Invalid token type"));
        }
        if claims.id != user_id {
            warn!(%user_id, subject = %claims.id, "refresh token subject does not match session");
            return Err(AuthError::Unauthorized("Invalid refresh token"));
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(|e| AuthError::internal("Internal server error", e))?;
        if user.is_none() {
            if let Err(err) = self.sessions.revoke(token).await {
                error!(%user_id, "failed to revoke session of missing user: {err}");
            }
            return Err(AuthError::Unauthorized("User not found"));
        }

        let access_token = self
            .tokens
            .issue(user_id, TokenKind::Access)
            .map_err(|e| AuthError::internal("Failed to generate token", e))?;

        Ok(AccessGrant {
            access_token,
            expires_in: self.config.access_token_ttl().as_secs(),
        })
    }

    /// Revoke the presented refresh token, if any. Never fails.
    #[instrument(skip_all)]
    pub async fn logout(&self, refresh_token: Option<&str>) {
        let Some(token) = refresh_token.filter(|t| !t.is_empty()) else {
            return;
        };
        if let Err(err) = self.sessions.revoke(token).await {
            error!("failed to revoke session on logout: {err}");
        }
    }

    /// Turn a bearer token into an [`Identity`]. Only access tokens are accepted.
    ///
    /// # Errors
    /// [`AuthError::Unauthorized`] for any token that does not verify.
    pub fn authenticate(&self, access_token: &str) -> Result<Identity, AuthError> {
        match self.tokens.verify(access_token) {
            Ok(claims) if claims.kind == TokenKind::Access => Ok(Identity {
                user_id: claims.id,
            }),
            Ok(_) => Err(AuthError::Unauthorized("Invalid token")),
            Err(err) => {
                debug!("access token rejected: {err}");
                Err(AuthError::Unauthorized("Invalid token"))
            }
        }
    }

    async fn issue_tokens(&self, user_id: Uuid) -> Result<TokenPair, AuthError> {
        let access_token = self
            .tokens
            .issue(user_id, TokenKind::Access)
            .map_err(|e| AuthError::internal("Failed to generate token", e))?;
        let refresh_token = self
            .tokens
            .issue(user_id, TokenKind::Refresh)
            .map_err(|e| AuthError::internal("Failed to generate refresh token", e))?;

        self.sessions
            .create(user_id, &refresh_token)
            .await
            .map_err(|e| AuthError::internal("Failed to create session", e))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.config.access_token_ttl().as_secs(),
        })
    }
}
