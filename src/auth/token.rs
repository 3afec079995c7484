//! HS256 signed access and refresh tokens.
//!
//! The claim set is closed: a token missing `id`, `type`, `exp` or `jti` does not decode.
//! [`TokenCodec::verify`] checks signature and expiry only; callers compare [`Claims::kind`]
//! against the kind they expect.

use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::{Error as JwtError, ErrorKind},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

pub const MIN_SECRET_BYTES: usize = 32;
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("signing secret is empty")]
    EmptySecret,
    #[error("malformed token")]
    Malformed,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("failed to encode token: {0}")]
    Encoding(#[source] JwtError),
}

impl From<JwtError> for TokenError {
    fn from(err: JwtError) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            _ => Self::Malformed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access => write!(f, "access"),
            Self::Refresh => write!(f, "refresh"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Subject user id.
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Expiry, unix seconds.
    pub exp: i64,
    /// Per-token nonce; two tokens minted in the same second still differ.
    pub jti: Uuid,
}

fn seconds(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec around the process signing secret.
    ///
    /// # Errors
    /// Returns [`TokenError::EmptySecret`] when the secret is empty. Short secrets are accepted
    /// with a warning.
    pub fn new(
        secret: SecretString,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<Self, TokenError> {
        let secret = secret.expose_secret().as_bytes();
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        if secret.len() < MIN_SECRET_BYTES {
            warn!(
                "JWT secret is only {} bytes; use at least {MIN_SECRET_BYTES} bytes of random data",
                secret.len()
            );
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        })
    }

    #[must_use]
    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    /// Mint a token of `kind` for `user_id`, expiring after that kind's TTL.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be encoded.
    pub fn issue(&self, user_id: Uuid, kind: TokenKind) -> Result<String, TokenError> {
        self.issue_at(user_id, kind, Utc::now().timestamp())
    }

    /// Same as [`TokenCodec::issue`] with an explicit clock.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be encoded.
    pub fn issue_at(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        now_unix_seconds: i64,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            id: user_id,
            kind,
            exp: now_unix_seconds.saturating_add(seconds(self.ttl(kind))),
            jti: Uuid::new_v4(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Encoding)
    }

    fn validation(check_exp: bool) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = check_exp;
        validation.set_required_spec_claims(&["exp"]);
        validation
    }

    /// Check signature and expiry, returning the decoded claims.
    ///
    /// # Errors
    /// [`TokenError::Malformed`], [`TokenError::InvalidSignature`] or [`TokenError::Expired`].
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        Ok(decode::<Claims>(token, &self.decoding, &Self::validation(true))?.claims)
    }

    /// Same as [`TokenCodec::verify`] against an explicit clock. A token is still valid in
    /// the second named by its `exp`.
    ///
    /// # Errors
    /// [`TokenError::Malformed`], [`TokenError::InvalidSignature`] or [`TokenError::Expired`].
    pub fn verify_at(&self, token: &str, now_unix_seconds: i64) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding, &Self::validation(false))?.claims;
        if claims.exp < now_unix_seconds {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}
