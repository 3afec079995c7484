use super::password::PolicyViolation;
use thiserror::Error;

/// Which kind of failure an [`AuthError`] is, independent of transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Unauthenticated,
    Conflict,
    Forbidden,
    NotFound,
    Internal,
}

/// Failures produced by the auth flows.
///
/// The `Display` text is what a client may see. [`AuthError::Internal`] keeps the real cause in
/// its source chain so it can be logged without being echoed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email format")]
    InvalidEmail,
    #[error(transparent)]
    WeakPassword(#[from] PolicyViolation),
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Email already exists")]
    EmailTaken,
    /// Unknown email and wrong password both end here, with the same text.
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{message}")]
    Internal {
        message: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl AuthError {
    pub fn internal(message: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            message,
            source: source.into(),
        }
    }

    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidEmail | Self::WeakPassword(_) | Self::PasswordMismatch => {
                ErrorCategory::Validation
            }
            Self::EmailTaken => ErrorCategory::Conflict,
            Self::InvalidCredentials | Self::Unauthorized(_) => ErrorCategory::Unauthenticated,
            Self::Forbidden(_) => ErrorCategory::Forbidden,
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}
