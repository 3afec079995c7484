//! Accounts, credentials and sessions.

pub mod account;
pub mod config;
pub mod error;
pub mod flow;
pub mod password;
pub mod sessions;
pub mod tier;
pub mod token;
pub mod utils;

pub use account::ProfileUpdate;
pub use config::AuthConfig;
pub use error::{AuthError, ErrorCategory};
pub use flow::{AccessGrant, AuthFlow, Authenticated, Identity, TokenPair};
pub use password::{
    MAX_HASH_COST, MIN_HASH_COST, PasswordError, PasswordPolicy, PolicyViolation,
};
pub use sessions::{SessionError, SessionStore};
pub use tier::{Tier, TierAuthorizer};
pub use token::{Claims, TokenCodec, TokenError, TokenKind};
