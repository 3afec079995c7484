//! Registration, login, refresh and logout, plus the cookie and identity plumbing
//! shared with the user and game handlers.

pub mod cookies;
pub mod principal;
pub mod register;
pub mod session;
pub mod types;

pub(crate) use principal::{optional_identity, require_identity};
