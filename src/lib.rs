//! # Gamegate (sessions, tokens and tier-gated catalog access)
//!
//! `gamegate` authenticates players of a game-distribution site and decides which games
//! they may download.
//!
//! ## Tokens and sessions
//!
//! Login and registration mint a short-lived **access token** and a long-lived **refresh
//! token**, both HS256-signed. Every refresh token is backed by a server-side session row
//! keyed by the SHA-256 digest of the token, so a refresh token can be revoked before it
//! expires. Refreshing only mints a new access token; the refresh token is never rotated.
//!
//! Expired and revoked sessions are hard-deleted by a background sweeper that runs at
//! startup and then on a fixed interval.
//!
//! ## Accounts
//!
//! Passwords are bcrypt-hashed after passing the password policy. Accounts are soft-deleted;
//! a deleted account disappears from every lookup, its sessions are revoked, and its email
//! can be registered again.
//!
//! ## Catalog
//!
//! Games carry a required subscription tier (`free < basic < premium`). Anonymous callers
//! and users without an active subscription are `free`; unknown tier labels never grant
//! access.

pub mod api;
pub mod auth;
pub mod catalog;
pub mod cli;
pub mod db;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
