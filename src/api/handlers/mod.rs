//! Route handlers.

pub mod auth;
pub mod games;
pub mod health;
pub mod users;
