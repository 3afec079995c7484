use crate::cli::{
    actions::{Action, server::Args},
    commands::{self, auth::Options},
};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(commands::ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let db_max_connections = matches
        .get_one::<u32>(commands::ARG_DB_MAX_CONNECTIONS)
        .copied()
        .unwrap_or(5);
    let games_dir = matches
        .get_one::<String>(commands::ARG_GAMES_DIR)
        .map_or_else(
            || PathBuf::from(crate::catalog::DEFAULT_GAMES_DIR),
            PathBuf::from,
        );

    Ok(Action::Server(Args {
        port,
        dsn,
        db_max_connections,
        games_dir,
        auth: Options::parse(matches)?,
    }))
}
