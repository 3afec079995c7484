use crate::{
    api::{self, ServerConfig},
    auth::{AuthConfig, PasswordPolicy},
    cli::commands::auth::Options,
};
use anyhow::Result;
use std::{path::PathBuf, time::Duration};
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub db_max_connections: u32,
    pub games_dir: PathBuf,
    pub auth: Options,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let policy = PasswordPolicy::new().with_min_length(args.auth.password_min_length);
    let auth = AuthConfig::new(args.auth.jwt_secret)
        .with_access_token_ttl(args.auth.access_token_ttl)
        .with_refresh_token_ttl(args.auth.refresh_token_ttl)
        .with_session_sweep_interval(args.auth.session_sweep_interval)
        .with_cookie_secure(args.auth.cookie_secure)
        .with_password_policy(policy);

    api::new(ServerConfig {
        port: args.port,
        dsn: args.dsn,
        db_max_connections: args.db_max_connections,
        auth,
        games_dir: args.games_dir,
    })
    .await
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("agent", crate::APP_USER_AGENT.to_string()),
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        ("db_max_connections", args.db_max_connections.to_string()),
        ("games_dir", args.games_dir.display().to_string()),
        (
            "access_token_ttl",
            humantime_str(args.auth.access_token_ttl),
        ),
        (
            "refresh_token_ttl",
            humantime_str(args.auth.refresh_token_ttl),
        ),
        (
            "session_sweep_interval",
            humantime_str(args.auth.session_sweep_interval),
        ),
        (
            "password_min_length",
            args.auth.password_min_length.to_string(),
        ),
        ("cookie_secure", args.auth.cookie_secure.to_string()),
    ];
    log_entries("Startup configuration", &entries);
}

fn humantime_str(duration: Duration) -> String {
    humantime::format_duration(duration).to_string()
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "gamegate {} - {}\n\n{title}:",
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
