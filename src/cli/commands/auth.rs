use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;
use std::time::Duration;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_ACCESS_TOKEN_TTL: &str = "access-token-ttl";
pub const ARG_REFRESH_TOKEN_TTL: &str = "refresh-token-ttl";
pub const ARG_SESSION_SWEEP_INTERVAL: &str = "session-sweep-interval";
pub const ARG_PASSWORD_MIN_LENGTH: &str = "password-min-length";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";

#[derive(Debug)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub session_sweep_interval: Duration,
    pub password_min_length: usize,
    pub cookie_secure: bool,
}

impl Options {
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let jwt_secret = matches
            .get_one::<String>(ARG_JWT_SECRET)
            .cloned()
            .map(SecretString::from)
            .context("missing required argument: --jwt-secret")?;

        let duration = |name: &str| -> Result<Duration> {
            matches
                .get_one::<Duration>(name)
                .copied()
                .with_context(|| format!("missing required argument: --{name}"))
        };

        Ok(Self {
            jwt_secret,
            access_token_ttl: duration(ARG_ACCESS_TOKEN_TTL)?,
            refresh_token_ttl: duration(ARG_REFRESH_TOKEN_TTL)?,
            session_sweep_interval: duration(ARG_SESSION_SWEEP_INTERVAL)?,
            password_min_length: matches
                .get_one::<usize>(ARG_PASSWORD_MIN_LENGTH)
                .copied()
                .unwrap_or(crate::auth::password::DEFAULT_MIN_LENGTH),
            cookie_secure: matches.get_flag(ARG_COOKIE_SECURE),
        })
    }
}

/// Upper bound for any configured lifetime or interval: 100 years as humantime counts them.
pub const MAX_DURATION: Duration = Duration::from_secs(100 * 31_557_600);

/// humantime duration (`15m`, `24h`, `7d`) that must be longer than zero and at most
/// [`MAX_DURATION`], so expiry timestamps derived from it stay representable.
fn positive_duration(value: &str) -> Result<Duration, String> {
    let duration = humantime::parse_duration(value).map_err(|e| e.to_string())?;
    if duration.is_zero() {
        return Err("duration must be greater than zero".to_string());
    }
    if duration > MAX_DURATION {
        return Err(format!(
            "duration must not exceed {}",
            humantime::format_duration(MAX_DURATION)
        ));
    }
    Ok(duration)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("HMAC secret used to sign access and refresh tokens")
                .long_help(
                    "HMAC secret used to sign access and refresh tokens. Use at least 32 bytes; shorter secrets are accepted with a warning.",
                )
                .env("GAMEGATE_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL)
                .long(ARG_ACCESS_TOKEN_TTL)
                .help("Access token lifetime, e.g. 15m or 24h")
                .env("GAMEGATE_ACCESS_TOKEN_TTL")
                .default_value("24h")
                .value_parser(positive_duration),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL)
                .long(ARG_REFRESH_TOKEN_TTL)
                .help("Refresh token and session lifetime, e.g. 7d")
                .env("GAMEGATE_REFRESH_TOKEN_TTL")
                .default_value("7d")
                .value_parser(positive_duration),
        )
        .arg(
            Arg::new(ARG_SESSION_SWEEP_INTERVAL)
                .long(ARG_SESSION_SWEEP_INTERVAL)
                .help("How often expired and revoked sessions are deleted")
                .env("GAMEGATE_SESSION_SWEEP_INTERVAL")
                .default_value("24h")
                .value_parser(positive_duration),
        )
        .arg(
            Arg::new(ARG_PASSWORD_MIN_LENGTH)
                .long(ARG_PASSWORD_MIN_LENGTH)
                .help("Minimum password length in bytes (capped at 72)")
                .env("GAMEGATE_PASSWORD_MIN_LENGTH")
                .default_value("8")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark token cookies Secure (set when served over HTTPS)")
                .env("GAMEGATE_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_duration_parses_humantime() {
        assert_eq!(positive_duration("15m"), Ok(Duration::from_secs(900)));
        assert_eq!(positive_duration("7d"), Ok(Duration::from_secs(604_800)));
        assert!(positive_duration("0s").is_err());
        assert!(positive_duration("soon").is_err());
    }

    #[test]
    fn positive_duration_is_capped() {
        assert_eq!(positive_duration("100y"), Ok(MAX_DURATION));
        assert!(positive_duration("101y").is_err());
        assert!(positive_duration("1000000000y").is_err());
        assert!(
            positive_duration("300000y")
                .is_err_and(|e| e.starts_with("duration must not exceed"))
        );
    }
}
