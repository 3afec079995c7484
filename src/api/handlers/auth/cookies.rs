//! `Set-Cookie` values for the access and refresh tokens, and cookie lookup.

use crate::auth::AuthConfig;
use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue, SET_COOKIE},
};
use tracing::error;

pub const ACCESS_COOKIE_NAME: &str = "token";
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";
const ACCESS_COOKIE_PATH: &str = "/";
// Browsers only send the refresh token to the refresh endpoint.
const REFRESH_COOKIE_PATH: &str = "/api/refresh";

fn cookie(
    name: &str,
    value: &str,
    path: &str,
    max_age: u64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}={value}; Path={path}; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub fn access_cookie(config: &AuthConfig, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    cookie(
        ACCESS_COOKIE_NAME,
        token,
        ACCESS_COOKIE_PATH,
        config.access_token_ttl().as_secs(),
        config.cookie_secure(),
    )
}

pub fn refresh_cookie(config: &AuthConfig, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    cookie(
        REFRESH_COOKIE_NAME,
        token,
        REFRESH_COOKIE_PATH,
        config.refresh_token_ttl().as_secs(),
        config.cookie_secure(),
    )
}

pub fn clear_access_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    cookie(ACCESS_COOKIE_NAME, "", ACCESS_COOKIE_PATH, 0, config.cookie_secure())
}

pub fn clear_refresh_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    cookie(REFRESH_COOKIE_NAME, "", REFRESH_COOKIE_PATH, 0, config.cookie_secure())
}

/// Append a cookie, logging instead of failing when the value is not a valid header.
pub fn append(headers: &mut HeaderMap, cookie: Result<HeaderValue, InvalidHeaderValue>) {
    match cookie {
        Ok(value) => {
            headers.append(SET_COOKIE, value);
        }
        Err(err) => error!("Failed to build cookie: {err}"),
    }
}

/// Both clear cookies, in the order login, register and logout emit them.
pub fn cleared(config: &AuthConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    append(&mut headers, clear_access_cookie(config));
    append(&mut headers, clear_refresh_cookie(config));
    headers
}

/// Value of the named cookie from the request `Cookie` headers, if present and non-empty.
#[must_use]
pub fn read(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| val.trim().to_string())
        })
        .filter(|val| !val.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use std::time::Duration;

    fn config(secure: bool) -> AuthConfig {
        AuthConfig::new(SecretString::from("secret".to_string()))
            .with_access_token_ttl(Duration::from_secs(900))
            .with_refresh_token_ttl(Duration::from_secs(3600))
            .with_cookie_secure(secure)
    }

    #[test]
    fn access_cookie_attributes() -> Result<(), InvalidHeaderValue> {
        let value = access_cookie(&config(false), "abc")?;
        assert_eq!(
            value.to_str().ok(),
            Some("token=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=900")
        );
        Ok(())
    }

    #[test]
    fn refresh_cookie_is_scoped_and_secure() -> Result<(), InvalidHeaderValue> {
        let value = refresh_cookie(&config(true), "xyz")?;
        assert_eq!(
            value.to_str().ok(),
            Some("refresh_token=xyz; Path=/api/refresh; HttpOnly; SameSite=Lax; Max-Age=3600; Secure")
        );
        Ok(())
    }

    #[test]
    fn cleared_emits_both() {
        let headers = cleared(&config(false));
        let values: Vec<_> = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        assert_eq!(
            values,
            [
                "token=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
                "refresh_token=; Path=/api/refresh; HttpOnly; SameSite=Lax; Max-Age=0",
            ]
        );
    }

    #[test]
    fn read_finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; refresh_token=r1; token=a1"),
        );
        assert_eq!(read(&headers, "token").as_deref(), Some("a1"));
        assert_eq!(read(&headers, "refresh_token").as_deref(), Some("r1"));
        assert_eq!(read(&headers, "missing"), None);
    }

    #[test]
    fn read_ignores_empty_values() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("token="));
        assert_eq!(read(&headers, "token"), None);
    }
}
