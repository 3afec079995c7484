//! Process-wide auth configuration, assembled once at startup.

use super::{
    password::PasswordPolicy,
    sessions::DEFAULT_SWEEP_INTERVAL,
    token::{DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL},
};
use secrecy::SecretString;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    jwt_secret: SecretString,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
    session_sweep_interval: Duration,
    cookie_secure: bool,
    password_policy: PasswordPolicy,
}

impl AuthConfig {
    #[must_use]
    pub fn new(jwt_secret: SecretString) -> Self {
        Self {
            jwt_secret,
            access_token_ttl: DEFAULT_ACCESS_TTL,
            refresh_token_ttl: DEFAULT_REFRESH_TTL,
            session_sweep_interval: DEFAULT_SWEEP_INTERVAL,
            cookie_secure: false,
            password_policy: PasswordPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_access_token_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_token_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_session_sweep_interval(mut self, interval: Duration) -> Self {
        self.session_sweep_interval = interval;
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.password_policy = policy;
        self
    }

    #[must_use]
    pub fn jwt_secret(&self) -> &SecretString {
        &self.jwt_secret
    }

    #[must_use]
    pub fn access_token_ttl(&self) -> Duration {
        self.access_token_ttl
    }

    #[must_use]
    pub fn refresh_token_ttl(&self) -> Duration {
        self.refresh_token_ttl
    }

    #[must_use]
    pub fn session_sweep_interval(&self) -> Duration {
        self.session_sweep_interval
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    #[must_use]
    pub fn password_policy(&self) -> &PasswordPolicy {
        &self.password_policy
    }
}
