//! Session configuration for a `Transport`.
//!
//! # Design
//! `SessionConfig` is immutable once built: fields are private and the only
//! way to obtain one is through `SessionConfigBuilder::build`, which rejects a
//! zero timeout. One `Transport` owns one configuration for its lifetime.

use std::time::Duration;

use crate::error::ConfigError;
use crate::retry::Backoff;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_MAX_REDIRECTS: u32 = 15;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Retry, redirect and timeout settings shared by every call of a `Transport`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    max_redirects: u32,
    max_retries: u32,
    timeout: Duration,
    raise_on_error: bool,
    backoff: Backoff,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            raise_on_error: true,
            backoff: Backoff::default(),
        }
    }
}

impl SessionConfig {
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Redirects followed per call before giving up.
    pub fn max_redirects(&self) -> u32 {
        self.max_redirects
    }

    /// Retries per call after transport failures.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Timeout for each attempt.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether error statuses are turned into `ApiError`s.
    pub fn raise_on_error(&self) -> bool {
        self.raise_on_error
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug, Clone, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn max_redirects(mut self, max_redirects: u32) -> Self {
        self.config.max_redirects = max_redirects;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout = Duration::from_secs(secs);
        self
    }

    pub fn raise_on_error(mut self, raise_on_error: bool) -> Self {
        self.config.raise_on_error = raise_on_error;
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.config.backoff = backoff;
        self
    }

    pub fn build(self) -> Result<SessionConfig, ConfigError> {
        if self.config.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SessionConfig::builder().build().unwrap();
        assert_eq!(config.max_retries(), 3);
        assert_eq!(config.max_redirects(), 15);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.raise_on_error());
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn builder_sets_every_field() {
        let config = SessionConfig::builder()
            .max_retries(0)
            .max_redirects(2)
            .timeout_secs(5)
            .raise_on_error(false)
            .backoff(Backoff::none())
            .build()
            .unwrap();
        assert_eq!(config.max_retries(), 0);
        assert_eq!(config.max_redirects(), 2);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert!(!config.raise_on_error());
        assert_eq!(config.backoff(), &Backoff::none());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = SessionConfig::builder().timeout(Duration::ZERO).build().unwrap_err();
        assert!(matches!(err, ConfigError::ZeroTimeout));
    }
}
