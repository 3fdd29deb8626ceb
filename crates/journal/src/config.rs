//! Keyed store configuration.

use std::time::Duration;

/// Default number of commit attempts before giving up.
pub const DEFAULT_MAX_RETRIES: usize = 10;

/// Default age after which a loaded table is re-read before serving reads.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(1);

/// Default pause after losing a commit race.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(1);

/// Keyed store configuration parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Commit attempts per write operation (default: 10).
    pub max_retries: usize,

    /// Table age that triggers a reload on read (default: 1s).
    pub stale_after: Duration,

    /// Sleep between attempts after a lost race (default: 1ms).
    pub retry_backoff: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            max_retries: DEFAULT_MAX_RETRIES,
            stale_after: DEFAULT_STALE_AFTER,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl StoreConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the commit attempt limit (builder pattern).
    pub fn with_max_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    /// Set the staleness window (builder pattern).
    pub fn with_stale_after(mut self, d: Duration) -> Self {
        self.stale_after = d;
        self
    }

    /// Set the retry backoff (builder pattern).
    pub fn with_retry_backoff(mut self, d: Duration) -> Self {
        self.retry_backoff = d;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        if self.retry_backoff > Duration::from_secs(60) {
            return Err(ConfigError::BackoffTooLong(self.retry_backoff));
        }
        Ok(())
    }

    /// Create a configuration for tests: every read reloads and retries
    /// do not sleep.
    pub fn for_testing() -> Self {
        StoreConfig {
            max_retries: 100,
            stale_after: Duration::ZERO,
            retry_backoff: Duration::ZERO,
        }
    }
}

/// Keyed store configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No commit attempt would ever be made.
    #[error("max_retries must be at least 1")]
    ZeroRetries,

    /// Retry backoff is unreasonably long.
    #[error("retry backoff {0:?} exceeds 60s")]
    BackoffTooLong(Duration),
}

impl From<ConfigError> for zed_core::Error {
    fn from(e: ConfigError) -> Self {
        zed_core::Error::InvalidConfig(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.stale_after, Duration::from_secs(1));
        assert_eq!(config.retry_backoff, Duration::from_millis(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = StoreConfig::new()
            .with_max_retries(3)
            .with_stale_after(Duration::from_millis(50));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.stale_after, Duration::from_millis(50));
    }

    #[test]
    fn test_validate() {
        assert_eq!(
            StoreConfig::new().with_max_retries(0).validate(),
            Err(ConfigError::ZeroRetries)
        );
        assert!(StoreConfig::new()
            .with_retry_backoff(Duration::from_secs(61))
            .validate()
            .is_err());
        assert!(StoreConfig::for_testing().validate().is_ok());
    }
}
