//! Engine configuration.
//!
//! All fields have defaults, so an empty document is a valid configuration:
//!
//! ```toml
//! max_attempts = 3
//! load_timeout_ms = 15000
//! visibility_threshold = 0.5
//!
//! [retry]
//! first_ms = 500
//! factor = 2.0
//! max_ms = 4000
//! jitter = "none"
//! ```

use std::sync::Arc;
use std::time::Duration;

use memento_net::{HttpClient, HttpProbe, NetworkQualityDetector, UrlProbe};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::retry::{JitterPolicy, RetryPolicy};

/// Backoff settings as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub first_ms: u64,
    pub factor: f64,
    pub max_ms: u64,
    pub jitter: JitterPolicy,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            first_ms: 500,
            factor: 2.0,
            max_ms: 4000,
            jitter: JitterPolicy::None,
        }
    }
}

impl RetrySettings {
    /// The policy these settings describe.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            first: Duration::from_millis(self.first_ms),
            max: Duration::from_millis(self.max_ms),
            factor: self.factor,
            jitter: self.jitter,
        }
    }
}

/// Tunables of the media engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MediaConfig {
    /// Load and play attempts allowed before an explicit retry is required.
    pub max_attempts: u32,
    /// Bounded wait for an element to become playable.
    pub load_timeout_ms: u64,
    /// Timeout of low-priority preloads.
    pub preload_timeout_ms: u64,
    /// Timeout of accessibility probes.
    pub probe_timeout_ms: u64,
    /// Probe round-trip below which the network counts as fast.
    pub fast_network_threshold_ms: u64,
    /// Visible fraction above which an asset becomes current.
    pub visibility_threshold: f64,
    /// Delay between `ended` and advancing to the next asset.
    pub advance_debounce_ms: u64,
    pub retry: RetrySettings,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            load_timeout_ms: 15_000,
            preload_timeout_ms: 10_000,
            probe_timeout_ms: 5_000,
            fast_network_threshold_ms: 500,
            visibility_threshold: 0.5,
            advance_debounce_ms: 400,
            retry: RetrySettings::default(),
        }
    }
}

impl MediaConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(document: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts", "must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.visibility_threshold) {
            return Err(ConfigError::invalid(
                "visibility_threshold",
                format!("{} is outside [0, 1)", self.visibility_threshold),
            ));
        }
        if !self.retry.factor.is_finite() || self.retry.factor < 1.0 {
            return Err(ConfigError::invalid("retry.factor", "must be finite and >= 1"));
        }
        if self.retry.first_ms > self.retry.max_ms {
            return Err(ConfigError::invalid("retry.first_ms", "exceeds retry.max_ms"));
        }
        Ok(())
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn preload_timeout(&self) -> Duration {
        Duration::from_millis(self.preload_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn fast_network_threshold(&self) -> Duration {
        Duration::from_millis(self.fast_network_threshold_ms)
    }

    pub fn advance_debounce(&self) -> Duration {
        Duration::from_millis(self.advance_debounce_ms)
    }

    /// The configured backoff policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.policy()
    }

    /// An HTTP probe with the configured timeout.
    pub fn http_probe(&self, client: HttpClient) -> HttpProbe {
        HttpProbe::new(client).with_timeout(self.probe_timeout())
    }

    /// A quality detector probing `reference_url` with the configured
    /// fast/slow threshold.
    pub fn quality_detector(
        &self,
        probe: Arc<dyn UrlProbe>,
        reference_url: impl Into<String>,
    ) -> NetworkQualityDetector {
        NetworkQualityDetector::new(probe, reference_url)
            .with_fast_threshold(self.fast_network_threshold())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config = MediaConfig::from_toml("").unwrap();
        assert_eq!(config, MediaConfig::default());
        assert_eq!(config.load_timeout(), Duration::from_secs(15));
        assert_eq!(config.preload_timeout(), Duration::from_secs(10));
        assert_eq!(config.probe_timeout(), Duration::from_secs(5));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn partial_override() {
        let config = MediaConfig::from_toml(
            r#"
            max_attempts = 5
            advance_debounce_ms = 0

            [retry]
            jitter = "equal"
            "#,
        )
        .unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.advance_debounce(), Duration::ZERO);
        assert_eq!(config.retry.jitter, JitterPolicy::Equal);
        assert_eq!(config.retry.first_ms, 500);
    }

    #[test]
    fn network_timeouts_reach_collaborators() {
        let config = MediaConfig::from_toml(
            r#"
            probe_timeout_ms = 1500
            fast_network_threshold_ms = 250
            "#,
        )
        .unwrap();

        let probe = config.http_probe(HttpClient::new());
        assert_eq!(probe.timeout(), Duration::from_millis(1500));

        let detector = config.quality_detector(Arc::new(probe), "https://cdn.example.com/ping");
        assert_eq!(detector.fast_threshold(), Duration::from_millis(250));
    }

    #[test]
    fn rejects_unknown_field() {
        assert!(matches!(
            MediaConfig::from_toml("max_atempts = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_out_of_range() {
        let err = MediaConfig::from_toml("visibility_threshold = 1.5").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "visibility_threshold",
                ..
            }
        ));
        assert!(MediaConfig::from_toml("max_attempts = 0").is_err());
    }
}
