//! Network quality classification.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use memento_core::logging::targets;
use parking_lot::Mutex;

use crate::error::NetworkError;
use crate::probe::UrlProbe;

/// Round-trip time below which a probed connection counts as fast.
pub const DEFAULT_FAST_THRESHOLD: Duration = Duration::from_millis(500);

/// Coarse network quality used to pick a preload strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkQuality {
    /// Full preloads are affordable.
    Fast,
    /// Metadata-only preloads.
    Slow,
    /// No network work should be started.
    Offline,
}

impl NetworkQuality {
    /// Whether any network work may be started.
    pub fn is_online(self) -> bool {
        !matches!(self, Self::Offline)
    }
}

impl fmt::Display for NetworkQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Slow => write!(f, "slow"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// Platform-reported effective connection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionHint {
    /// `slow-2g`
    Slow2g,
    /// `2g`
    TwoG,
    /// `3g`
    ThreeG,
    /// `4g`
    FourG,
}

impl ConnectionHint {
    /// Quality implied by this hint.
    pub fn quality(self) -> NetworkQuality {
        match self {
            Self::FourG => NetworkQuality::Fast,
            Self::Slow2g | Self::TwoG | Self::ThreeG => NetworkQuality::Slow,
        }
    }
}

impl FromStr for ConnectionHint {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slow-2g" => Ok(Self::Slow2g),
            "2g" => Ok(Self::TwoG),
            "3g" => Ok(Self::ThreeG),
            "4g" => Ok(Self::FourG),
            other => Err(NetworkError::Request(format!(
                "unknown connection type: {other}"
            ))),
        }
    }
}

/// Classifies the current connection as fast, slow or offline.
///
/// A platform [`ConnectionHint`] wins when one is available. Otherwise a
/// timed probe against a reference URL decides: failure to get any answer
/// means offline, an answer within the threshold means fast.
pub struct NetworkQualityDetector {
    probe: Arc<dyn UrlProbe>,
    reference_url: String,
    fast_threshold: Duration,
    hint: Mutex<Option<ConnectionHint>>,
}

impl NetworkQualityDetector {
    /// Create a detector that probes `reference_url` through `probe`.
    pub fn new(probe: Arc<dyn UrlProbe>, reference_url: impl Into<String>) -> Self {
        Self {
            probe,
            reference_url: reference_url.into(),
            fast_threshold: DEFAULT_FAST_THRESHOLD,
            hint: Mutex::new(None),
        }
    }

    /// Override the fast/slow round-trip threshold.
    pub fn with_fast_threshold(mut self, threshold: Duration) -> Self {
        self.fast_threshold = threshold;
        self
    }

    pub fn fast_threshold(&self) -> Duration {
        self.fast_threshold
    }

    /// Record (or clear) the platform connection hint.
    pub fn set_hint(&self, hint: Option<ConnectionHint>) {
        *self.hint.lock() = hint;
    }

    /// The current platform connection hint.
    pub fn hint(&self) -> Option<ConnectionHint> {
        *self.hint.lock()
    }

    /// Determine the current network quality.
    pub async fn detect(&self) -> NetworkQuality {
        if let Some(hint) = self.hint() {
            let quality = hint.quality();
            tracing::debug!(target: targets::NETWORK, ?hint, %quality, "quality from hint");
            return quality;
        }

        let started = tokio::time::Instant::now();
        let result = self.probe.check(&self.reference_url).await;
        let elapsed = started.elapsed();

        let quality = if !result.accessible && !result.responded() {
            NetworkQuality::Offline
        } else if elapsed < self.fast_threshold {
            NetworkQuality::Fast
        } else {
            NetworkQuality::Slow
        };
        tracing::debug!(
            target: targets::NETWORK,
            elapsed_ms = elapsed.as_millis() as u64,
            %quality,
            "quality from timed probe"
        );
        quality
    }
}

impl fmt::Debug for NetworkQualityDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkQualityDetector")
            .field("reference_url", &self.reference_url)
            .field("fast_threshold", &self.fast_threshold)
            .field("hint", &self.hint())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeResult;
    use async_trait::async_trait;

    struct DelayedProbe {
        delay: Duration,
        result: ProbeResult,
    }

    #[async_trait]
    impl UrlProbe for DelayedProbe {
        async fn check(&self, _url: &str) -> ProbeResult {
            tokio::time::sleep(self.delay).await;
            self.result.clone()
        }
    }

    fn detector(delay_ms: u64, result: ProbeResult) -> NetworkQualityDetector {
        NetworkQualityDetector::new(
            Arc::new(DelayedProbe {
                delay: Duration::from_millis(delay_ms),
                result,
            }),
            "https://cdn.example.com/ping",
        )
    }

    #[test]
    fn hint_parsing() {
        assert_eq!("slow-2g".parse::<ConnectionHint>().ok(), Some(ConnectionHint::Slow2g));
        assert_eq!("4G".parse::<ConnectionHint>().ok(), Some(ConnectionHint::FourG));
        assert!("5g".parse::<ConnectionHint>().is_err());
    }

    #[test]
    fn hint_quality() {
        assert_eq!(ConnectionHint::FourG.quality(), NetworkQuality::Fast);
        assert_eq!(ConnectionHint::ThreeG.quality(), NetworkQuality::Slow);
        assert_eq!(ConnectionHint::Slow2g.quality(), NetworkQuality::Slow);
    }

    #[tokio::test(start_paused = true)]
    async fn hint_short_circuits_probe() {
        let detector = detector(10_000, ProbeResult::failed("unreachable"));
        detector.set_hint(Some(ConnectionHint::FourG));
        assert_eq!(detector.detect().await, NetworkQuality::Fast);
    }

    #[tokio::test(start_paused = true)]
    async fn quick_probe_is_fast() {
        let detector = detector(120, ProbeResult::accessible(200));
        assert_eq!(detector.detect().await, NetworkQuality::Fast);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_is_slow() {
        let detector = detector(900, ProbeResult::accessible(200));
        assert_eq!(detector.detect().await, NetworkQuality::Slow);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_probe_is_offline() {
        let detector = detector(10, ProbeResult::failed("connection refused"));
        assert_eq!(detector.detect().await, NetworkQuality::Offline);
        assert!(!NetworkQuality::Offline.is_online());
    }

    #[tokio::test(start_paused = true)]
    async fn error_status_still_counts_as_online() {
        let detector = detector(10, ProbeResult::status(404));
        assert_eq!(detector.detect().await, NetworkQuality::Fast);
    }
}
