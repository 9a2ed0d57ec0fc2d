//! URL accessibility probing.
//!
//! A probe answers one question before a media element commits to a load:
//! does the remote resource answer with a success status? Probes never fail
//! across their boundary. Every outcome, including an invalid URL or a
//! transport failure, is folded into a [`ProbeResult`].

use std::time::Duration;

use async_trait::async_trait;
use memento_core::logging::targets;

use crate::http::HttpClient;

/// Default timeout for a single probe request.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of probing a URL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProbeResult {
    /// Whether a probe was actually performed.
    pub tested: bool,
    /// Whether the resource answered with a 2xx status.
    pub accessible: bool,
    /// Status code of the final response, if one was received.
    pub http_status: Option<u16>,
    /// Diagnostic message for inaccessible resources.
    pub error_message: Option<String>,
}

impl ProbeResult {
    /// A successful probe with the given status.
    pub fn accessible(status: u16) -> Self {
        Self {
            tested: true,
            accessible: true,
            http_status: Some(status),
            error_message: None,
        }
    }

    /// A probe that received a non-success status.
    pub fn status(status: u16) -> Self {
        Self {
            tested: true,
            accessible: false,
            http_status: Some(status),
            error_message: Some(format!("HTTP {status}")),
        }
    }

    /// A probe that failed before any response arrived.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            tested: true,
            accessible: false,
            http_status: None,
            error_message: Some(message.into()),
        }
    }

    /// Whether the server answered at all, even with an error status.
    pub fn responded(&self) -> bool {
        self.http_status.is_some()
    }
}

/// Checks whether a URL is reachable.
#[async_trait]
pub trait UrlProbe: Send + Sync {
    /// Probe `url`. Never panics and never returns an error.
    async fn check(&self, url: &str) -> ProbeResult;
}

/// Probe backed by a body-less HTTP `HEAD` request.
///
/// Servers that reject `HEAD` with `405 Method Not Allowed` or
/// `501 Not Implemented` are retried once with a single-byte ranged `GET`.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: HttpClient,
    timeout: Duration,
}

impl HttpProbe {
    /// Create a probe using `client` and the default timeout.
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn ranged_get(&self, url: &str) -> ProbeResult {
        match self
            .client
            .get(url)
            .header("range", "bytes=0-0")
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) if response.is_success() => ProbeResult::accessible(response.status()),
            Ok(response) => ProbeResult::status(response.status()),
            Err(err) => ProbeResult::failed(err.to_string()),
        }
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new(HttpClient::new())
    }
}

#[async_trait]
impl UrlProbe for HttpProbe {
    #[tracing::instrument(skip(self), target = "memento_net::probe", level = "debug")]
    async fn check(&self, url: &str) -> ProbeResult {
        let result = match self.client.head(url).timeout(self.timeout).send().await {
            Ok(response) if response.is_success() => ProbeResult::accessible(response.status()),
            Ok(response) if matches!(response.status(), 405 | 501) => {
                tracing::debug!(
                    target: targets::PROBE,
                    status = response.status(),
                    "HEAD rejected, retrying with ranged GET"
                );
                self.ranged_get(url).await
            }
            Ok(response) => ProbeResult::status(response.status()),
            Err(err) => ProbeResult::failed(err.to_string()),
        };

        if result.accessible {
            tracing::debug!(target: targets::PROBE, status = ?result.http_status, "accessible");
        } else {
            tracing::warn!(
                target: targets::PROBE,
                url,
                status = ?result.http_status,
                error = result.error_message.as_deref().unwrap_or_default(),
                "resource not accessible"
            );
        }
        result
    }
}
