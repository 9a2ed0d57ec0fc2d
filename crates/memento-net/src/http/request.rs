//! HTTP request types and builder.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use super::client::HttpClient;
use super::response::HttpResponse;
use crate::error::{NetworkError, Result};

/// HTTP request methods used by the probing layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// HTTP GET method.
    Get,
    /// HTTP HEAD method.
    Head,
}

impl HttpMethod {
    /// Convert to reqwest method.
    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Head => reqwest::Method::HEAD,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Head => write!(f, "HEAD"),
        }
    }
}

/// Builder for constructing HTTP requests.
pub struct HttpRequestBuilder {
    client: HttpClient,
    method: HttpMethod,
    url: String,
    headers: HeaderMap,
    timeout: Option<Duration>,
    invalid_header: Option<String>,
}

impl HttpRequestBuilder {
    /// Create a new request builder.
    pub(crate) fn new(client: HttpClient, method: HttpMethod, url: String) -> Self {
        Self {
            client,
            method,
            url,
            headers: HeaderMap::new(),
            timeout: None,
            invalid_header: None,
        }
    }

    /// Add a header to the request.
    ///
    /// An invalid name or value is reported when the request is sent.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => self.invalid_header = Some(format!("{name}: {value}")),
        }
        self
    }

    /// Override the client timeout for this request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The request method.
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// The request URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send the request and return the response head.
    pub async fn send(self) -> Result<HttpResponse> {
        if let Some(header) = self.invalid_header {
            return Err(NetworkError::Request(format!("invalid header {header}")));
        }
        let url = url::Url::parse(&self.url)?;

        let mut req_builder = self
            .client
            .reqwest_client()
            .request(self.method.to_reqwest(), url)
            .headers(self.headers);

        if let Some(timeout) = self.timeout {
            req_builder = req_builder.timeout(timeout);
        }

        tracing::trace!(
            target: memento_core::logging::targets::HTTP,
            method = %self.method,
            url = %self.url,
            "sending request"
        );
        let response = req_builder.send().await?;
        Ok(HttpResponse::from_reqwest(response))
    }
}
