//! HTTP client for Memento.
//!
//! A thin layer over `reqwest` that the probing and network-quality code share.
//! Only request heads are ever fetched.
//!
//! # Example
//!
//! ```ignore
//! use memento_net::http::HttpClient;
//!
//! let client = HttpClient::builder()
//!     .timeout(Duration::from_secs(5))
//!     .build()?;
//!
//! let response = client.head("https://cdn.example.com/song.mp3").send().await?;
//! println!("Status: {}", response.status());
//! ```

mod client;
mod request;
mod response;

pub use client::{HttpClient, HttpClientBuilder, HttpClientConfig};
pub use request::{HttpMethod, HttpRequestBuilder};
pub use response::HttpResponse;
