//! Image download.
//!
//! [`ImageFetcher`] is the seam between the request pipeline and the network.
//! [`HttpFetcher`] is the real implementation: one GET per call, bounded by a
//! timeout, no retries.

use std::error::Error as StdError;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap};

use crate::config::FetchConfig;

/// Downloaded bytes plus what the server declared about them.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub bytes: Vec<u8>,
    /// Lower-cased MIME type without parameters.
    pub content_type: String,
    /// `Content-Length` as declared by the server.
    pub content_length: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// DNS, connect, timeout, non-2xx status, or body read failure.
    #[error("{cause}")]
    Request { cause: String },
    #[error("URL did not return an image. Content-Type: {content_type}")]
    NotAnImage {
        content_type: String,
        content_length: Option<u64>,
    },
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request {
            cause: error_chain(&err),
        }
    }
}

/// Source of image bytes for the pipeline.
///
/// # Example
///
/// ```rust,no_run
/// use photo_metadata::fetch::{HttpFetcher, ImageFetcher};
/// use std::time::Duration;
///
/// # async fn example() -> anyhow::Result<()> {
/// let fetcher = HttpFetcher::new(Duration::from_secs(10), "photo-metadata")?;
/// let raw = fetcher.fetch("https://example.com/photo.jpg").await?;
/// println!("{} bytes of {}", raw.bytes.len(), raw.content_type);
/// # Ok(())
/// # }
/// ```
#[async_trait::async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Download `url`, failing with [`FetchError::NotAnImage`] when the
    /// response does not declare an `image/*` content type.
    async fn fetch(&self, url: &str) -> Result<RawImage, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    pub fn from_config(config: &FetchConfig) -> Result<Self, FetchError> {
        Self::new(config.timeout(), &config.user_agent)
    }
}

#[async_trait::async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<RawImage, FetchError> {
        let response = self.client.get(url).send().await?.error_for_status()?;

        let content_type = declared_content_type(response.headers());
        let content_length = declared_content_length(response.headers());
        log::info!(
            "Downloaded content-type={content_type} length={}",
            content_length.map_or_else(|| "unknown".to_string(), |n| n.to_string())
        );

        if !content_type.starts_with("image/") {
            return Err(FetchError::NotAnImage {
                content_type,
                content_length,
            });
        }

        let bytes = response.bytes().await?;
        Ok(RawImage {
            bytes: bytes.to_vec(),
            content_type,
            content_length,
        })
    }
}

/// Normalize a `Content-Type` header value: drop parameters, trim, lower-case.
pub fn normalize_content_type(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn declared_content_type(headers: &HeaderMap) -> String {
    let raw = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    normalize_content_type(raw)
}

fn declared_content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Render an error with all of its sources, e.g.
/// `error sending request for url (...): client error (Connect): Connection refused`.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{image_host, sample_exif, spawn_server};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(Duration::from_millis(500), "photo-metadata-tests").unwrap()
    }

    #[test]
    fn content_type_normalization() {
        assert_eq!(normalize_content_type("image/jpeg"), "image/jpeg");
        assert_eq!(normalize_content_type("IMAGE/PNG; charset=binary"), "image/png");
        assert_eq!(normalize_content_type(" text/html ;q=1"), "text/html");
        assert_eq!(normalize_content_type(""), "");
    }

    #[tokio::test]
    async fn downloads_image() {
        let addr = spawn_server(image_host()).await;

        let raw = fetcher()
            .fetch(&format!("http://{addr}/photo.jpg"))
            .await
            .unwrap();

        assert_eq!(raw.content_type, "image/jpeg");
        assert_eq!(raw.bytes, sample_exif().jpeg());
        assert_eq!(raw.content_length, Some(raw.bytes.len() as u64));
    }

    #[tokio::test]
    async fn strips_content_type_parameters() {
        let addr = spawn_server(image_host()).await;

        let raw = fetcher()
            .fetch(&format!("http://{addr}/shouting.jpg"))
            .await
            .unwrap();

        assert_eq!(raw.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn html_is_not_an_image() {
        let addr = spawn_server(image_host()).await;

        let err = fetcher()
            .fetch(&format!("http://{addr}/page.html"))
            .await
            .unwrap_err();

        match err {
            FetchError::NotAnImage { content_type, .. } => assert_eq!(content_type, "text/html"),
            other => panic!("expected NotAnImage, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_content_type_is_not_an_image() {
        let addr = spawn_server(image_host()).await;

        let err = fetcher()
            .fetch(&format!("http://{addr}/untyped"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::NotAnImage { ref content_type, .. } if content_type.is_empty()));
    }

    #[tokio::test]
    async fn http_404_is_a_request_error() {
        let addr = spawn_server(image_host()).await;

        let err = fetcher()
            .fetch(&format!("http://{addr}/missing.jpg"))
            .await
            .unwrap_err();

        match err {
            FetchError::Request { cause } => assert!(cause.contains("404"), "cause: {cause}"),
            other => panic!("expected Request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let addr = spawn_server(image_host()).await;

        let err = fetcher()
            .fetch(&format!("http://{addr}/slow.jpg"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Request { .. }));
    }

    #[tokio::test]
    async fn refused_connection_is_a_request_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = fetcher()
            .fetch(&format!("http://{addr}/photo.jpg"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Request { .. }));
    }

    #[tokio::test]
    async fn malformed_url_is_a_request_error() {
        let err = fetcher().fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::Request { .. }));
    }

    #[test]
    fn not_an_image_message() {
        let err = FetchError::NotAnImage {
            content_type: "text/html".into(),
            content_length: None,
        };
        assert_eq!(
            err.to_string(),
            "URL did not return an image. Content-Type: text/html"
        );
    }
}
