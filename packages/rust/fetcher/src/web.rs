//! Live retrieval: HTTP(S) via `reqwest`, local files via `tokio::fs`.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use ladle_shared::{LadleError, Result, SourceReference};

/// User-Agent string for live requests.
const USER_AGENT: &str = concat!("Ladle/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A transport that produces a body for a reference without touching the store.
#[async_trait]
pub trait LiveSource: Send + Sync {
    /// Retrieve the current body behind `source.location`.
    async fn retrieve(&self, source: &SourceReference) -> Result<String>;

    /// Human-readable source name for tracing.
    fn name(&self) -> &str;
}

/// Default live source: `http`/`https` over the network, `file://` URLs and
/// bare paths from the local filesystem.
pub struct WebSource {
    client: Client,
}

impl WebSource {
    /// Build a source with the default request timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Build a source with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Self::build(Some(timeout))
    }

    /// Build a source whose requests never time out on their own.
    pub fn without_timeout() -> Result<Self> {
        Self::build(None)
    }

    fn build(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| LadleError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    async fn get(&self, url: &Url) -> Result<String> {
        debug!(%url, "GET");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| LadleError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LadleError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| LadleError::Network(format!("{url}: body read failed: {e}")))
    }

    async fn read_local(&self, path: PathBuf) -> Result<String> {
        debug!(path = %path.display(), "reading local document");
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| LadleError::io(path, e))
    }
}

#[async_trait]
impl LiveSource for WebSource {
    async fn retrieve(&self, source: &SourceReference) -> Result<String> {
        match locate(&source.location)? {
            Location::Remote(url) => self.get(&url).await,
            Location::Local(path) => self.read_local(path).await,
        }
    }

    fn name(&self) -> &str {
        "web"
    }
}

/// Where a location string points.
#[derive(Debug, PartialEq)]
enum Location {
    Remote(Url),
    Local(PathBuf),
}

fn locate(location: &str) -> Result<Location> {
    match Url::parse(location) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(Location::Remote(url)),
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map(Location::Local)
            .map_err(|_| LadleError::Network(format!("{location}: not a local file URL"))),
        // Single-letter schemes are Windows drive letters.
        Ok(url) if url.scheme().len() > 1 => Err(LadleError::Network(format!(
            "{location}: unsupported scheme '{}'",
            url.scheme()
        ))),
        _ => Ok(Location::Local(PathBuf::from(location))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_locate() {
        assert!(matches!(
            locate("https://example.com/a").unwrap(),
            Location::Remote(_)
        ));
        assert_eq!(
            locate("file:///tmp/page.html").unwrap(),
            Location::Local(PathBuf::from("/tmp/page.html"))
        );
        assert_eq!(
            locate("./pages/list.html").unwrap(),
            Location::Local(PathBuf::from("./pages/list.html"))
        );
        assert!(locate("ftp://example.com/a").is_err());
    }

    #[tokio::test]
    async fn test_retrieve_with_mock_server() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/list"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("<h1>List</h1>"))
            .mount(&server)
            .await;

        let source = WebSource::new().unwrap();
        let reference = SourceReference::new(format!("{}/list", server.uri()), "list");
        let body = source.retrieve(&reference).await.unwrap();
        assert_eq!(body, "<h1>List</h1>");
    }

    #[tokio::test]
    async fn test_retrieve_non_success_status() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::path("/gone"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = WebSource::new().unwrap();
        let reference = SourceReference::new(format!("{}/gone", server.uri()), "list");
        let err = source.retrieve(&reference).await.unwrap_err();
        assert!(matches!(err, LadleError::Network(_)));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_request_timeout_is_optional() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::path("/slow"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let reference = SourceReference::new(format!("{}/slow", server.uri()), "list");

        let bounded = WebSource::with_timeout(Duration::from_millis(50)).unwrap();
        let err = bounded.retrieve(&reference).await.unwrap_err();
        assert!(matches!(err, LadleError::Network(_)));

        let unbounded = WebSource::without_timeout().unwrap();
        assert_eq!(unbounded.retrieve(&reference).await.unwrap(), "late");
    }

    #[tokio::test]
    async fn test_retrieve_local_file() {
        let path = std::env::temp_dir().join(format!("ladle-web-{}.html", Uuid::now_v7()));
        std::fs::write(&path, "<p>local</p>").unwrap();

        let source = WebSource::new().unwrap();
        let reference = SourceReference::new(path.to_string_lossy(), "list");
        assert_eq!(source.retrieve(&reference).await.unwrap(), "<p>local</p>");

        let _ = std::fs::remove_file(&path);

        let err = source.retrieve(&reference).await.unwrap_err();
        assert!(matches!(err, LadleError::Io { .. }));
    }
}
