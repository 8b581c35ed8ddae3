//! [`TemplateFetcher`] implementations: a directory on disk and an HTTP base
//! URL.
//!
//! Both resolve `location` (e.g. `templates/acme-dark.json`) relative to
//! their root and parse the body as JSON.  Whether the JSON is an object is
//! checked by the resolver, not here.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::application::resolver::{FetchError, TemplateFetcher};

/// Reads overrides from `<root>/<location>`.
#[derive(Debug, Clone)]
pub struct FsTemplateFetcher {
    root: PathBuf,
}

impl FsTemplateFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl TemplateFetcher for FsTemplateFetcher {
    async fn fetch(&self, location: &str) -> Result<Value, FetchError> {
        let path = self.root.join(location);
        debug!("reading template override from {}", path.display());

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FetchError::NotFound(location.to_string()));
            }
            Err(e) => {
                return Err(FetchError::Io {
                    location: location.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        serde_json::from_str(&text).map_err(|e| FetchError::InvalidJson {
            location: location.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Fetches overrides from `<base_url>/<location>`.
#[derive(Debug, Clone)]
pub struct HttpTemplateFetcher {
    client: Client,
    base_url: String,
}

impl HttpTemplateFetcher {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, location: &str) -> String {
        format!("{}/{}", self.base_url, location.trim_start_matches('/'))
    }
}

#[async_trait]
impl TemplateFetcher for HttpTemplateFetcher {
    async fn fetch(&self, location: &str) -> Result<Value, FetchError> {
        let url = self.url_for(location);
        debug!("fetching template override from {url}");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                location: url.clone(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url));
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                location: url,
                status: status.as_u16(),
            });
        }

        resp.json::<Value>().await.map_err(|e| {
            if e.is_decode() {
                FetchError::InvalidJson {
                    location: url,
                    reason: e.to_string(),
                }
            } else {
                FetchError::Transport {
                    location: url,
                    reason: e.to_string(),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sitesync-fetch-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(dir.join("templates")).unwrap();
        dir
    }

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join("templates").join(name), body).unwrap();
    }

    #[test]
    fn test_fs_fetch_reads_json() {
        let dir = scratch_dir();
        write(&dir, "acme.json", r##"{"theme":{"primary":"#fff"}}"##);
        let fetcher = FsTemplateFetcher::new(&dir);

        let value = tokio_test::block_on(fetcher.fetch("templates/acme.json"));

        let value = tokio_test::assert_ok!(value);
        assert_eq!(value["theme"]["primary"], "#fff");
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_fs_fetch_missing_file_is_not_found() {
        let dir = scratch_dir();

        let err = FsTemplateFetcher::new(&dir)
            .fetch("templates/acme-dark.json")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::NotFound(_)));
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_fs_fetch_invalid_json() {
        let dir = scratch_dir();
        write(&dir, "broken.json", "{ not json");

        let err = FsTemplateFetcher::new(&dir)
            .fetch("templates/broken.json")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::InvalidJson { .. }));
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_http_url_joining() {
        let fetcher = HttpTemplateFetcher::new("https://cdn.example.com/site/");
        assert_eq!(
            fetcher.url_for("templates/acme.json"),
            "https://cdn.example.com/site/templates/acme.json"
        );
    }

    /// Serves one canned HTTP response on a loopback port and returns its
    /// base URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = stream.read(&mut request).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_http_server_error_is_status_error() {
        let base_url = serve_once("500 Internal Server Error", "").await;

        let err = HttpTemplateFetcher::new(&base_url)
            .fetch("templates/acme-dark.json")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_http_404_is_not_found() {
        let base_url = serve_once("404 Not Found", "").await;

        let err = HttpTemplateFetcher::new(&base_url)
            .fetch("templates/acme-dark.json")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_http_success_parses_body() {
        let base_url = serve_once("200 OK", r#"{"sections":{"hero":{}}}"#).await;

        let value = HttpTemplateFetcher::new(&base_url)
            .fetch("templates/acme-dark.json")
            .await
            .unwrap();

        assert!(value["sections"]["hero"].is_object());
    }

    #[tokio::test]
    async fn test_http_malformed_body_is_invalid_json() {
        let base_url = serve_once("200 OK", "{ not json").await;

        let err = HttpTemplateFetcher::new(&base_url)
            .fetch("templates/acme-dark.json")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::InvalidJson { .. }));
    }

    #[tokio::test]
    async fn test_http_unreachable_host_is_transport_error() {
        // Port 9 on loopback (discard) is closed on test machines.
        let fetcher = HttpTemplateFetcher::new("http://127.0.0.1:9");
        let err = fetcher.fetch("templates/acme.json").await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
    }
}
