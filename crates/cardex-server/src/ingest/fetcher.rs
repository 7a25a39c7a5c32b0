//! Bulk file download

use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{SyncError, SyncResult};

/// Streams remote bulk files to local disk
///
/// The body is never held in memory as a whole; chunks go straight to
/// `<dest>.part`, which is renamed into place once the transfer completes.
#[derive(Clone)]
pub struct BulkFetcher {
    client: reqwest::Client,
}

impl BulkFetcher {
    /// Create a fetcher with its own HTTP client
    pub fn new(connect_timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("cardex-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Create a fetcher around an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Download `url` to `dest`, returning the number of bytes written
    pub async fn fetch_to_file(&self, url: &str, dest: &Path) -> SyncResult<u64> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!(url = %url, dest = %dest.display(), "Downloading bulk file");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::Fetch(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Fetch(format!("HTTP {} for {}", status, url)));
        }

        let part_path = part_path(dest);
        let written = match stream_body(response, &part_path).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part_path).await;
                return Err(e);
            }
        };

        if written == 0 {
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(SyncError::Fetch(format!("Empty body for {}", url)));
        }

        tokio::fs::rename(&part_path, dest).await?;

        info!(url = %url, bytes = written, "Download complete");
        Ok(written)
    }
}

async fn stream_body(response: reqwest::Response, part_path: &Path) -> SyncResult<u64> {
    let mut file = tokio::fs::File::create(part_path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| SyncError::Fetch(format!("Transfer interrupted: {}", e)))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    debug!(path = %part_path.display(), bytes = written, "Body written");
    Ok(written)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_writes_body_and_creates_dir() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/AllPrintings.json.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("nested/AllPrintings.json.gz");
        let fetcher = BulkFetcher::with_client(reqwest::Client::new());

        let written = fetcher
            .fetch_to_file(&format!("{}/AllPrintings.json.gz", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(written, 4096);
        assert_eq!(std::fs::read(&dest).unwrap().len(), 4096);
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_non_success_status_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("AllPricesToday.json.gz");
        let fetcher = BulkFetcher::with_client(reqwest::Client::new());

        let err = fetcher.fetch_to_file(&server.uri(), &dest).await.unwrap_err();

        assert!(matches!(err, SyncError::Fetch(ref msg) if msg.contains("503")));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_empty_body_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("AllPricesToday.json.gz");
        let fetcher = BulkFetcher::with_client(reqwest::Client::new());

        let err = fetcher.fetch_to_file(&server.uri(), &dest).await.unwrap_err();

        assert!(matches!(err, SyncError::Fetch(_)));
        assert!(!dest.exists());
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_error() {
        let dir = TempDir::new().unwrap();
        let fetcher = BulkFetcher::new(Duration::from_millis(200)).unwrap();

        let err = fetcher
            .fetch_to_file("http://127.0.0.1:1/AllPrintings.json.gz", &dir.path().join("x.gz"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "fetch");
    }

    #[test]
    fn test_part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("/data/AllPrintings.json.gz")),
            PathBuf::from("/data/AllPrintings.json.gz.part")
        );
    }
}
