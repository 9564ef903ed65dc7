// # HTTP Metadata Snapshot Source
//
// Fetches the declarative snapshot from the instance metadata server.
//
// ## Protocol
//
// - `GET {url}?recursive=true&alt=json` with `Metadata-Flavor: Google`
// - With hanging GETs enabled, the server holds the request until metadata
//   changes or `timeout_sec` elapses. The `ETag` of the previous response is
//   sent back as `last_etag` so only real changes return early.
//
// After any failure the tag resets to `NONE`, so the next request returns
// immediately with the full current state.

use fwdip_core::config::MetadataConfig;
use fwdip_core::traits::SnapshotSource;
use fwdip_core::{Error, Result, Snapshot};

use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Header the metadata server requires on every request
pub const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";

/// Value for [`METADATA_FLAVOR_HEADER`]
pub const METADATA_FLAVOR: &str = "Google";

/// Tag sent before the first successful response
const INITIAL_ETAG: &str = "NONE";

/// Snapshot source backed by the metadata HTTP server
pub struct HttpSnapshotSource {
    /// Base URL, e.g. `http://169.254.169.254/computeMetadata/v1/`
    url: String,

    /// Hold requests until metadata changes
    wait_for_change: bool,

    /// Server-side hold time for hanging GETs
    wait_timeout: Duration,

    /// Tag of the last response seen
    etag: Mutex<String>,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpSnapshotSource {
    /// Create a source from metadata configuration
    pub fn new(config: &MetadataConfig) -> Result<Self> {
        config.validate()?;

        // Hanging GETs legitimately take up to wait_timeout
        let mut timeout = Duration::from_secs(config.timeout_secs);
        if config.wait_for_change {
            timeout += Duration::from_secs(config.wait_timeout_secs);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: config.url.clone(),
            wait_for_change: config.wait_for_change,
            wait_timeout: Duration::from_secs(config.wait_timeout_secs),
            etag: Mutex::new(INITIAL_ETAG.to_string()),
            client,
        })
    }

    /// Whether `fetch` blocks until a change
    pub fn waits_for_change(&self) -> bool {
        self.wait_for_change
    }

    /// Query parameters for the next request
    fn query(&self, last_etag: &str) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("recursive", "true".to_string()),
            ("alt", "json".to_string()),
        ];
        if self.wait_for_change {
            query.push(("wait_for_change", "true".to_string()));
            query.push(("timeout_sec", self.wait_timeout.as_secs().to_string()));
            query.push(("last_etag", last_etag.to_string()));
        }
        query
    }

    async fn request(&self, last_etag: &str) -> Result<(Snapshot, Option<String>)> {
        let response = self
            .client
            .get(&self.url)
            .query(&self.query(last_etag))
            .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR)
            .send()
            .await
            .map_err(|e| Error::metadata(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::metadata(format!("HTTP error: {}", status)));
        }

        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let snapshot = response
            .json::<Snapshot>()
            .await
            .map_err(|e| Error::metadata(format!("Failed to decode metadata snapshot: {}", e)))?;

        Ok((snapshot, etag))
    }
}

#[async_trait::async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(&self) -> Result<Snapshot> {
        let mut etag = self.etag.lock().await;

        match self.request(&etag).await {
            Ok((snapshot, new_etag)) => {
                if let Some(tag) = new_etag {
                    debug!("Metadata etag {} -> {}", etag, tag);
                    *etag = tag;
                }
                Ok(snapshot)
            }
            Err(e) => {
                warn!("Metadata fetch from {} failed: {}", self.url, e);
                *etag = INITIAL_ETAG.to_string();
                Err(e)
            }
        }
    }

    fn source_name(&self) -> &'static str {
        "metadata-http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const BODY: &str = r#"{
        "instance": {
            "attributes": {"enable-wsfc": "true"},
            "networkInterfaces": [
                {"mac": "42:01:0a:80:00:02", "forwardedIps": ["10.0.0.5"]}
            ]
        },
        "project": {"attributes": {}}
    }"#;

    /// Serve one canned response and hand back the raw request
    async fn serve_once(status: &str, etag: Option<&str>, body: &str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let status = status.to_string();
        let etag = etag.map(str::to_string);
        let body = body.to_string();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();

            let mut response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
                status,
                body.len()
            );
            if let Some(tag) = etag {
                response.push_str(&format!("ETag: {}\r\n", tag));
            }
            response.push_str("\r\n");
            response.push_str(&body);
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request
        });

        (format!("http://{}/computeMetadata/v1/", addr), handle)
    }

    fn config(url: String, wait_for_change: bool) -> MetadataConfig {
        MetadataConfig {
            url,
            timeout_secs: 5,
            wait_for_change,
            wait_timeout_secs: 60,
        }
    }

    #[test]
    fn test_query_without_wait() {
        let source = HttpSnapshotSource::new(&config("http://localhost/".into(), false)).unwrap();
        let query = source.query("NONE");
        assert_eq!(
            query,
            vec![("recursive", "true".to_string()), ("alt", "json".to_string())]
        );
    }

    #[test]
    fn test_query_with_wait() {
        let source = HttpSnapshotSource::new(&config("http://localhost/".into(), true)).unwrap();
        let query = source.query("abc123");
        assert!(query.contains(&("wait_for_change", "true".to_string())));
        assert!(query.contains(&("timeout_sec", "60".to_string())));
        assert!(query.contains(&("last_etag", "abc123".to_string())));
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(HttpSnapshotSource::new(&config("ftp://localhost/".into(), false)).is_err());
    }

    #[tokio::test]
    async fn test_fetch_decodes_and_tracks_etag() {
        let (url, server) = serve_once("200 OK", Some("etag-1"), BODY).await;
        let source = HttpSnapshotSource::new(&config(url, true)).unwrap();

        let snapshot = source.fetch().await.unwrap();
        let request = server.await.unwrap();

        assert_eq!(snapshot.network_interfaces().len(), 1);
        assert_eq!(snapshot.network_interfaces()[0].forwarded_ips, vec!["10.0.0.5"]);
        assert_eq!(snapshot.instance.attributes.enable_wsfc.as_deref(), Some("true"));

        let lower = request.to_ascii_lowercase();
        assert!(lower.contains("metadata-flavor: google"));
        assert!(request.contains("recursive=true"));
        assert!(request.contains("last_etag=NONE"));
        assert_eq!(*source.etag.lock().await, "etag-1");
    }

    #[tokio::test]
    async fn test_http_error_resets_etag() {
        let (url, server) = serve_once("503 Service Unavailable", None, "").await;
        let source = HttpSnapshotSource::new(&config(url, true)).unwrap();
        *source.etag.lock().await = "stale".to_string();

        let err = source.fetch().await.unwrap_err();
        server.await.unwrap();

        assert!(matches!(err, Error::Metadata(_)));
        assert_eq!(*source.etag.lock().await, INITIAL_ETAG);
    }

    #[tokio::test]
    async fn test_undecodable_body_is_metadata_error() {
        let (url, server) = serve_once("200 OK", None, "not json").await;
        let source = HttpSnapshotSource::new(&config(url, false)).unwrap();

        let err = source.fetch().await.unwrap_err();
        server.await.unwrap();
        assert!(matches!(err, Error::Metadata(_)));
    }
}
