//! HTTP peer fetcher.
//!
//! Client side of the peer protocol: `GET {base_url}{group}/{key}` with both
//! path segments percent-encoded, raw value bytes in the response body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::domain::ports::{FetchRequest, FetchResponse, PeerFetcher};
use crate::error::{Error, Result};

/// [`PeerFetcher`] talking to one remote node over HTTP
#[derive(Clone)]
pub struct HttpFetcher {
    /// Peer URL joined with the pool base path, e.g. `http://10.0.0.2:8001/_peercache/`
    base_url: String,
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with its own client
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::with_client(base_url, client))
    }

    /// Create a fetcher sharing an existing client's connection pool
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    fn url_for(&self, request: &FetchRequest) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            urlencoding::encode(&request.group),
            urlencoding::encode(&request.key)
        )
    }

    fn peer_error(&self, reason: impl ToString) -> Error {
        Error::Peer {
            peer: self.base_url.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl PeerFetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let url = self.url_for(request);
        debug!("fetching {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.peer_error(e))?;

        if !response.status().is_success() {
            return Err(Error::PeerStatus {
                peer: self.base_url.clone(),
                status: response.status().as_u16(),
            });
        }

        let value = response.bytes().await.map_err(|e| self.peer_error(e))?;
        Ok(FetchResponse { value })
    }

    fn peer_id(&self) -> &str {
        &self.base_url
    }
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_url_encodes_segments() {
        let fetcher = HttpFetcher::new("http://10.0.0.2:8001/_peercache/", Duration::from_secs(1)).unwrap();
        let url = fetcher.url_for(&FetchRequest::new("my scores", "a/b?c"));
        assert_eq!(url, "http://10.0.0.2:8001/_peercache/my%20scores/a%2Fb%3Fc");
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_peer_error() {
        // bind then drop to get a port nothing listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let base = format!("http://127.0.0.1:{}/_peercache/", port);
        let fetcher = HttpFetcher::new(base.clone(), Duration::from_secs(2)).unwrap();

        let err = fetcher
            .fetch(&FetchRequest::new("scores", "Tom"))
            .await
            .unwrap_err();
        assert_matches!(err, Error::Peer { ref peer, .. } if *peer == base);
        assert!(err.is_peer());
        assert_eq!(fetcher.peer_id(), base);
    }
}
