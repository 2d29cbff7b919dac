//! HTTP Peer Pool
//!
//! One `HttpPool` per node plays both sides of the peer protocol:
//!
//! - as a [`PeerPicker`] it maps keys to their owning node through a
//!   [`HashRing`] and hands out an [`HttpFetcher`] for remote owners;
//! - as a server it answers `GET {base_path}{group}/{key}` from the local
//!   [`GroupRegistry`] so other nodes can fetch keys this node owns.
//!
//! # Architecture
//!
//! ```text
//!        node A                                    node B
//! ┌──────────────────────┐                ┌──────────────────────┐
//! │ Group::get(key)      │                │ serve() accept loop  │
//! │   │ miss             │                │   │                  │
//! │   ▼                  │   GET /_peer   │   ▼                  │
//! │ HttpPool::pick_peer ─┼── cache/g/k ──▶│ HttpPool::handle     │
//! │   (HashRing → B)     │                │   │                  │
//! │   ▼                  │◀── 200 bytes ──┼── Group::get(key)    │
//! │ HttpFetcher::fetch   │                │                      │
//! └──────────────────────┘                └──────────────────────┘
//! ```
//!
//! Every node must be configured with the same peer list and replica count
//! so all rings agree on ownership. Peer URLs are compared without trailing
//! slashes, so `http://h:8001/` and `http://h:8001` name the same node.
//!
//! The pool only holds a weak reference to its [`GroupRegistry`]: groups own
//! the pool through their peer picker, and the caller owns the registry.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::RwLock;
use reqwest::Client;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use super::http_fetcher::HttpFetcher;
use crate::domain::ports::{PeerFetcher, PeerPicker};
use crate::error::{Error, Result};
use crate::group::GroupRegistry;
use crate::ring::HashRing;

/// Default path prefix of the peer endpoint
pub const DEFAULT_BASE_PATH: &str = "/_peercache/";

/// Default virtual nodes per peer
pub const DEFAULT_REPLICAS: usize = 50;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the peer pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// This node's URL as it appears in the peer list
    pub self_url: String,

    /// Path prefix of the peer endpoint; starts and ends with `/`
    pub base_path: String,

    /// Virtual nodes per peer on the ring
    pub replicas: usize,

    /// Timeout for one fetch from a remote peer
    pub fetch_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            self_url: "http://127.0.0.1:8001".to_string(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            replicas: DEFAULT_REPLICAS,
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl PoolConfig {
    pub fn new(self_url: impl Into<String>) -> Self {
        Self {
            self_url: self_url.into(),
            ..Default::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.self_url.is_empty() {
            return Err(Error::Config("self URL is empty".to_string()));
        }
        if !self.base_path.starts_with('/') || !self.base_path.ends_with('/') {
            return Err(Error::Config(format!(
                "base path must start and end with '/': {}",
                self.base_path
            )));
        }
        if self.replicas == 0 {
            return Err(Error::Config("replicas must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Canonical form of a peer URL used for ring placement and self detection
pub fn normalize_peer_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

// =============================================================================
// Pool
// =============================================================================

/// Ring and fetchers, replaced together on every membership change
struct PeerSet {
    ring: HashRing,
    fetchers: HashMap<String, Arc<HttpFetcher>>,
}

/// HTTP transport for a cluster of cache nodes
pub struct HttpPool {
    config: PoolConfig,
    groups: Weak<GroupRegistry>,
    client: Client,
    peers: RwLock<PeerSet>,
}

impl HttpPool {
    /// Create a pool serving `groups`; no peers are known until [`set_peers`](Self::set_peers)
    pub fn new(mut config: PoolConfig, groups: Arc<GroupRegistry>) -> Result<Self> {
        config.self_url = normalize_peer_url(&config.self_url);
        config.validate()?;

        let client = Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let peers = RwLock::new(PeerSet {
            ring: HashRing::new(config.replicas),
            fetchers: HashMap::new(),
        });

        Ok(Self {
            config,
            groups: Arc::downgrade(&groups),
            client,
            peers,
        })
    }

    /// Replace the peer list.
    ///
    /// `urls` names every node in the cluster, this one included. URLs are
    /// normalized and deduplicated, then the ring and fetchers are rebuilt
    /// from scratch.
    pub fn set_peers<I, S>(&self, urls: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut peers: Vec<String> = Vec::new();
        for peer in urls.into_iter().map(|p| normalize_peer_url(p.as_ref())) {
            if !peer.is_empty() && !peers.contains(&peer) {
                peers.push(peer);
            }
        }

        let mut ring = HashRing::new(self.config.replicas);
        ring.add(&peers);

        let fetchers = peers
            .iter()
            .filter(|p| **p != self.config.self_url)
            .map(|p| {
                let base_url = format!("{}{}", p, self.config.base_path);
                (p.clone(), Arc::new(HttpFetcher::with_client(base_url, self.client.clone())))
            })
            .collect();

        *self.peers.write() = PeerSet { ring, fetchers };
        info!(peers = ?peers, "peer set updated");
    }

    /// Known peers, sorted
    pub fn peers(&self) -> Vec<String> {
        self.peers.read().ring.peers()
    }

    /// Node owning `key`, or `None` when no peers are set
    pub fn owner(&self, key: &str) -> Option<String> {
        self.peers.read().ring.get(key).map(str::to_string)
    }

    pub fn self_url(&self) -> &str {
        &self.config.self_url
    }

    pub fn base_path(&self) -> &str {
        &self.config.base_path
    }

    /// Answer one peer request
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>> {
        if req.method() != Method::GET {
            return text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
        }

        let (group_name, key) = match self.parse_path(req.uri().path()) {
            Ok(parts) => parts,
            Err(e) => {
                warn!(path = req.uri().path(), "bad peer request: {}", e);
                return text(StatusCode::BAD_REQUEST, e.to_string());
            }
        };
        debug!(group = %group_name, key = %key, "serving peer request");

        let Some(groups) = self.groups.upgrade() else {
            return text(StatusCode::SERVICE_UNAVAILABLE, "group registry dropped");
        };
        let Some(group) = groups.get_group(&group_name) else {
            return text(StatusCode::NOT_FOUND, format!("no such group: {}", group_name));
        };
        group.record_server_request();

        match group.get(&key).await {
            Ok(view) => {
                let mut response = Response::new(Full::new(view.bytes()));
                response.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/octet-stream"),
                );
                response
            }
            Err(e) => text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }

    /// Split `{base_path}{group}/{key}` into decoded group and key
    fn parse_path(&self, path: &str) -> Result<(String, String)> {
        let rest = path
            .strip_prefix(self.config.base_path.as_str())
            .ok_or_else(|| Error::Transport(format!("unexpected path: {}", path)))?;

        let (group, key) = rest
            .split_once('/')
            .filter(|(g, k)| !g.is_empty() && !k.is_empty())
            .ok_or_else(|| Error::Transport(format!("expected {{group}}/{{key}}: {}", path)))?;

        let decode = |segment: &str| {
            urlencoding::decode(segment)
                .map(|s| s.into_owned())
                .map_err(|e| Error::Transport(format!("bad path encoding: {}", e)))
        };
        Ok((decode(group)?, decode(key)?))
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerFetcher>> {
        let peers = self.peers.read();
        let owner = peers.ring.get(key)?;
        if owner == self.config.self_url {
            return None;
        }

        debug!(peer = owner, key, "picked peer");
        peers
            .fetchers
            .get(owner)
            .map(|f| Arc::clone(f) as Arc<dyn PeerFetcher>)
    }
}

impl std::fmt::Debug for HttpPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPool")
            .field("self_url", &self.config.self_url)
            .field("base_path", &self.config.base_path)
            .field("peers", &self.peers())
            .finish()
    }
}

fn text(status: StatusCode, body: impl Into<String>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.into())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

// =============================================================================
// Server
// =============================================================================

/// Serve peer requests on `listener` until accepting fails
pub async fn serve(pool: Arc<HttpPool>, listener: TcpListener) -> Result<()> {
    let addr = listener
        .local_addr()
        .map_err(|e| Error::Transport(format!("Peer server address error: {}", e)))?;
    info!("Peer server listening on {}", addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Transport(format!("Peer server accept error: {}", e)))?;

        let io = TokioIo::new(stream);
        let pool = Arc::clone(&pool);

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let pool = Arc::clone(&pool);
                async move { Ok::<_, Infallible>(pool.handle(req).await) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("Peer server connection error: {}", e);
            }
        });
    }
}

// =============================================================================
// Tests
// =============================================================================
