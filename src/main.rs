//! peercache node
//!
//! Runs one member of a peercache cluster with a demo `scores` group.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         peercache node                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │  Peer server │    │  API server  │    │ Admin server │       │
//! │  │ /_peercache/ │    │   /api?key=  │    │ /metrics     │       │
//! │  │              │    │  (optional)  │    │ /healthz     │       │
//! │  └──────┬───────┘    └──────┬───────┘    └──────┬───────┘       │
//! │         └───────────────────┼───────────────────┘               │
//! │                             ▼                                    │
//! │                GroupRegistry ── HttpPool (ring)                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use clap::Parser;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use peercache::adapters::{
    normalize_peer_url, serve, HttpPool, InMemorySource, PoolConfig, DEFAULT_BASE_PATH,
};
use peercache::error::{Error, Result};
use peercache::group::{Group, GroupRegistry};
use peercache::metrics::{encode_text, RegistryCollector};

// =============================================================================
// CLI Arguments
// =============================================================================

/// peercache - distributed read-through cache node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Peer server bind address
    #[arg(long, env = "PEERCACHE_ADDR", default_value = "0.0.0.0:8001")]
    addr: String,

    /// This node's URL as listed in --peers
    #[arg(long, env = "PEERCACHE_SELF_URL", default_value = "http://127.0.0.1:8001")]
    self_url: String,

    /// All cluster nodes, this one included (comma separated)
    #[arg(long, env = "PEERCACHE_PEERS", value_delimiter = ',')]
    peers: Vec<String>,

    /// Virtual nodes per peer on the hash ring
    #[arg(long, env = "PEERCACHE_REPLICAS", default_value = "50")]
    replicas: usize,

    /// Byte budget of the demo group's cache (0 = unbounded)
    #[arg(long, env = "PEERCACHE_CACHE_BYTES", default_value = "67108864")]
    cache_bytes: u64,

    /// Timeout for fetches from other nodes in seconds
    #[arg(long, env = "PEERCACHE_FETCH_TIMEOUT_SECONDS", default_value = "10")]
    fetch_timeout_seconds: u64,

    /// Client API bind address (disabled when unset)
    #[arg(long, env = "PEERCACHE_API_ADDR")]
    api_addr: Option<String>,

    /// Metrics and health server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:9090")]
    metrics_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    info!("Starting peercache node");
    info!("  Peer address: {}", args.addr);
    info!("  Self URL: {}", args.self_url);
    info!("  Peers: {:?}", args.peers);
    info!("  Replicas: {}", args.replicas);
    info!("  Cache bytes: {}", args.cache_bytes);

    let groups = Arc::new(GroupRegistry::new());
    let scores = groups.new_group("scores", args.cache_bytes, Arc::new(demo_source()));

    let pool_config = PoolConfig {
        self_url: args.self_url.clone(),
        base_path: DEFAULT_BASE_PATH.to_string(),
        replicas: args.replicas,
        fetch_timeout: Duration::from_secs(args.fetch_timeout_seconds),
    };
    let pool = Arc::new(HttpPool::new(pool_config, Arc::clone(&groups))?);

    let self_url = normalize_peer_url(&args.self_url);
    let mut peers = args.peers.clone();
    if !peers.iter().any(|p| normalize_peer_url(p) == self_url) {
        peers.push(self_url);
    }
    pool.set_peers(&peers);
    scores.register_peers(pool.clone())?;

    // Start metrics and health server
    let metrics_addr = args.metrics_addr.clone();
    let metrics_groups = Arc::clone(&groups);
    tokio::spawn(async move {
        if let Err(e) = run_admin_server(&metrics_addr, metrics_groups).await {
            error!("Admin server error: {}", e);
        }
    });

    // Start client API server
    if let Some(api_addr) = args.api_addr.clone() {
        let group = Arc::clone(&scores);
        tokio::spawn(async move {
            if let Err(e) = run_api_server(&api_addr, group).await {
                error!("API server error: {}", e);
            }
        });
    }

    let listener = bind(&args.addr, "peer").await?;

    tokio::select! {
        result = serve(pool, listener) => result?,
        _ = tokio::signal::ctrl_c() => info!("Received shutdown signal"),
    }

    info!("Node shutdown complete");
    Ok(())
}

fn demo_source() -> InMemorySource {
    [("Tom", "630"), ("Jack", "589"), ("Sam", "567")]
        .into_iter()
        .collect()
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=warn"] {
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| Error::Config(format!("Invalid log directive {}: {}", directive, e)))?,
        );
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
    Ok(())
}

// =============================================================================
// Servers
// =============================================================================

async fn bind(addr: &str, name: &str) -> Result<TcpListener> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Config(format!("Invalid {} server address: {}", name, e)))?;

    TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Transport(format!("Failed to bind {} server: {}", name, e)))
}

fn respond(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    if let Ok(value) = content_type.parse() {
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, value);
    }
    response
}

/// Accept connections on `listener`, answering each request with `handler`
async fn run_http<F, Fut>(listener: TcpListener, name: &'static str, handler: F) -> Result<()>
where
    F: Fn(Request<hyper::body::Incoming>) -> Fut + Clone + Send + Sync + 'static,
    Fut: std::future::Future<Output = Response<Full<Bytes>>> + Send + 'static,
{
    info!(
        "{} server listening on {}",
        name,
        listener
            .local_addr()
            .map_err(|e| Error::Transport(e.to_string()))?
    );

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Transport(format!("{} server accept error: {}", name, e)))?;

        let io = TokioIo::new(stream);
        let handler = handler.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let response = handler(req);
                async move { Ok::<_, Infallible>(response.await) }
            });
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("{} server connection error: {}", name, e);
            }
        });
    }
}

async fn run_admin_server(addr: &str, groups: Arc<GroupRegistry>) -> Result<()> {
    let registry = prometheus::Registry::new();
    registry
        .register(Box::new(RegistryCollector::new(groups)?))
        .map_err(|e| Error::Internal(format!("Failed to register collector: {}", e)))?;
    let registry = Arc::new(registry);

    let listener = bind(addr, "admin").await?;
    run_http(listener, "Admin", move |req: Request<hyper::body::Incoming>| {
        let registry = Arc::clone(&registry);
        async move {
            match req.uri().path() {
                "/metrics" => match encode_text(&registry) {
                    Ok((content_type, body)) => respond(StatusCode::OK, &content_type, body),
                    Err(e) => respond(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", e.to_string()),
                },
                "/healthz" | "/livez" | "/readyz" => respond(StatusCode::OK, "text/plain", "ok"),
                _ => respond(StatusCode::NOT_FOUND, "text/plain", "not found"),
            }
        }
    })
    .await
}

async fn run_api_server(addr: &str, group: Arc<Group>) -> Result<()> {
    let listener = bind(addr, "API").await?;
    run_http(listener, "API", move |req: Request<hyper::body::Incoming>| {
        let group = Arc::clone(&group);
        async move {
            match req.uri().path() {
                "/api" => {
                    let key = query_param(req.uri().query().unwrap_or_default(), "key");
                    match group.get(&key).await {
                        Ok(view) => respond(StatusCode::OK, "application/octet-stream", view.bytes()),
                        Err(e) if e.is_validation() => {
                            respond(StatusCode::BAD_REQUEST, "text/plain", e.to_string())
                        }
                        Err(e) if e.is_not_found() => {
                            respond(StatusCode::NOT_FOUND, "text/plain", e.to_string())
                        }
                        Err(e) => {
                            respond(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", e.to_string())
                        }
                    }
                }
                "/api/stats" => {
                    let stats = group.stats();
                    let body = serde_json::json!({
                        "group": group.name(),
                        "hit_ratio": stats.hit_ratio(),
                        "stats": stats,
                        "cache": group.cache_stats(),
                    });
                    respond(StatusCode::OK, "application/json", body.to_string())
                }
                _ => respond(StatusCode::NOT_FOUND, "text/plain", "not found"),
            }
        }
    })
    .await
}

/// Decoded value of `name` in a query string, empty when absent
fn query_param(query: &str, name: &str) -> String {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == name)
        .and_then(|(_, v)| urlencoding::decode(&v.replace('+', " ")).ok().map(|v| v.into_owned()))
        .unwrap_or_default()
}
