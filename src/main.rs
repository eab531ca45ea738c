//! Audit Cursor
//!
//! Runs a pool of audit workers that sample stripes from a segment index
//! seeded from a fixture file, and exposes sampling metrics.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Audit Cursor                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │   Workers    │───▶│    Cursor    │───▶│   Segment    │       │
//! │  │  (N tasks)   │    │  (one lock)  │    │    Index     │       │
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! │          │                                                       │
//! │          ▼                                                       │
//! │    /metrics (Prometheus)                                         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use prometheus::Registry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use audit_cursor::adapters::{IndexFixture, InMemorySegmentIndex};
use audit_cursor::audit::{Cursor, CursorConfig};
use audit_cursor::error::{Error, Result};
use audit_cursor::metrics::{AttemptLabel, SamplerMetrics, SelectionLabel};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Audit Cursor - sample erasure-coded stripes to challenge storage nodes on
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Fixture file (YAML, or JSON by extension) describing the segment index
    #[arg(long, env = "AUDIT_FIXTURE")]
    fixture: PathBuf,

    /// Concurrent audit workers
    #[arg(long, env = "AUDIT_WORKERS", default_value = "4")]
    workers: usize,

    /// Total stripes to select before exiting (0 runs until interrupted)
    #[arg(long, env = "AUDIT_ITERATIONS", default_value = "100")]
    iterations: u64,

    /// Listing page size hint (0 uses the index default)
    #[arg(long, env = "AUDIT_PAGE_SIZE", default_value = "0")]
    page_size: usize,

    /// Listing attempts per selection
    #[arg(long, env = "AUDIT_MAX_LIST_ATTEMPTS", default_value = "4")]
    max_list_attempts: usize,

    /// Pointer draws per page
    #[arg(long, env = "AUDIT_MAX_GET_ATTEMPTS", default_value = "4")]
    max_get_attempts: usize,

    /// Delay before retrying after a retriable failure, in milliseconds
    #[arg(long, env = "AUDIT_RETRY_BACKOFF_MS", default_value = "250")]
    retry_backoff_ms: u64,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
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

    init_logging(&args);

    info!("Starting audit cursor");
    info!("  Fixture: {}", args.fixture.display());
    info!("  Workers: {}", args.workers);
    info!("  Iterations: {}", args.iterations);

    if args.workers == 0 {
        return Err(Error::Config("workers must be at least 1".to_string()));
    }

    let fixture = IndexFixture::load(&args.fixture).await?;
    let index = Arc::new(InMemorySegmentIndex::from_fixture(fixture));
    info!("Segment index seeded with {} pointers", index.len());

    let registry = Registry::new();
    let metrics = SamplerMetrics::new()?;
    metrics.register(&registry)?;

    let config = CursorConfig {
        max_list_attempts: args.max_list_attempts,
        max_get_attempts: args.max_get_attempts,
        list_page_size: args.page_size,
    };
    let cursor = Arc::new(
        Cursor::builder(index.clone())
            .config(config)
            .metrics(metrics.clone())
            .build()?,
    );
    info!("  Cursor: {:?}", cursor.config());

    let shutdown = CancellationToken::new();

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
        }
        ctrl_c.cancel();
    });

    let metrics_addr = args.metrics_addr.clone();
    let metrics_registry = registry.clone();
    let metrics_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr, metrics_registry, metrics_shutdown).await
        {
            error!("Metrics server error: {}", e);
        }
    });

    let remaining = Arc::new(AtomicU64::new(args.iterations));
    let backoff = Duration::from_millis(args.retry_backoff_ms);
    let workers: Vec<_> = (0..args.workers)
        .map(|worker| {
            let cursor = cursor.clone();
            let remaining = remaining.clone();
            let shutdown = shutdown.clone();
            let unbounded = args.iterations == 0;
            tokio::spawn(async move {
                run_worker(worker, cursor, remaining, unbounded, backoff, shutdown).await
            })
        })
        .collect();

    for result in futures::future::join_all(workers).await {
        if let Err(e) = result {
            error!("Audit worker panicked: {}", e);
        }
    }
    shutdown.cancel();

    info!(
        stripes = metrics.selections(SelectionLabel::Stripe),
        reaped = metrics.attempts(AttemptLabel::ReapedExpired),
        skipped = metrics.attempts(AttemptLabel::SkippedInvalid),
        exhausted_listing = metrics.selections(SelectionLabel::ExhaustedListing),
        exhausted_sampling = metrics.selections(SelectionLabel::ExhaustedSampling),
        remaining_pointers = index.len(),
        "Audit cursor shutdown complete"
    );
    Ok(())
}

// =============================================================================
// Audit Worker
// =============================================================================

/// Claim one unit of work, returning false once the budget is spent
fn claim(remaining: &AtomicU64) -> bool {
    remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

async fn run_worker(
    worker: usize,
    cursor: Arc<Cursor>,
    remaining: Arc<AtomicU64>,
    unbounded: bool,
    backoff: Duration,
    shutdown: CancellationToken,
) {
    debug!(worker, "Audit worker started");

    while !shutdown.is_cancelled() {
        if !unbounded && remaining.load(Ordering::SeqCst) == 0 {
            break;
        }

        match cursor.select_stripe(&shutdown).await {
            Ok(Some(stripe)) => {
                if !unbounded && !claim(&remaining) {
                    break;
                }
                info!(
                    worker,
                    path = %stripe.segment_path,
                    stripe = stripe.index,
                    segment_size = stripe.segment.segment_size,
                    "Stripe selected for audit"
                );
            }
            Ok(None) => {
                debug!(worker, "Expired pointer reaped, selecting again");
            }
            Err(Error::Cancelled) => break,
            Err(e) if e.is_retriable() => {
                warn!(worker, "Stripe selection failed, retrying: {}", e);
                wait_or_shutdown(backoff, &shutdown).await;
            }
            Err(e) => {
                error!(worker, "Stripe selection error: {}", e);
                wait_or_shutdown(backoff, &shutdown).await;
            }
        }
    }

    debug!(worker, "Audit worker stopped");
}

async fn wait_or_shutdown(delay: Duration, shutdown: &CancellationToken) {
    tokio::select! {
        _ = shutdown.cancelled() => {}
        _ = tokio::time::sleep(delay) => {}
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},hyper=warn", level)));

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
}

// =============================================================================
// Metrics Server
// =============================================================================

async fn run_metrics_server(
    addr: &str,
    registry: Registry,
    shutdown: CancellationToken,
) -> Result<()> {
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use prometheus::{Encoder, TextEncoder};
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    fn respond(status: StatusCode, body: Vec<u8>) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = status;
        response
    }

    fn metrics_response(
        req: &Request<hyper::body::Incoming>,
        registry: &Registry,
    ) -> Response<Full<Bytes>> {
        match req.uri().path() {
            "/metrics" => {
                let encoder = TextEncoder::new();
                let mut buffer = Vec::new();
                match encoder.encode(&registry.gather(), &mut buffer) {
                    Ok(()) => {
                        let mut response = respond(StatusCode::OK, buffer);
                        if let Ok(content_type) = encoder.format_type().parse() {
                            response
                                .headers_mut()
                                .insert(hyper::header::CONTENT_TYPE, content_type);
                        }
                        response
                    }
                    Err(e) => respond(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        e.to_string().into_bytes(),
                    ),
                }
            }
            "/healthz" => respond(StatusCode::OK, b"ok".to_vec()),
            _ => respond(StatusCode::NOT_FOUND, b"not found".to_vec()),
        }
    }

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Config(format!("Invalid metrics server address: {}", e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind metrics server: {}", e)))?;

    info!("Metrics server listening on {}", addr);

    loop {
        let (stream, _) = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            accepted = listener.accept() => accepted
                .map_err(|e| Error::Internal(format!("Metrics server accept error: {}", e)))?,
        };

        let io = TokioIo::new(stream);
        let registry = registry.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let response = metrics_response(&req, &registry);
                async move { Ok::<_, std::convert::Infallible>(response) }
            });
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::error!("Metrics server connection error: {}", e);
            }
        });
    }
}
