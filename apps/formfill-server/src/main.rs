//! formfill proxy server
//!
//! A thin HTTP facade over the fill pipeline. Collaborator components (the
//! form UI, the signature capture widget, the file upload) POST their
//! inputs here and get the filled document back as a base64 artifact:
//!
//! - `GET /health` — liveness
//! - `POST /api/fill` — run the pipeline on one uploaded form

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use formfill_core::{DetectorConfig, FallbackFields, PipelineConfig, RenderBackend};

mod api;
mod error;

use api::{handle_fill, handle_health};

/// Command-line arguments for the formfill server
#[derive(Parser, Debug)]
#[command(name = "formfill-server")]
#[command(about = "formfill proxy server for automatic form filling")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Field detection endpoint
    #[arg(long)]
    detector_url: Option<String>,

    /// Detection request timeout in milliseconds
    #[arg(long, default_value = "20000")]
    detect_timeout_ms: u64,

    /// Preview magnification (pixels per point)
    #[arg(long, default_value = "2.0")]
    scale: f64,

    /// Fail instead of using the fixed fallback layout when the detector
    /// returns nothing
    #[arg(long)]
    no_fallback: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Base pipeline configuration; per-request overrides clone it.
    pub config: PipelineConfig,
    pub backend: Arc<dyn RenderBackend>,
}

#[cfg(feature = "pdfium")]
fn render_backend() -> Arc<dyn RenderBackend> {
    Arc::new(formfill_core::PdfiumBackend)
}

#[cfg(not(feature = "pdfium"))]
fn render_backend() -> Arc<dyn RenderBackend> {
    Arc::new(formfill_core::BlankBackend)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting formfill server on {}:{}", args.host, args.port);

    let mut detector = DetectorConfig {
        timeout: std::time::Duration::from_millis(args.detect_timeout_ms),
        ..DetectorConfig::default()
    };
    if let Some(url) = args.detector_url {
        detector.endpoint = url;
    }
    if args.no_fallback {
        detector.fallback = FallbackFields::Disabled;
    }

    let state = AppState {
        config: PipelineConfig {
            detector,
            raster_scale: args.scale,
            ..PipelineConfig::default()
        },
        backend: render_backend(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/api/fill", post(handle_fill))
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Detection timeout: {}ms", args.detect_timeout_ms);

    axum::serve(listener, app).await?;

    Ok(())
}
