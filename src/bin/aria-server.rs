//! HTTP server binary for aria-rwa.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `ServerConfig`, installs logging and serves the router.

use anyhow::{Context, Result};
use aria_rwa::config::{DEFAULT_PINATA_API_URL, DEFAULT_PINATA_GATEWAY_URL};
use aria_rwa::{build_router, AppState, MintPreparer, ServerConfig};
use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on the default port (5000)
  aria-server

  # Different port and model
  aria-server --port 8080 --model gemini-2.5-flash

  # Prepare a mint from an invoice
  curl -F document=@invoice.pdf -F owner_address=andr1... \
       http://localhost:5000/analyze_and_prepare

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  PINATA_API_KEY          Pinata API key
  PINATA_SECRET_API_KEY   Pinata secret API key
  PDFIUM_LIB_PATH         Path to libpdfium, or the directory holding it
  PDFIUM_AUTO_CACHE_DIR   Where the downloaded libpdfium is cached
  RUST_LOG                Log filter, overrides --verbose

  Variables may also be placed in a .env file in the working directory.
"#;

/// Analyze invoices and prepare RWA mint payloads over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "aria-server",
    version,
    about = "Analyze invoices and prepare RWA mint payloads over HTTP",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Interface to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Listening port.
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "ARIA_LLM_PROVIDER", default_value = "gemini")]
    provider: String,

    /// Vision model ID.
    #[arg(long, env = "ARIA_MODEL", default_value = "gemini-2.5-pro")]
    model: String,

    /// Pinata API key.
    #[arg(long, env = "PINATA_API_KEY", hide_env_values = true)]
    pinata_api_key: Option<String>,

    /// Pinata secret API key.
    #[arg(long, env = "PINATA_SECRET_API_KEY", hide_env_values = true)]
    pinata_secret_api_key: Option<String>,

    /// Pinata API base URL.
    #[arg(long, env = "PINATA_API_URL", default_value = DEFAULT_PINATA_API_URL)]
    pinata_api_url: String,

    /// IPFS gateway base URL used for token URIs.
    #[arg(long, env = "PINATA_GATEWAY_URL", default_value = DEFAULT_PINATA_GATEWAY_URL)]
    pinata_gateway_url: String,

    /// Path to libpdfium (file or directory). Defaults to a cached download.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Largest accepted upload, in MB.
    #[arg(long, env = "ARIA_MAX_UPLOAD_MB", default_value_t = 25,
          value_parser = clap::value_parser!(u64).range(1..=1024))]
    max_upload_mb: u64,

    /// Analyzer call timeout in seconds.
    #[arg(long, env = "ARIA_ANALYZER_TIMEOUT", default_value_t = 120)]
    analyzer_timeout: u64,

    /// Pinning upload timeout in seconds.
    #[arg(long, env = "ARIA_PUBLISH_TIMEOUT", default_value_t = 60)]
    publish_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ARIA_VERBOSE")]
    verbose: bool,
}

/// Locate libpdfium, downloading it into the user cache on first start.
///
/// An explicit path is used as given. A failed download is not fatal: PDF
/// uploads are then analyzed without a QR cross-check.
async fn resolve_pdfium(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if explicit.is_some() {
        return explicit;
    }
    if pdfium_auto::cached_pdfium_path().is_none() {
        info!("PDFium not cached yet; downloading (~30 MB, first start only)");
    }
    match tokio::task::spawn_blocking(pdfium_auto::ensure_pdfium_library).await {
        Ok(Ok(path)) => {
            info!(path = %path.display(), "PDFium ready");
            Some(path)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "PDFium unavailable; PDF uploads will not be scanned for QR codes");
            None
        }
        Err(e) => {
            warn!(error = %e, "PDFium setup task aborted");
            None
        }
    }
}

fn build_config(cli: &Cli, pdfium_lib_path: Option<PathBuf>) -> Result<ServerConfig> {
    ServerConfig::builder()
        .host(&cli.host)
        .port(cli.port)
        .provider_name(&cli.provider)
        .model(&cli.model)
        .pinata_api_key(cli.pinata_api_key.clone())
        .pinata_secret_api_key(cli.pinata_secret_api_key.clone())
        .pinata_api_url(&cli.pinata_api_url)
        .pinata_gateway_url(&cli.pinata_gateway_url)
        .pdfium_lib_path(pdfium_lib_path)
        .max_upload_mb(cli.max_upload_mb as usize)
        .analyzer_timeout_secs(cli.analyzer_timeout)
        .publish_timeout_secs(cli.publish_timeout)
        .build()
        .context("Invalid configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal in production.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Ensure PDFium engine is available ────────────────────────────────
    let pdfium_lib_path = resolve_pdfium(cli.pdfium_lib_path.clone()).await;

    // ── Build config and collaborators ───────────────────────────────────
    let config = build_config(&cli, pdfium_lib_path)?;
    info!(?config, "Configuration loaded");

    if config.pinata_api_key.is_none() || config.pinata_secret_api_key.is_none() {
        warn!("Pinata credentials are not set; every request will fail at publishing");
    }

    let preparer = MintPreparer::from_config(&config).context("Failed to initialise analyzer")?;
    let app = build_router(AppState::new(Arc::new(preparer)), config.max_upload_bytes);

    // ── Serve ────────────────────────────────────────────────────────────
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
