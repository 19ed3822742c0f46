//! # aria-rwa
//!
//! Turn an uploaded invoice into a ready-to-sign real-world-asset mint.
//!
//! ## What it does
//!
//! A client posts a document (PDF or image) to `POST /analyze_and_prepare`.
//! A vision LLM reads it and reports the total, currency, date and an
//! authenticity score. Any QR code embedded in the document is decoded and its
//! amount and invoice number are shown next to the model's reading. The
//! service then pins an NFT metadata record to IPFS and hands back a
//! `verify_and_mint` message for the client to sign and submit. Nothing is
//! ever submitted to a ledger from here.
//!
//! ## Pipeline Overview
//!
//! ```text
//! multipart upload
//!  │
//!  ├─ 1. Analyze  vision LLM → JSON report (fences stripped)      fatal on error
//!  ├─ 2. Scan     pdfium image objects / raster → rqrr            fail-open
//!  ├─ 3. QR       URI query → Invoice Amount / Invoice Number     fail-open
//!  ├─ 4. Compose  suggested value, token id, metadata record
//!  ├─ 5. Publish  pin metadata JSON, gateway URL as token URI     fatal on error
//!  └─ 6. Respond  { success, ai_report_display, transaction_payload, ipfs_link }
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aria_rwa::{build_router, AppState, MintPreparer, ServerConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Analyzer key from GEMINI_API_KEY; pinning keys from the builder.
//!     let config = ServerConfig::builder()
//!         .pinata_credentials("api-key", "secret")
//!         .build()?;
//!     let preparer = MintPreparer::from_config(&config)?;
//!     let app = build_router(AppState::new(Arc::new(preparer)), config.max_upload_bytes);
//!
//!     let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `aria-server` binary and its CLI dependencies |
//!
//! Disable `cli` when embedding the router in another service:
//! ```toml
//! aria-rwa = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prepare;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ServerConfig, ServerConfigBuilder};
pub use error::{AriaError, ScanError};
pub use output::{
    AnalysisReport, NftMetadata, PreparedMint, QrVerifiedData, TransactionPayload, UploadedDocument,
    VerificationMethod,
};
pub use pipeline::analyze::{DocumentAnalyzer, LlmAnalyzer};
pub use pipeline::publish::{MetadataPublisher, PinataPublisher};
pub use pipeline::scan::QrScanner;
pub use prepare::{MintPreparer, PrepareFailure, Stage};
pub use server::{build_router, ApiError, AppState};
