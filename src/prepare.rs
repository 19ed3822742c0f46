//! Request orchestration: one upload in, one mint payload out.
//!
//! ```text
//! ReceivingUpload ─▶ Analyzing ─▶ ScanningQr ─▶ ComposingReport ─▶ Publishing ─▶ Responding
//!        │               │                                             │
//!        └───────────────┴──────────────▶ Failed ◀─────────────────────┘
//! ```
//!
//! `ScanningQr` never fails: a missing or unreadable QR code only downgrades
//! the verification method. Every external call is attempted exactly once.

use crate::config::ServerConfig;
use crate::error::AriaError;
use crate::output::{PreparedMint, QrVerifiedData, UploadedDocument, VerificationMethod};
use crate::pipeline::analyze::{DocumentAnalyzer, LlmAnalyzer};
use crate::pipeline::compose::{build_metadata, build_payload, suggested_value, token_id};
use crate::pipeline::publish::{MetadataPublisher, PinataPublisher};
use crate::pipeline::qr::parse_payload;
use crate::pipeline::scan::QrScanner;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

/// Orchestrator state, used to label log lines and failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ReceivingUpload,
    Analyzing,
    ScanningQr,
    ComposingReport,
    Publishing,
    Responding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ReceivingUpload => "receiving_upload",
            Stage::Analyzing => "analyzing",
            Stage::ScanningQr => "scanning_qr",
            Stage::ComposingReport => "composing_report",
            Stage::Publishing => "publishing",
            Stage::Responding => "responding",
        };
        f.write_str(name)
    }
}

/// A fatal error together with the stage that raised it.
#[derive(Debug, Error)]
#[error("{stage}: {error}")]
pub struct PrepareFailure {
    pub stage: Stage,
    #[source]
    pub error: AriaError,
}

impl PrepareFailure {
    pub fn new(stage: Stage, error: AriaError) -> Self {
        Self { stage, error }
    }
}

/// Sequences analysis, QR verification, composition and publishing.
///
/// Holds only immutable collaborators, so one instance is shared by every
/// request.
pub struct MintPreparer {
    analyzer: Arc<dyn DocumentAnalyzer>,
    publisher: Arc<dyn MetadataPublisher>,
    scanner: QrScanner,
    publisher_tag: String,
}

impl MintPreparer {
    pub fn new(
        analyzer: Arc<dyn DocumentAnalyzer>,
        publisher: Arc<dyn MetadataPublisher>,
        scanner: QrScanner,
        publisher_tag: impl Into<String>,
    ) -> Self {
        Self {
            analyzer,
            publisher,
            scanner,
            publisher_tag: publisher_tag.into(),
        }
    }

    /// Wire the production collaborators: LLM analyzer, Pinata publisher,
    /// pdfium-backed scanner.
    pub fn from_config(config: &ServerConfig) -> Result<Self, AriaError> {
        Ok(Self::new(
            Arc::new(LlmAnalyzer::from_config(config)?),
            Arc::new(PinataPublisher::from_config(config)?),
            QrScanner::new(config.pdfium_lib_path.clone()),
            config.publisher_tag.clone(),
        ))
    }

    /// Run the full pipeline for one upload.
    ///
    /// `owner` is copied into the payload unvalidated.
    pub async fn prepare(
        &self,
        document: UploadedDocument,
        owner: Option<String>,
    ) -> Result<PreparedMint, PrepareFailure> {
        let start = Instant::now();

        // ── ReceivingUpload ──────────────────────────────────────────────
        debug!(
            stage = %Stage::ReceivingUpload,
            filename = %document.filename,
            media_type = %document.media_type,
            bytes = document.bytes.len(),
            "Upload received"
        );
        if document.filename.is_empty() {
            return Err(PrepareFailure::new(
                Stage::ReceivingUpload,
                AriaError::EmptyFilename,
            ));
        }

        // ── Analyzing ────────────────────────────────────────────────────
        debug!(stage = %Stage::Analyzing, "Sending document to analyzer");
        let mut report = self
            .analyzer
            .analyze(&document)
            .await
            .map_err(|e| PrepareFailure::new(Stage::Analyzing, e))?;

        // ── ScanningQr ───────────────────────────────────────────────────
        let filename = document.filename.clone();
        debug!(stage = %Stage::ScanningQr, "Scanning for QR code");
        let (method, qr_data) = match self.scanner.scan(document).await {
            Some(payload) => (VerificationMethod::QrConfirmed, parse_payload(&payload)),
            None => (VerificationMethod::AiOnly, QrVerifiedData::default()),
        };
        report.attach_qr_verification(method, &qr_data);

        // ── ComposingReport ──────────────────────────────────────────────
        debug!(stage = %Stage::ComposingReport, "Composing report");
        let value = suggested_value(&report);
        let token_id = token_id(&filename);
        let metadata = build_metadata(&filename, &report, method);

        // ── Publishing ───────────────────────────────────────────────────
        debug!(stage = %Stage::Publishing, "Publishing metadata");
        let token_uri = self
            .publisher
            .publish(&metadata)
            .await
            .map_err(|e| PrepareFailure::new(Stage::Publishing, e))?;

        // ── Responding ───────────────────────────────────────────────────
        let transaction_payload = build_payload(
            token_id.clone(),
            owner,
            token_uri.clone(),
            &report,
            value,
            &self.publisher_tag,
        );
        info!(
            stage = %Stage::Responding,
            token_id = %token_id,
            suggested_value = %value,
            verification = %method,
            "Mint prepared in {}ms",
            start.elapsed().as_millis()
        );

        Ok(PreparedMint {
            success: true,
            ai_report_display: report,
            transaction_payload,
            ipfs_link: token_uri,
        })
    }
}
