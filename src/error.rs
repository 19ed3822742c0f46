//! Error types for the aria-rwa library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`AriaError`] is **fatal**: the request cannot produce a mint payload
//!   (no upload, analyzer unreachable, pinning failed). Returned from
//!   [`crate::prepare::MintPreparer::prepare`] inside a
//!   [`crate::prepare::PrepareFailure`] and mapped to an HTTP status by the
//!   server.
//!
//! * [`ScanError`] is **non-fatal**: the QR scan could not read the document
//!   (corrupt PDF, unsupported codec, pdfium missing). It never leaves the
//!   decoder boundary; it is logged as a warning and the request continues
//!   with AI-only verification.

use thiserror::Error;

/// All fatal errors returned by the aria-rwa library.
#[derive(Debug, Error)]
pub enum AriaError {
    // ── Client input errors ───────────────────────────────────────────────
    /// The multipart body has no `document` part.
    #[error("No document part in the request")]
    MissingDocument,

    /// The `document` part was sent without a filename.
    #[error("No selected document")]
    EmptyFilename,

    /// The request body could not be read as a multipart form.
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    // ── Analyzer errors ───────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("Analyzer provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The analyzer service could not be reached or returned an error.
    #[error("Analyzer request failed: {message}")]
    AnalysisFailed { message: String },

    /// The analyzer call exceeded its timeout.
    #[error("Analyzer did not answer within {secs}s")]
    AnalysisTimeout { secs: u64 },

    /// The analyzer answered, but not with a JSON object.
    #[error("Analyzer returned an unparsable report: {detail}")]
    MalformedReport { detail: String },

    // ── Publisher errors ──────────────────────────────────────────────────
    /// Pinning credentials are not configured.
    #[error("Pinata API keys are not set")]
    PublishCredentialsMissing,

    /// The pinning request could not be sent or its response not read.
    #[error("Metadata upload failed: {reason}")]
    PublishRequestFailed { reason: String },

    /// The pinning service answered with a non-success status.
    #[error("Metadata upload rejected with HTTP {status}: {body}")]
    PublishRejected { status: u16, body: String },

    /// The pinning service succeeded but returned no content identifier.
    #[error("Failed to get IPFS hash from Pinata response")]
    MissingContentId,

    /// The pinning upload exceeded its timeout.
    #[error("Metadata upload did not finish within {secs}s")]
    PublishTimeout { secs: u64 },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AriaError {
    /// `true` for errors caused by the caller's request rather than by this
    /// service or one of its collaborators.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AriaError::MissingDocument | AriaError::EmptyFilename | AriaError::InvalidUpload(_)
        )
    }

    /// HTTP status code this error maps to.
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }
}

/// A non-fatal error raised while looking for a QR payload.
///
/// Swallowed by [`crate::pipeline::scan::QrScanner::scan`]; a request never
/// fails because of one.
#[derive(Debug, Clone, Error)]
pub enum ScanError {
    /// No pdfium library could be bound.
    #[error("pdfium unavailable: {0}")]
    PdfiumUnavailable(String),

    /// pdfium could not open the byte stream as a PDF.
    #[error("could not open PDF: {0}")]
    CorruptPdf(String),

    /// The raster image could not be decoded.
    #[error("could not decode image: {0}")]
    ImageDecode(String),

    /// The blocking scan task panicked or was cancelled.
    #[error("scan task aborted: {0}")]
    TaskAborted(String),
}
