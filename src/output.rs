//! Request-scoped data model.
//!
//! Nothing here outlives a request: an [`UploadedDocument`] is created when the
//! multipart body is read, flows through the pipeline, and the composed
//! [`PreparedMint`] is serialised back to the caller.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Raw upload as received from the client.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedDocument {
    pub bytes: Vec<u8>,
    /// Declared media type, e.g. `application/pdf` or `image/png`.
    pub media_type: String,
    /// Original filename, never empty once past request validation.
    pub filename: String,
}

impl UploadedDocument {
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
            filename: filename.into(),
        }
    }

    /// `true` when the declared media type names PDF or the bytes carry the
    /// `%PDF` magic.
    pub fn is_pdf(&self) -> bool {
        self.media_type.to_ascii_lowercase().contains("pdf") || self.bytes.starts_with(b"%PDF")
    }
}

impl fmt::Debug for UploadedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedDocument")
            .field("bytes", &self.bytes.len())
            .field("media_type", &self.media_type)
            .field("filename", &self.filename)
            .finish()
    }
}

/// Media type for a part sent without a `Content-Type`, sniffed from magic bytes.
pub fn infer_media_type(bytes: &[u8]) -> String {
    if bytes.starts_with(b"%PDF") {
        return "application/pdf".to_string();
    }
    image::guess_format(bytes)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| "application/octet-stream".to_string())
}

/// Structured extraction returned by the analyzer.
///
/// Holds the analyzer's JSON object verbatim plus the (fence-stripped) text
/// it was parsed from. The orchestrator adds `verification_method` and
/// `qr_verified_data` exactly once before the report is returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(flatten)]
    fields: Map<String, Value>,
    #[serde(skip)]
    source_text: String,
}

impl AnalysisReport {
    pub fn new(fields: Map<String, Value>, source_text: impl Into<String>) -> Self {
        Self {
            fields,
            source_text: source_text.into(),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Analyzer text the fields were parsed from, code fences removed.
    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn verification_summary(&self) -> Option<&str> {
        self.get("verification_summary").and_then(Value::as_str)
    }

    /// Record how the document was verified. Overwrites any same-named keys
    /// the analyzer may have produced.
    pub fn attach_qr_verification(&mut self, method: VerificationMethod, data: &QrVerifiedData) {
        self.fields.insert(
            "verification_method".to_string(),
            Value::String(method.as_str().to_string()),
        );
        self.fields.insert(
            "qr_verified_data".to_string(),
            serde_json::to_value(data).unwrap_or_else(|_| Value::Object(Map::new())),
        );
    }
}

/// How the extracted fields were confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationMethod {
    /// A QR payload was decoded from the document.
    QrConfirmed,
    /// No QR payload; the analyzer's report stands alone.
    AiOnly,
}

impl VerificationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationMethod::QrConfirmed => "✅ QR Code Confirmed",
            VerificationMethod::AiOnly => "AI Analysis Only",
        }
    }
}

impl fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields read back from a decoded QR payload. Built fresh per request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrVerifiedData {
    #[serde(
        rename = "Invoice Amount",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub invoice_amount: Option<String>,
    #[serde(
        rename = "Invoice Number",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub invoice_number: Option<String>,
}

impl QrVerifiedData {
    pub fn is_empty(&self) -> bool {
        self.invoice_amount.is_none() && self.invoice_number.is_none()
    }
}

/// One `attributes` entry of the pinned metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataAttribute {
    pub trait_type: String,
    pub value: Value,
}

/// Metadata record pinned to IPFS and referenced by the token URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<MetadataAttribute>,
}

impl NftMetadata {
    /// Filename used when uploading the record.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.name)
    }
}

/// Mint instruction handed back to the caller; shaped like the ledger
/// contract's execute message. This service never submits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionPayload {
    VerifyAndMint {
        token_id: String,
        /// Caller-supplied, unvalidated.
        owner: Option<String>,
        token_uri: String,
        ai_report: String,
        /// Integer micro-units, serialised as a decimal string.
        suggested_value: String,
        rwa_publisher: String,
    },
}

/// Success body of `POST /analyze_and_prepare`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedMint {
    pub success: bool,
    pub ai_report_display: AnalysisReport,
    pub transaction_payload: TransactionPayload,
    pub ipfs_link: String,
}
