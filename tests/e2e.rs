//! End-to-end tests for the `/analyze_and_prepare` endpoint.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`. The
//! analyzer and the pinning service are stubbed, so these run offline; QR
//! fixtures are generated on the fly.
//!
//! One live test at the bottom talks to the real services. It is gated behind
//! `E2E_ENABLED` and needs `GEMINI_API_KEY`, `PINATA_API_KEY` and
//! `PINATA_SECRET_API_KEY`:
//!   E2E_ENABLED=1 cargo test --test e2e live_ -- --nocapture

mod helpers;

use aria_rwa::pipeline::analyze::parse_report;
use aria_rwa::{
    build_router, AnalysisReport, AppState, AriaError, DocumentAnalyzer, MetadataPublisher,
    MintPreparer, NftMetadata, QrScanner, UploadedDocument,
};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use helpers::fixtures::{blank_png, qr_png};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

// ── Stubs ────────────────────────────────────────────────────────────────────

/// Answers every request with the same text, as a model would.
struct CannedAnalyzer {
    reply: String,
    media_types: Mutex<Vec<String>>,
}

impl CannedAnalyzer {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            media_types: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl DocumentAnalyzer for CannedAnalyzer {
    async fn analyze(&self, document: &UploadedDocument) -> Result<AnalysisReport, AriaError> {
        self.media_types.lock().unwrap().push(document.media_type.clone());
        parse_report(&self.reply)
    }
}

struct DownAnalyzer;

#[async_trait]
impl DocumentAnalyzer for DownAnalyzer {
    async fn analyze(&self, _document: &UploadedDocument) -> Result<AnalysisReport, AriaError> {
        Err(AriaError::AnalysisFailed {
            message: "503 Service Unavailable".into(),
        })
    }
}

#[derive(Default)]
struct StubPublisher {
    no_hash: bool,
    calls: AtomicUsize,
    last: Mutex<Option<NftMetadata>>,
}

#[async_trait]
impl MetadataPublisher for StubPublisher {
    async fn publish(&self, metadata: &NftMetadata) -> Result<String, AriaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(metadata.clone());
        if self.no_hash {
            return Err(AriaError::MissingContentId);
        }
        Ok("https://gateway.pinata.cloud/ipfs/QmTestHash".to_string())
    }
}

// ── Test helpers ─────────────────────────────────────────────────────────────

const BOUNDARY: &str = "aria-test-boundary";

enum Part<'a> {
    File {
        name: &'a str,
        filename: &'a str,
        content_type: Option<&'a str>,
        bytes: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File {
                name,
                filename,
                content_type,
                bytes,
            } => {
                let disposition = format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\""
                );
                body.extend_from_slice(format!("{disposition}\r\n").as_bytes());
                if let Some(ct) = content_type {
                    body.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
                }
                body.extend_from_slice(b"\r\n");
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/analyze_and_prepare")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn app(analyzer: Arc<dyn DocumentAnalyzer>, publisher: Arc<StubPublisher>) -> axum::Router {
    app_with_limit(analyzer, publisher, 25 * 1024 * 1024)
}

fn app_with_limit(
    analyzer: Arc<dyn DocumentAnalyzer>,
    publisher: Arc<StubPublisher>,
    max_upload_bytes: usize,
) -> axum::Router {
    let preparer =
        MintPreparer::new(analyzer, publisher, QrScanner::default(), "A.R.I.A. Platform");
    build_router(AppState::new(Arc::new(preparer)), max_upload_bytes)
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes)
        .unwrap_or_else(|e| panic!("body is not JSON ({e}): {}", String::from_utf8_lossy(&bytes)));
    (status, json)
}

// ── Success paths ────────────────────────────────────────────────────────────

#[tokio::test]
async fn qr_confirmed_invoice_prepares_mint() {
    let png = qr_png("upi://pay?am=500&invoiceNo=A1");
    let publisher = Arc::new(StubPublisher::default());
    let request = upload_request(&[
        Part::File {
            name: "document",
            filename: "invoice.png",
            content_type: Some("image/png"),
            bytes: &png,
        },
        Part::Text {
            name: "owner_address",
            value: "andr1owneraddress",
        },
    ]);

    let (status, body) = send(
        app(
            CannedAnalyzer::new(
                r#"{"is_invoice": true, "total": "500", "authenticity_score": 1.0}"#,
            ),
            Arc::clone(&publisher),
        ),
        request,
    )
    .await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["ipfs_link"], "https://gateway.pinata.cloud/ipfs/QmTestHash");

    let report = &body["ai_report_display"];
    assert_eq!(report["is_invoice"], true);
    assert_eq!(report["verification_method"], "✅ QR Code Confirmed");
    assert_eq!(
        report["qr_verified_data"],
        json!({"Invoice Amount": "₹500", "Invoice Number": "A1"})
    );

    let mint = &body["transaction_payload"]["verify_and_mint"];
    assert_eq!(mint["suggested_value"], "500000000");
    assert_eq!(mint["owner"], "andr1owneraddress");
    assert_eq!(mint["token_uri"], body["ipfs_link"]);
    assert_eq!(mint["rwa_publisher"], "A.R.I.A. Platform");
    let token_id = mint["token_id"].as_str().unwrap();
    assert!(token_id.starts_with("RWA_invoice_png_"), "got: {token_id}");
    assert_eq!(token_id.len(), "RWA_invoice_png_".len() + 8);

    assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);
    let pinned = publisher.last.lock().unwrap().clone().unwrap();
    assert_eq!(pinned.name, "AI Verified RWA: invoice.png");
}

#[tokio::test]
async fn without_qr_report_is_ai_only() {
    let png = blank_png();
    let request = upload_request(&[Part::File {
        name: "document",
        filename: "scan.png",
        content_type: Some("image/png"),
        bytes: &png,
    }]);

    let (status, body) = send(
        app(
            CannedAnalyzer::new(r#"{"total": "1,234.50", "authenticity_score": 0.8}"#),
            Arc::new(StubPublisher::default()),
        ),
        request,
    )
    .await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["ai_report_display"]["verification_method"], "AI Analysis Only");
    assert_eq!(body["ai_report_display"]["qr_verified_data"], json!({}));
    let mint = &body["transaction_payload"]["verify_and_mint"];
    assert_eq!(mint["suggested_value"], "987600000");
    assert_eq!(mint["owner"], Value::Null);
}

#[tokio::test]
async fn fenced_analyzer_output_is_unwrapped() {
    let png = blank_png();
    let reply = "```json\n{\"total\": 100, \"currency\": \"INR\"}\n```";
    let request = upload_request(&[Part::File {
        name: "document",
        filename: "bill.png",
        content_type: Some("image/png"),
        bytes: &png,
    }]);

    let (status, body) = send(
        app(CannedAnalyzer::new(reply), Arc::new(StubPublisher::default())),
        request,
    )
    .await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["ai_report_display"]["currency"], "INR");
    let mint = &body["transaction_payload"]["verify_and_mint"];
    assert_eq!(mint["ai_report"], "{\"total\": 100, \"currency\": \"INR\"}");
    // Default authenticity score of 0.7.
    assert_eq!(mint["suggested_value"], "70000000");
}

#[tokio::test]
async fn missing_content_type_is_sniffed() {
    let png = blank_png();
    let analyzer = CannedAnalyzer::new(r#"{"total": "1"}"#);
    let request = upload_request(&[Part::File {
        name: "document",
        filename: "photo",
        content_type: None,
        bytes: &png,
    }]);

    let (status, _) = send(
        app(analyzer.clone(), Arc::new(StubPublisher::default())),
        request,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(analyzer.media_types.lock().unwrap().as_slice(), ["image/png"]);
}

// ── Client errors ────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_document_is_400() {
    let publisher = Arc::new(StubPublisher::default());
    let request = upload_request(&[Part::Text {
        name: "owner_address",
        value: "andr1owner",
    }]);

    let (status, body) = send(app(Arc::new(DownAnalyzer), Arc::clone(&publisher)), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "No document part in the request"}));
    assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_filename_is_400() {
    let request = upload_request(&[Part::File {
        name: "document",
        filename: "",
        content_type: Some("image/png"),
        bytes: b"\x89PNG",
    }]);

    let (status, body) = send(
        app(Arc::new(DownAnalyzer), Arc::new(StubPublisher::default())),
        request,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "No selected document"}));
}

#[tokio::test]
async fn non_multipart_body_is_400() {
    let request = Request::builder()
        .method("POST")
        .uri("/analyze_and_prepare")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"document": "invoice.pdf"}"#))
        .unwrap();

    let (status, body) = send(
        app(Arc::new(DownAnalyzer), Arc::new(StubPublisher::default())),
        request,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn oversized_upload_is_400() {
    let big = vec![0u8; 8 * 1024];
    let request = upload_request(&[Part::File {
        name: "document",
        filename: "huge.png",
        content_type: Some("image/png"),
        bytes: &big,
    }]);

    let (status, _) = send(
        app_with_limit(
            CannedAnalyzer::new("{}"),
            Arc::new(StubPublisher::default()),
            1024,
        ),
        request,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Server errors ────────────────────────────────────────────────────────────

#[tokio::test]
async fn analyzer_failure_is_500_without_publishing() {
    let png = blank_png();
    let publisher = Arc::new(StubPublisher::default());
    let request = upload_request(&[Part::File {
        name: "document",
        filename: "invoice.png",
        content_type: Some("image/png"),
        bytes: &png,
    }]);

    let (status, body) = send(app(Arc::new(DownAnalyzer), Arc::clone(&publisher)), request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Internal server error"}));
    assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unparsable_report_is_500() {
    let png = blank_png();
    let request = upload_request(&[Part::File {
        name: "document",
        filename: "invoice.png",
        content_type: Some("image/png"),
        bytes: &png,
    }]);

    let (status, body) = send(
        app(
            CannedAnalyzer::new("I could not read this document."),
            Arc::new(StubPublisher::default()),
        ),
        request,
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.get("success").is_none());
}

#[tokio::test]
async fn missing_ipfs_hash_is_500() {
    let png = blank_png();
    let publisher = Arc::new(StubPublisher {
        no_hash: true,
        ..Default::default()
    });
    let request = upload_request(&[Part::File {
        name: "document",
        filename: "invoice.png",
        content_type: Some("image/png"),
        bytes: &png,
    }]);

    let (status, body) = send(
        app(CannedAnalyzer::new(r#"{"total": "10"}"#), Arc::clone(&publisher)),
        request,
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Internal server error"}));
    assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);
}

// ── Live services ────────────────────────────────────────────────────────────

/// Skip unless E2E_ENABLED is set and the fixture at `path` exists.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run live tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: fixture not found: {}", p.display());
            return;
        }
        p
    }};
}

#[tokio::test]
async fn live_invoice_round_trip() {
    let path = e2e_skip_unless_ready!(
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/invoice.pdf")
    );
    let bytes = std::fs::read(&path).unwrap();

    let config = aria_rwa::ServerConfig::builder()
        .pinata_api_key(std::env::var("PINATA_API_KEY").ok())
        .pinata_secret_api_key(std::env::var("PINATA_SECRET_API_KEY").ok())
        .pdfium_lib_path(std::env::var("PDFIUM_LIB_PATH").ok().map(PathBuf::from))
        .build()
        .unwrap();
    let preparer = MintPreparer::from_config(&config).unwrap();
    let app = build_router(AppState::new(Arc::new(preparer)), config.max_upload_bytes);

    let request = upload_request(&[Part::File {
        name: "document",
        filename: "invoice.pdf",
        content_type: Some("application/pdf"),
        bytes: &bytes,
    }]);
    let (status, body) = send(app, request).await;

    println!("{}", serde_json::to_string_pretty(&body).unwrap());
    assert_eq!(status, StatusCode::OK);
    assert!(body["ipfs_link"].as_str().unwrap().contains("/ipfs/"));
}
