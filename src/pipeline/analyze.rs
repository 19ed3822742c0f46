//! Document analysis: send the upload to a vision LLM and parse its JSON report.
//!
//! The raw bytes travel as a single base64 attachment with their declared
//! media type, so PDFs go to the model as PDFs rather than as rendered
//! pages. The fixed instruction from [`crate::prompts`] rides in the same
//! user turn.
//!
//! Models often wrap JSON in a ```` ```json ```` fence even when asked not
//! to; [`strip_code_fence`] removes it before parsing. Unlike the QR scan,
//! every failure here is fatal to the request: without a report there is
//! nothing to mint.

use crate::config::ServerConfig;
use crate::error::AriaError;
use crate::output::{AnalysisReport, UploadedDocument};
use crate::prompts::{ANALYSIS_PROMPT, REPORT_FIELDS};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Structured extraction over an uploaded document.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    /// Produce a report for `document`. Exactly one attempt; no retries.
    async fn analyze(&self, document: &UploadedDocument) -> Result<AnalysisReport, AriaError>;
}

/// [`DocumentAnalyzer`] backed by an `edgequake-llm` provider.
pub struct LlmAnalyzer {
    provider: Arc<dyn LLMProvider>,
    provider_label: String,
    temperature: f32,
    max_tokens: usize,
    timeout: Duration,
}

impl LlmAnalyzer {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ServerConfig) -> Self {
        Self {
            provider,
            provider_label: config.provider_name.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.analyzer_timeout_secs),
        }
    }

    /// Build from configuration, preferring a pre-built provider.
    ///
    /// Otherwise the named provider is created through
    /// [`ProviderFactory::create_llm_provider`], which reads that provider's
    /// API key variable (`GEMINI_API_KEY` for the default) from the
    /// environment.
    pub fn from_config(config: &ServerConfig) -> Result<Self, AriaError> {
        let provider = match config.provider {
            Some(ref provider) => Arc::clone(provider),
            None => ProviderFactory::create_llm_provider(&config.provider_name, &config.model)
                .map_err(|e| AriaError::ProviderNotConfigured {
                    provider: config.provider_name.clone(),
                    hint: format!(
                        "Set the API key for '{}' (GEMINI_API_KEY for gemini).\nError: {}",
                        config.provider_name, e
                    ),
                })?,
        };
        info!("Analyzer ready: provider={} model={}", config.provider_name, config.model);
        Ok(Self::new(provider, config))
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl DocumentAnalyzer for LlmAnalyzer {
    async fn analyze(&self, document: &UploadedDocument) -> Result<AnalysisReport, AriaError> {
        let start = Instant::now();
        let attachment =
            ImageData::new(STANDARD.encode(&document.bytes), document.media_type.as_str());
        let messages = vec![ChatMessage::user_with_images(ANALYSIS_PROMPT, vec![attachment])];
        let options = self.build_options();

        let chat = self.provider.chat(&messages, Some(&options));
        let response = tokio::time::timeout(self.timeout, chat)
            .await
            .map_err(|_| AriaError::AnalysisTimeout {
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| AriaError::AnalysisFailed {
                message: format!("{} ({})", e, self.provider_label),
            })?;

        debug!(
            "Analyzer answered: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        parse_report(&response.content)
    }
}

static RE_FENCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[\w-]*[ \t]*\r?\n?(.*?)\s*```$").unwrap());

static RE_OPENING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```[\w-]*").unwrap());

/// Trim the response and remove an enclosing ```` ``` ```` / ```` ```json ```` fence.
///
/// An opening fence with no closing one is still removed.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    if let Some(caps) = RE_FENCED.captures(trimmed) {
        return caps[1].trim().to_string();
    }
    RE_OPENING_FENCE.replace(trimmed, "").trim().to_string()
}

/// Parse analyzer text into a report. The text must hold a JSON object.
pub fn parse_report(text: &str) -> Result<AnalysisReport, AriaError> {
    let cleaned = strip_code_fence(text);
    let value: Value = serde_json::from_str(&cleaned).map_err(|e| AriaError::MalformedReport {
        detail: format!("{e}; response began with {:?}", preview(&cleaned)),
    })?;

    match value {
        Value::Object(fields) => {
            let missing = missing_report_fields(&fields);
            if !missing.is_empty() {
                debug!(?missing, "Report lacks requested fields; defaults apply");
            }
            Ok(AnalysisReport::new(fields, cleaned))
        }
        other => Err(AriaError::MalformedReport {
            detail: format!("expected a JSON object, got {}", json_kind(&other)),
        }),
    }
}

/// Requested field names the analyzer left out.
pub(crate) fn missing_report_fields(fields: &Map<String, Value>) -> Vec<&'static str> {
    REPORT_FIELDS
        .into_iter()
        .filter(|name| !fields.contains_key(*name))
        .collect()
}

fn preview(text: &str) -> String {
    text.chars().take(80).collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
