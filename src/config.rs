//! Configuration for the mint-preparation service.
//!
//! All process-wide settings live in [`ServerConfig`], built once at startup
//! via its [`ServerConfigBuilder`] and shared read-only behind an `Arc`
//! afterwards. Request handlers never mutate it.

use crate::error::AriaError;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default pinning API endpoint.
pub const DEFAULT_PINATA_API_URL: &str = "https://api.pinata.cloud";

/// Default gateway used to turn a content identifier into a URL.
pub const DEFAULT_PINATA_GATEWAY_URL: &str = "https://gateway.pinata.cloud";

/// Publisher tag written into every mint payload.
pub const DEFAULT_PUBLISHER_TAG: &str = "A.R.I.A. Platform";

/// Configuration for the HTTP service and its external collaborators.
///
/// # Example
/// ```rust
/// use aria_rwa::ServerConfig;
///
/// let config = ServerConfig::builder()
///     .port(8080)
///     .model("gemini-2.5-flash")
///     .pinata_credentials("key", "secret")
///     .build()
///     .unwrap();
/// assert_eq!(config.port, 8080);
/// ```
#[derive(Clone)]
pub struct ServerConfig {
    /// Interface to bind. Default: `0.0.0.0`.
    pub host: String,

    /// Listening port. Default: 5000.
    pub port: u16,

    /// LLM provider name understood by `edgequake_llm::ProviderFactory`
    /// (e.g. "gemini", "openai", "anthropic"). Default: "gemini".
    ///
    /// The provider reads its own API key variable (`GEMINI_API_KEY`,
    /// `OPENAI_API_KEY`, ...) when it is constructed.
    pub provider_name: String,

    /// Model identifier. Default: "gemini-2.5-pro".
    pub model: String,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the extraction call. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the analyzer may generate. Default: 2048.
    pub max_tokens: usize,

    /// Pinning-service API key. Absence is reported at publish time.
    pub pinata_api_key: Option<String>,

    /// Pinning-service secret key. Absence is reported at publish time.
    pub pinata_secret_api_key: Option<String>,

    /// Pinning API base URL. Default: [`DEFAULT_PINATA_API_URL`].
    pub pinata_api_url: String,

    /// Gateway base URL. Default: [`DEFAULT_PINATA_GATEWAY_URL`].
    pub pinata_gateway_url: String,

    /// Directory or file of an existing libpdfium. `None` looks in
    /// `PDFIUM_LIB_PATH`, then the download cache, then the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Largest accepted request body in bytes. Default: 25 MiB.
    pub max_upload_bytes: usize,

    /// Analyzer call timeout in seconds. Default: 120.
    pub analyzer_timeout_secs: u64,

    /// Pinning upload timeout in seconds. Default: 60.
    pub publish_timeout_secs: u64,

    /// Publisher tag placed in the mint payload. Default: [`DEFAULT_PUBLISHER_TAG`].
    pub publisher_tag: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            provider_name: "gemini".to_string(),
            model: "gemini-2.5-pro".to_string(),
            provider: None,
            temperature: 0.1,
            max_tokens: 2048,
            pinata_api_key: None,
            pinata_secret_api_key: None,
            pinata_api_url: DEFAULT_PINATA_API_URL.to_string(),
            pinata_gateway_url: DEFAULT_PINATA_GATEWAY_URL.to_string(),
            pdfium_lib_path: None,
            max_upload_bytes: 25 * 1024 * 1024,
            analyzer_timeout_secs: 120,
            publish_timeout_secs: 60,
            publisher_tag: DEFAULT_PUBLISHER_TAG.to_string(),
        }
    }
}

fn redact(secret: &Option<String>) -> &'static str {
    match secret {
        Some(s) if !s.is_empty() => "<redacted>",
        _ => "<unset>",
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("pinata_api_key", &redact(&self.pinata_api_key))
            .field("pinata_secret_api_key", &redact(&self.pinata_secret_api_key))
            .field("pinata_api_url", &self.pinata_api_url)
            .field("pinata_gateway_url", &self.pinata_gateway_url)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("analyzer_timeout_secs", &self.analyzer_timeout_secs)
            .field("publish_timeout_secs", &self.publish_timeout_secs)
            .field("publisher_tag", &self.publisher_tag)
            .finish()
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }

    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    /// Set both pinning credentials at once.
    pub fn pinata_credentials(
        mut self,
        api_key: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.config.pinata_api_key = Some(api_key.into());
        self.config.pinata_secret_api_key = Some(secret.into());
        self
    }

    pub fn pinata_api_key(mut self, key: Option<String>) -> Self {
        self.config.pinata_api_key = key;
        self
    }

    pub fn pinata_secret_api_key(mut self, secret: Option<String>) -> Self {
        self.config.pinata_secret_api_key = secret;
        self
    }

    pub fn pinata_api_url(mut self, url: impl Into<String>) -> Self {
        self.config.pinata_api_url = url.into();
        self
    }

    pub fn pinata_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.config.pinata_gateway_url = url.into();
        self
    }

    pub fn pdfium_lib_path(mut self, path: Option<PathBuf>) -> Self {
        self.config.pdfium_lib_path = path;
        self
    }

    pub fn max_upload_mb(mut self, mb: usize) -> Self {
        self.config.max_upload_bytes = mb.saturating_mul(1024 * 1024);
        self
    }

    pub fn analyzer_timeout_secs(mut self, secs: u64) -> Self {
        self.config.analyzer_timeout_secs = secs;
        self
    }

    pub fn publish_timeout_secs(mut self, secs: u64) -> Self {
        self.config.publish_timeout_secs = secs;
        self
    }

    pub fn publisher_tag(mut self, tag: impl Into<String>) -> Self {
        self.config.publisher_tag = tag.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, AriaError> {
        let c = &self.config;
        if c.max_upload_bytes == 0 {
            return Err(AriaError::InvalidConfig("Upload limit must be ≥ 1 MB".into()));
        }
        if c.analyzer_timeout_secs == 0 || c.publish_timeout_secs == 0 {
            return Err(AriaError::InvalidConfig("Timeouts must be ≥ 1 second".into()));
        }
        if c.model.trim().is_empty() {
            return Err(AriaError::InvalidConfig("Model must not be empty".into()));
        }
        for (name, value) in [
            ("pinata_api_url", &c.pinata_api_url),
            ("pinata_gateway_url", &c.pinata_gateway_url),
        ] {
            url::Url::parse(value).map_err(|e| {
                AriaError::InvalidConfig(format!("{name} '{value}' is not a valid URL: {e}"))
            })?;
        }
        Ok(self.config)
    }
}
