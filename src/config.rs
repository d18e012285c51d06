//! Configuration types for report analysis and generation.
//!
//! Everything a caller may tune lives in [`ReportConfig`], built via its
//! [`ReportConfigBuilder`]. The prompt policy itself (temperatures, the
//! 4000-character excerpt, the personas) is fixed in [`crate::prompts`] and is
//! deliberately absent here.

use crate::error::ReportError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4";

/// Configuration for analysing a template PDF and writing reports from it.
///
/// # Example
/// ```rust
/// use edgequake_pdf2report::ReportConfig;
///
/// let config = ReportConfig::builder()
///     .provider_name("openai")
///     .download_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.model, "gpt-4");
/// ```
#[derive(Clone)]
pub struct ReportConfig {
    /// LLM model identifier. Default: `gpt-4`.
    pub model: String,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Cap on generated tokens per completion. None leaves it to the provider.
    pub max_tokens: Option<usize>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Explicit pdfium library (file or directory). Without it the library
    /// comes from `PDFIUM_LIB_PATH`, the embedded copy or the download cache.
    pub pdfium_library_path: Option<PathBuf>,

    /// Stage events for progress display.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            provider_name: None,
            provider: None,
            max_tokens: None,
            password: None,
            download_timeout_secs: 120,
            pdfium_library_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("max_tokens", &self.max_tokens)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ReportProgressCallback>"),
            )
            .finish()
    }
}

impl ReportConfig {
    /// Create a new builder for `ReportConfig`.
    pub fn builder() -> ReportConfigBuilder {
        ReportConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ReportConfig`].
#[derive(Debug)]
pub struct ReportConfigBuilder {
    config: ReportConfig,
}

impl ReportConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReportConfig, ReportError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(ReportError::InvalidConfig("model must not be empty".into()));
        }
        if c.max_tokens == Some(0) {
            return Err(ReportError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.download_timeout_secs == 0 {
            return Err(ReportError::InvalidConfig(
                "download timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
