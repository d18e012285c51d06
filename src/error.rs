//! Error types for the edgequake-pdf2report library.
//!
//! Every failure is fatal for the interaction that hit it: a malformed PDF
//! stops the pipeline before any model call, and a failed model call stops
//! the steps after it. There are no partial results, so one error type is
//! enough. Variants are grouped by the stage that produces them so callers
//! can still tell a parse failure from a service failure:
//!
//! * **Input / PDF**: the document could not be read or parsed
//!   (the "parse error" family).
//! * **LLM**: the completion service could not produce a completion
//!   (the "service error" family).
//! * **I/O / config / internal**: everything around the pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-pdf2report library.
#[derive(Debug, Error)]
pub enum ReportError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The path exists but reading it failed (a directory, an I/O error, …).
    #[error("Failed to read '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input string is empty or otherwise unusable.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// A report was requested without a topic.
    #[error("Report topic is empty\nProvide one with --topic <TOPIC>.")]
    EmptyTopic,

    /// The bytes were read, but they do not start with the `%PDF` marker.
    #[error("'{name}' is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: Vec<u8> },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{name}' could not be parsed: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{name}'")]
    WrongPassword { name: String },

    /// pdfium could not load the text layer of a page.
    #[error("Text extraction failed for page {page}: {detail}")]
    TextExtractionFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Text extraction needs the pdfium shared library. You can:\n\
  • Build with the default `bundled` feature (library embedded in the binary).\n\
  • Let it download on first use (needs network access once).\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (or its directory).\n"
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The completion API returned an error that is not classified below.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// The completion API returned HTTP 429.
    #[error("Rate limit exceeded for provider '{provider}': {detail}")]
    RateLimitExceeded { provider: String, detail: String },

    /// The completion call timed out in the provider's HTTP client.
    #[error("LLM call to provider '{provider}' timed out: {detail}")]
    ApiTimeout { provider: String, detail: String },

    /// The completion API rejected the credentials (401/403).
    #[error("Authentication error from provider '{provider}': {detail}\nCheck OPENAI_API_KEY (or your provider's key).")]
    AuthError { provider: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the generated report file.
    #[error("Failed to write report file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReportError {
    /// True for errors raised while reading or parsing the document.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            ReportError::NotAPdf { .. }
                | ReportError::CorruptPdf { .. }
                | ReportError::PasswordRequired { .. }
                | ReportError::WrongPassword { .. }
                | ReportError::TextExtractionFailed { .. }
        )
    }

    /// True for errors raised by the completion service.
    pub fn is_service_error(&self) -> bool {
        matches!(
            self,
            ReportError::ProviderNotConfigured { .. }
                | ReportError::LlmApiError { .. }
                | ReportError::RateLimitExceeded { .. }
                | ReportError::ApiTimeout { .. }
                | ReportError::AuthError { .. }
        )
    }
}
