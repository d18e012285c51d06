//! # edgequake-pdf2report
//!
//! Analyse a template PDF with an LLM and write new reports in its style.
//!
//! Organisations tend to have a house format for reports: a fixed outline,
//! bullet-point (개조식) sections, a particular tone. This crate reads a
//! sample report, asks a chat model to recover its table of contents and
//! describe its structure, and then asks the same model for a fresh report on
//! any topic, following the sample's structure and tone.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Extract   text layer of every page via pdfium (spawn_blocking)
//!  ├─ 3. TOC       chat completion, temperature 0.3
//!  ├─ 4. Summary   chat completion, temperature 0.5
//!  ├─ 5. Report    chat completion, temperature 0.7 (only with a topic)
//!  └─ 6. Output    `{topic}_보고서.txt`, text/plain
//! ```
//!
//! Prompts carry only the first 4000 characters of the extracted text;
//! [`AnalysisOutput::excerpt_truncated`] tells you when that cut anything.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2report::{generate_report, ReportConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = ReportConfig::default();
//!     let out = generate_report("template.pdf", "AI 윤리", &config).await?;
//!     println!("{}", out.analysis.table_of_contents);
//!     println!("{}", out.report.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2report` binary (clap + anyhow + tracing-subscriber) |
//! | `bundled` | on    | Embeds the pdfium shared library at compile time |
//!
//! Without `bundled`, pdfium is downloaded into a local cache on first use
//! (or taken from `PDFIUM_LIB_PATH`). Library-only use:
//! ```toml
//! edgequake-pdf2report = { version = "0.1", default-features = false, features = ["bundled"] }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ReportConfig, ReportConfigBuilder, DEFAULT_MODEL};
pub use error::ReportError;
pub use generate::{
    analyze, analyze_from_bytes, analyze_sync, build_pipeline, extract_text, generate_report,
    generate_report_from_bytes, generate_report_sync, generate_report_to_dir, new_session,
    write_report, DefaultPipeline, DefaultSession,
};
pub use output::{
    report_file_name, safe_file_name, AnalysisOutput, AnalysisStats, ExtractedDocument,
    GeneratedReport, ReportOutput, UploadedDocument, REPORT_CONTENT_TYPE,
};
pub use pipeline::extract::{PdfiumExtractor, TextExtractor};
pub use pipeline::llm::{CompletionClient, ProviderClient};
pub use pipeline::ReportPipeline;
pub use progress::{NoopProgressCallback, ProgressCallback, ReportProgressCallback, Stage};
pub use session::{Interaction, ReportSession, SessionState};
