//! Library entry points: path/URL/bytes in, analysis and report out.
//!
//! Each function runs one complete interaction on a fresh pipeline. Callers
//! that want extraction memoized across several topics should build a
//! [`ReportSession`] with [`new_session`] instead.

use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::output::{
    safe_file_name, AnalysisOutput, ExtractedDocument, GeneratedReport, ReportOutput,
    UploadedDocument,
};
use crate::pipeline::extract::{self, PdfiumExtractor};
use crate::pipeline::input;
use crate::pipeline::llm::ProviderClient;
use crate::pipeline::ReportPipeline;
use crate::session::{Interaction, ReportSession, SessionState};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Pipeline over pdfium and an `edgequake_llm` provider.
pub type DefaultPipeline = ReportPipeline<PdfiumExtractor, ProviderClient>;

/// Session over [`DefaultPipeline`].
pub type DefaultSession = ReportSession<PdfiumExtractor, ProviderClient>;

/// Extract the text of a PDF file or URL.
///
/// Does not require an LLM provider or API key.
pub async fn extract_text(
    input_str: impl AsRef<str>,
    config: &ReportConfig,
) -> Result<ExtractedDocument, ReportError> {
    let document = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let extractor = Arc::new(build_extractor(config));

    let start = Instant::now();
    let text = extract::extract_blocking(extractor, document.clone()).await?;
    Ok(ExtractedDocument {
        name: document.name().to_string(),
        text,
        extract_duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Analyse a PDF file or URL: table of contents and structure summary.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2report::{analyze, ReportConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let analysis = analyze("template.pdf", &ReportConfig::default()).await?;
/// println!("{}", analysis.table_of_contents);
/// # Ok(())
/// # }
/// ```
pub async fn analyze(
    input_str: impl AsRef<str>,
    config: &ReportConfig,
) -> Result<AnalysisOutput, ReportError> {
    let input_str = input_str.as_ref();
    info!("Analysing template: {}", input_str);
    let document = input::resolve_input(input_str, config.download_timeout_secs).await?;
    analyze_document(document, config).await
}

/// [`analyze`] for a PDF already in memory.
pub async fn analyze_from_bytes(
    name: impl Into<String>,
    bytes: &[u8],
    config: &ReportConfig,
) -> Result<AnalysisOutput, ReportError> {
    let document = document_from_bytes(name.into(), bytes)?;
    analyze_document(document, config).await
}

/// Analyse a template PDF, then write a new report on `topic` in its style.
///
/// A blank topic is rejected before the document is read.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2report::{generate_report, ReportConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let out = generate_report("template.pdf", "AI 윤리", &ReportConfig::default()).await?;
/// println!("{}\n\n{}", out.report.file_name(), out.report.text);
/// # Ok(())
/// # }
/// ```
pub async fn generate_report(
    input_str: impl AsRef<str>,
    topic: &str,
    config: &ReportConfig,
) -> Result<ReportOutput, ReportError> {
    if topic.trim().is_empty() {
        return Err(ReportError::EmptyTopic);
    }
    let input_str = input_str.as_ref();
    info!("Generating report on '{}' from template {}", topic, input_str);
    let document = input::resolve_input(input_str, config.download_timeout_secs).await?;
    generate_for_document(document, topic, config).await
}

/// [`generate_report`] for a PDF already in memory.
pub async fn generate_report_from_bytes(
    name: impl Into<String>,
    bytes: &[u8],
    topic: &str,
    config: &ReportConfig,
) -> Result<ReportOutput, ReportError> {
    if topic.trim().is_empty() {
        return Err(ReportError::EmptyTopic);
    }
    let document = document_from_bytes(name.into(), bytes)?;
    generate_for_document(document, topic, config).await
}

/// [`generate_report`], then save the report into `output_dir`.
///
/// Returns the outputs together with the path of the written file.
pub async fn generate_report_to_dir(
    input_str: impl AsRef<str>,
    topic: &str,
    output_dir: impl AsRef<Path>,
    config: &ReportConfig,
) -> Result<(ReportOutput, PathBuf), ReportError> {
    let output = generate_report(input_str, topic, config).await?;
    let path = write_report(&output.report, output_dir).await?;
    Ok((output, path))
}

/// Save `report` as `{topic}_보고서.txt` in `dir`.
///
/// The file is written to a temporary file in the same directory and then
/// renamed, so readers never see a partial report. Unsafe characters in the
/// topic are replaced and long topics shortened (see [`safe_file_name`]).
pub async fn write_report(
    report: &GeneratedReport,
    dir: impl AsRef<Path>,
) -> Result<PathBuf, ReportError> {
    let dir = dir.as_ref().to_path_buf();
    let path = dir.join(safe_file_name(&report.topic));
    let text = report.text.clone();
    let target = path.clone();

    tokio::task::spawn_blocking(move || -> Result<(), ReportError> {
        let fail = |source: std::io::Error| ReportError::OutputWriteFailed {
            path: target.clone(),
            source,
        };
        std::fs::create_dir_all(&dir).map_err(fail)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(fail)?;
        tmp.write_all(text.as_bytes()).map_err(fail)?;
        tmp.persist(&target).map_err(|e| fail(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| ReportError::Internal(format!("Report write task panicked: {}", e)))??;

    info!("Report written to {}", path.display());
    Ok(path)
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    input_str: impl AsRef<str>,
    config: &ReportConfig,
) -> Result<AnalysisOutput, ReportError> {
    runtime()?.block_on(analyze(input_str, config))
}

/// Synchronous wrapper around [`generate_report`].
pub fn generate_report_sync(
    input_str: impl AsRef<str>,
    topic: &str,
    config: &ReportConfig,
) -> Result<ReportOutput, ReportError> {
    runtime()?.block_on(generate_report(input_str, topic, config))
}

/// Build the production pipeline: pdfium extraction plus the resolved provider.
pub fn build_pipeline(config: &ReportConfig) -> Result<DefaultPipeline, ReportError> {
    let (provider, label) = resolve_provider(config)?;
    debug!("Using LLM provider '{}'", label);
    let client = ProviderClient::new(provider, label).with_max_tokens(config.max_tokens);
    Ok(ReportPipeline::new(build_extractor(config), client)
        .with_progress(config.progress_callback.clone()))
}

/// A session for several interactions against one configuration.
pub fn new_session(config: &ReportConfig) -> Result<DefaultSession, ReportError> {
    Ok(ReportSession::new(build_pipeline(config)?))
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn build_extractor(config: &ReportConfig) -> PdfiumExtractor {
    PdfiumExtractor::new()
        .with_password(config.password.clone())
        .with_library_path(config.pdfium_library_path.clone())
}

fn document_from_bytes(name: String, bytes: &[u8]) -> Result<UploadedDocument, ReportError> {
    input::check_pdf_magic(&name, bytes)?;
    Ok(UploadedDocument::new(name, bytes.to_vec()))
}

fn runtime() -> Result<tokio::runtime::Runtime, ReportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ReportError::Internal(format!("Failed to create tokio runtime: {}", e)))
}

async fn analyze_document(
    document: UploadedDocument,
    config: &ReportConfig,
) -> Result<AnalysisOutput, ReportError> {
    let mut session = new_session(config)?;
    match session.interact(Interaction::new(Some(document), "")).await? {
        SessionState::Analyzed(analysis) => Ok(analysis.clone()),
        other => Err(unexpected_state(other)),
    }
}

async fn generate_for_document(
    document: UploadedDocument,
    topic: &str,
    config: &ReportConfig,
) -> Result<ReportOutput, ReportError> {
    let mut session = new_session(config)?;
    match session.interact(Interaction::new(Some(document), topic)).await? {
        SessionState::Generated { analysis, report } => Ok(ReportOutput {
            analysis: analysis.clone(),
            report: report.clone(),
        }),
        other => Err(unexpected_state(other)),
    }
}

fn unexpected_state(state: &SessionState) -> ReportError {
    ReportError::Internal(format!("Unexpected session state: {:?}", state))
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ReportError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ReportError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model`; the
///    factory reads the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    both non-empty.
/// 4. **`OPENAI_API_KEY`** present: OpenAI with `config.model`.
/// 5. **Auto-detection** (`ProviderFactory::from_env`).
///
/// Returns the provider and the label used for it in error messages.
pub fn resolve_provider(
    config: &ReportConfig,
) -> Result<(Arc<dyn LLMProvider>, String), ReportError> {
    if let Some(ref provider) = config.provider {
        let label = config.provider_name.clone().unwrap_or_else(|| "custom".to_string());
        return Ok((Arc::clone(provider), label));
    }

    if let Some(ref name) = config.provider_name {
        return Ok((create_provider(name, &config.model)?, name.clone()));
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return Ok((create_provider(&prov, &model)?, prov));
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return Ok((create_provider("openai", &config.model)?, "openai".to_string()));
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ReportError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok((llm_provider, "auto".to_string()))
}
