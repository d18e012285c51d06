//! Pipeline stages for template analysis and report generation.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ llm (table of contents) ──▶ llm (structure summary)
//! (URL/path) (pdfium)                                       │
//!                                        topic? ──▶ llm (new report)
//! ```
//!
//! 1. [`input`]  : read the user-supplied path or URL into memory
//! 2. [`extract`]: pull the text layer out of every page; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`llm`]    : one chat completion per prompt from [`crate::prompts`]
//!
//! [`ReportPipeline`] strings the stages together. Every step is awaited
//! before the next one starts and the first error ends the run.

pub mod extract;
pub mod input;
pub mod llm;

use crate::error::ReportError;
use crate::output::{
    AnalysisOutput, AnalysisStats, ExtractedDocument, GeneratedReport, UploadedDocument,
};
use crate::progress::{ProgressCallback, Stage};
use crate::prompts::{self, Prompt};
use extract::TextExtractor;
use llm::CompletionClient;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Extraction and the three model calls, bound to one extractor and one
/// completion client.
pub struct ReportPipeline<E, C> {
    extractor: Arc<E>,
    client: C,
    progress: Option<ProgressCallback>,
}

impl<E, C> ReportPipeline<E, C>
where
    E: TextExtractor + 'static,
    C: CompletionClient,
{
    pub fn new(extractor: E, client: C) -> Self {
        Self {
            extractor: Arc::new(extractor),
            client,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Extract the document's text on the blocking pool.
    pub async fn extract(
        &self,
        document: &UploadedDocument,
    ) -> Result<ExtractedDocument, ReportError> {
        let start = Instant::now();
        let extractor = Arc::clone(&self.extractor);
        let doc = document.clone();

        let text = self
            .observe(Stage::Extract, extract::extract_blocking(extractor, doc))
            .await?;

        let extracted = ExtractedDocument {
            name: document.name().to_string(),
            text,
            extract_duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Extracted {} chars from {} in {}ms",
            extracted.char_count(),
            extracted.name,
            extracted.extract_duration_ms
        );
        Ok(extracted)
    }

    /// Ask for the table of contents, then for the structure summary.
    pub async fn analyze(&self, document: &ExtractedDocument) -> Result<AnalysisOutput, ReportError> {
        let text = document.text.as_str();
        let excerpt_truncated = prompts::is_truncated(text);
        if excerpt_truncated {
            warn!(
                "{} has {} chars; prompts only include the first {}",
                document.name,
                document.char_count(),
                prompts::EXCERPT_CHARS
            );
        }

        let start = Instant::now();
        let table_of_contents = self
            .run(Stage::TableOfContents, prompts::table_of_contents_prompt(text))
            .await?;
        let table_of_contents_duration_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        let structure_summary = self
            .run(Stage::StructureSummary, prompts::structure_summary_prompt(text))
            .await?;
        let structure_summary_duration_ms = start.elapsed().as_millis() as u64;

        Ok(AnalysisOutput {
            document_name: document.name.clone(),
            extracted_chars: document.char_count(),
            excerpt_truncated,
            table_of_contents,
            structure_summary,
            stats: AnalysisStats {
                extract_duration_ms: document.extract_duration_ms,
                table_of_contents_duration_ms,
                structure_summary_duration_ms,
            },
        })
    }

    /// Write a new report on `topic`, using `template_text` as the model of
    /// structure and tone.
    pub async fn generate(
        &self,
        topic: &str,
        template_text: &str,
    ) -> Result<GeneratedReport, ReportError> {
        if topic.trim().is_empty() {
            return Err(ReportError::EmptyTopic);
        }

        let start = Instant::now();
        let text = self
            .run(Stage::Generate, prompts::report_prompt(topic, template_text))
            .await?;
        let duration_ms = start.elapsed().as_millis() as u64;
        info!("Generated report on '{}' ({} chars, {}ms)", topic, text.chars().count(), duration_ms);

        Ok(GeneratedReport {
            topic: topic.to_string(),
            text,
            duration_ms,
        })
    }

    async fn run(&self, stage: Stage, prompt: Prompt) -> Result<String, ReportError> {
        info!("{}: sending {} prompt", stage, prompt.task);
        self.observe(
            stage,
            self.client
                .complete(prompt.system, &prompt.user, prompt.temperature()),
        )
        .await
    }

    /// Await `fut`, reporting start/complete/error for `stage`.
    async fn observe<F>(&self, stage: Stage, fut: F) -> Result<String, ReportError>
    where
        F: Future<Output = Result<String, ReportError>>,
    {
        if let Some(ref cb) = self.progress {
            cb.on_stage_start(stage);
        }
        let result = fut.await;
        if let Some(ref cb) = self.progress {
            match &result {
                Ok(text) => cb.on_stage_complete(stage, text.chars().count()),
                Err(e) => cb.on_stage_error(stage, &e.to_string()),
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ReportProgressCallback;
    use std::sync::Mutex;

    struct PagesExtractor(Vec<String>);

    fn pages(texts: &[&str]) -> PagesExtractor {
        PagesExtractor(texts.iter().map(|t| t.to_string()).collect())
    }

    impl TextExtractor for PagesExtractor {
        fn extract(&self, _document: &UploadedDocument) -> Result<String, ReportError> {
            Ok(extract::join_page_texts(&self.0))
        }
    }

    /// Answers with a fixed string per temperature and records every call.
    #[derive(Default)]
    struct CannedClient {
        calls: Mutex<Vec<(String, f32)>>,
    }

    impl CompletionClient for CannedClient {
        async fn complete(
            &self,
            system: &str,
            _user: &str,
            temperature: f32,
        ) -> Result<String, ReportError> {
            self.calls
                .lock()
                .unwrap()
                .push((system.to_string(), temperature));
            let answer = if temperature == 0.3 {
                "  1. 서론\n2. 본론  "
            } else if temperature == 0.5 {
                "\n개조식 보고서\n"
            } else {
                " 새 보고서 "
            };
            Ok(answer.trim().to_string())
        }
    }

    #[derive(Default)]
    struct StageLog(Mutex<Vec<String>>);

    impl ReportProgressCallback for StageLog {
        fn on_stage_start(&self, stage: Stage) {
            self.0.lock().unwrap().push(format!("+{stage:?}"));
        }
        fn on_stage_complete(&self, stage: Stage, _output_len: usize) {
            self.0.lock().unwrap().push(format!("-{stage:?}"));
        }
    }

    fn doc() -> UploadedDocument {
        UploadedDocument::new("template.pdf", b"%PDF-1.7".to_vec())
    }

    #[tokio::test]
    async fn analyze_runs_toc_then_summary() {
        let pipeline = ReportPipeline::new(
            pages(&["Chapter 1\nIntro", "Chapter 2\nDetails"]),
            CannedClient::default(),
        );

        let extracted = pipeline.extract(&doc()).await.unwrap();
        assert_eq!(extracted.text, "Chapter 1\nIntro\nChapter 2\nDetails\n");

        let analysis = pipeline.analyze(&extracted).await.unwrap();
        assert_eq!(analysis.table_of_contents, "1. 서론\n2. 본론");
        assert_eq!(analysis.structure_summary, "개조식 보고서");
        assert!(!analysis.excerpt_truncated);
        assert_eq!(analysis.document_name, "template.pdf");

        let calls = pipeline.client().calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], (prompts::TABLE_OF_CONTENTS_SYSTEM_PROMPT.to_string(), 0.3));
        assert_eq!(calls[1], (prompts::STRUCTURE_SUMMARY_SYSTEM_PROMPT.to_string(), 0.5));
    }

    #[tokio::test]
    async fn generate_rejects_blank_topic_without_calling_model() {
        let pipeline = ReportPipeline::new(pages(&[]), CannedClient::default());
        let err = pipeline.generate("   ", "template").await.unwrap_err();
        assert!(matches!(err, ReportError::EmptyTopic));
        assert!(pipeline.client().calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn long_documents_are_flagged_as_truncated() {
        let long_page = "가".repeat(prompts::EXCERPT_CHARS + 1);
        let pipeline = ReportPipeline::new(pages(&[&long_page]), CannedClient::default());
        let extracted = pipeline.extract(&doc()).await.unwrap();
        let analysis = pipeline.analyze(&extracted).await.unwrap();
        assert!(analysis.excerpt_truncated);
        assert_eq!(analysis.extracted_chars, prompts::EXCERPT_CHARS + 2);
    }

    #[tokio::test]
    async fn progress_events_follow_stage_order() {
        let log = Arc::new(StageLog::default());
        let pipeline = ReportPipeline::new(pages(&["p"]), CannedClient::default())
            .with_progress(Some(log.clone()));

        let extracted = pipeline.extract(&doc()).await.unwrap();
        pipeline.analyze(&extracted).await.unwrap();
        pipeline.generate("주제", &extracted.text).await.unwrap();

        assert_eq!(
            *log.0.lock().unwrap(),
            vec![
                "+Extract",
                "-Extract",
                "+TableOfContents",
                "-TableOfContents",
                "+StructureSummary",
                "-StructureSummary",
                "+Generate",
                "-Generate",
            ]
        );
    }
}
