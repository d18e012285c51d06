//! Per-user session: the three-state machine driven by "is there a document?"
//! and "is there a topic?".
//!
//! ```text
//!            document             document + topic
//!   Idle ───────────────▶ Analyzed ───────────────▶ Generated
//!     ▲                                                 │
//!     └──────────── inputs re-evaluated on every interaction
//! ```
//!
//! Every [`ReportSession::interact`] call starts from scratch: the previous
//! results are dropped and the state is recomputed from the inputs. Only the
//! extracted text survives between interactions, in an [`ExtractionCache`]
//! keyed by document content, so re-submitting the same PDF with a new topic
//! does not parse it again.

use crate::error::ReportError;
use crate::output::{AnalysisOutput, ExtractedDocument, GeneratedReport, UploadedDocument};
use crate::pipeline::extract::TextExtractor;
use crate::pipeline::llm::CompletionClient;
use crate::pipeline::ReportPipeline;
use tracing::debug;

/// The user's inputs at one point in time.
#[derive(Debug, Clone, Default)]
pub struct Interaction {
    pub document: Option<UploadedDocument>,
    pub topic: String,
}

impl Interaction {
    pub fn new(document: Option<UploadedDocument>, topic: impl Into<String>) -> Self {
        Self {
            document,
            topic: topic.into(),
        }
    }

    fn has_topic(&self) -> bool {
        !self.topic.trim().is_empty()
    }
}

/// What the session holds after the last interaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SessionState {
    /// No document.
    #[default]
    Idle,
    /// Document analysed, no topic yet.
    Analyzed(AnalysisOutput),
    /// Document analysed and a report written.
    Generated {
        analysis: AnalysisOutput,
        report: GeneratedReport,
    },
}

impl SessionState {
    pub fn analysis(&self) -> Option<&AnalysisOutput> {
        match self {
            SessionState::Idle => None,
            SessionState::Analyzed(analysis) | SessionState::Generated { analysis, .. } => {
                Some(analysis)
            }
        }
    }

    pub fn report(&self) -> Option<&GeneratedReport> {
        match self {
            SessionState::Generated { report, .. } => Some(report),
            _ => None,
        }
    }
}

/// Single-entry memo of the last extraction, keyed by document bytes.
#[derive(Debug, Default)]
pub struct ExtractionCache {
    entry: Option<(UploadedDocument, ExtractedDocument)>,
    hits: u64,
}

impl ExtractionCache {
    /// Cached text for a document with the same content, if any.
    ///
    /// The returned text keeps the name it was extracted under; the caller
    /// renames it when the same bytes arrive under a different file name.
    pub fn get(&mut self, document: &UploadedDocument) -> Option<&ExtractedDocument> {
        match &self.entry {
            Some((cached, extracted)) if cached.same_content(document) => {
                self.hits += 1;
                Some(extracted)
            }
            _ => None,
        }
    }

    /// Replace the cached entry.
    pub fn insert(&mut self, document: UploadedDocument, extracted: ExtractedDocument) {
        self.entry = Some((document, extracted));
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }

    /// Number of lookups answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits
    }
}

/// One user's session over a [`ReportPipeline`].
pub struct ReportSession<E, C> {
    pipeline: ReportPipeline<E, C>,
    cache: ExtractionCache,
    state: SessionState,
}

impl<E, C> ReportSession<E, C>
where
    E: TextExtractor + 'static,
    C: CompletionClient,
{
    pub fn new(pipeline: ReportPipeline<E, C>) -> Self {
        Self {
            pipeline,
            cache: ExtractionCache::default(),
            state: SessionState::Idle,
        }
    }

    pub fn pipeline(&self) -> &ReportPipeline<E, C> {
        &self.pipeline
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn cache(&self) -> &ExtractionCache {
        &self.cache
    }

    /// Recompute the session state from `interaction`.
    ///
    /// - no document: `Idle`, nothing is extracted or sent;
    /// - document: text (memoized), table of contents, structure summary;
    /// - document and a non-blank topic: additionally one report.
    ///
    /// Results from earlier interactions are never mixed with the new
    /// inputs. If extraction or analysis fails the state is `Idle`; if only
    /// the report fails it is `Analyzed` with this interaction's analysis.
    pub async fn interact(&mut self, interaction: Interaction) -> Result<&SessionState, ReportError> {
        self.state = SessionState::Idle;

        let has_topic = interaction.has_topic();
        let Interaction { document, topic } = interaction;
        let Some(document) = document else {
            debug!("No document: session idle");
            return Ok(&self.state);
        };

        let extracted = self.extracted_text(document).await?;
        let analysis = self.pipeline.analyze(&extracted).await?;

        if !has_topic {
            debug!("No topic: skipping report generation");
            self.state = SessionState::Analyzed(analysis);
            return Ok(&self.state);
        }

        match self.pipeline.generate(&topic, &extracted.text).await {
            Ok(report) => {
                self.state = SessionState::Generated { analysis, report };
                Ok(&self.state)
            }
            Err(e) => {
                self.state = SessionState::Analyzed(analysis);
                Err(e)
            }
        }
    }

    async fn extracted_text(
        &mut self,
        document: UploadedDocument,
    ) -> Result<ExtractedDocument, ReportError> {
        if let Some(cached) = self.cache.get(&document) {
            debug!("Extraction cache hit for {}", document.name());
            return Ok(ExtractedDocument {
                name: document.name().to_string(),
                ..cached.clone()
            });
        }

        let extracted = self.pipeline.extract(&document).await?;
        self.cache.insert(document, extracted.clone());
        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingExtractor {
        calls: AtomicUsize,
    }

    impl TextExtractor for CountingExtractor {
        fn extract(&self, document: &UploadedDocument) -> Result<String, ReportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("text of {} bytes\n", document.len()))
        }
    }

    #[derive(Default)]
    struct EchoClient {
        temperatures: Mutex<Vec<f32>>,
    }

    impl CompletionClient for EchoClient {
        async fn complete(
            &self,
            _system: &str,
            user: &str,
            temperature: f32,
        ) -> Result<String, ReportError> {
            self.temperatures.lock().unwrap().push(temperature);
            Ok(user.trim().to_string())
        }
    }

    fn session() -> ReportSession<CountingExtractor, EchoClient> {
        ReportSession::new(ReportPipeline::new(
            CountingExtractor::default(),
            EchoClient::default(),
        ))
    }

    fn pdf(name: &str, body: &str) -> UploadedDocument {
        UploadedDocument::new(name, format!("%PDF-1.7\n{body}").into_bytes())
    }

    fn model_calls(s: &ReportSession<CountingExtractor, EchoClient>) -> Vec<f32> {
        s.pipeline().client().temperatures.lock().unwrap().clone()
    }

    fn extractions(s: &ReportSession<CountingExtractor, EchoClient>) -> usize {
        s.pipeline().extractor().calls.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn no_document_means_no_work() {
        let mut s = session();
        let state = s.interact(Interaction::new(None, "AI 윤리")).await.unwrap();
        assert_eq!(*state, SessionState::Idle);
        assert_eq!(extractions(&s), 0);
        assert!(model_calls(&s).is_empty());
    }

    #[tokio::test]
    async fn document_without_topic_is_analyzed_only() {
        let mut s = session();
        s.interact(Interaction::new(Some(pdf("a.pdf", "x")), "  "))
            .await
            .unwrap();
        assert!(matches!(s.state(), SessionState::Analyzed(_)));
        assert!(s.state().report().is_none());
        assert_eq!(model_calls(&s), vec![0.3, 0.5]);
    }

    #[tokio::test]
    async fn document_and_topic_generate_a_report() {
        let mut s = session();
        s.interact(Interaction::new(Some(pdf("a.pdf", "x")), "AI 윤리"))
            .await
            .unwrap();
        let report = s.state().report().expect("report generated");
        assert!(report.text.contains("AI 윤리"));
        assert_eq!(report.file_name(), "AI 윤리_보고서.txt");
        assert_eq!(model_calls(&s), vec![0.3, 0.5, 0.7]);
    }

    #[tokio::test]
    async fn same_content_is_extracted_once() {
        let mut s = session();
        s.interact(Interaction::new(Some(pdf("a.pdf", "same")), ""))
            .await
            .unwrap();
        s.interact(Interaction::new(Some(pdf("renamed.pdf", "same")), "topic"))
            .await
            .unwrap();
        assert_eq!(extractions(&s), 1);
        assert_eq!(s.cache().hits(), 1);
        assert_eq!(s.state().analysis().unwrap().document_name, "renamed.pdf");

        s.interact(Interaction::new(Some(pdf("b.pdf", "different")), ""))
            .await
            .unwrap();
        assert_eq!(extractions(&s), 2);
    }

    #[tokio::test]
    async fn removing_inputs_falls_back_to_earlier_states() {
        let mut s = session();
        s.interact(Interaction::new(Some(pdf("a.pdf", "x")), "주제"))
            .await
            .unwrap();
        assert!(s.state().report().is_some());

        s.interact(Interaction::new(Some(pdf("a.pdf", "x")), ""))
            .await
            .unwrap();
        assert!(matches!(s.state(), SessionState::Analyzed(_)));

        s.interact(Interaction::default()).await.unwrap();
        assert_eq!(*s.state(), SessionState::Idle);
    }

    struct FailingExtractor;

    impl TextExtractor for FailingExtractor {
        fn extract(&self, document: &UploadedDocument) -> Result<String, ReportError> {
            Err(ReportError::CorruptPdf {
                name: document.name().to_string(),
                detail: "xref table missing".into(),
            })
        }
    }

    #[tokio::test]
    async fn parse_failure_aborts_before_any_model_call() {
        let mut s = ReportSession::new(ReportPipeline::new(FailingExtractor, EchoClient::default()));
        let err = s
            .interact(Interaction::new(Some(pdf("bad.pdf", "")), "topic"))
            .await
            .unwrap_err();
        assert!(err.is_parse_error());
        assert_eq!(*s.state(), SessionState::Idle);
        assert!(s.pipeline().client().temperatures.lock().unwrap().is_empty());
    }

    /// Answers analysis requests, rejects the report request.
    struct NoReportClient;

    impl CompletionClient for NoReportClient {
        async fn complete(
            &self,
            _system: &str,
            user: &str,
            temperature: f32,
        ) -> Result<String, ReportError> {
            if temperature >= 0.7 {
                return Err(ReportError::RateLimitExceeded {
                    provider: "openai".into(),
                    detail: "429 Too Many Requests".into(),
                });
            }
            Ok(user.trim().to_string())
        }
    }

    #[tokio::test]
    async fn report_failure_keeps_this_interactions_analysis() {
        let mut s = ReportSession::new(ReportPipeline::new(
            CountingExtractor::default(),
            NoReportClient,
        ));
        let err = s
            .interact(Interaction::new(Some(pdf("a.pdf", "x")), "AI 윤리"))
            .await
            .unwrap_err();
        assert!(err.is_service_error());
        let SessionState::Analyzed(analysis) = s.state() else {
            panic!("expected Analyzed, got {:?}", s.state());
        };
        assert_eq!(analysis.document_name, "a.pdf");
        assert!(s.state().report().is_none());

        s.interact(Interaction::new(Some(pdf("b.pdf", "other")), "AI 윤리"))
            .await
            .unwrap_err();
        assert_eq!(s.state().analysis().unwrap().document_name, "b.pdf");
    }

    #[test]
    fn cache_misses_on_different_bytes() {
        let mut cache = ExtractionCache::default();
        let a = pdf("a.pdf", "1");
        cache.insert(
            a.clone(),
            ExtractedDocument {
                name: "a.pdf".into(),
                text: "one\n".into(),
                extract_duration_ms: 3,
            },
        );
        assert!(cache.get(&a).is_some());
        assert!(cache.get(&pdf("a.pdf", "2")).is_none());
        assert_eq!(cache.hits(), 1);
        cache.clear();
        assert!(cache.get(&a).is_none());
    }

    #[test]
    fn blocking_interaction_with_tokio_test() {
        let mut s = session();
        let state = tokio_test::block_on(s.interact(Interaction::new(Some(pdf("a.pdf", "x")), "")))
            .unwrap()
            .clone();
        assert!(state.analysis().is_some());
    }
}
