//! Result types returned by the pipeline.
//!
//! All of them are plain data and `Serialize`, so the CLI can print them as
//! JSON and library users can ship them over the wire unchanged.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Suffix appended to the topic to form the report file name ("report").
pub const REPORT_FILE_SUFFIX: &str = "_보고서.txt";

/// Longest file name most file systems accept, in bytes.
pub const MAX_FILE_NAME_BYTES: usize = 255;

/// MIME type of the generated report.
pub const REPORT_CONTENT_TYPE: &str = "text/plain";

/// An uploaded PDF: a display name plus its raw bytes.
///
/// The bytes sit behind an `Arc` so the document can be handed to a blocking
/// extraction task without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedDocument {
    name: String,
    bytes: Arc<[u8]>,
}

impl UploadedDocument {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Same content, regardless of name.
    pub fn same_content(&self, other: &UploadedDocument) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes) || self.bytes == other.bytes
    }
}

/// Plain text of one document, as produced by the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub name: String,
    pub text: String,
    pub extract_duration_ms: u64,
}

impl ExtractedDocument {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Table of contents and structure summary for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    /// Name of the analysed document.
    pub document_name: String,
    /// Characters of extracted text (not just the prompt excerpt).
    pub extracted_chars: usize,
    /// True when the document is longer than the prompt excerpt, i.e. the
    /// model only saw its beginning.
    pub excerpt_truncated: bool,
    /// Model output for the table-of-contents request, trimmed.
    pub table_of_contents: String,
    /// Model output for the structure-summary request, trimmed.
    pub structure_summary: String,
    pub stats: AnalysisStats,
}

/// Wall-clock timings for an analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub extract_duration_ms: u64,
    pub table_of_contents_duration_ms: u64,
    pub structure_summary_duration_ms: u64,
}

/// A newly written report, ready to save or preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedReport {
    pub topic: String,
    /// Model output for the generation request, trimmed.
    pub text: String,
    pub duration_ms: u64,
}

impl GeneratedReport {
    /// Download name: `{topic}_보고서.txt`.
    pub fn file_name(&self) -> String {
        report_file_name(&self.topic)
    }

    pub fn content_type(&self) -> &'static str {
        REPORT_CONTENT_TYPE
    }
}

/// Everything one analyse-and-generate run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportOutput {
    pub analysis: AnalysisOutput,
    pub report: GeneratedReport,
}

/// `{topic}_보고서.txt`, with the topic exactly as typed.
pub fn report_file_name(topic: &str) -> String {
    format!("{topic}{REPORT_FILE_SUFFIX}")
}

static RE_UNSAFE_FILE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).unwrap());

/// [`report_file_name`] made safe to create on disk.
///
/// Path separators, characters Windows rejects and control characters become
/// `_`; a topic made only of dots is replaced so the name cannot point at
/// `.` or `..`. Long topics are cut (never inside a character) so the whole
/// name fits in [`MAX_FILE_NAME_BYTES`].
pub fn safe_file_name(topic: &str) -> String {
    let cleaned = RE_UNSAFE_FILE_CHARS.replace_all(topic.trim(), "_");
    let stem = truncate_at_char_boundary(
        &cleaned,
        MAX_FILE_NAME_BYTES - REPORT_FILE_SUFFIX.len(),
    );
    if stem.chars().all(|c| c == '.') {
        report_file_name("_")
    } else {
        report_file_name(stem)
    }
}

fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_file_name_keeps_topic_verbatim() {
        assert_eq!(report_file_name("AI 윤리"), "AI 윤리_보고서.txt");
        let report = GeneratedReport {
            topic: "탄소중립 추진 전략".into(),
            text: "본문".into(),
            duration_ms: 0,
        };
        assert_eq!(report.file_name(), "탄소중립 추진 전략_보고서.txt");
        assert_eq!(report.content_type(), "text/plain");
    }

    #[test]
    fn safe_file_name_replaces_separators() {
        assert_eq!(safe_file_name("a/b\\c"), "a_b_c_보고서.txt");
        assert_eq!(safe_file_name("what?: \"x\""), "what__ _x__보고서.txt");
        assert_eq!(safe_file_name(".."), "__보고서.txt");
        assert_eq!(safe_file_name("AI 윤리"), "AI 윤리_보고서.txt");
    }

    #[test]
    fn safe_file_name_fits_file_system_limit() {
        let topic = "탄소중립".repeat(22);
        assert_eq!(topic.chars().count(), 88);
        assert!(report_file_name(&topic).len() > MAX_FILE_NAME_BYTES);

        let name = safe_file_name(&topic);
        assert!(name.len() <= MAX_FILE_NAME_BYTES, "{} bytes", name.len());
        assert!(name.ends_with(REPORT_FILE_SUFFIX));
        // 241 bytes are left for the topic; 80 three-byte syllables fit.
        assert_eq!(name, report_file_name(&"탄소중립".repeat(20)));

        let ascii = "a".repeat(300);
        assert_eq!(safe_file_name(&ascii).len(), MAX_FILE_NAME_BYTES);
    }

    #[test]
    fn uploaded_document_content_equality() {
        let a = UploadedDocument::new("a.pdf", b"%PDF-1.7 x".to_vec());
        let b = UploadedDocument::new("renamed.pdf", b"%PDF-1.7 x".to_vec());
        let c = UploadedDocument::new("a.pdf", b"%PDF-1.7 y".to_vec());
        assert!(a.same_content(&b));
        assert!(!a.same_content(&c));
        assert_eq!(a.len(), 10);
        assert!(!a.is_empty());
    }

    #[test]
    fn analysis_output_is_json_serialisable() {
        let out = AnalysisOutput {
            document_name: "doc.pdf".into(),
            extracted_chars: 42,
            excerpt_truncated: false,
            table_of_contents: "1. 서론".into(),
            structure_summary: "개조식".into(),
            stats: AnalysisStats::default(),
        };
        let json = serde_json::to_string(&out).unwrap();
        assert!(json.contains("\"table_of_contents\":\"1. 서론\""));
        let back: AnalysisOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(back, out);
    }
}
