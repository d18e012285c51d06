//! Prompt templates for document analysis and report generation.
//!
//! Every prompt the pipeline sends lives here so the wording can be reviewed
//! and tested without a model. The three builders are pure: the same text
//! (and topic) always yields the same [`Prompt`].
//!
//! Each builder embeds only the first [`EXCERPT_CHARS`] characters of the
//! document. The rest of the text is ignored for prompting; callers that
//! want to tell the user about it check [`is_truncated`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of characters of document text embedded in every prompt.
pub const EXCERPT_CHARS: usize = 4000;

/// Persona for table-of-contents extraction.
pub const TABLE_OF_CONTENTS_SYSTEM_PROMPT: &str =
    "당신은 문서 구조에서 목차만 정확히 추출하는 AI입니다.";

/// Persona for structure and style analysis.
pub const STRUCTURE_SUMMARY_SYSTEM_PROMPT: &str = "당신은 문서 형식을 분석하고 요약하는 AI입니다.";

/// Persona for writing a new report in the template's style.
pub const REPORT_SYSTEM_PROMPT: &str =
    "당신은 보고서 형식을 학습해 새로운 주제에 맞춰 작성하는 AI입니다.";

/// The three model call sites of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PromptTask {
    /// Pull the table of contents out of the document.
    TableOfContents,
    /// Describe headings, organisation and tone.
    StructureSummary,
    /// Write a new document on a topic, shaped like the template.
    ReportGeneration,
}

impl PromptTask {
    /// Fixed sampling temperature for this call site.
    pub fn temperature(self) -> f32 {
        match self {
            PromptTask::TableOfContents => 0.3,
            PromptTask::StructureSummary => 0.5,
            PromptTask::ReportGeneration => 0.7,
        }
    }

    /// Fixed system-role instruction for this call site.
    pub fn system_prompt(self) -> &'static str {
        match self {
            PromptTask::TableOfContents => TABLE_OF_CONTENTS_SYSTEM_PROMPT,
            PromptTask::StructureSummary => STRUCTURE_SUMMARY_SYSTEM_PROMPT,
            PromptTask::ReportGeneration => REPORT_SYSTEM_PROMPT,
        }
    }
}

impl fmt::Display for PromptTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PromptTask::TableOfContents => "table of contents",
            PromptTask::StructureSummary => "structure summary",
            PromptTask::ReportGeneration => "report generation",
        })
    }
}

/// A ready-to-send chat request: persona, user message and temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub task: PromptTask,
    pub system: &'static str,
    pub user: String,
}

impl Prompt {
    fn new(task: PromptTask, user: String) -> Self {
        Self {
            task,
            system: task.system_prompt(),
            user,
        }
    }

    pub fn temperature(&self) -> f32 {
        self.task.temperature()
    }
}

/// The first [`EXCERPT_CHARS`] characters of `text`, or all of it if shorter.
///
/// Counts Unicode scalar values, not bytes, so Hangul and other multi-byte
/// text is never split inside a character.
pub fn excerpt(text: &str) -> &str {
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Whether [`excerpt`] drops part of `text`.
pub fn is_truncated(text: &str) -> bool {
    text.chars().nth(EXCERPT_CHARS).is_some()
}

/// Build the table-of-contents extraction prompt.
pub fn table_of_contents_prompt(text: &str) -> Prompt {
    let user = format!(
        "다음 문서에서 **목차(차례)**에 해당하는 부분만 정확히 추출해 주세요.\n\
         - 숫자나 로마자, 제목 패턴을 이용해 목차 항목만 뽑아주세요.\n\
         - 본문 내용은 포함하지 말고, 목차 구조만 출력하세요.\n\
         \n\
         문서 내용:\n\
         {}\n",
        excerpt(text)
    );
    Prompt::new(PromptTask::TableOfContents, user)
}

/// Build the structure/style summary prompt.
pub fn structure_summary_prompt(text: &str) -> Prompt {
    let user = format!(
        "다음 문서의 형식(보고서 구조, 제목 스타일, 구성 흐름 등)을 간단히 요약해 주세요.\n\
         - 문서가 어떤 형식으로 작성되어 있는지 설명해주세요.\n\
         - 목차, 본문 구성, 언어 톤 등을 포함해 형식을 분석해주세요.\n\
         \n\
         문서 내용:\n\
         {}\n",
        excerpt(text)
    );
    Prompt::new(PromptTask::StructureSummary, user)
}

/// Build the prompt that writes a new report on `topic` in the style of
/// `template_text`.
pub fn report_prompt(topic: &str, template_text: &str) -> Prompt {
    let user = format!(
        "아래 문서 형식을 참고하여, 새로운 주제 '{topic}'에 대해 동일한 형식의 보고서를 작성해 주세요.\n\
         \n\
         - 문서 형식(목차, 구성, 말투 등)은 그대로 유지하되,\n\
         - 내용은 '{topic}'을 기반으로 완전히 새롭게 작성해 주세요.\n\
         \n\
         📄 참고 문서:\n\
         {}\n",
        excerpt(template_text)
    );
    Prompt::new(PromptTask::ReportGeneration, user)
}
