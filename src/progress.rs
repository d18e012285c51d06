//! Progress-callback trait for pipeline stage events.
//!
//! Each interaction runs up to four slow steps one after another (extraction
//! and three model calls). Inject an [`Arc<dyn ReportProgressCallback>`] via
//! [`crate::config::ReportConfigBuilder::progress_callback`] to show a busy
//! indicator while they run.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2report::{ReportConfig, ReportProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Log;
//!
//! impl ReportProgressCallback for Log {
//!     fn on_stage_complete(&self, stage: Stage, output_len: usize) {
//!         eprintln!("{stage} done ({output_len} chars)");
//!     }
//! }
//!
//! let config = ReportConfig::builder()
//!     .progress_callback(Arc::new(Log))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A step of the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Extract,
    TableOfContents,
    StructureSummary,
    Generate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Extract => "Extracting text",
            Stage::TableOfContents => "Extracting table of contents",
            Stage::StructureSummary => "Summarising structure",
            Stage::Generate => "Writing report",
        })
    }
}

/// Called by the pipeline around each stage.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ReportProgressCallback: Send + Sync {
    /// Called just before a stage starts.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage succeeds.
    ///
    /// `output_len` is the character count of what the stage produced
    /// (extracted text or model output).
    fn on_stage_complete(&self, stage: Stage, output_len: usize) {
        let _ = (stage, output_len);
    }

    /// Called when a stage fails; no further stages run after this.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ReportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReportConfig`].
pub type ProgressCallback = Arc<dyn ReportProgressCallback>;
