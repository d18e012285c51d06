//! Text extraction: PDF bytes → plain text via pdfium's text layer.
//!
//! The pipeline only needs "bytes in, string out", so extraction sits behind
//! the [`TextExtractor`] trait. Tests swap in an in-memory implementation;
//! production uses [`PdfiumExtractor`].
//!
//! pdfium is a blocking C library. The async pipeline calls extractors from
//! `tokio::task::spawn_blocking`, so implementations are free to block.

use crate::error::ReportError;
use crate::output::UploadedDocument;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Turns an uploaded document into plain text.
pub trait TextExtractor: Send + Sync {
    /// Extract the whole document's text, pages in order.
    fn extract(&self, document: &UploadedDocument) -> Result<String, ReportError>;
}

/// Run `extractor` on tokio's blocking pool.
pub async fn extract_blocking<E>(
    extractor: Arc<E>,
    document: UploadedDocument,
) -> Result<String, ReportError>
where
    E: TextExtractor + ?Sized + 'static,
{
    tokio::task::spawn_blocking(move || extractor.extract(&document))
        .await
        .map_err(|e| ReportError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Join per-page texts: each non-empty page followed by `\n`, in order.
///
/// Pages that yield no text contribute nothing, not even a separator.
pub fn join_page_texts<I, S>(pages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut text = String::new();
    for page in pages {
        let page = page.as_ref();
        if !page.is_empty() {
            text.push_str(page);
            text.push('\n');
        }
    }
    text
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

/// [`TextExtractor`] backed by pdfium-render.
///
/// The library is bound and the document opened per call; both are released
/// when `extract` returns, whether it succeeds or not.
#[derive(Debug, Clone, Default)]
pub struct PdfiumExtractor {
    password: Option<String>,
    library_path: Option<PathBuf>,
}

impl PdfiumExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    /// Bind to this library file (or a directory containing it) instead of
    /// the one `pdfium-auto` finds.
    pub fn with_library_path(mut self, path: Option<PathBuf>) -> Self {
        self.library_path = path;
        self
    }
}

impl TextExtractor for PdfiumExtractor {
    fn extract(&self, document: &UploadedDocument) -> Result<String, ReportError> {
        let pdfium = bind_pdfium(self.library_path.as_deref())?;
        let name = document.name();
        let password = self.password.as_deref();

        let pdf = pdfium
            .load_pdf_from_byte_slice(document.bytes(), password)
            .map_err(|e| {
                let err_str = format!("{:?}", e);
                if err_str.contains("Password") || err_str.contains("password") {
                    if password.is_some() {
                        ReportError::WrongPassword {
                            name: name.to_string(),
                        }
                    } else {
                        ReportError::PasswordRequired {
                            name: name.to_string(),
                        }
                    }
                } else {
                    ReportError::CorruptPdf {
                        name: name.to_string(),
                        detail: err_str,
                    }
                }
            })?;

        let pages = pdf.pages();
        info!("PDF loaded: {} ({} pages)", name, pages.len());

        let mut page_texts = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let text = page
                .text()
                .map_err(|e| ReportError::TextExtractionFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                })?
                .all();
            debug!("Page {}: {} chars", idx + 1, text.chars().count());
            page_texts.push(normalise_line_endings(&text));
        }

        Ok(join_page_texts(page_texts))
    }
}

/// Bind pdfium: the explicit path when given, otherwise whatever
/// `pdfium-auto` resolves (`PDFIUM_LIB_PATH`, the embedded library, or the
/// download cache).
///
/// A path may name the library file itself or the directory that holds it.
fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, ReportError> {
    let bound = match library_path {
        Some(path) => {
            let lib = if path.is_dir() {
                path.join(Pdfium::pdfium_platform_library_name())
            } else {
                path.to_path_buf()
            };
            debug!("Binding pdfium from {}", lib.display());
            pdfium_auto::bind_pdfium_from_path(&lib)
        }
        #[cfg(feature = "bundled")]
        None => pdfium_auto::bind_bundled(),
        #[cfg(not(feature = "bundled"))]
        None => pdfium_auto::bind_pdfium_silent(),
    };

    bound.map_err(|e| ReportError::PdfiumBindingFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard};

    // Dropping a `Pdfium` tears the library down for every instance, so
    // tests that bind it take turns.
    fn pdfium_lock() -> MutexGuard<'static, ()> {
        static LOCK: Mutex<()> = Mutex::new(());
        LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn two_page_pdf() -> Vec<u8> {
        let pdfium = bind_pdfium(None).unwrap();
        let mut doc = pdfium.create_new_pdf().unwrap();
        let font = doc.fonts_mut().helvetica();
        for (heading, body) in [("Chapter 1", "Intro"), ("Chapter 2", "Details")] {
            let mut page = doc
                .pages_mut()
                .create_page_at_end(PdfPagePaperSize::a4())
                .unwrap();
            let objects = page.objects_mut();
            objects
                .create_text_object(
                    PdfPoints::new(72.0),
                    PdfPoints::new(700.0),
                    heading,
                    font,
                    PdfPoints::new(12.0),
                )
                .unwrap();
            objects
                .create_text_object(
                    PdfPoints::new(72.0),
                    PdfPoints::new(650.0),
                    body,
                    font,
                    PdfPoints::new(12.0),
                )
                .unwrap();
        }
        doc.save_to_bytes().unwrap()
    }

    #[test]
    fn join_pages_in_order_with_trailing_newlines() {
        let text = join_page_texts(["Chapter 1\nIntro", "Chapter 2\nDetails"]);
        assert_eq!(text, "Chapter 1\nIntro\nChapter 2\nDetails\n");
    }

    #[test]
    fn empty_pages_contribute_nothing() {
        let text = join_page_texts(["", "Only page", "", ""]);
        assert_eq!(text, "Only page\n");
        assert_eq!(join_page_texts(Vec::<String>::new()), "");
        assert_eq!(join_page_texts(["", ""]), "");
    }

    #[test]
    fn whitespace_only_page_is_kept() {
        assert_eq!(join_page_texts(["  ", "x"]), "  \nx\n");
    }

    #[test]
    fn crlf_is_normalised() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn missing_library_path_fails_to_bind() {
        let extractor =
            PdfiumExtractor::new().with_library_path(Some(PathBuf::from("/nonexistent/libpdfium.so")));
        let doc = UploadedDocument::new("x.pdf", b"%PDF-1.4\n".to_vec());
        let err = extractor.extract(&doc).unwrap_err();
        assert!(matches!(err, ReportError::PdfiumBindingFailed(_)), "got {err:?}");
    }

    #[test]
    fn pdfium_extracts_pages_in_order() {
        let _guard = pdfium_lock();
        let bytes = two_page_pdf();
        let doc = UploadedDocument::new("chapters.pdf", bytes);
        let text = PdfiumExtractor::new().extract(&doc).unwrap();
        assert_eq!(text, "Chapter 1\nIntro\nChapter 2\nDetails\n");
    }

    #[test]
    fn truncated_pdf_is_corrupt() {
        let _guard = pdfium_lock();
        let doc = UploadedDocument::new("broken.pdf", b"%PDF-1.4\ngarbage".to_vec());
        let err = PdfiumExtractor::new().extract(&doc).unwrap_err();
        assert!(
            matches!(err, ReportError::CorruptPdf { ref name, .. } if name == "broken.pdf"),
            "got {err:?}"
        );
        assert!(err.is_parse_error());
    }
}
