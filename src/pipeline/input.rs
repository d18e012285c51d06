//! Input resolution: turn a user-supplied path or URL into an
//! [`UploadedDocument`].
//!
//! pdfium can parse straight from memory, so both kinds of input are read
//! fully into a byte buffer; nothing is written to disk. The `%PDF` magic
//! bytes are checked here so a wrong file fails with a clear message before
//! the pdfium library is even bound.

use crate::error::ReportError;
use crate::output::UploadedDocument;
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an in-memory document.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
) -> Result<UploadedDocument, ReportError> {
    if input.trim().is_empty() {
        return Err(ReportError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

/// Reject buffers that do not start with `%PDF`.
pub fn check_pdf_magic(name: &str, bytes: &[u8]) -> Result<(), ReportError> {
    if bytes.starts_with(b"%PDF") {
        Ok(())
    } else {
        Err(ReportError::NotAPdf {
            name: name.to_string(),
            magic: bytes.iter().take(4).copied().collect(),
        })
    }
}

async fn read_local(path_str: &str) -> Result<UploadedDocument, ReportError> {
    let path = PathBuf::from(path_str);

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ReportError::FileNotFound { path: path.clone() },
        std::io::ErrorKind::PermissionDenied => ReportError::PermissionDenied { path: path.clone() },
        _ => ReportError::InputReadFailed {
            path: path.clone(),
            source: e,
        },
    })?;

    let name = file_name_of(&path);
    check_pdf_magic(&name, &bytes)?;

    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(UploadedDocument::new(name, bytes))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<UploadedDocument, ReportError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ReportError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ReportError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ReportError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ReportError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let name = file_name_from_url(url);
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ReportError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    check_pdf_magic(&name, &bytes)?;
    info!("Downloaded {} ({} bytes)", name, bytes.len());

    Ok(UploadedDocument::new(name, bytes.to_vec()))
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Last path segment of the URL, percent-decoded, if it looks like a file
/// name.
fn file_name_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                let decoded = percent_decode_str(last).decode_utf8_lossy();
                if !decoded.is_empty() && decoded.contains('.') {
                    return decoded.into_owned();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://example.com/reports/annual.pdf"),
            "annual.pdf"
        );
        assert_eq!(file_name_from_url("https://example.com/"), "downloaded.pdf");
        assert_eq!(
            file_name_from_url("https://arxiv.org/pdf/1706"),
            "downloaded.pdf"
        );
    }

    #[test]
    fn test_file_name_from_url_is_percent_decoded() {
        assert_eq!(
            file_name_from_url("https://example.com/files/%EB%B3%B4%EA%B3%A0%EC%84%9C.pdf"),
            "보고서.pdf"
        );
        assert_eq!(
            file_name_from_url("https://example.com/annual%20report%202024.pdf?dl=1"),
            "annual report 2024.pdf"
        );
    }

    #[test]
    fn test_check_pdf_magic() {
        assert!(check_pdf_magic("a.pdf", b"%PDF-1.4\n").is_ok());
        match check_pdf_magic("a.txt", b"hello") {
            Err(ReportError::NotAPdf { name, magic }) => {
                assert_eq!(name, "a.txt");
                assert_eq!(magic, b"hell".to_vec());
            }
            other => panic!("expected NotAPdf, got {other:?}"),
        }
        assert!(check_pdf_magic("empty.pdf", b"").is_err());
    }

    #[tokio::test]
    async fn test_resolve_missing_file() {
        let err = resolve_input("/definitely/not/a/real/file.pdf", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_resolve_directory_keeps_io_error() {
        use std::error::Error as _;
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_input(dir.path().to_str().unwrap(), 5)
            .await
            .unwrap_err();
        assert!(
            matches!(err, ReportError::InputReadFailed { ref path, .. } if path == dir.path()),
            "got {err:?}"
        );
        assert!(err.source().is_some());
    }

    #[tokio::test]
    async fn test_resolve_empty_input() {
        let err = resolve_input("   ", 5).await.unwrap_err();
        assert!(matches!(err, ReportError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_resolve_local_pdf_and_non_pdf() {
        let dir = tempfile::tempdir().unwrap();

        let pdf_path = dir.path().join("template.pdf");
        std::fs::File::create(&pdf_path)
            .unwrap()
            .write_all(b"%PDF-1.7\n%fake body")
            .unwrap();
        let doc = resolve_input(pdf_path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(doc.name(), "template.pdf");
        assert!(doc.bytes().starts_with(b"%PDF"));

        let txt_path = dir.path().join("notes.txt");
        std::fs::write(&txt_path, b"just text").unwrap();
        let err = resolve_input(txt_path.to_str().unwrap(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::NotAPdf { .. }));
        assert!(err.is_parse_error());
    }
}
