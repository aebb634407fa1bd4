//! Input resolution: turn a user-supplied path or URL into plain text.
//!
//! Binary-to-text extraction is a collaborator, not part of the pipeline
//! proper. This module keeps it behind one function, [`load_text`]:
//!
//! * HTTP(S) URLs are downloaded into memory with `reqwest`.
//! * Bytes starting with the `%PDF` magic go through `pdf-extract`, which is
//!   CPU-bound and therefore runs in `spawn_blocking`.
//! * Anything else must be UTF-8 text (a leading BOM is dropped).

use crate::error::ExtractError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// What the source bytes turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Text,
}

/// Extracted source text plus a human-readable name for it.
#[derive(Debug, Clone)]
pub struct LoadedText {
    pub text: String,
    /// File stem of the path or URL, used as the document name.
    pub name: String,
    pub kind: SourceKind,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load and extract text from a local path or URL.
pub async fn load_text(input: &str, timeout_secs: u64) -> Result<LoadedText, ExtractError> {
    let (bytes, name) = if is_url(input) {
        (download_url(input, timeout_secs).await?, name_from_url(input))
    } else {
        let path = PathBuf::from(input);
        (read_local(&path).await?, name_from_path(&path))
    };
    text_from_bytes(bytes, &name).await
}

/// Extract text from in-memory bytes.
pub async fn text_from_bytes(bytes: Vec<u8>, name: &str) -> Result<LoadedText, ExtractError> {
    let kind = sniff(&bytes);
    let text = match kind {
        SourceKind::Pdf => extract_pdf(bytes, name).await?,
        SourceKind::Text => decode_text(bytes, name)?,
    };
    debug!("Loaded {:?} '{}': {} bytes of text", kind, name, text.len());
    Ok(LoadedText {
        text,
        name: name.to_string(),
        kind,
    })
}

fn sniff(bytes: &[u8]) -> SourceKind {
    if bytes.starts_with(PDF_MAGIC) {
        SourceKind::Pdf
    } else {
        SourceKind::Text
    }
}

fn decode_text(bytes: Vec<u8>, name: &str) -> Result<String, ExtractError> {
    let text = String::from_utf8(bytes).map_err(|e| ExtractError::ExtractionFailed {
        source_name: name.to_string(),
        detail: format!("not a PDF and not UTF-8 text: {e}"),
    })?;
    Ok(match text.strip_prefix('\u{FEFF}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

async fn extract_pdf(bytes: Vec<u8>, name: &str) -> Result<String, ExtractError> {
    let source_name = name.to_string();
    let joined = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| ExtractError::Internal(format!("PDF extraction task panicked: {e}")))?;
    joined.map_err(|e| ExtractError::ExtractionFailed {
        source_name,
        detail: e.to_string(),
    })
}

/// Read a local file, mapping I/O failures onto input errors.
async fn read_local(path: &Path) -> Result<Vec<u8>, ExtractError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            debug!("Read local file: {}", path.display());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(ExtractError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ExtractError::FileNotFound {
            path: path.to_path_buf(),
        }),
        Err(_) => Err(ExtractError::InvalidInput {
            input: path.display().to_string(),
        }),
    }
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, ExtractError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ExtractError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ExtractError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

/// File stem of a local path, or `"document"`.
pub fn name_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

/// File stem of the last URL path segment, or `"document"`.
pub fn name_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty())
        .map(|last| name_from_path(Path::new(&last)))
        .unwrap_or_else(|| "document".to_string())
}
