//! Error types for the smart-extract library.
//!
//! Every variant of [`ExtractError`] is **fatal**: the pipeline either produces
//! a complete [`crate::output::ExtractionOutput`] or nothing at all. There is
//! no partial-document mode, because a document with a missing chunk in the
//! middle reads as if the source never contained that text.
//!
//! Two conditions that look like errors are deliberately *not* represented
//! here:
//!
//! * **Oversized chunks** — a single token or line longer than the configured
//!   bound still becomes its own chunk. It is flagged on
//!   [`crate::pipeline::chunker::Chunk::oversized`] and logged at `warn`.
//! * **Unknown tags** — a line whose prefix is not in the active vocabulary is
//!   assembled as a plain paragraph (see [`crate::markup`]).

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the smart-extract library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The document could not be turned into text.
    #[error("Text extraction failed for '{source_name}': {detail}")]
    ExtractionFailed { source_name: String, detail: String },

    // ── Transformation errors ─────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// A chunk could not be transformed. The whole run is aborted.
    #[error("Transformation of chunk {chunk}/{total} failed: {detail}")]
    TransformationFailure {
        chunk: usize,
        total: usize,
        detail: String,
    },

    /// The summary pass failed after all chunks were transformed.
    #[error("Summary generation failed: {detail}")]
    SummaryFailure { detail: String },

    /// A token sequence could not be decoded back into text.
    #[error("Assembly inconsistency: {0}")]
    AssemblyInconsistency(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// The document could not be packaged.
    #[error("Failed to render document: {0}")]
    RenderFailed(String),

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExtractError {
    /// True when the failure happened while talking to the transformer.
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            ExtractError::TransformationFailure { .. }
                | ExtractError::SummaryFailure { .. }
                | ExtractError::ProviderNotConfigured { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transformation_failure_display() {
        let e = ExtractError::TransformationFailure {
            chunk: 3,
            total: 7,
            detail: "HTTP 500".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("3/7"), "got: {msg}");
        assert!(msg.contains("HTTP 500"));
        assert!(e.is_transformation());
    }

    #[test]
    fn assembly_inconsistency_is_not_transformation() {
        let e = ExtractError::AssemblyInconsistency("bad utf-8".into());
        assert!(!e.is_transformation());
        assert!(e.to_string().contains("bad utf-8"));
    }

    #[test]
    fn provider_not_configured_display() {
        let e = ExtractError::ProviderNotConfigured {
            provider: "anthropic".into(),
            hint: "set ANTHROPIC_API_KEY".into(),
        };
        assert!(e.to_string().contains("anthropic"));
        assert!(e.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn output_write_failed_keeps_source() {
        use std::error::Error as _;
        let e = ExtractError::OutputWriteFailed {
            path: PathBuf::from("/tmp/x.docx"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert!(e.source().is_some());
        assert!(e.to_string().contains("x.docx"));
    }
}
