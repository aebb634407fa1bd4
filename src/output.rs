//! Request-scoped extraction result.
//!
//! Everything a caller may want to show or save after a run lives in one
//! [`ExtractionOutput`] value. Nothing is kept in process-wide state; use
//! [`crate::cache::ArtifactCache`] explicitly to reuse a previous result.

use crate::markup::DocumentTree;
use crate::pipeline::render;
use crate::pipeline::tables::TableBlock;
use crate::summary::SummaryDocument;
use crate::error::ExtractError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Result of one extraction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Joined transformer output plus appended table narratives.
    pub annotated_text: String,

    /// Structured, styled document assembled from `annotated_text`.
    pub document: DocumentTree,

    /// Executive summary, when summary mode was on.
    pub summary: Option<SummaryDocument>,

    /// Tables extracted before chunking (empty in inline table mode).
    pub tables: Vec<TableBlock>,

    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// Render the main document as `.docx` bytes.
    pub fn document_docx(&self) -> Result<Vec<u8>, ExtractError> {
        render::render_document(&self.document)
    }

    /// Render the summary as `.docx` bytes, if there is one.
    pub fn summary_docx(&self) -> Result<Option<Vec<u8>>, ExtractError> {
        self.summary.as_ref().map(render::render_summary).transpose()
    }

    /// Write the document (and the summary, next to it as
    /// `<stem>_summary.docx`) to disk. Returns the paths written.
    pub async fn write_docx(&self, path: impl AsRef<Path>) -> Result<Vec<PathBuf>, ExtractError> {
        let path = path.as_ref();
        let mut written = Vec::with_capacity(2);

        render::write_atomic(path, &self.document_docx()?).await?;
        written.push(path.to_path_buf());

        if let Some(bytes) = self.summary_docx()? {
            let summary_path = summary_path_for(path);
            render::write_atomic(&summary_path, &bytes).await?;
            written.push(summary_path);
        }
        Ok(written)
    }
}

/// `out/report.docx` → `out/report_summary.docx`.
pub fn summary_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    path.with_file_name(format!("{stem}_summary.docx"))
}

/// Aggregate counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Bytes of source text, before table extraction.
    pub input_bytes: usize,
    pub total_chunks: usize,
    /// Chunks holding a single unit larger than the bound.
    pub oversized_chunks: usize,
    pub tables_extracted: usize,
    pub nodes: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub retries: u32,
    pub total_duration_ms: u64,
    pub transform_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::MarkupNode;
    use crate::summary::{Run, SummaryParagraph};

    fn output(summary: bool) -> ExtractionOutput {
        ExtractionOutput {
            annotated_text: "MAIN HEADING: A".into(),
            document: DocumentTree {
                nodes: vec![MarkupNode::Heading {
                    level: 1,
                    text: "A".into(),
                }],
            },
            summary: summary.then(|| SummaryDocument {
                title: "Executive Summary of a".into(),
                paragraphs: vec![SummaryParagraph {
                    runs: vec![Run::plain("x")],
                }],
            }),
            tables: vec![],
            stats: ExtractionStats::default(),
        }
    }

    #[test]
    fn summary_path_sits_next_to_document() {
        assert_eq!(
            summary_path_for(Path::new("out/report.docx")),
            PathBuf::from("out/report_summary.docx")
        );
    }

    #[test]
    fn summary_docx_absent_without_summary() {
        assert!(output(false).summary_docx().unwrap().is_none());
        assert!(output(true).summary_docx().unwrap().is_some());
    }

    #[test]
    fn output_serialises_to_json() {
        let json = serde_json::to_string(&output(false)).unwrap();
        assert!(json.contains("\"annotated_text\""));
        assert!(json.contains("\"heading\""));
    }

    #[tokio::test]
    async fn write_docx_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.docx");
        let written = output(true).write_docx(&path).await.unwrap();
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|p| p.exists()));
    }
}
