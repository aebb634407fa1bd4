//! Summary pass: bracketed, keyword-emphasised executive summary.
//!
//! The transformer is asked to wrap its answer in `SUMMARY START` /
//! `SUMMARY END` and to mark keywords as `*keyword*`. Neither is guaranteed,
//! so [`ensure_delimiters`] repairs missing markers and [`assemble_summary`]
//! applies a strict parity rule to the `*` splits: no nesting, no escaping.

use crate::prompts::{SUMMARY_END, SUMMARY_START};
use serde::{Deserialize, Serialize};

/// Keyword emphasis delimiter.
pub const EMPHASIS_DELIMITER: char = '*';

/// Add whichever summary marker is missing, leaving the response untouched.
///
/// The result always contains exactly one start and one end marker when the
/// input contained at most one of each.
pub fn ensure_delimiters(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + SUMMARY_START.len() + SUMMARY_END.len() + 2);
    if !raw.contains(SUMMARY_START) {
        out.push_str(SUMMARY_START);
        out.push('\n');
    }
    out.push_str(raw);
    if !raw.contains(SUMMARY_END) {
        out.push('\n');
        out.push_str(SUMMARY_END);
    }
    out
}

/// Text strictly between the summary markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryBody(pub String);

impl SummaryBody {
    /// Extract the body from a response, repairing markers first.
    pub fn extract(raw: &str) -> Self {
        let bracketed = ensure_delimiters(raw);
        let after_start = bracketed
            .split_once(SUMMARY_START)
            .map(|(_, rest)| rest)
            .unwrap_or(&bracketed);
        let body = after_start
            .split_once(SUMMARY_END)
            .map(|(body, _)| body)
            .unwrap_or(after_start);
        SummaryBody(body.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A span of summary text, either plain or emphasised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub text: String,
    pub emphasis: bool,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emphasis: false,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emphasis: true,
        }
    }
}

/// One paragraph of the summary document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryParagraph {
    pub runs: Vec<Run>,
}

impl SummaryParagraph {
    /// Paragraph text with emphasis markers removed.
    pub fn plain_text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// The assembled summary: a title followed by run-level paragraphs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryDocument {
    pub title: String,
    pub paragraphs: Vec<SummaryParagraph>,
}

/// Split one paragraph into alternating plain/emphasised runs.
///
/// Pieces at odd split indices are emphasised. Empty pieces are dropped
/// without disturbing the parity of the rest.
pub fn emphasis_runs(paragraph: &str) -> Vec<Run> {
    paragraph
        .split(EMPHASIS_DELIMITER)
        .enumerate()
        .filter(|(_, piece)| !piece.is_empty())
        .map(|(i, piece)| {
            if i % 2 == 1 {
                Run::bold(piece)
            } else {
                Run::plain(piece)
            }
        })
        .collect()
}

/// Build the summary document for `document_name` from an extracted body.
pub fn assemble_summary(body: &SummaryBody, document_name: &str) -> SummaryDocument {
    let paragraphs = body
        .as_str()
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| SummaryParagraph {
            runs: emphasis_runs(p),
        })
        .filter(|p| !p.runs.is_empty())
        .collect();

    SummaryDocument {
        title: format!("Executive Summary of {}", document_name),
        paragraphs,
    }
}
