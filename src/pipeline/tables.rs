//! Table normalisation: pull delimiter-grid blocks out of free text.
//!
//! PDF text extraction frequently yields tables as `|a|b|c|` lines. Sending
//! those to the transformer wastes tokens and invites it to re-flow or drop
//! cells, so in the `Bullets` / `Quotes` table modes they are lifted out before
//! chunking and turned into one sentence per data row locally.
//!
//! Narratives are appended *after* all transformed free text. They are never
//! re-inserted at the table's original position.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default cell delimiter.
pub const DEFAULT_DELIMITER: char = '|';

static RE_PIPE_ROW: Lazy<Regex> = Lazy::new(|| row_pattern(DEFAULT_DELIMITER));

/// A row line starts and ends with the delimiter and has at least one cell.
fn row_pattern(delimiter: char) -> Regex {
    let d = regex::escape(&delimiter.to_string());
    Regex::new(&format!(r"^{d}(?:[^{d}]*{d})+$")).expect("escaped delimiter pattern is valid")
}

/// How tables found in the input are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TableMode {
    /// Tables stay in the text; the transformer is asked to convert them. (default)
    #[default]
    Inline,
    /// Tables are extracted; narratives are appended as bullet items.
    Bullets,
    /// Tables are extracted; narratives are appended as quote annotations
    /// (requires the extended tag vocabulary).
    Quotes,
}

impl TableMode {
    pub fn extracts(&self) -> bool {
        !matches!(self, TableMode::Inline)
    }
}

/// An extracted table. The first row is the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableBlock {
    pub rows: Vec<Vec<String>>,
}

impl TableBlock {
    pub fn header(&self) -> &[String] {
        self.rows.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn data_rows(&self) -> &[Vec<String>] {
        self.rows.get(1..).unwrap_or(&[])
    }

    /// One sentence per data row, in row order.
    ///
    /// Each sentence starts with the row's first cell, followed by
    /// `header: value` pairs for the remaining non-empty cells.
    pub fn narrative(&self) -> Vec<String> {
        let header = self.header();
        self.data_rows()
            .iter()
            .map(|row| row_sentence(header, row))
            .collect()
    }
}

fn row_sentence(header: &[String], row: &[String]) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(row.len());
    if let Some(first) = row.first() {
        parts.push(first.clone());
    }
    for (i, cell) in row.iter().enumerate().skip(1) {
        if cell.is_empty() {
            continue;
        }
        match header.get(i).filter(|h| !h.is_empty()) {
            Some(h) => parts.push(format!("{}: {}", h, cell)),
            None => parts.push(cell.clone()),
        }
    }
    let mut sentence = parts.join(", ");
    if !sentence.ends_with('.') {
        sentence.push('.');
    }
    sentence
}

/// Extracts delimiter-grid tables from text.
#[derive(Debug, Clone)]
pub struct TableNormalizer {
    delimiter: char,
    pattern: Regex,
}

impl Default for TableNormalizer {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            pattern: RE_PIPE_ROW.clone(),
        }
    }
}

impl TableNormalizer {
    pub fn with_delimiter(delimiter: char) -> Self {
        Self {
            delimiter,
            pattern: row_pattern(delimiter),
        }
    }

    pub fn is_row(&self, line: &str) -> bool {
        let trimmed = line.trim();
        trimmed.chars().count() > 1 && self.pattern.is_match(trimmed)
    }

    /// Split `text` into residual free text and the tables it contained.
    ///
    /// Every maximal run of consecutive row lines forms one block. Residual
    /// text keeps the remaining lines in their original order.
    pub fn normalize(&self, text: &str) -> (String, Vec<TableBlock>) {
        let mut residual: Vec<&str> = Vec::new();
        let mut blocks: Vec<TableBlock> = Vec::new();
        let mut current: Vec<Vec<String>> = Vec::new();
        let mut in_block = false;

        for line in text.split('\n') {
            if self.is_row(line) {
                in_block = true;
                if !is_separator_row(line, self.delimiter) {
                    current.push(self.cells(line));
                }
                continue;
            }
            if in_block {
                push_block(&mut blocks, &mut current);
                in_block = false;
            }
            residual.push(line);
        }
        if in_block {
            push_block(&mut blocks, &mut current);
        }

        (residual.join("\n"), blocks)
    }

    fn cells(&self, line: &str) -> Vec<String> {
        let trimmed = line.trim();
        let inner = trimmed
            .strip_prefix(self.delimiter)
            .and_then(|s| s.strip_suffix(self.delimiter))
            .unwrap_or(trimmed);
        inner
            .split(self.delimiter)
            .map(|c| c.trim().to_string())
            .collect()
    }
}

fn push_block(blocks: &mut Vec<TableBlock>, current: &mut Vec<Vec<String>>) {
    if !current.is_empty() {
        blocks.push(TableBlock {
            rows: std::mem::take(current),
        });
    }
}

/// A Markdown alignment row such as `| --- | :-: |`.
fn is_separator_row(line: &str, delimiter: char) -> bool {
    let trimmed = line.trim();
    trimmed.contains('-')
        && trimmed
            .chars()
            .all(|c| c == delimiter || c == '-' || c == ':' || c.is_whitespace())
}

/// Convenience wrapper using the default `|` delimiter.
pub fn normalize(text: &str) -> (String, Vec<TableBlock>) {
    TableNormalizer::default().normalize(text)
}
