//! Extraction entry points.
//!
//! ## Why one pipeline?
//!
//! Tag vocabulary, table handling and the summary pass look like separate
//! products but differ only in a few switches. [`extract_text`] runs the same
//! steps for every variant and reads the switches from [`ExtractionConfig`]:
//!
//! ```text
//! text ─▶ tables? ─▶ chunk ─▶ transform (sequential) ─▶ join ─▶ + narratives
//!                                                              │
//!                                   DocumentTree ◀─ assemble ◀─┤
//!                                SummaryDocument ◀─ summary? ◀─┘
//! ```

use crate::cache::{ArtifactCache, RequestKey};
use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::markup::{self, Vocabulary, BULLET_GLYPH, INTENSE_QUOTE_TAG, QUOTE_TAG};
use crate::output::{ExtractionOutput, ExtractionStats};
use crate::pipeline::chunker;
use crate::pipeline::input;
use crate::pipeline::llm;
use crate::pipeline::orchestrator::{DispatchOptions, Orchestrator};
use crate::pipeline::tables::{TableBlock, TableMode, TableNormalizer};
use crate::summary;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

const FALLBACK_DOCUMENT_NAME: &str = "document";

/// Run the pipeline over already-extracted text.
///
/// The document name comes from `config.document_name`, or `"document"`.
///
/// # Errors
/// Any [`ExtractError`]; there is never a partial result.
pub async fn extract_text(
    text: &str,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let name = config
        .document_name
        .as_deref()
        .unwrap_or(FALLBACK_DOCUMENT_NAME);
    run(text, name, config).await
}

/// Like [`extract_text`], but returns a cached result for a repeated
/// (text, configuration) pair instead of calling the transformer again.
///
/// Requests with an injected provider or transformer bypass the cache
/// unless `config.cache_label` is set.
pub async fn extract_text_cached(
    text: &str,
    config: &ExtractionConfig,
    cache: &ArtifactCache,
) -> Result<Arc<ExtractionOutput>, ExtractError> {
    let Some(key) = RequestKey::new(text, config) else {
        debug!("Injected backend without a cache label; not caching");
        return extract_text(text, config).await.map(Arc::new);
    };
    if let Some(hit) = cache.get(&key) {
        debug!("Cache hit for {:?}", key);
        return Ok(hit);
    }
    let output = extract_text(text, config).await?;
    Ok(cache.insert(key, output))
}

/// Load a local file or URL, extract its text and run the pipeline.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input` — Local file path or HTTP/HTTPS URL (PDF or UTF-8 text)
/// * `config` — Extraction configuration
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);

    let loaded = input::load_text(input_str, config.download_timeout_secs).await?;
    let name = config.document_name.as_deref().unwrap_or(&loaded.name);
    run(&loaded.text, name, config).await
}

/// Convert and write the styled document to `output_path` as `.docx`.
///
/// With summary mode on, the summary is written next to it as
/// `<stem>_summary.docx`. Uses atomic writes (temp file + rename).
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<(ExtractionStats, Vec<PathBuf>), ExtractError> {
    let output = convert(input_str, config).await?;
    let written = output.write_docx(output_path).await?;
    Ok((output.stats, written))
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run(
    text: &str,
    document_name: &str,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let total_start = Instant::now();

    // ── Step 1: Pull tables out of the free text ─────────────────────────
    let (free_text, tables) = if config.table_mode.extracts() {
        TableNormalizer::default().normalize(text)
    } else {
        (text.to_string(), Vec::new())
    };
    if !tables.is_empty() {
        info!("Extracted {} tables", tables.len());
    }

    // ── Step 2: Chunk ────────────────────────────────────────────────────
    let chunks = chunker::chunk_text(&free_text, config.max_size, config.chunk_mode)?;
    info!("Split input into {} chunks", chunks.len());

    // ── Step 3: Transform every chunk, in order ──────────────────────────
    let transformer = llm::resolve_transformer(config)?;
    let orchestrator = Orchestrator::new(
        transformer,
        DispatchOptions::from_config(config, text.len()),
    );
    let transform_start = Instant::now();
    let processed = orchestrator.process(&chunks).await?;

    // ── Step 4: Append table narratives after all free text ──────────────
    let mut annotated = processed.annotated;
    let narrative = narrative_lines(&tables, config.table_mode);
    if !narrative.is_empty() {
        if !annotated.is_empty() {
            annotated.push('\n');
        }
        annotated.push_str(&narrative.join("\n"));
    }

    // ── Step 5: Assemble the document tree ───────────────────────────────
    let vocabulary = Vocabulary::from(config.vocabulary);
    let document = markup::assemble(&annotated, &vocabulary);
    debug!("Assembled {} nodes", document.len());

    // ── Step 6: Optional summary ─────────────────────────────────────────
    let mut reports = processed.reports;
    let summary = if config.summary_mode.enabled() {
        let s = orchestrator
            .summarize(&annotated, document_name, chunks.len())
            .await?;
        reports.push(s.report);
        Some(summary::assemble_summary(&s.body, document_name))
    } else {
        None
    };
    let transform_duration_ms = transform_start.elapsed().as_millis() as u64;

    // ── Step 7: Stats ────────────────────────────────────────────────────
    let stats = ExtractionStats {
        input_bytes: text.len(),
        total_chunks: chunks.len(),
        oversized_chunks: chunks.iter().filter(|c| c.oversized).count(),
        tables_extracted: tables.len(),
        nodes: document.len(),
        total_input_tokens: reports.iter().map(|r| r.input_tokens as u64).sum(),
        total_output_tokens: reports.iter().map(|r| r.output_tokens as u64).sum(),
        retries: reports.iter().map(|r| r.retries).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        transform_duration_ms,
    };

    info!(
        "Extraction complete: {} chunks, {} nodes, {}ms total",
        stats.total_chunks, stats.nodes, stats.total_duration_ms
    );

    Ok(ExtractionOutput {
        annotated_text: annotated,
        document,
        summary,
        tables,
        stats,
    })
}

/// Annotated lines for extracted tables, in block and row order.
///
/// * `Bullets` — one `• sentence` per data row.
/// * `Quotes` — an `INTENSE QUOTE:` caption per table, then one `QUOTE:`
///   line per data row.
pub fn narrative_lines(tables: &[TableBlock], mode: TableMode) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, table) in tables.iter().enumerate() {
        let sentences = table.narrative();
        match mode {
            TableMode::Inline => {}
            TableMode::Bullets => {
                lines.extend(sentences.into_iter().map(|s| format!("{BULLET_GLYPH} {s}")));
            }
            TableMode::Quotes => {
                let caption = table
                    .header()
                    .iter()
                    .filter(|h| !h.is_empty())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ");
                lines.push(format!("{INTENSE_QUOTE_TAG} Table {}: {}", i + 1, caption));
                lines.extend(sentences.into_iter().map(|s| format!("{QUOTE_TAG} {s}")));
            }
        }
    }
    lines
}
