//! # smart-extract
//!
//! Turn unstructured text extracted from documents into structured, styled
//! Word documents, using an LLM to annotate the structure.
//!
//! ## Why this crate?
//!
//! Text pulled out of a PDF has lost its headings, lists and tables. Asking a
//! model to rewrite the whole document at once overflows its context; asking it
//! for free-form Markdown gives output that is hard to validate. Instead this
//! crate splits the text into token-bounded chunks, asks the model to prefix
//! structural lines with a small closed set of plain-text tags, and assembles
//! the tagged result locally with a strict, fail-open classifier.
//!
//! ## Pipeline Overview
//!
//! ```text
//! text
//!  │
//!  ├─ 1. Tables    optional: lift |a|b| grids out, narrate them locally
//!  ├─ 2. Chunk     tiktoken cl100k (or line length), ≤ max_size per chunk
//!  ├─ 3. LLM       one call per chunk, strictly in order, with progress
//!  ├─ 4. Assemble  tag classifier → flat DocumentTree
//!  ├─ 5. Summary   optional: bracketed, keyword-emphasised summary
//!  └─ 6. Output    .docx rendering + per-run stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smart_extract::{convert, ExtractionConfig, SummaryMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = ExtractionConfig::builder()
//!         .summary_mode(SummaryMode::On)
//!         .build()?;
//!     let output = convert("report.pdf", &config).await?;
//!     for node in output.document.iter() {
//!         println!("{:?}", node);
//!     }
//!     output.write_docx("report.docx").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `smart-extract` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! smart-extract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod markup;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod summary;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::{ArtifactCache, RequestKey};
pub use config::{ExtractionConfig, ExtractionConfigBuilder, SummaryMode};
pub use convert::{convert, convert_sync, convert_to_file, extract_text, extract_text_cached};
pub use error::ExtractError;
pub use markup::{assemble, DocumentTree, MarkupNode, Style, TagVocabulary, Vocabulary};
pub use output::{ExtractionOutput, ExtractionStats};
pub use pipeline::chunker::{chunk, Chunk, ChunkMode, TokenCodec};
pub use pipeline::llm::{Completion, TransformError, Transformer};
pub use pipeline::tables::{TableBlock, TableMode};
pub use progress::{NoopProgressObserver, ProgressCallback, ProgressObserver};
pub use summary::{SummaryBody, SummaryDocument};
