//! Pipeline stages for structured document extraction.
//!
//! Each submodule implements exactly one step, so each is independently
//! testable and the transformer backend can be swapped without touching the
//! others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ tables ──▶ chunker ──▶ orchestrator ──▶ postprocess ──▶ render
//! (path/URL) (grids)   (bounded)   (llm, in order)  (cleanup)      (.docx)
//! ```
//!
//! 1. [`input`]   — load a path or URL and extract plain text
//! 2. [`tables`]  — lift delimiter-grid tables out of the free text
//! 3. [`chunker`] — split the text into size-bounded, ordered chunks
//! 4. [`orchestrator`] — dispatch chunks one at a time to the
//!    [`llm::Transformer`], with progress and failure aggregation
//! 5. [`postprocess`] — deterministic cleanup of each response
//! 6. [`render`]  — package the assembled tree as a `.docx` file
//!
//! Tag classification sits outside the pipeline in [`crate::markup`].

pub mod chunker;
pub mod input;
pub mod llm;
pub mod orchestrator;
pub mod postprocess;
pub mod render;
pub mod tables;
