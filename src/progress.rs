//! Progress-callback trait for per-chunk pipeline events.
//!
//! Inject an [`Arc<dyn ProgressObserver>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the orchestrator works through the chunks.
//!
//! Chunks are dispatched one at a time, so events arrive in order:
//! `on_start`, then for each chunk `on_chunk_start` →
//! `on_chunk_complete` | `on_chunk_error`, each completion followed by
//! `on_progress`, then `on_summary_start` (summary mode only) and finally
//! `on_complete`.
//!
//! # Example
//!
//! ```rust
//! use smart_extract::{ExtractionConfig, ProgressObserver};
//! use std::sync::{Arc, Mutex};
//!
//! struct Recorder {
//!     seen: Mutex<Vec<f32>>,
//! }
//!
//! impl ProgressObserver for Recorder {
//!     fn on_progress(&self, fraction: f32) {
//!         self.seen.lock().unwrap().push(fraction);
//!     }
//! }
//!
//! let recorder = Arc::new(Recorder { seen: Mutex::new(vec![]) });
//! let config = ExtractionConfig::builder()
//!     .progress_callback(recorder as Arc<dyn ProgressObserver>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Receives pipeline progress events.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ProgressObserver: Send + Sync {
    /// Called once before the first chunk is dispatched.
    ///
    /// # Arguments
    /// * `total_chunks` — number of chunks that will be transformed
    /// * `total_steps`  — chunks plus the summary step, if enabled
    fn on_start(&self, total_chunks: usize, total_steps: usize) {
        let _ = (total_chunks, total_steps);
    }

    /// Called just before a chunk is sent (1-indexed `chunk_num`).
    fn on_chunk_start(&self, chunk_num: usize, total_chunks: usize) {
        let _ = (chunk_num, total_chunks);
    }

    /// Called when a chunk has been transformed.
    ///
    /// `output_len` is the byte length of the transformed text.
    fn on_chunk_complete(&self, chunk_num: usize, total_chunks: usize, output_len: usize) {
        let _ = (chunk_num, total_chunks, output_len);
    }

    /// Called when a chunk fails. The run aborts right after.
    fn on_chunk_error(&self, chunk_num: usize, total_chunks: usize, error: String) {
        let _ = (chunk_num, total_chunks, error);
    }

    /// Monotonically increasing completion fraction in `(0, 1]`.
    ///
    /// `1.0` is only reported after the true final step.
    fn on_progress(&self, fraction: f32) {
        let _ = fraction;
    }

    /// Called before the summary request is sent.
    fn on_summary_start(&self) {}

    /// Called once after every step succeeded.
    fn on_complete(&self, total_chunks: usize) {
        let _ = total_chunks;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressObserver;

impl ProgressObserver for NoopProgressObserver {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ProgressObserver>;

/// Completion fraction after `completed` of `total_steps` steps.
pub(crate) fn fraction(completed: usize, total_steps: usize) -> f32 {
    if total_steps == 0 {
        return 1.0;
    }
    (completed as f32 / total_steps as f32).clamp(0.0, 1.0)
}
