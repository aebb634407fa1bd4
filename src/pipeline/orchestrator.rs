//! Chunk orchestration: dispatch units to the transformer, one at a time.
//!
//! ## Why sequential?
//!
//! The baseline contract has no two transformer calls in flight. It keeps
//! chunk order trivial (result `i` is pushed after result `i-1`) and makes
//! progress fractions monotone without any bookkeeping.
//!
//! ## Failure model
//!
//! The first unit that fails (after the configured retries, zero by default)
//! aborts the run with one [`ExtractError::TransformationFailure`]. Results
//! gathered so far are dropped; there is no partial annotated text.
//!
//! ## Progress
//!
//! With `n` units and no summary the fraction after unit `i` (0-indexed) is
//! `(i+1)/n`. With a trailing summary step it is `(i+1)/(n+1)`, and `1.0` is
//! only reported once the summary returned.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::pipeline::chunker::Chunk;
use crate::pipeline::llm::{Completion, TransformError, Transformer};
use crate::pipeline::postprocess;
use crate::progress::{self, ProgressCallback};
use crate::summary::{self, SummaryBody};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Per-unit bookkeeping, kept for the run statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitReport {
    pub index: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    pub retries: u32,
}

/// The joined, cleaned transformer output for all units.
#[derive(Debug, Clone, Default)]
pub struct ProcessedText {
    pub annotated: String,
    pub reports: Vec<UnitReport>,
}

/// Cleaned summary response plus token accounting.
#[derive(Debug, Clone)]
pub struct ProcessedSummary {
    pub body: SummaryBody,
    pub report: UnitReport,
}

/// Dispatch knobs derived from [`ExtractionConfig`] for one request.
#[derive(Clone, Default)]
pub struct DispatchOptions {
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Base pacing delay; `None` disables pacing.
    pub pacing: Option<Duration>,
    /// A summary step follows the units.
    pub summary_step: bool,
    pub observer: Option<ProgressCallback>,
}

impl DispatchOptions {
    /// Knobs for a request over `input_bytes` bytes of source text.
    pub fn from_config(config: &ExtractionConfig, input_bytes: usize) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            pacing: config.pacing.then(|| pacing_base(input_bytes)),
            summary_step: config.summary_mode.enabled(),
            observer: config.progress_callback.clone(),
        }
    }
}

/// Base pacing delay: one second per megabyte, clamped to 0.5–3 s.
pub fn pacing_base(input_bytes: usize) -> Duration {
    let secs = (input_bytes as f64 / 1_000_000.0).clamp(0.5, 3.0);
    Duration::from_secs_f64(secs)
}

/// Sequential dispatcher over a [`Transformer`].
pub struct Orchestrator {
    transformer: Arc<dyn Transformer>,
    options: DispatchOptions,
}

impl Orchestrator {
    pub fn new(transformer: Arc<dyn Transformer>, options: DispatchOptions) -> Self {
        Self {
            transformer,
            options,
        }
    }

    fn total_steps(&self, units: usize) -> usize {
        units + usize::from(self.options.summary_step)
    }

    /// Transform every chunk in order and join the cleaned results with `\n`.
    ///
    /// # Errors
    /// [`ExtractError::TransformationFailure`] for the first chunk that fails.
    pub async fn process(&self, chunks: &[Chunk]) -> Result<ProcessedText, ExtractError> {
        let total = chunks.len();
        let steps = self.total_steps(total);
        info!("Dispatching {} chunks ({} steps)", total, steps);
        if let Some(ref cb) = self.options.observer {
            cb.on_start(total, steps);
        }

        let mut results: Vec<String> = Vec::with_capacity(total);
        let mut reports: Vec<UnitReport> = Vec::with_capacity(total);

        for (i, chunk) in chunks.iter().enumerate() {
            let chunk_num = i + 1;
            if let Some(ref cb) = self.options.observer {
                cb.on_chunk_start(chunk_num, total);
            }
            debug!(
                "Chunk {}/{}: {} units{}",
                chunk_num,
                total,
                chunk.size,
                if chunk.oversized { " (oversized)" } else { "" }
            );

            let start = Instant::now();
            let label = format!("Chunk {}/{}", chunk_num, total);
            let outcome = self
                .with_retry(&label, || {
                    self.transformer
                        .transform(&chunk.text, chunk.is_first, chunk.is_last)
                })
                .await;

            let (completion, retries) = match outcome {
                Ok(ok) => ok,
                Err(e) => {
                    if let Some(ref cb) = self.options.observer {
                        cb.on_chunk_error(chunk_num, total, e.to_string());
                    }
                    return Err(ExtractError::TransformationFailure {
                        chunk: chunk_num,
                        total,
                        detail: e.0,
                    });
                }
            };

            let cleaned = postprocess::clean_response(&completion.content);
            if let Some(ref cb) = self.options.observer {
                cb.on_chunk_complete(chunk_num, total, cleaned.len());
            }
            results.push(cleaned);
            reports.push(UnitReport {
                index: chunk.index,
                input_tokens: completion.input_tokens,
                output_tokens: completion.output_tokens,
                duration_ms: start.elapsed().as_millis() as u64,
                retries,
            });

            let fraction = progress::fraction(chunk_num, steps);
            if let Some(ref cb) = self.options.observer {
                cb.on_progress(fraction);
            }
            self.pace(fraction).await;
        }

        if total == 0 && !self.options.summary_step {
            if let Some(ref cb) = self.options.observer {
                cb.on_progress(1.0);
            }
        }
        if !self.options.summary_step {
            if let Some(ref cb) = self.options.observer {
                cb.on_complete(total);
            }
        }

        Ok(ProcessedText {
            annotated: results.join("\n"),
            reports,
        })
    }

    /// Run the trailing summary step over the annotated text.
    ///
    /// Reports the final `1.0` progress and `on_complete(total_chunks)`.
    ///
    /// # Errors
    /// [`ExtractError::SummaryFailure`] when the transformer call fails.
    pub async fn summarize(
        &self,
        annotated: &str,
        document_name: &str,
        total_chunks: usize,
    ) -> Result<ProcessedSummary, ExtractError> {
        if let Some(ref cb) = self.options.observer {
            cb.on_summary_start();
        }
        info!("Summarising {} bytes of annotated text", annotated.len());

        let start = Instant::now();
        let (completion, retries) = self
            .with_retry("Summary", || {
                self.transformer.summarize(annotated, document_name)
            })
            .await
            .map_err(|e| ExtractError::SummaryFailure { detail: e.0 })?;

        let cleaned = postprocess::clean_response(&completion.content);
        let body = SummaryBody::extract(&summary::ensure_delimiters(&cleaned));

        if let Some(ref cb) = self.options.observer {
            cb.on_progress(1.0);
            cb.on_complete(total_chunks);
        }

        Ok(ProcessedSummary {
            body,
            report: UnitReport {
                index: total_chunks,
                input_tokens: completion.input_tokens,
                output_tokens: completion.output_tokens,
                duration_ms: start.elapsed().as_millis() as u64,
                retries,
            },
        })
    }

    /// Call `f` up to `1 + max_retries` times with exponential backoff
    /// (`retry_backoff_ms * 2^(attempt-1)`). Returns the completion and the
    /// number of retries it took.
    async fn with_retry<F, Fut>(
        &self,
        label: &str,
        mut f: F,
    ) -> Result<(Completion, u32), TransformError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Completion, TransformError>>,
    {
        let mut last_err: Option<TransformError> = None;

        for attempt in 0..=self.options.max_retries {
            if attempt > 0 {
                let backoff = self
                    .options
                    .retry_backoff_ms
                    .saturating_mul(2u64.saturating_pow(attempt - 1));
                warn!(
                    "{}: retry {}/{} after {}ms",
                    label, attempt, self.options.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match f().await {
                Ok(completion) => return Ok((completion, attempt)),
                Err(e) => {
                    warn!("{}: attempt {} failed: {}", label, attempt + 1, e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| TransformError("Unknown error".to_string())))
    }

    /// Cosmetic delay that shrinks as the run approaches completion.
    async fn pace(&self, fraction: f32) {
        if let Some(base) = self.options.pacing {
            let delay = base.mul_f32((1.0 - fraction).max(0.0));
            if !delay.is_zero() {
                sleep(delay).await;
            }
        }
    }
}
