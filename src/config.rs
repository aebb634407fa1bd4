//! Configuration types for document extraction.
//!
//! Every pipeline variant (tag vocabulary, table handling, summary pass) is
//! selected once per request through [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. There is one pipeline; these enums only steer it.

use crate::error::ExtractError;
use crate::markup::TagVocabulary;
use crate::pipeline::chunker::ChunkMode;
use crate::pipeline::llm::Transformer;
use crate::pipeline::tables::TableMode;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default chunk bound, in tokens.
pub const DEFAULT_MAX_SIZE: usize = 3000;

/// Configuration for one extraction request.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use smart_extract::{ExtractionConfig, SummaryMode, TagVocabulary};
///
/// let config = ExtractionConfig::builder()
///     .max_size(2000)
///     .vocabulary(TagVocabulary::Extended)
///     .summary_mode(SummaryMode::On)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Chunk bound, measured in tokens or characters depending on
    /// `chunk_mode`. Default: 3000.
    ///
    /// 3000 tokens leaves room for the system prompt and a response of similar
    /// length inside an 8k context window.
    pub max_size: usize,

    /// How the bound is measured. Default: [`ChunkMode::Tokens`].
    pub chunk_mode: ChunkMode,

    /// Tag set the transformer is asked to use. Default: [`TagVocabulary::Base`].
    pub vocabulary: TagVocabulary,

    /// Table handling. Default: [`TableMode::Inline`].
    pub table_mode: TableMode,

    /// Whether to run the executive-summary pass. Default: [`SummaryMode::Off`].
    pub summary_mode: SummaryMode,

    /// Name used in the summary prompt and title. If None, the input's file
    /// stem is used, falling back to "document".
    pub document_name: Option<String>,

    /// LLM model identifier, e.g. "gpt-4o". If None, uses the default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed transformer. Takes precedence over every provider
    /// setting; used for tests and custom backends.
    pub transformer: Option<Arc<dyn Transformer>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per chunk. Default: 4096.
    pub max_output_tokens: usize,

    /// Retry attempts per chunk. Default: 0 (a failed chunk aborts at once).
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom chunk system prompt. If None, built from vocabulary and table mode.
    pub system_prompt: Option<String>,

    /// Sleep between chunks so progress advances smoothly. Default: false.
    ///
    /// Purely cosmetic; the delay shrinks as the run approaches completion.
    pub pacing: bool,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,

    /// Stable name for an injected `provider` or `transformer`.
    ///
    /// A trait object has no identity the cache can hash, so requests with an
    /// injected backend are only cached when this is set.
    pub cache_label: Option<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            chunk_mode: ChunkMode::default(),
            vocabulary: TagVocabulary::default(),
            table_mode: TableMode::default(),
            summary_mode: SummaryMode::default(),
            document_name: None,
            model: None,
            provider_name: None,
            provider: None,
            transformer: None,
            temperature: 0.1,
            max_output_tokens: 4096,
            max_retries: 0,
            retry_backoff_ms: 500,
            system_prompt: None,
            pacing: false,
            download_timeout_secs: 120,
            progress_callback: None,
            cache_label: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("max_size", &self.max_size)
            .field("chunk_mode", &self.chunk_mode)
            .field("vocabulary", &self.vocabulary)
            .field("table_mode", &self.table_mode)
            .field("summary_mode", &self.summary_mode)
            .field("document_name", &self.document_name)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("transformer", &self.transformer.as_ref().map(|_| "<dyn Transformer>"))
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("max_retries", &self.max_retries)
            .field("pacing", &self.pacing)
            .field("cache_label", &self.cache_label)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The request selector: every setting that changes what the pipeline
    /// produces for a given input, as a stable string.
    ///
    /// Returns `None` when a pre-built provider or transformer is injected
    /// without a [`cache_label`](Self::cache_label).
    pub fn selector(&self) -> Option<String> {
        let injected = self.provider.is_some() || self.transformer.is_some();
        if injected && self.cache_label.is_none() {
            return None;
        }
        Some(format!(
            "{:?}/{}/{:?}/{:?}/{:?}/{:?}/{:?}/{:?}/{:?}/{}/{}/{:?}",
            self.chunk_mode,
            self.max_size,
            self.vocabulary,
            self.table_mode,
            self.summary_mode,
            self.document_name,
            self.model,
            self.provider_name,
            self.system_prompt,
            self.temperature.to_bits(),
            self.max_output_tokens,
            self.cache_label,
        ))
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn max_size(mut self, n: usize) -> Self {
        self.config.max_size = n;
        self
    }

    pub fn chunk_mode(mut self, mode: ChunkMode) -> Self {
        self.config.chunk_mode = mode;
        self
    }

    pub fn vocabulary(mut self, vocabulary: TagVocabulary) -> Self {
        self.config.vocabulary = vocabulary;
        self
    }

    pub fn table_mode(mut self, mode: TableMode) -> Self {
        self.config.table_mode = mode;
        self
    }

    pub fn summary_mode(mut self, mode: SummaryMode) -> Self {
        self.config.summary_mode = mode;
        self
    }

    pub fn document_name(mut self, name: impl Into<String>) -> Self {
        self.config.document_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn transformer(mut self, transformer: Arc<dyn Transformer>) -> Self {
        self.config.transformer = Some(transformer);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn pacing(mut self, v: bool) -> Self {
        self.config.pacing = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cache_label(mut self, label: impl Into<String>) -> Self {
        self.config.cache_label = Some(label.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.max_size == 0 {
            return Err(ExtractError::InvalidConfig(
                "Chunk size bound must be ≥ 1".into(),
            ));
        }
        if c.table_mode == TableMode::Quotes && c.vocabulary != TagVocabulary::Extended {
            return Err(ExtractError::InvalidConfig(
                "Quote table mode needs the extended tag vocabulary".into(),
            ));
        }
        if c.document_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ExtractError::InvalidConfig(
                "Document name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Whether the executive-summary pass runs after the chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SummaryMode {
    #[default]
    Off,
    On,
}

impl SummaryMode {
    pub fn enabled(&self) -> bool {
        matches!(self, SummaryMode::On)
    }
}
