//! Transformer seam: the remote text-transformation call.
//!
//! The orchestrator only knows the [`Transformer`] trait. The production
//! implementation, [`LlmTransformer`], is a thin adapter over an
//! `edgequake_llm` provider; all prompt wording lives in [`crate::prompts`]
//! so it can change without touching retry or error handling.
//!
//! ## Provider resolution
//!
//! [`resolve_transformer`] walks from most to least specific:
//!
//! 1. **Pre-built transformer** (`config.transformer`) — used as-is. This is
//!    how tests inject a deterministic fake.
//! 2. **Pre-built provider** (`config.provider`).
//! 3. **Named provider + model** (`config.provider_name`).
//! 4. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
//! 5. **`OPENAI_API_KEY`** present → OpenAI with [`DEFAULT_MODEL`].
//! 6. **Full auto-detection** (`ProviderFactory::from_env`).

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::prompts;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// A failed transformer call. The orchestrator wraps it into the
/// request-level [`ExtractError`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct TransformError(pub String);

impl From<String> for TransformError {
    fn from(s: String) -> Self {
        TransformError(s)
    }
}

impl From<&str> for TransformError {
    fn from(s: &str) -> Self {
        TransformError(s.to_string())
    }
}

/// One transformer response plus token accounting, when the backend reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// The remote text-transformation service.
///
/// Calls are issued strictly one at a time; implementations need not be
/// re-entrant, only `Send + Sync` so they can sit behind an `Arc`.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Annotate one chunk with structural tags.
    async fn transform(
        &self,
        unit: &str,
        is_first: bool,
        is_last: bool,
    ) -> Result<Completion, TransformError>;

    /// Produce a bracketed, keyword-emphasised summary of the annotated text.
    async fn summarize(
        &self,
        text: &str,
        document_name: &str,
    ) -> Result<Completion, TransformError>;
}

/// [`Transformer`] backed by an `edgequake_llm` chat provider.
pub struct LlmTransformer {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    temperature: f32,
    max_tokens: usize,
}

impl LlmTransformer {
    /// Build a transformer whose chunk prompt matches the configured
    /// vocabulary and table mode (unless overridden).
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        let system_prompt = config
            .system_prompt
            .clone()
            .unwrap_or_else(|| prompts::chunk_system_prompt(config.vocabulary, config.table_mode));
        Self {
            provider,
            system_prompt,
            temperature: config.temperature,
            max_tokens: config.max_output_tokens,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }

    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<Completion, TransformError> {
        let options = self.options();
        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| TransformError(e.to_string()))?;
        debug!(
            "{} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(Completion {
            content: response.content,
            input_tokens: response.prompt_tokens as usize,
            output_tokens: response.completion_tokens as usize,
        })
    }
}

#[async_trait]
impl Transformer for LlmTransformer {
    async fn transform(
        &self,
        unit: &str,
        is_first: bool,
        is_last: bool,
    ) -> Result<Completion, TransformError> {
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user(prompts::chunk_user_message(unit, is_first, is_last)),
        ];
        self.chat(messages).await
    }

    async fn summarize(
        &self,
        text: &str,
        document_name: &str,
    ) -> Result<Completion, TransformError> {
        let messages = vec![
            ChatMessage::system(prompts::summary_system_prompt(document_name)),
            ChatMessage::user(prompts::summary_user_message(text)),
        ];
        self.chat(messages).await
    }
}

/// Resolve the transformer for a request (see the module docs for the order).
pub fn resolve_transformer(
    config: &ExtractionConfig,
) -> Result<Arc<dyn Transformer>, ExtractError> {
    if let Some(ref transformer) = config.transformer {
        return Ok(Arc::clone(transformer));
    }
    let provider = resolve_provider(config)?;
    Ok(Arc::new(LlmTransformer::new(provider, config)))
}

/// Resolve the LLM provider, from most-specific to least-specific.
pub fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    // Honour EDGEQUAKE_LLM_PROVIDER + EDGEQUAKE_MODEL only when both are set.
    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExtractError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ExtractError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
