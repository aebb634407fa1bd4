//! Chunking: split raw text into size-bounded, ordered units.
//!
//! Two modes share one contract (see [`chunk`]):
//!
//! * [`ChunkMode::Tokens`] — greedy packing of BPE token ids. The bound is
//!   the number of tokens the transformer sees, which is what model context
//!   limits are expressed in.
//! * [`ChunkMode::Lines`] — greedy packing of whole lines by character count.
//!   No tokenizer needed and no line is ever cut in half.
//!
//! The bound is only checked when deciding whether to flush. An atomic unit
//! (one token, one line) that is larger than the bound on its own becomes a
//! single oversized chunk rather than being split.
//!
//! Pieces that are only whitespace (a trailing newline, the blank lines
//! between pages) are not emitted, so no chunk is sent to the transformer
//! empty and `is_last` always marks the final piece of content.
//!
//! Token-mode boundaries can land mid-sentence. That is a known limitation of
//! greedy token packing and is left as is.

use crate::error::ExtractError;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

pub type TokenId = u32;

/// Longest run of trailing tokens moved to the next chunk when a flush point
/// lands inside a multi-byte character. A UTF-8 scalar is at most 4 bytes.
const MAX_CARRY: usize = 3;

/// How chunk size is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChunkMode {
    /// Bound counts BPE tokens. (default)
    #[default]
    Tokens,
    /// Bound counts characters; lines are never split.
    Lines,
}

/// A contiguous piece of the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 0-indexed position in the source.
    pub index: usize,
    pub text: String,
    /// Size as measured by the active [`ChunkMode`].
    pub size: usize,
    pub is_first: bool,
    pub is_last: bool,
    /// A single atomic unit that exceeds the bound on its own.
    pub oversized: bool,
}

/// A reversible text ↔ token-id encoding.
pub trait TokenCodec: Send + Sync {
    fn encode(&self, text: &str) -> Vec<TokenId>;

    /// Decode a token run. Fails when the run does not form valid UTF-8.
    fn decode(&self, tokens: &[TokenId]) -> Result<String, String>;
}

/// `cl100k_base` via tiktoken-rs.
pub struct TiktokenCodec {
    bpe: tiktoken_rs::CoreBPE,
}

impl TiktokenCodec {
    pub fn cl100k() -> Result<Self, ExtractError> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| ExtractError::Internal(format!("Failed to load cl100k_base: {e}")))?;
        Ok(Self { bpe })
    }
}

impl TokenCodec for TiktokenCodec {
    fn encode(&self, text: &str) -> Vec<TokenId> {
        self.bpe
            .encode_ordinary(text)
            .into_iter()
            .map(|t| t as TokenId)
            .collect()
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String, String> {
        self.bpe
            .decode(tokens.iter().map(|&t| t as _).collect())
            .map_err(|e| e.to_string())
    }
}

static DEFAULT_CODEC: OnceCell<Arc<TiktokenCodec>> = OnceCell::new();

/// Shared `cl100k_base` codec; the BPE tables are built once per process.
pub fn default_codec() -> Result<Arc<TiktokenCodec>, ExtractError> {
    DEFAULT_CODEC
        .get_or_try_init(|| TiktokenCodec::cl100k().map(Arc::new))
        .cloned()
}

/// Split `text` into ordered chunks no larger than `max_size`.
///
/// `codec` is only consulted in [`ChunkMode::Tokens`].
///
/// # Errors
/// * [`ExtractError::InvalidConfig`] when `max_size` is zero.
/// * [`ExtractError::AssemblyInconsistency`] when a token run cannot be
///   decoded even after moving trailing tokens to the next chunk.
pub fn chunk(
    text: &str,
    max_size: usize,
    mode: ChunkMode,
    codec: &dyn TokenCodec,
) -> Result<Vec<Chunk>, ExtractError> {
    match mode {
        ChunkMode::Tokens => {
            check_bound(max_size)?;
            let pieces = split_tokens(codec, &codec.encode(text), max_size)?
                .into_iter()
                .map(|(tokens, text)| (text, tokens.len()))
                .collect();
            Ok(into_chunks(pieces, max_size, mode))
        }
        ChunkMode::Lines => chunk_lines(text, max_size),
    }
}

/// Like [`chunk`], using the shared `cl100k_base` codec in token mode.
///
/// Line mode never loads the BPE tables.
pub fn chunk_text(text: &str, max_size: usize, mode: ChunkMode) -> Result<Vec<Chunk>, ExtractError> {
    match mode {
        ChunkMode::Tokens => {
            check_bound(max_size)?;
            let codec = default_codec()?;
            chunk(text, max_size, mode, codec.as_ref())
        }
        ChunkMode::Lines => chunk_lines(text, max_size),
    }
}

fn chunk_lines(text: &str, max_size: usize) -> Result<Vec<Chunk>, ExtractError> {
    check_bound(max_size)?;
    let pieces = split_lines(text, max_size)
        .into_iter()
        .map(|text| {
            let size = text.chars().count();
            (text, size)
        })
        .collect();
    Ok(into_chunks(pieces, max_size, ChunkMode::Lines))
}

fn check_bound(max_size: usize) -> Result<(), ExtractError> {
    if max_size == 0 {
        return Err(ExtractError::InvalidConfig(
            "Chunk size bound must be ≥ 1".into(),
        ));
    }
    Ok(())
}

/// Number the pieces and flag the ends. Blank pieces carry no content and are
/// dropped first, so `is_last` always lands on real text.
fn into_chunks(pieces: Vec<(String, usize)>, max_size: usize, mode: ChunkMode) -> Vec<Chunk> {
    let pieces: Vec<(String, usize)> = pieces
        .into_iter()
        .filter(|(text, _)| !text.trim().is_empty())
        .collect();
    let total = pieces.len();
    let chunks: Vec<Chunk> = pieces
        .into_iter()
        .enumerate()
        .map(|(index, (text, size))| {
            let oversized = size > max_size;
            if oversized {
                warn!(
                    "Chunk {}: single unit of size {} exceeds bound {}",
                    index + 1,
                    size,
                    max_size
                );
            }
            Chunk {
                index,
                text,
                size,
                is_first: index == 0,
                is_last: index + 1 == total,
                oversized,
            }
        })
        .collect();

    debug!("Split into {} chunks ({:?}, bound {})", chunks.len(), mode, max_size);
    chunks
}

/// Greedy token packing. Returns each chunk's token run with its decoded text.
pub fn split_tokens(
    codec: &dyn TokenCodec,
    tokens: &[TokenId],
    max_tokens: usize,
) -> Result<Vec<(Vec<TokenId>, String)>, ExtractError> {
    let mut out = Vec::new();
    let mut buffer: Vec<TokenId> = Vec::new();

    for &token in tokens {
        if !buffer.is_empty() && buffer.len() + 1 > max_tokens {
            let carry = flush_tokens(codec, &mut buffer, &mut out)?;
            buffer = carry;
        }
        buffer.push(token);
    }

    while !buffer.is_empty() {
        let before = buffer.len();
        let carry = flush_tokens(codec, &mut buffer, &mut out)?;
        if carry.len() == before {
            return Err(ExtractError::AssemblyInconsistency(format!(
                "{} trailing token(s) do not decode to valid text",
                before
            )));
        }
        buffer = carry;
    }

    Ok(out)
}

/// Decode and emit `buffer`. If the run ends inside a multi-byte character,
/// emit the longest decodable prefix and return the rest as carry. A run too
/// short to contain a character boundary is returned whole.
fn flush_tokens(
    codec: &dyn TokenCodec,
    buffer: &mut Vec<TokenId>,
    out: &mut Vec<(Vec<TokenId>, String)>,
) -> Result<Vec<TokenId>, ExtractError> {
    let max_carry = MAX_CARRY.min(buffer.len().saturating_sub(1));
    let mut last_err = String::new();

    for carry_len in 0..=max_carry {
        let split = buffer.len() - carry_len;
        match codec.decode(&buffer[..split]) {
            Ok(text) => {
                let carry = buffer.split_off(split);
                if carry_len > 0 {
                    debug!("Carried {} token(s) across a character boundary", carry_len);
                }
                out.push((std::mem::take(buffer), text));
                return Ok(carry);
            }
            Err(e) => last_err = e,
        }
    }

    if buffer.len() <= MAX_CARRY {
        // The whole run sits inside one character; merge it with what follows.
        return Ok(std::mem::take(buffer));
    }
    Err(ExtractError::AssemblyInconsistency(last_err))
}

/// Greedy line packing by character count.
pub fn split_lines(text: &str, max_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    if text.is_empty() {
        return out;
    }

    let mut buffer = String::new();
    let mut buffer_chars = 0usize;
    let mut has_line = false;

    for line in text.split('\n') {
        let line_chars = line.chars().count();
        let joined = if has_line {
            buffer_chars + 1 + line_chars
        } else {
            line_chars
        };

        if has_line && joined > max_chars {
            out.push(std::mem::take(&mut buffer));
            buffer_chars = 0;
            has_line = false;
        }

        if has_line {
            buffer.push('\n');
            buffer_chars += 1;
        }
        buffer.push_str(line);
        buffer_chars += line_chars;
        has_line = true;
    }

    if has_line {
        out.push(buffer);
    }
    out
}
