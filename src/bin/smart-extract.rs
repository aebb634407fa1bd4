//! CLI binary for smart-extract.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints or writes results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use smart_extract::{
    convert, ChunkMode, ExtractionConfig, ExtractionOutput, ProgressCallback, ProgressObserver,
    SummaryMode, TableMode, TagVocabulary,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress observer using indicatif ────────────────────────────────────

/// Terminal progress observer: a live bar plus one log line per chunk.
struct CliProgress {
    bar: ProgressBar,
    chunk_started: Mutex<Option<Instant>>,
    steps: AtomicUsize,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Extracting text…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            chunk_started: Mutex::new(None),
            steps: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.chunk_started
            .lock()
            .map(|mut g| g.take())
            .ok()
            .flatten()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ProgressObserver for CliProgress {
    fn on_start(&self, total_chunks: usize, total_steps: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} steps  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.steps.store(total_steps, Ordering::SeqCst);
        self.bar.set_length(total_steps as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Transforming");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_chunks} chunks…"))
        ));
    }

    fn on_chunk_start(&self, chunk_num: usize, _total: usize) {
        if let Ok(mut g) = self.chunk_started.lock() {
            *g = Some(Instant::now());
        }
        self.bar.set_message(format!("chunk {chunk_num}"));
    }

    fn on_chunk_complete(&self, chunk_num: usize, total: usize, output_len: usize) {
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            chunk_num,
            total,
            dim(&format!("{output_len:>5} chars")),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
    }

    fn on_chunk_error(&self, chunk_num: usize, total: usize, error: String) {
        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error
        };
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}  {}",
            red("✗"),
            chunk_num,
            total,
            red(&msg),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.abandon();
    }

    fn on_progress(&self, fraction: f32) {
        let steps = self.steps.load(Ordering::SeqCst) as f32;
        self.bar.set_position((fraction * steps).round() as u64);
    }

    fn on_summary_start(&self) {
        self.bar.set_message("summary");
    }

    fn on_complete(&self, total_chunks: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} chunks transformed",
            green("✔"),
            bold(&total_chunks.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Annotated text to stdout
  smart-extract report.pdf

  # Styled Word document
  smart-extract report.pdf -o report.docx

  # Executive summary too (written to report_summary.docx)
  smart-extract --summary report.pdf -o report.docx

  # Five heading levels, tables narrated as quotes
  smart-extract --vocabulary extended --tables quotes report.pdf -o report.docx

  # Plain text input, chunked by line length instead of tokens
  smart-extract --chunk-mode lines --max-size 6000 notes.txt

  # JSON output (annotated text, document tree, stats)
  smart-extract --json report.pdf > report.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Override log filter (e.g. smart_extract=debug)
"#;

/// Turn extracted document text into structured, styled Word documents.
#[derive(Parser, Debug)]
#[command(
    name = "smart-extract",
    version,
    about = "Turn document text into structured, styled Word documents using LLMs",
    long_about = "Extract the text of a PDF or text file (local or URL), split it into \
token-bounded chunks, let an LLM tag headings, lists and quotes, and assemble the result \
into a styled .docx document. Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI and \
any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF or text file path, or HTTP/HTTPS URL.
    input: String,

    /// Write the styled document to this .docx file instead of printing text.
    #[arg(short, long, env = "SMART_EXTRACT_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4o, gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Chunk bound, in tokens or characters (see --chunk-mode).
    #[arg(long, env = "SMART_EXTRACT_MAX_SIZE", default_value_t = 3000,
          value_parser = clap::value_parser!(u64).range(1..))]
    max_size: u64,

    /// How the chunk bound is measured.
    #[arg(long, env = "SMART_EXTRACT_CHUNK_MODE", value_enum, default_value = "tokens")]
    chunk_mode: ChunkModeArg,

    /// Tag vocabulary the model is asked to use.
    #[arg(long, env = "SMART_EXTRACT_VOCABULARY", value_enum, default_value = "base")]
    vocabulary: VocabularyArg,

    /// Table handling: leave inline, or extract and narrate as bullets/quotes.
    #[arg(long, env = "SMART_EXTRACT_TABLES", value_enum, default_value = "inline")]
    tables: TablesArg,

    /// Also produce an executive summary.
    #[arg(long, env = "SMART_EXTRACT_SUMMARY")]
    summary: bool,

    /// Document name for the summary (default: input file stem).
    #[arg(long, env = "SMART_EXTRACT_NAME")]
    name: Option<String>,

    /// Path to a text file containing a custom chunk system prompt.
    #[arg(long, env = "SMART_EXTRACT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens per chunk.
    #[arg(long, env = "SMART_EXTRACT_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "SMART_EXTRACT_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per chunk on LLM failure.
    #[arg(long, env = "SMART_EXTRACT_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Pause between chunks so progress advances evenly.
    #[arg(long, env = "SMART_EXTRACT_PACING")]
    pacing: bool,

    /// Output structured JSON (ExtractionOutput) instead of annotated text.
    #[arg(long, env = "SMART_EXTRACT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SMART_EXTRACT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SMART_EXTRACT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SMART_EXTRACT_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "SMART_EXTRACT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ChunkModeArg {
    Tokens,
    Lines,
}

impl From<ChunkModeArg> for ChunkMode {
    fn from(v: ChunkModeArg) -> Self {
        match v {
            ChunkModeArg::Tokens => ChunkMode::Tokens,
            ChunkModeArg::Lines => ChunkMode::Lines,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum VocabularyArg {
    Base,
    Extended,
}

impl From<VocabularyArg> for TagVocabulary {
    fn from(v: VocabularyArg) -> Self {
        match v {
            VocabularyArg::Base => TagVocabulary::Base,
            VocabularyArg::Extended => TagVocabulary::Extended,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum TablesArg {
    Inline,
    Bullets,
    Quotes,
}

impl From<TablesArg> for TableMode {
    fn from(v: TablesArg) -> Self {
        match v {
            TablesArg::Inline => TableMode::Inline,
            TablesArg::Bullets => TableMode::Bullets,
            TablesArg::Quotes => TableMode::Quotes,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar provides all the feedback that matters, so library
    // INFO logs are suppressed while it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgress::new() as Arc<dyn ProgressObserver>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Run extraction ───────────────────────────────────────────────────
    let output = convert(&cli.input, &config)
        .await
        .context("Extraction failed")?;

    if let Some(ref output_path) = cli.output {
        let written = output
            .write_docx(output_path)
            .await
            .context("Failed to write document")?;
        if !cli.quiet {
            for path in &written {
                eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
            }
        }
    } else if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        print_text(&output)?;
    }

    if !cli.quiet && !cli.json {
        let stats = &output.stats;
        eprintln!(
            "   {} chunks  {} nodes  {} tables  —  {} tokens in  /  {} tokens out  —  {}ms total",
            stats.total_chunks,
            stats.nodes,
            stats.tables_extracted,
            dim(&stats.total_input_tokens.to_string()),
            dim(&stats.total_output_tokens.to_string()),
            stats.total_duration_ms,
        );
        if stats.oversized_chunks > 0 {
            eprintln!(
                "   {} {} chunks exceed the size bound",
                cyan("⚠"),
                stats.oversized_chunks
            );
        }
    }

    Ok(())
}

/// Annotated text, then the summary (if any), to stdout.
fn print_text(output: &ExtractionOutput) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", output.annotated_text).context("Failed to write to stdout")?;
    if let Some(ref summary) = output.summary {
        writeln!(handle, "\n{}\n", summary.title).context("Failed to write to stdout")?;
        for p in &summary.paragraphs {
            writeln!(handle, "{}\n", p.plain_text()).context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .max_size(cli.max_size as usize)
        .chunk_mode(cli.chunk_mode.into())
        .vocabulary(cli.vocabulary.into())
        .table_mode(cli.tables.into())
        .summary_mode(if cli.summary {
            SummaryMode::On
        } else {
            SummaryMode::Off
        })
        .max_output_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .pacing(cli.pacing)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref name) = cli.name {
        builder = builder.document_name(name.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
