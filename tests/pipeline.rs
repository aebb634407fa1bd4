//! Whole-pipeline tests with an in-process transformer.
//!
//! No network: every test injects a [`Transformer`] through
//! `ExtractionConfigBuilder::transformer`, so the chunker, table normaliser,
//! orchestrator, assembler and renderer all run for real.

use async_trait::async_trait;
use smart_extract::{
    extract_text, extract_text_cached, ArtifactCache, ChunkMode, Completion, ExtractError,
    ExtractionConfig, MarkupNode, ProgressObserver, SummaryMode, TableMode, TagVocabulary,
    TransformError, Transformer,
};
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test transformers ────────────────────────────────────────────────────────

/// Returns each chunk unchanged; optionally fails on one call (1-indexed).
struct Echo {
    calls: AtomicUsize,
    fail_on: Option<usize>,
    summary: String,
}

impl Echo {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_on: None,
            summary: "SUMMARY START\nThis document covers *growth*.\n\nIt *matters*.\nSUMMARY END"
                .to_string(),
        })
    }

    fn failing_on(call: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_on: Some(call),
            summary: String::new(),
        })
    }
}

#[async_trait]
impl Transformer for Echo {
    async fn transform(
        &self,
        unit: &str,
        _is_first: bool,
        _is_last: bool,
    ) -> Result<Completion, TransformError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(n) {
            return Err(TransformError("HTTP 500".to_string()));
        }
        Ok(Completion::text(unit))
    }

    async fn summarize(
        &self,
        _text: &str,
        _document_name: &str,
    ) -> Result<Completion, TransformError> {
        Ok(Completion::text(self.summary.as_str()))
    }
}

/// Always answers with the same annotated text.
struct Fixed(&'static str);

#[async_trait]
impl Transformer for Fixed {
    async fn transform(
        &self,
        _unit: &str,
        _is_first: bool,
        _is_last: bool,
    ) -> Result<Completion, TransformError> {
        Ok(Completion::text(self.0))
    }

    async fn summarize(
        &self,
        _text: &str,
        _document_name: &str,
    ) -> Result<Completion, TransformError> {
        // No markers at all: they must be synthesised.
        Ok(Completion::text("Short *summary*."))
    }
}

#[derive(Default)]
struct Recorder {
    fractions: Mutex<Vec<f32>>,
    completes: AtomicUsize,
}

impl ProgressObserver for Recorder {
    fn on_progress(&self, fraction: f32) {
        self.fractions.lock().unwrap().push(fraction);
    }

    fn on_complete(&self, _total_chunks: usize) {
        self.completes.fetch_add(1, Ordering::SeqCst);
    }
}

fn lines_config(transformer: Arc<dyn Transformer>) -> smart_extract::ExtractionConfigBuilder {
    ExtractionConfig::builder()
        .chunk_mode(ChunkMode::Lines)
        .transformer(transformer)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn annotated_response_becomes_document_tree() {
    let config = lines_config(Arc::new(Fixed(
        "MAIN HEADING: Intro\n\nSome text.\n\n• item one\n• item two",
    )))
    .build()
    .unwrap();

    let out = extract_text("raw extracted text", &config).await.unwrap();
    assert_eq!(
        out.document.nodes,
        vec![
            MarkupNode::Heading {
                level: 1,
                text: "Intro".into()
            },
            MarkupNode::Paragraph("Some text.".into()),
            MarkupNode::BulletItem("item one".into()),
            MarkupNode::BulletItem("item two".into()),
        ]
    );
    assert_eq!(out.stats.total_chunks, 1);
    assert_eq!(out.stats.nodes, 4);
    assert!(out.summary.is_none());
}

#[tokio::test]
async fn chunk_order_survives_the_round_trip() {
    let input: String = (1..=40)
        .map(|i| format!("Line number {i} of the source."))
        .collect::<Vec<_>>()
        .join("\n");
    let echo = Echo::new();
    let config = lines_config(echo.clone()).max_size(100).build().unwrap();

    let out = extract_text(&input, &config).await.unwrap();
    assert!(out.stats.total_chunks > 1);
    assert_eq!(echo.calls.load(Ordering::SeqCst), out.stats.total_chunks);
    assert_eq!(out.annotated_text, input);
    assert_eq!(out.document.len(), 40);
    assert_eq!(
        out.document.nodes[39],
        MarkupNode::Paragraph("Line number 40 of the source.".into())
    );
}

#[tokio::test]
async fn token_mode_uses_real_tokenizer() {
    let input = "SUBHEADING: Scope\nÜberprüfung der Daten — 数据 check.\n".repeat(30);
    let config = ExtractionConfig::builder()
        .transformer(Echo::new())
        .max_size(50)
        .build()
        .unwrap();

    let out = extract_text(&input, &config).await.unwrap();
    assert!(out.stats.total_chunks > 1);
    assert!(out
        .document
        .iter()
        .any(|n| matches!(n, MarkupNode::Heading { level: 2, .. })));
}

#[tokio::test]
async fn failed_chunk_aborts_the_request() {
    let input = (1..=10)
        .map(|i| format!("line {i}"))
        .collect::<Vec<_>>()
        .join("\n");
    let echo = Echo::failing_on(2);
    let config = lines_config(echo.clone()).max_size(10).build().unwrap();

    let err = extract_text(&input, &config).await.unwrap_err();
    match err {
        ExtractError::TransformationFailure { chunk, detail, .. } => {
            assert_eq!(chunk, 2);
            assert_eq!(detail, "HTTP 500");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(echo.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn bullet_tables_are_appended_after_free_text() {
    let config = lines_config(Echo::new())
        .table_mode(TableMode::Bullets)
        .build()
        .unwrap();

    let out = extract_text("|A|B|\n|1|2|\nFoo", &config).await.unwrap();
    assert_eq!(out.tables.len(), 1);
    assert_eq!(out.annotated_text, "Foo\n• 1, B: 2.");
    assert_eq!(
        out.document.nodes,
        vec![
            MarkupNode::Paragraph("Foo".into()),
            MarkupNode::BulletItem("1, B: 2.".into()),
        ]
    );
}

#[tokio::test]
async fn quote_tables_need_and_use_extended_vocabulary() {
    let config = lines_config(Echo::new())
        .table_mode(TableMode::Quotes)
        .vocabulary(TagVocabulary::Extended)
        .build()
        .unwrap();

    let out = extract_text("before\n|Name|Age|\n|Ann|30|\nafter", &config)
        .await
        .unwrap();
    assert_eq!(
        out.document.nodes,
        vec![
            MarkupNode::Paragraph("before".into()),
            MarkupNode::Paragraph("after".into()),
            MarkupNode::IntenseQuote("Table 1: Name, Age".into()),
            MarkupNode::Quote("Ann, Age: 30.".into()),
        ]
    );
}

#[tokio::test]
async fn table_only_input_sends_nothing_to_the_transformer() {
    let echo = Echo::new();
    let config = lines_config(echo.clone())
        .table_mode(TableMode::Bullets)
        .build()
        .unwrap();

    let out = extract_text("|k|v|\n|a|1|", &config).await.unwrap();
    assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
    assert_eq!(out.annotated_text, "• a, v: 1.");
}

#[tokio::test]
async fn summary_mode_builds_emphasised_summary() {
    let recorder = Arc::new(Recorder::default());
    let config = lines_config(Echo::new())
        .summary_mode(SummaryMode::On)
        .document_name("q3-report")
        .max_size(5)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let out = extract_text("one\ntwo\nthree", &config).await.unwrap();
    let summary = out.summary.expect("summary requested");
    assert_eq!(summary.title, "Executive Summary of q3-report");
    assert_eq!(summary.paragraphs.len(), 2);
    assert!(summary.paragraphs[0].runs.iter().any(|r| r.emphasis && r.text == "growth"));

    let fractions = recorder.fractions.lock().unwrap().clone();
    assert_eq!(fractions.len(), 4);
    assert!(fractions.windows(2).all(|w| w[0] < w[1]));
    assert!(fractions[..3].iter().all(|f| *f < 1.0));
    assert_eq!(fractions[3], 1.0);
    assert_eq!(recorder.completes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn summary_markers_are_synthesised_when_missing() {
    let config = lines_config(Arc::new(Fixed("MAIN HEADING: X")))
        .summary_mode(SummaryMode::On)
        .build()
        .unwrap();

    let out = extract_text("x", &config).await.unwrap();
    let summary = out.summary.unwrap();
    assert_eq!(summary.title, "Executive Summary of document");
    assert_eq!(summary.paragraphs[0].plain_text(), "Short summary.");
}

#[tokio::test]
async fn cached_requests_do_not_call_the_transformer_again() {
    let echo = Echo::new();
    let config = lines_config(echo.clone())
        .cache_label("echo")
        .build()
        .unwrap();
    let cache = ArtifactCache::default();

    let first = extract_text_cached("same text", &config, &cache).await.unwrap();
    let second = extract_text_cached("same text", &config, &cache).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(echo.calls.load(Ordering::SeqCst), 1);

    extract_text_cached("other text", &config, &cache).await.unwrap();
    assert_eq!(echo.calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.last().unwrap().annotated_text, "other text");
}

#[tokio::test]
async fn cache_separates_requests_with_different_prompts() {
    let cache = ArtifactCache::default();
    let a = lines_config(Arc::new(Fixed("FROM PROMPT A")))
        .system_prompt("prompt A")
        .cache_label("fixed")
        .build()
        .unwrap();
    let b = lines_config(Arc::new(Fixed("FROM PROMPT B")))
        .system_prompt("prompt B")
        .cache_label("fixed")
        .build()
        .unwrap();

    let first = extract_text_cached("same text", &a, &cache).await.unwrap();
    let second = extract_text_cached("same text", &b, &cache).await.unwrap();
    assert_eq!(first.annotated_text, "FROM PROMPT A");
    assert_eq!(second.annotated_text, "FROM PROMPT B");
    assert_eq!(cache.len(), 2);
}

#[tokio::test]
async fn unlabelled_injected_transformer_bypasses_cache() {
    let echo = Echo::new();
    let config = lines_config(echo.clone()).build().unwrap();
    let cache = ArtifactCache::default();

    extract_text_cached("same text", &config, &cache).await.unwrap();
    extract_text_cached("same text", &config, &cache).await.unwrap();
    assert_eq!(echo.calls.load(Ordering::SeqCst), 2);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn empty_input_produces_empty_document() {
    let echo = Echo::new();
    let config = lines_config(echo.clone()).build().unwrap();
    let out = extract_text("", &config).await.unwrap();
    assert!(out.document.is_empty());
    assert_eq!(out.stats.total_chunks, 0);
    assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn convert_to_file_writes_docx_next_to_summary() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("memo.txt");
    std::fs::write(&input, "MAIN HEADING: Memo\nBody text.").unwrap();
    let output = dir.path().join("out").join("memo.docx");

    let config = lines_config(Echo::new())
        .summary_mode(SummaryMode::On)
        .build()
        .unwrap();
    let (stats, written) =
        smart_extract::convert_to_file(input.to_str().unwrap(), &output, &config)
            .await
            .unwrap();

    assert_eq!(stats.nodes, 2);
    assert_eq!(written, vec![output.clone(), dir.path().join("out/memo_summary.docx")]);

    let bytes = std::fs::read(&output).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut xml)
        .unwrap();
    assert!(xml.contains(r#"<w:pStyle w:val="Heading1"/>"#));
    assert!(xml.contains("Body text."));
}

#[test]
fn convert_sync_runs_without_an_outer_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("notes.txt");
    std::fs::write(&input, "• first\n• second").unwrap();

    let config = lines_config(Echo::new()).build().unwrap();
    let out = smart_extract::convert_sync(input.to_str().unwrap(), &config).unwrap();
    assert_eq!(out.document.len(), 2);
}

#[test]
fn extract_text_with_block_on() {
    let config = lines_config(Arc::new(Fixed("WEIRD TAG: y"))).build().unwrap();
    let out = tokio_test::block_on(extract_text("x", &config)).unwrap();
    assert_eq!(out.document.nodes, vec![MarkupNode::Paragraph("WEIRD TAG: y".into())]);
}
