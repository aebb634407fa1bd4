//! Rendering: package a [`DocumentTree`] or [`SummaryDocument`] as `.docx`.
//!
//! A `.docx` file is a zip of WordprocessingML parts. We write the minimum a
//! word processor needs to show styled output:
//!
//! ```text
//! [Content_Types].xml
//! _rels/.rels
//! word/document.xml
//! word/styles.xml            Normal, Title, Heading1..5, ListBullet, Quote, IntenseQuote
//! word/numbering.xml         one bullet list, referenced by ListBullet
//! word/_rels/document.xml.rels
//! ```
//!
//! Every paragraph carries exactly one style id taken from
//! [`MarkupNode::style`], so the style mapping lives in [`crate::markup`] and
//! this module only serialises it.

use crate::error::ExtractError;
use crate::markup::{DocumentTree, MarkupNode, Style, BULLET_GLYPH};
use crate::summary::{Run, SummaryDocument};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::borrow::Cow;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// MIME type of the rendered artifact.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Heading ranks a package always declares, whatever the tree uses.
const MAX_HEADING_STYLES: u8 = 5;

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
<Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>
<Override PartName="/word/numbering.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml"/>
</Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#;

const DOCUMENT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering" Target="numbering.xml"/>
</Relationships>"#;

/// numId 1 → a single-level bullet list.
const BULLET_NUM_ID: u32 = 1;

// ── Public API ───────────────────────────────────────────────────────────

/// Render the main document tree as `.docx` bytes.
pub fn render_document(tree: &DocumentTree) -> Result<Vec<u8>, ExtractError> {
    debug!("Rendering {} nodes", tree.len());
    let document = document_xml(|part| {
        for node in tree.iter() {
            write_paragraph(part, node.style(), false, &[Run::plain(node.text())])?;
        }
        Ok(())
    })?;
    package(document)
}

/// Render the executive summary: a centred title, then run-level paragraphs.
pub fn render_summary(summary: &SummaryDocument) -> Result<Vec<u8>, ExtractError> {
    let document = document_xml(|part| {
        write_paragraph(part, Style::Title, true, &[Run::plain(summary.title.as_str())])?;
        for p in &summary.paragraphs {
            write_paragraph(part, Style::Normal, false, &p.runs)?;
        }
        Ok(())
    })?;
    package(document)
}

/// Write `bytes` to `path` atomically (temp file + rename).
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExtractError> {
    let write_err = |e| ExtractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("docx.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

// ── XML parts ────────────────────────────────────────────────────────────

/// One XML part, written event by event.
struct Part {
    writer: Writer<Vec<u8>>,
}

impl Part {
    fn new() -> Result<Self, ExtractError> {
        let mut part = Self {
            writer: Writer::new(Vec::new()),
        };
        part.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        Ok(part)
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), ExtractError> {
        self.writer
            .write_event(event)
            .map_err(|e| ExtractError::RenderFailed(e.to_string()))
    }

    fn open(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), ExtractError> {
        self.event(Event::Start(
            BytesStart::new(name).with_attributes(attrs.iter().copied()),
        ))
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), ExtractError> {
        self.event(Event::Empty(
            BytesStart::new(name).with_attributes(attrs.iter().copied()),
        ))
    }

    fn close(&mut self, name: &str) -> Result<(), ExtractError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    /// Character data. Escaped by the writer after [`xml_safe`] filtering.
    fn text(&mut self, text: &str) -> Result<(), ExtractError> {
        self.event(Event::Text(BytesText::new(&xml_safe(text))))
    }

    fn finish(self) -> Result<String, ExtractError> {
        String::from_utf8(self.writer.into_inner())
            .map_err(|e| ExtractError::RenderFailed(e.to_string()))
    }
}

/// Characters XML 1.0 allows in content.
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
}

/// Remove characters a word processor would reject. Form feeds and vertical
/// tabs (page breaks in extracted text) become spaces.
fn xml_safe(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_xml_char) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .filter_map(|c| match c {
                '\u{B}' | '\u{C}' => Some(' '),
                c if is_xml_char(c) => Some(c),
                _ => None,
            })
            .collect(),
    )
}

// ── Paragraphs ───────────────────────────────────────────────────────────

fn write_paragraph(
    part: &mut Part,
    style: Style,
    centred: bool,
    runs: &[Run],
) -> Result<(), ExtractError> {
    let style_id = style.style_id();
    part.open("w:p", &[])?;
    part.open("w:pPr", &[])?;
    part.empty("w:pStyle", &[("w:val", style_id.as_str())])?;
    if centred {
        part.empty("w:jc", &[("w:val", "center")])?;
    }
    part.close("w:pPr")?;
    for run in runs {
        part.open("w:r", &[])?;
        if run.emphasis {
            part.open("w:rPr", &[])?;
            part.empty("w:b", &[])?;
            part.close("w:rPr")?;
        }
        part.open("w:t", &[("xml:space", "preserve")])?;
        part.text(&run.text)?;
        part.close("w:t")?;
        part.close("w:r")?;
    }
    part.close("w:p")
}

fn document_xml(
    body: impl FnOnce(&mut Part) -> Result<(), ExtractError>,
) -> Result<String, ExtractError> {
    let mut part = Part::new()?;
    part.open("w:document", &[("xmlns:w", W_NS)])?;
    part.open("w:body", &[])?;
    body(&mut part)?;
    part.open("w:sectPr", &[])?;
    part.empty("w:pgSz", &[("w:w", "11906"), ("w:h", "16838")])?;
    part.empty(
        "w:pgMar",
        &[
            ("w:top", "1440"),
            ("w:right", "1440"),
            ("w:bottom", "1440"),
            ("w:left", "1440"),
            ("w:header", "708"),
            ("w:footer", "708"),
            ("w:gutter", "0"),
        ],
    )?;
    part.close("w:sectPr")?;
    part.close("w:body")?;
    part.close("w:document")?;
    part.finish()
}

// ── Styles ───────────────────────────────────────────────────────────────

const ACCENT_COLOR: &str = "4F81BD";

fn write_style(part: &mut Part, style: Style) -> Result<(), ExtractError> {
    let id = style.style_id();
    let name = style.display_name();
    let size = style.font_size_half_points().to_string();

    let mut attrs = vec![("w:type", "paragraph")];
    if style == Style::Normal {
        attrs.push(("w:default", "1"));
    }
    attrs.push(("w:styleId", id.as_str()));
    part.open("w:style", &attrs)?;
    part.empty("w:name", &[("w:val", name.as_str())])?;
    if style != Style::Normal {
        part.empty("w:basedOn", &[("w:val", "Normal")])?;
        part.empty("w:next", &[("w:val", "Normal")])?;
    }
    part.empty("w:qFormat", &[])?;

    part.open("w:pPr", &[])?;
    match style {
        Style::Normal => {}
        Style::Title => {
            part.empty("w:jc", &[("w:val", "center")])?;
            part.empty("w:spacing", &[("w:after", "300")])?;
        }
        Style::Heading(level) => {
            let outline = level.saturating_sub(1).to_string();
            part.empty("w:keepNext", &[])?;
            part.empty("w:spacing", &[("w:before", "240"), ("w:after", "80")])?;
            part.empty("w:outlineLvl", &[("w:val", outline.as_str())])?;
        }
        Style::ListBullet => {
            let num_id = BULLET_NUM_ID.to_string();
            part.open("w:numPr", &[])?;
            part.empty("w:ilvl", &[("w:val", "0")])?;
            part.empty("w:numId", &[("w:val", num_id.as_str())])?;
            part.close("w:numPr")?;
            part.empty("w:ind", &[("w:left", "720"), ("w:hanging", "360")])?;
        }
        Style::Quote => part.empty("w:ind", &[("w:left", "864"), ("w:right", "864")])?,
        Style::IntenseQuote => {
            part.open("w:pBdr", &[])?;
            part.empty(
                "w:bottom",
                &[
                    ("w:val", "single"),
                    ("w:sz", "4"),
                    ("w:space", "4"),
                    ("w:color", ACCENT_COLOR),
                ],
            )?;
            part.close("w:pBdr")?;
            part.empty("w:ind", &[("w:left", "936"), ("w:right", "936")])?;
        }
    }
    part.close("w:pPr")?;

    part.open("w:rPr", &[])?;
    match style {
        Style::Title | Style::Heading(_) => part.empty("w:b", &[])?,
        Style::Quote => part.empty("w:i", &[])?,
        Style::IntenseQuote => {
            part.empty("w:b", &[])?;
            part.empty("w:i", &[])?;
            part.empty("w:color", &[("w:val", ACCENT_COLOR)])?;
        }
        Style::Normal | Style::ListBullet => {}
    }
    part.empty("w:sz", &[("w:val", size.as_str())])?;
    part.empty("w:szCs", &[("w:val", size.as_str())])?;
    part.close("w:rPr")?;
    part.close("w:style")
}

fn styles_xml() -> Result<String, ExtractError> {
    let mut styles = vec![
        Style::Normal,
        Style::Title,
        Style::ListBullet,
        Style::Quote,
        Style::IntenseQuote,
    ];
    styles.extend((1..=MAX_HEADING_STYLES).map(Style::Heading));

    let mut part = Part::new()?;
    part.open("w:styles", &[("xmlns:w", W_NS)])?;
    for style in styles {
        write_style(&mut part, style)?;
    }
    part.close("w:styles")?;
    part.finish()
}

fn numbering_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:numbering xmlns:w="{W_NS}"><w:abstractNum w:abstractNumId="0"><w:multiLevelType w:val="singleLevel"/><w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="bullet"/><w:lvlText w:val="{BULLET_GLYPH}"/><w:lvlJc w:val="left"/><w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr></w:lvl></w:abstractNum><w:num w:numId="{BULLET_NUM_ID}"><w:abstractNumId w:val="0"/></w:num></w:numbering>"#
    )
}

// ── Packaging ────────────────────────────────────────────────────────────

fn package(document: String) -> Result<Vec<u8>, ExtractError> {
    let parts: [(&str, String); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.to_string()),
        ("_rels/.rels", ROOT_RELS_XML.to_string()),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS_XML.to_string()),
        ("word/styles.xml", styles_xml()?),
        ("word/numbering.xml", numbering_xml()),
        ("word/document.xml", document),
    ];

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in parts {
        zip.start_file(name, options)
            .map_err(|e| ExtractError::RenderFailed(format!("{name}: {e}")))?;
        zip.write_all(content.as_bytes())
            .map_err(|e| ExtractError::RenderFailed(format!("{name}: {e}")))?;
    }
    let cursor = zip
        .finish()
        .map_err(|e| ExtractError::RenderFailed(format!("finalising package: {e}")))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::SummaryParagraph;
    use std::io::Read;
    use zip::ZipArchive;

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut xml = String::new();
        file.read_to_string(&mut xml).unwrap();
        xml
    }

    fn tree() -> DocumentTree {
        DocumentTree {
            nodes: vec![
                MarkupNode::Heading {
                    level: 1,
                    text: "Intro".into(),
                },
                MarkupNode::Paragraph("Fish & chips <cheap>".into()),
                MarkupNode::BulletItem("item one".into()),
                MarkupNode::Quote("said so".into()),
            ],
        }
    }

    #[test]
    fn package_contains_all_parts() {
        let bytes = render_document(&tree()).unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "word/_rels/document.xml.rels",
            "word/styles.xml",
            "word/numbering.xml",
            "word/document.xml",
        ] {
            assert!(names.contains(&part), "missing {part}");
        }
    }

    #[test]
    fn paragraphs_follow_node_order_and_styles() {
        let xml = read_part(&render_document(&tree()).unwrap(), "word/document.xml");
        let h = xml.find(r#"w:val="Heading1""#).unwrap();
        let n = xml.find(r#"w:val="Normal""#).unwrap();
        let b = xml.find(r#"w:val="ListBullet""#).unwrap();
        let q = xml.find(r#"w:val="Quote""#).unwrap();
        assert!(h < n && n < b && b < q);
    }

    #[test]
    fn text_is_escaped() {
        let xml = read_part(&render_document(&tree()).unwrap(), "word/document.xml");
        assert!(xml.contains("Fish &amp; chips &lt;cheap&gt;"));
        assert!(!xml.contains("<cheap>"));
    }

    fn assert_well_formed(xml: &str) {
        let mut reader = quick_xml::Reader::from_str(xml);
        loop {
            match reader.read_event() {
                Ok(quick_xml::events::Event::Eof) => break,
                Ok(_) => {}
                Err(e) => panic!("malformed XML at {}: {e}", reader.buffer_position()),
            }
        }
    }

    #[test]
    fn control_characters_are_removed_from_text() {
        let tree = DocumentTree {
            nodes: vec![
                MarkupNode::Paragraph("page1\u{000C}page2\u{0001}!".into()),
                MarkupNode::BulletItem("cell\u{0008}value\u{FFFF}".into()),
            ],
        };
        let xml = read_part(&render_document(&tree).unwrap(), "word/document.xml");
        assert!(!xml.contains('\u{000C}'));
        assert!(!xml.contains('\u{0001}'));
        assert!(!xml.contains('\u{0008}'));
        assert!(!xml.contains('\u{FFFF}'));
        assert!(xml.contains("page1 page2!"));
        assert!(xml.contains("cellvalue"));
        assert_well_formed(&xml);
    }

    #[test]
    fn xml_safe_keeps_ordinary_text_borrowed() {
        assert!(matches!(xml_safe("tab\there é"), Cow::Borrowed(_)));
        assert_eq!(xml_safe("a\u{000B}b"), "a b");
    }

    #[test]
    fn all_generated_parts_are_well_formed() {
        let bytes = render_document(&tree()).unwrap();
        for part in ["word/document.xml", "word/styles.xml", "word/numbering.xml"] {
            assert_well_formed(&read_part(&bytes, part));
        }
        let summary = SummaryDocument {
            title: "Executive Summary of <q3> & co".into(),
            paragraphs: vec![],
        };
        assert_well_formed(&read_part(&render_summary(&summary).unwrap(), "word/document.xml"));
    }

    #[test]
    fn heading_sizes_strictly_decrease() {
        let sizes: Vec<u32> = (1..=MAX_HEADING_STYLES)
            .map(|l| Style::Heading(l).font_size_half_points())
            .collect();
        assert!(sizes.windows(2).all(|w| w[0] > w[1]));
        let styles = read_part(&render_document(&tree()).unwrap(), "word/styles.xml");
        assert!(styles.contains(r#"w:styleId="Heading5""#));
        assert!(styles.contains(r#"w:styleId="ListBullet""#));
    }

    #[test]
    fn summary_title_is_centred_and_keywords_bold() {
        let summary = SummaryDocument {
            title: "Executive Summary of report".into(),
            paragraphs: vec![SummaryParagraph {
                runs: vec![Run::plain("About "), Run::bold("revenue")],
            }],
        };
        let xml = read_part(&render_summary(&summary).unwrap(), "word/document.xml");
        assert!(xml.contains(r#"<w:pStyle w:val="Title"/><w:jc w:val="center"/>"#));
        assert!(xml.contains(
            r#"<w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">revenue</w:t></w:r>"#
        ));
    }

    #[test]
    fn empty_tree_still_packages() {
        let bytes = render_document(&DocumentTree::default()).unwrap();
        assert!(read_part(&bytes, "word/document.xml").contains("<w:body>"));
    }

    #[tokio::test]
    async fn write_atomic_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.docx");
        write_atomic(&path, b"bytes").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"bytes");
        assert!(!path.with_extension("docx.tmp").exists());
    }
}
