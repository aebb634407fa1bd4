//! Markup parsing: annotated LLM output → flat [`DocumentTree`].
//!
//! The transformer is asked to prefix structural lines with plain-text tags
//! (`MAIN HEADING: …`, `• …`). Those tags are a schema shared with a producer
//! we do not control, so they live in exactly one place: [`Vocabulary`].
//! Everything else in the crate goes through [`Vocabulary::classify`].
//!
//! ## Classification order
//!
//! 1. Bullet glyph → [`MarkupNode::BulletItem`]. Checked first, so
//!    `• MAIN HEADING: x` stays a bullet with text `MAIN HEADING: x`.
//! 2. Heading tags, longest tag first.
//! 3. Quote tags, when the vocabulary enables them.
//! 4. Anything else → [`MarkupNode::Paragraph`] with the line unmodified.
//!
//! Step 4 is the fail-open rule: an unknown or malformed tag never produces an
//! error. A tag with no text after it counts as malformed.

use serde::{Deserialize, Serialize};

/// Bullet glyph the transformer uses for list items and table rows.
pub const BULLET_GLYPH: char = '•';

/// Markers the transformer emits on the first and last chunk.
pub const DOCUMENT_START: &str = "DOCUMENT START:";
pub const DOCUMENT_END: &str = "DOCUMENT END:";

pub const QUOTE_TAG: &str = "QUOTE:";
pub const INTENSE_QUOTE_TAG: &str = "INTENSE QUOTE:";

const BASE_HEADINGS: [(&str, u8); 3] = [
    ("MAIN HEADING:", 1),
    ("SUBHEADING:", 2),
    ("SIDE HEADING:", 3),
];

const EXTENDED_HEADINGS: [(&str, u8); 2] = [("MINOR HEADING:", 4), ("SUB-MINOR HEADING:", 5)];

/// One classified line of the output document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MarkupNode {
    Heading { level: u8, text: String },
    BulletItem(String),
    Paragraph(String),
    Quote(String),
    IntenseQuote(String),
}

impl MarkupNode {
    /// The node's text with its tag already stripped.
    pub fn text(&self) -> &str {
        match self {
            MarkupNode::Heading { text, .. } => text,
            MarkupNode::BulletItem(t)
            | MarkupNode::Paragraph(t)
            | MarkupNode::Quote(t)
            | MarkupNode::IntenseQuote(t) => t,
        }
    }

    /// Output style for this node.
    pub fn style(&self) -> Style {
        match self {
            MarkupNode::Heading { level, .. } => Style::Heading(*level),
            MarkupNode::BulletItem(_) => Style::ListBullet,
            MarkupNode::Paragraph(_) => Style::Normal,
            MarkupNode::Quote(_) => Style::Quote,
            MarkupNode::IntenseQuote(_) => Style::IntenseQuote,
        }
    }
}

/// Flat, ordered node list. Node order equals input line order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTree {
    pub nodes: Vec<MarkupNode>,
}

impl DocumentTree {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MarkupNode> {
        self.nodes.iter()
    }

    /// Deepest heading level present, if any.
    pub fn max_heading_level(&self) -> Option<u8> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                MarkupNode::Heading { level, .. } => Some(*level),
                _ => None,
            })
            .max()
    }
}

impl IntoIterator for DocumentTree {
    type Item = MarkupNode;
    type IntoIter = std::vec::IntoIter<MarkupNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

/// Paragraph style a node is rendered with.
///
/// Heading rank `k` maps to `Heading{k}`; visual weight strictly decreases as
/// `k` grows (see [`Style::font_size_half_points`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Style {
    Title,
    Heading(u8),
    ListBullet,
    Quote,
    IntenseQuote,
    Normal,
}

impl Style {
    /// Style identifier as used in WordprocessingML.
    pub fn style_id(&self) -> String {
        match self {
            Style::Title => "Title".to_string(),
            Style::Heading(level) => format!("Heading{}", level),
            Style::ListBullet => "ListBullet".to_string(),
            Style::Quote => "Quote".to_string(),
            Style::IntenseQuote => "IntenseQuote".to_string(),
            Style::Normal => "Normal".to_string(),
        }
    }

    /// Human-readable style name shown by word processors.
    pub fn display_name(&self) -> String {
        match self {
            Style::Title => "Title".to_string(),
            Style::Heading(level) => format!("heading {}", level),
            Style::ListBullet => "List Bullet".to_string(),
            Style::Quote => "Quote".to_string(),
            Style::IntenseQuote => "Intense Quote".to_string(),
            Style::Normal => "Normal".to_string(),
        }
    }

    /// Font size in half-points (WordprocessingML `w:sz`).
    pub fn font_size_half_points(&self) -> u32 {
        match self {
            Style::Title => 52,
            Style::Heading(1) => 32,
            Style::Heading(2) => 28,
            Style::Heading(3) => 24,
            Style::Heading(4) => 22,
            Style::Heading(_) => 20,
            Style::ListBullet | Style::Quote | Style::IntenseQuote | Style::Normal => 22,
        }
    }
}

/// Which tag set the transformer is instructed to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TagVocabulary {
    /// Three heading ranks, bullets. (default)
    #[default]
    Base,
    /// Five heading ranks, bullets, quote and intense-quote tags.
    Extended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteKind {
    Plain,
    Intense,
}

/// Closed set of recognised line prefixes plus the strict classifier.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    bullet: char,
    /// Sorted longest tag first.
    headings: Vec<(String, u8)>,
    /// Empty unless quote tags are enabled. Sorted longest tag first.
    quotes: Vec<(String, QuoteKind)>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::from(TagVocabulary::Base)
    }
}

impl From<TagVocabulary> for Vocabulary {
    fn from(kind: TagVocabulary) -> Self {
        let mut headings: Vec<(String, u8)> = BASE_HEADINGS
            .iter()
            .map(|(t, l)| (t.to_string(), *l))
            .collect();
        let quotes = match kind {
            TagVocabulary::Base => false,
            TagVocabulary::Extended => {
                headings.extend(EXTENDED_HEADINGS.iter().map(|(t, l)| (t.to_string(), *l)));
                true
            }
        };
        Self::custom(BULLET_GLYPH, headings).with_quotes(quotes)
    }
}

impl Vocabulary {
    /// Build a vocabulary from arbitrary heading tags.
    ///
    /// Tags are matched longest first, so a tag that is a prefix of another
    /// never shadows it.
    pub fn custom(bullet: char, headings: Vec<(String, u8)>) -> Self {
        let mut headings = headings;
        headings.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self {
            bullet,
            headings,
            quotes: Vec::new(),
        }
    }

    /// Enable or disable `QUOTE:` / `INTENSE QUOTE:` recognition.
    pub fn with_quotes(mut self, enabled: bool) -> Self {
        self.quotes = if enabled {
            vec![
                (INTENSE_QUOTE_TAG.to_string(), QuoteKind::Intense),
                (QUOTE_TAG.to_string(), QuoteKind::Plain),
            ]
        } else {
            Vec::new()
        };
        self
    }

    pub fn bullet(&self) -> char {
        self.bullet
    }

    pub fn quotes_enabled(&self) -> bool {
        !self.quotes.is_empty()
    }

    /// Highest heading level this vocabulary can produce.
    pub fn max_level(&self) -> u8 {
        self.headings.iter().map(|(_, l)| *l).max().unwrap_or(0)
    }

    /// Classify a single line. Returns `None` for lines that produce no node
    /// (blank lines, bare document boundary markers).
    pub fn classify(&self, line: &str) -> Option<MarkupNode> {
        let line = strip_boundary_markers(line.trim());
        if line.is_empty() {
            return None;
        }

        if let Some(rest) = line.strip_prefix(self.bullet) {
            let text = rest.trim();
            if !text.is_empty() {
                return Some(MarkupNode::BulletItem(text.to_string()));
            }
            return Some(MarkupNode::Paragraph(line.to_string()));
        }

        for (tag, level) in &self.headings {
            if let Some(rest) = line.strip_prefix(tag.as_str()) {
                let text = rest.trim();
                if text.is_empty() {
                    break;
                }
                return Some(MarkupNode::Heading {
                    level: *level,
                    text: text.to_string(),
                });
            }
        }

        for (tag, kind) in &self.quotes {
            if let Some(rest) = line.strip_prefix(tag.as_str()) {
                let text = rest.trim();
                if text.is_empty() {
                    break;
                }
                return Some(match kind {
                    QuoteKind::Plain => MarkupNode::Quote(text.to_string()),
                    QuoteKind::Intense => MarkupNode::IntenseQuote(text.to_string()),
                });
            }
        }

        Some(MarkupNode::Paragraph(line.to_string()))
    }
}

fn strip_boundary_markers(line: &str) -> &str {
    let mut line = line;
    for marker in [DOCUMENT_START, DOCUMENT_END] {
        if let Some(rest) = line.strip_prefix(marker) {
            line = rest.trim();
        }
        if let Some(rest) = line.strip_suffix(marker) {
            line = rest.trim();
        }
    }
    line
}

/// Turn annotated text into a [`DocumentTree`].
///
/// Lines are split on `\n`, trimmed, and classified one by one; empty lines
/// produce no node.
pub fn assemble(annotated: &str, vocabulary: &Vocabulary) -> DocumentTree {
    let nodes = annotated
        .split('\n')
        .filter_map(|line| vocabulary.classify(line))
        .collect();
    DocumentTree { nodes }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(s: &str) -> MarkupNode {
        MarkupNode::Paragraph(s.to_string())
    }

    fn bullet(s: &str) -> MarkupNode {
        MarkupNode::BulletItem(s.to_string())
    }

    fn heading(level: u8, s: &str) -> MarkupNode {
        MarkupNode::Heading {
            level,
            text: s.to_string(),
        }
    }

    #[test]
    fn end_to_end_base_vocabulary() {
        let input = "MAIN HEADING: Intro\n\nSome text.\n\n• item one\n• item two";
        let tree = assemble(input, &Vocabulary::default());
        assert_eq!(
            tree.nodes,
            vec![
                heading(1, "Intro"),
                para("Some text."),
                bullet("item one"),
                bullet("item two"),
            ]
        );
    }

    #[test]
    fn bullet_wins_over_heading_tag() {
        let tree = assemble("• MAIN HEADING: x", &Vocabulary::default());
        assert_eq!(tree.nodes, vec![bullet("MAIN HEADING: x")]);
    }

    #[test]
    fn unknown_tag_falls_through_to_paragraph() {
        let tree = assemble("WEIRD TAG: y", &Vocabulary::default());
        assert_eq!(tree.nodes, vec![para("WEIRD TAG: y")]);
    }

    #[test]
    fn all_base_heading_levels() {
        let input = "MAIN HEADING: a\nSUBHEADING: b\nSIDE HEADING: c";
        let tree = assemble(input, &Vocabulary::default());
        assert_eq!(
            tree.nodes,
            vec![heading(1, "a"), heading(2, "b"), heading(3, "c")]
        );
        assert_eq!(tree.max_heading_level(), Some(3));
    }

    #[test]
    fn base_vocabulary_ignores_extended_tags() {
        let input = "MINOR HEADING: deep\nQUOTE: said";
        let tree = assemble(input, &Vocabulary::default());
        assert_eq!(
            tree.nodes,
            vec![para("MINOR HEADING: deep"), para("QUOTE: said")]
        );
    }

    #[test]
    fn extended_vocabulary_levels_and_quotes() {
        let vocab = Vocabulary::from(TagVocabulary::Extended);
        assert_eq!(vocab.max_level(), 5);
        let input = "MINOR HEADING: four\nSUB-MINOR HEADING: five\nQUOTE: q\nINTENSE QUOTE: iq";
        let tree = assemble(input, &vocab);
        assert_eq!(
            tree.nodes,
            vec![
                heading(4, "four"),
                heading(5, "five"),
                MarkupNode::Quote("q".into()),
                MarkupNode::IntenseQuote("iq".into()),
            ]
        );
    }

    #[test]
    fn longest_tag_matches_first() {
        let vocab = Vocabulary::custom(
            '-',
            vec![("H:".to_string(), 1), ("H:H:".to_string(), 2)],
        );
        let tree = assemble("H:H: nested\nH: top", &vocab);
        assert_eq!(tree.nodes, vec![heading(2, "nested"), heading(1, "top")]);
    }

    #[test]
    fn whitespace_is_trimmed_around_text() {
        let tree = assemble("   SUBHEADING:    Spaced out   \n\t•\titem\t", &Vocabulary::default());
        assert_eq!(tree.nodes, vec![heading(2, "Spaced out"), bullet("item")]);
    }

    #[test]
    fn empty_tag_is_malformed_and_kept_verbatim() {
        let tree = assemble("MAIN HEADING:\n•", &Vocabulary::default());
        assert_eq!(tree.nodes, vec![para("MAIN HEADING:"), para("•")]);
    }

    #[test]
    fn boundary_markers_are_stripped() {
        let input = "DOCUMENT START:\nMAIN HEADING: Title\nbody\nDOCUMENT END:";
        let tree = assemble(input, &Vocabulary::default());
        assert_eq!(tree.nodes, vec![heading(1, "Title"), para("body")]);
    }

    #[test]
    fn text_after_boundary_marker_is_classified() {
        let tree = assemble("DOCUMENT START: MAIN HEADING: Report", &Vocabulary::default());
        assert_eq!(tree.nodes, vec![heading(1, "Report")]);
    }

    #[test]
    fn tag_must_be_a_prefix() {
        let tree = assemble("See MAIN HEADING: below", &Vocabulary::default());
        assert_eq!(tree.nodes, vec![para("See MAIN HEADING: below")]);
    }

    #[test]
    fn styles_map_deterministically() {
        assert_eq!(heading(1, "x").style(), Style::Heading(1));
        assert_eq!(bullet("x").style(), Style::ListBullet);
        assert_eq!(para("x").style(), Style::Normal);
        assert_eq!(MarkupNode::Quote("x".into()).style(), Style::Quote);
        assert_eq!(
            MarkupNode::IntenseQuote("x".into()).style(),
            Style::IntenseQuote
        );
        assert_eq!(Style::Heading(2).style_id(), "Heading2");
    }

    #[test]
    fn heading_weight_strictly_decreases() {
        let sizes: Vec<u32> = (1..=5)
            .map(|k| Style::Heading(k).font_size_half_points())
            .collect();
        assert!(sizes.windows(2).all(|w| w[0] > w[1]), "got {sizes:?}");
    }

    #[test]
    fn empty_input_yields_empty_tree() {
        assert!(assemble("", &Vocabulary::default()).is_empty());
        assert!(assemble("\n \n\t\n", &Vocabulary::default()).is_empty());
    }

    #[test]
    fn node_serialises_with_kind_tag() {
        let json = serde_json::to_string(&heading(2, "x")).unwrap();
        assert_eq!(json, r#"{"kind":"heading","value":{"level":2,"text":"x"}}"#);
    }
}
