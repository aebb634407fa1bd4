//! Post-processing: deterministic cleanup of transformer responses.
//!
//! ## Why is post-processing necessary?
//!
//! Even well-prompted models occasionally wrap their answer in a code fence,
//! answer with `\r\n` line endings or sprinkle zero-width characters through
//! the text. Any of those would defeat the line-prefix classifier in
//! [`crate::markup`], so they are removed here before chunk results are joined.
//!
//! Content is never rewritten. Unknown tags and odd lines are left for the
//! assembler's fail-open rule.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised, because the fence
//! pattern is anchored on the trimmed response. Invisible characters go last so
//! a BOM in front of a fence does not hide it.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to one raw transformer response.
///
/// Rules (applied in order):
/// 1. Strip an outer code fence (` ``` `, ` ```text `, ` ```markdown `)
/// 2. Normalise line endings (CRLF / CR → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse any run of blank lines down to a single one
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 6. Trim leading and trailing blank lines
pub fn clean_response(input: &str) -> String {
    let s = remove_leading_bom(input);
    let s = strip_outer_fence(s);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim_matches('\n').to_string()
}

fn remove_leading_bom(input: &str) -> &str {
    input.strip_prefix('\u{FEFF}').unwrap_or(input)
}

// ── Rule 1: Strip outer code fence ───────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[A-Za-z]*\r?\n(.*?)\r?\n```\s*$").expect("static fence pattern")
});

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("static blank-line pattern"));

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 5: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Tests ────────────────────────────────────────────────────────────────────
