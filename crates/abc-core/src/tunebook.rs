//! Document-level decomposition.
//!
//! Turns one crawled document into a tunebook record: normalize line
//! endings, strip HTML tags, check for credible ABC markers, then split
//! into tune blocks on `X:` lines.

use serde::{Deserialize, Serialize};

use crate::MAX_TUNES_PER_PAGE;
use crate::tune::{TuneRecord, parse_tune};

/// A decomposed document: one tunebook owning its tunes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunebookRecord {
    pub tunes: Vec<TuneRecord>,
}

/// Decompose a document into a tunebook.
///
/// Returns `None` when the document does not plausibly contain ABC: it must
/// carry a line beginning `X:` followed by digits, corroborated by a `T:` or
/// `K:` header line or at least five bar characters.
pub fn decompose(document: &str) -> Option<TunebookRecord> {
    let text = strip_html_tags(&normalize_line_endings(document));

    if !looks_like_abc(&text) {
        return None;
    }

    let mut tunes = Vec::new();
    for block in tune_blocks(&text).into_iter().take(MAX_TUNES_PER_PAGE) {
        tunes.push(parse_tune(&block));
    }

    if tunes.is_empty() {
        return None;
    }
    Some(TunebookRecord { tunes })
}

/// Collapse `\r\n` and bare `\r` to `\n`.
fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Replace every HTML tag with a newline so tags act as line separators.
///
/// ABC posted inside `<pre>` blocks survives this untouched; surrounding
/// markup collapses into blank lines the body filter then drops.
fn strip_html_tags(text: &str) -> String {
    if !text.contains('<') {
        return text.to_owned();
    }
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' if !in_tag => {
                in_tag = true;
                out.push('\n');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// A document qualifies when an `X:<digits>` line exists together with a
/// corroborating marker.
fn looks_like_abc(text: &str) -> bool {
    let mut has_x_header = false;
    let mut has_corroboration = false;

    for line in text.lines() {
        let line = line.trim_start();
        if let Some(rest) = line.strip_prefix("X:") {
            if rest.trim_start().starts_with(|c: char| c.is_ascii_digit()) {
                has_x_header = true;
            }
        }
        if line.starts_with("T:") || line.starts_with("K:") {
            has_corroboration = true;
        }
    }

    if !has_corroboration {
        has_corroboration = text.chars().filter(|&c| c == '|').count() >= 5;
    }

    has_x_header && has_corroboration
}

/// Split the document into tune blocks, one per `X:` line.  Content before
/// the first `X:` line is discarded.
fn tune_blocks(text: &str) -> Vec<String> {
    let mut blocks: Vec<String> = Vec::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        if line.trim_start().starts_with("X:") {
            if let Some(done) = current.take() {
                blocks.push(done);
            }
            current = Some(String::new());
        }
        if let Some(block) = current.as_mut() {
            block.push_str(line);
            block.push('\n');
        }
    }
    if let Some(done) = current.take() {
        blocks.push(done);
    }
    blocks
}
