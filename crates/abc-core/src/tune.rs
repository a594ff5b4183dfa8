//! Per-tune block parsing.
//!
//! A tune block is everything from one `X:` line up to the next (or end of
//! document).  Header lines are consumed until the first non-header line;
//! the remaining lines are kept as the body only when they plausibly carry
//! music (ABC-dense, or short with a bar character).  Oversized or
//! over-voiced blocks are recorded as skipped but keep their parsed headers.

use serde::{Deserialize, Serialize};

use crate::headers::TuneHeaders;
use crate::pitch::extract_pitches;
use crate::{MAX_TUNE_CHARS, MAX_TUNE_LINES, MAX_VOICES};

/// Share of non-space characters that must fall in the ABC character class
/// for a line to be accepted as body without a bar character.
const ABC_DENSITY_THRESHOLD: f64 = 0.8;

/// A bar-containing line longer than this is assumed to be prose.
const MAX_BAR_LINE_CHARS: usize = 80;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Whether a tune survived parsing or was skipped by a guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TuneStatus {
    Parsed,
    Skipped,
}

impl TuneStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TuneStatus::Parsed => "parsed",
            TuneStatus::Skipped => "skipped",
        }
    }
}

/// Why a tune block was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    TooLarge,
    TooManyLines,
    TooManyVoices,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::TooLarge => "too_large",
            SkipReason::TooManyLines => "too_many_lines",
            SkipReason::TooManyVoices => "too_many_voices",
        }
    }
}

/// One decomposed tune.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuneRecord {
    pub headers: TuneHeaders,
    pub tune_body: String,
    /// MIDI-style pitches in written order; empty for skipped tunes and
    /// tunes whose body carries no notes.
    pub pitches: Vec<i32>,
    pub status: TuneStatus,
    pub skip_reason: Option<SkipReason>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse one tune block (starting with its `X:` line).
pub fn parse_tune(block: &str) -> TuneRecord {
    let lines: Vec<&str> = block.lines().map(str::trim).collect();

    let mut headers = TuneHeaders::default();
    let mut body_lines: Vec<&str> = Vec::new();
    let mut in_header = true;
    let mut voices = 0usize;

    for line in &lines {
        if line.is_empty() {
            continue;
        }
        if line.starts_with("V:") {
            voices += 1;
        }
        if in_header {
            if let Some((letter, value)) = header_line(line) {
                headers.set(letter, &value);
                continue;
            }
            in_header = false;
        }
        if is_body_line(line) {
            body_lines.push(line);
        }
    }

    // Guards run after header parsing so skipped tunes keep their metadata.
    let skip_reason = if block.chars().count() > MAX_TUNE_CHARS {
        Some(SkipReason::TooLarge)
    } else if lines.len() > MAX_TUNE_LINES {
        Some(SkipReason::TooManyLines)
    } else if voices > MAX_VOICES {
        Some(SkipReason::TooManyVoices)
    } else {
        None
    };

    if let Some(reason) = skip_reason {
        return TuneRecord {
            headers,
            tune_body: String::new(),
            pitches: Vec::new(),
            status: TuneStatus::Skipped,
            skip_reason: Some(reason),
        };
    }

    let tune_body = body_lines.join("\n");
    let pitches = extract_pitches(&tune_body);

    TuneRecord {
        headers,
        tune_body,
        pitches,
        status: TuneStatus::Parsed,
        skip_reason: None,
    }
}

/// Match a `LETTER:value` header line; strips a trailing `% comment`.
fn header_line(line: &str) -> Option<(char, String)> {
    let mut chars = line.chars();
    let letter = chars.next()?;
    if !letter.is_ascii_uppercase() || chars.next()? != ':' {
        return None;
    }
    let raw = chars.as_str();
    let value = match raw.find('%') {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    Some((letter, value.trim().to_owned()))
}

/// Decide whether a non-header line belongs in the tune body.
fn is_body_line(line: &str) -> bool {
    if line.contains('|') && line.chars().count() <= MAX_BAR_LINE_CHARS {
        return true;
    }
    let mut total = 0usize;
    let mut abc = 0usize;
    for c in line.chars() {
        if c.is_whitespace() {
            continue;
        }
        total += 1;
        if is_abc_char(c) {
            abc += 1;
        }
    }
    total > 0 && (abc as f64 / total as f64) >= ABC_DENSITY_THRESHOLD
}

/// The ABC body character class: notes, digits, bars, grouping, accidentals,
/// octave marks, ties, and rests.
fn is_abc_char(c: char) -> bool {
    matches!(c,
        'a'..='g' | 'A'..='G' | '0'..='9'
        | '|' | '/' | '[' | ']' | '(' | ')'
        | '_' | '^' | '=' | ',' | '\'' | '~' | 'z')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_and_body_are_separated() {
        let tune = parse_tune("X:1\nT:Foo\nK:D\nABc|def|\n");
        assert_eq!(tune.headers.reference_number.as_deref(), Some("1"));
        assert_eq!(tune.headers.title.as_deref(), Some("Foo"));
        assert_eq!(tune.headers.key.as_deref(), Some("D"));
        assert_eq!(tune.tune_body, "ABc|def|");
        assert_eq!(tune.status, TuneStatus::Parsed);
        assert!(!tune.pitches.is_empty());
        assert_eq!(tune.pitches[0], 69);
    }

    #[test]
    fn header_comments_are_stripped() {
        let tune = parse_tune("X:1\nT:Foo % working title\nK:G\n|GAB|\n");
        assert_eq!(tune.headers.title.as_deref(), Some("Foo"));
    }

    #[test]
    fn prose_lines_are_dropped_from_body() {
        let tune = parse_tune(
            "X:1\nT:Foo\nK:D\nABc|def|\nThis is a long descriptive paragraph about \
             the tune, where it was collected and from whom it was learned originally.\n",
        );
        assert_eq!(tune.tune_body, "ABc|def|");
    }

    #[test]
    fn short_bar_lines_are_kept_even_when_not_dense() {
        let tune = parse_tune("X:1\nK:D\n\"Dm\" ABc | def |\n");
        assert_eq!(tune.tune_body, "\"Dm\" ABc | def |");
    }

    #[test]
    fn oversized_tune_is_skipped_with_headers_retained() {
        let mut block = String::from("X:1\nT:Giant\nK:C\n");
        while block.chars().count() <= MAX_TUNE_CHARS {
            block.push_str("ABc|def|gab|\n");
        }
        let tune = parse_tune(&block);
        assert_eq!(tune.status, TuneStatus::Skipped);
        assert_eq!(tune.skip_reason, Some(SkipReason::TooLarge));
        assert_eq!(tune.headers.title.as_deref(), Some("Giant"));
        assert!(tune.tune_body.is_empty());
        assert!(tune.pitches.is_empty());
    }

    #[test]
    fn too_many_lines_is_skipped() {
        let mut block = String::from("X:1\nK:C\n");
        for _ in 0..MAX_TUNE_LINES {
            block.push_str("|AB|\n");
        }
        let tune = parse_tune(&block);
        assert_eq!(tune.skip_reason, Some(SkipReason::TooManyLines));
    }

    #[test]
    fn too_many_voices_is_skipped() {
        let block = "X:1\nK:C\nV:1\n|AB|\nV:2\n|CD|\nV:3\n|EF|\nV:4\n|GA|\nV:5\n|Bc|\n";
        let tune = parse_tune(block);
        assert_eq!(tune.skip_reason, Some(SkipReason::TooManyVoices));
    }

    #[test]
    fn parse_is_deterministic() {
        let block = "X:2\nT:Same\nK:Am\n|ABc def|\n";
        assert_eq!(parse_tune(block), parse_tune(block));
    }
}
