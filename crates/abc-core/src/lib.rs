//! ABC tunebook decomposition.
//!
//! Pure, deterministic parsing of crawled documents into tunebook records:
//! no I/O, no store access.  A document goes through line-ending
//! normalization and HTML tag stripping, is vetted for ABC markers, and is
//! then split into per-tune blocks on `X:` lines.  Each block yields a
//! [`TuneRecord`] with its header fields, body, and extracted pitch sequence.
//!
//! Decomposing the same document twice yields identical records.

mod headers;
mod pitch;
mod tune;
mod tunebook;

pub use headers::TuneHeaders;
pub use pitch::extract_pitches;
pub use tune::{SkipReason, TuneRecord, TuneStatus, parse_tune};
pub use tunebook::{TunebookRecord, decompose};

/// Hard cap on tune blocks taken from a single document.
pub const MAX_TUNES_PER_PAGE: usize = 500;

/// A tune block larger than this is recorded as skipped (`too_large`).
pub const MAX_TUNE_CHARS: usize = 10_000;

/// A tune block with more lines than this is skipped (`too_many_lines`).
pub const MAX_TUNE_LINES: usize = 300;

/// A tune with more `V:` voice headers than this is skipped (`too_many_voices`).
pub const MAX_VOICES: usize = 4;
