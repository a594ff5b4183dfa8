//! Melodic similarity: intervals, windowed vectors, and the two-stage
//! search.
//!
//! A tune's pitch sequence becomes a clipped interval sequence, which is
//! sliced into fixed-dimension sliding windows.  The windows live in a flat
//! L2 [`VectorIndex`] whose slot->tune mapping is kept in the transactional
//! store.  Online queries run coarse window search first and rerank the
//! surviving candidates with banded dynamic time warping.

mod dtw;
mod index;
mod intervals;
mod similarity;
mod windows;

pub use dtw::dtw_distance;
pub use index::{IndexError, Neighbor, VectorIndex};
pub use intervals::{format_intervals, intervals_from_pitches, parse_intervals, parse_pitches};
pub use similarity::{SimilarTune, SimilarityError, SimilarityService};
pub use windows::generate_windows;

/// Intervals are clipped to ±MAX_INTERVAL semitones.
pub const MAX_INTERVAL: f32 = 12.0;

/// Dimension of every window vector.
pub const VECTOR_DIM: usize = 32;

/// Offset between consecutive windows of one interval sequence.
pub const WINDOW_STRIDE: usize = 8;

/// Sakoe-Chiba band width for DTW reranking.
pub const DTW_BAND: usize = 10;
