//! Sliding-window slicing of interval sequences.

use crate::{VECTOR_DIM, WINDOW_STRIDE};

/// Slice an interval sequence into fixed-dimension window vectors.
///
/// A sequence shorter than the dimension produces one zero-padded window.
/// Longer sequences produce fully-populated windows at offsets 0, stride,
/// 2*stride, and so on; the ragged tail past the last full window is dropped.
/// An empty sequence produces no windows.
pub fn generate_windows(intervals: &[f32]) -> Vec<Vec<f32>> {
    if intervals.is_empty() {
        return Vec::new();
    }
    if intervals.len() < VECTOR_DIM {
        let mut window = intervals.to_vec();
        window.resize(VECTOR_DIM, 0.0);
        return vec![window];
    }
    (0..=intervals.len() - VECTOR_DIM)
        .step_by(WINDOW_STRIDE)
        .map(|offset| intervals[offset..offset + VECTOR_DIM].to_vec())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sequence_emits_no_windows() {
        assert!(generate_windows(&[]).is_empty());
    }

    #[test]
    fn short_sequence_is_zero_padded() {
        let windows = generate_windows(&[2.0, -2.0, 5.0]);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].len(), VECTOR_DIM);
        assert_eq!(&windows[0][..3], &[2.0, -2.0, 5.0]);
        assert!(windows[0][3..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn exact_dimension_yields_one_window() {
        let seq: Vec<f32> = (0..VECTOR_DIM).map(|i| i as f32).collect();
        let windows = generate_windows(&seq);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0], seq);
    }

    #[test]
    fn stride_walks_the_sequence() {
        // dim + 2*stride elements -> windows at offsets 0, stride, 2*stride.
        let len = VECTOR_DIM + 2 * WINDOW_STRIDE;
        let seq: Vec<f32> = (0..len).map(|i| i as f32).collect();
        let windows = generate_windows(&seq);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[1][0], WINDOW_STRIDE as f32);
        assert_eq!(windows[2][0], (2 * WINDOW_STRIDE) as f32);
        for w in &windows {
            assert_eq!(w.len(), VECTOR_DIM);
        }
    }

    #[test]
    fn ragged_tail_is_dropped() {
        // One element past a full window: no partial window appears.
        let seq: Vec<f32> = (0..VECTOR_DIM + 1).map(|i| i as f32).collect();
        let windows = generate_windows(&seq);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0][0], 0.0);
    }
}
