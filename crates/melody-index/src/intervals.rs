//! Pitch -> interval conversion and the text forms stored on tune rows.
//!
//! Pitches and intervals are persisted as comma-joined text (`60, 62, 64`
//! and `2, 2, -2`).  Interval computation collapses repeated pitches first,
//! so a sequence can only produce non-zero intervals.

use crate::MAX_INTERVAL;

/// Compute clipped intervals from a pitch sequence.
///
/// Runs of identical consecutive pitches collapse to one note (removing
/// zero intervals); the consecutive differences are then clipped to
/// ±[`MAX_INTERVAL`].  Fewer than two distinct pitches yield an empty
/// sequence.
pub fn intervals_from_pitches(pitches: &[i32]) -> Vec<f32> {
    let mut collapsed: Vec<i32> = Vec::with_capacity(pitches.len());
    for &p in pitches {
        if collapsed.last() != Some(&p) {
            collapsed.push(p);
        }
    }
    if collapsed.len() < 2 {
        return Vec::new();
    }
    collapsed
        .windows(2)
        .map(|pair| ((pair[1] - pair[0]) as f32).clamp(-MAX_INTERVAL, MAX_INTERVAL))
        .collect()
}

/// Parse the comma-joined pitch text stored on a tune row.
pub fn parse_pitches(text: &str) -> Vec<i32> {
    text.split(',')
        .filter_map(|part| part.trim().parse::<i32>().ok())
        .collect()
}

/// Parse the comma-joined interval text stored on a tune row.
pub fn parse_intervals(text: &str) -> Vec<f32> {
    text.split(',')
        .filter_map(|part| part.trim().parse::<f32>().ok())
        .collect()
}

/// Render intervals back to their stored text form.
pub fn format_intervals(intervals: &[f32]) -> String {
    intervals
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_repeats_are_collapsed() {
        // 60 60 62 62 64 -> 60 62 64 -> [2, 2]
        assert_eq!(intervals_from_pitches(&[60, 60, 62, 62, 64]), vec![2.0, 2.0]);
    }

    #[test]
    fn short_sequences_yield_no_intervals() {
        assert!(intervals_from_pitches(&[]).is_empty());
        assert!(intervals_from_pitches(&[60]).is_empty());
        // All-identical collapses to a single pitch.
        assert!(intervals_from_pitches(&[60, 60, 60]).is_empty());
    }

    #[test]
    fn wide_leaps_are_clipped() {
        assert_eq!(intervals_from_pitches(&[60, 84]), vec![12.0]);
        assert_eq!(intervals_from_pitches(&[84, 60]), vec![-12.0]);
        assert_eq!(intervals_from_pitches(&[60, 67]), vec![7.0]);
    }

    #[test]
    fn computation_is_idempotent_on_equal_inputs() {
        let pitches = [60, 62, 62, 59, 71];
        assert_eq!(
            intervals_from_pitches(&pitches),
            intervals_from_pitches(&pitches)
        );
    }

    #[test]
    fn text_round_trip() {
        let intervals = intervals_from_pitches(&[60, 62, 64, 62, 50]);
        let text = format_intervals(&intervals);
        assert_eq!(text, "2, 2, -2, -12");
        assert_eq!(parse_intervals(&text), intervals);
    }

    #[test]
    fn parse_tolerates_blanks_and_garbage() {
        assert_eq!(parse_pitches("60, , 62,abc,64"), vec![60, 62, 64]);
        assert_eq!(parse_intervals(""), Vec::<f32>::new());
    }
}
