//! ABC header fields.
//!
//! ABC headers are `LETTER:value` lines.  The letters map to the named
//! fields below; unknown letters are ignored by the parser.

use serde::{Deserialize, Serialize};

/// Parsed ABC header fields for one tune.
///
/// All fields are optional -- real-world tunebooks frequently carry only
/// `X:`, `T:`, and `K:`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuneHeaders {
    pub reference_number: Option<String>,
    pub title: Option<String>,
    pub composer: Option<String>,
    pub origin: Option<String>,
    pub area: Option<String>,
    pub meter: Option<String>,
    pub unit_note_length: Option<String>,
    pub tempo: Option<String>,
    pub parts: Option<String>,
    pub transcription: Option<String>,
    pub notes: Option<String>,
    pub group: Option<String>,
    pub history: Option<String>,
    pub key: Option<String>,
    pub rhythm: Option<String>,
    pub book: Option<String>,
    pub discography: Option<String>,
    pub source: Option<String>,
    pub instruction: Option<String>,
}

impl TuneHeaders {
    /// Record a header value by its ABC letter.  Returns false for letters
    /// outside the known mapping.
    ///
    /// A repeated letter (common for multi-line `T:` titles) overwrites the
    /// earlier value, so the last occurrence wins.
    pub fn set(&mut self, letter: char, value: &str) -> bool {
        let slot = match letter {
            'X' => &mut self.reference_number,
            'T' => &mut self.title,
            'C' => &mut self.composer,
            'O' => &mut self.origin,
            'A' => &mut self.area,
            'M' => &mut self.meter,
            'L' => &mut self.unit_note_length,
            'Q' => &mut self.tempo,
            'P' => &mut self.parts,
            'Z' => &mut self.transcription,
            'N' => &mut self.notes,
            'G' => &mut self.group,
            'H' => &mut self.history,
            'K' => &mut self.key,
            'R' => &mut self.rhythm,
            'B' => &mut self.book,
            'D' => &mut self.discography,
            'S' => &mut self.source,
            'I' => &mut self.instruction,
            _ => return false,
        };
        *slot = Some(value.to_owned());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_letters_are_recorded() {
        let mut h = TuneHeaders::default();
        assert!(h.set('T', "The Harvest Home"));
        assert!(h.set('K', "D"));
        assert_eq!(h.title.as_deref(), Some("The Harvest Home"));
        assert_eq!(h.key.as_deref(), Some("D"));
    }

    #[test]
    fn unknown_letters_are_rejected() {
        let mut h = TuneHeaders::default();
        assert!(!h.set('V', "1"));
        assert!(!h.set('W', "lyric line"));
        assert_eq!(h, TuneHeaders::default());
    }

    #[test]
    fn last_occurrence_wins() {
        let mut h = TuneHeaders::default();
        h.set('T', "First Title");
        h.set('T', "Second Title");
        assert_eq!(h.title.as_deref(), Some("Second Title"));
    }
}
