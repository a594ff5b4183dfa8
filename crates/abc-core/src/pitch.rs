//! Fallback pitch extraction.
//!
//! Maps each note token in a tune body to a MIDI-style integer pitch:
//! base letter (C major scale, uppercase = octave 4, lowercase one octave
//! up), adjusted by a leading accidental (`^` +1, `_` -1, `=` 0) and
//! trailing octave marks (`'` +12 each, `,` -12 each).  Rests, bars,
//! durations, and decorations contribute nothing.  Written order is
//! preserved.

/// MIDI pitch of an uppercase note letter in the middle octave.
fn base_pitch(letter: char) -> Option<i32> {
    let base = match letter.to_ascii_uppercase() {
        'C' => 60,
        'D' => 62,
        'E' => 64,
        'F' => 65,
        'G' => 67,
        'A' => 69,
        'B' => 71,
        _ => return None,
    };
    // Lowercase letters sit one octave above their uppercase forms.
    Some(if letter.is_ascii_lowercase() {
        base + 12
    } else {
        base
    })
}

/// Extract the ordered pitch sequence from a tune body.
///
/// `%` comments are ignored to end of line.
pub fn extract_pitches(body: &str) -> Vec<i32> {
    let mut pitches = Vec::new();

    for line in body.lines() {
        let line = match line.find('%') {
            Some(idx) => &line[..idx],
            None => line,
        };

        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            let (accidental, letter) = match c {
                '^' | '_' | '=' => {
                    // Accidental only counts when immediately followed by a
                    // note letter; `=` also appears in chord symbols etc.
                    match chars.peek().copied() {
                        Some(next) if base_pitch(next).is_some() => {
                            chars.next();
                            let adj = match c {
                                '^' => 1,
                                '_' => -1,
                                _ => 0,
                            };
                            (adj, next)
                        }
                        _ => continue,
                    }
                }
                c if base_pitch(c).is_some() => (0, c),
                _ => continue,
            };

            let mut pitch = match base_pitch(letter) {
                Some(p) => p + accidental,
                None => continue,
            };

            // Trailing octave marks, any number of each.
            while let Some(&mark) = chars.peek() {
                match mark {
                    '\'' => pitch += 12,
                    ',' => pitch -= 12,
                    _ => break,
                }
                chars.next();
            }

            pitches.push(pitch);
        }
    }

    pitches
}
