// ============================================================
// Layer 3 - Note Token
// ============================================================
// One musical event as it appears in the dataset:
//
//   C4-1.0      pitch C, octave 4, one beat
//   F#5-0.5     pitch F sharp, octave 5, half a beat
//   Bb-1-2      pitch B flat, octave -1, two beats
//
// The token text is preserved exactly, so parsing a token
// and printing it again always gives back the same string.

use std::fmt;
use std::str::FromStr;

use crate::domain::error::{MelodyError, MelodyResult};

const MIN_OCTAVE: i8 = -1;
const MAX_OCTAVE: i8 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accidental {
    Natural,
    Sharp,
    Flat,
}

impl fmt::Display for Accidental {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accidental::Natural => Ok(()),
            Accidental::Sharp   => f.write_str("#"),
            Accidental::Flat    => f.write_str("b"),
        }
    }
}

/// A validated `<PITCH><OCTAVE>-<DURATION>` token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Note {
    letter:     char,
    accidental: Accidental,
    octave:     i8,
    /// Kept as written (`1` and `1.0` are different tokens).
    duration:   String,
}

impl FromStr for Note {
    type Err = MelodyError;

    fn from_str(token: &str) -> MelodyResult<Self> {
        // The duration never contains '-', so the last one is the separator.
        // This keeps negative octaves ("C-1-1.0") unambiguous.
        let (head, duration) = token
            .rsplit_once('-')
            .ok_or_else(|| MelodyError::parse(token, "missing '-' between pitch and duration"))?;

        let mut chars = head.chars();
        let letter = chars
            .next()
            .ok_or_else(|| MelodyError::parse(token, "missing pitch letter"))?;
        if !('A'..='G').contains(&letter) {
            return Err(MelodyError::parse(token, format!("pitch letter {letter:?} is not A-G")));
        }

        let rest = chars.as_str();
        let (accidental, octave_text) = if let Some(stripped) = rest.strip_prefix('#') {
            (Accidental::Sharp, stripped)
        } else if let Some(stripped) = rest.strip_prefix('b') {
            (Accidental::Flat, stripped)
        } else {
            (Accidental::Natural, rest)
        };

        let octave = parse_octave(token, octave_text)?;
        validate_duration(token, duration)?;

        Ok(Note {
            letter,
            accidental,
            octave,
            duration: duration.to_string(),
        })
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}-{}", self.letter, self.accidental, self.octave, self.duration)
    }
}

fn parse_octave(token: &str, text: &str) -> MelodyResult<i8> {
    let octave: i8 = text
        .parse()
        .map_err(|_| MelodyError::parse(token, format!("octave {text:?} is not an integer")))?;
    // Reject "04", "+4" and "-0": they would not print back the same way.
    if octave.to_string() != text {
        return Err(MelodyError::parse(token, format!("octave {text:?} is not in canonical form")));
    }
    if !(MIN_OCTAVE..=MAX_OCTAVE).contains(&octave) {
        return Err(MelodyError::parse(
            token,
            format!("octave {octave} is outside {MIN_OCTAVE}..={MAX_OCTAVE}"),
        ));
    }
    Ok(octave)
}

fn validate_duration(token: &str, text: &str) -> MelodyResult<()> {
    let well_formed = !text.is_empty()
        && !text.starts_with('.')
        && !text.ends_with('.')
        && text.chars().filter(|&c| c == '.').count() <= 1
        && text.chars().all(|c| c.is_ascii_digit() || c == '.');
    if !well_formed {
        return Err(MelodyError::parse(token, format!("duration {text:?} is not a decimal number")));
    }

    let beats: f64 = text
        .parse()
        .map_err(|_| MelodyError::parse(token, format!("duration {text:?} is not a decimal number")))?;
    if !(beats.is_finite() && beats > 0.0) {
        return Err(MelodyError::parse(token, "duration must be positive"));
    }
    Ok(())
}
