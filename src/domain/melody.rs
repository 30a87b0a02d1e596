use crate::domain::error::MelodyResult;
use crate::domain::note::Note;

/// An ordered list of notes, e.g. one entry of the training dataset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Melody {
    notes: Vec<Note>,
}

impl Melody {
    /// Parse a comma-separated melody such as `"C4-1.0, G4-1.0"`.
    ///
    /// Whitespace around each token is ignored. A single malformed token
    /// fails the whole melody; an empty line gives an empty melody.
    pub fn parse(line: &str) -> MelodyResult<Self> {
        if line.trim().is_empty() {
            return Ok(Self::default());
        }
        let notes = line
            .split(',')
            .map(|token| token.trim().parse::<Note>())
            .collect::<MelodyResult<Vec<_>>>()?;
        Ok(Self { notes })
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// The tokens of this melody as they would appear in the dataset.
    pub fn tokens(&self) -> impl Iterator<Item = String> + '_ {
        self.notes.iter().map(Note::to_string)
    }
}
