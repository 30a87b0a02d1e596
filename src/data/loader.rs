// ============================================================
// Layer 4 - Melody Loader
// ============================================================
// Loads the training melodies from a JSON dataset file.
//
// Expected format: a JSON array of strings, one melody each,
// tokens separated by commas:
//
//   [
//     "C4-1.0, D4-1.0, E4-1.0, C4-1.0",
//     "E4-1.0, F4-1.0, G4-2.0"
//   ]
//
// Unlike a loose text corpus, a malformed token here is a
// data error: the load fails with the parse error instead of
// silently dropping the melody.

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};

use crate::domain::melody::Melody;
use crate::domain::traits::MelodySource;

/// Reads melodies from a JSON file.
/// Implements the MelodySource trait from Layer 3.
pub struct JsonMelodyLoader {
    path: PathBuf,
}

impl JsonMelodyLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MelodySource for JsonMelodyLoader {
    fn load_all(&self) -> Result<Vec<Melody>> {
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read dataset '{}'", self.path.display()))?;

        let lines: Vec<String> = serde_json::from_str(&json).with_context(|| {
            format!(
                "Dataset '{}' is not a JSON array of strings",
                self.path.display()
            )
        })?;

        let mut melodies = Vec::with_capacity(lines.len());
        for (index, line) in lines.iter().enumerate() {
            let melody = Melody::parse(line)
                .with_context(|| format!("Melody #{index} in '{}'", self.path.display()))?;

            if melody.is_empty() {
                tracing::warn!("Skipping empty melody #{}", index);
                continue;
            }
            melodies.push(melody);
        }

        tracing::info!(
            "Loaded {} melodies from '{}'",
            melodies.len(),
            self.path.display()
        );
        Ok(melodies)
    }
}
