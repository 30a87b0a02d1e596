// ============================================================
// Layer 2 - Vocab Use Case
// ============================================================
// Loads the dataset and reports the vocabulary the training run
// would build from it, without touching the model.

use anyhow::Result;

use crate::data::loader::JsonMelodyLoader;
use crate::domain::traits::MelodySource;
use crate::domain::vocabulary::Vocabulary;

#[derive(Debug, Clone)]
pub struct VocabReport {
    /// Number of ids, padding included.
    pub size:        usize,
    pub melodies:    usize,
    /// Longest melody in notes, before any end token.
    pub max_melody:  usize,
    pub entries:     Vec<(u32, String)>,
}

pub struct VocabUseCase {
    dataset:   String,
    end_token: bool,
}

impl VocabUseCase {
    pub fn new(dataset: String, end_token: bool) -> Self {
        Self { dataset, end_token }
    }

    pub fn execute(&self) -> Result<VocabReport> {
        let melodies = JsonMelodyLoader::new(&self.dataset).load_all()?;
        let vocabulary = Vocabulary::build(&melodies, self.end_token);

        Ok(VocabReport {
            size:       vocabulary.len(),
            melodies:   melodies.len(),
            max_melody: melodies.iter().map(|m| m.len()).max().unwrap_or(0),
            entries:    vocabulary
                .entries()
                .map(|(id, token)| (id, token.to_string()))
                .collect(),
        })
    }
}
