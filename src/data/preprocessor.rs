// ============================================================
// Layer 4 - Melody Preprocessor
// ============================================================
// Turns parsed melodies into fixed-length (input, target) id
// pairs for teacher forcing.
//
// For a melody m = [a, b, c, d] every prefix of two or more
// tokens becomes a sample:
//
//   input        target
//   [a, b]       [b, c]
//   [a, b, c]    [b, c, d]
//
// The target is always the input shifted left by one. Both are
// right-padded with PAD_ID to the longest melody in the dataset,
// and no melody may be longer than the positional encoding
// table, so anything past max_positions is truncated here.
//
// The training step shifts the target once more (decoder input
// vs labels), so a one-token prefix would leave only padding
// labels. Those pairs are never emitted.

use crate::data::dataset::MelodySample;
use crate::domain::error::{MelodyError, MelodyResult};
use crate::domain::melody::Melody;
use crate::domain::vocabulary::{Vocabulary, PAD_ID};

/// Shortest encoded melody that yields a label that is not padding.
pub const MIN_SEQUENCE_LEN: usize = 3;

/// Samples ready for the dataset plus the length they were padded to.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub samples:    Vec<MelodySample>,
    pub max_length: usize,
}

pub struct MelodyPreprocessor<'a> {
    vocabulary:    &'a Vocabulary,
    max_positions: usize,
}

impl<'a> MelodyPreprocessor<'a> {
    pub fn new(vocabulary: &'a Vocabulary, max_positions: usize) -> Self {
        Self { vocabulary, max_positions }
    }

    /// Encode, truncate and pad every melody, then expand each one
    /// into its prefix pairs.
    pub fn build_samples(&self, melodies: &[Melody]) -> MelodyResult<PreparedData> {
        let mut sequences = Vec::with_capacity(melodies.len());
        for melody in melodies {
            let mut ids = self.vocabulary.encode_melody(melody)?;
            if ids.len() > self.max_positions {
                tracing::warn!(
                    "Truncating melody of {} tokens to {} positions",
                    ids.len(),
                    self.max_positions
                );
                ids.truncate(self.max_positions);
            }
            sequences.push(ids);
        }

        let max_length = sequences.iter().map(Vec::len).max().unwrap_or(0);
        if max_length < MIN_SEQUENCE_LEN {
            return Err(MelodyError::Input(format!(
                "need at least one melody of {MIN_SEQUENCE_LEN} or more tokens \
                 (end token included) to have anything to predict"
            )));
        }

        let samples: Vec<MelodySample> = sequences
            .iter()
            .flat_map(|ids| {
                (MIN_SEQUENCE_LEN - 1..ids.len()).map(move |i| MelodySample {
                    input:  pad_sequence(&ids[..i], max_length),
                    target: pad_sequence(&ids[1..=i], max_length),
                })
            })
            .collect();

        tracing::info!(
            "Built {} training pairs (padded length {})",
            samples.len(),
            max_length
        );
        Ok(PreparedData { samples, max_length })
    }
}

/// Right-pad `ids` with PAD_ID up to `length`.
pub fn pad_sequence(ids: &[u32], length: usize) -> Vec<u32> {
    let mut padded = ids.to_vec();
    padded.resize(length.max(ids.len()), PAD_ID);
    padded
}

/// `true` where the id is padding.
pub fn padding_mask(ids: &[u32]) -> Vec<bool> {
    ids.iter().map(|&id| id == PAD_ID).collect()
}

/// Keep only the positions the mask marks as real tokens.
pub fn strip_padding(ids: &[u32], mask: &[bool]) -> Vec<u32> {
    ids.iter()
        .zip(mask)
        .filter_map(|(&id, &is_pad)| (!is_pad).then_some(id))
        .collect()
}

/// Split a padded target into the decoder input and the labels it
/// should predict:
///
///   target         [b, c, d, PAD]
///   decoder input  [b, c, d, PAD]   target[..n-1] + PAD
///   labels         [c, d, PAD, PAD] target[1..]   + PAD
///
/// Both keep the length of the target.
pub fn teacher_forcing_split(target: &[u32]) -> (Vec<u32>, Vec<u32>) {
    if target.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let n = target.len();
    let decoder_input = pad_sequence(&target[..n - 1], n);
    let labels        = pad_sequence(&target[1..], n);
    (decoder_input, labels)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn setup(lines: &[&str], with_end_token: bool) -> (Vec<Melody>, Vocabulary) {
        let melodies: Vec<Melody> = lines.iter().map(|l| Melody::parse(l).unwrap()).collect();
        let vocab = Vocabulary::build(&melodies, with_end_token);
        (melodies, vocab)
    }

    #[test]
    fn test_builds_prefix_pairs() {
        let (melodies, vocab) = setup(&["C4-1.0, D4-1.0, E4-1.0, F4-1.0", "G4-1.0, A4-1.0"], false);
        let data = MelodyPreprocessor::new(&vocab, 100).build_samples(&melodies).unwrap();

        // 2 pairs from the first melody, none from the two-note one
        assert_eq!(data.samples.len(), 2);
        assert_eq!(data.max_length, 4);

        let c = vocab.encode("C4-1.0").unwrap();
        let d = vocab.encode("D4-1.0").unwrap();
        let e = vocab.encode("E4-1.0").unwrap();
        assert_eq!(data.samples[0].input,  vec![c, d, PAD_ID, PAD_ID]);
        assert_eq!(data.samples[0].target, vec![d, e, PAD_ID, PAD_ID]);
    }

    #[test]
    fn test_every_sample_has_padded_length() {
        let (melodies, vocab) = setup(&["C4-1.0, D4-1.0, E4-1.0", "G4-1.0, A4-1.0"], true);
        let data = MelodyPreprocessor::new(&vocab, 100).build_samples(&melodies).unwrap();
        assert_eq!(data.max_length, 4); // three notes + end token
        for sample in &data.samples {
            assert_eq!(sample.input.len(),  data.max_length);
            assert_eq!(sample.target.len(), data.max_length);
        }
    }

    #[test]
    fn test_truncates_to_max_positions() {
        let (melodies, vocab) = setup(&["C4-1.0, D4-1.0, E4-1.0, F4-1.0, G4-1.0"], false);
        let data = MelodyPreprocessor::new(&vocab, 3).build_samples(&melodies).unwrap();
        assert_eq!(data.max_length, 3);
        assert_eq!(data.samples.len(), 1);
    }

    #[test]
    fn test_two_note_melodies_are_rejected() {
        let (melodies, vocab) = setup(&["C4-1.0", "D4-1.0"], false);
        let err = MelodyPreprocessor::new(&vocab, 100).build_samples(&melodies).unwrap_err();
        assert!(matches!(err, MelodyError::Input(_)));

        let (melodies, vocab) = setup(&["C4-1.0, D4-1.0", "E4-1.0, F4-1.0"], false);
        let err = MelodyPreprocessor::new(&vocab, 100).build_samples(&melodies).unwrap_err();
        assert!(matches!(err, MelodyError::Input(_)));
    }

    #[test]
    fn test_two_note_melodies_train_with_end_token() {
        // The end token makes each melody three ids long
        let (melodies, vocab) = setup(&["C4-1.0, D4-1.0", "E4-1.0, F4-1.0"], true);
        let data = MelodyPreprocessor::new(&vocab, 100).build_samples(&melodies).unwrap();
        assert_eq!(data.samples.len(), 2);
    }

    #[test]
    fn test_every_sample_has_a_real_label() {
        let (melodies, vocab) = setup(
            &["C4-1.0, D4-1.0, E4-1.0, F4-1.0", "G4-1.0, A4-1.0", "B4-1.0, C5-1.0, D5-1.0"],
            true,
        );
        let data = MelodyPreprocessor::new(&vocab, 100).build_samples(&melodies).unwrap();
        for sample in &data.samples {
            let (_, labels) = teacher_forcing_split(&sample.target);
            assert!(labels.iter().any(|&id| id != PAD_ID), "{sample:?} has only padding labels");
        }
    }

    #[test]
    fn test_pad_mask_strip_recovers_originals() {
        let originals: Vec<Vec<u32>> = vec![vec![3, 1, 4], vec![1], vec![5, 9, 2, 6, 5], vec![]];
        let length = originals.iter().map(Vec::len).max().unwrap();

        for original in &originals {
            let padded = pad_sequence(original, length);
            assert_eq!(padded.len(), length);
            let mask = padding_mask(&padded);
            assert_eq!(&strip_padding(&padded, &mask), original);
        }
    }

    #[test]
    fn test_teacher_forcing_split_keeps_length() {
        let (decoder_input, labels) = teacher_forcing_split(&[7, 8, 9, PAD_ID]);
        assert_eq!(decoder_input, vec![7, 8, 9, PAD_ID]);
        assert_eq!(labels,        vec![8, 9, PAD_ID, PAD_ID]);

        let (decoder_input, labels) = teacher_forcing_split(&[7, PAD_ID, PAD_ID]);
        assert_eq!(decoder_input, vec![7, PAD_ID, PAD_ID]);
        assert_eq!(labels,        vec![PAD_ID, PAD_ID, PAD_ID]);
    }
}
