// ============================================================
// Layer 5 - Melody Generator
// ============================================================
// Autoregressive decoding from a seed melody:
//
//   ids    = encode(seed)
//   memory = encoder(ids)                  runs once
//   loop while len(ids) < max_length:
//       logits = decoder(ids, memory)      full sequence each step
//       next   = select(logits[last])      greedy or temperature
//       stop if next is the end token
//       ids.push(next)
//   return decode(ids)
//
// The loop is bounded by max_length, so it always terminates.
// Padding never gets picked: its logit is excluded before
// selection.

use burn::{prelude::*, tensor::TensorData};
use rand::{
    distributions::{Distribution, WeightedIndex},
    rngs::StdRng,
    SeedableRng,
};

use crate::domain::error::{MelodyError, MelodyResult};
use crate::domain::vocabulary::{Vocabulary, PAD_ID};
use crate::ml::model::Transformer;

pub const DEFAULT_MAX_LENGTH: usize = 50;

/// How the next token is chosen from the last position's logits.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Sampling {
    /// Highest logit wins.
    #[default]
    Greedy,
    /// Sample from softmax(logits / t).
    Temperature(f32),
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub max_length: usize,
    pub sampling:   Sampling,
    pub seed:       u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            sampling:   Sampling::Greedy,
            seed:       42,
        }
    }
}

pub struct MelodyGenerator<'a, B: Backend> {
    model:      &'a Transformer<B>,
    vocabulary: &'a Vocabulary,
    config:     GenerationConfig,
    device:     B::Device,
}

impl<'a, B: Backend> MelodyGenerator<'a, B> {
    pub fn new(
        model:      &'a Transformer<B>,
        vocabulary: &'a Vocabulary,
        config:     GenerationConfig,
        device:     B::Device,
    ) -> Self {
        Self { model, vocabulary, config, device }
    }

    /// Extend `seed` one token at a time. The result starts with the
    /// seed tokens and is never longer than `max_length`.
    pub fn generate<S: AsRef<str>>(&self, seed: &[S]) -> MelodyResult<Vec<String>> {
        self.validate(seed.len())?;

        let mut ids = self.vocabulary.encode_tokens(seed)?;
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let memory = self.model.encode(self.to_tensor(&ids))?;

        self.extend(&mut ids, |ids| {
            let logits = self.model.decode(self.to_tensor(ids), &memory)?;
            self.select(self.last_logits(logits)?, &mut rng)
        })?;

        self.vocabulary.decode_sequence(&ids)
    }

    /// Append the ids produced by `next_token` until `max_length` is
    /// reached or it yields the end token, which is not appended.
    fn extend<F>(&self, ids: &mut Vec<u32>, mut next_token: F) -> MelodyResult<()>
    where
        F: FnMut(&[u32]) -> MelodyResult<u32>,
    {
        while ids.len() < self.config.max_length {
            let next = next_token(ids)?;
            if Some(next) == self.vocabulary.end_id() {
                tracing::debug!("End token after {} tokens", ids.len());
                break;
            }
            ids.push(next);
        }
        Ok(())
    }

    fn validate(&self, seed_len: usize) -> MelodyResult<()> {
        if seed_len == 0 {
            return Err(MelodyError::Input("seed melody is empty".to_string()));
        }
        let positions = self.model.max_target_positions();
        if self.config.max_length > positions {
            return Err(MelodyError::Configuration(format!(
                "max_length ({}) exceeds the {} decoder positions",
                self.config.max_length, positions
            )));
        }
        if seed_len > self.config.max_length {
            return Err(MelodyError::Input(format!(
                "seed has {} tokens but max_length is {}",
                seed_len, self.config.max_length
            )));
        }
        if let Sampling::Temperature(t) = self.config.sampling {
            if !(t.is_finite() && t > 0.0) {
                return Err(MelodyError::Configuration(format!(
                    "temperature must be a positive number, got {t}"
                )));
            }
        }
        Ok(())
    }

    fn to_tensor(&self, ids: &[u32]) -> Tensor<B, 2, Int> {
        let data: Vec<i32> = ids.iter().map(|&id| id as i32).collect();
        Tensor::<B, 2, Int>::from_data(TensorData::new(data, [1, ids.len()]), &self.device)
    }

    /// logits: [1, seq, vocab] → the last row as host floats.
    fn last_logits(&self, logits: Tensor<B, 3>) -> MelodyResult<Vec<f32>> {
        let [_, seq_len, vocab] = logits.dims();
        logits
            .slice([0..1, seq_len - 1..seq_len, 0..vocab])
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| MelodyError::Tensor(format!("{e:?}")))
    }

    fn select(&self, mut logits: Vec<f32>, rng: &mut StdRng) -> MelodyResult<u32> {
        if let Some(pad) = logits.get_mut(PAD_ID as usize) {
            *pad = f32::NEG_INFINITY;
        }

        match self.config.sampling {
            Sampling::Greedy => argmax(&logits),
            Sampling::Temperature(t) => {
                let weights = softmax_with_temperature(&logits, t);
                let dist = WeightedIndex::new(&weights)
                    .map_err(|e| MelodyError::Tensor(format!("cannot sample: {e}")))?;
                Ok(dist.sample(rng) as u32)
            }
        }
    }
}

fn argmax(values: &[f32]) -> MelodyResult<u32> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i as u32)
        .ok_or_else(|| MelodyError::Tensor("no logits to choose from".to_string()))
}

/// Normalised weights of softmax(logits / t); -inf logits get weight 0.
fn softmax_with_temperature(logits: &[f32], t: f32) -> Vec<f64> {
    let scaled: Vec<f64> = logits.iter().map(|&l| l as f64 / t as f64).collect();
    let max = scaled.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scaled.iter().map(|&s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::melody::Melody;
    use crate::ml::model::TransformerConfig;
    use crate::ml::TestBackend;

    fn vocabulary(with_end_token: bool) -> Vocabulary {
        let melodies = vec![
            Melody::parse("C4-1.0, D4-1.0, E4-1.0, C4-1.0").unwrap(),
            Melody::parse("G4-0.5, A4-0.5, B4-1.0").unwrap(),
        ];
        Vocabulary::build(&melodies, with_end_token)
    }

    fn model(vocab: &Vocabulary) -> Transformer<TestBackend> {
        TransformerConfig::new(1, 16, 2, 32, vocab.len(), vocab.len())
            .with_dropout(0.0)
            .init(&Default::default())
            .unwrap()
    }

    fn generate(vocab: &Vocabulary, config: GenerationConfig, seed: &[&str]) -> MelodyResult<Vec<String>> {
        let model = model(vocab);
        MelodyGenerator::new(&model, vocab, config, Default::default()).generate(seed)
    }

    fn config(max_length: usize, sampling: Sampling) -> GenerationConfig {
        GenerationConfig { max_length, sampling, seed: 42 }
    }

    #[test]
    fn test_output_starts_with_seed_and_respects_max_length() {
        let vocab = vocabulary(false);
        let out = generate(&vocab, config(7, Sampling::Greedy), &["C4-1.0", "D4-1.0"]).unwrap();
        assert!(out.len() <= 7);
        assert_eq!(&out[..2], &["C4-1.0", "D4-1.0"]);
        // Without an end token the loop only stops at max_length
        assert_eq!(out.len(), 7);
        for token in &out {
            assert!(vocab.encode(token).is_ok(), "{token} is not a note");
        }
    }

    #[test]
    fn test_end_token_is_never_emitted() {
        let vocab = vocabulary(true);
        for seed in 0..5 {
            let cfg = GenerationConfig { max_length: 12, sampling: Sampling::Temperature(1.5), seed };
            let out = generate(&vocab, cfg, &["G4-0.5"]).unwrap();
            assert!(out.len() <= 12);
            assert_eq!(out[0], "G4-0.5");
            assert!(out.iter().all(|t| t != crate::domain::vocabulary::END_TOKEN));
        }
    }

    #[test]
    fn test_end_token_stops_generation_early() {
        let vocab = vocabulary(true);
        let model = model(&vocab);
        let generator = MelodyGenerator::new(&model, &vocab, config(10, Sampling::Greedy), Default::default());

        let end = vocab.end_id().unwrap();
        let d = vocab.encode("D4-1.0").unwrap();
        let e = vocab.encode("E4-1.0").unwrap();
        let mut picks = vec![d, e, end, d].into_iter();

        let mut ids = vec![vocab.encode("C4-1.0").unwrap()];
        generator.extend(&mut ids, |_| Ok(picks.next().unwrap())).unwrap();

        assert_eq!(ids.len(), 3);
        assert_eq!(vocab.decode_sequence(&ids).unwrap(), vec!["C4-1.0", "D4-1.0", "E4-1.0"]);
        // Nothing is requested after the end token
        assert_eq!(picks.next(), Some(d));
    }

    #[test]
    fn test_extend_fills_to_max_length_without_end_token() {
        let vocab = vocabulary(false);
        let model = model(&vocab);
        let generator = MelodyGenerator::new(&model, &vocab, config(5, Sampling::Greedy), Default::default());

        let c = vocab.encode("C4-1.0").unwrap();
        let mut calls = 0;
        let mut ids = vec![c];
        generator.extend(&mut ids, |_| { calls += 1; Ok(c) }).unwrap();
        assert_eq!(ids, vec![c; 5]);
        assert_eq!(calls, 4);
    }

    #[test]
    fn test_empty_seed_fails() {
        let vocab = vocabulary(false);
        let err = generate(&vocab, GenerationConfig::default(), &[]).unwrap_err();
        assert!(matches!(err, MelodyError::Input(_)));
    }

    #[test]
    fn test_seed_longer_than_max_length_fails() {
        let vocab = vocabulary(false);
        let err = generate(&vocab, config(2, Sampling::Greedy), &["C4-1.0", "D4-1.0", "E4-1.0"]).unwrap_err();
        assert!(matches!(err, MelodyError::Input(_)));
    }

    #[test]
    fn test_unknown_seed_token_fails() {
        let vocab = vocabulary(false);
        let err = generate(&vocab, GenerationConfig::default(), &["F#2-3.0"]).unwrap_err();
        assert!(matches!(err, MelodyError::UnknownToken(t) if t == "F#2-3.0"));
    }

    #[test]
    fn test_seed_of_max_length_is_returned_as_is() {
        let vocab = vocabulary(false);
        let out = generate(&vocab, config(2, Sampling::Greedy), &["E4-1.0", "C4-1.0"]).unwrap();
        assert_eq!(out, vec!["E4-1.0", "C4-1.0"]);
    }

    #[test]
    fn test_greedy_and_seeded_sampling_are_reproducible() {
        let vocab = vocabulary(false);
        let model = model(&vocab);
        let run = |sampling| {
            MelodyGenerator::new(&model, &vocab, config(10, sampling), Default::default())
                .generate(&["C4-1.0"])
                .unwrap()
        };
        assert_eq!(run(Sampling::Greedy), run(Sampling::Greedy));
        assert_eq!(run(Sampling::Temperature(0.8)), run(Sampling::Temperature(0.8)));
    }

    #[test]
    fn test_max_length_beyond_decoder_positions_is_rejected() {
        let vocab = vocabulary(false);
        let err = generate(&vocab, config(101, Sampling::Greedy), &["C4-1.0"]).unwrap_err();
        assert!(matches!(err, MelodyError::Configuration(_)));
    }

    #[test]
    fn test_non_positive_temperature_is_rejected() {
        let vocab = vocabulary(false);
        let err = generate(&vocab, config(5, Sampling::Temperature(0.0)), &["C4-1.0"]).unwrap_err();
        assert!(matches!(err, MelodyError::Configuration(_)));
    }

    #[test]
    fn test_argmax_and_softmax_helpers() {
        assert_eq!(argmax(&[f32::NEG_INFINITY, 0.5, 2.0, 1.0]).unwrap(), 2);
        let weights = softmax_with_temperature(&[f32::NEG_INFINITY, 0.0, 0.0], 1.0);
        assert_eq!(weights[0], 0.0);
        assert!((weights[1] - 0.5).abs() < 1e-12);
    }
}
