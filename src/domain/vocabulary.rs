// ============================================================
// Layer 3 - Vocabulary
// ============================================================
// Maps note tokens to the integer ids the model works with.
//
//   id 0          <pad>   reserved, never produced by encode()
//   ids 1..=n     note tokens, most frequent first
//   id n+1        <end>   only when built with an end token
//
// Built once from the training melodies and then only read.
// Every component that needs to encode or decode borrows the
// same instance, so ids can never drift between training and
// generation.

use std::collections::HashMap;

use crate::domain::error::{MelodyError, MelodyResult};
use crate::domain::melody::Melody;
use crate::domain::note::Note;

pub const PAD_ID: u32 = 0;
pub const PAD_TOKEN: &str = "<pad>";
pub const END_TOKEN: &str = "<end>";

#[derive(Debug, Clone)]
pub struct Vocabulary {
    id_to_token: Vec<String>,
    token_to_id: HashMap<String, u32>,
    end_id:      Option<u32>,
}

impl Vocabulary {
    /// Build the vocabulary from every token of every melody.
    ///
    /// Tokens are ordered by descending frequency; ties keep the order in
    /// which the tokens first appear.
    pub fn build(melodies: &[Melody], with_end_token: bool) -> Self {
        let mut counts: Vec<(String, usize)> = Vec::new();
        let mut seen:   HashMap<String, usize> = HashMap::new();

        for token in melodies.iter().flat_map(Melody::tokens) {
            match seen.get(&token) {
                Some(&slot) => counts[slot].1 += 1,
                None => {
                    seen.insert(token.clone(), counts.len());
                    counts.push((token, 1));
                }
            }
        }

        // sort_by is stable, so equal counts stay in first-seen order
        counts.sort_by(|a, b| b.1.cmp(&a.1));

        let mut id_to_token = Vec::with_capacity(counts.len() + 2);
        id_to_token.push(PAD_TOKEN.to_string());
        id_to_token.extend(counts.into_iter().map(|(token, _)| token));

        let end_id = with_end_token.then(|| {
            id_to_token.push(END_TOKEN.to_string());
            (id_to_token.len() - 1) as u32
        });

        let token_to_id = id_to_token
            .iter()
            .enumerate()
            .map(|(id, token)| (token.clone(), id as u32))
            .collect();

        tracing::debug!(
            "Vocabulary built: {} ids (end token: {})",
            id_to_token.len(),
            end_id.is_some()
        );

        Self { id_to_token, token_to_id, end_id }
    }

    /// Number of ids, padding (and the end token) included.
    pub fn len(&self) -> usize {
        self.id_to_token.len()
    }

    pub fn end_id(&self) -> Option<u32> {
        self.end_id
    }

    /// Encode one token string. Malformed text is a parse error, a
    /// well-formed note that was never seen is `UnknownToken`.
    pub fn encode(&self, token: &str) -> MelodyResult<u32> {
        let note: Note = token.trim().parse()?;
        let text = note.to_string();
        self.token_to_id
            .get(&text)
            .copied()
            .ok_or(MelodyError::UnknownToken(text))
    }

    pub fn encode_tokens<S: AsRef<str>>(&self, tokens: &[S]) -> MelodyResult<Vec<u32>> {
        tokens.iter().map(|t| self.encode(t.as_ref())).collect()
    }

    /// Encode a parsed melody, appending the end token when there is one.
    pub fn encode_melody(&self, melody: &Melody) -> MelodyResult<Vec<u32>> {
        let mut ids = melody
            .tokens()
            .map(|token| {
                self.token_to_id
                    .get(&token)
                    .copied()
                    .ok_or(MelodyError::UnknownToken(token))
            })
            .collect::<MelodyResult<Vec<_>>>()?;
        ids.extend(self.end_id);
        Ok(ids)
    }

    pub fn decode(&self, id: u32) -> MelodyResult<&str> {
        self.id_to_token
            .get(id as usize)
            .map(String::as_str)
            .ok_or(MelodyError::InvalidId(id))
    }

    /// Decode ids back to token strings. Padding is skipped and decoding
    /// stops at the end token.
    pub fn decode_sequence(&self, ids: &[u32]) -> MelodyResult<Vec<String>> {
        let mut tokens = Vec::with_capacity(ids.len());
        for &id in ids {
            if id == PAD_ID {
                continue;
            }
            if Some(id) == self.end_id {
                break;
            }
            tokens.push(self.decode(id)?.to_string());
        }
        Ok(tokens)
    }

    /// All `(id, token)` pairs in id order.
    pub fn entries(&self) -> impl Iterator<Item = (u32, &str)> {
        self.id_to_token
            .iter()
            .enumerate()
            .map(|(id, token)| (id as u32, token.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn melodies(lines: &[&str]) -> Vec<Melody> {
        lines.iter().map(|l| Melody::parse(l).unwrap()).collect()
    }

    #[test]
    fn test_pad_is_id_zero() {
        let vocab = Vocabulary::build(&melodies(&["C4-1.0, D4-1.0"]), false);
        assert_eq!(vocab.decode(PAD_ID).unwrap(), PAD_TOKEN);
        assert_eq!(vocab.len(), 3);
        assert_ne!(vocab.encode("C4-1.0").unwrap(), PAD_ID);
    }

    #[test]
    fn test_ids_follow_frequency_then_first_seen() {
        let vocab = Vocabulary::build(
            &melodies(&["E4-1.0, D4-1.0, C4-1.0", "C4-1.0, G4-2"]),
            false,
        );
        // C4 appears twice; E4, D4, G4 once each in that order
        assert_eq!(vocab.encode("C4-1.0").unwrap(), 1);
        assert_eq!(vocab.encode("E4-1.0").unwrap(), 2);
        assert_eq!(vocab.encode("D4-1.0").unwrap(), 3);
        assert_eq!(vocab.encode("G4-2").unwrap(), 4);
    }

    #[test]
    fn test_tokenize_detokenize_round_trip() {
        let data = melodies(&["C4-1.0, F#4-0.5, Bb3-2, C-1-0.25"]);
        let vocab = Vocabulary::build(&data, false);
        let tokens: Vec<String> = data[0].tokens().collect();
        let ids = vocab.encode_tokens(&tokens).unwrap();
        assert_eq!(vocab.decode_sequence(&ids).unwrap(), tokens);
    }

    #[test]
    fn test_unknown_and_malformed_tokens() {
        let vocab = Vocabulary::build(&melodies(&["C4-1.0"]), false);
        assert!(matches!(vocab.encode("D4-1.0"), Err(MelodyError::UnknownToken(_))));
        assert!(matches!(vocab.encode("D4/1.0"), Err(MelodyError::Parse { .. })));
        assert!(matches!(vocab.decode(99), Err(MelodyError::InvalidId(99))));
    }

    #[test]
    fn test_end_token_terminates_encoding_and_decoding() {
        let data = melodies(&["C4-1.0, D4-1.0"]);
        let vocab = Vocabulary::build(&data, true);
        let end = vocab.end_id().unwrap();
        assert_eq!(end as usize, vocab.len() - 1);

        let ids = vocab.encode_melody(&data[0]).unwrap();
        assert_eq!(ids.last(), Some(&end));

        let mut with_tail = ids.clone();
        with_tail.push(vocab.encode("C4-1.0").unwrap());
        assert_eq!(vocab.decode_sequence(&with_tail).unwrap(), vec!["C4-1.0", "D4-1.0"]);
    }

    #[test]
    fn test_decode_skips_padding() {
        let vocab = Vocabulary::build(&melodies(&["C4-1.0, D4-1.0"]), false);
        let decoded = vocab.decode_sequence(&[1, 2, PAD_ID, PAD_ID]).unwrap();
        assert_eq!(decoded.len(), 2);
    }
}
