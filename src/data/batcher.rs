// ============================================================
// Layer 4 - Melody Batcher
// ============================================================
// Implements Burn's Batcher trait to stack MelodySamples into
// integer tensors.
//
//   Input:  Vec of N samples, each padded to length S
//   Output: MelodyBatch with three tensors of shape [N, S]
//
// The teacher-forcing split happens here, on the host, so the
// training step only ever sees ready-made tensors:
//
//   encoder_input  the melody prefix
//   decoder_input  target[..S-1] + PAD
//   labels         target[1..]   + PAD

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::MelodySample;
use crate::data::preprocessor::teacher_forcing_split;

// ─── MelodyBatch ──────────────────────────────────────────────────────────────
/// A batch of training pairs. All tensors are `[batch_size, seq_len]`.
#[derive(Debug, Clone)]
pub struct MelodyBatch<B: Backend> {
    pub encoder_input: Tensor<B, 2, Int>,
    pub decoder_input: Tensor<B, 2, Int>,
    /// Next-token ids the decoder should predict; PAD where nothing is due.
    pub labels:        Tensor<B, 2, Int>,
}

// ─── MelodyBatcher ────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct MelodyBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> MelodyBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<MelodySample, MelodyBatch<B>> for MelodyBatcher<B> {
    fn batch(&self, items: Vec<MelodySample>) -> MelodyBatch<B> {
        let mut encoder_rows = Vec::with_capacity(items.len());
        let mut decoder_rows = Vec::with_capacity(items.len());
        let mut label_rows   = Vec::with_capacity(items.len());

        for sample in items {
            let (decoder_input, labels) = teacher_forcing_split(&sample.target);
            encoder_rows.push(sample.input);
            decoder_rows.push(decoder_input);
            label_rows.push(labels);
        }

        MelodyBatch {
            encoder_input: ids_to_tensor(&encoder_rows, &self.device),
            decoder_input: ids_to_tensor(&decoder_rows, &self.device),
            labels:        ids_to_tensor(&label_rows, &self.device),
        }
    }
}

/// Stack equally long id rows into a `[rows, len]` Int tensor.
pub fn ids_to_tensor<B: Backend>(rows: &[Vec<u32>], device: &B::Device) -> Tensor<B, 2, Int> {
    let seq_len = rows.first().map_or(0, Vec::len);
    let flat: Vec<i32> = rows
        .iter()
        .flat_map(|row| row.iter().map(|&id| id as i32))
        .collect();

    Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device).reshape([rows.len(), seq_len])
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vocabulary::PAD_ID;
    use crate::ml::TestBackend;

    #[test]
    fn test_batch_shapes_and_shift() {
        let device = Default::default();
        let batcher = MelodyBatcher::<TestBackend>::new(device);
        let items = vec![
            MelodySample { input: vec![1, 2, 0], target: vec![2, 3, 0] },
            MelodySample { input: vec![4, 0, 0], target: vec![5, 0, 0] },
        ];

        let batch = batcher.batch(items);
        assert_eq!(batch.encoder_input.dims(), [2, 3]);
        assert_eq!(batch.decoder_input.dims(), [2, 3]);
        assert_eq!(batch.labels.dims(),        [2, 3]);

        let labels: Vec<i64> = batch.labels.into_data().convert::<i64>().to_vec().unwrap();
        let pad = PAD_ID as i64;
        assert_eq!(labels, vec![3, pad, pad, pad, pad, pad]);

        let decoder: Vec<i64> = batch.decoder_input.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(decoder, vec![2, 3, pad, 5, pad, pad]);
    }
}
