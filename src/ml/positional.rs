// ============================================================
// Layer 5 - Sinusoidal Positional Encoding
// ============================================================
// Attention is permutation-invariant, so each position gets a
// fixed vector added to its token embedding:
//
//   angle(pos, j) = pos / 10000^(2 * floor(j / 2) / d_model)
//   PE[pos, j]    = sin(angle)   for even j
//                   cos(angle)   for odd j
//
// The table is computed once when the stack is built and kept
// as a constant tensor (not a Param), so the optimizer never
// touches it. Reference: Vaswani et al. (2017) §3.5
// Burn's nn::PositionalEncoding asserts on inputs longer than its
// table; this one returns SequenceTooLong instead.

use burn::prelude::*;

use crate::domain::error::{MelodyError, MelodyResult};

#[derive(Config, Debug)]
pub struct PositionalEncodingConfig {
    pub max_positions: usize,
    pub d_model:       usize,
}

impl PositionalEncodingConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> PositionalEncoding<B> {
        let table = sinusoid_table(self.max_positions, self.d_model);
        let table = Tensor::<B, 2>::from_data(
            TensorData::new(table, [self.max_positions, self.d_model]),
            device,
        );
        PositionalEncoding {
            table,
            max_positions: self.max_positions,
            d_model:       self.d_model,
        }
    }
}

#[derive(Module, Debug)]
pub struct PositionalEncoding<B: Backend> {
    table:         Tensor<B, 2>,
    max_positions: usize,
    d_model:       usize,
}

impl<B: Backend> PositionalEncoding<B> {
    /// Add the first `seq_len` rows of the table to `x: [batch, seq_len, d_model]`.
    pub fn forward(&self, x: Tensor<B, 3>) -> MelodyResult<Tensor<B, 3>> {
        let [_, seq_len, _] = x.dims();
        if seq_len > self.max_positions {
            return Err(MelodyError::SequenceTooLong {
                len: seq_len,
                max: self.max_positions,
            });
        }
        let rows = self
            .table
            .clone()
            .slice([0..seq_len, 0..self.d_model])
            .unsqueeze::<3>();
        Ok(x + rows)
    }

    pub fn max_positions(&self) -> usize {
        self.max_positions
    }
}

/// Row-major `[max_positions, d_model]` sinusoid values.
pub fn sinusoid_table(max_positions: usize, d_model: usize) -> Vec<f32> {
    let mut table = Vec::with_capacity(max_positions * d_model);
    for pos in 0..max_positions {
        for j in 0..d_model {
            let exponent = (2 * (j / 2)) as f64 / d_model as f64;
            let angle = pos as f64 / 10_000f64.powf(exponent);
            let value = if j % 2 == 0 { angle.sin() } else { angle.cos() };
            table.push(value as f32);
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::TestBackend;

    #[test]
    fn test_table_is_deterministic() {
        assert_eq!(sinusoid_table(100, 64), sinusoid_table(100, 64));
    }

    #[test]
    fn test_known_values() {
        let d = 8;
        let table = sinusoid_table(3, d);
        // position 0: sin(0) = 0 on even dims, cos(0) = 1 on odd dims
        for j in 0..d {
            let expected = if j % 2 == 0 { 0.0 } else { 1.0 };
            assert!((table[j] - expected).abs() < 1e-6);
        }
        // position 1, dims 0/1 use frequency 1
        assert!((table[d] - 1f32.sin()).abs() < 1e-6);
        assert!((table[d + 1] - 1f32.cos()).abs() < 1e-6);
        // dims 2/3 use 1 / 10000^(2/8)
        let angle = 2.0f64 / 10_000f64.powf(0.25);
        assert!((table[2 * d + 2] as f64 - angle.sin()).abs() < 1e-6);
        assert!((table[2 * d + 3] as f64 - angle.cos()).abs() < 1e-6);
    }

    #[test]
    fn test_forward_adds_rows_per_position() {
        let device = Default::default();
        let pe = PositionalEncodingConfig::new(10, 4).init::<TestBackend>(&device);
        let zeros = Tensor::<TestBackend, 3>::zeros([2, 3, 4], &device);

        let out = pe.forward(zeros).unwrap();
        assert_eq!(out.dims(), [2, 3, 4]);

        let values: Vec<f32> = out.into_data().convert::<f32>().to_vec().unwrap();
        let expected = sinusoid_table(3, 4);
        assert_eq!(&values[..12], expected.as_slice());
        assert_eq!(&values[12..], expected.as_slice());
    }

    #[test]
    fn test_sequence_longer_than_table_fails() {
        let device = Default::default();
        let pe = PositionalEncodingConfig::new(4, 2).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 3>::zeros([1, 5, 2], &device);
        let err = pe.forward(x).unwrap_err();
        assert!(matches!(err, MelodyError::SequenceTooLong { len: 5, max: 4 }));
    }
}
