use burn::{prelude::*, tensor::activation::log_softmax};

use crate::domain::error::{MelodyError, MelodyResult};

/// Mean cross-entropy over the positions whose label is not `pad_id`.
///
/// logits: [batch, seq, vocab], labels: [batch, seq]
///
///   loss = -Σ mask · log p(label) / Σ mask
///
/// A batch whose labels are all padding has no defined loss and is
/// reported as `DegenerateBatch` instead of dividing by zero.
pub fn masked_cross_entropy<B: Backend>(
    logits: Tensor<B, 3>,
    labels: Tensor<B, 2, Int>,
    pad_id: u32,
) -> MelodyResult<Tensor<B, 1>> {
    let [batch_size, seq_len, _] = logits.dims();

    let mask = labels.clone().equal_elem(pad_id as i64).bool_not();
    let count: i64 = mask.clone().int().sum().into_scalar().elem::<i64>();
    if count == 0 {
        return Err(MelodyError::DegenerateBatch);
    }

    let picked = log_softmax(logits, 2)
        .gather(2, labels.unsqueeze_dim::<3>(2))
        .reshape([batch_size, seq_len]);

    let total = (picked * mask.float()).sum();
    Ok(total.neg() / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::TestBackend;

    fn scalar(t: Tensor<TestBackend, 1>) -> f32 {
        t.into_scalar()
    }

    #[test]
    fn test_all_padding_is_degenerate() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 3>::zeros([2, 3, 5], &device);
        let labels = Tensor::<TestBackend, 2, Int>::zeros([2, 3], &device);
        let err = masked_cross_entropy(logits, labels, 0).unwrap_err();
        assert!(matches!(err, MelodyError::DegenerateBatch));
    }

    #[test]
    fn test_matches_hand_computation() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 3>::from_floats([[[1.0, 2.0, 3.0], [0.0, 0.0, 0.0]]], &device);
        let labels = Tensor::<TestBackend, 2, Int>::from_ints([[2, 0]], &device);

        let loss = scalar(masked_cross_entropy(logits, labels, 0).unwrap());
        let e = std::f32::consts::E;
        let expected = -(3.0 - (e + e * e + e * e * e).ln());
        assert!((loss - expected).abs() < 1e-5, "loss {loss} vs {expected}");
    }

    #[test]
    fn test_padded_positions_do_not_contribute() {
        let device = Default::default();
        let labels = Tensor::<TestBackend, 2, Int>::from_ints([[1, 0]], &device);

        let a = Tensor::<TestBackend, 3>::from_floats([[[0.5, 1.5, -1.0], [0.0, 0.0, 0.0]]], &device);
        let b = Tensor::<TestBackend, 3>::from_floats([[[0.5, 1.5, -1.0], [9.0, -4.0, 2.0]]], &device);

        let loss_a = scalar(masked_cross_entropy(a, labels.clone(), 0).unwrap());
        let loss_b = scalar(masked_cross_entropy(b, labels, 0).unwrap());
        assert!((loss_a - loss_b).abs() < 1e-6);
    }

    #[test]
    fn test_mean_over_real_tokens() {
        let device = Default::default();
        // Uniform logits: every real position costs ln(vocab)
        let logits = Tensor::<TestBackend, 3>::zeros([2, 3, 4], &device);
        let labels = Tensor::<TestBackend, 2, Int>::from_ints([[1, 2, 0], [3, 0, 0]], &device);
        let loss = scalar(masked_cross_entropy(logits, labels, 0).unwrap());
        assert!((loss - 4f32.ln()).abs() < 1e-5);
    }
}
