// ============================================================
// Layer 5 - Decoder
// ============================================================
// One decoder layer (post-norm):
//
//   a = LayerNorm(x + Dropout(SelfAttention(x, causal | pad_mask)))
//   b = LayerNorm(a + Dropout(CrossAttention(a, memory, memory_pad)))
//   y = LayerNorm(b + Dropout(FFN(b)))
//
// The causal mask stops position i from looking at i+1.. during
// training, which keeps teacher forcing honest. The stack is the
// same embedding → positions → dropout → layers chain as the
// encoder.

use burn::{
    nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig, LayerNorm, LayerNormConfig},
    prelude::*,
};

use crate::domain::error::MelodyResult;
use crate::ml::attention::{causal_mask, AttentionInput, MultiHeadAttention, MultiHeadAttentionConfig};
use crate::ml::encoder::LAYER_NORM_EPSILON;
use crate::ml::feed_forward::{FeedForward, FeedForwardConfig};
use crate::ml::positional::{PositionalEncoding, PositionalEncodingConfig};

#[derive(Config, Debug)]
pub struct DecoderConfig {
    pub num_layers:    usize,
    pub d_model:       usize,
    pub num_heads:     usize,
    pub d_feedforward: usize,
    pub vocab_size:    usize,
    pub max_positions: usize,
    #[config(default = 0.1)]
    pub dropout:       f64,
}

impl DecoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> MelodyResult<Decoder<B>> {
        let layers = (0..self.num_layers)
            .map(|_| self.build_layer(device))
            .collect::<MelodyResult<Vec<_>>>()?;

        Ok(Decoder {
            embedding:  EmbeddingConfig::new(self.vocab_size, self.d_model).init(device),
            positional: PositionalEncodingConfig::new(self.max_positions, self.d_model).init(device),
            dropout:    DropoutConfig::new(self.dropout).init(),
            layers,
            d_model:    self.d_model,
        })
    }

    fn build_layer<B: Backend>(&self, device: &B::Device) -> MelodyResult<DecoderLayer<B>> {
        let attention = || {
            MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
                .with_dropout(self.dropout)
                .init(device)
        };
        let norm = || {
            LayerNormConfig::new(self.d_model)
                .with_epsilon(LAYER_NORM_EPSILON)
                .init(device)
        };
        Ok(DecoderLayer {
            self_attn:  attention()?,
            cross_attn: attention()?,
            ffn:        FeedForwardConfig::new(self.d_model, self.d_feedforward).init(device),
            norm1:      norm(),
            norm2:      norm(),
            norm3:      norm(),
            dropout:    DropoutConfig::new(self.dropout).init(),
        })
    }
}

/// Masks for one decoder pass.
#[derive(Debug, Clone)]
pub struct DecoderMasks<B: Backend> {
    /// Causal mask, `[batch, seq_t, seq_t]`.
    pub look_ahead: Tensor<B, 3, Bool>,
    /// Padding in the decoder input, `[batch, seq_t]`.
    pub target_pad: Tensor<B, 2, Bool>,
    /// Padding in the encoder input, `[batch, seq_s]`.
    pub memory_pad: Tensor<B, 2, Bool>,
}

impl<B: Backend> DecoderMasks<B> {
    pub fn new(target_pad: Tensor<B, 2, Bool>, memory_pad: Tensor<B, 2, Bool>) -> Self {
        let [batch_size, seq_len] = target_pad.dims();
        let look_ahead = causal_mask::<B>(batch_size, seq_len, &target_pad.device());
        Self { look_ahead, target_pad, memory_pad }
    }
}

#[derive(Module, Debug)]
pub struct DecoderLayer<B: Backend> {
    self_attn:  MultiHeadAttention<B>,
    cross_attn: MultiHeadAttention<B>,
    ffn:        FeedForward<B>,
    norm1:      LayerNorm<B>,
    norm2:      LayerNorm<B>,
    norm3:      LayerNorm<B>,
    dropout:    Dropout,
}

impl<B: Backend> DecoderLayer<B> {
    pub fn forward(&self, x: Tensor<B, 3>, memory: Tensor<B, 3>, masks: &DecoderMasks<B>) -> Tensor<B, 3> {
        let attn = self.self_attn.forward(
            AttentionInput::self_attn(x.clone())
                .mask_attn(masks.look_ahead.clone())
                .mask_pad(masks.target_pad.clone()),
        );
        let x = self.norm1.forward(x + self.dropout.forward(attn));

        let cross = self.cross_attn.forward(
            AttentionInput::cross(x.clone(), memory).mask_pad(masks.memory_pad.clone()),
        );
        let x = self.norm2.forward(x + self.dropout.forward(cross));

        let ffn = self.ffn.forward(x.clone());
        self.norm3.forward(x + self.dropout.forward(ffn))
    }
}

#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    embedding:  Embedding<B>,
    positional: PositionalEncoding<B>,
    dropout:    Dropout,
    layers:     Vec<DecoderLayer<B>>,
    d_model:    usize,
}

impl<B: Backend> Decoder<B> {
    /// ids: [batch, seq_t], memory: [batch, seq_s, d_model] → [batch, seq_t, d_model]
    pub fn forward(
        &self,
        ids:    Tensor<B, 2, Int>,
        memory: Tensor<B, 3>,
        masks:  &DecoderMasks<B>,
    ) -> MelodyResult<Tensor<B, 3>> {
        let x = self.embedding.forward(ids) * (self.d_model as f64).sqrt();
        let mut x = self.dropout.forward(self.positional.forward(x)?);
        for layer in &self.layers {
            x = layer.forward(x, memory.clone(), masks);
        }
        Ok(x)
    }

    pub fn max_positions(&self) -> usize {
        self.positional.max_positions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::attention::padding_mask;
    use crate::ml::TestBackend;
    use burn::tensor::Distribution;

    fn decoder() -> Decoder<TestBackend> {
        DecoderConfig::new(2, 8, 2, 16, 10, 8)
            .with_dropout(0.0)
            .init(&Default::default())
            .unwrap()
    }

    fn decode(
        dec:    &Decoder<TestBackend>,
        ids:    Tensor<TestBackend, 2, Int>,
        memory: Tensor<TestBackend, 3>,
    ) -> Tensor<TestBackend, 3> {
        let [batch, seq_s, _] = memory.dims();
        let memory_pad = Tensor::<TestBackend, 2, Int>::ones([batch, seq_s], &memory.device()).equal_elem(0);
        let masks = DecoderMasks::new(padding_mask(&ids, 0), memory_pad);
        dec.forward(ids, memory, &masks).unwrap()
    }

    #[test]
    fn test_output_follows_target_length() {
        let device = Default::default();
        let dec = decoder();
        let memory = Tensor::<TestBackend, 3>::random([2, 5, 8], Distribution::Normal(0.0, 1.0), &device);
        let ids = Tensor::<TestBackend, 2, Int>::from_ints([[1, 2, 3], [4, 0, 0]], &device);
        assert_eq!(decode(&dec, ids, memory).dims(), [2, 3, 8]);
    }

    #[test]
    fn test_earlier_positions_ignore_later_tokens() {
        let device = Default::default();
        let dec = decoder();
        let memory = Tensor::<TestBackend, 3>::random([1, 4, 8], Distribution::Normal(0.0, 1.0), &device);

        let a = decode(&dec, Tensor::from_ints([[1, 2, 3]], &device), memory.clone());
        let b = decode(&dec, Tensor::from_ints([[1, 2, 7]], &device), memory);

        let prefix_a = a.clone().slice([0..1, 0..2, 0..8]);
        let prefix_b = b.clone().slice([0..1, 0..2, 0..8]);
        let diff: f32 = (prefix_a - prefix_b).abs().max().into_scalar();
        assert!(diff < 1e-4);

        let last: f32 = (a.slice([0..1, 2..3, 0..8]) - b.slice([0..1, 2..3, 0..8]))
            .abs()
            .max()
            .into_scalar();
        assert!(last > 1e-6);
    }

    #[test]
    fn test_max_positions() {
        assert_eq!(decoder().max_positions(), 8);
    }
}
