// ============================================================
// Layer 5 - Encoder
// ============================================================
// One encoder layer (post-norm, Vaswani et al. 2017):
//
//   a = LayerNorm(x + Dropout(SelfAttention(x, pad_mask)))
//   y = LayerNorm(a + Dropout(FFN(a)))
//
// The stack:
//
//   ids  [batch, seq]
//    → Embedding * sqrt(d_model)
//    → + positional encoding
//    → Dropout
//    → N × EncoderLayer
//    → [batch, seq, d_model]

use burn::{
    nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig, LayerNorm, LayerNormConfig},
    prelude::*,
};

use crate::domain::error::MelodyResult;
use crate::ml::attention::{AttentionInput, MultiHeadAttention, MultiHeadAttentionConfig};
use crate::ml::feed_forward::{FeedForward, FeedForwardConfig};
use crate::ml::positional::{PositionalEncoding, PositionalEncodingConfig};

pub(crate) const LAYER_NORM_EPSILON: f64 = 1e-6;

#[derive(Config, Debug)]
pub struct EncoderConfig {
    pub num_layers:    usize,
    pub d_model:       usize,
    pub num_heads:     usize,
    pub d_feedforward: usize,
    pub vocab_size:    usize,
    pub max_positions: usize,
    #[config(default = 0.1)]
    pub dropout:       f64,
}

impl EncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> MelodyResult<Encoder<B>> {
        let layers = (0..self.num_layers)
            .map(|_| self.build_layer(device))
            .collect::<MelodyResult<Vec<_>>>()?;

        Ok(Encoder {
            embedding:  EmbeddingConfig::new(self.vocab_size, self.d_model).init(device),
            positional: PositionalEncodingConfig::new(self.max_positions, self.d_model).init(device),
            dropout:    DropoutConfig::new(self.dropout).init(),
            layers,
            d_model:    self.d_model,
        })
    }

    fn build_layer<B: Backend>(&self, device: &B::Device) -> MelodyResult<EncoderLayer<B>> {
        let self_attn = MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device)?;
        let norm = || {
            LayerNormConfig::new(self.d_model)
                .with_epsilon(LAYER_NORM_EPSILON)
                .init(device)
        };
        Ok(EncoderLayer {
            self_attn,
            ffn:     FeedForwardConfig::new(self.d_model, self.d_feedforward).init(device),
            norm1:   norm(),
            norm2:   norm(),
            dropout: DropoutConfig::new(self.dropout).init(),
        })
    }
}

#[derive(Module, Debug)]
pub struct EncoderLayer<B: Backend> {
    self_attn: MultiHeadAttention<B>,
    ffn:       FeedForward<B>,
    norm1:     LayerNorm<B>,
    norm2:     LayerNorm<B>,
    dropout:   Dropout,
}

impl<B: Backend> EncoderLayer<B> {
    pub fn forward(&self, x: Tensor<B, 3>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn = self
            .self_attn
            .forward(AttentionInput::self_attn(x.clone()).mask_pad(mask_pad));
        let x = self.norm1.forward(x + self.dropout.forward(attn));

        let ffn = self.ffn.forward(x.clone());
        self.norm2.forward(x + self.dropout.forward(ffn))
    }
}

#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    embedding:  Embedding<B>,
    positional: PositionalEncoding<B>,
    dropout:    Dropout,
    layers:     Vec<EncoderLayer<B>>,
    d_model:    usize,
}

impl<B: Backend> Encoder<B> {
    /// ids: [batch, seq] → [batch, seq, d_model]
    pub fn forward(
        &self,
        ids:      Tensor<B, 2, Int>,
        mask_pad: Tensor<B, 2, Bool>,
    ) -> MelodyResult<Tensor<B, 3>> {
        let x = self.embedding.forward(ids) * (self.d_model as f64).sqrt();
        let mut x = self.dropout.forward(self.positional.forward(x)?);
        for layer in &self.layers {
            x = layer.forward(x, mask_pad.clone());
        }
        Ok(x)
    }
}
