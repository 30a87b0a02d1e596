// ============================================================
// Layer 5 - Multi-Head Attention
// ============================================================
// Scaled dot-product attention over n_heads subspaces:
//
//   Q, K, V  = x_q Wq, x_k Wk, x_v Wv          [batch, seq, d_model]
//   split    → [batch, n_heads, seq, d_k]       d_k = d_model / n_heads
//   scores   = Q K^T / sqrt(d_k)                [batch, n_heads, seq_q, seq_k]
//   masked   = scores with disallowed slots set to min_float
//   context  = softmax(masked) V                [batch, n_heads, seq_q, d_k]
//   output   = concat(heads) Wo                 [batch, seq_q, d_model]
//
// Three uses inside the model:
//   encoder self-attention   padding mask on the keys
//   decoder self-attention   causal mask + padding mask
//   decoder cross-attention  queries from the decoder, keys and
//                            values from the encoder output,
//                            encoder padding mask
//
// Masks use burn's convention: `true` means "do not attend".
// Built on plain Burn tensors rather than nn::attention so a bad
// head count comes back as a Configuration error instead of a panic.
// min_float is finite so a fully masked row turns into a
// uniform softmax instead of NaN.

use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::softmax,
};

use crate::domain::error::{MelodyError, MelodyResult};

#[derive(Config, Debug)]
pub struct MultiHeadAttentionConfig {
    pub d_model: usize,
    pub n_heads: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
    #[config(default = -1.0e4)]
    pub min_float: f64,
}

impl MultiHeadAttentionConfig {
    /// Fails when `d_model` cannot be split evenly across the heads.
    pub fn init<B: Backend>(&self, device: &B::Device) -> MelodyResult<MultiHeadAttention<B>> {
        if self.n_heads == 0 || self.d_model % self.n_heads != 0 {
            return Err(MelodyError::Configuration(format!(
                "d_model ({}) must be divisible by the number of heads ({})",
                self.d_model, self.n_heads
            )));
        }
        let linear = || LinearConfig::new(self.d_model, self.d_model).init(device);
        Ok(MultiHeadAttention {
            query:     linear(),
            key:       linear(),
            value:     linear(),
            output:    linear(),
            dropout:   DropoutConfig::new(self.dropout).init(),
            n_heads:   self.n_heads,
            d_k:       self.d_model / self.n_heads,
            min_float: self.min_float,
        })
    }
}

/// Inputs for one attention call, built like burn's `MhaInput`.
#[derive(Debug, Clone)]
pub struct AttentionInput<B: Backend> {
    query:     Tensor<B, 3>,
    key:       Tensor<B, 3>,
    value:     Tensor<B, 3>,
    mask_pad:  Option<Tensor<B, 2, Bool>>,
    mask_attn: Option<Tensor<B, 3, Bool>>,
}

impl<B: Backend> AttentionInput<B> {
    /// Query, key and value are all `x`.
    pub fn self_attn(x: Tensor<B, 3>) -> Self {
        Self {
            query:     x.clone(),
            key:       x.clone(),
            value:     x,
            mask_pad:  None,
            mask_attn: None,
        }
    }

    /// Queries from one sequence, keys and values from another.
    pub fn cross(query: Tensor<B, 3>, memory: Tensor<B, 3>) -> Self {
        Self {
            query,
            key:       memory.clone(),
            value:     memory,
            mask_pad:  None,
            mask_attn: None,
        }
    }

    /// Key padding mask, `[batch, seq_k]`.
    pub fn mask_pad(mut self, mask: Tensor<B, 2, Bool>) -> Self {
        self.mask_pad = Some(mask);
        self
    }

    /// Position mask such as the causal mask, `[batch, seq_q, seq_k]`.
    pub fn mask_attn(mut self, mask: Tensor<B, 3, Bool>) -> Self {
        self.mask_attn = Some(mask);
        self
    }
}

#[derive(Module, Debug)]
pub struct MultiHeadAttention<B: Backend> {
    query:     Linear<B>,
    key:       Linear<B>,
    value:     Linear<B>,
    output:    Linear<B>,
    dropout:   Dropout,
    n_heads:   usize,
    d_k:       usize,
    min_float: f64,
}

impl<B: Backend> MultiHeadAttention<B> {
    /// Returns `[batch, seq_q, d_model]` whatever the key/value length.
    pub fn forward(&self, input: AttentionInput<B>) -> Tensor<B, 3> {
        let [batch_size, seq_q, d_model] = input.query.dims();

        let query = self.split_heads(self.query.forward(input.query));
        let key   = self.split_heads(self.key.forward(input.key));
        let value = self.split_heads(self.value.forward(input.value));

        let mut scores = query.matmul(key.transpose()) / (self.d_k as f64).sqrt();

        if let Some(mask_pad) = input.mask_pad {
            let [batch, seq_k] = mask_pad.dims();
            scores = scores.mask_fill(mask_pad.reshape([batch, 1, 1, seq_k]), self.min_float);
        }
        if let Some(mask_attn) = input.mask_attn {
            let [batch, rows, cols] = mask_attn.dims();
            scores = scores.mask_fill(mask_attn.reshape([batch, 1, rows, cols]), self.min_float);
        }

        let weights = self.dropout.forward(softmax(scores, 3));
        let context = weights
            .matmul(value)
            .swap_dims(1, 2)
            .reshape([batch_size, seq_q, d_model]);

        self.output.forward(context)
    }

    /// `[batch, seq, d_model]` → `[batch, n_heads, seq, d_k]`
    fn split_heads(&self, x: Tensor<B, 3>) -> Tensor<B, 4> {
        let [batch_size, seq_len, _] = x.dims();
        x.reshape([batch_size, seq_len, self.n_heads, self.d_k])
            .swap_dims(1, 2)
    }
}

/// `true` where the id equals the padding id, `[batch, seq]`.
pub fn padding_mask<B: Backend>(ids: &Tensor<B, 2, Int>, pad_id: u32) -> Tensor<B, 2, Bool> {
    ids.clone().equal_elem(pad_id as i64)
}

/// Causal (look-ahead) mask: position i may attend to 0..=i only.
pub fn causal_mask<B: Backend>(batch_size: usize, seq_len: usize, device: &B::Device) -> Tensor<B, 3, Bool> {
    burn::nn::attention::generate_autoregressive_mask::<B>(batch_size, seq_len, device)
}
