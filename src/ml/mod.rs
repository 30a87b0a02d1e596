// ============================================================
// Layer 5 - ML / Model Layer (Burn)
// ============================================================
// All of the tensor code lives here. The domain and data layers
// only hand over plain id vectors and batches.
//
// What's in this layer:
//
//   positional.rs    sinusoidal position table
//   attention.rs     multi-head attention with padding and
//                    causal masks
//   feed_forward.rs  position-wise two-layer network (ReLU)
//   encoder.rs       embedding + positions + N encoder layers
//   decoder.rs       embedding + positions + N decoder layers
//                    (masked self-attention, cross-attention)
//   model.rs         the encoder-decoder Transformer with its
//                    vocabulary projection
//   loss.rs          cross-entropy that ignores padding
//   trainer.rs       Adam training loop over the DataLoader
//   generator.rs     autoregressive melody generation
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need

pub mod positional;
pub mod attention;
pub mod feed_forward;
pub mod encoder;
pub mod decoder;

/// Encoder-decoder Transformer
pub mod model;

/// Padding-aware cross-entropy
pub mod loss;

/// Training loop
pub mod trainer;

/// Autoregressive melody generation
pub mod generator;

#[cfg(test)]
pub(crate) type TestBackend = burn::backend::NdArray;

#[cfg(test)]
pub(crate) type TestAutodiffBackend = burn::backend::Autodiff<burn::backend::NdArray>;
