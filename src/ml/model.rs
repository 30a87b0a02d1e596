use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
};

use crate::data::batcher::MelodyBatch;
use crate::domain::error::{MelodyError, MelodyResult};
use crate::domain::vocabulary::PAD_ID;
use crate::ml::attention::padding_mask;
use crate::ml::decoder::{Decoder, DecoderConfig, DecoderMasks};
use crate::ml::encoder::{Encoder, EncoderConfig};
use crate::ml::loss::masked_cross_entropy;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally, do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct TransformerConfig {
    pub num_layers:        usize,
    pub d_model:           usize,
    pub num_heads:         usize,
    pub d_feedforward:     usize,
    pub input_vocab_size:  usize,
    pub target_vocab_size: usize,
    #[config(default = 100)]
    pub max_positions_encoder: usize,
    #[config(default = 100)]
    pub max_positions_decoder: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl TransformerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> MelodyResult<Transformer<B>> {
        self.validate()?;

        let encoder = EncoderConfig::new(
            self.num_layers, self.d_model, self.num_heads, self.d_feedforward,
            self.input_vocab_size, self.max_positions_encoder,
        )
        .with_dropout(self.dropout)
        .init(device)?;

        let decoder = DecoderConfig::new(
            self.num_layers, self.d_model, self.num_heads, self.d_feedforward,
            self.target_vocab_size, self.max_positions_decoder,
        )
        .with_dropout(self.dropout)
        .init(device)?;

        let output = LinearConfig::new(self.d_model, self.target_vocab_size).init(device);
        Ok(Transformer { encoder, decoder, output })
    }

    fn validate(&self) -> MelodyResult<()> {
        let fail = |msg: String| Err(MelodyError::Configuration(msg));
        if self.num_layers == 0 {
            return fail("num_layers must be at least 1".into());
        }
        if self.d_model == 0 || self.d_feedforward == 0 {
            return fail("d_model and d_feedforward must be positive".into());
        }
        if self.num_heads == 0 || self.d_model % self.num_heads != 0 {
            return fail(format!(
                "d_model ({}) must be divisible by num_heads ({})",
                self.d_model, self.num_heads
            ));
        }
        if self.input_vocab_size < 2 || self.target_vocab_size < 2 {
            return fail("vocabulary must hold the padding id and at least one token".into());
        }
        if self.max_positions_encoder == 0 || self.max_positions_decoder == 0 {
            return fail("max positions must be positive".into());
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return fail(format!("dropout must be in [0, 1), got {}", self.dropout));
        }
        Ok(())
    }
}

/// Encoder output kept around so generation can run the encoder once.
#[derive(Debug, Clone)]
pub struct EncoderMemory<B: Backend> {
    pub output:   Tensor<B, 3>,
    pub mask_pad: Tensor<B, 2, Bool>,
}

#[derive(Module, Debug)]
pub struct Transformer<B: Backend> {
    encoder: Encoder<B>,
    decoder: Decoder<B>,
    output:  Linear<B>,
}

impl<B: Backend> Transformer<B> {
    /// input: [batch, seq_s], target: [batch, seq_t] → logits [batch, seq_t, vocab]
    pub fn forward(&self, input: Tensor<B, 2, Int>, target: Tensor<B, 2, Int>) -> MelodyResult<Tensor<B, 3>> {
        let memory = self.encode(input)?;
        self.decode(target, &memory)
    }

    pub fn encode(&self, input: Tensor<B, 2, Int>) -> MelodyResult<EncoderMemory<B>> {
        let mask_pad = padding_mask(&input, PAD_ID);
        let output = self.encoder.forward(input, mask_pad.clone())?;
        Ok(EncoderMemory { output, mask_pad })
    }

    pub fn decode(&self, target: Tensor<B, 2, Int>, memory: &EncoderMemory<B>) -> MelodyResult<Tensor<B, 3>> {
        let masks = DecoderMasks::new(padding_mask(&target, PAD_ID), memory.mask_pad.clone());
        let hidden = self.decoder.forward(target, memory.output.clone(), &masks)?;
        Ok(self.output.forward(hidden))
    }

    /// Teacher-forced loss over one batch, padding excluded.
    pub fn forward_loss(&self, batch: MelodyBatch<B>) -> MelodyResult<Tensor<B, 1>> {
        let logits = self.forward(batch.encoder_input, batch.decoder_input)?;
        masked_cross_entropy(logits, batch.labels, PAD_ID)
    }

    /// Longest decoder sequence the position table covers.
    pub fn max_target_positions(&self) -> usize {
        self.decoder.max_positions()
    }
}
