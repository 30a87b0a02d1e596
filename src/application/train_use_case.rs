// ============================================================
// Layer 2 - TrainUseCase
// ============================================================
// Orchestrates the full pipeline in order:
//
//   Step 1: Load melodies from JSON      (Layer 4 - data)
//   Step 2: Build the vocabulary         (Layer 3 - domain)
//   Step 3: Build padded training pairs  (Layer 4 - data)
//   Step 4: Wrap them in a Burn dataset  (Layer 4 - data)
//   Step 5: Run the training loop        (Layer 5 - ml)
//   Step 6: Generate from the start seed (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{Context, Result};
use burn::{module::AutodiffModule, prelude::*, tensor::backend::AutodiffBackend};
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::MelodyDataset,
    loader::JsonMelodyLoader,
    preprocessor::MelodyPreprocessor,
};
use crate::domain::error::{MelodyError, MelodyResult};
use crate::domain::traits::MelodySource;
use crate::domain::vocabulary::Vocabulary;
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::generator::{GenerationConfig, MelodyGenerator, Sampling, DEFAULT_MAX_LENGTH};
use crate::ml::model::{Transformer, TransformerConfig};
use crate::ml::trainer::{run_training, train_loop};

pub const DEFAULT_START: [&str; 4] = ["C4-1.0", "D4-1.0", "E4-1.0", "C4-1.0"];

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a run. Serialisable so the exact settings
// can be logged alongside the metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub dataset:       String,
    pub epochs:        usize,
    pub batch_size:    usize,
    pub lr:            f64,
    pub num_layers:    usize,
    pub d_model:       usize,
    pub num_heads:     usize,
    pub d_feedforward: usize,
    pub dropout:       f64,
    pub max_positions: usize,
    pub max_length:    usize,
    /// Sampling temperature; greedy decoding when `None`.
    pub temperature:   Option<f32>,
    pub end_token:     bool,
    pub rng_seed:      u64,
    pub metrics_dir:   Option<String>,
    pub start:         Vec<String>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            dataset:       "data/dataset.json".to_string(),
            epochs:        10,
            batch_size:    32,
            lr:            1e-3,
            num_layers:    2,
            d_model:       64,
            num_heads:     2,
            d_feedforward: 128,
            dropout:       0.1,
            max_positions: 100,
            max_length:    DEFAULT_MAX_LENGTH,
            temperature:   None,
            end_token:     false,
            rng_seed:      42,
            metrics_dir:   None,
            start:         DEFAULT_START.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TrainConfig {
    /// Model hyperparameters for a vocabulary of `vocab_size` ids.
    /// Input and target share one vocabulary.
    pub fn model_config(&self, vocab_size: usize) -> TransformerConfig {
        TransformerConfig::new(
            self.num_layers, self.d_model, self.num_heads, self.d_feedforward,
            vocab_size, vocab_size,
        )
        .with_max_positions_encoder(self.max_positions)
        .with_max_positions_decoder(self.max_positions)
        .with_dropout(self.dropout)
    }

    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            max_length: self.max_length,
            sampling:   self.temperature.map_or(Sampling::Greedy, Sampling::Temperature),
            seed:       self.rng_seed,
        }
    }

    /// Checks that only make sense for a whole run; the model checks
    /// its own hyperparameters when it is built.
    pub fn validate(&self) -> MelodyResult<()> {
        if self.batch_size == 0 {
            return Err(MelodyError::Configuration("batch_size must be at least 1".into()));
        }
        if self.lr <= 0.0 || !self.lr.is_finite() {
            return Err(MelodyError::Configuration(format!("lr must be positive, got {}", self.lr)));
        }
        if self.max_length > self.max_positions {
            return Err(MelodyError::Configuration(format!(
                "max_length ({}) cannot exceed max_positions ({})",
                self.max_length, self.max_positions
            )));
        }
        Ok(())
    }
}

/// What a finished run hands back to the caller.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub history: Vec<EpochMetrics>,
    pub melody:  Vec<String>,
}

struct PreparedRun {
    vocabulary: Vocabulary,
    dataset:    MelodyDataset,
    metrics:    Option<MetricsLogger>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Train on the default WGPU device, then generate a melody.
    pub fn execute(&self) -> Result<TrainOutcome> {
        let run = self.prepare()?;
        let (model, history) = run_training(
            &self.config,
            run.vocabulary.len(),
            run.dataset,
            run.metrics.as_ref(),
        )?;
        let device = burn::backend::wgpu::WgpuDevice::default();
        let melody = self.generate(&model, &run.vocabulary, device)?;
        Ok(TrainOutcome { history, melody })
    }

    /// Same pipeline on any autodiff backend.
    pub fn execute_on<B: AutodiffBackend>(&self, device: &B::Device) -> Result<TrainOutcome> {
        let run = self.prepare()?;
        let (model, history) = train_loop::<B>(
            &self.config,
            run.vocabulary.len(),
            run.dataset,
            device,
            run.metrics.as_ref(),
        )?;
        let melody = self.generate(&model.valid(), &run.vocabulary, device.clone())?;
        Ok(TrainOutcome { history, melody })
    }

    fn prepare(&self) -> Result<PreparedRun> {
        let cfg = &self.config;
        cfg.validate()?;
        tracing::debug!("Train config: {}", serde_json::to_string(cfg)?);

        // ── Step 1: Load melodies ─────────────────────────────────────────────
        tracing::info!("Loading melodies from '{}'", cfg.dataset);
        let melodies = JsonMelodyLoader::new(&cfg.dataset).load_all()?;
        if melodies.is_empty() {
            anyhow::bail!("dataset '{}' contains no melodies", cfg.dataset);
        }

        // ── Step 2: Vocabulary ────────────────────────────────────────────────
        let vocabulary = Vocabulary::build(&melodies, cfg.end_token);
        tracing::info!("Vocabulary size: {} (including padding)", vocabulary.len());

        // ── Step 3 + 4: Training pairs and dataset ────────────────────────────
        let prepared = MelodyPreprocessor::new(&vocabulary, cfg.max_positions)
            .build_samples(&melodies)
            .context("building training pairs")?;
        tracing::debug!("Sequences padded to {} tokens", prepared.max_length);
        let dataset = MelodyDataset::new(prepared.samples);

        let metrics = cfg
            .metrics_dir
            .as_ref()
            .map(MetricsLogger::new)
            .transpose()?;
        if let Some(logger) = &metrics {
            tracing::info!("Writing metrics to '{}'", logger.csv_path().display());
        }

        Ok(PreparedRun { vocabulary, dataset, metrics })
    }

    // ── Step 6: Generate ──────────────────────────────────────────────────────
    fn generate<B: Backend>(
        &self,
        model:      &Transformer<B>,
        vocabulary: &Vocabulary,
        device:     B::Device,
    ) -> Result<Vec<String>> {
        let generator = MelodyGenerator::new(model, vocabulary, self.config.generation_config(), device);
        let melody = generator
            .generate(&self.config.start)
            .context("generating from the start sequence")?;
        tracing::info!("Generated {} tokens", melody.len());
        Ok(melody)
    }
}
