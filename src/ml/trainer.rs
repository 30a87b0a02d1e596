// ============================================================
// Layer 5 - Training Loop
// ============================================================
// Teacher-forced training with Burn's DataLoader and Adam.
//
//   per batch:  logits = model(encoder_input, decoder_input)
//               loss   = masked_cross_entropy(logits, labels)
//               grads  = loss.backward()
//               model  = adam.step(lr, model, grads)
//
// Key Burn insight:
//   - Training uses MyBackend (Autodiff<Wgpu>) for gradients
//   - model.valid() returns the model on the inner backend (Wgpu)
//     with dropout disabled, which is what generation runs on
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{Context, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::{MelodyBatch, MelodyBatcher}, dataset::MelodyDataset};
use crate::domain::error::{MelodyError, MelodyResult};
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::model::Transformer;

pub type MyBackend      = burn::backend::Autodiff<burn::backend::Wgpu>;
pub type MyInnerBackend = burn::backend::Wgpu;

/// Adam with beta1 0.9, beta2 0.999 and epsilon 1e-7.
pub fn adam_optimizer<B: AutodiffBackend>() -> impl Optimizer<Transformer<B>, B> {
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    AdamConfig::new()
        .with_beta_1(0.9)
        .with_beta_2(0.999)
        .with_epsilon(1e-7)
        .init::<B, Transformer<B>>()
}

/// Owns the model and the optimizer state for one training run.
pub struct MelodyTrainer<B: AutodiffBackend, O: Optimizer<Transformer<B>, B>> {
    model: Transformer<B>,
    optim: O,
    lr:    f64,
}

impl<B: AutodiffBackend, O: Optimizer<Transformer<B>, B>> MelodyTrainer<B, O> {
    pub fn new(model: Transformer<B>, optim: O, lr: f64) -> Self {
        Self { model, optim, lr }
    }

    /// Forward, backward and one optimizer update. Returns the loss
    /// measured before the update.
    pub fn train_step(&mut self, batch: MelodyBatch<B>) -> MelodyResult<f64> {
        let loss = self.model.forward_loss(batch)?;
        let value: f64 = loss.clone().into_scalar().elem::<f64>();

        let grads = GradientsParams::from_grads(loss.backward(), &self.model);
        self.model = self.optim.step(self.lr, self.model.clone(), grads);
        Ok(value)
    }

    /// Run one pass over `batches`. Degenerate batches are skipped and
    /// counted; any other error stops training. An epoch in which no
    /// batch could be trained fails with `DegenerateBatch`.
    pub fn train_epoch<I>(&mut self, epoch: usize, batches: I) -> MelodyResult<EpochMetrics>
    where
        I: IntoIterator<Item = MelodyBatch<B>>,
    {
        let mut loss_sum = 0.0f64;
        let mut trained  = 0usize;
        let mut skipped  = 0usize;

        for (index, batch) in batches.into_iter().enumerate() {
            match self.train_step(batch) {
                Ok(loss) => {
                    loss_sum += loss;
                    trained  += 1;
                    tracing::info!("Epoch {} Batch {} Loss {:.4}", epoch, index + 1, loss);
                }
                Err(MelodyError::DegenerateBatch) => {
                    skipped += 1;
                    tracing::warn!("Epoch {} Batch {}: all labels are padding, skipped", epoch, index + 1);
                }
                Err(e) => return Err(e),
            }
        }

        if trained == 0 {
            tracing::error!("Epoch {}: no trainable batch out of {}", epoch, skipped);
            return Err(MelodyError::DegenerateBatch);
        }
        Ok(EpochMetrics::new(epoch, loss_sum, trained, skipped))
    }

    pub fn train(
        &mut self,
        epochs:  usize,
        loader:  &dyn DataLoader<MelodyBatch<B>>,
        metrics: Option<&MetricsLogger>,
    ) -> Result<Vec<EpochMetrics>> {
        let mut history = Vec::with_capacity(epochs);
        let mut best_loss = f64::INFINITY;

        for epoch in 1..=epochs {
            let summary = self
                .train_epoch(epoch, loader.iter())
                .with_context(|| format!("training epoch {epoch}"))?;

            println!(
                "Epoch {:>3}/{} | loss={:.4} | batches={} | skipped={}",
                epoch, epochs, summary.mean_loss, summary.batches, summary.skipped,
            );
            if summary.is_improvement(best_loss) {
                best_loss = summary.mean_loss;
                tracing::info!("Epoch {}: new best loss {:.4}", epoch, best_loss);
            }
            if let Some(logger) = metrics {
                logger.log(&summary)?;
            }
            history.push(summary);
        }

        tracing::info!("Training complete!");
        Ok(history)
    }

    pub fn into_model(self) -> Transformer<B> {
        self.model
    }
}

/// Build the model and data loader from `cfg`, then train on `device`.
pub fn train_loop<B: AutodiffBackend>(
    cfg:        &TrainConfig,
    vocab_size: usize,
    dataset:    MelodyDataset,
    device:     &B::Device,
    metrics:    Option<&MetricsLogger>,
) -> Result<(Transformer<B>, Vec<EpochMetrics>)> {
    B::seed(cfg.rng_seed);

    // ── Build model ───────────────────────────────────────────────────────────
    let model: Transformer<B> = cfg
        .model_config(vocab_size)
        .init(device)
        .context("building the transformer")?;
    tracing::info!("Model ready: {} layers, d_model={}", cfg.num_layers, cfg.d_model);

    // ── Training data loader ──────────────────────────────────────────────────
    let loader = DataLoaderBuilder::new(MelodyBatcher::<B>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.rng_seed)
        .num_workers(1)
        .build(dataset);

    let mut trainer = MelodyTrainer::new(model, adam_optimizer::<B>(), cfg.lr);
    let history = trainer.train(cfg.epochs, loader.as_ref(), metrics)?;
    Ok((trainer.into_model(), history))
}

/// Train on the default WGPU device and return the model ready for
/// inference (inner backend, dropout off).
pub fn run_training(
    cfg:        &TrainConfig,
    vocab_size: usize,
    dataset:    MelodyDataset,
    metrics:    Option<&MetricsLogger>,
) -> Result<(Transformer<MyInnerBackend>, Vec<EpochMetrics>)> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    let (model, history) = train_loop::<MyBackend>(cfg, vocab_size, dataset, &device, metrics)?;
    Ok((model.valid(), history))
}
