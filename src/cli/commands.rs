// ============================================================
// Layer 1 - CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `vocab`, and all
// their configurable flags.
//
// clap's derive macros generate the --help text, the errors
// for bad values and the string → number conversions.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use crate::application::train_use_case::{TrainConfig, DEFAULT_START};

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the melody transformer, then generate a melody from --start
    Train(TrainArgs),

    /// Print the vocabulary built from a dataset
    Vocab(VocabArgs),
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// JSON file holding an array of comma-separated melodies
    #[arg(long, default_value = "data/dataset.json")]
    pub dataset: String,

    /// Number of full passes through the training pairs
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Layers in each of the encoder and decoder stacks
    #[arg(long, default_value_t = 2)]
    pub num_layers: usize,

    /// Hidden dimension of the transformer (d_model in the paper)
    #[arg(long, default_value_t = 64)]
    pub d_model: usize,

    /// Attention heads; d_model must be divisible by num_heads
    #[arg(long, default_value_t = 2)]
    pub num_heads: usize,

    /// Inner dimension of the feed-forward network
    #[arg(long, default_value_t = 128)]
    pub d_feedforward: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// Positions covered by the positional encoding; longer melodies
    /// are truncated
    #[arg(long, default_value_t = 100)]
    pub max_positions: usize,

    /// Maximum length of the generated melody, seed included
    #[arg(long, default_value_t = 50)]
    pub max_length: usize,

    /// Sample with this temperature instead of picking the most
    /// likely note
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Terminate every training melody with an end token so
    /// generation can stop on its own
    #[arg(long)]
    pub end_token: bool,

    /// Seed for parameter init, shuffling and sampling
    #[arg(long, default_value_t = 42)]
    pub rng_seed: u64,

    /// Write per-epoch metrics to <DIR>/metrics.csv
    #[arg(long)]
    pub metrics_dir: Option<String>,

    /// Comma-separated seed melody for generation
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_START.map(String::from))]
    pub start: Vec<String>,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            dataset:       a.dataset,
            epochs:        a.epochs,
            batch_size:    a.batch_size,
            lr:            a.lr,
            num_layers:    a.num_layers,
            d_model:       a.d_model,
            num_heads:     a.num_heads,
            d_feedforward: a.d_feedforward,
            dropout:       a.dropout,
            max_positions: a.max_positions,
            max_length:    a.max_length,
            temperature:   a.temperature,
            end_token:     a.end_token,
            rng_seed:      a.rng_seed,
            metrics_dir:   a.metrics_dir,
            start:         a.start.into_iter().map(|t| t.trim().to_string()).collect(),
        }
    }
}

/// All arguments for the `vocab` command
#[derive(Args, Debug)]
pub struct VocabArgs {
    #[arg(long, default_value = "data/dataset.json")]
    pub dataset: String,

    /// Include the end token, as `train --end-token` would
    #[arg(long)]
    pub end_token: bool,
}
