// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train` - trains on a JSON melody dataset, then prints a
//                melody generated from the start sequence
//   2. `vocab` - prints the vocabulary a dataset produces
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, TrainArgs, VocabArgs};

#[derive(Parser, Debug)]
#[command(
    name = "melody-transformer",
    version = "0.1.0",
    about = "Train an encoder-decoder transformer on melodies, then generate new ones."
)]
pub struct Cli {
    /// The subcommand to run (train or vocab)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Vocab(args) => run_vocab(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on dataset: {}", args.dataset);

    let outcome = TrainUseCase::new(args.into()).execute()?;

    if let Some(last) = outcome.history.last() {
        println!("Final loss: {:.4}", last.mean_loss);
    }
    println!("\nGenerated melody ({} notes):", outcome.melody.len());
    println!("{}", outcome.melody.join(", "));
    Ok(())
}

fn run_vocab(args: VocabArgs) -> Result<()> {
    use crate::application::vocab_use_case::VocabUseCase;

    let report = VocabUseCase::new(args.dataset, args.end_token).execute()?;

    println!("Melodies:         {}", report.melodies);
    println!("Vocabulary size:  {}", report.size);
    println!("Longest melody:   {} notes", report.max_melody);
    for (id, token) in &report.entries {
        println!("{id:>5}  {token}");
    }
    Ok(())
}
