//! heka CLI: preprocess knowledge-graph triples and train DSConvE.

use std::path::PathBuf;

use candle_core::Device;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use heka::artifact::{self, EvalArtifact, TrainArtifact};
use heka::model::ModelConfig;
use heka::train::{TrainConfig, Trainer};

#[derive(Parser)]
#[command(name = "heka", version, about = "Convolutional knowledge-graph link prediction")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build preprocessing artifacts from raw triple files.
    Preprocess {
        #[command(subcommand)]
        action: PreprocessAction,
    },

    /// Train the DSConvE model against preprocessed artifacts.
    Train {
        /// Training artifact (from `preprocess train`).
        train_artifact: PathBuf,

        /// Validation/test artifact (from `preprocess valid`).
        valid_artifact: PathBuf,

        /// Run name; checkpoints go to `checkpoint-<NAME>/`.
        #[arg(long, default_value = "")]
        name: String,

        /// Keys per mini-batch.
        #[arg(long, default_value = "256")]
        batch_size: usize,

        /// Training epochs.
        #[arg(long, default_value = "90")]
        epochs: usize,

        /// Label smoothing factor.
        #[arg(long, default_value = "0.1")]
        label_smooth: f32,

        /// AdamW learning rate.
        #[arg(long, default_value = "0.003")]
        lr: f64,

        /// Shuffle seed for reproducible epochs.
        #[arg(long)]
        seed: Option<u64>,

        /// Evaluate and checkpoint every N epochs.
        #[arg(long, default_value = "1")]
        eval_every: usize,
    },
}

#[derive(Subcommand)]
enum PreprocessAction {
    /// Index a training triple file and build the multi-label dataset.
    Train {
        /// Raw triples, one `subject<TAB>relation<TAB>object` per line.
        triples: PathBuf,

        /// Output artifact path.
        #[arg(long, default_value = "train.heka")]
        out: PathBuf,
    },

    /// Index a validation/test triple file against a training vocabulary.
    Valid {
        /// Training artifact whose vocabulary to index against.
        train_artifact: PathBuf,

        /// Raw evaluation triples.
        triples: PathBuf,

        /// Output artifact path.
        #[arg(long, default_value = "valid.heka")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Preprocess { action } => match action {
            PreprocessAction::Train { triples, out } => {
                let art = artifact::preprocess_train(&triples).into_diagnostic()?;
                artifact::save(&art, &out).into_diagnostic()?;
                println!(
                    "Wrote {}: {} entities, {} relations, {} triples, {} (s, r) keys",
                    out.display(),
                    art.vocab.entity_count(),
                    art.vocab.relation_count(),
                    art.triples.len(),
                    art.dataset.len()
                );
            }
            PreprocessAction::Valid {
                train_artifact,
                triples,
                out,
            } => {
                let train: TrainArtifact = artifact::load(&train_artifact).into_diagnostic()?;
                let art = artifact::preprocess_eval(&train.vocab, &triples).into_diagnostic()?;
                artifact::save(&art, &out).into_diagnostic()?;
                println!("Wrote {}: {} triples", out.display(), art.triples.len());
            }
        },

        Commands::Train {
            train_artifact,
            valid_artifact,
            name,
            batch_size,
            epochs,
            label_smooth,
            lr,
            seed,
            eval_every,
        } => {
            let train: TrainArtifact = artifact::load(&train_artifact).into_diagnostic()?;
            let valid: EvalArtifact = artifact::load(&valid_artifact).into_diagnostic()?;

            let cfg = TrainConfig {
                batch_size,
                epochs,
                label_smooth,
                lr,
                seed,
                eval_every,
                checkpoint_dir: Some(heka::train::checkpoint_dir_for(&name)),
            };

            let mut trainer =
                Trainer::new(&train, ModelConfig::default(), cfg, &Device::Cpu).into_diagnostic()?;
            let report = trainer.run(&train, &valid).into_diagnostic()?;
            println!("Final validation: {report}");
        }
    }

    Ok(())
}
