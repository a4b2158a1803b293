//! like_xception CLI
//!
//! Partition the cats vs. dogs images, train the Xception-style classifier,
//! score the saved checkpoint on the test split, or print the layer summary.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use like_xception::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use like_xception::config::ExperimentConfig;
use like_xception::dataset::partition::{make_partitions, partition_stats, PartitionOutcome, PartitionStats};
use like_xception::dataset::Split;
use like_xception::model::{ModelSummary, XceptionLikeConfig};
use like_xception::training::{evaluate, fit};
use like_xception::utils::format_duration;
use like_xception::utils::logging::{init_logging, LogConfig};

/// Cats vs. dogs classification with an Xception-style network
#[derive(Parser, Debug)]
#[command(name = "like_xception")]
#[command(version)]
#[command(about = "Xception-style cats vs. dogs classifier with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, default_value = "false", conflicts_with = "verbose")]
    quiet: bool,

    /// TOML experiment configuration; missing fields keep their defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy the extracted images into train/validation/test directories
    Partition {
        /// Directory holding cat.{i}.jpg and dog.{i}.jpg
        #[arg(short, long)]
        source_dir: Option<PathBuf>,

        /// Destination of the partitioned tree
        #[arg(short, long)]
        base_dir: Option<PathBuf>,
    },

    /// Partition if needed, then train with best-only checkpointing
    Train {
        #[arg(short, long)]
        source_dir: Option<PathBuf>,

        #[arg(short, long)]
        base_dir: Option<PathBuf>,

        #[arg(short, long)]
        epochs: Option<usize>,

        #[arg(long)]
        batch_size: Option<usize>,

        #[arg(short, long)]
        learning_rate: Option<f64>,

        /// Directory for the checkpoint and history
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Random flip/rotation/zoom on training images
        #[arg(long, default_value = "false")]
        augment: bool,

        /// Scale pixels to [0, 1]
        #[arg(long, default_value = "false")]
        rescale: bool,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Score the saved checkpoint on the test split
    Evaluate {
        #[arg(short, long)]
        base_dir: Option<PathBuf>,

        /// Directory holding the checkpoint
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Print layer output shapes and parameter counts
    Summary {
        #[arg(long)]
        image_size: Option<usize>,
    },

    /// Write the effective configuration as TOML
    ExportConfig {
        #[arg(short, long, default_value = "like_xception.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else if cli.quiet {
        LogConfig::quiet()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    print_banner();

    let mut config = match &cli.config {
        Some(path) => ExperimentConfig::load(path)
            .with_context(|| format!("Failed to load configuration {:?}", path))?,
        None => ExperimentConfig::default(),
    };

    match cli.command {
        Commands::Partition {
            source_dir,
            base_dir,
        } => {
            if let Some(dir) = source_dir {
                config.data.source_dir = dir;
            }
            if let Some(dir) = base_dir {
                config.data.base_dir = dir;
            }
            cmd_partition(&config)?;
        }

        Commands::Train {
            source_dir,
            base_dir,
            epochs,
            batch_size,
            learning_rate,
            output_dir,
            augment,
            rescale,
            seed,
        } => {
            if let Some(dir) = source_dir {
                config.data.source_dir = dir;
            }
            if let Some(dir) = base_dir {
                config.data.base_dir = dir;
            }
            if let Some(e) = epochs {
                config.training.epochs = e;
            }
            if let Some(b) = batch_size {
                config.data.batch_size = b;
            }
            if let Some(lr) = learning_rate {
                config.training.learning_rate = lr;
            }
            if let Some(dir) = output_dir {
                config.training.output_dir = dir;
            }
            if let Some(s) = seed {
                config.seed = s;
            }
            config.data.augment |= augment;
            config.data.rescale |= rescale;
            config.validate().context("Invalid configuration")?;

            cmd_partition(&config)?;
            cmd_train(&config)?;
        }

        Commands::Evaluate {
            base_dir,
            output_dir,
        } => {
            if let Some(dir) = base_dir {
                config.data.base_dir = dir;
            }
            if let Some(dir) = output_dir {
                config.training.output_dir = dir;
            }
            cmd_evaluate(&config)?;
        }

        Commands::Summary { image_size } => {
            if let Some(size) = image_size {
                config.data.image_size = size;
            }
            cmd_summary(&config)?;
        }

        Commands::ExportConfig { output } => {
            config
                .save(&output)
                .with_context(|| format!("Failed to write {:?}", output))?;
            println!("  Configuration written to {:?}", output);
        }
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ╔══════════════════════════════════════════════════════════╗
 ║   like_xception                                          ║
 ║   Cats vs. Dogs with separable residual convolutions     ║
 ╚══════════════════════════════════════════════════════════╝
  "#
        .green()
    );
}

fn print_partition_stats(stats: &PartitionStats) {
    for split in Split::ALL {
        let per_class: Vec<String> = stats
            .counts
            .get(split.dir_name())
            .map(|c| c.iter().map(|(k, v)| format!("{k}: {v}")).collect())
            .unwrap_or_default();
        println!("  {:<11} {}", split.to_string(), per_class.join(", "));
    }
}

fn cmd_partition(config: &ExperimentConfig) -> Result<()> {
    println!("{}", "Partitioning Dataset...".cyan());
    println!("  Source: {:?}", config.data.source_dir);
    println!("  Output: {:?}", config.data.base_dir);

    let outcome = make_partitions(&config.data).context("Failed to partition dataset")?;
    let stats = match outcome {
        PartitionOutcome::Created(stats) => stats,
        PartitionOutcome::Skipped => {
            println!("  {} already exists, nothing copied", "Skipped:".yellow());
            partition_stats(&config.data)?
        }
    };
    print_partition_stats(&stats);
    println!();
    Ok(())
}

fn cmd_train(config: &ExperimentConfig) -> Result<()> {
    info!("Backend: {}", backend_name());
    println!("{}", "Initializing Training...".green().bold());

    let device = default_device();
    let summary = fit::<TrainingBackend>(config, &device).context("Training failed")?;

    println!("  Epochs run:   {}", summary.epochs);
    println!("  History:      {:?}", summary.history_path);
    println!("  Total time:   {}", format_duration(summary.total_secs));
    Ok(())
}

fn cmd_evaluate(config: &ExperimentConfig) -> Result<()> {
    println!("{}", "Evaluating Checkpoint on Test Split...".cyan());
    let device = default_device();
    let report = evaluate::<DefaultBackend>(config, &device).context("Evaluation failed")?;

    println!();
    println!("  Test loss:     {:.4}", report.loss);
    println!("  Test accuracy: {:.2}%", report.accuracy * 100.0);
    println!("  Precision:     {:.4}", report.confusion.precision());
    println!("  Recall:        {:.4}", report.confusion.recall());
    println!("  F1:            {:.4}", report.confusion.f1());
    println!();
    println!("{}", report.confusion.display(&config.data.categories));
    Ok(())
}

fn cmd_summary(config: &ExperimentConfig) -> Result<()> {
    let model_config = XceptionLikeConfig::from_model_config(&config.model);
    let summary = ModelSummary::from_config(&model_config, config.data.image_size)?;
    println!("{}", "Model Summary".cyan().bold());
    println!("{summary}");
    Ok(())
}
