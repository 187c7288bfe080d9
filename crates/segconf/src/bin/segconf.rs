use anyhow::Result;
use clap::{Parser, Subcommand};
use segconf::{
    backend::{EvalBackend, RunTarget, TrainingBackend},
    evaluation::{run_evaluation, EvalConfig},
    training::{run_training, TrainConfig},
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "segconf")]
#[command(about = "MC-dropout segmentation evaluation and IoU/confidence network training")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a segmentation network with Monte-Carlo dropout
    Eval {
        /// Evaluation configuration file
        #[arg(short, long)]
        config: String,

        /// Segmentation network weights
        #[arg(short, long)]
        model: Option<String>,

        /// Cityscapes dataset root
        #[arg(long)]
        data_root: Option<String>,

        /// Output directory for metrics and confidence maps
        #[arg(short, long)]
        output: Option<String>,

        /// Dataset phase (train, val, test)
        #[arg(long)]
        phase: Option<String>,

        /// Stochastic forward passes per image
        #[arg(short, long)]
        samples: Option<usize>,
    },

    /// Train the IoU/confidence network
    Train {
        /// Training configuration file
        #[arg(short, long)]
        config: String,

        /// Run name
        #[arg(short, long)]
        name: Option<String>,

        /// Root holding the training manifest
        #[arg(long)]
        data_root: Option<String>,

        /// Checkpoint root directory
        #[arg(long)]
        checkpoints_dir: Option<String>,

        /// Total optimizer steps
        #[arg(long)]
        niter: Option<usize>,

        /// Checkpoint interval in steps
        #[arg(long)]
        snapshot: Option<usize>,

        /// Learning rate
        #[arg(long)]
        lr: Option<f64>,
    },

    /// Show backend information
    Info,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let target = RunTarget::detect();

    match cli.command {
        Commands::Eval {
            config,
            model,
            data_root,
            output,
            phase,
            samples,
        } => {
            let mut config = EvalConfig::load(&config)?;
            if let Some(model) = model {
                config.model_path = model;
            }
            if let Some(data_root) = data_root {
                config.data_root = data_root;
            }
            if let Some(output) = output {
                config.eval_output_dir = output;
            }
            if let Some(phase) = phase {
                config.phase = phase;
            }
            if let Some(samples) = samples {
                config.estimator.samples = samples;
            }

            tracing::info!(%target, "starting evaluation");
            run_evaluation::<EvalBackend>(&config, target.device)?;
            Ok(())
        }

        Commands::Train {
            config,
            name,
            data_root,
            checkpoints_dir,
            niter,
            snapshot,
            lr,
        } => {
            let mut config = TrainConfig::load(&config)?;
            if let Some(name) = name {
                config.name = name;
            }
            if let Some(data_root) = data_root {
                config.data_root = data_root;
            }
            if let Some(checkpoints_dir) = checkpoints_dir {
                config.checkpoints_dir = checkpoints_dir;
            }
            if let Some(niter) = niter {
                config.niter = niter;
            }
            if let Some(snapshot) = snapshot {
                config.snapshot = snapshot;
            }
            if let Some(lr) = lr {
                config.learning_rate = lr;
            }

            tracing::info!(%target, "starting training");
            run_training::<TrainingBackend>(&config, target.device)?;
            Ok(())
        }

        Commands::Info => {
            println!("segconf Information:");
            println!("  Backend: {}", target.backend);
            println!("  Device: {:?}", target.device);
            Ok(())
        }
    }
}
