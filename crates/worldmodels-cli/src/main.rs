//! World Models CLI
//!
//! Command-line interface for collecting observations and training and
//! evaluating the VAE.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use worldmodels::checkpoint::load_checkpoint;
use worldmodels::data::{Datamodule, ObservationDataset};
use worldmodels::log::{CompositeLogger, ConsoleLogger, ImageDirLogger};
use worldmodels::rollout::collect;
use worldmodels::training::{TrainConfig, VaeTrainer};
use worldmodels::vae::LatentEncoder;

#[derive(Parser)]
#[command(name = "wm")]
#[command(version, about = "World Models - VAE vision component in Rust", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the VAE
    Train {
        /// JSON training config
        #[arg(long)]
        config: Option<PathBuf>,

        /// Observation .npy file (collected from --env when absent)
        #[arg(long)]
        data: Option<PathBuf>,

        /// Environment used for a synthetic dataset
        #[arg(long, default_value = "bouncing_ball")]
        env: String,

        /// Observations to collect for a synthetic dataset
        #[arg(long, default_value = "512")]
        samples: usize,

        /// Number of epochs
        #[arg(long)]
        epochs: Option<usize>,

        /// Learning rate
        #[arg(long)]
        lr: Option<f64>,

        /// Batch size
        #[arg(long)]
        batch_size: Option<usize>,

        /// Checkpoint directory
        #[arg(long)]
        out: Option<PathBuf>,

        /// Directory for reconstruction images
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Train on the CPU even when CUDA is available
        #[arg(long)]
        cpu: bool,
    },

    /// Collect observations with a random policy
    Collect {
        /// Environment name
        #[arg(default_value = "bouncing_ball")]
        env: String,

        /// Number of observations
        #[arg(long, default_value = "1000")]
        steps: usize,

        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Output .npy file
        #[arg(long)]
        out: PathBuf,
    },

    /// Report the reconstruction loss of a trained VAE
    Eval {
        /// Checkpoint directory
        #[arg(long)]
        checkpoint: PathBuf,

        /// Observation .npy file (collected from --env when absent)
        #[arg(long)]
        data: Option<PathBuf>,

        /// Environment used for a synthetic dataset
        #[arg(long, default_value = "bouncing_ball")]
        env: String,

        /// Observations to collect for a synthetic dataset
        #[arg(long, default_value = "128")]
        samples: usize,

        /// Batch size
        #[arg(long, default_value = "32")]
        batch_size: usize,
    },

    /// List available environments
    List,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            config,
            data,
            env,
            samples,
            epochs,
            lr,
            batch_size,
            out,
            log_dir,
            cpu,
        } => {
            let mut config = match config {
                Some(path) => TrainConfig::from_json_file(&path)
                    .with_context(|| format!("reading config {}", path.display()))?,
                None => TrainConfig::default(),
            };
            if let Some(n) = epochs {
                config = config.with_epochs(n);
            }
            if let Some(lr) = lr {
                config = config.with_lr(lr);
            }
            if let Some(b) = batch_size {
                config = config.with_batch_size(b);
            }
            if let Some(out) = out {
                config.pth_folder = out;
            }
            if data.is_some() {
                config.data_path = data;
            }
            if log_dir.is_some() {
                config.log_dir = log_dir;
            }
            config.device = select_device(cpu);
            train(config, &env, samples)?;
        }
        Commands::Collect {
            env,
            steps,
            seed,
            out,
        } => {
            let dataset = synthetic_dataset(&env, steps, seed)?;
            dataset.save_npy(&out)?;
            println!("Wrote {} observations to {}", dataset.len(), out.display());
        }
        Commands::Eval {
            checkpoint,
            data,
            env,
            samples,
            batch_size,
        } => {
            eval(&checkpoint, data.as_deref(), &env, samples, batch_size)?;
        }
        Commands::List => {
            list_envs();
        }
    }

    Ok(())
}

fn select_device(force_cpu: bool) -> tch::Device {
    if !force_cpu && tch::Cuda::is_available() {
        tracing::info!("Using CUDA");
        tch::Device::Cuda(0)
    } else {
        tracing::info!("Using CPU");
        tch::Device::Cpu
    }
}

fn synthetic_dataset(env_name: &str, steps: usize, seed: u64) -> Result<ObservationDataset> {
    let Some(mut env) = worldmodels_envs::make(env_name) else {
        bail!("Unknown environment: {}", env_name);
    };
    tracing::info!(env = env_name, steps, seed, "Collecting observations");
    Ok(collect(env.as_mut(), steps, seed)?)
}

fn load_dataset(data: Option<&Path>, env_name: &str, samples: usize, seed: u64) -> Result<ObservationDataset> {
    match data {
        Some(path) => ObservationDataset::from_npy(path)
            .with_context(|| format!("loading observations from {}", path.display())),
        None => synthetic_dataset(env_name, samples, seed),
    }
}

fn train(config: TrainConfig, env_name: &str, samples: usize) -> Result<()> {
    tracing::info!(
        epochs = config.n_epochs,
        batch_size = config.batch_size,
        lr = config.vae.lr,
        out = %config.pth_folder.display(),
        "Starting training"
    );

    let dataset = load_dataset(config.data_path.as_deref(), env_name, samples, config.seed as u64)?;
    let data = Datamodule::from_config(dataset, &config)?;

    let mut logger = CompositeLogger::new(vec![Box::new(ConsoleLogger::new())]);
    if let Some(dir) = &config.log_dir {
        logger.add(Box::new(ImageDirLogger::new(dir.join("images"))));
        #[cfg(feature = "tensorboard")]
        logger.add(Box::new(worldmodels::log::TensorBoardLogger::new(dir)));
    }

    let pth_folder = config.pth_folder.clone();
    let mut trainer = VaeTrainer::new(config)?.with_logger(Box::new(logger));
    let summary = trainer.fit(&data)?;
    let path = trainer.save(&pth_folder)?;
    trainer.close();

    println!(
        "Trained {} epochs ({} steps), final lr {:.2e}",
        summary.epochs, summary.global_step, summary.final_lr
    );
    if let Some(loss) = summary.last_val_loss {
        println!("Validation loss: {:.4}", loss);
    }
    println!("Saved weights to {}", path.display());
    Ok(())
}

fn eval(checkpoint: &Path, data: Option<&Path>, env_name: &str, samples: usize, batch_size: usize) -> Result<()> {
    tracing::info!(checkpoint = %checkpoint.display(), "Starting evaluation");

    let (_vs, vae, metadata) = load_checkpoint(checkpoint, select_device(false))
        .with_context(|| format!("loading checkpoint {}", checkpoint.display()))?;
    let dataset = load_dataset(data, env_name, samples, 1)?;

    let mut total = 0.0;
    let mut total_recon = 0.0;
    let mut items = 0usize;
    for batch in dataset.batches(batch_size, false) {
        let obs = batch.to_device(vae.device()).obs;
        vae.check_input(&obs)?;
        let record = tch::no_grad(|| {
            let (recon, params) = vae.forward(&obs);
            vae.loss_function(&recon, &obs, &params).record()
        });
        total += record.loss;
        total_recon += record.recon;
        items += batch.len();
    }
    if items == 0 {
        bail!("No observations to evaluate");
    }

    println!("Checkpoint: epoch {}, step {}", metadata.epoch, metadata.global_step);
    println!("Observations: {}", items);
    println!("Mean loss per observation: {:.4}", total / items as f64);
    println!("Mean reconstruction loss per observation: {:.4}", total_recon / items as f64);
    Ok(())
}

fn list_envs() {
    println!("Available environments:");
    println!();
    println!("  bouncing_ball   Ball pushed around a 64x64 RGB arena");
    println!("                  Action: 2-d continuous acceleration");
    println!();
    println!("Use `wm collect <env> --out obs.npy` to build a dataset.");
}
