//! Main VAE trainer.

use super::config::TrainConfig;
use super::diagnostics::side_by_side;
use super::optimizer::{LrControl, TorchOptimizer};
use super::scheduler::{PlateauMode, ReduceLROnPlateau};
use crate::checkpoint::{save_checkpoint, CheckpointMetadata};
use crate::data::{Batch, Datamodule};
use crate::log::{MetricLogger, NoOpLogger};
use crate::vae::{LossRecord, Vae};
use crate::{Result, WorldModelError};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tch::{nn, Kind, Tensor};

/// Where the trainer is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrainerPhase {
    /// Model built, no step taken yet
    Uninitialized,
    /// Last call was a training step
    TrainingStep,
    /// Last call was a validation step
    ValidatingStep,
    /// An epoch (training or validation) was just closed
    EpochBoundary,
}

/// Result of closing a validation pass.
#[derive(Debug)]
pub struct ValidationSummary {
    /// Mean of the per-batch validation losses
    pub avg_val_loss: f64,
    /// Number of validation batches aggregated
    pub num_batches: usize,
    /// True for the pre-training sanity pass
    pub sanity: bool,
    /// Reconstruction grids handed to the logger (empty for the sanity pass)
    pub images: Vec<Tensor>,
}

/// Outcome of `fit`.
#[derive(Clone, Debug)]
pub struct FitSummary {
    pub epochs: u64,
    pub global_step: u64,
    pub last_train_loss: Option<f64>,
    pub last_val_loss: Option<f64>,
    pub final_lr: f64,
}

/// Trainer for the VAE.
///
/// Owns the parameters, optimizer and learning rate schedule. Every step
/// takes `&mut self`, so the one optimizer update per training step is
/// never observed half-applied.
pub struct VaeTrainer {
    /// Configuration
    config: TrainConfig,
    /// Parameters of encoder and decoder
    vs: nn::VarStore,
    /// Model
    vae: Vae,
    /// Adam
    optimizer: TorchOptimizer,
    /// Plateau LR schedule
    scheduler: ReduceLROnPlateau,
    /// Metric and image sink
    logger: Box<dyn MetricLogger>,
    /// Lifecycle state
    phase: TrainerPhase,
    /// No validation epoch has finished yet
    is_sanity: bool,
    /// Optimizer steps taken
    global_step: u64,
    /// Training epochs closed
    epoch: u64,
    /// Losses of the training epoch in progress
    train_losses: Vec<f64>,
    /// Losses of the validation pass in progress
    val_losses: Vec<f64>,
    /// Grids of the validation pass in progress
    val_images: Vec<Tensor>,
    /// Last averaged validation loss
    last_val_loss: Option<f64>,
}

impl VaeTrainer {
    /// Build model, optimizer and schedule from `config`.
    pub fn new(config: TrainConfig) -> Result<Self> {
        config.validate()?;
        tch::manual_seed(config.seed);

        let vs = nn::VarStore::new(config.device);
        let vae = Vae::new(&vs.root(), config.vae.clone());
        let optimizer = TorchOptimizer::adam(&vs, config.vae.lr, config.vae.wd)?;
        let scheduler =
            ReduceLROnPlateau::new(PlateauMode::Min, config.lr_factor, config.lr_patience)
                .min_lr(config.min_lr);

        tracing::info!(
            img_channels = config.vae.img_channels,
            latent_size = config.vae.latent_size,
            lr = config.vae.lr,
            wd = config.vae.wd,
            params = num_parameters(&vs),
            "Created VAE trainer"
        );

        Ok(Self {
            config,
            vs,
            vae,
            optimizer,
            scheduler,
            logger: Box::new(NoOpLogger),
            phase: TrainerPhase::Uninitialized,
            is_sanity: true,
            global_step: 0,
            epoch: 0,
            train_losses: Vec::new(),
            val_losses: Vec::new(),
            val_images: Vec::new(),
            last_val_loss: None,
        })
    }

    /// Set the metric and image logger
    pub fn with_logger(mut self, logger: Box<dyn MetricLogger>) -> Self {
        self.logger = logger;
        self
    }

    fn prepare(&self, batch: &Batch) -> Result<Tensor> {
        let obs = batch.to_device(self.config.device).obs.to_kind(Kind::Float);
        self.vae.check_input(&obs)?;
        Ok(obs)
    }

    /// One forward/backward/update cycle on `batch`.
    ///
    /// The returned losses are those of the forward pass before the update.
    pub fn training_step(&mut self, batch: &Batch) -> Result<LossRecord> {
        let obs = self.prepare(batch)?;
        self.phase = TrainerPhase::TrainingStep;

        let (recon, params) = self.vae.forward(&obs);
        let loss = self.vae.loss_function(&recon, &obs, &params);
        self.optimizer.backward_step(&loss.loss);
        self.global_step += 1;

        let record = loss.record();
        self.train_losses.push(record.loss);
        self.logger.log_metrics(&loss_metrics(&record), self.global_step);
        Ok(record)
    }

    /// Close a training epoch and feed its mean loss to the LR schedule.
    ///
    /// Returns the mean training loss.
    pub fn training_epoch_end(&mut self) -> Result<f64> {
        if self.train_losses.is_empty() {
            return Err(WorldModelError::EmptyDataset(
                "training epoch produced no batches".into(),
            ));
        }
        let mean_loss = mean(&self.train_losses);
        self.train_losses.clear();
        self.epoch += 1;
        self.phase = TrainerPhase::EpochBoundary;

        if self.scheduler.step_with_metric(&mut self.optimizer, mean_loss) {
            tracing::info!(
                epoch = self.epoch,
                lr = self.optimizer.lr(),
                "Reducing learning rate on plateau"
            );
        }

        self.logger.log_scalar("train_loss_epoch", mean_loss, self.global_step);
        self.logger.log_scalar("lr", self.optimizer.lr(), self.global_step);
        Ok(mean_loss)
    }

    /// Forward pass and loss without gradient tracking.
    ///
    /// Outside the sanity pass, also renders `(input | reconstruction)`
    /// grids until `log_images` have been collected for this pass.
    pub fn validation_step(&mut self, batch: &Batch) -> Result<LossRecord> {
        let obs = self.prepare(batch)?;
        self.phase = TrainerPhase::ValidatingStep;

        let cap = if self.is_sanity {
            0
        } else {
            self.config.vae.log_images
        };

        let (record, images) = tch::no_grad(|| {
            let (recon, params) = self.vae.forward(&obs);
            let record = self.vae.loss_function(&recon, &obs, &params).record();

            let room = cap.saturating_sub(self.val_images.len());
            let count = room.min(obs.size()[0] as usize);
            let images: Vec<Tensor> = (0..count as i64)
                .map(|i| side_by_side(&obs.get(i), &recon.get(i)))
                .collect();
            (record, images)
        });

        self.val_images.extend(images);
        self.val_losses.push(record.loss);
        Ok(record)
    }

    /// Aggregate the validation pass and hand its images to the logger.
    ///
    /// The first call after construction is the sanity pass: it logs
    /// nothing and clears the sanity flag.
    pub fn validation_epoch_end(&mut self) -> Result<ValidationSummary> {
        if self.val_losses.is_empty() {
            return Err(WorldModelError::EmptyDataset(
                "validation pass produced no batches".into(),
            ));
        }
        let avg_val_loss = mean(&self.val_losses);
        let num_batches = self.val_losses.len();
        self.val_losses.clear();

        let mut images = std::mem::take(&mut self.val_images);
        images.truncate(self.config.vae.log_images);

        let sanity = self.is_sanity;
        if sanity {
            images.clear();
        } else {
            tracing::info!("Logged {} images for each category.", images.len());
            self.logger.log_images("images", &images, self.global_step);
        }
        self.is_sanity = false;
        self.phase = TrainerPhase::EpochBoundary;

        if !sanity {
            self.logger
                .log_scalar("avg_val_loss_vae", avg_val_loss, self.global_step);
            self.last_val_loss = Some(avg_val_loss);
        }

        Ok(ValidationSummary {
            avg_val_loss,
            num_batches,
            sanity,
            images,
        })
    }

    /// Run the sanity pass and `n_epochs` train/validate cycles.
    pub fn fit(&mut self, data: &Datamodule) -> Result<FitSummary> {
        let start_time = Instant::now();

        if self.config.num_sanity_val_steps > 0 && !data.val.is_empty() {
            for batch in data.val_batches().take(self.config.num_sanity_val_steps) {
                self.validation_step(&batch)?;
            }
            let summary = self.validation_epoch_end()?;
            tracing::info!(loss = summary.avg_val_loss, "Sanity check passed");
        }

        let pb = ProgressBar::new(self.config.n_epochs as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut last_train_loss = None;
        for _ in 0..self.config.n_epochs {
            for batch in data.train_batches() {
                self.training_step(&batch)?;
            }
            let train_loss = self.training_epoch_end()?;
            last_train_loss = Some(train_loss);

            let val_loss = if data.val.is_empty() {
                None
            } else {
                for batch in data.val_batches() {
                    self.validation_step(&batch)?;
                }
                Some(self.validation_epoch_end()?.avg_val_loss)
            };

            pb.set_message(format!(
                "Loss: {:.4} Val: {} LR: {:.2e}",
                train_loss,
                val_loss.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v)),
                self.optimizer.lr()
            ));
            pb.inc(1);

            tracing::debug!(
                epoch = self.epoch,
                step = self.global_step,
                train_loss,
                val_loss,
                "Epoch complete"
            );
        }
        pb.finish_with_message("Training complete");

        tracing::info!(
            epochs = self.epoch,
            steps = self.global_step,
            elapsed = ?start_time.elapsed(),
            "Training finished"
        );

        Ok(FitSummary {
            epochs: self.epoch,
            global_step: self.global_step,
            last_train_loss,
            last_val_loss: self.last_val_loss,
            final_lr: self.optimizer.lr(),
        })
    }

    /// Save weights and metadata into `dir`.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let metadata = CheckpointMetadata::new(self.config.vae.clone(), self.epoch, self.global_step)
            .with_val_loss(self.last_val_loss);
        save_checkpoint(&self.vs, dir, &metadata)
    }

    pub fn vae(&self) -> &Vae {
        &self.vae
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn phase(&self) -> TrainerPhase {
        self.phase
    }

    pub fn is_sanity(&self) -> bool {
        self.is_sanity
    }

    /// Get current global step
    pub fn global_step(&self) -> u64 {
        self.global_step
    }

    /// Get current epoch
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Current learning rate
    pub fn lr(&self) -> f64 {
        self.optimizer.lr()
    }

    pub fn close(&self) {
        self.logger.close();
    }
}

fn loss_metrics(record: &LossRecord) -> HashMap<String, f64> {
    let mut metrics = HashMap::new();
    metrics.insert("loss".to_string(), record.loss);
    metrics.insert("recon".to_string(), record.recon);
    metrics.insert("kld".to_string(), record.kld);
    metrics
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn num_parameters(vs: &nn::VarStore) -> i64 {
    vs.trainable_variables().iter().map(|t| t.numel() as i64).sum()
}
