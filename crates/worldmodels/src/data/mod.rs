//! Observation data for VAE training.
//!
//! Provides:
//! - `ObservationDataset` - `[N, C, H, W]` observations, loadable from `.npy`
//! - `Batch` - the unit handed to the trainer, exposing `obs`
//! - `Datamodule` - a train/validation pair with a batch size

mod dataset;

pub use dataset::{Batch, BatchIter, ObservationDataset};

use crate::training::TrainConfig;
use crate::{Result, WorldModelError};

/// Training and validation splits plus batching settings.
#[derive(Debug)]
pub struct Datamodule {
    pub train: ObservationDataset,
    pub val: ObservationDataset,
    pub batch_size: usize,
}

impl Datamodule {
    pub fn new(train: ObservationDataset, val: ObservationDataset, batch_size: usize) -> Result<Self> {
        if train.is_empty() {
            return Err(WorldModelError::EmptyDataset("training split".into()));
        }
        Ok(Self {
            train,
            val,
            batch_size,
        })
    }

    /// Split `dataset` with the config's `val_fraction` and `batch_size`.
    pub fn from_config(dataset: ObservationDataset, config: &TrainConfig) -> Result<Self> {
        let (train, val) = dataset.split(config.val_fraction);
        tracing::info!(
            train = train.len(),
            val = val.len(),
            batch_size = config.batch_size,
            "Prepared datamodule"
        );
        Self::new(train, val, config.batch_size)
    }

    /// Shuffled training batches.
    pub fn train_batches(&self) -> BatchIter {
        self.train.batches(self.batch_size, true)
    }

    /// Validation batches in dataset order.
    pub fn val_batches(&self) -> BatchIter {
        self.val.batches(self.batch_size, false)
    }
}
