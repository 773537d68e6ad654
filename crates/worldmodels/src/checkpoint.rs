//! Saving and restoring trained VAE weights.
//!
//! A checkpoint is a directory holding `vae.pt` (the `VarStore`) and
//! `vae.json` (the `VaeConfig` plus training progress), so the model can be
//! rebuilt without knowing its hyperparameters up front.

use crate::vae::{Vae, VaeConfig};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tch::{nn, Device};

pub const WEIGHTS_FILE: &str = "vae.pt";
pub const METADATA_FILE: &str = "vae.json";

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CheckpointMetadata {
    pub epoch: u64,
    pub global_step: u64,
    /// Last averaged validation loss, if validation ran
    pub val_loss: Option<f64>,
    pub config: VaeConfig,
    pub version: String,
}

impl CheckpointMetadata {
    pub fn new(config: VaeConfig, epoch: u64, global_step: u64) -> Self {
        Self {
            epoch,
            global_step,
            val_loss: None,
            config,
            version: crate::VERSION.to_string(),
        }
    }

    pub fn with_val_loss(mut self, val_loss: Option<f64>) -> Self {
        self.val_loss = val_loss;
        self
    }
}

/// Write weights and metadata into `dir`, creating it if needed.
///
/// Returns the path of the weights file.
pub fn save_checkpoint(
    vs: &nn::VarStore,
    dir: impl AsRef<Path>,
    metadata: &CheckpointMetadata,
) -> Result<PathBuf> {
    let start_time = Instant::now();
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let pt_path = dir.join(WEIGHTS_FILE);
    tracing::info!(path = %pt_path.display(), "Saving checkpoint");
    vs.save(&pt_path)?;

    let file = std::fs::File::create(dir.join(METADATA_FILE))?;
    serde_json::to_writer_pretty(file, metadata)?;

    tracing::info!(epoch = metadata.epoch, elapsed = ?start_time.elapsed(), "Checkpoint saved");
    Ok(pt_path)
}

/// Rebuild a `Vae` from a checkpoint directory.
///
/// The returned `VarStore` owns the weights and must outlive the model.
pub fn load_checkpoint(
    dir: impl AsRef<Path>,
    device: Device,
) -> Result<(nn::VarStore, Vae, CheckpointMetadata)> {
    let dir = dir.as_ref();
    tracing::info!(path = %dir.display(), "Loading checkpoint");

    let file = std::fs::File::open(dir.join(METADATA_FILE))?;
    let metadata: CheckpointMetadata = serde_json::from_reader(std::io::BufReader::new(file))?;
    metadata.config.validate()?;

    let mut vs = nn::VarStore::new(device);
    let vae = Vae::new(&vs.root(), metadata.config.clone());
    vs.load(dir.join(WEIGHTS_FILE))?;

    tracing::info!(
        epoch = metadata.epoch,
        step = metadata.global_step,
        "Metadata restored"
    );
    Ok((vs, vae, metadata))
}
