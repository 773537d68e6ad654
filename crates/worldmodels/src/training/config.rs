//! Trainer configuration.

use crate::vae::VaeConfig;
use crate::{Result, WorldModelError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tch::Device;

/// Configuration for the VAE trainer and its entry point
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Model hyperparameters
    pub vae: VaeConfig,

    // Training
    /// Number of training epochs
    pub n_epochs: usize,
    /// Observations per batch
    pub batch_size: usize,
    /// Fraction of the dataset held out for validation
    pub val_fraction: f64,
    /// Validation batches run before the first epoch
    pub num_sanity_val_steps: usize,

    // Learning rate schedule
    /// Multiplier applied when the monitored loss plateaus
    pub lr_factor: f64,
    /// Epochs without improvement before reducing the learning rate
    pub lr_patience: usize,
    /// Lower bound for the learning rate
    pub min_lr: f64,

    // Paths
    /// Where final weights are written
    pub pth_folder: PathBuf,
    /// Observation `.npy` file; a synthetic dataset is used when absent
    pub data_path: Option<PathBuf>,
    /// Directory for diagnostic images
    pub log_dir: Option<PathBuf>,

    /// Device to train on ("cpu" or "cuda")
    #[serde(skip, default = "default_device")]
    pub device: Device,

    // Random seed
    pub seed: i64,
}

fn default_device() -> Device {
    Device::Cpu
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            vae: VaeConfig::default(),

            n_epochs: 10,
            batch_size: 32,
            val_fraction: 0.1,
            num_sanity_val_steps: 2,

            lr_factor: 0.1,
            lr_patience: 10,
            min_lr: 1e-8,

            pth_folder: PathBuf::from("checkpoints/vae"),
            data_path: None,
            log_dir: None,

            device: Device::Cpu,
            seed: 42,
        }
    }
}

impl TrainConfig {
    /// Read a JSON config; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(config)
    }

    /// Set number of epochs
    pub fn with_epochs(mut self, n_epochs: usize) -> Self {
        self.n_epochs = n_epochs;
        self
    }

    /// Set learning rate
    pub fn with_lr(mut self, lr: f64) -> Self {
        self.vae.lr = lr;
        self
    }

    /// Set batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.vae.validate()?;
        if self.batch_size == 0 {
            return Err(WorldModelError::InvalidConfig(
                "batch_size must be positive".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.val_fraction) {
            return Err(WorldModelError::InvalidConfig(format!(
                "val_fraction must be in [0, 1), got {}",
                self.val_fraction
            )));
        }
        if !(self.lr_factor > 0.0 && self.lr_factor < 1.0) {
            return Err(WorldModelError::InvalidConfig(format!(
                "lr_factor must be in (0, 1), got {}",
                self.lr_factor
            )));
        }
        if !(self.min_lr >= 0.0) {
            return Err(WorldModelError::InvalidConfig(format!(
                "min_lr must be non-negative, got {}",
                self.min_lr
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = TrainConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lr_factor, 0.1);
        assert_eq!(config.min_lr, 1e-8);
    }

    #[test]
    fn test_builders() {
        let config = TrainConfig::default()
            .with_epochs(3)
            .with_lr(5e-4)
            .with_batch_size(16);
        assert_eq!(config.n_epochs, 3);
        assert_eq!(config.vae.lr, 5e-4);
        assert_eq!(config.batch_size, 16);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(TrainConfig::default().with_batch_size(0).validate().is_err());

        let mut config = TrainConfig::default();
        config.val_fraction = 1.0;
        assert!(config.validate().is_err());

        let mut config = TrainConfig::default();
        config.lr_factor = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"n_epochs": 4, "pth_folder": "out/vae", "vae": {"latent_size": 8}}"#,
        )
        .unwrap();

        let config = TrainConfig::from_json_file(&path).unwrap();
        assert_eq!(config.n_epochs, 4);
        assert_eq!(config.pth_folder, PathBuf::from("out/vae"));
        assert_eq!(config.vae.latent_size, 8);
        assert_eq!(config.vae.img_channels, 3);
        assert_eq!(config.batch_size, 32);
    }
}
