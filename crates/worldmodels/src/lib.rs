//! # worldmodels
//!
//! The vision component of a World Models agent, in Rust.
//!
//! ## Overview
//!
//! worldmodels provides:
//! - A convolutional VAE (`Encoder`, `Decoder`, `reparameterize`) that
//!   compresses 64x64 observations into a latent code
//! - A `VaeTrainer` with reduce-on-plateau learning rate adaptation and
//!   validation-time reconstruction grids
//! - Observation datasets backed by `.npy` files
//! - A generic `rollout` driver that consumes the VAE's `encode` operation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use worldmodels::prelude::*;
//!
//! let vs = tch::nn::VarStore::new(tch::Device::Cpu);
//! let vae = Vae::new(&vs.root(), VaeConfig::default());
//!
//! let obs = tch::Tensor::rand([8, 3, 64, 64], (tch::Kind::Float, tch::Device::Cpu));
//! let z = vae.encode(&obs)?; // [8, latent_size]
//! ```

pub mod checkpoint;
pub mod data;
pub mod env;
pub mod log;
pub mod rollout;
pub mod training;
pub mod vae;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::data::{Batch, Datamodule, ObservationDataset};
    pub use crate::env::{PixelEnv, StepResult};
    pub use crate::rollout::{rollout, Controller, Dynamics, RandomController, RolloutResult};
    pub use crate::training::{LossRecord, TrainConfig, VaeTrainer, ValidationSummary};
    pub use crate::vae::{
        reparameterize, Decoder, Encoder, LatentEncoder, LatentParams, Vae, VaeConfig, KLD_WEIGHT,
    };

    // Logging exports
    #[cfg(feature = "tensorboard")]
    pub use crate::log::TensorBoardLogger;
    pub use crate::log::{CompositeLogger, ConsoleLogger, ImageDirLogger, MetricLogger};

    // Checkpoint exports
    pub use crate::checkpoint::{load_checkpoint, save_checkpoint, CheckpointMetadata};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for the library
#[derive(Debug, thiserror::Error)]
pub enum WorldModelError {
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch { expected: Vec<i64>, actual: Vec<i64> },

    #[error("Non-finite values in {0}")]
    NonFinite(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Dataset is empty: {0}")]
    EmptyDataset(String),

    #[error("Environment error: {0}")]
    EnvError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Tensor error: {0}")]
    TensorError(#[from] tch::TchError),
}

pub type Result<T> = core::result::Result<T, WorldModelError>;
