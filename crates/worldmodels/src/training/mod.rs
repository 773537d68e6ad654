//! VAE training infrastructure.
//!
//! Provides:
//! - `VaeTrainer` - step-level training and validation with a plateau schedule
//! - `TrainConfig` - JSON-loadable hyperparameters
//! - `ReduceLROnPlateau` - learning rate reduction on a stalled metric
//! - `side_by_side` - reconstruction grids for image logging

mod config;
mod diagnostics;
mod optimizer;
mod scheduler;
mod trainer;

pub use crate::vae::LossRecord;
pub use config::TrainConfig;
pub use diagnostics::{side_by_side, to_u8_image, GRID_PADDING};
pub use optimizer::{LrControl, TorchOptimizer};
pub use scheduler::{PlateauMode, ReduceLROnPlateau};
pub use trainer::{FitSummary, TrainerPhase, ValidationSummary, VaeTrainer};
