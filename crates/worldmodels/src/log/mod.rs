//! Metric and diagnostic image logging.
//!
//! Provides:
//! - `MetricLogger` trait for composable backends
//! - `ConsoleLogger` for lightweight tracing output
//! - `ImageDirLogger` for writing reconstruction grids as PNG files
//! - `TensorBoardLogger` for visualization (optional)
//! - `CompositeLogger` for multi-backend logging

mod console;
mod images;
pub(crate) mod logger;
#[cfg(feature = "tensorboard")]
mod tensorboard;

pub use console::ConsoleLogger;
pub use images::ImageDirLogger;
pub use logger::{CompositeLogger, MetricLogger, NoOpLogger};
#[cfg(feature = "tensorboard")]
pub use tensorboard::TensorBoardLogger;
