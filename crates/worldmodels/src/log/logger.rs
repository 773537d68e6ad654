//! Metric logger traits and composites.

use std::collections::HashMap;
use tch::Tensor;

/// Trait for logging metrics to various backends.
pub trait MetricLogger: Send + Sync {
    /// Log a scalar value (e.g. loss, learning rate).
    fn log_scalar(&self, name: &str, value: f64, step: u64);

    /// Log a set of metrics collected in a map.
    fn log_metrics(&self, metrics: &HashMap<String, f64>, step: u64);

    /// Log `[3, H, W]` float images with values in `[0, 1]`.
    fn log_images(&self, _name: &str, _images: &[Tensor], _step: u64) {}

    /// Close the logger and flush any pending writes.
    fn close(&self) {}
}

/// A logger that does nothing (default).
pub struct NoOpLogger;

impl MetricLogger for NoOpLogger {
    fn log_scalar(&self, _name: &str, _value: f64, _step: u64) {}
    fn log_metrics(&self, _metrics: &HashMap<String, f64>, _step: u64) {}
}

/// A composite logger that dispatches to multiple backends.
pub struct CompositeLogger {
    loggers: Vec<Box<dyn MetricLogger>>,
}

impl CompositeLogger {
    pub fn new(loggers: Vec<Box<dyn MetricLogger>>) -> Self {
        Self { loggers }
    }

    pub fn add(&mut self, logger: Box<dyn MetricLogger>) {
        self.loggers.push(logger);
    }

    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }
}

impl MetricLogger for CompositeLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        for logger in &self.loggers {
            logger.log_scalar(name, value, step);
        }
    }

    fn log_metrics(&self, metrics: &HashMap<String, f64>, step: u64) {
        for logger in &self.loggers {
            logger.log_metrics(metrics, step);
        }
    }

    fn log_images(&self, name: &str, images: &[Tensor], step: u64) {
        for logger in &self.loggers {
            logger.log_images(name, images, step);
        }
    }

    fn close(&self) {
        for logger in &self.loggers {
            logger.close();
        }
    }
}
