//! PNG backend for diagnostic images.

use super::MetricLogger;
use crate::training::to_u8_image;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tch::Tensor;

/// Writes every logged image to `<dir>/<name>_<step>_<index>.png`.
///
/// Scalars are ignored; pair it with a `ConsoleLogger` in a
/// `CompositeLogger` to get both.
pub struct ImageDirLogger {
    dir: PathBuf,
}

impl ImageDirLogger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = fs::create_dir_all(&dir) {
            tracing::warn!("Failed to create image directory: {}", e);
        }
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn image_path(&self, name: &str, step: u64, index: usize) -> PathBuf {
        self.dir
            .join(format!("{}_{:06}_{:03}.png", name, step, index))
    }
}

impl MetricLogger for ImageDirLogger {
    fn log_scalar(&self, _name: &str, _value: f64, _step: u64) {}

    fn log_metrics(&self, _metrics: &HashMap<String, f64>, _step: u64) {}

    fn log_images(&self, name: &str, images: &[Tensor], step: u64) {
        for (i, image) in images.iter().enumerate() {
            let path = self.image_path(name, step, i);
            if let Err(e) = tch::vision::image::save(&to_u8_image(image), &path) {
                tracing::error!(path = ?path, "Failed to save image: {}", e);
            }
        }
    }
}
