//! TensorBoard logging backend.

use super::MetricLogger;
use crate::training::to_u8_image;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tch::Tensor;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Logger that writes to TensorBoard event files.
pub struct TensorBoardLogger {
    writer: Mutex<SummaryWriter>,
}

impl TensorBoardLogger {
    pub fn new(log_dir: impl AsRef<Path>) -> Self {
        let writer = SummaryWriter::new(log_dir.as_ref());
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl MetricLogger for TensorBoardLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        if let Ok(mut writer) = self.writer.lock() {
            writer.add_scalar(name, value as f32, step as usize);
            let _ = writer.flush();
        }
    }

    fn log_metrics(&self, metrics: &HashMap<String, f64>, step: u64) {
        if let Ok(mut writer) = self.writer.lock() {
            for (name, value) in metrics {
                writer.add_scalar(name, *value as f32, step as usize);
            }
            let _ = writer.flush();
        }
    }

    fn log_images(&self, name: &str, images: &[Tensor], step: u64) {
        if let Ok(mut writer) = self.writer.lock() {
            for (i, image) in images.iter().enumerate() {
                let (data, dims) = match interleaved_rgb(image) {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::error!("Failed to read image tensor: {}", e);
                        continue;
                    }
                };
                writer.add_image(&format!("{}/{}", name, i), &data, &dims, step as usize);
            }
            let _ = writer.flush();
        }
    }

    fn close(&self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

/// `[3, H, W]` floats -> row-major interleaved RGB bytes plus the
/// `[channels, width, height]` dims `SummaryWriter::add_image` reads.
fn interleaved_rgb(image: &Tensor) -> Result<(Vec<u8>, Vec<usize>), tch::TchError> {
    let bytes = to_u8_image(image);
    let (c, h, w) = bytes.size3()?;
    let hwc = bytes.permute([1, 2, 0]).contiguous();
    let data = Vec::<u8>::try_from(hwc.flatten(0, -1))?;
    Ok((data, vec![c as usize, w as usize, h as usize]))
}
