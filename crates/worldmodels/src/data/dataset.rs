//! In-memory observation datasets.

use crate::{Result, WorldModelError};
use std::path::Path;
use tch::{Device, Kind, Tensor};

/// One batch handed to the trainer.
#[derive(Debug)]
pub struct Batch {
    /// Observations, `[B, C, H, W]` floats in `[0, 1]`
    pub obs: Tensor,
}

impl Batch {
    pub fn new(obs: Tensor) -> Self {
        Self { obs }
    }

    pub fn len(&self) -> usize {
        self.obs.size().first().copied().unwrap_or(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_device(&self, device: Device) -> Self {
        Self {
            obs: self.obs.to_device(device),
        }
    }
}

/// Observations stored as one `[N, C, H, W]` float tensor.
#[derive(Debug)]
pub struct ObservationDataset {
    obs: Tensor,
}

impl ObservationDataset {
    /// Wrap an `[N, C, H, W]` tensor.
    pub fn from_tensor(obs: Tensor) -> Result<Self> {
        let size = obs.size();
        if size.len() != 4 {
            return Err(WorldModelError::ShapeMismatch {
                expected: vec![-1, -1, -1, -1],
                actual: size,
            });
        }
        Ok(Self {
            obs: obs.to_kind(Kind::Float),
        })
    }

    /// Load observations from a `.npy` file.
    ///
    /// `uint8` pixels are scaled to `[0, 1]`, `[N, H, W]` arrays gain a
    /// channel axis and `[N, H, W, C]` arrays (C of 1 or 3) are moved to
    /// channel-first layout.
    pub fn from_npy(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = Tensor::read_npy(path)?;

        let obs = if raw.kind() == Kind::Uint8 {
            raw.to_kind(Kind::Float) / 255.0
        } else {
            raw.to_kind(Kind::Float)
        };

        let obs = match obs.size().as_slice() {
            [_, _, _] => obs.unsqueeze(1),
            [_, c, _, last] if matches!(last, 1 | 3) && !matches!(c, 1 | 3) => {
                obs.permute([0, 3, 1, 2]).contiguous()
            }
            _ => obs,
        };

        let dataset = Self::from_tensor(obs)?;
        if dataset.is_empty() {
            return Err(WorldModelError::EmptyDataset(path.display().to_string()));
        }
        tracing::info!(path = %path.display(), shape = ?dataset.obs.size(), "Loaded observations");
        Ok(dataset)
    }

    /// Write the observations as a float `.npy` file.
    pub fn save_npy(&self, path: impl AsRef<Path>) -> Result<()> {
        self.obs.write_npy(path.as_ref())?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.obs.size()[0] as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `[C, H, W]` of a single observation.
    pub fn observation_shape(&self) -> Vec<i64> {
        self.obs.size()[1..].to_vec()
    }

    pub fn observations(&self) -> &Tensor {
        &self.obs
    }

    /// Split off the last `round(len * val_fraction)` items for validation.
    ///
    /// At least one item stays in the training set.
    pub fn split(&self, val_fraction: f64) -> (Self, Self) {
        let n = self.len() as i64;
        let n_val = ((n as f64) * val_fraction).round() as i64;
        let n_val = n_val.clamp(0, (n - 1).max(0));
        let n_train = n - n_val;

        (
            Self {
                obs: self.obs.narrow(0, 0, n_train),
            },
            Self {
                obs: self.obs.narrow(0, n_train, n_val),
            },
        )
    }

    /// Iterate in batches of `batch_size`; the last batch may be smaller.
    pub fn batches(&self, batch_size: usize, shuffle: bool) -> BatchIter {
        let n = self.len() as i64;
        let order = if shuffle {
            Some(Tensor::randperm(n, (Kind::Int64, self.obs.device())))
        } else {
            None
        };
        BatchIter {
            obs: self.obs.shallow_clone(),
            order,
            batch_size: batch_size.max(1) as i64,
            pos: 0,
            len: n,
        }
    }
}

/// Iterator over dataset batches.
pub struct BatchIter {
    obs: Tensor,
    order: Option<Tensor>,
    batch_size: i64,
    pos: i64,
    len: i64,
}

impl Iterator for BatchIter {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.pos >= self.len {
            return None;
        }
        let n = self.batch_size.min(self.len - self.pos);
        let obs = match &self.order {
            Some(order) => self.obs.index_select(0, &order.narrow(0, self.pos, n)),
            None => self.obs.narrow(0, self.pos, n),
        };
        self.pos += n;
        Some(Batch { obs })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.len - self.pos).max(0);
        let batches = ((remaining + self.batch_size - 1) / self.batch_size) as usize;
        (batches, Some(batches))
    }
}

impl ExactSizeIterator for BatchIter {}
