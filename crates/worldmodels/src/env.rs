//! Pixel environment interface consumed by rollouts and data collection.

use crate::{Result, WorldModelError};
use ndarray::{ArrayD, IxDyn};
use tch::{Device, Kind, Tensor};

/// Result from a single environment step
#[derive(Clone, Debug)]
pub struct StepResult {
    /// Observation after the step, `[C, H, W]` in `[0, 1]`
    pub observation: ArrayD<f32>,
    /// Reward received
    pub reward: f32,
    /// Whether episode terminated (goal reached, failure, etc.)
    pub terminated: bool,
    /// Whether episode truncated (time limit, etc.)
    pub truncated: bool,
}

impl StepResult {
    /// Check if episode is done (terminated or truncated)
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// An environment that renders image observations and takes continuous
/// actions.
///
/// # Example
///
/// ```rust,ignore
/// use worldmodels::env::{PixelEnv, StepResult};
///
/// struct Blank;
///
/// impl PixelEnv for Blank {
///     fn observation_shape(&self) -> [usize; 3] {
///         [3, 64, 64]
///     }
///
///     fn action_dim(&self) -> usize {
///         1
///     }
///
///     fn reset(&mut self, _seed: Option<u64>) -> ArrayD<f32> {
///         ArrayD::zeros(IxDyn(&[3, 64, 64]))
///     }
///
///     fn step(&mut self, _action: &ArrayD<f32>) -> StepResult {
///         // ...
///     }
/// }
/// ```
pub trait PixelEnv: Send {
    /// `[C, H, W]` of every observation
    fn observation_shape(&self) -> [usize; 3];

    /// Length of the action vector
    fn action_dim(&self) -> usize;

    /// Reset the environment and return the first observation
    fn reset(&mut self, seed: Option<u64>) -> ArrayD<f32>;

    /// Take a single step in the environment
    fn step(&mut self, action: &ArrayD<f32>) -> StepResult;

    /// Optional: Render the environment as text
    fn render(&self) -> Option<String> {
        None
    }
}

/// Copy an `ndarray` observation into a float tensor on `device`.
pub fn observation_to_tensor(obs: &ArrayD<f32>, device: Device) -> Tensor {
    let shape: Vec<i64> = obs.shape().iter().map(|&d| d as i64).collect();
    let data = obs.as_standard_layout();
    let flat = data.as_slice().map(Tensor::from_slice).unwrap_or_else(|| {
        Tensor::from_slice(&data.iter().copied().collect::<Vec<f32>>())
    });
    flat.reshape(shape).to_device(device)
}

/// Copy a `[action_dim]` (or `[1, action_dim]`) action tensor into an
/// `ndarray` for the environment.
pub fn tensor_to_action(action: &Tensor, action_dim: usize) -> Result<ArrayD<f32>> {
    let flat = action
        .detach()
        .to_device(Device::Cpu)
        .to_kind(Kind::Float)
        .flatten(0, -1);
    let values = Vec::<f32>::try_from(&flat)?;
    if values.len() != action_dim {
        return Err(WorldModelError::ShapeMismatch {
            expected: vec![action_dim as i64],
            actual: action.size(),
        });
    }
    ArrayD::from_shape_vec(IxDyn(&[action_dim]), values)
        .map_err(|e| WorldModelError::EnvError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_observation_round_trip_layout() {
        let obs = Array3::from_shape_fn((3, 4, 5), |(c, h, w)| (c * 100 + h * 10 + w) as f32)
            .into_dyn();
        let t = observation_to_tensor(&obs, Device::Cpu);
        assert_eq!(t.size(), vec![3, 4, 5]);
        assert_eq!(t.double_value(&[2, 3, 4]), 234.0);
    }

    #[test]
    fn test_transposed_view_is_copied_in_logical_order() {
        let obs = Array3::from_shape_fn((2, 3, 4), |(a, b, c)| (a * 100 + b * 10 + c) as f32)
            .into_dyn();
        let view = obs.t().to_owned();
        let t = observation_to_tensor(&view, Device::Cpu);
        assert_eq!(t.size(), vec![4, 3, 2]);
        assert_eq!(t.double_value(&[3, 2, 1]), 123.0);
    }

    #[test]
    fn test_action_conversion_checks_length() {
        let action = Tensor::from_slice(&[0.5f32, -0.5]).reshape([1, 2]);
        let arr = tensor_to_action(&action, 2).unwrap();
        assert_eq!(arr.shape(), &[2]);
        assert_eq!(arr[[1]], -0.5);

        assert!(tensor_to_action(&action, 3).is_err());
    }
}
