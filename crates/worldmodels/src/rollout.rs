//! Closed-loop rollouts: encode -> act -> step -> advance hidden state.
//!
//! The VAE contributes only `LatentEncoder::encode`. The recurrent
//! dynamics model and the controller are supplied by the caller.

use crate::data::ObservationDataset;
use crate::env::{observation_to_tensor, tensor_to_action, PixelEnv};
use crate::vae::LatentEncoder;
use crate::{Result, WorldModelError};
use ndarray::{ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tch::{Device, Kind, Tensor};

/// Recurrent model of latent dynamics.
pub trait Dynamics {
    /// Hidden state at the start of an episode
    fn initial_state(&self, device: Device) -> Tensor;

    /// Next hidden state given the action taken, the current latent and
    /// the current hidden state.
    fn forward(&self, action: &Tensor, z: &Tensor, h: &Tensor) -> Tensor;
}

/// Maps `(z, h)` to an action vector.
pub trait Controller {
    fn action(&mut self, z: &Tensor, h: &Tensor) -> Tensor;
}

/// Uniform random actions in `[-1, 1]`, for data collection.
pub struct RandomController {
    rng: StdRng,
    action_dim: usize,
}

impl RandomController {
    pub fn new(action_dim: usize, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            action_dim,
        }
    }

    fn sample(&mut self) -> Vec<f32> {
        (0..self.action_dim)
            .map(|_| self.rng.gen_range(-1.0f32..=1.0))
            .collect()
    }
}

impl Controller for RandomController {
    fn action(&mut self, z: &Tensor, _h: &Tensor) -> Tensor {
        Tensor::from_slice(&self.sample()).to_device(z.device())
    }
}

/// Outcome of one episode.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RolloutResult {
    pub cumulative_reward: f32,
    pub steps: usize,
    /// Whether the episode ended on its own rather than at `max_steps`
    pub done: bool,
}

/// Run one episode.
///
/// Each step encodes the observation, asks the controller for an action,
/// steps the environment, accumulates the reward and advances the hidden
/// state. Stops when the environment reports done or after `max_steps`.
pub fn rollout<E, V, D, C>(
    env: &mut E,
    encoder: &V,
    dynamics: &D,
    controller: &mut C,
    max_steps: usize,
) -> Result<RolloutResult>
where
    E: PixelEnv + ?Sized,
    V: LatentEncoder + ?Sized,
    D: Dynamics + ?Sized,
    C: Controller + ?Sized,
{
    let device = encoder.device();
    let action_dim = env.action_dim();

    let mut obs = env.reset(None);
    let mut h = dynamics.initial_state(device);
    let mut result = RolloutResult::default();

    while result.steps < max_steps {
        let z = encoder.encode(&observation_to_tensor(&obs, device))?;
        let a = controller.action(&z, &h);
        let step = env.step(&tensor_to_action(&a, action_dim)?);

        result.cumulative_reward += step.reward;
        result.steps += 1;
        h = tch::no_grad(|| dynamics.forward(&a, &z, &h));

        if step.done() {
            result.done = true;
            break;
        }
        obs = step.observation;
    }

    tracing::debug!(
        steps = result.steps,
        reward = result.cumulative_reward,
        "Rollout finished"
    );
    Ok(result)
}

/// Drive `env` with uniform random actions and stack the observations.
///
/// The first observation of every episode is included; episodes are reset
/// as they end.
pub fn collect<E: PixelEnv + ?Sized>(
    env: &mut E,
    steps: usize,
    seed: u64,
) -> Result<ObservationDataset> {
    if steps == 0 {
        return Err(WorldModelError::EmptyDataset("collect requires steps > 0".into()));
    }
    let mut controller = RandomController::new(env.action_dim(), seed);
    let mut episode_seed = seed;

    let mut frames = Vec::with_capacity(steps);
    let mut obs = env.reset(Some(episode_seed));
    while frames.len() < steps {
        frames.push(observation_to_tensor(&obs, Device::Cpu));
        if frames.len() == steps {
            break;
        }
        let action = ArrayD::from_shape_vec(IxDyn(&[env.action_dim()]), controller.sample())
            .map_err(|e| WorldModelError::EnvError(e.to_string()))?;
        let step = env.step(&action);
        obs = if step.done() {
            episode_seed += 1;
            env.reset(Some(episode_seed))
        } else {
            step.observation
        };
    }

    let obs = Tensor::stack(&frames, 0).to_kind(Kind::Float);
    tracing::info!(steps, episodes = episode_seed - seed + 1, "Collected observations");
    ObservationDataset::from_tensor(obs)
}
