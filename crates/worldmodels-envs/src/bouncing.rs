//! Bouncing ball pixel environment.

use ndarray::{Array3, ArrayD};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use worldmodels::env::{PixelEnv, StepResult};

const SIZE: usize = 64;
const BACKGROUND: f32 = 0.1;
const BALL_COLOR: [f32; 3] = [1.0, 0.35, 0.2];
const TARGET_COLOR: [f32; 3] = [0.2, 0.8, 0.3];

/// Bouncing ball environment
///
/// A ball moves in a square arena and bounces off the walls. The 2-d
/// continuous action accelerates it; the reward is 1 at the centre and
/// falls linearly to 0 at the farthest reachable point.
///
/// Observation: `[3, 64, 64]` RGB in `[0, 1]`
/// Action: `[ax, ay]`, each clipped to `[-1, 1]`
pub struct BouncingBall {
    // Physics constants
    radius: f32,
    accel: f32,
    drag: f32,
    max_speed: f32,

    max_ticks: u32,

    // State
    pos: [f32; 2],
    vel: [f32; 2],
    tick: u32,
    rng: StdRng,
}

impl BouncingBall {
    /// Create a new bouncing ball environment
    pub fn new() -> Self {
        Self {
            radius: 4.0,
            accel: 0.6,
            drag: 0.95,
            max_speed: 4.0,
            max_ticks: 200,
            pos: [SIZE as f32 / 2.0; 2],
            vel: [0.0; 2],
            tick: 0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Episode length before truncation
    pub fn with_max_ticks(mut self, max_ticks: u32) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    pub fn position(&self) -> [f32; 2] {
        self.pos
    }

    fn low(&self) -> f32 {
        self.radius
    }

    fn high(&self) -> f32 {
        SIZE as f32 - self.radius
    }

    fn reward(&self) -> f32 {
        let c = SIZE as f32 / 2.0;
        let dist = ((self.pos[0] - c).powi(2) + (self.pos[1] - c).powi(2)).sqrt();
        let max_dist = (c - self.low()) * std::f32::consts::SQRT_2;
        (1.0 - dist / max_dist).clamp(0.0, 1.0)
    }

    fn observation(&self) -> ArrayD<f32> {
        let mut frame = Array3::from_elem((3, SIZE, SIZE), BACKGROUND);

        // Target marker
        let c = SIZE / 2;
        for d in 0..3 {
            for (ch, value) in TARGET_COLOR.iter().enumerate() {
                frame[[ch, c - 1 + d, c]] = *value;
                frame[[ch, c, c - 1 + d]] = *value;
            }
        }

        let r2 = self.radius * self.radius;
        let [px, py] = self.pos;
        let y0 = (py - self.radius).floor().max(0.0) as usize;
        let y1 = ((py + self.radius).ceil() as usize).min(SIZE - 1);
        let x0 = (px - self.radius).floor().max(0.0) as usize;
        let x1 = ((px + self.radius).ceil() as usize).min(SIZE - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f32 + 0.5 - px;
                let dy = y as f32 + 0.5 - py;
                if dx * dx + dy * dy <= r2 {
                    for (ch, value) in BALL_COLOR.iter().enumerate() {
                        frame[[ch, y, x]] = *value;
                    }
                }
            }
        }
        frame.into_dyn()
    }
}

impl Default for BouncingBall {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelEnv for BouncingBall {
    fn observation_shape(&self) -> [usize; 3] {
        [3, SIZE, SIZE]
    }

    fn action_dim(&self) -> usize {
        2
    }

    fn reset(&mut self, seed: Option<u64>) -> ArrayD<f32> {
        if let Some(s) = seed {
            self.rng = StdRng::seed_from_u64(s);
        }
        let (low, high) = (self.low(), self.high());
        self.pos = [self.rng.gen_range(low..high), self.rng.gen_range(low..high)];
        let speed = self.max_speed / 2.0;
        self.vel = [
            self.rng.gen_range(-speed..speed),
            self.rng.gen_range(-speed..speed),
        ];
        self.tick = 0;
        self.observation()
    }

    fn step(&mut self, action: &ArrayD<f32>) -> StepResult {
        let ax = action.iter().next().copied().unwrap_or(0.0).clamp(-1.0, 1.0);
        let ay = action.iter().nth(1).copied().unwrap_or(0.0).clamp(-1.0, 1.0);

        let (low, high) = (self.low(), self.high());
        for (i, a) in [ax, ay].into_iter().enumerate() {
            let v = (self.vel[i] * self.drag + a * self.accel)
                .clamp(-self.max_speed, self.max_speed);
            let mut p = self.pos[i] + v;
            let mut v = v;
            // Reflect off the walls
            if p < low {
                p = 2.0 * low - p;
                v = -v;
            } else if p > high {
                p = 2.0 * high - p;
                v = -v;
            }
            self.pos[i] = p.clamp(low, high);
            self.vel[i] = v;
        }
        self.tick += 1;

        StepResult {
            observation: self.observation(),
            reward: self.reward(),
            terminated: false,
            truncated: self.tick >= self.max_ticks,
        }
    }

    fn render(&self) -> Option<String> {
        Some(format!(
            "BouncingBall: pos = ({:.1}, {:.1}), vel = ({:.2}, {:.2}), tick = {}",
            self.pos[0], self.pos[1], self.vel[0], self.vel[1], self.tick
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, IxDyn};

    #[test]
    fn test_observation_shape_and_range() {
        let mut env = BouncingBall::new();
        let obs = env.reset(Some(0));
        assert_eq!(obs.shape(), &[3, 64, 64]);
        assert!(obs.iter().all(|v| (0.0..=1.0).contains(v)));
        // Ball pixels are drawn
        assert!(obs.iter().any(|v| *v == BALL_COLOR[0]));
    }

    #[test]
    fn test_seeded_reset_is_reproducible() {
        let mut a = BouncingBall::new();
        let mut b = BouncingBall::new();
        assert_eq!(a.reset(Some(3)), b.reset(Some(3)));

        let action = arr1(&[0.5f32, -1.0]).into_dyn();
        for _ in 0..10 {
            assert_eq!(a.step(&action).observation, b.step(&action).observation);
        }
    }

    #[test]
    fn test_ball_stays_in_arena() {
        let mut env = BouncingBall::new();
        env.reset(Some(1));
        let push = arr1(&[1.0f32, 1.0]).into_dyn();
        for _ in 0..100 {
            env.step(&push);
            let [x, y] = env.position();
            assert!((4.0..=60.0).contains(&x));
            assert!((4.0..=60.0).contains(&y));
        }
    }

    #[test]
    fn test_truncates_at_max_ticks() {
        let mut env = BouncingBall::new().with_max_ticks(5);
        env.reset(Some(0));
        let idle = ArrayD::zeros(IxDyn(&[2]));
        for _ in 0..4 {
            assert!(!env.step(&idle).done());
        }
        let last = env.step(&idle);
        assert!(last.truncated);
        assert!(!last.terminated);
    }

    #[test]
    fn test_reward_peaks_at_centre() {
        let mut env = BouncingBall::new();
        env.pos = [32.0, 32.0];
        assert!((env.reward() - 1.0).abs() < 1e-6);
        env.pos = [4.0, 4.0];
        assert!(env.reward() < 1e-6);
        env.pos = [20.0, 32.0];
        let r = env.reward();
        assert!(r > 0.0 && r < 1.0);
    }

    #[test]
    fn test_render() {
        let mut env = BouncingBall::new();
        env.reset(Some(0));
        assert!(env.render().unwrap().starts_with("BouncingBall"));
    }
}
