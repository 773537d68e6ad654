//! Optimizer wrapper with a readable learning rate.

use crate::Result;
use tch::nn::OptimizerConfig;
use tch::{nn, Tensor};

/// Anything whose learning rate a scheduler can read and overwrite.
pub trait LrControl {
    fn lr(&self) -> f64;
    fn set_lr(&mut self, lr: f64);
}

/// Wrapper for Torch's nn::Optimizer.
///
/// `nn::Optimizer` can set but not report its learning rate, so the
/// current value is tracked alongside it.
pub struct TorchOptimizer {
    inner: nn::Optimizer,
    lr: f64,
}

impl TorchOptimizer {
    /// Adam with betas (0.9, 0.999), eps 1e-6 and L2 weight decay `wd`.
    pub fn adam(vs: &nn::VarStore, lr: f64, wd: f64) -> Result<Self> {
        let inner = nn::Adam {
            beta1: 0.9,
            beta2: 0.999,
            wd,
            eps: 1e-6,
            amsgrad: false,
        }
        .build(vs, lr)?;
        Ok(Self { inner, lr })
    }

    /// Zero gradients, backpropagate `loss`, and apply one update.
    pub fn backward_step(&mut self, loss: &Tensor) {
        self.inner.backward_step(loss);
    }
}

impl LrControl for TorchOptimizer {
    fn lr(&self) -> f64 {
        self.lr
    }

    fn set_lr(&mut self, lr: f64) {
        self.inner.set_lr(lr);
        self.lr = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind};

    #[test]
    fn test_set_lr_is_tracked() {
        let vs = nn::VarStore::new(Device::Cpu);
        let _w = vs.root().zeros("w", &[2]);
        let mut opt = TorchOptimizer::adam(&vs, 1e-3, 0.0).unwrap();

        assert_eq!(opt.lr(), 1e-3);
        opt.set_lr(1e-4);
        assert_eq!(opt.lr(), 1e-4);
    }

    #[test]
    fn test_backward_step_updates_parameters() {
        let vs = nn::VarStore::new(Device::Cpu);
        let w = vs.root().ones("w", &[4]);
        let mut opt = TorchOptimizer::adam(&vs, 0.1, 0.0).unwrap();

        let before = w.sum(Kind::Float).double_value(&[]);
        let loss = w.pow_tensor_scalar(2).sum(Kind::Float);
        opt.backward_step(&loss);
        let after = w.sum(Kind::Float).double_value(&[]);

        assert!(after < before);
    }
}
