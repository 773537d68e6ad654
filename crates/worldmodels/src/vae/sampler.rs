//! Reparameterized sampling from the encoder's diagonal Gaussian.

use tch::Tensor;

/// Parameters of the per-observation latent Gaussian.
#[derive(Debug)]
pub struct LatentParams {
    /// Mean, `[B, latent_size]`
    pub mean: Tensor,
    /// Log standard deviation, `[B, latent_size]`
    pub log_std: Tensor,
}

impl LatentParams {
    /// Draw one latent sample.
    pub fn sample(&self) -> Tensor {
        reparameterize(&self.mean, &self.log_std)
    }
}

/// `mean + exp(log_std) * eps` with `eps ~ N(0, I)` drawn on every call.
///
/// The noise is a fresh leaf tensor, so gradients reach `mean` and
/// `log_std` only. With `log_std = -inf` the result is exactly `mean`.
pub fn reparameterize(mean: &Tensor, log_std: &Tensor) -> Tensor {
    debug_assert_eq!(mean.size(), log_std.size());
    let std = log_std.exp();
    let eps = std.randn_like();
    eps * std + mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind};

    #[test]
    fn test_successive_samples_differ() {
        let mean = Tensor::zeros([4, 32], (Kind::Float, Device::Cpu));
        let log_std = Tensor::zeros([4, 32], (Kind::Float, Device::Cpu));

        let a = reparameterize(&mean, &log_std);
        let b = reparameterize(&mean, &log_std);

        assert_eq!(a.size(), mean.size());
        assert!(!a.equal(&b));
    }

    #[test]
    fn test_collapses_to_mean_without_variance() {
        let mean = Tensor::randn([3, 8], (Kind::Float, Device::Cpu));
        let log_std = Tensor::full([3, 8], f64::NEG_INFINITY, (Kind::Float, Device::Cpu));

        let a = reparameterize(&mean, &log_std);
        let b = reparameterize(&mean, &log_std);

        assert!(a.equal(&mean));
        assert!(a.equal(&b));
    }

    #[test]
    fn test_gradients_flow_to_parameters() {
        let mean = Tensor::zeros([2, 4], (Kind::Float, Device::Cpu)).set_requires_grad(true);
        let log_std = Tensor::zeros([2, 4], (Kind::Float, Device::Cpu)).set_requires_grad(true);

        let z = reparameterize(&mean, &log_std);
        z.sum(Kind::Float).backward();

        // d/dmean = 1, d/dlog_std = exp(log_std) * eps = z - mean
        let ones = Tensor::ones([2, 4], (Kind::Float, Device::Cpu));
        assert!(mean.grad().allclose(&ones, 1e-6, 1e-6, false));
        assert!(log_std
            .grad()
            .allclose(&(z.detach() - mean.detach()), 1e-5, 1e-6, false));
    }
}
