//! VAE objective: summed squared error plus a down-weighted KL term.

use super::sampler::LatentParams;
use serde::{Deserialize, Serialize};
use tch::{Kind, Reduction, Tensor};

/// Weight of the KL term relative to reconstruction error.
///
/// Not normalized by batch or latent size; the reconstruction term is a
/// sum over every pixel, so this keeps the prior from washing out detail.
pub const KLD_WEIGHT: f64 = 0.0001;

/// Differentiable loss terms of one forward pass.
#[derive(Debug)]
pub struct VaeLoss {
    /// `recon + KLD_WEIGHT * kld`
    pub loss: Tensor,
    /// Sum of squared pixel errors
    pub recon: Tensor,
    /// Closed-form KL divergence from the standard normal prior
    pub kld: Tensor,
}

impl VaeLoss {
    pub fn record(&self) -> LossRecord {
        LossRecord {
            loss: self.loss.double_value(&[]),
            recon: self.recon.double_value(&[]),
            kld: self.kld.double_value(&[]),
        }
    }
}

/// Scalar snapshot of a `VaeLoss`, for logging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LossRecord {
    pub loss: f64,
    pub recon: f64,
    pub kld: f64,
}

/// Squared error summed over pixels and batch.
pub fn reconstruction_loss(recon: &Tensor, obs: &Tensor) -> Tensor {
    recon.mse_loss(obs, Reduction::Sum)
}

/// `-0.5 * sum(1 + 2 log_std - mean^2 - exp(2 log_std))`
pub fn kl_divergence(params: &LatentParams) -> Tensor {
    let log_var = &params.log_std * 2.0;
    let inner = log_var.exp().neg() + &log_var - params.mean.pow_tensor_scalar(2) + 1.0;
    inner.sum(Kind::Float) * -0.5
}

pub fn vae_loss(recon: &Tensor, obs: &Tensor, params: &LatentParams) -> VaeLoss {
    let recon_term = reconstruction_loss(recon, obs);
    let kld = kl_divergence(params);
    let loss = &recon_term + &kld * KLD_WEIGHT;
    VaeLoss {
        loss,
        recon: recon_term,
        kld,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    fn params(mean: Tensor, log_std: Tensor) -> LatentParams {
        LatentParams { mean, log_std }
    }

    #[test]
    fn test_kl_zero_at_standard_normal() {
        let p = params(
            Tensor::zeros([4, 32], (Kind::Float, Device::Cpu)),
            Tensor::zeros([4, 32], (Kind::Float, Device::Cpu)),
        );
        assert_eq!(kl_divergence(&p).double_value(&[]), 0.0);
    }

    #[test]
    fn test_kl_matches_closed_form() {
        // Single dimension: mean = 1, log_std = ln 2 -> var = 4
        // -0.5 * (1 + ln 4 - 1 - 4) = 2 - ln 2
        let p = params(
            Tensor::from_slice(&[1.0f32]).reshape([1, 1]),
            Tensor::from_slice(&[2f32.ln()]).reshape([1, 1]),
        );
        let expected = 2.0 - 2f64.ln();
        assert!((kl_divergence(&p).double_value(&[]) - expected).abs() < 1e-5);
    }

    #[test]
    fn test_kl_non_negative_for_random_parameters() {
        for _ in 0..10 {
            let p = params(
                Tensor::randn([8, 16], (Kind::Float, Device::Cpu)),
                Tensor::randn([8, 16], (Kind::Float, Device::Cpu)),
            );
            assert!(kl_divergence(&p).double_value(&[]) >= -1e-4);
        }
    }

    #[test]
    fn test_reconstruction_is_summed() {
        let recon = Tensor::full([2, 1, 4, 4], 0.5, (Kind::Float, Device::Cpu));
        let obs = Tensor::zeros([2, 1, 4, 4], (Kind::Float, Device::Cpu));
        // 32 pixels * 0.25
        assert!((reconstruction_loss(&recon, &obs).double_value(&[]) - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_total_is_weighted_sum() {
        let recon = Tensor::rand([3, 3, 8, 8], (Kind::Float, Device::Cpu));
        let obs = Tensor::rand([3, 3, 8, 8], (Kind::Float, Device::Cpu));
        let p = params(
            Tensor::randn([3, 10], (Kind::Float, Device::Cpu)),
            Tensor::randn([3, 10], (Kind::Float, Device::Cpu)),
        );

        let record = vae_loss(&recon, &obs, &p).record();
        let expected = record.recon + KLD_WEIGHT * record.kld;

        assert!((record.loss - expected).abs() < 1e-3);
        assert!(record.recon > 0.0);
        assert!(record.kld > 0.0);
    }
}
