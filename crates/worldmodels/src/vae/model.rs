use super::config::VaeConfig;
use super::decoder::Decoder;
use super::encoder::{Encoder, IMAGE_SIZE};
use super::loss::{vae_loss, VaeLoss};
use super::sampler::LatentParams;
use crate::{Result, WorldModelError};
use tch::{nn, Device, Kind, Tensor};

/// Anything that can turn an observation into a latent code.
///
/// This is the only surface a rollout loop needs from the vision model.
pub trait LatentEncoder {
    /// Encode `[C, H, W]` or `[B, C, H, W]` observations into latent samples.
    fn encode(&self, obs: &Tensor) -> Result<Tensor>;

    /// Size of the latent code produced by `encode`.
    fn latent_size(&self) -> i64;

    /// Device observations should be moved to before encoding.
    fn device(&self) -> Device {
        Device::Cpu
    }
}

/// Variational autoencoder: Encoder -> reparameterize -> Decoder
#[derive(Debug)]
pub struct Vae {
    encoder: Encoder,
    decoder: Decoder,
    config: VaeConfig,
    device: Device,
}

impl Vae {
    /// Build encoder and decoder under `p / "encoder"` and `p / "decoder"`.
    ///
    /// Both halves share `config.img_channels` and `config.latent_size`.
    pub fn new(p: &nn::Path, config: VaeConfig) -> Self {
        let encoder = Encoder::new(&(p / "encoder"), config.img_channels, config.latent_size);
        let decoder = Decoder::new(&(p / "decoder"), config.img_channels, config.latent_size);

        Self {
            encoder,
            decoder,
            device: p.device(),
            config,
        }
    }

    pub fn config(&self) -> &VaeConfig {
        &self.config
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Expected observation shape, without the batch axis.
    pub fn observation_shape(&self) -> [i64; 3] {
        [self.config.img_channels, IMAGE_SIZE, IMAGE_SIZE]
    }

    /// Fail on anything other than finite `[B, C, 64, 64]` float input.
    pub fn check_input(&self, obs: &Tensor) -> Result<()> {
        let size = obs.size();
        let [c, h, w] = self.observation_shape();
        if size.len() != 4 || size[1..] != [c, h, w] || size[0] == 0 {
            return Err(WorldModelError::ShapeMismatch {
                expected: vec![-1, c, h, w],
                actual: size,
            });
        }
        if !matches!(obs.kind(), Kind::Float | Kind::Double | Kind::Half) {
            return Err(WorldModelError::InvalidConfig(format!(
                "observations must be floating point, got {:?}",
                obs.kind()
            )));
        }
        let finite = obs.isfinite().all().to_kind(Kind::Int64).int64_value(&[]);
        if finite == 0 {
            return Err(WorldModelError::NonFinite("observation batch".into()));
        }
        Ok(())
    }

    /// Full pass: returns the reconstruction and the latent parameters.
    ///
    /// Input is not validated here; trainer and `encode` call `check_input`.
    pub fn forward(&self, obs: &Tensor) -> (Tensor, LatentParams) {
        let params = self.encoder.forward(obs);
        let z = params.sample();
        let recon = self.decoder.forward(&z);
        (recon, params)
    }

    pub fn loss_function(&self, recon: &Tensor, obs: &Tensor, params: &LatentParams) -> VaeLoss {
        vae_loss(recon, obs, params)
    }

    /// Decode latent samples `[B, latent_size]` into images.
    pub fn decode(&self, z: &Tensor) -> Result<Tensor> {
        let size = z.size();
        if size.len() != 2 || size[1] != self.config.latent_size {
            return Err(WorldModelError::ShapeMismatch {
                expected: vec![-1, self.config.latent_size],
                actual: size,
            });
        }
        Ok(tch::no_grad(|| self.decoder.forward(&z.to_device(self.device))))
    }
}

impl LatentEncoder for Vae {
    fn encode(&self, obs: &Tensor) -> Result<Tensor> {
        let single = obs.dim() == 3;
        let batch = if single {
            obs.unsqueeze(0)
        } else {
            obs.shallow_clone()
        };
        let batch = batch.to_device(self.device).to_kind(Kind::Float);
        self.check_input(&batch)?;

        let z = tch::no_grad(|| self.encoder.forward(&batch).sample());
        Ok(if single { z.squeeze_dim(0) } else { z })
    }

    fn latent_size(&self) -> i64 {
        self.config.latent_size
    }

    fn device(&self) -> Device {
        self.device
    }
}
