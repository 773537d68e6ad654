//! Convolutional variational autoencoder.
//!
//! Provides:
//! - `Encoder` - 64x64 observation -> (mean, log_std)
//! - `Decoder` - latent code -> reconstruction in [0, 1]
//! - `reparameterize` - differentiable Gaussian sampling
//! - `Vae` - the composed model and its `encode` operation

mod config;
mod decoder;
mod encoder;
mod loss;
mod model;
mod sampler;

pub use config::VaeConfig;
pub use decoder::Decoder;
pub use encoder::{Encoder, FEATURE_SIZE, IMAGE_SIZE};
pub use loss::{kl_divergence, reconstruction_loss, vae_loss, LossRecord, VaeLoss, KLD_WEIGHT};
pub use model::{LatentEncoder, Vae};
pub use sampler::{reparameterize, LatentParams};
