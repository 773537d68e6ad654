use super::sampler::LatentParams;
use tch::{nn, Tensor};

/// Side length of the square observations the conv stack is built for.
pub const IMAGE_SIZE: i64 = 64;

/// Flattened size of the last conv block (256 channels, 2x2 spatial).
pub const FEATURE_SIZE: i64 = 2 * 2 * 256;

/// Conv2d block with ReLU activation
fn conv2d(p: nn::Path, c_in: i64, c_out: i64, k: i64, s: i64) -> nn::Sequential {
    nn::seq()
        .add(nn::conv2d(
            &p,
            c_in,
            c_out,
            k,
            nn::ConvConfig {
                stride: s,
                ..Default::default()
            },
        ))
        .add_fn(|xs| xs.relu())
}

/// CNN Encoder: Visual Observation -> Gaussian over the latent code
#[derive(Debug)]
pub struct Encoder {
    convs: nn::Sequential,
    fc_mu: nn::Linear,
    fc_logsigma: nn::Linear,
    img_channels: i64,
    latent_size: i64,
}

impl Encoder {
    pub fn new(p: &nn::Path, img_channels: i64, latent_size: i64) -> Self {
        // 64 -> 31 -> 14 -> 6 -> 2
        let convs = nn::seq()
            .add(conv2d(p / "conv1", img_channels, 32, 4, 2))
            .add(conv2d(p / "conv2", 32, 64, 4, 2))
            .add(conv2d(p / "conv3", 64, 128, 4, 2))
            .add(conv2d(p / "conv4", 128, 256, 4, 2));

        let fc_mu = nn::linear(p / "fc_mu", FEATURE_SIZE, latent_size, Default::default());
        let fc_logsigma = nn::linear(
            p / "fc_logsigma",
            FEATURE_SIZE,
            latent_size,
            Default::default(),
        );

        Self {
            convs,
            fc_mu,
            fc_logsigma,
            img_channels,
            latent_size,
        }
    }

    pub fn forward(&self, xs: &Tensor) -> LatentParams {
        // Input: [B, C, 64, 64]
        // Output: mean and log_std, both [B, latent_size]
        let h = xs.apply(&self.convs).flatten(1, -1);
        LatentParams {
            mean: h.apply(&self.fc_mu),
            log_std: h.apply(&self.fc_logsigma),
        }
    }

    pub fn img_channels(&self) -> i64 {
        self.img_channels
    }

    pub fn latent_size(&self) -> i64 {
        self.latent_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind};

    #[test]
    fn test_encoder_output_shapes() {
        let vs = nn::VarStore::new(Device::Cpu);
        let encoder = Encoder::new(&vs.root(), 3, 32);

        let obs = Tensor::rand([5, 3, 64, 64], (Kind::Float, Device::Cpu));
        let params = encoder.forward(&obs);

        assert_eq!(params.mean.size(), vec![5, 32]);
        assert_eq!(params.log_std.size(), vec![5, 32]);
    }

    #[test]
    fn test_conv_stack_collapses_to_feature_size() {
        let vs = nn::VarStore::new(Device::Cpu);
        let encoder = Encoder::new(&vs.root(), 1, 8);

        let obs = Tensor::rand([2, 1, 64, 64], (Kind::Float, Device::Cpu));
        let features = obs.apply(&encoder.convs);

        assert_eq!(features.size(), vec![2, 256, 2, 2]);
        assert_eq!(features.flatten(1, -1).size()[1], FEATURE_SIZE);
    }

    #[test]
    fn test_heads_are_unbounded() {
        let vs = nn::VarStore::new(Device::Cpu);
        let encoder = Encoder::new(&vs.root(), 3, 64);

        let obs = Tensor::rand([16, 3, 64, 64], (Kind::Float, Device::Cpu));
        let params = encoder.forward(&obs);

        // No activation on the projections, so both signs show up.
        assert!(params.mean.min().double_value(&[]) < 0.0);
        assert!(params.mean.max().double_value(&[]) > 0.0);
    }
}
