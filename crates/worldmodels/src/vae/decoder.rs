use tch::{nn, Tensor};

/// Width of the dense expansion fed to the first transposed conv.
const EXPANSION: i64 = 1024;

/// Transposed Conv2d block with ReLU activation
fn conv_transpose2d(p: nn::Path, c_in: i64, c_out: i64, k: i64, s: i64) -> nn::Sequential {
    nn::seq()
        .add(nn::conv_transpose2d(
            &p,
            c_in,
            c_out,
            k,
            nn::ConvTransposeConfig {
                stride: s,
                ..Default::default()
            },
        ))
        .add_fn(|xs| xs.relu())
}

/// CNN Decoder: Latent Code -> Visual Observation Reconstruction
#[derive(Debug)]
pub struct Decoder {
    fc: nn::Linear,
    deconvs: nn::Sequential,
    img_channels: i64,
    latent_size: i64,
}

impl Decoder {
    pub fn new(p: &nn::Path, img_channels: i64, latent_size: i64) -> Self {
        let fc = nn::linear(p / "fc1", latent_size, EXPANSION, Default::default());

        // 1 -> 5 -> 13 -> 30 -> 64
        let deconvs = nn::seq()
            .add(conv_transpose2d(p / "deconv1", EXPANSION, 128, 5, 2))
            .add(conv_transpose2d(p / "deconv2", 128, 64, 5, 2))
            .add(conv_transpose2d(p / "deconv3", 64, 32, 6, 2))
            .add(nn::conv_transpose2d(
                p / "deconv4",
                32,
                img_channels,
                6,
                nn::ConvTransposeConfig {
                    stride: 2,
                    ..Default::default()
                },
            ));

        Self {
            fc,
            deconvs,
            img_channels,
            latent_size,
        }
    }

    pub fn forward(&self, zs: &Tensor) -> Tensor {
        // Input: [B, latent_size]
        // Output: [B, C, 64, 64] in [0, 1]
        zs.apply(&self.fc)
            .relu()
            .reshape([-1, EXPANSION, 1, 1])
            .apply(&self.deconvs)
            .sigmoid()
    }

    pub fn img_channels(&self) -> i64 {
        self.img_channels
    }

    pub fn latent_size(&self) -> i64 {
        self.latent_size
    }
}
