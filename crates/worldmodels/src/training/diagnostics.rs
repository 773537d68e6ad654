//! Side-by-side reconstruction grids for validation logging.

use tch::{Kind, Tensor};

/// Border around and between the two panels, in pixels.
pub const GRID_PADDING: i64 = 4;

/// Fill value of the border.
const PAD_VALUE: f64 = 1.0;

/// Bring a `[N, C, H, W]` stack to three channels.
fn to_rgb(images: &Tensor) -> Tensor {
    let c = images.size()[1];
    match c {
        1 => images.repeat([1, 3, 1, 1]),
        2 => {
            let (n, _, h, w) = images.size4().unwrap_or((0, 0, 0, 0));
            let zeros = Tensor::zeros([n, 1, h, w], (images.kind(), images.device()));
            Tensor::cat(&[images.shallow_clone(), zeros], 1)
        }
        _ => images.narrow(1, 0, 3),
    }
}

/// Lay out `real` and `recon` (both `[C, H, W]`) next to each other.
///
/// Output is `[3, H + 2p, 2W + 3p]` with `p = GRID_PADDING`. Both panels
/// are min-max normalized together so their intensities stay comparable.
pub fn side_by_side(real: &Tensor, recon: &Tensor) -> Tensor {
    let pair = Tensor::stack(&[real.detach(), recon.detach()], 0).to_kind(Kind::Float);
    let pair = to_rgb(&pair);

    let low = pair.min();
    let range = (pair.max() - &low).clamp_min(1e-5);
    let pair = (pair - &low) / range;

    let size = pair.size();
    let (h, w) = (size[2], size[3]);
    let grid = Tensor::full(
        [3, h + 2 * GRID_PADDING, 2 * w + 3 * GRID_PADDING],
        PAD_VALUE,
        (Kind::Float, pair.device()),
    );

    for i in 0..2 {
        let x0 = GRID_PADDING + i * (w + GRID_PADDING);
        let mut panel = grid.narrow(1, GRID_PADDING, h).narrow(2, x0, w);
        panel.copy_(&pair.get(i));
    }
    grid
}

/// `[3, H, W]` floats in `[0, 1]` -> `uint8` on the CPU, for image writers.
pub fn to_u8_image(image: &Tensor) -> Tensor {
    (image.detach().clamp(0.0, 1.0) * 255.0)
        .round()
        .to_kind(Kind::Uint8)
        .to_device(tch::Device::Cpu)
}
