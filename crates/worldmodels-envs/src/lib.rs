//! Built-in pixel environments for worldmodels.
//!
//! Provides:
//! - `BouncingBall` - a ball pushed around a 64x64 arena

mod bouncing;

pub use bouncing::BouncingBall;

/// Names accepted by `make`.
pub const ENV_NAMES: &[&str] = &["bouncing_ball"];

/// Build a built-in environment by name.
pub fn make(name: &str) -> Option<Box<dyn worldmodels::env::PixelEnv>> {
    match name {
        "bouncing_ball" => Some(Box::new(BouncingBall::new())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_known_and_unknown() {
        for name in ENV_NAMES {
            assert!(make(name).is_some());
        }
        assert!(make("cartpole").is_none());
    }
}
