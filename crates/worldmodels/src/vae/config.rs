//! VAE hyperparameters.

use crate::{Result, WorldModelError};
use serde::{Deserialize, Serialize};

/// Construction parameters shared by the encoder, decoder and trainer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaeConfig {
    /// Number of image channels (3 for RGB).
    pub img_channels: i64,
    /// Dimensionality of the latent code.
    pub latent_size: i64,
    /// Initial learning rate.
    pub lr: f64,
    /// Weight decay coefficient.
    pub wd: f64,
    /// Maximum number of reconstruction grids logged per validation epoch.
    pub log_images: usize,
}

impl Default for VaeConfig {
    fn default() -> Self {
        Self {
            img_channels: 3,
            latent_size: 32,
            lr: env_or("VAE_LR", 1e-3),
            wd: env_or("VAE_WD", 0.0),
            log_images: 8,
        }
    }
}

/// Read a float default from the environment variable `key`.
fn env_or(key: &str, fallback: f64) -> f64 {
    parse_override(key, std::env::var(key).ok().as_deref(), fallback)
}

fn parse_override(key: &str, raw: Option<&str>, fallback: f64) -> f64 {
    let Some(raw) = raw else {
        return fallback;
    };
    match raw.trim().parse::<f64>() {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, value = raw, fallback, "Ignoring invalid override: {}", e);
            fallback
        }
    }
}

impl VaeConfig {
    /// Config for a given channel count and latent size, defaults elsewhere.
    pub fn new(img_channels: i64, latent_size: i64) -> Self {
        Self {
            img_channels,
            latent_size,
            ..Default::default()
        }
    }

    /// Set learning rate
    pub fn with_lr(mut self, lr: f64) -> Self {
        self.lr = lr;
        self
    }

    /// Set weight decay
    pub fn with_wd(mut self, wd: f64) -> Self {
        self.wd = wd;
        self
    }

    /// Set the diagnostic image cap
    pub fn with_log_images(mut self, log_images: usize) -> Self {
        self.log_images = log_images;
        self
    }

    /// Reject values the model cannot be built with.
    pub fn validate(&self) -> Result<()> {
        if self.img_channels <= 0 {
            return Err(WorldModelError::InvalidConfig(format!(
                "img_channels must be positive, got {}",
                self.img_channels
            )));
        }
        if self.latent_size <= 0 {
            return Err(WorldModelError::InvalidConfig(format!(
                "latent_size must be positive, got {}",
                self.latent_size
            )));
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(WorldModelError::InvalidConfig(format!(
                "lr must be a positive number, got {}",
                self.lr
            )));
        }
        if !(self.wd.is_finite() && self.wd >= 0.0) {
            return Err(WorldModelError::InvalidConfig(format!(
                "wd must be non-negative, got {}",
                self.wd
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = VaeConfig::default();
        assert_eq!(config.img_channels, 3);
        assert_eq!(config.latent_size, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(VaeConfig::new(0, 32).validate().is_err());
        assert!(VaeConfig::new(3, -1).validate().is_err());
        assert!(VaeConfig::new(3, 32).with_lr(0.0).validate().is_err());
        assert!(VaeConfig::new(3, 32).with_wd(-1e-3).validate().is_err());
    }

    #[test]
    fn test_override_parsing() {
        assert_eq!(parse_override("VAE_LR", None, 1e-3), 1e-3);
        assert_eq!(parse_override("VAE_LR", Some(" 5e-4 "), 1e-3), 5e-4);
        assert_eq!(parse_override("VAE_LR", Some("fast"), 1e-3), 1e-3);
        assert_eq!(parse_override("VAE_WD", Some(""), 0.0), 0.0);
    }

    #[test]
    fn test_override_read_from_environment() {
        let key = "WORLDMODELS_TEST_LR_OVERRIDE";
        std::env::set_var(key, "0.02");
        assert_eq!(env_or(key, 1e-3), 0.02);

        std::env::set_var(key, "not-a-number");
        assert_eq!(env_or(key, 1e-3), 1e-3);

        std::env::remove_var(key);
        assert_eq!(env_or(key, 1e-3), 1e-3);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: VaeConfig = serde_json::from_str(r#"{"latent_size": 16}"#).unwrap();
        assert_eq!(config.latent_size, 16);
        assert_eq!(config.img_channels, 3);
        assert_eq!(config.log_images, 8);
    }
}
