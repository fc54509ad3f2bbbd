use std::env;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

pub const MAGIC: u32 = 0x54524D4B; // "TRMK"
pub const FRAME_VERSION: u8 = 1;

// Frame field widths in bytes
pub const MAGIC_SIZE: usize = 4;
pub const VERSION_SIZE: usize = 1;
pub const VIEWER_ID_SIZE: usize = 28;
pub const TIMESTAMP_SIZE: usize = 8;
pub const SCREENSHOT_ID_SIZE: usize = 32;
pub const CHECKSUM_SIZE: usize = 1;

/// Bytes covered by the checksum: everything before the checksum byte.
pub const CHECKSUMMED_SIZE: usize =
    MAGIC_SIZE + VERSION_SIZE + VIEWER_ID_SIZE + TIMESTAMP_SIZE + SCREENSHOT_ID_SIZE;
pub const FRAME_SIZE: usize = CHECKSUMMED_SIZE + CHECKSUM_SIZE;

/// Number of bits embedded into every marked image (592).
pub const FRAME_BITS: usize = FRAME_SIZE * 8;

// Embedding parameters
pub const DEFAULT_STRENGTH: f64 = 0.15;
pub const DEFAULT_REPETITIONS: u32 = 5;
/// Upper bound on `repetitions`; keeps a schedule at a few hundred thousand coordinates.
pub const MAX_REPETITIONS: u32 = 1024;
pub const DEFAULT_MIN_IMAGE_SIZE: u32 = 64;
pub const DEFAULT_OUTPUT_QUALITY: u8 = 90;

/// Development key. Deployments must set their own through `TRACEMARK_SECRET_KEY`.
pub const DEFAULT_SECRET_KEY: &str = "tracemark-development-key";

// Pixel layout: RGBA8, the green channel carries the mark.
pub const CHANNELS: usize = 4;
pub const EMBED_CHANNEL: usize = 1;

/// Each edge loses `dimension / MARGIN_DIVISOR` pixels to the safe-zone margin.
pub const MARGIN_DIVISOR: u32 = 10;

// Extraction constants
pub const NEUTRAL_LEVEL: f64 = 128.0;
/// Average deviation considered a full-strength vote.
pub const CONFIDENCE_NORMALIZER: f64 = 30.0;
pub const PROBABLE_CONFIDENCE_THRESHOLD: f64 = 0.3;

// Capacity heuristic
pub const SAFE_AREA_FRACTION: f64 = 0.64; // 0.8 * 0.8
pub const PIXELS_PER_POSITION: f64 = 10.0;

// Environment variables read by `WatermarkConfig::from_env`
pub const ENV_SECRET_KEY: &str = "TRACEMARK_SECRET_KEY";
pub const ENV_STRENGTH: &str = "TRACEMARK_STRENGTH";
pub const ENV_REPETITIONS: &str = "TRACEMARK_REPETITIONS";
pub const ENV_MIN_IMAGE_SIZE: &str = "TRACEMARK_MIN_IMAGE_SIZE";
pub const ENV_OUTPUT_QUALITY: &str = "TRACEMARK_OUTPUT_QUALITY";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("strength must be in (0, 1], got {0}")]
    InvalidStrength(f64),
    #[error("repetitions must be at least 1")]
    ZeroRepetitions,
    #[error("repetitions must be at most {max}, got {got}")]
    TooManyRepetitions { got: u32, max: u32 },
    #[error("output quality must be in 0..=100, got {0}")]
    InvalidQuality(u8),
    #[error("secret key must not be empty")]
    EmptySecretKey,
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Runtime configuration for an embed/extract operation.
///
/// A value object: copied per call and never mutated by the codec.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkConfig {
    /// Fraction of the full channel range used as the perturbation magnitude.
    pub strength: f64,
    /// How many times each frame bit is embedded.
    pub repetitions: u32,
    /// Seeds the position schedule. Embedder and extractor must agree on it.
    pub secret_key: String,
    /// Smallest accepted width and height, in pixels.
    pub min_image_size: u32,
    /// Re-encoding quality for lossy carriers.
    pub output_quality: u8,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            strength: DEFAULT_STRENGTH,
            repetitions: DEFAULT_REPETITIONS,
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            min_image_size: DEFAULT_MIN_IMAGE_SIZE,
            output_quality: DEFAULT_OUTPUT_QUALITY,
        }
    }
}

/// Partial configuration. Every `Some` field replaces the base value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigOverrides {
    pub strength: Option<f64>,
    pub repetitions: Option<u32>,
    pub secret_key: Option<String>,
    pub min_image_size: Option<u32>,
    pub output_quality: Option<u8>,
}

impl WatermarkConfig {
    /// Defaults overlaid with the `TRACEMARK_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let overrides = ConfigOverrides {
            strength: env_value(ENV_STRENGTH)?,
            repetitions: env_value(ENV_REPETITIONS)?,
            secret_key: env::var(ENV_SECRET_KEY).ok(),
            min_image_size: env_value(ENV_MIN_IMAGE_SIZE)?,
            output_quality: env_value(ENV_OUTPUT_QUALITY)?,
        };
        let cfg = Self::default().merged(&overrides);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Return a copy of `self` with `overrides` applied.
    pub fn merged(&self, overrides: &ConfigOverrides) -> Self {
        Self {
            strength: overrides.strength.unwrap_or(self.strength),
            repetitions: overrides.repetitions.unwrap_or(self.repetitions),
            secret_key: overrides
                .secret_key
                .clone()
                .unwrap_or_else(|| self.secret_key.clone()),
            min_image_size: overrides.min_image_size.unwrap_or(self.min_image_size),
            output_quality: overrides.output_quality.unwrap_or(self.output_quality),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.strength > 0.0 && self.strength <= 1.0) {
            return Err(ConfigError::InvalidStrength(self.strength));
        }
        if self.repetitions == 0 {
            return Err(ConfigError::ZeroRepetitions);
        }
        if self.repetitions > MAX_REPETITIONS {
            return Err(ConfigError::TooManyRepetitions {
                got: self.repetitions,
                max: MAX_REPETITIONS,
            });
        }
        if self.output_quality > 100 {
            return Err(ConfigError::InvalidQuality(self.output_quality));
        }
        if self.secret_key.is_empty() {
            return Err(ConfigError::EmptySecretKey);
        }
        Ok(())
    }

    pub fn uses_default_key(&self) -> bool {
        self.secret_key == DEFAULT_SECRET_KEY
    }
}

fn env_value<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_bits_constant() {
        assert_eq!(FRAME_SIZE, 74);
        assert_eq!(FRAME_BITS, 32 + 8 + 224 + 64 + 256 + 8);
    }

    #[test]
    fn test_partial_overrides_merge_onto_defaults() {
        let base = WatermarkConfig::default();
        let overrides = ConfigOverrides {
            repetitions: Some(9),
            secret_key: Some("family-42".into()),
            ..Default::default()
        };
        let cfg = base.merged(&overrides);
        assert_eq!(cfg.repetitions, 9);
        assert_eq!(cfg.secret_key, "family-42");
        assert_eq!(cfg.strength, DEFAULT_STRENGTH);
        assert_eq!(cfg.min_image_size, DEFAULT_MIN_IMAGE_SIZE);
        assert_eq!(cfg.output_quality, DEFAULT_OUTPUT_QUALITY);
        // base untouched
        assert_eq!(base.repetitions, DEFAULT_REPETITIONS);
    }

    #[test]
    fn test_overrides_from_json() {
        let overrides: ConfigOverrides =
            serde_json::from_str(r#"{"strength": 0.2, "outputQuality": 75}"#).unwrap();
        let cfg = WatermarkConfig::default().merged(&overrides);
        assert_eq!(cfg.strength, 0.2);
        assert_eq!(cfg.output_quality, 75);
        assert_eq!(cfg.repetitions, DEFAULT_REPETITIONS);
    }

    // The only test touching TRACEMARK_* variables, so it cannot race another.
    #[test]
    fn test_from_env() {
        env::set_var(ENV_SECRET_KEY, "prod-key");
        env::set_var(ENV_REPETITIONS, " 7 ");
        let cfg = WatermarkConfig::from_env().unwrap();
        assert_eq!(cfg.secret_key, "prod-key");
        assert_eq!(cfg.repetitions, 7);
        assert_eq!(cfg.strength, DEFAULT_STRENGTH);
        assert!(!cfg.uses_default_key());

        env::set_var(ENV_STRENGTH, "strong");
        assert_eq!(
            WatermarkConfig::from_env(),
            Err(ConfigError::InvalidEnv { var: ENV_STRENGTH, value: "strong".into() })
        );

        env::set_var(ENV_STRENGTH, "2.0");
        assert_eq!(WatermarkConfig::from_env(), Err(ConfigError::InvalidStrength(2.0)));

        for var in [ENV_SECRET_KEY, ENV_REPETITIONS, ENV_STRENGTH] {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_validation() {
        assert!(WatermarkConfig::default().validate().is_ok());

        let cfg = WatermarkConfig { strength: 0.0, ..Default::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidStrength(0.0)));

        let cfg = WatermarkConfig { strength: 1.5, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidStrength(_))));

        let cfg = WatermarkConfig { strength: f64::NAN, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidStrength(_))));

        let cfg = WatermarkConfig { repetitions: 0, ..Default::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroRepetitions));

        let cfg = WatermarkConfig { repetitions: MAX_REPETITIONS, ..Default::default() };
        assert!(cfg.validate().is_ok());

        let cfg = WatermarkConfig { repetitions: u32::MAX, ..Default::default() };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::TooManyRepetitions { got: u32::MAX, max: MAX_REPETITIONS })
        );

        let cfg = WatermarkConfig { output_quality: 101, ..Default::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidQuality(101)));

        let cfg = WatermarkConfig { secret_key: String::new(), ..Default::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::EmptySecretKey));
    }
}
