pub mod embed;
pub mod extract;
pub mod hook;
pub mod scan;

use log::warn;
use thiserror::Error;

use crate::carrier::{CarrierError, ImageCodec, ImageRsCodec};
use crate::config::{self, ConfigError, ConfigOverrides, WatermarkConfig};
use crate::frame;
use crate::payload::WatermarkPayload;
use extract::DecodedWatermark;
use hook::LeakHook;

/// Failures that stop an embed or extract before any mark work is done.
///
/// A caller that gets one of these must fail the request. Serving the
/// unmarked original instead is never an acceptable fallback.
#[derive(Error, Debug)]
pub enum WatermarkError {
    #[error("image is {width}x{height}, below the {min}px minimum")]
    ImageTooSmall { width: u32, height: u32, min: u32 },
    #[error(transparent)]
    Carrier(#[from] CarrierError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Embeds and extracts marks with one validated configuration.
pub struct Watermarker<C = ImageRsCodec> {
    config: WatermarkConfig,
    codec: C,
}

impl Watermarker<ImageRsCodec> {
    pub fn new(config: WatermarkConfig) -> Result<Self, WatermarkError> {
        Self::with_codec(config, ImageRsCodec)
    }

    /// Defaults merged with optional partial overrides.
    pub fn from_overrides(overrides: Option<&ConfigOverrides>) -> Result<Self, WatermarkError> {
        let config = match overrides {
            Some(o) => WatermarkConfig::default().merged(o),
            None => WatermarkConfig::default(),
        };
        Self::new(config)
    }
}

impl<C: ImageCodec> Watermarker<C> {
    pub fn with_codec(cfg: WatermarkConfig, codec: C) -> Result<Self, WatermarkError> {
        cfg.validate()?;
        if cfg.uses_default_key() {
            warn!(
                "using the built-in development key; set {} in production",
                config::ENV_SECRET_KEY
            );
        }
        Ok(Self { config: cfg, codec })
    }

    pub fn config(&self) -> &WatermarkConfig {
        &self.config
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }
}

/// Number of bits every mark carries (592).
pub fn payload_bit_length() -> usize {
    config::FRAME_BITS
}

/// Result of a full embed → hook → extract roundtrip.
#[derive(Debug)]
pub struct RoundtripResult {
    pub decoded: DecodedWatermark,
    /// `true` if the mark validated and every field came back as embedded.
    pub matched: bool,
}

/// Embed `payload` into `original`, pass the result through `hook`, and read
/// it back.
///
/// Fields are compared after the fixed-width truncation the frame applies, so
/// an over-long id still matches its 28/32-character prefix.
pub fn roundtrip<H: LeakHook>(
    original: &[u8],
    payload: &WatermarkPayload,
    cfg: &WatermarkConfig,
    hook: &H,
) -> anyhow::Result<RoundtripResult> {
    let marker = Watermarker::new(cfg.clone())?;
    let (width, height) = marker.codec().dimensions(original)?;

    let marked = marker.embed(original, payload)?;
    let leaked = hook.after_embed(marked)?;

    let decoded = match hook.crop_hint(width, height) {
        Some(hint) => marker.extract_cropped(&leaked, hint)?,
        None => marker.extract(&leaked)?,
    };

    let expected = frame::decode(&frame::encode(payload)).payload;
    let matched = decoded.valid && decoded.payload() == expected;

    Ok(RoundtripResult { decoded, matched })
}
