use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::carrier::{ImageCodec, PixelBuffer};
use crate::config::{self, ConfigOverrides};
use crate::frame;
use crate::mark::extract::{self, Translation};
use crate::mark::{capacity, schedule};
use crate::payload::WatermarkPayload;
use crate::pipeline::{WatermarkError, Watermarker};

/// What the extractor recovered from a candidate image.
///
/// `valid == false` with a nonzero `confidence` is the normal outcome for an
/// unmarked image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedWatermark {
    pub viewer_id: String,
    pub view_timestamp: u64,
    pub screenshot_id: String,
    /// Mean per-bit vote strength, in [0, 1].
    pub confidence: f64,
    /// Magic, version and checksum all verified.
    pub valid: bool,
}

impl DecodedWatermark {
    pub fn payload(&self) -> WatermarkPayload {
        WatermarkPayload::new(
            self.viewer_id.clone(),
            self.view_timestamp,
            self.screenshot_id.clone(),
        )
    }

    /// Quick screening verdict: valid and more than weakly voted.
    pub fn is_probable(&self) -> bool {
        self.valid && self.confidence > config::PROBABLE_CONFIDENCE_THRESHOLD
    }
}

/// Geometry of a crop taken from a marked image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropHint {
    pub original_width: u32,
    pub original_height: u32,
    /// Position of the candidate's top-left pixel in the original.
    pub offset_x: u32,
    pub offset_y: u32,
}

impl<C: ImageCodec> Watermarker<C> {
    /// Read a mark, assuming the candidate has the marked image's dimensions.
    ///
    /// Only unreadable input is an error; anything decodable yields an answer.
    pub fn extract(&self, candidate: &[u8]) -> Result<DecodedWatermark, WatermarkError> {
        let (width, height) = self.codec.dimensions(candidate)?;
        let (pixels, _) = self.codec.decode(candidate)?;
        info!("extracting watermark from {}x{} image", width, height);
        Ok(self.extract_pixels(&pixels, width, height, Translation::default()))
    }

    /// Read a mark from a crop of a marked image, scheduling against the
    /// original dimensions.
    pub fn extract_cropped(
        &self,
        candidate: &[u8],
        hint: CropHint,
    ) -> Result<DecodedWatermark, WatermarkError> {
        let (pixels, _) = self.codec.decode(candidate)?;
        info!(
            "extracting watermark from {}x{} crop at ({}, {}) of {}x{}",
            pixels.width(),
            pixels.height(),
            hint.offset_x,
            hint.offset_y,
            hint.original_width,
            hint.original_height
        );
        let translation = Translation {
            offset_x: hint.offset_x,
            offset_y: hint.offset_y,
        };
        Ok(self.extract_pixels(
            &pixels,
            hint.original_width,
            hint.original_height,
            translation,
        ))
    }

    /// Read a mark from raw pixels using a schedule for a `width` x `height` image.
    pub fn extract_pixels(
        &self,
        pixels: &PixelBuffer,
        width: u32,
        height: u32,
        translation: Translation,
    ) -> DecodedWatermark {
        let schedule = schedule::schedule(
            width,
            height,
            config::FRAME_BITS,
            self.config.repetitions,
            &self.config.secret_key,
        );
        let extraction = extract::extract(
            pixels,
            &schedule,
            config::FRAME_BITS,
            config::EMBED_CHANNEL,
            translation,
        );
        if extraction.unvoted_bits > 0 {
            debug!(
                "{} of {} bits had no in-bounds repetition",
                extraction.unvoted_bits,
                config::FRAME_BITS
            );
        }

        let decoded = frame::decode(&extraction.bits);
        debug!(
            "frame checks: magic={} version={} checksum={} confidence={:.3}",
            decoded.magic_valid, decoded.version_valid, decoded.checksum_valid, extraction.confidence
        );

        let valid = decoded.is_valid();
        DecodedWatermark {
            viewer_id: decoded.payload.viewer_id,
            view_timestamp: decoded.payload.view_timestamp,
            screenshot_id: decoded.payload.screenshot_id,
            confidence: extraction.confidence,
            valid,
        }
    }

    /// End-to-end screening: `valid && confidence > 0.3`.
    pub fn is_probably_watermarked(&self, candidate: &[u8]) -> Result<bool, WatermarkError> {
        Ok(self.extract(candidate)?.is_probable())
    }

    /// Capacity check on encoded bytes. Unreadable input has no capacity.
    pub fn has_capacity(&self, image: &[u8]) -> bool {
        match self.codec.dimensions(image) {
            Ok((width, height)) => capacity::has_capacity(width, height, &self.config),
            Err(e) => {
                debug!("capacity check on unreadable image: {}", e);
                false
            }
        }
    }
}

/// Extract a mark from an encoded image using defaults plus `overrides`.
pub fn extract_watermark(
    candidate: &[u8],
    overrides: Option<&ConfigOverrides>,
) -> Result<DecodedWatermark, WatermarkError> {
    Watermarker::from_overrides(overrides)?.extract(candidate)
}

/// Whether an encoded image can carry a mark. Never fails: unreadable images
/// and invalid overrides both answer `false`.
pub fn has_watermark_capacity(image: &[u8], overrides: Option<&ConfigOverrides>) -> bool {
    Watermarker::from_overrides(overrides)
        .map(|marker| marker.has_capacity(image))
        .unwrap_or(false)
}

pub fn is_probably_watermarked(
    candidate: &[u8],
    overrides: Option<&ConfigOverrides>,
) -> Result<bool, WatermarkError> {
    Watermarker::from_overrides(overrides)?.is_probably_watermarked(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::{CarrierFormat, ImageRsCodec};
    use crate::config::{ConfigError, WatermarkConfig};
    use crate::pipeline::embed::embed_watermark;
    use crate::pipeline::tests::{sample_payload, synthetic_image};
    use rand::RngCore;

    #[test]
    fn test_concrete_scenario() {
        let original = synthetic_image(512, 512, CarrierFormat::Png);
        let marked = embed_watermark(&original, &sample_payload(), None).unwrap();
        let decoded = extract_watermark(&marked, None).unwrap();

        assert!(decoded.valid);
        assert_eq!(decoded.viewer_id, "user123");
        assert_eq!(decoded.screenshot_id, "screenshot123");
        assert_eq!(decoded.view_timestamp, 1_700_000_000_000);
        assert!(decoded.confidence > 0.5, "confidence {}", decoded.confidence);
        assert!(decoded.confidence <= 1.0);
    }

    #[test]
    fn test_roundtrip_extremes() {
        let original = synthetic_image(256, 256, CarrierFormat::Png);
        for payload in [
            WatermarkPayload::new("", 0, ""),
            WatermarkPayload::new("a".repeat(28), u64::MAX, "b".repeat(32)),
            WatermarkPayload::new("viewer-9", 1, "shot"),
        ] {
            let marked = embed_watermark(&original, &payload, None).unwrap();
            let decoded = extract_watermark(&marked, None).unwrap();
            assert!(decoded.valid, "payload {:?}", payload);
            assert_eq!(decoded.payload(), payload);
        }
    }

    #[test]
    fn test_jpeg_carrier_at_full_quality() {
        let original = synthetic_image(512, 512, CarrierFormat::Jpeg);
        let overrides = ConfigOverrides { output_quality: Some(100), ..Default::default() };
        let marked = embed_watermark(&original, &sample_payload(), Some(&overrides)).unwrap();
        let decoded = extract_watermark(&marked, Some(&overrides)).unwrap();

        assert!(decoded.valid);
        assert_eq!(decoded.payload(), sample_payload());
        assert!(decoded.confidence > 0.5);
    }

    #[test]
    fn test_jpeg_carrier_at_default_quality() {
        let original = synthetic_image(512, 512, CarrierFormat::Jpeg);
        let marked = embed_watermark(&original, &sample_payload(), None).unwrap();
        assert_eq!(ImageRsCodec.decode(&marked).unwrap().1, CarrierFormat::Jpeg);

        let decoded = extract_watermark(&marked, None).unwrap();
        assert!(decoded.valid);
        assert_eq!(decoded.viewer_id, "user123");
        assert_eq!(decoded.screenshot_id, "screenshot123");
        assert_eq!(decoded.view_timestamp, 1_700_000_000_000);
        // quality 90 roughly halves the vote margin
        assert!(decoded.confidence > config::PROBABLE_CONFIDENCE_THRESHOLD);
        assert!(is_probably_watermarked(&marked, None).unwrap());
    }

    #[test]
    fn test_oversized_repetitions_rejected() {
        let original = synthetic_image(64, 64, CarrierFormat::Png);
        let overrides = ConfigOverrides { repetitions: Some(u32::MAX), ..Default::default() };

        assert!(matches!(
            extract_watermark(&original, Some(&overrides)),
            Err(WatermarkError::Config(ConfigError::TooManyRepetitions { .. }))
        ));
        assert!(matches!(
            embed_watermark(&original, &sample_payload(), Some(&overrides)),
            Err(WatermarkError::Config(ConfigError::TooManyRepetitions { .. }))
        ));
        assert!(!has_watermark_capacity(&original, Some(&overrides)));
    }

    #[test]
    fn test_plain_gray_is_not_watermarked() {
        let gray = synthetic_image(100, 100, CarrierFormat::Png);
        let decoded = extract_watermark(&gray, None).unwrap();
        assert!(!decoded.valid);
        assert!(!is_probably_watermarked(&gray, None).unwrap());
    }

    #[test]
    fn test_noise_is_not_watermarked() {
        let mut data = vec![0u8; 256 * 256 * 4];
        rand::thread_rng().fill_bytes(&mut data);
        let noise = PixelBuffer::new(256, 256, data).unwrap();
        let bytes = ImageRsCodec.encode(&noise, CarrierFormat::Png, 90).unwrap();

        let decoded = extract_watermark(&bytes, None).unwrap();
        assert!(!decoded.valid);
        assert!((0.0..=1.0).contains(&decoded.confidence));
        // random bytes vote strongly in both directions
        assert!(decoded.confidence > 0.0);
    }

    #[test]
    fn test_wrong_key_does_not_recover() {
        let original = synthetic_image(300, 300, CarrierFormat::Png);
        let key_a = ConfigOverrides { secret_key: Some("A".into()), ..Default::default() };
        let key_b = ConfigOverrides { secret_key: Some("B".into()), ..Default::default() };

        let marked = embed_watermark(&original, &sample_payload(), Some(&key_a)).unwrap();
        let decoded = extract_watermark(&marked, Some(&key_b)).unwrap();
        assert!(!decoded.valid);
        assert_ne!(decoded.payload(), sample_payload());

        let decoded = extract_watermark(&marked, Some(&key_a)).unwrap();
        assert!(decoded.valid);
    }

    #[test]
    fn test_central_crop_still_answers() {
        let original = synthetic_image(200, 200, CarrierFormat::Png);
        let marked = embed_watermark(&original, &sample_payload(), None).unwrap();

        let codec = ImageRsCodec;
        let (pixels, _) = codec.decode(&marked).unwrap();
        let crop = pixels.crop(25, 25, 150, 150);
        let crop_bytes = codec.encode(&crop, CarrierFormat::Png, 90).unwrap();

        let decoded = extract_watermark(&crop_bytes, None).unwrap();
        assert!((0.0..=1.0).contains(&decoded.confidence));

        let hint = CropHint {
            original_width: 200,
            original_height: 200,
            offset_x: 25,
            offset_y: 25,
        };
        let marker = Watermarker::new(WatermarkConfig::default()).unwrap();
        let realigned = marker.extract_cropped(&crop_bytes, hint).unwrap();
        assert!((0.0..=1.0).contains(&realigned.confidence));
    }

    #[test]
    fn test_capacity_on_bytes() {
        assert!(!has_watermark_capacity(&synthetic_image(8, 8, CarrierFormat::Png), None));
        assert!(has_watermark_capacity(&synthetic_image(1000, 1000, CarrierFormat::Png), None));
        assert!(!has_watermark_capacity(b"garbage", None));

        let bad = ConfigOverrides { repetitions: Some(0), ..Default::default() };
        assert!(!has_watermark_capacity(&synthetic_image(1000, 1000, CarrierFormat::Png), Some(&bad)));
    }

    #[test]
    fn test_extract_rejects_unreadable() {
        assert!(extract_watermark(b"\x00\x01\x02", None).is_err());
    }

    #[test]
    fn test_extract_accepts_small_images() {
        // only embedding enforces the minimum size
        let tiny = synthetic_image(16, 16, CarrierFormat::Png);
        let decoded = extract_watermark(&tiny, None).unwrap();
        assert!(!decoded.valid);
    }
}
