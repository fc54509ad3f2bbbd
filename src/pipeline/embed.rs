use log::{debug, info, warn};

use crate::carrier::{ImageCodec, PixelBuffer};
use crate::config::{self, ConfigOverrides};
use crate::frame;
use crate::mark::{capacity, embed, schedule};
use crate::payload::WatermarkPayload;
use crate::pipeline::{WatermarkError, Watermarker};

impl<C: ImageCodec> Watermarker<C> {
    /// Full embed pipeline: bytes -> pixels -> frame bits -> schedule -> mark -> bytes.
    ///
    /// Fails before any pixel is touched when the dimensions cannot be read or
    /// either side is below `min_image_size`.
    pub fn embed(
        &self,
        original: &[u8],
        payload: &WatermarkPayload,
    ) -> Result<Vec<u8>, WatermarkError> {
        let (width, height) = self.codec.dimensions(original)?;
        self.check_min_size(width, height)?;

        let (pixels, format) = self.codec.decode(original)?;
        info!(
            "embedding watermark for viewer {:?} into {}x{} {:?} image",
            payload.viewer_id, width, height, format
        );

        let marked = self.embed_pixels(&pixels, payload)?;
        let bytes = self
            .codec
            .encode(&marked, format, self.config.output_quality)?;

        debug!("re-encoded marked image: {} bytes", bytes.len());
        Ok(bytes)
    }

    /// Mark raw RGBA pixels. Returns a new buffer; `pixels` is left as is.
    pub fn embed_pixels(
        &self,
        pixels: &PixelBuffer,
        payload: &WatermarkPayload,
    ) -> Result<PixelBuffer, WatermarkError> {
        let (width, height) = (pixels.width(), pixels.height());
        self.check_min_size(width, height)?;
        if !capacity::has_capacity(width, height, &self.config) {
            warn!(
                "{}x{} image is below the density guideline for {} positions; embedding anyway",
                width,
                height,
                capacity::positions_needed(&self.config)
            );
        }

        let bits = frame::encode(payload);
        let schedule = schedule::schedule(
            width,
            height,
            config::FRAME_BITS,
            self.config.repetitions,
            &self.config.secret_key,
        );

        Ok(embed::embed(
            pixels,
            &schedule,
            &bits,
            self.config.strength,
            config::EMBED_CHANNEL,
        ))
    }

    fn check_min_size(&self, width: u32, height: u32) -> Result<(), WatermarkError> {
        let min = self.config.min_image_size;
        if width < min || height < min {
            return Err(WatermarkError::ImageTooSmall { width, height, min });
        }
        Ok(())
    }
}

/// Embed `payload` into an encoded image using defaults plus `overrides`.
pub fn embed_watermark(
    original: &[u8],
    payload: &WatermarkPayload,
    overrides: Option<&ConfigOverrides>,
) -> Result<Vec<u8>, WatermarkError> {
    Watermarker::from_overrides(overrides)?.embed(original, payload)
}
