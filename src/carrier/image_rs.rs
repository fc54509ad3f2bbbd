use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, ImageReader, RgbaImage};

use crate::carrier::{CarrierError, CarrierFormat, ImageCodec, PixelBuffer};

/// [`ImageCodec`] backed by the `image` crate.
///
/// PNG carriers stay PNG; JPEG and every other decodable format are written
/// back as JPEG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageRsCodec;

impl ImageCodec for ImageRsCodec {
    fn dimensions(&self, bytes: &[u8]) -> Result<(u32, u32), CarrierError> {
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| CarrierError::UnreadableDimensions(e.to_string()))?
            .into_dimensions()
            .map_err(|e| CarrierError::UnreadableDimensions(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<(PixelBuffer, CarrierFormat), CarrierError> {
        let format = image::guess_format(bytes).map_err(|e| CarrierError::Decode(e.to_string()))?;
        let img = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| CarrierError::Decode(e.to_string()))?;

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let pixels = PixelBuffer::new(width, height, rgba.into_raw())?;

        let carrier_format = match format {
            ImageFormat::Png => CarrierFormat::Png,
            _ => CarrierFormat::Jpeg,
        };
        Ok((pixels, carrier_format))
    }

    fn encode(
        &self,
        pixels: &PixelBuffer,
        format: CarrierFormat,
        quality: u8,
    ) -> Result<Vec<u8>, CarrierError> {
        let (width, height) = (pixels.width(), pixels.height());
        let encode_err = |reason: String| CarrierError::Encode { format, reason };
        let mut buffer = Vec::new();

        match format {
            CarrierFormat::Png => {
                PngEncoder::new(&mut buffer)
                    .write_image(pixels.as_raw(), width, height, ExtendedColorType::Rgba8)
                    .map_err(|e| encode_err(e.to_string()))?;
            }
            CarrierFormat::Jpeg => {
                // JPEG has no alpha channel
                let rgba = RgbaImage::from_raw(width, height, pixels.as_raw().to_vec())
                    .ok_or_else(|| encode_err("pixel buffer does not match dimensions".into()))?;
                let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();
                JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
                    .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                    .map_err(|e| encode_err(e.to_string()))?;
            }
        }

        Ok(buffer)
    }
}
