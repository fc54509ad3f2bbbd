//! The image codec the watermark rides on.
//!
//! The mark itself never touches a compressed format: it works on a raw RGBA8
//! [`PixelBuffer`], and an [`ImageCodec`] moves images between bytes and
//! pixels.

mod image_rs;

pub use image_rs::ImageRsCodec;

use thiserror::Error;

use crate::config;

#[derive(Error, Debug)]
pub enum CarrierError {
    #[error("unreadable image dimensions: {0}")]
    UnreadableDimensions(String),
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("failed to encode {format:?} image: {reason}")]
    Encode { format: CarrierFormat, reason: String },
    #[error("pixel buffer length mismatch: {width}x{height} RGBA needs {need} bytes, have {have}")]
    BufferLength {
        width: u32,
        height: u32,
        need: usize,
        have: usize,
    },
}

/// Compressed format a carrier is written back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarrierFormat {
    /// Lossless; the quality setting is ignored.
    Png,
    Jpeg,
}

/// Encode/decode collaborator for carrier images.
pub trait ImageCodec {
    /// Read width and height without decoding pixel data.
    fn dimensions(&self, bytes: &[u8]) -> Result<(u32, u32), CarrierError>;

    /// Decode into RGBA8 pixels, reporting the format to re-encode in.
    fn decode(&self, bytes: &[u8]) -> Result<(PixelBuffer, CarrierFormat), CarrierError>;

    /// Re-encode pixels. `quality` applies to lossy formats only.
    fn encode(
        &self,
        pixels: &PixelBuffer,
        format: CarrierFormat,
        quality: u8,
    ) -> Result<Vec<u8>, CarrierError>;
}

/// Row-major RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, CarrierError> {
        let need = width as usize * height as usize * config::CHANNELS;
        if data.len() != need {
            return Err(CarrierError::BufferLength {
                width,
                height,
                need,
                have: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    /// A buffer with every pixel set to `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * config::CHANNELS)
            .collect();
        Self { width, height, data }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    fn offset(&self, x: u32, y: u32, channel: usize) -> Option<usize> {
        if x >= self.width || y >= self.height || channel >= config::CHANNELS {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * config::CHANNELS + channel)
    }

    /// Channel value at (x, y), or `None` outside the image.
    pub fn channel(&self, x: u32, y: u32, channel: usize) -> Option<u8> {
        self.offset(x, y, channel).map(|i| self.data[i])
    }

    /// Write a channel value. Returns false when (x, y) lies outside the image.
    pub fn set_channel(&mut self, x: u32, y: u32, channel: usize, value: u8) -> bool {
        match self.offset(x, y, channel) {
            Some(i) => {
                self.data[i] = value;
                true
            }
            None => false,
        }
    }

    /// Copy out the `width` x `height` region whose top-left corner is (x, y),
    /// clipped to the image.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> PixelBuffer {
        let x0 = x.min(self.width);
        let y0 = y.min(self.height);
        let x1 = x.saturating_add(width).min(self.width);
        let y1 = y.saturating_add(height).min(self.height);
        let row_len = (x1 - x0) as usize * config::CHANNELS;

        let mut data = Vec::with_capacity(row_len * (y1 - y0) as usize);
        for row in y0..y1 {
            let start = (row as usize * self.width as usize + x0 as usize) * config::CHANNELS;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }
        PixelBuffer {
            width: x1 - x0,
            height: y1 - y0,
            data,
        }
    }
}
