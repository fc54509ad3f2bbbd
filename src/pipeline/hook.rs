use anyhow::Result;

use crate::carrier::{CarrierFormat, ImageCodec, ImageRsCodec};
use crate::pipeline::extract::CropHint;

/// A hook invoked between embedding and extraction in a [`roundtrip`](super::roundtrip).
///
/// Implement this trait to model the channel a leaked copy travels through:
/// screenshots, messenger re-compression, cropping.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use tracemark::LeakHook;
///
/// struct Messenger;
///
/// impl LeakHook for Messenger {
///     fn after_embed(&self, marked: Vec<u8>) -> Result<Vec<u8>> {
///         // hand the bytes to some lossy channel and return what comes back
///         Ok(marked)
///     }
/// }
/// ```
pub trait LeakHook {
    /// Called with the freshly marked image. Return the bytes the extractor
    /// should read.
    fn after_embed(&self, marked: Vec<u8>) -> Result<Vec<u8>>;

    /// Geometry of the returned image relative to the marked one, if the
    /// hook crops. `None` means same dimensions, no offset.
    fn crop_hint(&self, _original_width: u32, _original_height: u32) -> Option<CropHint> {
        None
    }
}

/// A no-op hook that passes the marked image through unchanged.
pub struct NoopHook;

impl LeakHook for NoopHook {
    fn after_embed(&self, marked: Vec<u8>) -> Result<Vec<u8>> {
        Ok(marked)
    }
}

/// Re-encodes the marked image as JPEG at `quality`.
pub struct RecompressHook {
    pub quality: u8,
}

impl LeakHook for RecompressHook {
    fn after_embed(&self, marked: Vec<u8>) -> Result<Vec<u8>> {
        let codec = ImageRsCodec;
        let (pixels, _) = codec.decode(&marked)?;
        Ok(codec.encode(&pixels, CarrierFormat::Jpeg, self.quality)?)
    }
}

/// Cuts out a `width` x `height` region at (x, y), keeping the carrier format.
pub struct CropHook {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl LeakHook for CropHook {
    fn after_embed(&self, marked: Vec<u8>) -> Result<Vec<u8>> {
        let codec = ImageRsCodec;
        let (pixels, format) = codec.decode(&marked)?;
        let cropped = pixels.crop(self.x, self.y, self.width, self.height);
        Ok(codec.encode(&cropped, format, 100)?)
    }

    fn crop_hint(&self, original_width: u32, original_height: u32) -> Option<CropHint> {
        Some(CropHint {
            original_width,
            original_height,
            offset_x: self.x,
            offset_y: self.y,
        })
    }
}
