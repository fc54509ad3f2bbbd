pub mod carrier;
pub mod config;
pub mod frame;
mod integrity;
pub mod mark;
pub mod payload;
pub mod pipeline;

pub use carrier::{CarrierError, CarrierFormat, ImageCodec, ImageRsCodec, PixelBuffer};
pub use config::{ConfigError, ConfigOverrides, WatermarkConfig};
pub use payload::WatermarkPayload;
pub use pipeline::embed::embed_watermark;
pub use pipeline::extract::{
    extract_watermark, has_watermark_capacity, is_probably_watermarked, CropHint,
    DecodedWatermark,
};
pub use pipeline::hook::{CropHook, LeakHook, NoopHook, RecompressHook};
pub use pipeline::scan::{scan_files, ScanReport};
pub use pipeline::{payload_bit_length, roundtrip, RoundtripResult, WatermarkError, Watermarker};
