use crate::config::{self, WatermarkConfig};

/// Whether an image of this size has room for the frame at the configured
/// repetition count.
///
/// This is a density heuristic, not a bound: the safe zone (64% of the area)
/// must offer at least ten pixels per embedded position so the mark stays
/// sparse enough to be invisible. Images under `min_image_size` on either axis
/// never qualify.
pub fn has_capacity(width: u32, height: u32, cfg: &WatermarkConfig) -> bool {
    if width < cfg.min_image_size || height < cfg.min_image_size {
        return false;
    }
    let safe_pixels = f64::from(width) * f64::from(height) * config::SAFE_AREA_FRACTION;
    safe_pixels / config::PIXELS_PER_POSITION >= positions_needed(cfg) as f64
}

/// Total pixel writes for one mark.
pub fn positions_needed(cfg: &WatermarkConfig) -> usize {
    config::FRAME_BITS * cfg.repetitions as usize
}
