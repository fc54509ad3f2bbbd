use crate::carrier::PixelBuffer;
use crate::mark::schedule::Schedule;

/// Embed `bits` into a copy of `pixels`.
///
/// Every scheduled coordinate of bit `i` has `channel` shifted by
/// `round(strength * 255)`, up for a 1 and down for a 0, clamped to
/// `[0, 255]`. Shifts on a pixel scheduled more than once accumulate in
/// schedule order. The caller's buffer is never modified.
pub fn embed(
    pixels: &PixelBuffer,
    schedule: &Schedule,
    bits: &[u8],
    strength: f64,
    channel: usize,
) -> PixelBuffer {
    let mut marked = pixels.clone();
    let delta = (strength * 255.0).round() as i16;

    for (positions, &bit) in schedule.iter().zip(bits) {
        let signed = if bit != 0 { delta } else { -delta };
        for &(x, y) in positions {
            if let Some(value) = marked.channel(x, y, channel) {
                let shifted = (i16::from(value) + signed).clamp(0, 255) as u8;
                marked.set_channel(x, y, channel, shifted);
            }
        }
    }

    marked
}
