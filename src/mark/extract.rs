use crate::carrier::PixelBuffer;
use crate::config;
use crate::mark::schedule::Schedule;

/// Where the candidate buffer sits inside the image the schedule was made for.
///
/// A scheduled (x, y) is sampled at (x - offset_x, y - offset_y). The default
/// zero offset means the candidate is the marked image itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Translation {
    pub offset_x: u32,
    pub offset_y: u32,
}

/// Recovered bits plus vote statistics.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub bits: Vec<u8>,
    /// Mean per-bit confidence over all `bit_count` bits, in [0, 1].
    pub confidence: f64,
    /// Bits whose every repetition fell outside the candidate.
    pub unvoted_bits: usize,
}

/// Recover `bit_count` bits by deviation voting.
///
/// Each in-bounds repetition votes `value - 128`. The bit is 1 when the mean
/// vote is positive, and its confidence is `min(1, |mean| / 30)`. A bit with
/// no in-bounds repetition defaults to 0 with zero confidence.
pub fn extract(
    pixels: &PixelBuffer,
    schedule: &Schedule,
    bit_count: usize,
    channel: usize,
    translation: Translation,
) -> Extraction {
    let mut bits = Vec::with_capacity(bit_count);
    let mut confidence_sum = 0.0;
    let mut unvoted_bits = 0;

    for bit_index in 0..bit_count {
        let positions = schedule.positions(bit_index);

        let mut sum_deviation = 0.0;
        let mut votes = 0usize;
        for &(x, y) in positions {
            let sample = x
                .checked_sub(translation.offset_x)
                .zip(y.checked_sub(translation.offset_y))
                .and_then(|(cx, cy)| pixels.channel(cx, cy, channel));
            if let Some(value) = sample {
                sum_deviation += f64::from(value) - config::NEUTRAL_LEVEL;
                votes += 1;
            }
        }

        if votes == 0 {
            unvoted_bits += 1;
            bits.push(0);
            continue;
        }

        let mean = sum_deviation / votes as f64;
        bits.push(u8::from(mean > 0.0));
        confidence_sum += (mean.abs() / config::CONFIDENCE_NORMALIZER).min(1.0);
    }

    let confidence = if bit_count == 0 {
        0.0
    } else {
        confidence_sum / bit_count as f64
    };

    Extraction {
        bits,
        confidence,
        unvoted_bits,
    }
}
