use log::debug;

use crate::config;
use crate::mark::prng::SequenceGenerator;

/// Embedding coordinates for every frame bit: `repetitions` (x, y) pairs per bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    repetitions: usize,
    coords: Vec<(u32, u32)>,
}

impl Schedule {
    pub fn bit_count(&self) -> usize {
        self.coords.len() / self.repetitions.max(1)
    }

    pub fn repetitions(&self) -> usize {
        self.repetitions
    }

    /// Coordinates carrying bit `bit_index`. Empty past the last bit.
    pub fn positions(&self, bit_index: usize) -> &[(u32, u32)] {
        let start = bit_index.checked_mul(self.repetitions);
        let end = start.and_then(|s| s.checked_add(self.repetitions));
        match (start, end) {
            (Some(start), Some(end)) => self.coords.get(start..end).unwrap_or(&[]),
            _ => &[],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &[(u32, u32)]> {
        self.coords.chunks(self.repetitions.max(1))
    }
}

/// Safe-zone margin for one axis: 10% of the dimension, floored.
pub fn margin(dimension: u32) -> u32 {
    dimension / config::MARGIN_DIVISOR
}

/// Compute the position schedule.
///
/// One generator is seeded from `seed`; for each bit, for each repetition,
/// an x draw then a y draw inside the safe zone. Coordinates are not
/// deduplicated, so encoder and decoder only have to agree on the arguments.
pub fn schedule(
    width: u32,
    height: u32,
    bit_count: usize,
    repetitions: u32,
    seed: &str,
) -> Schedule {
    let margin_x = margin(width);
    let margin_y = margin(height);
    let safe_width = width.saturating_sub(2 * margin_x).max(1);
    let safe_height = height.saturating_sub(2 * margin_y).max(1);

    debug!(
        "scheduling {} bits x {} repetitions in {}x{} safe zone at ({}, {})",
        bit_count, repetitions, safe_width, safe_height, margin_x, margin_y
    );

    let mut generator = SequenceGenerator::new(seed);
    let total = bit_count * repetitions as usize;
    let mut coords = Vec::with_capacity(total);
    for _ in 0..total {
        let x = margin_x + generator.next_below(safe_width);
        let y = margin_y + generator.next_below(safe_height);
        coords.push((x, y));
    }

    Schedule {
        repetitions: repetitions as usize,
        coords,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = schedule(512, 384, config::FRAME_BITS, 5, "key");
        let b = schedule(512, 384, config::FRAME_BITS, 5, "key");
        assert_eq!(a, b);
    }

    #[test]
    fn test_shape() {
        let s = schedule(200, 200, config::FRAME_BITS, 3, "key");
        assert_eq!(s.bit_count(), config::FRAME_BITS);
        assert_eq!(s.repetitions(), 3);
        assert_eq!(s.iter().count(), config::FRAME_BITS);
        assert!(s.iter().all(|p| p.len() == 3));
        assert_eq!(s.positions(10), s.iter().nth(10).unwrap());
        assert!(s.positions(config::FRAME_BITS).is_empty());
        assert!(s.positions(usize::MAX).is_empty());
    }

    #[test]
    fn test_stays_inside_safe_zone() {
        let (w, h) = (300u32, 130u32);
        let s = schedule(w, h, config::FRAME_BITS, 5, "margins");
        for &(x, y) in s.iter().flatten() {
            assert!(x >= 30 && x < w - 30, "x out of safe zone: {}", x);
            assert!(y >= 13 && y < h - 13, "y out of safe zone: {}", y);
        }
    }

    #[test]
    fn test_key_changes_schedule() {
        let a = schedule(256, 256, config::FRAME_BITS, 5, "A");
        let b = schedule(256, 256, config::FRAME_BITS, 5, "B");
        assert_ne!(a, b);
    }

    #[test]
    fn test_dimensions_change_schedule() {
        let a = schedule(256, 256, 16, 5, "key");
        let b = schedule(255, 256, 16, 5, "key");
        assert_ne!(a.iter().flatten().collect::<Vec<_>>(), b.iter().flatten().collect::<Vec<_>>());
    }

    #[test]
    fn test_degenerate_dimensions() {
        let s = schedule(1, 1, 8, 2, "tiny");
        assert!(s.iter().flatten().all(|&c| c == (0, 0)));
        let s = schedule(0, 0, 8, 2, "empty");
        assert_eq!(s.bit_count(), 8);
    }
}
