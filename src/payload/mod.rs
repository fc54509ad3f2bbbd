use serde::{Deserialize, Serialize};

use crate::config;

/// The identity embedded into a served image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkPayload {
    /// At most 28 ASCII characters survive encoding.
    pub viewer_id: String,
    /// Milliseconds since the Unix epoch.
    pub view_timestamp: u64,
    /// At most 32 ASCII characters survive encoding.
    pub screenshot_id: String,
}

impl WatermarkPayload {
    pub fn new(
        viewer_id: impl Into<String>,
        view_timestamp: u64,
        screenshot_id: impl Into<String>,
    ) -> Self {
        Self {
            viewer_id: viewer_id.into(),
            view_timestamp,
            screenshot_id: screenshot_id.into(),
        }
    }

    pub fn viewer_id_field(&self) -> [u8; config::VIEWER_ID_SIZE] {
        pad_field(&self.viewer_id)
    }

    pub fn screenshot_id_field(&self) -> [u8; config::SCREENSHOT_ID_SIZE] {
        pad_field(&self.screenshot_id)
    }
}

/// Fixed-width ASCII field: truncated to `N` bytes, null-padded on the right.
/// Non-ASCII characters are written as `?`.
pub fn pad_field<const N: usize>(value: &str) -> [u8; N] {
    let mut field = [0u8; N];
    for (slot, ch) in field.iter_mut().zip(value.chars()) {
        *slot = if ch.is_ascii() { ch as u8 } else { b'?' };
    }
    field
}

/// Inverse of [`pad_field`]: strip trailing nulls and decode what remains.
/// Bytes recovered from noise are not guaranteed to be ASCII, so the
/// conversion is lossy rather than fallible.
pub fn unpad_field(field: &[u8]) -> String {
    let end = field
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |last| last + 1);
    String::from_utf8_lossy(&field[..end]).into_owned()
}
