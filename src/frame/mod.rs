use byteorder::{BigEndian, ByteOrder};

use crate::config;
use crate::integrity;
use crate::payload::{self, WatermarkPayload};

// Field offsets within the 74-byte frame
const OFF_MAGIC: usize = 0;
const OFF_VERSION: usize = OFF_MAGIC + config::MAGIC_SIZE;
const OFF_VIEWER_ID: usize = OFF_VERSION + config::VERSION_SIZE;
const OFF_TIMESTAMP: usize = OFF_VIEWER_ID + config::VIEWER_ID_SIZE;
const OFF_SCREENSHOT_ID: usize = OFF_TIMESTAMP + config::TIMESTAMP_SIZE;
const OFF_CHECKSUM: usize = OFF_SCREENSHOT_ID + config::SCREENSHOT_ID_SIZE;

/// Result of parsing a recovered bit sequence. Never an error: each framing
/// check is reported separately so the caller can judge what it extracted.
#[derive(Debug, Clone)]
pub struct FrameDecode {
    pub payload: WatermarkPayload,
    pub magic_valid: bool,
    pub version_valid: bool,
    pub checksum_valid: bool,
}

impl FrameDecode {
    pub fn is_valid(&self) -> bool {
        self.magic_valid && self.version_valid && self.checksum_valid
    }
}

/// Serialize a payload into the byte frame: magic, version, fields, checksum.
pub fn serialize_frame(payload: &WatermarkPayload) -> [u8; config::FRAME_SIZE] {
    let mut frame = [0u8; config::FRAME_SIZE];

    BigEndian::write_u32(&mut frame[OFF_MAGIC..], config::MAGIC);
    frame[OFF_VERSION] = config::FRAME_VERSION;
    frame[OFF_VIEWER_ID..OFF_TIMESTAMP].copy_from_slice(&payload.viewer_id_field());
    BigEndian::write_u64(&mut frame[OFF_TIMESTAMP..], payload.view_timestamp);
    frame[OFF_SCREENSHOT_ID..OFF_CHECKSUM].copy_from_slice(&payload.screenshot_id_field());
    frame[OFF_CHECKSUM] = integrity::xor_checksum(&frame[..OFF_CHECKSUM]);

    frame
}

/// Encode a payload into its 592-bit frame, MSB first, one bit per element.
pub fn encode(payload: &WatermarkPayload) -> Vec<u8> {
    bytes_to_bits(&serialize_frame(payload))
}

/// Parse a recovered bit sequence positionally.
///
/// Missing trailing bits read as 0 and extra bits are ignored, so any input
/// produces an answer.
pub fn decode(bits: &[u8]) -> FrameDecode {
    let frame = bits_to_bytes(bits, config::FRAME_SIZE);

    let magic = BigEndian::read_u32(&frame[OFF_MAGIC..]);
    let version = frame[OFF_VERSION];
    let checksum = frame[OFF_CHECKSUM];
    let computed = integrity::xor_checksum(&frame[..OFF_CHECKSUM]);

    let payload = WatermarkPayload {
        viewer_id: payload::unpad_field(&frame[OFF_VIEWER_ID..OFF_TIMESTAMP]),
        view_timestamp: BigEndian::read_u64(&frame[OFF_TIMESTAMP..]),
        screenshot_id: payload::unpad_field(&frame[OFF_SCREENSHOT_ID..OFF_CHECKSUM]),
    };

    FrameDecode {
        payload,
        magic_valid: magic == config::MAGIC,
        version_valid: version == config::FRAME_VERSION,
        checksum_valid: computed == checksum,
    }
}

/// Expand bytes into bits, MSB first.
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .flat_map(|&byte| (0..8).map(move |i| (byte >> (7 - i)) & 1))
        .collect()
}

/// Pack bits (MSB first) into `len` bytes. Any nonzero element counts as 1.
pub fn bits_to_bytes(bits: &[u8], len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    for (bit_index, &bit) in bits.iter().take(len * 8).enumerate() {
        if bit != 0 {
            bytes[bit_index / 8] |= 1 << (7 - (bit_index % 8));
        }
    }
    bytes
}
