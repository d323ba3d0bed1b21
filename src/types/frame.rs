//! Raw frame buffer and on-wire alignment.
//!
//! A frame is exactly [`FRAME_LEN`] bytes: three consecutive [`PAGE_LEN`]-byte
//! pages. Each page opens with the unit serial number (big-endian u32)
//! followed by a page tag byte (`0x01` live data, `0x03` dosing settings,
//! `0x02` pool settings). The repeated serial and the page tags are the only
//! alignment markers the protocol has; units that reconnect mid-push can
//! deliver a rotated frame, which [`RawFrame::realign`] recovers.

use std::sync::Arc;

use crate::error::{AquanetError, Result};

/// Exact on-wire frame length in bytes.
pub const FRAME_LEN: usize = 120;

/// Length of one of the three pages inside a frame.
pub const PAGE_LEN: usize = 40;

/// Page tag byte offsets and expected values, in wire order.
const PAGE_TAGS: [(usize, u8); 3] = [(5, 0x01), (45, 0x03), (85, 0x02)];

/// One immutable telemetry frame as pushed by a unit.
///
/// The buffer is shared via `Arc` so the decoder, the registry event path and
/// the cloud mirror can all hold the same bytes without copying.
#[derive(Debug, Clone)]
pub struct RawFrame {
    data: Arc<[u8]>,
}

impl RawFrame {
    /// Wrap a byte buffer as a frame.
    ///
    /// Fails with [`AquanetError::FrameLength`] unless the buffer is exactly
    /// [`FRAME_LEN`] bytes; a frame is never partially decoded.
    pub fn new(data: Vec<u8>) -> Result<Self> {
        if data.len() != FRAME_LEN {
            return Err(AquanetError::frame_length(FRAME_LEN, data.len()));
        }
        Ok(Self { data: data.into() })
    }

    /// The frame bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// A zero-copy handle on the frame bytes.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    /// The serial number at the head of the frame.
    ///
    /// Only meaningful on an aligned frame; see [`RawFrame::realign`].
    pub fn serial_number(&self) -> u32 {
        u32::from_be_bytes([self.data[0], self.data[1], self.data[2], self.data[3]])
    }

    /// Whether the page tags and repeated serials line up at offset zero.
    pub fn is_aligned(&self) -> bool {
        aligned_at(&self.data, 0)
    }

    /// Recover a rotated frame.
    ///
    /// Searches every rotation for the one where the three page tags and the
    /// serial repeated at the head of each page line up, and returns the
    /// rotated frame. Returns the frame unchanged (an `Arc` clone) when it is
    /// already aligned, and [`AquanetError::FrameField`] when no rotation
    /// aligns, which marks the frame as garbage rather than merely shifted.
    pub fn realign(&self) -> Result<Self> {
        if self.is_aligned() {
            return Ok(self.clone());
        }

        for offset in 1..FRAME_LEN {
            if aligned_at(&self.data, offset) {
                let mut rotated = Vec::with_capacity(FRAME_LEN);
                rotated.extend_from_slice(&self.data[offset..]);
                rotated.extend_from_slice(&self.data[..offset]);
                return Ok(Self { data: rotated.into() });
            }
        }

        Err(AquanetError::frame_field("page tags", "no rotation aligns the three pages"))
    }
}

/// Check frame alignment at a circular rotation offset.
fn aligned_at(data: &[u8], offset: usize) -> bool {
    let at = |i: usize| data[(offset + i) % FRAME_LEN];

    for (tag_offset, tag) in PAGE_TAGS {
        if at(tag_offset) != tag {
            return false;
        }
    }

    // Serial number must repeat at the head of every page.
    (0..4).all(|i| at(i) == at(PAGE_LEN + i) && at(i) == at(2 * PAGE_LEN + i))
}
