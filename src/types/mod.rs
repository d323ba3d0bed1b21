//! Core types for pool-unit telemetry.
//!
//! - [`RawFrame`] is the fundamental data unit: one immutable fixed-length
//!   frame with zero-copy sharing between the decoder and the cloud mirror.
//! - [`UnitReading`] is the structured decode of one frame.
//! - [`ReadingUpdate`] is the event the server broadcasts to the host
//!   platform when a unit's reading changed.

mod frame;
mod reading;

pub use frame::{FRAME_LEN, PAGE_LEN, RawFrame};
pub use reading::{
    DeviceKind, ElectrolyzerDirection, ProbeSet, ReadingUpdate, TimeOfDay, Timestamp, UnitReading,
};

/// Shared frame builders for tests.
#[cfg(test)]
pub(crate) mod test_support {
    use super::frame::FRAME_LEN;

    /// A well-formed, aligned 120-byte frame from a fictional Home unit.
    ///
    /// Serial 1234, redox probe only (descriptor `0x0E`), pushed at
    /// 2024-06-15 12:34:56, pH 7.20, redox 550 mV, water 24.5 °C.
    pub(crate) fn base_frame() -> [u8; FRAME_LEN] {
        let mut data = [0u8; FRAME_LEN];

        // Serial repeats at the head of each 40-byte page; page tags follow.
        for page in [0usize, 40, 80] {
            data[page..page + 4].copy_from_slice(&1234u32.to_be_bytes());
        }
        data[5] = 0x01;
        data[45] = 0x03;
        data[85] = 0x02;

        data[4] = 0x0E; // redox probe installed, everything else missing
        data[6] = 24; // year 2024
        data[7] = 6;
        data[8] = 15;
        data[9] = 12;
        data[10] = 34;
        data[11] = 56;
        data[14..16].copy_from_slice(&720u16.to_be_bytes()); // pH 7.20
        data[16..18].copy_from_slice(&550u16.to_be_bytes()); // redox 550 mV
        data[18] = 0xFF; // secondary redox slot unused
        data[19] = 0xFF;
        data[25..27].copy_from_slice(&245u16.to_be_bytes()); // 24.5 °C
        data[28] = 0xAA; // water flowing to probes
        data[29] = 0x08; // pump running
        data[52] = 72; // required pH 7.2
        data[53] = 65; // required redox 650 mV
        data[54] = 5; // required algicide
        data[55] = 28; // required temperature
        data[56] = 8; // filtration window 1: 08:00 - 10:00
        data[58] = 10;
        data[60] = 14; // filtration window 2: 14:00 - 16:00
        data[62] = 16;
        data[68] = 3; // backwash every 3 days
        data[69] = 2; // backwash at 02:30
        data[70] = 30;
        data[71] = 2; // backwash duration 20 s
        data[74..76].copy_from_slice(&120u16.to_be_bytes()); // delay after startup
        data[92..94].copy_from_slice(&5000u16.to_be_bytes()); // pool volume
        data[106..108].copy_from_slice(&30u16.to_be_bytes()); // delay after dose

        data
    }
}
