//! Pure frame decoder.
//!
//! [`decode`] turns one aligned 120-byte frame into a [`UnitReading`]. It is
//! deterministic and side-effect free: no I/O, no shared state, identical
//! bytes always yield an identical reading.
//!
//! The overlapping byte ranges (16–21) are resolved through a closed set of
//! per-model strategies selected by [`DeviceKind`], so exactly one
//! interpretation is chosen per decode and never blended:
//!
//! - redox-only units report redox at 16–17,
//! - units with a free-chlorine probe report chlorine at 16–17 and move
//!   redox (when also present) to 18–19,
//! - salt-water units use 20–21 for salinity and electrolyzer power,
//! - NET units mirror the probe raw millivolts into 20–21 instead.
//!
//! Bytes 94–95 carry two contradicting documented meanings (maximum filling
//! time vs. chlorine dosing flow rate) and `flowrate_algicid` has no known
//! offset at all; neither is decoded rather than guessing. Reserved bytes
//! are read but never surfaced.

use crate::error::{AquanetError, Result};
use crate::types::{
    DeviceKind, ElectrolyzerDirection, FRAME_LEN, ProbeSet, TimeOfDay, Timestamp, UnitReading,
};

/// Sentinel byte for "field not provided".
const UNSPECIFIED: u8 = 0xFF;

/// Frame years are offsets from 2000.
const YEAR_OFFSET: u16 = 2000;

/// Byte 28 value meaning water is flowing past the probes.
const WATER_FLOW_TO_PROBES: u8 = 0xAA;

/// State bits in byte 29.
const PUMP_RUNNING: u8 = 0x08;
const ELECTROLYZER_RUNNING: u8 = 0x10;
const ELECTROLYZER_RUNNING_LEFT: u8 = 0x30;

/// Decode one aligned frame into a reading.
///
/// # Errors
///
/// - [`AquanetError::FrameLength`] unless the buffer is exactly 120 bytes.
/// - [`AquanetError::FrameField`] when the timestamp, the measured pH or
///   the target pH is out of range, which marks the frame as corrupt or
///   unsupported; the caller should drop the frame and keep the connection
///   open.
pub fn decode(data: &[u8]) -> Result<UnitReading> {
    if data.len() != FRAME_LEN {
        return Err(AquanetError::frame_length(FRAME_LEN, data.len()));
    }

    let probes = ProbeSet::from_probe_info(data[4]);
    let kind = classify(data, probes);
    let timestamp = decode_timestamp(data)?;
    let ph = decode_ph(data)?;
    let required_ph = decode_required_ph(data)?;

    let (redox, required_redox) = if probes.has_redox() {
        // Redox lives at 16-17 unless a chlorine probe claims that range,
        // in which case the secondary slot at 18-19 holds it.
        let value = if data[18] == UNSPECIFIED && data[19] == UNSPECIFIED {
            be16(data, 16)
        } else {
            be16(data, 18)
        };
        (Some(value), Some(u16::from(data[53]) * 10))
    } else {
        (None, None)
    };

    let (cl_free, required_cl_free) = if probes.has_clf() {
        (Some(f64::from(be16(data, 16)) / 100.0), Some(f64::from(data[53]) / 10.0))
    } else {
        (None, None)
    };

    let mut reading = UnitReading {
        serial_number: u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
        kind,
        probes,
        timestamp,
        ph: Some(ph),
        cl_free,
        redox,
        cl_free_mv: None,
        salinity: None,
        electrolyzer_power: None,
        electrolyzer_active: None,
        electrolyzer_direction: None,
        water_temperature: f64::from(be16(data, 25)) / 10.0,
        water_flow_to_probes: data[28] == WATER_FLOW_TO_PROBES,
        pump_running: data[29] & PUMP_RUNNING != 0,
        required_ph: Some(required_ph),
        required_redox,
        required_cl_free,
        required_algicide: data[54],
        required_temperature: data[55],
        filtration_start1: TimeOfDay::from_bytes(data[56], data[57]),
        filtration_stop1: TimeOfDay::from_bytes(data[58], data[59]),
        filtration_start2: TimeOfDay::from_bytes(data[60], data[61]),
        filtration_stop2: TimeOfDay::from_bytes(data[62], data[63]),
        backwash_every_n_days: data[68],
        backwash_time: TimeOfDay::from_bytes(data[69], data[70]),
        backwash_duration: u16::from(data[71]) * 10,
        pool_volume: be16(data, 92),
        delay_after_startup: be16(data, 74),
        delay_after_dose: be16(data, 106),
    };

    // Bytes 20-21, one interpretation per model.
    match kind {
        DeviceKind::Salt | DeviceKind::Profi => {
            let running = data[29] & ELECTROLYZER_RUNNING != 0;
            reading.salinity = Some(f64::from(data[20]) / 10.0);
            reading.electrolyzer_power = Some(if running { data[21] } else { 0 });
            reading.electrolyzer_active = Some(running);
            reading.electrolyzer_direction = Some(electrolyzer_direction(data[29]));
        }
        DeviceKind::Net if probes.has_clf() => {
            reading.cl_free_mv = Some(be16(data, 20));
        }
        DeviceKind::Net | DeviceKind::Home => {}
    }

    Ok(reading)
}

/// Determine the unit model from the frame.
fn classify(data: &[u8], probes: ProbeSet) -> DeviceKind {
    // NET units are cloud-synced and push no clock of their own.
    if data[6] == UNSPECIFIED {
        return DeviceKind::Net;
    }

    if probes.has_redox() && probes.has_clf() {
        return DeviceKind::Profi;
    }

    if (data[20] != 0 || data[21] != 0) && !probes.has_dose() && !probes.has_sanosil() {
        return DeviceKind::Salt;
    }

    DeviceKind::Home
}

/// Decode the device clock from bytes 6-11.
///
/// A sentinel in any sub-field means the unit does not provide a clock and
/// the timestamp is absent, never a substituted or bogus date. Otherwise
/// every sub-field must be within calendar/clock range.
fn decode_timestamp(data: &[u8]) -> Result<Option<Timestamp>> {
    let raw = &data[6..12];
    if raw.iter().any(|&b| b == UNSPECIFIED) {
        return Ok(None);
    }

    let timestamp = Timestamp {
        year: YEAR_OFFSET + u16::from(data[6]),
        month: data[7],
        day: data[8],
        hour: data[9],
        minute: data[10],
        second: data[11],
    };

    if !timestamp.is_valid() {
        return Err(AquanetError::frame_field("timestamp", format!("out of range: {raw:02x?}")));
    }

    Ok(Some(timestamp))
}

/// Decode and plausibility-check the pH value at 14-15.
fn decode_ph(data: &[u8]) -> Result<f64> {
    let ph = f64::from(be16(data, 14)) / 100.0;
    if !(0.0..=14.0).contains(&ph) {
        return Err(AquanetError::frame_field("ph", format!("implausible value {ph}")));
    }
    Ok(ph)
}

/// Decode and plausibility-check the configured target pH at byte 52.
///
/// Units only accept dosing targets between pH 6 and 10; anything outside
/// that window means the settings page is corrupt.
fn decode_required_ph(data: &[u8]) -> Result<f64> {
    let ph = f64::from(data[52]) / 10.0;
    if !(6.0..=10.0).contains(&ph) {
        return Err(AquanetError::frame_field("required_ph", format!("implausible value {ph}")));
    }
    Ok(ph)
}

fn electrolyzer_direction(state: u8) -> ElectrolyzerDirection {
    if state & ELECTROLYZER_RUNNING_LEFT == ELECTROLYZER_RUNNING_LEFT {
        ElectrolyzerDirection::Left
    } else if state & ELECTROLYZER_RUNNING != 0 {
        ElectrolyzerDirection::Right
    } else {
        ElectrolyzerDirection::Waiting
    }
}

fn be16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}
