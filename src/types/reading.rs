//! Decoded unit state.
//!
//! [`UnitReading`] is the structured decode of one frame: the live probe
//! values plus the configuration mirrored from the settings pages. Which
//! probe fields are meaningful depends on [`ProbeSet`] and [`DeviceKind`];
//! absent fields stay `None` rather than carrying a guessed value.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

/// Unit model, the discriminant for the overlapping byte ranges.
///
/// Exactly one interpretation of bytes 16–21 is chosen per decode, selected
/// by this kind, never blended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceKind {
    /// ASIN AQUA Home: pH plus a single chlorine or redox probe.
    Home,
    /// ASIN AQUA NET: cloud-synced, pushes no clock of its own.
    Net,
    /// ASIN AQUA Profi: redox and free-chlorine probes together.
    Profi,
    /// ASIN AQUA Salt: salt-water electrolyzer unit.
    Salt,
}

impl DeviceKind {
    /// Marketing model name, as shown by the vendor app.
    pub fn model_name(&self) -> &'static str {
        match self {
            DeviceKind::Home => "ASIN AQUA Home",
            DeviceKind::Net => "ASIN AQUA NET",
            DeviceKind::Profi => "ASIN AQUA Profi",
            DeviceKind::Salt => "ASIN AQUA Salt",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model_name())
    }
}

/// Installed analog probes, decoded from the probe descriptor byte.
///
/// The wire encodes *missing* probes: a set bit means the probe is absent.
/// A pH probe is always installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProbeSet(u8);

impl ProbeSet {
    const REDOX_MISSING: u8 = 0x01;
    const CLF_MISSING: u8 = 0x02;
    const DOSE_MISSING: u8 = 0x04;
    const SANOSIL_MISSING: u8 = 0x08;

    /// Decode the probe descriptor byte.
    pub fn from_probe_info(byte: u8) -> Self {
        Self(byte)
    }

    /// The raw descriptor byte.
    pub fn raw(&self) -> u8 {
        self.0
    }

    pub fn has_ph(&self) -> bool {
        true
    }

    pub fn has_redox(&self) -> bool {
        self.0 & Self::REDOX_MISSING == 0
    }

    /// Free-chlorine probe installed.
    pub fn has_clf(&self) -> bool {
        self.0 & Self::CLF_MISSING == 0
    }

    /// Dosing pump sensor installed.
    pub fn has_dose(&self) -> bool {
        self.0 & Self::DOSE_MISSING == 0
    }

    /// Sanosil (OXY Pure) probe installed.
    pub fn has_sanosil(&self) -> bool {
        self.0 & Self::SANOSIL_MISSING == 0
    }
}

/// Device-local wall-clock timestamp carried in a frame.
///
/// No timezone: units report the clock they were configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Timestamp {
    /// Whether every sub-field is within calendar/clock range.
    pub fn is_valid(&self) -> bool {
        (1..=12).contains(&self.month)
            && (1..=days_in_month(self.year, self.month)).contains(&self.day)
            && self.hour < 24
            && self.minute < 60
            && self.second < 60
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

fn is_leap_year(year: u16) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// A configured hour:minute, used for filtration and backwash schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    /// Decode an (hour, minute) byte pair.
    ///
    /// The sentinel hour (`0xFF`) and out-of-range pairs decode as `None`;
    /// schedule slots are configuration, not worth rejecting a frame over.
    pub fn from_bytes(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 { Some(Self { hour, minute }) } else { None }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Electrolyzer polarity state on salt-water units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ElectrolyzerDirection {
    Left,
    Right,
    Waiting,
}

/// The structured decode of one frame.
///
/// Live probe fields are `None` when the corresponding probe is not
/// installed or the unit model does not carry them. Configuration fields
/// mirror the settings pages and are attributes of the unit, not of a
/// single sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitReading {
    /// Identity key of the originating unit.
    pub serial_number: u32,

    /// Model discriminant used for the overlapping byte ranges.
    pub kind: DeviceKind,

    /// Installed probes.
    pub probes: ProbeSet,

    /// Device clock at push time; `None` when the unit provides none.
    pub timestamp: Option<Timestamp>,

    pub ph: Option<f64>,

    /// Free chlorine in ppm (CLF probe).
    pub cl_free: Option<f64>,

    /// Redox potential in mV.
    pub redox: Option<u16>,

    /// Probe raw millivolts, NET units only; mutually exclusive with
    /// `salinity`/`electrolyzer_power`, which share its byte range.
    pub cl_free_mv: Option<u16>,

    /// Salinity in kg/m³, salt-water units only.
    pub salinity: Option<f64>,

    /// Electrolyzer output, zero while not running.
    pub electrolyzer_power: Option<u8>,

    pub electrolyzer_active: Option<bool>,

    pub electrolyzer_direction: Option<ElectrolyzerDirection>,

    /// Water temperature in °C.
    pub water_temperature: f64,

    /// Whether water is flowing past the probes.
    pub water_flow_to_probes: bool,

    pub pump_running: bool,

    // Configuration mirrored from the settings pages.
    pub required_ph: Option<f64>,
    pub required_redox: Option<u16>,
    pub required_cl_free: Option<f64>,
    pub required_algicide: u8,
    pub required_temperature: u8,

    /// Filtration windows: (start, stop) pairs, unset slots are `None`.
    pub filtration_start1: Option<TimeOfDay>,
    pub filtration_stop1: Option<TimeOfDay>,
    pub filtration_start2: Option<TimeOfDay>,
    pub filtration_stop2: Option<TimeOfDay>,

    pub backwash_every_n_days: u8,
    pub backwash_time: Option<TimeOfDay>,
    /// Backwash duration in seconds.
    pub backwash_duration: u16,

    /// Pool volume in m³.
    pub pool_volume: u16,
    /// Seconds the unit waits after startup before dosing.
    pub delay_after_startup: u16,
    /// Seconds the unit waits after a dose before measuring.
    pub delay_after_dose: u16,
}

/// Event emitted to the host platform when a unit's reading changed.
#[derive(Debug, Clone)]
pub struct ReadingUpdate {
    /// The full current reading for the unit.
    pub reading: Arc<UnitReading>,

    /// Set when this serial number was never seen before.
    pub first_seen: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_set_decodes_inverted_missing_flags() {
        let all_installed = ProbeSet::from_probe_info(0x00);
        assert!(all_installed.has_ph());
        assert!(all_installed.has_redox());
        assert!(all_installed.has_clf());
        assert!(all_installed.has_dose());
        assert!(all_installed.has_sanosil());

        let redox_only = ProbeSet::from_probe_info(0x0E);
        assert!(redox_only.has_ph());
        assert!(redox_only.has_redox());
        assert!(!redox_only.has_clf());
        assert!(!redox_only.has_dose());
        assert!(!redox_only.has_sanosil());

        let clf_only = ProbeSet::from_probe_info(0x0D);
        assert!(clf_only.has_clf());
        assert!(!clf_only.has_redox());
    }

    #[test]
    fn ph_probe_is_always_present() {
        assert!(ProbeSet::from_probe_info(0xFF).has_ph());
    }

    #[test]
    fn timestamp_validation_covers_calendar_edges() {
        let base =
            Timestamp { year: 2024, month: 6, day: 15, hour: 12, minute: 34, second: 56 };
        assert!(base.is_valid());

        assert!(!Timestamp { month: 0, ..base }.is_valid());
        assert!(!Timestamp { month: 13, ..base }.is_valid());
        assert!(!Timestamp { day: 0, ..base }.is_valid());
        assert!(!Timestamp { month: 4, day: 31, ..base }.is_valid());
        assert!(!Timestamp { hour: 24, ..base }.is_valid());
        assert!(!Timestamp { minute: 60, ..base }.is_valid());
        assert!(!Timestamp { second: 60, ..base }.is_valid());

        // 2024 is a leap year, 2023 and 2100 are not.
        assert!(Timestamp { month: 2, day: 29, ..base }.is_valid());
        assert!(!Timestamp { year: 2023, month: 2, day: 29, ..base }.is_valid());
        assert!(!Timestamp { year: 2100, month: 2, day: 29, ..base }.is_valid());
    }

    #[test]
    fn time_of_day_rejects_sentinel_and_garbage() {
        assert_eq!(TimeOfDay::from_bytes(8, 30), Some(TimeOfDay { hour: 8, minute: 30 }));
        assert_eq!(TimeOfDay::from_bytes(0xFF, 0), None);
        assert_eq!(TimeOfDay::from_bytes(24, 0), None);
        assert_eq!(TimeOfDay::from_bytes(10, 60), None);
    }

    #[test]
    fn device_kind_model_names() {
        assert_eq!(DeviceKind::Salt.to_string(), "ASIN AQUA Salt");
        assert_eq!(DeviceKind::Net.model_name(), "ASIN AQUA NET");
    }
}
