//! Recording window configuration and per-recording bookkeeping.

use crate::config::{
    DEFAULT_RECORDING_LENGTH_SECS, DEFAULT_RECORDING_OCCURRENCES, DEFAULT_RECORDING_PERIOD_SECS,
    MAX_VALID_UNIX_TIME, MIN_VALID_UNIX_TIME, PATH_CAPACITY,
};
use core::time::Duration;
use heapless::String;

/// Duration/period/occurrence settings governing one series of recordings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordingWindow {
    /// Length of each recording.
    pub length: Duration,
    /// Interval between the starts of two consecutive recordings.
    pub period: Duration,
    /// Number of recordings in the run; 0 records until stopped.
    pub occurrences: u32,
}

impl Default for RecordingWindow {
    fn default() -> Self {
        Self {
            length: Duration::from_secs(DEFAULT_RECORDING_LENGTH_SECS),
            period: Duration::from_secs(DEFAULT_RECORDING_PERIOD_SECS),
            occurrences: DEFAULT_RECORDING_OCCURRENCES,
        }
    }
}

impl RecordingWindow {
    /// Validate and build a window. The length must be non-zero and strictly
    /// shorter than the period.
    pub fn new(length: Duration, period: Duration, occurrences: u32) -> Option<Self> {
        if length.is_zero() || length >= period {
            return None;
        }
        Some(Self {
            length,
            period,
            occurrences,
        })
    }

    /// Pause between the end of one recording and the start of the next.
    pub fn gap(&self) -> Duration {
        self.period.saturating_sub(self.length)
    }

    /// Whether another occurrence follows the one at `sequence_index`.
    pub fn has_next(&self, sequence_index: u32) -> bool {
        self.occurrences == 0 || sequence_index < self.occurrences - 1
    }
}

/// Parse a `[[HH:]MM:]SS` duration as sent by the phone app.
///
/// Minutes and seconds fields after the first must be below 60.
pub fn parse_time_of_day(s: &str) -> Option<Duration> {
    let mut total: u64 = 0;
    let mut fields = 0;
    for (i, part) in s.split(':').enumerate() {
        if i >= 3 || part.is_empty() {
            return None;
        }
        let value: u64 = part.parse().ok()?;
        if i > 0 && value >= 60 {
            return None;
        }
        total = total.checked_mul(60)?.checked_add(value)?;
        fields += 1;
    }
    (fields > 0).then(|| Duration::from_secs(total))
}

/// Whether `unix_secs` can be a real wall-clock reading rather than an unset
/// or corrupt clock.
pub fn plausible_unix_time(unix_secs: u64) -> bool {
    (MIN_VALID_UNIX_TIME..MAX_VALID_UNIX_TIME).contains(&unix_secs)
}

/// Where the current position came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpsSource {
    #[default]
    None,
    /// Sent by the phone over BLE (`latlong`).
    Phone,
    /// Acquired by the on-board receiver.
    Receiver,
}

/// Where a wall-clock update came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeSource {
    RemotePhone,
    Gps,
}

/// A position fix.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GpsFix {
    pub lat: f64,
    pub long: f64,
    /// Unix time of the fix, when known.
    pub timestamp: Option<u64>,
}

/// Wall-clock update waiting to be forwarded to the clock collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeUpdate {
    pub unix_secs: u64,
    pub source: TimeSource,
}

/// Bookkeeping for one recording of a run.
///
/// The coordinator keeps two: the one in progress and the last finished
/// one. Finishing copies the whole value, so later edits to the current
/// record never reach the finished one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordInfo {
    /// Unix time the recording started.
    pub timestamp: u64,
    pub duration: Duration,
    pub period: Duration,
    /// 0-based position in the run.
    pub sequence_index: u32,
    /// The wall clock had been set when the recording started.
    pub time_was_set: bool,
    pub recording_path: String<PATH_CAPACITY>,
    pub metadata_path: String<PATH_CAPACITY>,
    pub total_occurrences: u32,
    pub gps_lat: f64,
    pub gps_long: f64,
    pub gps_source: GpsSource,
}

impl RecordInfo {
    /// Start time of the following occurrence, if the run has one.
    pub fn next_start(&self) -> Option<u64> {
        let more = self.total_occurrences == 0
            || self.sequence_index.saturating_add(1) < self.total_occurrences;
        if self.timestamp == 0 || !more {
            return None;
        }
        self.timestamp.checked_add(self.period.as_secs())
    }

    pub fn set_fix(&mut self, fix: Option<GpsFix>, source: GpsSource) {
        match fix {
            Some(fix) => {
                self.gps_lat = fix.lat;
                self.gps_long = fix.long;
                self.gps_source = source;
            }
            None => {
                self.gps_lat = 0.0;
                self.gps_long = 0.0;
                self.gps_source = GpsSource::None;
            }
        }
    }
}
