//! Seams to the collaborators around the protocol core.
//!
//! The audio path, storage, GPS receiver, LEDs and clock are owned by the
//! board crate. The coordinator only calls them from `tick`, never from the
//! dispatcher or encoder.

use crate::config::PATH_CAPACITY;
use crate::error::Error;
use crate::record::{GpsFix, RecordInfo, TimeSource};
use heapless::String;

/// Capture and monitoring hooks of the audio path.
pub trait AudioPath {
    /// Route the input to the headphone/A2DP output.
    fn start_monitoring(&mut self);
    fn stop_monitoring(&mut self);
    /// Open `path` and start capturing into it.
    fn prepare_recording(&mut self, path: &PathHandle) -> Result<(), Error>;
    /// Stop capturing. Returns the number of audio bytes written.
    fn pause_recording(&mut self) -> u32;
    /// Input peak detector latched since the last call.
    fn peak_detected(&mut self) -> bool;
}

/// File naming and header finalization.
pub trait Storage {
    /// Allocate the recording and metadata paths for `info`.
    fn create_recording_path(&mut self, info: &RecordInfo) -> Result<PathHandle, Error>;
    /// Rewrite the header of a finished recording with its final length.
    fn write_recording_header(&mut self, path: &PathHandle, byte_length: u32)
        -> Result<(), Error>;
}

/// On-board GPS receiver.
pub trait Gps {
    fn acquire_fix(&mut self) -> Option<GpsFix>;
}

/// Status LEDs.
pub trait Indicators {
    fn set_indicator(&mut self, channel: IndicatorChannel, mode: IndicatorMode);
}

/// Wall clock and monotonic uptime.
pub trait Clock {
    /// Current Unix time in seconds (0 until set).
    fn now_unix(&self) -> u64;
    /// Milliseconds since boot; drives the recording timers.
    fn uptime_ms(&self) -> u64;
    fn set_current_time(&mut self, unix_secs: u64, source: TimeSource);
}

/// Everything the coordinator needs from the board.
pub trait Hooks: AudioPath + Storage + Gps + Indicators + Clock {}

impl<T: AudioPath + Storage + Gps + Indicators + Clock> Hooks for T {}

/// Paths of one recording, as allocated by [`Storage`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathHandle {
    pub recording: String<PATH_CAPACITY>,
    pub metadata: String<PATH_CAPACITY>,
}

/// LED channels driven by the coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IndicatorChannel {
    Bluetooth,
    Ble,
    Record,
    Monitor,
    Peak,
}

impl IndicatorChannel {
    pub const ALL: [IndicatorChannel; 5] = [
        IndicatorChannel::Bluetooth,
        IndicatorChannel::Ble,
        IndicatorChannel::Record,
        IndicatorChannel::Monitor,
        IndicatorChannel::Peak,
    ];

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IndicatorMode {
    #[default]
    Off,
    On,
    BlinkSlow,
    BlinkFast,
}

/// Physical button events (after debouncing).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonEvent {
    /// Start or stop a recording run.
    Record,
    /// Toggle headphone monitoring.
    Monitor,
    /// Scan for headphones, or drop the current one.
    Pairing,
    /// Bluetooth radio on/off.
    Power,
}
