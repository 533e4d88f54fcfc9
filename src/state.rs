//! Device state model: four orthogonal state machines plus link identity.
//!
//! Every axis has explicit `Requesting*` values. The dispatcher (or a button)
//! only ever moves an axis into a requesting value; the coordinator tick
//! resolves it to the stable value and performs the side effects. That keeps
//! every change traceable to one causing event.

use crate::config::{ADDRESS_CAPACITY, NAME_CAPACITY};
use heapless::String;

/// Bluetooth classic (A2DP/AVRCP) link.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BtState {
    /// Radio powered off.
    #[default]
    Off,
    Idle,
    /// Inquiry scan running.
    Inquiry,
    RequestingConnect,
    Connected,
    /// Connected and streaming monitor audio.
    Playing,
    RequestingDisconnect,
    /// Link lost (`LINK_LOSS` with status 1).
    Disconnected,
}

impl BtState {
    /// A sink is attached and can receive audio/volume commands.
    pub fn has_sink(self) -> bool {
        matches!(self, BtState::Connected | BtState::Playing)
    }

    /// Wire label used in `BT` notifications.
    pub fn label(self) -> &'static str {
        match self {
            BtState::Off => "OFF",
            BtState::Idle => "IDLE",
            BtState::Inquiry => "INQUIRY",
            BtState::RequestingConnect => "CONNECTING",
            BtState::Connected => "CONNECTED",
            BtState::Playing => "PLAYING",
            BtState::RequestingDisconnect => "DISCONNECTING",
            BtState::Disconnected => "DISCONNECTED",
        }
    }
}

/// Bluetooth Low Energy control link to the phone app.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleState {
    #[default]
    Off,
    Idle,
    RequestingAdvertise,
    Advertising,
    RequestingConnect,
    Connected,
    RequestingDisconnect,
}

/// Recording lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecState {
    #[default]
    Off,
    RequestingOn,
    On,
    /// Current occurrence finished, more to come.
    RequestingPause,
    /// Waiting for the next occurrence of the window.
    Idle,
    RequestingRestart,
    RequestingOff,
}

impl RecState {
    /// Wire label used in `REC` notifications.
    ///
    /// Requesting values report the stable state they leave.
    pub fn label(self) -> &'static str {
        match self {
            RecState::On | RecState::RequestingPause | RecState::RequestingOff => "ON",
            RecState::Idle | RecState::RequestingRestart => "WAIT",
            RecState::Off | RecState::RequestingOn => "OFF",
        }
    }

    /// A recording run (capturing or waiting) is in progress.
    pub fn in_run(self) -> bool {
        !matches!(self, RecState::Off | RecState::RequestingOn)
    }
}

/// Headphone monitoring passthrough.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MonState {
    #[default]
    Off,
    RequestingOn,
    On,
    RequestingOff,
}

impl MonState {
    /// Wire label used in `MON` notifications.
    pub fn label(self) -> &'static str {
        match self {
            MonState::On | MonState::RequestingOff => "ON",
            MonState::Off | MonState::RequestingOn => "OFF",
        }
    }
}

/// The four state axes. They never constrain each other directly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceState {
    pub bt: BtState,
    pub ble: BleState,
    pub rec: RecState,
    pub mon: MonState,
}

/// Bluetooth profile named in `OPEN_OK` / `LINK` notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Profile {
    A2dp,
    Avrcp,
    Ble,
    Other,
}

impl Profile {
    /// Case-insensitive profile lookup.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("A2DP") {
            Profile::A2dp
        } else if s.eq_ignore_ascii_case("AVRCP") {
            Profile::Avrcp
        } else if s.eq_ignore_ascii_case("BLE") {
            Profile::Ble
        } else {
            Profile::Other
        }
    }
}

/// Per-profile link ids assigned by the module, and the classic peer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkIdentity {
    pub a2dp_link_id: Option<u8>,
    pub avrcp_link_id: Option<u8>,
    pub ble_link_id: Option<u8>,
    pub peer_address: String<ADDRESS_CAPACITY>,
    pub peer_name: String<NAME_CAPACITY>,
}

impl LinkIdentity {
    /// Forget the classic peer and its A2DP/AVRCP links.
    pub fn clear_classic(&mut self) {
        self.a2dp_link_id = None;
        self.avrcp_link_id = None;
        self.peer_address.clear();
        self.peer_name.clear();
    }

    /// Forget the BLE control link.
    pub fn clear_ble(&mut self) {
        self.ble_link_id = None;
    }

    /// Link id to address `MUSIC` commands to (AVRCP preferred).
    pub fn music_link_id(&self) -> Option<u8> {
        self.avrcp_link_id.or(self.a2dp_link_id)
    }
}
