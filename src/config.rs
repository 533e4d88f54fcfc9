//! Application-wide constants and compile-time configuration.
//!
//! Protocol limits, buffer capacities and timing parameters live here so
//! they can be tuned in one place.

// Protocol

/// Maximum number of parameters captured from one inbound line.
pub const PROTOCOL_MAX_PARAMS: usize = 9;

/// Longest inbound line accepted from the module (bytes, terminator excluded).
pub const LINE_CAPACITY: usize = 160;

/// Capacity of one encoded outbound batch. Inquiry results fan out one line
/// per registry slot, so this must hold `REGISTRY_CAPACITY` `SEND` lines plus
/// the lines a single tick can produce.
pub const OUTBOUND_CAPACITY: usize = 768;

/// Full scale of the AVRCP absolute volume reported by `ABS_VOL`.
pub const ABS_VOLUME_MAX: u8 = 127;

/// Unix timestamps below this value are treated as an unset phone clock
/// (2017-07-14) and ignored.
pub const MIN_VALID_UNIX_TIME: u64 = 1_500_000_000;

/// Unix timestamps at or above this value (2100-01-01) are rejected.
pub const MAX_VALID_UNIX_TIME: u64 = 4_102_444_800;

// Bluetooth classic

/// Duration of a classic inquiry scan (seconds), sent as `INQUIRY <secs>`.
pub const INQUIRY_DURATION_SECS: u8 = 10;

/// Maximum number of peers remembered from one inquiry scan.
pub const REGISTRY_CAPACITY: usize = 6;

/// Capacity of a peer or phone name.
pub const NAME_CAPACITY: usize = 32;

/// Capacity of a Bluetooth address as printed by the module.
pub const ADDRESS_CAPACITY: usize = 20;

/// Capacity of the class-of-device / capabilities field.
pub const CAPABILITIES_CAPACITY: usize = 12;

// Recording

/// Capacity of a recording or metadata file path.
pub const PATH_CAPACITY: usize = 64;

/// Default length of one recording (seconds).
pub const DEFAULT_RECORDING_LENGTH_SECS: u64 = 300;

/// Default interval between the starts of two recordings (seconds).
pub const DEFAULT_RECORDING_PERIOD_SECS: u64 = 600;

/// Default number of recordings in a run (0 = until stopped).
pub const DEFAULT_RECORDING_OCCURRENCES: u32 = 0;

// Runtime

/// Coordinator tick interval; bounds timer latency while the line is idle (ms).
pub const TICK_INTERVAL_MS: u64 = 100;

/// Time to wait for `READY` before resending `RESET` (ms).
pub const MODULE_READY_TIMEOUT_MS: u64 = 5_000;

/// Maximum number of actions a single tick can emit.
pub const MAX_TICK_ACTIONS: usize = 12;

/// Depth of the button event channel feeding the coordinator task.
pub const BUTTON_QUEUE_DEPTH: usize = 4;

/// Bytes read from the serial port per wakeup.
pub const SERIAL_READ_CHUNK: usize = 64;
