//! Process-wide protocol state, owned in one place.

use crate::record::{GpsFix, RecordInfo, TimeUpdate};
use crate::registry::DeviceRegistry;
use crate::scheduler::WindowScheduler;
use crate::state::{DeviceState, LinkIdentity, RecState};

/// Everything the dispatcher, encoder and scheduler read or write.
///
/// Passed by `&mut` into each call; exactly one mutator is active at a time.
#[derive(Clone, Debug, Default)]
pub struct Context {
    pub state: DeviceState,
    pub links: LinkIdentity,
    pub registry: DeviceRegistry,
    pub scheduler: WindowScheduler,
    /// Recording in progress (or about to start).
    pub next: RecordInfo,
    /// Last finished recording.
    pub last: RecordInfo,
    /// Sink volume, normalized to 0.0..=1.0.
    pub volume: f32,
    /// The module reported `READY` since the last reset.
    pub module_ready: bool,
    /// The wall clock has been set since boot.
    pub time_was_set: bool,
    /// Clock update from the phone, not yet forwarded.
    pub pending_time: Option<TimeUpdate>,
    /// Position supplied by the phone, used for the next recording.
    pub phone_fix: Option<GpsFix>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recording the phone should see for path/timestamp queries: the one in
    /// progress while capturing, otherwise the last finished one.
    pub fn current_record(&self) -> &RecordInfo {
        match self.state.rec {
            RecState::On | RecState::RequestingPause => &self.next,
            _ => &self.last,
        }
    }
}
