//! Recording-window scheduler.
//!
//! Two one-shot timers drive the REC axis: the recording timer ends the
//! current occurrence, the wait timer starts the next one. Timers are plain
//! deadlines on the monotonic uptime clock, identified by a handle. A timer
//! is freed when it fires and must be re-armed explicitly.

use crate::record::RecordingWindow;
use crate::state::RecState;
use core::time::Duration;

/// Identifies one armed timer. Handles are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerHandle(u32);

/// What an expiring timer does to the REC axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerKind {
    /// End of one occurrence.
    RecordingEnd,
    /// End of the pause between occurrences.
    PeriodWait,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct OneShot {
    handle: TimerHandle,
    deadline_ms: u64,
}

/// Holds the recording window and the two pending timers.
#[derive(Clone, Debug, Default)]
pub struct WindowScheduler {
    window: RecordingWindow,
    recording: Option<OneShot>,
    wait: Option<OneShot>,
    next_handle: u32,
}

impl WindowScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window(&self) -> &RecordingWindow {
        &self.window
    }

    /// Replace the window. Timers already armed keep their deadlines.
    pub fn set_window(&mut self, window: RecordingWindow) {
        self.window = window;
    }

    /// Arm the end-of-recording timer at `now + length`.
    pub fn arm_recording(&mut self, now_ms: u64) -> TimerHandle {
        let shot = self.one_shot(now_ms, self.window.length);
        debug!("Scheduler: recording timer due at {} ms", shot.deadline_ms);
        self.recording = Some(shot);
        shot.handle
    }

    /// Arm the between-occurrences timer so the next recording starts one
    /// period after the previous one did.
    pub fn arm_wait(&mut self, now_ms: u64) -> TimerHandle {
        let shot = self.one_shot(now_ms, self.window.gap());
        debug!("Scheduler: wait timer due at {} ms", shot.deadline_ms);
        self.wait = Some(shot);
        shot.handle
    }

    /// Cancel one timer. Returns `false` if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        for slot in [&mut self.recording, &mut self.wait] {
            if slot.map(|s| s.handle) == Some(handle) {
                *slot = None;
                return true;
            }
        }
        false
    }

    pub fn cancel_all(&mut self) {
        self.recording = None;
        self.wait = None;
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        match kind {
            TimerKind::RecordingEnd => self.recording.is_some(),
            TimerKind::PeriodWait => self.wait.is_some(),
        }
    }

    /// Earliest pending deadline, for callers that sleep until it.
    pub fn next_deadline(&self) -> Option<u64> {
        [self.recording, self.wait]
            .into_iter()
            .flatten()
            .map(|s| s.deadline_ms)
            .min()
    }

    /// Fire every expired timer and apply its transition to `rec`.
    ///
    /// `sequence_index` is the 0-based position of the current occurrence.
    /// Returns the kinds that fired.
    pub fn poll(
        &mut self,
        now_ms: u64,
        sequence_index: u32,
        rec: &mut RecState,
    ) -> heapless::Vec<TimerKind, 2> {
        let mut fired = heapless::Vec::new();

        if take_expired(&mut self.recording, now_ms) {
            *rec = if self.window.has_next(sequence_index) {
                RecState::RequestingPause
            } else {
                RecState::RequestingOff
            };
            info!("Scheduler: occurrence {} elapsed -> {}", sequence_index, *rec);
            let _ = fired.push(TimerKind::RecordingEnd);
        }

        if take_expired(&mut self.wait, now_ms) {
            *rec = RecState::RequestingRestart;
            info!("Scheduler: wait elapsed -> restart");
            let _ = fired.push(TimerKind::PeriodWait);
        }

        fired
    }

    fn one_shot(&mut self, now_ms: u64, after: Duration) -> OneShot {
        let handle = TimerHandle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        let after_ms = u64::try_from(after.as_millis()).unwrap_or(u64::MAX);
        OneShot {
            handle,
            deadline_ms: now_ms.saturating_add(after_ms),
        }
    }
}

fn take_expired(slot: &mut Option<OneShot>, now_ms: u64) -> bool {
    match slot {
        Some(shot) if now_ms >= shot.deadline_ms => {
            *slot = None;
            true
        }
        _ => false,
    }
}
