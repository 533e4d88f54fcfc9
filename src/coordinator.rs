//! Device coordinator.
//!
//! Owns the [`Context`] and serializes every mutation of it: received lines,
//! button presses and periodic ticks all go through `&mut self`. The
//! dispatcher only moves axes into their `Requesting*` states; `tick` drives
//! each of them to the matching stable state, calling the board hooks on the
//! way.

use crate::config::MAX_TICK_ACTIONS;
use crate::context::Context;
use crate::error::Error;
use crate::hooks::{ButtonEvent, Hooks, IndicatorChannel, IndicatorMode, PathHandle};
use crate::indicator_logic::indicator_mode;
use crate::protocol::{self, encode_into, Action, Command, Notification, Outbound};
use crate::record::{plausible_unix_time, GpsSource, RecordInfo, TimeSource};
use crate::scheduler::{TimerHandle, TimerKind};
use crate::state::{BleState, BtState, MonState, RecState};
use heapless::Vec;

type TickActions = Vec<Action, MAX_TICK_ACTIONS>;

pub struct Coordinator {
    ctx: Context,
    /// Last mode pushed to each LED, `None` until first set.
    indicators: [Option<IndicatorMode>; IndicatorChannel::ALL.len()],
    /// Waiting for `READY` after a reset.
    booting: bool,
    /// Paths of the occurrence being captured.
    capture: Option<PathHandle>,
    recording_timer: Option<TimerHandle>,
    wait_timer: Option<TimerHandle>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            ctx: Context::new(),
            indicators: [None; IndicatorChannel::ALL.len()],
            booting: true,
            capture: None,
            recording_timer: None,
            wait_timer: None,
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }

    pub fn is_module_ready(&self) -> bool {
        self.ctx.module_ready
    }

    /// Earliest pending recording timer (uptime ms).
    pub fn next_deadline(&self) -> Option<u64> {
        self.ctx.scheduler.next_deadline()
    }

    /// Reset the module. Sent at boot and again while `READY` is missing.
    pub fn startup(&mut self) -> Outbound {
        self.ctx.module_ready = false;
        self.booting = true;
        info!("Resetting Bluetooth module");
        protocol::encode(&self.ctx, Command::Reset.into())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Events
    // ═══════════════════════════════════════════════════════════════════════

    /// Process one line received from the module.
    pub fn handle_line(&mut self, line: &str) -> Outbound {
        let action = protocol::process_line(&mut self.ctx, line);
        match action {
            Action::Command(Command::RecordStart) => self.request_recording(true),
            Action::Command(Command::RecordStop) => self.request_recording(false),
            _ => {}
        }
        protocol::encode(&self.ctx, action)
    }

    /// Process one debounced button press.
    pub fn handle_button(&mut self, event: ButtonEvent) -> Outbound {
        info!("Button: {}", event);
        let mut actions = TickActions::new();
        let state = &mut self.ctx.state;

        match event {
            ButtonEvent::Record => {
                let start = state.rec == RecState::Off;
                self.request_recording(start);
            }
            ButtonEvent::Monitor => {
                state.mon = match state.mon {
                    MonState::Off | MonState::RequestingOff => MonState::RequestingOn,
                    MonState::On | MonState::RequestingOn => MonState::RequestingOff,
                };
            }
            ButtonEvent::Pairing => match state.bt {
                BtState::Idle | BtState::Disconnected => {
                    state.bt = BtState::Inquiry;
                    self.ctx.registry.reset();
                    push(&mut actions, Command::Inquiry);
                }
                BtState::Connected | BtState::Playing => {
                    state.bt = BtState::RequestingDisconnect;
                }
                _ => debug!("Pairing ignored in {}", state.bt),
            },
            ButtonEvent::Power => {
                if state.bt == BtState::Off && state.ble == BleState::Off {
                    state.bt = BtState::Idle;
                    state.ble = BleState::RequestingAdvertise;
                    push(&mut actions, Command::PowerOn);
                } else {
                    if state.bt == BtState::Playing {
                        if let Some(id) = self.ctx.links.music_link_id() {
                            push(&mut actions, Command::MusicStop(id));
                        }
                    }
                    push(&mut actions, Command::AdvertisingOff);
                    push(&mut actions, Command::PowerOff);
                    state.bt = BtState::Off;
                    state.ble = BleState::Off;
                    if state.mon != MonState::Off {
                        state.mon = MonState::RequestingOff;
                    }
                    self.ctx.links.clear_classic();
                    self.ctx.links.clear_ble();
                }
            }
        }

        self.render(&actions)
    }

    fn request_recording(&mut self, start: bool) {
        let rec = &mut self.ctx.state.rec;
        match (start, *rec) {
            (true, RecState::Off) => *rec = RecState::RequestingOn,
            (true, _) => debug!("Recording already running"),
            (false, RecState::Off | RecState::RequestingOff) => {}
            (false, _) => *rec = RecState::RequestingOff,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Tick
    // ═══════════════════════════════════════════════════════════════════════

    /// Resolve every pending request and fire expired timers.
    ///
    /// Returns the lines to send to the module.
    pub fn tick<H: Hooks>(&mut self, hooks: &mut H) -> Outbound {
        let mut actions = TickActions::new();
        let now_ms = hooks.uptime_ms();

        if let Some(update) = self.ctx.pending_time.take() {
            hooks.set_current_time(update.unix_secs, update.source);
            self.ctx.time_was_set = true;
            info!("Clock set to {}", update.unix_secs);
        }

        if self.booting && self.ctx.module_ready {
            self.booting = false;
            self.ctx.state.bt = BtState::Idle;
            if self.ctx.state.ble == BleState::Off {
                self.ctx.state.ble = BleState::RequestingAdvertise;
            }
        }

        let fired = self.ctx.scheduler.poll(
            now_ms,
            self.ctx.next.sequence_index,
            &mut self.ctx.state.rec,
        );
        for kind in fired {
            match kind {
                TimerKind::RecordingEnd => self.recording_timer = None,
                TimerKind::PeriodWait => self.wait_timer = None,
            }
        }

        self.resolve_bt(&mut actions);
        self.resolve_ble(&mut actions);
        self.resolve_monitoring(hooks, &mut actions);
        self.resolve_recording(hooks, now_ms, &mut actions);
        self.refresh_indicators(hooks);

        self.render(&actions)
    }

    fn resolve_bt(&mut self, actions: &mut TickActions) {
        match self.ctx.state.bt {
            BtState::RequestingConnect => {
                self.ctx.state.bt = BtState::Connected;
                info!("BT: connected to {}", self.ctx.links.peer_address.as_str());
                push(actions, Notification::BtState);
            }
            BtState::RequestingDisconnect => {
                let links = &mut self.ctx.links;
                if self.ctx.state.mon == MonState::On {
                    if let Some(id) = links.music_link_id() {
                        push(actions, Command::MusicStop(id));
                    }
                }
                for id in [links.avrcp_link_id, links.a2dp_link_id].into_iter().flatten() {
                    push(actions, Command::Close(id));
                }
                links.clear_classic();
                self.ctx.state.bt = BtState::Idle;
                if self.ctx.state.mon != MonState::Off {
                    self.ctx.state.mon = MonState::RequestingOff;
                }
                info!("BT: disconnected");
                push(actions, Notification::BtState);
            }
            _ => {}
        }
    }

    fn resolve_ble(&mut self, actions: &mut TickActions) {
        match self.ctx.state.ble {
            BleState::RequestingAdvertise => {
                self.ctx.state.ble = BleState::Advertising;
                push(actions, Command::AdvertisingOn);
            }
            BleState::RequestingConnect => {
                self.ctx.state.ble = BleState::Connected;
                info!("BLE: phone connected");
                push(actions, Notification::BtState);
                push(actions, Notification::RecState);
                push(actions, Notification::MonState);
            }
            BleState::RequestingDisconnect => {
                self.ctx.links.clear_ble();
                // Advertise again on the next tick.
                self.ctx.state.ble = BleState::RequestingAdvertise;
                info!("BLE: phone disconnected");
            }
            _ => {}
        }
    }

    fn resolve_monitoring<H: Hooks>(&mut self, hooks: &mut H, actions: &mut TickActions) {
        let state = &mut self.ctx.state;
        match state.mon {
            MonState::RequestingOn => {
                hooks.start_monitoring();
                state.mon = MonState::On;
                if state.bt == BtState::Connected {
                    state.bt = BtState::Playing;
                    push(actions, Command::MusicPlay);
                }
                push(actions, Notification::MonState);
            }
            MonState::RequestingOff => {
                hooks.stop_monitoring();
                state.mon = MonState::Off;
                if state.bt == BtState::Playing {
                    state.bt = BtState::Connected;
                    push(actions, Command::MusicPause);
                }
                push(actions, Notification::MonState);
            }
            _ => {}
        }
    }

    fn resolve_recording<H: Hooks>(
        &mut self,
        hooks: &mut H,
        now_ms: u64,
        actions: &mut TickActions,
    ) {
        match self.ctx.state.rec {
            RecState::RequestingOn => {
                self.ctx.next = RecordInfo::default();
                self.begin_occurrence(hooks, now_ms, actions);
            }
            RecState::RequestingRestart => {
                self.ctx.next.sequence_index += 1;
                self.begin_occurrence(hooks, now_ms, actions);
            }
            RecState::RequestingPause => {
                self.finish_occurrence(hooks);
                self.wait_timer = Some(self.ctx.scheduler.arm_wait(now_ms));
                self.ctx.state.rec = RecState::Idle;
                push(actions, Notification::RecState);
                push(actions, Notification::RecNext);
            }
            RecState::RequestingOff => {
                self.cancel_timers();
                self.finish_occurrence(hooks);
                self.ctx.state.rec = RecState::Off;
                info!("REC: run stopped");
                push(actions, Notification::RecState);
            }
            _ => {}
        }
    }

    fn begin_occurrence<H: Hooks>(
        &mut self,
        hooks: &mut H,
        now_ms: u64,
        actions: &mut TickActions,
    ) {
        match self.start_capture(hooks, now_ms) {
            Ok(()) => {
                self.ctx.state.rec = RecState::On;
                info!("REC: occurrence {} started", self.ctx.next.sequence_index + 1);
                push(actions, Notification::RecState);
                push(actions, Notification::RecNb);
                push(actions, Notification::FilePath);
            }
            Err(e) => {
                error!("REC: cannot start recording: {}", e);
                self.cancel_timers();
                self.ctx.state.rec = RecState::Off;
                push(actions, Notification::RecState);
            }
        }
    }

    fn start_capture<H: Hooks>(&mut self, hooks: &mut H, now_ms: u64) -> Result<(), Error> {
        let (fix, source) = match self.ctx.phone_fix {
            Some(fix) => (Some(fix), GpsSource::Phone),
            None => (hooks.acquire_fix(), GpsSource::Receiver),
        };
        if !self.ctx.time_was_set {
            let gps_time = fix.and_then(|f| f.timestamp).filter(|&ts| plausible_unix_time(ts));
            if let Some(ts) = gps_time {
                hooks.set_current_time(ts, TimeSource::Gps);
                self.ctx.time_was_set = true;
                info!("Clock set to {} from GPS", ts);
            }
        }

        let window = *self.ctx.scheduler.window();
        let info = &mut self.ctx.next;
        info.timestamp = hooks.now_unix();
        info.time_was_set = self.ctx.time_was_set;
        info.duration = window.length;
        info.period = window.period;
        info.total_occurrences = window.occurrences;
        info.set_fix(fix, source);

        let paths = hooks.create_recording_path(info)?;
        info.recording_path = paths.recording.clone();
        info.metadata_path = paths.metadata.clone();
        hooks.prepare_recording(&paths)?;

        self.capture = Some(paths);
        self.recording_timer = Some(self.ctx.scheduler.arm_recording(now_ms));
        Ok(())
    }

    /// Stop capturing, finalize the file and keep it as the last recording.
    fn finish_occurrence<H: Hooks>(&mut self, hooks: &mut H) {
        let Some(paths) = self.capture.take() else {
            return;
        };
        let bytes = hooks.pause_recording();
        if let Err(e) = hooks.write_recording_header(&paths, bytes) {
            warn!("REC: header not written: {}", e);
        }
        self.ctx.last = self.ctx.next.clone();
        debug!("REC: {} bytes captured", bytes);
    }

    fn cancel_timers(&mut self) {
        for handle in [self.recording_timer.take(), self.wait_timer.take()]
            .into_iter()
            .flatten()
        {
            self.ctx.scheduler.cancel(handle);
        }
    }

    fn refresh_indicators<H: Hooks>(&mut self, hooks: &mut H) {
        let peak = hooks.peak_detected();
        for channel in IndicatorChannel::ALL {
            let mode = indicator_mode(channel, &self.ctx.state, peak);
            let cached = &mut self.indicators[channel.index()];
            if *cached != Some(mode) {
                hooks.set_indicator(channel, mode);
                *cached = Some(mode);
            }
        }
    }

    fn render(&self, actions: &[Action]) -> Outbound {
        let mut out = Outbound::new();
        for &action in actions {
            encode_into(&self.ctx, action, &mut out);
        }
        out
    }
}

fn push(actions: &mut TickActions, action: impl Into<Action>) {
    if actions.push(action.into()).is_err() {
        warn!("Action queue full");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{AudioPath, Clock, Gps, Indicators, Storage};
    use crate::error::StorageError;
    use crate::record::GpsFix;
    use core::fmt::Write;

    #[derive(Default)]
    struct Board {
        uptime_ms: u64,
        unix: u64,
        clock_sets: usize,
        monitoring: bool,
        capturing: bool,
        headers: usize,
        files: u32,
        fail_storage: bool,
        fail_audio: bool,
        time_source: Option<TimeSource>,
        fix: Option<GpsFix>,
        leds: [IndicatorMode; 5],
        peak: bool,
    }

    impl AudioPath for Board {
        fn start_monitoring(&mut self) {
            self.monitoring = true;
        }
        fn stop_monitoring(&mut self) {
            self.monitoring = false;
        }
        fn prepare_recording(&mut self, _path: &PathHandle) -> Result<(), Error> {
            if self.fail_audio {
                return Err(Error::AudioUnavailable);
            }
            self.capturing = true;
            Ok(())
        }
        fn pause_recording(&mut self) -> u32 {
            self.capturing = false;
            48_000
        }
        fn peak_detected(&mut self) -> bool {
            self.peak
        }
    }

    impl Storage for Board {
        fn create_recording_path(&mut self, _info: &RecordInfo) -> Result<PathHandle, Error> {
            if self.fail_storage {
                return Err(StorageError::Unavailable.into());
            }
            self.files += 1;
            let mut paths = PathHandle::default();
            let _ = write!(paths.recording, "/REC/{:04}.WAV", self.files);
            let _ = write!(paths.metadata, "/REC/{:04}.TXT", self.files);
            Ok(paths)
        }
        fn write_recording_header(&mut self, _path: &PathHandle, _len: u32) -> Result<(), Error> {
            self.headers += 1;
            Ok(())
        }
    }

    impl Gps for Board {
        fn acquire_fix(&mut self) -> Option<GpsFix> {
            self.fix
        }
    }

    impl Indicators for Board {
        fn set_indicator(&mut self, channel: IndicatorChannel, mode: IndicatorMode) {
            self.leds[channel.index()] = mode;
        }
    }

    impl Clock for Board {
        fn now_unix(&self) -> u64 {
            self.unix + self.uptime_ms / 1000
        }
        fn uptime_ms(&self) -> u64 {
            self.uptime_ms
        }
        fn set_current_time(&mut self, unix_secs: u64, source: TimeSource) {
            self.unix = unix_secs;
            self.time_source = Some(source);
            self.clock_sets += 1;
        }
    }

    fn ready() -> (Coordinator, Board) {
        let mut coord = Coordinator::new();
        let mut board = Board::default();
        assert_eq!(coord.startup().as_str(), "RESET\r");
        assert!(coord.handle_line("READY").is_empty());
        assert_eq!(coord.tick(&mut board).as_str(), "ADVERTISING ON\r");
        (coord, board)
    }

    #[test]
    fn ready_brings_links_up() {
        let (coord, board) = ready();
        assert_eq!(coord.context().state.bt, BtState::Idle);
        assert_eq!(coord.context().state.ble, BleState::Advertising);
        assert_eq!(board.leds[IndicatorChannel::Bluetooth.index()], IndicatorMode::BlinkSlow);
        assert_eq!(board.leds[IndicatorChannel::Ble.index()], IndicatorMode::BlinkSlow);
    }

    #[test]
    fn nothing_happens_before_ready() {
        let mut coord = Coordinator::new();
        let mut board = Board::default();
        coord.startup();
        assert!(coord.tick(&mut board).is_empty());
        assert_eq!(coord.context().state.bt, BtState::Off);
        assert!(!coord.is_module_ready());
    }

    #[test]
    fn phone_connection_is_confirmed_on_tick() {
        let (mut coord, mut board) = ready();
        assert!(coord.handle_line("OPEN_OK 15 BLE 7C2A31001122").is_empty());
        assert_eq!(coord.context().state.ble, BleState::RequestingConnect);
        assert_eq!(
            coord.tick(&mut board).as_str(),
            "SEND 15 BT IDLE\rSEND 15 REC OFF\rSEND 15 MON OFF\r"
        );
        assert_eq!(coord.context().state.ble, BleState::Connected);
        assert_eq!(coord.handle_line("RECV 15 3 bt ?").as_str(), "STATUS\r");
    }

    #[test]
    fn phone_disconnect_readvertises() {
        let (mut coord, mut board) = ready();
        coord.handle_line("OPEN_OK 15 BLE 7C2A31001122");
        coord.tick(&mut board);
        coord.handle_line("CLOSE_OK 15 BLE 7C2A31001122");
        assert!(coord.tick(&mut board).is_empty());
        assert_eq!(coord.tick(&mut board).as_str(), "ADVERTISING ON\r");
        assert_eq!(coord.context().links.ble_link_id, None);
    }

    #[test]
    fn phone_time_reaches_clock() {
        let (mut coord, mut board) = ready();
        coord.handle_line("RECV 15 15 time 1700000000");
        coord.tick(&mut board);
        assert_eq!(board.clock_sets, 1);
        assert_eq!(board.unix, 1_700_000_000);
        assert!(coord.context().time_was_set);
        coord.tick(&mut board);
        assert_eq!(board.clock_sets, 1);
    }

    #[test]
    fn recording_run_follows_window() {
        let (mut coord, mut board) = ready();
        board.unix = 1_700_000_000;
        coord.handle_line("RECV 1 12 rwin 5 10 2");

        coord.handle_button(ButtonEvent::Record);
        coord.tick(&mut board);
        assert_eq!(coord.context().state.rec, RecState::On);
        assert!(board.capturing);
        assert_eq!(coord.context().next.recording_path.as_str(), "/REC/0001.WAV");
        assert_eq!(coord.next_deadline(), Some(5_000));

        board.uptime_ms = 5_000;
        coord.tick(&mut board);
        assert_eq!(coord.context().state.rec, RecState::Idle);
        assert!(!board.capturing);
        assert_eq!(board.headers, 1);
        assert_eq!(coord.context().last.sequence_index, 0);
        assert_eq!(coord.next_deadline(), Some(10_000));

        board.uptime_ms = 10_000;
        coord.tick(&mut board);
        assert_eq!(coord.context().state.rec, RecState::On);
        assert_eq!(coord.context().next.sequence_index, 1);
        assert_eq!(coord.context().next.recording_path.as_str(), "/REC/0002.WAV");

        // Last occurrence: the run ends.
        board.uptime_ms = 15_000;
        coord.tick(&mut board);
        assert_eq!(coord.context().state.rec, RecState::Off);
        assert_eq!(board.headers, 2);
        assert_eq!(coord.next_deadline(), None);
        assert_eq!(coord.context().last.sequence_index, 1);
    }

    #[test]
    fn stop_cancels_pending_timer() {
        let (mut coord, mut board) = ready();
        coord.handle_line("RECV 1 9 rec start");
        coord.tick(&mut board);
        assert!(coord.next_deadline().is_some());

        coord.handle_line("RECV 1 8 rec stop");
        coord.tick(&mut board);
        assert_eq!(coord.context().state.rec, RecState::Off);
        assert_eq!(coord.next_deadline(), None);
        assert_eq!(board.headers, 1);
    }

    #[test]
    fn storage_failure_abandons_run() {
        let (mut coord, mut board) = ready();
        board.fail_storage = true;
        coord.handle_button(ButtonEvent::Record);
        coord.tick(&mut board);
        assert_eq!(coord.context().state.rec, RecState::Off);
        assert!(!board.capturing);
        assert_eq!(coord.next_deadline(), None);
    }

    #[test]
    fn recording_uses_phone_fix_first() {
        let (mut coord, mut board) = ready();
        board.fix = Some(GpsFix {
            lat: 1.0,
            long: 2.0,
            timestamp: None,
        });
        coord.handle_button(ButtonEvent::Record);
        coord.tick(&mut board);
        assert_eq!(coord.context().next.gps_source, GpsSource::Receiver);

        coord.handle_button(ButtonEvent::Record);
        coord.tick(&mut board);
        coord.handle_line("RECV 1 20 latlong 48.8566 2.3522");
        coord.handle_button(ButtonEvent::Record);
        coord.tick(&mut board);
        assert_eq!(coord.context().next.gps_source, GpsSource::Phone);
        assert_eq!(coord.context().next.gps_lat, 48.8566);
    }

    #[test]
    fn monitoring_drives_sink_playback() {
        let (mut coord, mut board) = ready();
        coord.handle_line("OPEN_OK 2 A2DP 20FABB010272");
        coord.tick(&mut board);
        coord.handle_line("OPEN_OK 3 AVRCP 20FABB010272");
        assert_eq!(coord.context().state.bt, BtState::Connected);

        coord.handle_button(ButtonEvent::Monitor);
        assert_eq!(coord.tick(&mut board).as_str(), "MUSIC 3 PLAY\r");
        assert!(board.monitoring);
        assert_eq!(coord.context().state.bt, BtState::Playing);

        coord.handle_line("AVRCP_PAUSE 3");
        assert_eq!(coord.tick(&mut board).as_str(), "MUSIC 3 PAUSE\r");
        assert!(!board.monitoring);
        assert_eq!(coord.context().state.bt, BtState::Connected);
    }

    #[test]
    fn pairing_button_scans_then_disconnects() {
        let (mut coord, mut board) = ready();
        assert_eq!(coord.handle_button(ButtonEvent::Pairing).as_str(), "INQUIRY 10\r");
        assert_eq!(coord.context().state.bt, BtState::Inquiry);
        coord.handle_line("INQU_OK");
        coord.handle_line("LINK 2 CONNECTED A2DP 20FABB010272 SBC");
        coord.handle_line("LINK 3 CONNECTED AVRCP 20FABB010272 PLAYING");

        assert!(coord.handle_button(ButtonEvent::Pairing).is_empty());
        assert_eq!(coord.tick(&mut board).as_str(), "CLOSE 3\rCLOSE 2\r");
        assert_eq!(coord.context().state.bt, BtState::Idle);
        assert_eq!(coord.context().links.a2dp_link_id, None);
    }

    #[test]
    fn power_button_toggles_radio() {
        let (mut coord, mut board) = ready();
        assert_eq!(
            coord.handle_button(ButtonEvent::Power).as_str(),
            "ADVERTISING OFF\rPOWER OFF\r"
        );
        assert_eq!(coord.context().state.bt, BtState::Off);
        assert_eq!(coord.context().state.ble, BleState::Off);
        coord.tick(&mut board);
        assert_eq!(board.leds[IndicatorChannel::Bluetooth.index()], IndicatorMode::Off);

        assert_eq!(coord.handle_button(ButtonEvent::Power).as_str(), "POWER ON\r");
        assert_eq!(coord.tick(&mut board).as_str(), "ADVERTISING ON\r");
        assert_eq!(coord.context().state.bt, BtState::Idle);
    }

    #[test]
    fn peak_indicator_needs_audio() {
        let (mut coord, mut board) = ready();
        board.peak = true;
        coord.tick(&mut board);
        assert_eq!(board.leds[IndicatorChannel::Peak.index()], IndicatorMode::Off);

        coord.handle_button(ButtonEvent::Monitor);
        coord.tick(&mut board);
        assert_eq!(board.leds[IndicatorChannel::Peak.index()], IndicatorMode::On);
        assert_eq!(board.leds[IndicatorChannel::Monitor.index()], IndicatorMode::On);
    }

    #[test]
    fn out_of_range_phone_time_is_ignored() {
        let (mut coord, mut board) = ready();
        board.unix = 1_700_000_000;
        coord.handle_line("OPEN_OK 15 BLE 7C2A31001122");
        coord.tick(&mut board);

        coord.handle_line("RECV 15 24 time 18446744073709551615");
        coord.tick(&mut board);
        assert_eq!(board.clock_sets, 0);
        assert!(!coord.context().time_was_set);

        coord.handle_button(ButtonEvent::Record);
        coord.tick(&mut board);
        assert_eq!(
            coord.handle_line("RECV 15 10 rec_next ?").as_str(),
            "SEND 15 REC_NEXT 1700000600\r"
        );
    }

    #[test]
    fn garbage_clock_gives_no_next_start() {
        let (mut coord, mut board) = ready();
        coord.handle_line("OPEN_OK 15 BLE 7C2A31001122");
        coord.tick(&mut board);
        board.unix = u64::MAX;

        coord.handle_button(ButtonEvent::Record);
        coord.tick(&mut board);
        assert_eq!(
            coord.handle_line("RECV 15 10 rec_next ?").as_str(),
            "SEND 15 REC_NEXT 0\r"
        );
    }

    #[test]
    fn gps_time_sets_unset_clock() {
        let (mut coord, mut board) = ready();
        board.fix = Some(GpsFix {
            lat: 45.5,
            long: -73.6,
            timestamp: Some(1_750_000_000),
        });
        coord.handle_button(ButtonEvent::Record);
        coord.tick(&mut board);
        assert_eq!(board.clock_sets, 1);
        assert_eq!(board.time_source, Some(TimeSource::Gps));
        assert_eq!(coord.context().next.timestamp, 1_750_000_000);
        assert!(coord.context().next.time_was_set);

        // The clock is only taken from GPS once.
        coord.handle_button(ButtonEvent::Record);
        coord.tick(&mut board);
        coord.handle_button(ButtonEvent::Record);
        coord.tick(&mut board);
        assert_eq!(board.clock_sets, 1);
    }

    #[test]
    fn phone_time_wins_over_gps() {
        let (mut coord, mut board) = ready();
        board.fix = Some(GpsFix {
            lat: 45.5,
            long: -73.6,
            timestamp: Some(1_750_000_000),
        });
        coord.handle_line("RECV 15 15 time 1700000000");
        coord.handle_button(ButtonEvent::Record);
        coord.tick(&mut board);
        assert_eq!(board.clock_sets, 1);
        assert_eq!(board.time_source, Some(TimeSource::RemotePhone));
        assert_eq!(coord.context().next.timestamp, 1_700_000_000);
    }

    #[test]
    fn audio_failure_abandons_run() {
        let (mut coord, mut board) = ready();
        board.fail_audio = true;
        coord.handle_button(ButtonEvent::Record);
        coord.tick(&mut board);
        assert_eq!(coord.context().state.rec, RecState::Off);
        assert_eq!(coord.next_deadline(), None);
        assert_eq!(board.headers, 0);
    }

    #[test]
    fn teardown_stops_music_first() {
        let (mut coord, mut board) = ready();
        coord.handle_line("OPEN_OK 2 A2DP 20FABB010272");
        coord.tick(&mut board);
        coord.handle_line("OPEN_OK 3 AVRCP 20FABB010272");
        coord.handle_button(ButtonEvent::Monitor);
        coord.tick(&mut board);
        assert_eq!(coord.context().state.bt, BtState::Playing);

        coord.handle_line("RECV 15 4 disc");
        assert_eq!(coord.tick(&mut board).as_str(), "MUSIC 3 STOP\rCLOSE 3\rCLOSE 2\r");
        assert!(!board.monitoring);
    }

    #[test]
    fn power_off_while_playing_stops_music() {
        let (mut coord, mut board) = ready();
        coord.handle_line("OPEN_OK 2 A2DP 20FABB010272");
        coord.tick(&mut board);
        coord.handle_line("OPEN_OK 3 AVRCP 20FABB010272");
        coord.handle_button(ButtonEvent::Monitor);
        coord.tick(&mut board);

        assert_eq!(
            coord.handle_button(ButtonEvent::Power).as_str(),
            "MUSIC 3 STOP\rADVERTISING OFF\rPOWER OFF\r"
        );
        assert_eq!(coord.context().state.bt, BtState::Off);
    }
}
