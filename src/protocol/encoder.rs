//! Command / notification / error encoder.
//!
//! Renders an [`Action`] to the exact wire text, reading the current
//! [`Context`]. Every line ends with `\r`. Notifications and error replies go
//! to the phone through `SEND <ble_id> ...` and render to nothing while no
//! BLE link id is known.

use core::fmt::{Arguments, Write};

use crate::config::{INQUIRY_DURATION_SECS, LINE_CAPACITY, OUTBOUND_CAPACITY};
use crate::context::Context;
use crate::protocol::action::{Action, Command, ErrorReply, Notification};
use crate::record::GpsSource;
use crate::state::{BleState, RecState};
use heapless::String;

/// One batch of outbound text: zero or more `\r`-terminated lines.
pub type Outbound = String<OUTBOUND_CAPACITY>;

/// Render `action` as wire text. Empty means nothing to transmit.
pub fn encode(ctx: &Context, action: Action) -> Outbound {
    let mut out = Outbound::new();
    encode_into(ctx, action, &mut out);
    out
}

/// Append the wire text for `action` to `out`.
///
/// A line that does not fit is dropped whole; lines already queued are kept.
pub fn encode_into(ctx: &Context, action: Action, out: &mut Outbound) {
    match action {
        Action::None => {}
        Action::Command(command) => encode_command(ctx, command, out),
        Action::Notify(notification) => encode_notification(ctx, notification, out),
        Action::Error(reply) => {
            let text = match reply {
                ErrorReply::RwinBadRequest => "RWIN ERR BAD REQUEST",
                ErrorReply::RwinWrongParams => "RWIN ERR WRONG PARAMS",
                ErrorReply::VolNoBtDevice => "VOL ERR NO BT DEVICE",
            };
            send(ctx, out, format_args!("{}", text));
        }
    }
}

fn encode_command(ctx: &Context, command: Command, out: &mut Outbound) {
    let links = &ctx.links;
    match command {
        Command::AdvertisingOn => push_line(out, format_args!("ADVERTISING ON")),
        Command::AdvertisingOff => push_line(out, format_args!("ADVERTISING OFF")),
        Command::PowerOn => push_line(out, format_args!("POWER ON")),
        Command::PowerOff => push_line(out, format_args!("POWER OFF")),
        Command::RequestPeerName => {
            if !links.peer_address.is_empty() {
                push_line(out, format_args!("NAME {}", links.peer_address));
            }
        }
        Command::Connect => match ctx.registry.find_by_name(&links.peer_name) {
            Some(address) => push_line(out, format_args!("OPEN {} A2DP", address)),
            None => warn!("No discovered peer named {}", links.peer_name.as_str()),
        },
        Command::Close(id) => push_line(out, format_args!("CLOSE {}", id)),
        Command::Inquiry => {
            push_line(out, format_args!("INQUIRY {}", INQUIRY_DURATION_SECS));
            encode_notification(ctx, Notification::InquiryStart, out);
        }
        Command::MusicStop(id) => push_line(out, format_args!("MUSIC {} STOP", id)),
        Command::MusicPlay | Command::MusicPause => {
            let verb = if command == Command::MusicPlay {
                "PLAY"
            } else {
                "PAUSE"
            };
            if let Some(id) = links.music_link_id() {
                push_line(out, format_args!("MUSIC {} {}", id, verb));
            }
        }
        Command::VolumeUp | Command::VolumeDown | Command::VolumeSet(_) => {
            let Some(id) = links.a2dp_link_id.or(links.avrcp_link_id) else {
                return;
            };
            match command {
                Command::VolumeUp => push_line(out, format_args!("VOLUME {} UP", id)),
                Command::VolumeDown => push_line(out, format_args!("VOLUME {} DOWN", id)),
                Command::VolumeSet(level) => {
                    push_line(out, format_args!("VOLUME {} {}", id, level))
                }
                _ => {}
            }
        }
        Command::Reset => push_line(out, format_args!("RESET")),
        Command::Status => push_line(out, format_args!("STATUS")),
        // Local commands, consumed by the coordinator.
        Command::RecordStart | Command::RecordStop => {}
    }
}

fn encode_notification(ctx: &Context, notification: Notification, out: &mut Outbound) {
    let rec = ctx.state.rec;
    match notification {
        Notification::BtState => {
            let bt = ctx.state.bt;
            let name = &ctx.links.peer_name;
            if bt.has_sink() && !name.is_empty() {
                send(ctx, out, format_args!("BT {} {}", bt.label(), name));
            } else {
                send(ctx, out, format_args!("BT {}", bt.label()));
            }
        }
        Notification::InquiryStart => send(ctx, out, format_args!("INQ START")),
        Notification::InquiryPeer(slot) => {
            if let Some(peer) = ctx.registry.get(slot) {
                send(ctx, out, format_args!("INQ {} {}", peer.name, peer.strength));
            }
        }
        Notification::InquiryResults => {
            for peer in ctx.registry.iter() {
                send(ctx, out, format_args!("INQ {} {}", peer.name, peer.strength));
            }
        }
        Notification::InquiryDone => send(ctx, out, format_args!("INQ DONE")),
        Notification::FilePath => {
            let path = &ctx.current_record().recording_path;
            send(ctx, out, format_args!("FP {}", path));
        }
        Notification::LatLong => {
            let (lat, long) = match ctx.phone_fix {
                Some(fix) => (fix.lat, fix.long),
                None => {
                    let record = ctx.current_record();
                    if record.gps_source == GpsSource::None {
                        (0.0, 0.0)
                    } else {
                        (record.gps_lat, record.gps_long)
                    }
                }
            };
            send(ctx, out, format_args!("LATLONG {:.6} {:.6}", lat, long));
        }
        Notification::MonState => send(ctx, out, format_args!("MON {}", ctx.state.mon.label())),
        Notification::RecState => send(ctx, out, format_args!("REC {}", rec.label())),
        Notification::RecNb => {
            let n = if rec.in_run() {
                ctx.next.sequence_index + 1
            } else {
                0
            };
            send(ctx, out, format_args!("REC_NB {}", n));
        }
        Notification::RecNext => {
            let next = match rec {
                RecState::Idle | RecState::RequestingRestart => ctx.last.next_start(),
                RecState::On | RecState::RequestingPause => ctx.next.next_start(),
                _ => None,
            };
            send(ctx, out, format_args!("REC_NEXT {}", next.unwrap_or(0)));
        }
        Notification::RecTs => {
            let ts = if rec.in_run() {
                ctx.next.timestamp
            } else {
                ctx.last.timestamp
            };
            send(ctx, out, format_args!("REC_TS {}", ts));
        }
        Notification::RwinValues => {
            let window = ctx.scheduler.window();
            send(
                ctx,
                out,
                format_args!(
                    "RWIN {} {} {}",
                    window.length.as_secs(),
                    window.period.as_secs(),
                    window.occurrences
                ),
            );
        }
        Notification::RwinOk => send(ctx, out, format_args!("RWIN PARAMS OK")),
        Notification::Volume => {
            if ctx.state.ble == BleState::Connected {
                send(ctx, out, format_args!("VOL {:.2}", ctx.volume));
            }
        }
    }
}

/// Relay a tagged line to the phone over the BLE link.
fn send(ctx: &Context, out: &mut Outbound, payload: Arguments<'_>) {
    match ctx.links.ble_link_id {
        Some(ble) => push_line(out, format_args!("SEND {} {}", ble, payload)),
        None => trace!("No BLE link - notification dropped"),
    }
}

fn push_line(out: &mut Outbound, args: Arguments<'_>) {
    let mut line: String<LINE_CAPACITY> = String::new();
    let fits = line.write_fmt(args).is_ok() && line.push('\r').is_ok();
    if !fits || out.push_str(&line).is_err() {
        warn!("Outbound line dropped ({} bytes queued)", out.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::BtState;

    fn phone_connected() -> Context {
        let mut ctx = Context::new();
        ctx.links.ble_link_id = Some(1);
        ctx.state.ble = BleState::Connected;
        ctx
    }

    #[test]
    fn plain_commands() {
        let ctx = Context::new();
        assert_eq!(encode(&ctx, Command::AdvertisingOn.into()).as_str(), "ADVERTISING ON\r");
        assert_eq!(encode(&ctx, Command::AdvertisingOff.into()).as_str(), "ADVERTISING OFF\r");
        assert_eq!(encode(&ctx, Command::PowerOn.into()).as_str(), "POWER ON\r");
        assert_eq!(encode(&ctx, Command::PowerOff.into()).as_str(), "POWER OFF\r");
        assert_eq!(encode(&ctx, Command::Reset.into()).as_str(), "RESET\r");
        assert_eq!(encode(&ctx, Command::Status.into()).as_str(), "STATUS\r");
        assert_eq!(encode(&ctx, Command::Close(4).into()).as_str(), "CLOSE 4\r");
        assert_eq!(encode(&ctx, Command::MusicStop(4).into()).as_str(), "MUSIC 4 STOP\r");
    }

    #[test]
    fn no_action_and_local_commands_are_empty() {
        let ctx = phone_connected();
        assert!(encode(&ctx, Action::None).is_empty());
        assert!(encode(&ctx, Command::RecordStart.into()).is_empty());
        assert!(encode(&ctx, Command::RecordStop.into()).is_empty());
    }

    #[test]
    fn inquiry_also_tells_the_phone() {
        let ctx = phone_connected();
        assert_eq!(
            encode(&ctx, Command::Inquiry.into()).as_str(),
            "INQUIRY 10\rSEND 1 INQ START\r"
        );
        assert_eq!(encode(&Context::new(), Command::Inquiry.into()).as_str(), "INQUIRY 10\r");
    }

    #[test]
    fn peer_commands_need_link_ids() {
        let mut ctx = Context::new();
        assert!(encode(&ctx, Command::MusicPlay.into()).is_empty());
        assert!(encode(&ctx, Command::VolumeUp.into()).is_empty());
        assert!(encode(&ctx, Command::RequestPeerName.into()).is_empty());

        ctx.links.a2dp_link_id = Some(3);
        ctx.links.avrcp_link_id = Some(4);
        let _ = ctx.links.peer_address.push_str("00:11:22:33:44:55");
        assert_eq!(encode(&ctx, Command::MusicPlay.into()).as_str(), "MUSIC 4 PLAY\r");
        assert_eq!(encode(&ctx, Command::MusicPause.into()).as_str(), "MUSIC 4 PAUSE\r");
        assert_eq!(encode(&ctx, Command::VolumeUp.into()).as_str(), "VOLUME 3 UP\r");
        assert_eq!(encode(&ctx, Command::VolumeDown.into()).as_str(), "VOLUME 3 DOWN\r");
        assert_eq!(encode(&ctx, Command::VolumeSet(90).into()).as_str(), "VOLUME 3 90\r");
        assert_eq!(
            encode(&ctx, Command::RequestPeerName.into()).as_str(),
            "NAME 00:11:22:33:44:55\r"
        );
    }

    #[test]
    fn connect_resolves_name_through_registry() {
        let mut ctx = Context::new();
        ctx.registry.observe("20FABB010272", "Headset", "240404", 54);
        let _ = ctx.links.peer_name.push_str("headset");
        assert_eq!(
            encode(&ctx, Command::Connect.into()).as_str(),
            "OPEN 20FABB010272 A2DP\r"
        );

        ctx.links.peer_name.clear();
        let _ = ctx.links.peer_name.push_str("Speaker");
        assert!(encode(&ctx, Command::Connect.into()).is_empty());
    }

    #[test]
    fn notifications_need_ble_link() {
        let ctx = Context::new();
        assert!(encode(&ctx, Notification::RecState.into()).is_empty());
        assert!(encode(&ctx, ErrorReply::VolNoBtDevice.into()).is_empty());
    }

    #[test]
    fn error_replies() {
        let ctx = phone_connected();
        assert_eq!(
            encode(&ctx, ErrorReply::RwinBadRequest.into()).as_str(),
            "SEND 1 RWIN ERR BAD REQUEST\r"
        );
        assert_eq!(
            encode(&ctx, ErrorReply::RwinWrongParams.into()).as_str(),
            "SEND 1 RWIN ERR WRONG PARAMS\r"
        );
        assert_eq!(
            encode(&ctx, ErrorReply::VolNoBtDevice.into()).as_str(),
            "SEND 1 VOL ERR NO BT DEVICE\r"
        );
    }

    #[test]
    fn bt_state_includes_peer_name_when_connected() {
        let mut ctx = phone_connected();
        assert_eq!(encode(&ctx, Notification::BtState.into()).as_str(), "SEND 1 BT OFF\r");

        ctx.state.bt = BtState::Connected;
        let _ = ctx.links.peer_name.push_str("My Phones");
        assert_eq!(
            encode(&ctx, Notification::BtState.into()).as_str(),
            "SEND 1 BT CONNECTED My Phones\r"
        );
    }

    #[test]
    fn volume_only_rendered_while_phone_connected() {
        let mut ctx = phone_connected();
        ctx.volume = 64.0 / 127.0;
        assert_eq!(encode(&ctx, Notification::Volume.into()).as_str(), "SEND 1 VOL 0.50\r");

        ctx.state.ble = BleState::Advertising;
        assert!(encode(&ctx, Notification::Volume.into()).is_empty());
    }

    #[test]
    fn inquiry_results_fan_out_per_peer() {
        let mut ctx = phone_connected();
        ctx.registry.observe("A1", "Headset", "240404", 54);
        ctx.registry.observe("A2", "Speaker", "240414", 71);
        assert_eq!(
            encode(&ctx, Notification::InquiryResults.into()).as_str(),
            "SEND 1 INQ Headset 54\rSEND 1 INQ Speaker 71\r"
        );
        assert_eq!(
            encode(&ctx, Notification::InquiryPeer(1).into()).as_str(),
            "SEND 1 INQ Speaker 71\r"
        );
        assert!(encode(&ctx, Notification::InquiryPeer(5).into()).is_empty());
        assert_eq!(encode(&ctx, Notification::InquiryDone.into()).as_str(), "SEND 1 INQ DONE\r");
    }

    #[test]
    fn recording_window_values() {
        let ctx = phone_connected();
        assert_eq!(
            encode(&ctx, Notification::RwinValues.into()).as_str(),
            "SEND 1 RWIN 300 600 0\r"
        );
        assert_eq!(encode(&ctx, Notification::RwinOk.into()).as_str(), "SEND 1 RWIN PARAMS OK\r");
    }

    #[test]
    fn record_queries_follow_lifecycle() {
        let mut ctx = phone_connected();
        assert_eq!(encode(&ctx, Notification::RecState.into()).as_str(), "SEND 1 REC OFF\r");
        assert_eq!(encode(&ctx, Notification::RecNb.into()).as_str(), "SEND 1 REC_NB 0\r");
        assert_eq!(encode(&ctx, Notification::RecNext.into()).as_str(), "SEND 1 REC_NEXT 0\r");

        ctx.state.rec = RecState::On;
        ctx.next.timestamp = 1_700_000_000;
        ctx.next.period = core::time::Duration::from_secs(600);
        ctx.next.sequence_index = 1;
        let _ = ctx.next.recording_path.push_str("/REC/0002.WAV");
        assert_eq!(encode(&ctx, Notification::RecState.into()).as_str(), "SEND 1 REC ON\r");
        assert_eq!(encode(&ctx, Notification::RecNb.into()).as_str(), "SEND 1 REC_NB 2\r");
        assert_eq!(
            encode(&ctx, Notification::RecTs.into()).as_str(),
            "SEND 1 REC_TS 1700000000\r"
        );
        assert_eq!(
            encode(&ctx, Notification::RecNext.into()).as_str(),
            "SEND 1 REC_NEXT 1700000600\r"
        );
        assert_eq!(
            encode(&ctx, Notification::FilePath.into()).as_str(),
            "SEND 1 FP /REC/0002.WAV\r"
        );

        ctx.state.rec = RecState::Idle;
        assert_eq!(encode(&ctx, Notification::RecState.into()).as_str(), "SEND 1 REC WAIT\r");
    }

    #[test]
    fn latlong_prefers_phone_fix() {
        let mut ctx = phone_connected();
        assert_eq!(
            encode(&ctx, Notification::LatLong.into()).as_str(),
            "SEND 1 LATLONG 0.000000 0.000000\r"
        );
        ctx.phone_fix = Some(crate::record::GpsFix {
            lat: 45.5,
            long: -73.25,
            timestamp: None,
        });
        assert_eq!(
            encode(&ctx, Notification::LatLong.into()).as_str(),
            "SEND 1 LATLONG 45.500000 -73.250000\r"
        );
    }

    #[test]
    fn overlong_line_is_dropped_whole() {
        let mut ctx = phone_connected();
        let mut out = Outbound::new();
        for _ in 0..OUTBOUND_CAPACITY {
            if out.push('x').is_err() {
                break;
            }
        }
        ctx.state.rec = RecState::On;
        encode_into(&ctx, Notification::RecState.into(), &mut out);
        assert_eq!(out.len(), OUTBOUND_CAPACITY);
        assert!(out.chars().all(|c| c == 'x'));
    }
}
