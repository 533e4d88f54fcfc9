//! Notification dispatcher - the protocol core.
//!
//! The module's grammar is overloaded by arity: the same keyword means
//! different things depending on how many parameters follow it, and `RECV`
//! carries a nested request from the phone at parameter position 3.
//!
//! Dispatch is two steps. [`classify`] turns a [`ParsedMessage`] into an
//! [`Inbound`] value (arity, then keyword, then the nested `RECV` keyword),
//! with [`Inbound::Unrecognized`] as the default arm. [`dispatch`] then
//! applies it to the [`Context`] and yields at most one [`Action`]. No I/O
//! happens here.

use crate::config::{ABS_VOLUME_MAX, NAME_CAPACITY};
use crate::context::Context;
use crate::protocol::action::{Action, Command, ErrorReply, Notification};
use crate::protocol::tokenizer::ParsedMessage;
use crate::record::{
    parse_time_of_day, plausible_unix_time, GpsFix, RecordingWindow, TimeSource, TimeUpdate,
};
use crate::state::{BleState, BtState, MonState, Profile};
use crate::text::{bounded, join_words, strip_quotes};
use heapless::String;

/// Room for two quoted words before the quotes are stripped.
const JOINED_NAME_CAPACITY: usize = NAME_CAPACITY + 2;

/// Top-level keywords the module sends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Keyword {
    InquOk,
    Ready,
    AvrcpPlay,
    AvrcpPause,
    AbsVol,
    LinkLoss,
    Name,
    CloseOk,
    OpenOk,
    Recv,
    State,
    Inquiry,
    Link,
}

const KEYWORDS: [(&str, Keyword); 13] = [
    ("INQU_OK", Keyword::InquOk),
    ("READY", Keyword::Ready),
    ("AVRCP_PLAY", Keyword::AvrcpPlay),
    ("AVRCP_PAUSE", Keyword::AvrcpPause),
    ("ABS_VOL", Keyword::AbsVol),
    ("LINK_LOSS", Keyword::LinkLoss),
    ("NAME", Keyword::Name),
    ("CLOSE_OK", Keyword::CloseOk),
    ("OPEN_OK", Keyword::OpenOk),
    ("RECV", Keyword::Recv),
    ("STATE", Keyword::State),
    ("INQUIRY", Keyword::Inquiry),
    ("LINK", Keyword::Link),
];

impl Keyword {
    fn parse(s: &str) -> Option<Self> {
        KEYWORDS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|&(_, k)| k)
    }
}

/// Requests the phone relays inside `RECV`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Topic {
    Inq,
    Disc,
    LatLong,
    Conn,
    Time,
    Rec,
    RecNext,
    RecNb,
    RecTs,
    Mon,
    Vol,
    Bt,
    Rwin,
    FilePath,
}

const TOPICS: [(&str, Topic); 14] = [
    ("inq", Topic::Inq),
    ("disc", Topic::Disc),
    ("latlong", Topic::LatLong),
    ("conn", Topic::Conn),
    ("time", Topic::Time),
    ("rec", Topic::Rec),
    ("rec_next", Topic::RecNext),
    ("rec_nb", Topic::RecNb),
    ("rec_ts", Topic::RecTs),
    ("mon", Topic::Mon),
    ("vol", Topic::Vol),
    ("bt", Topic::Bt),
    ("rwin", Topic::Rwin),
    ("filepath", Topic::FilePath),
];

impl Topic {
    fn parse(s: &str) -> Option<Self> {
        TOPICS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|&(_, t)| t)
    }
}

/// A classified inbound notification.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound<'a> {
    InquiryComplete,
    ModuleReady,
    AvrcpPlay,
    AvrcpPause,
    AbsoluteVolume {
        value: u8,
    },
    LinkLoss {
        link: Option<u8>,
        status: &'a str,
    },
    PeerName(String<NAME_CAPACITY>),
    CloseOk {
        link: Option<u8>,
    },
    OpenOk {
        link: Option<u8>,
        profile: Profile,
        address: &'a str,
    },
    LinkUp {
        link: Option<u8>,
        profile: Profile,
        address: &'a str,
    },
    StateReport {
        flags: &'a str,
    },
    InquiryResult {
        address: &'a str,
        name: String<NAME_CAPACITY>,
        capabilities: &'a str,
        strength: u8,
    },
    Remote(Remote<'a>),
    Unrecognized,
}

/// A request from the phone app, relayed by `RECV`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Remote<'a> {
    StartInquiry,
    Disconnect,
    ClearLatLong,
    /// Peer name, in one word or two.
    Connect(&'a str, &'a str),
    SetTime(&'a str),
    Record(&'a str),
    RecNext(&'a str),
    RecNb(&'a str),
    RecTs(&'a str),
    Monitor(&'a str),
    Volume(&'a str),
    BtStatus(&'a str),
    Rwin(&'a str),
    FilePath(&'a str),
    LatLongQuery(&'a str),
    InquiryQuery(&'a str),
    LatLong {
        lat: &'a str,
        long: &'a str,
    },
    SetWindow {
        length: &'a str,
        period: &'a str,
        occurrences: &'a str,
    },
}

/// Classify a tokenized line against the arity/keyword grammar.
pub fn classify<'a>(msg: &ParsedMessage<'a>) -> Inbound<'a> {
    let Some(keyword) = Keyword::parse(msg.keyword) else {
        return Inbound::Unrecognized;
    };
    let p = |idx: usize| msg.param(idx).unwrap_or("");
    let link = || p(0).parse::<u8>().ok();

    match (msg.arity(), keyword) {
        (0, Keyword::InquOk) => Inbound::InquiryComplete,
        (0, Keyword::Ready) => Inbound::ModuleReady,

        (1, Keyword::AvrcpPlay) => Inbound::AvrcpPlay,
        (1, Keyword::AvrcpPause) => Inbound::AvrcpPause,

        (2, Keyword::AbsVol) => match parse_abs_volume(p(1)) {
            Some(value) => Inbound::AbsoluteVolume { value },
            None => Inbound::Unrecognized,
        },
        (2, Keyword::LinkLoss) => Inbound::LinkLoss {
            link: link(),
            status: p(1),
        },
        (2, Keyword::Name) => Inbound::PeerName(bounded(strip_quotes(p(1)))),

        (3, Keyword::CloseOk) => Inbound::CloseOk { link: link() },
        (3, Keyword::Name) => {
            let joined: String<JOINED_NAME_CAPACITY> = join_words(p(1), p(2));
            Inbound::PeerName(bounded(strip_quotes(&joined)))
        }
        (3, Keyword::OpenOk) => Inbound::OpenOk {
            link: link(),
            profile: Profile::parse(p(1)),
            address: p(2),
        },
        (3, Keyword::Recv) => match Topic::parse(p(2)) {
            Some(Topic::Inq) => Inbound::Remote(Remote::StartInquiry),
            Some(Topic::Disc) => Inbound::Remote(Remote::Disconnect),
            Some(Topic::LatLong) => Inbound::Remote(Remote::ClearLatLong),
            _ => Inbound::Unrecognized,
        },

        (4, Keyword::State) => Inbound::StateReport { flags: p(0) },
        (4, Keyword::Inquiry) => Inbound::InquiryResult {
            address: p(0),
            name: bounded(strip_quotes(p(1))),
            capabilities: p(2),
            strength: parse_strength(p(3)),
        },
        (4, Keyword::Recv) => classify_remote_request(p(2), p(3)),

        (5, Keyword::Inquiry) => {
            let joined: String<JOINED_NAME_CAPACITY> = join_words(p(1), p(2));
            Inbound::InquiryResult {
                address: p(0),
                name: bounded(strip_quotes(&joined)),
                capabilities: p(3),
                strength: parse_strength(p(4)),
            }
        }
        (5, Keyword::Recv) => match Topic::parse(p(2)) {
            Some(Topic::LatLong) => Inbound::Remote(Remote::LatLong {
                lat: p(3),
                long: p(4),
            }),
            // Two-word peer names, as stored from a 5-field `INQUIRY`.
            Some(Topic::Conn) => Inbound::Remote(Remote::Connect(p(3), p(4))),
            _ => Inbound::Unrecognized,
        },
        (6, Keyword::Recv) if Topic::parse(p(2)) == Some(Topic::Rwin) => {
            Inbound::Remote(Remote::SetWindow {
                length: p(3),
                period: p(4),
                occurrences: p(5),
            })
        }

        // LINK may carry extra trailing info fields.
        (5..=9, Keyword::Link) => Inbound::LinkUp {
            link: link(),
            profile: Profile::parse(p(2)),
            address: p(3),
        },

        _ => Inbound::Unrecognized,
    }
}

fn classify_remote_request<'a>(topic: &'a str, value: &'a str) -> Inbound<'a> {
    let remote = match Topic::parse(topic) {
        Some(Topic::Conn) => Remote::Connect(value, ""),
        Some(Topic::Time) => Remote::SetTime(value),
        Some(Topic::Rec) => Remote::Record(value),
        Some(Topic::RecNext) => Remote::RecNext(value),
        Some(Topic::RecNb) => Remote::RecNb(value),
        Some(Topic::RecTs) => Remote::RecTs(value),
        Some(Topic::Mon) => Remote::Monitor(value),
        Some(Topic::Vol) => Remote::Volume(value),
        Some(Topic::Bt) => Remote::BtStatus(value),
        Some(Topic::Rwin) => Remote::Rwin(value),
        Some(Topic::FilePath) => Remote::FilePath(value),
        Some(Topic::LatLong) => Remote::LatLongQuery(value),
        Some(Topic::Inq) => Remote::InquiryQuery(value),
        Some(Topic::Disc) | None => return Inbound::Unrecognized,
    };
    Inbound::Remote(remote)
}

/// Decimal volume clamped to `ABS_VOLUME_MAX`; `None` unless all digits.
fn parse_abs_volume(field: &str) -> Option<u8> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value = field.parse::<u8>().map_or(ABS_VOLUME_MAX, |v| v.min(ABS_VOLUME_MAX));
    Some(value)
}

/// `-54dB` → 54. Two digits after the sign; anything else reads as 0.
fn parse_strength(field: &str) -> u8 {
    field
        .get(1..3)
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}

/// Interpret one tokenized line and update the context.
///
/// Total: unknown arity/keyword combinations return [`Action::None`] and
/// leave the context untouched.
pub fn dispatch(ctx: &mut Context, msg: &ParsedMessage<'_>) -> Action {
    match classify(msg) {
        Inbound::Unrecognized => {
            trace!("RX ignored: {} ({} params)", msg.keyword, msg.arity());
            Action::None
        }
        inbound => apply(ctx, inbound),
    }
}

fn apply(ctx: &mut Context, inbound: Inbound<'_>) -> Action {
    match inbound {
        Inbound::InquiryComplete => {
            if ctx.state.bt == BtState::Inquiry {
                ctx.state.bt = BtState::Idle;
            }
            info!("Inquiry complete - {} peers", ctx.registry.discovered());
            Notification::InquiryDone.into()
        }
        Inbound::ModuleReady => {
            info!("Module ready");
            ctx.module_ready = true;
            Action::None
        }
        Inbound::AvrcpPlay => {
            request_monitoring(ctx, true);
            Action::None
        }
        Inbound::AvrcpPause => {
            request_monitoring(ctx, false);
            Action::None
        }
        Inbound::AbsoluteVolume { value } => {
            ctx.volume = f32::from(value) / f32::from(ABS_VOLUME_MAX);
            debug!("Sink volume {}/{}", value, ABS_VOLUME_MAX);
            notify_phone(ctx, Notification::Volume)
        }
        Inbound::LinkLoss { link, status } => {
            // Only the A2DP link is tracked; the notification stays inside
            // the match.
            if link.is_some() && link == ctx.links.a2dp_link_id {
                match status {
                    "1" => ctx.state.bt = BtState::Disconnected,
                    "0" => ctx.state.bt = BtState::Connected,
                    _ => {}
                }
                warn!("A2DP link loss status {}", status);
                return Notification::BtState.into();
            }
            Action::None
        }
        Inbound::PeerName(name) => {
            ctx.links.peer_name = name;
            notify_phone(ctx, Notification::BtState)
        }
        Inbound::CloseOk { link } => {
            let Some(id) = link else {
                return Action::None;
            };
            if ctx.links.a2dp_link_id == Some(id) {
                if ctx.state.bt != BtState::Off {
                    ctx.state.bt = BtState::RequestingDisconnect;
                }
                ctx.links.a2dp_link_id = None;
            }
            if ctx.links.avrcp_link_id == Some(id) {
                ctx.links.avrcp_link_id = None;
            }
            if ctx.links.ble_link_id == Some(id) {
                if ctx.state.ble != BleState::Off {
                    ctx.state.ble = BleState::RequestingDisconnect;
                }
                ctx.links.ble_link_id = None;
            }
            info!("Link {} closed", id);
            Action::None
        }
        Inbound::OpenOk {
            link,
            profile,
            address,
        } => match profile {
            Profile::A2dp => {
                ctx.links.a2dp_link_id = link;
                ctx.links.peer_address = bounded(address);
                ctx.state.bt = BtState::RequestingConnect;
                Command::RequestPeerName.into()
            }
            Profile::Avrcp => {
                ctx.links.avrcp_link_id = link;
                ctx.links.peer_address = bounded(address);
                Action::None
            }
            Profile::Ble => {
                ctx.links.ble_link_id = link;
                ctx.state.ble = BleState::RequestingConnect;
                Action::None
            }
            Profile::Other => Action::None,
        },
        Inbound::LinkUp {
            link,
            profile,
            address,
        } => match profile {
            Profile::A2dp => {
                ctx.links.a2dp_link_id = link;
                ctx.links.peer_address = bounded(address);
                mark_sink_connected(ctx);
                Command::RequestPeerName.into()
            }
            Profile::Avrcp => {
                ctx.links.avrcp_link_id = link;
                ctx.links.peer_address = bounded(address);
                mark_sink_connected(ctx);
                Action::None
            }
            Profile::Ble => {
                ctx.links.ble_link_id = link;
                ctx.state.ble = BleState::Connected;
                Action::None
            }
            Profile::Other => Action::None,
        },
        Inbound::StateReport { flags } => {
            // e.g. `CONNECTED[0]`: the flag digit sits before the bracket.
            let mut rev = flags.chars().rev();
            let flag = rev.nth(1);
            if flag.map_or(true, |c| c == '0') {
                Notification::BtState.into()
            } else {
                Action::None
            }
        }
        Inbound::InquiryResult {
            address,
            name,
            capabilities,
            strength,
        } => match ctx
            .registry
            .observe(address, name.as_str(), capabilities, strength)
        {
            Some(slot) => Notification::InquiryPeer(slot).into(),
            None => Action::None,
        },
        Inbound::Remote(remote) => apply_remote(ctx, remote),
        Inbound::Unrecognized => Action::None,
    }
}

fn apply_remote(ctx: &mut Context, remote: Remote<'_>) -> Action {
    match remote {
        Remote::StartInquiry => {
            ctx.registry.reset();
            if matches!(ctx.state.bt, BtState::Idle | BtState::Disconnected) {
                ctx.state.bt = BtState::Inquiry;
            }
            info!("Phone requested inquiry");
            Command::Inquiry.into()
        }
        Remote::Disconnect => {
            if ctx.state.bt != BtState::Off {
                ctx.state.bt = BtState::RequestingDisconnect;
            }
            Action::None
        }
        Remote::ClearLatLong => {
            ctx.phone_fix = None;
            Action::None
        }
        Remote::Connect(first, second) => {
            ctx.links.peer_name = if second.is_empty() {
                bounded(strip_quotes(first))
            } else {
                let joined: String<JOINED_NAME_CAPACITY> = join_words(first, second);
                bounded(strip_quotes(&joined))
            };
            Command::Connect.into()
        }
        Remote::SetTime(value) => {
            match value.parse::<u64>() {
                Ok(ts) if plausible_unix_time(ts) => {
                    ctx.pending_time = Some(TimeUpdate {
                        unix_secs: ts,
                        source: TimeSource::RemotePhone,
                    });
                }
                _ => warn!("Ignoring implausible phone time {}", value),
            }
            Action::None
        }
        Remote::Record(value) => match value {
            "start" => Command::RecordStart.into(),
            "stop" => Command::RecordStop.into(),
            "?" => Notification::RecState.into(),
            _ => Action::None,
        },
        Remote::RecNext(value) => query(value, Notification::RecNext),
        Remote::RecNb(value) => query(value, Notification::RecNb),
        Remote::RecTs(value) => query(value, Notification::RecTs),
        Remote::Monitor(value) => match value {
            "start" => {
                request_monitoring(ctx, true);
                Action::None
            }
            "stop" => {
                request_monitoring(ctx, false);
                Action::None
            }
            "?" => Notification::MonState.into(),
            _ => Action::None,
        },
        Remote::Volume(value) => {
            if !ctx.state.bt.has_sink() {
                return ErrorReply::VolNoBtDevice.into();
            }
            match value {
                "+" => Command::VolumeUp.into(),
                "-" => Command::VolumeDown.into(),
                "?" => Notification::Volume.into(),
                level => match level.parse::<u8>() {
                    Ok(level) if level <= ABS_VOLUME_MAX => {
                        ctx.volume = f32::from(level) / f32::from(ABS_VOLUME_MAX);
                        Command::VolumeSet(level).into()
                    }
                    _ => Action::None,
                },
            }
        }
        Remote::BtStatus(value) => query(value, Command::Status),
        Remote::Rwin(value) => match value {
            "?" => Notification::RwinValues.into(),
            _ => ErrorReply::RwinBadRequest.into(),
        },
        Remote::FilePath(value) => query(value, Notification::FilePath),
        Remote::LatLongQuery(value) => query(value, Notification::LatLong),
        Remote::InquiryQuery(value) => query(value, Notification::InquiryResults),
        Remote::LatLong { lat, long } => {
            ctx.phone_fix = parse_fix(lat, long);
            match ctx.phone_fix {
                Some(_) => info!("Phone position {} {}", lat, long),
                None => debug!("Phone position cleared"),
            }
            Action::None
        }
        Remote::SetWindow {
            length,
            period,
            occurrences,
        } => {
            let window = match (
                parse_time_of_day(length),
                parse_time_of_day(period),
                occurrences.parse::<u32>(),
            ) {
                (Some(length), Some(period), Ok(occurrences)) => {
                    RecordingWindow::new(length, period, occurrences)
                }
                _ => None,
            };
            match window {
                Some(window) => {
                    ctx.scheduler.set_window(window);
                    info!(
                        "Recording window {}s every {}s x{}",
                        window.length.as_secs(),
                        window.period.as_secs(),
                        window.occurrences
                    );
                    Notification::RwinOk.into()
                }
                None => ErrorReply::RwinWrongParams.into(),
            }
        }
    }
}

fn query(value: &str, reply: impl Into<Action>) -> Action {
    if value == "?" {
        reply.into()
    } else {
        Action::None
    }
}

/// Notifications that only make sense while the phone is connected.
fn notify_phone(ctx: &Context, notification: Notification) -> Action {
    if ctx.state.ble == BleState::Connected {
        notification.into()
    } else {
        Action::None
    }
}

fn request_monitoring(ctx: &mut Context, on: bool) {
    ctx.state.mon = match (on, ctx.state.mon) {
        (true, MonState::On | MonState::RequestingOn) => ctx.state.mon,
        (true, _) => MonState::RequestingOn,
        (false, MonState::Off | MonState::RequestingOff) => ctx.state.mon,
        (false, _) => MonState::RequestingOff,
    };
}

/// `LINK` reports a profile up; a streaming link stays `Playing`.
fn mark_sink_connected(ctx: &mut Context) {
    if ctx.state.bt != BtState::Playing {
        ctx.state.bt = BtState::Connected;
    }
}

fn parse_fix(lat: &str, long: &str) -> Option<GpsFix> {
    let lat: f64 = lat.parse().ok()?;
    let long: f64 = long.parse().ok()?;
    let valid = (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&long);
    valid.then_some(GpsFix {
        lat,
        long,
        timestamp: None,
    })
}
