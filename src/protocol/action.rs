//! Outbound action codes produced by the dispatcher, the buttons and the
//! coordinator tick, and rendered to wire text by the encoder.

/// One thing to do in reply to an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Nothing to send.
    None,
    Command(Command),
    Notify(Notification),
    Error(ErrorReply),
}

/// Commands for the Bluetooth module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    AdvertisingOn,
    AdvertisingOff,
    PowerOn,
    PowerOff,
    /// `NAME <peer>` - ask the module for the connected peer's name.
    RequestPeerName,
    /// `OPEN <addr> A2DP` for the peer selected by name.
    Connect,
    /// `CLOSE <id>`.
    Close(u8),
    /// `INQUIRY <secs>`.
    Inquiry,
    MusicPlay,
    MusicPause,
    /// `MUSIC <id> STOP` for a link about to be closed.
    MusicStop(u8),
    VolumeUp,
    VolumeDown,
    VolumeSet(u8),
    Reset,
    Status,
    /// Start a recording run. Local: handled by the coordinator, not sent.
    RecordStart,
    /// Stop the recording run. Local: handled by the coordinator, not sent.
    RecordStop,
}

/// State relayed to the phone over the BLE link (`SEND <ble> ...`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notification {
    BtState,
    InquiryStart,
    /// One freshly discovered peer, by registry slot.
    InquiryPeer(usize),
    /// Every peer in the registry, one line each.
    InquiryResults,
    InquiryDone,
    FilePath,
    LatLong,
    MonState,
    RecState,
    RecNb,
    RecNext,
    RecTs,
    RwinValues,
    RwinOk,
    Volume,
}

/// Precondition violations reported to the phone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorReply {
    RwinBadRequest,
    RwinWrongParams,
    VolNoBtDevice,
}

impl From<Command> for Action {
    fn from(c: Command) -> Self {
        Action::Command(c)
    }
}

impl From<Notification> for Action {
    fn from(n: Notification) -> Self {
        Action::Notify(n)
    }
}

impl From<ErrorReply> for Action {
    fn from(e: ErrorReply) -> Self {
        Action::Error(e)
    }
}
