use crate::hooks::{IndicatorChannel, IndicatorMode};
use crate::state::{BleState, BtState, DeviceState, MonState, RecState};

/// Decide the LED mode of `channel` for the given state.
pub fn indicator_mode(channel: IndicatorChannel, state: &DeviceState, peak: bool) -> IndicatorMode {
    match channel {
        IndicatorChannel::Bluetooth => match state.bt {
            BtState::Off => IndicatorMode::Off,
            BtState::Inquiry | BtState::RequestingConnect | BtState::RequestingDisconnect => {
                IndicatorMode::BlinkFast
            }
            BtState::Connected | BtState::Playing => IndicatorMode::On,
            BtState::Idle | BtState::Disconnected => IndicatorMode::BlinkSlow,
        },
        IndicatorChannel::Ble => match state.ble {
            BleState::Off | BleState::Idle => IndicatorMode::Off,
            BleState::RequestingAdvertise | BleState::Advertising => IndicatorMode::BlinkSlow,
            BleState::RequestingConnect | BleState::RequestingDisconnect => IndicatorMode::BlinkFast,
            BleState::Connected => IndicatorMode::On,
        },
        IndicatorChannel::Record => match state.rec {
            RecState::Off => IndicatorMode::Off,
            RecState::On => IndicatorMode::On,
            RecState::Idle => IndicatorMode::BlinkSlow,
            _ => IndicatorMode::BlinkFast,
        },
        IndicatorChannel::Monitor => match state.mon {
            MonState::On => IndicatorMode::On,
            MonState::Off => IndicatorMode::Off,
            MonState::RequestingOn | MonState::RequestingOff => IndicatorMode::BlinkFast,
        },
        IndicatorChannel::Peak => {
            if peak && (state.rec == RecState::On || state.mon == MonState::On) {
                IndicatorMode::On
            } else {
                IndicatorMode::Off
            }
        }
    }
}
