//! Async coordinator task (embedded only).
//!
//! Serializes serial lines, button presses and the periodic tick into one
//! [`Coordinator`]. Only this task touches it, so no lock is needed around
//! the context.

use embassy_futures::select::{select3, Either3};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver};
use embassy_time::{Duration, Instant, Timer};

use crate::config::{
    BUTTON_QUEUE_DEPTH, MODULE_READY_TIMEOUT_MS, SERIAL_READ_CHUNK, TICK_INTERVAL_MS,
};
use crate::coordinator::Coordinator;
use crate::error::Error;
use crate::hooks::{ButtonEvent, Hooks};
use crate::line_buffer::LineAssembler;

/// Button events from the debounce task to the coordinator task.
pub type ButtonChannel = Channel<CriticalSectionRawMutex, ButtonEvent, BUTTON_QUEUE_DEPTH>;
pub type ButtonReceiver<'a> = Receiver<'a, CriticalSectionRawMutex, ButtonEvent, BUTTON_QUEUE_DEPTH>;

/// UART link to the Bluetooth module.
#[allow(async_fn_in_trait)]
pub trait SerialPort {
    /// Read whatever is available (at least one byte).
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error>;
    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), Error>;
}

/// Run the coordinator forever.
///
/// Resends `RESET` every `MODULE_READY_TIMEOUT_MS` until the module answers
/// `READY`.
pub async fn coordinator_task<S: SerialPort, H: Hooks>(
    coord: &mut Coordinator,
    serial: &mut S,
    buttons: ButtonReceiver<'_>,
    hooks: &mut H,
) -> ! {
    let mut lines = LineAssembler::new();
    let mut rx = [0u8; SERIAL_READ_CHUNK];
    let ready_timeout = Duration::from_millis(MODULE_READY_TIMEOUT_MS);

    transmit(serial, &coord.startup()).await;
    let mut reset_at = Instant::now();

    loop {
        let sleep_ms = coord
            .next_deadline()
            .map(|deadline| deadline.saturating_sub(hooks.uptime_ms()))
            .unwrap_or(TICK_INTERVAL_MS)
            .min(TICK_INTERVAL_MS);

        let event = select3(
            serial.read(&mut rx),
            buttons.receive(),
            Timer::after(Duration::from_millis(sleep_ms)),
        )
        .await;

        match event {
            Either3::First(Ok(n)) => {
                for &byte in &rx[..n] {
                    if let Some(line) = lines.push(byte) {
                        trace!("RX: {}", line.as_str());
                        let out = coord.handle_line(&line);
                        transmit(serial, &out).await;
                    }
                }
            }
            Either3::First(Err(e)) => {
                warn!("Serial read failed: {}", e);
                lines.clear();
            }
            Either3::Second(button) => {
                let out = coord.handle_button(button);
                transmit(serial, &out).await;
            }
            Either3::Third(()) => {}
        }

        if !coord.is_module_ready() && reset_at.elapsed() >= ready_timeout {
            warn!("No READY from module, resetting again");
            transmit(serial, &coord.startup()).await;
            reset_at = Instant::now();
        }

        let out = coord.tick(hooks);
        transmit(serial, &out).await;
    }
}

async fn transmit<S: SerialPort>(serial: &mut S, out: &str) {
    if out.is_empty() {
        return;
    }
    trace!("TX: {}", out);
    if let Err(e) = serial.write_all(out.as_bytes()).await {
        error!("Serial write failed: {}", e);
    }
}
