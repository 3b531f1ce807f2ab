//! Receive loop
//!
//! Cooperative polling over the radio: drain every queued payload with a
//! short sleep between fetches, then sleep for the longer idle interval.
//! The device has no blocking wait primitive, so responsiveness is set by
//! the two sleep intervals. The shutdown flag is checked after every sleep.

use core::time::Duration;
use std::thread;

use log::Level;

use crate::config::poll::{DRAIN_INTERVAL, IDLE_INTERVAL};
use crate::errors::RadioError;
use crate::hexdump::hex_dump_lines;
use crate::packet::WeatherPacket;
use crate::radio::RadioDevice;
use crate::shutdown::ShutdownFlag;

/// Longest single sleep before the shutdown flag is re-checked
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Suspension point of the receive loop
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

impl<S: Sleeper + ?Sized> Sleeper for &mut S {
    fn sleep(&mut self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Sleeps on the current thread, waking early once shutdown is requested
pub struct ThreadSleeper {
    shutdown: ShutdownFlag,
}

impl ThreadSleeper {
    pub fn new(shutdown: ShutdownFlag) -> Self {
        Self { shutdown }
    }
}

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        let mut remaining = duration;
        while !remaining.is_zero() && !self.shutdown.is_requested() {
            let slice = remaining.min(SLEEP_SLICE);
            thread::sleep(slice);
            remaining -= slice;
        }
    }
}

/// Destination for decoded packets
pub trait TelemetrySink {
    fn publish(&mut self, packet: &WeatherPacket);
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for &mut T {
    fn publish(&mut self, packet: &WeatherPacket) {
        (**self).publish(packet)
    }
}

/// Reports packets through the log facade
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn publish(&mut self, packet: &WeatherPacket) {
        log::info!("Got weather data: {}", packet);
        log::debug!("\tTemperature: {:.2}", packet.temperature);
        log::debug!("\tPressure:    {:.2}", packet.pressure);
        log::debug!("\tHumidity:    {:.2}", packet.humidity);
        log::debug!("\tRainfall:    {:.2}", packet.rainfall);
        log::debug!("\tWind speed:  {:.2}", packet.windspeed);
        log::debug!("\tWind dir:    {}", packet.wind_direction);
    }
}

/// Receive loop states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Draining,
    Sleeping,
    Shutdown,
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Signalled,
    CycleLimit,
}

/// Counters reported when the loop ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Completed outer cycles (idle sleeps)
    pub cycles: u32,
    pub packets: u32,
    pub decode_failures: u32,
    pub stop: StopReason,
}

/// Loop tuning
#[derive(Debug, Clone, Copy)]
pub struct LoopOptions {
    pub drain_interval: Duration,
    pub idle_interval: Duration,
    /// Stop after this many outer cycles; `None` runs until signalled
    pub cycle_limit: Option<u32>,
    /// Severity for payloads that fail to decode
    pub decode_failure_level: Level,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            drain_interval: DRAIN_INTERVAL,
            idle_interval: IDLE_INTERVAL,
            cycle_limit: None,
            decode_failure_level: Level::Warn,
        }
    }
}

/// Drives a radio device until shutdown
///
/// The radio is borrowed exclusively for the lifetime of the loop.
pub struct Receiver<'a, R, S, T>
where
    R: RadioDevice,
    S: Sleeper,
    T: TelemetrySink,
{
    radio: &'a mut R,
    sleeper: S,
    telemetry: T,
    shutdown: ShutdownFlag,
    options: LoopOptions,
    state: LoopState,
    cycles: u32,
    packets: u32,
    decode_failures: u32,
}

impl<'a, R, S, T> Receiver<'a, R, S, T>
where
    R: RadioDevice,
    S: Sleeper,
    T: TelemetrySink,
{
    pub fn new(
        radio: &'a mut R,
        sleeper: S,
        telemetry: T,
        shutdown: ShutdownFlag,
        options: LoopOptions,
    ) -> Self {
        Self {
            radio,
            sleeper,
            telemetry,
            shutdown,
            options,
            state: LoopState::Idle,
            cycles: 0,
            packets: 0,
            decode_failures: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run until signalled or the cycle limit is reached
    ///
    /// A transfer error while polling requests shutdown and is returned to
    /// the caller, which owns teardown.
    pub fn run(&mut self) -> Result<RunSummary, RadioError> {
        log::info!("Receiver: polling for packets");

        loop {
            let next = match self.state {
                LoopState::Idle => self.idle(),
                LoopState::Draining => self.drain_one(),
                LoopState::Sleeping => Ok(self.sleep_idle()),
                LoopState::Shutdown => break,
            };

            match next {
                Ok(state) => self.state = state,
                Err(e) => {
                    log::error!("Receiver: {e}, shutting down");
                    self.shutdown.request();
                    self.state = LoopState::Shutdown;
                    return Err(e);
                }
            }
        }

        let summary = RunSummary {
            cycles: self.cycles,
            packets: self.packets,
            decode_failures: self.decode_failures,
            stop: if self.shutdown.is_requested() {
                StopReason::Signalled
            } else {
                StopReason::CycleLimit
            },
        };
        log::info!(
            "Receiver: stopped ({:?}) after {} cycles, {} packets, {} decode failures",
            summary.stop,
            summary.cycles,
            summary.packets,
            summary.decode_failures
        );
        Ok(summary)
    }

    fn limit_reached(&self) -> bool {
        self.options
            .cycle_limit
            .is_some_and(|limit| self.cycles >= limit)
    }

    fn idle(&mut self) -> Result<LoopState, RadioError> {
        if self.shutdown.is_requested() || self.limit_reached() {
            return Ok(LoopState::Shutdown);
        }
        self.after_poll()
    }

    /// Next state from the readiness of the device
    fn after_poll(&mut self) -> Result<LoopState, RadioError> {
        if self.radio.is_payload_ready()? {
            Ok(LoopState::Draining)
        } else {
            Ok(LoopState::Sleeping)
        }
    }

    fn drain_one(&mut self) -> Result<LoopState, RadioError> {
        let payload = self.radio.fetch_payload()?;

        for line in hex_dump_lines(&payload) {
            log::debug!("{line}");
        }

        match WeatherPacket::decode(&payload) {
            Ok(packet) => {
                self.packets += 1;
                self.telemetry.publish(&packet);
            }
            Err(e) => {
                self.decode_failures += 1;
                log::log!(self.options.decode_failure_level, "Receiver: dropped payload: {e}");
            }
        }

        self.sleeper.sleep(self.options.drain_interval);
        if self.shutdown.is_requested() {
            return Ok(LoopState::Shutdown);
        }
        self.after_poll()
    }

    fn sleep_idle(&mut self) -> LoopState {
        self.sleeper.sleep(self.options.idle_interval);
        self.cycles += 1;
        if self.shutdown.is_requested() {
            LoopState::Shutdown
        } else {
            LoopState::Idle
        }
    }
}
