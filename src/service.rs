//! Startup sequence and teardown around the receive loop
//!
//! Order: init, addresses, liveness probe, receive loop, terminate. The
//! device is terminated on every path out of [`run`], including errors.

use crate::config::RadioConfig;
use crate::errors::ReceiverError;
use crate::radio::traits::reg;
use crate::radio::RadioDevice;
use crate::receiver::{LoopOptions, Receiver, RunSummary, Sleeper, TelemetrySink};
use crate::shutdown::ShutdownFlag;

/// Configure the device and confirm it is present
///
/// Returns the CONFIG register value read back by the liveness probe.
pub fn start<R: RadioDevice>(radio: &mut R, config: &RadioConfig) -> Result<u8, ReceiverError> {
    radio.init(config)?;
    radio.set_local_address(&config.local_address)?;
    radio.set_remote_address(&config.remote_address)?;

    let value = radio.read_register(reg::CONFIG).map_err(ReceiverError::Probe)?;
    log::info!("Read back CONFIG reg: 0x{value:02X}");

    if value == 0x00 {
        return Err(ReceiverError::ConfigurationRegisterZero);
    }

    Ok(value)
}

/// Start the device, run the receive loop, then terminate the device
pub fn run<R, S, T>(
    radio: &mut R,
    config: &RadioConfig,
    sleeper: S,
    telemetry: T,
    shutdown: ShutdownFlag,
    options: LoopOptions,
) -> Result<RunSummary, ReceiverError>
where
    R: RadioDevice,
    S: Sleeper,
    T: TelemetrySink,
{
    let result = match start(radio, config) {
        Ok(_) => Receiver::new(&mut *radio, sleeper, telemetry, shutdown, options)
            .run()
            .map_err(ReceiverError::from),
        Err(e) => Err(e),
    };

    radio.terminate();
    result
}
