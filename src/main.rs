//! Weather station receiver service.
//!
//! Reads the radio configuration, brings up the nRF24L01 on the configured
//! spidev bus and polls for weather packets until signalled.

use std::path::PathBuf;
use std::process;

use anyhow::{anyhow, Context};
use clap::Parser;
use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::{CdevPin, Delay, SpidevDevice};

use weather_station_receiver::cli;
use weather_station_receiver::config::{self, keys, ConfigSource, RadioConfig};
use weather_station_receiver::logging::{self, LogTarget};
use weather_station_receiver::radio::Nrf24;
use weather_station_receiver::receiver::{LogTelemetry, LoopOptions, ThreadSleeper};
use weather_station_receiver::service;
use weather_station_receiver::shutdown::{ShutdownController, FATAL_EXIT};
use weather_station_receiver::ReceiverError;

/// GPIO character device carrying the chip-enable line
const GPIO_CHIP: &str = "/dev/gpiochip0";

/// Consumer label for the chip-enable line
const CE_LABEL: &str = "wxrx-ce";

type Radio = Nrf24<SpidevDevice, CdevPin, Delay>;

#[derive(Parser)]
#[command(name = "wxrx", version)]
#[command(about = "Receiver for a remote weather station over nRF24L01")]
struct Args {
    /// Configuration file (`-cfg` is also accepted)
    #[arg(long = "cfg", value_name = "FILE")]
    cfg: PathBuf,

    /// Write logs to this file, overriding the configured destination (`-log` is also accepted)
    #[arg(long = "log", value_name = "FILE")]
    log: Option<PathBuf>,

    /// Run as a daemon (detaching is left to the service manager)
    #[arg(short = 'd', long = "daemon")]
    daemon: bool,

    /// Print the merged configuration at startup
    #[arg(long = "dump-config")]
    dump_config: bool,

    /// Stop after this many idle cycles instead of running until signalled
    #[arg(long)]
    cycles: Option<u32>,
}

/// Values used when the configuration file omits the logging keys
fn fallback() -> ConfigSource {
    let mut fallback = ConfigSource::new();
    fallback.set(keys::LOG_FILENAME, "");
    fallback.set(keys::LOG_LEVEL, "");
    fallback.set(
        keys::LOG_DECODE_FAILURE,
        config::logging::DEFAULT_DECODE_FAILURE_LEVEL,
    );
    fallback
}

fn open_radio(config: &RadioConfig) -> anyhow::Result<Radio> {
    let path = config.spi_path();
    let mut spi = SpidevDevice::open(&path).map_err(|e| anyhow!("Failed to open {path}: {e:?}"))?;

    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(config.spi_speed_hz)
        .mode(SpiModeFlags::SPI_MODE_0)
        .build();
    spi.configure(&options)
        .with_context(|| format!("Failed to configure {path}"))?;

    let line = Chip::new(GPIO_CHIP)
        .and_then(|mut chip| chip.get_line(config.ce_pin))
        .and_then(|line| line.request(LineRequestFlags::OUTPUT, 0, CE_LABEL))
        .with_context(|| format!("Failed to claim CE line {} on {GPIO_CHIP}", config.ce_pin))?;
    let ce = CdevPin::new(line).context("Failed to wrap CE line")?;

    Ok(Nrf24::new(spi, ce, Delay))
}

fn run(args: &Args) -> anyhow::Result<()> {
    let source = ConfigSource::load(&args.cfg)
        .with_context(|| format!("Could not read config file: '{}'", args.cfg.display()))?;
    let fallback = fallback();
    let merged = source.merged_over(&fallback);

    if args.dump_config {
        print!("{merged}");
    }

    let target = LogTarget::resolve(
        args.log.as_deref(),
        merged.get(keys::LOG_FILENAME).unwrap_or_default(),
        merged.get(keys::LOG_LEVEL).unwrap_or_default(),
    );
    logging::init(&target).context("Could not open log")?;

    if args.daemon {
        log::info!("Daemon mode requested, detaching is left to the service manager");
    }

    let config = RadioConfig::resolve(&source, &fallback).context("Invalid radio configuration")?;
    let decode_failure_level = logging::parse_severity(
        merged
            .get(keys::LOG_DECODE_FAILURE)
            .unwrap_or(config::logging::DEFAULT_DECODE_FAILURE_LEVEL),
    )?;

    let controller = ShutdownController::register().map_err(ReceiverError::Signal)?;
    let mut radio = open_radio(&config)?;

    let options = LoopOptions {
        cycle_limit: args.cycles,
        decode_failure_level,
        ..LoopOptions::default()
    };

    service::run(
        &mut radio,
        &config,
        ThreadSleeper::new(controller.flag()),
        LogTelemetry,
        controller.flag(),
        options,
    )?;

    Ok(())
}

fn main() {
    let args = Args::parse_from(cli::normalize_args(std::env::args_os()));

    let code = match run(&args) {
        Ok(()) => 0,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("{e:#}");
            eprintln!("Aborting!\n");
            FATAL_EXIT
        }
    };

    logging::close();
    process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(cli::normalize_args(args.iter().copied()))
    }

    #[test]
    fn test_single_dash_command_line() {
        let args = parse(&["wxrx", "-cfg", "/etc/wx.cfg", "-log", "/tmp/x.log", "-d"]).unwrap();

        assert_eq!(args.cfg, PathBuf::from("/etc/wx.cfg"));
        assert_eq!(args.log, Some(PathBuf::from("/tmp/x.log")));
        assert!(args.daemon);
        assert!(!args.dump_config);
        assert_eq!(args.cycles, None);
    }

    #[test]
    fn test_double_dash_command_line() {
        let args = parse(&["wxrx", "--cfg", "wx.cfg", "--dump-config", "--cycles", "4"]).unwrap();

        assert_eq!(args.cfg, PathBuf::from("wx.cfg"));
        assert_eq!(args.log, None);
        assert!(args.dump_config);
        assert_eq!(args.cycles, Some(4));
    }

    #[test]
    fn test_config_file_is_required() {
        assert!(parse(&["wxrx", "-d"]).is_err());
    }
}
