//! Log sink with a runtime adjustable level mask
//!
//! Records from the `log` facade are written to stdout or a log file. Which
//! levels pass is decided by a bitmask held in a single atomic, so the
//! diagnostic signal can flip verbosity without taking a lock.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::config::{keys, logging::DEFAULT_LEVEL};
use crate::errors::ConfigError;

/// Level mask bits
pub mod level {
    pub const ERROR: u8 = 1 << 0;
    pub const WARN: u8 = 1 << 1;
    pub const INFO: u8 = 1 << 2;
    pub const DEBUG: u8 = 1 << 3;
    pub const TRACE: u8 = 1 << 4;
    pub const ALL: u8 = ERROR | WARN | INFO | DEBUG | TRACE;

    /// Bits flipped by the diagnostic signal
    pub const DIAGNOSTIC: u8 = INFO | DEBUG;
}

fn level_bit(l: Level) -> u8 {
    match l {
        Level::Error => level::ERROR,
        Level::Warn => level::WARN,
        Level::Info => level::INFO,
        Level::Debug => level::DEBUG,
        Level::Trace => level::TRACE,
    }
}

/// Parse a level string such as `LOG_LEVEL_INFO | LOG_LEVEL_ERROR`
///
/// Tokens are case-insensitive and the `LOG_LEVEL_` prefix is optional.
/// `FATAL` maps onto the error bit and `STATUS` onto the warn bit.
pub fn parse_level_mask(value: &str) -> Result<u8, ConfigError> {
    let mut mask = 0;

    for token in value.split('|').map(str::trim).filter(|t| !t.is_empty()) {
        let upper = token.to_ascii_uppercase();
        let name = upper.strip_prefix("LOG_LEVEL_").unwrap_or(&upper);
        mask |= match name {
            "ERROR" | "FATAL" => level::ERROR,
            "WARN" | "STATUS" => level::WARN,
            "INFO" => level::INFO,
            "DEBUG" => level::DEBUG,
            "TRACE" => level::TRACE,
            "ALL" => level::ALL,
            _ => return Err(ConfigError::invalid(keys::LOG_LEVEL, value)),
        };
    }

    Ok(mask)
}

/// Parse a single severity name, used for the decode failure policy
pub fn parse_severity(value: &str) -> Result<Level, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(keys::LOG_DECODE_FAILURE, value))
}

/// Atomically updated level mask
pub struct Verbosity {
    mask: AtomicU8,
}

impl Verbosity {
    pub const fn new(mask: u8) -> Self {
        Self {
            mask: AtomicU8::new(mask),
        }
    }

    pub fn get(&self) -> u8 {
        self.mask.load(Ordering::Acquire)
    }

    pub fn set(&self, mask: u8) {
        self.mask.store(mask, Ordering::Release);
    }

    /// Flip `bits` and return the new mask
    ///
    /// Uses a compare-and-swap loop and touches no locks, so it may run
    /// inside a signal handler.
    pub fn toggle(&self, bits: u8) -> u8 {
        let previous = self
            .mask
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |m| Some(m ^ bits))
            .unwrap_or_else(|m| m);
        previous ^ bits
    }

    pub fn allows(&self, l: Level) -> bool {
        self.get() & level_bit(l) != 0
    }
}

/// Where log records are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    Stdout,
    File(PathBuf),
}

/// Resolved log destination and level string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTarget {
    pub destination: LogDestination,
    pub level: String,
}

impl LogTarget {
    /// Resolve the log target
    ///
    /// An explicit command line path wins and uses the default level.
    /// Otherwise the config file pair decides: no filename logs to stdout,
    /// an empty level falls back to the default.
    pub fn resolve(cli_log: Option<&Path>, filename: &str, level: &str) -> Self {
        let level = if level.trim().is_empty() || cli_log.is_some() {
            DEFAULT_LEVEL.to_string()
        } else {
            level.to_string()
        };

        let destination = match cli_log {
            Some(path) => LogDestination::File(path.to_path_buf()),
            None if filename.trim().is_empty() => LogDestination::Stdout,
            None => LogDestination::File(PathBuf::from(filename)),
        };

        Self { destination, level }
    }
}

enum Sink {
    Stdout(io::Stdout),
    File(BufWriter<File>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Stdout(out) => out.write(buf),
            Sink::File(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Stdout(out) => out.flush(),
            Sink::File(file) => file.flush(),
        }
    }
}

/// `log` backend writing timestamped lines
pub struct Logger {
    verbosity: Verbosity,
    sink: Mutex<Option<Sink>>,
}

impl Logger {
    pub const fn new() -> Self {
        Self {
            verbosity: Verbosity::new(0),
            sink: Mutex::new(None),
        }
    }

    pub fn verbosity(&self) -> &Verbosity {
        &self.verbosity
    }

    /// Open the target and start accepting records
    pub fn open(&self, target: &LogTarget) -> Result<(), ConfigError> {
        let mask = parse_level_mask(&target.level)?;

        let sink = match &target.destination {
            LogDestination::Stdout => Sink::Stdout(io::stdout()),
            LogDestination::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| ConfigError::LogOpen {
                        path: path.display().to_string(),
                        source,
                    })?;
                Sink::File(BufWriter::new(file))
            }
        };

        if let Ok(mut guard) = self.sink.lock() {
            if let Some(mut previous) = guard.replace(sink) {
                let _ = previous.flush();
            }
        }
        self.verbosity.set(mask);
        Ok(())
    }

    /// Flush and drop the sink; later records are discarded
    pub fn close(&self) {
        if let Ok(mut guard) = self.sink.lock() {
            if let Some(mut sink) = guard.take() {
                let _ = sink.flush();
            }
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.verbosity.allows(metadata.level())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if let Ok(mut guard) = self.sink.lock() {
            if let Some(sink) = guard.as_mut() {
                let _ = writeln!(
                    sink,
                    "[{}] [{:<5}] {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    record.args()
                );
                if let Sink::Stdout(out) = sink {
                    let _ = out.flush();
                }
            }
        }
    }

    fn flush(&self) {
        if let Ok(mut guard) = self.sink.lock() {
            if let Some(sink) = guard.as_mut() {
                let _ = sink.flush();
            }
        }
    }
}

static LOGGER: Logger = Logger::new();

/// Install the process logger and open `target`
///
/// Calling again reopens the sink with the new target.
pub fn init(target: &LogTarget) -> Result<(), ConfigError> {
    LOGGER.open(target)?;
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Trace);
    }
    Ok(())
}

/// Level mask of the process logger
pub fn verbosity() -> &'static Verbosity {
    LOGGER.verbosity()
}

/// Flip the INFO and DEBUG bits of the process logger
pub fn toggle_diagnostics() -> u8 {
    LOGGER.verbosity().toggle(level::DIAGNOSTIC)
}

/// Close the process log sink
pub fn close() {
    LOGGER.close();
}
