//! Configuration constants and the configuration resolver
//!
//! The configuration file is a flat `key = value` table. [`RadioConfig::resolve`]
//! maps it into the strongly typed settings the radio is initialised with.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::errors::ConfigError;

/// nRF24L01 protocol constants
pub mod protocol {
    /// Static payload width negotiated with the transmitter
    pub const PAYLOAD_SIZE: usize = 32;

    /// Address width in bytes
    pub const ADDRESS_BYTES: usize = 5;

    /// CRC width in bytes
    pub const CRC_BYTES: usize = 2;

    /// Highest usable RF channel index
    pub const MAX_CHANNEL: u8 = 125;
}

/// Receive loop timing
pub mod poll {
    use core::time::Duration;

    /// Sleep between successive fetches while payloads are queued
    pub const DRAIN_INTERVAL: Duration = Duration::from_secs(1);

    /// Sleep when no payload is available
    pub const IDLE_INTERVAL: Duration = Duration::from_secs(2);
}

/// Logging defaults
pub mod logging {
    pub const DEFAULT_LEVEL: &str = "LOG_LEVEL_INFO | LOG_LEVEL_ERROR | LOG_LEVEL_FATAL";

    /// Severity used for payloads that fail to decode
    pub const DEFAULT_DECODE_FAILURE_LEVEL: &str = "warn";
}

/// Configuration keys
pub mod keys {
    pub const SPI_CE_PIN: &str = "spi.cepin";
    pub const SPI_DEVICE: &str = "spi.device";
    pub const SPI_CHANNEL: &str = "spi.channel";
    pub const SPI_FREQ: &str = "spi.freq";
    pub const RADIO_CHANNEL: &str = "radio.channel";
    pub const RADIO_BAUD: &str = "radio.baud";
    pub const RADIO_LOCAL_ADDRESS: &str = "radio.localaddress";
    pub const RADIO_REMOTE_ADDRESS: &str = "radio.remoteaddress";
    pub const LOG_FILENAME: &str = "log.filename";
    pub const LOG_LEVEL: &str = "log.level";
    pub const LOG_DECODE_FAILURE: &str = "log.decodefailure";
}

/// Flat key to string mapping read from a configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSource {
    entries: BTreeMap<String, String>,
}

impl ConfigSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse `key = value` lines
    ///
    /// `#` and `;` start a comment line. Values may be wrapped in double
    /// quotes. A repeated key overrides the earlier value.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut source = Self::new();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or(ConfigError::Syntax { line: index + 1 })?;

            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::Syntax { line: index + 1 });
            }

            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);

            source.set(key, value);
        }

        Ok(source)
    }

    /// Insert or replace a value
    pub fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    /// Look up a value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Iterate over all entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Overlay `self` on top of `fallback`
    pub fn merged_over(&self, fallback: &ConfigSource) -> ConfigSource {
        let mut merged = fallback.clone();
        for (key, value) in self.iter() {
            merged.set(key, value);
        }
        merged
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.iter() {
            writeln!(f, "{key} = '{value}'")?;
        }
        Ok(())
    }
}

/// Lookup over a primary source with a fallback
pub struct Resolver<'a> {
    source: &'a ConfigSource,
    fallback: &'a ConfigSource,
}

impl<'a> Resolver<'a> {
    pub fn new(source: &'a ConfigSource, fallback: &'a ConfigSource) -> Self {
        Self { source, fallback }
    }

    /// Value for `key`, or `MissingKey` if neither source has it
    pub fn string(&self, key: &str) -> Result<&'a str, ConfigError> {
        self.source
            .get(key)
            .or_else(|| self.fallback.get(key))
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    /// Value for `key` parsed as an integer
    pub fn integer<T: std::str::FromStr>(&self, key: &str) -> Result<T, ConfigError> {
        let value = self.string(key)?;
        value
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid(key, value))
    }
}

/// Transceiver operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Receive,
    Transmit,
}

/// Over-the-air data rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataRate {
    OneMbps,
    TwoMbps,
}

impl DataRate {
    /// `"2MHz"` selects 2 Mbps, anything else falls back to 1 Mbps
    pub fn from_baud(value: &str) -> Self {
        if value == "2MHz" {
            Self::TwoMbps
        } else {
            Self::OneMbps
        }
    }
}

/// Radio settings, resolved once before device init
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioConfig {
    /// GPIO line driving chip-enable
    pub ce_pin: u32,
    pub spi_device: u8,
    pub spi_channel: u8,
    pub spi_speed_hz: u32,
    pub mode: Mode,
    pub channel: u8,
    pub payload_size: usize,
    pub data_rate: DataRate,
    pub address_byte_len: usize,
    pub crc_byte_len: usize,
    pub local_address: Vec<u8>,
    pub remote_address: Vec<u8>,
}

impl RadioConfig {
    /// Build the radio configuration from `source`, consulting `fallback`
    /// for keys the source does not carry
    pub fn resolve(source: &ConfigSource, fallback: &ConfigSource) -> Result<Self, ConfigError> {
        let r = Resolver::new(source, fallback);

        let spi_speed_hz: u32 = r.integer(keys::SPI_FREQ)?;
        if spi_speed_hz == 0 {
            return Err(ConfigError::invalid(keys::SPI_FREQ, r.string(keys::SPI_FREQ)?));
        }

        let channel: u8 = r.integer(keys::RADIO_CHANNEL)?;
        if channel > protocol::MAX_CHANNEL {
            return Err(ConfigError::invalid(
                keys::RADIO_CHANNEL,
                r.string(keys::RADIO_CHANNEL)?,
            ));
        }

        Ok(Self {
            ce_pin: r.integer(keys::SPI_CE_PIN)?,
            spi_device: r.integer(keys::SPI_DEVICE)?,
            spi_channel: r.integer(keys::SPI_CHANNEL)?,
            spi_speed_hz,
            mode: Mode::Receive,
            channel,
            payload_size: protocol::PAYLOAD_SIZE,
            data_rate: DataRate::from_baud(r.string(keys::RADIO_BAUD)?),
            address_byte_len: protocol::ADDRESS_BYTES,
            crc_byte_len: protocol::CRC_BYTES,
            local_address: r.string(keys::RADIO_LOCAL_ADDRESS)?.as_bytes().to_vec(),
            remote_address: r.string(keys::RADIO_REMOTE_ADDRESS)?.as_bytes().to_vec(),
        })
    }

    /// spidev node for the configured bus
    pub fn spi_path(&self) -> String {
        format!("/dev/spidev{}.{}", self.spi_device, self.spi_channel)
    }
}
