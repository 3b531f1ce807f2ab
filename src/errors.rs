//! Error types for the receiver service
//!
//! Fatal conditions are all detected at or before loop entry. Only
//! [`DecodeError`] is expected during steady-state operation, and it is
//! handled locally by the receive loop.

use thiserror::Error;

/// Errors raised while reading or resolving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("could not read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The log file could not be opened for appending
    #[error("could not open log file '{path}': {source}")]
    LogOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A line in the configuration file is not `key = value`
    #[error("syntax error on line {line}: expected 'key = value'")]
    Syntax { line: usize },

    /// A required key is absent from both the source and the fallback
    #[error("missing configuration key '{0}'")]
    MissingKey(String),

    /// A key is present but its value cannot be used
    #[error("invalid value '{value}' for configuration key '{key}'")]
    InvalidValue { key: String, value: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: &str) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Errors raised by the radio device handle
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// SPI transfer failed
    #[error("failed to transfer SPI data")]
    Transfer,

    /// Chip-enable line could not be driven
    #[error("failed to drive chip-enable line")]
    Gpio,

    /// Address length does not match the configured address width
    #[error("address is {actual} bytes, expected {expected}")]
    AddressLength { expected: usize, actual: usize },

    /// Configuration cannot be programmed into the device
    #[error("invalid radio configuration")]
    InvalidConfig,

    /// Operation requires `init` to have completed
    #[error("radio not initialised")]
    NotInitialised,

    /// Operation attempted after teardown
    #[error("radio already terminated")]
    Terminated,
}

/// Errors raised while decoding a received payload
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload is shorter than the encoded packet
    #[error("buffer too short: {actual} bytes, need {required}")]
    BufferTooShort { required: usize, actual: usize },
}

/// Fatal errors that stop the receiver service
#[derive(Error, Debug)]
pub enum ReceiverError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("radio error: {0}")]
    Device(#[from] RadioError),

    /// The liveness probe register read failed at the transfer layer
    #[error("liveness probe failed: {0}")]
    Probe(#[source] RadioError),

    /// The liveness probe read back an all-zero CONFIG register
    #[error("CONFIG register read back as 0x00, device is probably not plugged in")]
    ConfigurationRegisterZero,

    /// Signal handlers could not be installed
    #[error("failed to register signal handler: {0}")]
    Signal(#[source] std::io::Error),
}
