pub mod cli;
pub mod config;
pub mod errors;
pub mod hexdump;
pub mod logging;
pub mod packet;
pub mod radio;
pub mod receiver;
pub mod service;
pub mod shutdown;

pub use errors::{ConfigError, DecodeError, RadioError, ReceiverError};
pub use packet::WeatherPacket;
