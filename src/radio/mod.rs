pub mod nrf24;
pub mod traits;

pub use nrf24::Nrf24;
pub use traits::{DeviceState, Payload, RadioDevice};
