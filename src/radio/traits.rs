//! Radio device trait for abstraction and testability
//!
//! This trait defines the contract the receive loop expects from the
//! transceiver, allowing the nRF24L01 driver to be swapped with a mock
//! for testing.

use heapless::Vec;

use crate::config::protocol::PAYLOAD_SIZE;
use crate::config::RadioConfig;
use crate::errors::RadioError;

/// Raw payload fetched from the receive FIFO
pub type Payload = Vec<u8, PAYLOAD_SIZE>;

/// nRF24L01 register addresses used outside the driver
pub mod reg {
    /// CONFIG register, read back as the startup liveness probe
    pub const CONFIG: u8 = 0x00;
}

/// Lifecycle of a device handle
///
/// `Terminated` is reachable from any other state and is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Uninitialized,
    Configured,
    Polling,
    Terminated,
}

/// Abstract radio interface
pub trait RadioDevice {
    /// Program chip-enable, bus parameters, channel, data rate, address
    /// width and CRC width, and enter receive mode
    fn init(&mut self, config: &RadioConfig) -> Result<(), RadioError>;

    /// Set the address this receiver listens on
    ///
    /// Fails with [`RadioError::AddressLength`] if the address width differs
    /// from the configured one.
    fn set_local_address(&mut self, addr: &[u8]) -> Result<(), RadioError>;

    /// Set the address of the remote transmitter
    fn set_remote_address(&mut self, addr: &[u8]) -> Result<(), RadioError>;

    /// Read a single register
    fn read_register(&mut self, reg: u8) -> Result<u8, RadioError>;

    /// Non-blocking check for a received payload
    fn is_payload_ready(&mut self) -> Result<bool, RadioError>;

    /// Fetch exactly `payload_size` bytes from the receive FIFO
    ///
    /// Content is undefined unless [`is_payload_ready`](Self::is_payload_ready)
    /// returned true.
    fn fetch_payload(&mut self) -> Result<Payload, RadioError>;

    /// Release chip-enable and bus resources. Safe to call more than once.
    fn terminate(&mut self);

    /// Current lifecycle state
    fn state(&self) -> DeviceState;
}

#[cfg(test)]
pub mod mock {
    //! Mock radio for testing

    use std::collections::VecDeque;

    use super::*;
    use crate::config::{DataRate, Mode};

    /// Radio configuration matching the field deployment
    pub fn test_config() -> RadioConfig {
        RadioConfig {
            ce_pin: 25,
            spi_device: 0,
            spi_channel: 0,
            spi_speed_hz: 4_000_000,
            mode: Mode::Receive,
            channel: 40,
            payload_size: PAYLOAD_SIZE,
            data_rate: DataRate::OneMbps,
            address_byte_len: 5,
            crc_byte_len: 2,
            local_address: b"AZ438".to_vec(),
            remote_address: b"AZ437".to_vec(),
        }
    }

    /// Mock radio for unit testing
    pub struct MockRadio {
        /// Payloads returned by fetch_payload(), in FIFO order
        rx_queue: VecDeque<Payload>,
        /// Value returned when reading the CONFIG register
        config_register: u8,
        /// Error to return on the next register read
        next_register_error: Option<RadioError>,
        /// Error to return on the next readiness poll
        next_ready_error: Option<RadioError>,
        /// Error to return on init
        init_error: Option<RadioError>,
        /// Number of readiness polls made
        ready_polls: usize,
        /// Number of terminate() calls
        terminate_calls: usize,
        config: Option<RadioConfig>,
        local_address: Option<std::vec::Vec<u8>>,
        remote_address: Option<std::vec::Vec<u8>>,
        state: DeviceState,
    }

    impl MockRadio {
        /// Create a mock that reads back a powered-up receive CONFIG value
        pub fn new() -> Self {
            Self {
                rx_queue: VecDeque::new(),
                config_register: 0x0F,
                next_register_error: None,
                next_ready_error: None,
                init_error: None,
                ready_polls: 0,
                terminate_calls: 0,
                config: None,
                local_address: None,
                remote_address: None,
                state: DeviceState::Uninitialized,
            }
        }

        /// Queue a payload, padded or truncated to the payload width
        pub fn queue_payload(&mut self, data: &[u8]) {
            let mut payload = Payload::new();
            for i in 0..PAYLOAD_SIZE {
                let _ = payload.push(data.get(i).copied().unwrap_or(0));
            }
            self.rx_queue.push_back(payload);
        }

        /// Set the value read back from the CONFIG register
        pub fn set_config_register(&mut self, value: u8) {
            self.config_register = value;
        }

        /// Set an error to be returned by the next read_register() call
        pub fn set_next_register_error(&mut self, error: RadioError) {
            self.next_register_error = Some(error);
        }

        /// Set an error to be returned by the next is_payload_ready() call
        pub fn set_next_ready_error(&mut self, error: RadioError) {
            self.next_ready_error = Some(error);
        }

        /// Make init() fail
        pub fn set_init_error(&mut self, error: RadioError) {
            self.init_error = Some(error);
        }

        pub fn ready_polls(&self) -> usize {
            self.ready_polls
        }

        pub fn terminate_calls(&self) -> usize {
            self.terminate_calls
        }

        pub fn pending(&self) -> usize {
            self.rx_queue.len()
        }

        pub fn get_config(&self) -> Option<&RadioConfig> {
            self.config.as_ref()
        }

        pub fn local_address(&self) -> Option<&[u8]> {
            self.local_address.as_deref()
        }

        pub fn remote_address(&self) -> Option<&[u8]> {
            self.remote_address.as_deref()
        }

        fn check_address(&self, addr: &[u8]) -> Result<(), RadioError> {
            let expected = self
                .config
                .as_ref()
                .ok_or(RadioError::NotInitialised)?
                .address_byte_len;
            if addr.len() != expected {
                return Err(RadioError::AddressLength {
                    expected,
                    actual: addr.len(),
                });
            }
            Ok(())
        }

        fn check_live(&self) -> Result<(), RadioError> {
            match self.state {
                DeviceState::Uninitialized => Err(RadioError::NotInitialised),
                DeviceState::Terminated => Err(RadioError::Terminated),
                _ => Ok(()),
            }
        }
    }

    impl Default for MockRadio {
        fn default() -> Self {
            Self::new()
        }
    }

    impl RadioDevice for MockRadio {
        fn init(&mut self, config: &RadioConfig) -> Result<(), RadioError> {
            if self.state == DeviceState::Terminated {
                return Err(RadioError::Terminated);
            }
            if let Some(error) = self.init_error.take() {
                return Err(error);
            }
            self.config = Some(config.clone());
            self.state = DeviceState::Configured;
            Ok(())
        }

        fn set_local_address(&mut self, addr: &[u8]) -> Result<(), RadioError> {
            self.check_live()?;
            self.check_address(addr)?;
            self.local_address = Some(addr.to_vec());
            Ok(())
        }

        fn set_remote_address(&mut self, addr: &[u8]) -> Result<(), RadioError> {
            self.check_live()?;
            self.check_address(addr)?;
            self.remote_address = Some(addr.to_vec());
            Ok(())
        }

        fn read_register(&mut self, reg: u8) -> Result<u8, RadioError> {
            self.check_live()?;
            if let Some(error) = self.next_register_error.take() {
                return Err(error);
            }
            Ok(if reg == super::reg::CONFIG {
                self.config_register
            } else {
                0
            })
        }

        fn is_payload_ready(&mut self) -> Result<bool, RadioError> {
            self.check_live()?;
            self.state = DeviceState::Polling;
            self.ready_polls += 1;
            if let Some(error) = self.next_ready_error.take() {
                return Err(error);
            }
            Ok(!self.rx_queue.is_empty())
        }

        fn fetch_payload(&mut self) -> Result<Payload, RadioError> {
            self.check_live()?;
            // Not-ready fetches return whatever is in the FIFO, here zeros
            Ok(self.rx_queue.pop_front().unwrap_or_else(|| {
                let mut empty = Payload::new();
                let _ = empty.resize(PAYLOAD_SIZE, 0);
                empty
            }))
        }

        fn terminate(&mut self) {
            self.terminate_calls += 1;
            self.state = DeviceState::Terminated;
        }

        fn state(&self) -> DeviceState {
            self.state
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn config() -> RadioConfig {
            test_config()
        }

        #[test]
        fn test_mock_lifecycle() {
            let mut radio = MockRadio::new();
            assert_eq!(radio.state(), DeviceState::Uninitialized);

            radio.init(&config()).unwrap();
            assert_eq!(radio.state(), DeviceState::Configured);

            assert!(!radio.is_payload_ready().unwrap());
            assert_eq!(radio.state(), DeviceState::Polling);

            radio.terminate();
            radio.terminate();
            assert_eq!(radio.state(), DeviceState::Terminated);
            assert_eq!(radio.terminate_calls(), 2);
            assert_eq!(radio.is_payload_ready(), Err(RadioError::Terminated));
        }

        #[test]
        fn test_mock_address_length() {
            let mut radio = MockRadio::new();
            radio.init(&config()).unwrap();

            assert_eq!(
                radio.set_local_address(b"AZ4"),
                Err(RadioError::AddressLength {
                    expected: 5,
                    actual: 3
                })
            );
            radio.set_local_address(b"AZ438").unwrap();
            assert_eq!(radio.local_address(), Some(&b"AZ438"[..]));
        }

        #[test]
        fn test_mock_fifo_order() {
            let mut radio = MockRadio::new();
            radio.init(&config()).unwrap();
            radio.queue_payload(&[1, 2, 3]);
            radio.queue_payload(&[4]);

            assert!(radio.is_payload_ready().unwrap());
            let first = radio.fetch_payload().unwrap();
            assert_eq!(first.len(), PAYLOAD_SIZE);
            assert_eq!(&first[..3], &[1, 2, 3]);
            assert_eq!(radio.fetch_payload().unwrap()[0], 4);
            assert!(!radio.is_payload_ready().unwrap());
        }
    }
}
