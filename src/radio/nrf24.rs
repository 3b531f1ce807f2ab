//! nRF24L01 driver
//!
//! Implements [`RadioDevice`] over `embedded-hal` traits using dependency
//! injection for SPI, the chip-enable pin and a delay provider. Only the
//! receive side of the protocol is driven: static payload width, enhanced
//! shockburst disabled, CRC per configuration.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiDevice;

use crate::config::protocol::PAYLOAD_SIZE;
use crate::config::{DataRate, Mode, RadioConfig};
use crate::errors::RadioError;
use crate::radio::traits::{DeviceState, Payload, RadioDevice};

/// SPI command bytes
mod cmd {
    pub const R_REGISTER: u8 = 0x00;
    pub const W_REGISTER: u8 = 0x20;
    pub const R_RX_PAYLOAD: u8 = 0x61;
    pub const FLUSH_TX: u8 = 0xE1;
    pub const FLUSH_RX: u8 = 0xE2;
    pub const NOP: u8 = 0xFF;

    /// Register address bits of R_REGISTER/W_REGISTER
    pub const REGISTER_MASK: u8 = 0x1F;
}

/// Register map
mod reg {
    pub const CONFIG: u8 = 0x00;
    pub const EN_AA: u8 = 0x01;
    pub const EN_RXADDR: u8 = 0x02;
    pub const SETUP_AW: u8 = 0x03;
    pub const SETUP_RETR: u8 = 0x04;
    pub const RF_CH: u8 = 0x05;
    pub const RF_SETUP: u8 = 0x06;
    pub const STATUS: u8 = 0x07;
    pub const RX_ADDR_P0: u8 = 0x0A;
    pub const RX_ADDR_P1: u8 = 0x0B;
    pub const TX_ADDR: u8 = 0x10;
    pub const RX_PW_P0: u8 = 0x11;
    pub const RX_PW_P1: u8 = 0x12;
    pub const FIFO_STATUS: u8 = 0x17;
    pub const DYNPD: u8 = 0x1C;
    pub const FEATURE: u8 = 0x1D;
}

/// CONFIG register bits
mod config_bits {
    pub const PRIM_RX: u8 = 1 << 0;
    pub const PWR_UP: u8 = 1 << 1;
    pub const CRCO: u8 = 1 << 2;
    pub const EN_CRC: u8 = 1 << 3;
}

/// STATUS register bits
mod status {
    pub const RX_DR: u8 = 1 << 6;
    pub const TX_DS: u8 = 1 << 5;
    pub const MAX_RT: u8 = 1 << 4;
}

/// FIFO_STATUS register bits
mod fifo {
    pub const RX_EMPTY: u8 = 1 << 0;
}

/// RF_SETUP register bits
mod rf_setup {
    pub const RF_DR_HIGH: u8 = 1 << 3;
    /// 0 dBm output power
    pub const RF_PWR_MAX: u8 = 0b11 << 1;
}

/// Longest register write: command byte plus a 5 byte address
const MAX_WRITE: usize = 6;

/// Power-up settling time (Tpd2stby with external clock margin)
const POWER_UP_DELAY_US: u32 = 1_500;

/// nRF24L01 driver
///
/// Owns the SPI device and the chip-enable line for the lifetime of the
/// handle. Chip select is managed by the `SpiDevice` implementation.
pub struct Nrf24<Spi, Ce, Delay>
where
    Spi: SpiDevice,
    Ce: OutputPin,
    Delay: DelayNs,
{
    spi: Spi,
    ce: Ce,
    delay: Delay,
    state: DeviceState,
    address_width: usize,
    payload_size: usize,
}

impl<Spi, Ce, Delay> Nrf24<Spi, Ce, Delay>
where
    Spi: SpiDevice,
    Ce: OutputPin,
    Delay: DelayNs,
{
    /// Create a new driver; the device is untouched until `init`
    pub fn new(spi: Spi, ce: Ce, delay: Delay) -> Self {
        Self {
            spi,
            ce,
            delay,
            state: DeviceState::Uninitialized,
            address_width: 0,
            payload_size: PAYLOAD_SIZE,
        }
    }

    /// Send a single command byte and return the STATUS byte clocked back
    fn command(&mut self, command: u8) -> Result<u8, RadioError> {
        let mut buf = [command];
        self.spi
            .transfer_in_place(&mut buf)
            .map_err(|_| RadioError::Transfer)?;
        Ok(buf[0])
    }

    fn write_register(&mut self, reg: u8, data: &[u8]) -> Result<(), RadioError> {
        let len = 1 + data.len().min(MAX_WRITE - 1);
        let mut buf = [0u8; MAX_WRITE];
        buf[0] = cmd::W_REGISTER | (reg & cmd::REGISTER_MASK);
        buf[1..len].copy_from_slice(&data[..len - 1]);

        self.spi
            .write(&buf[..len])
            .map_err(|_| RadioError::Transfer)
    }

    fn write_register_byte(&mut self, reg: u8, value: u8) -> Result<(), RadioError> {
        self.write_register(reg, &[value])
    }

    fn read_register_byte(&mut self, reg: u8) -> Result<u8, RadioError> {
        let mut buf = [cmd::R_REGISTER | (reg & cmd::REGISTER_MASK), cmd::NOP];
        self.spi
            .transfer_in_place(&mut buf)
            .map_err(|_| RadioError::Transfer)?;
        Ok(buf[1])
    }

    fn set_ce(&mut self, high: bool) -> Result<(), RadioError> {
        let result = if high {
            self.ce.set_high()
        } else {
            self.ce.set_low()
        };
        result.map_err(|_| RadioError::Gpio)
    }

    fn config_value(config: &RadioConfig) -> Result<u8, RadioError> {
        let crc = match config.crc_byte_len {
            0 => 0,
            1 => config_bits::EN_CRC,
            2 => config_bits::EN_CRC | config_bits::CRCO,
            _ => return Err(RadioError::InvalidConfig),
        };
        let mode = match config.mode {
            Mode::Receive => config_bits::PRIM_RX,
            Mode::Transmit => 0,
        };
        Ok(crc | mode | config_bits::PWR_UP)
    }

    fn check_address(&self, addr: &[u8]) -> Result<(), RadioError> {
        match self.state {
            DeviceState::Uninitialized => return Err(RadioError::NotInitialised),
            DeviceState::Terminated => return Err(RadioError::Terminated),
            _ => {}
        }
        if addr.len() != self.address_width {
            return Err(RadioError::AddressLength {
                expected: self.address_width,
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

impl<Spi, Ce, Delay> RadioDevice for Nrf24<Spi, Ce, Delay>
where
    Spi: SpiDevice,
    Ce: OutputPin,
    Delay: DelayNs,
{
    fn init(&mut self, config: &RadioConfig) -> Result<(), RadioError> {
        if self.state == DeviceState::Terminated {
            return Err(RadioError::Terminated);
        }
        if !(3..=5).contains(&config.address_byte_len)
            || config.payload_size == 0
            || config.payload_size > PAYLOAD_SIZE
        {
            return Err(RadioError::InvalidConfig);
        }
        let config_reg = Self::config_value(config)?;

        // Standby while programming
        self.set_ce(false)?;

        self.write_register_byte(reg::CONFIG, 0)?;
        self.write_register_byte(reg::EN_AA, 0)?;
        self.write_register_byte(reg::SETUP_RETR, 0)?;
        self.write_register_byte(reg::EN_RXADDR, 0b11)?;
        self.write_register_byte(reg::SETUP_AW, (config.address_byte_len - 2) as u8)?;
        self.write_register_byte(reg::RF_CH, config.channel)?;

        let rate = match config.data_rate {
            DataRate::OneMbps => 0,
            DataRate::TwoMbps => rf_setup::RF_DR_HIGH,
        };
        self.write_register_byte(reg::RF_SETUP, rate | rf_setup::RF_PWR_MAX)?;

        self.write_register_byte(reg::RX_PW_P0, config.payload_size as u8)?;
        self.write_register_byte(reg::RX_PW_P1, config.payload_size as u8)?;
        self.write_register_byte(reg::DYNPD, 0)?;
        self.write_register_byte(reg::FEATURE, 0)?;

        self.command(cmd::FLUSH_RX)?;
        self.command(cmd::FLUSH_TX)?;
        self.write_register_byte(reg::STATUS, status::RX_DR | status::TX_DS | status::MAX_RT)?;

        self.write_register_byte(reg::CONFIG, config_reg)?;
        self.delay.delay_us(POWER_UP_DELAY_US);

        self.address_width = config.address_byte_len;
        self.payload_size = config.payload_size;
        self.state = DeviceState::Configured;

        if config.mode == Mode::Receive {
            self.set_ce(true)?;
        }

        log::debug!(
            "nRF24: configured channel {} at {:?}, config 0x{:02X}",
            config.channel,
            config.data_rate,
            config_reg
        );

        Ok(())
    }

    fn set_local_address(&mut self, addr: &[u8]) -> Result<(), RadioError> {
        self.check_address(addr)?;
        self.write_register(reg::RX_ADDR_P1, addr)
    }

    fn set_remote_address(&mut self, addr: &[u8]) -> Result<(), RadioError> {
        self.check_address(addr)?;
        self.write_register(reg::TX_ADDR, addr)?;
        self.write_register(reg::RX_ADDR_P0, addr)
    }

    fn read_register(&mut self, reg: u8) -> Result<u8, RadioError> {
        self.check_live()?;
        self.read_register_byte(reg)
    }

    fn is_payload_ready(&mut self) -> Result<bool, RadioError> {
        self.check_live()?;
        self.state = DeviceState::Polling;

        let flags = self.command(cmd::NOP)?;
        if flags & status::RX_DR != 0 {
            return Ok(true);
        }

        // RX_DR may already be cleared with data still queued in the FIFO
        let fifo_status = self.read_register_byte(reg::FIFO_STATUS)?;
        Ok(fifo_status & fifo::RX_EMPTY == 0)
    }

    fn fetch_payload(&mut self) -> Result<Payload, RadioError> {
        self.check_live()?;

        let mut buf = [cmd::NOP; PAYLOAD_SIZE + 1];
        buf[0] = cmd::R_RX_PAYLOAD;
        let len = 1 + self.payload_size;
        self.spi
            .transfer_in_place(&mut buf[..len])
            .map_err(|_| RadioError::Transfer)?;

        self.write_register_byte(reg::STATUS, status::RX_DR)?;

        let mut payload = Payload::new();
        payload
            .extend_from_slice(&buf[1..len])
            .map_err(|_| RadioError::InvalidConfig)?;
        Ok(payload)
    }

    fn terminate(&mut self) {
        match self.state {
            DeviceState::Terminated => return,
            DeviceState::Uninitialized => {}
            DeviceState::Configured | DeviceState::Polling => {
                // Best effort: the bus may already be gone during teardown
                let _ = self.set_ce(false);
                let _ = self.write_register_byte(reg::CONFIG, 0);
            }
        }
        self.state = DeviceState::Terminated;
        log::debug!("nRF24: terminated");
    }

    fn state(&self) -> DeviceState {
        self.state
    }
}
