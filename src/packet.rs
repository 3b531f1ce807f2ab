//! Weather packet decoder
//!
//! # Wire Format
//!
//! Packets are packed little-endian with no padding between fields:
//! ```text
//! [temperature: f32][pressure: f32][humidity: f32][rainfall: f32][windspeed: f32][wind_direction: u16]
//! ```
//!
//! Total encoded length is 22 bytes. The radio payload is wider than this;
//! trailing bytes are ignored.

use core::fmt;

use crate::errors::DecodeError;

/// Readings from one weather station transmission
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherPacket {
    pub temperature: f32,
    pub pressure: f32,
    pub humidity: f32,
    pub rainfall: f32,
    pub windspeed: f32,
    pub wind_direction: u16,
}

/// Field offsets within the encoded packet
mod offset {
    pub const TEMPERATURE: usize = 0;
    pub const PRESSURE: usize = 4;
    pub const HUMIDITY: usize = 8;
    pub const RAINFALL: usize = 12;
    pub const WINDSPEED: usize = 16;
    pub const WIND_DIRECTION: usize = 20;
}

impl WeatherPacket {
    /// Encoded length in bytes
    pub const ENCODED_LEN: usize = 22;

    /// Decode a packet from the start of `buf`
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < Self::ENCODED_LEN {
            return Err(DecodeError::BufferTooShort {
                required: Self::ENCODED_LEN,
                actual: buf.len(),
            });
        }

        let f32_at = |at: usize| f32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);

        Ok(Self {
            temperature: f32_at(offset::TEMPERATURE),
            pressure: f32_at(offset::PRESSURE),
            humidity: f32_at(offset::HUMIDITY),
            rainfall: f32_at(offset::RAINFALL),
            windspeed: f32_at(offset::WINDSPEED),
            wind_direction: u16::from_le_bytes([
                buf[offset::WIND_DIRECTION],
                buf[offset::WIND_DIRECTION + 1],
            ]),
        })
    }

    /// Encode the packet in wire format
    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[offset::TEMPERATURE..offset::PRESSURE].copy_from_slice(&self.temperature.to_le_bytes());
        out[offset::PRESSURE..offset::HUMIDITY].copy_from_slice(&self.pressure.to_le_bytes());
        out[offset::HUMIDITY..offset::RAINFALL].copy_from_slice(&self.humidity.to_le_bytes());
        out[offset::RAINFALL..offset::WINDSPEED].copy_from_slice(&self.rainfall.to_le_bytes());
        out[offset::WINDSPEED..offset::WIND_DIRECTION].copy_from_slice(&self.windspeed.to_le_bytes());
        out[offset::WIND_DIRECTION..].copy_from_slice(&self.wind_direction.to_le_bytes());
        out
    }
}

impl fmt::Display for WeatherPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "temperature {:.2}, pressure {:.2}, humidity {:.2}, rainfall {:.2}, windspeed {:.2}, direction {}",
            self.temperature,
            self.pressure,
            self.humidity,
            self.rainfall,
            self.windspeed,
            self.wind_direction
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WeatherPacket {
        WeatherPacket {
            temperature: 21.5,
            pressure: 1013.25,
            humidity: 64.0,
            rainfall: 0.2,
            windspeed: 3.75,
            wind_direction: 270,
        }
    }

    fn same_bits(a: &WeatherPacket, b: &WeatherPacket) -> bool {
        a.temperature.to_bits() == b.temperature.to_bits()
            && a.pressure.to_bits() == b.pressure.to_bits()
            && a.humidity.to_bits() == b.humidity.to_bits()
            && a.rainfall.to_bits() == b.rainfall.to_bits()
            && a.windspeed.to_bits() == b.windspeed.to_bits()
            && a.wind_direction == b.wind_direction
    }

    #[test]
    fn test_decode_known_layout() {
        let mut buf = [0u8; 22];
        buf[0..4].copy_from_slice(&21.5f32.to_le_bytes());
        buf[4..8].copy_from_slice(&1013.25f32.to_le_bytes());
        buf[8..12].copy_from_slice(&64.0f32.to_le_bytes());
        buf[12..16].copy_from_slice(&0.2f32.to_le_bytes());
        buf[16..20].copy_from_slice(&3.75f32.to_le_bytes());
        buf[20..22].copy_from_slice(&[0x0E, 0x01]); // 270

        let packet = WeatherPacket::decode(&buf).unwrap();
        assert_eq!(packet, sample());
    }

    #[test]
    fn test_wind_direction_is_little_endian_at_offset_20() {
        let mut buf = [0u8; 22];
        buf[20] = 0x34;
        buf[21] = 0x12;

        let packet = WeatherPacket::decode(&buf).unwrap();
        assert_eq!(packet.wind_direction, 0x1234);
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut buf = [0xAAu8; 32];
        buf[..22].copy_from_slice(&sample().encode());

        let packet = WeatherPacket::decode(&buf).unwrap();
        assert_eq!(packet, sample());
    }

    #[test]
    fn test_round_trip_edge_values() {
        let floats = [0.0f32, -0.0, -40.5, f32::MAX, f32::MIN_POSITIVE, f32::NAN, f32::INFINITY];
        let directions = [0u16, 1, 359, 0x8000, u16::MAX];

        for (i, value) in floats.iter().enumerate() {
            let packet = WeatherPacket {
                temperature: *value,
                pressure: -*value,
                humidity: *value,
                rainfall: 0.0,
                windspeed: *value,
                wind_direction: directions[i % directions.len()],
            };

            let decoded = WeatherPacket::decode(&packet.encode()).unwrap();
            assert!(same_bits(&packet, &decoded), "round trip failed for {value}");
        }
    }

    #[test]
    fn test_short_buffer_rejected() {
        for len in 0..WeatherPacket::ENCODED_LEN {
            let buf = vec![0u8; len];
            assert_eq!(
                WeatherPacket::decode(&buf),
                Err(DecodeError::BufferTooShort {
                    required: 22,
                    actual: len
                })
            );
        }
    }

    #[test]
    fn test_display() {
        let text = sample().to_string();
        assert!(text.contains("temperature 21.50"));
        assert!(text.contains("direction 270"));
    }
}
