//! MCP9808-style temperature sensor.
//!
//! Two registers: the ambient temperature (read-only word) and the
//! measurement resolution (read-write byte). A new resolution needs 345 ms
//! before conversions use it.

use crate::{Addressing, Device, RegisterCodec};
use embedded_hal::{delay::DelayNs, i2c::I2c};
use embedded_register::{ConfigError, RegisterResult, ValidationError};
use fixed::types::I12F4;
use std::time::Duration;

/// Ambient temperature register name.
pub const AMBIANT_TEMPERATURE: &str = "AmbiantTemperature";
/// Resolution register name.
pub const TEMPERATURE_RESOLUTION: &str = "TemperatureResolution";

pub(crate) const AMBIANT_TEMPERATURE_ID: u8 = 0x05;
pub(crate) const TEMPERATURE_RESOLUTION_ID: u8 = 0x08;

/// Default bus address of the sensor.
pub const DEFAULT_ADDR: u8 = 0x18;

/// Time the sensor needs after a resolution change.
pub const SETTLE_DELAY: Duration = Duration::from_millis(345);

/// Temperature in °C, on the sensor's 1/16 °C grid.
pub type Temperature = I12F4;

/// Measurement resolution and its register code.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    /// 0.5 °C
    Half = 0x0,
    /// 0.25 °C
    Quarter = 0x1,
    /// 0.125 °C
    Eighth = 0x2,
    /// 0.0625 °C, power-on default
    #[default]
    Sixteenth = 0x3,
}

impl Resolution {
    /// Every resolution, coarsest first.
    pub const ALL: [Resolution; 4] = [
        Resolution::Half,
        Resolution::Quarter,
        Resolution::Eighth,
        Resolution::Sixteenth,
    ];

    /// Resolution in °C.
    pub fn celsius(&self) -> f32 {
        use Resolution::*;
        match self {
            Half => 0.5,
            Quarter => 0.25,
            Eighth => 0.125,
            Sixteenth => 0.0625,
        }
    }

    /// Register code.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<f32> for Resolution {
    type Error = ValidationError;

    /// Only the four exact values are accepted.
    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Resolution::ALL
            .into_iter()
            .find(|res| res.celsius() == value)
            .ok_or(ValidationError::InvalidResolution(value))
    }
}

impl Addressing for Resolution {
    const REGISTER: &'static str = TEMPERATURE_RESOLUTION;
}

impl RegisterCodec for Resolution {
    fn encode(&self) -> i32 {
        self.code() as i32
    }

    fn decode(raw: i32) -> Result<Self, ValidationError> {
        Resolution::ALL
            .into_iter()
            .find(|res| res.code() as i32 == raw)
            .ok_or(ValidationError::InvalidResolutionCode(raw))
    }
}

/// Decode the ambient temperature register.
///
/// The top three bits of the upper byte are alert flags. Bit 4 of the upper
/// byte is the sign; the remaining 12 bits are the magnitude in 1/16 °C.
pub fn decode_temperature(raw: u16) -> Temperature {
    let [ub, lb] = raw.to_be_bytes();
    let ub = ub & 0x1f;
    if ub & 0x10 != 0 {
        Temperature::from_num(256) - magnitude(ub & 0x0f, lb)
    } else {
        magnitude(ub, lb)
    }
}

/// [`decode_temperature`] as a float.
pub fn decode_celsius(raw: u16) -> f32 {
    decode_temperature(raw).to_num()
}

// ub * 16 + lb / 16
fn magnitude(ub: u8, lb: u8) -> Temperature {
    Temperature::from_bits(i16::from_be_bytes([ub, lb]))
}

pub(crate) fn create_registers<I, D>(dev: &mut Device<I, D>) -> Result<(), ConfigError> {
    dev.create_register(
        AMBIANT_TEMPERATURE,
        "I2CRegisterWord_RO",
        AMBIANT_TEMPERATURE_ID,
    )?;
    dev.create_register(
        TEMPERATURE_RESOLUTION,
        "I2CRegisterByte",
        TEMPERATURE_RESOLUTION_ID,
    )?;
    Ok(())
}

impl<I: I2c, D: DelayNs> Device<I, D> {
    /// Read the ambient temperature.
    pub fn get_temperature(&mut self) -> RegisterResult<Temperature, I::Error> {
        let raw = self.get(AMBIANT_TEMPERATURE)?;
        Ok(decode_temperature(raw as u16))
    }

    /// Read the ambient temperature in °C.
    pub fn get_celsius(&mut self) -> RegisterResult<f32, I::Error> {
        Ok(self.get_temperature()?.to_num())
    }

    /// Set the measurement resolution, in °C.
    ///
    /// `resolution` must be exactly 0.5, 0.25, 0.125 or 0.0625. The call
    /// returns after the settle delay.
    pub fn set_celsius(&mut self, resolution: f32) -> RegisterResult<(), I::Error> {
        self.set_resolution(Resolution::try_from(resolution)?)
    }

    /// Set the measurement resolution and wait for it to apply.
    pub fn set_resolution(&mut self, resolution: Resolution) -> RegisterResult<(), I::Error> {
        self.set_settled(Resolution::REGISTER, resolution.encode())
    }

    /// Read the measurement resolution back from the sensor.
    pub fn resolution(&mut self) -> RegisterResult<Resolution, I::Error> {
        self.read_typed()
    }
}
