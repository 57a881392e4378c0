//! MC2SA analog front-end.
//!
//! Every register of the chip is write-only, so the values reported here
//! are the soft values of the last writes. Callers that need the current
//! setting across restarts keep their own copy and write it again.

use crate::{Addressing, Device, RegisterCodec};
use bitfield_struct::bitfield;
use embedded_hal::{delay::DelayNs, i2c::I2c};
use embedded_register::{Access, ConfigError, RegisterResult, ValidationError};

/// Gain selection register name.
pub const GAIN: &str = "gain";
/// Feedback resistor selection register name.
pub const RESISTOR: &str = "resistor";
/// Discriminator level register name.
pub const DISCRI: &str = "discri";
/// Offset level register name.
pub const OFFSET: &str = "offset";
/// Test pulse amplitude register name.
pub const AMPLITUDE: &str = "amplitude";
/// Test and discriminator selection register name.
pub const TEST_N_DISCRI: &str = "testNdiscri";

/// Default bus address of the chip.
pub const DEFAULT_ADDR: u8 = 0x19;

// name and internal address, in write order
const REGISTERS: [(&str, u8); 6] = [
    (GAIN, 0),
    (RESISTOR, 1),
    (DISCRI, 2),
    (OFFSET, 3),
    (AMPLITUDE, 4),
    (TEST_N_DISCRI, 5),
];

/// Capacitance in pF selected by each bit of the [`Gain`] register, LSB first.
pub const CAPACITORS_PF: [u8; 6] = [1, 2, 4, 8, 11, 16];

/// Resistance in kΩ selected by bits 3 to 5 of the [`Resistor`] register.
pub const RESISTORS_KOHM: [u16; 3] = [200, 300, 500];

/// Full scale of the level DACs, in volts.
pub const FULL_SCALE_VOLTS: f32 = 3.3;

/// Feedback capacitors of the preamplifier. Each set bit adds a capacitor.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct Gain {
    /// 1 pF
    pub pf1: bool,
    /// 2 pF
    pub pf2: bool,
    /// 4 pF
    pub pf4: bool,
    /// 8 pF
    pub pf8: bool,
    /// 11 pF
    pub pf11: bool,
    /// 16 pF
    pub pf16: bool,
    #[bits(2)]
    __reserved: u8,
}

impl Gain {
    const MASK: u8 = 0b0011_1111;

    /// Gain from one checkbox per capacitor, in [`CAPACITORS_PF`] order.
    pub fn from_selection(selection: [bool; 6]) -> Self {
        let bits = selection
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, &on)| acc | ((on as u8) << i));
        Gain::from_bits(bits)
    }

    /// One flag per capacitor, in [`CAPACITORS_PF`] order.
    pub fn selection(&self) -> [bool; 6] {
        core::array::from_fn(|i| self.into_bits() & (1 << i) != 0)
    }

    /// Total selected capacitance in pF.
    pub fn capacitance_pf(&self) -> u32 {
        self.selection()
            .iter()
            .zip(CAPACITORS_PF)
            .filter(|(on, _)| **on)
            .map(|(_, pf)| pf as u32)
            .sum()
    }
}

impl Addressing for Gain {
    const REGISTER: &'static str = GAIN;
}

impl RegisterCodec for Gain {
    fn encode(&self) -> i32 {
        (self.into_bits() & Self::MASK) as i32
    }

    fn decode(raw: i32) -> Result<Self, ValidationError> {
        Ok(Gain::from_bits(raw as u8 & Self::MASK))
    }
}

/// Feedback resistors of the preamplifier. Bits 0 to 2 are reserved and
/// always written as zero.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct Resistor {
    #[bits(3)]
    __reserved_lo: u8,
    /// 200 kΩ
    pub kohm200: bool,
    /// 300 kΩ
    pub kohm300: bool,
    /// 500 kΩ
    pub kohm500: bool,
    #[bits(2)]
    __reserved_hi: u8,
}

impl Resistor {
    const MASK: u8 = 0b0011_1000;

    /// Resistor from one checkbox per resistor, in [`RESISTORS_KOHM`] order.
    pub fn from_selection(selection: [bool; 3]) -> Self {
        Resistor::new()
            .with_kohm200(selection[0])
            .with_kohm300(selection[1])
            .with_kohm500(selection[2])
    }

    /// Resistor from a raw byte; reserved bits are dropped.
    pub fn from_raw(raw: u8) -> Self {
        Resistor::from_bits(raw & Self::MASK)
    }

    /// One flag per resistor, in [`RESISTORS_KOHM`] order.
    pub fn selection(&self) -> [bool; 3] {
        [self.kohm200(), self.kohm300(), self.kohm500()]
    }
}

impl Addressing for Resistor {
    const REGISTER: &'static str = RESISTOR;
}

impl RegisterCodec for Resistor {
    fn encode(&self) -> i32 {
        (self.into_bits() & Self::MASK) as i32
    }

    fn decode(raw: i32) -> Result<Self, ValidationError> {
        Ok(Resistor::from_raw(raw as u8))
    }
}

/// DAC code of a voltage in `[0.0, 3.3]`: `round(volts * 256 / 3.3)`, capped at 255.
pub fn volts_to_byte(volts: f32) -> Result<u8, ValidationError> {
    if !(0.0..=FULL_SCALE_VOLTS).contains(&volts) {
        return Err(ValidationError::VoltageOutOfRange(volts));
    }
    Ok((volts * 256.0 / FULL_SCALE_VOLTS).round().min(255.0) as u8)
}

/// Voltage of a DAC code: `byte * 3.3 / 256`.
pub fn byte_to_volts(byte: u8) -> f32 {
    byte as f32 * FULL_SCALE_VOLTS / 256.0
}

/// Output of one of the 8-bit level DACs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Level(u8);

impl Level {
    /// Level closest to `volts`.
    pub fn from_volts(volts: f32) -> Result<Self, ValidationError> {
        volts_to_byte(volts).map(Level)
    }

    /// Level from a DAC code.
    pub fn from_raw(raw: u8) -> Self {
        Level(raw)
    }

    /// DAC code.
    pub fn raw(&self) -> u8 {
        self.0
    }

    /// Output voltage.
    pub fn volts(&self) -> f32 {
        byte_to_volts(self.0)
    }
}

/// The level DACs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelRegister {
    /// Discriminator threshold.
    Discri,
    /// Baseline offset.
    Offset,
    /// Test pulse amplitude.
    Amplitude,
}

impl LevelRegister {
    /// Register name.
    pub fn name(&self) -> &'static str {
        match self {
            LevelRegister::Discri => DISCRI,
            LevelRegister::Offset => OFFSET,
            LevelRegister::Amplitude => AMPLITUDE,
        }
    }
}

/// Every register of the chip, as submitted by one form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mc2saSettings {
    /// Feedback capacitors.
    pub gain: Gain,
    /// Feedback resistors.
    pub resistor: Resistor,
    /// Discriminator threshold.
    pub discri: Level,
    /// Baseline offset.
    pub offset: Level,
    /// Test pulse amplitude.
    pub amplitude: Level,
    /// Test and discriminator selection byte.
    pub test_n_discri: u8,
}

pub(crate) fn create_registers<I, D>(dev: &mut Device<I, D>) -> Result<(), ConfigError> {
    for (name, id) in REGISTERS {
        dev.create_register(name, "I2CRegisterByte", id)?
            .set_access(Access::WriteOnly);
    }
    Ok(())
}

impl<I: I2c, D: DelayNs> Device<I, D> {
    /// Write the gain register.
    pub fn set_gain(&mut self, gain: Gain) -> RegisterResult<(), I::Error> {
        self.write_typed(&gain)
    }

    /// Last gain written.
    pub fn gain(&self) -> RegisterResult<Gain, I::Error> {
        self.cached_typed()
    }

    /// Write the resistor register.
    pub fn set_resistor(&mut self, resistor: Resistor) -> RegisterResult<(), I::Error> {
        self.write_typed(&resistor)
    }

    /// Last resistor selection written.
    pub fn resistor(&self) -> RegisterResult<Resistor, I::Error> {
        self.cached_typed()
    }

    /// Write one of the level DACs.
    pub fn set_level(&mut self, dac: LevelRegister, level: Level) -> RegisterResult<(), I::Error> {
        self.set(dac.name(), level.raw() as i32)
    }

    /// Last level written to a DAC.
    pub fn level(&self, dac: LevelRegister) -> RegisterResult<Level, I::Error> {
        Ok(Level::from_raw(self.get_cached(dac.name())? as u8))
    }

    /// Write the test and discriminator selection register.
    pub fn set_test_n_discri(&mut self, value: u8) -> RegisterResult<(), I::Error> {
        self.set(TEST_N_DISCRI, value as i32)
    }

    /// Write every register, gain first and test selection last.
    pub fn apply_mc2sa(&mut self, settings: &Mc2saSettings) -> RegisterResult<(), I::Error> {
        log::debug!("{}: applying {:?}", self.name(), settings);
        self.set_gain(settings.gain)?;
        self.set_resistor(settings.resistor)?;
        self.set_level(LevelRegister::Discri, settings.discri)?;
        self.set_level(LevelRegister::Offset, settings.offset)?;
        self.set_level(LevelRegister::Amplitude, settings.amplitude)?;
        self.set_test_n_discri(settings.test_n_discri)
    }

    /// Settings from the last writes.
    pub fn mc2sa_settings(&self) -> RegisterResult<Mc2saSettings, I::Error> {
        Ok(Mc2saSettings {
            gain: self.gain()?,
            resistor: self.resistor()?,
            discri: self.level(LevelRegister::Discri)?,
            offset: self.level(LevelRegister::Offset)?,
            amplitude: self.level(LevelRegister::Amplitude)?,
            test_n_discri: self.get_cached(TEST_N_DISCRI)? as u8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeviceFactory, testing::RecordingDelay};
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    use embedded_register::SharedBus;

    #[test]
    fn gain_bits() {
        let gain = Gain::from_selection([true, false, true, false, false, true]);
        assert_eq!(gain.encode(), 0b100101);
        assert_eq!(gain.encode(), 37);
        assert!(gain.pf1() && gain.pf4() && gain.pf16());
        assert_eq!(gain.capacitance_pf(), 21);
        assert_eq!(gain.selection(), [true, false, true, false, false, true]);
        assert_eq!(Gain::new().with_pf11(true).encode(), 1 << 4);
    }

    #[test]
    fn resistor_bits() {
        let resistor = Resistor::from_selection([true, false, true]);
        assert_eq!(resistor.encode(), 0b101000);
        assert_eq!(resistor.encode(), 40);
        assert_eq!(resistor.selection(), [true, false, true]);
    }

    #[test]
    fn resistor_reserved_bits_stay_clear() {
        for _ in 0..256 {
            let raw: u8 = rand::random();
            let resistor = Resistor::from_raw(raw);
            assert_eq!(resistor.encode() & 0b111, 0);
            assert_eq!(resistor.encode() as u8, raw & 0b0011_1000);
            assert_eq!(Resistor::decode(raw as i32).unwrap(), resistor);
        }
    }

    #[test]
    fn level_conversion() {
        assert_eq!(volts_to_byte(0.0), Ok(0));
        assert_eq!(volts_to_byte(3.3), Ok(255));
        assert_eq!(volts_to_byte(1.65), Ok(128));
        let volts = byte_to_volts(volts_to_byte(1.65).unwrap());
        assert!((volts - 1.65).abs() <= FULL_SCALE_VOLTS / 256.0);
        let level = Level::from_volts(0.7).unwrap();
        assert!((level.volts() - 0.7).abs() <= FULL_SCALE_VOLTS / 256.0);
    }

    #[test]
    fn level_out_of_range() {
        for volts in [-0.01, 3.31, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                Level::from_volts(volts),
                Err(ValidationError::VoltageOutOfRange(_))
            ));
        }
    }

    #[test]
    fn apply_in_declaration_order() {
        let settings = Mc2saSettings {
            gain: Gain::from_selection([true, false, true, false, false, true]),
            resistor: Resistor::from_selection([true, false, true]),
            discri: Level::from_volts(1.65).unwrap(),
            offset: Level::from_raw(0x10),
            amplitude: Level::from_volts(3.3).unwrap(),
            test_n_discri: 0x01,
        };
        let mut i2c = I2cMock::new(&[
            I2cTransaction::write(DEFAULT_ADDR, vec![0, 37]),
            I2cTransaction::write(DEFAULT_ADDR, vec![1, 40]),
            I2cTransaction::write(DEFAULT_ADDR, vec![2, 128]),
            I2cTransaction::write(DEFAULT_ADDR, vec![3, 0x10]),
            I2cTransaction::write(DEFAULT_ADDR, vec![4, 255]),
            I2cTransaction::write(DEFAULT_ADDR, vec![5, 0x01]),
        ]);
        let mut dev = DeviceFactory::new_device(
            "MC2SADevice",
            SharedBus::new(i2c.clone()),
            RecordingDelay::default(),
        )
        .unwrap();
        dev.apply_mc2sa(&settings).unwrap();
        assert_eq!(dev.mc2sa_settings().unwrap(), settings);
        assert_eq!(dev.update_time(), 6);
        i2c.done();
    }

    #[test]
    fn readback_never_reaches_bus() {
        let mut i2c = I2cMock::new(&[I2cTransaction::write(DEFAULT_ADDR, vec![0, 0x03])]);
        let mut dev = DeviceFactory::new_device(
            "MC2SADevice",
            SharedBus::new(i2c.clone()),
            RecordingDelay::default(),
        )
        .unwrap();
        dev.set_gain(Gain::from_bits(0x03)).unwrap();
        // write-only: served from the soft value
        assert_eq!(dev.get(GAIN).unwrap(), 0x03);
        assert_eq!(dev.gain().unwrap().capacitance_pf(), 3);
        i2c.done();
    }
}
