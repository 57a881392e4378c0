use crate::{ConfigError, I2cLink, Operation, RegisterError, RegisterResult, ValidationError};
use core::{fmt, str::FromStr};
use embedded_hal::i2c::I2c;

/// Access mode of a register, as wired on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Input only: writes only update the soft value.
    ReadOnly,
    /// Output only: reads return the soft value.
    WriteOnly,
    /// Input and output.
    ReadWrite,
}

impl Access {
    /// Whether a read reaches the bus.
    pub fn readable(&self) -> bool {
        !matches!(self, Access::WriteOnly)
    }

    /// Whether a write reaches the bus.
    pub fn writable(&self) -> bool {
        !matches!(self, Access::ReadOnly)
    }
}

/// The register types known to the [`RegisterFactory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterKind {
    /// Soft-only byte register, never touches a bus.
    Fake,
    /// Read-write byte register.
    I2cByte,
    /// Read-write word register.
    I2cWord,
    /// Read-only word register.
    I2cWordReadOnly,
}

impl RegisterKind {
    /// Every kind, in factory vocabulary order.
    pub const ALL: [RegisterKind; 4] = [
        RegisterKind::Fake,
        RegisterKind::I2cByte,
        RegisterKind::I2cWord,
        RegisterKind::I2cWordReadOnly,
    ];

    /// Factory name of the kind.
    pub const fn type_name(&self) -> &'static str {
        match self {
            RegisterKind::Fake => "FakeRegister",
            RegisterKind::I2cByte => "I2CRegisterByte",
            RegisterKind::I2cWord => "I2CRegisterWord",
            RegisterKind::I2cWordReadOnly => "I2CRegisterWord_RO",
        }
    }

    /// Width of the register in bytes.
    pub const fn size(&self) -> usize {
        match self {
            RegisterKind::Fake | RegisterKind::I2cByte => 1,
            RegisterKind::I2cWord | RegisterKind::I2cWordReadOnly => 2,
        }
    }

    /// Access mode a fresh register of this kind starts with.
    pub const fn default_access(&self) -> Access {
        match self {
            RegisterKind::I2cWordReadOnly => Access::ReadOnly,
            _ => Access::ReadWrite,
        }
    }
}

impl fmt::Display for RegisterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for RegisterKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RegisterKind::ALL
            .into_iter()
            .find(|kind| kind.type_name() == s)
            .ok_or_else(|| ConfigError::UnknownRegisterType(s.into()))
    }
}

/// One hardware register and its soft value.
///
/// The soft value is the last value read from or written to the register.
/// [`get`](Register::get) and [`set`](Register::set) only touch the soft
/// value, [`read`](Register::read) and [`write`](Register::write) go to the
/// bus when the access mode allows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    name: String,
    kind: RegisterKind,
    access: Access,
    id: u8,
    value: i32,
}

impl Register {
    /// Creates a register of the given kind, named after its type.
    pub fn new(kind: RegisterKind) -> Self {
        Register {
            name: kind.type_name().into(),
            kind,
            access: kind.default_access(),
            id: 0,
            value: 0,
        }
    }

    /// Set the symbolic name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the internal register address.
    pub fn with_id(mut self, id: u8) -> Self {
        self.id = id;
        self
    }

    /// Set the access mode.
    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    /// Change the access mode.
    pub fn set_access(&mut self, access: Access) -> &mut Self {
        self.access = access;
        self
    }

    /// Symbolic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Factory type name.
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Register kind.
    pub fn kind(&self) -> RegisterKind {
        self.kind
    }

    /// Access mode.
    pub fn access(&self) -> Access {
        self.access
    }

    /// Internal register address.
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Width in bytes.
    pub fn size(&self) -> usize {
        self.kind.size()
    }

    /// Soft value.
    pub fn get(&self) -> i32 {
        self.value
    }

    /// Update the soft value without touching the bus.
    pub fn set(&mut self, value: i32) -> Result<(), ValidationError> {
        self.validate(value)?;
        self.value = value;
        Ok(())
    }

    /// Read the register from the bus and cache the value.
    ///
    /// Single bytes are taken as is, words as `first * 256 + second`.
    /// Fake and write-only registers return the soft value without bus traffic.
    pub fn read<I: I2c>(&mut self, link: &mut I2cLink<'_, I>) -> RegisterResult<i32, I::Error> {
        if self.kind == RegisterKind::Fake {
            return Ok(self.value);
        }
        if !self.access.readable() {
            log::warn!(
                "{}/{}: write-only register read, returning soft value {}",
                link.device(),
                self.name,
                self.value
            );
            return Ok(self.value);
        }
        let mut buf = [0u8; 2];
        let buf = &mut buf[..self.size()];
        link.read_bytes(self.id, buf)
            .map_err(|error| RegisterError::Transport {
                device: link.device().into(),
                register: self.name.clone(),
                op: Operation::Read,
                error,
            })?;
        self.value = buf.iter().fold(0, |acc, &b| acc * 256 + b as i32);
        Ok(self.value)
    }

    /// Cache `value` and write it to the bus, low byte first.
    ///
    /// Writing a read-only register only updates the soft value and logs a
    /// warning. Fake registers never touch the bus.
    pub fn write<I: I2c>(
        &mut self,
        link: &mut I2cLink<'_, I>,
        value: i32,
    ) -> RegisterResult<(), I::Error> {
        self.set(value)?;
        if self.kind == RegisterKind::Fake {
            return Ok(());
        }
        if !self.access.writable() {
            log::warn!(
                "{}/{}: read-only register written, soft value only ({})",
                link.device(),
                self.name,
                value
            );
            return Ok(());
        }
        let bytes = value.to_le_bytes();
        link.write_bytes(self.id, &bytes[..self.size()])
            .map_err(|error| RegisterError::Transport {
                device: link.device().into(),
                register: self.name.clone(),
                op: Operation::Write,
                error,
            })
    }

    /// Check that `value` fits the register width.
    pub fn validate(&self, value: i32) -> Result<(), ValidationError> {
        let bits = 8 * self.size() as u32;
        let min = -(1i32 << (bits - 1));
        let max = (1i32 << bits) - 1;
        if (min..=max).contains(&value) {
            Ok(())
        } else {
            Err(ValidationError::ValueOutOfRange {
                register: self.name.clone(),
                value,
                size: self.size(),
            })
        }
    }
}

/// Creates registers from their type name.
pub struct RegisterFactory;

impl RegisterFactory {
    /// Create a register from one of the names listed by [`list`](RegisterFactory::list).
    pub fn create(type_name: &str) -> Result<Register, ConfigError> {
        match type_name.parse::<RegisterKind>() {
            Ok(kind) => Ok(Register::new(kind)),
            Err(e) => {
                log::error!(
                    "register type \"{}\" is unknown, should be one of: {}",
                    type_name,
                    Self::list()
                );
                Err(e)
            }
        }
    }

    /// Known type names, e.g. `FakeRegister, I2CRegisterByte, ...`.
    pub fn list() -> String {
        RegisterKind::ALL
            .iter()
            .map(RegisterKind::type_name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransportError;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    const ADDR: u8 = 0x18;

    #[test]
    fn factory_vocabulary() {
        for kind in RegisterKind::ALL {
            let reg = RegisterFactory::create(kind.type_name()).unwrap();
            assert_eq!(reg.kind(), kind);
            assert_eq!(reg.name(), kind.type_name());
        }
        let ro = RegisterFactory::create("I2CRegisterWord_RO").unwrap();
        assert_eq!(ro.access(), Access::ReadOnly);
        assert_eq!(ro.size(), 2);
        assert_eq!(
            RegisterFactory::list(),
            "FakeRegister, I2CRegisterByte, I2CRegisterWord, I2CRegisterWord_RO"
        );
    }

    #[test]
    fn unknown_type_is_config_error() {
        assert_eq!(
            RegisterFactory::create("Bogus"),
            Err(ConfigError::UnknownRegisterType("Bogus".into()))
        );
    }

    #[test]
    fn word_read_is_big_endian() {
        let mut i2c = I2cMock::new(&[I2cTransaction::write_read(
            ADDR,
            vec![0x05],
            vec![0x01, 0x90],
        )]);
        let mut reg = Register::new(RegisterKind::I2cWordReadOnly).with_id(0x05);
        let mut link = I2cLink::new(&mut i2c, ADDR, "dev");
        assert_eq!(reg.read(&mut link).unwrap(), 0x0190);
        assert_eq!(reg.get(), 0x0190);
        i2c.done();
    }

    #[test]
    fn word_write_is_low_byte_first() {
        let mut i2c = I2cMock::new(&[I2cTransaction::write(ADDR, vec![0x02, 0x34, 0x12])]);
        let mut reg = Register::new(RegisterKind::I2cWord).with_id(0x02);
        let mut link = I2cLink::new(&mut i2c, ADDR, "dev");
        reg.write(&mut link, 0x1234).unwrap();
        assert_eq!(reg.get(), 0x1234);
        i2c.done();
    }

    #[test]
    fn read_only_write_stays_soft() {
        // no expectations: any bus call fails the test
        let mut i2c = I2cMock::new(&[]);
        let mut reg = Register::new(RegisterKind::I2cWordReadOnly).with_id(0x05);
        let mut link = I2cLink::new(&mut i2c, ADDR, "dev");
        reg.write(&mut link, 0x0123).unwrap();
        assert_eq!(reg.get(), 0x0123);
        i2c.done();
    }

    #[test]
    fn write_only_read_stays_soft() {
        let mut i2c = I2cMock::new(&[I2cTransaction::write(ADDR, vec![0x00, 0x25])]);
        let mut reg = Register::new(RegisterKind::I2cByte).with_access(Access::WriteOnly);
        let mut link = I2cLink::new(&mut i2c, ADDR, "dev");
        reg.write(&mut link, 0x25).unwrap();
        assert_eq!(reg.read(&mut link).unwrap(), 0x25);
        i2c.done();
    }

    #[test]
    fn fake_register_is_soft_only() {
        let mut i2c = I2cMock::new(&[]);
        let mut reg = RegisterFactory::create("FakeRegister").unwrap();
        let mut link = I2cLink::new(&mut i2c, ADDR, "dev");
        reg.write(&mut link, 7).unwrap();
        assert_eq!(reg.read(&mut link).unwrap(), 7);
        i2c.done();
    }

    #[test]
    fn out_of_range_rejected_before_bus() {
        let mut i2c = I2cMock::new(&[]);
        let mut reg = Register::new(RegisterKind::I2cByte).with_name("gain");
        let mut link = I2cLink::new(&mut i2c, ADDR, "dev");
        let err = reg.write(&mut link, 0x100).unwrap_err();
        assert!(matches!(
            err,
            RegisterError::Validation(ValidationError::ValueOutOfRange { value: 0x100, size: 1, .. })
        ));
        assert_eq!(reg.get(), 0);
        assert!(reg.set(-128).is_ok());
        assert!(reg.set(-129).is_err());
        i2c.done();
    }

    #[test]
    fn bus_error_carries_context() {
        let mut i2c = I2cMock::new(&[I2cTransaction::write_read(ADDR, vec![0x08], vec![0x00])
            .with_error(ErrorKind::Other)]);
        let mut reg = Register::new(RegisterKind::I2cByte)
            .with_name("TemperatureResolution")
            .with_id(0x08);
        let mut link = I2cLink::new(&mut i2c, ADDR, "TemperatureDevice");
        match reg.read(&mut link).unwrap_err() {
            RegisterError::Transport {
                device,
                register,
                op,
                error,
            } => {
                assert_eq!(device, "TemperatureDevice");
                assert_eq!(register, "TemperatureResolution");
                assert_eq!(op, Operation::Read);
                assert!(matches!(error, TransportError::Bus(ErrorKind::Other)));
            }
            other => panic!("unexpected error {other:?}"),
        }
        i2c.done();
    }
}
