use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation, SevenBitAddress};
use std::collections::BTreeMap;

/// Errors of the [`MemoryBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MemoryBusError {
    /// No device at this address.
    #[error("no device acknowledged address 0x{0:02x}")]
    NoAcknowledge(SevenBitAddress),
    /// The register holds fewer bytes than requested.
    #[error("register 0x{0:02x} holds fewer bytes than requested")]
    ShortRead(u8),
    /// A read was issued before any register pointer was written.
    #[error("read without register pointer")]
    MissingPointer,
}

impl embedded_hal::i2c::Error for MemoryBusError {
    fn kind(&self) -> ErrorKind {
        match self {
            MemoryBusError::NoAcknowledge(_) => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
            }
            MemoryBusError::ShortRead(_) => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            MemoryBusError::MissingPointer => ErrorKind::Other,
        }
    }
}

/// In-memory I2C bus.
///
/// Each device is a map from internal register address to the bytes last
/// written after that address. The first byte of a write sets the register
/// pointer; reads return the bytes stored at the pointer.
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    devices: BTreeMap<SevenBitAddress, BTreeMap<u8, Vec<u8>>>,
    reads: usize,
    writes: usize,
}

impl MemoryBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a device with no register content.
    pub fn with_device(mut self, addr: SevenBitAddress) -> Self {
        self.devices.entry(addr).or_default();
        self
    }

    /// Attach a device if needed and preload one of its registers.
    pub fn with_register(mut self, addr: SevenBitAddress, id: u8, bytes: &[u8]) -> Self {
        self.devices
            .entry(addr)
            .or_default()
            .insert(id, bytes.to_vec());
        self
    }

    /// Current content of a register.
    pub fn register(&self, addr: SevenBitAddress, id: u8) -> Option<&[u8]> {
        self.devices.get(&addr)?.get(&id).map(Vec::as_slice)
    }

    /// Number of register reads served.
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Number of register writes stored.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl ErrorType for MemoryBus {
    type Error = MemoryBusError;
}

impl I2c for MemoryBus {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let regs = self
            .devices
            .get_mut(&address)
            .ok_or(MemoryBusError::NoAcknowledge(address))?;
        let mut pointer = None;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    let Some((&id, data)) = bytes.split_first() else {
                        continue;
                    };
                    pointer = Some(id);
                    if !data.is_empty() {
                        regs.insert(id, data.to_vec());
                        self.writes += 1;
                    }
                }
                Operation::Read(buf) => {
                    let id = pointer.ok_or(MemoryBusError::MissingPointer)?;
                    let stored = regs.get(&id).map(Vec::as_slice).unwrap_or_default();
                    if stored.len() < buf.len() {
                        return Err(MemoryBusError::ShortRead(id));
                    }
                    buf.copy_from_slice(&stored[..buf.len()]);
                    self.reads += 1;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_then_read() {
        let mut bus = MemoryBus::new().with_register(0x18, 0x05, &[0x01, 0x90]);
        let mut buf = [0u8; 2];
        bus.write_read(0x18, &[0x05], &mut buf).unwrap();
        assert_eq!(buf, [0x01, 0x90]);
        assert_eq!(bus.reads(), 1);
        assert_eq!(bus.writes(), 0);
    }

    #[test]
    fn write_stores_payload() {
        let mut bus = MemoryBus::new().with_device(0x19);
        bus.write(0x19, &[0x00, 0x25]).unwrap();
        assert_eq!(bus.register(0x19, 0x00), Some(&[0x25][..]));
        assert_eq!(bus.writes(), 1);
    }

    #[test]
    fn errors() {
        let mut bus = MemoryBus::new().with_register(0x18, 0x08, &[0x03]);
        let mut buf = [0u8; 2];
        assert_eq!(
            bus.write_read(0x20, &[0x08], &mut buf),
            Err(MemoryBusError::NoAcknowledge(0x20))
        );
        assert_eq!(
            bus.write_read(0x18, &[0x08], &mut buf),
            Err(MemoryBusError::ShortRead(0x08))
        );
        assert_eq!(bus.read(0x18, &mut buf), Err(MemoryBusError::MissingPointer));
    }
}
