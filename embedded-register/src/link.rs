use crate::TransportError;
use embedded_hal::i2c::{I2c, SevenBitAddress};
use std::time::{Duration, Instant};

/// One device on a borrowed I2C bus.
///
/// Registers go through the link for every transfer. When a timeout is set,
/// a transfer returning after the limit is reported as
/// [`TransportError::Timeout`] even if the bus reported success.
pub struct I2cLink<'a, I> {
    bus: &'a mut I,
    addr: SevenBitAddress,
    device: &'a str,
    timeout: Option<Duration>,
}

impl<'a, I> I2cLink<'a, I> {
    /// Creates a link to the device at `addr`, named `device` in diagnostics.
    pub fn new(bus: &'a mut I, addr: SevenBitAddress, device: &'a str) -> Self {
        I2cLink {
            bus,
            addr,
            device,
            timeout: None,
        }
    }

    /// Set the transfer time limit.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Device address.
    pub fn addr(&self) -> SevenBitAddress {
        self.addr
    }

    /// Device name.
    pub fn device(&self) -> &str {
        self.device
    }
}

impl<I: I2c> I2cLink<'_, I> {
    /// Fill `buf` from the internal register `id`.
    pub fn read_bytes(&mut self, id: u8, buf: &mut [u8]) -> Result<(), TransportError<I::Error>> {
        let start = Instant::now();
        self.bus.write_read(self.addr, &[id], buf)?;
        self.check_elapsed(start)?;
        log::trace!(
            "{}@0x{:02x}: read 0x{:02x} -> {:02x?}",
            self.device,
            self.addr,
            id,
            buf
        );
        Ok(())
    }

    /// Write `bytes` to the internal register `id`.
    pub fn write_bytes(&mut self, id: u8, bytes: &[u8]) -> Result<(), TransportError<I::Error>> {
        let mut frame = Vec::with_capacity(bytes.len() + 1);
        frame.push(id);
        frame.extend_from_slice(bytes);
        let start = Instant::now();
        self.bus.write(self.addr, &frame)?;
        self.check_elapsed(start)?;
        log::trace!(
            "{}@0x{:02x}: write 0x{:02x} <- {:02x?}",
            self.device,
            self.addr,
            id,
            bytes
        );
        Ok(())
    }

    fn check_elapsed(&self, start: Instant) -> Result<(), TransportError<I::Error>> {
        let elapsed = start.elapsed();
        match self.timeout {
            Some(limit) if elapsed > limit => {
                log::warn!(
                    "{}@0x{:02x}: transfer took {:?} (limit {:?})",
                    self.device,
                    self.addr,
                    elapsed,
                    limit
                );
                Err(TransportError::Timeout { elapsed, limit })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBus;

    #[test]
    fn frames_register_pointer() {
        let mut bus = MemoryBus::new().with_register(0x19, 0x03, &[0xaa]);
        let mut link = I2cLink::new(&mut bus, 0x19, "MC2SADevice");
        link.write_bytes(0x04, &[0x80]).unwrap();
        let mut buf = [0u8; 1];
        link.read_bytes(0x03, &mut buf).unwrap();
        assert_eq!(buf, [0xaa]);
        assert_eq!(bus.register(0x19, 0x04), Some(&[0x80][..]));
    }

    struct SlowBus(MemoryBus);

    impl embedded_hal::i2c::ErrorType for SlowBus {
        type Error = crate::MemoryBusError;
    }

    impl I2c for SlowBus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [embedded_hal::i2c::Operation<'_>],
        ) -> Result<(), Self::Error> {
            std::thread::sleep(Duration::from_millis(5));
            self.0.transaction(address, operations)
        }
    }

    #[test]
    fn slow_transfer_reports_timeout() {
        let mut bus = SlowBus(MemoryBus::new().with_register(0x18, 0x08, &[0x03]));
        let mut link = I2cLink::new(&mut bus, 0x18, "TemperatureDevice")
            .with_timeout(Some(Duration::from_millis(1)));
        let mut buf = [0u8; 1];
        match link.read_bytes(0x08, &mut buf) {
            Err(TransportError::Timeout { elapsed, limit }) => {
                assert!(elapsed > limit);
                assert_eq!(limit, Duration::from_millis(1));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn no_timeout_by_default() {
        let mut bus = SlowBus(MemoryBus::new().with_register(0x18, 0x08, &[0x03]));
        let mut link = I2cLink::new(&mut bus, 0x18, "TemperatureDevice");
        let mut buf = [0u8; 1];
        link.read_bytes(0x08, &mut buf).unwrap();
        assert_eq!(buf, [0x03]);
    }

    #[test]
    fn bus_error_passes_through() {
        let mut bus = MemoryBus::new();
        let mut link = I2cLink::new(&mut bus, 0x42, "nobody");
        assert!(matches!(
            link.write_bytes(0x00, &[0x01]),
            Err(TransportError::Bus(crate::MemoryBusError::NoAcknowledge(0x42)))
        ));
    }
}
