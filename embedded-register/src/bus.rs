use std::sync::{Arc, Mutex, MutexGuard};

/// One physical I2C bus shared by several devices.
///
/// The kernel driver does not keep multi-step register transactions atomic,
/// so every device holds the lock for the whole of one logical operation.
/// Clones refer to the same bus; the bus is closed when the last clone drops.
#[derive(Debug)]
pub struct SharedBus<I> {
    inner: Arc<Mutex<I>>,
}

impl<I> Clone for SharedBus<I> {
    fn clone(&self) -> Self {
        SharedBus {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<I> SharedBus<I> {
    /// Take ownership of an opened bus.
    pub fn new(i2c: I) -> Self {
        SharedBus {
            inner: Arc::new(Mutex::new(i2c)),
        }
    }

    /// Lock the bus for one transaction. Poisoned locks are recovered.
    pub fn lock(&self) -> MutexGuard<'_, I> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of handles to this bus.
    pub fn handles(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBus;
    use embedded_hal::i2c::I2c;
    use std::thread;

    #[test]
    fn clones_share_one_bus() {
        let bus = SharedBus::new(MemoryBus::new().with_device(0x18));
        let other = bus.clone();
        assert_eq!(bus.handles(), 2);
        other.lock().write(0x18, &[0x08, 0x02]).unwrap();
        assert_eq!(bus.lock().register(0x18, 0x08), Some(&[0x02][..]));
        drop(other);
        assert_eq!(bus.handles(), 1);
    }

    #[test]
    fn transactions_do_not_interleave() {
        let bus = SharedBus::new(MemoryBus::new().with_device(0x19));
        let workers: Vec<_> = (0u8..4)
            .map(|n| {
                let bus = bus.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        let mut i2c = bus.lock();
                        i2c.write(0x19, &[n, n]).unwrap();
                        let mut buf = [0u8; 1];
                        i2c.write_read(0x19, &[n], &mut buf).unwrap();
                        assert_eq!(buf, [n]);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(bus.lock().writes(), 200);
    }
}
