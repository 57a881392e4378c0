#![deny(missing_docs)]
//! # embedded-register
//! A cached, access-controlled model of the registers of an I2C device.
//!
//! A [`Register`] is one addressable cell of a chip: it knows its width
//! (one or two bytes), its [`Access`] mode and the last value seen on or
//! sent to the wire (the *soft* value). Registers are created by name through
//! the [`RegisterFactory`] and talk to the hardware through an [`I2cLink`],
//! a short-lived view of a bus implementing [`embedded_hal::i2c::I2c`].
//!
//! Devices sharing one physical bus share one [`SharedBus`], which serializes
//! every multi-step transaction. [`MemoryBus`] is an in-memory bus for running
//! without hardware.

mod bus;
mod error;
mod link;
mod memory;
mod register;

pub use bus::SharedBus;
pub use error::{
    ConfigError, LookupError, Operation, RegisterError, TransportError, ValidationError,
};
pub use link::I2cLink;
pub use memory::{MemoryBus, MemoryBusError};
pub use register::{Access, Register, RegisterFactory, RegisterKind};

/// Results of register and device operations.
pub type RegisterResult<T, E> = Result<T, RegisterError<E>>;

/// Version of this library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name and version, e.g. `embedded-register.v0.1.0`.
pub fn pretty_version() -> String {
    format!("{}.v{}", env!("CARGO_PKG_NAME"), VERSION)
}
