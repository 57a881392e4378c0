#![deny(missing_docs)]

/*! # PiPoE devices
 *
 * Devices of the PiPoE board, built on the register model of
 * [`embedded_register`]:
 * - a [`Device`] owns a named set of registers at one address of a
 *   [`SharedBus`], created by name through the [`DeviceFactory`];
 * - the MCP9808-style temperature sensor ([`temperature`]);
 * - the MC2SA analog front-end, whose registers are write-only ([`mc2sa`]);
 * - a [`Module`] groups named devices and applies one [`Setup`] in order.
 */

mod device;
pub mod mc2sa;
mod module;
pub mod temperature;
#[cfg(test)]
pub(crate) mod testing;
mod traits;

pub use device::{DEFAULT_TIMEOUT, Device, DeviceBuilder, DeviceFactory, DeviceKind};
pub use embedded_register::{
    Access, ConfigError, LookupError, MemoryBus, Operation, Register, RegisterError,
    RegisterFactory, RegisterKind, RegisterResult, SharedBus, TransportError, ValidationError,
};
pub use mc2sa::{Gain, Level, LevelRegister, Mc2saSettings, Resistor};
pub use module::{Module, ModuleFactory, Setup};
pub use temperature::{Resolution, Temperature};
pub use traits::{Addressing, RegisterCodec};

/// Version of this library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name and version, e.g. `pipoe.v0.1.0`.
pub fn pretty_version() -> String {
    format!("{}.v{}", env!("CARGO_PKG_NAME"), VERSION)
}
