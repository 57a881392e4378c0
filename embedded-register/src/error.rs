use core::fmt;
use std::time::Duration;

/// Direction of a register transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Register read.
    Read,
    /// Register write.
    Write,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read => f.write_str("read"),
            Operation::Write => f.write_str("write"),
        }
    }
}

/// Misconfiguration of a register map or device set.
///
/// These are raised while building devices and modules and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The register factory does not know this type name.
    #[error("unknown register type \"{0}\"")]
    UnknownRegisterType(String),
    /// The device factory does not know this type name.
    #[error("unknown device type \"{0}\"")]
    UnknownDeviceType(String),
    /// The module factory does not know this type name.
    #[error("unknown module type \"{0}\"")]
    UnknownModuleType(String),
    /// A register with this name is already bound to the device.
    #[error("register \"{register}\" is already defined on device \"{device}\"")]
    DuplicateRegister {
        /// Device name.
        device: String,
        /// Register name.
        register: String,
    },
    /// A device with this name already belongs to the module.
    #[error("device \"{device}\" is already defined in module \"{module}\"")]
    DuplicateDevice {
        /// Module name.
        module: String,
        /// Device name.
        device: String,
    },
}

/// Out-of-domain input to a typed setter. Raised before any bus traffic.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Temperature resolution is not one of 0.5, 0.25, 0.125 or 0.0625 °C.
    #[error("resolution {0} °C is not one of 0.5, 0.25, 0.125, 0.0625")]
    InvalidResolution(f32),
    /// Temperature resolution register holds an undefined code.
    #[error("resolution code 0x{0:x} is undefined")]
    InvalidResolutionCode(i32),
    /// DAC level outside of the 0.0 V to 3.3 V range.
    #[error("level {0} V is outside 0.0 V to 3.3 V")]
    VoltageOutOfRange(f32),
    /// Value does not fit in the register width.
    #[error("value {value} does not fit in the {size}-byte register \"{register}\"")]
    ValueOutOfRange {
        /// Register name.
        register: String,
        /// Rejected value.
        value: i32,
        /// Register width in bytes.
        size: usize,
    },
}

/// A name that does not resolve to a register or device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// No register with this name on the device.
    #[error("device \"{device}\" has no register \"{register}\"")]
    UnknownRegister {
        /// Device name.
        device: String,
        /// Register name.
        register: String,
    },
    /// No device with this name in the module.
    #[error("module \"{module}\" has no device \"{device}\"")]
    UnknownDevice {
        /// Module name.
        module: String,
        /// Device name.
        device: String,
    },
}

/// Failure of a single bus transfer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError<E> {
    /// Error reported by the I2C implementation.
    #[error("bus error: {0:?}")]
    Bus(E),
    /// The transfer returned after the configured limit.
    #[error("transfer took {elapsed:?}, limit is {limit:?}")]
    Timeout {
        /// Time spent in the transfer.
        elapsed: Duration,
        /// Configured limit.
        limit: Duration,
    },
}

impl<E> From<E> for TransportError<E> {
    fn from(value: E) -> Self {
        Self::Bus(value)
    }
}

/// Errors of register, device and module operations.
#[derive(Debug, thiserror::Error)]
pub enum RegisterError<E> {
    /// Misconfigured register map or device set.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Bus transfer failure, with the place it happened.
    #[error("{op} of {device}/{register} failed: {error}")]
    Transport {
        /// Device name.
        device: String,
        /// Register name.
        register: String,
        /// Direction of the failed transfer.
        op: Operation,
        /// Underlying transfer error.
        error: TransportError<E>,
    },
    /// Rejected input.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Unknown register or device name.
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

impl<E> RegisterError<E> {
    /// The transfer error, if this is a transport failure.
    pub fn transport(&self) -> Option<&TransportError<E>> {
        match self {
            RegisterError::Transport { error, .. } => Some(error),
            _ => None,
        }
    }
}
