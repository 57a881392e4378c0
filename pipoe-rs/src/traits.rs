use embedded_register::ValidationError;

/// Register holding a typed value.
pub trait Addressing {
    /// Symbolic name of the register on its device.
    const REGISTER: &'static str;
}

/// Conversion between a typed value and raw register content.
pub trait RegisterCodec: Addressing + Sized {
    /// Raw register value.
    fn encode(&self) -> i32;
    /// Typed value from raw register content.
    fn decode(raw: i32) -> Result<Self, ValidationError>;
}
