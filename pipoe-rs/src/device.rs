use crate::{RegisterCodec, mc2sa, temperature};
use core::{fmt, str::FromStr};
use embedded_hal::{
    delay::DelayNs,
    i2c::{I2c, SevenBitAddress},
};
use embedded_register::{
    ConfigError, I2cLink, LookupError, Register, RegisterFactory, RegisterResult, SharedBus,
};
use std::{collections::BTreeMap, time::Duration};

/// The device types known to the [`DeviceFactory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Two soft-only registers, no bus traffic.
    Fake,
    /// MCP9808-style temperature sensor.
    Temperature,
    /// MC2SA analog front-end.
    Mc2sa,
}

impl DeviceKind {
    /// Every kind, in factory vocabulary order.
    pub const ALL: [DeviceKind; 3] = [DeviceKind::Fake, DeviceKind::Temperature, DeviceKind::Mc2sa];

    /// Factory name of the kind.
    pub const fn type_name(&self) -> &'static str {
        match self {
            DeviceKind::Fake => "FakeDevice",
            DeviceKind::Temperature => "TemperatureDevice",
            DeviceKind::Mc2sa => "MC2SADevice",
        }
    }

    /// Bus address used unless the builder sets one.
    pub const fn default_addr(&self) -> SevenBitAddress {
        match self {
            DeviceKind::Fake => 0x00,
            DeviceKind::Temperature => temperature::DEFAULT_ADDR,
            DeviceKind::Mc2sa => mc2sa::DEFAULT_ADDR,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for DeviceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceKind::ALL
            .into_iter()
            .find(|kind| kind.type_name() == s)
            .ok_or_else(|| ConfigError::UnknownDeviceType(s.into()))
    }
}

/// Limit for a single bus transfer unless the builder sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Builder for creating a [`Device`] with custom configuration.
#[derive(Debug, Clone)]
pub struct DeviceBuilder {
    kind: DeviceKind,
    name: Option<String>,
    addr: Option<SevenBitAddress>,
    settle: Duration,
    timeout: Option<Duration>,
    initialize: bool,
}

impl DeviceBuilder {
    /// Builder for a device of the given kind.
    pub fn new(kind: DeviceKind) -> Self {
        DeviceBuilder {
            kind,
            name: None,
            addr: None,
            settle: temperature::SETTLE_DELAY,
            timeout: Some(DEFAULT_TIMEOUT),
            initialize: false,
        }
    }

    /// Sets the device name. Defaults to the type name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the bus address.
    pub fn with_addr(mut self, addr: SevenBitAddress) -> Self {
        self.addr = Some(addr);
        self
    }

    /// Sets the pause following writes that need the hardware to settle.
    ///
    /// The temperature resolution takes 345 ms on the board.
    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Sets the limit for a single bus transfer. Defaults to [`DEFAULT_TIMEOUT`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Lets bus transfers take as long as they need.
    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Write the default operating values when building.
    pub fn with_initialization(mut self, initialize: bool) -> Self {
        self.initialize = initialize;
        self
    }

    /// Creates the device and its registers without touching the bus.
    pub fn create<I, D>(self, bus: SharedBus<I>, delay: D) -> Result<Device<I, D>, ConfigError> {
        let mut dev = Device {
            name: self
                .name
                .unwrap_or_else(|| self.kind.type_name().to_owned()),
            kind: self.kind,
            bus,
            addr: self.addr.unwrap_or(self.kind.default_addr()),
            delay,
            settle: self.settle,
            timeout: self.timeout,
            registers: BTreeMap::new(),
            update_time: 0,
        };
        match self.kind {
            DeviceKind::Fake => {
                dev.create_register("FakeRegister0", "FakeRegister", 0)?;
                dev.create_register("FakeRegister1", "FakeRegister", 1)?;
            }
            DeviceKind::Temperature => temperature::create_registers(&mut dev)?,
            DeviceKind::Mc2sa => mc2sa::create_registers(&mut dev)?,
        }
        log::info!(
            "{}: {} at 0x{:02x} with {} registers",
            dev.name,
            dev.kind,
            dev.addr,
            dev.registers.len()
        );
        Ok(dev)
    }

    /// Creates the device and, if requested, writes its default operating values.
    pub fn build<I: I2c, D: DelayNs>(
        self,
        bus: SharedBus<I>,
        delay: D,
    ) -> RegisterResult<Device<I, D>, I::Error> {
        let initialize = self.initialize;
        let mut dev = self.create(bus, delay)?;
        if initialize {
            dev.initialize()?;
        }
        Ok(dev)
    }
}

/// Creates devices from their type name.
pub struct DeviceFactory;

impl DeviceFactory {
    /// Create a device from one of the names listed by [`list`](DeviceFactory::list).
    pub fn new_device<I, D>(
        type_name: &str,
        bus: SharedBus<I>,
        delay: D,
    ) -> Result<Device<I, D>, ConfigError> {
        match type_name.parse::<DeviceKind>() {
            Ok(kind) => DeviceBuilder::new(kind).create(bus, delay),
            Err(e) => {
                log::error!(
                    "device type \"{}\" is unknown, should be one of: {}",
                    type_name,
                    Self::list()
                );
                Err(e)
            }
        }
    }

    /// Known type names.
    pub fn list() -> String {
        DeviceKind::ALL
            .iter()
            .map(DeviceKind::type_name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// One chip on an I2C bus and its named registers.
///
/// Every [`get`](Device::get) and [`set`](Device::set) that reaches a
/// register counts as one update, whether the transfer succeeded or not.
pub struct Device<I, D> {
    name: String,
    kind: DeviceKind,
    bus: SharedBus<I>,
    addr: SevenBitAddress,
    delay: D,
    settle: Duration,
    timeout: Option<Duration>,
    registers: BTreeMap<String, Register>,
    update_time: u64,
}

impl<I, D> Device<I, D> {
    /// Device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device kind.
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Bus address.
    pub fn addr(&self) -> SevenBitAddress {
        self.addr
    }

    /// Pause following writes that need the hardware to settle.
    pub fn settle_delay(&self) -> Duration {
        self.settle
    }

    /// Number of get/set operations that reached a register.
    pub fn update_time(&self) -> u64 {
        self.update_time
    }

    /// Bus the device talks on.
    pub fn bus(&self) -> &SharedBus<I> {
        &self.bus
    }

    /// Limit for a single bus transfer.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Limit for a single bus transfer, `None` to wait indefinitely.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Create a register through the [`RegisterFactory`] and bind it under `name`.
    pub fn create_register(
        &mut self,
        name: &str,
        type_name: &str,
        id: u8,
    ) -> Result<&mut Register, ConfigError> {
        if self.registers.contains_key(name) {
            log::error!("{}: register \"{}\" defined twice", self.name, name);
            return Err(ConfigError::DuplicateRegister {
                device: self.name.clone(),
                register: name.into(),
            });
        }
        let register = RegisterFactory::create(type_name)?
            .with_name(name)
            .with_id(id);
        Ok(self.registers.entry(name.into()).or_insert(register))
    }

    /// Register bound under `name`.
    pub fn register(&self, name: &str) -> Result<&Register, LookupError> {
        self.registers.get(name).ok_or_else(|| self.unknown(name))
    }

    /// Register names and type names, in name order.
    pub fn register_list(&self) -> impl Iterator<Item = (&str, &'static str)> {
        self.registers
            .iter()
            .map(|(name, reg)| (name.as_str(), reg.type_name()))
    }

    /// Soft value of a register.
    pub fn get_cached(&self, name: &str) -> Result<i32, LookupError> {
        self.register(name).map(Register::get)
    }

    fn unknown(&self, name: &str) -> LookupError {
        LookupError::UnknownRegister {
            device: self.name.clone(),
            register: name.into(),
        }
    }
}

impl<I: I2c, D: DelayNs> Device<I, D> {
    /// Read a register from the bus.
    pub fn get(&mut self, name: &str) -> RegisterResult<i32, I::Error> {
        self.transact(name, |reg, link, _| reg.read(link))
    }

    /// Write a register to the bus.
    ///
    /// A value too wide for the register is rejected before the bus is locked.
    pub fn set(&mut self, name: &str, value: i32) -> RegisterResult<(), I::Error> {
        self.register(name)?.validate(value)?;
        self.transact(name, |reg, link, _| reg.write(link, value))
    }

    /// Update the soft value of a register without touching the bus.
    pub fn set_cached(&mut self, name: &str, value: i32) -> RegisterResult<(), I::Error> {
        match self.registers.get_mut(name) {
            Some(register) => Ok(register.set(value)?),
            None => Err(self.unknown(name).into()),
        }
    }

    /// Write a typed value to its register.
    pub fn write_typed<C: RegisterCodec>(&mut self, value: &C) -> RegisterResult<(), I::Error> {
        self.set(C::REGISTER, value.encode())
    }

    /// Read a typed value from its register.
    pub fn read_typed<C: RegisterCodec>(&mut self) -> RegisterResult<C, I::Error> {
        let raw = self.get(C::REGISTER)?;
        Ok(C::decode(raw)?)
    }

    /// Typed value from the soft value of its register.
    pub fn cached_typed<C: RegisterCodec>(&self) -> RegisterResult<C, I::Error> {
        let raw = self.get_cached(C::REGISTER)?;
        Ok(C::decode(raw)?)
    }

    /// Write the default operating values of the device.
    pub fn initialize(&mut self) -> RegisterResult<(), I::Error> {
        log::debug!("{}: writing default operating values", self.name);
        match self.kind {
            DeviceKind::Fake => Ok(()),
            DeviceKind::Temperature => self.set_resolution(temperature::Resolution::default()),
            DeviceKind::Mc2sa => self.apply_mc2sa(&mc2sa::Mc2saSettings::default()),
        }
    }

    /// Write a register, then hold the bus for the settle delay.
    pub(crate) fn set_settled(&mut self, name: &str, value: i32) -> RegisterResult<(), I::Error> {
        self.register(name)?.validate(value)?;
        let settle = self.settle;
        self.transact(name, |reg, link, delay| {
            reg.write(link, value)?;
            log::debug!("{}: settling for {:?}", link.device(), settle);
            delay.delay_ms(u32::try_from(settle.as_millis()).unwrap_or(u32::MAX));
            delay.delay_us(settle.subsec_micros() % 1000);
            Ok(())
        })
    }

    /// Run `f` on one register with the bus locked.
    fn transact<R>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Register, &mut I2cLink<'_, I>, &mut D) -> RegisterResult<R, I::Error>,
    ) -> RegisterResult<R, I::Error> {
        let Device {
            name: device,
            bus,
            addr,
            delay,
            timeout,
            registers,
            update_time,
            ..
        } = self;
        let register = registers
            .get_mut(name)
            .ok_or_else(|| LookupError::UnknownRegister {
                device: device.clone(),
                register: name.into(),
            })?;
        let mut i2c = bus.lock();
        let mut link = I2cLink::new(&mut *i2c, *addr, device.as_str()).with_timeout(*timeout);
        let result = f(register, &mut link, delay);
        *update_time += 1;
        result
    }
}

impl<I, D> Drop for Device<I, D> {
    fn drop(&mut self) {
        if self.bus.handles() == 1 {
            log::debug!("{}: closing bus", self.name);
        }
    }
}

impl<I, D> fmt::Debug for Device<I, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("addr", &self.addr)
            .field("registers", &self.registers)
            .field("update_time", &self.update_time)
            .finish()
    }
}
