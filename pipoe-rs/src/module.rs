use crate::{Device, DeviceBuilder, DeviceKind, Mc2saSettings, Resolution};
use core::fmt;
use embedded_hal::{delay::DelayNs, i2c::I2c};
use embedded_register::{ConfigError, LookupError, RegisterResult, SharedBus, ValidationError};
use std::{collections::BTreeMap, time::Duration};

/// Named devices sharing one bus.
pub struct Module<I, D> {
    name: String,
    bus: SharedBus<I>,
    delay: D,
    devices: BTreeMap<String, Device<I, D>>,
}

impl<I, D: Clone> Module<I, D> {
    /// Creates an empty module on `bus`. Each device gets a clone of `delay`.
    pub fn new(name: impl Into<String>, bus: SharedBus<I>, delay: D) -> Self {
        Module {
            name: name.into(),
            bus,
            delay,
            devices: BTreeMap::new(),
        }
    }

    /// Module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create a device of a factory type and add it under `name`.
    pub fn create_device(
        &mut self,
        name: &str,
        type_name: &str,
    ) -> Result<&mut Device<I, D>, ConfigError> {
        self.check_free(name)?;
        let kind = type_name.parse::<DeviceKind>().inspect_err(|_| {
            log::error!("{}: device type \"{}\" is unknown", self.name, type_name)
        })?;
        let device = DeviceBuilder::new(kind)
            .with_name(name)
            .create(self.bus.clone(), self.delay.clone())?;
        Ok(self.devices.entry(name.into()).or_insert(device))
    }

    /// Add a device built elsewhere, e.g. with a custom address.
    pub fn add_device(&mut self, device: Device<I, D>) -> Result<&mut Device<I, D>, ConfigError> {
        self.check_free(device.name())?;
        Ok(self.devices.entry(device.name().into()).or_insert(device))
    }

    /// Device added under `name`.
    pub fn device(&self, name: &str) -> Result<&Device<I, D>, LookupError> {
        self.devices.get(name).ok_or_else(|| self.unknown(name))
    }

    /// Device added under `name`.
    pub fn device_mut(&mut self, name: &str) -> Result<&mut Device<I, D>, LookupError> {
        match self.devices.get_mut(name) {
            Some(device) => Ok(device),
            None => Err(LookupError::UnknownDevice {
                module: self.name.clone(),
                device: name.into(),
            }),
        }
    }

    /// Device names and type names, in name order.
    pub fn device_list(&self) -> impl Iterator<Item = (&str, &'static str)> {
        self.devices
            .iter()
            .map(|(name, dev)| (name.as_str(), dev.kind().type_name()))
    }

    /// Devices, in name order.
    pub fn devices_mut(&mut self) -> impl Iterator<Item = &mut Device<I, D>> {
        self.devices.values_mut()
    }

    /// Transfer limit of every device.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.devices_mut().for_each(|dev| dev.set_timeout(timeout));
    }

    fn check_free(&self, name: &str) -> Result<(), ConfigError> {
        if self.devices.contains_key(name) {
            log::error!("{}: device \"{}\" defined twice", self.name, name);
            return Err(ConfigError::DuplicateDevice {
                module: self.name.clone(),
                device: name.into(),
            });
        }
        Ok(())
    }

    fn unknown(&self, name: &str) -> LookupError {
        LookupError::UnknownDevice {
            module: self.name.clone(),
            device: name.into(),
        }
    }
}

impl<I: I2c, D: DelayNs + Clone> Module<I, D> {
    /// Write the default operating values of every device.
    pub fn initialize(&mut self) -> RegisterResult<(), I::Error> {
        self.devices_mut().try_for_each(Device::initialize)
    }

    /// Apply one request: MC2SA registers first, temperature resolution last.
    ///
    /// Every named device is looked up before the first write.
    pub fn apply(&mut self, setup: &Setup) -> RegisterResult<(), I::Error> {
        for name in setup.devices() {
            self.device(name)?;
        }
        if let Some((name, settings)) = &setup.mc2sa {
            self.device_mut(name)?.apply_mc2sa(settings)?;
        }
        if let Some((name, resolution)) = &setup.resolution {
            self.device_mut(name)?.set_resolution(*resolution)?;
        }
        Ok(())
    }
}

/// Tree of devices and registers.
impl<I, D> fmt::Display for Module<I, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        for (name, dev) in &self.devices {
            writeln!(f, "  {} => {}", name, dev.kind())?;
            for (reg, type_name) in dev.register_list() {
                writeln!(f, "    {} => {}", reg, type_name)?;
            }
        }
        Ok(())
    }
}

/// Settings submitted together, applied by [`Module::apply`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Setup {
    mc2sa: Option<(String, Mc2saSettings)>,
    resolution: Option<(String, Resolution)>,
}

impl Setup {
    /// Nothing to apply.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write every register of the MC2SA device `device`.
    pub fn with_mc2sa(mut self, device: impl Into<String>, settings: Mc2saSettings) -> Self {
        self.mc2sa = Some((device.into(), settings));
        self
    }

    /// Set the resolution of the temperature device `device`.
    pub fn with_resolution(mut self, device: impl Into<String>, resolution: Resolution) -> Self {
        self.resolution = Some((device.into(), resolution));
        self
    }

    /// Set the resolution of the temperature device `device`, in °C.
    pub fn with_celsius_resolution(
        self,
        device: impl Into<String>,
        celsius: f32,
    ) -> Result<Self, ValidationError> {
        Ok(self.with_resolution(device, Resolution::try_from(celsius)?))
    }

    fn devices(&self) -> impl Iterator<Item = &str> {
        let mc2sa = self.mc2sa.iter().map(|(name, _)| name.as_str());
        let resolution = self.resolution.iter().map(|(name, _)| name.as_str());
        mc2sa.chain(resolution)
    }
}

/// Creates modules from their type name.
pub struct ModuleFactory;

impl ModuleFactory {
    /// Every module type name.
    pub const NAMES: [&'static str; 2] = ["Fake", "PiPoE"];

    /// Create a module from one of the [`NAMES`](ModuleFactory::NAMES).
    ///
    /// `Fake` holds two fake devices; `PiPoE` holds the temperature sensor and
    /// the MC2SA front-end of the board.
    pub fn new_module<I, D: Clone>(
        type_name: &str,
        bus: SharedBus<I>,
        delay: D,
    ) -> Result<Module<I, D>, ConfigError> {
        let devices: &[(&str, &str)] = match type_name {
            "Fake" => &[("FakeDeviceA", "FakeDevice"), ("FakeDeviceB", "FakeDevice")],
            "PiPoE" => &[
                ("TemperatureDeviceA", "TemperatureDevice"),
                ("MC2SADeviceA", "MC2SADevice"),
            ],
            _ => {
                log::error!(
                    "module type \"{}\" is unknown, should be one of: {}",
                    type_name,
                    Self::list()
                );
                return Err(ConfigError::UnknownModuleType(type_name.into()));
            }
        };
        let mut module = Module::new(type_name, bus, delay);
        for (name, device_type) in devices {
            module.create_device(name, device_type)?;
        }
        Ok(module)
    }

    /// Known type names.
    pub fn list() -> String {
        Self::NAMES.join(", ")
    }
}
