use clap::Parser;
use embedded_hal::{delay::DelayNs, i2c::I2c};
use pipoe::{
    DeviceKind, Gain, Level, MemoryBus, Mc2saSettings, Module, ModuleFactory, RegisterCodec,
    Resistor, Setup, SharedBus, ValidationError, mc2sa, temperature,
};
use std::time::Duration;

/// Drive the PiPoE board: configure the MC2SA front-end and read the temperature.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// I2C bus number (opens /dev/i2c-<bus>)
    #[arg(short, long, default_value_t = 1)]
    bus: u8,
    /// Use an in-memory bus instead of hardware
    #[arg(long)]
    fake: bool,
    /// Module type (Fake or PiPoE)
    #[arg(short, long, default_value = "PiPoE")]
    module: String,
    /// Temperature resolution in °C (0.5, 0.25, 0.125 or 0.0625)
    #[arg(short, long)]
    resolution: Option<f32>,
    /// MC2SA gain capacitor bits, 1 pF first
    #[arg(long)]
    gain: Option<u8>,
    /// MC2SA resistor bits, 200 kΩ at bit 3
    #[arg(long)]
    resistor: Option<u8>,
    /// MC2SA discriminator level in volts
    #[arg(long)]
    discri: Option<f32>,
    /// MC2SA offset level in volts
    #[arg(long)]
    offset: Option<f32>,
    /// MC2SA amplitude level in volts
    #[arg(long)]
    amplitude: Option<f32>,
    /// Limit for a single bus transfer, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Keep the current register contents instead of writing the defaults first
    #[arg(long)]
    skip_init: bool,
    /// Keep reading the temperature every second
    #[arg(short, long)]
    watch: bool,
}

impl Args {
    fn mc2sa_requested(&self) -> bool {
        self.gain.is_some()
            || self.resistor.is_some()
            || self.discri.is_some()
            || self.offset.is_some()
            || self.amplitude.is_some()
    }

    fn mc2sa_settings(&self) -> Result<Mc2saSettings, ValidationError> {
        let level = |volts: Option<f32>| volts.map(Level::from_volts).unwrap_or(Ok(Level::default()));
        Ok(Mc2saSettings {
            gain: bits("gain", self.gain)?,
            resistor: bits("resistor", self.resistor)?,
            discri: level(self.discri)?,
            offset: level(self.offset)?,
            amplitude: level(self.amplitude)?,
            test_n_discri: 0,
        })
    }

    fn setup<I, D: Clone>(&self, module: &Module<I, D>) -> Result<Setup, ValidationError> {
        let mut setup = Setup::new();
        if self.mc2sa_requested() {
            match first_of(module, DeviceKind::Mc2sa) {
                Some(name) => setup = setup.with_mc2sa(name, self.mc2sa_settings()?),
                None => log::warn!("{}: no MC2SA device, settings ignored", module.name()),
            }
        }
        if let Some(resolution) = self.resolution {
            match first_of(module, DeviceKind::Temperature) {
                Some(name) => setup = setup.with_celsius_resolution(name, resolution)?,
                None => log::warn!("{}: no temperature device, resolution ignored", module.name()),
            }
        }
        Ok(setup)
    }
}

/// Decode a bit mask, warning about bits the register does not hold.
fn bits<C: RegisterCodec>(what: &str, raw: Option<u8>) -> Result<C, ValidationError> {
    let raw = raw.unwrap_or_default() as i32;
    let value = C::decode(raw)?;
    if value.encode() != raw {
        log::warn!(
            "{}: bits 0x{:02x} dropped, writing 0x{:02x}",
            what,
            raw & !value.encode(),
            value.encode()
        );
    }
    Ok(value)
}

fn first_of<I, D: Clone>(module: &Module<I, D>, kind: DeviceKind) -> Option<String> {
    module
        .device_list()
        .find(|(_, type_name)| *type_name == kind.type_name())
        .map(|(name, _)| name.to_owned())
}

/// [`linux_embedded_hal::Delay`] shared by every device of the module.
#[derive(Debug, Clone, Copy)]
struct BoardDelay;

impl DelayNs for BoardDelay {
    fn delay_ns(&mut self, ns: u32) {
        linux_embedded_hal::Delay.delay_ns(ns);
    }
}

/// Build the module, write its default operating values unless skipped, then
/// apply the requested settings.
fn prepare<I: I2c, D: DelayNs + Clone>(i2c: I, delay: D, args: &Args) -> Module<I, D> {
    let mut module = ModuleFactory::new_module(&args.module, SharedBus::new(i2c), delay)
        .expect("Failed to create module");
    if let Some(ms) = args.timeout_ms {
        module.set_timeout(Some(Duration::from_millis(ms)));
    }
    log::info!("Module layout:\n{}", module);

    if !args.skip_init {
        module.initialize().expect("Failed to write default values");
    }
    let setup = args.setup(&module).expect("Invalid settings");
    module.apply(&setup).expect("Failed to apply settings");
    module
}

fn run<I: I2c>(i2c: I, args: &Args) {
    let mut module = prepare(i2c, BoardDelay, args);

    let sensors: Vec<String> = module
        .device_list()
        .filter(|(_, type_name)| *type_name == DeviceKind::Temperature.type_name())
        .map(|(name, _)| name.to_owned())
        .collect();
    loop {
        for name in &sensors {
            let sensor = module.device_mut(name).expect("Device disappeared");
            match sensor.get_celsius() {
                Ok(celsius) => log::info!("{}: {} °C", name, celsius),
                Err(e) => log::error!("{}: {}", name, e),
            }
        }
        if !args.watch {
            break;
        }
        BoardDelay.delay_ms(1000);
    }
}

fn main() {
    // Initialize the logger
    env_logger::init();
    // Parse command line arguments
    let args = Args::parse();
    log::info!(
        "{} on {}",
        pipoe::pretty_version(),
        embedded_register::pretty_version()
    );
    if args.fake {
        // 25 °C on the sensor, MC2SA present
        let bus = MemoryBus::new()
            .with_device(mc2sa::DEFAULT_ADDR)
            .with_register(temperature::DEFAULT_ADDR, 0x05, &[0x01, 0x90]);
        run(bus, &args);
    } else {
        let path = format!("/dev/i2c-{}", args.bus);
        let i2c = linux_embedded_hal::I2cdev::new(&path).expect("Failed to open I2C bus");
        run(i2c, &args);
    }
}
