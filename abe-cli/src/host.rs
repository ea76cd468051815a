//! Raspberry Pi buses and pins, opened with rppal.
use anyhow::Context;
use rppal::gpio::{Gpio, OutputPin};
use rppal::i2c::I2c;
use rppal::spi::{Bus, Mode, SimpleHalSpiDevice, SlaveSelect, Spi};

/// SPI device on SPI0 with the given chip select line.
pub(crate) type SpiDevice = SimpleHalSpiDevice<Spi>;

/// Open I2C bus `bus` (1 on every current Raspberry Pi).
pub(crate) fn i2c(bus: u8) -> anyhow::Result<I2c> {
    I2c::with_bus(bus).with_context(|| format!("Could not open I2C bus {bus}"))
}

/// Open SPI0 with chip select CE0 or CE1 in mode 0.
pub(crate) fn spi(chip_select: SlaveSelect, clock_hz: u32) -> anyhow::Result<SpiDevice> {
    let spi = Spi::new(Bus::Spi0, chip_select, clock_hz, Mode::Mode0)
        .with_context(|| format!("Could not open SPI0 {chip_select:?} at {clock_hz}Hz"))?;
    Ok(SimpleHalSpiDevice::new(spi))
}

/// Claim BCM GPIO `pin` as an output, initially high.
///
/// The pin keeps its level when the program exits.
pub(crate) fn output_pin(pin: u8) -> anyhow::Result<OutputPin> {
    let gpio = Gpio::new().context("Could not open the GPIO peripheral")?;
    let mut pin = gpio
        .get(pin)
        .with_context(|| format!("Could not claim GPIO {pin}"))?
        .into_output_high();
    pin.set_reset_on_drop(false);
    Ok(pin)
}
