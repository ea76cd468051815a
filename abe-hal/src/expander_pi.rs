//! Expander Pi: ADC, DAC, I/O expander and real-time clock on one board.
//!
//! | Part               | Chip    | Bus                 |
//! |--------------------|---------|---------------------|
//! | 8-channel ADC      | MCP3208 | SPI, CE0            |
//! | 2-channel DAC      | MCP4822 | SPI, CE1            |
//! | 16 I/O pins        | MCP23017| I2C, address 0x20   |
//! | Real-time clock    | DS1307  | I2C, address 0x68   |
//!
//! Each part is the standalone driver for that chip, reached through
//! [`ExpanderPi::adc_mut`] and friends.
use embedded_hal::i2c::I2c;
use embedded_hal::spi::SpiDevice;
use log::debug;

use crate::dac::{Dac, DacModel};
use crate::error::Error;
use crate::io_pi::{self, IoPi};
use crate::rtc_pi::RtcPi;
use crate::sar_adc::{SarAdc, SarAdcModel};

/// Bus handles given back by [`ExpanderPi::disconnect`].
///
/// A field is `None` if that part was already disconnected.
#[derive(Debug)]
pub struct ExpanderPiBuses<SPI, I2C> {
    /// SPI device of the ADC (CE0).
    pub adc: Option<SPI>,
    /// SPI device of the DAC (CE1).
    pub dac: Option<SPI>,
    /// I2C handle of the I/O expander.
    pub io: Option<I2C>,
    /// I2C handle of the real-time clock.
    pub rtc: Option<I2C>,
}

/// Driver for the Expander Pi.
///
/// The two SPI devices share a type, as do the two I2C handles; on a Raspberry
/// Pi the I2C handles are usually two `embedded_hal_bus` devices sharing one
/// bus.
///
/// ```rust,ignore
/// let mut board = ExpanderPi::new();
/// board.connect(adc_spi, dac_spi, io_i2c, rtc_i2c)?;
/// let volts = board.adc_mut().read_voltage(1, InputMode::SingleEnded)?;
/// board.dac_mut().set_voltage(DacChannel::One, 1.5, DacGain::X1)?;
/// ```
#[derive(Debug)]
pub struct ExpanderPi<SPI, I2C> {
    adc: SarAdc<SPI>,
    dac: Dac<SPI>,
    io: IoPi<I2C>,
    rtc: RtcPi<I2C>,
}

impl<SPI, I2C> ExpanderPi<SPI, I2C> {
    /// Create an unconnected driver.
    pub fn new() -> Self {
        Self {
            adc: SarAdc::new(SarAdcModel::Mcp3208),
            dac: Dac::new(DacModel::SelectableGain),
            io: IoPi::new(io_pi::DEFAULT_ADDRESS_1),
            rtc: RtcPi::new(),
        }
    }

    /// Whether every part holds its bus handle.
    pub fn is_connected(&self) -> bool {
        self.adc.is_connected()
            && self.dac.is_connected()
            && self.io.is_connected()
            && self.rtc.is_connected()
    }

    /// Release the bus handles of every part.
    pub fn disconnect(&mut self) -> ExpanderPiBuses<SPI, I2C> {
        debug!("Expander Pi disconnected");
        ExpanderPiBuses {
            adc: self.adc.disconnect(),
            dac: self.dac.disconnect(),
            io: self.io.disconnect(),
            rtc: self.rtc.disconnect(),
        }
    }

    /// The MCP3208 ADC.
    pub fn adc(&self) -> &SarAdc<SPI> {
        &self.adc
    }

    /// The MCP3208 ADC.
    pub fn adc_mut(&mut self) -> &mut SarAdc<SPI> {
        &mut self.adc
    }

    /// The MCP4822 DAC.
    pub fn dac(&self) -> &Dac<SPI> {
        &self.dac
    }

    /// The MCP4822 DAC.
    pub fn dac_mut(&mut self) -> &mut Dac<SPI> {
        &mut self.dac
    }

    /// The MCP23017 I/O expander.
    pub fn io(&self) -> &IoPi<I2C> {
        &self.io
    }

    /// The MCP23017 I/O expander.
    pub fn io_mut(&mut self) -> &mut IoPi<I2C> {
        &mut self.io
    }

    /// The DS1307 real-time clock.
    pub fn rtc(&self) -> &RtcPi<I2C> {
        &self.rtc
    }

    /// The DS1307 real-time clock.
    pub fn rtc_mut(&mut self) -> &mut RtcPi<I2C> {
        &mut self.rtc
    }
}

impl<SPI, I2C> Default for ExpanderPi<SPI, I2C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<SPI: SpiDevice, I2C: I2c> ExpanderPi<SPI, I2C> {
    /// Hand every part its bus handle and initialise the I/O expander.
    ///
    /// Either all four parts end up connected or none do: if the I/O expander
    /// cannot be initialised the other handles are dropped as well.
    pub fn connect(
        &mut self,
        adc: SPI,
        dac: SPI,
        io: I2C,
        rtc: I2C,
    ) -> Result<(), Error<I2C::Error>> {
        self.adc.connect(adc);
        self.dac.connect(dac);
        self.rtc.connect(rtc);
        if let Err(e) = self.io.connect(io) {
            self.adc.disconnect();
            self.dac.disconnect();
            self.rtc.disconnect();
            return Err(e);
        }
        debug!("Expander Pi connected");
        Ok(())
    }
}
