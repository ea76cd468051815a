//! 12-bit successive-approximation ADCs on the SPI bus.
//!
//! The Expander Pi carries an eight-channel MCP3208 with a 4.096V on-board
//! reference, and the ADC DAC Pi a two-channel MCP3202 referenced to the
//! Raspberry Pi's 3.3V supply. Both return a 12-bit result in the last one and a
//! half bytes of a three-byte full-duplex transfer.
use embedded_hal::spi::SpiDevice;
use log::{debug, trace};

use crate::connection::Connection;
use crate::error::{Error, InvalidArgument};

/// Which converter is fitted, determining command layout and reference range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SarAdcModel {
    /// MCP3202: two channels, single-ended only, external reference up to 7V.
    Mcp3202,
    /// MCP3208: eight channels, single-ended or differential, reference up to 5V.
    Mcp3208,
}

impl SarAdcModel {
    /// Number of input channels.
    pub fn channels(self) -> u8 {
        match self {
            SarAdcModel::Mcp3202 => 2,
            SarAdcModel::Mcp3208 => 8,
        }
    }

    /// Reference voltage assumed until [`SarAdc::set_reference_voltage`] is called.
    pub fn default_reference(self) -> f64 {
        match self {
            SarAdcModel::Mcp3202 => 3.3,
            SarAdcModel::Mcp3208 => 4.096,
        }
    }

    /// Highest reference voltage accepted.
    pub fn max_reference(self) -> f64 {
        match self {
            SarAdcModel::Mcp3202 => 7.0,
            SarAdcModel::Mcp3208 => 5.0,
        }
    }

    /// Build the three-byte command for a conversion of `channel` (1-based).
    fn command(self, channel: u8, mode: InputMode) -> Result<[u8; 3], InvalidArgument> {
        if !(1..=self.channels()).contains(&channel) {
            return Err(match self {
                SarAdcModel::Mcp3202 => InvalidArgument("ADC channel must be 1 or 2"),
                SarAdcModel::Mcp3208 => InvalidArgument("ADC channel must be 1-8"),
            });
        }
        let index = channel - 1;
        match (self, mode) {
            (SarAdcModel::Mcp3202, InputMode::SingleEnded) => Ok([0x01, (2 + index) << 6, 0x00]),
            (SarAdcModel::Mcp3202, InputMode::Differential) => Err(InvalidArgument(
                "differential input is not supported by the ADC DAC Pi",
            )),
            (SarAdcModel::Mcp3208, mode) => {
                // Start bit, then single/differential, then the top channel bit.
                let base = match mode {
                    InputMode::SingleEnded => 6,
                    InputMode::Differential => 4,
                };
                Ok([base + (index >> 2), (index & 0b11) << 6, 0x00])
            }
        }
    }
}

/// How the selected input is measured.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Measured against ground.
    #[default]
    SingleEnded,
    /// Measured against the paired channel (1/2, 3/4, 5/6, 7/8).
    Differential,
}

/// Driver for an MCP3202 or MCP3208 on its own SPI chip select.
#[derive(Debug)]
pub struct SarAdc<SPI> {
    connection: Connection<SPI>,
    model: SarAdcModel,
    reference_voltage: f64,
}

impl<SPI> SarAdc<SPI> {
    /// Create an unconnected driver using the model's default reference voltage.
    pub fn new(model: SarAdcModel) -> Self {
        Self {
            connection: Connection::new(),
            model,
            reference_voltage: model.default_reference(),
        }
    }

    /// Take the SPI device.
    ///
    /// The converters need no initialisation, so no transfer is made.
    pub fn connect(&mut self, spi: SPI) {
        self.connection.acquire(spi);
        debug!("{:?} connected", self.model);
    }

    /// Whether the driver holds an SPI device.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Release the SPI device, if held.
    pub fn disconnect(&mut self) -> Option<SPI> {
        self.connection.release()
    }

    /// The fitted converter.
    pub fn model(&self) -> SarAdcModel {
        self.model
    }

    /// Reference voltage used to scale readings.
    pub fn reference_voltage(&self) -> f64 {
        self.reference_voltage
    }

    /// Set the reference voltage used to scale readings.
    ///
    /// Measuring the actual reference (for the ADC DAC Pi, the Raspberry Pi's 3.3V
    /// rail) and setting it here improves accuracy.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`] if disconnected, and [`Error::InvalidArgument`] if
    /// the voltage is outside 0V to 5V (MCP3208) or 0V to 7V (MCP3202).
    pub fn set_reference_voltage<E>(&mut self, voltage: f64) -> Result<(), Error<E>> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        if !(0.0..=self.model.max_reference()).contains(&voltage) {
            return Err(match self.model {
                SarAdcModel::Mcp3202 => {
                    Error::InvalidArgument("reference voltage must be between 0.0V and 7.0V")
                }
                SarAdcModel::Mcp3208 => {
                    Error::InvalidArgument("reference voltage must be between 0.0V and 5.0V")
                }
            });
        }
        self.reference_voltage = voltage;
        Ok(())
    }
}

impl<SPI: SpiDevice> SarAdc<SPI> {
    /// Read the 12-bit conversion result from `channel` (1-based).
    pub fn read_raw(&mut self, channel: u8, mode: InputMode) -> Result<i16, Error<SPI::Error>> {
        let spi = self.connection.bus()?;
        let command = self.model.command(channel, mode)?;
        let mut response = [0u8; 3];
        spi.transfer(&mut response, &command).map_err(Error::Bus)?;
        trace!("{:?} {command:02X?} -> {response:02X?}", self.model);
        Ok((((response[1] & 0x0F) as i16) << 8) + response[2] as i16)
    }

    /// Read the voltage on `channel` (1-based), scaled by the reference voltage.
    pub fn read_voltage(&mut self, channel: u8, mode: InputMode) -> Result<f64, Error<SPI::Error>> {
        let raw = self.read_raw(channel, mode)?;
        Ok(raw as f64 * self.reference_voltage / 4096.0)
    }
}
