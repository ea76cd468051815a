//! Two-channel 12-bit MCP4822 digital to analog converter on the SPI bus.
//!
//! Each write is a two-byte frame, most significant byte first:
//!
//! | Bit  | Meaning                                   |
//! |------|-------------------------------------------|
//! | 15   | Channel (0 = A / channel 1, 1 = B / 2)    |
//! | 14   | Unused                                    |
//! | 13   | Gain select (1 = x1, 0 = x2)              |
//! | 12   | Output enabled (1 = active)               |
//! | 11-0 | Output code                               |
//!
//! The internal reference is 2.048V, so the full-scale output is 2.048V at x1
//! gain and 4.096V at x2.
use embedded_hal::spi::SpiDevice;
use log::{debug, trace};

use crate::bits::with_bit;
use crate::connection::Connection;
use crate::error::{Error, InvalidArgument};

/// Internal reference of the MCP4822.
const REFERENCE_VOLTAGE: f64 = 2.048;
const MAX_CODE: u16 = 4095;

const CHANNEL_BIT: usize = 7;
const GAIN_BIT: usize = 5;
const ACTIVE_BIT: usize = 4;

/// How the board wires up the gain select bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DacModel {
    /// ADC DAC Pi: the gain select bit is always set, so output is x1 only.
    FixedGain,
    /// Expander Pi: x1 or x2 gain chosen per write.
    SelectableGain,
}

impl DacModel {
    /// High byte of the frame, before the top nibble of the output code is added.
    fn command(self, channel: DacChannel, gain: DacGain) -> Result<u8, InvalidArgument> {
        let x1 = match (self, gain) {
            (DacModel::FixedGain, DacGain::X1) => true,
            (DacModel::FixedGain, DacGain::X2) => {
                return Err(InvalidArgument("the ADC DAC Pi only supports x1 gain"));
            }
            (DacModel::SelectableGain, gain) => gain == DacGain::X1,
        };
        let command = with_bit(0u8, CHANNEL_BIT, channel == DacChannel::Two);
        let command = with_bit(command, GAIN_BIT, x1);
        Ok(with_bit(command, ACTIVE_BIT, true))
    }
}

/// DAC output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DacChannel {
    /// Channel 1 (DAC A).
    One,
    /// Channel 2 (DAC B).
    Two,
}

impl TryFrom<u8> for DacChannel {
    type Error = InvalidArgument;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            _ => Err(InvalidArgument("DAC channel must be 1 or 2")),
        }
    }
}

/// Output amplifier gain.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DacGain {
    /// x1, full scale 2.048V.
    #[default]
    X1,
    /// x2, full scale 4.096V.
    X2,
}

impl DacGain {
    fn factor(self) -> f64 {
        match self {
            DacGain::X1 => 1.0,
            DacGain::X2 => 2.0,
        }
    }

    /// Highest output voltage at this gain.
    pub fn max_voltage(self) -> f64 {
        REFERENCE_VOLTAGE * self.factor()
    }
}

impl TryFrom<u8> for DacGain {
    type Error = InvalidArgument;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::X1),
            2 => Ok(Self::X2),
            _ => Err(InvalidArgument("DAC gain must be 1 or 2")),
        }
    }
}

/// Build the two-byte frame for an output code.
fn frame(
    model: DacModel,
    channel: DacChannel,
    value: u16,
    gain: DacGain,
) -> Result<[u8; 2], InvalidArgument> {
    if value > MAX_CODE {
        return Err(InvalidArgument("DAC value must be 0-4095"));
    }
    let [high, low] = value.to_be_bytes();
    Ok([model.command(channel, gain)? | high, low])
}

/// Output code for `voltage` at `gain`.
fn code_for_voltage(voltage: f64, gain: DacGain) -> Result<u16, InvalidArgument> {
    if !(0.0..=gain.max_voltage()).contains(&voltage) {
        return Err(match gain {
            DacGain::X1 => InvalidArgument("DAC voltage must be 0-2.048V at x1 gain"),
            DacGain::X2 => InvalidArgument("DAC voltage must be 0-4.096V at x2 gain"),
        });
    }
    let code = (voltage / REFERENCE_VOLTAGE * 4096.0 / gain.factor()).round();
    Ok(code as u16)
}

/// Driver for the MCP4822 on its own SPI chip select.
#[derive(Debug)]
pub struct Dac<SPI> {
    connection: Connection<SPI>,
    model: DacModel,
}

impl<SPI> Dac<SPI> {
    /// Create an unconnected driver.
    pub fn new(model: DacModel) -> Self {
        Self {
            connection: Connection::new(),
            model,
        }
    }

    /// Take the SPI device.
    ///
    /// The DAC needs no initialisation, so nothing is written.
    pub fn connect(&mut self, spi: SPI) {
        self.connection.acquire(spi);
        debug!("MCP4822 ({:?}) connected", self.model);
    }

    /// Whether the driver holds an SPI device.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Release the SPI device, if held.
    pub fn disconnect(&mut self) -> Option<SPI> {
        self.connection.release()
    }

    /// How the gain select bit is wired.
    pub fn model(&self) -> DacModel {
        self.model
    }
}

impl<SPI: SpiDevice> Dac<SPI> {
    /// Set the output code (0-4095) of `channel`.
    pub fn set_raw(
        &mut self,
        channel: DacChannel,
        value: u16,
        gain: DacGain,
    ) -> Result<(), Error<SPI::Error>> {
        let spi = self.connection.bus()?;
        let frame = frame(self.model, channel, value, gain)?;
        spi.write(&frame).map_err(Error::Bus)?;
        trace!("MCP4822 {channel:?} <- {frame:02X?}");
        Ok(())
    }

    /// Set the output voltage of `channel`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the voltage is negative or above the full
    /// scale for the gain, or rounds to a code above 4095 (exactly full scale).
    pub fn set_voltage(
        &mut self,
        channel: DacChannel,
        voltage: f64,
        gain: DacGain,
    ) -> Result<(), Error<SPI::Error>> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let code = code_for_voltage(voltage, gain)?;
        self.set_raw(channel, code, gain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    fn write(bytes: [u8; 2]) -> Vec<SpiTransaction<u8>> {
        vec![
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(bytes.to_vec()),
            SpiTransaction::transaction_end(),
        ]
    }

    #[test]
    fn voltage_codes() {
        assert_eq!(code_for_voltage(1.024, DacGain::X1), Ok(2048));
        assert_eq!(code_for_voltage(0.0, DacGain::X1), Ok(0));
        assert_eq!(code_for_voltage(2.048, DacGain::X2), Ok(2048));
        assert_eq!(code_for_voltage(4.0, DacGain::X2), Ok(4000));
        assert!(code_for_voltage(2.1, DacGain::X1).is_err());
        assert!(code_for_voltage(-0.1, DacGain::X2).is_err());
    }

    #[test]
    fn frames() {
        use DacChannel::*;
        use DacModel::*;
        assert_eq!(
            frame(SelectableGain, One, 2048, DacGain::X1),
            Ok([0x38, 0x00])
        );
        assert_eq!(
            frame(SelectableGain, Two, 0x0FFF, DacGain::X1),
            Ok([0xBF, 0xFF])
        );
        assert_eq!(
            frame(SelectableGain, One, 0x0123, DacGain::X2),
            Ok([0x11, 0x23])
        );
        assert_eq!(frame(FixedGain, Two, 0x0456, DacGain::X1), Ok([0xB4, 0x56]));
        assert!(frame(FixedGain, One, 1, DacGain::X2).is_err());
        assert!(frame(SelectableGain, One, 4096, DacGain::X1).is_err());
    }

    #[test]
    fn set_voltage_writes_frame() {
        let mut dac = Dac::new(DacModel::SelectableGain);
        dac.connect(SpiMock::new(&write([0x38, 0x00])));
        dac.set_voltage(DacChannel::One, 1.024, DacGain::X1).unwrap();
        dac.disconnect().unwrap().done();
    }

    #[test]
    fn full_scale_at_x1_is_rejected() {
        let mut dac = Dac::new(DacModel::SelectableGain);
        dac.connect(SpiMock::<u8>::new(&[]));
        assert!(matches!(
            dac.set_voltage(DacChannel::One, 2.048, DacGain::X1),
            Err(Error::InvalidArgument(_))
        ));
        dac.disconnect().unwrap().done();
    }

    #[test]
    fn not_connected() {
        let mut dac: Dac<SpiMock<u8>> = Dac::new(DacModel::FixedGain);
        assert!(matches!(
            dac.set_voltage(DacChannel::One, 1.0, DacGain::X1),
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            dac.set_raw(DacChannel::Two, 1, DacGain::X1),
            Err(Error::NotConnected)
        ));
    }

    #[test]
    fn channels_from_numbers() {
        assert_eq!(DacChannel::try_from(2), Ok(DacChannel::Two));
        assert!(DacChannel::try_from(0).is_err());
        assert!(DacChannel::try_from(3).is_err());
    }
}
