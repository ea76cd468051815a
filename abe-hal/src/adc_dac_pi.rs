//! ADC DAC Pi: a two-channel MCP3202 ADC on CE0 and an MCP4822 DAC on CE1.
//!
//! The ADC is referenced to the Raspberry Pi's 3.3V rail, and the DAC's gain
//! select bit is fixed at x1 on this board, so outputs are limited to 2.048V.
use log::debug;

use crate::dac::{Dac, DacModel};
use crate::sar_adc::{SarAdc, SarAdcModel};

/// Driver for the ADC DAC Pi.
///
/// ```rust,ignore
/// let mut board = AdcDacPi::new();
/// board.connect(ce0, ce1);
/// board.adc_mut().set_reference_voltage(3.28)?;
/// let volts = board.adc_mut().read_voltage(1, InputMode::SingleEnded)?;
/// ```
#[derive(Debug)]
pub struct AdcDacPi<SPI> {
    adc: SarAdc<SPI>,
    dac: Dac<SPI>,
}

impl<SPI> AdcDacPi<SPI> {
    /// Create an unconnected driver.
    pub fn new() -> Self {
        Self {
            adc: SarAdc::new(SarAdcModel::Mcp3202),
            dac: Dac::new(DacModel::FixedGain),
        }
    }

    /// Hand the ADC and DAC their SPI devices.
    pub fn connect(&mut self, adc: SPI, dac: SPI) {
        self.adc.connect(adc);
        self.dac.connect(dac);
        debug!("ADC DAC Pi connected");
    }

    /// Whether both parts hold their SPI device.
    pub fn is_connected(&self) -> bool {
        self.adc.is_connected() && self.dac.is_connected()
    }

    /// Release the SPI devices of the ADC and DAC, in that order.
    pub fn disconnect(&mut self) -> (Option<SPI>, Option<SPI>) {
        (self.adc.disconnect(), self.dac.disconnect())
    }

    /// The MCP3202 ADC.
    pub fn adc(&self) -> &SarAdc<SPI> {
        &self.adc
    }

    /// The MCP3202 ADC.
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
}

impl<SPI> Default for AdcDacPi<SPI> {
    fn default() -> Self {
        Self::new()
    }
}
