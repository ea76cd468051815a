use crate::adc::AdcPiCommand;
use crate::expander::{AdcDacPiCommand, ExpanderPiCommand};
use crate::io::IoPiCommand;
use crate::rtc::RtcPiCommand;
use crate::servo::ServoPiCommand;

use clap::Parser;

/// CLI for AB Electronics UK Raspberry Pi expansion boards
///
/// Drives the ADC Pi, ADC DAC Pi, Expander Pi, IO Pi, RTC Pi and Servo Pi from
/// the I2C, SPI and GPIO peripherals of the Raspberry Pi the board is fitted to.
///
/// Each board has its own subcommand. Board addresses default to the addresses
/// with no jumpers fitted and can be changed with the board's options, given in
/// hexadecimal.
///
/// Set RUST_LOG (or pass -v, -vv) to see the register traffic.
#[derive(Debug, Parser)]
#[command(version, about)]
pub(crate) struct Cli {
    /// I2C bus number
    #[arg(short = 'b', long = "i2c-bus", default_value_t = 1)]
    pub(crate) i2c_bus: u8,
    /// Increase log output (debug, then trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub(crate) verbose: u8,
    #[command(subcommand)]
    pub(crate) command: Commands,
}

impl Cli {
    /// Log level implied by the -v flags.
    pub(crate) fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Parser)]
pub(crate) enum Commands {
    /// Read the 8 analog inputs of an ADC Pi.
    AdcPi(AdcPiCommand),
    /// Read the ADC or set the DAC of an ADC DAC Pi.
    #[command(subcommand)]
    AdcDacPi(AdcDacPiCommand),
    /// Use the ADC, DAC, IO or RTC of an Expander Pi.
    #[command(subcommand)]
    ExpanderPi(ExpanderPiCommand),
    /// Read and write the 16 pins of one IO Pi chip.
    IoPi(IoPiCommand),
    /// Read or set the RTC Pi clock.
    #[command(subcommand)]
    RtcPi(RtcPiCommand),
    /// Set the PWM outputs of a Servo Pi.
    ServoPi(ServoPiCommand),
}
