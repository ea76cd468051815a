use std::cell::RefCell;

use abe_hal::{AdcDacPi, DacChannel, DacGain, ExpanderPi, InputMode};
use anyhow::Context;
use clap::{Parser, value_parser};
use embedded_hal::spi::ErrorType;
use embedded_hal_bus::i2c::RefCellDevice;
use rppal::spi::SlaveSelect;

use crate::host::{self, SpiDevice};
use crate::io::{self, IoCommand};
use crate::rtc::{self, RtcPiCommand};

type SpiError = <SpiDevice as ErrorType>::Error;

/// SPI clock of the MCP3208 on the Expander Pi.
const EXPANDER_ADC_CLOCK: u32 = 1_900_000;
/// SPI clock of the MCP4822 on both boards.
const DAC_CLOCK: u32 = 2_000_000;
/// SPI clock of the MCP3202 on the ADC DAC Pi, within its limit at 3.3V.
const ADC_DAC_PI_ADC_CLOCK: u32 = 1_000_000;

#[derive(Debug, Parser)]
#[command(flatten_help = true)]
pub(crate) enum ExpanderPiCommand {
    /// Read one channel of the 8-channel ADC.
    Adc {
        /// Channel, 1-8.
        #[arg(value_parser = value_parser!(u8).range(1..=8))]
        channel: u8,
        /// Read the channel as the positive input of a differential pair.
        #[arg(short, long)]
        differential: bool,
        /// Print the 12-bit code instead of a voltage.
        #[arg(long)]
        raw: bool,
        /// Reference voltage if the on-board 4.096V reference is not used.
        #[arg(long)]
        vref: Option<f64>,
    },
    /// Set the voltage of one DAC output.
    Dac {
        /// Channel, 1 or 2.
        #[arg(value_parser = value_parser!(u8).range(1..=2))]
        channel: u8,
        /// Output voltage, 0-2.048V at gain 1 or 0-4.096V at gain 2.
        voltage: f64,
        /// Output gain, 1 or 2.
        #[arg(short, long, default_value_t = 1, value_parser = value_parser!(u8).range(1..=2))]
        gain: u8,
    },
    /// Use the IO expander.
    #[command(subcommand)]
    Io(IoCommand),
    /// Use the real-time clock.
    #[command(subcommand)]
    Rtc(RtcPiCommand),
}

#[derive(Debug, Parser)]
#[command(flatten_help = true)]
pub(crate) enum AdcDacPiCommand {
    /// Read one channel of the 2-channel ADC.
    Adc {
        /// Channel, 1 or 2.
        #[arg(value_parser = value_parser!(u8).range(1..=2))]
        channel: u8,
        /// Print the 12-bit code instead of a voltage.
        #[arg(long)]
        raw: bool,
        /// Measured 3.3V supply, for more accurate voltages.
        #[arg(long)]
        vref: Option<f64>,
    },
    /// Set the voltage of one DAC output, 0-2.048V.
    Dac {
        /// Channel, 1 or 2.
        #[arg(value_parser = value_parser!(u8).range(1..=2))]
        channel: u8,
        voltage: f64,
    },
}

pub(crate) fn expander_action(i2c_bus: u8, command: ExpanderPiCommand) -> anyhow::Result<()> {
    let adc = host::spi(SlaveSelect::Ss0, EXPANDER_ADC_CLOCK)?;
    let dac = host::spi(SlaveSelect::Ss1, DAC_CLOCK)?;
    // The IO expander and the clock sit on the same I2C bus.
    let i2c = RefCell::new(host::i2c(i2c_bus)?);

    let mut expander = ExpanderPi::new();
    expander
        .connect(adc, dac, RefCellDevice::new(&i2c), RefCellDevice::new(&i2c))
        .context("Could not set up the Expander Pi")?;

    match command {
        ExpanderPiCommand::Adc {
            channel,
            differential,
            raw,
            vref,
        } => {
            let adc = expander.adc_mut();
            if let Some(vref) = vref {
                adc.set_reference_voltage::<SpiError>(vref)?;
            }
            let mode = if differential {
                InputMode::Differential
            } else {
                InputMode::SingleEnded
            };
            if raw {
                println!("{}", adc.read_raw(channel, mode)?);
            } else {
                println!("{:.4}V", adc.read_voltage(channel, mode)?);
            }
        }
        ExpanderPiCommand::Dac {
            channel,
            voltage,
            gain,
        } => {
            expander.dac_mut().set_voltage(
                DacChannel::try_from(channel)?,
                voltage,
                DacGain::try_from(gain)?,
            )?;
        }
        ExpanderPiCommand::Io(command) => io::run(expander.io_mut(), command)?,
        ExpanderPiCommand::Rtc(command) => rtc::run(expander.rtc_mut(), command)?,
    }
    Ok(())
}

pub(crate) fn adc_dac_action(command: AdcDacPiCommand) -> anyhow::Result<()> {
    let mut board = AdcDacPi::new();
    board.connect(
        host::spi(SlaveSelect::Ss0, ADC_DAC_PI_ADC_CLOCK)?,
        host::spi(SlaveSelect::Ss1, DAC_CLOCK)?,
    );

    match command {
        AdcDacPiCommand::Adc { channel, raw, vref } => {
            let adc = board.adc_mut();
            if let Some(vref) = vref {
                adc.set_reference_voltage::<SpiError>(vref)?;
            }
            if raw {
                println!("{}", adc.read_raw(channel, InputMode::SingleEnded)?);
            } else {
                println!("{:.4}V", adc.read_voltage(channel, InputMode::SingleEnded)?);
            }
        }
        AdcDacPiCommand::Dac { channel, voltage } => {
            board
                .dac_mut()
                .set_voltage(DacChannel::try_from(channel)?, voltage, DacGain::X1)?;
        }
    }
    Ok(())
}
