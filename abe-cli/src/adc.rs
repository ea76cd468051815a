use abe_hal::{AdcPi, ConversionMode, Gain, Resolution};
use anyhow::Context;
use clap::value_parser;
use embedded_hal::i2c::I2c;

use crate::util;

#[derive(Debug, clap::Args)]
pub(crate) struct AdcPiCommand {
    /// Address of the chip for channels 1-4, in hexadecimal
    #[arg(long, default_value = "0x68", value_parser = util::u8_from_hex)]
    address1: u8,
    /// Address of the chip for channels 5-8, in hexadecimal
    #[arg(long, default_value = "0x69", value_parser = util::u8_from_hex)]
    address2: u8,
    /// Sample resolution in bits: 12, 14, 16 or 18.
    ///
    /// Lower resolutions convert faster.
    #[arg(short, long, default_value_t = 18)]
    resolution: u8,
    /// PGA gain: 1, 2, 4 or 8.
    #[arg(short, long, default_value_t = 1)]
    gain: u8,
    /// Start a conversion for each read instead of converting continuously.
    #[arg(long)]
    one_shot: bool,
    /// Print the raw conversion value instead of a voltage.
    #[arg(long)]
    raw: bool,
    /// Status reads to wait for each conversion before giving up.
    #[arg(long, default_value_t = abe_hal::adc_pi::DEFAULT_POLL_LIMIT)]
    poll_limit: u32,
    /// Channels to read, 1-8. All channels are read if none are given.
    #[arg(value_parser = value_parser!(u8).range(1..=8))]
    channels: Vec<u8>,
}

pub(crate) fn action<I2C>(i2c: I2C, command: AdcPiCommand) -> anyhow::Result<()>
where
    I2C: I2c,
    I2C::Error: Send + Sync + 'static,
{
    let resolution = Resolution::try_from(command.resolution)?;
    let gain = Gain::try_from(command.gain)?;

    let mut adc = AdcPi::new(command.address1, command.address2);
    adc.set_poll_limit(command.poll_limit);
    adc.connect(i2c).with_context(|| {
        format!(
            "Could not set up the ADC Pi at {:#04X} and {:#04X}",
            command.address1, command.address2
        )
    })?;
    adc.set_resolution(resolution)?;
    adc.set_gain(gain)?;
    if command.one_shot {
        adc.set_conversion_mode(ConversionMode::OneShot)?;
    }

    let channels = if command.channels.is_empty() {
        (1..=8).collect()
    } else {
        command.channels
    };
    for channel in channels {
        if command.raw {
            let conversion = adc.read_conversion(channel)?;
            let sign = if conversion.negative { "-" } else { "" };
            println!("{channel}: {sign}{}", conversion.raw);
        } else {
            println!("{channel}: {:.6}V", adc.read_voltage(channel)?);
        }
    }
    Ok(())
}
