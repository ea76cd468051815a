use abe_hal::ServoPi;
use anyhow::Context;
use clap::{Parser, value_parser};
use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;

use crate::{host, util};

#[derive(Debug, clap::Args)]
pub(crate) struct ServoPiCommand {
    /// Board address in hexadecimal
    #[arg(short, long, default_value = "0x40", value_parser = util::u8_from_hex)]
    address: u8,
    /// BCM number of the GPIO wired to the output enable (4 with the jumper fitted)
    ///
    /// Needed for the enable and disable commands. Giving it with any other
    /// command turns the outputs off.
    #[arg(long)]
    oe_pin: Option<u8>,
    #[command(subcommand)]
    command: ServoCommand,
}

#[derive(Debug, Parser)]
#[command(flatten_help = true)]
pub(crate) enum ServoCommand {
    /// Set the PWM frequency of all channels.
    Frequency {
        /// Frequency in Hz, roughly 24-1526 (50 for most servos).
        hz: u32,
    },
    /// Set when one channel turns on and off within each period.
    Pwm {
        /// Channel, 1-16.
        #[arg(value_parser = value_parser!(u8).range(1..=16))]
        channel: u8,
        /// Tick (0-4095) at which the output turns on.
        #[arg(value_parser = value_parser!(u16).range(0..=4095))]
        on: u16,
        /// Tick (0-4095) at which the output turns off.
        #[arg(value_parser = value_parser!(u16).range(0..=4095))]
        off: u16,
    },
    /// Set when every channel turns on and off within each period.
    All {
        /// Tick (0-4095) at which the outputs turn on.
        #[arg(value_parser = value_parser!(u16).range(0..=4095))]
        on: u16,
        /// Tick (0-4095) at which the outputs turn off.
        #[arg(value_parser = value_parser!(u16).range(0..=4095))]
        off: u16,
    },
    /// Turn all outputs on with the output enable pin.
    Enable,
    /// Turn all outputs off with the output enable pin.
    Disable,
}

pub(crate) fn action<I2C>(i2c: I2C, command: ServoPiCommand) -> anyhow::Result<()>
where
    I2C: I2c,
    I2C::Error: Send + Sync + 'static,
{
    match command.oe_pin {
        Some(pin) => {
            let pin = host::output_pin(pin)?;
            let mut servo = ServoPi::with_output_enable(command.address, pin);
            run(&mut servo, i2c, command.command)
        }
        None => {
            let mut servo = ServoPi::new(command.address);
            run(&mut servo, i2c, command.command)
        }
    }
}

fn run<I2C, OE>(servo: &mut ServoPi<I2C, OE>, i2c: I2C, command: ServoCommand) -> anyhow::Result<()>
where
    I2C: I2c,
    I2C::Error: Send + Sync + 'static,
    OE: OutputPin,
{
    let address = servo.address();
    servo
        .connect(i2c)
        .with_context(|| format!("Could not set up the Servo Pi at {address:#04X}"))?;
    match command {
        ServoCommand::Frequency { hz } => servo.set_frequency(hz)?,
        ServoCommand::Pwm { channel, on, off } => servo.set_pwm(channel, on, off)?,
        ServoCommand::All { on, off } => servo.set_all_pwm(on, off)?,
        ServoCommand::Enable => servo
            .output_enable()
            .context("Pass --oe-pin to use the output enable")?,
        ServoCommand::Disable => servo
            .output_disable()
            .context("Pass --oe-pin to use the output enable")?,
    }
    Ok(())
}
