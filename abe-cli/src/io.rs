use abe_hal::{IoPi, Port};
use anyhow::Context;
use clap::{Parser, ValueEnum, value_parser};
use embedded_hal::i2c::I2c;

use crate::util;

#[derive(Debug, clap::Args)]
pub(crate) struct IoPiCommand {
    /// Chip address in hexadecimal (0x20 or 0x21 on the IO Pi Plus)
    #[arg(short, long, default_value = "0x20", value_parser = util::u8_from_hex)]
    address: u8,
    #[command(subcommand)]
    command: IoCommand,
}

// Connecting resets the chip to all inputs with pull-ups off, so the write
// commands make their pins outputs first.
#[derive(Debug, Parser)]
#[command(flatten_help = true)]
pub(crate) enum IoCommand {
    /// Read one pin.
    ReadPin {
        /// Pin number, 1-16.
        #[arg(value_parser = value_parser!(u8).range(1..=16))]
        pin: u8,
        /// Enable the pin's pull-up before reading.
        #[arg(short, long)]
        pullup: bool,
    },
    /// Read all 8 pins of a port.
    ReadPort {
        /// Port number: 0 for pins 1-8, 1 for pins 9-16.
        #[arg(value_parser = value_parser!(u8).range(0..=1))]
        port: u8,
        /// Pull-ups to enable before reading, in hexadecimal.
        #[arg(short, long, default_value = "0x00", value_parser = util::u8_from_hex)]
        pullups: u8,
        /// Input inversion, in hexadecimal.
        #[arg(short, long, default_value = "0x00", value_parser = util::u8_from_hex)]
        invert: u8,
    },
    /// Make a pin an output and drive it.
    WritePin {
        /// Pin number, 1-16.
        #[arg(value_parser = value_parser!(u8).range(1..=16))]
        pin: u8,
        level: Level,
    },
    /// Make all 8 pins of a port outputs and drive them.
    WritePort {
        /// Port number: 0 for pins 1-8, 1 for pins 9-16.
        #[arg(value_parser = value_parser!(u8).range(0..=1))]
        port: u8,
        /// Output levels in hexadecimal, pin 1 (or 9) in the lowest bit.
        #[arg(value_parser = util::u8_from_hex)]
        value: u8,
    },
    /// Enable interrupts on a port and show which pins have triggered.
    Interrupts {
        /// Port number: 0 for pins 1-8, 1 for pins 9-16.
        #[arg(value_parser = value_parser!(u8).range(0..=1))]
        port: u8,
        /// Pins to enable interrupt-on-change for, in hexadecimal.
        #[arg(short, long, default_value = "0xFF", value_parser = util::u8_from_hex)]
        enable: u8,
        /// Clear pending interrupts after reading them.
        #[arg(short, long)]
        reset: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum Level {
    /// Drive the pin to 5V.
    High,
    /// Drive the pin to 0V.
    Low,
}

pub(crate) fn action<I2C>(i2c: I2C, command: IoPiCommand) -> anyhow::Result<()>
where
    I2C: I2c,
    I2C::Error: Send + Sync + 'static,
{
    let mut io = IoPi::new(command.address);
    io.connect(i2c)
        .with_context(|| format!("Could not set up the IO Pi at {:#04X}", command.address))?;
    run(&mut io, command.command)
}

/// Run `command` against a connected IO Pi or Expander Pi expander.
pub(crate) fn run<I2C>(io: &mut IoPi<I2C>, command: IoCommand) -> anyhow::Result<()>
where
    I2C: I2c,
    I2C::Error: Send + Sync + 'static,
{
    match command {
        IoCommand::ReadPin { pin, pullup } => {
            if pullup {
                io.set_pin_pullup(pin, true)?;
            }
            let high = io.read_pin(pin)?;
            println!("Pin {pin}: {}", if high { "high" } else { "low" });
        }
        IoCommand::ReadPort {
            port,
            pullups,
            invert,
        } => {
            let port = Port::try_from(port)?;
            io.set_port_pullups(port, pullups)?;
            io.invert_port(port, invert)?;
            println!("Port {port:?}: {}", util::port_bits(io.read_port(port)?));
        }
        IoCommand::WritePin { pin, level } => {
            io.set_pin_direction(pin, false)?;
            io.write_pin(pin, matches!(level, Level::High))?;
        }
        IoCommand::WritePort { port, value } => {
            let port = Port::try_from(port)?;
            io.set_port_direction(port, 0x00)?;
            io.write_port(port, value)?;
        }
        IoCommand::Interrupts {
            port,
            enable,
            reset,
        } => {
            let port = Port::try_from(port)?;
            io.set_interrupt_on_port(port, enable)?;
            let status = io.read_interrupt_status(port)?;
            let capture = io.read_interrupt_capture(port)?;
            println!("Port {port:?} interrupt flags: {}", util::port_bits(status));
            println!(
                "Port {port:?} captured value:  {}",
                util::port_bits(capture)
            );
            if reset {
                io.reset_interrupts()?;
            }
        }
    }
    Ok(())
}
