use abe_hal::{RtcPi, SquareWave};
use chrono::NaiveDateTime;
use clap::{Parser, value_parser};
use embedded_hal::i2c::I2c;

use crate::util;

#[derive(Debug, Parser)]
#[command(flatten_help = true)]
pub(crate) enum RtcPiCommand {
    /// Print the date and time held by the clock.
    Read,
    /// Set the clock.
    Set {
        /// Date and time as YYYY-MM-DDTHH:MM:SS, between 2000 and 2099.
        ///
        /// The local time of the Raspberry Pi is used if omitted.
        #[arg(value_parser = util::parse_datetime)]
        datetime: Option<NaiveDateTime>,
    },
    /// Output a square wave on the SQW pin.
    SquareWave {
        /// 1 = 1Hz, 2 = 4.096kHz, 3 = 8.192kHz, 4 = 32.768kHz.
        #[arg(value_parser = value_parser!(u8).range(1..=4))]
        frequency: u8,
    },
    /// Stop the square wave output.
    Off,
}

pub(crate) fn action<I2C>(i2c: I2C, command: RtcPiCommand) -> anyhow::Result<()>
where
    I2C: I2c,
    I2C::Error: Send + Sync + 'static,
{
    let mut rtc = RtcPi::new();
    rtc.connect(i2c);
    run(&mut rtc, command)
}

/// Run `command` against a connected RTC Pi or Expander Pi clock.
pub(crate) fn run<I2C>(rtc: &mut RtcPi<I2C>, command: RtcPiCommand) -> anyhow::Result<()>
where
    I2C: I2c,
    I2C::Error: Send + Sync + 'static,
{
    match command {
        RtcPiCommand::Read => println!("{}", rtc.read_date()?),
        RtcPiCommand::Set { datetime } => {
            let datetime = datetime.unwrap_or_else(|| chrono::Local::now().naive_local());
            rtc.set_date(datetime)?;
            println!("Clock set to {datetime}");
        }
        RtcPiCommand::SquareWave { frequency } => {
            rtc.set_frequency(SquareWave::try_from(frequency)?)?;
            rtc.enable_output()?;
        }
        RtcPiCommand::Off => rtc.disable_output()?,
    }
    Ok(())
}
