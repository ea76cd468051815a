use clap::Parser;

use cli::Commands;

mod adc;
mod cli;
mod expander;
mod host;
mod io;
mod rtc;
mod servo;
mod util;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    match cli.command {
        Commands::AdcPi(command) => adc::action(host::i2c(cli.i2c_bus)?, command)?,
        Commands::AdcDacPi(command) => expander::adc_dac_action(command)?,
        Commands::ExpanderPi(command) => expander::expander_action(cli.i2c_bus, command)?,
        Commands::IoPi(command) => io::action(host::i2c(cli.i2c_bus)?, command)?,
        Commands::RtcPi(command) => rtc::action(host::i2c(cli.i2c_bus)?, command)?,
        Commands::ServoPi(command) => servo::action(host::i2c(cli.i2c_bus)?, command)?,
    }
    Ok(())
}
