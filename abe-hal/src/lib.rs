#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod adc_dac_pi;
pub mod adc_pi;
pub mod bits;
mod connection;
pub mod dac;
mod error;
pub mod expander_pi;
pub mod io_pi;
pub mod rtc_pi;
pub mod sar_adc;
pub mod servo_pi;

pub use adc_dac_pi::AdcDacPi;
pub use adc_pi::{AdcPi, ConversionMode, ConversionResult, Gain, Resolution};
pub use dac::{Dac, DacChannel, DacGain, DacModel};
pub use error::{Error, InvalidArgument};
pub use expander_pi::{ExpanderPi, ExpanderPiBuses};
pub use io_pi::{IoPi, Port};
pub use rtc_pi::{RtcPi, SquareWave};
pub use sar_adc::{InputMode, SarAdc, SarAdcModel};
pub use servo_pi::{NoOutputEnable, ServoPi};
