//! ADC Pi: eight analog inputs from two MCP3424 delta-sigma converters.
//!
//! Channels 1-4 are read from the first chip (U1, default address 0x68) and
//! channels 5-8 from the second (U2, default address 0x69). Both chips are
//! configured identically; the driver keeps one copy of each chip's configuration
//! byte, since the MCP3424 has a single write-only configuration register.
//!
//! ## Configuration byte
//!
//! | Bit | Meaning                                                    |
//! |-----|------------------------------------------------------------|
//! | 7   | Ready flag (read) / initiate one-shot conversion (write)   |
//! | 6-5 | Channel select                                             |
//! | 4   | Conversion mode (1 = continuous, 0 = one-shot)             |
//! | 3-2 | Resolution (00 = 12 bit, 01 = 14, 10 = 16, 11 = 18)        |
//! | 1-0 | PGA gain (00 = x1, 01 = x2, 10 = x4, 11 = x8)              |
use embedded_hal::i2c::I2c;
use log::{debug, trace, warn};

use crate::bits::{bit_is_set, with_bit, with_field};
use crate::connection::Connection;
use crate::error::{Error, InvalidArgument};

/// I2C address of the chip for channels 1-4 with the address jumpers unfitted.
pub const DEFAULT_ADDRESS_1: u8 = 0x68;
/// I2C address of the chip for channels 5-8 with the address jumpers unfitted.
pub const DEFAULT_ADDRESS_2: u8 = 0x69;
/// Status reads made while waiting for a conversion before giving up.
pub const DEFAULT_POLL_LIMIT: u32 = 1000;

/// Power-on configuration: PGA x1, 18 bit, continuous conversion, channel 1.
const DEFAULT_CONFIG: u8 = 0x9C;
/// Scale factor of the input voltage divider on the ADC Pi.
const BOARD_SCALE: f64 = 2.471;

const READY_BIT: usize = 7;
const CHANNEL_BITS: std::ops::Range<usize> = 5..7;
const MODE_BIT: usize = 4;
const RESOLUTION_BITS: std::ops::Range<usize> = 2..4;
const GAIN_BITS: std::ops::Range<usize> = 0..2;

/// Programmable gain amplifier setting.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Gain {
    /// x1 (power-on default).
    #[default]
    X1,
    /// x2
    X2,
    /// x4
    X4,
    /// x8
    X8,
}

impl Gain {
    fn bits(self) -> u8 {
        match self {
            Gain::X1 => 0b00,
            Gain::X2 => 0b01,
            Gain::X4 => 0b10,
            Gain::X8 => 0b11,
        }
    }

    /// Divisor applied to the LSB size when converting to volts.
    ///
    /// The input stage of the board halves the signal, so x1 gain maps to 0.5.
    pub fn pga_multiplier(self) -> f64 {
        match self {
            Gain::X1 => 0.5,
            Gain::X2 => 1.0,
            Gain::X4 => 2.0,
            Gain::X8 => 4.0,
        }
    }
}

impl TryFrom<u8> for Gain {
    type Error = InvalidArgument;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::X1),
            2 => Ok(Self::X2),
            4 => Ok(Self::X4),
            8 => Ok(Self::X8),
            _ => Err(InvalidArgument("gain must be 1, 2, 4 or 8")),
        }
    }
}

/// Sample resolution, trading precision for speed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// 12 bit, up to 240 samples per second.
    Bits12,
    /// 14 bit, up to 60 samples per second.
    Bits14,
    /// 16 bit, up to 15 samples per second.
    Bits16,
    /// 18 bit, up to 3.75 samples per second (power-on default).
    #[default]
    Bits18,
}

impl Resolution {
    fn bits(self) -> u8 {
        match self {
            Resolution::Bits12 => 0b00,
            Resolution::Bits14 => 0b01,
            Resolution::Bits16 => 0b10,
            Resolution::Bits18 => 0b11,
        }
    }

    /// Size of one least-significant bit in volts.
    pub fn lsb(self) -> f64 {
        match self {
            Resolution::Bits12 => 0.0005,
            Resolution::Bits14 => 0.000125,
            Resolution::Bits16 => 0.00003125,
            Resolution::Bits18 => 0.0000078125,
        }
    }

    /// Position of the sign bit in the combined conversion word.
    fn sign_bit(self) -> usize {
        match self {
            Resolution::Bits12 => 11,
            Resolution::Bits14 => 13,
            Resolution::Bits16 => 15,
            Resolution::Bits18 => 17,
        }
    }

    /// Bytes returned by a read: the data bytes followed by the status byte.
    fn read_length(self) -> usize {
        match self {
            Resolution::Bits18 => 4,
            _ => 3,
        }
    }

    /// Combine the data bytes of a read into the conversion word.
    fn combine(self, data: &[u8]) -> i32 {
        let [h, m] = [data[0] as i32, data[1] as i32];
        match self {
            Resolution::Bits18 => ((h & 0x03) << 16) | (m << 8) | data[2] as i32,
            Resolution::Bits16 => (h << 8) | m,
            Resolution::Bits14 => ((h & 0x3F) << 8) | m,
            Resolution::Bits12 => ((h & 0x0F) << 8) | m,
        }
    }
}

impl TryFrom<u8> for Resolution {
    type Error = InvalidArgument;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            12 => Ok(Self::Bits12),
            14 => Ok(Self::Bits14),
            16 => Ok(Self::Bits16),
            18 => Ok(Self::Bits18),
            _ => Err(InvalidArgument("resolution must be 12, 14, 16 or 18 bits")),
        }
    }
}

/// When the ADC performs conversions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ConversionMode {
    /// A conversion is started by each read, then the chip idles.
    OneShot,
    /// The chip converts continuously (power-on default).
    #[default]
    Continuous,
}

/// Result of a single conversion.
///
/// `raw` is the magnitude with the sign bit cleared. It is _not_ negated when
/// `negative` is set, so a reading below zero is only reported by the flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionResult {
    /// Conversion word with the sign bit cleared.
    pub raw: i32,
    /// Whether the sign bit was set in the conversion word.
    pub negative: bool,
}

/// Per-chip state.
#[derive(Debug)]
struct Chip {
    address: u8,
    /// Last configuration byte written (or the power-on default).
    config: u8,
    /// Channel encoded in `config`, if it has been written since connecting.
    channel: Option<u8>,
}

impl Chip {
    const fn new(address: u8) -> Self {
        Self {
            address,
            config: DEFAULT_CONFIG,
            channel: None,
        }
    }
}

/// Driver for the ADC Pi.
///
/// Create the driver with [`AdcPi::new`], then hand it the I2C bus with
/// [`AdcPi::connect`], which writes the initial configuration to both chips.
///
/// ```rust,ignore
/// let mut adc = AdcPi::new(DEFAULT_ADDRESS_1, DEFAULT_ADDRESS_2);
/// adc.connect(i2c)?;
/// adc.set_resolution(Resolution::Bits16)?;
/// let volts = adc.read_voltage(1)?;
/// ```
#[derive(Debug)]
pub struct AdcPi<I2C> {
    connection: Connection<I2C>,
    chips: [Chip; 2],
    resolution: Resolution,
    gain: Gain,
    mode: ConversionMode,
    poll_limit: u32,
}

impl<I2C> AdcPi<I2C> {
    /// Create an unconnected driver for the chips at the given addresses.
    pub const fn new(address_1: u8, address_2: u8) -> Self {
        Self {
            connection: Connection::new(),
            chips: [Chip::new(address_1), Chip::new(address_2)],
            resolution: Resolution::Bits18,
            gain: Gain::X1,
            mode: ConversionMode::Continuous,
            poll_limit: DEFAULT_POLL_LIMIT,
        }
    }

    /// Whether the driver holds a bus handle.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Release the bus handle.
    ///
    /// Returns `None` if the driver was not connected.
    pub fn disconnect(&mut self) -> Option<I2C> {
        let bus = self.connection.release();
        if bus.is_some() {
            debug!("ADC Pi disconnected");
        }
        bus
    }

    /// Addresses of the chips for channels 1-4 and 5-8.
    pub fn addresses(&self) -> (u8, u8) {
        (self.chips[0].address, self.chips[1].address)
    }

    /// Change the chip addresses.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyConnected`] if the driver holds a bus handle.
    pub fn set_addresses<E>(&mut self, address_1: u8, address_2: u8) -> Result<(), Error<E>> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }
        for (chip, address) in self.chips.iter_mut().zip([address_1, address_2]) {
            chip.address = address;
            chip.channel = None;
        }
        Ok(())
    }

    /// Current sample resolution.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Current PGA gain.
    pub fn gain(&self) -> Gain {
        self.gain
    }

    /// Current conversion mode.
    pub fn conversion_mode(&self) -> ConversionMode {
        self.mode
    }

    /// Size of one LSB in volts at the current resolution.
    pub fn lsb(&self) -> f64 {
        self.resolution.lsb()
    }

    /// Maximum number of reads made while waiting for a conversion.
    pub fn poll_limit(&self) -> u32 {
        self.poll_limit
    }

    /// Set the maximum number of reads made while waiting for a conversion.
    ///
    /// At least one read is always made, so zero behaves as one.
    pub fn set_poll_limit(&mut self, limit: u32) {
        self.poll_limit = limit;
    }
}

impl<I2C: I2c> AdcPi<I2C> {
    /// Take the I2C bus and write the current configuration to both chips.
    ///
    /// A handle already held is dropped and replaced. If the configuration cannot
    /// be written the handle is dropped and the driver stays disconnected.
    pub fn connect(&mut self, bus: I2C) -> Result<(), Error<I2C::Error>> {
        self.connection.acquire(bus);
        for chip in &mut self.chips {
            chip.channel = None;
        }
        if let Err(e) = self.set_resolution(self.resolution) {
            self.connection.release();
            return Err(e);
        }
        let (address_1, address_2) = self.addresses();
        debug!("ADC Pi connected at {address_1:#04X} and {address_2:#04X}");
        Ok(())
    }

    /// Point the appropriate chip at `channel` (1-8).
    ///
    /// The configuration byte is only written when the channel differs from the
    /// one last written to that chip.
    pub fn select_channel(&mut self, channel: u8) -> Result<(), Error<I2C::Error>> {
        let bus = self.connection.bus()?;
        let chip = &mut self.chips[chip_index(channel)?];
        if chip.channel == Some(channel) {
            return Ok(());
        }
        let config = with_field(chip.config, CHANNEL_BITS, (channel - 1) % 4);
        bus.write(chip.address, &[config]).map_err(Error::Bus)?;
        trace!("ADC chip {:#04X} config {config:#04X}", chip.address);
        chip.config = config;
        chip.channel = Some(channel);
        Ok(())
    }

    /// Read the conversion word from `channel` (1-8).
    ///
    /// In one-shot mode this starts a conversion first. The status byte is then
    /// polled until the ready bit clears, up to the poll limit.
    ///
    /// # Errors
    ///
    /// [`Error::ConversionTimeout`] if no conversion completed within the limit.
    pub fn read_conversion(&mut self, channel: u8) -> Result<ConversionResult, Error<I2C::Error>> {
        self.select_channel(channel)?;
        let resolution = self.resolution;
        let poll_limit = self.poll_limit.max(1);
        let one_shot = self.mode == ConversionMode::OneShot;
        let bus = self.connection.bus()?;
        let chip = &mut self.chips[chip_index(channel)?];

        if one_shot {
            let initiate = with_bit(chip.config, READY_BIT, true);
            bus.write(chip.address, &[initiate]).map_err(Error::Bus)?;
            // The chip clears the bit itself once the conversion starts.
            chip.config = with_bit(chip.config, READY_BIT, false);
        }

        let length = resolution.read_length();
        let mut buffer = [0u8; 4];
        let mut polls = 0;
        loop {
            bus.read(chip.address, &mut buffer[..length])
                .map_err(Error::Bus)?;
            polls += 1;
            if !bit_is_set(buffer[length - 1], READY_BIT) {
                break;
            }
            if polls >= poll_limit {
                warn!(
                    "ADC chip {:#04X} not ready after {polls} polls",
                    chip.address
                );
                return Err(Error::ConversionTimeout { polls });
            }
        }
        trace!("ADC channel {channel} ready after {polls} polls: {buffer:02X?}");

        let word = resolution.combine(&buffer);
        let negative = bit_is_set(word, resolution.sign_bit());
        let raw = if negative {
            with_bit(word, resolution.sign_bit(), false)
        } else {
            word
        };
        Ok(ConversionResult { raw, negative })
    }

    /// Read the raw value from `channel` (1-8).
    ///
    /// The sign bit is stripped from the value; use [`AdcPi::read_conversion`] to
    /// see whether it was set.
    pub fn read_raw(&mut self, channel: u8) -> Result<i32, Error<I2C::Error>> {
        self.read_conversion(channel).map(|c| c.raw)
    }

    /// Read the voltage on `channel` (1-8).
    ///
    /// Negative readings are reported as 0.0 V.
    pub fn read_voltage(&mut self, channel: u8) -> Result<f64, Error<I2C::Error>> {
        let conversion = self.read_conversion(channel)?;
        if conversion.negative {
            return Ok(0.0);
        }
        let volts_per_count = self.resolution.lsb() / self.gain.pga_multiplier();
        Ok(conversion.raw as f64 * volts_per_count * BOARD_SCALE)
    }

    /// Set the PGA gain on both chips.
    pub fn set_gain(&mut self, gain: Gain) -> Result<(), Error<I2C::Error>> {
        self.write_configs(|config| with_field(config, GAIN_BITS, gain.bits()))?;
        self.gain = gain;
        debug!("ADC Pi gain {gain:?}");
        Ok(())
    }

    /// Set the sample resolution on both chips.
    pub fn set_resolution(&mut self, resolution: Resolution) -> Result<(), Error<I2C::Error>> {
        self.write_configs(|config| with_field(config, RESOLUTION_BITS, resolution.bits()))?;
        self.resolution = resolution;
        debug!("ADC Pi resolution {resolution:?}");
        Ok(())
    }

    /// Set one-shot or continuous conversion on both chips.
    pub fn set_conversion_mode(&mut self, mode: ConversionMode) -> Result<(), Error<I2C::Error>> {
        let continuous = mode == ConversionMode::Continuous;
        self.write_configs(|config| with_bit(config, MODE_BIT, continuous))?;
        self.mode = mode;
        debug!("ADC Pi conversion mode {mode:?}");
        Ok(())
    }

    /// Apply `change` to each chip's configuration byte and write it.
    ///
    /// Each chip's copy is updated only once its write has succeeded.
    fn write_configs(&mut self, change: impl Fn(u8) -> u8) -> Result<(), Error<I2C::Error>> {
        let bus = self.connection.bus()?;
        for chip in &mut self.chips {
            let config = change(chip.config);
            bus.write(chip.address, &[config]).map_err(Error::Bus)?;
            chip.config = config;
        }
        Ok(())
    }
}

/// Index of the chip serving `channel`.
fn chip_index(channel: u8) -> Result<usize, InvalidArgument> {
    match channel {
        1..=4 => Ok(0),
        5..=8 => Ok(1),
        _ => Err(InvalidArgument("ADC Pi channel must be 1-8")),
    }
}
