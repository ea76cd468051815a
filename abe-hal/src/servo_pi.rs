//! Servo Pi: 16-channel 12-bit PWM from a PCA9685.
//!
//! Each channel has a pair of 12-bit tick counts within the PWM period: the
//! output turns on at the `on` tick and off at the `off` tick. The period is set
//! with [`ServoPi::set_frequency`].
//!
//! The chip's active-low output enable is wired to a Raspberry Pi GPIO (pin 7 by
//! default, via a solder jumper). Pass that pin to
//! [`ServoPi::with_output_enable`] to switch all outputs on and off together.
use std::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};
use embedded_hal::i2c::I2c;
use log::debug;

use crate::connection::Connection;
use crate::error::{Error, InvalidArgument, pin_error};

/// I2C address with the address jumpers unfitted.
pub const DEFAULT_ADDRESS: u8 = 0x40;

const MODE1: u8 = 0x00;
const LED0_ON_L: u8 = 0x06;
const ALL_LED_ON_L: u8 = 0xFA;
const PRE_SCALE: u8 = 0xFE;

const MODE1_RESTART: u8 = 0x80;
const MODE1_SLEEP: u8 = 0x10;

/// Internal oscillator frequency.
const OSCILLATOR_HZ: f64 = 25_000_000.0;
const MAX_TICK: u16 = 4095;

/// Stand-in for the output-enable pin when it is not connected.
///
/// [`ServoPi::output_enable`] and [`ServoPi::output_disable`] return
/// [`Error::NoOutputEnablePin`] on a driver created with [`ServoPi::new`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NoOutputEnable;

impl ErrorType for NoOutputEnable {
    type Error = Infallible;
}

impl OutputPin for NoOutputEnable {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Prescale register value for a PWM frequency of `hz`.
///
/// The chip accepts 3-255, which is roughly 24Hz to 1.7kHz after rounding.
fn prescale(hz: u32) -> Option<u8> {
    if hz == 0 {
        return None;
    }
    let prescale = (OSCILLATOR_HZ / 4096.0 / hz as f64 - 1.0 + 0.5).floor();
    if (3.0..=255.0).contains(&prescale) {
        Some(prescale as u8)
    } else {
        None
    }
}

/// Driver for the Servo Pi.
///
/// ```rust,ignore
/// let mut servo = ServoPi::with_output_enable(DEFAULT_ADDRESS, oe_pin);
/// servo.connect(i2c)?;
/// servo.set_frequency(50)?;
/// servo.set_pwm(1, 0, 300)?;
/// servo.output_enable()?;
/// ```
#[derive(Debug)]
pub struct ServoPi<I2C, OE = NoOutputEnable> {
    connection: Connection<I2C>,
    address: u8,
    output_enable: Option<OE>,
}

impl<I2C> ServoPi<I2C, NoOutputEnable> {
    /// Create an unconnected driver with no output-enable pin.
    pub const fn new(address: u8) -> Self {
        Self {
            connection: Connection::new(),
            address,
            output_enable: None,
        }
    }
}

impl<I2C, OE> ServoPi<I2C, OE> {
    /// Create an unconnected driver that controls the output-enable `pin`.
    pub fn with_output_enable(address: u8, pin: OE) -> Self {
        Self {
            connection: Connection::new(),
            address,
            output_enable: Some(pin),
        }
    }

    /// Whether the driver holds a bus handle.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Release the bus handle.
    ///
    /// The output-enable pin stays with the driver, in its last state.
    pub fn disconnect(&mut self) -> Option<I2C> {
        let bus = self.connection.release();
        if bus.is_some() {
            debug!("Servo Pi {:#04X} disconnected", self.address);
        }
        bus
    }

    /// I2C address of the chip.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Change the I2C address of the chip.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyConnected`] if the driver holds a bus handle.
    pub fn set_address<E>(&mut self, address: u8) -> Result<(), Error<E>> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }
        self.address = address;
        Ok(())
    }
}

impl<I2C: I2c, OE: OutputPin> ServoPi<I2C, OE> {
    /// Take the I2C bus and reset MODE1.
    ///
    /// If an output-enable pin is configured it is driven high, so the outputs
    /// stay off until [`ServoPi::output_enable`] is called. If either step fails
    /// the handle is dropped and the driver stays disconnected.
    pub fn connect(&mut self, bus: I2C) -> Result<(), Error<I2C::Error>> {
        self.connection.acquire(bus);
        let result = self.write(MODE1, 0x00).and_then(|()| match &mut self.output_enable {
            Some(pin) => pin.set_high().map_err(pin_error),
            None => Ok(()),
        });
        if let Err(e) = result {
            self.connection.release();
            return Err(e);
        }
        debug!("Servo Pi connected at {:#04X}", self.address);
        Ok(())
    }

    /// Set the PWM frequency of all channels.
    ///
    /// The chip is put to sleep while the prescaler is written, then restored
    /// and restarted.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the prescale for the frequency is outside
    /// 3-255 (below 24Hz or above about 1.7kHz).
    pub fn set_frequency(&mut self, hz: u32) -> Result<(), Error<I2C::Error>> {
        self.connection.bus()?;
        let prescale = prescale(hz)
            .ok_or(InvalidArgument("PWM frequency gives a prescale outside 3-255"))?;
        let mode = self.read(MODE1)?;
        self.write(MODE1, (mode & 0x7F) | MODE1_SLEEP)?;
        self.write(PRE_SCALE, prescale)?;
        self.write(MODE1, mode)?;
        self.write(MODE1, mode | MODE1_RESTART)?;
        debug!("Servo Pi frequency {hz}Hz (prescale {prescale})");
        Ok(())
    }

    /// Set the on and off ticks (0-4095) of `channel` (1-16).
    pub fn set_pwm(&mut self, channel: u8, on: u16, off: u16) -> Result<(), Error<I2C::Error>> {
        self.connection.bus()?;
        if !(1..=16).contains(&channel) {
            return Err(Error::InvalidArgument("Servo Pi channel must be 1-16"));
        }
        self.write_ticks(LED0_ON_L + 4 * (channel - 1), on, off)
    }

    /// Set the on and off ticks (0-4095) of every channel at once.
    pub fn set_all_pwm(&mut self, on: u16, off: u16) -> Result<(), Error<I2C::Error>> {
        self.connection.bus()?;
        self.write_ticks(ALL_LED_ON_L, on, off)
    }

    /// Turn all outputs on by driving the output-enable pin low.
    pub fn output_enable(&mut self) -> Result<(), Error<I2C::Error>> {
        match &mut self.output_enable {
            Some(pin) => pin.set_low().map_err(pin_error),
            None => Err(Error::NoOutputEnablePin),
        }
    }

    /// Turn all outputs off by driving the output-enable pin high.
    pub fn output_disable(&mut self) -> Result<(), Error<I2C::Error>> {
        match &mut self.output_enable {
            Some(pin) => pin.set_high().map_err(pin_error),
            None => Err(Error::NoOutputEnablePin),
        }
    }

    /// Write on low, on high, off low, off high starting at `register`.
    fn write_ticks(&mut self, register: u8, on: u16, off: u16) -> Result<(), Error<I2C::Error>> {
        if on > MAX_TICK || off > MAX_TICK {
            return Err(Error::InvalidArgument("PWM ticks must be 0-4095"));
        }
        let [on_low, on_high] = on.to_le_bytes();
        let [off_low, off_high] = off.to_le_bytes();
        for (offset, value) in [on_low, on_high, off_low, off_high].into_iter().enumerate() {
            self.write(register + offset as u8, value)?;
        }
        Ok(())
    }

    fn write(&mut self, register: u8, value: u8) -> Result<(), Error<I2C::Error>> {
        let address = self.address;
        let bus = self.connection.bus()?;
        bus.write(address, &[register, value]).map_err(Error::Bus)
    }

    fn read(&mut self, register: u8) -> Result<u8, Error<I2C::Error>> {
        let address = self.address;
        let bus = self.connection.bus()?;
        let mut buffer = [0u8];
        bus.write_read(address, &[register], &mut buffer)
            .map_err(Error::Bus)?;
        Ok(buffer[0])
    }
}
