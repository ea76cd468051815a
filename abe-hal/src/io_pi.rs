//! IO Pi: 16 digital I/O pins from an MCP23017 port expander.
//!
//! Pins 1-8 are port A and pins 9-16 are port B. The driver keeps a copy of
//! each writable register so single-pin changes can be made without reading the
//! chip first. Only the GPIO registers are read back, since their inputs are
//! driven from outside.
//!
//! The IO Pi Plus carries two chips, at [`DEFAULT_ADDRESS_1`] and
//! [`DEFAULT_ADDRESS_2`]; use one driver per chip.
use embedded_hal::i2c::I2c;
use log::{debug, trace};

use crate::bits::{bit_is_set, with_bit};
use crate::connection::Connection;
use crate::error::{Error, InvalidArgument};

/// I2C address of the first chip (pins 1-16 of the IO Pi Plus bus 1).
pub const DEFAULT_ADDRESS_1: u8 = 0x20;
/// I2C address of the second chip on the IO Pi Plus.
pub const DEFAULT_ADDRESS_2: u8 = 0x21;

/// IOCON written at connect: sequential operation disabled, INT open drain.
const IOCON_DEFAULT: u8 = 0x22;
const IOCON: u8 = 0x0A;
const IOCON_MIRROR_BIT: usize = 6;
const IOCON_INTPOL_BIT: usize = 1;

const INTFA: u8 = 0x0E;
const INTCAPA: u8 = 0x10;

/// One of the two 8-pin ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    /// Pins 1-8.
    A,
    /// Pins 9-16.
    B,
}

impl Port {
    fn index(self) -> usize {
        match self {
            Port::A => 0,
            Port::B => 1,
        }
    }

    /// Address of the port B register is one above port A's.
    fn register(self, port_a: u8) -> u8 {
        port_a + self.index() as u8
    }

    /// Port and bit position of `pin` (1-16).
    fn of_pin(pin: u8) -> Result<(Port, usize), InvalidArgument> {
        match pin {
            1..=8 => Ok((Port::A, (pin - 1) as usize)),
            9..=16 => Ok((Port::B, (pin - 9) as usize)),
            _ => Err(InvalidArgument("IO Pi pin must be 1-16")),
        }
    }
}

impl TryFrom<u8> for Port {
    type Error = InvalidArgument;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::A),
            1 => Ok(Self::B),
            _ => Err(InvalidArgument("IO Pi port must be 0 or 1")),
        }
    }
}

/// Per-port registers that the driver keeps a copy of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Register {
    Direction,
    Polarity,
    InterruptEnable,
    InterruptDefault,
    InterruptControl,
    Pullup,
    Gpio,
}

impl Register {
    /// Port A address of the register.
    fn port_a(self) -> u8 {
        match self {
            Register::Direction => 0x00,
            Register::Polarity => 0x02,
            Register::InterruptEnable => 0x04,
            Register::InterruptDefault => 0x06,
            Register::InterruptControl => 0x08,
            Register::Pullup => 0x0C,
            Register::Gpio => 0x12,
        }
    }
}

/// Last values written to (or read from) one port's registers.
#[derive(Debug, Default, Clone, Copy)]
struct Shadow {
    direction: u8,
    polarity: u8,
    interrupt_enable: u8,
    interrupt_default: u8,
    interrupt_control: u8,
    pullup: u8,
    value: u8,
}

impl Shadow {
    fn get_mut(&mut self, register: Register) -> &mut u8 {
        match register {
            Register::Direction => &mut self.direction,
            Register::Polarity => &mut self.polarity,
            Register::InterruptEnable => &mut self.interrupt_enable,
            Register::InterruptDefault => &mut self.interrupt_default,
            Register::InterruptControl => &mut self.interrupt_control,
            Register::Pullup => &mut self.pullup,
            Register::Gpio => &mut self.value,
        }
    }
}

/// Driver for one MCP23017 on an IO Pi or Expander Pi.
///
/// ```rust,ignore
/// let mut io = IoPi::new(DEFAULT_ADDRESS_1);
/// io.connect(i2c)?;
/// io.set_port_direction(Port::A, 0x00)?;
/// io.write_pin(1, true)?;
/// ```
#[derive(Debug)]
pub struct IoPi<I2C> {
    connection: Connection<I2C>,
    address: u8,
    config: u8,
    ports: [Shadow; 2],
}

impl<I2C> IoPi<I2C> {
    /// Create an unconnected driver for the chip at `address`.
    pub const fn new(address: u8) -> Self {
        Self {
            connection: Connection::new(),
            address,
            config: IOCON_DEFAULT,
            ports: [Shadow {
                direction: 0xFF,
                polarity: 0,
                interrupt_enable: 0,
                interrupt_default: 0,
                interrupt_control: 0,
                pullup: 0,
                value: 0,
            }; 2],
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
            debug!("IO Pi {:#04X} disconnected", self.address);
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

impl<I2C: I2c> IoPi<I2C> {
    /// Take the I2C bus and put the chip into a known state.
    ///
    /// IOCON is written first, the current output values are read into the
    /// driver, then both ports are made inputs with pull-ups and inversion off.
    /// If any step fails the handle is dropped and the driver stays disconnected.
    pub fn connect(&mut self, bus: I2C) -> Result<(), Error<I2C::Error>> {
        self.connection.acquire(bus);
        if let Err(e) = self.initialise() {
            self.connection.release();
            return Err(e);
        }
        debug!("IO Pi connected at {:#04X}", self.address);
        Ok(())
    }

    fn initialise(&mut self) -> Result<(), Error<I2C::Error>> {
        self.ports = [Shadow::default(); 2];
        self.write(IOCON, IOCON_DEFAULT)?;
        self.config = IOCON_DEFAULT;
        for port in [Port::A, Port::B] {
            self.ports[port.index()].value = self.read(port.register(Register::Gpio.port_a()))?;
        }
        for port in [Port::A, Port::B] {
            self.write_port_register(port, Register::Direction, 0xFF)?;
        }
        for port in [Port::A, Port::B] {
            self.write_port_register(port, Register::Pullup, 0x00)?;
        }
        for port in [Port::A, Port::B] {
            self.write_port_register(port, Register::Polarity, 0x00)?;
        }
        Ok(())
    }

    /// Set `pin` (1-16) as an input (`true`) or output (`false`).
    pub fn set_pin_direction(&mut self, pin: u8, input: bool) -> Result<(), Error<I2C::Error>> {
        self.write_pin_bit(Register::Direction, pin, input)
    }

    /// Set the direction of all pins on `port`; a 1 bit is an input.
    pub fn set_port_direction(
        &mut self,
        port: Port,
        direction: u8,
    ) -> Result<(), Error<I2C::Error>> {
        self.write_port_register(port, Register::Direction, direction)
    }

    /// Enable or disable the 100k pull-up on `pin` (1-16).
    pub fn set_pin_pullup(&mut self, pin: u8, enabled: bool) -> Result<(), Error<I2C::Error>> {
        self.write_pin_bit(Register::Pullup, pin, enabled)
    }

    /// Set the pull-ups of all pins on `port`; a 1 bit enables the pull-up.
    pub fn set_port_pullups(&mut self, port: Port, pullups: u8) -> Result<(), Error<I2C::Error>> {
        self.write_port_register(port, Register::Pullup, pullups)
    }

    /// Drive output `pin` (1-16) high or low.
    pub fn write_pin(&mut self, pin: u8, high: bool) -> Result<(), Error<I2C::Error>> {
        self.write_pin_bit(Register::Gpio, pin, high)
    }

    /// Write all outputs on `port`.
    pub fn write_port(&mut self, port: Port, value: u8) -> Result<(), Error<I2C::Error>> {
        self.write_port_register(port, Register::Gpio, value)
    }

    /// Read the live state of `pin` (1-16).
    pub fn read_pin(&mut self, pin: u8) -> Result<bool, Error<I2C::Error>> {
        self.connection.bus()?;
        let (port, bit) = Port::of_pin(pin)?;
        let value = self.read_port(port)?;
        Ok(bit_is_set(value, bit))
    }

    /// Read the live state of all pins on `port`.
    pub fn read_port(&mut self, port: Port) -> Result<u8, Error<I2C::Error>> {
        let value = self.read(port.register(Register::Gpio.port_a()))?;
        self.ports[port.index()].value = value;
        Ok(value)
    }

    /// Invert the reading of input `pin` (1-16).
    pub fn invert_pin(&mut self, pin: u8, inverted: bool) -> Result<(), Error<I2C::Error>> {
        self.write_pin_bit(Register::Polarity, pin, inverted)
    }

    /// Set input inversion for all pins on `port`; a 1 bit inverts the pin.
    pub fn invert_port(&mut self, port: Port, polarity: u8) -> Result<(), Error<I2C::Error>> {
        self.write_port_register(port, Register::Polarity, polarity)
    }

    /// Tie the INTA and INTB outputs together (`true`) or run them separately.
    pub fn mirror_interrupts(&mut self, mirror: bool) -> Result<(), Error<I2C::Error>> {
        self.write_config(IOCON_MIRROR_BIT, mirror)
    }

    /// Make the interrupt outputs active high (`true`) or active low.
    pub fn set_interrupt_polarity(&mut self, active_high: bool) -> Result<(), Error<I2C::Error>> {
        self.write_config(IOCON_INTPOL_BIT, active_high)
    }

    /// Choose what each pin on `port` is compared against to raise an interrupt.
    ///
    /// A 1 bit compares against the default value set with
    /// [`IoPi::set_interrupt_defaults`]; a 0 bit compares against the pin's
    /// previous state.
    pub fn set_interrupt_type(&mut self, port: Port, value: u8) -> Result<(), Error<I2C::Error>> {
        self.write_port_register(port, Register::InterruptControl, value)
    }

    /// Set the value the pins on `port` are compared against.
    pub fn set_interrupt_defaults(
        &mut self,
        port: Port,
        value: u8,
    ) -> Result<(), Error<I2C::Error>> {
        self.write_port_register(port, Register::InterruptDefault, value)
    }

    /// Enable or disable interrupt-on-change for `pin` (1-16).
    pub fn set_interrupt_on_pin(
        &mut self,
        pin: u8,
        enabled: bool,
    ) -> Result<(), Error<I2C::Error>> {
        self.write_pin_bit(Register::InterruptEnable, pin, enabled)
    }

    /// Enable interrupts for all pins on `port`; a 1 bit enables the pin.
    pub fn set_interrupt_on_port(
        &mut self,
        port: Port,
        value: u8,
    ) -> Result<(), Error<I2C::Error>> {
        self.write_port_register(port, Register::InterruptEnable, value)
    }

    /// Read which pins on `port` raised the pending interrupt.
    pub fn read_interrupt_status(&mut self, port: Port) -> Result<u8, Error<I2C::Error>> {
        self.read(port.register(INTFA))
    }

    /// Read the state of `port` captured when the interrupt was raised.
    pub fn read_interrupt_capture(&mut self, port: Port) -> Result<u8, Error<I2C::Error>> {
        self.read(port.register(INTCAPA))
    }

    /// Clear pending interrupts on both ports by reading the capture registers.
    pub fn reset_interrupts(&mut self) -> Result<(), Error<I2C::Error>> {
        self.read_interrupt_capture(Port::A)?;
        self.read_interrupt_capture(Port::B)?;
        Ok(())
    }

    fn write_pin_bit(
        &mut self,
        register: Register,
        pin: u8,
        state: bool,
    ) -> Result<(), Error<I2C::Error>> {
        self.connection.bus()?;
        let (port, bit) = Port::of_pin(pin)?;
        let current = *self.ports[port.index()].get_mut(register);
        self.write_port_register(port, register, with_bit(current, bit, state))
    }

    fn write_port_register(
        &mut self,
        port: Port,
        register: Register,
        value: u8,
    ) -> Result<(), Error<I2C::Error>> {
        self.write(port.register(register.port_a()), value)?;
        *self.ports[port.index()].get_mut(register) = value;
        Ok(())
    }

    fn write_config(&mut self, bit: usize, state: bool) -> Result<(), Error<I2C::Error>> {
        let config = with_bit(self.config, bit, state);
        self.write(IOCON, config)?;
        self.config = config;
        Ok(())
    }

    fn write(&mut self, register: u8, value: u8) -> Result<(), Error<I2C::Error>> {
        let address = self.address;
        let bus = self.connection.bus()?;
        bus.write(address, &[register, value]).map_err(Error::Bus)?;
        trace!("IO Pi {address:#04X} [{register:#04X}] <- {value:#04X}");
        Ok(())
    }

    fn read(&mut self, register: u8) -> Result<u8, Error<I2C::Error>> {
        let address = self.address;
        let bus = self.connection.bus()?;
        let mut buffer = [0u8];
        bus.write_read(address, &[register], &mut buffer)
            .map_err(Error::Bus)?;
        trace!(
            "IO Pi {address:#04X} [{register:#04X}] -> {:#04X}",
            buffer[0]
        );
        Ok(buffer[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    const ADDRESS: u8 = DEFAULT_ADDRESS_1;

    fn write(register: u8, value: u8) -> I2cTransaction {
        I2cTransaction::write(ADDRESS, vec![register, value])
    }

    fn read(register: u8, value: u8) -> I2cTransaction {
        I2cTransaction::write_read(ADDRESS, vec![register], vec![value])
    }

    fn connect_transactions() -> Vec<I2cTransaction> {
        vec![
            write(0x0A, 0x22),
            read(0x12, 0x00),
            read(0x13, 0x00),
            write(0x00, 0xFF),
            write(0x01, 0xFF),
            write(0x0C, 0x00),
            write(0x0D, 0x00),
            write(0x02, 0x00),
            write(0x03, 0x00),
        ]
    }

    fn connected(extra: &[I2cTransaction]) -> IoPi<I2cMock> {
        let mut expectations = connect_transactions();
        expectations.extend_from_slice(extra);
        let mut io = IoPi::new(ADDRESS);
        io.connect(I2cMock::new(&expectations)).unwrap();
        io
    }

    fn finish(mut io: IoPi<I2cMock>) {
        io.disconnect().expect("Driver was connected.").done();
    }

    #[test]
    fn connect_sequence() {
        let io = connected(&[]);
        assert!(io.is_connected());
        finish(io);
    }

    #[test]
    fn connect_keeps_current_outputs() {
        let mut expectations = connect_transactions();
        expectations[1] = read(0x12, 0xA0);
        expectations.push(write(0x12, 0xA1));
        let mut io = IoPi::new(ADDRESS);
        io.connect(I2cMock::new(&expectations)).unwrap();
        io.write_pin(1, true).unwrap();
        finish(io);
    }

    #[test]
    fn failed_connect_stays_disconnected() {
        let expectations = [I2cTransaction::write(ADDRESS, vec![0x0A, 0x22])
            .with_error(embedded_hal::i2c::ErrorKind::Other)];
        let mut mock = I2cMock::new(&expectations);
        let mut io = IoPi::new(ADDRESS);
        assert!(matches!(io.connect(mock.clone()), Err(Error::Bus(_))));
        assert!(!io.is_connected());
        mock.done();
    }

    #[test]
    fn write_pin_then_read_port() {
        let mut io = connected(&[write(0x13, 0x01), read(0x13, 0x01)]);
        io.write_pin(9, true).unwrap();
        assert_eq!(io.read_port(Port::B).unwrap(), 0x01);
        finish(io);
    }

    #[test]
    fn pin_changes_build_on_previous_writes() {
        let mut io = connected(&[
            write(0x00, 0xFE),
            write(0x00, 0x7E),
            write(0x0D, 0x80),
            write(0x0D, 0x00),
        ]);
        io.set_pin_direction(1, false).unwrap();
        io.set_pin_direction(8, false).unwrap();
        io.set_pin_pullup(16, true).unwrap();
        io.set_pin_pullup(16, false).unwrap();
        finish(io);
    }

    #[test]
    fn failed_write_keeps_shadow() {
        let mut io = connected(&[
            write(0x12, 0x01).with_error(embedded_hal::i2c::ErrorKind::Other),
            write(0x12, 0x02),
            write(0x01, 0x00).with_error(embedded_hal::i2c::ErrorKind::Other),
            write(0x01, 0xBF),
        ]);
        assert!(matches!(io.write_pin(1, true), Err(Error::Bus(_))));
        io.write_pin(2, true).unwrap();
        assert!(matches!(
            io.set_port_direction(Port::B, 0x00),
            Err(Error::Bus(_))
        ));
        io.set_pin_direction(15, false).unwrap();
        finish(io);
    }

    #[test]
    fn invert_pin_uses_polarity() {
        // Port B outputs are high, which must not leak into the polarity register.
        let mut io = connected(&[write(0x13, 0xFF), write(0x03, 0x04)]);
        io.write_port(Port::B, 0xFF).unwrap();
        io.invert_pin(11, true).unwrap();
        finish(io);
    }

    #[test]
    fn read_pin_reads_live_value() {
        let mut io = connected(&[read(0x12, 0x04), read(0x12, 0x00)]);
        assert!(io.read_pin(3).unwrap());
        assert!(!io.read_pin(3).unwrap());
        finish(io);
    }

    #[test]
    fn invalid_pins_are_rejected_without_bus_traffic() {
        let mut io = connected(&[]);
        for pin in [0, 17] {
            assert!(matches!(io.write_pin(pin, true), Err(Error::InvalidArgument(_))));
            assert!(matches!(io.read_pin(pin), Err(Error::InvalidArgument(_))));
            assert!(matches!(
                io.set_interrupt_on_pin(pin, true),
                Err(Error::InvalidArgument(_))
            ));
        }
        finish(io);
    }

    #[test]
    fn interrupt_configuration() {
        let mut io = connected(&[
            write(0x0A, 0x62),
            write(0x0A, 0x60),
            write(0x09, 0xF0),
            write(0x06, 0x0F),
            write(0x05, 0x03),
            write(0x04, 0x80),
            read(0x0F, 0x02),
            read(0x10, 0x55),
            read(0x10, 0x00),
            read(0x11, 0x00),
        ]);
        io.mirror_interrupts(true).unwrap();
        io.set_interrupt_polarity(false).unwrap();
        io.set_interrupt_type(Port::B, 0xF0).unwrap();
        io.set_interrupt_defaults(Port::A, 0x0F).unwrap();
        io.set_interrupt_on_port(Port::B, 0x03).unwrap();
        io.set_interrupt_on_pin(8, true).unwrap();
        assert_eq!(io.read_interrupt_status(Port::B).unwrap(), 0x02);
        assert_eq!(io.read_interrupt_capture(Port::A).unwrap(), 0x55);
        io.reset_interrupts().unwrap();
        finish(io);
    }

    #[test]
    fn operations_require_connection() {
        let mut io: IoPi<I2cMock> = IoPi::new(ADDRESS);
        assert!(matches!(io.write_pin(1, true), Err(Error::NotConnected)));
        assert!(matches!(io.write_pin(99, true), Err(Error::NotConnected)));
        assert!(matches!(io.read_port(Port::A), Err(Error::NotConnected)));
        assert!(matches!(io.reset_interrupts(), Err(Error::NotConnected)));
        assert!(io.disconnect().is_none());
    }

    #[test]
    fn address_fixed_while_connected() {
        let mut io = connected(&[]);
        assert!(matches!(io.set_address::<()>(0x21), Err(Error::AlreadyConnected)));
        finish(io);
        io = IoPi::new(ADDRESS);
        io.set_address::<()>(DEFAULT_ADDRESS_2).unwrap();
        assert_eq!(io.address(), 0x21);
    }

    #[test]
    fn ports_from_numbers() {
        assert_eq!(Port::try_from(0), Ok(Port::A));
        assert_eq!(Port::try_from(1), Ok(Port::B));
        assert!(Port::try_from(2).is_err());
    }
}
