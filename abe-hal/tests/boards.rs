//! Whole-board scenarios against mock buses.
//!
//! Each test lists every transaction the board is expected to make, in order,
//! and fails if the driver makes any other.
use std::cell::RefCell;
use std::error::Error as StdError;

use abe_hal::{
    AdcPi, DacChannel, DacGain, ExpanderPi, Gain, InputMode, IoPi, Port, Resolution, RtcPi,
    ServoPi, SquareWave, adc_pi, io_pi, rtc_pi, servo_pi,
};
use chrono::NaiveDate;
use embedded_hal_bus::i2c::RefCellDevice;
use embedded_hal_mock::eh1::digital::{
    Mock as PinMock, State as PinState, Transaction as PinTransaction,
};
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

type TestResult = Result<(), Box<dyn StdError>>;

fn io_connect(address: u8) -> Vec<I2cTransaction> {
    let write = |register, value| I2cTransaction::write(address, vec![register, value]);
    let read = |register| I2cTransaction::write_read(address, vec![register], vec![0x00]);
    vec![
        write(0x0A, 0x22),
        read(0x12),
        read(0x13),
        write(0x00, 0xFF),
        write(0x01, 0xFF),
        write(0x0C, 0x00),
        write(0x0D, 0x00),
        write(0x02, 0x00),
        write(0x03, 0x00),
    ]
}

/// Setting pin 9 high and reading port 1 back gives 0x01.
#[test]
fn io_pi_write_pin_then_read_port() -> TestResult {
    let address = io_pi::DEFAULT_ADDRESS_1;
    let mut expectations = io_connect(address);
    expectations.extend([
        I2cTransaction::write(address, vec![0x01, 0xFE]),
        I2cTransaction::write(address, vec![0x13, 0x01]),
        I2cTransaction::write_read(address, vec![0x13], vec![0x01]),
    ]);
    let mut io = IoPi::new(address);
    io.connect(I2cMock::new(&expectations))?;
    io.set_pin_direction(9, false)?;
    io.write_pin(9, true)?;
    assert_eq!(io.read_port(Port::try_from(1)?)?, 0x01);
    io.disconnect().expect("Driver was connected.").done();
    Ok(())
}

/// Reads channel 1 and channel 8 of the ADC Pi at 16 bits and x2 gain.
#[test]
fn adc_pi_reads_both_chips() -> TestResult {
    let (u1, u2) = (adc_pi::DEFAULT_ADDRESS_1, adc_pi::DEFAULT_ADDRESS_2);
    let expectations = [
        // connect
        I2cTransaction::write(u1, vec![0x9C]),
        I2cTransaction::write(u2, vec![0x9C]),
        // 16 bit
        I2cTransaction::write(u1, vec![0x98]),
        I2cTransaction::write(u2, vec![0x98]),
        // x2
        I2cTransaction::write(u1, vec![0x99]),
        I2cTransaction::write(u2, vec![0x99]),
        // channel 1
        I2cTransaction::write(u1, vec![0x99]),
        I2cTransaction::read(u1, vec![0x40, 0x00, 0x19]),
        // channel 8, negative
        I2cTransaction::write(u2, vec![0xF9]),
        I2cTransaction::read(u2, vec![0x80, 0x10, 0x79]),
    ];
    let mut adc = AdcPi::new(u1, u2);
    adc.connect(I2cMock::new(&expectations))?;
    adc.set_resolution(Resolution::try_from(16)?)?;
    adc.set_gain(Gain::try_from(2)?)?;

    let volts = adc.read_voltage(1)?;
    let expected = 16384.0 * 0.00003125 / 1.0 * 2.471;
    assert!((volts - expected).abs() < 1e-9, "{volts} != {expected}");
    assert_eq!(adc.read_voltage(8)?, 0.0);

    adc.disconnect().expect("Driver was connected.").done();
    Ok(())
}

/// Sets the RTC, reads it back, and starts a 1Hz square wave.
#[test]
fn rtc_pi_set_and_read() -> TestResult {
    let address = rtc_pi::ADDRESS;
    let registers = vec![0x00, 0x30, 0x09, 0x01, 0x16, 0x06, 0x25];
    let mut expectations: Vec<_> = registers
        .iter()
        .enumerate()
        .map(|(register, value)| I2cTransaction::write(address, vec![register as u8, *value]))
        .collect();
    expectations.extend([
        I2cTransaction::write_read(address, vec![0x00], registers),
        I2cTransaction::write(address, vec![0x07, 0x00]),
        I2cTransaction::write(address, vec![0x07, 0x90]),
    ]);
    // 2025-06-16 is a Monday, so the day-of-week register holds 1.
    let date = NaiveDate::from_ymd_opt(2025, 6, 16)
        .and_then(|d| d.and_hms_opt(9, 30, 0))
        .expect("Valid date.");

    let mut rtc = RtcPi::new();
    rtc.connect(I2cMock::new(&expectations));
    rtc.set_date(date)?;
    assert_eq!(rtc.read_date()?, date);
    rtc.set_frequency(SquareWave::Hz1)?;
    rtc.enable_output()?;
    rtc.disconnect().expect("Driver was connected.").done();
    Ok(())
}

/// Sets a 50Hz servo frequency, centres channel 1 and enables the outputs.
#[test]
fn servo_pi_drives_a_servo() -> TestResult {
    let address = servo_pi::DEFAULT_ADDRESS;
    let write = |register, value| I2cTransaction::write(address, vec![register, value]);
    let expectations = [
        write(0x00, 0x00),
        I2cTransaction::write_read(address, vec![0x00], vec![0x00]),
        write(0x00, 0x10),
        write(0xFE, 121),
        write(0x00, 0x00),
        write(0x00, 0x80),
        write(0x06, 0x00),
        write(0x07, 0x00),
        write(0x08, 0x33),
        write(0x09, 0x01),
    ];
    let mut pin = PinMock::new(&[
        PinTransaction::set(PinState::High),
        PinTransaction::set(PinState::Low),
    ]);

    let mut servo = ServoPi::with_output_enable(address, pin.clone());
    servo.connect(I2cMock::new(&expectations))?;
    servo.set_frequency(50)?;
    servo.set_pwm(1, 0, 307)?;
    servo.output_enable()?;
    servo.disconnect().expect("Driver was connected.").done();
    pin.done();
    Ok(())
}

/// Drives every part of the Expander Pi, with the I/O expander and clock
/// sharing one I2C bus.
#[test]
fn expander_pi_on_shared_i2c_bus() -> TestResult {
    let mut i2c_expectations = io_connect(0x20);
    i2c_expectations.extend([
        I2cTransaction::write(0x20, vec![0x13, 0x01]),
        I2cTransaction::write_read(0x20, vec![0x13], vec![0x01]),
        I2cTransaction::write(0x68, vec![0x07, 0x93]),
    ]);
    let i2c = RefCell::new(I2cMock::new(&i2c_expectations));
    let adc_spi = SpiMock::new(&[
        SpiTransaction::transaction_start(),
        SpiTransaction::transfer(vec![0x07, 0x80, 0x00], vec![0x00, 0x04, 0x00]),
        SpiTransaction::transaction_end(),
    ]);
    let dac_spi = SpiMock::new(&[
        SpiTransaction::transaction_start(),
        SpiTransaction::write_vec(vec![0x38, 0x00]),
        SpiTransaction::transaction_end(),
    ]);

    let mut board = ExpanderPi::new();
    board.connect(
        adc_spi,
        dac_spi,
        RefCellDevice::new(&i2c),
        RefCellDevice::new(&i2c),
    )?;
    assert!(board.is_connected());

    board
        .dac_mut()
        .set_voltage(DacChannel::try_from(1)?, 1.024, DacGain::try_from(1)?)?;
    assert_eq!(
        board.adc_mut().read_voltage(7, InputMode::SingleEnded)?,
        1.024
    );
    board.io_mut().write_pin(9, true)?;
    assert_eq!(board.io_mut().read_port(Port::B)?, 0x01);
    board.rtc_mut().enable_output()?;

    let buses = board.disconnect();
    buses.adc.expect("ADC was connected.").done();
    buses.dac.expect("DAC was connected.").done();
    drop(buses.io);
    drop(buses.rtc);
    drop(board);
    i2c.into_inner().done();
    Ok(())
}
