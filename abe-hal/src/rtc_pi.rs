//! RTC Pi: DS1307 battery-backed real-time clock with square-wave output.
//!
//! The clock registers hold two BCD digits each. The year register holds only
//! the last two digits, so dates are limited to 2000-2099.
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use embedded_hal::i2c::I2c;
use log::{debug, trace, warn};

use crate::bits::{bit_is_set, field, with_bit, with_field};
use crate::connection::Connection;
use crate::error::{Error, InvalidArgument};

/// Fixed I2C address of the DS1307.
pub const ADDRESS: u8 = 0x68;

const SECONDS: u8 = 0x00;
const CONTROL: u8 = 0x07;
const CENTURY: i32 = 2000;

/// Square wave disabled, 32.768kHz selected.
const CONTROL_DEFAULT: u8 = 0x03;
const OUT_BIT: usize = 7;
const SQWE_BIT: usize = 4;
const RATE_BITS: std::ops::Range<usize> = 0..2;

/// Decode a packed BCD byte.
///
/// Bytes that are not valid BCD decode to values above 99.
pub fn bcd_to_int(value: u8) -> u8 {
    value - 6 * (value >> 4)
}

/// Encode `value` (0-99) as packed BCD.
///
/// Larger values do not fit in two digits and give meaningless results.
pub fn int_to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// Frequency of the square wave on the SQW pin.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SquareWave {
    /// 1Hz
    Hz1,
    /// 4.096kHz
    Hz4096,
    /// 8.192kHz
    Hz8192,
    /// 32.768kHz (power-on default).
    #[default]
    Hz32768,
}

impl SquareWave {
    fn bits(self) -> u8 {
        match self {
            SquareWave::Hz1 => 0b00,
            SquareWave::Hz4096 => 0b01,
            SquareWave::Hz8192 => 0b10,
            SquareWave::Hz32768 => 0b11,
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits {
            0b00 => SquareWave::Hz1,
            0b01 => SquareWave::Hz4096,
            0b10 => SquareWave::Hz8192,
            _ => SquareWave::Hz32768,
        }
    }
}

/// Selector as used by the board documentation: 1 = 1Hz through 4 = 32.768kHz.
impl TryFrom<u8> for SquareWave {
    type Error = InvalidArgument;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Hz1),
            2 => Ok(Self::Hz4096),
            3 => Ok(Self::Hz8192),
            4 => Ok(Self::Hz32768),
            _ => Err(InvalidArgument("square wave frequency must be 1-4")),
        }
    }
}

/// Returned by [`RtcPi::read_date`] when the clock holds no valid date.
pub fn sentinel_date() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1990, 1, 1)
        .and_then(|date| date.and_hms_opt(1, 1, 1))
        .unwrap_or_default()
}

/// Driver for the DS1307 on the RTC Pi or Expander Pi.
#[derive(Debug)]
pub struct RtcPi<I2C> {
    connection: Connection<I2C>,
    config: u8,
}

impl<I2C> RtcPi<I2C> {
    /// Create an unconnected driver.
    pub const fn new() -> Self {
        Self {
            connection: Connection::new(),
            config: CONTROL_DEFAULT,
        }
    }

    /// Take the I2C bus.
    ///
    /// The clock keeps running from its battery, so nothing is written.
    pub fn connect(&mut self, bus: I2C) {
        self.connection.acquire(bus);
        debug!("RTC Pi connected at {ADDRESS:#04X}");
    }

    /// Whether the driver holds a bus handle.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Release the bus handle.
    ///
    /// Returns `None` if the driver was not connected.
    pub fn disconnect(&mut self) -> Option<I2C> {
        self.connection.release()
    }

    /// Square wave frequency last selected.
    pub fn frequency(&self) -> SquareWave {
        SquareWave::from_bits(field(self.config, RATE_BITS))
    }

    /// Whether the square wave output was last enabled.
    pub fn output_enabled(&self) -> bool {
        bit_is_set(self.config, SQWE_BIT)
    }
}

impl<I2C> Default for RtcPi<I2C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I2C: I2c> RtcPi<I2C> {
    /// Set the clock.
    ///
    /// The seven clock registers are written one at a time, seconds first.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the year is outside 2000-2099.
    pub fn set_date(&mut self, date: NaiveDateTime) -> Result<(), Error<I2C::Error>> {
        let bus = self.connection.bus()?;
        if !(CENTURY..CENTURY + 100).contains(&date.year()) {
            return Err(Error::InvalidArgument("RTC year must be 2000-2099"));
        }
        let fields = [
            date.second() as u8,
            date.minute() as u8,
            date.hour() as u8,
            date.weekday().num_days_from_sunday() as u8,
            date.day() as u8,
            date.month() as u8,
            (date.year() - CENTURY) as u8,
        ];
        for (register, value) in (SECONDS..).zip(fields) {
            bus.write(ADDRESS, &[register, int_to_bcd(value)])
                .map_err(Error::Bus)?;
        }
        debug!("RTC set to {date}");
        Ok(())
    }

    /// Read the clock.
    ///
    /// If the registers do not hold a valid date and time (for example a new
    /// chip, or one with the clock halted) the fixed [`sentinel_date`] is
    /// returned instead of an error.
    pub fn read_date(&mut self) -> Result<NaiveDateTime, Error<I2C::Error>> {
        let bus = self.connection.bus()?;
        let mut registers = [0u8; 7];
        bus.write_read(ADDRESS, &[SECONDS], &mut registers)
            .map_err(Error::Bus)?;
        trace!("RTC registers {registers:02X?}");
        let [seconds, minutes, hours, _weekday, day, month, year] = registers.map(bcd_to_int);
        let date = NaiveDate::from_ymd_opt(CENTURY + year as i32, month.into(), day.into())
            .and_then(|date| date.and_hms_opt(hours.into(), minutes.into(), seconds.into()));
        Ok(date.unwrap_or_else(|| {
            warn!("RTC holds no valid date ({registers:02X?}), returning 1990-01-01 01:01:01");
            sentinel_date()
        }))
    }

    /// Enable the square wave on the SQW pin.
    pub fn enable_output(&mut self) -> Result<(), Error<I2C::Error>> {
        let config = with_bit(self.config, OUT_BIT, true);
        self.write_config(with_bit(config, SQWE_BIT, true))
    }

    /// Disable the square wave, leaving the SQW pin low.
    pub fn disable_output(&mut self) -> Result<(), Error<I2C::Error>> {
        let config = with_bit(self.config, OUT_BIT, false);
        self.write_config(with_bit(config, SQWE_BIT, false))
    }

    /// Select the square wave frequency.
    pub fn set_frequency(&mut self, frequency: SquareWave) -> Result<(), Error<I2C::Error>> {
        self.write_config(with_field(self.config, RATE_BITS, frequency.bits()))
    }

    fn write_config(&mut self, config: u8) -> Result<(), Error<I2C::Error>> {
        let bus = self.connection.bus()?;
        bus.write(ADDRESS, &[CONTROL, config]).map_err(Error::Bus)?;
        debug!("RTC control {config:#04X}");
        self.config = config;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    fn connected(expectations: &[I2cTransaction]) -> RtcPi<I2cMock> {
        let mut rtc = RtcPi::new();
        rtc.connect(I2cMock::new(expectations));
        rtc
    }

    fn finish(mut rtc: RtcPi<I2cMock>) {
        rtc.disconnect().expect("Driver was connected.").done();
    }

    fn date(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn bcd_boundaries() {
        assert_eq!(bcd_to_int(0x00), 0);
        assert_eq!(bcd_to_int(0x99), 99);
        assert_eq!(int_to_bcd(0), 0x00);
        assert_eq!(int_to_bcd(99), 0x99);
        assert_eq!(int_to_bcd(59), 0x59);
    }

    #[test]
    fn bcd_round_trip() {
        for n in 0..=99 {
            assert_eq!(bcd_to_int(int_to_bcd(n)), n);
        }
    }

    #[test]
    fn set_date_writes_each_register() {
        // 2024-02-29 was a Thursday.
        let expectations = [
            I2cTransaction::write(ADDRESS, vec![0x00, 0x56]),
            I2cTransaction::write(ADDRESS, vec![0x01, 0x34]),
            I2cTransaction::write(ADDRESS, vec![0x02, 0x12]),
            I2cTransaction::write(ADDRESS, vec![0x03, 0x04]),
            I2cTransaction::write(ADDRESS, vec![0x04, 0x29]),
            I2cTransaction::write(ADDRESS, vec![0x05, 0x02]),
            I2cTransaction::write(ADDRESS, vec![0x06, 0x24]),
        ];
        let mut rtc = connected(&expectations);
        rtc.set_date(date(2024, 2, 29, 12, 34, 56)).unwrap();
        finish(rtc);
    }

    #[test]
    fn set_date_rejects_other_centuries() {
        let mut rtc = connected(&[]);
        assert!(matches!(
            rtc.set_date(date(1999, 12, 31, 23, 59, 59)),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            rtc.set_date(date(2100, 1, 1, 0, 0, 0)),
            Err(Error::InvalidArgument(_))
        ));
        finish(rtc);
    }

    #[test]
    fn read_date_decodes_registers() {
        let mut rtc = connected(&[I2cTransaction::write_read(
            ADDRESS,
            vec![0x00],
            vec![0x56, 0x34, 0x12, 0x04, 0x29, 0x02, 0x24],
        )]);
        assert_eq!(rtc.read_date().unwrap(), date(2024, 2, 29, 12, 34, 56));
        finish(rtc);
    }

    #[test]
    fn invalid_month_reads_as_sentinel() {
        let mut rtc = connected(&[I2cTransaction::write_read(
            ADDRESS,
            vec![0x00],
            vec![0x00, 0x00, 0x00, 0x01, 0x01, 0x13, 0x24],
        )]);
        assert_eq!(rtc.read_date().unwrap(), date(1990, 1, 1, 1, 1, 1));
        finish(rtc);
    }

    #[test]
    fn control_register() {
        let mut rtc = connected(&[
            I2cTransaction::write(ADDRESS, vec![0x07, 0x93]),
            I2cTransaction::write(ADDRESS, vec![0x07, 0x90]),
            I2cTransaction::write(ADDRESS, vec![0x07, 0x91]),
            I2cTransaction::write(ADDRESS, vec![0x07, 0x01]),
        ]);
        assert_eq!(rtc.frequency(), SquareWave::Hz32768);
        assert!(!rtc.output_enabled());
        rtc.enable_output().unwrap();
        assert!(rtc.output_enabled());
        rtc.set_frequency(SquareWave::Hz1).unwrap();
        assert_eq!(rtc.frequency(), SquareWave::Hz1);
        rtc.set_frequency(SquareWave::try_from(2).unwrap()).unwrap();
        assert_eq!(rtc.frequency(), SquareWave::Hz4096);
        rtc.disable_output().unwrap();
        assert!(!rtc.output_enabled());
        finish(rtc);
    }

    #[test]
    fn failed_control_write_keeps_shadow() {
        let mut rtc = connected(&[
            I2cTransaction::write(ADDRESS, vec![0x07, 0x93])
                .with_error(embedded_hal::i2c::ErrorKind::Other),
            I2cTransaction::write(ADDRESS, vec![0x07, 0x00]),
        ]);
        assert!(matches!(rtc.enable_output(), Err(Error::Bus(_))));
        assert!(!rtc.output_enabled());
        rtc.set_frequency(SquareWave::Hz1).unwrap();
        finish(rtc);
    }

    #[test]
    fn operations_require_connection() {
        let mut rtc: RtcPi<I2cMock> = RtcPi::new();
        assert!(matches!(rtc.read_date(), Err(Error::NotConnected)));
        assert!(matches!(rtc.enable_output(), Err(Error::NotConnected)));
        assert!(rtc.disconnect().is_none());
    }

    #[test]
    fn frequencies_from_numbers() {
        assert_eq!(SquareWave::try_from(4), Ok(SquareWave::Hz32768));
        assert!(SquareWave::try_from(0).is_err());
        assert!(SquareWave::try_from(5).is_err());
    }
}
