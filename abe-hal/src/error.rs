/// Wrapper for problems when communicating with an AB Electronics board.
///
/// `E` is the error type of the underlying bus (I2C or SPI). Bus errors are passed
/// through unmodified in [`Error::Bus`]; the driver never retries a failed transfer.
#[derive(Debug)]
pub enum Error<E> {
    /// An operation was attempted before [`connect`] or after [`disconnect`].
    ///
    /// [`connect`]: crate::IoPi::connect
    /// [`disconnect`]: crate::IoPi::disconnect
    NotConnected,
    /// The bus address was changed while the driver held a bus handle.
    ///
    /// Disconnect first, change the address, then connect again.
    AlreadyConnected,
    /// A channel, pin, port, gain, resolution, frequency or value was outside the
    /// range supported by the device.
    ///
    /// The enclosed string names what was rejected. No bus transaction is issued
    /// when this error is returned.
    InvalidArgument(&'static str),
    /// The ADC did not report a finished conversion within the poll limit.
    ///
    /// See [`AdcPi::set_poll_limit`](crate::AdcPi::set_poll_limit).
    ConversionTimeout {
        /// Number of status reads made before giving up.
        polls: u32,
    },
    /// Output enable was requested on a Servo Pi with no output-enable line.
    NoOutputEnablePin,
    /// The auxiliary GPIO line could not be driven.
    Pin(embedded_hal::digital::ErrorKind),
    /// An error occurred on the underlying I2C or SPI bus.
    Bus(E),
}

/// A value that does not map to any setting of the device.
///
/// This is returned by the `TryFrom<u8>` conversions of the setting enums (for
/// example [`Gain`](crate::Gain)), and converts into [`Error::InvalidArgument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidArgument(pub &'static str);

impl<E> From<InvalidArgument> for Error<E> {
    fn from(InvalidArgument(what): InvalidArgument) -> Self {
        Self::InvalidArgument(what)
    }
}

impl<E: std::fmt::Debug> std::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotConnected => write!(f, "not connected, call connect() first"),
            Error::AlreadyConnected => write!(f, "cannot change address while connected"),
            Error::InvalidArgument(what) => write!(f, "invalid argument: {what}"),
            Error::ConversionTimeout { polls } => {
                write!(f, "conversion not ready after {polls} polls")
            }
            Error::NoOutputEnablePin => write!(f, "no output enable pin configured"),
            Error::Pin(kind) => write!(f, "output enable pin error: {kind}"),
            Error::Bus(e) => write!(f, "bus error: {e:?}"),
        }
    }
}

impl<E: std::fmt::Debug> std::error::Error for Error<E> {}

impl std::fmt::Display for InvalidArgument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid argument: {}", self.0)
    }
}

impl std::error::Error for InvalidArgument {}

/// Map an auxiliary pin error into the driver error type.
pub(crate) fn pin_error<E, P: embedded_hal::digital::Error>(error: P) -> Error<E> {
    Error::Pin(error.kind())
}
