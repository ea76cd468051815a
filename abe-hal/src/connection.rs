//! Ownership of a driver's bus handle.
use crate::Error;

/// The bus handle of a driver, present only while connected.
///
/// Every driver keeps its handle in one of these rather than a separate
/// "is connected" flag, so the handle and the connection state cannot disagree.
/// Releasing is idempotent: the second call returns `None`. Dropping the driver
/// drops the handle.
#[derive(Debug)]
pub(crate) struct Connection<B> {
    bus: Option<B>,
}

impl<B> Connection<B> {
    pub(crate) const fn new() -> Self {
        Self { bus: None }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.bus.is_some()
    }

    /// Store the handle, returning any handle that was already held.
    pub(crate) fn acquire(&mut self, bus: B) -> Option<B> {
        self.bus.replace(bus)
    }

    pub(crate) fn release(&mut self) -> Option<B> {
        self.bus.take()
    }

    /// Borrow the handle for a transaction.
    pub(crate) fn bus(&mut self) -> Result<&mut B, NotConnected> {
        self.bus.as_mut().ok_or(NotConnected)
    }
}

/// No handle is held. Converts into [`Error::NotConnected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NotConnected;

impl<E> From<NotConnected> for Error<E> {
    fn from(_: NotConnected) -> Self {
        Error::NotConnected
    }
}

impl<B> Default for Connection<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_is_idempotent() {
        let mut connection = Connection::new();
        assert!(!connection.is_connected());
        assert!(connection.acquire(7u8).is_none());
        assert!(connection.is_connected());
        assert_eq!(connection.release(), Some(7));
        assert_eq!(connection.release(), None);
        assert_eq!(connection.bus().err(), Some(NotConnected));
    }
}
