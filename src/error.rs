use core::fmt;
use derivative::Derivative;

#[cfg(test)]
use test_strategy::Arbitrary;

/// An error that may be returned by [`Sender::try_send`].
///
/// [`Sender::try_send`]: crate::Sender::try_send
#[derive(Derivative)]
#[derivative(Debug)]
#[derive(Copy, Clone, Eq, PartialEq)]
#[cfg_attr(test, derive(Arbitrary))]
pub enum TrySendError<T> {
    /// The ring is at capacity.
    Full(#[derivative(Debug = "ignore")] T),

    /// The channel is closed.
    Closed(#[derivative(Debug = "ignore")] T),
}

impl<T> TrySendError<T> {
    /// Recovers the value that could not be sent.
    pub fn into_inner(self) -> T {
        use TrySendError::*;
        match self {
            Full(value) | Closed(value) => value,
        }
    }
}

impl<T> fmt::Display for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use TrySendError::*;
        match self {
            Full(_) => "sending on a full channel".fmt(f),
            Closed(_) => "sending on a closed channel".fmt(f),
        }
    }
}

impl<T: Send> std::error::Error for TrySendError<T> {}

/// An error that may be returned by the blocking send calls.
#[derive(Derivative)]
#[derivative(Debug)]
#[derive(Copy, Clone, Eq, PartialEq)]
#[cfg_attr(test, derive(Arbitrary))]
pub enum SendError<T> {
    /// The channel is closed.
    Closed(#[derivative(Debug = "ignore")] T),

    /// No slot freed up before the deadline elapsed.
    Timeout(#[derivative(Debug = "ignore")] T),

    /// The supplied cancellation token fired.
    Cancelled(#[derivative(Debug = "ignore")] T),
}

impl<T> SendError<T> {
    /// Recovers the value that could not be sent.
    pub fn into_inner(self) -> T {
        use SendError::*;
        match self {
            Closed(value) | Timeout(value) | Cancelled(value) => value,
        }
    }
}

impl<T> fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use SendError::*;
        match self {
            Closed(_) => "sending on a closed channel".fmt(f),
            Timeout(_) => "sending timed out".fmt(f),
            Cancelled(_) => "sending was cancelled".fmt(f),
        }
    }
}

impl<T: Send> std::error::Error for SendError<T> {}

/// An error that may be returned by [`Sender::try_reserve`].
///
/// [`Sender::try_reserve`]: crate::Sender::try_reserve
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(test, derive(Arbitrary))]
pub enum TryReserveError {
    /// The ring is at capacity.
    Full,

    /// The channel is closed.
    Closed,
}

impl fmt::Display for TryReserveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use TryReserveError::*;
        match self {
            Full => "reserving on a full channel".fmt(f),
            Closed => "reserving on a closed channel".fmt(f),
        }
    }
}

impl std::error::Error for TryReserveError {}

/// An error that may be returned by the blocking reserve calls.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(test, derive(Arbitrary))]
pub enum ReserveError {
    /// The channel is closed.
    Closed,

    /// No slot freed up before the deadline elapsed.
    Timeout,

    /// The supplied cancellation token fired.
    Cancelled,
}

impl fmt::Display for ReserveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ReserveError::*;
        match self {
            Closed => "reserving on a closed channel".fmt(f),
            Timeout => "reserving timed out".fmt(f),
            Cancelled => "reserving was cancelled".fmt(f),
        }
    }
}

impl std::error::Error for ReserveError {}

/// An error that may be returned by [`Receiver::try_recv`] and
/// [`Receiver::try_claim`].
///
/// [`Receiver::try_recv`]: crate::Receiver::try_recv
/// [`Receiver::try_claim`]: crate::Receiver::try_claim
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(test, derive(Arbitrary))]
pub enum TryRecvError {
    /// No item is ready at the read cursor.
    Empty,

    /// The channel is closed and every published item has been drained.
    Disconnected,
}

impl fmt::Display for TryRecvError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use TryRecvError::*;
        match self {
            Empty => "receiving on an empty channel".fmt(f),
            Disconnected => "receiving on a closed and drained channel".fmt(f),
        }
    }
}

impl std::error::Error for TryRecvError {}

/// An error that may be returned by the blocking receive calls.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(test, derive(Arbitrary))]
pub enum RecvError {
    /// The channel is closed and every published item has been drained.
    Disconnected,

    /// No item was published before the deadline elapsed.
    Timeout,

    /// The supplied cancellation token fired.
    Cancelled,
}

impl fmt::Display for RecvError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use RecvError::*;
        match self {
            Disconnected => "receiving on a closed and drained channel".fmt(f),
            Timeout => "receiving timed out".fmt(f),
            Cancelled => "receiving was cancelled".fmt(f),
        }
    }
}

impl std::error::Error for RecvError {}
