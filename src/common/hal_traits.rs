// src/common/hal_traits.rs

use super::frame::FrameFormat;
use core::fmt::Debug;
use core::ops::{Add, Sub};
use core::time::Duration;

/// A monotonic timestamp the engine can compare and offset by a
/// `Duration`. Implemented automatically for any suitable type.
pub trait Sdi12Instant:
    Copy + core::fmt::Debug + PartialOrd + Add<Duration, Output = Self> + Sub<Self, Output = Duration>
{
}

impl<T> Sdi12Instant for T where
    T: Copy + core::fmt::Debug + PartialOrd + Add<Duration, Output = T> + Sub<T, Output = Duration>
{
}

/// Timer and monotonic clock operations required by the engine.
///
/// Delays may be implemented as busy-waits or scheduler sleeps; the engine
/// only relies on them being at least as long as requested.
pub trait Sdi12Timer {
    type Instant: Sdi12Instant;

    /// Delay for at least the specified number of microseconds.
    fn delay_us(&mut self, us: u32);

    /// Delay for at least the specified number of milliseconds.
    fn delay_ms(&mut self, ms: u32);

    /// The current monotonic time.
    fn now(&self) -> Self::Instant;
}

/// Synchronous (non-blocking) serial access to the SDI-12 data line.
///
/// The line is half duplex: implementations on a shared-wire transceiver
/// receive their own transmissions back and must discard bytes received
/// while TX-enable is asserted (echo suppression).
pub trait Sdi12Serial {
    /// Associated error type for communication errors.
    type Error: Debug;

    /// Attempts to read a single byte.
    ///
    /// Returns `Err(nb::Error::WouldBlock)` while no byte is available.
    fn read_byte(&mut self) -> nb::Result<u8, Self::Error>;

    /// Attempts to write a single byte.
    ///
    /// Returns `Err(nb::Error::WouldBlock)` while the transmit buffer is
    /// full.
    fn write_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error>;

    /// Attempts to flush the transmitter; `Ok(())` means the final stop
    /// bit has been clocked out.
    fn flush(&mut self) -> nb::Result<(), Self::Error>;

    /// Sends the SDI-12 break condition: >= 12 ms of continuous spacing.
    ///
    /// Adapters without native break support typically switch to
    /// [`FrameFormat::Break750`] and clock out a zero byte.
    fn send_break(&mut self) -> nb::Result<(), Self::Error>;

    /// Changes the serial configuration.
    fn set_config(&mut self, config: FrameFormat) -> Result<(), Self::Error>;
}
