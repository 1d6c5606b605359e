// src/common/error.rs

use crate::common::command::CommandIndexError;

/// Everything a bus transaction can report, in order of specificity.
///
/// `E` is the underlying serial interface's error type; validation-only
/// paths use the default `()`.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Sdi12Error<E = ()>
where
    E: core::fmt::Debug,
{
    /// Underlying I/O error from the serial adapter. Terminal.
    #[error("I/O error: {0:?}")]
    Io(E),

    /// No first byte within the response-start window, or the response did
    /// not complete within the total window. Retried inner then outer.
    #[error("operation timed out")]
    Timeout,

    /// An address character is neither alphanumeric nor (for the address
    /// query) `?`.
    #[error("invalid SDI-12 address character: '{0}'")]
    InvalidAddress(char),

    /// The response address does not match the commanded target (or the
    /// new address for a change-address command).
    #[error("response address '{got}' does not match '{expected}'")]
    AddressMismatch { expected: char, got: char },

    /// The response CRC differs from the one computed locally. Surfaces a
    /// real line or sensor fault, so the engine does not retry it.
    #[error("CRC mismatch: received {received:#06x}, calculated {calculated:#06x}")]
    CrcMismatch { received: u16, calculated: u16 },

    /// Interface (UART/GPIO) configuration failed. Terminal.
    #[error("interface configuration failed")]
    ConfigError,

    /// A caller-supplied or internal buffer cannot hold the data. Terminal.
    #[error("buffer overflow: needed {needed}, got {got}")]
    BufferOverflow { needed: usize, got: usize },

    /// Generic malformed response: missing terminator, wrong payload
    /// length, non-digit in a numeric field.
    #[error("malformed response")]
    InvalidFormat,

    /// A command index parameter was out of range.
    #[error("invalid command index: {0}")]
    InvalidIndex(CommandIndexError),
}

impl<E: core::fmt::Debug> From<CommandIndexError> for Sdi12Error<E> {
    fn from(e: CommandIndexError) -> Self {
        Sdi12Error::InvalidIndex(e)
    }
}
