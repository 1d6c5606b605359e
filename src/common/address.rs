// src/common/address.rs

use super::error::Sdi12Error;
use core::convert::TryFrom;
use core::fmt;

/// A validated SDI-12 sensor address, stored as its wire byte.
///
/// On the wire an address is one ASCII alphanumeric byte: it leads every
/// command the framer emits and every response line the parser accepts.
/// The `?` wildcard is representable because the address query both sends
/// it and may see it echoed; everywhere else it is rejected.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Sdi12Addr(u8);

impl Sdi12Addr {
    /// The `?` wildcard of the address-query command.
    pub const QUERY_ADDRESS: Sdi12Addr = Sdi12Addr(b'?');

    /// Validates a character as a sensor address or the `?` wildcard.
    pub fn new(address_char: char) -> Result<Self, Sdi12Error<()>> {
        if address_char.is_ascii()
            && (Self::is_address_byte(address_char as u8) || address_char == '?')
        {
            Ok(Sdi12Addr(address_char as u8))
        } else {
            Err(Sdi12Error::InvalidAddress(address_char))
        }
    }

    /// Validates the leading byte of a response line.
    ///
    /// `allow_query` admits the `?` wildcard, which only an address-query
    /// exchange may carry; for every other command the responder must
    /// identify itself with a real address.
    pub fn from_response_byte(byte: u8, allow_query: bool) -> Result<Self, Sdi12Error<()>> {
        if Self::is_address_byte(byte) || (allow_query && byte == b'?') {
            Ok(Sdi12Addr(byte))
        } else {
            Err(Sdi12Error::InvalidAddress(byte as char))
        }
    }

    /// The address character set of the standard: ASCII alphanumerics.
    #[inline]
    pub const fn is_address_byte(byte: u8) -> bool {
        byte.is_ascii_alphanumeric()
    }

    #[inline]
    pub const fn as_byte(&self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn as_char(&self) -> char {
        self.0 as char
    }

    #[inline]
    pub const fn is_query(&self) -> bool {
        self.0 == b'?'
    }
}

impl TryFrom<char> for Sdi12Addr {
    type Error = Sdi12Error<()>;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Sdi12Addr> for char {
    fn from(value: Sdi12Addr) -> Self {
        value.as_char()
    }
}

impl fmt::Display for Sdi12Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_addresses() {
        for c in ['0', '5', '9', 'a', 'z', 'A', 'Z', '?'] {
            assert!(Sdi12Addr::new(c).is_ok(), "'{}' should be accepted", c);
        }
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(matches!(Sdi12Addr::new(' '), Err(Sdi12Error::InvalidAddress(' '))));
        assert!(matches!(Sdi12Addr::new('$'), Err(Sdi12Error::InvalidAddress('$'))));
        assert!(matches!(Sdi12Addr::new('\n'), Err(Sdi12Error::InvalidAddress('\n'))));
        assert!(matches!(Sdi12Addr::new('é'), Err(Sdi12Error::InvalidAddress('é'))));
    }

    #[test]
    fn test_response_byte_validation() {
        assert_eq!(Sdi12Addr::from_response_byte(b'7', false).unwrap().as_byte(), b'7');
        assert_eq!(Sdi12Addr::from_response_byte(b'z', false).unwrap().as_char(), 'z');

        // The wildcard only passes when an address query asked for it.
        assert!(matches!(
            Sdi12Addr::from_response_byte(b'?', false),
            Err(Sdi12Error::InvalidAddress('?'))
        ));
        assert_eq!(
            Sdi12Addr::from_response_byte(b'?', true).unwrap(),
            Sdi12Addr::QUERY_ADDRESS
        );

        assert!(matches!(
            Sdi12Addr::from_response_byte(b'$', true),
            Err(Sdi12Error::InvalidAddress('$'))
        ));
        assert!(matches!(
            Sdi12Addr::from_response_byte(0x80, false),
            Err(Sdi12Error::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_try_from_char() {
        assert_eq!(Sdi12Addr::try_from('1').unwrap().as_char(), '1');
        assert_eq!(Sdi12Addr::try_from('b').unwrap().as_char(), 'b');
        assert_eq!(Sdi12Addr::try_from('?').unwrap(), Sdi12Addr::QUERY_ADDRESS);
        assert!(matches!(Sdi12Addr::try_from('*'), Err(Sdi12Error::InvalidAddress('*'))));
    }

    #[test]
    fn test_query_predicate() {
        assert!(Sdi12Addr::QUERY_ADDRESS.is_query());
        assert!(!Sdi12Addr::new('0').unwrap().is_query());
    }
}
