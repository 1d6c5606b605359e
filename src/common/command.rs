// src/common/command.rs

use super::address::Sdi12Addr;
use super::error::Sdi12Error;
use super::response::ResponseShape;
use arrayvec::ArrayString;
use core::convert::TryFrom;
use core::fmt;

/// Longest command image the engine emits: `aCC9!`. The `<CR><LF>`
/// terminator is appended by the transaction engine at transmit time.
pub const MAX_COMMAND_LEN: usize = 5;

// --- Error Type for Index Validation ---

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CommandIndexError {
    /// Additional measurement index for M/MC/C/CC must be 1-9.
    MeasurementOutOfRange,
    /// Continuous index for R/RC must be 0-9.
    ContinuousOutOfRange,
    /// Send-data index must be 0-9.
    DataOutOfRange,
}

impl fmt::Display for CommandIndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandIndexError::MeasurementOutOfRange => write!(f, "Measurement index must be 1-9"),
            CommandIndexError::ContinuousOutOfRange => write!(f, "Continuous index must be 0-9"),
            CommandIndexError::DataOutOfRange => write!(f, "Data index must be 0-9"),
        }
    }
}

// --- Validated Index Types ---

/// Index `n` for the additional-measurement commands `aMn!`, `aMCn!`,
/// `aCn!`, `aCCn!`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MeasurementIndex(u8); // 1-9

impl MeasurementIndex {
    pub fn new(index: u8) -> Result<Self, CommandIndexError> {
        if (1..=9).contains(&index) {
            Ok(Self(index))
        } else {
            Err(CommandIndexError::MeasurementOutOfRange)
        }
    }
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for MeasurementIndex {
    type Error = CommandIndexError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Index `n` for the continuous-measurement commands `aRn!`, `aRCn!`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ContinuousIndex(u8); // 0-9

impl ContinuousIndex {
    pub fn new(index: u8) -> Result<Self, CommandIndexError> {
        if index <= 9 {
            Ok(Self(index))
        } else {
            Err(CommandIndexError::ContinuousOutOfRange)
        }
    }
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for ContinuousIndex {
    type Error = CommandIndexError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Index `n` for the send-data command `aDn!`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DataIndex(u8); // 0-9

impl DataIndex {
    pub fn new(index: u8) -> Result<Self, CommandIndexError> {
        if index <= 9 {
            Ok(Self(index))
        } else {
            Err(CommandIndexError::DataOutOfRange)
        }
    }
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for DataIndex {
    type Error = CommandIndexError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

// --- Main Command Enum ---

/// Every transaction the engine can place on the wire.
///
/// Each variant knows its verb character, whether the sensor must append a
/// CRC to the response, its optional single-character parameter and the
/// shape of the expected reply, so the framer and parser both dispatch on
/// the variant instead of parallel lookup tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AcknowledgeActive { address: Sdi12Addr },
    SendIdentification { address: Sdi12Addr },
    AddressQuery,
    ChangeAddress { address: Sdi12Addr, new_address: Sdi12Addr },
    StartMeasurement { address: Sdi12Addr },
    StartMeasurementCrc { address: Sdi12Addr },
    SendData { address: Sdi12Addr, index: DataIndex },
    AdditionalMeasurement { address: Sdi12Addr, index: MeasurementIndex },
    AdditionalMeasurementCrc { address: Sdi12Addr, index: MeasurementIndex },
    StartVerification { address: Sdi12Addr },
    StartConcurrentMeasurement { address: Sdi12Addr },
    StartConcurrentMeasurementCrc { address: Sdi12Addr },
    AdditionalConcurrentMeasurement { address: Sdi12Addr, index: MeasurementIndex },
    AdditionalConcurrentMeasurementCrc { address: Sdi12Addr, index: MeasurementIndex },
    ReadContinuous { address: Sdi12Addr, index: ContinuousIndex },
    ReadContinuousCrc { address: Sdi12Addr, index: ContinuousIndex },
}

impl Command {
    /// The address the command is directed at (`?` for the address query).
    pub fn address(&self) -> Sdi12Addr {
        match self {
            Command::AddressQuery => Sdi12Addr::QUERY_ADDRESS,
            Command::AcknowledgeActive { address }
            | Command::SendIdentification { address }
            | Command::ChangeAddress { address, .. }
            | Command::StartMeasurement { address }
            | Command::StartMeasurementCrc { address }
            | Command::SendData { address, .. }
            | Command::AdditionalMeasurement { address, .. }
            | Command::AdditionalMeasurementCrc { address, .. }
            | Command::StartVerification { address }
            | Command::StartConcurrentMeasurement { address }
            | Command::StartConcurrentMeasurementCrc { address }
            | Command::AdditionalConcurrentMeasurement { address, .. }
            | Command::AdditionalConcurrentMeasurementCrc { address, .. }
            | Command::ReadContinuous { address, .. }
            | Command::ReadContinuousCrc { address, .. } => *address,
        }
    }

    /// The verb character following the address, if the command has one.
    pub fn verb(&self) -> Option<char> {
        match self {
            Command::AcknowledgeActive { .. } | Command::AddressQuery => None,
            Command::SendIdentification { .. } => Some('I'),
            Command::ChangeAddress { .. } => Some('A'),
            Command::StartMeasurement { .. }
            | Command::StartMeasurementCrc { .. }
            | Command::AdditionalMeasurement { .. }
            | Command::AdditionalMeasurementCrc { .. } => Some('M'),
            Command::SendData { .. } => Some('D'),
            Command::StartVerification { .. } => Some('V'),
            Command::StartConcurrentMeasurement { .. }
            | Command::StartConcurrentMeasurementCrc { .. }
            | Command::AdditionalConcurrentMeasurement { .. }
            | Command::AdditionalConcurrentMeasurementCrc { .. } => Some('C'),
            Command::ReadContinuous { .. } | Command::ReadContinuousCrc { .. } => Some('R'),
        }
    }

    /// Whether the sensor appends an ASCII CRC to the response.
    pub fn expects_crc(&self) -> bool {
        matches!(
            self,
            Command::StartMeasurementCrc { .. }
                | Command::AdditionalMeasurementCrc { .. }
                | Command::StartConcurrentMeasurementCrc { .. }
                | Command::AdditionalConcurrentMeasurementCrc { .. }
                | Command::ReadContinuousCrc { .. }
        )
    }

    /// The single-character parameter emitted after the verb, if any.
    pub fn parameter(&self) -> Option<char> {
        match self {
            Command::ChangeAddress { new_address, .. } => Some(new_address.as_char()),
            Command::SendData { index, .. } => Some((b'0' + index.value()) as char),
            Command::AdditionalMeasurement { index, .. }
            | Command::AdditionalMeasurementCrc { index, .. }
            | Command::AdditionalConcurrentMeasurement { index, .. }
            | Command::AdditionalConcurrentMeasurementCrc { index, .. } => {
                Some((b'0' + index.value()) as char)
            }
            Command::ReadContinuous { index, .. } | Command::ReadContinuousCrc { index, .. } => {
                Some((b'0' + index.value()) as char)
            }
            _ => None,
        }
    }

    /// The payload shape the response parser must accept for this command.
    pub fn response_shape(&self) -> ResponseShape {
        match self {
            Command::AcknowledgeActive { .. }
            | Command::ChangeAddress { .. }
            | Command::AddressQuery => ResponseShape::NoPayload,
            Command::SendIdentification { .. } => ResponseShape::Identification,
            Command::StartMeasurement { .. }
            | Command::StartMeasurementCrc { .. }
            | Command::AdditionalMeasurement { .. }
            | Command::AdditionalMeasurementCrc { .. }
            | Command::StartConcurrentMeasurement { .. }
            | Command::StartConcurrentMeasurementCrc { .. }
            | Command::AdditionalConcurrentMeasurement { .. }
            | Command::AdditionalConcurrentMeasurementCrc { .. } => {
                ResponseShape::MeasurementHeader
            }
            Command::SendData { .. }
            | Command::ReadContinuous { .. }
            | Command::ReadContinuousCrc { .. } => ResponseShape::ValueList,
            Command::StartVerification { .. } => ResponseShape::FreeForm,
        }
    }

    /// Formats the command into its wire image, e.g. `0M!` or `7CC4!`.
    ///
    /// The `?` sentinel is rejected everywhere except the address query,
    /// for both the target and a change-address parameter.
    pub fn format_into<E>(&self) -> Result<ArrayString<MAX_COMMAND_LEN>, Sdi12Error<E>>
    where
        E: core::fmt::Debug,
    {
        if !matches!(self, Command::AddressQuery) && self.address().is_query() {
            error!("invalid command address '?'");
            return Err(Sdi12Error::InvalidAddress('?'));
        }
        if let Command::ChangeAddress { new_address, .. } = self {
            if new_address.is_query() {
                error!("invalid new-address parameter '?'");
                return Err(Sdi12Error::InvalidAddress('?'));
            }
        }

        // MAX_COMMAND_LEN bounds the longest image, so pushes cannot fail.
        let mut buffer = ArrayString::<MAX_COMMAND_LEN>::new();
        buffer.push(self.address().as_char());
        if let Some(verb) = self.verb() {
            buffer.push(verb);
        }
        if self.expects_crc() {
            buffer.push('C');
        }
        if let Some(param) = self.parameter() {
            buffer.push(param);
        }
        buffer.push('!');
        Ok(buffer)
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn addr(c: char) -> Sdi12Addr {
        Sdi12Addr::new(c).unwrap()
    }

    fn image(cmd: &Command) -> ArrayString<MAX_COMMAND_LEN> {
        cmd.format_into::<()>().unwrap()
    }

    #[test]
    fn test_measurement_index_validation() {
        assert!(MeasurementIndex::new(0).is_err());
        assert!(MeasurementIndex::new(1).is_ok());
        assert!(MeasurementIndex::new(9).is_ok());
        assert!(matches!(
            MeasurementIndex::new(10),
            Err(CommandIndexError::MeasurementOutOfRange)
        ));
    }

    #[test]
    fn test_continuous_index_validation() {
        assert!(ContinuousIndex::new(0).is_ok());
        assert!(ContinuousIndex::new(9).is_ok());
        assert!(matches!(
            ContinuousIndex::new(10),
            Err(CommandIndexError::ContinuousOutOfRange)
        ));
    }

    #[test]
    fn test_data_index_validation() {
        assert!(DataIndex::new(0).is_ok());
        assert!(DataIndex::new(9).is_ok());
        assert!(matches!(DataIndex::new(10), Err(CommandIndexError::DataOutOfRange)));
    }

    #[test]
    fn test_command_formatting() {
        assert_eq!(image(&Command::AcknowledgeActive { address: addr('7') }).as_str(), "7!");
        assert_eq!(image(&Command::SendIdentification { address: addr('7') }).as_str(), "7I!");
        assert_eq!(
            image(&Command::ChangeAddress { address: addr('7'), new_address: addr('4') }).as_str(),
            "7A4!"
        );
        assert_eq!(image(&Command::AddressQuery).as_str(), "?!");
        assert_eq!(image(&Command::StartMeasurement { address: addr('7') }).as_str(), "7M!");
        assert_eq!(image(&Command::StartMeasurementCrc { address: addr('7') }).as_str(), "7MC!");
        assert_eq!(
            image(&Command::SendData { address: addr('7'), index: DataIndex::new(0).unwrap() })
                .as_str(),
            "7D0!"
        );
        assert_eq!(
            image(&Command::AdditionalMeasurement {
                address: addr('7'),
                index: MeasurementIndex::new(4).unwrap()
            })
            .as_str(),
            "7M4!"
        );
        assert_eq!(
            image(&Command::AdditionalMeasurementCrc {
                address: addr('7'),
                index: MeasurementIndex::new(4).unwrap()
            })
            .as_str(),
            "7MC4!"
        );
        assert_eq!(image(&Command::StartVerification { address: addr('7') }).as_str(), "7V!");
        assert_eq!(
            image(&Command::StartConcurrentMeasurement { address: addr('7') }).as_str(),
            "7C!"
        );
        assert_eq!(
            image(&Command::StartConcurrentMeasurementCrc { address: addr('7') }).as_str(),
            "7CC!"
        );
        assert_eq!(
            image(&Command::AdditionalConcurrentMeasurement {
                address: addr('7'),
                index: MeasurementIndex::new(4).unwrap()
            })
            .as_str(),
            "7C4!"
        );
        assert_eq!(
            image(&Command::AdditionalConcurrentMeasurementCrc {
                address: addr('7'),
                index: MeasurementIndex::new(4).unwrap()
            })
            .as_str(),
            "7CC4!"
        );
        assert_eq!(
            image(&Command::ReadContinuous {
                address: addr('7'),
                index: ContinuousIndex::new(4).unwrap()
            })
            .as_str(),
            "7R4!"
        );
        assert_eq!(
            image(&Command::ReadContinuousCrc {
                address: addr('7'),
                index: ContinuousIndex::new(4).unwrap()
            })
            .as_str(),
            "7RC4!"
        );
    }

    #[test]
    fn test_formatting_is_idempotent() {
        let cmd = Command::StartMeasurementCrc { address: addr('3') };
        assert_eq!(
            cmd.format_into::<()>().unwrap().as_bytes(),
            cmd.format_into::<()>().unwrap().as_bytes()
        );
    }

    #[test]
    fn test_query_address_rejected_outside_query() {
        let cmd = Command::StartMeasurement { address: Sdi12Addr::QUERY_ADDRESS };
        assert!(matches!(cmd.format_into::<()>(), Err(Sdi12Error::InvalidAddress('?'))));

        let cmd = Command::ChangeAddress {
            address: addr('0'),
            new_address: Sdi12Addr::QUERY_ADDRESS,
        };
        assert!(matches!(cmd.format_into::<()>(), Err(Sdi12Error::InvalidAddress('?'))));
    }

    #[test]
    fn test_metadata_consistency() {
        let cmd = Command::ReadContinuousCrc {
            address: addr('1'),
            index: ContinuousIndex::new(2).unwrap(),
        };
        assert_eq!(cmd.verb(), Some('R'));
        assert!(cmd.expects_crc());
        assert_eq!(cmd.parameter(), Some('2'));
        assert_eq!(cmd.response_shape(), ResponseShape::ValueList);

        let cmd = Command::AddressQuery;
        assert_eq!(cmd.verb(), None);
        assert!(!cmd.expects_crc());
        assert_eq!(cmd.parameter(), None);
        assert_eq!(cmd.address(), Sdi12Addr::QUERY_ADDRESS);
    }
}
