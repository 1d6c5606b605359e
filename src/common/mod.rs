// src/common/mod.rs

pub mod address;
pub mod command;
pub mod crc;
pub mod error;
pub mod frame;
pub mod hal_traits;
pub mod response;
pub mod timing;

// --- Re-export key types/traits/functions for easier access ---

pub use address::Sdi12Addr;

pub use command::{
    Command, CommandIndexError, ContinuousIndex, DataIndex, MeasurementIndex,
};

pub use crc::{calculate_crc16, decode_crc_ascii, encode_crc_ascii, verify_ascii_suffix};

pub use error::Sdi12Error;

pub use frame::{FrameFormat, TERMINATOR};

pub use hal_traits::{Sdi12Instant, Sdi12Serial, Sdi12Timer};

pub use response::{
    parse_response, MeasurementHeader, Payload, ResponseShape, SensorId, ValueList,
};
