// src/lib.rs

#![no_std]

#[cfg(any(test, feature = "std"))]
extern crate std;

// Logging macros must be declared before the modules that use them.
#[macro_use]
mod fmt;

pub mod common;
pub mod master;

// Re-export key types for convenience
pub use common::address::Sdi12Addr;
pub use common::command::Command;
pub use common::error::Sdi12Error;
pub use common::response::{MeasurementHeader, Payload, SensorId, ValueList};
pub use master::{Sdi12Master, TxEnablePolarity};
