// src/master/mod.rs

mod io;
mod measure;
mod transaction;

use crate::common::{
    address::Sdi12Addr,
    command::{Command, ContinuousIndex, MeasurementIndex},
    error::Sdi12Error,
    frame::FrameFormat,
    hal_traits::{Sdi12Serial, Sdi12Timer},
    response::{MeasurementHeader, Payload, SensorId},
};
use core::fmt::Debug;
use embedded_hal::digital::OutputPin;

/// Electrical polarity of the transceiver direction (TX-enable) line.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TxEnablePolarity {
    ActiveHigh,
    ActiveLow,
}

/// The SDI-12 bus master.
///
/// Owns the serial interface and the transceiver direction pin, plus the
/// two pieces of state the protocol keeps between transactions: the sensor
/// most recently addressed and the time of the last bus activity. Together
/// they decide when a wake break must precede the next command.
#[derive(Debug)]
pub struct Sdi12Master<IF, EN>
where
    IF: Sdi12Serial + Sdi12Timer,
    IF::Error: Debug,
    EN: OutputPin,
{
    interface: IF,
    tx_enable: EN,
    polarity: TxEnablePolarity,
    last_address: Option<Sdi12Addr>,
    last_activity: Option<<IF as Sdi12Timer>::Instant>,
}

impl<IF, EN> Sdi12Master<IF, EN>
where
    IF: Sdi12Serial + Sdi12Timer,
    IF::Error: Debug,
    EN: OutputPin,
{
    /// Takes ownership of the bus interface and direction pin, configures
    /// the standard 7E1 frame and leaves the transceiver in receive
    /// direction. The first command is always preceded by a break.
    pub fn new(
        interface: IF,
        tx_enable: EN,
        polarity: TxEnablePolarity,
    ) -> Result<Self, Sdi12Error<IF::Error>> {
        let mut master = Sdi12Master {
            interface,
            tx_enable,
            polarity,
            last_address: None,
            last_activity: None,
        };
        master
            .interface
            .set_config(FrameFormat::Sdi12_7e1)
            .map_err(|_| Sdi12Error::ConfigError)?;
        master.set_tx_enable(false)?;
        Ok(master)
    }

    /// Releases the serial interface and the direction pin.
    pub fn release(self) -> (IF, EN) {
        (self.interface, self.tx_enable)
    }

    /// Establishes whether a sensor is present and responding.
    pub fn ack_active(&mut self, address: Sdi12Addr) -> Result<(), Sdi12Error<IF::Error>> {
        self.execute(&Command::AcknowledgeActive { address })?;
        debug!("sensor {} active", address.as_char());
        Ok(())
    }

    /// Reads the identification tuple (protocol version, vendor, model,
    /// sensor version and the optional tail).
    pub fn get_info(&mut self, address: Sdi12Addr) -> Result<SensorId, Sdi12Error<IF::Error>> {
        match self.execute(&Command::SendIdentification { address }) {
            Ok((_, Payload::Id(id))) => Ok(id),
            Ok(_) => Err(Sdi12Error::InvalidFormat),
            Err(e) => {
                error!("information retrieve error");
                Err(e)
            }
        }
    }

    /// Queries the address of the sensor on the line with `?!`.
    ///
    /// Only meaningful when a single sensor is attached; with several, the
    /// replies collide.
    pub fn get_address(&mut self) -> Result<Sdi12Addr, Sdi12Error<IF::Error>> {
        let (address, _) = self.execute(&Command::AddressQuery)?;
        debug!("queried address: {}", address.as_char());
        Ok(address)
    }

    /// Re-addresses a sensor. The sensor acknowledges by echoing the new
    /// address, which the engine verifies.
    pub fn change_address(
        &mut self,
        old: Sdi12Addr,
        new: Sdi12Addr,
    ) -> Result<(), Sdi12Error<IF::Error>> {
        self.execute(&Command::ChangeAddress { address: old, new_address: new })?;
        debug!("changed sensor address {} to {}", old.as_char(), new.as_char());
        Ok(())
    }

    /// Starts a concurrent measurement (`aC!` family) and returns its
    /// timing header. Concurrent results are not collected here; the
    /// caller schedules retrieval once `ready_in_sec` has passed.
    pub fn start_concurrent_measurement(
        &mut self,
        address: Sdi12Addr,
        index: Option<MeasurementIndex>,
        use_crc: bool,
    ) -> Result<MeasurementHeader, Sdi12Error<IF::Error>> {
        let command = match (index, use_crc) {
            (None, false) => Command::StartConcurrentMeasurement { address },
            (None, true) => Command::StartConcurrentMeasurementCrc { address },
            (Some(index), false) => Command::AdditionalConcurrentMeasurement { address, index },
            (Some(index), true) => Command::AdditionalConcurrentMeasurementCrc { address, index },
        };
        match self.execute(&command)? {
            (_, Payload::Header(header)) => Ok(header),
            _ => Err(Sdi12Error::InvalidFormat),
        }
    }

    /// Reads one continuous-measurement response (`aRn!`) into `data_out`,
    /// returning the number of values written.
    pub fn read_continuous(
        &mut self,
        address: Sdi12Addr,
        index: ContinuousIndex,
        use_crc: bool,
        data_out: &mut [f64],
    ) -> Result<usize, Sdi12Error<IF::Error>> {
        let command = if use_crc {
            Command::ReadContinuousCrc { address, index }
        } else {
            Command::ReadContinuous { address, index }
        };
        let values = match self.execute(&command)? {
            (_, Payload::Values(values)) => values,
            _ => return Err(Sdi12Error::InvalidFormat),
        };
        if values.len() > data_out.len() {
            error!("more values than able to return");
            return Err(Sdi12Error::BufferOverflow { needed: values.len(), got: data_out.len() });
        }
        data_out[..values.len()].copy_from_slice(&values);
        Ok(values.len())
    }

    /// Asks the sensor to run its self-verification (`aV!`). The reply
    /// format is sensor specific and is accepted without interpretation.
    pub fn start_verification(&mut self, address: Sdi12Addr) -> Result<(), Sdi12Error<IF::Error>> {
        self.execute(&Command::StartVerification { address })?;
        Ok(())
    }

    /// Runs a single command through the full transaction envelope (break
    /// arbitration, retries, echo validation) and returns the responding
    /// address with the typed payload.
    pub fn transact(
        &mut self,
        command: &Command,
    ) -> Result<(Sdi12Addr, Payload), Sdi12Error<IF::Error>> {
        self.execute(command)
    }
}
