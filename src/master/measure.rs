// src/master/measure.rs

use super::Sdi12Master;
use crate::common::{
    address::Sdi12Addr,
    command::{Command, DataIndex, MeasurementIndex},
    error::Sdi12Error,
    hal_traits::{Sdi12Serial, Sdi12Timer},
    response::{parse_response, MeasurementHeader, Payload, ResponseShape},
};
use core::fmt::Debug;
use core::time::Duration;
use embedded_hal::digital::OutputPin;

impl<IF, EN> Sdi12Master<IF, EN>
where
    IF: Sdi12Serial + Sdi12Timer,
    IF::Error: Debug,
    EN: OutputPin,
{
    /// Starts a measurement (`aM!` / `aMC!`), waits until the sensor is
    /// ready and collects every declared value into `data_out`.
    ///
    /// Returns the number of values written. On failure the contents of
    /// `data_out` are unspecified.
    pub fn get_measurements(
        &mut self,
        address: Sdi12Addr,
        data_out: &mut [f64],
        use_crc: bool,
    ) -> Result<usize, Sdi12Error<IF::Error>> {
        let start = if use_crc {
            Command::StartMeasurementCrc { address }
        } else {
            Command::StartMeasurement { address }
        };
        self.run_measurement(address, &start, data_out)
    }

    /// Same as [`Self::get_measurements`] for an additional measurement
    /// (`aMn!` / `aMCn!`).
    pub fn get_additional_measurements(
        &mut self,
        address: Sdi12Addr,
        index: MeasurementIndex,
        data_out: &mut [f64],
        use_crc: bool,
    ) -> Result<usize, Sdi12Error<IF::Error>> {
        let start = if use_crc {
            Command::AdditionalMeasurementCrc { address, index }
        } else {
            Command::AdditionalMeasurement { address, index }
        };
        self.run_measurement(address, &start, data_out)
    }

    fn run_measurement(
        &mut self,
        address: Sdi12Addr,
        start: &Command,
        data_out: &mut [f64],
    ) -> Result<usize, Sdi12Error<IF::Error>> {
        let header = match self.execute(start) {
            Ok((_, Payload::Header(header))) => header,
            Ok(_) => return Err(Sdi12Error::InvalidFormat),
            Err(e) => {
                error!("requesting measurement failed");
                return Err(e);
            }
        };

        if usize::from(header.count) > data_out.len() {
            error!("more measurements than able to return");
            return Err(Sdi12Error::BufferOverflow {
                needed: usize::from(header.count),
                got: data_out.len(),
            });
        }

        debug!("waiting {}s for {} measurements", header.ready_in_sec, header.count);
        if header.ready_in_sec > 0 {
            self.await_service_request(address, header)?;
        }

        let mut collected = 0;
        let mut portion = 0;
        while collected < usize::from(header.count) {
            let index = DataIndex::new(portion)?;
            let values = match self.execute(&Command::SendData { address, index }) {
                Ok((_, Payload::Values(values))) => values,
                Ok(_) => return Err(Sdi12Error::InvalidFormat),
                Err(e) => {
                    error!("retrieving measurements failed");
                    return Err(e);
                }
            };
            // A sensor that answers with no values would loop forever.
            if values.is_empty() {
                warn!("empty send-data response before all values arrived");
                return Err(Sdi12Error::InvalidFormat);
            }
            for value in &values {
                if collected == data_out.len() {
                    error!("too many measurements returned");
                    return Err(Sdi12Error::BufferOverflow {
                        needed: collected + 1,
                        got: data_out.len(),
                    });
                }
                data_out[collected] = *value;
                collected += 1;
            }
            portion += 1;
        }

        Ok(collected)
    }

    /// Listens for the sensor's service request (`a<CR><LF>`) for up to
    /// `ready_in_sec`. A matching frame means the data is ready early;
    /// silence for the whole period means the declared time has passed and
    /// the sensor is ready by definition. A frame from any other address
    /// is a fault on this single-master bus.
    fn await_service_request(
        &mut self,
        address: Sdi12Addr,
        header: MeasurementHeader,
    ) -> Result<(), Sdi12Error<IF::Error>> {
        let timeout = Duration::from_secs(u64::from(header.ready_in_sec));
        let mut buffer = [0u8; 16];
        match self.read_response(&mut buffer, timeout, timeout) {
            Ok(len) => {
                self.last_activity = Some(self.interface.now());
                let (responder, _) = parse_response(
                    &buffer[..len],
                    ResponseShape::NoPayload,
                    false,
                    false,
                )?;
                if responder != address {
                    return Err(Sdi12Error::AddressMismatch {
                        expected: address.as_char(),
                        got: responder.as_char(),
                    });
                }
                debug!("service request from {}", responder.as_char());
                Ok(())
            }
            Err(Sdi12Error::Timeout) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
