// src/master/transaction.rs

use super::Sdi12Master;
use crate::common::{
    address::Sdi12Addr,
    command::Command,
    error::Sdi12Error,
    hal_traits::{Sdi12Serial, Sdi12Timer},
    response::{parse_response, Payload, MAX_RESPONSE_LEN},
    timing,
};
use core::fmt::Debug;
use embedded_hal::digital::OutputPin;

impl<IF, EN> Sdi12Master<IF, EN>
where
    IF: Sdi12Serial + Sdi12Timer,
    IF::Error: Debug,
    EN: OutputPin,
{
    /// Executes one command-response exchange inside the full timing
    /// envelope.
    ///
    /// The outer loop wakes the bus (a break on the first pass only when
    /// the inactivity window or an address change demands one, then
    /// unconditionally on every retry) and runs the inner loop, which
    /// re-sends the command without re-breaking: at least
    /// [`timing::INNER_TRIES_MIN`] attempts, further ones while the retry
    /// window is open. CRC failures are not retried at all; they prove the
    /// exchange itself worked.
    pub(super) fn execute(
        &mut self,
        command: &Command,
    ) -> Result<(Sdi12Addr, Payload), Sdi12Error<IF::Error>> {
        let image = command.format_into()?;

        let mut force_break = false;
        let mut last_error = Sdi12Error::Timeout;
        for _ in 0..timing::OUTER_TRIES_MIN {
            self.ensure_awake(command.address(), force_break)?;
            force_break = true;

            match self.attempt_exchange(command, image.as_bytes()) {
                Ok(result) => return Ok(result),
                // The bus layer works; retrying would hide a real fault.
                Err(e @ Sdi12Error::CrcMismatch { .. }) => return Err(e),
                Err(
                    e @ (Sdi12Error::Io(_)
                    | Sdi12Error::BufferOverflow { .. }
                    | Sdi12Error::ConfigError),
                ) => return Err(e),
                Err(e) => {
                    debug!("exchange failed, re-breaking");
                    last_error = e;
                }
            }
        }
        error!("transaction failed after all retries");
        Err(last_error)
    }

    /// One wake cycle: transmit and listen, fast-retrying on silence.
    fn attempt_exchange(
        &mut self,
        command: &Command,
        image: &[u8],
    ) -> Result<(Sdi12Addr, Payload), Sdi12Error<IF::Error>> {
        let mut buffer = [0u8; MAX_RESPONSE_LEN];
        let window_start = self.interface.now();
        let mut tries = 0;

        loop {
            tries += 1;
            self.send_command(image)?;

            match self.read_response(
                &mut buffer,
                timing::RESPONSE_START_TIMEOUT,
                timing::RESPONSE_END_TIMEOUT,
            ) {
                Ok(len) => {
                    self.last_activity = Some(self.interface.now());
                    let (address, payload) = parse_response(
                        &buffer[..len],
                        command.response_shape(),
                        command.expects_crc(),
                        matches!(command, Command::AddressQuery),
                    )?;
                    self.check_echo(command, address)?;
                    self.last_address = Some(address);
                    return Ok((address, payload));
                }
                Err(Sdi12Error::Timeout) => {
                    let window_open =
                        self.interface.now() - window_start < timing::RETRY_WINDOW;
                    if tries >= timing::INNER_TRIES_MIN && !window_open {
                        return Err(Sdi12Error::Timeout);
                    }
                    debug!("no response, fast retry");
                    self.interface.delay_ms(timing::RETRY_DELAY.as_millis() as u32);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// A response must come from the sensor the command addressed; a
    /// change-address reply must carry the new address. The address query
    /// accepts any responder.
    fn check_echo(
        &self,
        command: &Command,
        got: Sdi12Addr,
    ) -> Result<(), Sdi12Error<IF::Error>> {
        let expected = match command {
            Command::AddressQuery => return Ok(()),
            Command::ChangeAddress { new_address, .. } => *new_address,
            _ => command.address(),
        };
        if got != expected {
            debug!("cmd-resp address mismatch");
            return Err(Sdi12Error::AddressMismatch {
                expected: expected.as_char(),
                got: got.as_char(),
            });
        }
        Ok(())
    }
}
