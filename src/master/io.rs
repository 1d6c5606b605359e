// src/master/io.rs

use super::{Sdi12Master, TxEnablePolarity};
use crate::common::{
    address::Sdi12Addr,
    error::Sdi12Error,
    frame::{FrameFormat, TERMINATOR},
    hal_traits::{Sdi12Serial, Sdi12Timer},
    timing,
};
use core::fmt::Debug;
use core::time::Duration;
use embedded_hal::digital::OutputPin;
use nb::Result as NbResult;

impl<IF, EN> Sdi12Master<IF, EN>
where
    IF: Sdi12Serial + Sdi12Timer,
    IF::Error: Debug,
    EN: OutputPin,
{
    /// Drives the transceiver direction line, honouring its polarity.
    pub(super) fn set_tx_enable(&mut self, on: bool) -> Result<(), Sdi12Error<IF::Error>> {
        let high = match self.polarity {
            TxEnablePolarity::ActiveHigh => on,
            TxEnablePolarity::ActiveLow => !on,
        };
        let result = if high { self.tx_enable.set_high() } else { self.tx_enable.set_low() };
        result.map_err(|_| Sdi12Error::ConfigError)
    }

    /// Polls a non-blocking operation until it completes or `deadline`
    /// passes.
    pub(super) fn block_until<FN, T>(
        &mut self,
        deadline: <IF as Sdi12Timer>::Instant,
        mut f: FN,
    ) -> Result<T, Sdi12Error<IF::Error>>
    where
        FN: FnMut(&mut IF) -> NbResult<T, IF::Error>,
    {
        loop {
            match f(&mut self.interface) {
                Ok(value) => return Ok(value),
                Err(nb::Error::WouldBlock) => {
                    if self.interface.now() >= deadline {
                        return Err(Sdi12Error::Timeout);
                    }
                    // Short backoff instead of a hard spin.
                    self.interface.delay_us(100);
                }
                Err(nb::Error::Other(e)) => return Err(Sdi12Error::Io(e)),
            }
        }
    }

    pub(super) fn block_on<FN, T>(
        &mut self,
        timeout: Duration,
        f: FN,
    ) -> Result<T, Sdi12Error<IF::Error>>
    where
        FN: FnMut(&mut IF) -> NbResult<T, IF::Error>,
    {
        let deadline = self.interface.now() + timeout;
        self.block_until(deadline, f)
    }

    /// Sends the wake break and holds the post-break marking period. The
    /// transceiver is left in transmit direction for the command that
    /// must follow.
    pub(super) fn wake_bus(&mut self) -> Result<(), Sdi12Error<IF::Error>> {
        debug!("sending break");
        self.set_tx_enable(true)?;
        let result = self.block_on(timing::BREAK_DURATION_MIN + Duration::from_millis(5), |iface| {
            iface.send_break()
        });
        if result.is_err() {
            let _ = self.set_tx_enable(false);
        }
        result?;
        self.interface.delay_ms(timing::MARKING.as_millis() as u32);
        Ok(())
    }

    /// Sends a break first when the protocol demands one: on the first
    /// command ever, after the bus has idled past the wake window, when
    /// the target differs from the last sensor addressed, or when `force`
    /// is set (outer retries re-break unconditionally).
    pub(super) fn ensure_awake(
        &mut self,
        target: Sdi12Addr,
        force: bool,
    ) -> Result<(), Sdi12Error<IF::Error>> {
        let within_window = match self.last_activity {
            Some(last) => self.interface.now() - last < timing::BREAK_NEEDED_AFTER,
            None => false,
        };
        if force || !within_window || self.last_address != Some(target) {
            self.wake_bus()?;
        }
        Ok(())
    }

    /// Transmits a formatted command followed by `<CR><LF>`, bracketed by
    /// the direction line, and arms the inactivity window.
    pub(super) fn send_command(&mut self, command: &[u8]) -> Result<(), Sdi12Error<IF::Error>> {
        self.set_tx_enable(true)?;
        let result = self.transmit(command);
        let direction = self.set_tx_enable(false);
        result?;
        direction?;
        self.last_activity = Some(self.interface.now());
        Ok(())
    }

    fn transmit(&mut self, command: &[u8]) -> Result<(), Sdi12Error<IF::Error>> {
        // The adapter may still be configured for the break frame.
        self.interface
            .set_config(FrameFormat::Sdi12_7e1)
            .map_err(|_| Sdi12Error::ConfigError)?;

        let n_bytes = (command.len() + TERMINATOR.len()) as u32;
        let write_timeout = (timing::BYTE_DURATION + timing::INTER_SYMBOL_GRACE) * n_bytes
            + Duration::from_millis(20);
        for &byte in command.iter().chain(TERMINATOR.iter()) {
            self.block_on(write_timeout, |iface| iface.write_byte(byte))?;
        }
        self.block_on(Duration::from_millis(10), |iface| iface.flush())?;
        debug!("TX: {=[u8]:a}", command);
        Ok(())
    }

    /// Reads a `<CR><LF>`-terminated response line.
    ///
    /// `start_timeout` bounds the wait for the first byte, `total_timeout`
    /// the whole line. Filling `buffer` before the terminator arrives is
    /// `BufferOverflow`; running out of time either way is `Timeout`.
    pub(super) fn read_response(
        &mut self,
        buffer: &mut [u8],
        start_timeout: Duration,
        total_timeout: Duration,
    ) -> Result<usize, Sdi12Error<IF::Error>> {
        let begin = self.interface.now();
        let first_deadline = begin + start_timeout;
        let overall_deadline = begin + total_timeout;

        let mut len = 0;
        loop {
            if len == buffer.len() {
                return Err(Sdi12Error::BufferOverflow { needed: len + 1, got: buffer.len() });
            }
            let deadline = if len == 0 { first_deadline } else { overall_deadline };
            let byte = self.block_until(deadline, |iface| iface.read_byte())?;
            buffer[len] = byte;
            len += 1;

            if len >= 2 && buffer[len - 2..len] == TERMINATOR[..] {
                debug!("RX: {=[u8]:a}", &buffer[..len]);
                return Ok(len);
            }
        }
    }
}
