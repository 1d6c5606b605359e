// src/common/timing.rs

use core::time::Duration;

// Nominal values from SDI-12 v1.4 sections 7.0-7.2; tolerances are
// generally +/- 0.40 ms and are folded into the margins below.

/// Minimum duration of the wake break (continuous spacing).
pub const BREAK_DURATION_MIN: Duration = Duration::from_millis(12);

/// Marking time the master holds after a break before the command
/// (the spec requires >= 8.33 ms).
pub const MARKING: Duration = Duration::from_millis(9);

/// Once the line has been idle this long, a break must precede the next
/// command (Sec 7.1: sensors may return to standby after 87 ms).
pub const BREAK_NEEDED_AFTER: Duration = Duration::from_millis(87);

/// Maximum time from the end of a command to the first response byte:
/// 17 ms per the spec plus a 9 ms margin.
pub const RESPONSE_START_TIMEOUT: Duration = Duration::from_millis(17 + 9);

/// Maximum total time for a complete response.
pub const RESPONSE_END_TIMEOUT: Duration = Duration::from_millis(780);

/// Delay between fast-retry attempts (Sec 7.2: a retry must wait at least
/// 16.67 ms after the previous command).
pub const RETRY_DELAY: Duration = Duration::from_millis(17 + 10);

/// Window within which a retry may be issued without re-breaking.
pub const RETRY_WINDOW: Duration = Duration::from_millis(100);

/// Fast (no re-break) attempts guaranteed per wake cycle.
pub const INNER_TRIES_MIN: usize = 3;

/// Wake cycles (break + fast attempts) before a transaction gives up.
pub const OUTER_TRIES_MIN: usize = 3;

// === Byte timing at 1200 baud, 7E1 ===
// 1 start + 7 data + 1 parity + 1 stop = 10 bits, 0.833 ms each.

/// Nominal duration of one byte on the wire.
pub const BYTE_DURATION: Duration = Duration::from_micros(8333);

/// Worst-case marking allowed between characters of one frame (1.66 ms,
/// no tolerance), rounded up as a per-byte transmit allowance.
pub const INTER_SYMBOL_GRACE: Duration = Duration::from_micros(1660);
