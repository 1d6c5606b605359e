// src/common/frame.rs

/// Terminator closing every command and response on the wire.
pub const TERMINATOR: &[u8; 2] = b"\r\n";

/// Serial frame formats the engine asks the adapter for.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameFormat {
    /// Standard SDI-12 format: 1200 baud, 7 data bits, even parity, 1 stop
    /// bit, no flow control.
    Sdi12_7e1,
    /// The same frame at 750 baud. Clocking out a single zero byte in this
    /// format holds the line spacing for more than 12 ms; adapters without
    /// native break support generate the wake break this way.
    Break750,
}
