// src/common/crc.rs

use super::error::Sdi12Error;
use crc::{Algorithm, Crc};

/// CRC algorithm from the SDI-12 specification (CRC-16/ARC).
///
/// Polynomial 0x8005 (0xA001 in the reflected form the spec's pseudo-code
/// shifts with), initial value 0x0000, reflected in and out, no final XOR.
/// Check value 0xBB3D for "123456789".
pub const SDI12_CRC: Algorithm<u16> = Algorithm {
    poly: 0x8005,
    init: 0x0000,
    refin: true,
    refout: true,
    xorout: 0x0000,
    check: 0xBB3D,
    width: 16,
    residue: 0x0000,
};

const CRC_COMPUTER: Crc<u16> = Crc::<u16>::new(&SDI12_CRC);

/// Calculates the SDI-12 CRC-16 over `data`.
///
/// The input runs from the response's address byte up to (not including)
/// the CRC characters and the `<CR><LF>` terminator.
#[inline]
pub fn calculate_crc16(data: &[u8]) -> u16 {
    CRC_COMPUTER.checksum(data)
}

/// Encodes a 16-bit CRC as three printable ASCII characters per section
/// 4.4.12.2 of the SDI-12 specification: three 6-bit groups, each ORed
/// with 0x40.
pub fn encode_crc_ascii(crc_value: u16) -> [u8; 3] {
    [
        0x40 | ((crc_value >> 12) & 0x3F) as u8,
        0x40 | ((crc_value >> 6) & 0x3F) as u8,
        0x40 | (crc_value & 0x3F) as u8,
    ]
}

/// Decodes three SDI-12 ASCII CRC characters back into the 16-bit value.
pub fn decode_crc_ascii(crc_chars: &[u8; 3]) -> u16 {
    let b1 = u16::from(crc_chars[0] & 0x3F);
    let b2 = u16::from(crc_chars[1] & 0x3F);
    let b3 = u16::from(crc_chars[2] & 0x3F);
    (b1 << 12) | (b2 << 6) | b3
}

/// Verifies a response slice whose last three bytes are an ASCII CRC.
///
/// `frame` starts at the address byte and must not include `<CR><LF>`.
pub fn verify_ascii_suffix<E>(frame: &[u8]) -> Result<(), Sdi12Error<E>>
where
    E: core::fmt::Debug,
{
    if frame.len() < 4 {
        return Err(Sdi12Error::InvalidFormat);
    }
    let data_len = frame.len() - 3;
    let received_bytes: &[u8; 3] = frame[data_len..]
        .try_into()
        .map_err(|_| Sdi12Error::InvalidFormat)?;

    let calculated = calculate_crc16(&frame[..data_len]);
    let received = decode_crc_ascii(received_bytes);

    if calculated == received {
        Ok(())
    } else {
        Err(Sdi12Error::CrcMismatch { received, calculated })
    }
}
