// src/common/response.rs

use super::address::Sdi12Addr;
use super::crc;
use super::error::Sdi12Error;
use arrayvec::{ArrayString, ArrayVec};
use core::fmt::Debug;
use core::str::{self, FromStr};

/// Scratch size covering any legal response line.
pub const MAX_RESPONSE_LEN: usize = 100;

/// A value-list payload carries at most 75 characters.
pub const MAX_VALUE_CHARS: usize = 75;

/// Upper bound on values in one response (each takes a polarity sign plus
/// at least one digit).
pub const MAX_VALUES_PER_RESPONSE: usize = 37;

/// Payload shape expected for a command kind.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ResponseShape {
    /// `a<CR><LF>` — acknowledge, change-address echo, address query.
    NoPayload,
    /// `a` + five identification subfields.
    Identification,
    /// `atttn<CR><LF>` or `atttnn<CR><LF>`.
    MeasurementHeader,
    /// `a` + signed decimal values.
    ValueList,
    /// Anything; the payload content is not interpreted.
    FreeForm,
}

/// The identification tuple returned by `aI!`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SensorId {
    /// SDI-12 protocol version, two digits (e.g. `14`).
    pub sdi_version: ArrayString<2>,
    /// Vendor identification, blank padded.
    pub vendor: ArrayString<8>,
    /// Sensor model number, blank padded.
    pub model: ArrayString<6>,
    /// Sensor version.
    pub sensor_version: ArrayString<3>,
    /// Optional tail: serial number or similar, up to 13 characters.
    pub extra: ArrayString<13>,
}

/// Timing header returned by the measurement-start commands.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MeasurementHeader {
    /// Seconds until the data is ready, 0-999.
    pub ready_in_sec: u16,
    /// Number of values the sensor will return, 0-99. Two-digit counts
    /// only occur on concurrent-measurement responses.
    pub count: u8,
}

/// Values extracted from a send-data or continuous response, in wire order.
pub type ValueList = ArrayVec<f64, MAX_VALUES_PER_RESPONSE>;

/// Typed payload of a parsed response; the variant always matches the
/// requested [`ResponseShape`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    Id(SensorId),
    Header(MeasurementHeader),
    Values(ValueList),
    FreeForm,
}

fn ascii_field<const CAP: usize, E: Debug>(bytes: &[u8]) -> Result<ArrayString<CAP>, Sdi12Error<E>> {
    let text = str::from_utf8(bytes).map_err(|_| Sdi12Error::InvalidFormat)?;
    ArrayString::from(text).map_err(|_| Sdi12Error::InvalidFormat)
}

/// Parses a raw response line against the shape expected for the command
/// that elicited it.
///
/// `resp` is the line as received, including the `<CR><LF>` terminator.
/// `expects_crc` strips and verifies the 3-character ASCII CRC the command
/// kind demands; a value list additionally detects a CRC suffix on its own,
/// since a plain `aDn!` cannot know whether the measurement was started
/// with CRC. `allow_query_address` admits `?` as the address byte (address
/// query only).
///
/// Returns the responding address and the typed payload.
pub fn parse_response<E: Debug>(
    resp: &[u8],
    shape: ResponseShape,
    expects_crc: bool,
    allow_query_address: bool,
) -> Result<(Sdi12Addr, Payload), Sdi12Error<E>> {
    let first = match resp.first() {
        Some(&byte) => byte,
        None => return Err(Sdi12Error::InvalidFormat),
    };
    let address = match Sdi12Addr::from_response_byte(first, allow_query_address) {
        Ok(address) => address,
        Err(_) => {
            warn!("invalid response address {}", first);
            return Err(Sdi12Error::InvalidAddress(first as char));
        }
    };

    // Last <CR><LF> bounds the payload.
    let mut pld_end = 0;
    let mut idx = 1;
    while idx + 1 < resp.len() {
        if resp[idx] == b'\r' && resp[idx + 1] == b'\n' {
            pld_end = idx;
        }
        idx += 1;
    }
    if pld_end == 0 {
        warn!("malformed response (no termination)");
        return Err(Sdi12Error::InvalidFormat);
    }

    if expects_crc {
        if pld_end < 4 {
            warn!("malformed response (missing CRC)");
            return Err(Sdi12Error::InvalidFormat);
        }
        pld_end -= 3;
    }

    let payload = &resp[1..pld_end];

    let parsed = match shape {
        ResponseShape::NoPayload => {
            if !payload.is_empty() {
                warn!("unexpected payload ({} bytes)", payload.len());
                return Err(Sdi12Error::InvalidFormat);
            }
            Payload::None
        }
        ResponseShape::Identification => {
            // version(2) + vendor(8) + model(6) + sensor version(3),
            // then 0-13 free characters.
            if payload.len() < 19 || payload.len() > 32 {
                warn!("unexpected identification length {}", payload.len());
                return Err(Sdi12Error::InvalidFormat);
            }
            Payload::Id(SensorId {
                sdi_version: ascii_field(&payload[0..2])?,
                vendor: ascii_field(&payload[2..10])?,
                model: ascii_field(&payload[10..16])?,
                sensor_version: ascii_field(&payload[16..19])?,
                extra: ascii_field(&payload[19..])?,
            })
        }
        ResponseShape::MeasurementHeader => {
            if payload.len() < 4 || payload.len() > 5 {
                warn!("unexpected header length {}", payload.len());
                return Err(Sdi12Error::InvalidFormat);
            }
            if !payload.iter().all(|b| b.is_ascii_digit()) {
                warn!("non-digit in measurement header");
                return Err(Sdi12Error::InvalidFormat);
            }
            let secs = str::from_utf8(&payload[..3]).map_err(|_| Sdi12Error::InvalidFormat)?;
            let count = str::from_utf8(&payload[3..]).map_err(|_| Sdi12Error::InvalidFormat)?;
            Payload::Header(MeasurementHeader {
                ready_in_sec: u16::from_str(secs).map_err(|_| Sdi12Error::InvalidFormat)?,
                count: u8::from_str(count).map_err(|_| Sdi12Error::InvalidFormat)?,
            })
        }
        ResponseShape::ValueList => Payload::Values(parse_values(resp, payload, pld_end)?),
        ResponseShape::FreeForm => Payload::FreeForm,
    };

    if expects_crc {
        let received_bytes: &[u8; 3] = resp[pld_end..pld_end + 3]
            .try_into()
            .map_err(|_| Sdi12Error::InvalidFormat)?;
        let received = crc::decode_crc_ascii(received_bytes);
        let calculated = crc::calculate_crc16(&resp[..pld_end]);
        if received != calculated {
            warn!("incorrect CRC (received {}, calculated {})", received, calculated);
            return Err(Sdi12Error::CrcMismatch { received, calculated });
        }
    }

    Ok((address, parsed))
}

/// Scans `payload` as a run of sign-prefixed decimal values.
///
/// The cursor must either consume the whole payload or stop exactly three
/// bytes short of it, in which case those bytes are an ASCII CRC over
/// everything before them (a send-data reply carries one whenever the
/// measurement was started with a CRC variant).
fn parse_values<E: Debug>(
    resp: &[u8],
    payload: &[u8],
    pld_end: usize,
) -> Result<ValueList, Sdi12Error<E>> {
    let mut values = ValueList::new();
    if payload.is_empty() {
        return Ok(values);
    }
    if payload.len() > MAX_VALUE_CHARS {
        warn!("unexpected value payload length {}", payload.len());
        return Err(Sdi12Error::InvalidFormat);
    }
    if payload[0] != b'+' && payload[0] != b'-' {
        warn!("unexpected value payload format (missing polarity)");
        return Err(Sdi12Error::InvalidFormat);
    }

    let mut cursor = 0;
    while cursor < payload.len() && (payload[cursor] == b'+' || payload[cursor] == b'-') {
        let start = cursor;
        cursor += 1;
        let mut seen_point = false;
        while cursor < payload.len() {
            match payload[cursor] {
                b'0'..=b'9' => cursor += 1,
                b'.' if !seen_point => {
                    seen_point = true;
                    cursor += 1;
                }
                _ => break,
            }
        }
        // A bare sign is not a value.
        if cursor - start < 2 {
            return Err(Sdi12Error::InvalidFormat);
        }
        let text = str::from_utf8(&payload[start..cursor]).map_err(|_| Sdi12Error::InvalidFormat)?;
        let value = f64::from_str(text).map_err(|_| Sdi12Error::InvalidFormat)?;
        values
            .try_push(value)
            .map_err(|_| Sdi12Error::BufferOverflow {
                needed: values.len() + 1,
                got: MAX_VALUES_PER_RESPONSE,
            })?;
    }

    let leftover = payload.len() - cursor;
    if leftover == 0 {
        Ok(values)
    } else if leftover == 3 {
        // Assume a CRC at the end; nothing in a send-data command itself
        // says whether the sensor was asked for one.
        let received_bytes: &[u8; 3] = payload[cursor..]
            .try_into()
            .map_err(|_| Sdi12Error::InvalidFormat)?;
        let received = crc::decode_crc_ascii(received_bytes);
        let calculated = crc::calculate_crc16(&resp[..pld_end - 3]);
        if received != calculated {
            warn!("incorrect CRC on value list");
            return Err(Sdi12Error::CrcMismatch { received, calculated });
        }
        Ok(values)
    } else {
        warn!("unexpected value payload format");
        Err(Sdi12Error::InvalidFormat)
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    type Result<T> = core::result::Result<T, Sdi12Error<()>>;

    fn parse(resp: &[u8], shape: ResponseShape, crc: bool) -> Result<(Sdi12Addr, Payload)> {
        parse_response(resp, shape, crc, false)
    }

    fn assert_values(payload: Payload, expected: &[f64]) {
        let values = match payload {
            Payload::Values(v) => v,
            other => panic!("expected values, got {:?}", other),
        };
        assert_eq!(values.len(), expected.len(), "value count");
        for (got, want) in values.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "value mismatch: {} != {}", got, want);
        }
    }

    #[test]
    fn test_ack_active() {
        let (addr, payload) = parse(b"7\r\n", ResponseShape::NoPayload, false).unwrap();
        assert_eq!(addr.as_char(), '7');
        assert_eq!(payload, Payload::None);
    }

    #[test]
    fn test_no_payload_rejects_payload() {
        assert!(matches!(
            parse(b"7xx\r\n", ResponseShape::NoPayload, false),
            Err(Sdi12Error::InvalidFormat)
        ));
    }

    #[test]
    fn test_missing_terminator() {
        assert!(matches!(
            parse(b"7+1.11", ResponseShape::ValueList, false),
            Err(Sdi12Error::InvalidFormat)
        ));
        assert!(matches!(
            parse(b"7", ResponseShape::NoPayload, false),
            Err(Sdi12Error::InvalidFormat)
        ));
        assert!(matches!(
            parse(b"", ResponseShape::NoPayload, false),
            Err(Sdi12Error::InvalidFormat)
        ));
    }

    #[test]
    fn test_address_validation() {
        assert!(matches!(
            parse(b"$\r\n", ResponseShape::NoPayload, false),
            Err(Sdi12Error::InvalidAddress('$'))
        ));
        // '?' is only accepted when the command was an address query.
        assert!(matches!(
            parse(b"?\r\n", ResponseShape::NoPayload, false),
            Err(Sdi12Error::InvalidAddress('?'))
        ));
        let (addr, _) = parse_response::<()>(b"?\r\n", ResponseShape::NoPayload, false, true).unwrap();
        assert!(addr.is_query());
    }

    #[test]
    fn test_identification() {
        let (addr, payload) =
            parse(b"714companyxsensor123optional\r\n", ResponseShape::Identification, false)
                .unwrap();
        assert_eq!(addr.as_char(), '7');
        let id = match payload {
            Payload::Id(id) => id,
            other => panic!("expected identification, got {:?}", other),
        };
        assert_eq!(id.sdi_version.as_str(), "14");
        assert_eq!(id.vendor.as_str(), "companyx");
        assert_eq!(id.model.as_str(), "sensor");
        assert_eq!(id.sensor_version.as_str(), "123");
        assert_eq!(id.extra.as_str(), "optional");
    }

    #[test]
    fn test_identification_blank_padded() {
        let (_, payload) =
            parse(b"014MANUFAC SENSOR0011.0extra\r\n", ResponseShape::Identification, false)
                .unwrap();
        let id = match payload {
            Payload::Id(id) => id,
            other => panic!("expected identification, got {:?}", other),
        };
        assert_eq!(id.sdi_version.as_str(), "14");
        assert_eq!(id.vendor.as_str(), "MANUFAC ");
        assert_eq!(id.model.as_str(), "SENSOR");
        assert_eq!(id.sensor_version.as_str(), "001");
        assert_eq!(id.extra.as_str(), "1.0extra");
    }

    #[test]
    fn test_identification_no_tail() {
        let (_, payload) =
            parse(b"013VENDOR__MODEL_001\r\n", ResponseShape::Identification, false).unwrap();
        let id = match payload {
            Payload::Id(id) => id,
            other => panic!("expected identification, got {:?}", other),
        };
        assert_eq!(id.sensor_version.as_str(), "001");
        assert!(id.extra.is_empty());
    }

    #[test]
    fn test_identification_length_bounds() {
        // 18 payload characters: one short of the fixed fields.
        assert!(matches!(
            parse(b"013VENDOR__MODEL_00\r\n", ResponseShape::Identification, false),
            Err(Sdi12Error::InvalidFormat)
        ));
        // 33 payload characters: tail too long.
        assert!(matches!(
            parse(
                b"013VENDOR__MODEL_001abcdefghijklmn\r\n",
                ResponseShape::Identification,
                false
            ),
            Err(Sdi12Error::InvalidFormat)
        ));
    }

    #[test]
    fn test_measurement_header() {
        let (addr, payload) = parse(b"73335\r\n", ResponseShape::MeasurementHeader, false).unwrap();
        assert_eq!(addr.as_char(), '7');
        assert_eq!(
            payload,
            Payload::Header(MeasurementHeader { ready_in_sec: 333, count: 5 })
        );
    }

    #[test]
    fn test_measurement_header_two_digit_count() {
        let (_, payload) = parse(b"733355\r\n", ResponseShape::MeasurementHeader, false).unwrap();
        assert_eq!(
            payload,
            Payload::Header(MeasurementHeader { ready_in_sec: 333, count: 55 })
        );
    }

    #[test]
    fn test_measurement_header_with_crc() {
        let (_, payload) = parse(b"73335Fc^\r\n", ResponseShape::MeasurementHeader, true).unwrap();
        assert_eq!(
            payload,
            Payload::Header(MeasurementHeader { ready_in_sec: 333, count: 5 })
        );
        let (_, payload) = parse(b"733355D|h\r\n", ResponseShape::MeasurementHeader, true).unwrap();
        assert_eq!(
            payload,
            Payload::Header(MeasurementHeader { ready_in_sec: 333, count: 55 })
        );
    }

    #[test]
    fn test_measurement_header_bad_crc() {
        assert!(matches!(
            parse(b"73335foo\r\n", ResponseShape::MeasurementHeader, true),
            Err(Sdi12Error::CrcMismatch { .. })
        ));
    }

    #[test]
    fn test_measurement_header_malformed() {
        assert!(matches!(
            parse(b"7123\r\n", ResponseShape::MeasurementHeader, false),
            Err(Sdi12Error::InvalidFormat)
        ));
        assert!(matches!(
            parse(b"70a03\r\n", ResponseShape::MeasurementHeader, false),
            Err(Sdi12Error::InvalidFormat)
        ));
        assert!(matches!(
            parse(b"7000355\r\n", ResponseShape::MeasurementHeader, false),
            Err(Sdi12Error::InvalidFormat)
        ));
    }

    #[test]
    fn test_single_value() {
        let (_, payload) = parse(b"7-7.77\r\n", ResponseShape::ValueList, false).unwrap();
        assert_values(payload, &[-7.77]);
    }

    #[test]
    fn test_multiple_values() {
        let (_, payload) =
            parse(b"7-1.11+2.22-3.33+4.44\r\n", ResponseShape::ValueList, false).unwrap();
        assert_values(payload, &[-1.11, 2.22, -3.33, 4.44]);
    }

    #[test]
    fn test_values_without_decimals() {
        let (_, payload) = parse(b"1+1.23+2.34+345+4.4678\r\n", ResponseShape::ValueList, false)
            .unwrap();
        assert_values(payload, &[1.23, 2.34, 345.0, 4.4678]);
    }

    #[test]
    fn test_empty_value_list() {
        let (_, payload) = parse(b"7\r\n", ResponseShape::ValueList, false).unwrap();
        assert_values(payload, &[]);
    }

    #[test]
    fn test_values_with_trailing_crc() {
        // A send-data reply after a CRC-variant measurement start; the
        // command kind itself does not declare the CRC.
        let (_, payload) =
            parse(b"7-1.11+2.22-3.33+4.44MpV\r\n", ResponseShape::ValueList, false).unwrap();
        assert_values(payload, &[-1.11, 2.22, -3.33, 4.44]);
    }

    #[test]
    fn test_values_with_corrupt_trailing_crc() {
        assert!(matches!(
            parse(b"7-1.11+2.22-3.33+4.44MpW\r\n", ResponseShape::ValueList, false),
            Err(Sdi12Error::CrcMismatch { .. })
        ));
    }

    #[test]
    fn test_values_declared_crc() {
        // Continuous-with-CRC reply: the CRC is stripped before the scan.
        let body = b"7+1.11-2.22";
        let mut frame = std::vec::Vec::from(&body[..]);
        frame.extend_from_slice(&crate::common::crc::encode_crc_ascii(
            crate::common::crc::calculate_crc16(body),
        ));
        frame.extend_from_slice(b"\r\n");
        let (_, payload) = parse(&frame, ResponseShape::ValueList, true).unwrap();
        assert_values(payload, &[1.11, -2.22]);
    }

    #[test]
    fn test_values_missing_polarity() {
        assert!(matches!(
            parse(b"71.23\r\n", ResponseShape::ValueList, false),
            Err(Sdi12Error::InvalidFormat)
        ));
    }

    #[test]
    fn test_values_garbage_tail() {
        // Two unparsed bytes: neither a clean end nor a CRC suffix.
        assert!(matches!(
            parse(b"7+1.11xy\r\n", ResponseShape::ValueList, false),
            Err(Sdi12Error::InvalidFormat)
        ));
        // A bare sign is not a value.
        assert!(matches!(
            parse(b"7+1.11+\r\n", ResponseShape::ValueList, false),
            Err(Sdi12Error::InvalidFormat)
        ));
    }

    #[test]
    fn test_values_second_decimal_point_ends_value() {
        // The scanner stops at the second '.', leaving an unparseable
        // tail of one byte.
        assert!(matches!(
            parse(b"7+1.2.3\r\n", ResponseShape::ValueList, false),
            Err(Sdi12Error::InvalidFormat)
        ));
    }

    #[test]
    fn test_free_form() {
        let (addr, payload) = parse(b"7anything at all\r\n", ResponseShape::FreeForm, false).unwrap();
        assert_eq!(addr.as_char(), '7');
        assert_eq!(payload, Payload::FreeForm);
    }

    #[test]
    fn test_terminator_scan_keeps_last() {
        // An embedded CR/LF pair inside a free-form reply does not end the
        // payload early.
        let (_, payload) = parse(b"7abc\r\ndef\r\n", ResponseShape::FreeForm, false).unwrap();
        assert_eq!(payload, Payload::FreeForm);
    }
}
