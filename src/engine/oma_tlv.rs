//! OMA LWM2M TLV encoding for array-valued resources.
//!
//! Each array element becomes one resource-instance TLV, numbered from 0:
//!
//! ```text
//! ┌──────────┬────────────┬──────────────┬───────────┐
//! │ type (1) │ id (1 | 2) │ length (0-3) │ value ... │
//! └──────────┴────────────┴──────────────┴───────────┘
//!
//! type byte:
//!   bits 7-6  identifier type (01 = resource instance)
//!   bit  5    id width        (0 = 8-bit, 1 = 16-bit)
//!   bits 4-3  length width    (00 = inline in bits 2-0, 01/10/11 = 8/16/24-bit)
//!   bits 2-0  inline length   (values shorter than 8 bytes)
//! ```
//!
//! Integers use the shortest of 1, 2, 4 or 8 bytes of big-endian two's
//! complement that holds the value.

use super::{EngineStatus, CLIENT_ERROR};

const TYPE_RESOURCE_INSTANCE: u8 = 0b0100_0000;
const ID_16BIT: u8 = 0b0010_0000;
const LEN_8BIT: u8 = 0b0000_1000;
const LEN_16BIT: u8 = 0b0001_0000;
const LEN_24BIT: u8 = 0b0001_1000;

/// Largest value a 24-bit TLV length field can carry
const MAX_VALUE_LEN: usize = 0x00FF_FFFF;

/// Encode integers as a sequence of resource-instance TLVs.
pub fn encode_int_array(values: &[i64]) -> std::result::Result<Vec<u8>, EngineStatus> {
    let mut buf = Vec::with_capacity(values.len() * 4);
    for (id, value) in values.iter().enumerate() {
        write_tlv(&mut buf, id, &int_bytes(*value))?;
    }
    Ok(buf)
}

/// Encode strings as a sequence of resource-instance TLVs.
pub fn encode_string_array(values: &[&str]) -> std::result::Result<Vec<u8>, EngineStatus> {
    let mut buf = Vec::with_capacity(values.iter().map(|v| v.len() + 3).sum());
    for (id, value) in values.iter().enumerate() {
        write_tlv(&mut buf, id, value.as_bytes())?;
    }
    Ok(buf)
}

/// Minimal big-endian two's complement representation.
fn int_bytes(value: i64) -> Vec<u8> {
    if let Ok(v) = i8::try_from(value) {
        v.to_be_bytes().to_vec()
    } else if let Ok(v) = i16::try_from(value) {
        v.to_be_bytes().to_vec()
    } else if let Ok(v) = i32::try_from(value) {
        v.to_be_bytes().to_vec()
    } else {
        value.to_be_bytes().to_vec()
    }
}

fn write_tlv(buf: &mut Vec<u8>, id: usize, value: &[u8]) -> std::result::Result<(), EngineStatus> {
    let id = u16::try_from(id).map_err(|_| CLIENT_ERROR)?;
    let len = value.len();
    if len > MAX_VALUE_LEN {
        return Err(CLIENT_ERROR);
    }

    let mut type_byte = TYPE_RESOURCE_INSTANCE;
    if id > 0xFF {
        type_byte |= ID_16BIT;
    }
    type_byte |= match len {
        0..=7 => len as u8,
        8..=0xFF => LEN_8BIT,
        0x100..=0xFFFF => LEN_16BIT,
        _ => LEN_24BIT,
    };

    buf.push(type_byte);
    if id > 0xFF {
        buf.extend_from_slice(&id.to_be_bytes());
    } else {
        buf.push(id as u8);
    }

    let len_bytes = (len as u32).to_be_bytes();
    match len {
        0..=7 => {},
        8..=0xFF => buf.push(len_bytes[3]),
        0x100..=0xFFFF => buf.extend_from_slice(&len_bytes[2..]),
        _ => buf.extend_from_slice(&len_bytes[1..]),
    }

    buf.extend_from_slice(value);
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Split a TLV sequence into `(id, value)` pairs.
    pub(crate) fn decode(mut data: &[u8]) -> Vec<(u16, Vec<u8>)> {
        let mut out = Vec::new();
        while let Some((&type_byte, rest)) = data.split_first() {
            assert_eq!(type_byte & 0xC0, TYPE_RESOURCE_INSTANCE);
            let (id, rest) = if type_byte & ID_16BIT != 0 {
                (u16::from_be_bytes([rest[0], rest[1]]), &rest[2..])
            } else {
                (u16::from(rest[0]), &rest[1..])
            };
            let (len, rest) = match type_byte & 0x18 {
                0 => ((type_byte & 0x07) as usize, rest),
                LEN_8BIT => (rest[0] as usize, &rest[1..]),
                LEN_16BIT => (u16::from_be_bytes([rest[0], rest[1]]) as usize, &rest[2..]),
                _ => (
                    u32::from_be_bytes([0, rest[0], rest[1], rest[2]]) as usize,
                    &rest[3..],
                ),
            };
            out.push((id, rest[..len].to_vec()));
            data = &rest[len..];
        }
        out
    }

    #[test]
    fn test_small_int_inline_length() {
        let buf = encode_int_array(&[5]).unwrap();
        // resource instance, id 0, inline length 1, value 0x05
        assert_eq!(buf, vec![0x41, 0x00, 0x05]);
    }

    #[test]
    fn test_int_widths() {
        let buf = encode_int_array(&[-1, 300, 70_000, 5_000_000_000]).unwrap();
        let decoded = decode(&buf);
        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded[0], (0, vec![0xFF]));
        assert_eq!(decoded[1], (1, 300i16.to_be_bytes().to_vec()));
        assert_eq!(decoded[2], (2, 70_000i32.to_be_bytes().to_vec()));
        assert_eq!(decoded[3], (3, 5_000_000_000i64.to_be_bytes().to_vec()));
    }

    #[test]
    fn test_string_lengths() {
        let long = "a".repeat(300);
        let buf = encode_string_array(&["ip", "192.168.100.200", &long]).unwrap();
        let decoded = decode(&buf);
        assert_eq!(decoded[0].1, b"ip");
        // 15 bytes needs an 8-bit length field
        assert_eq!(buf[2 + 2], 0x48);
        assert_eq!(decoded[1].1, b"192.168.100.200");
        assert_eq!(decoded[2].1.len(), 300);
    }

    #[test]
    fn test_sixteen_bit_ids() {
        let values: Vec<i64> = (0..300).collect();
        let decoded = decode(&encode_int_array(&values).unwrap());
        assert_eq!(decoded.len(), 300);
        assert_eq!(decoded[299].0, 299);
    }

    #[test]
    fn test_empty_string_element() {
        let buf = encode_string_array(&[""]).unwrap();
        assert_eq!(buf, vec![0x40, 0x00]);
    }
}
