//! Major-type framing.
//!
//! A header byte is `(major << 5) | info`. Values below 24 are stored in
//! `info` directly; larger values use `info` 24/25/26/27 followed by a
//! 1/2/4/8-byte big-endian value, always the shortest width that fits.

use std::io::Write;

/// CBOR major types. These codes differ from the stored
/// [`ValueType`](dagsql_types::ValueType) tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MajorType {
    UnsignedInteger = 0,
    NegativeInteger = 1,
    ByteString = 2,
    TextString = 3,
    Array = 4,
    Map = 5,
    Tag = 6,
    Simple = 7,
}

impl MajorType {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn from_code(code: u8) -> Self {
        match code & 0x07 {
            0 => Self::UnsignedInteger,
            1 => Self::NegativeInteger,
            2 => Self::ByteString,
            3 => Self::TextString,
            4 => Self::Array,
            5 => Self::Map,
            6 => Self::Tag,
            _ => Self::Simple,
        }
    }
}

/// Simple value code for `false`.
pub const SIMPLE_FALSE: u64 = 20;
/// Simple value code for `true`.
pub const SIMPLE_TRUE: u64 = 21;
/// Simple value code for `null`.
pub const SIMPLE_NULL: u64 = 22;

/// Marker `info` values announcing a 1/2/4/8-byte argument.
pub const INFO_U8: u8 = 24;
pub const INFO_U16: u8 = 25;
pub const INFO_U32: u8 = 26;
pub const INFO_U64: u8 = 27;
/// Indefinite-length marker (never emitted, rejected on decode).
pub const INFO_INDEFINITE: u8 = 31;

/// Encoded size of a header carrying `value`.
pub const fn header_len(value: u64) -> usize {
    if value < 24 {
        1
    } else if value <= u8::MAX as u64 {
        2
    } else if value <= u16::MAX as u64 {
        3
    } else if value <= u32::MAX as u64 {
        5
    } else {
        9
    }
}

/// Write the minimal header for `(major, value)` to a sink.
pub fn write_header<W: Write + ?Sized>(
    out: &mut W,
    major: MajorType,
    value: u64,
) -> std::io::Result<()> {
    let mut buf = [0u8; 9];
    let len = fill_header(&mut buf, major, value);
    out.write_all(&buf[..len])
}

/// The minimal header for `(major, value)`.
pub fn encode_header(major: MajorType, value: u64) -> Vec<u8> {
    let mut buf = [0u8; 9];
    let len = fill_header(&mut buf, major, value);
    buf[..len].to_vec()
}

fn fill_header(buf: &mut [u8; 9], major: MajorType, value: u64) -> usize {
    let m = major.code() << 5;
    match header_len(value) {
        1 => {
            buf[0] = m | value as u8;
            1
        }
        2 => {
            buf[0] = m | INFO_U8;
            buf[1] = value as u8;
            2
        }
        3 => {
            buf[0] = m | INFO_U16;
            buf[1..3].copy_from_slice(&(value as u16).to_be_bytes());
            3
        }
        5 => {
            buf[0] = m | INFO_U32;
            buf[1..5].copy_from_slice(&(value as u32).to_be_bytes());
            5
        }
        _ => {
            buf[0] = m | INFO_U64;
            buf[1..9].copy_from_slice(&value.to_be_bytes());
            9
        }
    }
}
