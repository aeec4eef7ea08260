//! Binary codec primitives (spec §4.1).
//!
//! `Encoder`/`Decoder` read and write the primitive wire types the rest of
//! the crate builds on: bool, int (32-bit), long (64-bit), double
//! (IEEE-754), UUID (16 raw bytes, network order), length-prefixed string
//! and bytes, small non-negative "enum" tags, and optional wrappers around
//! any of the above.
//!
//! ## Wire encoding (not specified further by spec.md; fixed here)
//!
//! - `bool`: one byte, 0 or 1.
//! - `int`/`long`/`enum`: zigzag LEB128 varint. Most values the protocol
//!   carries (sequence ids, small tags, millisecond deltas) are small, so a
//!   varint is both compact and — because it has no fixed width — identical
//!   between the padded and compact framing variants (the padding is a
//!   connection-level prefix, never interleaved with primitives).
//! - `double`: 8 bytes, IEEE-754 big-endian bit pattern.
//! - `uuid`: 16 raw bytes, network (big-endian) order.
//! - `string`/`bytes`: unsigned varint length prefix followed by the raw
//!   UTF-8/binary content.
//! - `optional<T>`: one tag byte (0 = absent, 1 = present) followed by `T`
//!   when present.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::error::{ConvError, ConvResult};

/// Tag byte written by `writeOptionalX` / read by `readOptionalX`.
const TAG_ABSENT: u8 = 0;
const TAG_PRESENT: u8 = 1;

/// Growable output buffer for serializing a single IQ body.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Consume the encoder, returning the accumulated bytes.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(if value { 1 } else { 0 });
    }

    pub fn write_int(&mut self, value: i32) {
        write_varint_zigzag(&mut self.buf, value as i64);
    }

    pub fn write_long(&mut self, value: i64) {
        write_varint_zigzag(&mut self.buf, value);
    }

    pub fn write_double(&mut self, value: f64) {
        self.buf.put_f64(value);
    }

    pub fn write_uuid(&mut self, value: Uuid) {
        self.buf.put_slice(value.as_bytes());
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    pub fn write_bytes(&mut self, value: &[u8]) {
        write_varint_unsigned(&mut self.buf, value.len() as u64);
        self.buf.put_slice(value);
    }

    /// Writes a small non-negative tag (enum discriminant).
    pub fn write_enum(&mut self, tag: i32) {
        debug_assert!(tag >= 0, "enum tags must be non-negative");
        write_varint_unsigned(&mut self.buf, tag as u64);
    }

    /// Writes the absent-optional tag on its own (used when the caller needs
    /// to short-circuit before a value exists, per spec §4.1 `writeZero`).
    pub fn write_zero(&mut self) {
        self.buf.put_u8(TAG_ABSENT);
    }

    pub fn write_optional_bool(&mut self, value: Option<bool>) {
        self.write_optional(value, Self::write_bool)
    }

    pub fn write_optional_int(&mut self, value: Option<i32>) {
        self.write_optional(value, Self::write_int)
    }

    pub fn write_optional_long(&mut self, value: Option<i64>) {
        self.write_optional(value, Self::write_long)
    }

    pub fn write_optional_uuid(&mut self, value: Option<Uuid>) {
        self.write_optional(value, Self::write_uuid)
    }

    pub fn write_optional_string(&mut self, value: Option<&str>) {
        match value {
            None => self.write_zero(),
            Some(v) => {
                self.buf.put_u8(TAG_PRESENT);
                self.write_string(v);
            }
        }
    }

    pub fn write_optional_bytes(&mut self, value: Option<&[u8]>) {
        match value {
            None => self.write_zero(),
            Some(v) => {
                self.buf.put_u8(TAG_PRESENT);
                self.write_bytes(v);
            }
        }
    }

    fn write_optional<T>(&mut self, value: Option<T>, write: impl FnOnce(&mut Self, T)) {
        match value {
            None => self.write_zero(),
            Some(v) => {
                self.buf.put_u8(TAG_PRESENT);
                write(self, v);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Read cursor over a single IQ body.
pub struct Decoder<'a> {
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, n: usize) -> ConvResult<()> {
        if self.buf.remaining() < n {
            return Err(ConvError::BufferUnderrun {
                needed: n,
                available: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_bool(&mut self) -> ConvResult<bool> {
        self.need(1)?;
        Ok(self.buf.get_u8() != 0)
    }

    pub fn read_int(&mut self) -> ConvResult<i32> {
        Ok(read_varint_zigzag(&mut self.buf)? as i32)
    }

    pub fn read_long(&mut self) -> ConvResult<i64> {
        read_varint_zigzag(&mut self.buf)
    }

    pub fn read_double(&mut self) -> ConvResult<f64> {
        self.need(8)?;
        Ok(self.buf.get_f64())
    }

    pub fn read_uuid(&mut self) -> ConvResult<Uuid> {
        self.need(16)?;
        let mut bytes = [0u8; 16];
        self.buf.copy_to_slice(&mut bytes);
        Ok(Uuid::from_bytes(bytes))
    }

    pub fn read_string(&mut self) -> ConvResult<String> {
        let raw = self.read_bytes()?;
        String::from_utf8(raw).map_err(|e| ConvError::Malformed {
            reason: format!("string is not valid UTF-8: {e}"),
        })
    }

    pub fn read_bytes(&mut self) -> ConvResult<Vec<u8>> {
        let len = read_varint_unsigned(&mut self.buf)? as usize;
        self.need(len)?;
        let mut out = vec![0u8; len];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    /// Reads an enum tag and validates it falls in `0..variant_count`.
    pub fn read_enum(&mut self, type_name: &'static str, variant_count: i32) -> ConvResult<i32> {
        let tag = read_varint_unsigned(&mut self.buf)? as i32;
        if tag < 0 || tag >= variant_count {
            return Err(ConvError::InvalidEnumTag { tag, type_name });
        }
        Ok(tag)
    }

    fn read_option_tag(&mut self) -> ConvResult<bool> {
        self.need(1)?;
        match self.buf.get_u8() {
            TAG_ABSENT => Ok(false),
            TAG_PRESENT => Ok(true),
            other => Err(ConvError::Malformed {
                reason: format!("invalid optional tag byte {other}"),
            }),
        }
    }

    pub fn read_optional_bool(&mut self) -> ConvResult<Option<bool>> {
        self.read_optional(Self::read_bool)
    }

    pub fn read_optional_int(&mut self) -> ConvResult<Option<i32>> {
        self.read_optional(Self::read_int)
    }

    pub fn read_optional_long(&mut self) -> ConvResult<Option<i64>> {
        self.read_optional(Self::read_long)
    }

    pub fn read_optional_uuid(&mut self) -> ConvResult<Option<Uuid>> {
        self.read_optional(Self::read_uuid)
    }

    pub fn read_optional_string(&mut self) -> ConvResult<Option<String>> {
        self.read_optional(Self::read_string)
    }

    pub fn read_optional_bytes(&mut self) -> ConvResult<Option<Vec<u8>>> {
        self.read_optional(Self::read_bytes)
    }

    fn read_optional<T>(&mut self, read: impl FnOnce(&mut Self) -> ConvResult<T>) -> ConvResult<Option<T>> {
        if self.read_option_tag()? {
            Ok(Some(read(self)?))
        } else {
            Ok(None)
        }
    }
}

fn write_varint_unsigned(buf: &mut BytesMut, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.put_u8(byte);
            break;
        }
        buf.put_u8(byte | 0x80);
    }
}

fn read_varint_unsigned(buf: &mut &[u8]) -> ConvResult<u64> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    loop {
        if buf.remaining() == 0 {
            return Err(ConvError::BufferUnderrun {
                needed: 1,
                available: 0,
            });
        }
        let byte = buf.get_u8();
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift >= 64 {
            return Err(ConvError::Malformed {
                reason: "varint too long".into(),
            });
        }
    }
}

fn write_varint_zigzag(buf: &mut BytesMut, value: i64) {
    let zigzag = ((value << 1) ^ (value >> 63)) as u64;
    write_varint_unsigned(buf, zigzag);
}

fn read_varint_zigzag(buf: &mut &[u8]) -> ConvResult<i64> {
    let zigzag = read_varint_unsigned(buf)?;
    Ok(((zigzag >> 1) as i64) ^ -((zigzag & 1) as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(write: impl FnOnce(&mut Encoder), check: impl FnOnce(&mut Decoder) -> ConvResult<()>) {
        let mut enc = Encoder::new();
        write(&mut enc);
        let bytes = enc.finish();
        let mut dec = Decoder::new(&bytes);
        check(&mut dec).expect("roundtrip should succeed");
        assert_eq!(dec.remaining(), 0, "decoder should consume the whole frame");
    }

    #[test]
    fn bool_roundtrip() {
        roundtrip(
            |e| {
                e.write_bool(true);
                e.write_bool(false);
            },
            |d| {
                assert_eq!(d.read_bool()?, true);
                assert_eq!(d.read_bool()?, false);
                Ok(())
            },
        );
    }

    #[test]
    fn signed_varints_roundtrip_including_negative() {
        for v in [0i64, 1, -1, 63, -64, i32::MAX as i64, i32::MIN as i64, i64::MAX, i64::MIN] {
            roundtrip(
                |e| e.write_long(v),
                |d| {
                    assert_eq!(d.read_long()?, v);
                    Ok(())
                },
            );
        }
    }

    #[test]
    fn string_roundtrip() {
        roundtrip(
            |e| e.write_string("hello, \u{1F600}"),
            |d| {
                assert_eq!(d.read_string()?, "hello, \u{1F600}");
                Ok(())
            },
        );
    }

    #[test]
    fn uuid_roundtrip() {
        let id = Uuid::new_v4();
        roundtrip(
            |e| e.write_uuid(id),
            |d| {
                assert_eq!(d.read_uuid()?, id);
                Ok(())
            },
        );
    }

    #[test]
    fn optional_roundtrip_present_and_absent() {
        roundtrip(
            |e| {
                e.write_optional_string(Some("x"));
                e.write_optional_string(None);
            },
            |d| {
                assert_eq!(d.read_optional_string()?, Some("x".to_string()));
                assert_eq!(d.read_optional_string()?, None);
                Ok(())
            },
        );
    }

    #[test]
    fn write_zero_is_read_as_absent() {
        roundtrip(
            |e| e.write_zero(),
            |d| {
                assert_eq!(d.read_optional_int()?, None);
                Ok(())
            },
        );
    }

    #[test]
    fn underrun_is_reported_not_panicking() {
        let mut dec = Decoder::new(&[]);
        assert!(matches!(
            dec.read_int(),
            Err(ConvError::BufferUnderrun { .. })
        ));
    }

    #[test]
    fn invalid_enum_tag_is_rejected() {
        let mut enc = Encoder::new();
        enc.write_enum(5);
        let bytes = enc.finish();
        let mut dec = Decoder::new(&bytes);
        assert!(matches!(
            dec.read_enum("Status", 3),
            Err(ConvError::InvalidEnumTag { tag: 5, .. })
        ));
    }
}
