//! BACnet Encoding/Decoding Module
//!
//! Primitive codecs for the values this controller puts on the wire, plus the
//! bounded [`FrameWriter`] and checked [`FrameReader`] every layer builds on.
//!
//! # Overview
//!
//! - Unsigned integers use the application tag `0x2n`, where `n` is the
//!   minimal byte count (1, 2 or 4).
//! - Reals are tagged `0x44` followed by an IEEE-754 single in big-endian order.
//! - Character strings are tagged `0x75`, then a one-byte length, then ASCII bytes.
//! - Object identifiers are four raw bytes: a 16-bit type and a 16-bit instance.
//!
//! Writers never grow past their capacity: an encode that would not fit fails
//! with [`EncodingError::BufferOverflow`] before touching the buffer. Readers
//! bounds-check every field and fail with
//! [`EncodingError::UnexpectedEndOfData`] instead of reading past the end.
//!
//! # Example
//!
//! ```
//! use bacnet_controller::encoding::*;
//!
//! let mut writer = FrameWriter::with_capacity(16);
//! encode_unsigned(&mut writer, 1476).unwrap();
//! encode_real(&mut writer, 21.5).unwrap();
//! assert_eq!(&writer.as_slice()[..3], &[0x22, 0x05, 0xC4]);
//!
//! let mut reader = FrameReader::new(writer.as_slice());
//! assert_eq!(decode_unsigned(&mut reader).unwrap(), 1476);
//! assert_eq!(decode_real(&mut reader).unwrap(), 21.5);
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Result type for encoding operations
pub type Result<T> = std::result::Result<T, EncodingError>;

/// Errors that can occur during encoding/decoding operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// An encode did not fit in the writer's capacity
    #[error("buffer overflow: {needed} bytes needed, capacity is {capacity}")]
    BufferOverflow { needed: usize, capacity: usize },
    /// A field ran past the end of the input
    #[error("unexpected end of data: {needed} bytes needed, {remaining} remaining")]
    UnexpectedEndOfData { needed: usize, remaining: usize },
    /// The BVLC type byte was not 0x81
    #[error("invalid BVLC type 0x{0:02X}")]
    InvalidMarker(u8),
    /// A declared length disagrees with the data
    #[error("invalid length value")]
    InvalidLength,
    /// A tag byte did not match the expected application tag
    #[error("invalid tag byte 0x{0:02X}")]
    InvalidTag(u8),
    /// BVLC function this controller does not carry
    #[error("unsupported BVLC function 0x{0:02X}")]
    UnsupportedFunction(u8),
    /// NPDU protocol version other than 1
    #[error("unsupported NPDU version {0}")]
    InvalidVersion(u8),
    /// The NPDU carries a network-layer message rather than an APDU
    #[error("network layer message")]
    NetworkMessage,
    /// APDU type nibble this controller does not handle
    #[error("unsupported PDU type {0}")]
    UnsupportedPduType(u8),
    /// Value out of valid range
    #[error("value out of valid range")]
    ValueOutOfRange,
    /// Character string contains non-ASCII bytes
    #[error("character string is not ASCII")]
    InvalidString,
}

/// BACnet application tag numbers used by this controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ApplicationTag {
    UnsignedInt = 2,
    Real = 4,
    CharacterString = 7,
}

impl ApplicationTag {
    /// Tag byte for a value of `len` bytes; lengths of 5 or more use the extended form.
    pub fn tag_byte(self, len: usize) -> u8 {
        ((self as u8) << 4) | (len.min(5) as u8)
    }
}

/// Tag byte for a four-byte real.
pub const TAG_REAL: u8 = 0x44;
/// Tag byte for a character string; a one-byte length follows.
pub const TAG_CHARACTER_STRING: u8 = 0x75;
/// Longest character string the one-byte length form can carry here.
pub const MAX_CHARACTER_STRING_LEN: usize = 253;
/// Largest instance number the 16-bit identifier field holds.
pub const MAX_WIRE_INSTANCE: u32 = 0xFFFF;

/// Append-only frame buffer with a hard capacity.
#[derive(Debug, Clone)]
pub struct FrameWriter {
    buf: BytesMut,
    capacity: usize,
}

impl FrameWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.buf.len()
    }

    /// Fails unless `n` more bytes fit.
    pub fn require(&self, n: usize) -> Result<()> {
        let needed = self.buf.len() + n;
        if needed > self.capacity {
            return Err(EncodingError::BufferOverflow {
                needed,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    pub fn put_u8(&mut self, value: u8) -> Result<()> {
        self.require(1)?;
        self.buf.put_u8(value);
        Ok(())
    }

    pub fn put_u16(&mut self, value: u16) -> Result<()> {
        self.require(2)?;
        self.buf.put_u16(value);
        Ok(())
    }

    pub fn put_u32(&mut self, value: u32) -> Result<()> {
        self.require(4)?;
        self.buf.put_u32(value);
        Ok(())
    }

    pub fn put_slice(&mut self, data: &[u8]) -> Result<()> {
        self.require(data.len())?;
        self.buf.put_slice(data);
        Ok(())
    }

    /// Overwrites two bytes already written at `offset` with `value` in big-endian order.
    pub fn patch_u16(&mut self, offset: usize, value: u16) -> Result<()> {
        let end = offset + 2;
        if end > self.buf.len() {
            return Err(EncodingError::InvalidLength);
        }
        self.buf[offset..end].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Bounds-checked cursor over a received frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameReader<'a> {
    data: &'a [u8],
}

impl<'a> FrameReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn require(&self, needed: usize) -> Result<()> {
        if self.data.len() < needed {
            return Err(EncodingError::UnexpectedEndOfData {
                needed,
                remaining: self.data.len(),
            });
        }
        Ok(())
    }

    pub fn peek_u8(&self) -> Result<u8> {
        self.require(1)?;
        Ok(self.data[0])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.require(1)?;
        Ok(self.data.get_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.require(2)?;
        Ok(self.data.get_u16())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.require(4)?;
        Ok(self.data.get_u32())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.require(n)?;
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    /// Unread bytes, without consuming them.
    pub fn rest(&self) -> &'a [u8] {
        self.data
    }
}

/// Minimal byte count for an unsigned value: 1, 2 or 4.
pub fn unsigned_len(value: u32) -> usize {
    match value {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        _ => 4,
    }
}

/// Encode an application-tagged unsigned integer
pub fn encode_unsigned(writer: &mut FrameWriter, value: u32) -> Result<()> {
    let len = unsigned_len(value);
    writer.require(1 + len)?;
    writer.put_u8(ApplicationTag::UnsignedInt.tag_byte(len))?;
    writer.put_slice(&value.to_be_bytes()[4 - len..])
}

/// Decode an application-tagged unsigned integer of 1 to 4 bytes
pub fn decode_unsigned(reader: &mut FrameReader<'_>) -> Result<u32> {
    let tag = reader.read_u8()?;
    if tag >> 4 != ApplicationTag::UnsignedInt as u8 {
        return Err(EncodingError::InvalidTag(tag));
    }
    let len = (tag & 0x07) as usize;
    if !(1..=4).contains(&len) {
        return Err(EncodingError::InvalidTag(tag));
    }
    let bytes = reader.read_bytes(len)?;
    Ok(bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
}

/// Decode an unsigned integer under either an application unsigned tag or
/// any context tag.
///
/// Only the tag's length bits are used for context tags; peers commonly send
/// request fields such as the property identifier context-tagged (`0x19`).
pub fn decode_tagged_unsigned(reader: &mut FrameReader<'_>) -> Result<u32> {
    let tag = reader.peek_u8()?;
    if tag & 0x08 == 0 {
        return decode_unsigned(reader);
    }
    reader.skip(1)?;
    let len = (tag & 0x07) as usize;
    if !(1..=4).contains(&len) {
        return Err(EncodingError::InvalidTag(tag));
    }
    let bytes = reader.read_bytes(len)?;
    Ok(bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
}

/// Encode an application-tagged real
pub fn encode_real(writer: &mut FrameWriter, value: f32) -> Result<()> {
    writer.require(5)?;
    writer.put_u8(TAG_REAL)?;
    writer.put_u32(value.to_bits())
}

/// Decode an application-tagged real
pub fn decode_real(reader: &mut FrameReader<'_>) -> Result<f32> {
    let tag = reader.read_u8()?;
    if tag != TAG_REAL {
        return Err(EncodingError::InvalidTag(tag));
    }
    Ok(f32::from_bits(reader.read_u32()?))
}

/// Encode an application-tagged ASCII character string
pub fn encode_character_string(writer: &mut FrameWriter, value: &str) -> Result<()> {
    if !value.is_ascii() {
        return Err(EncodingError::InvalidString);
    }
    let len = value.len();
    if len > MAX_CHARACTER_STRING_LEN {
        return Err(EncodingError::ValueOutOfRange);
    }
    writer.require(2 + len)?;
    writer.put_u8(TAG_CHARACTER_STRING)?;
    writer.put_u8(len as u8)?;
    writer.put_slice(value.as_bytes())
}

/// Decode an application-tagged ASCII character string
pub fn decode_character_string(reader: &mut FrameReader<'_>) -> Result<String> {
    let tag = reader.read_u8()?;
    if tag != TAG_CHARACTER_STRING {
        return Err(EncodingError::InvalidTag(tag));
    }
    let len = reader.read_u8()? as usize;
    let bytes = reader.read_bytes(len)?;
    if !bytes.is_ascii() {
        return Err(EncodingError::InvalidString);
    }
    // ASCII is valid UTF-8
    Ok(bytes.iter().map(|b| *b as char).collect())
}

/// Encode an object identifier as a 16-bit type followed by a 16-bit instance
pub fn encode_object_identifier(writer: &mut FrameWriter, object_type: u16, instance: u32) -> Result<()> {
    if instance > MAX_WIRE_INSTANCE {
        return Err(EncodingError::ValueOutOfRange);
    }
    writer.require(4)?;
    writer.put_u16(object_type)?;
    writer.put_u16(instance as u16)
}

/// Decode an object identifier into `(object_type, instance)`
pub fn decode_object_identifier(reader: &mut FrameReader<'_>) -> Result<(u16, u32)> {
    let object_type = reader.read_u16()?;
    let instance = reader.read_u16()?;
    Ok((object_type, u32::from(instance)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsigned_bytes(value: u32) -> Vec<u8> {
        let mut w = FrameWriter::with_capacity(8);
        encode_unsigned(&mut w, value).unwrap();
        w.as_slice().to_vec()
    }

    #[test]
    fn test_unsigned_uses_minimal_width() {
        assert_eq!(unsigned_bytes(0), vec![0x21, 0x00]);
        assert_eq!(unsigned_bytes(255), vec![0x21, 0xFF]);
        assert_eq!(unsigned_bytes(256), vec![0x22, 0x01, 0x00]);
        assert_eq!(unsigned_bytes(65535), vec![0x22, 0xFF, 0xFF]);
        assert_eq!(unsigned_bytes(65536), vec![0x24, 0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_decode_unsigned_three_bytes() {
        let mut r = FrameReader::new(&[0x23, 0x01, 0x02, 0x03]);
        assert_eq!(decode_unsigned(&mut r).unwrap(), 0x010203);
        assert!(r.is_empty());
    }

    #[test]
    fn test_decode_unsigned_rejects_bad_tags() {
        let mut r = FrameReader::new(&[0x44, 0, 0, 0, 0]);
        assert_eq!(decode_unsigned(&mut r), Err(EncodingError::InvalidTag(0x44)));

        let mut r = FrameReader::new(&[0x20]);
        assert_eq!(decode_unsigned(&mut r), Err(EncodingError::InvalidTag(0x20)));

        let mut r = FrameReader::new(&[0x22, 0x01]);
        assert!(matches!(
            decode_unsigned(&mut r),
            Err(EncodingError::UnexpectedEndOfData { needed: 2, remaining: 1 })
        ));
    }

    #[test]
    fn test_decode_tagged_unsigned() {
        // application tag
        assert_eq!(decode_tagged_unsigned(&mut FrameReader::new(&[0x21, 0x55])), Ok(85));
        // context tag 1, one byte
        let mut r = FrameReader::new(&[0x19, 0x55, 0xAA]);
        assert_eq!(decode_tagged_unsigned(&mut r), Ok(85));
        assert_eq!(r.rest(), &[0xAA]);
        // context tag 1, two bytes
        assert_eq!(decode_tagged_unsigned(&mut FrameReader::new(&[0x1A, 0x01, 0x00])), Ok(256));

        assert_eq!(
            decode_tagged_unsigned(&mut FrameReader::new(&[0x44, 0, 0, 0, 0])),
            Err(EncodingError::InvalidTag(0x44))
        );
        assert_eq!(
            decode_tagged_unsigned(&mut FrameReader::new(&[0x1D, 0x55])),
            Err(EncodingError::InvalidTag(0x1D))
        );
        assert!(decode_tagged_unsigned(&mut FrameReader::new(&[0x19])).is_err());
    }

    #[test]
    fn test_encode_decode_real() {
        let mut w = FrameWriter::with_capacity(5);
        encode_real(&mut w, 21.5).unwrap();
        assert_eq!(w.as_slice(), &[0x44, 0x41, 0xAC, 0x00, 0x00]);

        let mut r = FrameReader::new(w.as_slice());
        assert_eq!(decode_real(&mut r).unwrap(), 21.5);
    }

    #[test]
    fn test_encode_decode_character_string() {
        let mut w = FrameWriter::with_capacity(64);
        encode_character_string(&mut w, "Temperature").unwrap();
        assert_eq!(&w.as_slice()[..2], &[0x75, 11]);

        let mut r = FrameReader::new(w.as_slice());
        assert_eq!(decode_character_string(&mut r).unwrap(), "Temperature");
    }

    #[test]
    fn test_character_string_limits() {
        let mut w = FrameWriter::with_capacity(300);
        encode_character_string(&mut w, &"a".repeat(253)).unwrap();
        assert_eq!(w.len(), 255);

        let mut w = FrameWriter::with_capacity(300);
        assert_eq!(
            encode_character_string(&mut w, &"a".repeat(254)),
            Err(EncodingError::ValueOutOfRange)
        );
        assert_eq!(
            encode_character_string(&mut w, "Temp\u{e9}rature"),
            Err(EncodingError::InvalidString)
        );
        assert!(w.is_empty());
    }

    #[test]
    fn test_object_identifier_layout() {
        let mut w = FrameWriter::with_capacity(4);
        encode_object_identifier(&mut w, 8, 1010).unwrap();
        assert_eq!(w.as_slice(), &[0x00, 0x08, 0x03, 0xF2]);

        let mut r = FrameReader::new(w.as_slice());
        assert_eq!(decode_object_identifier(&mut r).unwrap(), (8, 1010));

        let mut w = FrameWriter::with_capacity(4);
        assert_eq!(
            encode_object_identifier(&mut w, 0, 0x1_0000),
            Err(EncodingError::ValueOutOfRange)
        );
    }

    #[test]
    fn test_overflow_leaves_writer_untouched() {
        let mut w = FrameWriter::with_capacity(4);
        w.put_u8(0xAA).unwrap();
        let err = encode_real(&mut w, 1.0).unwrap_err();
        assert_eq!(err, EncodingError::BufferOverflow { needed: 6, capacity: 4 });
        assert_eq!(w.as_slice(), &[0xAA]);
    }

    #[test]
    fn test_patch_u16() {
        let mut w = FrameWriter::with_capacity(8);
        w.put_slice(&[0x81, 0x0A, 0x00, 0x00, 0x01]).unwrap();
        w.patch_u16(2, 5).unwrap();
        assert_eq!(w.as_slice(), &[0x81, 0x0A, 0x00, 0x05, 0x01]);
        assert_eq!(w.patch_u16(4, 1), Err(EncodingError::InvalidLength));
    }
}
