//! BACnet/IP virtual link control (BVLC).
//!
//! Every BACnet/IP datagram starts with a four-byte BVLC header:
//!
//! ```text
//! +------+----------+-----------------+
//! | 0x81 | function | length (u16 BE) |
//! +------+----------+-----------------+
//! ```
//!
//! The length covers the whole datagram including the header. Outbound frames
//! are written with a placeholder length that [`finish_frame`] patches once the
//! body is complete.

use crate::encoding::{EncodingError, FrameReader, FrameWriter, Result};

/// BACnet/IP well-known port number (0xBAC0)
pub const BACNET_IP_PORT: u16 = 47808;

/// BVLC type byte for BACnet/IP
pub const BVLC_TYPE_BACNET_IP: u8 = 0x81;

/// Size of the BVLC header
pub const BVLC_HEADER_LEN: usize = 4;

/// B/IP address carried by a Forwarded-NPDU (IPv4 address plus port).
pub const FORWARDED_ADDRESS_LEN: usize = 6;

/// BVLC functions this controller sends or accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BvlcFunction {
    /// Function code stamped on the periodic I-Am broadcast
    DeviceBroadcast = 0x00,
    /// Forwarded-NPDU
    ForwardedNpdu = 0x04,
    /// Original-Unicast-NPDU
    OriginalUnicastNpdu = 0x0A,
    /// Original-Broadcast-NPDU
    OriginalBroadcastNpdu = 0x0B,
}

impl TryFrom<u8> for BvlcFunction {
    type Error = EncodingError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(BvlcFunction::DeviceBroadcast),
            0x04 => Ok(BvlcFunction::ForwardedNpdu),
            0x0A => Ok(BvlcFunction::OriginalUnicastNpdu),
            0x0B => Ok(BvlcFunction::OriginalBroadcastNpdu),
            other => Err(EncodingError::UnsupportedFunction(other)),
        }
    }
}

/// BVLC header structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BvlcHeader {
    /// BVLC function
    pub function: BvlcFunction,
    /// Total message length including BVLC header
    pub length: u16,
}

impl BvlcHeader {
    pub fn new(function: BvlcFunction, length: u16) -> Self {
        Self { function, length }
    }

    pub fn encode(&self, writer: &mut FrameWriter) -> Result<()> {
        writer.require(BVLC_HEADER_LEN)?;
        writer.put_u8(BVLC_TYPE_BACNET_IP)?;
        writer.put_u8(self.function as u8)?;
        writer.put_u16(self.length)
    }

    pub fn decode(reader: &mut FrameReader<'_>) -> Result<Self> {
        let bvlc_type = reader.read_u8()?;
        if bvlc_type != BVLC_TYPE_BACNET_IP {
            return Err(EncodingError::InvalidMarker(bvlc_type));
        }
        let function = BvlcFunction::try_from(reader.read_u8()?)?;
        let length = reader.read_u16()?;
        Ok(Self { function, length })
    }
}

/// Splits a datagram into its BVLC header and the NPDU it carries.
///
/// The declared length must cover at least the header and may not exceed the
/// datagram; bytes past the declared length are ignored. Forwarded-NPDUs have
/// their originator address skipped.
pub fn decode_frame(datagram: &[u8]) -> Result<(BvlcHeader, &[u8])> {
    let mut reader = FrameReader::new(datagram);
    let header = BvlcHeader::decode(&mut reader)?;

    let declared = header.length as usize;
    if declared < BVLC_HEADER_LEN || declared > datagram.len() {
        return Err(EncodingError::InvalidLength);
    }

    let mut body = FrameReader::new(&datagram[BVLC_HEADER_LEN..declared]);
    if header.function == BvlcFunction::ForwardedNpdu {
        body.skip(FORWARDED_ADDRESS_LEN)?;
    }
    Ok((header, body.rest()))
}

/// Writes a BVLC header with a zero length; returns the header offset.
pub fn begin_frame(writer: &mut FrameWriter, function: BvlcFunction) -> Result<usize> {
    let offset = writer.len();
    BvlcHeader::new(function, 0).encode(writer)?;
    Ok(offset)
}

/// Patches the length of the header written at `offset` to cover everything after it.
pub fn finish_frame(writer: &mut FrameWriter, offset: usize) -> Result<()> {
    let length = u16::try_from(writer.len() - offset).map_err(|_| EncodingError::InvalidLength)?;
    writer.patch_u16(offset + 2, length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_length_is_patched() {
        let mut w = FrameWriter::with_capacity(16);
        let offset = begin_frame(&mut w, BvlcFunction::OriginalUnicastNpdu).unwrap();
        w.put_slice(&[0x01, 0x00, 0x40]).unwrap();
        finish_frame(&mut w, offset).unwrap();
        assert_eq!(w.as_slice(), &[0x81, 0x0A, 0x00, 0x07, 0x01, 0x00, 0x40]);
    }

    #[test]
    fn test_decode_frame_returns_npdu() {
        let data = [0x81, 0x0B, 0x00, 0x08, 0x01, 0x20, 0xFF, 0xFF];
        let (header, npdu) = decode_frame(&data).unwrap();
        assert_eq!(header.function, BvlcFunction::OriginalBroadcastNpdu);
        assert_eq!(header.length, 8);
        assert_eq!(npdu, &[0x01, 0x20, 0xFF, 0xFF]);
    }

    #[test]
    fn test_decode_frame_ignores_trailing_bytes() {
        let data = [0x81, 0x0A, 0x00, 0x06, 0x01, 0x00, 0xEE, 0xEE];
        let (_, npdu) = decode_frame(&data).unwrap();
        assert_eq!(npdu, &[0x01, 0x00]);
    }

    #[test]
    fn test_decode_frame_skips_forwarded_address() {
        let data = [
            0x81, 0x04, 0x00, 0x0C, 192, 168, 1, 20, 0xBA, 0xC0, 0x01, 0x00,
        ];
        let (header, npdu) = decode_frame(&data).unwrap();
        assert_eq!(header.function, BvlcFunction::ForwardedNpdu);
        assert_eq!(npdu, &[0x01, 0x00]);
    }

    #[test]
    fn test_decode_frame_rejects_bad_headers() {
        assert_eq!(
            decode_frame(&[0x82, 0x0A, 0x00, 0x04]).unwrap_err(),
            EncodingError::InvalidMarker(0x82)
        );
        assert_eq!(
            decode_frame(&[0x81, 0x05, 0x00, 0x04]).unwrap_err(),
            EncodingError::UnsupportedFunction(0x05)
        );
        assert_eq!(
            decode_frame(&[0x81, 0x0A, 0x00, 0x09, 0x01]).unwrap_err(),
            EncodingError::InvalidLength
        );
        assert_eq!(
            decode_frame(&[0x81, 0x0A, 0x00, 0x02]).unwrap_err(),
            EncodingError::InvalidLength
        );
        assert!(matches!(
            decode_frame(&[0x81, 0x0A]),
            Err(EncodingError::UnexpectedEndOfData { .. })
        ));
    }
}
