//! BACnet Network Layer Module
//!
//! Encoding and decoding of the NPDU header that sits between the BVLC header
//! and the APDU.
//!
//! # Network Layer Protocol Data Unit (NPDU)
//!
//! The NPDU contains:
//! - Protocol version (always 1)
//! - Control byte (network message, destination/source present, expecting reply, priority)
//! - Destination network address (DNET, DLEN, DADR) when flagged
//! - Source network address (SNET, SLEN, SADR) when flagged
//! - Hop count, present whenever a destination is present
//!
//! The controller is not a router: it reads the routing fields only to skip
//! them, and drops NPDUs that carry network-layer messages.
//!
//! # Example
//!
//! ```
//! use bacnet_controller::encoding::{FrameReader, FrameWriter};
//! use bacnet_controller::network::Npdu;
//!
//! let mut writer = FrameWriter::with_capacity(8);
//! Npdu::global_broadcast().encode(&mut writer).unwrap();
//! assert_eq!(writer.as_slice(), &[0x01, 0x20, 0xFF, 0xFF, 0x00, 0xFF]);
//!
//! let npdu = Npdu::decode(&mut FrameReader::new(writer.as_slice())).unwrap();
//! assert!(npdu.destination.unwrap().is_broadcast());
//! ```

use bitflags::bitflags;

use crate::encoding::{EncodingError, FrameReader, FrameWriter, Result};

/// NPDU protocol version
pub const BACNET_PROTOCOL_VERSION: u8 = 1;

bitflags! {
    /// NPDU control flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NpduControl: u8 {
        /// Network layer message instead of an APDU
        const NETWORK_MESSAGE = 0x80;
        /// Destination specifier present
        const DESTINATION_PRESENT = 0x20;
        /// Source specifier present
        const SOURCE_PRESENT = 0x08;
        /// Data expecting reply
        const EXPECTING_REPLY = 0x04;
        /// Network priority bits
        const PRIORITY = 0x03;
    }
}

impl NpduControl {
    /// Network priority (0-3)
    pub fn priority(self) -> u8 {
        (self & NpduControl::PRIORITY).bits()
    }
}

/// Network address (network number + MAC address)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkAddress {
    /// Network number (0 = local network, 65535 = broadcast)
    pub network: u16,
    /// MAC address on that network
    pub address: Vec<u8>,
}

impl NetworkAddress {
    pub fn new(network: u16, address: Vec<u8>) -> Self {
        Self { network, address }
    }

    /// Check if this is a broadcast address
    pub fn is_broadcast(&self) -> bool {
        self.network == 0xFFFF
    }

    fn encode(&self, writer: &mut FrameWriter) -> Result<()> {
        let len = u8::try_from(self.address.len()).map_err(|_| EncodingError::InvalidLength)?;
        writer.require(3 + self.address.len())?;
        writer.put_u16(self.network)?;
        writer.put_u8(len)?;
        writer.put_slice(&self.address)
    }

    fn decode(reader: &mut FrameReader<'_>) -> Result<Self> {
        let network = reader.read_u16()?;
        let len = reader.read_u8()? as usize;
        let address = reader.read_bytes(len)?.to_vec();
        Ok(Self { network, address })
    }
}

/// Network Protocol Data Unit (NPDU)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Npdu {
    /// Control information
    pub control: NpduControl,
    /// Destination network address
    pub destination: Option<NetworkAddress>,
    /// Source network address
    pub source: Option<NetworkAddress>,
    /// Hop count (only present if destination is present)
    pub hop_count: Option<u8>,
}

impl Default for Npdu {
    fn default() -> Self {
        Self::local()
    }
}

impl Npdu {
    /// Plain local NPDU: no routing information, normal priority.
    pub fn local() -> Self {
        Self {
            control: NpduControl::empty(),
            destination: None,
            source: None,
            hop_count: None,
        }
    }

    /// NPDU addressed to every network, as used by I-Am announcements.
    pub fn global_broadcast() -> Self {
        Self {
            control: NpduControl::DESTINATION_PRESENT,
            destination: Some(NetworkAddress::new(0xFFFF, Vec::new())),
            source: None,
            hop_count: Some(255),
        }
    }

    /// Check if this is a network layer message
    pub fn is_network_message(&self) -> bool {
        self.control.contains(NpduControl::NETWORK_MESSAGE)
    }

    /// Writes the header of an outgoing frame. Frames originate here, so a
    /// decoded source specifier is never written back.
    pub fn encode(&self, writer: &mut FrameWriter) -> Result<()> {
        let mut control = self.control - NpduControl::DESTINATION_PRESENT - NpduControl::SOURCE_PRESENT;
        control.set(NpduControl::DESTINATION_PRESENT, self.destination.is_some());

        writer.require(2)?;
        writer.put_u8(BACNET_PROTOCOL_VERSION)?;
        writer.put_u8(control.bits())?;

        if let Some(dest) = &self.destination {
            dest.encode(writer)?;
        }
        if self.destination.is_some() {
            writer.put_u8(self.hop_count.unwrap_or(255))?;
        }
        Ok(())
    }

    /// Decodes the header, leaving `reader` positioned at the APDU.
    pub fn decode(reader: &mut FrameReader<'_>) -> Result<Self> {
        let version = reader.read_u8()?;
        if version != BACNET_PROTOCOL_VERSION {
            return Err(EncodingError::InvalidVersion(version));
        }
        let control = NpduControl::from_bits_retain(reader.read_u8()?);

        let destination = if control.contains(NpduControl::DESTINATION_PRESENT) {
            Some(NetworkAddress::decode(reader)?)
        } else {
            None
        };
        let source = if control.contains(NpduControl::SOURCE_PRESENT) {
            Some(NetworkAddress::decode(reader)?)
        } else {
            None
        };
        let hop_count = if destination.is_some() {
            Some(reader.read_u8()?)
        } else {
            None
        };

        Ok(Self {
            control,
            destination,
            source,
            hop_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_npdu_is_two_bytes() {
        let mut w = FrameWriter::with_capacity(4);
        Npdu::local().encode(&mut w).unwrap();
        assert_eq!(w.as_slice(), &[0x01, 0x00]);
    }

    #[test]
    fn test_decode_with_source_and_destination() {
        let data = [
            0x01, 0x2C, // version, dest + source + expecting reply
            0x00, 0x05, 0x01, 0x07, // DNET 5, DLEN 1, DADR 7
            0x00, 0x02, 0x02, 0xAA, 0xBB, // SNET 2, SLEN 2, SADR
            0x10, // hop count
            0x10, 0x08, // APDU
        ];
        let mut r = FrameReader::new(&data);
        let npdu = Npdu::decode(&mut r).unwrap();
        assert!(npdu.control.contains(NpduControl::EXPECTING_REPLY));
        assert_eq!(npdu.destination, Some(NetworkAddress::new(5, vec![7])));
        assert_eq!(npdu.source, Some(NetworkAddress::new(2, vec![0xAA, 0xBB])));
        assert_eq!(npdu.hop_count, Some(0x10));
        assert_eq!(r.rest(), &[0x10, 0x08]);
    }

    #[test]
    fn test_encode_omits_source() {
        let mut r = FrameReader::new(&[0x01, 0x08, 0x00, 0x02, 0x01, 0x33, 0x10, 0x08]);
        let npdu = Npdu::decode(&mut r).unwrap();
        assert!(npdu.source.is_some());

        let mut w = FrameWriter::with_capacity(8);
        npdu.encode(&mut w).unwrap();
        assert_eq!(w.as_slice(), &[0x01, 0x00]);
    }

    #[test]
    fn test_decode_rejects_version_and_truncation() {
        let mut r = FrameReader::new(&[0x02, 0x00]);
        assert_eq!(Npdu::decode(&mut r), Err(EncodingError::InvalidVersion(2)));

        let mut r = FrameReader::new(&[0x01, 0x20, 0xFF, 0xFF, 0x06, 0x01]);
        assert!(matches!(
            Npdu::decode(&mut r),
            Err(EncodingError::UnexpectedEndOfData { .. })
        ));
    }

    #[test]
    fn test_network_message_flag() {
        let mut r = FrameReader::new(&[0x01, 0x80, 0x00]);
        let npdu = Npdu::decode(&mut r).unwrap();
        assert!(npdu.is_network_message());
        assert_eq!(npdu.control.priority(), 0);
    }
}
