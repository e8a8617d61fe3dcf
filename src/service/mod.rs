//! BACnet Application Layer Services
//!
//! Request and response bodies for the services the controller takes part in:
//!
//! ## Remote Device Discovery
//! - **WhoIs**: peers looking for devices; always answered with an I-Am broadcast
//! - **IAm**: our announcement, and peers' announcements (logged only)
//!
//! ## Object Access
//! - **ReadProperty**: answered with a ComplexACK carrying the value, or an Error PDU
//! - **WriteProperty**: decoded for logging, always answered with an Error PDU
//!
//! Every other confirmed service is answered with an Error PDU.
//!
//! # Example
//!
//! ```
//! use bacnet_controller::encoding::{FrameReader, FrameWriter};
//! use bacnet_controller::object::{ObjectIdentifier, ObjectType, PropertyIdentifier};
//! use bacnet_controller::service::ReadPropertyRequest;
//!
//! let request = ReadPropertyRequest::new(
//!     ObjectIdentifier::new(ObjectType::AnalogInput, 3),
//!     PropertyIdentifier::PresentValue,
//! );
//! let mut writer = FrameWriter::with_capacity(16);
//! request.encode(&mut writer).unwrap();
//! assert_eq!(writer.as_slice(), &[0x00, 0x00, 0x00, 0x03, 0x21, 0x55]);
//!
//! let decoded = ReadPropertyRequest::decode(&mut FrameReader::new(writer.as_slice())).unwrap();
//! assert_eq!(decoded, request);
//! ```

use std::fmt;

use thiserror::Error;

use crate::app::Apdu;
use crate::encoding::{
    decode_real, decode_tagged_unsigned, decode_unsigned, encode_unsigned, EncodingError, FrameReader,
    FrameWriter, Result as EncodingResult,
};
use crate::object::{
    ObjectError, ObjectIdentifier, PropertyIdentifier, PropertyValue, Segmentation,
};

/// Result type for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Reasons a confirmed request is answered with an Error PDU
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Confirmed service the controller does not implement
    #[error("unsupported confirmed service 0x{0:02X}")]
    UnsupportedService(u8),
    /// WriteProperty is recognised but not implemented
    #[error("WriteProperty is not supported")]
    WriteNotSupported,
    /// Unknown object or property
    #[error(transparent)]
    Object(#[from] ObjectError),
    /// Request body that could not be decoded
    #[error("malformed request: {0}")]
    Malformed(#[from] EncodingError),
}

/// Error class values
pub mod error_class {
    pub const DEVICE: u8 = 0;
    pub const OBJECT: u8 = 1;
    pub const PROPERTY: u8 = 2;
    pub const SERVICES: u8 = 5;
}

/// Error code values
pub mod error_code {
    pub const OTHER: u8 = 0;
    pub const SERVICE_REQUEST_DENIED: u8 = 29;
    pub const UNKNOWN_OBJECT: u8 = 31;
    pub const UNKNOWN_PROPERTY: u8 = 32;
    pub const WRITE_ACCESS_DENIED: u8 = 40;
    pub const INVALID_TAG: u8 = 57;
}

impl ServiceError {
    /// Error class and code for the Error PDU.
    ///
    /// Without `standard_codes` every error is reported as class 0, code 0.
    pub fn class_and_code(&self, standard_codes: bool) -> (u8, u8) {
        if !standard_codes {
            return (error_class::DEVICE, error_code::OTHER);
        }
        match self {
            ServiceError::UnsupportedService(_) => {
                (error_class::SERVICES, error_code::SERVICE_REQUEST_DENIED)
            }
            ServiceError::WriteNotSupported => (error_class::PROPERTY, error_code::WRITE_ACCESS_DENIED),
            ServiceError::Object(ObjectError::UnknownObject(_)) => {
                (error_class::OBJECT, error_code::UNKNOWN_OBJECT)
            }
            ServiceError::Object(ObjectError::UnknownProperty { .. }) => {
                (error_class::PROPERTY, error_code::UNKNOWN_PROPERTY)
            }
            ServiceError::Object(_) => (error_class::OBJECT, error_code::OTHER),
            ServiceError::Malformed(_) => (error_class::SERVICES, error_code::INVALID_TAG),
        }
    }
}

/// Confirmed service choices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConfirmedServiceChoice {
    ReadProperty = 0x0C,
    WriteProperty = 0x0F,
}

impl TryFrom<u8> for ConfirmedServiceChoice {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        match value {
            0x0C => Ok(ConfirmedServiceChoice::ReadProperty),
            0x0F => Ok(ConfirmedServiceChoice::WriteProperty),
            other => Err(other),
        }
    }
}

/// Unconfirmed service choices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnconfirmedServiceChoice {
    IAm,
    WhoIs,
}

impl UnconfirmedServiceChoice {
    /// Choice byte written on outbound frames.
    pub fn code(self) -> u8 {
        match self {
            UnconfirmedServiceChoice::IAm => 0x10,
            UnconfirmedServiceChoice::WhoIs => 0x08,
        }
    }
}

impl TryFrom<u8> for UnconfirmedServiceChoice {
    type Error = u8;

    /// Peers announce themselves with either 0x00 or 0x10.
    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        match value {
            0x00 | 0x10 => Ok(UnconfirmedServiceChoice::IAm),
            0x08 => Ok(UnconfirmedServiceChoice::WhoIs),
            other => Err(other),
        }
    }
}

fn decode_context_unsigned(reader: &mut FrameReader<'_>, tag_number: u8) -> EncodingResult<u32> {
    let tag = reader.read_u8()?;
    let len = (tag & 0x07) as usize;
    if tag >> 4 != tag_number || tag & 0x08 == 0 || !(1..=4).contains(&len) {
        return Err(EncodingError::InvalidTag(tag));
    }
    let bytes = reader.read_bytes(len)?;
    Ok(bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
}

/// Who-Is request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WhoIsRequest {
    /// Low limit of device instance range (optional)
    pub low_limit: Option<u32>,
    /// High limit of device instance range (optional)
    pub high_limit: Option<u32>,
}

impl WhoIsRequest {
    /// Who-Is for all devices
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits travel as a pair or not at all.
    pub fn decode(reader: &mut FrameReader<'_>) -> EncodingResult<Self> {
        if reader.is_empty() {
            return Ok(Self::new());
        }
        let low = decode_context_unsigned(reader, 0)?;
        let high = decode_context_unsigned(reader, 1)?;
        Ok(Self {
            low_limit: Some(low),
            high_limit: Some(high),
        })
    }
}

/// I-Am request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IAmRequest {
    /// Device object identifier
    pub device_identifier: ObjectIdentifier,
    /// Maximum APDU length accepted
    pub max_apdu_length_accepted: u32,
    /// Segmentation supported
    pub segmentation_supported: Segmentation,
    /// Vendor identifier
    pub vendor_identifier: u32,
}

impl IAmRequest {
    pub fn new(
        device_identifier: ObjectIdentifier,
        max_apdu_length_accepted: u32,
        segmentation_supported: Segmentation,
        vendor_identifier: u32,
    ) -> Self {
        Self {
            device_identifier,
            max_apdu_length_accepted,
            segmentation_supported,
            vendor_identifier,
        }
    }

    pub fn encode(&self, writer: &mut FrameWriter) -> EncodingResult<()> {
        self.device_identifier.encode(writer)?;
        encode_unsigned(writer, self.max_apdu_length_accepted)?;
        writer.put_u8(self.segmentation_supported as u8)?;
        encode_unsigned(writer, self.vendor_identifier)
    }

    pub fn decode(reader: &mut FrameReader<'_>) -> EncodingResult<Self> {
        let device_identifier = ObjectIdentifier::decode(reader)?;
        let max_apdu_length_accepted = decode_unsigned(reader)?;
        let segmentation_supported =
            Segmentation::try_from(reader.read_u8()?).map_err(|_| EncodingError::ValueOutOfRange)?;
        let vendor_identifier = decode_unsigned(reader)?;
        Ok(Self::new(
            device_identifier,
            max_apdu_length_accepted,
            segmentation_supported,
            vendor_identifier,
        ))
    }
}

/// Read Property request (confirmed service)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadPropertyRequest {
    /// Object identifier to read from
    pub object_identifier: ObjectIdentifier,
    /// Property identifier to read
    pub property_identifier: PropertyIdentifier,
}

impl ReadPropertyRequest {
    pub fn new(object_identifier: ObjectIdentifier, property_identifier: PropertyIdentifier) -> Self {
        Self {
            object_identifier,
            property_identifier,
        }
    }

    pub fn encode(&self, writer: &mut FrameWriter) -> EncodingResult<()> {
        self.object_identifier.encode(writer)?;
        encode_unsigned(writer, self.property_identifier.into())
    }

    pub fn decode(reader: &mut FrameReader<'_>) -> EncodingResult<Self> {
        let object_identifier = ObjectIdentifier::decode(reader)?;
        let property_identifier = decode_tagged_unsigned(reader)?.into();
        Ok(Self::new(object_identifier, property_identifier))
    }
}

/// Read Property acknowledgement
#[derive(Debug, Clone, PartialEq)]
pub struct ReadPropertyAck {
    pub object_identifier: ObjectIdentifier,
    pub property_identifier: PropertyIdentifier,
    pub value: PropertyValue,
}

impl ReadPropertyAck {
    pub fn encode(&self, writer: &mut FrameWriter) -> EncodingResult<()> {
        self.object_identifier.encode(writer)?;
        encode_unsigned(writer, self.property_identifier.into())?;
        self.value.encode(writer)
    }

    /// Decodes an acknowledgement; the value's encoding follows from the property.
    pub fn decode(reader: &mut FrameReader<'_>) -> EncodingResult<Self> {
        let object_identifier = ObjectIdentifier::decode(reader)?;
        let property_identifier: PropertyIdentifier = decode_unsigned(reader)?.into();
        let kind = property_identifier
            .value_kind()
            .ok_or(EncodingError::ValueOutOfRange)?;
        let value = PropertyValue::decode(kind, reader)?;
        Ok(Self {
            object_identifier,
            property_identifier,
            value,
        })
    }
}

/// Write Property request (confirmed service)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WritePropertyRequest {
    pub object_identifier: ObjectIdentifier,
    pub property_identifier: PropertyIdentifier,
    pub value: Option<f32>,
}

impl WritePropertyRequest {
    pub fn decode(reader: &mut FrameReader<'_>) -> EncodingResult<Self> {
        let object_identifier = ObjectIdentifier::decode(reader)?;
        let property_identifier = decode_tagged_unsigned(reader)?.into();
        let value = if reader.is_empty() {
            None
        } else {
            Some(decode_real(reader)?)
        };
        Ok(Self {
            object_identifier,
            property_identifier,
            value,
        })
    }
}

/// Error response to a confirmed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPdu {
    pub invoke_id: u8,
    pub service_choice: u8,
    pub error_class: u8,
    pub error_code: u8,
}

impl ErrorPdu {
    pub fn new(invoke_id: u8, service_choice: u8, error: &ServiceError, standard_codes: bool) -> Self {
        let (error_class, error_code) = error.class_and_code(standard_codes);
        Self {
            invoke_id,
            service_choice,
            error_class,
            error_code,
        }
    }

    pub fn apdu(&self) -> Apdu<'static> {
        Apdu::Error {
            invoke_id: self.invoke_id,
            service_choice: self.service_choice,
            error_class: self.error_class,
            error_code: self.error_code,
        }
    }
}

impl fmt::Display for ErrorPdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error(invoke {}, service 0x{:02X}, class {}, code {})",
            self.invoke_id, self.service_choice, self.error_class, self.error_code
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectType;

    #[test]
    fn test_who_is_without_range() {
        let mut r = FrameReader::new(&[]);
        assert_eq!(WhoIsRequest::decode(&mut r).unwrap(), WhoIsRequest::new());
    }

    #[test]
    fn test_who_is_range_uses_context_tags() {
        let bytes = [0x0A, 0x03, 0xE8, 0x1C, 0x00, 0x01, 0x11, 0x70];
        let decoded = WhoIsRequest::decode(&mut FrameReader::new(&bytes)).unwrap();
        assert_eq!(decoded.low_limit, Some(1000));
        assert_eq!(decoded.high_limit, Some(70000));
    }

    #[test]
    fn test_who_is_low_without_high_is_malformed() {
        let mut r = FrameReader::new(&[0x09, 0x05]);
        assert!(WhoIsRequest::decode(&mut r).is_err());
    }

    #[test]
    fn test_i_am_layout() {
        let request = IAmRequest::new(
            ObjectIdentifier::new(ObjectType::Device, 1010),
            1476,
            Segmentation::NoSegmentation,
            1110,
        );
        let mut w = FrameWriter::with_capacity(32);
        request.encode(&mut w).unwrap();
        assert_eq!(
            w.as_slice(),
            &[0x00, 0x08, 0x03, 0xF2, 0x22, 0x05, 0xC4, 0x03, 0x22, 0x04, 0x56]
        );
        let decoded = IAmRequest::decode(&mut FrameReader::new(w.as_slice())).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_read_property_ack() {
        let ack = ReadPropertyAck {
            object_identifier: ObjectIdentifier::new(ObjectType::AnalogInput, 3),
            property_identifier: PropertyIdentifier::ObjectName,
            value: PropertyValue::CharacterString("Temperature".into()),
        };
        let mut w = FrameWriter::with_capacity(64);
        ack.encode(&mut w).unwrap();
        assert_eq!(&w.as_slice()[4..8], &[0x21, 77, 0x75, 11]);
        let decoded = ReadPropertyAck::decode(&mut FrameReader::new(w.as_slice())).unwrap();
        assert_eq!(decoded, ack);
    }

    #[test]
    fn test_write_property_value_optional() {
        let bytes = [0x00, 0x01, 0x00, 0x02, 0x21, 0x55, 0x44, 0x42, 0x96, 0x00, 0x00];
        let decoded = WritePropertyRequest::decode(&mut FrameReader::new(&bytes)).unwrap();
        assert_eq!(
            decoded,
            WritePropertyRequest {
                object_identifier: ObjectIdentifier::new(ObjectType::AnalogOutput, 2),
                property_identifier: PropertyIdentifier::PresentValue,
                value: Some(75.0),
            }
        );

        let mut r = FrameReader::new(&bytes[..6]);
        assert_eq!(WritePropertyRequest::decode(&mut r).unwrap().value, None);
    }

    #[test]
    fn test_service_choice_codes() {
        assert_eq!(ConfirmedServiceChoice::try_from(0x0C), Ok(ConfirmedServiceChoice::ReadProperty));
        assert_eq!(ConfirmedServiceChoice::try_from(0x0E), Err(0x0E));
        assert_eq!(UnconfirmedServiceChoice::try_from(0x00), Ok(UnconfirmedServiceChoice::IAm));
        assert_eq!(UnconfirmedServiceChoice::try_from(0x10), Ok(UnconfirmedServiceChoice::IAm));
        assert_eq!(UnconfirmedServiceChoice::IAm.code(), 0x10);
        assert_eq!(UnconfirmedServiceChoice::try_from(0x02), Err(0x02));
    }

    #[test]
    fn test_error_codes() {
        let unknown = ServiceError::Object(ObjectError::UnknownObject(ObjectIdentifier::new(
            ObjectType::AnalogInput,
            9,
        )));
        assert_eq!(unknown.class_and_code(false), (0, 0));
        assert_eq!(unknown.class_and_code(true), (1, 31));
        assert_eq!(ServiceError::WriteNotSupported.class_and_code(true), (2, 40));
        assert_eq!(ServiceError::UnsupportedService(0x1A).class_and_code(true), (5, 29));

        let pdu = ErrorPdu::new(7, 0x0F, &ServiceError::WriteNotSupported, false);
        let mut w = FrameWriter::with_capacity(8);
        pdu.apdu().encode(&mut w).unwrap();
        assert_eq!(w.as_slice(), &[0x50, 7, 0x0F, 0, 0]);
    }
}
