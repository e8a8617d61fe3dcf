//! BACnet Application Layer Module
//!
//! Forming and parsing the Application Protocol Data Units (APDUs) the
//! controller exchanges. Only unsegmented PDUs are handled:
//!
//! | PDU type | Layout |
//! |---|---|
//! | Unconfirmed-Request (0) | `0x00`, service choice, payload |
//! | Confirmed-Request (1) | `0x10`, invoke id, service choice, payload |
//! | ComplexACK (4) | `0x40`, invoke id, service choice, payload |
//! | Error (5) | `0x50`, invoke id, service choice, error class, error code |
//!
//! Decoded APDUs borrow their payload from the received datagram.
//!
//! # Example
//!
//! ```
//! use bacnet_controller::app::Apdu;
//! use bacnet_controller::encoding::FrameWriter;
//!
//! let apdu = Apdu::Error {
//!     invoke_id: 7,
//!     service_choice: 0x0F,
//!     error_class: 0,
//!     error_code: 0,
//! };
//! let mut writer = FrameWriter::with_capacity(8);
//! apdu.encode(&mut writer).unwrap();
//! assert_eq!(writer.as_slice(), &[0x50, 7, 0x0F, 0, 0]);
//! assert_eq!(Apdu::decode(writer.as_slice()).unwrap(), apdu);
//! ```

use std::fmt;

use crate::encoding::{EncodingError, FrameReader, FrameWriter, Result};

/// APDU types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PduType {
    UnconfirmedRequest = 0,
    ConfirmedRequest = 1,
    ComplexAck = 4,
    Error = 5,
}

impl PduType {
    /// Type carried in the high nibble of the first APDU byte.
    pub fn from_header(byte: u8) -> Result<Self> {
        match byte >> 4 {
            0 => Ok(PduType::UnconfirmedRequest),
            1 => Ok(PduType::ConfirmedRequest),
            4 => Ok(PduType::ComplexAck),
            5 => Ok(PduType::Error),
            other => Err(EncodingError::UnsupportedPduType(other)),
        }
    }

    pub fn header_byte(self) -> u8 {
        (self as u8) << 4
    }
}

impl fmt::Display for PduType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PduType::UnconfirmedRequest => "Unconfirmed-Request",
            PduType::ConfirmedRequest => "Confirmed-Request",
            PduType::ComplexAck => "ComplexACK",
            PduType::Error => "Error",
        };
        f.write_str(name)
    }
}

/// Application Protocol Data Unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Apdu<'a> {
    /// Unconfirmed service request
    UnconfirmedRequest { service_choice: u8, payload: &'a [u8] },

    /// Confirmed service request
    ConfirmedRequest {
        invoke_id: u8,
        service_choice: u8,
        payload: &'a [u8],
    },

    /// Complex acknowledgment
    ComplexAck {
        invoke_id: u8,
        service_choice: u8,
        payload: &'a [u8],
    },

    /// Error PDU
    Error {
        invoke_id: u8,
        service_choice: u8,
        error_class: u8,
        error_code: u8,
    },
}

impl<'a> Apdu<'a> {
    pub fn pdu_type(&self) -> PduType {
        match self {
            Apdu::UnconfirmedRequest { .. } => PduType::UnconfirmedRequest,
            Apdu::ConfirmedRequest { .. } => PduType::ConfirmedRequest,
            Apdu::ComplexAck { .. } => PduType::ComplexAck,
            Apdu::Error { .. } => PduType::Error,
        }
    }

    pub fn service_choice(&self) -> u8 {
        match *self {
            Apdu::UnconfirmedRequest { service_choice, .. }
            | Apdu::ConfirmedRequest { service_choice, .. }
            | Apdu::ComplexAck { service_choice, .. }
            | Apdu::Error { service_choice, .. } => service_choice,
        }
    }

    pub fn invoke_id(&self) -> Option<u8> {
        match *self {
            Apdu::UnconfirmedRequest { .. } => None,
            Apdu::ConfirmedRequest { invoke_id, .. }
            | Apdu::ComplexAck { invoke_id, .. }
            | Apdu::Error { invoke_id, .. } => Some(invoke_id),
        }
    }

    pub fn encode(&self, writer: &mut FrameWriter) -> Result<()> {
        let header = self.pdu_type().header_byte();
        match *self {
            Apdu::UnconfirmedRequest { service_choice, payload } => {
                writer.require(2 + payload.len())?;
                writer.put_u8(header)?;
                writer.put_u8(service_choice)?;
                writer.put_slice(payload)
            }
            Apdu::ConfirmedRequest { invoke_id, service_choice, payload }
            | Apdu::ComplexAck { invoke_id, service_choice, payload } => {
                writer.require(3 + payload.len())?;
                writer.put_u8(header)?;
                writer.put_u8(invoke_id)?;
                writer.put_u8(service_choice)?;
                writer.put_slice(payload)
            }
            Apdu::Error {
                invoke_id,
                service_choice,
                error_class,
                error_code,
            } => writer.put_slice(&[header, invoke_id, service_choice, error_class, error_code]),
        }
    }

    pub fn decode(data: &'a [u8]) -> Result<Self> {
        let mut reader = FrameReader::new(data);
        let pdu_type = PduType::from_header(reader.read_u8()?)?;

        let apdu = match pdu_type {
            PduType::UnconfirmedRequest => {
                let service_choice = reader.read_u8()?;
                Apdu::UnconfirmedRequest {
                    service_choice,
                    payload: reader.rest(),
                }
            }
            PduType::ConfirmedRequest => {
                let invoke_id = reader.read_u8()?;
                let service_choice = reader.read_u8()?;
                Apdu::ConfirmedRequest {
                    invoke_id,
                    service_choice,
                    payload: reader.rest(),
                }
            }
            PduType::ComplexAck => {
                let invoke_id = reader.read_u8()?;
                let service_choice = reader.read_u8()?;
                Apdu::ComplexAck {
                    invoke_id,
                    service_choice,
                    payload: reader.rest(),
                }
            }
            PduType::Error => Apdu::Error {
                invoke_id: reader.read_u8()?,
                service_choice: reader.read_u8()?,
                error_class: reader.read_u8()?,
                error_code: reader.read_u8()?,
            },
        };
        Ok(apdu)
    }
}
