//! Service dispatcher.
//!
//! Turns one received datagram into at most one outbound frame. Each datagram
//! moves through a fixed sequence of states:
//!
//! ```text
//! Received -> Validated -> Unconfirmed | Confirmed -> Dispatched -> Responded | ErrorSent | Dropped
//! ```
//!
//! Validation failures (bad BVLC marker, unsupported framing, an APDU below the
//! minimum length for its PDU type, a ReadProperty body missing its object
//! identifier or property field) end in `Dropped` with nothing sent.
//! Once a confirmed request is accepted it receives exactly one reply: a
//! ComplexACK or an Error PDU. Unconfirmed requests never receive a direct
//! reply; Who-Is yields an I-Am broadcast instead.
//!
//! Invoke ids are echoed back as received. There is no correlation table, no
//! duplicate detection and no retransmission.

use std::net::SocketAddr;

use bytes::Bytes;
use log::{debug, log_enabled, trace, warn, Level};
use thiserror::Error;

use crate::app::{Apdu, PduType};
use crate::datalink::bip::{self, BvlcFunction};
use crate::discovery;
use crate::encoding::{EncodingError, FrameReader, FrameWriter, Result as EncodingResult};
use crate::network::Npdu;
use crate::object::{property, ObjectIdentifier, ObjectRegistry};
use crate::service::{
    ConfirmedServiceChoice, ErrorPdu, IAmRequest, ReadPropertyAck, ReadPropertyRequest,
    ServiceError, UnconfirmedServiceChoice, WhoIsRequest, WritePropertyRequest,
};
use crate::util::{hex_dump, hex_preview};

/// Receive buffer size; longer datagrams are dropped.
pub const MAX_DATAGRAM_LEN: usize = 512;

/// Capacity of ACK and Error response frames
pub const RESPONSE_CAPACITY: usize = 128;

/// Smallest unconfirmed-request APDU: PDU type and service choice
pub const MIN_UNCONFIRMED_LEN: usize = 2;

/// Smallest confirmed-request APDU: PDU type, invoke id and service choice
pub const MIN_CONFIRMED_LEN: usize = 3;

/// Smallest ReadProperty body: object identifier plus a one-byte property field
pub const MIN_READ_PROPERTY_LEN: usize = 6;

/// Dispatch states of a single datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Received,
    Validated,
    Unconfirmed,
    Confirmed,
    Dispatched,
    Responded,
    ErrorSent,
    Dropped,
}

/// Why a datagram produced no reply
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DropReason {
    #[error("datagram of {0} bytes exceeds the receive buffer")]
    Oversized(usize),
    #[error("{len} bytes is below the {min}-byte minimum for {kind}")]
    TooShort {
        len: usize,
        min: usize,
        kind: &'static str,
    },
    #[error("malformed datagram: {0}")]
    Malformed(EncodingError),
    #[error("unexpected {0} PDU")]
    UnexpectedPdu(PduType),
    #[error("peer I-Am")]
    PeerAnnouncement(Option<IAmRequest>),
    #[error("unsupported unconfirmed service 0x{0:02X}")]
    UnsupportedUnconfirmed(u8),
}

/// Frame to put on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Reply to the sender of a request
    Unicast { frame: Bytes, peer: SocketAddr },
    /// Broadcast on the local subnet
    Broadcast { frame: Bytes },
}

impl Outbound {
    pub fn frame(&self) -> &Bytes {
        match self {
            Outbound::Unicast { frame, .. } | Outbound::Broadcast { frame } => frame,
        }
    }
}

/// Result of dispatching one datagram
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// ComplexACK for a confirmed request
    Responded { frame: Bytes, peer: SocketAddr },
    /// Error PDU for a confirmed request
    ErrorSent {
        frame: Bytes,
        peer: SocketAddr,
        error: ServiceError,
    },
    /// I-Am broadcast requested by a Who-Is
    Announce { frame: Bytes },
    /// Nothing to send
    Dropped(DropReason),
    /// The reply could not be encoded; nothing is sent
    Failed(EncodingError),
}

impl Outcome {
    pub fn state(&self) -> TransactionState {
        match self {
            Outcome::Responded { .. } | Outcome::Announce { .. } => TransactionState::Responded,
            Outcome::ErrorSent { .. } => TransactionState::ErrorSent,
            Outcome::Dropped(_) | Outcome::Failed(_) => TransactionState::Dropped,
        }
    }

    pub fn outbound(&self) -> Option<Outbound> {
        match self {
            Outcome::Responded { frame, peer } | Outcome::ErrorSent { frame, peer, .. } => {
                Some(Outbound::Unicast {
                    frame: frame.clone(),
                    peer: *peer,
                })
            }
            Outcome::Announce { frame } => Some(Outbound::Broadcast { frame: frame.clone() }),
            Outcome::Dropped(_) | Outcome::Failed(_) => None,
        }
    }
}

/// Context of the datagram being dispatched
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    pub peer: SocketAddr,
    invoke_id: Option<u8>,
    service_choice: Option<u8>,
    state: TransactionState,
}

impl PendingTransaction {
    fn new(peer: SocketAddr) -> Self {
        Self {
            peer,
            invoke_id: None,
            service_choice: None,
            state: TransactionState::Received,
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    fn advance(&mut self, next: TransactionState) {
        trace!(
            "{} invoke {:?} service {:?}: {:?} -> {:?}",
            self.peer,
            self.invoke_id,
            self.service_choice,
            self.state,
            next
        );
        self.state = next;
    }

    fn finish(mut self, outcome: Outcome) -> Outcome {
        self.advance(outcome.state());
        outcome
    }

    fn drop_with(self, reason: DropReason) -> Outcome {
        self.finish(Outcome::Dropped(reason))
    }
}

/// Strips BVLC and NPDU, returning the APDU bytes and their PDU type.
fn unwrap_layers(datagram: &[u8]) -> EncodingResult<(PduType, &[u8])> {
    let (_, npdu) = bip::decode_frame(datagram)?;
    let mut reader = FrameReader::new(npdu);
    let header = Npdu::decode(&mut reader)?;
    if header.is_network_message() {
        return Err(EncodingError::NetworkMessage);
    }
    let apdu = reader.rest();
    let pdu_type = PduType::from_header(FrameReader::new(apdu).peek_u8()?)?;
    Ok((pdu_type, apdu))
}

/// Frames `apdu` for a unicast reply.
fn unicast_frame(apdu: &Apdu<'_>) -> EncodingResult<Bytes> {
    let mut writer = FrameWriter::with_capacity(RESPONSE_CAPACITY);
    let start = bip::begin_frame(&mut writer, BvlcFunction::OriginalUnicastNpdu)?;
    Npdu::local().encode(&mut writer)?;
    apdu.encode(&mut writer)?;
    bip::finish_frame(&mut writer, start)?;
    Ok(writer.freeze())
}

/// Routes datagrams to service handlers
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    standard_error_codes: bool,
}

impl Dispatcher {
    pub fn new(standard_error_codes: bool) -> Self {
        Self { standard_error_codes }
    }

    pub fn dispatch(&self, registry: &ObjectRegistry, datagram: &[u8], peer: SocketAddr) -> Outcome {
        let mut txn = PendingTransaction::new(peer);
        trace!("rx {} bytes from {}: {}", datagram.len(), peer, hex_preview(datagram));

        if datagram.len() > MAX_DATAGRAM_LEN {
            warn!("dropping {}-byte datagram from {}", datagram.len(), peer);
            return txn.drop_with(DropReason::Oversized(datagram.len()));
        }

        let (pdu_type, apdu_bytes) = match unwrap_layers(datagram) {
            Ok(layers) => layers,
            Err(e) => {
                warn!("malformed datagram from {}: {}", peer, e);
                if log_enabled!(Level::Debug) {
                    debug!("rejected datagram:\n{}", hex_dump(datagram, "  "));
                }
                return txn.drop_with(DropReason::Malformed(e));
            }
        };

        let (min, kind) = match pdu_type {
            PduType::UnconfirmedRequest => (MIN_UNCONFIRMED_LEN, "an unconfirmed request"),
            PduType::ConfirmedRequest => (MIN_CONFIRMED_LEN, "a confirmed request"),
            PduType::ComplexAck | PduType::Error => (0, "a response"),
        };
        if apdu_bytes.len() < min {
            warn!("short APDU from {}: {} bytes", peer, apdu_bytes.len());
            return txn.drop_with(DropReason::TooShort {
                len: apdu_bytes.len(),
                min,
                kind,
            });
        }

        let apdu = match Apdu::decode(apdu_bytes) {
            Ok(apdu) => apdu,
            Err(e) => {
                warn!("malformed APDU from {}: {}", peer, e);
                return txn.drop_with(DropReason::Malformed(e));
            }
        };
        txn.service_choice = Some(apdu.service_choice());
        txn.advance(TransactionState::Validated);

        match apdu {
            Apdu::UnconfirmedRequest {
                service_choice,
                payload,
            } => {
                txn.advance(TransactionState::Unconfirmed);
                self.handle_unconfirmed(registry, txn, service_choice, payload)
            }
            Apdu::ConfirmedRequest {
                invoke_id,
                service_choice,
                payload,
            } => {
                txn.invoke_id = Some(invoke_id);
                txn.advance(TransactionState::Confirmed);
                self.handle_confirmed(registry, txn, invoke_id, service_choice, payload)
            }
            Apdu::ComplexAck { .. } | Apdu::Error { .. } => {
                debug!("ignoring {} from {}", pdu_type, peer);
                txn.drop_with(DropReason::UnexpectedPdu(pdu_type))
            }
        }
    }

    fn handle_unconfirmed(
        &self,
        registry: &ObjectRegistry,
        mut txn: PendingTransaction,
        service_choice: u8,
        payload: &[u8],
    ) -> Outcome {
        let peer = txn.peer;
        match UnconfirmedServiceChoice::try_from(service_choice) {
            Ok(UnconfirmedServiceChoice::WhoIs) => {
                // the range is reported but never evaluated
                match WhoIsRequest::decode(&mut FrameReader::new(payload)) {
                    Ok(WhoIsRequest {
                        low_limit: Some(low),
                        high_limit: Some(high),
                    }) => debug!("Who-Is {}..={} from {}", low, high, peer),
                    Ok(_) => debug!("Who-Is from {}", peer),
                    Err(e) => debug!("Who-Is from {} with unreadable range: {}", peer, e),
                }
                txn.advance(TransactionState::Dispatched);
                match discovery::encode_i_am(registry.device()) {
                    Ok(frame) => txn.finish(Outcome::Announce { frame }),
                    Err(e) => {
                        warn!("cannot encode I-Am: {}", e);
                        txn.finish(Outcome::Failed(e))
                    }
                }
            }
            Ok(UnconfirmedServiceChoice::IAm) => {
                let announcement = IAmRequest::decode(&mut FrameReader::new(payload)).ok();
                match &announcement {
                    Some(i_am) => debug!(
                        "I-Am from {}: {} vendor {}",
                        peer, i_am.device_identifier, i_am.vendor_identifier
                    ),
                    None => debug!("I-Am from {} (undecodable)", peer),
                }
                txn.drop_with(DropReason::PeerAnnouncement(announcement))
            }
            Err(other) => {
                debug!("unsupported unconfirmed service 0x{:02X} from {}", other, peer);
                txn.drop_with(DropReason::UnsupportedUnconfirmed(other))
            }
        }
    }

    fn handle_confirmed(
        &self,
        registry: &ObjectRegistry,
        mut txn: PendingTransaction,
        invoke_id: u8,
        service_choice: u8,
        payload: &[u8],
    ) -> Outcome {
        let peer = txn.peer;
        let result = match ConfirmedServiceChoice::try_from(service_choice) {
            Ok(ConfirmedServiceChoice::ReadProperty) => {
                if payload.len() < MIN_READ_PROPERTY_LEN {
                    warn!("short ReadProperty from {}: {} byte body", peer, payload.len());
                    return txn.drop_with(DropReason::TooShort {
                        len: payload.len(),
                        min: MIN_READ_PROPERTY_LEN,
                        kind: "ReadProperty",
                    });
                }
                let request = match ReadPropertyRequest::decode(&mut FrameReader::new(payload)) {
                    Err(e @ EncodingError::UnexpectedEndOfData { .. }) => {
                        warn!("truncated ReadProperty from {}: {}", peer, e);
                        return txn.drop_with(DropReason::Malformed(e));
                    }
                    decoded => decoded,
                };
                txn.advance(TransactionState::Dispatched);
                request
                    .map_err(ServiceError::from)
                    .and_then(|request| Self::read_property(registry, request))
            }
            Ok(ConfirmedServiceChoice::WriteProperty) => {
                txn.advance(TransactionState::Dispatched);
                match WritePropertyRequest::decode(&mut FrameReader::new(payload)) {
                    Ok(req) => debug!(
                        "WriteProperty {} {} = {:?} from {} refused",
                        req.object_identifier, req.property_identifier, req.value, peer
                    ),
                    Err(e) => debug!("WriteProperty from {} refused ({})", peer, e),
                }
                Err(ServiceError::WriteNotSupported)
            }
            Err(other) => {
                txn.advance(TransactionState::Dispatched);
                warn!("unsupported confirmed service 0x{:02X} from {}", other, peer);
                Err(ServiceError::UnsupportedService(other))
            }
        };

        let encoded = match result {
            Ok(ack) => Self::ack_frame(invoke_id, service_choice, &ack).map(|frame| Outcome::Responded { frame, peer }),
            Err(error) => {
                let pdu = ErrorPdu::new(invoke_id, service_choice, &error, self.standard_error_codes);
                debug!("{} -> {}: {}", peer, pdu, error);
                unicast_frame(&pdu.apdu()).map(|frame| Outcome::ErrorSent { frame, peer, error })
            }
        };
        match encoded {
            Ok(outcome) => txn.finish(outcome),
            Err(e) => {
                warn!("reply to {} (invoke {}) not sent: {}", peer, invoke_id, e);
                txn.finish(Outcome::Failed(e))
            }
        }
    }

    fn read_property(registry: &ObjectRegistry, request: ReadPropertyRequest) -> Result<ReadPropertyAck, ServiceError> {
        let object: ObjectIdentifier = request.object_identifier;
        let value = property::read_property(registry, object, request.property_identifier)?;
        debug!("ReadProperty {} {} = {}", object, request.property_identifier, value);
        Ok(ReadPropertyAck {
            object_identifier: object,
            property_identifier: request.property_identifier,
            value,
        })
    }

    fn ack_frame(invoke_id: u8, service_choice: u8, ack: &ReadPropertyAck) -> EncodingResult<Bytes> {
        let mut payload = FrameWriter::with_capacity(RESPONSE_CAPACITY);
        ack.encode(&mut payload)?;
        unicast_frame(&Apdu::ComplexAck {
            invoke_id,
            service_choice,
            payload: payload.as_slice(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{DeviceIdentity, ObjectType, PropertyIdentifier, PropertyValue};

    fn peer() -> SocketAddr {
        "192.168.1.50:47808".parse().unwrap()
    }

    fn registry() -> ObjectRegistry {
        let identity = DeviceIdentity::default();
        let mut reg = ObjectRegistry::new(identity.clone());
        reg.insert(identity.record()).unwrap();
        reg.register(ObjectType::AnalogInput, 3, "Temperature", 21.5).unwrap();
        reg
    }

    fn frame(apdu: &[u8]) -> Vec<u8> {
        let mut out = vec![0x81, 0x0A, 0x00, 0x00, 0x01, 0x00];
        out.extend_from_slice(apdu);
        let len = out.len() as u16;
        out[2..4].copy_from_slice(&len.to_be_bytes());
        out
    }

    fn read_property(invoke_id: u8, object_type: u8, instance: u8, property: u8) -> Vec<u8> {
        frame(&[0x10, invoke_id, 0x0C, 0x00, object_type, 0x00, instance, 0x21, property])
    }

    #[test]
    fn test_read_property_ack() {
        let outcome = Dispatcher::default().dispatch(&registry(), &read_property(9, 0, 3, 85), peer());
        let Outcome::Responded { frame, peer: to } = outcome else {
            panic!("expected ACK, got {:?}", outcome);
        };
        assert_eq!(to, peer());
        assert_eq!(&frame[..2], &[0x81, 0x0A]);
        assert_eq!(u16::from_be_bytes([frame[2], frame[3]]) as usize, frame.len());
        assert_eq!(&frame[6..9], &[0x40, 9, 0x0C]);

        let ack = ReadPropertyAck::decode(&mut FrameReader::new(&frame[9..])).unwrap();
        assert_eq!(ack.property_identifier, PropertyIdentifier::PresentValue);
        assert_eq!(ack.value, PropertyValue::Real(21.5));
    }

    #[test]
    fn test_transaction_carries_request_identity() {
        let mut txn = PendingTransaction::new(peer());
        assert_eq!((txn.invoke_id, txn.service_choice), (None, None));
        txn.service_choice = Some(0x0C);
        txn.advance(TransactionState::Validated);
        txn.invoke_id = Some(4);
        txn.advance(TransactionState::Confirmed);
        assert_eq!(txn.state(), TransactionState::Confirmed);
        assert_eq!((txn.invoke_id, txn.service_choice), (Some(4), Some(0x0C)));
    }

    #[test]
    fn test_context_tagged_property_field() {
        let datagram = frame(&[0x10, 0x02, 0x0C, 0x00, 0x00, 0x00, 0x03, 0x19, 0x55]);
        let outcome = Dispatcher::default().dispatch(&registry(), &datagram, peer());
        let Outcome::Responded { frame, .. } = outcome else {
            panic!("expected ACK, got {:?}", outcome);
        };
        let ack = ReadPropertyAck::decode(&mut FrameReader::new(&frame[9..])).unwrap();
        assert_eq!(ack.value, PropertyValue::Real(21.5));
    }

    #[test]
    fn test_description_is_not_served() {
        let datagram = read_property(3, 0, 3, 28);
        let outcome = Dispatcher::new(true).dispatch(&registry(), &datagram, peer());
        let Outcome::ErrorSent { frame, .. } = outcome else {
            panic!("expected error, got {:?}", outcome);
        };
        assert_eq!(&frame[6..], &[0x50, 3, 0x0C, 2, 32]);
    }

    #[test]
    fn test_unknown_object_gets_error() {
        let outcome = Dispatcher::default().dispatch(&registry(), &read_property(4, 1, 7, 85), peer());
        let Outcome::ErrorSent { frame, error, .. } = outcome else {
            panic!("expected error, got {:?}", outcome);
        };
        assert!(matches!(error, ServiceError::Object(_)));
        assert_eq!(&frame[6..], &[0x50, 4, 0x0C, 0, 0]);
    }

    #[test]
    fn test_standard_error_codes() {
        let outcome = Dispatcher::new(true).dispatch(&registry(), &read_property(4, 0, 3, 99), peer());
        let Outcome::ErrorSent { frame, .. } = outcome else {
            panic!("expected error, got {:?}", outcome);
        };
        assert_eq!(&frame[6..], &[0x50, 4, 0x0C, 2, 32]);
    }

    #[test]
    fn test_write_property_always_errors() {
        let datagram = frame(&[
            0x10, 0x11, 0x0F, 0x00, 0x00, 0x00, 0x03, 0x21, 0x55, 0x44, 0x41, 0xC8, 0x00, 0x00,
        ]);
        let outcome = Dispatcher::default().dispatch(&registry(), &datagram, peer());
        assert!(matches!(
            outcome,
            Outcome::ErrorSent {
                error: ServiceError::WriteNotSupported,
                ..
            }
        ));

        let truncated = frame(&[0x10, 0x12, 0x0F, 0x00]);
        let outcome = Dispatcher::default().dispatch(&registry(), &truncated, peer());
        assert_eq!(outcome.state(), TransactionState::ErrorSent);
    }

    #[test]
    fn test_unsupported_confirmed_service() {
        let datagram = frame(&[0x10, 0x01, 0x0E, 0x00]);
        let outcome = Dispatcher::default().dispatch(&registry(), &datagram, peer());
        let Outcome::ErrorSent { frame, error, .. } = outcome else {
            panic!("expected error, got {:?}", outcome);
        };
        assert_eq!(error, ServiceError::UnsupportedService(0x0E));
        assert_eq!(&frame[6..], &[0x50, 0x01, 0x0E, 0, 0]);
    }

    #[test]
    fn test_who_is_announces() {
        let datagram = frame(&[0x00, 0x08]);
        let outcome = Dispatcher::default().dispatch(&registry(), &datagram, peer());
        let Some(Outbound::Broadcast { frame }) = outcome.outbound() else {
            panic!("expected broadcast, got {:?}", outcome);
        };
        assert_eq!(&frame[..2], &[0x81, 0x00]);
    }

    #[test]
    fn test_peer_i_am_is_dropped() {
        let datagram = frame(&[
            0x00, 0x00, 0x00, 0x08, 0x00, 0x07, 0x22, 0x05, 0xC4, 0x03, 0x21, 0x0F,
        ]);
        let outcome = Dispatcher::default().dispatch(&registry(), &datagram, peer());
        let Outcome::Dropped(DropReason::PeerAnnouncement(Some(i_am))) = outcome else {
            panic!("expected peer I-Am drop, got {:?}", outcome);
        };
        assert_eq!(i_am.device_identifier, ObjectIdentifier::new(ObjectType::Device, 7));
    }

    #[test]
    fn test_short_datagrams_are_dropped() {
        let reg = registry();
        let d = Dispatcher::default();

        // bare BVLC header
        assert!(d.dispatch(&reg, &[0x81, 0x0A, 0x00, 0x04], peer()).outbound().is_none());

        // confirmed request without invoke id or service choice
        let datagram = frame(&[0x10]);
        assert!(matches!(
            d.dispatch(&reg, &datagram, peer()),
            Outcome::Dropped(DropReason::TooShort { len: 1, min: 3, .. })
        ));

        // unconfirmed request without service choice
        let datagram = frame(&[0x00]);
        assert!(d.dispatch(&reg, &datagram, peer()).outbound().is_none());

        // ReadProperty without an object identifier
        let datagram = frame(&[0x10, 0x01, 0x0C]);
        assert!(matches!(
            d.dispatch(&reg, &datagram, peer()),
            Outcome::Dropped(DropReason::TooShort { len: 0, min: 6, .. })
        ));

        // object identifier only, no property field
        let datagram = frame(&[0x10, 0x01, 0x0C, 0x00, 0x00, 0x00, 0x03]);
        assert!(matches!(
            d.dispatch(&reg, &datagram, peer()),
            Outcome::Dropped(DropReason::TooShort { len: 4, min: 6, .. })
        ));

        // two-byte property field cut after its first byte
        let datagram = frame(&[0x10, 0x01, 0x0C, 0x00, 0x00, 0x00, 0x03, 0x22, 0x00]);
        assert!(matches!(
            d.dispatch(&reg, &datagram, peer()),
            Outcome::Dropped(DropReason::Malformed(EncodingError::UnexpectedEndOfData { .. }))
        ));
    }

    #[test]
    fn test_bad_marker_and_network_messages_dropped() {
        let reg = registry();
        let d = Dispatcher::default();
        let mut datagram = frame(&[0x00, 0x08]);
        datagram[0] = 0x82;
        assert_eq!(
            d.dispatch(&reg, &datagram, peer()),
            Outcome::Dropped(DropReason::Malformed(EncodingError::InvalidMarker(0x82)))
        );

        let network = [0x81, 0x0B, 0x00, 0x07, 0x01, 0x80, 0x00];
        assert_eq!(
            d.dispatch(&reg, &network, peer()),
            Outcome::Dropped(DropReason::Malformed(EncodingError::NetworkMessage))
        );
    }

    #[test]
    fn test_oversized_datagram_dropped() {
        let mut datagram = frame(&[0x00, 0x08]);
        datagram.resize(MAX_DATAGRAM_LEN + 1, 0);
        assert_eq!(
            Dispatcher::default().dispatch(&registry(), &datagram, peer()),
            Outcome::Dropped(DropReason::Oversized(MAX_DATAGRAM_LEN + 1))
        );
    }

    #[test]
    fn test_overflowing_reply_fails() {
        let identity = DeviceIdentity {
            instance: 7,
            vendor_name: "v".repeat(200),
            ..DeviceIdentity::default()
        };
        let mut reg = ObjectRegistry::new(identity.clone());
        reg.insert(identity.record()).unwrap();

        let outcome = Dispatcher::default().dispatch(&reg, &read_property(1, 8, 7, 99), peer());
        assert!(matches!(
            outcome,
            Outcome::Failed(EncodingError::BufferOverflow { .. })
        ));
        assert_eq!(outcome.outbound(), None);
    }
}
