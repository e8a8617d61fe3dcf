//! BACnet Data Link Layer Module
//!
//! The controller speaks BACnet/IP only (ASHRAE 135 Annex J): UDP datagrams on
//! port 47808 framed by a BVLC header. The [`bip`] module owns that framing;
//! moving datagrams on and off the wire is the job of [`crate::transport`].

/// BACnet/IP (Annex J) framing.
pub mod bip;

pub use bip::{BvlcFunction, BvlcHeader, BACNET_IP_PORT};
