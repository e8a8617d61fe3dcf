//! Discovery responder.
//!
//! The controller announces itself with an I-Am broadcast on a fixed interval
//! and whenever a peer sends Who-Is. Announcements are fire-and-forget.
//!
//! The timer starts at zero: the first periodic announcement goes out once
//! the clock reaches one full interval, and each announcement restarts the
//! interval. I-Am frames sent in reply to Who-Is do not touch the timer.

use bytes::Bytes;
use log::trace;

use crate::app::Apdu;
use crate::datalink::bip::{self, BvlcFunction};
use crate::encoding::{FrameWriter, Result};
use crate::network::Npdu;
use crate::object::{DeviceIdentity, Segmentation};
use crate::service::{IAmRequest, UnconfirmedServiceChoice};

/// Default announcement interval
pub const DEFAULT_DISCOVERY_INTERVAL_MS: u64 = 30_000;

/// Capacity of an I-Am frame
pub const ANNOUNCE_CAPACITY: usize = 50;

/// I-Am payload describing `device`.
pub fn i_am_request(device: &DeviceIdentity) -> IAmRequest {
    IAmRequest::new(
        device.identifier(),
        u32::from(device.max_apdu_length),
        Segmentation::NoSegmentation,
        u32::from(device.vendor_identifier),
    )
}

/// Encodes a complete I-Am broadcast frame for `device`.
pub fn encode_i_am(device: &DeviceIdentity) -> Result<Bytes> {
    let mut payload = FrameWriter::with_capacity(ANNOUNCE_CAPACITY);
    i_am_request(device).encode(&mut payload)?;

    let mut writer = FrameWriter::with_capacity(ANNOUNCE_CAPACITY);
    let start = bip::begin_frame(&mut writer, BvlcFunction::DeviceBroadcast)?;
    Npdu::global_broadcast().encode(&mut writer)?;
    Apdu::UnconfirmedRequest {
        service_choice: UnconfirmedServiceChoice::IAm.code(),
        payload: payload.as_slice(),
    }
    .encode(&mut writer)?;
    bip::finish_frame(&mut writer, start)?;
    Ok(writer.freeze())
}

/// Periodic announcement timer
#[derive(Debug, Clone)]
pub struct DiscoveryResponder {
    interval_ms: u64,
    last_announce_ms: u64,
}

impl Default for DiscoveryResponder {
    fn default() -> Self {
        Self::new(DEFAULT_DISCOVERY_INTERVAL_MS)
    }
}

impl DiscoveryResponder {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_announce_ms: 0,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn last_announce_ms(&self) -> u64 {
        self.last_announce_ms
    }

    /// True once a full interval has passed since the last announcement.
    pub fn is_due(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_announce_ms) >= self.interval_ms
    }

    /// Returns true and restarts the interval if an announcement is due.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if !self.is_due(now_ms) {
            return false;
        }
        trace!("announcement due at {} ms (last {} ms)", now_ms, self.last_announce_ms);
        self.last_announce_ms = now_ms;
        true
    }
}
