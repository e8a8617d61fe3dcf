//! # BACnet/IP controller
//!
//! A small BACnet/IP server engine for building-automation controllers. It
//! exposes a fixed set of analog and binary points plus a device object over
//! UDP port 47808, answers ReadProperty requests, refuses WriteProperty, and
//! announces itself with I-Am broadcasts on a timer and in reply to Who-Is.
//!
//! The crate is layered like the protocol stack:
//!
//! - [`datalink::bip`]: BVLC header
//! - [`network`]: NPDU header
//! - [`app`]: APDU framing
//! - [`service`]: service payloads and error PDUs
//! - [`object`]: object model, registry and property access
//! - [`dispatcher`]: one datagram in, at most one frame out
//! - [`discovery`]: I-Am timer and frame builder
//! - [`controller`]: the façade hosts interact with
//! - [`transport`]: datagram and clock abstractions, UDP socket host
//!
//! ## Quick start
//!
//! ```no_run
//! use bacnet_controller::controller::{Controller, ControllerConfig};
//! use bacnet_controller::object::ObjectType;
//! use bacnet_controller::transport::{MonotonicClock, UdpConfig, UdpTransport};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut controller = Controller::from_config(&ControllerConfig::default())?;
//! let mut transport = UdpTransport::bind(&UdpConfig::default())?;
//! let clock = MonotonicClock::new();
//!
//! loop {
//!     // a sensor driver would push readings here
//!     controller.set_present_value(ObjectType::AnalogInput, 3, 22.0)?;
//!     controller.poll(&mut transport, &clock)?;
//!     std::thread::sleep(std::time::Duration::from_millis(10));
//! }
//! # }
//! ```
//!
//! ## Features
//!
//! - `std` (default): [`transport::UdpTransport`] and [`transport::MonotonicClock`]
//! - `serde` (default): (de)serialisation of [`controller::ControllerConfig`]
//! - `async`: tokio host loop in `transport::async_host`

pub mod app;
pub mod controller;
pub mod datalink;
pub mod discovery;
pub mod dispatcher;
pub mod encoding;
pub mod network;
pub mod object;
pub mod service;
pub mod transport;
pub mod util;

pub use controller::{Controller, ControllerConfig, ObjectConfig, StatusReport, Statistics};
pub use dispatcher::{Dispatcher, Outbound, Outcome};
pub use encoding::EncodingError;
pub use object::{DeviceIdentity, ObjectError, ObjectIdentifier, ObjectRegistry, ObjectType, PropertyIdentifier};
pub use service::{ConfirmedServiceChoice, ServiceError, UnconfirmedServiceChoice};
pub use transport::{Clock, Transport, TransportError};
