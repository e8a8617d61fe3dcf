//! BACnet Transport Layer Module
//!
//! The protocol engine never touches sockets directly. Hosts hand it a
//! [`Transport`] that moves whole datagrams and a [`Clock`] that drives the
//! discovery timer; [`Controller::poll`](crate::controller::Controller::poll)
//! ties the three together.
//!
//! With the `std` feature this module provides [`UdpTransport`], a
//! non-blocking UDP socket bound with `socket2` (address reuse and broadcast
//! enabled) whose subnet broadcast address is discovered with `if-addrs`, and
//! [`MonotonicClock`]. The `async` feature adds a tokio host loop in
//! [`async_host`].
//!
//! # Example
//!
//! ```no_run
//! use bacnet_controller::controller::{Controller, ControllerConfig};
//! use bacnet_controller::transport::{MonotonicClock, UdpConfig, UdpTransport};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut controller = Controller::from_config(&ControllerConfig::default())?;
//! let mut transport = UdpTransport::bind(&UdpConfig::default())?;
//! let clock = MonotonicClock::new();
//! loop {
//!     controller.poll(&mut transport, &clock)?;
//!     std::thread::sleep(std::time::Duration::from_millis(10));
//! }
//! # }
//! ```

use std::net::SocketAddr;

use bytes::Bytes;
use thiserror::Error;

#[cfg(feature = "std")]
use std::{
    io::ErrorKind,
    net::{Ipv4Addr, SocketAddrV4, UdpSocket},
    time::{Duration, Instant},
};

#[cfg(feature = "std")]
use log::{debug, info};

#[cfg(feature = "std")]
use crate::datalink::bip::BACNET_IP_PORT;
#[cfg(feature = "std")]
use crate::dispatcher::MAX_DATAGRAM_LEN;

#[cfg(feature = "async")]
pub mod async_host;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur in transport operations
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid transport configuration
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Datagram transport used by the controller
pub trait Transport {
    /// Returns the next pending datagram, or `None` without blocking.
    fn receive(&mut self) -> Result<Option<(Bytes, SocketAddr)>>;

    /// Sends a frame to one peer.
    fn send(&mut self, frame: &[u8], peer: SocketAddr) -> Result<()>;

    /// Sends a frame to the local subnet broadcast address.
    fn broadcast(&mut self, frame: &[u8], port: u16) -> Result<()>;
}

/// Millisecond clock driving the discovery timer
pub trait Clock {
    fn now_millis(&self) -> u64;
}

/// Milliseconds since the clock was created
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

#[cfg(feature = "std")]
impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for MonotonicClock {
    fn now_millis(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// BACnet/IP UDP configuration
#[cfg(feature = "std")]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct UdpConfig {
    /// Local bind address
    pub bind_address: Ipv4Addr,
    /// UDP port
    pub port: u16,
    /// Broadcast address; discovered from the interfaces when absent
    pub broadcast_address: Option<Ipv4Addr>,
    /// Receive buffer size
    pub buffer_size: usize,
}

#[cfg(feature = "std")]
impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind_address: Ipv4Addr::UNSPECIFIED,
            port: BACNET_IP_PORT,
            broadcast_address: None,
            buffer_size: MAX_DATAGRAM_LEN,
        }
    }
}

#[cfg(feature = "std")]
impl UdpConfig {
    /// Broadcast address to announce on.
    pub fn resolve_broadcast(&self) -> Ipv4Addr {
        self.broadcast_address
            .or_else(|| subnet_broadcast(self.bind_address))
            .unwrap_or(Ipv4Addr::BROADCAST)
    }
}

/// Directed broadcast address of the interface matching `bind`.
///
/// An unspecified `bind` matches the first non-loopback IPv4 interface.
#[cfg(feature = "std")]
pub fn subnet_broadcast(bind: Ipv4Addr) -> Option<Ipv4Addr> {
    let interfaces = if_addrs::get_if_addrs().ok()?;
    interfaces
        .into_iter()
        .filter(|iface| !iface.is_loopback())
        .find_map(|iface| match iface.addr {
            if_addrs::IfAddr::V4(v4) if bind.is_unspecified() || v4.ip == bind => {
                let computed = Ipv4Addr::from(u32::from(v4.ip) | !u32::from(v4.netmask));
                debug!("interface {} {} broadcast {:?}", iface.name, v4.ip, v4.broadcast);
                Some(v4.broadcast.unwrap_or(computed))
            }
            _ => None,
        })
}

/// Binds a non-blocking, broadcast-capable UDP socket.
#[cfg(feature = "std")]
pub fn bind_socket(config: &UdpConfig) -> Result<UdpSocket> {
    use socket2::{Domain, Protocol, Socket, Type};

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;
    socket.set_nonblocking(true)?;
    let address = SocketAddr::V4(SocketAddrV4::new(config.bind_address, config.port));
    socket.bind(&address.into())?;
    Ok(socket.into())
}

/// Non-blocking BACnet/IP socket
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    buffer: Vec<u8>,
    broadcast_ip: Ipv4Addr,
}

#[cfg(feature = "std")]
impl UdpTransport {
    pub fn bind(config: &UdpConfig) -> Result<Self> {
        if config.buffer_size == 0 {
            return Err(TransportError::InvalidConfiguration(
                "receive buffer size must be non-zero".into(),
            ));
        }
        let socket = bind_socket(config)?;
        let broadcast_ip = config.resolve_broadcast();
        info!(
            "listening on {} (broadcast {})",
            socket.local_addr()?,
            broadcast_ip
        );
        Ok(Self {
            socket,
            // one spare byte so oversized datagrams are visible
            buffer: vec![0; config.buffer_size + 1],
            broadcast_ip,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn broadcast_ip(&self) -> Ipv4Addr {
        self.broadcast_ip
    }

    /// Blocks for up to `timeout` waiting for a datagram.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.socket.set_nonblocking(timeout.is_none())?;
        self.socket.set_read_timeout(timeout)?;
        Ok(())
    }
}

#[cfg(feature = "std")]
impl Transport for UdpTransport {
    fn receive(&mut self) -> Result<Option<(Bytes, SocketAddr)>> {
        match self.socket.recv_from(&mut self.buffer) {
            Ok((len, peer)) => Ok(Some((Bytes::copy_from_slice(&self.buffer[..len]), peer))),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn send(&mut self, frame: &[u8], peer: SocketAddr) -> Result<()> {
        self.socket.send_to(frame, peer)?;
        Ok(())
    }

    fn broadcast(&mut self, frame: &[u8], port: u16) -> Result<()> {
        self.socket
            .send_to(frame, SocketAddrV4::new(self.broadcast_ip, port))?;
        Ok(())
    }
}
