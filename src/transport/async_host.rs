//! Tokio host loop.
//!
//! Drives a shared controller from a tokio task. The controller sits behind a
//! [`std::sync::Mutex`] so value adapters on other tasks or threads can update
//! points between datagrams; the lock is never held across an await point.

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::net::UdpSocket;

use super::{bind_socket, Clock, MonotonicClock, Result, UdpConfig};
use crate::controller::Controller;
use crate::dispatcher::{Outbound, MAX_DATAGRAM_LEN};

/// How often the discovery timer is checked
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

fn lock(controller: &Mutex<Controller>) -> MutexGuard<'_, Controller> {
    controller.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Binds the configured socket and serves until `shutdown` completes.
pub async fn run<F>(controller: Arc<Mutex<Controller>>, config: UdpConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let socket = UdpSocket::from_std(bind_socket(&config)?)?;
    info!("async host listening on {}", socket.local_addr()?);
    serve(controller, socket, config.resolve_broadcast(), shutdown).await
}

/// Serves on an already bound socket until `shutdown` completes.
///
/// Announcements go to `broadcast_ip` on the controller's port.
pub async fn serve<F>(
    controller: Arc<Mutex<Controller>>,
    socket: UdpSocket,
    broadcast_ip: Ipv4Addr,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    let clock = MonotonicClock::new();
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    let mut buffer = vec![0u8; MAX_DATAGRAM_LEN + 1];
    tokio::pin!(shutdown);

    loop {
        let outbound = tokio::select! {
            _ = &mut shutdown => {
                info!("async host stopping");
                return Ok(());
            }
            received = socket.recv_from(&mut buffer) => {
                let (len, peer) = received?;
                lock(&controller).on_datagram(&buffer[..len], peer)
            }
            _ = ticker.tick() => {
                lock(&controller).tick(clock.now_millis())
            }
        };

        let Some(outbound) = outbound else {
            continue;
        };
        let target = match &outbound {
            Outbound::Unicast { peer, .. } => *peer,
            Outbound::Broadcast { .. } => {
                let port = lock(&controller).port();
                SocketAddr::V4(SocketAddrV4::new(broadcast_ip, port))
            }
        };
        debug!("tx {} bytes to {}", outbound.frame().len(), target);
        if let Err(e) = socket.send_to(outbound.frame(), target).await {
            warn!("send to {} failed: {}", target, e);
            lock(&controller).record_send_failure();
        }
    }
}
