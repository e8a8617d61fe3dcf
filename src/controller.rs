//! Controller façade.
//!
//! [`Controller`] owns the object registry, the dispatcher and the discovery
//! timer, and is the only type a host needs. Value adapters (sensor drivers,
//! UI, cloud sync) call [`Controller::set_present_value`] and
//! [`Controller::get_present_value`]; the host loop feeds datagrams to
//! [`Controller::on_datagram`] and the clock to [`Controller::tick`], or lets
//! [`Controller::poll`] do both against a [`Transport`].
//!
//! # Example
//!
//! ```
//! use bacnet_controller::controller::{Controller, ControllerConfig};
//! use bacnet_controller::object::ObjectType;
//!
//! let mut controller = Controller::from_config(&ControllerConfig::default()).unwrap();
//! controller.set_present_value(ObjectType::AnalogInput, 3, 21.5).unwrap();
//! assert_eq!(controller.get_present_value(ObjectType::AnalogInput, 3), Some(21.5));
//!
//! // nothing is due before the first interval elapses
//! assert!(controller.tick(0).is_none());
//! assert!(controller.tick(30_000).is_some());
//! ```

use std::fmt;
use std::net::SocketAddr;

use log::{debug, info, warn};

use crate::datalink::bip::BACNET_IP_PORT;
use crate::discovery::{self, DiscoveryResponder, DEFAULT_DISCOVERY_INTERVAL_MS};
use crate::dispatcher::{DropReason, Dispatcher, Outbound, Outcome};
use crate::object::{self, DeviceIdentity, ObjectRecord, ObjectRegistry, ObjectType};
use crate::transport::{self, Clock, Transport};

/// One object to register at startup
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectConfig {
    pub object_type: ObjectType,
    pub instance: u32,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub value: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub description: Option<String>,
}

impl ObjectConfig {
    pub fn new(object_type: ObjectType, instance: u32, name: &str, description: &str) -> Self {
        Self {
            object_type,
            instance,
            name: name.into(),
            value: 0.0,
            description: Some(description.into()),
        }
    }

    fn record(&self) -> ObjectRecord {
        let record = ObjectRecord::new(self.object_type, self.instance, self.name.as_str(), self.value);
        match &self.description {
            Some(description) => record.with_description(description.as_str()),
            None => record,
        }
    }
}

/// Controller configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ControllerConfig {
    /// Identity of the device object
    pub device: DeviceIdentity,
    /// Points registered after the device object
    pub objects: Vec<ObjectConfig>,
    /// Port announcements are broadcast to
    pub port: u16,
    pub discovery_interval_ms: u64,
    /// Report standard error class/code pairs instead of 0/0
    pub standard_error_codes: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device: DeviceIdentity::default(),
            objects: vec![
                ObjectConfig::new(ObjectType::BinaryOutput, 1, "Digital_LED", "Digital LED Output"),
                ObjectConfig::new(ObjectType::AnalogOutput, 2, "Dimming_LED", "Dimming LED Output"),
                ObjectConfig::new(ObjectType::AnalogInput, 3, "Temperature", "Temperature Sensor"),
                ObjectConfig::new(ObjectType::AnalogInput, 4, "Humidity", "Humidity Sensor"),
                ObjectConfig::new(ObjectType::BinaryInput, 5, "Button_State", "Manual Button Input"),
            ],
            port: BACNET_IP_PORT,
            discovery_interval_ms: DEFAULT_DISCOVERY_INTERVAL_MS,
            standard_error_codes: false,
        }
    }
}

/// Controller traffic counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Statistics {
    pub datagrams_received: u64,
    pub datagrams_dropped: u64,
    pub acks_sent: u64,
    pub errors_sent: u64,
    pub announcements_sent: u64,
    pub peer_i_am_seen: u64,
    pub failed_transactions: u64,
    pub send_failures: u64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result of dispatching one datagram
    pub fn record_outcome(&mut self, outcome: &Outcome) {
        self.datagrams_received += 1;
        match outcome {
            Outcome::Responded { .. } => self.acks_sent += 1,
            Outcome::ErrorSent { .. } => self.errors_sent += 1,
            Outcome::Announce { .. } => self.announcements_sent += 1,
            Outcome::Dropped(DropReason::PeerAnnouncement(_)) => {
                self.peer_i_am_seen += 1;
                self.datagrams_dropped += 1;
            }
            Outcome::Dropped(_) => self.datagrams_dropped += 1,
            Outcome::Failed(_) => self.failed_transactions += 1,
        }
    }

    /// Record a periodic announcement
    pub fn record_announcement(&mut self) {
        self.announcements_sent += 1;
    }

    /// Record a reply that could not be built
    pub fn record_failure(&mut self) {
        self.failed_transactions += 1;
    }

    /// Record a frame the transport refused
    pub fn record_send_failure(&mut self) {
        self.send_failures += 1;
    }

    /// Reset all counters
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Snapshot of the controller for status logging
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub port: u16,
    pub device_instance: u32,
    pub device_name: String,
    pub object_count: usize,
    pub statistics: Statistics,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.statistics;
        write!(
            f,
            "port {} device {} {:?}, {} objects; rx {} dropped {} ack {} error {} i-am {} peer i-am {} failed {} send errors {}",
            self.port,
            self.device_instance,
            self.device_name,
            self.object_count,
            s.datagrams_received,
            s.datagrams_dropped,
            s.acks_sent,
            s.errors_sent,
            s.announcements_sent,
            s.peer_i_am_seen,
            s.failed_transactions,
            s.send_failures,
        )
    }
}

/// BACnet/IP controller
#[derive(Debug, Clone)]
pub struct Controller {
    registry: ObjectRegistry,
    dispatcher: Dispatcher,
    discovery: DiscoveryResponder,
    stats: Statistics,
    port: u16,
}

impl Controller {
    /// Creates a controller with an empty registry and default settings.
    pub fn new(identity: DeviceIdentity) -> Self {
        Self {
            registry: ObjectRegistry::new(identity),
            dispatcher: Dispatcher::default(),
            discovery: DiscoveryResponder::default(),
            stats: Statistics::new(),
            port: BACNET_IP_PORT,
        }
    }

    /// Creates a controller and registers the device object followed by
    /// every configured point.
    pub fn from_config(config: &ControllerConfig) -> object::Result<Self> {
        let mut registry = ObjectRegistry::new(config.device.clone());
        registry.insert(config.device.record())?;
        for object in &config.objects {
            registry.insert(object.record())?;
        }

        let device = &config.device;
        info!("BACnet/IP controller on UDP port {}", config.port);
        info!("device {} {:?}", device.instance, device.object_name);
        info!("vendor {} {:?}", device.vendor_identifier, device.vendor_name);
        info!(
            "max APDU {}, {} objects, announcing every {} ms",
            device.max_apdu_length,
            registry.len(),
            config.discovery_interval_ms
        );

        Ok(Self {
            registry,
            dispatcher: Dispatcher::new(config.standard_error_codes),
            discovery: DiscoveryResponder::new(config.discovery_interval_ms),
            stats: Statistics::new(),
            port: config.port,
        })
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    pub fn device(&self) -> &DeviceIdentity {
        self.registry.device()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn register_object(
        &mut self,
        object_type: ObjectType,
        instance: u32,
        name: &str,
        initial_value: f32,
    ) -> object::Result<()> {
        self.registry.register(object_type, instance, name, initial_value)
    }

    pub fn set_present_value(&mut self, object_type: ObjectType, instance: u32, value: f32) -> object::Result<()> {
        self.registry.set_present_value(object_type, instance, value)
    }

    pub fn get_present_value(&self, object_type: ObjectType, instance: u32) -> Option<f32> {
        self.registry.get_present_value(object_type, instance)
    }

    pub fn set_binary_value(&mut self, object_type: ObjectType, instance: u32, active: bool) -> object::Result<()> {
        self.registry.set_binary_value(object_type, instance, active)
    }

    pub fn get_binary_value(&self, object_type: ObjectType, instance: u32) -> Option<bool> {
        self.registry.get_binary_value(object_type, instance)
    }

    /// Dispatches one datagram and returns the frame to send, if any.
    pub fn on_datagram(&mut self, datagram: &[u8], peer: SocketAddr) -> Option<Outbound> {
        let outcome = self.dispatcher.dispatch(&self.registry, datagram, peer);
        self.stats.record_outcome(&outcome);
        outcome.outbound()
    }

    /// Returns an I-Am broadcast when the discovery interval has elapsed.
    pub fn tick(&mut self, now_ms: u64) -> Option<Outbound> {
        if !self.discovery.poll(now_ms) {
            return None;
        }
        match discovery::encode_i_am(self.registry.device()) {
            Ok(frame) => {
                info!(
                    "announcing device {} ({} bytes)",
                    self.registry.device().instance,
                    frame.len()
                );
                self.stats.record_announcement();
                Some(Outbound::Broadcast { frame })
            }
            Err(e) => {
                warn!("cannot encode I-Am: {}", e);
                self.stats.record_failure();
                None
            }
        }
    }

    /// Handles at most one pending datagram, then checks the discovery timer.
    ///
    /// Never blocks as long as the transport does not. Send failures are
    /// logged and counted; only a failing `receive` is returned, and the
    /// timer is checked even then.
    pub fn poll<T, C>(&mut self, transport: &mut T, clock: &C) -> transport::Result<()>
    where
        T: Transport + ?Sized,
        C: Clock + ?Sized,
    {
        let received = transport.receive();
        if let Ok(Some((datagram, peer))) = &received {
            if let Some(outbound) = self.on_datagram(datagram, *peer) {
                self.send(transport, &outbound);
            }
        }
        if let Some(outbound) = self.tick(clock.now_millis()) {
            self.send(transport, &outbound);
        }
        received.map(|_| ())
    }

    fn send<T: Transport + ?Sized>(&mut self, transport: &mut T, outbound: &Outbound) {
        let result = match outbound {
            Outbound::Unicast { frame, peer } => {
                debug!("tx {} bytes to {}", frame.len(), peer);
                transport.send(frame, *peer)
            }
            Outbound::Broadcast { frame } => {
                debug!("tx {} bytes broadcast on port {}", frame.len(), self.port);
                transport.broadcast(frame, self.port)
            }
        };
        if let Err(e) = result {
            warn!("send failed: {}", e);
            self.stats.record_send_failure();
        }
    }

    /// Counts a send that failed outside [`Controller::poll`].
    pub(crate) fn record_send_failure(&mut self) {
        self.stats.record_send_failure();
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    pub fn reset_statistics(&mut self) {
        self.stats.reset();
    }

    pub fn status(&self) -> StatusReport {
        let device = self.registry.device();
        StatusReport {
            port: self.port,
            device_instance: device.instance,
            device_name: device.object_name.clone(),
            object_count: self.registry.len(),
            statistics: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectError, ObjectIdentifier};

    fn peer() -> SocketAddr {
        "10.0.0.9:47808".parse().unwrap()
    }

    #[test]
    fn test_default_config_objects() {
        let controller = Controller::from_config(&ControllerConfig::default()).unwrap();
        let registry = controller.registry();
        assert_eq!(registry.len(), 6);

        let device = registry.lookup(ObjectType::Device, 1010).unwrap();
        assert_eq!(device.name, "SBMCon");
        let button = registry.lookup(ObjectType::BinaryInput, 5).unwrap();
        assert_eq!(button.name, "Button_State");
        assert_eq!(button.description.as_deref(), Some("Manual Button Input"));
    }

    #[test]
    fn test_duplicate_config_object_rejected() {
        let mut config = ControllerConfig::default();
        config.objects.push(ObjectConfig::new(ObjectType::AnalogInput, 3, "Again", "dup"));
        let err = Controller::from_config(&config).unwrap_err();
        assert_eq!(
            err,
            ObjectError::DuplicateObject(ObjectIdentifier::new(ObjectType::AnalogInput, 3))
        );
    }

    #[test]
    fn test_new_controller_is_empty() {
        let mut controller = Controller::new(DeviceIdentity::default());
        assert!(controller.registry().is_empty());
        controller
            .register_object(ObjectType::AnalogInput, 3, "Temperature", 0.0)
            .unwrap();
        assert_eq!(controller.get_present_value(ObjectType::AnalogInput, 3), Some(0.0));
    }

    #[test]
    fn test_binary_values() {
        let mut controller = Controller::from_config(&ControllerConfig::default()).unwrap();
        controller.set_binary_value(ObjectType::BinaryOutput, 1, true).unwrap();
        assert_eq!(controller.get_binary_value(ObjectType::BinaryOutput, 1), Some(true));
        assert_eq!(controller.get_present_value(ObjectType::BinaryOutput, 1), Some(1.0));
    }

    #[test]
    fn test_statistics_follow_outcomes() {
        let mut controller = Controller::from_config(&ControllerConfig::default()).unwrap();

        // Who-Is
        let who_is = [0x81, 0x0B, 0x00, 0x08, 0x01, 0x00, 0x00, 0x08];
        assert!(matches!(
            controller.on_datagram(&who_is, peer()),
            Some(Outbound::Broadcast { .. })
        ));
        // garbage
        assert!(controller.on_datagram(&[0x00, 0x01], peer()).is_none());

        let stats = controller.statistics();
        assert_eq!(stats.datagrams_received, 2);
        assert_eq!(stats.announcements_sent, 1);
        assert_eq!(stats.datagrams_dropped, 1);

        controller.reset_statistics();
        assert_eq!(*controller.statistics(), Statistics::default());
    }

    #[test]
    fn test_tick_counts_announcements() {
        let mut controller = Controller::from_config(&ControllerConfig::default()).unwrap();
        assert!(controller.tick(10_000).is_none());
        assert!(controller.tick(30_000).is_some());
        assert_eq!(controller.statistics().announcements_sent, 1);
    }

    #[test]
    fn test_status_report() {
        let controller = Controller::from_config(&ControllerConfig::default()).unwrap();
        let status = controller.status();
        assert_eq!(status.port, 47808);
        assert_eq!(status.device_instance, 1010);
        assert_eq!(status.object_count, 6);
        let text = status.to_string();
        assert!(text.starts_with("port 47808 device 1010 \"SBMCon\", 6 objects"));
    }
}
