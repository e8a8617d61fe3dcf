//! Object registry.
//!
//! Keyed storage for every [`ObjectRecord`] the controller exposes. Records
//! keep their registration order for enumeration and are indexed by identity
//! for lookups. The registry does no locking of its own; hosts that share it
//! across threads wrap the owning [`Controller`](crate::controller::Controller)
//! in a mutex.

use std::collections::HashMap;

use log::debug;

use super::{DeviceIdentity, ObjectError, ObjectIdentifier, ObjectRecord, ObjectType, Result};

/// Registry of exposed objects
#[derive(Debug, Clone)]
pub struct ObjectRegistry {
    device: DeviceIdentity,
    records: Vec<ObjectRecord>,
    index: HashMap<ObjectIdentifier, usize>,
    /// Incremented on every successful registration
    revision: u32,
}

impl ObjectRegistry {
    /// Creates an empty registry for `device`.
    ///
    /// The device object itself is not registered here; callers that want it
    /// served register [`DeviceIdentity::record`] like any other object.
    pub fn new(device: DeviceIdentity) -> Self {
        Self {
            device,
            records: Vec::new(),
            index: HashMap::new(),
            revision: 0,
        }
    }

    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Registers a new object with an initial present value.
    pub fn register(
        &mut self,
        object_type: ObjectType,
        instance: u32,
        name: &str,
        initial_value: f32,
    ) -> Result<()> {
        self.insert(ObjectRecord::new(object_type, instance, name, initial_value))
    }

    /// Registers a fully built record.
    ///
    /// Fails without touching the registry if the identity is taken or the
    /// record does not validate.
    pub fn insert(&mut self, record: ObjectRecord) -> Result<()> {
        let identifier = record.identifier;
        if self.index.contains_key(&identifier) {
            return Err(ObjectError::DuplicateObject(identifier));
        }
        record.validate()?;

        match &record.description {
            Some(description) => debug!("registered {} {:?} ({})", identifier, record.name, description),
            None => debug!("registered {} {:?}", identifier, record.name),
        }
        self.index.insert(identifier, self.records.len());
        self.records.push(record);
        self.revision = self.revision.wrapping_add(1);
        Ok(())
    }

    pub fn lookup(&self, object_type: ObjectType, instance: u32) -> Option<&ObjectRecord> {
        self.get(&ObjectIdentifier::new(object_type, instance))
    }

    pub fn get(&self, identifier: &ObjectIdentifier) -> Option<&ObjectRecord> {
        self.index.get(identifier).map(|&i| &self.records[i])
    }

    pub fn contains(&self, identifier: &ObjectIdentifier) -> bool {
        self.index.contains_key(identifier)
    }

    pub fn set_present_value(&mut self, object_type: ObjectType, instance: u32, value: f32) -> Result<()> {
        let identifier = ObjectIdentifier::new(object_type, instance);
        let slot = *self
            .index
            .get(&identifier)
            .ok_or(ObjectError::UnknownObject(identifier))?;
        self.records[slot].present_value = value;
        Ok(())
    }

    pub fn get_present_value(&self, object_type: ObjectType, instance: u32) -> Option<f32> {
        self.lookup(object_type, instance).map(|r| r.present_value)
    }

    /// Stores a binary state as `1.0` or `0.0`.
    pub fn set_binary_value(&mut self, object_type: ObjectType, instance: u32, active: bool) -> Result<()> {
        self.set_present_value(object_type, instance, if active { 1.0 } else { 0.0 })
    }

    pub fn get_binary_value(&self, object_type: ObjectType, instance: u32) -> Option<bool> {
        self.lookup(object_type, instance).map(ObjectRecord::binary_value)
    }

    /// All records in registration order.
    pub fn enumerate(&self) -> impl Iterator<Item = &ObjectRecord> + '_ {
        self.records.iter()
    }

    pub fn objects_of_type(&self, object_type: ObjectType) -> impl Iterator<Item = &ObjectRecord> + '_ {
        self.records
            .iter()
            .filter(move |r| r.object_type() == object_type)
    }
}
