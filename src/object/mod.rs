//! BACnet Object Types and Property Management
//!
//! The controller models every exposed data point as an [`ObjectRecord`]: an
//! identity (object type + instance), a name, a present value and an optional
//! description. Records live in the [`ObjectRegistry`](registry::ObjectRegistry),
//! which is the single owner of device state; sensor drivers and other value
//! adapters go through its get/set contract.
//!
//! # Object types
//!
//! - [`AnalogInput`](ObjectType::AnalogInput) / [`AnalogOutput`](ObjectType::AnalogOutput):
//!   sensor readings and analog actuators (temperature, dimming level)
//! - [`BinaryInput`](ObjectType::BinaryInput) / [`BinaryOutput`](ObjectType::BinaryOutput):
//!   digital states, stored as `0.0` / `1.0`
//! - [`Device`](ObjectType::Device): the controller itself
//!
//! Other values decode as `Proprietary` or `Reserved` rather than failing.
//!
//! # Examples
//!
//! ```rust
//! use bacnet_controller::object::{ObjectIdentifier, ObjectType};
//!
//! let temp_sensor = ObjectIdentifier::new(ObjectType::AnalogInput, 3);
//! assert_eq!(temp_sensor.to_string(), "AnalogInput:3");
//! assert!(temp_sensor.is_valid());
//! ```

use std::fmt;

use thiserror::Error;

use crate::encoding::{self, FrameReader, FrameWriter};
use crate::open_enum;

pub mod property;
pub mod registry;

pub use property::{PropertyValue, ValueKind};
pub use registry::ObjectRegistry;

/// Result type for object operations
pub type Result<T> = std::result::Result<T, ObjectError>;

/// Longest object name a record may carry
pub const MAX_OBJECT_NAME_LEN: usize = 31;

/// Largest instance number an object identifier can name
pub const MAX_INSTANCE: u32 = 0x3F_FFFF;

/// Errors that can occur in object operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectError {
    /// An object with this identity is already registered
    #[error("object {0} already registered")]
    DuplicateObject(ObjectIdentifier),
    /// No object with this identity is registered
    #[error("unknown object {0}")]
    UnknownObject(ObjectIdentifier),
    /// The object exists but does not serve the property
    #[error("object {object} has no property {property}")]
    UnknownProperty {
        object: ObjectIdentifier,
        property: PropertyIdentifier,
    },
    /// Name is empty or not ASCII
    #[error("invalid object name {0:?}")]
    InvalidName(String),
    /// Name longer than [`MAX_OBJECT_NAME_LEN`]
    #[error("object name is {len} bytes, limit is {max}")]
    NameTooLong { len: usize, max: usize },
    /// Description that cannot be carried as a character string
    #[error("invalid object description")]
    InvalidDescription,
    /// Instance number above [`MAX_INSTANCE`]
    #[error("instance {0} out of range")]
    InvalidInstance(u32),
}

open_enum! {
    /// BACnet object types served by the controller
    pub enum ObjectType: u16, proprietary (128..=1023) {
        AnalogInput = 0,
        AnalogOutput = 1,
        BinaryInput = 3,
        BinaryOutput = 4,
        Device = 8,
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ObjectType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        match self {
            ObjectType::Proprietary(v) | ObjectType::Reserved(v) => serializer.serialize_u16(*v),
            named => serializer.collect_str(named),
        }
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ObjectType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        struct TypeVisitor;

        impl serde::de::Visitor<'_> for TypeVisitor {
            type Value = ObjectType;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object type name or number")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> core::result::Result<ObjectType, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> core::result::Result<ObjectType, E> {
                u16::try_from(v)
                    .map(ObjectType::from)
                    .map_err(|_| E::custom("object type out of range"))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> core::result::Result<ObjectType, E> {
                u16::try_from(v)
                    .map(ObjectType::from)
                    .map_err(|_| E::custom("object type out of range"))
            }
        }

        deserializer.deserialize_any(TypeVisitor)
    }
}

open_enum! {
    /// Property identifiers the controller understands
    pub enum PropertyIdentifier: u32, proprietary (512..=4_194_303) {
        ObjectIdentifier = 75,
        ObjectName = 77,
        ObjectType = 79,
        PresentValue = 85,
        VendorIdentifier = 96,
        VendorName = 99,
        SystemStatus = 112,
    }
}

/// Device system status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceStatus {
    Operational = 0,
    OperationalReadOnly = 1,
    DownloadRequired = 2,
    DownloadInProgress = 3,
    NonOperational = 4,
}

/// Segmentation support advertised in I-Am
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Segmentation {
    Both = 0,
    Transmit = 1,
    Receive = 2,
    NoSegmentation = 3,
}

impl TryFrom<u8> for Segmentation {
    type Error = u8;

    fn try_from(value: u8) -> core::result::Result<Self, u8> {
        match value {
            0 => Ok(Segmentation::Both),
            1 => Ok(Segmentation::Transmit),
            2 => Ok(Segmentation::Receive),
            3 => Ok(Segmentation::NoSegmentation),
            other => Err(other),
        }
    }
}

/// Object identifier (type + instance number)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectIdentifier {
    pub object_type: ObjectType,
    pub instance: u32,
}

impl ObjectIdentifier {
    pub fn new(object_type: ObjectType, instance: u32) -> Self {
        Self {
            object_type,
            instance,
        }
    }

    /// Check if instance number is valid (0-4194303)
    pub fn is_valid(&self) -> bool {
        self.instance <= MAX_INSTANCE
    }

    pub fn encode(&self, writer: &mut FrameWriter) -> encoding::Result<()> {
        encoding::encode_object_identifier(writer, self.object_type.into(), self.instance)
    }

    pub fn decode(reader: &mut FrameReader<'_>) -> encoding::Result<Self> {
        let (object_type, instance) = encoding::decode_object_identifier(reader)?;
        Ok(Self::new(object_type.into(), instance))
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.instance)
    }
}

/// Identity of the device this controller presents on the network
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceIdentity {
    pub instance: u32,
    pub object_name: String,
    pub description: Option<String>,
    pub vendor_name: String,
    pub vendor_identifier: u16,
    pub max_apdu_length: u16,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            instance: 1010,
            object_name: "SBMCon".into(),
            description: Some("Smart Building Controller".into()),
            vendor_name: "Sachithra".into(),
            vendor_identifier: 1110,
            max_apdu_length: 1476,
        }
    }
}

impl DeviceIdentity {
    pub fn identifier(&self) -> ObjectIdentifier {
        ObjectIdentifier::new(ObjectType::Device, self.instance)
    }

    /// Registry record for the device object itself.
    pub fn record(&self) -> ObjectRecord {
        ObjectRecord {
            identifier: self.identifier(),
            name: self.object_name.clone(),
            present_value: 0.0,
            description: self.description.clone(),
        }
    }
}

/// One exposed data point
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    pub identifier: ObjectIdentifier,
    pub name: String,
    pub present_value: f32,
    pub description: Option<String>,
}

impl ObjectRecord {
    pub fn new(object_type: ObjectType, instance: u32, name: impl Into<String>, present_value: f32) -> Self {
        Self {
            identifier: ObjectIdentifier::new(object_type, instance),
            name: name.into(),
            present_value,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn object_type(&self) -> ObjectType {
        self.identifier.object_type
    }

    pub fn instance(&self) -> u32 {
        self.identifier.instance
    }

    /// Present value read as a binary state (any non-zero value is active).
    pub fn binary_value(&self) -> bool {
        self.present_value != 0.0
    }

    /// Checks the record can be served; nothing is truncated to fit.
    pub fn validate(&self) -> Result<()> {
        if !self.identifier.is_valid() {
            return Err(ObjectError::InvalidInstance(self.identifier.instance));
        }
        if self.name.is_empty() || !self.name.is_ascii() {
            return Err(ObjectError::InvalidName(self.name.clone()));
        }
        if self.name.len() > MAX_OBJECT_NAME_LEN {
            return Err(ObjectError::NameTooLong {
                len: self.name.len(),
                max: MAX_OBJECT_NAME_LEN,
            });
        }
        if let Some(description) = &self.description {
            if !description.is_ascii() || description.len() > encoding::MAX_CHARACTER_STRING_LEN {
                return Err(ObjectError::InvalidDescription);
            }
        }
        Ok(())
    }
}
