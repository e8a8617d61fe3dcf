//! Property access table.
//!
//! Which properties each object type serves, how each property's value is
//! encoded, and the lookup that turns a `(object, property)` pair into a
//! [`PropertyValue`].

use std::fmt;

use super::{
    DeviceStatus, ObjectError, ObjectIdentifier, ObjectRecord, ObjectRegistry, ObjectType,
    PropertyIdentifier, Result,
};
use crate::encoding::{self, FrameReader, FrameWriter};

const DEVICE_PROPERTIES: &[PropertyIdentifier] = &[
    PropertyIdentifier::ObjectIdentifier,
    PropertyIdentifier::ObjectName,
    PropertyIdentifier::ObjectType,
    PropertyIdentifier::SystemStatus,
    PropertyIdentifier::VendorName,
    PropertyIdentifier::VendorIdentifier,
];

const POINT_PROPERTIES: &[PropertyIdentifier] = &[
    PropertyIdentifier::ObjectIdentifier,
    PropertyIdentifier::ObjectName,
    PropertyIdentifier::ObjectType,
    PropertyIdentifier::PresentValue,
];

/// Wire representation of a property value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Unsigned,
    Real,
    CharacterString,
    ObjectIdentifier,
}

impl PropertyIdentifier {
    /// How values of this property are encoded, if the controller serves it.
    pub fn value_kind(self) -> Option<ValueKind> {
        match self {
            PropertyIdentifier::ObjectIdentifier => Some(ValueKind::ObjectIdentifier),
            PropertyIdentifier::ObjectName | PropertyIdentifier::VendorName => {
                Some(ValueKind::CharacterString)
            }
            PropertyIdentifier::ObjectType
            | PropertyIdentifier::SystemStatus
            | PropertyIdentifier::VendorIdentifier => Some(ValueKind::Unsigned),
            PropertyIdentifier::PresentValue => Some(ValueKind::Real),
            PropertyIdentifier::Proprietary(_) | PropertyIdentifier::Reserved(_) => None,
        }
    }
}

/// Properties served for objects of `object_type`.
pub fn supported_properties(object_type: ObjectType) -> &'static [PropertyIdentifier] {
    if object_type == ObjectType::Device {
        DEVICE_PROPERTIES
    } else {
        POINT_PROPERTIES
    }
}

/// Property values as carried in ReadProperty acknowledgements
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Unsigned(u32),
    Real(f32),
    CharacterString(String),
    ObjectIdentifier(ObjectIdentifier),
}

impl PropertyValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            PropertyValue::Unsigned(_) => ValueKind::Unsigned,
            PropertyValue::Real(_) => ValueKind::Real,
            PropertyValue::CharacterString(_) => ValueKind::CharacterString,
            PropertyValue::ObjectIdentifier(_) => ValueKind::ObjectIdentifier,
        }
    }

    pub fn encode(&self, writer: &mut FrameWriter) -> encoding::Result<()> {
        match self {
            PropertyValue::Unsigned(v) => encoding::encode_unsigned(writer, *v),
            PropertyValue::Real(v) => encoding::encode_real(writer, *v),
            PropertyValue::CharacterString(s) => encoding::encode_character_string(writer, s),
            PropertyValue::ObjectIdentifier(id) => id.encode(writer),
        }
    }

    pub fn decode(kind: ValueKind, reader: &mut FrameReader<'_>) -> encoding::Result<Self> {
        Ok(match kind {
            ValueKind::Unsigned => PropertyValue::Unsigned(encoding::decode_unsigned(reader)?),
            ValueKind::Real => PropertyValue::Real(encoding::decode_real(reader)?),
            ValueKind::CharacterString => {
                PropertyValue::CharacterString(encoding::decode_character_string(reader)?)
            }
            ValueKind::ObjectIdentifier => PropertyValue::ObjectIdentifier(ObjectIdentifier::decode(reader)?),
        })
    }

    pub fn as_real(&self) -> Option<f32> {
        match self {
            PropertyValue::Real(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Unsigned(v) => write!(f, "{}", v),
            PropertyValue::Real(v) => write!(f, "{}", v),
            PropertyValue::CharacterString(s) => write!(f, "{:?}", s),
            PropertyValue::ObjectIdentifier(id) => write!(f, "{}", id),
        }
    }
}

/// Reads one property of a registered object.
pub fn read_property(
    registry: &ObjectRegistry,
    object: ObjectIdentifier,
    property: PropertyIdentifier,
) -> Result<PropertyValue> {
    let record = registry.get(&object).ok_or(ObjectError::UnknownObject(object))?;
    let unknown = || ObjectError::UnknownProperty { object, property };

    if !supported_properties(object.object_type).contains(&property) {
        return Err(unknown());
    }
    property_value(registry, record, property).ok_or_else(unknown)
}

fn property_value(
    registry: &ObjectRegistry,
    record: &ObjectRecord,
    property: PropertyIdentifier,
) -> Option<PropertyValue> {
    let device = registry.device();
    let value = match property {
        PropertyIdentifier::ObjectIdentifier => PropertyValue::ObjectIdentifier(record.identifier),
        PropertyIdentifier::ObjectName => PropertyValue::CharacterString(record.name.clone()),
        PropertyIdentifier::ObjectType => {
            PropertyValue::Unsigned(u32::from(u16::from(record.object_type())))
        }
        PropertyIdentifier::PresentValue => PropertyValue::Real(record.present_value),
        PropertyIdentifier::SystemStatus => PropertyValue::Unsigned(DeviceStatus::Operational as u32),
        PropertyIdentifier::VendorName => PropertyValue::CharacterString(device.vendor_name.clone()),
        PropertyIdentifier::VendorIdentifier => PropertyValue::Unsigned(u32::from(device.vendor_identifier)),
        PropertyIdentifier::Proprietary(_) | PropertyIdentifier::Reserved(_) => return None,
    };
    Some(value)
}
