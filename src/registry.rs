//! Property and data-field keys of an orientation sensor, and the fixed key
//! sets the sensor advertises.

use crate::types::{Guid, PropertyKey};

/// Format id shared by the common sensor properties.
pub const SENSOR_PROPERTY_FMTID: Guid = Guid::from_u128(0x7F8383EC_D3EC_495C_A8CF_B8BBE85C2920);
const FUNCTIONAL_OBJECT_FMTID: Guid = Guid::from_u128(0x8F052D93_ABCA_4FC5_A5AC_B01DF4DBE598);
const DATA_TYPE_COMMON_FMTID: Guid = Guid::from_u128(0xDB5E0CF2_CF1F_4C18_B46C_D86011D62150);
const DATA_TYPE_ORIENTATION_FMTID: Guid = Guid::from_u128(0x1637D8A2_4248_4275_865D_558DE84AEDFD);
/// Format id of data fields discovered at runtime; the pid is the HID usage id.
pub const DYNAMIC_DATAFIELD_FMTID: Guid = Guid::from_u128(0x5C7C9BB2_F7A4_4F4A_9D2B_0E2B4F8D7A31);

pub const CATEGORY_ORIENTATION: Guid = Guid::from_u128(0x9E6C04B6_96FE_4954_B726_68682A473F69);
pub const TYPE_AGGREGATED_DEVICE_ORIENTATION: Guid =
    Guid::from_u128(0xCDB5D8F7_3CFD_41C8_8542_CCE622CF5D6E);

// -- Properties --
pub const FUNCTIONAL_OBJECT_CATEGORY: PropertyKey = PropertyKey::new(FUNCTIONAL_OBJECT_FMTID, 2);
pub const TYPE: PropertyKey = PropertyKey::new(SENSOR_PROPERTY_FMTID, 2);
pub const STATE: PropertyKey = PropertyKey::new(SENSOR_PROPERTY_FMTID, 3);
pub const PERSISTENT_UNIQUE_ID: PropertyKey = PropertyKey::new(SENSOR_PROPERTY_FMTID, 5);
pub const MANUFACTURER: PropertyKey = PropertyKey::new(SENSOR_PROPERTY_FMTID, 6);
pub const MODEL: PropertyKey = PropertyKey::new(SENSOR_PROPERTY_FMTID, 7);
pub const SERIAL_NUMBER: PropertyKey = PropertyKey::new(SENSOR_PROPERTY_FMTID, 8);
pub const FRIENDLY_NAME: PropertyKey = PropertyKey::new(SENSOR_PROPERTY_FMTID, 9);
pub const DESCRIPTION: PropertyKey = PropertyKey::new(SENSOR_PROPERTY_FMTID, 10);
pub const CONNECTION_TYPE: PropertyKey = PropertyKey::new(SENSOR_PROPERTY_FMTID, 11);
pub const MIN_REPORT_INTERVAL: PropertyKey = PropertyKey::new(SENSOR_PROPERTY_FMTID, 12);
pub const CURRENT_REPORT_INTERVAL: PropertyKey = PropertyKey::new(SENSOR_PROPERTY_FMTID, 13);
pub const CHANGE_SENSITIVITY: PropertyKey = PropertyKey::new(SENSOR_PROPERTY_FMTID, 14);
pub const LIGHT_RESPONSE_CURVE: PropertyKey = PropertyKey::new(SENSOR_PROPERTY_FMTID, 16);
pub const ACCURACY: PropertyKey = PropertyKey::new(SENSOR_PROPERTY_FMTID, 17);
pub const RESOLUTION: PropertyKey = PropertyKey::new(SENSOR_PROPERTY_FMTID, 18);
pub const RANGE_MINIMUM: PropertyKey = PropertyKey::new(SENSOR_PROPERTY_FMTID, 20);
pub const RANGE_MAXIMUM: PropertyKey = PropertyKey::new(SENSOR_PROPERTY_FMTID, 21);
pub const HID_USAGE: PropertyKey = PropertyKey::new(SENSOR_PROPERTY_FMTID, 22);

// -- Data fields --
pub const TIMESTAMP: PropertyKey = PropertyKey::new(DATA_TYPE_COMMON_FMTID, 2);
pub const ROTATION_MATRIX: PropertyKey = PropertyKey::new(DATA_TYPE_ORIENTATION_FMTID, 16);
pub const QUATERNION: PropertyKey = PropertyKey::new(DATA_TYPE_ORIENTATION_FMTID, 17);

/// Connection type value for a sensor built into the host.
pub const CONNECTION_TYPE_PC_ATTACHED: u32 = 0;

pub const REQUIRED_SUPPORTED_PROPERTIES: &[PropertyKey] = &[
    TYPE,
    STATE,
    MIN_REPORT_INTERVAL,
    CURRENT_REPORT_INTERVAL,
    PERSISTENT_UNIQUE_ID,
    MANUFACTURER,
    MODEL,
    SERIAL_NUMBER,
    FRIENDLY_NAME,
    DESCRIPTION,
    CONNECTION_TYPE,
    CHANGE_SENSITIVITY,
    FUNCTIONAL_OBJECT_CATEGORY,
];

pub const OPTIONAL_SUPPORTED_PROPERTIES: &[PropertyKey] =
    &[RANGE_MAXIMUM, RANGE_MINIMUM, ACCURACY, RESOLUTION];

pub const REQUIRED_SETTABLE_PROPERTIES: &[PropertyKey] =
    &[CHANGE_SENSITIVITY, CURRENT_REPORT_INTERVAL];

/// Timestamp must stay first; the write path skips position 0.
pub const SUPPORTED_DATA_FIELDS: &[PropertyKey] = &[TIMESTAMP, QUATERNION, ROTATION_MATRIX];

/// Properties with no device-side representation.
pub const WRITE_NO_OP_PROPERTIES: &[PropertyKey] = &[
    FUNCTIONAL_OBJECT_CATEGORY,
    TYPE,
    STATE,
    MIN_REPORT_INTERVAL,
    PERSISTENT_UNIQUE_ID,
    MANUFACTURER,
    MODEL,
    SERIAL_NUMBER,
    FRIENDLY_NAME,
    DESCRIPTION,
    CONNECTION_TYPE,
    HID_USAGE,
    LIGHT_RESPONSE_CURVE,
];

/// Key a vendor-specific data field is published under. `usage` keeps its
/// modifier nibble, so a bare usage keys by its id alone.
pub fn dynamic_datafield_key(usage: u16) -> PropertyKey {
    PropertyKey::new(DYNAMIC_DATAFIELD_FMTID, usage as u32)
}

/// Ordered key lists an instance advertises to the framework.
///
/// Order matters: data fields are addressed by position, and position 0 is
/// always the timestamp.
#[derive(Debug, Clone, Default)]
pub struct KeyRegistry {
    supported_properties: Vec<PropertyKey>,
    settable_properties: Vec<PropertyKey>,
    supported_data_fields: Vec<PropertyKey>,
}

impl KeyRegistry {
    /// The fixed orientation key sets.
    pub fn orientation() -> Self {
        let mut registry = KeyRegistry::default();
        for key in REQUIRED_SUPPORTED_PROPERTIES.iter().chain(OPTIONAL_SUPPORTED_PROPERTIES) {
            registry.add_supported_property(*key);
        }
        registry.settable_properties = REQUIRED_SETTABLE_PROPERTIES.to_vec();
        registry.supported_data_fields = SUPPORTED_DATA_FIELDS.to_vec();
        registry
    }

    pub fn supported_properties(&self) -> &[PropertyKey] {
        &self.supported_properties
    }

    pub fn settable_properties(&self) -> &[PropertyKey] {
        &self.settable_properties
    }

    pub fn supported_data_fields(&self) -> &[PropertyKey] {
        &self.supported_data_fields
    }

    pub fn is_settable(&self, key: &PropertyKey) -> bool {
        self.settable_properties.contains(key)
    }

    /// Returns false if the key was already present.
    pub fn add_supported_property(&mut self, key: PropertyKey) -> bool {
        if self.supported_properties.contains(&key) {
            return false;
        }
        self.supported_properties.push(key);
        true
    }

    /// Register a data field and return its position.
    pub fn add_data_field(&mut self, key: PropertyKey) -> usize {
        if let Some(pos) = self.data_field_position(&key) {
            return pos;
        }
        self.supported_data_fields.push(key);
        self.supported_data_fields.len() - 1
    }

    pub fn data_field_position(&self, key: &PropertyKey) -> Option<usize> {
        self.supported_data_fields.iter().position(|k| k == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_key_sets() {
        let reg = KeyRegistry::orientation();
        assert_eq!(reg.supported_properties().len(), 17);
        assert!(reg.is_settable(&CHANGE_SENSITIVITY));
        assert!(reg.is_settable(&CURRENT_REPORT_INTERVAL));
        assert!(!reg.is_settable(&RANGE_MAXIMUM));
        assert_eq!(reg.supported_data_fields()[0], TIMESTAMP);
    }

    #[test]
    fn test_dynamic_fields_append_once() {
        let mut reg = KeyRegistry::orientation();
        let key = dynamic_datafield_key(0x0484);
        assert_eq!(reg.add_data_field(key), 3);
        assert_eq!(reg.add_data_field(key), 3);
        assert_eq!(reg.data_field_position(&QUATERNION), Some(1));
        assert!(!reg.add_supported_property(TYPE));
    }

    #[test]
    fn test_keys_are_distinct() {
        let mut all: Vec<PropertyKey> = REQUIRED_SUPPORTED_PROPERTIES
            .iter()
            .chain(OPTIONAL_SUPPORTED_PROPERTIES)
            .chain(SUPPORTED_DATA_FIELDS)
            .copied()
            .collect();
        let n = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), n);
    }
}
