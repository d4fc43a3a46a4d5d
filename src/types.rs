use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;

use crate::{OrientationError, Result};

/// 128-bit identifier in the mixed-endian layout the sensor framework uses.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    pub const NIL: Guid = Guid::from_u128(0);

    /// Build from the canonical `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` value
    /// written as a single integer literal.
    pub const fn from_u128(v: u128) -> Self {
        let tail = (v & 0xFFFF_FFFF_FFFF_FFFF) as u64;
        Guid {
            data1: (v >> 96) as u32,
            data2: (v >> 80) as u16,
            data3: (v >> 64) as u16,
            data4: tail.to_be_bytes(),
        }
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data4;
        write!(
            f,
            "{{{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}}}",
            self.data1, self.data2, self.data3, d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]
        )
    }
}

/// Key of a property or data field: a format GUID plus a property id.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyKey {
    pub fmtid: Guid,
    pub pid: u32,
}

impl PropertyKey {
    pub const fn new(fmtid: Guid, pid: u32) -> Self {
        PropertyKey { fmtid, pid }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.fmtid, self.pid)
    }
}

/// Value stored under a property or data-field key.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PropValue {
    /// Key is known but carries no value yet.
    #[default]
    Empty,
    /// Value was reported but rejected (e.g. an element out of range).
    Null,
    UnsignedInt(u32),
    Float(f32),
    String(String),
    Guid(Guid),
    Timestamp(SystemTime),
    Bytes(Vec<u8>),
    Values(ValueSet),
}

impl PropValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            PropValue::Empty => "empty",
            PropValue::Null => "null",
            PropValue::UnsignedInt(_) => "unsigned",
            PropValue::Float(_) => "float",
            PropValue::String(_) => "string",
            PropValue::Guid(_) => "guid",
            PropValue::Timestamp(_) => "timestamp",
            PropValue::Bytes(_) => "bytes",
            PropValue::Values(_) => "values",
        }
    }

    fn mismatch(&self, expected: &'static str) -> OrientationError {
        OrientationError::TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PropValue::Empty)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropValue::Null)
    }

    pub fn as_unsigned(&self) -> Result<u32> {
        match self {
            PropValue::UnsignedInt(v) => Ok(*v),
            other => Err(other.mismatch("unsigned")),
        }
    }

    pub fn as_float(&self) -> Result<f32> {
        match self {
            PropValue::Float(v) => Ok(*v),
            other => Err(other.mismatch("float")),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            PropValue::String(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn as_guid(&self) -> Result<Guid> {
        match self {
            PropValue::Guid(g) => Ok(*g),
            other => Err(other.mismatch("guid")),
        }
    }

    pub fn as_timestamp(&self) -> Result<SystemTime> {
        match self {
            PropValue::Timestamp(t) => Ok(*t),
            other => Err(other.mismatch("timestamp")),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8]> {
        match self {
            PropValue::Bytes(b) => Ok(b),
            other => Err(other.mismatch("bytes")),
        }
    }

    pub fn as_values(&self) -> Result<&ValueSet> {
        match self {
            PropValue::Values(v) => Ok(v),
            other => Err(other.mismatch("values")),
        }
    }

    /// Pack f32 elements little-endian into a byte vector payload.
    pub fn from_floats(elements: &[f32]) -> PropValue {
        let mut bytes = Vec::with_capacity(elements.len() * 4);
        for e in elements {
            bytes.extend_from_slice(&e.to_le_bytes());
        }
        PropValue::Bytes(bytes)
    }

    /// Unpack a byte vector payload written by [`PropValue::from_floats`].
    pub fn to_floats(&self) -> Result<Vec<f32>> {
        let bytes = self.as_bytes()?;
        if bytes.len() % 4 != 0 {
            return Err(OrientationError::TypeMismatch {
                expected: "f32 buffer",
                found: "bytes",
            });
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

/// Unordered key to value mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueSet {
    values: HashMap<PropertyKey, PropValue>,
}

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &PropertyKey) -> Option<&PropValue> {
        self.values.get(key)
    }

    /// Insert or replace; returns the previous value.
    pub fn set(&mut self, key: PropertyKey, value: PropValue) -> Option<PropValue> {
        self.values.insert(key, value)
    }

    pub fn remove(&mut self, key: &PropertyKey) -> Option<PropValue> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &PropertyKey) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &PropertyKey> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PropertyKey, &PropValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Float stored under `key`, if present and of that type.
    pub fn float(&self, key: &PropertyKey) -> Option<f32> {
        self.get(key).and_then(|v| v.as_float().ok())
    }
}

/// Orientation quaternion in x, y, z, w order.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub fn from_array(q: [f32; 4]) -> Self {
        Quaternion {
            x: q[0],
            y: q[1],
            z: q[2],
            w: q[3],
        }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }

    /// Row-major rotation matrix for a normalized quaternion.
    pub fn to_rotation_matrix(self) -> RotationMatrix {
        let Quaternion { x, y, z, w } = self;
        RotationMatrix([
            [
                1.0 - 2.0 * y * y - 2.0 * z * z,
                2.0 * x * y - 2.0 * z * w,
                2.0 * x * z + 2.0 * y * w,
            ],
            [
                2.0 * x * y + 2.0 * z * w,
                1.0 - 2.0 * x * x - 2.0 * z * z,
                2.0 * y * z - 2.0 * x * w,
            ],
            [
                2.0 * x * z - 2.0 * y * w,
                2.0 * y * z + 2.0 * x * w,
                1.0 - 2.0 * x * x - 2.0 * y * y,
            ],
        ])
    }

    /// Decode the data-field payload published for a quaternion.
    pub fn from_value(value: &PropValue) -> Result<Self> {
        let f = value.to_floats()?;
        if f.len() != 4 {
            return Err(OrientationError::TypeMismatch {
                expected: "4 floats",
                found: "bytes",
            });
        }
        Ok(Quaternion::from_array([f[0], f[1], f[2], f[3]]))
    }

    pub fn to_value(self) -> PropValue {
        PropValue::from_floats(&self.to_array())
    }
}

/// 3x3 row-major rotation matrix.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationMatrix(pub [[f32; 3]; 3]);

impl RotationMatrix {
    pub const IDENTITY: RotationMatrix =
        RotationMatrix([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);

    pub fn flatten(&self) -> [f32; 9] {
        let m = &self.0;
        [
            m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
        ]
    }

    pub fn from_flat(e: &[f32; 9]) -> Self {
        RotationMatrix([[e[0], e[1], e[2]], [e[3], e[4], e[5]], [e[6], e[7], e[8]]])
    }

    pub fn from_value(value: &PropValue) -> Result<Self> {
        let f = value.to_floats()?;
        let flat: [f32; 9] = f.as_slice().try_into().map_err(|_| OrientationError::TypeMismatch {
            expected: "9 floats",
            found: "bytes",
        })?;
        Ok(RotationMatrix::from_flat(&flat))
    }

    pub fn to_value(&self) -> PropValue {
        PropValue::from_floats(&self.flatten())
    }
}

/// Sensor state as the framework sees it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorState {
    Ready = 0,
    NotAvailable = 1,
    NoData = 2,
    Initializing = 3,
    AccessDenied = 4,
    Error = 5,
}

impl SensorState {
    /// Map the selector index of the HID "Sensor State" named array.
    pub fn from_hid_index(index: u32) -> Self {
        match index {
            1 => SensorState::Ready,
            2 => SensorState::NotAvailable,
            3 => SensorState::NoData,
            4 => SensorState::Initializing,
            5 => SensorState::AccessDenied,
            6 => SensorState::Error,
            _ => SensorState::NotAvailable,
        }
    }

    pub fn code(self) -> u32 {
        self as u32
    }
}

/// HID "Reporting State" selector, in named-array order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportingState {
    NoEvents = 0,
    AllEvents = 1,
    ThresholdEvents = 2,
    WakeNoEvents = 3,
    WakeAllEvents = 4,
    WakeThresholdEvents = 5,
}

impl ReportingState {
    pub fn from_index(index: u32) -> Option<Self> {
        Some(match index {
            0 => ReportingState::NoEvents,
            1 => ReportingState::AllEvents,
            2 => ReportingState::ThresholdEvents,
            3 => ReportingState::WakeNoEvents,
            4 => ReportingState::WakeAllEvents,
            5 => ReportingState::WakeThresholdEvents,
            _ => return None,
        })
    }

    pub fn index(self) -> u32 {
        self as u32
    }
}

/// HID "Power State" selector, in named-array order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Undefined = 0,
    FullPower = 1,
    LowPower = 2,
    StandbyWithWake = 3,
    SleepWithWake = 4,
    PowerOff = 5,
}

impl PowerState {
    pub fn from_index(index: u32) -> Option<Self> {
        Some(match index {
            0 => PowerState::Undefined,
            1 => PowerState::FullPower,
            2 => PowerState::LowPower,
            3 => PowerState::StandbyWithWake,
            4 => PowerState::SleepWithWake,
            5 => PowerState::PowerOff,
            _ => return None,
        })
    }

    pub fn index(self) -> u32 {
        self as u32
    }
}

bitflags::bitflags! {
    /// Optional usages and selectors a descriptor provides for this sensor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[repr(C)]
    pub struct DescriptorFlags: u32 {
        // input report
        const SENSOR_STATE      = 1 << 0;
        const EVENT_TYPE        = 1 << 1;
        const ROTATION_MATRIX   = 1 << 2;
        const QUATERNION        = 1 << 3;
        // feature report
        const REPORTING_STATE   = 1 << 8;
        const POWER_STATE       = 1 << 9;
        const SENSOR_STATUS     = 1 << 10;
        const CONNECTION_TYPE   = 1 << 11;
        const REPORT_INTERVAL   = 1 << 12;
        const MIN_INTERVAL      = 1 << 13;
        const GLOBAL_SENSITIVITY = 1 << 14;
        const GLOBAL_MAXIMUM    = 1 << 15;
        const GLOBAL_MINIMUM    = 1 << 16;
        const GLOBAL_ACCURACY   = 1 << 17;
        const GLOBAL_RESOLUTION = 1 << 18;
        const DESCRIPTOR_STRINGS = 1 << 19;
    }
}

/// Identity strings handed over at initialization.
#[derive(Debug, Clone, Default)]
pub struct SensorIdentity {
    pub device_name: String,
    pub manufacturer: String,
    pub product: String,
    pub serial_number: String,
    pub persistent_id: Guid,
}
