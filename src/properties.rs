//! Snapshot of what the device reported through its feature report.
//!
//! Range and sensitivity values are resolved through a three-level fallback:
//! a per-field value overrides the orientation aggregate, which overrides the
//! global value, which overrides the operational default.

use crate::protocol::{self, Modifier};
use crate::registry;
use crate::types::PropertyKey;

/// A value paired with whether the device exposes it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reported<T> {
    supported: bool,
    value: T,
}

impl<T: Copy> Reported<T> {
    pub fn is_supported(&self) -> bool {
        self.supported
    }

    pub fn get(&self) -> Option<T> {
        self.supported.then_some(self.value)
    }

    pub(crate) fn set(&mut self, value: T) {
        self.supported = true;
        self.value = value;
    }
}

/// Per-data-field quantity selected by a data modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Sensitivity,
    Maximum,
    Minimum,
    Accuracy,
    Resolution,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Sensitivity,
        Metric::Maximum,
        Metric::Minimum,
        Metric::Accuracy,
        Metric::Resolution,
    ];

    pub fn from_modifier(modifier: Modifier) -> Option<Metric> {
        match modifier {
            Modifier::ChangeSensitivityAbs => Some(Metric::Sensitivity),
            Modifier::Maximum => Some(Metric::Maximum),
            Modifier::Minimum => Some(Metric::Minimum),
            Modifier::Accuracy => Some(Metric::Accuracy),
            Modifier::Resolution => Some(Metric::Resolution),
            _ => None,
        }
    }

    pub fn modifier(self) -> Modifier {
        match self {
            Metric::Sensitivity => Modifier::ChangeSensitivityAbs,
            Metric::Maximum => Modifier::Maximum,
            Metric::Minimum => Modifier::Minimum,
            Metric::Accuracy => Modifier::Accuracy,
            Metric::Resolution => Modifier::Resolution,
        }
    }

    /// Sensor-wide property usage carrying this metric.
    pub fn global_usage(self) -> u16 {
        match self {
            Metric::Sensitivity => protocol::USAGE_PROP_CHANGE_SENSITIVITY_ABS,
            Metric::Maximum => protocol::USAGE_PROP_RANGE_MAXIMUM,
            Metric::Minimum => protocol::USAGE_PROP_RANGE_MINIMUM,
            Metric::Accuracy => protocol::USAGE_PROP_ACCURACY,
            Metric::Resolution => protocol::USAGE_PROP_RESOLUTION,
        }
    }

    pub fn from_global_usage(usage_id: u16) -> Option<Metric> {
        Metric::ALL.into_iter().find(|m| m.global_usage() == usage_id)
    }

    /// Property key whose nested map holds this metric per data field.
    pub fn property_key(self) -> PropertyKey {
        match self {
            Metric::Sensitivity => registry::CHANGE_SENSITIVITY,
            Metric::Maximum => registry::RANGE_MAXIMUM,
            Metric::Minimum => registry::RANGE_MINIMUM,
            Metric::Accuracy => registry::ACCURACY,
            Metric::Resolution => registry::RESOLUTION,
        }
    }

    pub fn from_property_key(key: &PropertyKey) -> Option<Metric> {
        Metric::ALL.into_iter().find(|m| m.property_key() == *key)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricSet {
    sensitivity: Reported<f32>,
    maximum: Reported<f32>,
    minimum: Reported<f32>,
    accuracy: Reported<f32>,
    resolution: Reported<f32>,
}

impl MetricSet {
    pub fn get(&self, metric: Metric) -> Reported<f32> {
        match metric {
            Metric::Sensitivity => self.sensitivity,
            Metric::Maximum => self.maximum,
            Metric::Minimum => self.minimum,
            Metric::Accuracy => self.accuracy,
            Metric::Resolution => self.resolution,
        }
    }

    pub(crate) fn set(&mut self, metric: Metric, value: f32) {
        match metric {
            Metric::Sensitivity => self.sensitivity.set(value),
            Metric::Maximum => self.maximum.set(value),
            Metric::Minimum => self.minimum.set(value),
            Metric::Accuracy => self.accuracy.set(value),
            Metric::Resolution => self.resolution.set(value),
        }
    }
}

/// The two orientation data fields with dedicated handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    RotationMatrix,
    Quaternion,
}

impl Axis {
    pub fn usage_id(self) -> u16 {
        match self {
            Axis::RotationMatrix => protocol::USAGE_DATA_ROTATION_MATRIX,
            Axis::Quaternion => protocol::USAGE_DATA_QUATERNION,
        }
    }

    pub fn from_usage_id(usage_id: u16) -> Option<Axis> {
        match usage_id {
            protocol::USAGE_DATA_ROTATION_MATRIX => Some(Axis::RotationMatrix),
            protocol::USAGE_DATA_QUATERNION => Some(Axis::Quaternion),
            _ => None,
        }
    }

    pub fn key(self) -> PropertyKey {
        match self {
            Axis::RotationMatrix => registry::ROTATION_MATRIX,
            Axis::Quaternion => registry::QUATERNION,
        }
    }

    pub fn from_key(key: &PropertyKey) -> Option<Axis> {
        [Axis::RotationMatrix, Axis::Quaternion]
            .into_iter()
            .find(|a| a.key() == *key)
    }

    pub fn element_count(self) -> usize {
        match self {
            Axis::RotationMatrix => protocol::ROTATION_MATRIX_ELEMENTS,
            Axis::Quaternion => protocol::QUATERNION_ELEMENTS,
        }
    }
}

/// Level of the fallback chain a value was found at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Field,
    Aggregate,
    Global,
}

impl Level {
    /// Feature usage addressing `metric` at this level for `axis`.
    pub fn usage(self, axis: Axis, metric: Metric) -> u16 {
        match self {
            Level::Field => protocol::compose_usage(axis.usage_id(), metric.modifier()),
            Level::Aggregate => {
                protocol::compose_usage(protocol::USAGE_DATA_ORIENTATION, metric.modifier())
            }
            Level::Global => metric.global_usage(),
        }
    }
}

/// A vendor-specific data field seen in the input report.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicField {
    pub usage_id: u16,
    /// Modifier the input usage carried; only bare fields take feature metrics.
    pub modifier: Modifier,
    pub key: PropertyKey,
    metrics: MetricSet,
}

impl DynamicField {
    pub fn metric(&self, metric: Metric) -> Reported<f32> {
        self.metrics.get(metric)
    }
}

/// Feature-report view of the device. Only the property synchronizer and
/// the input decoder mutate it.
#[derive(Debug, Clone, Default)]
pub struct DeviceProperties {
    reporting_state: Reported<u32>,
    power_state: Reported<u32>,
    sensor_status: Reported<u32>,
    connection_type: Reported<u32>,
    report_interval: Reported<u32>,
    min_report_interval: Reported<u32>,
    global: MetricSet,
    aggregate: MetricSet,
    rotation_matrix: MetricSet,
    quaternion: MetricSet,
    rotation_matrix_seen: bool,
    quaternion_seen: bool,
    strings: Vec<(u16, String)>,
    /// Indexed by data-field position.
    dynamic: Vec<Option<DynamicField>>,
}

impl DeviceProperties {
    pub fn reporting_state(&self) -> Reported<u32> {
        self.reporting_state
    }

    pub fn power_state(&self) -> Reported<u32> {
        self.power_state
    }

    pub fn sensor_status(&self) -> Reported<u32> {
        self.sensor_status
    }

    pub fn connection_type(&self) -> Reported<u32> {
        self.connection_type
    }

    pub fn report_interval(&self) -> Reported<u32> {
        self.report_interval
    }

    pub fn min_report_interval(&self) -> Reported<u32> {
        self.min_report_interval
    }

    pub fn global(&self, metric: Metric) -> Reported<f32> {
        self.global.get(metric)
    }

    pub fn aggregate(&self, metric: Metric) -> Reported<f32> {
        self.aggregate.get(metric)
    }

    pub fn field(&self, axis: Axis, metric: Metric) -> Reported<f32> {
        self.metrics(axis).get(metric)
    }

    /// Whether the input report has carried `axis`.
    pub fn is_seen(&self, axis: Axis) -> bool {
        match axis {
            Axis::RotationMatrix => self.rotation_matrix_seen,
            Axis::Quaternion => self.quaternion_seen,
        }
    }

    pub fn descriptor_string(&self, usage_id: u16) -> Option<&str> {
        self.strings
            .iter()
            .find(|(u, _)| *u == usage_id)
            .map(|(_, s)| s.as_str())
    }

    pub fn dynamic_at(&self, position: usize) -> Option<&DynamicField> {
        self.dynamic.get(position).and_then(|d| d.as_ref())
    }

    pub fn dynamic_by_usage(&self, usage_id: u16) -> Option<(usize, &DynamicField)> {
        self.dynamic
            .iter()
            .enumerate()
            .find_map(|(i, d)| {
                d.as_ref()
                    .filter(|d| d.usage_id == usage_id && d.modifier == Modifier::None)
                    .map(|d| (i, d))
            })
    }

    /// Effective value for `metric` on `axis`.
    pub fn resolve(&self, axis: Axis, metric: Metric, default: f32) -> f32 {
        self.lookup(axis, metric).map_or(default, |(_, v)| v)
    }

    /// Most specific level holding `metric` for `axis`, with its value.
    pub fn lookup(&self, axis: Axis, metric: Metric) -> Option<(Level, f32)> {
        let levels = [
            (Level::Field, self.field(axis, metric)),
            (Level::Aggregate, self.aggregate(metric)),
            (Level::Global, self.global(metric)),
        ];
        levels
            .into_iter()
            .find_map(|(level, r)| r.get().map(|v| (level, v)))
    }

    fn metrics(&self, axis: Axis) -> &MetricSet {
        match axis {
            Axis::RotationMatrix => &self.rotation_matrix,
            Axis::Quaternion => &self.quaternion,
        }
    }

    fn metrics_mut(&mut self, axis: Axis) -> &mut MetricSet {
        match axis {
            Axis::RotationMatrix => &mut self.rotation_matrix,
            Axis::Quaternion => &mut self.quaternion,
        }
    }

    pub(crate) fn set_reporting_state(&mut self, v: u32) {
        self.reporting_state.set(v);
    }

    pub(crate) fn set_power_state(&mut self, v: u32) {
        self.power_state.set(v);
    }

    pub(crate) fn set_sensor_status(&mut self, v: u32) {
        self.sensor_status.set(v);
    }

    pub(crate) fn set_connection_type(&mut self, v: u32) {
        self.connection_type.set(v);
    }

    pub(crate) fn set_report_interval(&mut self, v: u32) {
        self.report_interval.set(v);
    }

    pub(crate) fn set_min_report_interval(&mut self, v: u32) {
        self.min_report_interval.set(v);
    }

    pub(crate) fn set_global(&mut self, metric: Metric, v: f32) {
        self.global.set(metric, v);
    }

    pub(crate) fn set_aggregate(&mut self, metric: Metric, v: f32) {
        self.aggregate.set(metric, v);
    }

    pub(crate) fn set_field(&mut self, axis: Axis, metric: Metric, v: f32) {
        self.metrics_mut(axis).set(metric, v);
    }

    pub(crate) fn set_descriptor_string(&mut self, usage_id: u16, value: String) {
        match self.strings.iter_mut().find(|(u, _)| *u == usage_id) {
            Some(slot) => slot.1 = value,
            None => self.strings.push((usage_id, value)),
        }
    }

    /// Record that `axis` appeared in an input report. Returns true the
    /// first time only.
    pub(crate) fn mark_seen(&mut self, axis: Axis) -> bool {
        let seen = match axis {
            Axis::RotationMatrix => &mut self.rotation_matrix_seen,
            Axis::Quaternion => &mut self.quaternion_seen,
        };
        !std::mem::replace(seen, true)
    }

    pub(crate) fn register_dynamic(&mut self, position: usize, usage: u16, key: PropertyKey) {
        if self.dynamic.len() <= position {
            self.dynamic.resize(position + 1, None);
        }
        if self.dynamic[position].is_none() {
            let (usage_id, modifier) = protocol::split_usage(usage);
            self.dynamic[position] = Some(DynamicField {
                usage_id,
                modifier,
                key,
                metrics: MetricSet::default(),
            });
        }
    }

    pub(crate) fn set_dynamic(&mut self, position: usize, metric: Metric, v: f32) -> bool {
        match self.dynamic.get_mut(position).and_then(|d| d.as_mut()) {
            Some(field) => {
                field.metrics.set(metric, v);
                true
            }
            None => false,
        }
    }
}
