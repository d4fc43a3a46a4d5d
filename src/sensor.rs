use std::sync::Arc;
use std::time::SystemTime;

use crate::caps::{CapabilityTable, Placement};
use crate::events::{EventSink, SensorEvent};
use crate::properties::{Axis, DeviceProperties, Metric};
use crate::protocol;
use crate::registry::{self, KeyRegistry};
use crate::types::{
    DescriptorFlags, PowerState, PropValue, PropertyKey, Quaternion, ReportingState, RotationMatrix,
    SensorIdentity, SensorState, ValueSet,
};
use crate::{OrientationError, Result};

/// Operational defaults used until the device reports its own values.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorConfig {
    pub current_report_interval_ms: u32,
    pub min_report_interval_ms: u32,
    pub change_sensitivity: f32,
    pub range_maximum: f32,
    pub range_minimum: f32,
    pub accuracy: f32,
    pub resolution: f32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        SensorConfig {
            current_report_interval_ms: protocol::DEFAULT_CURRENT_REPORT_INTERVAL_MS,
            min_report_interval_ms: protocol::DEFAULT_MIN_REPORT_INTERVAL_MS,
            change_sensitivity: protocol::DEFAULT_CHANGE_SENSITIVITY,
            range_maximum: protocol::DEFAULT_RANGE_MAXIMUM,
            range_minimum: protocol::DEFAULT_RANGE_MINIMUM,
            accuracy: protocol::DEFAULT_ACCURACY,
            resolution: protocol::DEFAULT_RESOLUTION,
        }
    }
}

impl SensorConfig {
    pub fn default_for(&self, metric: Metric) -> f32 {
        match metric {
            Metric::Sensitivity => self.change_sensitivity,
            Metric::Maximum => self.range_maximum,
            Metric::Minimum => self.range_minimum,
            Metric::Accuracy => self.accuracy,
            Metric::Resolution => self.resolution,
        }
    }
}

bitflags::bitflags! {
    /// Descriptor diagnostics already logged for this instance.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub(crate) struct Informed: u8 {
        const INPUT   = 1 << 0;
        const FEATURE = 1 << 1;
    }
}

/// One logical orientation sensor.
///
/// Owns the device snapshot and the two value maps the framework reads.
/// Every operation takes `&mut self`; callers sharing an instance across
/// threads wrap it in a lock.
pub struct OrientationSensor {
    pub(crate) caps: Arc<CapabilityTable>,
    pub(crate) placement: Placement,
    pub(crate) config: SensorConfig,
    pub(crate) registry: KeyRegistry,
    pub(crate) device: DeviceProperties,
    pub(crate) properties: ValueSet,
    /// Values the host set through `set_property`, per-field maps holding
    /// only the fields it named.
    pub(crate) requests: ValueSet,
    pub(crate) data_fields: ValueSet,
    pub(crate) initialized: bool,
    pub(crate) failure_count: u32,
    pub(crate) informed: Informed,
    pub(crate) descriptor: DescriptorFlags,
    pub(crate) state: SensorState,
    pub(crate) event_type: Option<u32>,
    pub(crate) reporting_state: ReportingState,
    pub(crate) power_state: PowerState,
    sink: Box<dyn EventSink>,
}

impl OrientationSensor {
    /// Create an uninitialized sensor. `caps` may be shared with the other
    /// logical sensors of the same physical collection.
    pub fn new(
        caps: Arc<CapabilityTable>,
        placement: Placement,
        config: SensorConfig,
        sink: Box<dyn EventSink>,
    ) -> Self {
        OrientationSensor {
            caps,
            placement,
            config,
            registry: KeyRegistry::default(),
            device: DeviceProperties::default(),
            properties: ValueSet::new(),
            requests: ValueSet::new(),
            data_fields: ValueSet::new(),
            initialized: false,
            failure_count: 0,
            informed: Informed::empty(),
            descriptor: DescriptorFlags::empty(),
            state: SensorState::NoData,
            event_type: None,
            reporting_state: ReportingState::AllEvents,
            power_state: PowerState::FullPower,
            sink,
        }
    }

    /// Register the orientation keys and seed every default value.
    pub fn initialize(&mut self, identity: &SensorIdentity) -> Result<()> {
        if self.initialized {
            return Err(OrientationError::AlreadyInitialized);
        }

        self.registry = KeyRegistry::orientation();
        self.device = DeviceProperties::default();
        self.properties = ValueSet::new();
        self.requests = ValueSet::new();
        self.data_fields = ValueSet::new();
        for key in self.registry.supported_properties() {
            self.properties.set(*key, PropValue::Empty);
        }
        for key in self.registry.supported_data_fields() {
            self.data_fields.set(*key, PropValue::Empty);
        }
        self.seed_defaults(identity);

        self.initialized = true;
        log::info!(
            "Initialized orientation sensor '{}' (sensor {} of {})",
            identity.device_name,
            self.placement.sensor_index,
            self.placement.sensor_count
        );
        Ok(())
    }

    fn seed_defaults(&mut self, identity: &SensorIdentity) {
        let friendly_name = if self.placement.is_shared() {
            format!("{}: {}", identity.device_name, protocol::ORIENTATION_NAME)
        } else {
            identity.device_name.clone()
        };

        let p = &mut self.properties;
        p.set(
            registry::FUNCTIONAL_OBJECT_CATEGORY,
            PropValue::Guid(registry::CATEGORY_ORIENTATION),
        );
        p.set(
            registry::TYPE,
            PropValue::Guid(registry::TYPE_AGGREGATED_DEVICE_ORIENTATION),
        );
        p.set(registry::STATE, PropValue::UnsignedInt(SensorState::NoData.code()));
        p.set(
            registry::MIN_REPORT_INTERVAL,
            PropValue::UnsignedInt(self.config.min_report_interval_ms),
        );
        p.set(
            registry::PERSISTENT_UNIQUE_ID,
            PropValue::Guid(identity.persistent_id),
        );
        p.set(registry::MANUFACTURER, PropValue::String(identity.manufacturer.clone()));
        p.set(registry::MODEL, PropValue::String(identity.product.clone()));
        p.set(registry::SERIAL_NUMBER, PropValue::String(identity.serial_number.clone()));
        p.set(registry::FRIENDLY_NAME, PropValue::String(friendly_name));
        p.set(
            registry::DESCRIPTION,
            PropValue::String(protocol::ORIENTATION_DESCRIPTION.to_string()),
        );
        p.set(
            registry::CONNECTION_TYPE,
            PropValue::UnsignedInt(registry::CONNECTION_TYPE_PC_ATTACHED),
        );
        p.set(
            registry::CURRENT_REPORT_INTERVAL,
            PropValue::UnsignedInt(self.config.current_report_interval_ms),
        );

        // Per-data-field defaults, only for properties this sensor supports.
        for metric in Metric::ALL {
            let key = metric.property_key();
            if !self.registry.supported_properties().contains(&key) {
                continue;
            }
            let mut per_field = ValueSet::new();
            for field in self.registry.supported_data_fields() {
                if Axis::from_key(field).is_some() {
                    per_field.set(*field, PropValue::Float(self.config.default_for(metric)));
                }
            }
            self.properties.set(key, PropValue::Values(per_field));
        }

        self.data_fields
            .set(registry::TIMESTAMP, PropValue::Timestamp(SystemTime::now()));
        self.data_fields.set(registry::ROTATION_MATRIX, PropValue::Empty);
        self.data_fields.set(registry::QUATERNION, PropValue::Empty);
        self.state = SensorState::NoData;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.caps
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// What the device last reported through its feature report.
    pub fn device_properties(&self) -> &DeviceProperties {
        &self.device
    }

    pub fn properties(&self) -> &ValueSet {
        &self.properties
    }

    pub fn data_fields(&self) -> &ValueSet {
        &self.data_fields
    }

    pub fn property(&self, key: &PropertyKey) -> Option<&PropValue> {
        self.properties.get(key)
    }

    pub fn data_field(&self, key: &PropertyKey) -> Option<&PropValue> {
        self.data_fields.get(key)
    }

    /// Optional usages seen in the descriptor so far.
    pub fn descriptor_flags(&self) -> DescriptorFlags {
        self.descriptor
    }

    pub fn state(&self) -> SensorState {
        self.state
    }

    /// Last event-type selector index seen in an input report.
    pub fn event_type(&self) -> Option<u32> {
        self.event_type
    }

    /// Number of input reports rejected for their length.
    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Latest quaternion, if the last report carried a valid one.
    pub fn quaternion(&self) -> Option<Quaternion> {
        self.data_fields
            .get(&registry::QUATERNION)
            .and_then(|v| Quaternion::from_value(v).ok())
    }

    /// Latest rotation matrix, native or derived.
    pub fn rotation_matrix(&self) -> Option<RotationMatrix> {
        self.data_fields
            .get(&registry::ROTATION_MATRIX)
            .and_then(|v| RotationMatrix::from_value(v).ok())
    }

    pub fn reporting_state(&self) -> ReportingState {
        self.reporting_state
    }

    pub fn power_state(&self) -> PowerState {
        self.power_state
    }

    /// Requested reporting state, written on the next property update.
    pub fn set_reporting_state(&mut self, state: ReportingState) {
        self.reporting_state = state;
    }

    /// Requested power state, written on the next property update.
    pub fn set_power_state(&mut self, state: PowerState) {
        self.power_state = state;
    }

    /// Store a framework request for a settable property.
    ///
    /// Per-data-field maps are merged into the current one, so a request
    /// naming only the quaternion leaves the other fields untouched.
    pub fn set_property(&mut self, key: PropertyKey, value: PropValue) -> Result<()> {
        if !self.initialized {
            return Err(OrientationError::NotInitialized);
        }
        if !self.registry.is_settable(&key) {
            return Err(OrientationError::ReadOnlyProperty(key));
        }

        if key == registry::CURRENT_REPORT_INTERVAL {
            let interval = PropValue::UnsignedInt(value.as_unsigned()?);
            self.properties.set(key, interval.clone());
            self.requests.set(key, interval);
            return Ok(());
        }

        let requested = value.as_values()?;
        let mut fields = Vec::with_capacity(requested.len());
        for (field, v) in requested.iter() {
            fields.push((*field, v.as_float()?));
        }
        for map in [&mut self.properties, &mut self.requests] {
            let mut merged = match map.get(&key) {
                Some(PropValue::Values(current)) => current.clone(),
                _ => ValueSet::new(),
            };
            for (field, v) in &fields {
                merged.set(*field, PropValue::Float(*v));
            }
            map.set(key, PropValue::Values(merged));
        }
        Ok(())
    }

    pub(crate) fn requested_interval(&self) -> Option<u32> {
        self.requests
            .get(&registry::CURRENT_REPORT_INTERVAL)
            .and_then(|v| v.as_unsigned().ok())
    }

    /// Value the host asked for `metric` on one data field, if it asked.
    pub(crate) fn requested_metric(&self, metric: Metric, field: &PropertyKey) -> Option<f32> {
        match self.requests.get(&metric.property_key()) {
            Some(PropValue::Values(v)) => v.float(field),
            _ => None,
        }
    }

    /// Advertise an additional property key. The value starts out empty.
    pub fn add_supported_property(&mut self, key: PropertyKey) {
        if self.registry.add_supported_property(key) {
            self.properties.set(key, PropValue::Empty);
        }
    }

    pub(crate) fn set_state(&mut self, state: SensorState) {
        if state == self.state {
            return;
        }
        log::info!("Sensor state {:?} -> {:?}", self.state, state);
        self.state = state;
        self.properties
            .set(registry::STATE, PropValue::UnsignedInt(state.code()));
        self.sink.emit(SensorEvent::StateChanged(state));
    }

    pub(crate) fn emit(&self, event: SensorEvent) {
        self.sink.emit(event);
    }
}
