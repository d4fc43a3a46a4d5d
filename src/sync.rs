//! Feature path: reads the device configuration into the snapshot and
//! folds the requested configuration back into a feature report.

use std::sync::Arc;

use crate::caps::{CapabilityNode, CapabilityTable};
use crate::extract::{self, RawField};
use crate::hid::FeatureTransport;
use crate::properties::{Axis, Metric};
use crate::protocol::{self, Modifier};
use crate::registry;
use crate::sensor::{Informed, OrientationSensor};
use crate::types::{DescriptorFlags, PropValue, PropertyKey, ValueSet};
use crate::{OrientationError, Result};

/// What to do with a feature value node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureHandler {
    ReportingState,
    PowerState,
    SensorStatus,
    ConnectionType,
    ReportInterval,
    MinReportInterval,
    DescriptorString,
    Global(Metric),
    Aggregate(Metric),
    Field(Axis, Metric),
    Unsupported,
    Dynamic(Metric),
}

impl FeatureHandler {
    pub fn classify(usage_id: u16, modifier: Modifier) -> Self {
        let metric = Metric::from_modifier(modifier);
        match (usage_id, modifier, metric) {
            (protocol::USAGE_PROP_REPORTING_STATE, Modifier::None, _) => {
                FeatureHandler::ReportingState
            }
            (protocol::USAGE_PROP_POWER_STATE, Modifier::None, _) => FeatureHandler::PowerState,
            (protocol::USAGE_PROP_SENSOR_STATUS, Modifier::None, _) => FeatureHandler::SensorStatus,
            (protocol::USAGE_PROP_CONNECTION_TYPE, Modifier::None, _) => {
                FeatureHandler::ConnectionType
            }
            (protocol::USAGE_PROP_REPORT_INTERVAL, Modifier::None, _) => {
                FeatureHandler::ReportInterval
            }
            (protocol::USAGE_PROP_MINIMUM_REPORT_INTERVAL, Modifier::None, _) => {
                FeatureHandler::MinReportInterval
            }
            (
                protocol::USAGE_PROP_FRIENDLY_NAME
                | protocol::USAGE_PROP_PERSISTENT_UNIQUE_ID
                | protocol::USAGE_PROP_MANUFACTURER
                | protocol::USAGE_PROP_MODEL
                | protocol::USAGE_PROP_SERIAL_NUMBER
                | protocol::USAGE_PROP_DESCRIPTION,
                Modifier::None,
                _,
            ) => FeatureHandler::DescriptorString,
            (protocol::USAGE_DATA_ORIENTATION, _, Some(m)) => FeatureHandler::Aggregate(m),
            (protocol::USAGE_DATA_ROTATION_MATRIX, _, Some(m)) => {
                FeatureHandler::Field(Axis::RotationMatrix, m)
            }
            (protocol::USAGE_DATA_QUATERNION, _, Some(m)) => {
                FeatureHandler::Field(Axis::Quaternion, m)
            }
            (id, Modifier::None, _) => {
                Metric::from_global_usage(id).map_or(FeatureHandler::Unsupported, FeatureHandler::Global)
            }
            (_, _, Some(m)) => FeatureHandler::Dynamic(m),
            _ => FeatureHandler::Unsupported,
        }
    }

    fn descriptor_flag(self) -> DescriptorFlags {
        match self {
            FeatureHandler::ReportingState => DescriptorFlags::REPORTING_STATE,
            FeatureHandler::PowerState => DescriptorFlags::POWER_STATE,
            FeatureHandler::SensorStatus => DescriptorFlags::SENSOR_STATUS,
            FeatureHandler::ConnectionType => DescriptorFlags::CONNECTION_TYPE,
            FeatureHandler::ReportInterval => DescriptorFlags::REPORT_INTERVAL,
            FeatureHandler::MinReportInterval => DescriptorFlags::MIN_INTERVAL,
            FeatureHandler::DescriptorString => DescriptorFlags::DESCRIPTOR_STRINGS,
            FeatureHandler::Global(Metric::Sensitivity) => DescriptorFlags::GLOBAL_SENSITIVITY,
            FeatureHandler::Global(Metric::Maximum) => DescriptorFlags::GLOBAL_MAXIMUM,
            FeatureHandler::Global(Metric::Minimum) => DescriptorFlags::GLOBAL_MINIMUM,
            FeatureHandler::Global(Metric::Accuracy) => DescriptorFlags::GLOBAL_ACCURACY,
            FeatureHandler::Global(Metric::Resolution) => DescriptorFlags::GLOBAL_RESOLUTION,
            _ => DescriptorFlags::empty(),
        }
    }
}

/// Outcome of synchronizing one property key on the write path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySync {
    /// At least one value was written into the buffer.
    Resolved,
    /// Nothing to synchronize for this key.
    Skipped,
}

impl OrientationSensor {
    /// Parse a feature report into the device snapshot and publish the
    /// device-reported properties.
    ///
    /// Values the host requested through `set_property` stay published
    /// until the device has been written; the snapshot still learns what
    /// the device currently runs with.
    pub fn read_feature_report(&mut self, buf: &[u8]) -> Result<()> {
        if !self.initialized {
            return Err(OrientationError::NotInitialized);
        }
        if !self.caps.feature_reports_supported {
            self.inform_feature_conditions();
            return Err(OrientationError::FeatureUnavailable);
        }

        let declared = self.caps.feature_report_len;
        if buf.len() != declared {
            log::error!(
                "Feature report is incorrect length, is = {}, should be = {}",
                buf.len(),
                declared
            );
            return Err(OrientationError::MalformedReport {
                actual: buf.len(),
                expected: declared,
            });
        }

        let caps = Arc::clone(&self.caps);
        let placement = self.placement;
        for node in caps.feature_nodes(&placement) {
            let raw = extract::extract_field(node, buf, declared)?;
            let handler = FeatureHandler::classify(node.usage_id(), node.modifier());
            self.descriptor |= handler.descriptor_flag();
            self.apply_feature_value(handler, node, &raw);
        }

        self.publish_device_properties();
        self.inform_feature_conditions();
        Ok(())
    }

    fn apply_feature_value(&mut self, handler: FeatureHandler, node: &CapabilityNode, raw: &RawField) {
        let scalar = raw.elements().first().copied().unwrap_or(0);
        let physical = extract::to_physical(node, scalar);
        match handler {
            FeatureHandler::ReportingState => self.device.set_reporting_state(scalar),
            FeatureHandler::PowerState => self.device.set_power_state(scalar),
            FeatureHandler::SensorStatus => self.device.set_sensor_status(scalar),
            FeatureHandler::ConnectionType => self.device.set_connection_type(scalar),
            FeatureHandler::ReportInterval => {
                self.device.set_report_interval(physical.round() as u32)
            }
            FeatureHandler::MinReportInterval => {
                self.device.set_min_report_interval(physical.round() as u32)
            }
            FeatureHandler::DescriptorString => {
                if let Some(s) = decode_string(raw) {
                    self.device.set_descriptor_string(node.usage_id(), s);
                }
            }
            FeatureHandler::Global(metric) => self.device.set_global(metric, physical as f32),
            FeatureHandler::Aggregate(metric) => {
                if node.units == protocol::UNITS_NOT_SPECIFIED {
                    self.device.set_aggregate(metric, physical as f32);
                } else {
                    log::debug!("Ignoring aggregate {:?} with units 0x{:x}", metric, node.units);
                }
            }
            FeatureHandler::Field(axis, metric) => {
                if node.units == protocol::UNITS_NOT_SPECIFIED
                    || node.units == protocol::UNITS_DEGREES
                {
                    self.device.set_field(axis, metric, physical as f32);
                } else {
                    log::debug!(
                        "Ignoring {:?} {:?} with units 0x{:x}",
                        axis,
                        metric,
                        node.units
                    );
                }
            }
            FeatureHandler::Dynamic(metric) => {
                let position = self
                    .device
                    .dynamic_by_usage(node.usage_id())
                    .map(|(pos, _)| pos);
                match position {
                    Some(pos) => {
                        self.device.set_dynamic(pos, metric, physical as f32);
                    }
                    None => log::trace!(
                        "No data field for feature usage 0x{:04x}, ignoring",
                        node.usage
                    ),
                }
            }
            FeatureHandler::Unsupported => {
                log::trace!("Ignoring feature usage 0x{:04x}", node.usage);
            }
        }
    }

    /// Refresh the property map from the snapshot, skipping host requests.
    fn publish_device_properties(&mut self) {
        if self.requested_interval().is_none() {
            if let Some(v) = self.device.report_interval().get() {
                self.properties
                    .set(registry::CURRENT_REPORT_INTERVAL, PropValue::UnsignedInt(v));
            }
        }
        if let Some(v) = self.device.min_report_interval().get() {
            self.properties
                .set(registry::MIN_REPORT_INTERVAL, PropValue::UnsignedInt(v));
        }
        if let Some(v) = self.device.connection_type().get() {
            self.properties
                .set(registry::CONNECTION_TYPE, PropValue::UnsignedInt(v));
        }

        let fields = self.registry.supported_data_fields().to_vec();
        for metric in Metric::ALL {
            let key = metric.property_key();
            if !self.registry.supported_properties().contains(&key) {
                continue;
            }
            let mut per_field = match self.properties.get(&key) {
                Some(PropValue::Values(v)) => v.clone(),
                _ => ValueSet::new(),
            };
            for (position, field) in fields.iter().enumerate().skip(1) {
                if self.requested_metric(metric, field).is_some() {
                    continue;
                }
                let value = match Axis::from_key(field) {
                    Some(axis) => Some(self.device.resolve(axis, metric, self.config.default_for(metric))),
                    None => self
                        .device
                        .dynamic_at(position)
                        .and_then(|d| d.metric(metric).get()),
                };
                if let Some(v) = value {
                    per_field.set(*field, PropValue::Float(v));
                }
            }
            self.properties.set(key, PropValue::Values(per_field));
        }
    }

    fn inform_feature_conditions(&mut self) {
        if self.informed.contains(Informed::FEATURE) {
            return;
        }
        self.informed |= Informed::FEATURE;
        if !self.caps.feature_reports_supported {
            log::warn!("Device does not support feature reports");
            return;
        }
        let shape = self.descriptor;
        for (flag, name) in [
            (DescriptorFlags::REPORTING_STATE, "reporting state"),
            (DescriptorFlags::POWER_STATE, "power state"),
            (DescriptorFlags::REPORT_INTERVAL, "report interval"),
            (DescriptorFlags::SENSOR_STATUS, "sensor status"),
            (DescriptorFlags::CONNECTION_TYPE, "connection type"),
        ] {
            if !shape.contains(flag) {
                log::warn!("Feature report descriptor has no {} selector", name);
            }
        }
        log::info!("Feature report descriptor provides {:?}", shape);
    }

    /// Fold every supported property into `buf` and return the length to
    /// transmit.
    ///
    /// Keys are processed independently; the first fault is returned once
    /// all keys have been visited and values written for earlier keys stay
    /// in the buffer. Reporting and power state go in last.
    pub fn write_feature_report(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.initialized {
            return Err(OrientationError::NotInitialized);
        }
        if !self.caps.feature_reports_supported {
            return Err(OrientationError::FeatureUnavailable);
        }
        let declared = self.caps.feature_report_len;
        if buf.len() < declared {
            return Err(OrientationError::MalformedReport {
                actual: buf.len(),
                expected: declared,
            });
        }
        let buf = &mut buf[..declared];

        let caps = Arc::clone(&self.caps);
        let keys = self.registry.supported_properties().to_vec();
        let mut fault = None;
        for key in keys {
            match self.sync_key(&caps, &key, buf) {
                Ok(KeySync::Resolved) => log::trace!("Wrote property {}", key),
                Ok(KeySync::Skipped) => {}
                Err(e) => {
                    log::error!("Failed to synchronize property {}: {}", key, e);
                    fault.get_or_insert(e);
                }
            }
        }
        if let Some(e) = fault {
            return Err(e);
        }

        self.write_selectors(&caps, buf)?;
        Ok(declared)
    }

    fn sync_key(
        &self,
        caps: &CapabilityTable,
        key: &PropertyKey,
        buf: &mut [u8],
    ) -> Result<KeySync> {
        if *key == registry::CURRENT_REPORT_INTERVAL {
            if !self.device.report_interval().is_supported() {
                return Ok(KeySync::Skipped);
            }
            let Some(node) = caps.find_feature(&self.placement, protocol::USAGE_PROP_REPORT_INTERVAL)
            else {
                return Ok(KeySync::Skipped);
            };
            let interval = self
                .requested_interval()
                .or_else(|| self.device.report_interval().get())
                .unwrap_or(self.config.current_report_interval_ms);
            extract::write_field(node, buf, interval as f64)?;
            return Ok(KeySync::Resolved);
        }
        if let Some(metric) = Metric::from_property_key(key) {
            return self.sync_metric(caps, metric, buf);
        }
        if registry::WRITE_NO_OP_PROPERTIES.contains(key) {
            return Ok(KeySync::Skipped);
        }
        Err(OrientationError::UnhandledProperty(*key))
    }

    /// Write `metric` for every data field after the timestamp, at the
    /// most specific node the device exposes.
    ///
    /// Fields the host named get the requested value, the rest get back
    /// what the device reported. Axes resolving to the same shared node
    /// write it once; a host request takes it over.
    fn sync_metric(&self, caps: &CapabilityTable, metric: Metric, buf: &mut [u8]) -> Result<KeySync> {
        let mut targets: Vec<(&CapabilityNode, f32, bool)> = Vec::new();
        for (position, field) in self.registry.supported_data_fields().iter().enumerate().skip(1) {
            let (usage, current) = match Axis::from_key(field) {
                Some(axis) => {
                    if !self.device.is_seen(axis) {
                        continue;
                    }
                    match self.device.lookup(axis, metric) {
                        Some((level, v)) => (level.usage(axis, metric), v),
                        None => continue,
                    }
                }
                None => match self.device.dynamic_at(position) {
                    Some(d) => match d.metric(metric).get() {
                        Some(v) => (protocol::compose_usage(d.usage_id, metric.modifier()), v),
                        None => continue,
                    },
                    None => continue,
                },
            };
            let Some(node) = caps.find_feature(&self.placement, usage) else {
                continue;
            };

            let requested = self.requested_metric(metric, field);
            let value = requested.unwrap_or(current);
            match targets.iter_mut().find(|(n, _, _)| n.usage == usage) {
                Some(target) => {
                    if requested.is_some() && !target.2 {
                        *target = (node, value, true);
                    }
                }
                None => targets.push((node, value, requested.is_some())),
            }
        }

        for (node, value, _) in &targets {
            extract::write_field(node, buf, *value as f64)?;
        }
        Ok(if targets.is_empty() {
            KeySync::Skipped
        } else {
            KeySync::Resolved
        })
    }

    fn write_selectors(&self, caps: &CapabilityTable, buf: &mut [u8]) -> Result<()> {
        if self.device.reporting_state().is_supported() {
            if let Some(node) = caps.find_feature(&self.placement, protocol::USAGE_PROP_REPORTING_STATE) {
                extract::write_raw(node, buf, self.reporting_state.index())?;
            }
        }
        if self.device.power_state().is_supported() {
            if let Some(node) = caps.find_feature(&self.placement, protocol::USAGE_PROP_POWER_STATE) {
                extract::write_raw(node, buf, self.power_state.index())?;
            }
        }
        Ok(())
    }

    /// Fetch the feature report, refresh the snapshot and return the
    /// outgoing report with the requested configuration folded in.
    pub fn update_properties(&mut self, transport: &mut dyn FeatureTransport) -> Result<Vec<u8>> {
        if !self.initialized {
            return Err(OrientationError::NotInitialized);
        }
        if !self.caps.feature_reports_supported {
            self.inform_feature_conditions();
            return Err(OrientationError::FeatureUnavailable);
        }

        let declared = self.caps.feature_report_len;
        let mut buf = vec![0u8; declared];
        if let Some(id) = buf.first_mut() {
            *id = self.caps.feature_report_id(&self.placement);
        }
        let n = transport.get_feature_report(&mut buf)?;
        buf.truncate(n);
        self.read_feature_report(&buf)?;

        buf.resize(declared, 0);
        let len = self.write_feature_report(&mut buf)?;
        buf.truncate(len);
        Ok(buf)
    }

    /// [`update_properties`](Self::update_properties) followed by sending
    /// the result back to the device.
    pub fn apply_properties(&mut self, transport: &mut dyn FeatureTransport) -> Result<()> {
        let buf = self.update_properties(transport)?;
        transport.send_feature_report(&buf)?;
        log::debug!("Sent feature report: [{}]", extract::hex_dump(&buf, buf.len()));
        Ok(())
    }
}

/// Text of a descriptor string property: UTF-16 for 16-bit arrays, bytes
/// otherwise. Trailing NULs are dropped.
fn decode_string(raw: &RawField) -> Option<String> {
    let s = match raw {
        RawField::Words(w) => String::from_utf16_lossy(w),
        RawField::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        _ => return None,
    };
    Some(s.trim_end_matches('\0').to_string())
}
