//! Input path: turns an input report into data-field values.

use std::sync::Arc;
use std::time::SystemTime;

use crate::caps::CapabilityNode;
use crate::events::SensorEvent;
use crate::extract::{self, FieldScale, RawField};
use crate::properties::{Axis, Metric};
use crate::protocol::{self, Modifier};
use crate::registry;
use crate::sensor::{Informed, OrientationSensor};
use crate::types::{DescriptorFlags, PropValue, Quaternion, SensorState};
use crate::{OrientationError, Result};

/// What to do with an input value node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputHandler {
    Timestamp,
    SensorState,
    EventType,
    RotationMatrix,
    Quaternion,
    Unsupported,
    Dynamic,
}

impl InputHandler {
    pub fn classify(usage_id: u16, modifier: Modifier) -> Self {
        match (usage_id, modifier) {
            (protocol::USAGE_DATA_TIMESTAMP, _) => InputHandler::Timestamp,
            (protocol::USAGE_SENSOR_STATE, Modifier::None) => InputHandler::SensorState,
            (protocol::USAGE_SENSOR_EVENT, Modifier::None) => InputHandler::EventType,
            (protocol::USAGE_DATA_ROTATION_MATRIX, Modifier::None) => InputHandler::RotationMatrix,
            (protocol::USAGE_DATA_QUATERNION, Modifier::None) => InputHandler::Quaternion,
            (
                protocol::USAGE_SENSOR_STATE
                | protocol::USAGE_SENSOR_EVENT
                | protocol::USAGE_DATA_ROTATION_MATRIX
                | protocol::USAGE_DATA_QUATERNION,
                _,
            ) => InputHandler::Unsupported,
            _ => InputHandler::Dynamic,
        }
    }
}

impl OrientationSensor {
    /// Decode one input report into the data-field map.
    ///
    /// A short buffer is rejected before any field is read and counted as a
    /// failure. Any extraction error aborts the rest of the report; the
    /// next report is decoded independently.
    pub fn process_input_report(&mut self, buf: &[u8]) -> Result<()> {
        if !self.initialized {
            return Err(OrientationError::NotInitialized);
        }

        let declared = self.caps.input_report_len;
        if buf.len() < declared {
            self.failure_count += 1;
            log::error!(
                "Input report is incorrect length, is = {}, should be = {}",
                buf.len(),
                declared
            );
            log::error!(
                "Input report failure count = {}, content = [{}]",
                self.failure_count,
                extract::hex_dump(buf, protocol::REPORT_DUMP_BYTES)
            );
            return Err(OrientationError::MalformedReport {
                actual: buf.len(),
                expected: declared,
            });
        }

        self.data_fields
            .set(registry::TIMESTAMP, PropValue::Timestamp(SystemTime::now()));

        let caps = Arc::clone(&self.caps);
        let placement = self.placement;
        let derive_rotation =
            !caps.has_input_usage(&placement, protocol::USAGE_DATA_ROTATION_MATRIX);
        let mut shape = DescriptorFlags::empty();
        let mut new_state = None;

        for node in caps.input_nodes(&placement) {
            let raw = extract::extract_field(node, buf, declared)?;
            match InputHandler::classify(node.usage_id(), node.modifier()) {
                InputHandler::Timestamp => {}
                InputHandler::SensorState => {
                    shape |= DescriptorFlags::SENSOR_STATE;
                    new_state = first_element(&raw).map(SensorState::from_hid_index);
                }
                InputHandler::EventType => {
                    shape |= DescriptorFlags::EVENT_TYPE;
                    self.event_type = first_element(&raw);
                }
                InputHandler::RotationMatrix => {
                    shape |= DescriptorFlags::ROTATION_MATRIX;
                    let value = self.decode_orientation(Axis::RotationMatrix, node, &raw)?;
                    self.data_fields.set(registry::ROTATION_MATRIX, value);
                }
                InputHandler::Quaternion => {
                    shape |= DescriptorFlags::QUATERNION;
                    let value = self.decode_orientation(Axis::Quaternion, node, &raw)?;
                    if derive_rotation {
                        self.data_fields
                            .set(registry::ROTATION_MATRIX, derive_rotation_matrix(&value));
                    }
                    self.data_fields.set(registry::QUATERNION, value);
                }
                InputHandler::Dynamic => self.decode_dynamic(node, &raw),
                InputHandler::Unsupported => {
                    log::trace!("Ignoring input usage 0x{:04x}", node.usage);
                }
            }
        }

        self.descriptor |= shape;
        if let Some(state) = new_state {
            self.set_state(state);
        }
        self.emit(SensorEvent::DataUpdated(self.data_fields.clone()));

        if !self.informed.contains(Informed::INPUT) {
            self.informed |= Informed::INPUT;
            report_input_conditions(shape);
        }
        Ok(())
    }

    /// Pack a rotation matrix or quaternion array, validated against the
    /// effective range for that field.
    fn decode_orientation(
        &mut self,
        axis: Axis,
        node: &CapabilityNode,
        raw: &RawField,
    ) -> Result<PropValue> {
        if self.device.mark_seen(axis) {
            log::debug!("{:?} present in input report", axis);
        }
        if node.units != protocol::UNITS_NOT_SPECIFIED {
            return Ok(PropValue::Empty);
        }
        if node.bit_size != 16 && node.bit_size != 32 {
            log::error!("Bit size {} not supported for {:?}", node.bit_size, axis);
            return Err(OrientationError::UnsupportedBitSize {
                usage: node.usage,
                bit_size: node.bit_size,
            });
        }

        let needed = axis.element_count();
        let elements = raw.elements();
        if elements.len() < needed {
            return Err(OrientationError::ArrayTooShort {
                usage: node.usage,
                count: node.report_count,
                needed,
            });
        }

        let max = self
            .device
            .resolve(axis, Metric::Maximum, self.config.range_maximum);
        let min = self
            .device
            .resolve(axis, Metric::Minimum, self.config.range_minimum);
        let scale = FieldScale::of(node);
        let values: Vec<f32> = elements[..needed]
            .iter()
            .map(|&e| scale.physical(e) as f32)
            .collect();

        if let Some(bad) = values.iter().find(|v| **v > max || **v < min) {
            log::debug!(
                "{:?} element {} outside [{}, {}], publishing null",
                axis,
                bad,
                min,
                max
            );
            return Ok(PropValue::Null);
        }
        Ok(PropValue::from_floats(&values))
    }

    /// Store a value whose usage has no dedicated handler under a key
    /// derived from the usage, registering it on first sight.
    fn decode_dynamic(&mut self, node: &CapabilityNode, raw: &RawField) {
        let key = registry::dynamic_datafield_key(node.usage);
        if self.registry.data_field_position(&key).is_none() {
            let position = self.registry.add_data_field(key);
            self.device.register_dynamic(position, node.usage, key);
            log::info!(
                "Registered data field for usage 0x{:04x} at position {}",
                node.usage,
                position
            );
        }

        let scale = FieldScale::of(node);
        let value = match raw {
            RawField::Scalar(v) => PropValue::Float(scale.physical(*v) as f32),
            RawField::Bytes(b) => PropValue::Bytes(b.clone()),
            other => {
                let floats: Vec<f32> = other
                    .elements()
                    .iter()
                    .map(|&e| scale.physical(e) as f32)
                    .collect();
                PropValue::from_floats(&floats)
            }
        };
        self.data_fields.set(key, value);
    }
}

fn first_element(raw: &RawField) -> Option<u32> {
    raw.elements().first().copied()
}

/// Rotation matrix published alongside a quaternion from a device that has
/// no rotation-matrix usage. Null and empty quaternions carry over.
fn derive_rotation_matrix(quaternion: &PropValue) -> PropValue {
    match Quaternion::from_value(quaternion) {
        Ok(q) => q.to_rotation_matrix().to_value(),
        Err(_) if quaternion.is_null() => PropValue::Null,
        Err(_) => PropValue::Empty,
    }
}

fn report_input_conditions(shape: DescriptorFlags) {
    if !shape.contains(DescriptorFlags::SENSOR_STATE) {
        log::warn!("Input report descriptor has no sensor state usage");
    }
    if !shape.contains(DescriptorFlags::EVENT_TYPE) {
        log::warn!("Input report descriptor has no event type usage");
    }
    if !shape.intersects(DescriptorFlags::ROTATION_MATRIX | DescriptorFlags::QUATERNION) {
        log::warn!("Input report descriptor has neither rotation matrix nor quaternion");
    }
    log::info!("Input report descriptor provides {:?}", shape);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caps::Placement;
    use crate::testutil;
    use crate::types::RotationMatrix;

    fn assert_floats(value: &PropValue, expected: &[f32]) {
        let got = value.to_floats().unwrap();
        assert_eq!(got.len(), expected.len());
        for (g, e) in got.iter().zip(expected) {
            assert!((g - e).abs() < 1e-4, "{:?} != {:?}", got, expected);
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            InputHandler::classify(0x0483, Modifier::None),
            InputHandler::Quaternion
        );
        assert_eq!(
            InputHandler::classify(0x0483, Modifier::Maximum),
            InputHandler::Unsupported
        );
        assert_eq!(
            InputHandler::classify(0x0529, Modifier::None),
            InputHandler::Timestamp
        );
        assert_eq!(
            InputHandler::classify(0x0484, Modifier::None),
            InputHandler::Dynamic
        );
        assert_eq!(
            InputHandler::classify(0x0484, Modifier::Maximum),
            InputHandler::Dynamic
        );
    }

    fn put_quaternion(buf: &mut [u8], node: &CapabilityNode, q: [f32; 4]) {
        for (i, v) in q.iter().enumerate() {
            let mut element = node.clone();
            element.bit_offset += 16 * i as u32;
            element.report_count = 1;
            extract::write_field(&element, buf, *v as f64).unwrap();
        }
    }

    #[test]
    fn test_shared_collection_decodes_own_nodes() {
        let quaternion = |report_id: u8, link: u16, offset: u32| {
            CapabilityNode::new(report_id, protocol::USAGE_DATA_QUATERNION)
                .with_bits(offset, 16)
                .with_count(4)
                .with_logical(i16::MIN as i32, i16::MAX as i32)
                .with_units(protocol::UNITS_NOT_SPECIFIED, 0xC)
                .with_link_collection(link)
        };
        let caps = std::sync::Arc::new(crate::CapabilityTable {
            input_report_len: 17,
            input_values: vec![quaternion(1, 1, 72), quaternion(2, 2, 8)],
            starting_input_report_id: 1,
            ..Default::default()
        });

        let mut report = vec![0u8; 17];
        report[0] = 2;
        put_quaternion(&mut report, &caps.input_values[0], [1.5, 0.0, 0.0, 0.0]);
        put_quaternion(&mut report, &caps.input_values[1], [0.0, 0.0, 0.0, 1.0]);

        let mut second = crate::OrientationSensor::new(
            caps.clone(),
            Placement::shared(1, 2, 2),
            crate::SensorConfig::default(),
            Box::new(crate::events::NullSink),
        );
        second.initialize(&testutil::identity()).unwrap();
        second.process_input_report(&report).unwrap();
        assert_floats(
            second.data_field(&registry::QUATERNION).unwrap(),
            &[0.0, 0.0, 0.0, 1.0],
        );
        assert!(second.rotation_matrix().is_some());

        let mut first = crate::OrientationSensor::new(
            caps,
            Placement::shared(0, 2, 1),
            crate::SensorConfig::default(),
            Box::new(crate::events::NullSink),
        );
        first.initialize(&testutil::identity()).unwrap();
        first.process_input_report(&report).unwrap();
        assert!(first.data_field(&registry::QUATERNION).unwrap().is_null());
    }

    #[test]
    fn test_modified_vendor_usage_is_kept_apart() {
        let mut caps = testutil::full_caps();
        let modified = protocol::compose_usage(testutil::VENDOR_USAGE, Modifier::Maximum);
        caps.input_values
            .push(CapabilityNode::new(0, modified).with_bits(248, 8));
        let mut sensor = testutil::sensor(caps, Placement::single());
        let mut report = testutil::full_report(
            [0.0, 0.0, 0.0, 1.0],
            RotationMatrix::IDENTITY.flatten(),
            1,
        );
        report[31] = 7;
        sensor.process_input_report(&report).unwrap();

        let key = registry::dynamic_datafield_key(modified);
        assert_ne!(key, registry::dynamic_datafield_key(testutil::VENDOR_USAGE));
        assert_eq!(sensor.registry().data_field_position(&key), Some(4));
        let value = sensor.data_field(&key).unwrap().as_float().unwrap();
        assert!((value - 7.0).abs() < 1e-6);
        // Feature metrics still attach to the bare vendor field.
        let (pos, _) = sensor
            .device_properties()
            .dynamic_by_usage(testutil::VENDOR_USAGE)
            .unwrap();
        assert_eq!(pos, 3);
    }

    #[test]
    fn test_short_report_rejected_and_counted() {
        let (mut sensor, rx) =
            testutil::sensor_with_events(testutil::quaternion_only_caps(), Placement::single());
        let before = sensor.data_fields().clone();

        let err = sensor.process_input_report(&[0u8; 10]).unwrap_err();
        assert!(matches!(
            err,
            OrientationError::MalformedReport {
                actual: 10,
                expected: 32
            }
        ));
        assert_eq!(err.code(), crate::ResultCode::MalformedReport);
        assert_eq!(sensor.failure_count(), 1);
        assert_eq!(sensor.data_fields(), &before);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_quaternion_only_device_derives_rotation() {
        let mut sensor = testutil::sensor(testutil::quaternion_only_caps(), Placement::single());
        let report = testutil::quaternion_only_report([1.0, 0.0, 0.0, 0.0]);
        sensor.process_input_report(&report).unwrap();

        assert_floats(
            sensor.data_field(&registry::QUATERNION).unwrap(),
            &[1.0, 0.0, 0.0, 0.0],
        );
        let m = sensor.rotation_matrix().unwrap();
        let expected = RotationMatrix([[1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, -1.0]]);
        for (a, b) in m.flatten().iter().zip(expected.flatten().iter()) {
            assert!((a - b).abs() < 1e-4);
        }
        assert!(sensor.device_properties().is_seen(Axis::Quaternion));
        assert!(!sensor.device_properties().is_seen(Axis::RotationMatrix));
    }

    #[test]
    fn test_native_rotation_matrix_is_not_overwritten() {
        let mut sensor = testutil::sensor(testutil::full_caps(), Placement::single());
        let rotation = [0.0, 1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        let report = testutil::full_report([0.0, 0.0, 0.0, 1.0], rotation, 1);
        sensor.process_input_report(&report).unwrap();

        assert_floats(sensor.data_field(&registry::ROTATION_MATRIX).unwrap(), &rotation);
        assert_floats(
            sensor.data_field(&registry::QUATERNION).unwrap(),
            &[0.0, 0.0, 0.0, 1.0],
        );
    }

    #[test]
    fn test_boundary_values_are_in_range() {
        let mut sensor = testutil::sensor(testutil::quaternion_only_caps(), Placement::single());
        let report = testutil::quaternion_only_report([1.0, -1.0, 0.5, -0.5]);
        sensor.process_input_report(&report).unwrap();
        assert_floats(
            sensor.data_field(&registry::QUATERNION).unwrap(),
            &[1.0, -1.0, 0.5, -0.5],
        );
    }

    #[test]
    fn test_out_of_range_element_nulls_whole_field() {
        let mut sensor = testutil::sensor(testutil::quaternion_only_caps(), Placement::single());
        let report = testutil::quaternion_only_report([1.01, 0.0, 0.0, 0.0]);
        sensor.process_input_report(&report).unwrap();
        assert!(sensor.data_field(&registry::QUATERNION).unwrap().is_null());
        assert!(sensor.data_field(&registry::ROTATION_MATRIX).unwrap().is_null());
        assert!(sensor.quaternion().is_none());
    }

    #[test]
    fn test_range_follows_device_maximum() {
        let mut sensor = testutil::sensor(testutil::quaternion_only_caps(), Placement::single());
        sensor.device.set_aggregate(Metric::Maximum, 2.0);
        let report = testutil::quaternion_only_report([1.5, 0.0, 0.0, 0.0]);
        sensor.process_input_report(&report).unwrap();
        assert!(!sensor.data_field(&registry::QUATERNION).unwrap().is_null());

        sensor.device.set_field(Axis::Quaternion, Metric::Maximum, 1.2);
        sensor.process_input_report(&report).unwrap();
        assert!(sensor.data_field(&registry::QUATERNION).unwrap().is_null());
    }

    #[test]
    fn test_specified_units_publish_empty() {
        let mut caps = testutil::quaternion_only_caps();
        caps.input_values[0].units = protocol::UNITS_DEGREES;
        let mut sensor = testutil::sensor(caps, Placement::single());
        let report = testutil::quaternion_only_report([0.0, 0.0, 0.0, 1.0]);
        sensor.process_input_report(&report).unwrap();
        assert!(sensor.data_field(&registry::QUATERNION).unwrap().is_empty());
        assert!(sensor.data_field(&registry::ROTATION_MATRIX).unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_bit_size_aborts_report() {
        let mut caps = testutil::quaternion_only_caps();
        caps.input_values[0].bit_size = 8;
        let mut sensor = testutil::sensor(caps, Placement::single());
        let err = sensor
            .process_input_report(&[0u8; testutil::INPUT_REPORT_LEN])
            .unwrap_err();
        assert!(matches!(err, OrientationError::UnsupportedBitSize { .. }));
        assert_eq!(sensor.failure_count(), 0);
    }

    #[test]
    fn test_zero_report_count_is_descriptor_error() {
        let mut caps = testutil::quaternion_only_caps();
        caps.input_values[0].report_count = 0;
        let mut sensor = testutil::sensor(caps, Placement::single());
        let err = sensor
            .process_input_report(&[0u8; testutil::INPUT_REPORT_LEN])
            .unwrap_err();
        assert!(err.is_descriptor_error());

        // The instance keeps working once the table is sane again.
        let mut ok = testutil::sensor(testutil::quaternion_only_caps(), Placement::single());
        ok.process_input_report(&testutil::quaternion_only_report([0.0, 0.0, 0.0, 1.0]))
            .unwrap();
    }

    #[test]
    fn test_one_event_per_report_and_state_change() {
        let (mut sensor, rx) =
            testutil::sensor_with_events(testutil::full_caps(), Placement::single());
        let report = testutil::full_report(
            [0.0, 0.0, 0.0, 1.0],
            RotationMatrix::IDENTITY.flatten(),
            1,
        );
        sensor.process_input_report(&report).unwrap();
        assert_eq!(sensor.state(), SensorState::Ready);
        assert_eq!(
            rx.try_recv().unwrap(),
            SensorEvent::StateChanged(SensorState::Ready)
        );
        assert!(matches!(rx.try_recv().unwrap(), SensorEvent::DataUpdated(_)));
        assert!(rx.try_recv().is_err());

        sensor.process_input_report(&report).unwrap();
        assert!(matches!(rx.try_recv().unwrap(), SensorEvent::DataUpdated(_)));
        assert!(rx.try_recv().is_err());
        assert!(sensor
            .descriptor_flags()
            .contains(DescriptorFlags::SENSOR_STATE | DescriptorFlags::QUATERNION));
    }

    #[test]
    fn test_dynamic_field_registered_once() {
        let mut sensor = testutil::sensor(testutil::full_caps(), Placement::single());
        let report = testutil::full_report(
            [0.0, 0.0, 0.0, 1.0],
            RotationMatrix::IDENTITY.flatten(),
            1,
        );
        sensor.process_input_report(&report).unwrap();
        sensor.process_input_report(&report).unwrap();

        let key = registry::dynamic_datafield_key(testutil::VENDOR_USAGE);
        let fields = sensor.registry().supported_data_fields();
        assert_eq!(fields.iter().filter(|k| **k == key).count(), 1);
        assert_eq!(sensor.registry().data_field_position(&key), Some(3));
        let value = sensor.data_field(&key).unwrap().as_float().unwrap();
        assert!((value - testutil::VENDOR_VALUE).abs() < 1e-4);
        assert!(sensor.device_properties().dynamic_at(3).is_some());
    }

    #[test]
    fn test_uninitialized_sensor_rejects_reports() {
        let mut sensor = crate::OrientationSensor::new(
            std::sync::Arc::new(testutil::quaternion_only_caps()),
            Placement::single(),
            crate::SensorConfig::default(),
            Box::new(crate::events::NullSink),
        );
        let err = sensor
            .process_input_report(&testutil::quaternion_only_report([0.0, 0.0, 0.0, 1.0]))
            .unwrap_err();
        assert!(matches!(err, OrientationError::NotInitialized));
    }
}
