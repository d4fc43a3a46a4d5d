//! Fixtures shared by the unit tests: two device shapes with matching
//! report builders, plus an in-memory feature transport.

use std::sync::Arc;

use crossbeam_channel::Receiver;

use crate::caps::{CapabilityNode, CapabilityTable, Placement};
use crate::events::{ChannelSink, NullSink, SensorEvent};
use crate::extract;
use crate::hid::FeatureTransport;
use crate::protocol;
use crate::sensor::{OrientationSensor, SensorConfig};
use crate::types::{Guid, SensorIdentity};
use crate::Result;

pub const INPUT_REPORT_LEN: usize = 32;
pub const FEATURE_REPORT_LEN: usize = 28;
pub const QUATERNION_ONLY_FEATURE_LEN: usize = 6;

pub const VENDOR_USAGE: u16 = 0x04F1;
pub const VENDOR_VALUE: f32 = 12.5;
pub const FEATURE_INTERVAL: u32 = 200;
pub const FEATURE_MIN_INTERVAL: u32 = 20;

/// Exponent code for 10^-4, used by the orientation arrays.
const EXP_MINUS_4: u8 = 0xC;
/// Exponent code for 10^-2, used by sensitivities and ranges.
const EXP_MINUS_2: u8 = 0xE;

pub fn identity() -> SensorIdentity {
    SensorIdentity {
        device_name: "Test Orientation Device".into(),
        manufacturer: "Acme".into(),
        product: "Orienter".into(),
        serial_number: "0001".into(),
        persistent_id: Guid::from_u128(0x01234567_89AB_CDEF_0123_456789ABCDEF),
    }
}

pub fn sensor(caps: CapabilityTable, placement: Placement) -> OrientationSensor {
    let mut sensor = OrientationSensor::new(
        Arc::new(caps),
        placement,
        SensorConfig::default(),
        Box::new(NullSink),
    );
    sensor.initialize(&identity()).unwrap();
    sensor
}

pub fn sensor_with_events(
    caps: CapabilityTable,
    placement: Placement,
) -> (OrientationSensor, Receiver<SensorEvent>) {
    let (sink, rx) = ChannelSink::new(16);
    let mut sensor =
        OrientationSensor::new(Arc::new(caps), placement, SensorConfig::default(), Box::new(sink));
    sensor.initialize(&identity()).unwrap();
    (sensor, rx)
}

fn array_node(usage: u16, bit_offset: u32, count: u16) -> CapabilityNode {
    CapabilityNode::new(0, usage)
        .with_bits(bit_offset, 16)
        .with_count(count)
        .with_logical(i16::MIN as i32, i16::MAX as i32)
        .with_units(protocol::UNITS_NOT_SPECIFIED, EXP_MINUS_4)
}

fn scaled_node(usage: u16, bit_offset: u32) -> CapabilityNode {
    CapabilityNode::new(0, usage)
        .with_bits(bit_offset, 16)
        .with_logical(i16::MIN as i32, i16::MAX as i32)
        .with_units(protocol::UNITS_NOT_SPECIFIED, EXP_MINUS_2)
}

/// Quaternion at bytes 1..9, nothing else.
pub fn quaternion_only_caps() -> CapabilityTable {
    CapabilityTable {
        input_report_len: INPUT_REPORT_LEN,
        feature_report_len: QUATERNION_ONLY_FEATURE_LEN,
        input_values: vec![array_node(protocol::USAGE_DATA_QUATERNION, 8, 4)],
        feature_values: vec![
            // Orientation-wide sensitivity, then the global range maximum.
            scaled_node(0x1470, 8),
            scaled_node(protocol::USAGE_PROP_RANGE_MAXIMUM, 24),
        ],
        feature_reports_supported: true,
        starting_input_report_id: 0,
        starting_feature_report_id: 0,
    }
}

/// State, event type, quaternion, rotation matrix and a vendor scalar.
pub fn full_caps() -> CapabilityTable {
    CapabilityTable {
        input_report_len: INPUT_REPORT_LEN,
        feature_report_len: FEATURE_REPORT_LEN,
        input_values: vec![
            CapabilityNode::new(0, protocol::USAGE_SENSOR_STATE).with_logical(0, 6),
            CapabilityNode::new(0, protocol::USAGE_SENSOR_EVENT).with_bits(16, 8),
            array_node(protocol::USAGE_DATA_QUATERNION, 24, 4),
            array_node(protocol::USAGE_DATA_ROTATION_MATRIX, 88, 9),
            CapabilityNode::new(0, VENDOR_USAGE)
                .with_bits(232, 16)
                .with_logical(0, 0xFFFF)
                .with_units(protocol::UNITS_NOT_SPECIFIED, EXP_MINUS_2),
        ],
        feature_values: vec![
            CapabilityNode::new(0, protocol::USAGE_PROP_REPORTING_STATE).with_logical(0, 5),
            CapabilityNode::new(0, protocol::USAGE_PROP_POWER_STATE)
                .with_bits(16, 8)
                .with_logical(0, 5),
            CapabilityNode::new(0, protocol::USAGE_PROP_CONNECTION_TYPE).with_bits(24, 8),
            CapabilityNode::new(0, protocol::USAGE_PROP_REPORT_INTERVAL)
                .with_bits(32, 32)
                .with_logical(0, i32::MAX),
            CapabilityNode::new(0, protocol::USAGE_PROP_MINIMUM_REPORT_INTERVAL)
                .with_bits(64, 16)
                .with_logical(0, 0xFFFF),
            scaled_node(0x1470, 80),
            scaled_node(0x1483, 96),
            scaled_node(protocol::USAGE_PROP_RANGE_MAXIMUM, 112),
            scaled_node(protocol::USAGE_PROP_RANGE_MINIMUM, 128),
            scaled_node(0x1000 | VENDOR_USAGE, 144),
            CapabilityNode::new(0, protocol::USAGE_PROP_MANUFACTURER)
                .with_bits(160, 16)
                .with_count(4)
                .with_logical(0, 0xFFFF),
        ],
        feature_reports_supported: true,
        starting_input_report_id: 0,
        starting_feature_report_id: 0,
    }
}

fn put(buf: &mut [u8], node: &CapabilityNode, index: usize, value: f64) {
    let mut element = node.clone();
    element.bit_offset += index as u32 * node.bit_size as u32;
    element.report_count = 1;
    extract::write_field(&element, buf, value).unwrap();
}

fn put_all(buf: &mut [u8], node: &CapabilityNode, values: &[f32]) {
    for (i, v) in values.iter().enumerate() {
        put(buf, node, i, *v as f64);
    }
}

pub fn quaternion_only_report(q: [f32; 4]) -> Vec<u8> {
    let caps = quaternion_only_caps();
    let mut buf = vec![0u8; INPUT_REPORT_LEN];
    put_all(&mut buf, &caps.input_values[0], &q);
    buf
}

pub fn full_report(q: [f32; 4], rotation: [f32; 9], state_index: u32) -> Vec<u8> {
    let caps = full_caps();
    let mut buf = vec![0u8; INPUT_REPORT_LEN];
    let nodes = &caps.input_values;
    put(&mut buf, &nodes[0], 0, state_index as f64);
    put(&mut buf, &nodes[1], 0, 1.0);
    put_all(&mut buf, &nodes[2], &q);
    put_all(&mut buf, &nodes[3], &rotation);
    put(&mut buf, &nodes[4], 0, VENDOR_VALUE as f64);
    buf
}

/// Reporting and power state 1, interval 200 ms, min interval 20 ms,
/// aggregate sensitivity 0.03, quaternion sensitivity 0.04, global range
/// [-1, 1], vendor sensitivity 0.5, manufacturer "Acme".
pub fn full_feature_report() -> Vec<u8> {
    let caps = full_caps();
    let mut buf = vec![0u8; FEATURE_REPORT_LEN];
    let values = [1.0, 1.0, 0.0, FEATURE_INTERVAL as f64, FEATURE_MIN_INTERVAL as f64];
    for (node, v) in caps.feature_values.iter().zip(values) {
        put(&mut buf, node, 0, v);
    }
    let scaled = [0.03, 0.04, 1.0, -1.0, 0.5];
    for (node, v) in caps.feature_values[5..10].iter().zip(scaled) {
        put(&mut buf, node, 0, v);
    }
    for (i, c) in "Acme".encode_utf16().enumerate() {
        put(&mut buf, &caps.feature_values[10], i, c as f64);
    }
    buf
}

pub fn quaternion_only_feature_report_with_sensitivity(raw_sensitivity: u32) -> Vec<u8> {
    let caps = quaternion_only_caps();
    let mut buf = vec![0u8; QUATERNION_ONLY_FEATURE_LEN];
    extract::write_raw(&caps.feature_values[0], &mut buf, raw_sensitivity).unwrap();
    put(&mut buf, &caps.feature_values[1], 0, 1.0);
    buf
}

/// Aggregate sensitivity 0.02, global maximum 1.0.
pub fn quaternion_only_feature_report() -> Vec<u8> {
    quaternion_only_feature_report_with_sensitivity(2)
}

/// Feature transport answering every read with a fixed report.
pub struct MockTransport {
    pub report: Vec<u8>,
    pub get_calls: usize,
    pub sent: Vec<Vec<u8>>,
}

impl MockTransport {
    pub fn new(report: Vec<u8>) -> Self {
        MockTransport {
            report,
            get_calls: 0,
            sent: Vec::new(),
        }
    }
}

impl FeatureTransport for MockTransport {
    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.get_calls += 1;
        let n = self.report.len().min(buf.len());
        buf[..n].copy_from_slice(&self.report[..n]);
        Ok(n)
    }

    fn send_feature_report(&mut self, buf: &[u8]) -> Result<()> {
        self.sent.push(buf.to_vec());
        Ok(())
    }
}
