//! Decode a synthetic quaternion-only input report and print the derived
//! rotation matrix.

use hid_orientation::{
    extract, protocol, CapabilityNode, CapabilityTable, Guid, OrientationSensor, Placement,
    SensorConfig, SensorIdentity,
};
use hid_orientation::events::ChannelSink;
use std::sync::Arc;

const REPORT_LEN: usize = 9;

fn main() {
    env_logger::init();

    // Four signed 16-bit elements at 10^-4 right after the report id.
    let quaternion = CapabilityNode::new(0, protocol::USAGE_DATA_QUATERNION)
        .with_bits(8, 16)
        .with_count(4)
        .with_logical(i16::MIN as i32, i16::MAX as i32)
        .with_units(protocol::UNITS_NOT_SPECIFIED, 0xC);
    let caps = CapabilityTable {
        input_report_len: REPORT_LEN,
        input_values: vec![quaternion.clone()],
        ..Default::default()
    };

    let (sink, events) = ChannelSink::new(8);
    let mut sensor = OrientationSensor::new(
        Arc::new(caps),
        Placement::single(),
        SensorConfig::default(),
        Box::new(sink),
    );
    let identity = SensorIdentity {
        device_name: "Synthetic".into(),
        persistent_id: Guid::NIL,
        ..Default::default()
    };
    if let Err(e) = sensor.initialize(&identity) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // 90 degrees about Z.
    let half = std::f32::consts::FRAC_1_SQRT_2;
    let mut report = vec![0u8; REPORT_LEN];
    for (i, v) in [0.0, 0.0, half, half].iter().enumerate() {
        let mut element = quaternion.clone();
        element.bit_offset += 16 * i as u32;
        element.report_count = 1;
        if let Err(e) = extract::write_field(&element, &mut report, *v as f64) {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
    println!("Report:     [{}]", extract::hex_dump(&report, report.len()));

    if let Err(e) = sensor.process_input_report(&report) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    println!("Quaternion: {:?}", sensor.quaternion());
    if let Some(m) = sensor.rotation_matrix() {
        for row in m.0 {
            println!("  [{:>8.4} {:>8.4} {:>8.4}]", row[0], row[1], row[2]);
        }
    }
    println!("Events:     {}", events.try_iter().count());
}
