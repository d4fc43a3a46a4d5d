//! # hid-orientation - report codec for HID Sensor orientation devices
//!
//! Turns raw HID input reports from an aggregated device-orientation sensor
//! into rotation matrix and quaternion samples, and keeps the device's
//! feature report in sync with the host's requested configuration.
//! Provides:
//! - Bit-level value extraction driven by a parsed capability table
//! - Orientation decoding with range validation and quaternion-derived rotation
//! - Feature report read/write with field → aggregate → global fallback
//! - C FFI for integration with C/C++ sensor stacks
//!
//! ## Quick Start
//! ```no_run
//! use hid_orientation::{
//!     CapabilityTable, HidTransport, OrientationSensor, Placement,
//!     SensorConfig, events::ChannelSink,
//! };
//! use std::sync::Arc;
//!
//! # fn caps_from_descriptor() -> CapabilityTable { unimplemented!() }
//! let api = hidapi::HidApi::new().unwrap();
//! let mut transport = HidTransport::new(api.open(0x1234, 0x5678).unwrap());
//! let identity = transport.identity("Orientation", Default::default()).unwrap();
//!
//! let (sink, events) = ChannelSink::new(64);
//! let caps = Arc::new(caps_from_descriptor());
//! let mut sensor =
//!     OrientationSensor::new(caps.clone(), Placement::single(), SensorConfig::default(), Box::new(sink));
//! sensor.initialize(&identity).unwrap();
//! sensor.apply_properties(&mut transport).unwrap();
//!
//! let report_id = caps.input_report_id(&Placement::single());
//! let mut buf = vec![0u8; caps.input_report_len];
//! for _ in 0..100 {
//!     if transport.read_input_report(report_id, &mut buf, 1000).unwrap() > 0 {
//!         sensor.process_input_report(&buf).unwrap();
//!         println!("quaternion: {:?}", sensor.quaternion());
//!     }
//! }
//! # drop(events);
//! ```

pub mod error;
pub mod types;
pub mod protocol;
pub mod caps;
pub mod extract;
pub mod registry;
pub mod properties;
pub mod events;
pub mod sensor;
pub mod decoder;
pub mod sync;
pub mod hid;
pub mod ffi;

#[cfg(test)]
pub(crate) mod testutil;

pub use caps::{CapabilityNode, CapabilityTable, Placement};
pub use error::{OrientationError, ResultCode};
pub use hid::{FeatureTransport, HidTransport};
pub use sensor::{OrientationSensor, SensorConfig};
pub use sync::KeySync;
pub use types::*;

/// Result type alias for hid-orientation operations.
pub type Result<T> = std::result::Result<T, OrientationError>;
