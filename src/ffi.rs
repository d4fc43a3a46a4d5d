//! C FFI layer for hid-orientation.
//!
//! Provides an opaque handle-based API for C/C++ consumers.
//! The generated C header is written to `include/hid_orientation.h` by cbindgen.

use crate::caps::{CapabilityNode, CapabilityTable, Placement};
use crate::error::{LastError, ResultCode};
use crate::events::NullSink;
use crate::registry;
use crate::sensor::{OrientationSensor, SensorConfig};
use crate::types::{Guid, PropValue, SensorIdentity};
use crate::{OrientationError, Result};
use std::ffi::{c_char, CStr};
use std::sync::{Arc, Mutex};

/// Last error message for C consumers.
static LAST_ERROR: LastError = LastError::new();

/// Opaque sensor handle for C consumers. Calls on one handle are serialized.
pub struct HoSensor(Mutex<OrientationSensor>);

/// One value capability in C-compatible layout.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HoCapabilityNode {
    pub report_id: u8,
    pub usage_page: u16,
    /// Usage with the modifier in the top nibble.
    pub usage: u16,
    pub bit_offset: u32,
    pub bit_size: u16,
    pub report_count: u16,
    pub logical_min: i32,
    pub logical_max: i32,
    pub units: u32,
    pub unit_exponent: u8,
    pub link_collection: u16,
}

impl From<&HoCapabilityNode> for CapabilityNode {
    fn from(n: &HoCapabilityNode) -> Self {
        CapabilityNode {
            report_id: n.report_id,
            usage_page: n.usage_page,
            usage: n.usage,
            bit_offset: n.bit_offset,
            bit_size: n.bit_size,
            report_count: n.report_count,
            logical_min: n.logical_min,
            logical_max: n.logical_max,
            units: n.units,
            unit_exponent: n.unit_exponent,
            link_collection: n.link_collection,
        }
    }
}

/// Capability table in C-compatible layout. The node arrays are copied
/// by `ho_sensor_create` and need not outlive the call.
#[repr(C)]
pub struct HoCapabilityTable {
    pub input_report_len: usize,
    pub feature_report_len: usize,
    pub input_values: *const HoCapabilityNode,
    pub input_count: usize,
    pub feature_values: *const HoCapabilityNode,
    pub feature_count: usize,
    pub feature_reports_supported: bool,
    pub starting_input_report_id: u8,
    pub starting_feature_report_id: u8,
}

/// Identity strings, each null-terminated UTF-8 or NULL for empty.
#[repr(C)]
pub struct HoIdentity {
    pub device_name: *const c_char,
    pub manufacturer: *const c_char,
    pub product: *const c_char,
    pub serial_number: *const c_char,
    pub persistent_id: Guid,
}

unsafe fn nodes_from_raw(ptr: *const HoCapabilityNode, count: usize) -> Result<Vec<CapabilityNode>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    if ptr.is_null() {
        return Err(OrientationError::NullArgument);
    }
    Ok(std::slice::from_raw_parts(ptr, count)
        .iter()
        .map(CapabilityNode::from)
        .collect())
}

unsafe fn table_from_raw(table: &HoCapabilityTable) -> Result<CapabilityTable> {
    Ok(CapabilityTable {
        input_report_len: table.input_report_len,
        feature_report_len: table.feature_report_len,
        input_values: nodes_from_raw(table.input_values, table.input_count)?,
        feature_values: nodes_from_raw(table.feature_values, table.feature_count)?,
        feature_reports_supported: table.feature_reports_supported,
        starting_input_report_id: table.starting_input_report_id,
        starting_feature_report_id: table.starting_feature_report_id,
    })
}

unsafe fn c_str_to_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

/// Record the outcome for `ho_last_error` and collapse it to a result code.
fn finish(result: Result<()>) -> ResultCode {
    match result {
        Ok(()) => {
            LAST_ERROR.clear();
            ResultCode::Ok
        }
        Err(e) => {
            LAST_ERROR.set(&e);
            e.code()
        }
    }
}

/// Lock the sensor behind `handle` and run `f` on it.
unsafe fn with_sensor<T>(
    handle: *const HoSensor,
    f: impl FnOnce(&mut OrientationSensor) -> Result<T>,
) -> Result<T> {
    if handle.is_null() {
        return Err(OrientationError::NullArgument);
    }
    let handle = &*handle;
    let mut sensor = handle.0.lock().unwrap_or_else(|p| p.into_inner());
    f(&mut sensor)
}

/// Create a sensor over a capability table.
///
/// `sensor_count` is the number of logical sensors sharing the top-level
/// collection (1 for a dedicated device); `sensor_index` and
/// `link_collection` locate this one inside it.
/// Returns NULL on error (check ho_last_error()).
///
/// # Safety
/// `table` must point to a valid `HoCapabilityTable` whose node pointers
/// reference at least `input_count` / `feature_count` elements, or be null.
#[no_mangle]
pub unsafe extern "C" fn ho_sensor_create(
    table: *const HoCapabilityTable,
    sensor_index: u8,
    sensor_count: usize,
    link_collection: u16,
) -> *mut HoSensor {
    if table.is_null() {
        LAST_ERROR.set(&OrientationError::NullArgument);
        return std::ptr::null_mut();
    }
    let caps = match table_from_raw(&*table) {
        Ok(caps) => caps,
        Err(e) => {
            LAST_ERROR.set(&e);
            return std::ptr::null_mut();
        }
    };
    let placement = if sensor_count > 1 {
        Placement::shared(sensor_index, sensor_count, link_collection)
    } else {
        Placement::single()
    };

    let sensor = OrientationSensor::new(
        Arc::new(caps),
        placement,
        SensorConfig::default(),
        Box::new(NullSink),
    );
    Box::into_raw(Box::new(HoSensor(Mutex::new(sensor))))
}

/// Seed the property and data-field maps. Fails with
/// `RESULT_CODE_ALREADY_INITIALIZED` on a second call.
///
/// # Safety
/// `sensor` must be a handle from `ho_sensor_create`, or null. `identity`
/// must point to a valid `HoIdentity`, or be null.
#[no_mangle]
pub unsafe extern "C" fn ho_sensor_initialize(
    sensor: *mut HoSensor,
    identity: *const HoIdentity,
) -> ResultCode {
    if identity.is_null() {
        return finish(Err(OrientationError::NullArgument));
    }
    let raw = &*identity;
    let identity = SensorIdentity {
        device_name: c_str_to_string(raw.device_name),
        manufacturer: c_str_to_string(raw.manufacturer),
        product: c_str_to_string(raw.product),
        serial_number: c_str_to_string(raw.serial_number),
        persistent_id: raw.persistent_id,
    };
    finish(with_sensor(sensor, |s| s.initialize(&identity)))
}

/// Decode one input report.
///
/// # Safety
/// `sensor` must be a valid handle, or null. `buf` must point to `len`
/// readable bytes, or be null.
#[no_mangle]
pub unsafe extern "C" fn ho_sensor_process_input(
    sensor: *mut HoSensor,
    buf: *const u8,
    len: usize,
) -> ResultCode {
    if buf.is_null() {
        return finish(Err(OrientationError::NullArgument));
    }
    let report = std::slice::from_raw_parts(buf, len);
    finish(with_sensor(sensor, |s| s.process_input_report(report)))
}

/// Parse a feature report into the device snapshot.
///
/// # Safety
/// `sensor` must be a valid handle, or null. `buf` must point to `len`
/// readable bytes, or be null.
#[no_mangle]
pub unsafe extern "C" fn ho_sensor_read_feature(
    sensor: *mut HoSensor,
    buf: *const u8,
    len: usize,
) -> ResultCode {
    if buf.is_null() {
        return finish(Err(OrientationError::NullArgument));
    }
    let report = std::slice::from_raw_parts(buf, len);
    finish(with_sensor(sensor, |s| s.read_feature_report(report)))
}

/// Fold the requested configuration into a feature report in place.
/// `*len` holds the buffer capacity on entry and the number of bytes to
/// transmit on success.
///
/// # Safety
/// `sensor` must be a valid handle, or null. `len` must be a valid pointer,
/// or null. `buf` must point to `*len` writable bytes, or be null.
#[no_mangle]
pub unsafe extern "C" fn ho_sensor_write_feature(
    sensor: *mut HoSensor,
    buf: *mut u8,
    len: *mut usize,
) -> ResultCode {
    if buf.is_null() || len.is_null() {
        return finish(Err(OrientationError::NullArgument));
    }
    let report = std::slice::from_raw_parts_mut(buf, *len);
    let result = with_sensor(sensor, |s| s.write_feature_report(report));
    finish(result.map(|written| *len = written))
}

/// Request a report interval in milliseconds; takes effect on the next
/// `ho_sensor_write_feature`.
///
/// # Safety
/// `sensor` must be a valid handle, or null.
#[no_mangle]
pub unsafe extern "C" fn ho_sensor_set_report_interval(
    sensor: *mut HoSensor,
    interval_ms: u32,
) -> ResultCode {
    finish(with_sensor(sensor, |s| {
        s.set_property(
            registry::CURRENT_REPORT_INTERVAL,
            PropValue::UnsignedInt(interval_ms),
        )
    }))
}

/// Copy the latest quaternion [x, y, z, w] into `out`.
/// Returns false if no valid sample is available.
///
/// # Safety
/// `sensor` must be a valid handle, or null. `out` must point to 4
/// writable floats, or be null.
#[no_mangle]
pub unsafe extern "C" fn ho_sensor_quaternion(sensor: *mut HoSensor, out: *mut f32) -> bool {
    if out.is_null() {
        return false;
    }
    match with_sensor(sensor, |s| Ok(s.quaternion())) {
        Ok(Some(q)) => {
            std::ptr::copy_nonoverlapping(q.to_array().as_ptr(), out, 4);
            true
        }
        _ => false,
    }
}

/// Copy the latest rotation matrix, flat row-major, into `out`.
/// Returns false if no valid sample is available.
///
/// # Safety
/// `sensor` must be a valid handle, or null. `out` must point to 9
/// writable floats, or be null.
#[no_mangle]
pub unsafe extern "C" fn ho_sensor_rotation_matrix(sensor: *mut HoSensor, out: *mut f32) -> bool {
    if out.is_null() {
        return false;
    }
    match with_sensor(sensor, |s| Ok(s.rotation_matrix())) {
        Ok(Some(m)) => {
            std::ptr::copy_nonoverlapping(m.flatten().as_ptr(), out, 9);
            true
        }
        _ => false,
    }
}

/// Number of rejected input reports so far.
///
/// # Safety
/// `sensor` must be a valid handle, or null.
#[no_mangle]
pub unsafe extern "C" fn ho_sensor_failure_count(sensor: *mut HoSensor) -> u32 {
    with_sensor(sensor, |s| Ok(s.failure_count())).unwrap_or(0)
}

/// Free a sensor handle.
///
/// # Safety
/// `sensor` must be a pointer returned by `ho_sensor_create`, or null.
#[no_mangle]
pub unsafe extern "C" fn ho_sensor_free(sensor: *mut HoSensor) {
    if !sensor.is_null() {
        drop(Box::from_raw(sensor));
    }
}

/// Get the last error message. Returns NULL if the last call succeeded.
/// The returned pointer is valid until the next hid-orientation API call.
#[no_mangle]
pub extern "C" fn ho_last_error() -> *const c_char {
    LAST_ERROR.as_ptr()
}
