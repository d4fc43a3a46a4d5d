use std::fmt;

use crate::types::PropertyKey;

/// Errors raised by the report codec and the property synchronizer.
#[derive(Debug, thiserror::Error)]
pub enum OrientationError {
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),

    #[error("Transport failed: {0}")]
    Transport(String),

    #[error("Malformed report: {actual} bytes, expected {expected}")]
    MalformedReport { actual: usize, expected: usize },

    /// A value node declared with a report count of zero. This is a
    /// descriptor defect, not a decode failure.
    #[error("Descriptor error: usage 0x{usage:04x} in report {report_id} has a report count of 0")]
    ZeroReportCount { report_id: u8, usage: u16 },

    #[error("Descriptor error: usage 0x{usage:04x} spans bits past the end of the report")]
    FieldOutOfBounds { usage: u16 },

    #[error("Unsupported bit size {bit_size} for usage 0x{usage:04x}")]
    UnsupportedBitSize { usage: u16, bit_size: u16 },

    #[error("Usage 0x{usage:04x} carries {count} elements, {needed} required")]
    ArrayTooShort { usage: u16, count: u16, needed: usize },

    #[error("No synchronization handler for property {0}")]
    UnhandledProperty(PropertyKey),

    #[error("Property {0} is not settable")]
    ReadOnlyProperty(PropertyKey),

    #[error("Device does not support feature reports")]
    FeatureUnavailable,

    #[error("Sensor already initialized")]
    AlreadyInitialized,

    #[error("Sensor not initialized")]
    NotInitialized,

    #[error("Required argument was null")]
    NullArgument,

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

/// Abstract result codes reported across the C ABI.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Ok = 0,
    MalformedReport = -1,
    UnhandledProperty = -2,
    FeatureUnavailable = -3,
    AlreadyInitialized = -4,
    NullArgument = -5,
    Internal = -100,
}

impl OrientationError {
    /// Collapse the error into the result code a framework consumer sees.
    ///
    /// Descriptor defects share the `MalformedReport` code with short
    /// buffers; they stay distinct as Rust variants.
    pub fn code(&self) -> ResultCode {
        match self {
            OrientationError::MalformedReport { .. }
            | OrientationError::ZeroReportCount { .. }
            | OrientationError::FieldOutOfBounds { .. }
            | OrientationError::UnsupportedBitSize { .. }
            | OrientationError::ArrayTooShort { .. } => ResultCode::MalformedReport,
            OrientationError::UnhandledProperty(_) => ResultCode::UnhandledProperty,
            OrientationError::FeatureUnavailable => ResultCode::FeatureUnavailable,
            OrientationError::AlreadyInitialized => ResultCode::AlreadyInitialized,
            OrientationError::NullArgument => ResultCode::NullArgument,
            OrientationError::Hid(_)
            | OrientationError::Transport(_)
            | OrientationError::NotInitialized
            | OrientationError::ReadOnlyProperty(_)
            | OrientationError::TypeMismatch { .. } => ResultCode::Internal,
        }
    }

    /// True for faults caused by the descriptor rather than by report content.
    pub fn is_descriptor_error(&self) -> bool {
        matches!(
            self,
            OrientationError::ZeroReportCount { .. }
                | OrientationError::FieldOutOfBounds { .. }
                | OrientationError::UnsupportedBitSize { .. }
                | OrientationError::ArrayTooShort { .. }
        )
    }
}

/// Thread-safe last-error storage for the C FFI layer.
pub(crate) struct LastError {
    message: std::sync::Mutex<String>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn set(&self, err: &OrientationError) {
        if let Ok(mut msg) = self.message.lock() {
            *msg = fmt::format(format_args!("{}\0", err));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut msg) = self.message.lock() {
            msg.clear();
        }
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        match self.message.lock() {
            Ok(msg) if !msg.is_empty() => msg.as_ptr() as *const std::ffi::c_char,
            _ => std::ptr::null(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;

    #[test]
    fn test_descriptor_errors_share_malformed_code() {
        let err = OrientationError::ZeroReportCount {
            report_id: 0,
            usage: 0x0483,
        };
        assert!(err.is_descriptor_error());
        assert_eq!(err.code(), ResultCode::MalformedReport);

        let short = OrientationError::MalformedReport {
            actual: 10,
            expected: 32,
        };
        assert!(!short.is_descriptor_error());
        assert_eq!(short.code(), ResultCode::MalformedReport);
    }

    #[test]
    fn test_logic_fault_is_distinct() {
        let err = OrientationError::UnhandledProperty(registry::HID_USAGE);
        assert_eq!(err.code(), ResultCode::UnhandledProperty);
        assert_ne!(err.code(), OrientationError::Transport("x".into()).code());
    }

    #[test]
    fn test_last_error_is_nul_terminated() {
        let last = LastError::new();
        assert!(last.as_ptr().is_null());
        last.set(&OrientationError::NullArgument);
        let msg = unsafe { std::ffi::CStr::from_ptr(last.as_ptr()) };
        assert_eq!(msg.to_str().unwrap(), "Required argument was null");
        last.clear();
        assert!(last.as_ptr().is_null());
    }
}
