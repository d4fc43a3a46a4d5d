use crate::types::{Guid, SensorIdentity};
use crate::{OrientationError, Result};
use hidapi::HidDevice;

/// Moves whole feature reports between the host and the device.
///
/// `buf[0]` carries the report id on both directions, as hidapi expects.
pub trait FeatureTransport {
    /// Fill `buf` with the current feature report and return the number of
    /// bytes the device produced.
    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn send_feature_report(&mut self, buf: &[u8]) -> Result<()>;
}

/// HID transport over a hidapi device handle.
///
/// Finding and opening the device is left to the caller.
pub struct HidTransport {
    device: HidDevice,
}

impl HidTransport {
    pub fn new(device: HidDevice) -> Self {
        Self { device }
    }

    /// Consume the transport and return the inner HID device handle.
    pub fn into_device(self) -> HidDevice {
        self.device
    }

    /// Build the identity strings from the device's USB descriptors.
    /// Missing strings come back empty.
    pub fn identity(&self, device_name: &str, persistent_id: Guid) -> Result<SensorIdentity> {
        let manufacturer = self.device.get_manufacturer_string()?.unwrap_or_default();
        let product = self.device.get_product_string()?.unwrap_or_default();
        let serial_number = self.device.get_serial_number_string()?.unwrap_or_default();
        Ok(SensorIdentity {
            device_name: device_name.to_string(),
            manufacturer,
            product,
            serial_number,
            persistent_id,
        })
    }

    /// Read one input report for `report_id`, waiting at most `timeout_ms`
    /// (-1 blocks). Byte 0 of `buf` always holds the report ID, including for
    /// unnumbered reports where hidapi omits it. Returns 0 on timeout.
    pub fn read_input_report(&self, report_id: u8, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        frame_input_report(report_id, buf, |b| {
            self.device
                .read_timeout(b, timeout_ms)
                .map_err(|e| OrientationError::Transport(format!("read failed: {}", e)))
        })
    }
}

/// Run `read` so that the report lands with its ID in byte 0.
fn frame_input_report(
    report_id: u8,
    buf: &mut [u8],
    read: impl FnOnce(&mut [u8]) -> Result<usize>,
) -> Result<usize> {
    if report_id != 0 {
        return read(buf);
    }
    let Some((first, rest)) = buf.split_first_mut() else {
        return Ok(0);
    };
    let n = read(rest)?;
    if n == 0 {
        return Ok(0);
    }
    *first = 0;
    Ok(n + 1)
}

impl FeatureTransport for HidTransport {
    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.device
            .get_feature_report(buf)
            .map_err(|e| OrientationError::Transport(format!("get_feature_report failed: {}", e)))
    }

    fn send_feature_report(&mut self, buf: &[u8]) -> Result<()> {
        self.device
            .send_feature_report(buf)
            .map_err(|e| OrientationError::Transport(format!("send_feature_report failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unnumbered_report_gets_id_byte() {
        let mut buf = [0xFFu8; 4];
        let n = frame_input_report(0, &mut buf, |b| {
            assert_eq!(b.len(), 3);
            b.copy_from_slice(&[1, 2, 3]);
            Ok(3)
        })
        .unwrap();
        assert_eq!(n, 4);
        assert_eq!(buf, [0, 1, 2, 3]);
    }

    #[test]
    fn test_numbered_report_passes_through() {
        let mut buf = [0u8; 3];
        let n = frame_input_report(2, &mut buf, |b| {
            assert_eq!(b.len(), 3);
            b.copy_from_slice(&[2, 9, 9]);
            Ok(3)
        })
        .unwrap();
        assert_eq!(n, 3);
        assert_eq!(buf, [2, 9, 9]);
    }

    #[test]
    fn test_timeout_reads_nothing() {
        let mut buf = [0xAAu8; 4];
        assert_eq!(frame_input_report(0, &mut buf, |_| Ok(0)).unwrap(), 0);
        assert_eq!(buf[0], 0xAA);

        let err = frame_input_report(0, &mut buf, |_| {
            Err(OrientationError::Transport("gone".into()))
        })
        .unwrap_err();
        assert!(matches!(err, OrientationError::Transport(_)));
    }
}
