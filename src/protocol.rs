//! HID Sensor usage-table constants and the operational defaults of an
//! orientation sensor.
//!
//! A usage as it appears in a capability node packs the 12-bit usage id in
//! the low bits and the data modifier in the top nibble:
//! `0x2483` is the quaternion (0x0483) with the maximum modifier (0x2000).

// -- Usage page --
pub const USAGE_PAGE_SENSOR: u16 = 0x0020;

/// Collection usage for an aggregated device-orientation sensor.
pub const USAGE_SENSOR_TYPE_DEVICE_ORIENTATION: u16 = 0x008A;

// -- Input: sensor state / event --
pub const USAGE_SENSOR_STATE: u16 = 0x0201;
pub const USAGE_SENSOR_EVENT: u16 = 0x0202;

// -- Feature: common properties --
pub const USAGE_PROP_FRIENDLY_NAME: u16 = 0x0301;
pub const USAGE_PROP_PERSISTENT_UNIQUE_ID: u16 = 0x0302;
pub const USAGE_PROP_SENSOR_STATUS: u16 = 0x0303;
pub const USAGE_PROP_MINIMUM_REPORT_INTERVAL: u16 = 0x0304;
pub const USAGE_PROP_MANUFACTURER: u16 = 0x0305;
pub const USAGE_PROP_MODEL: u16 = 0x0306;
pub const USAGE_PROP_SERIAL_NUMBER: u16 = 0x0307;
pub const USAGE_PROP_DESCRIPTION: u16 = 0x0308;
pub const USAGE_PROP_CONNECTION_TYPE: u16 = 0x0309;
pub const USAGE_PROP_REPORT_INTERVAL: u16 = 0x030E;
pub const USAGE_PROP_CHANGE_SENSITIVITY_ABS: u16 = 0x030F;
pub const USAGE_PROP_ACCURACY: u16 = 0x0312;
pub const USAGE_PROP_RESOLUTION: u16 = 0x0313;
pub const USAGE_PROP_RANGE_MAXIMUM: u16 = 0x0314;
pub const USAGE_PROP_RANGE_MINIMUM: u16 = 0x0315;
pub const USAGE_PROP_REPORTING_STATE: u16 = 0x0316;
pub const USAGE_PROP_POWER_STATE: u16 = 0x0319;

// -- Data fields --
pub const USAGE_DATA_ORIENTATION: u16 = 0x0470;
pub const USAGE_DATA_ORIENTATION_DISTANCE: u16 = 0x0479;
pub const USAGE_DATA_ROTATION_MATRIX: u16 = 0x0482;
pub const USAGE_DATA_QUATERNION: u16 = 0x0483;
pub const USAGE_DATA_TIMESTAMP: u16 = 0x0529;

// -- Units --
/// Unit code for values that are already normalized (cosines, quaternion terms).
pub const UNITS_NOT_SPECIFIED: u32 = 0x00;
/// English-rotation degree unit code, accepted on per-field properties.
pub const UNITS_DEGREES: u32 = 0x14;

// -- Array geometry --
pub const ROTATION_MATRIX_DIMENSION: usize = 3;
pub const ROTATION_MATRIX_ELEMENTS: usize = 9;
pub const QUATERNION_ELEMENTS: usize = 4;

/// Leading bytes included in the hex dump of a rejected input report.
pub const REPORT_DUMP_BYTES: usize = 30;

// -- Operational defaults --
pub const DEFAULT_CURRENT_REPORT_INTERVAL_MS: u32 = 100;
pub const DEFAULT_MIN_REPORT_INTERVAL_MS: u32 = 16;
pub const DEFAULT_CHANGE_SENSITIVITY: f32 = 0.02;
pub const DEFAULT_RANGE_MAXIMUM: f32 = 1.0;
pub const DEFAULT_RANGE_MINIMUM: f32 = -1.0;
pub const DEFAULT_ACCURACY: f32 = 0.01;
pub const DEFAULT_RESOLUTION: f32 = 0.0001;

pub const ORIENTATION_NAME: &str = "Orientation";
pub const ORIENTATION_DESCRIPTION: &str = "Aggregated Device Orientation Sensor";

/// Data modifier carried in the top nibble of a usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    None,
    ChangeSensitivityAbs,
    Maximum,
    Minimum,
    Accuracy,
    Resolution,
    ThresholdHigh,
    ThresholdLow,
    CalibrationOffset,
    CalibrationMultiplier,
    ReportInterval,
    FrequencyMax,
    PeriodMax,
    ChangeSensitivityRangePct,
    ChangeSensitivityRelPct,
    Vendor,
}

impl Modifier {
    pub fn from_nibble(nibble: u16) -> Self {
        match nibble & 0xF {
            0x0 => Modifier::None,
            0x1 => Modifier::ChangeSensitivityAbs,
            0x2 => Modifier::Maximum,
            0x3 => Modifier::Minimum,
            0x4 => Modifier::Accuracy,
            0x5 => Modifier::Resolution,
            0x6 => Modifier::ThresholdHigh,
            0x7 => Modifier::ThresholdLow,
            0x8 => Modifier::CalibrationOffset,
            0x9 => Modifier::CalibrationMultiplier,
            0xA => Modifier::ReportInterval,
            0xB => Modifier::FrequencyMax,
            0xC => Modifier::PeriodMax,
            0xD => Modifier::ChangeSensitivityRangePct,
            0xE => Modifier::ChangeSensitivityRelPct,
            _ => Modifier::Vendor,
        }
    }

    pub fn nibble(self) -> u16 {
        match self {
            Modifier::None => 0x0,
            Modifier::ChangeSensitivityAbs => 0x1,
            Modifier::Maximum => 0x2,
            Modifier::Minimum => 0x3,
            Modifier::Accuracy => 0x4,
            Modifier::Resolution => 0x5,
            Modifier::ThresholdHigh => 0x6,
            Modifier::ThresholdLow => 0x7,
            Modifier::CalibrationOffset => 0x8,
            Modifier::CalibrationMultiplier => 0x9,
            Modifier::ReportInterval => 0xA,
            Modifier::FrequencyMax => 0xB,
            Modifier::PeriodMax => 0xC,
            Modifier::ChangeSensitivityRangePct => 0xD,
            Modifier::ChangeSensitivityRelPct => 0xE,
            Modifier::Vendor => 0xF,
        }
    }
}

/// Split a node usage into its usage id and data modifier.
pub fn split_usage(usage: u16) -> (u16, Modifier) {
    (usage & 0x0FFF, Modifier::from_nibble(usage >> 12))
}

/// Inverse of [`split_usage`].
pub fn compose_usage(id: u16, modifier: Modifier) -> u16 {
    (id & 0x0FFF) | (modifier.nibble() << 12)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_usage() {
        assert_eq!(split_usage(0x0483), (USAGE_DATA_QUATERNION, Modifier::None));
        assert_eq!(split_usage(0x2483), (USAGE_DATA_QUATERNION, Modifier::Maximum));
        assert_eq!(
            split_usage(0x1470),
            (USAGE_DATA_ORIENTATION, Modifier::ChangeSensitivityAbs)
        );
    }

    #[test]
    fn test_compose_usage() {
        assert_eq!(compose_usage(USAGE_DATA_ROTATION_MATRIX, Modifier::Minimum), 0x3482);
        for nibble in 0..16u16 {
            let m = Modifier::from_nibble(nibble);
            assert_eq!(split_usage(compose_usage(0x0470, m)), (0x0470, m));
        }
    }
}
