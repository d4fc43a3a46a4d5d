//! Capability table: the compiled report layout of one physical collection.
//!
//! The table is produced by a descriptor compiler outside this crate and is
//! never mutated here. Lookups are linear scans, which is what the
//! per-report decode loop needs anyway.

use crate::protocol::{self, Modifier};

/// Layout of one value field within a report.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityNode {
    pub report_id: u8,
    pub usage_page: u16,
    /// Usage id in the low 12 bits, data modifier in the top nibble.
    pub usage: u16,
    /// Absolute bit offset of the first element; byte 0 of every report
    /// buffer is the report ID.
    pub bit_offset: u32,
    pub bit_size: u16,
    pub report_count: u16,
    pub logical_min: i32,
    pub logical_max: i32,
    pub units: u32,
    /// Raw 4-bit HID unit-exponent code.
    pub unit_exponent: u8,
    pub link_collection: u16,
}

impl CapabilityNode {
    /// An unsigned 8-bit scalar right after the report-ID byte.
    pub fn new(report_id: u8, usage: u16) -> Self {
        CapabilityNode {
            report_id,
            usage_page: protocol::USAGE_PAGE_SENSOR,
            usage,
            bit_offset: 8,
            bit_size: 8,
            report_count: 1,
            logical_min: 0,
            logical_max: 0xFF,
            units: protocol::UNITS_NOT_SPECIFIED,
            unit_exponent: 0,
            link_collection: 0,
        }
    }

    pub fn with_bits(mut self, bit_offset: u32, bit_size: u16) -> Self {
        self.bit_offset = bit_offset;
        self.bit_size = bit_size;
        self
    }

    pub fn with_count(mut self, report_count: u16) -> Self {
        self.report_count = report_count;
        self
    }

    pub fn with_logical(mut self, min: i32, max: i32) -> Self {
        self.logical_min = min;
        self.logical_max = max;
        self
    }

    pub fn with_units(mut self, units: u32, unit_exponent: u8) -> Self {
        self.units = units;
        self.unit_exponent = unit_exponent;
        self
    }

    pub fn with_link_collection(mut self, link_collection: u16) -> Self {
        self.link_collection = link_collection;
        self
    }

    pub fn usage_id(&self) -> u16 {
        protocol::split_usage(self.usage).0
    }

    pub fn modifier(&self) -> Modifier {
        protocol::split_usage(self.usage).1
    }

    /// First bit past the last element.
    pub fn end_bit(&self) -> u64 {
        self.bit_offset as u64 + self.bit_size as u64 * self.report_count as u64
    }
}

/// Report layout of a physical sensor collection.
#[derive(Debug, Clone, Default)]
pub struct CapabilityTable {
    pub input_report_len: usize,
    pub feature_report_len: usize,
    pub input_values: Vec<CapabilityNode>,
    pub feature_values: Vec<CapabilityNode>,
    pub feature_reports_supported: bool,
    pub starting_input_report_id: u8,
    pub starting_feature_report_id: u8,
}

/// Where a logical sensor sits inside its physical collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub sensor_index: u8,
    pub sensor_count: usize,
    pub link_collection: u16,
}

impl Placement {
    /// The only sensor of its collection: report ID 0, no link filter.
    pub fn single() -> Self {
        Placement {
            sensor_index: 0,
            sensor_count: 1,
            link_collection: 0,
        }
    }

    pub fn shared(sensor_index: u8, sensor_count: usize, link_collection: u16) -> Self {
        Placement {
            sensor_index,
            sensor_count,
            link_collection,
        }
    }

    /// More than one logical sensor reports through the same collection.
    pub fn is_shared(&self) -> bool {
        self.sensor_count > 1
    }

    fn report_id(&self, starting_id: u8) -> u8 {
        if self.is_shared() {
            starting_id.wrapping_add(self.sensor_index)
        } else {
            0
        }
    }

    fn selects(&self, node: &CapabilityNode, report_id: u8) -> bool {
        node.report_id == report_id
            && (!self.is_shared() || node.link_collection == self.link_collection)
    }
}

impl Default for Placement {
    fn default() -> Self {
        Placement::single()
    }
}

impl CapabilityTable {
    pub fn input_report_id(&self, placement: &Placement) -> u8 {
        placement.report_id(self.starting_input_report_id)
    }

    pub fn feature_report_id(&self, placement: &Placement) -> u8 {
        placement.report_id(self.starting_feature_report_id)
    }

    /// Input nodes belonging to the sensor at `placement`.
    pub fn input_nodes<'a>(
        &'a self,
        placement: &'a Placement,
    ) -> impl Iterator<Item = &'a CapabilityNode> + 'a {
        let report_id = self.input_report_id(placement);
        self.input_values
            .iter()
            .filter(move |n| placement.selects(n, report_id))
    }

    /// Feature nodes belonging to the sensor at `placement`.
    pub fn feature_nodes<'a>(
        &'a self,
        placement: &'a Placement,
    ) -> impl Iterator<Item = &'a CapabilityNode> + 'a {
        let report_id = self.feature_report_id(placement);
        self.feature_values
            .iter()
            .filter(move |n| placement.selects(n, report_id))
    }

    /// Feature node with exactly this usage (id and modifier).
    pub fn find_feature<'a>(
        &'a self,
        placement: &'a Placement,
        usage: u16,
    ) -> Option<&'a CapabilityNode> {
        self.feature_nodes(placement).find(|n| n.usage == usage)
    }

    /// Whether the input report carries `usage_id` with no modifier.
    pub fn has_input_usage(&self, placement: &Placement, usage_id: u16) -> bool {
        self.input_nodes(placement)
            .any(|n| n.usage_id() == usage_id && n.modifier() == Modifier::None)
    }
}
