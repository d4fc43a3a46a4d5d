//! Value extraction from bit-packed HID reports.
//!
//! Fields are little-endian and LSB-first, as HID lays them out. Array
//! elements follow each other at `bit_size` strides starting at the node's
//! bit offset.

use crate::caps::CapabilityNode;
use crate::{OrientationError, Result};

/// A field as it sits in the report, before sign and unit handling.
#[derive(Debug, Clone, PartialEq)]
pub enum RawField {
    Scalar(u32),
    Words(Vec<u16>),
    DWords(Vec<u32>),
    /// Packed bytes of an array whose elements are neither 16 nor 32 bits.
    Bytes(Vec<u8>),
}

impl RawField {
    /// Elements widened to u32. `Bytes` yields one element per byte.
    pub fn elements(&self) -> Vec<u32> {
        match self {
            RawField::Scalar(v) => vec![*v],
            RawField::Words(w) => w.iter().map(|&v| v as u32).collect(),
            RawField::DWords(d) => d.clone(),
            RawField::Bytes(b) => b.iter().map(|&v| v as u32).collect(),
        }
    }

    pub fn scalar(&self) -> Option<u32> {
        match self {
            RawField::Scalar(v) => Some(*v),
            _ => None,
        }
    }
}

fn check_layout(node: &CapabilityNode, buf_len: usize) -> Result<()> {
    if node.report_count == 0 {
        return Err(OrientationError::ZeroReportCount {
            report_id: node.report_id,
            usage: node.usage,
        });
    }
    if node.bit_size == 0 || node.bit_size > 32 {
        return Err(OrientationError::UnsupportedBitSize {
            usage: node.usage,
            bit_size: node.bit_size,
        });
    }
    if node.end_bit() > buf_len as u64 * 8 {
        return Err(OrientationError::FieldOutOfBounds { usage: node.usage });
    }
    Ok(())
}

/// Read `bit_size` (<= 32) bits at `bit_offset`. Caller checks bounds.
fn read_bits(buf: &[u8], bit_offset: u64, bit_size: u16) -> u32 {
    let mut value: u64 = 0;
    for i in 0..bit_size as u64 {
        let bit = bit_offset + i;
        let byte = buf[(bit / 8) as usize];
        if byte & (1 << (bit % 8)) != 0 {
            value |= 1 << i;
        }
    }
    value as u32
}

fn write_bits(buf: &mut [u8], bit_offset: u64, bit_size: u16, value: u32) {
    for i in 0..bit_size as u64 {
        let bit = bit_offset + i;
        let byte = &mut buf[(bit / 8) as usize];
        let mask = 1u8 << (bit % 8);
        if (value >> i) & 1 != 0 {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }
}

/// Pull a field out of `buf`.
///
/// `declared_len` is the report's byte length from the capability table; a
/// shorter buffer is rejected before any bit is read.
pub fn extract_field(node: &CapabilityNode, buf: &[u8], declared_len: usize) -> Result<RawField> {
    if buf.len() < declared_len {
        return Err(OrientationError::MalformedReport {
            actual: buf.len(),
            expected: declared_len,
        });
    }
    check_layout(node, buf.len())?;

    let start = node.bit_offset as u64;
    let size = node.bit_size;
    if node.report_count == 1 {
        return Ok(RawField::Scalar(read_bits(buf, start, size)));
    }

    let count = node.report_count as u64;
    let at = |i: u64| read_bits(buf, start + i * size as u64, size);
    Ok(match size {
        16 => RawField::Words((0..count).map(|i| at(i) as u16).collect()),
        32 => RawField::DWords((0..count).map(at).collect()),
        _ => {
            let total_bits = count * size as u64;
            let nbytes = total_bits.div_ceil(8);
            RawField::Bytes(
                (0..nbytes)
                    .map(|b| {
                        let width = (total_bits - b * 8).min(8) as u16;
                        read_bits(buf, start + b * 8, width) as u8
                    })
                    .collect(),
            )
        }
    })
}

/// Recover the signed logical value of a raw field.
///
/// A negative logical minimum means the device encodes the range in two's
/// complement over `bit_size` bits; otherwise the field is plain unsigned.
pub fn to_logical(logical_min: i32, bit_size: u16, raw: u32) -> i64 {
    if logical_min >= 0 || bit_size == 0 || bit_size > 32 {
        return raw as i64;
    }
    let width = bit_size as u32;
    let raw = raw as u64 & ((1u64 << width) - 1);
    let sign = 1u64 << (width - 1);
    if raw & sign != 0 {
        raw as i64 - (1i64 << width)
    } else {
        raw as i64
    }
}

/// Encode a logical value into a `bit_size`-bit raw field.
pub fn from_logical(logical: i64, bit_size: u16) -> u32 {
    let width = bit_size.clamp(1, 32) as u32;
    let mask = if width == 32 {
        u32::MAX as u64
    } else {
        (1u64 << width) - 1
    };
    (logical as u64 & mask) as u32
}

/// Signed power of ten encoded by a 4-bit HID unit-exponent code.
pub fn unit_exponent(code: u8) -> i32 {
    let code = (code & 0x0F) as i32;
    if code < 8 {
        code
    } else {
        code - 16
    }
}

pub fn unit_multiplier(code: u8) -> f64 {
    10f64.powi(unit_exponent(code))
}

/// Per-field conversion between raw units and physical units.
///
/// Built once per node so the exponent lookup is not repeated per element.
#[derive(Debug, Clone, Copy)]
pub struct FieldScale {
    logical_min: i32,
    logical_max: i32,
    bit_size: u16,
    multiplier: f64,
}

impl FieldScale {
    pub fn of(node: &CapabilityNode) -> Self {
        FieldScale {
            logical_min: node.logical_min,
            logical_max: node.logical_max,
            bit_size: node.bit_size,
            multiplier: unit_multiplier(node.unit_exponent),
        }
    }

    pub fn logical(&self, raw: u32) -> i64 {
        to_logical(self.logical_min, self.bit_size, raw)
    }

    pub fn physical(&self, raw: u32) -> f64 {
        self.logical(raw) as f64 * self.multiplier
    }

    /// Quantize a physical value back to a raw field, clamped into the
    /// declared logical range.
    pub fn encode(&self, value: f64) -> u32 {
        let mut logical = (value / self.multiplier).round() as i64;
        if self.logical_min <= self.logical_max {
            logical = logical.clamp(self.logical_min as i64, self.logical_max as i64);
        }
        from_logical(logical, self.bit_size)
    }
}

/// Physical value of a scalar raw field.
pub fn to_physical(node: &CapabilityNode, raw: u32) -> f64 {
    FieldScale::of(node).physical(raw)
}

/// Store a raw value into the first element of `node` without disturbing
/// neighbouring bits.
pub fn write_raw(node: &CapabilityNode, buf: &mut [u8], raw: u32) -> Result<()> {
    check_layout(node, buf.len())?;
    write_bits(buf, node.bit_offset as u64, node.bit_size, raw);
    Ok(())
}

/// Raw field for a physical value: divided by the multiplier, rounded,
/// clamped into the logical range and masked to the field width.
pub fn encode_physical(node: &CapabilityNode, value: f64) -> u32 {
    FieldScale::of(node).encode(value)
}

/// Encode a physical value and store it into `node`.
pub fn write_field(node: &CapabilityNode, buf: &mut [u8], value: f64) -> Result<()> {
    write_raw(node, buf, encode_physical(node, value))
}

/// Hex dump of the leading bytes of a report for diagnostics.
pub fn hex_dump(buf: &[u8], limit: usize) -> String {
    let mut out = buf
        .iter()
        .take(limit)
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ");
    if buf.len() > limit {
        out.push_str(" ...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(bit_offset: u32, bit_size: u16, min: i32, max: i32) -> CapabilityNode {
        CapabilityNode::new(0, 0x0483)
            .with_bits(bit_offset, bit_size)
            .with_logical(min, max)
    }

    #[test]
    fn test_scalar_extraction() {
        let buf = [0x00, 0x34, 0x12, 0x00];
        let n = node(8, 16, 0, 0xFFFF);
        assert_eq!(extract_field(&n, &buf, 4).unwrap(), RawField::Scalar(0x1234));
    }

    #[test]
    fn test_unaligned_field() {
        // 4-bit field starting at bit 12: high nibble of byte 1.
        let buf = [0x00, 0xA0, 0x00];
        let n = node(12, 4, 0, 15);
        assert_eq!(extract_field(&n, &buf, 3).unwrap().scalar(), Some(0xA));
    }

    #[test]
    fn test_word_array() {
        let buf = [0x00, 0x01, 0x00, 0xFF, 0xFF, 0x00, 0x80];
        let n = node(8, 16, -32768, 32767).with_count(3);
        let raw = extract_field(&n, &buf, 7).unwrap();
        assert_eq!(raw, RawField::Words(vec![1, 0xFFFF, 0x8000]));
        let scale = FieldScale::of(&n);
        let logical: Vec<i64> = raw.elements().iter().map(|&e| scale.logical(e)).collect();
        assert_eq!(logical, vec![1, -1, -32768]);
    }

    #[test]
    fn test_byte_array_for_odd_sizes() {
        let buf = [0x00, b'a', b'b', b'c'];
        let n = node(8, 8, 0, 255).with_count(3);
        assert_eq!(
            extract_field(&n, &buf, 4).unwrap(),
            RawField::Bytes(b"abc".to_vec())
        );
    }

    #[test]
    fn test_short_buffer_rejected() {
        let buf = [0u8; 10];
        let n = node(8, 16, 0, 10);
        let err = extract_field(&n, &buf, 32).unwrap_err();
        assert!(matches!(
            err,
            OrientationError::MalformedReport {
                actual: 10,
                expected: 32
            }
        ));
    }

    #[test]
    fn test_zero_report_count_is_descriptor_error() {
        let buf = [0u8; 4];
        let n = node(8, 8, 0, 10).with_count(0);
        let err = extract_field(&n, &buf, 4).unwrap_err();
        assert!(matches!(err, OrientationError::ZeroReportCount { .. }));
        assert!(err.is_descriptor_error());
    }

    #[test]
    fn test_field_past_end() {
        let buf = [0u8; 4];
        let n = node(24, 16, 0, 10);
        assert!(matches!(
            extract_field(&n, &buf, 4).unwrap_err(),
            OrientationError::FieldOutOfBounds { .. }
        ));
    }

    #[test]
    fn test_signed_reconstruction_inverts_encoding() {
        for &bits in &[4u16, 8, 12, 16, 24, 32] {
            let max = if bits == 32 { i32::MAX as i64 } else { (1i64 << (bits - 1)) - 1 };
            let min = -max - 1;
            for &v in &[min, min + 1, -1, 0, 1, max - 1, max] {
                let raw = from_logical(v, bits);
                assert_eq!(to_logical(min as i32, bits, raw), v, "bits={} v={}", bits, v);
            }
        }
    }

    #[test]
    fn test_non_negative_minimum_reads_unsigned() {
        assert_eq!(to_logical(0, 8, 0xFF), 255);
        assert_eq!(to_logical(-1, 8, 0xFF), -1);
    }

    #[test]
    fn test_unit_exponent_codes() {
        assert_eq!(unit_exponent(0x0), 0);
        assert_eq!(unit_exponent(0x7), 7);
        assert_eq!(unit_exponent(0x8), -8);
        assert_eq!(unit_exponent(0xE), -2);
        assert_eq!(unit_exponent(0xF), -1);
        assert!((unit_multiplier(0xE) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_physical_conversion() {
        // -0.5 at exponent -2 is logical -50.
        let n = node(8, 16, -32768, 32767).with_units(0, 0xE);
        assert!((to_physical(&n, from_logical(-50, 16)) + 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_write_preserves_neighbours() {
        let mut buf = [0xFFu8; 3];
        let n = node(12, 4, 0, 15);
        write_raw(&n, &mut buf, 0x5).unwrap();
        assert_eq!(buf, [0xFF, 0x5F, 0xFF]);
    }

    #[test]
    fn test_write_field_clamps_to_logical_range() {
        let mut buf = [0u8; 3];
        let n = node(8, 16, 0, 1000).with_units(0, 0xE);
        write_field(&n, &mut buf, 25.0).unwrap();
        assert_eq!(extract_field(&n, &buf, 3).unwrap().scalar(), Some(1000));
        write_field(&n, &mut buf, 0.07).unwrap();
        assert_eq!(extract_field(&n, &buf, 3).unwrap().scalar(), Some(7));
    }

    #[test]
    fn test_hex_dump_is_bounded() {
        let buf = [0xABu8; 40];
        let dump = hex_dump(&buf, 4);
        assert_eq!(dump, "ab ab ab ab ...");
        assert_eq!(hex_dump(&[1, 2], 4), "01 02");
    }
}
