//! Property-based tests for the universal invariants in spec.md §8.
//!
//! Generators build random well-formed item sequences (one Usage Page, a
//! handful of Input items with randomized Report Size/Count/flags, each
//! optionally wrapped in a Push/Pop pair) and check invariants 1-5 hold for
//! every generated descriptor.

use proptest::prelude::*;

use hid_rdesc::field::Field;
use hid_rdesc::item::{Item, Tag};
use hid_rdesc::{Alternatives, MainKind, ReportDescriptor};

#[derive(Debug, Clone)]
struct InputSpec {
    report_size: u8,
    report_count: u8,
    flags: u16,
    pushed: bool,
}

fn input_spec() -> impl Strategy<Value = InputSpec> {
    (1u8..=16, 1u8..=8, 0u16..512, any::<bool>()).prop_map(|(report_size, report_count, flags, pushed)| {
        InputSpec { report_size, report_count, flags, pushed }
    })
}

/// Build a raw byte descriptor out of `specs`: one global Usage Page,
/// Logical Min/Max 0..1, then one `Input` Main item per spec (each
/// optionally Push/Pop-wrapped, per invariant 4's stack-balance check).
fn build_descriptor(specs: &[InputSpec]) -> Vec<u8> {
    let mut bytes = vec![0x05, 0x01, 0x15, 0x00, 0x25, 0x01, 0x09, 0x30];
    for spec in specs {
        if spec.pushed {
            bytes.push(0xA4); // Push
        }
        let item = Item::from_value(Tag::ReportSize, spec.report_size as i64, 0);
        bytes.extend(item.to_bytes());
        let item = Item::from_value(Tag::ReportCount, spec.report_count as i64, 0);
        bytes.extend(item.to_bytes());
        let item = Item::from_value(Tag::Input, spec.flags as i64, 0);
        bytes.extend(item.to_bytes());
        if spec.pushed {
            bytes.push(0xB4); // Pop
        }
    }
    bytes
}

proptest! {
    /// Invariant 1: byte round-trip.
    #[test]
    fn byte_round_trip_holds(specs in proptest::collection::vec(input_spec(), 1..12)) {
        let bytes = build_descriptor(&specs);
        let rdesc = ReportDescriptor::from_bytes(&bytes).unwrap();
        prop_assert_eq!(rdesc.to_bytes(), bytes);
    }

    /// Invariant 3: item header law, for every payload width a Report
    /// Size/Count item can take.
    #[test]
    fn item_header_law_holds(value in 0i64..0x1_0000_0000i64) {
        let item = Item::from_value(Tag::ReportCount, value.min(u32::MAX as i64), 0);
        let bytes = item.to_bytes();
        let size_code = bytes[0] & 0x03;
        let expected_len = 1 + match size_code {
            0 => 0,
            1 => 1,
            2 => 2,
            3 => 4,
            _ => unreachable!(),
        };
        prop_assert_eq!(bytes.len(), expected_len);
    }

    /// Invariant 5: bit budget — a Report's bitsize equals the id byte (if
    /// numbered) plus the sum of every field's bit_size * count.
    #[test]
    fn bit_budget_holds(specs in proptest::collection::vec(input_spec(), 1..12)) {
        let bytes = build_descriptor(&specs);
        let rdesc = ReportDescriptor::from_bytes(&bytes).unwrap();
        for report in rdesc.input_reports() {
            let expected: usize = report.fields.iter().map(|f| f.bit_size * f.count).sum::<usize>()
                + if report.report_id >= 0 { 8 } else { 0 };
            prop_assert_eq!(report.bitsize(), expected);
        }
    }

    /// Invariant 6: signed round-trip across the full declared range.
    #[test]
    fn signed_round_trip_holds(bit_size in 2usize..=10, offset in 0usize..8) {
        let logical_min = -(1i64 << (bit_size - 1));
        let logical_max = (1i64 << (bit_size - 1)) - 1;
        let field = Field {
            kind: MainKind::Input,
            report_id: -1,
            logical: None,
            physical: None,
            application: None,
            collection: (0, 0, 0),
            flags: 0b10,
            usage_page: 0,
            usage: 0,
            alternatives: None,
            logical_min,
            logical_max,
            bit_size,
            count: 1,
            start_bit: offset,
        };
        let buf_len = (offset + bit_size + 7) / 8 + 1;
        for v in logical_min..=logical_max {
            let mut buf = vec![0u8; buf_len];
            field.write(&mut buf, v, 0).unwrap();
            prop_assert_eq!(field.read(&buf, 0), Some(v));
        }
    }
}

#[test]
fn alternatives_range_and_enumerated_agree_on_length() {
    let range = Alternatives::Range(0x0009_0001, 0x0009_0004);
    let enumerated = Alternatives::Enumerated(vec![0x0009_0001, 0x0009_0002, 0x0009_0003, 0x0009_0004]);
    assert_eq!(range.len(), enumerated.len());
    for i in 0..4 {
        assert_eq!(range.get(i), enumerated.get(i));
    }
}
