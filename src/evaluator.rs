//! 4.C Descriptor Evaluator: the stack machine that turns a flat Item
//! stream into Fields, tracking Global/Local state and Collection nesting.

use std::collections::HashMap;

use crate::error::ParseError;
use crate::field::{Alternatives, Field, MainKind};
use crate::item::{Item, Tag};

#[derive(Debug, Clone)]
struct GlobalState {
    usage_page: u32,
    logical_min: i64,
    logical_max: i64,
    physical_min: i64,
    physical_max: i64,
    unit_exponent: i64,
    unit: i64,
    report_size: usize,
    report_id: i32,
    report_count: usize,
}

impl Default for GlobalState {
    fn default() -> Self {
        GlobalState {
            usage_page: 0,
            logical_min: 0,
            logical_max: 0,
            physical_min: 0,
            physical_max: 0,
            unit_exponent: 0,
            unit: 0,
            report_size: 0,
            report_id: -1,
            report_count: 0,
        }
    }
}

/// Local state resets after every Main item (spec §4.C "Locals reset").
#[derive(Debug, Clone, Default)]
struct LocalState {
    usages: Vec<u32>,
    usage_min: Option<u32>,
    usage_max: Option<u32>,
}

impl LocalState {
    fn alternatives(&self) -> Option<Alternatives> {
        if let (Some(min), Some(max)) = (self.usage_min, self.usage_max) {
            return Some(Alternatives::Range(min, max));
        }
        if !self.usages.is_empty() {
            return Some(Alternatives::Enumerated(self.usages.clone()));
        }
        None
    }

    /// The usage assigned to repetition `index` of a Variable Main item,
    /// extending the last listed usage when the list runs short.
    fn usage_for_index(&self, index: usize) -> u32 {
        if let (Some(min), Some(max)) = (self.usage_min, self.usage_max) {
            return (min + index as u32).min(max);
        }
        if let Some(usage) = self.usages.get(index) {
            return *usage;
        }
        if let Some(last) = self.usages.last() {
            return *last;
        }
        0
    }
}

#[derive(Debug, Clone, Copy)]
struct CollectionEntry {
    kind: i64,
    usage: u32,
}

/// Output of walking a full item stream (spec §4.C).
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub fields: Vec<Field>,
    /// Top-level Application collection usages, in declaration order.
    pub applications: Vec<u32>,
    /// Whether the Microsoft "Windows 8 Certification" vendor usage
    /// (Vendor Defined page 0xff00, usage 0x00c5) appears anywhere.
    pub win8: bool,
}

const WIN8_USAGE_PAGE: u32 = 0xff00 << 16;
const WIN8_USAGE: u32 = 0x00c5;

/// Walk `items`, tracking the Global/Local/Collection stack machine, and
/// produce the Field list (spec §4.C.1 "Main-item field expansion").
pub fn evaluate(items: &[Item]) -> Result<Evaluation, ParseError> {
    let mut globals = GlobalState::default();
    let mut global_stack: Vec<GlobalState> = Vec::new();
    let mut locals = LocalState::default();
    let mut collection_stack: Vec<CollectionEntry> = Vec::new();
    let mut bit_offset: HashMap<(i32, MainKind), usize> = HashMap::new();
    let mut application_count: u32 = 0;
    let mut physical_count: u32 = 0;
    let mut logical_count: u32 = 0;

    let mut result = Evaluation::default();

    for item in items {
        match item.tag {
            Tag::UsagePage => {
                globals.usage_page = (item.value as u32) << 16;
                locals = LocalState::default();
            }
            Tag::LogicalMinimum => globals.logical_min = item.value,
            Tag::LogicalMaximum => globals.logical_max = item.value,
            Tag::PhysicalMinimum => globals.physical_min = item.value,
            Tag::PhysicalMaximum => globals.physical_max = item.value,
            Tag::UnitExponent => globals.unit_exponent = item.value,
            Tag::Unit => globals.unit = item.value,
            Tag::ReportSize => globals.report_size = item.value as usize,
            Tag::ReportCount => globals.report_count = item.value as usize,
            Tag::ReportId => globals.report_id = item.value as i32,
            Tag::Push => global_stack.push(globals.clone()),
            Tag::Pop => {
                globals = global_stack.pop().unwrap_or_default();
            }

            Tag::Usage => {
                let usage = (item.value as u32) | globals.usage_page;
                locals.usages.push(usage);
            }
            Tag::UsageMinimum => locals.usage_min = Some((item.value as u32) | globals.usage_page),
            Tag::UsageMaximum => locals.usage_max = Some((item.value as u32) | globals.usage_page),
            Tag::DesignatorIndex
            | Tag::DesignatorMinimum
            | Tag::DesignatorMaximum
            | Tag::StringIndex
            | Tag::StringMinimum
            | Tag::StringMaximum
            | Tag::Delimiter => {}

            Tag::Collection => {
                let kind = item.value;
                // spec §4.C: bind glob.application/physical/logical to the
                // *last* usage declared before the Collection item.
                let usage = locals.usages.last().copied().unwrap_or(0);
                match kind {
                    1 => {
                        application_count += 1;
                        result.applications.push(usage);
                    }
                    0 => physical_count += 1,
                    2 => logical_count += 1,
                    _ => {}
                }
                collection_stack.push(CollectionEntry { kind, usage });
                locals = LocalState::default();
            }
            Tag::EndCollection => {
                collection_stack.pop();
                locals = LocalState::default();
            }

            Tag::Input | Tag::Output | Tag::Feature => {
                let kind = match item.tag {
                    Tag::Input => MainKind::Input,
                    Tag::Output => MainKind::Output,
                    Tag::Feature => MainKind::Feature,
                    _ => unreachable!(),
                };

                if item.tag == Tag::Feature {
                    if let Some(&last_usage) = locals.usages.last() {
                        if last_usage & 0xffff_0000 == WIN8_USAGE_PAGE
                            && (last_usage & 0xffff) == WIN8_USAGE
                        {
                            result.win8 = true;
                        }
                    }
                }
                let application = current_of_kind(&collection_stack, 1);
                let physical = current_of_kind(&collection_stack, 0);
                let logical = current_of_kind(&collection_stack, 2);
                let collection_counts = (application_count, physical_count, logical_count);

                let base = bit_offset.entry((globals.report_id, kind)).or_insert_with(|| {
                    if globals.report_id >= 0 {
                        8
                    } else {
                        0
                    }
                });
                let start_bit = *base;
                let total_bits = globals.report_size * globals.report_count;
                *base += total_bits;

                let is_constant = item.value & (1 << 0) != 0;
                let is_variable = item.value & (1 << 1) != 0;

                if is_constant || !is_variable {
                    // Constant padding and Array fields both occupy one
                    // contiguous region; Array fields additionally carry the
                    // alternatives their repetitions may encode.
                    result.fields.push(Field {
                        kind,
                        report_id: globals.report_id,
                        logical: logical,
                        physical: physical,
                        application,
                        collection: collection_counts,
                        flags: item.value,
                        usage_page: globals.usage_page,
                        // Primary usage falls back to usage_min, then 0,
                        // mirroring `getHidFields`'s `usage = usage_min`.
                        usage: locals.usages.first().copied().unwrap_or(locals.usage_min.unwrap_or(0)),
                        alternatives: if is_constant { None } else { locals.alternatives() },
                        logical_min: globals.logical_min,
                        logical_max: globals.logical_max,
                        bit_size: globals.report_size,
                        count: globals.report_count,
                        start_bit,
                    });
                } else {
                    for i in 0..globals.report_count {
                        result.fields.push(Field {
                            kind,
                            report_id: globals.report_id,
                            logical,
                            physical,
                            application,
                            collection: collection_counts,
                            flags: item.value,
                            usage_page: globals.usage_page,
                            usage: locals.usage_for_index(i),
                            alternatives: None,
                            logical_min: globals.logical_min,
                            logical_max: globals.logical_max,
                            bit_size: globals.report_size,
                            count: 1,
                            start_bit: start_bit + i * globals.report_size,
                        });
                    }
                }
                locals = LocalState::default();
            }
        }
    }

    Ok(result)
}

fn current_of_kind(stack: &[CollectionEntry], kind: i64) -> Option<u32> {
    stack.iter().rev().find(|c| c.kind == kind).map(|c| c.usage)
}
