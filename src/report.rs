//! 4.E Report Model: per-report-ID field grouping, decode/render/synthesize.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{RangeError, ShapeError};
use crate::field::Field;
use crate::usage_table::usages;

/// A synthesis input frame: lowercased, space-stripped usage name -> value
/// (spec §4.E "synthesize" / §9 "attribute-lookup report synthesis").
pub type Frame = HashMap<String, i64>;

/// All fields sharing one Report ID (or the unnumbered report, id -1).
#[derive(Debug, Clone)]
pub struct Report {
    pub report_id: i32,
    pub fields: Vec<Field>,
}

impl Report {
    /// Total bit width of one instance of this report, including its
    /// leading Report ID byte when numbered.
    pub fn bitsize(&self) -> usize {
        let id_bits = if self.report_id >= 0 { 8 } else { 0 };
        let field_bits: usize = self.fields.iter().map(|f| f.bit_size * f.count).sum();
        id_bits + field_bits
    }

    /// Byte length of one instance of this report, rounded up.
    pub fn size(&self) -> usize {
        (self.bitsize() + 7) / 8
    }

    pub fn has_been_populated(&self, buffer: &[u8]) -> bool {
        buffer.len() >= self.size()
    }

    /// Build the wire-format buffer for this report, writing the Report ID
    /// byte (if numbered) and zero-filling the rest.
    pub fn new_buffer(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.size()];
        if self.report_id >= 0 {
            buf[0] = self.report_id as u8;
        }
        buf
    }

    /// Set the value of the field whose usage is `usage` at repetition
    /// `index`, by-usage convenience wrapper around `Field::write`.
    pub fn set(&self, buffer: &mut [u8], usage: u32, index: usize, value: i64) -> Result<(), RangeError> {
        for field in &self.fields {
            if field.usage == usage && !field.is_constant() {
                return field.write(buffer, value, index);
            }
        }
        Ok(())
    }

    /// Render this report's current contents as the multi-line text format
    /// (spec §4.E "format report (decode payload -> text)"). Consecutive
    /// fields of the same type/usage collapse onto one comma-joined line;
    /// a logical-collection boundary starts a new line when `split_lines`
    /// and repeats a usage already seen in the prior collection (spec §8
    /// S6, the X/Y -> CX/CY multi-touch disambiguation).
    pub fn decode(&self, buffer: &[u8], split_lines: bool) -> String {
        let mut out = String::new();
        let mut sep = "";
        if self.report_id >= 0 {
            out.push_str(&format!("ReportID: {} ", self.report_id));
            sep = "/";
        }

        let mut seen_this_collection: HashSet<String> = HashSet::new();
        let mut seen_globally: HashSet<String> = HashSet::new();
        let mut prev_collection: Option<(u32, u32, u32)> = None;
        let mut prev: Option<&Field> = None;

        for field in &self.fields {
            if field.is_constant() {
                out.push_str(&format!("{sep} # "));
                sep = "|";
                prev = None;
                continue;
            }

            if field.is_array() {
                let page_name = usage_page_display_name(field.usage_page);
                let values: Vec<String> = (0..field.count)
                    .map(|i| field.read(buffer, i))
                    .map(|v| render_array_value(field, v))
                    .collect();
                out.push_str(&format!("{sep}{page_name} [{}] ", values.join(", ")));
                sep = "|";
                prev = Some(field);
                continue;
            }

            if let Some(pc) = prev_collection {
                if pc != field.collection {
                    seen_this_collection.clear();
                    if split_lines {
                        out.push('\n');
                    }
                }
            }
            prev_collection = Some(field.collection);

            let raw_name = usage_display_name(field.usage_page, field.usage);
            let name = fix_xy_usage_for_mt_devices(&raw_name, &seen_this_collection, &seen_globally);
            seen_this_collection.insert(name.clone());
            seen_globally.insert(name.clone());

            let value_str = match field.read(buffer, 0) {
                Some(v) => format!("{:>width$}", v, width = decimal_width(field.bit_size)),
                None => "<.>".to_string(),
            };

            let repeats_prev = matches!(prev, Some(p) if !p.is_constant() && !p.is_array() && p.usage == field.usage);
            if repeats_prev {
                out.push_str(&format!(", {value_str} "));
            } else {
                out.push_str(&format!("{sep} {name}: {value_str} "));
            }
            sep = "|";
            prev = Some(field);
        }
        out
    }

    /// Synthesize a report buffer from symbolic field assignments (spec
    /// §4.E "synthesize report"). `frames` supplies one dictionary per
    /// logical-collection instance (e.g. one per multi-touch contact);
    /// `global` supplies fallback values consulted when the current frame
    /// lacks an attribute. Crossing a logical-collection boundary pops the
    /// head frame (once more than one remains) and resets the per-collection
    /// seen set, so each contact consumes its own frame in turn.
    pub fn synthesize(&self, frames: &[Frame], global: Option<&Frame>) -> Vec<u8> {
        let mut buffer = self.new_buffer();
        let mut frames: VecDeque<&Frame> = frames.iter().collect();
        let mut seen_this_collection: HashSet<String> = HashSet::new();
        let mut seen_globally: HashSet<String> = HashSet::new();
        let mut prev_collection: Option<(u32, u32, u32)> = None;

        for field in &self.fields {
            if field.is_constant() {
                continue;
            }

            if let Some(pc) = prev_collection {
                if pc != field.collection {
                    if frames.len() > 1 {
                        frames.pop_front();
                    }
                    seen_this_collection.clear();
                }
            }
            prev_collection = Some(field.collection);

            let raw_name = usage_display_name(field.usage_page, field.usage);
            let name = fix_xy_usage_for_mt_devices(&raw_name, &seen_this_collection, &seen_globally);
            seen_this_collection.insert(name.clone());
            seen_globally.insert(name.clone());
            let label = frame_label(&name);

            let value = frames
                .front()
                .and_then(|f| f.get(&label))
                .or_else(|| global.and_then(|g| g.get(&label)))
                .copied()
                .unwrap_or(0);

            for i in 0..field.count {
                let _ = field.write(&mut buffer, value, i);
            }
        }
        buffer
    }
}

/// Lowercase, space-stripped frame key for a display usage name (spec
/// §4.E: "keys are the lowercased, space-stripped usage names").
fn frame_label(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase()
}

/// Multi-touch X/Y contact rewrite (spec §8 S6 / §9 `_fix_xy_usage_for_mt_devices`,
/// an Open Question per spec §9 — resolved here, see DESIGN.md): the first
/// occurrence of "X"/"Y" within a logical-collection instance keeps its
/// plain name; a later collection instance that repeats a name already
/// used by an *earlier* collection is renamed `CX`/`CY` so per-contact
/// fields don't collide with the device's primary pointer X/Y.
fn fix_xy_usage_for_mt_devices(name: &str, seen_this_collection: &HashSet<String>, seen_globally: &HashSet<String>) -> String {
    if seen_globally.contains(name) && !seen_this_collection.contains(name) {
        match name {
            "X" => return "CX".to_string(),
            "Y" => return "CY".to_string(),
            _ => {}
        }
    }
    name.to_string()
}

fn decimal_width(bit_size: usize) -> usize {
    if bit_size <= 1 {
        return 1;
    }
    let max = 1u64 << bit_size.min(63);
    max.to_string().len() + 1
}

fn render_array_value(field: &Field, value: Option<i64>) -> String {
    let Some(v) = value else {
        return "<.>".to_string();
    };
    let page_name = usage_page_display_name(field.usage_page);
    let is_vendor = page_name.to_lowercase().contains("vendor");
    if !is_vendor && v >= field.logical_min && v <= field.logical_max {
        if let Some(alts) = &field.alternatives {
            if let Some(usage) = alts.get((v - field.logical_min) as usize) {
                return usage_display_name(field.usage_page, usage);
            }
        }
    }
    format!("{v:02x}")
}

fn usage_page_display_name(usage_page: u32) -> String {
    let page_id = (usage_page >> 16) as u16;
    match usages().page_by_id(page_id) {
        Some(page) => page.page_name.clone(),
        None => format!("Vendor Usage Page 0x{page_id:02x}"),
    }
}

fn usage_display_name(usage_page: u32, usage: u32) -> String {
    let page_id = (usage_page >> 16) as u16;
    let local = (usage & 0xffff) as u16;
    if let Some(page) = usages().page_by_id(page_id) {
        if page.page_name == "Button" {
            return format!("B{local}");
        }
        if let Some(name) = page.name_of(local) {
            return name.to_string();
        }
    }
    format!("Usage 0x{usage:08x}")
}

/// Group a flat field list into per-Report-ID Reports (spec §4.E
/// "getHidFields" / per-report grouping).
pub fn group_into_reports(fields: Vec<Field>) -> Vec<Report> {
    let mut by_id: Vec<(i32, Vec<Field>)> = Vec::new();
    for field in fields {
        match by_id.iter_mut().find(|(id, _)| *id == field.report_id) {
            Some((_, v)) => v.push(field),
            None => by_id.push((field.report_id, vec![field])),
        }
    }
    by_id
        .into_iter()
        .map(|(report_id, fields)| Report { report_id, fields })
        .collect()
}

/// Find the Report with the given `report_id`, erroring if absent (spec
/// §7 ShapeError::NoSuchReport).
pub fn find_report(reports: &[Report], report_id: i32) -> Result<&Report, ShapeError> {
    reports
        .iter()
        .find(|r| r.report_id == report_id)
        .ok_or(ShapeError::NoSuchReport { report_id })
}

/// Resolve the Input Report for `report_id`, falling back to the
/// unnumbered report (spec §4.G "get(report_id, min_bit_size)").
pub fn get_report<'a>(reports: &'a [Report], report_id: i32, min_bit_size: usize) -> Option<&'a Report> {
    let exact = reports.iter().find(|r| r.report_id == report_id);
    let candidate = exact.or_else(|| reports.iter().find(|r| r.report_id == -1))?;
    (candidate.bitsize() >= min_bit_size).then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Alternatives, MainKind};

    fn button_field(usage: u32, start_bit: usize) -> Field {
        Field {
            kind: MainKind::Input,
            report_id: -1,
            logical: None,
            physical: None,
            application: None,
            collection: (0, 0, 0),
            flags: 0b10,
            usage_page: 0x0009 << 16,
            usage,
            alternatives: None,
            logical_min: 0,
            logical_max: 1,
            bit_size: 1,
            count: 1,
            start_bit,
        }
    }

    #[test]
    fn unnumbered_report_has_no_id_byte() {
        let report = Report {
            report_id: -1,
            fields: vec![button_field(0x0009_0001, 0), button_field(0x0009_0002, 1)],
        };
        assert_eq!(report.bitsize(), 2);
        assert_eq!(report.size(), 1);
        assert_eq!(report.new_buffer(), vec![0u8]);
    }

    #[test]
    fn numbered_report_reserves_leading_id_byte() {
        let report = Report {
            report_id: 5,
            fields: vec![Field {
                start_bit: 8,
                ..button_field(0x0009_0001, 8)
            }],
        };
        assert_eq!(report.new_buffer(), vec![5u8, 0u8]);
    }

    #[test]
    fn set_writes_named_field_and_decode_reads_it_back() {
        let report = Report {
            report_id: -1,
            fields: vec![button_field(0x0009_0001, 0), button_field(0x0009_0002, 1)],
        };
        let mut buf = report.new_buffer();
        report.set(&mut buf, 0x0009_0002, 0, 1).unwrap();
        let text = report.decode(&buf, true);
        assert!(text.contains("B2: 1"));
        assert!(text.contains("B1: 0"));
    }

    fn xy_field(usage_page: u32, usage: u32, collection: (u32, u32, u32), start_bit: usize) -> Field {
        Field {
            usage_page,
            usage,
            collection,
            logical_min: -127,
            logical_max: 127,
            bit_size: 8,
            ..button_field(usage, start_bit)
        }
    }

    #[test]
    fn decode_rewrites_second_contacts_xy_as_cxcy() {
        // Two Finger logical collections, each with an X/Y pair: S6.
        const GD: u32 = 0x01 << 16;
        let fields = vec![
            xy_field(GD, GD | 0x30, (0, 0, 1), 0),
            xy_field(GD, GD | 0x31, (0, 0, 1), 8),
            xy_field(GD, GD | 0x30, (0, 0, 2), 16),
            xy_field(GD, GD | 0x31, (0, 0, 2), 24),
        ];
        let report = Report { report_id: -1, fields };
        let mut buf = report.new_buffer();
        buf.resize(4, 0);
        let text = report.decode(&buf, true);
        assert!(text.contains(" X: "));
        assert!(text.contains(" Y: "));
        assert!(text.contains(" CX: "));
        assert!(text.contains(" CY: "));
    }

    #[test]
    fn synthesize_writes_values_from_matching_frame_and_global() {
        const GD: u32 = 0x01 << 16;
        let fields = vec![xy_field(GD, GD | 0x30, (0, 0, 0), 0), xy_field(GD, GD | 0x31, (0, 0, 0), 8)];
        let report = Report { report_id: -1, fields };

        let mut frame = Frame::new();
        frame.insert("x".to_string(), 10);
        let mut global = Frame::new();
        global.insert("y".to_string(), -5);

        let buf = report.synthesize(&[frame], Some(&global));
        assert_eq!(buf, vec![0x0A, 0xFB]);
    }

    #[test]
    fn synthesize_pops_frame_per_contact_collection() {
        const GD: u32 = 0x01 << 16;
        let fields = vec![
            xy_field(GD, GD | 0x30, (0, 0, 1), 0),
            xy_field(GD, GD | 0x31, (0, 0, 1), 8),
            xy_field(GD, GD | 0x30, (0, 0, 2), 16),
            xy_field(GD, GD | 0x31, (0, 0, 2), 24),
        ];
        let report = Report { report_id: -1, fields };

        let mut f1 = Frame::new();
        f1.insert("x".to_string(), 1);
        f1.insert("y".to_string(), 2);
        let mut f2 = Frame::new();
        f2.insert("cx".to_string(), 3);
        f2.insert("cy".to_string(), 4);

        let buf = report.synthesize(&[f1, f2], None);
        assert_eq!(buf, vec![1, 2, 3, 4]);
    }

    #[test]
    fn alternatives_range_reports_length() {
        let alts = Alternatives::Range(1, 3);
        assert_eq!(alts.len(), 3);
        assert_eq!(alts.get(2), Some(3));
        assert_eq!(alts.get(3), None);
    }

    #[test]
    fn find_report_errors_for_unknown_id() {
        let reports = group_into_reports(vec![button_field(0x0009_0001, 0)]);
        let err = find_report(&reports, 7).unwrap_err();
        assert_eq!(err, ShapeError::NoSuchReport { report_id: 7 });
    }

    #[test]
    fn get_report_falls_back_to_unnumbered() {
        let reports = group_into_reports(vec![button_field(0x0009_0001, 0)]);
        let found = get_report(&reports, 5, 1).unwrap();
        assert_eq!(found.report_id, -1);
        assert!(get_report(&reports, 5, 999).is_none());
    }
}
