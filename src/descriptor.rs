//! 4.G Descriptor Facade: the entry points tying the Item Codec,
//! Evaluator, and Report Model together into one descriptor value.

use std::fmt::Write as _;

use log::debug;

use crate::error::{ParseError, Result, ShapeError};
use crate::evaluator::evaluate;
use crate::item::Item;
use crate::report::{find_report, get_report, group_into_reports, Frame, Report};
use crate::text::parse_descriptor_text;

/// Rendering style for `dump` (spec §4.G / §6 "Dump styles").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpStyle {
    /// One bracketed array literal, `[ 0x05, 0x01, 0x09, 0x02, ... ]`.
    Array,
    /// One `item, size //  Human Description` line per item, kernel-log style.
    Kernel,
}

/// A fully parsed and evaluated report descriptor.
#[derive(Debug, Clone)]
pub struct ReportDescriptor {
    items: Vec<Item>,
    reports_input: Vec<Report>,
    reports_output: Vec<Report>,
    reports_feature: Vec<Report>,
    win8: bool,
}

impl ReportDescriptor {
    /// Parse a raw descriptor byte stream (spec §4.G "from_bytes").
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let items = Item::decode_stream(data)?;
        debug!("parsed {} items from {} bytes", items.len(), data.len());
        Self::from_items(items)
    }

    /// Parse the "hex-string with length prefix" capture form (spec §6):
    /// `N B0 B1 … B(N-1)`, all tokens hex, `N` discarded.
    pub fn from_hex_capture(text: &str) -> Result<Self> {
        let mut tokens = text.split_whitespace();
        tokens.next(); // length prefix, discarded per spec §6
        let bytes: std::result::Result<Vec<u8>, _> = tokens
            .map(|tok| u8::from_str_radix(tok.trim_start_matches("0x"), 16))
            .collect();
        let bytes = bytes.map_err(|_| ParseError::MalformedLine {
            line_no: 0,
            line: text.to_string(),
        })?;
        Self::from_bytes(&bytes)
    }

    /// Parse the human-readable text dump (spec §4.G "from_text").
    pub fn from_text(text: &str) -> Result<Self> {
        let items = parse_descriptor_text(text)?;
        Self::from_items(items)
    }

    fn from_items(items: Vec<Item>) -> Result<Self> {
        let eval = evaluate(&items)?;

        let mut input = Vec::new();
        let mut output = Vec::new();
        let mut feature = Vec::new();
        for field in eval.fields {
            match field.kind {
                crate::field::MainKind::Input => input.push(field),
                crate::field::MainKind::Output => output.push(field),
                crate::field::MainKind::Feature => feature.push(field),
            }
        }

        Ok(ReportDescriptor {
            items,
            reports_input: group_into_reports(input),
            reports_output: group_into_reports(output),
            reports_feature: group_into_reports(feature),
            win8: eval.win8,
        })
    }

    /// Re-encode the parsed items to their wire byte form (spec §4.G
    /// "to_bytes", the byte round-trip invariant).
    pub fn to_bytes(&self) -> Vec<u8> {
        self.items.iter().flat_map(|i| i.to_bytes()).collect()
    }

    /// Whether this descriptor declares the Microsoft Windows 8
    /// certification vendor usage.
    pub fn is_win8(&self) -> bool {
        self.win8
    }

    pub fn input_reports(&self) -> &[Report] {
        &self.reports_input
    }

    pub fn output_reports(&self) -> &[Report] {
        &self.reports_output
    }

    pub fn feature_reports(&self) -> &[Report] {
        &self.reports_feature
    }

    /// The Input Report whose size is >= `min_bit_size`, preferring an
    /// exact `report_id` match and falling back to the unnumbered report
    /// (spec §4.G "get(report_id, min_bit_size)").
    pub fn get(&self, report_id: i32, min_bit_size: usize) -> Option<&Report> {
        get_report(&self.reports_input, report_id, min_bit_size)
    }

    /// Look up the input Report by its exact `report_id`.
    pub fn report_by_id(&self, report_id: i32) -> Result<&Report> {
        find_report(&self.reports_input, report_id).map_err(Into::into)
    }

    /// Find the input Report whose owning Application collection carries
    /// `application` as its usage (spec §7 ShapeError::NoSuchApplication).
    pub fn report_for_application(&self, application: u32) -> Result<&Report> {
        self.reports_input
            .iter()
            .find(|r| r.fields.iter().any(|f| f.application == Some(application)))
            .ok_or_else(|| ShapeError::NoSuchApplication { application }.into())
    }

    /// Decode a captured input report buffer into human-readable text
    /// (spec §4.G "decode_report" / §4.E). The report is selected by the
    /// buffer's leading report-ID byte, falling back to the unnumbered
    /// report; returns `None` when neither is known (spec §7: "decode of
    /// a report for an unknown report_id returns null").
    pub fn decode_report(&self, buffer: &[u8]) -> Option<String> {
        if buffer.is_empty() {
            return None;
        }
        let report = self.get(buffer[0] as i32, buffer.len() * 8)?;
        Some(report.decode(buffer, true))
    }

    /// Synthesize an Input Report's bytes from symbolic field assignments
    /// (spec §4.G "format_report"). Selects the target report by
    /// `application` usage when given, else by `report_id` (defaulting to
    /// the unnumbered report).
    pub fn format_report(
        &self,
        data: &[Frame],
        global: Option<&Frame>,
        report_id: Option<i32>,
        application: Option<u32>,
    ) -> Result<Vec<u8>> {
        let report = match application {
            Some(app) => self.report_for_application(app)?,
            None => self.report_by_id(report_id.unwrap_or(-1))?,
        };
        Ok(report.synthesize(data, global))
    }

    /// Dump every item as human-readable text (spec §4.G "dump").
    pub fn dump(&self, style: DumpStyle) -> String {
        match style {
            DumpStyle::Array => self.dump_array(),
            DumpStyle::Kernel => self.dump_kernel(),
        }
    }

    /// The plain indented pretty-printed form (spec §4.F/§6 "Textual
    /// descriptor format... as produced by the pretty-printer"), the exact
    /// inverse of [`Self::from_text`] and the byte round-trip invariant 2's
    /// `T` (spec §8). Unlike [`Self::dump`]'s array/kernel styles, this
    /// carries no byte list or comment markers, just one `<Name> (<arg>)`
    /// line per item, indented by Collection nesting.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let mut indent = 0i32;
        for item in &self.items {
            let (text, new_indent) = item.human_descr(indent);
            writeln!(out, "{text}").unwrap();
            indent = new_indent;
        }
        out
    }

    /// `0xHH, 0xHH, … // <descr> <offset>` one item per line (spec §6).
    fn dump_array(&self) -> String {
        let mut out = String::new();
        let mut indent = 0i32;
        for item in &self.items {
            let (text, new_indent) = item.human_descr(indent);
            writeln!(out, "{}, // {text} {}", byte_list(&item.to_bytes()), item.offset).unwrap();
            indent = new_indent;
        }
        out
    }

    /// `\t0xHH, 0xHH, … /* <descr> */` one item per line (spec §6), suitable
    /// for embedding as a C array body.
    fn dump_kernel(&self) -> String {
        let mut out = String::new();
        let mut indent = 0i32;
        for item in &self.items {
            let (text, new_indent) = item.human_descr(indent);
            writeln!(out, "\t{}, /* {text} */", byte_list(&item.to_bytes())).unwrap();
            indent = new_indent;
        }
        out
    }
}

/// Render `bytes` as a comma-separated `0xHH` list (spec §6 dump styles).
fn byte_list(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write!(out, "0x{b:02x}").unwrap();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mouse_bytes() -> Vec<u8> {
        vec![
            0x05, 0x01, 0x09, 0x02, 0xA1, 0x01, 0x09, 0x01, 0xA1, 0x00, 0x05, 0x09, 0x19, 0x01,
            0x29, 0x03, 0x15, 0x00, 0x25, 0x01, 0x95, 0x03, 0x75, 0x01, 0x81, 0x02, 0x95, 0x01,
            0x75, 0x05, 0x81, 0x03, 0x05, 0x01, 0x09, 0x30, 0x09, 0x31, 0x15, 0x81, 0x25, 0x7F,
            0x75, 0x08, 0x95, 0x02, 0x81, 0x06, 0xC0, 0xC0,
        ]
    }

    #[test]
    fn byte_round_trip_is_exact() {
        let bytes = mouse_bytes();
        let rdesc = ReportDescriptor::from_bytes(&bytes).unwrap();
        assert_eq!(rdesc.to_bytes(), bytes);
    }

    #[test]
    fn dump_array_style_is_one_item_per_line_with_trailing_comment() {
        let rdesc = ReportDescriptor::from_bytes(&mouse_bytes()).unwrap();
        let dump = rdesc.dump(DumpStyle::Array);
        assert!(dump.starts_with("0x05, 0x01, // Usage Page (Generic Desktop) 0"));
    }

    #[test]
    fn dump_kernel_style_is_tab_indented_c_array_body() {
        let rdesc = ReportDescriptor::from_bytes(&mouse_bytes()).unwrap();
        let dump = rdesc.dump(DumpStyle::Kernel);
        assert!(dump.starts_with("\t0x05, 0x01, /* Usage Page (Generic Desktop) */"));
    }

    #[test]
    fn from_hex_capture_discards_the_length_prefix() {
        let text = "52 0x05 0x01 0x09 0x02 0xA1 0x01 0x09 0x01 0xA1 0x00 0x05 0x09 0x19 0x01 \
                    0x29 0x03 0x15 0x00 0x25 0x01 0x95 0x03 0x75 0x01 0x81 0x02 0x95 0x01 \
                    0x75 0x05 0x81 0x03 0x05 0x01 0x09 0x30 0x09 0x31 0x15 0x81 0x25 0x7F \
                    0x75 0x08 0x95 0x02 0x81 0x06 0xC0 0xC0";
        let rdesc = ReportDescriptor::from_hex_capture(text).unwrap();
        assert_eq!(rdesc.to_bytes(), mouse_bytes());
    }

    #[test]
    fn decode_report_reads_synthesized_buttons() {
        let rdesc = ReportDescriptor::from_bytes(&mouse_bytes()).unwrap();
        let report = rdesc.report_by_id(-1).unwrap();
        let mut buf = report.new_buffer();
        report.set(&mut buf, 0x0009_0002, 0, 1).unwrap();
        let text = rdesc.decode_report(&buf).unwrap();
        assert!(text.contains("B2: 1"));
    }

    #[test]
    fn format_report_synthesizes_bytes_from_symbolic_frames() {
        // S5: format_report([{b1:1,b2:0,b3:0,x:10,y:-5}], report_id=-1).
        let rdesc = ReportDescriptor::from_bytes(&mouse_bytes()).unwrap();
        let mut frame = Frame::new();
        frame.insert("b1".to_string(), 1);
        frame.insert("x".to_string(), 10);
        frame.insert("y".to_string(), -5);
        let bytes = rdesc.format_report(&[frame], None, Some(-1), None).unwrap();
        assert_eq!(bytes, vec![0x01, 0x0A, 0xFB]);
    }

    #[test]
    fn text_round_trip_is_stable() {
        // Invariant 2: dump(from_text(T)) == T modulo whitespace within
        // `()`-args, for T produced by the pretty-printer itself.
        let rdesc = ReportDescriptor::from_bytes(&mouse_bytes()).unwrap();
        let text = rdesc.to_text();
        let reparsed = ReportDescriptor::from_text(&text).unwrap();
        assert_eq!(reparsed.to_text(), text);
        assert_eq!(reparsed.to_bytes(), mouse_bytes());
    }

    #[test]
    fn get_falls_back_to_unnumbered_report() {
        let rdesc = ReportDescriptor::from_bytes(&mouse_bytes()).unwrap();
        assert!(rdesc.get(7, 1).is_some());
        assert!(rdesc.report_by_id(7).is_err());
    }
}
