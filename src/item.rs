//! 4.B Item Codec: encode/decode one descriptor item to/from bytes, and
//! pretty-print a single item.

use num_enum::TryFromPrimitive;

use crate::error::ParseError;
use crate::units;
use crate::usage_table::{usages, SENSOR_MODIFIERS};

/// The 28 recognized item tags (upper 6 bits of the header byte, spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum Tag {
    // Main
    Input = 0x80,
    Output = 0x90,
    Collection = 0xA0,
    Feature = 0xB0,
    EndCollection = 0xC0,

    // Global
    UsagePage = 0x04,
    LogicalMinimum = 0x14,
    LogicalMaximum = 0x24,
    PhysicalMinimum = 0x34,
    PhysicalMaximum = 0x44,
    UnitExponent = 0x54,
    Unit = 0x64,
    ReportSize = 0x74,
    ReportId = 0x84,
    ReportCount = 0x94,
    Push = 0xA4,
    Pop = 0xB4,

    // Local
    Usage = 0x08,
    UsageMinimum = 0x18,
    UsageMaximum = 0x28,
    DesignatorIndex = 0x38,
    DesignatorMinimum = 0x48,
    DesignatorMaximum = 0x58,
    StringIndex = 0x78,
    StringMinimum = 0x88,
    StringMaximum = 0x98,
    Delimiter = 0xA8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemClass {
    Main,
    Global,
    Local,
}

impl Tag {
    pub fn class(self) -> ItemClass {
        use Tag::*;
        match self {
            Input | Output | Collection | Feature | EndCollection => ItemClass::Main,
            UsagePage | LogicalMinimum | LogicalMaximum | PhysicalMinimum | PhysicalMaximum
            | UnitExponent | Unit | ReportSize | ReportId | ReportCount | Push | Pop => {
                ItemClass::Global
            }
            Usage | UsageMinimum | UsageMaximum | DesignatorIndex | DesignatorMinimum
            | DesignatorMaximum | StringIndex | StringMinimum | StringMaximum | Delimiter => {
                ItemClass::Local
            }
        }
    }

    pub fn name(self) -> &'static str {
        use Tag::*;
        match self {
            Input => "Input",
            Output => "Output",
            Collection => "Collection",
            Feature => "Feature",
            EndCollection => "End Collection",
            UsagePage => "Usage Page",
            LogicalMinimum => "Logical Minimum",
            LogicalMaximum => "Logical Maximum",
            PhysicalMinimum => "Physical Minimum",
            PhysicalMaximum => "Physical Maximum",
            UnitExponent => "Unit Exponent",
            Unit => "Unit",
            ReportSize => "Report Size",
            ReportId => "Report ID",
            ReportCount => "Report Count",
            Push => "Push",
            Pop => "Pop",
            Usage => "Usage",
            UsageMinimum => "Usage Minimum",
            UsageMaximum => "Usage Maximum",
            DesignatorIndex => "Designator Index",
            DesignatorMinimum => "Designator Minimum",
            DesignatorMaximum => "Designator Maximum",
            StringIndex => "String Index",
            StringMinimum => "String Minimum",
            StringMaximum => "String Maximum",
            Delimiter => "Delimiter",
        }
    }

    pub fn from_name(name: &str) -> Option<Tag> {
        use Tag::*;
        Some(match name {
            "Input" => Input,
            "Output" => Output,
            "Collection" => Collection,
            "Feature" => Feature,
            "End Collection" => EndCollection,
            "Usage Page" => UsagePage,
            "Logical Minimum" => LogicalMinimum,
            "Logical Maximum" => LogicalMaximum,
            "Physical Minimum" => PhysicalMinimum,
            "Physical Maximum" => PhysicalMaximum,
            "Unit Exponent" => UnitExponent,
            "Unit" => Unit,
            "Report Size" => ReportSize,
            "Report ID" => ReportId,
            "Report Count" => ReportCount,
            "Push" => Push,
            "Pop" => Pop,
            "Usage" => Usage,
            "Usage Minimum" => UsageMinimum,
            "Usage Maximum" => UsageMaximum,
            "Designator Index" => DesignatorIndex,
            "Designator Minimum" => DesignatorMinimum,
            "Designator Maximum" => DesignatorMaximum,
            "String Index" => StringIndex,
            "String Minimum" => StringMinimum,
            "String Maximum" => StringMaximum,
            "Delimiter" => Delimiter,
            _ => return None,
        })
    }
}

/// One item in the report descriptor byte stream (spec §3 "Item").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub tag: Tag,
    /// Decoded value: two's-complement-sign-extended for Logical/Physical
    /// Minimum and for Unit Exponent (nibble-wise), unsigned otherwise.
    pub value: i64,
    /// The raw little-endian payload bytes, length in {0,1,2,4}.
    pub raw_payload: Vec<u8>,
    /// Byte offset of this item within the owning descriptor.
    pub offset: usize,
    /// The Usage Page in effect (`page << 16`) when this item was parsed,
    /// used only for pretty-printing Usage items; 0 if never set.
    pub usage_page: u32,
}

fn payload_len_for_size_code(size_code: u8) -> usize {
    match size_code {
        0 => 0,
        1 => 1,
        2 => 2,
        3 => 4,
        _ => unreachable!("size_code is masked to 2 bits"),
    }
}

impl Item {
    fn decode_raw_value(tag: Tag, raw_value: u32, payload_len: usize) -> i64 {
        match tag {
            Tag::LogicalMinimum | Tag::PhysicalMinimum => {
                units::twos_comp(raw_value as i64, (payload_len as u32) * 8)
            }
            Tag::UnitExponent => {
                let v = raw_value as i64;
                if v > 7 {
                    v - 16
                } else {
                    v
                }
            }
            _ => raw_value as i64,
        }
    }

    /// Decode a single item from the front of `bytes`. Returns `None` when
    /// `bytes` is the tolerated trailing `0x00` terminator.
    fn one_from_bytes(bytes: &[u8], offset: usize) -> Result<Option<Item>, ParseError> {
        let header = bytes[0];
        if header == 0 && bytes.len() == 1 {
            return Ok(None);
        }
        let size_code = header & 0x03;
        let payload_len = payload_len_for_size_code(size_code);
        let tag_byte = header & 0xFC;
        if tag_byte == 0 {
            return Err(ParseError::NonFinalTerminator { offset });
        }
        let tag = Tag::try_from_primitive(tag_byte)
            .map_err(|_| ParseError::UnknownTag { byte: header, offset })?;

        if bytes.len() < 1 + payload_len {
            return Err(ParseError::TruncatedPayload {
                offset,
                expected: payload_len,
                available: bytes.len().saturating_sub(1),
            });
        }
        let raw_payload = bytes[1..1 + payload_len].to_vec();
        let mut raw_value: u32 = 0;
        for (i, &b) in raw_payload.iter().enumerate() {
            raw_value |= (b as u32) << (8 * i);
        }
        let value = Self::decode_raw_value(tag, raw_value, payload_len);

        Ok(Some(Item {
            tag,
            value,
            raw_payload,
            offset,
            usage_page: 0,
        }))
    }

    /// Parse a full descriptor byte stream into items (spec §4.B). Every
    /// item is stamped with the Usage Page in effect at the time it was
    /// parsed (`hid.py`'s `_parse_item`: `rdesc_item.usage_page =
    /// self.glob.usage_page`, set unconditionally on every item, not just
    /// `Usage`), so `human_descr` can resolve `Usage` names later.
    pub fn decode_stream(data: &[u8]) -> Result<Vec<Item>, ParseError> {
        let mut items = Vec::new();
        let mut idx = 0;
        let mut usage_page: u32 = 0;
        while idx < data.len() {
            match Self::one_from_bytes(&data[idx..], idx)? {
                Some(mut item) => {
                    item.offset = idx;
                    if item.tag == Tag::UsagePage {
                        usage_page = (item.value as u32) << 16;
                    }
                    item.usage_page = usage_page;
                    idx += 1 + item.raw_payload.len();
                    items.push(item);
                }
                None => break,
            }
        }
        Ok(items)
    }

    /// The encoded size of this item in bytes, header included.
    pub fn size(&self) -> usize {
        1 + self.raw_payload.len()
    }

    /// Re-encode this item to bytes (spec §4.B "Wire format (encode)").
    pub fn to_bytes(&self) -> Vec<u8> {
        let size_code = if self.raw_payload.len() == 4 {
            3
        } else {
            self.raw_payload.len() as u8
        };
        let mut out = Vec::with_capacity(1 + self.raw_payload.len());
        out.push((self.tag as u8) | size_code);
        out.extend_from_slice(&self.raw_payload);
        out
    }

    /// Construct an item from a decoded `value`, choosing the minimal
    /// payload width (spec §4.F "payload width is chosen minimally").
    pub fn from_value(tag: Tag, value: i64, usage_page: u32) -> Item {
        let (encoded, width) = Self::encode_value(tag, value);
        let mut raw_payload = Vec::with_capacity(width);
        let mut v = encoded;
        for _ in 0..width {
            raw_payload.push((v & 0xff) as u8);
            v >>= 8;
        }
        Item {
            tag,
            value,
            raw_payload,
            offset: 0,
            usage_page,
        }
    }

    fn encode_value(tag: Tag, value: i64) -> (i64, usize) {
        if matches!(tag, Tag::UnitExponent) {
            let mut v = value;
            if v < 0 {
                v += 16;
            }
            // width is derived from the (possibly remapped) magnitude below
            let width = width_for_magnitude(v);
            return (units::to_twos_comp(v, (width as u32) * 8), width);
        }
        let width = width_for_magnitude(value);
        (units::to_twos_comp(value, (width as u32) * 8), width)
    }

    /// A human-readable rendering of this item (spec §4.B "Pretty-print").
    /// `indent` is the current nesting level; returns `(text, new_indent)`.
    pub fn human_descr(&self, indent: i32) -> (String, i32) {
        let mut indent = indent;
        let name = self.tag.name();
        let value = self.value;
        let up = self.usage_page;

        let descr = match self.tag {
            Tag::ReportId
            | Tag::UsageMinimum
            | Tag::UsageMaximum
            | Tag::LogicalMinimum
            | Tag::PhysicalMinimum
            | Tag::LogicalMaximum
            | Tag::PhysicalMaximum
            | Tag::ReportSize
            | Tag::ReportCount
            | Tag::UnitExponent => format!("{name} ({value})"),

            Tag::Collection => {
                indent += 1;
                format!("{name} ({})", collection_name(value))
            }
            Tag::EndCollection => {
                indent -= 1;
                name.to_string()
            }
            Tag::UsagePage => match usages().page_by_id(value as u16) {
                Some(page) => format!("{name} ({})", page.page_name),
                None => format!("{name} (Vendor Usage Page 0x{value:02x})"),
            },
            Tag::Usage => format!("{name} ({})", usage_descr(up, value as u32)),
            Tag::Input | Tag::Output | Tag::Feature => format!("{name} ({})", flags_descr(value)),
            Tag::Unit => format!("{name} ({})", unit_descr(value)),
            Tag::Push | Tag::Pop => name.to_string(),
            _ => name.to_string(),
        };

        let eff_indent = if matches!(self.tag, Tag::Collection) {
            indent - 1
        } else {
            indent
        };
        (format!("{}{}", " ".repeat(eff_indent.max(0) as usize), descr), indent)
    }
}

fn width_for_magnitude(value: i64) -> usize {
    // The payload is a plain bit pattern: the same byte count must hold
    // `value` whether it is read back as signed (Logical/Physical Minimum)
    // or unsigned (everything else), so fit both ranges at each width.
    if (-128..=255).contains(&value) {
        1
    } else if (-32768..=65535).contains(&value) {
        2
    } else {
        4
    }
}

pub fn collection_name(value: i64) -> String {
    match value {
        0 => "Physical".to_string(),
        1 => "Application".to_string(),
        2 => "Logical".to_string(),
        other => other.to_string(),
    }
}

pub fn collection_value_from_name(name: &str) -> Option<i64> {
    match name {
        "Physical" => Some(0),
        "Application" => Some(1),
        "Logical" => Some(2),
        _ => name.parse().ok(),
    }
}

/// Resolve a 32-bit composite usage to its human name, with Sensor-page
/// modifier decoding (spec §4.B). The `page_id` computation here
/// deliberately reproduces the upstream shift noted as likely incorrect in
/// spec §9 ("appears to shift the usage incorrectly"); see DESIGN.md.
fn usage_descr(usage_page: u32, local_value: u32) -> String {
    let usage = local_value | usage_page;
    let page_id = (usage_page >> 16) as u16;
    if let Some(page) = usages().page_by_id(page_id) {
        if let Some(name) = page.name_of(local_value as u16) {
            return name.to_string();
        }
    }
    let sensor_page = usages().page_from_name("Sensor").map(|p| p.page_id);
    if Some(page_id) == sensor_page {
        let modifier = (usage & 0xF000) >> 8;
        let usage_without_mod = usage & !0xF000u32;
        let mod_descr = SENSOR_MODIFIERS[(modifier >> 4) as usize & 0xf];
        let lookup_page = ((usage_without_mod & 0xFF00) >> 16) as u16;
        if let Some(page) = usages().page_by_id(lookup_page) {
            if let Some(name) = page.name_of((usage_without_mod & 0xFF) as u16) {
                return format!("{name}  | {mod_descr}");
            }
        }
        return format!("Unknown Usage 0x{local_value:02x}");
    }
    format!("Vendor Usage 0x{local_value:02x}")
}

fn flags_descr(value: i64) -> String {
    let mut out = String::new();
    out.push_str(if value & (1 << 0) != 0 { "Cnst," } else { "Data," });
    out.push_str(if value & (1 << 1) != 0 { "Var," } else { "Arr," });
    out.push_str(if value & (1 << 2) != 0 { "Rel" } else { "Abs" });
    if value & (1 << 3) != 0 {
        out.push_str(",Wrap");
    }
    if value & (1 << 4) != 0 {
        out.push_str(",NonLin");
    }
    if value & (1 << 5) != 0 {
        out.push_str(",NoPref");
    }
    if value & (1 << 6) != 0 {
        out.push_str(",Null");
    }
    if value & (1 << 7) != 0 {
        out.push_str(",Vol");
    }
    if value & (1 << 8) != 0 {
        out.push_str(",Buff");
    }
    out
}

fn unit_descr(value: i64) -> String {
    let system = (value & 0xf) as usize;
    let mut out = String::new();
    for i in (1..=units::DIMENSIONS.len()).rev() {
        let nibble = (value >> (i * 4)) & 0xf;
        let v = units::twos_comp(nibble, 4);
        if v != 0 {
            out.push_str(units::DIMENSIONS[i - 1][system]);
            if v != 1 {
                out.push('^');
                out.push_str(&v.to_string());
            }
            out.push(',');
        }
    }
    out.push_str(units::SYSTEMS[system]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_law_holds_for_each_payload_width() {
        for (tag, value) in [
            (Tag::Pop, 0),
            (Tag::ReportSize, 8),
            (Tag::LogicalMaximum, 1023),
            (Tag::UsagePage, 0x0005_0000),
        ] {
            let item = Item::from_value(tag, value, 0);
            let bytes = item.to_bytes();
            let size_code = bytes[0] & 0x03;
            let expected_len = 1 + payload_len_for_size_code(size_code);
            assert_eq!(bytes.len(), expected_len);
        }
    }

    #[test]
    fn logical_minimum_minus_127_round_trips() {
        // S3: Logical Minimum (-127) encodes as `15 81` and decodes back to -127.
        let item = Item::from_value(Tag::LogicalMinimum, -127, 0);
        assert_eq!(item.to_bytes(), vec![0x15, 0x81]);
        let decoded = Item::decode_stream(&[0x15, 0x81]).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].value, -127);
        let (text, _) = decoded[0].human_descr(0);
        assert_eq!(text, "Logical Minimum (-127)");
    }

    #[test]
    fn unit_exponent_negative_nibble_roundtrip() {
        let item = Item::from_value(Tag::UnitExponent, -3, 0);
        let decoded = Item::decode_stream(&item.to_bytes()).unwrap();
        assert_eq!(decoded[0].value, -3);
    }

    #[test]
    fn trailing_zero_terminator_is_tolerated() {
        let items = Item::decode_stream(&[0xC0, 0x00]).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].tag, Tag::EndCollection);
    }

    #[test]
    fn unknown_tag_is_a_parse_error() {
        let err = Item::decode_stream(&[0b0000_0001]).unwrap_err();
        assert!(matches!(err, ParseError::UnknownTag { .. }));
    }

    #[test]
    fn decode_stream_stamps_each_item_with_the_running_usage_page() {
        // Usage Page (Generic Desktop), Usage (Mouse): the Usage item must
        // carry the preceding Usage Page so human_descr can resolve its name.
        let items = Item::decode_stream(&[0x05, 0x01, 0x09, 0x02]).unwrap();
        assert_eq!(items[1].tag, Tag::Usage);
        assert_eq!(items[1].usage_page, 0x0001_0000);
        let (text, _) = items[1].human_descr(0);
        assert_eq!(text, "Usage (Mouse)");
    }

    #[test]
    fn truncated_payload_is_a_parse_error() {
        let err = Item::decode_stream(&[0x15]).unwrap_err();
        assert!(matches!(err, ParseError::TruncatedPayload { .. }));
    }
}
