//! 4.F Text Front-End: parse the human-readable descriptor dump (the
//! inverse of `Item::human_descr`) back into `Item`s.

use crate::error::{LookupError, ParseError, RdescError, Result};
use crate::item::{collection_value_from_name, Item, Tag};
use crate::units;
use crate::usage_table::usages;

/// Parse a full text dump (one item per line, indentation cosmetic) into
/// the Item stream it describes.
pub fn parse_descriptor_text(text: &str) -> Result<Vec<Item>> {
    let mut items = Vec::new();
    let mut usage_page: u32 = 0;

    for (line_no, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let item = parse_line(line, line_no, &mut usage_page)?;
        items.push(item);
    }
    Ok(items)
}

fn parse_line(line: &str, line_no: usize, usage_page: &mut u32) -> Result<Item> {
    let (name, inner) = match line.find('(') {
        Some(open) => {
            let close = line.rfind(')').ok_or_else(|| ParseError::MalformedLine {
                line_no,
                line: line.to_string(),
            })?;
            (line[..open].trim(), Some(line[open + 1..close].trim()))
        }
        None => (line.trim(), None),
    };

    let tag = Tag::from_name(name).ok_or_else(|| ParseError::MalformedLine {
        line_no,
        line: line.to_string(),
    })?;

    let value = parse_value(tag, inner, line_no, &*usage_page)?;

    if tag == Tag::UsagePage {
        *usage_page = (value as u32) << 16;
    }

    // Stamp every item with the running Usage Page, matching the byte
    // decoder (`decode_stream`) and the original's `_parse_item`, which
    // sets `rdesc_item.usage_page` unconditionally rather than only on
    // `Usage` items.
    Ok(Item::from_value(tag, value, *usage_page))
}

fn parse_value(tag: Tag, inner: Option<&str>, line_no: usize, usage_page: &u32) -> Result<i64> {
    let malformed = || ParseError::MalformedLine {
        line_no,
        line: format!("{}({:?})", tag.name(), inner),
    };

    match tag {
        Tag::ReportId
        | Tag::UsageMinimum
        | Tag::UsageMaximum
        | Tag::LogicalMinimum
        | Tag::PhysicalMinimum
        | Tag::LogicalMaximum
        | Tag::PhysicalMaximum
        | Tag::ReportSize
        | Tag::ReportCount
        | Tag::UnitExponent
        | Tag::DesignatorIndex
        | Tag::DesignatorMinimum
        | Tag::DesignatorMaximum
        | Tag::StringIndex
        | Tag::StringMinimum
        | Tag::StringMaximum
        | Tag::Delimiter => inner
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| RdescError::from(malformed())),

        Tag::Collection => {
            let inner = inner.ok_or_else(malformed)?;
            collection_value_from_name(inner)
                .ok_or_else(|| RdescError::from(LookupError::UnknownCollectionKind(inner.to_string())))
        }
        Tag::EndCollection | Tag::Push | Tag::Pop => Ok(0),

        Tag::UsagePage => {
            let inner = inner.ok_or_else(malformed)?;
            if let Some(hex) = inner.strip_prefix("Vendor Usage Page 0x") {
                return u16::from_str_radix(hex, 16)
                    .map(|v| v as i64)
                    .map_err(|_| RdescError::from(malformed()));
            }
            match usages().page_from_name(inner) {
                Some(page) => Ok(page.page_id as i64),
                None => Err(LookupError::UnknownPageName(inner.to_string()).into()),
            }
        }

        Tag::Usage => {
            let inner = inner.ok_or_else(malformed)?;
            if let Some(hex) = inner.strip_prefix("Vendor Usage 0x") {
                return u16::from_str_radix(hex, 16)
                    .map(|v| v as i64)
                    .map_err(|_| RdescError::from(malformed()));
            }
            // The sensor-page "Name  | Modifier" form is render-only
            // (spec §9); only the plain `page.name_of` form round-trips.
            let page_id = (*usage_page >> 16) as u16;
            let page = usages()
                .page_by_id(page_id)
                .ok_or_else(|| LookupError::UnknownPageName(format!("0x{page_id:04x}")))?;
            page.id_from_name(inner)
                .map(|v| v as i64)
                .ok_or_else(|| LookupError::UnknownUsageName(inner.to_string(), page.page_name.clone()).into())
        }

        Tag::Input | Tag::Output | Tag::Feature => {
            let inner = inner.ok_or_else(malformed)?;
            parse_flags(inner).ok_or_else(|| malformed().into())
        }

        Tag::Unit => {
            let inner = inner.ok_or_else(malformed)?;
            parse_unit(inner, line_no).map_err(Into::into)
        }
    }
}

fn parse_flags(inner: &str) -> Option<i64> {
    let mut value: i64 = 0;
    for token in inner.split(',').map(str::trim) {
        match token {
            "Cnst" => value |= 1 << 0,
            "Data" => {}
            "Var" => value |= 1 << 1,
            "Arr" => {}
            "Rel" => value |= 1 << 2,
            "Abs" => {}
            "Wrap" => value |= 1 << 3,
            "NonLin" => value |= 1 << 4,
            "NoPref" => value |= 1 << 5,
            "Null" => value |= 1 << 6,
            "Vol" => value |= 1 << 7,
            "Buff" => value |= 1 << 8,
            _ => return None,
        }
    }
    Some(value)
}

fn parse_unit(inner: &str, line_no: usize) -> std::result::Result<i64, ParseError> {
    let malformed = || ParseError::MalformedUnit {
        line_no,
        text: inner.to_string(),
    };

    let tokens: Vec<&str> = inner.split(',').map(str::trim).filter(|t| !t.is_empty()).collect();
    let (system_name, dim_tokens) = tokens.split_last().ok_or_else(malformed)?;
    let system = units::system_index(system_name).ok_or_else(malformed)?;

    let mut value: i64 = system as i64;
    for token in dim_tokens {
        let (name, exp) = match token.split_once('^') {
            Some((name, exp)) => (name, exp.parse::<i64>().map_err(|_| malformed())?),
            None => (*token, 1),
        };
        let dim = dimension_index_for_system(name, system).ok_or_else(malformed)?;
        let nibble = units::to_twos_comp(exp, 4) & 0xf;
        value |= nibble << ((dim as i64 + 1) * 4);
    }
    Ok(value)
}

fn dimension_index_for_system(token: &str, system: usize) -> Option<usize> {
    units::DIMENSIONS.iter().position(|row| row[system] == token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_integer_items_round_trip() {
        let items = parse_descriptor_text("Report Count (3)\nReport Size (8)\nLogical Minimum (-127)").unwrap();
        assert_eq!(items[0].value, 3);
        assert_eq!(items[1].value, 8);
        assert_eq!(items[2].value, -127);
    }

    #[test]
    fn usage_page_and_usage_resolve_by_name() {
        let text = "Usage Page (Generic Desktop)\nUsage (X)";
        let items = parse_descriptor_text(text).unwrap();
        assert_eq!(items[0].value, 0x01);
        assert_eq!(items[1].value, 0x30);
    }

    #[test]
    fn collection_and_end_collection_round_trip() {
        let items = parse_descriptor_text("Collection (Application)\nEnd Collection").unwrap();
        assert_eq!(items[0].value, 1);
        assert_eq!(items[1].tag, Tag::EndCollection);
    }

    #[test]
    fn input_flags_parse_all_bits() {
        let items = parse_descriptor_text("Input (Data,Var,Abs)").unwrap();
        assert_eq!(items[0].value, 0b010);
        let items = parse_descriptor_text("Input (Cnst,Arr,Rel,Wrap,Null)").unwrap();
        assert_eq!(items[0].value, 0b100_1101);
    }

    #[test]
    fn unit_expression_round_trips_centimeter_per_second() {
        // S4: velocity unit (Centimeter * Seconds^-1); human_descr lists
        // dimensions from the high end of the nibble packing down, so time
        // renders before length.
        let items = parse_descriptor_text("Unit (Centimeter,Seconds^-1,SILinear)").unwrap();
        let (text, _) = items[0].human_descr(0);
        assert_eq!(text, "Unit (Seconds^-1,Centimeter,SILinear)");
    }

    #[test]
    fn unknown_usage_page_name_is_a_lookup_error() {
        let err = parse_descriptor_text("Usage Page (Not A Real Page)").unwrap_err();
        assert!(matches!(err, RdescError::Lookup(LookupError::UnknownPageName(_))));
    }
}
