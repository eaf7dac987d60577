//! 4.A Usage Table: static catalog mapping numeric Usage Page/Usage IDs to
//! names and back, loaded once from an embedded data file.

use std::collections::HashMap;
use std::sync::OnceLock;

use log::warn;

const RAW_TABLE: &str = include_str!("data/usage_table.txt");

/// One Usage Page: its numeric ID, display name, and id<->name maps.
#[derive(Debug)]
pub struct UsagePageTable {
    pub page_id: u16,
    pub page_name: String,
    by_id: HashMap<u16, String>,
    by_name: HashMap<String, u16>,
}

impl UsagePageTable {
    /// The name of `usage_id` on this page, if known.
    pub fn name_of(&self, usage_id: u16) -> Option<&str> {
        self.by_id.get(&usage_id).map(String::as_str)
    }

    /// The usage ID for `name` on this page, if known.
    pub fn id_from_name(&self, name: &str) -> Option<u16> {
        self.by_name.get(name).copied()
    }
}

#[derive(Debug)]
pub struct UsageTable {
    by_id: HashMap<u16, UsagePageTable>,
    by_name: HashMap<String, u16>,
}

impl UsageTable {
    fn parse(raw: &str) -> Self {
        let mut by_id: HashMap<u16, UsagePageTable> = HashMap::new();
        let mut by_name: HashMap<String, u16> = HashMap::new();
        let mut current: Option<u16> = None;

        for (line_no, line) in raw.lines().enumerate() {
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(rest) = line.strip_prefix("PAGE ") {
                let mut parts = rest.splitn(2, ' ');
                let id_str = parts.next().unwrap_or_default();
                let name = parts.next().unwrap_or_default().to_string();
                let id = match u16::from_str_radix(id_str, 16) {
                    Ok(id) => id,
                    Err(_) => {
                        warn!("usage table: bad PAGE id at line {line_no}: {line:?}");
                        continue;
                    }
                };
                by_name.insert(name.clone(), id);
                by_id.insert(
                    id,
                    UsagePageTable {
                        page_id: id,
                        page_name: name,
                        by_id: HashMap::new(),
                        by_name: HashMap::new(),
                    },
                );
                current = Some(id);
            } else if let Some(rest) = line.strip_prefix("U ") {
                let Some(page_id) = current else {
                    warn!("usage table: usage row before any PAGE at line {line_no}");
                    continue;
                };
                let mut parts = rest.splitn(2, ' ');
                let id_str = parts.next().unwrap_or_default();
                let name = parts.next().unwrap_or_default().to_string();
                let id = match u16::from_str_radix(id_str, 16) {
                    Ok(id) => id,
                    Err(_) => {
                        warn!("usage table: bad U id at line {line_no}: {line:?}");
                        continue;
                    }
                };
                if let Some(page) = by_id.get_mut(&page_id) {
                    page.by_name.insert(name.clone(), id);
                    page.by_id.insert(id, name);
                }
            } else {
                warn!("usage table: unrecognized line {line_no}: {line:?}");
            }
        }

        UsageTable { by_id, by_name }
    }

    pub fn page_by_id(&self, id: u16) -> Option<&UsagePageTable> {
        self.by_id.get(&id)
    }

    pub fn page_from_name(&self, name: &str) -> Option<&UsagePageTable> {
        let id = *self.by_name.get(name)?;
        self.by_id.get(&id)
    }
}

/// Process-wide, lazily-initialized, immutable Usage Table.
pub fn usages() -> &'static UsageTable {
    static TABLE: OnceLock<UsageTable> = OnceLock::new();
    TABLE.get_or_init(|| UsageTable::parse(RAW_TABLE))
}

/// The 16 sensor-page modifiers, keyed by `(usage & 0xF000) >> 8`.
pub const SENSOR_MODIFIERS: [&str; 16] = [
    "Mod None",
    "Mod Change Sensitivity Abs",
    "Mod Max",
    "Mod Min",
    "Mod Accuracy",
    "Mod Resolution",
    "Mod Threshold High",
    "Mod Threshold Low",
    "Mod Calibration Offset",
    "Mod Calibration Multiplier",
    "Mod Report Interval",
    "Mod Frequency Max",
    "Mod Period Max",
    "Mod Change Sensitivity Range Percent",
    "Mod Change Sensitivity Rel Percent",
    "Mod Vendor Reserved",
]; // see GLOSSARY "Sensor modifier table"
