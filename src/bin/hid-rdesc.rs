//! CLI front-end for the report descriptor core (spec §1 "out of scope
//! external collaborators" / SPEC_FULL.md §6). This binary owns argv,
//! stdio, and file-type sniffing; the library itself never touches any
//! of those.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::debug;

use hid_rdesc::{DumpStyle, ReportDescriptor};

#[derive(Parser, Debug)]
#[command(name = "hid-rdesc", version, about = "Decode and synthesize USB HID report descriptors")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pretty-print every item in a report descriptor.
    Dump {
        /// Path to a binary, hex-capture, or textual descriptor.
        path: PathBuf,
        #[arg(long, value_enum, default_value_t = Style::Array)]
        style: Style,
    },
    /// Decode one report payload against a descriptor.
    DecodeReport {
        /// Path to the descriptor the report payload belongs to.
        descriptor_path: PathBuf,
        /// The report payload as a space-separated hex string.
        report_hex: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Style {
    Array,
    Kernel,
}

impl From<Style> for DumpStyle {
    fn from(style: Style) -> Self {
        match style {
            Style::Array => DumpStyle::Array,
            Style::Kernel => DumpStyle::Kernel,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Dump { path, style } => {
            let rdesc = open_report_descriptor(&path)?;
            print!("{}", rdesc.dump(style.into()));
        }
        Command::DecodeReport { descriptor_path, report_hex } => {
            let rdesc = open_report_descriptor(&descriptor_path)?;
            let bytes = parse_hex_tokens(&report_hex)?;
            match rdesc.decode_report(&bytes) {
                Some(text) => println!("{text}"),
                None => bail!("no report in {} matches report_id={}", descriptor_path.display(), bytes[0]),
            }
        }
    }
    Ok(())
}

/// Sniff `path` as a binary descriptor, a hex-capture (`N B0 B1 …`), or a
/// textual dump, and parse it accordingly (SPEC_FULL.md §6, grounded on
/// `hidtools.cli.decode.open_report_descriptor`'s dispatch-by-content).
fn open_report_descriptor(path: &Path) -> Result<ReportDescriptor> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;

    if let Ok(text) = std::str::from_utf8(&bytes) {
        let trimmed = text.trim_start();
        if looks_like_hex_capture(trimmed) {
            debug!("{}: sniffed as hex capture", path.display());
            return ReportDescriptor::from_hex_capture(trimmed).context("parsing hex capture");
        }
        if trimmed.starts_with(|c: char| c.is_ascii_alphabetic()) {
            debug!("{}: sniffed as textual descriptor", path.display());
            return ReportDescriptor::from_text(text).context("parsing textual descriptor");
        }
    }

    debug!("{}: sniffed as binary descriptor", path.display());
    ReportDescriptor::from_bytes(&bytes).context("parsing binary descriptor")
}

fn looks_like_hex_capture(text: &str) -> bool {
    let mut tokens = text.split_whitespace();
    let Some(first) = tokens.next() else { return false };
    if first.parse::<u32>().is_err() {
        return false;
    }
    tokens.all(|tok| u8::from_str_radix(tok.trim_start_matches("0x"), 16).is_ok())
}

fn parse_hex_tokens(text: &str) -> Result<Vec<u8>> {
    text.split_whitespace()
        .map(|tok| {
            u8::from_str_radix(tok.trim_start_matches("0x"), 16)
                .with_context(|| format!("invalid hex byte {tok:?}"))
        })
        .collect()
}
