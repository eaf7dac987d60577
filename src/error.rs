//! Error taxonomy for the report descriptor core (spec §7).

use thiserror::Error;

/// Malformed descriptor bytes or text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown item tag 0x{byte:02x} at offset {offset}")]
    UnknownTag { byte: u8, offset: usize },

    #[error("truncated item payload at offset {offset}: expected {expected} bytes, {available} available")]
    TruncatedPayload {
        offset: usize,
        expected: usize,
        available: usize,
    },

    #[error("header byte 0x00 in non-final position at offset {offset}")]
    NonFinalTerminator { offset: usize },

    #[error("malformed text descriptor line {line_no}: {line:?}")]
    MalformedLine { line_no: usize, line: String },

    #[error("malformed Unit expression in {line_no}: {text:?}")]
    MalformedUnit { line_no: usize, text: String },
}

/// A name could not be resolved against the Usage Table.
///
/// Decode-side lookups never surface this (they fall back to
/// `Vendor ...`/`0x%x` rendering); only the text front-end raises it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("unknown usage page name {0:?}")]
    UnknownPageName(String),

    #[error("unknown usage name {0:?} on page {1:?}")]
    UnknownUsageName(String, String),

    #[error("unknown collection kind {0:?}")]
    UnknownCollectionKind(String),
}

/// A write exceeded the declared bit width, or a read ran past the buffer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("value {value} does not fit in {bits} bits")]
    ValueTooWide { value: u64, bits: u8 },
}

/// `format_report` was called with data whose shape doesn't match the report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("no input report found for report_id={report_id:?}")]
    NoSuchReport { report_id: i32 },

    #[error("no report matches application usage {application:#010x}")]
    NoSuchApplication { application: u32 },
}

/// The crate-wide error type returned by the facade operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RdescError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

pub type Result<T> = std::result::Result<T, RdescError>;
