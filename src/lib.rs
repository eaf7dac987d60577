//! `hid-rdesc`: parse, evaluate, and synthesize USB HID report descriptors.
//!
//! The byte stream a HID-class peripheral sends to declare its reports is
//! decoded by [`item`] into a flat sequence of [`item::Item`]s, walked by
//! [`evaluator`] into [`field::Field`]s grouped into [`report::Report`]s,
//! and tied together at [`descriptor::ReportDescriptor`], the crate's main
//! entry point. [`text`] parses the human-readable form the item codec
//! prints back into the same item stream.

pub mod descriptor;
pub mod error;
pub mod evaluator;
pub mod field;
pub mod item;
pub mod report;
pub mod text;
pub mod units;
pub mod usage_table;

pub use descriptor::{DumpStyle, ReportDescriptor};
pub use error::{LookupError, ParseError, RangeError, RdescError, Result, ShapeError};
pub use field::{Alternatives, Field, MainKind};
pub use item::{Item, Tag};
pub use report::{Frame, Report};
