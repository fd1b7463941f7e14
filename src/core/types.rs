//! Shared domain types: instrument keys, shape categories, and raw store rows.

use std::collections::BTreeMap;

use chrono::NaiveDate;

/// Store-assigned identifier of a single instrument position.
pub type InstrumentKey = i64;

/// Repayment-schedule shape of an instrument.
///
/// Raw call and put type codes classify as [`ShapeCategory::Bullet`]; there is
/// no distinct call/put shape because the schedule structure is identical.
/// `None` is a valid terminal classification meaning no projection is
/// possible for the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ShapeCategory {
    /// Principal repaid in full at maturity.
    Bullet,
    /// Principal amortized over the schedule, with a combined
    /// principal-plus-interest payment date.
    Amortizing,
    /// Principal spread evenly across payments, with separate interest and
    /// principal payment dates.
    SpreadEvenly,
    /// No recognized shape; the instrument is skipped.
    None,
}

impl ShapeCategory {
    /// Returns a short identifier for diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bullet => "bullet",
            Self::Amortizing => "amortizing",
            Self::SpreadEvenly => "spread_evenly",
            Self::None => "none",
        }
    }
}

/// Maps a raw store type code to its schedule shape.
///
/// Pure and total: unknown codes map to [`ShapeCategory::None`] rather than
/// erroring. Codes 3 (call) and 4 (put) share the bullet schedule shape.
///
/// # Examples
/// ```
/// use openalm::core::{classify, ShapeCategory};
///
/// assert_eq!(classify(1), ShapeCategory::Bullet);
/// assert_eq!(classify(2), ShapeCategory::Amortizing);
/// assert_eq!(classify(3), ShapeCategory::Bullet);
/// assert_eq!(classify(4), ShapeCategory::Bullet);
/// assert_eq!(classify(5), ShapeCategory::SpreadEvenly);
/// assert_eq!(classify(99), ShapeCategory::None);
/// ```
pub fn classify(raw_type_code: i32) -> ShapeCategory {
    match raw_type_code {
        1 => ShapeCategory::Bullet,
        2 => ShapeCategory::Amortizing,
        3 => ShapeCategory::Bullet,
        4 => ShapeCategory::Bullet,
        5 => ShapeCategory::SpreadEvenly,
        _ => ShapeCategory::None,
    }
}

/// A single typed column value from a pre-fetched store row.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ColumnValue {
    Integer(i64),
    Number(f64),
    Date(NaiveDate),
    Text(String),
    Null,
}

/// A store row fetched ahead of processing, used by the row-based selection
/// overload so batch drivers can stream rows without handing the processor a
/// live cursor.
///
/// The key and type code are pulled out of the row because the dispatcher
/// needs them before any mapper runs; everything else stays opaque to the
/// core and is interpreted by the shape mapper.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RawInstrumentRow {
    /// Instrument identifier (column 0 of the source query).
    pub instrument_key: InstrumentKey,
    /// Raw instrument type code (column 3 of the source query).
    pub raw_type_code: i32,
    /// Remaining columns keyed by field name.
    pub columns: BTreeMap<String, ColumnValue>,
}

impl RawInstrumentRow {
    /// Builds a row with no extra columns.
    pub fn new(instrument_key: InstrumentKey, raw_type_code: i32) -> Self {
        Self {
            instrument_key,
            raw_type_code,
            columns: BTreeMap::new(),
        }
    }
}
