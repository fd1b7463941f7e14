//! Collaborator contracts for the persistent store: session handle, mapping
//! configuration, lookup cache, shape mappers, and the data-quality error
//! channel.
//!
//! The core never talks to the store directly; it drives these traits and
//! consumes the populated records they hand back. Business-rule defects in
//! source rows flow through [`DataErrorSink`] and never fail a call; only
//! hard I/O failures surface as [`StoreError`].

use chrono::NaiveDate;

use crate::core::{InstrumentKey, RawInstrumentRow};

/// Default instrument history table used when no mapping context is supplied.
pub const DEFAULT_INSTRUMENT_TABLE: &str = "BP_INSTRUMENT_HISTORY";

/// Default as-of date field on the instrument history table.
pub const DEFAULT_INSTRUMENT_DATE_FIELD: &str = "INSTRUMENT_HISTORY_D";

/// Opaque connection/session handle owned by the store collaborators.
///
/// The core threads it through initialization calls and never inspects it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StoreSession {
    connection: String,
}

impl StoreSession {
    pub fn new(connection: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
        }
    }

    /// Connection string for collaborators that open their own cursors.
    pub fn connection(&self) -> &str {
        &self.connection
    }
}

/// Reference-data table names and the base-rate window consumed by the
/// lookup cache.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LookupContext {
    pub base_rate_table: String,
    pub yield_curve_table: String,
    pub yield_curve_rate_table: String,
    pub prepayment_speed_table: String,
    pub prepayment_speed_detail_table: String,
    pub speed_percentage_table: String,
    pub base_rate_start_month: NaiveDate,
    /// End of the base-rate window; open-ended when absent.
    pub base_rate_end_month: Option<NaiveDate>,
}

/// Store mapping configuration for one processing session: where instrument
/// rows live, which field carries the as-of date, and the reference-data
/// context shared with the lookup cache.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MappingContext {
    pub instrument_table: String,
    pub instrument_date_field: String,
    pub lookup: LookupContext,
}

/// Classes of data-quality defect a mapper can report while populating a
/// record. These are repairable conditions, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DataErrorKind {
    /// A historical repricing date fell outside the plausible range.
    RepricingDateOutOfRange,
    /// A payment date fell outside the plausible range.
    PaymentDateOutOfRange,
    /// The row references a rate assignment that does not exist.
    MissingRateAssignment,
    /// The payment frequency is zero or otherwise unusable.
    InvalidPaymentFrequency,
    /// Balance fields disagree with each other.
    BalanceInconsistent,
}

/// A data-quality notification raised during retrieval: which instrument,
/// which month, what kind of defect. Forwarded to the caller's sink and
/// never stored.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DataQualityError {
    pub instrument_key: InstrumentKey,
    pub month: NaiveDate,
    pub kind: DataErrorKind,
}

/// Receives data-quality notifications. Fire-and-forget: `notify` must not
/// fail, and the caller decides whether to log, collect, or abort the batch.
pub trait DataErrorSink {
    fn notify(&mut self, error: &DataQualityError);
}

impl<F: FnMut(&DataQualityError)> DataErrorSink for F {
    fn notify(&mut self, error: &DataQualityError) {
        self(error);
    }
}

/// Hard store failures. Data-quality defects never appear here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Connectivity to the store was lost or could not be established.
    ConnectionFailed(String),
    /// An instrument row was required but absent.
    InstrumentNotFound(InstrumentKey),
    /// A row was present but structurally unreadable.
    MalformedRow(String),
    /// Reference data needed by the lookup cache could not be loaded.
    ReferenceDataUnavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionFailed(msg) => write!(f, "store connection failed: {msg}"),
            Self::InstrumentNotFound(key) => write!(f, "instrument {key} not found"),
            Self::MalformedRow(msg) => write!(f, "malformed instrument row: {msg}"),
            Self::ReferenceDataUnavailable(msg) => {
                write!(f, "reference data unavailable: {msg}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Where a mapper should read the instrument from: a key to fetch, or a row
/// the batch driver already fetched.
#[derive(Debug, Clone, Copy)]
pub enum RecordSource<'a> {
    Key(InstrumentKey),
    Row(&'a RawInstrumentRow),
}

impl RecordSource<'_> {
    /// Instrument key regardless of source form.
    pub fn instrument_key(&self) -> InstrumentKey {
        match self {
            Self::Key(key) => *key,
            Self::Row(row) => row.instrument_key,
        }
    }
}

/// Reference-data cache (rate curves, prepayment speeds) shared by the shape
/// mappers. Initialized once per processing session, reset at teardown.
pub trait LookupCache {
    /// Loads reference data for the session. `context` overrides the default
    /// reference table names when present.
    fn init(
        &mut self,
        session: &StoreSession,
        processing_month: NaiveDate,
        context: Option<&LookupContext>,
    ) -> Result<(), StoreError>;

    /// Releases cached reference data.
    fn reset(&mut self);
}

/// Populates one record shape from the store.
///
/// Implementations report repairable defects through `errors` during
/// `populate` and reserve `Err` for hard I/O failures only.
pub trait InstrumentMapper<R> {
    /// Binds the mapper to the session's instrument table for this
    /// processing month.
    fn init(
        &mut self,
        session: &StoreSession,
        processing_month: NaiveDate,
        instrument_table: &str,
        instrument_date_field: &str,
    ) -> Result<(), StoreError>;

    /// Fills `record` from the store for the given source, consulting the
    /// lookup cache for reference data.
    fn populate(
        &mut self,
        record: &mut R,
        source: &RecordSource<'_>,
        cache: &dyn LookupCache,
        errors: &mut dyn DataErrorSink,
    ) -> Result<(), StoreError>;
}
