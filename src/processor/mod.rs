//! The instrument dispatcher: classification, retrieval, normalization, and
//! projection-engine invocation for one instrument at a time.
//!
//! One processor instance serves a whole processing session and is reused
//! across instruments; all per-instrument state is discarded at the top of
//! every selection. Instances are not safe for concurrent use — batch
//! drivers run one processor per worker.

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::core::{
    classify, CashFlowSeries, ControlFlags, EconomicValueSlot, EngineError, IncomeAccrualSeries,
    InstrumentKey, ProjectionEngine, RawInstrumentRow, ShapeCategory, INCOME_ACCRUAL_PERIODS,
};
use crate::instruments::{ActiveRecord, AmortizingRecord, BulletRecord, SpreadEvenlyRecord};
use crate::rules::apply_business_rules;
use crate::store::{
    DataErrorSink, DataQualityError, InstrumentMapper, LookupCache, MappingContext, RecordSource,
    StoreError, StoreSession, DEFAULT_INSTRUMENT_DATE_FIELD, DEFAULT_INSTRUMENT_TABLE,
};

/// Hard failures surfaced by the processor. Data-quality defects never
/// appear here; they flow through the error sink and processing continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    /// A store collaborator failed.
    Store(StoreError),
    /// The projection engine failed.
    Engine(EngineError),
    /// The processor was used after `dispose`.
    Disposed,
}

impl std::fmt::Display for ProcessorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "store failure: {err}"),
            Self::Engine(err) => write!(f, "projection failure: {err}"),
            Self::Disposed => write!(f, "processor already disposed"),
        }
    }
}

impl std::error::Error for ProcessorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Engine(err) => Some(err),
            Self::Disposed => None,
        }
    }
}

impl From<StoreError> for ProcessorError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<EngineError> for ProcessorError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

/// Store, engine, cache, and error-sink collaborators injected into a
/// processor at initialization. One mapper and one engine per shape.
pub struct Collaborators {
    pub bullet_mapper: Box<dyn InstrumentMapper<BulletRecord>>,
    pub amortizing_mapper: Box<dyn InstrumentMapper<AmortizingRecord>>,
    pub spread_evenly_mapper: Box<dyn InstrumentMapper<SpreadEvenlyRecord>>,
    pub bullet_engine: Box<dyn ProjectionEngine<BulletRecord>>,
    pub amortizing_engine: Box<dyn ProjectionEngine<AmortizingRecord>>,
    pub spread_evenly_engine: Box<dyn ProjectionEngine<SpreadEvenlyRecord>>,
    pub lookup_cache: Box<dyn LookupCache>,
    /// Subscriber for data-quality notifications; optional, at most one.
    pub error_sink: Option<Box<dyn DataErrorSink>>,
}

/// Processes one instrument at a time for a fixed processing month.
///
/// Lifecycle: [`InstrumentProcessor::init`] once per session, then any
/// number of [`select_instrument`](Self::select_instrument) /
/// [`invoke_projection`](Self::invoke_projection) pairs, then
/// [`dispose`](Self::dispose) (idempotent; also run by `Drop`).
pub struct InstrumentProcessor {
    instrument_key: Option<InstrumentKey>,
    shape: ShapeCategory,
    processing_month: NaiveDate,
    session: StoreSession,
    record: ActiveRecord,
    bullet_mapper: Box<dyn InstrumentMapper<BulletRecord>>,
    amortizing_mapper: Box<dyn InstrumentMapper<AmortizingRecord>>,
    spread_evenly_mapper: Box<dyn InstrumentMapper<SpreadEvenlyRecord>>,
    bullet_engine: Box<dyn ProjectionEngine<BulletRecord>>,
    amortizing_engine: Box<dyn ProjectionEngine<AmortizingRecord>>,
    spread_evenly_engine: Box<dyn ProjectionEngine<SpreadEvenlyRecord>>,
    lookup_cache: Box<dyn LookupCache>,
    error_sink: Option<Box<dyn DataErrorSink>>,
    disposed: bool,
}

impl InstrumentProcessor {
    /// Initializes a processor for one processing session.
    ///
    /// `processing_date` is truncated to the first day of its month before
    /// any use. The lookup cache is loaded once here, and each shape mapper
    /// is bound to the instrument table named by `context` — or to the
    /// default `BP_INSTRUMENT_HISTORY` / `INSTRUMENT_HISTORY_D` pairing when
    /// no context is supplied.
    pub fn init(
        session: StoreSession,
        processing_date: NaiveDate,
        context: Option<&MappingContext>,
        mut collaborators: Collaborators,
    ) -> Result<Self, ProcessorError> {
        let processing_month =
            NaiveDate::from_ymd_opt(processing_date.year(), processing_date.month(), 1)
                .expect("first of month is a valid date");

        collaborators.lookup_cache.init(
            &session,
            processing_month,
            context.map(|c| &c.lookup),
        )?;

        let (table, date_field) = match context {
            Some(c) => (c.instrument_table.as_str(), c.instrument_date_field.as_str()),
            None => (DEFAULT_INSTRUMENT_TABLE, DEFAULT_INSTRUMENT_DATE_FIELD),
        };
        collaborators
            .bullet_mapper
            .init(&session, processing_month, table, date_field)?;
        collaborators
            .amortizing_mapper
            .init(&session, processing_month, table, date_field)?;
        collaborators
            .spread_evenly_mapper
            .init(&session, processing_month, table, date_field)?;

        debug!(%processing_month, "instrument processor initialized");

        Ok(Self {
            instrument_key: None,
            shape: ShapeCategory::None,
            processing_month,
            session,
            record: ActiveRecord::None,
            bullet_mapper: collaborators.bullet_mapper,
            amortizing_mapper: collaborators.amortizing_mapper,
            spread_evenly_mapper: collaborators.spread_evenly_mapper,
            bullet_engine: collaborators.bullet_engine,
            amortizing_engine: collaborators.amortizing_engine,
            spread_evenly_engine: collaborators.spread_evenly_engine,
            lookup_cache: collaborators.lookup_cache,
            error_sink: collaborators.error_sink,
            disposed: false,
        })
    }

    /// Key of the currently selected instrument.
    pub fn instrument_key(&self) -> Option<InstrumentKey> {
        self.instrument_key
    }

    /// Shape resolved by the last selection.
    pub fn shape(&self) -> ShapeCategory {
        self.shape
    }

    /// Processing month (always the first day of a month).
    pub fn processing_month(&self) -> NaiveDate {
        self.processing_month
    }

    /// The populated, normalized record for the current instrument; display
    /// layers read it after selection.
    pub fn record(&self) -> &ActiveRecord {
        &self.record
    }

    /// Session handle this processor was initialized with.
    pub fn session(&self) -> &StoreSession {
        &self.session
    }

    /// Selects an instrument by key: resets per-instrument state, classifies
    /// the raw type code, populates the matching shape record through its
    /// mapper, and normalizes it. Returns the resolved shape.
    ///
    /// Unknown type codes resolve to [`ShapeCategory::None`] with no mapper
    /// call and no normalization. Data-quality notifications raised by the
    /// mapper are relayed to the error sink before this returns.
    pub fn select_instrument(
        &mut self,
        instrument_key: InstrumentKey,
        raw_type_code: i32,
    ) -> Result<ShapeCategory, ProcessorError> {
        self.select(instrument_key, raw_type_code, RecordSource::Key(instrument_key))
    }

    /// Row-based selection overload for batch drivers that already fetched
    /// the instrument row.
    pub fn select_instrument_row(
        &mut self,
        row: &RawInstrumentRow,
    ) -> Result<ShapeCategory, ProcessorError> {
        self.select(row.instrument_key, row.raw_type_code, RecordSource::Row(row))
    }

    fn select(
        &mut self,
        instrument_key: InstrumentKey,
        raw_type_code: i32,
        source: RecordSource<'_>,
    ) -> Result<ShapeCategory, ProcessorError> {
        if self.disposed {
            return Err(ProcessorError::Disposed);
        }

        // Unconditional reset: stale fields must never leak from the
        // previous instrument into this one.
        self.record.reset();
        self.shape = ShapeCategory::None;
        self.instrument_key = Some(instrument_key);

        let shape = classify(raw_type_code);
        let mut null_sink = |_: &DataQualityError| {};
        let sink: &mut dyn DataErrorSink = match self.error_sink.as_mut() {
            Some(sink) => sink.as_mut(),
            None => &mut null_sink,
        };

        match shape {
            ShapeCategory::Bullet => {
                let mut record = BulletRecord::default();
                self.bullet_mapper
                    .populate(&mut record, &source, &*self.lookup_cache, sink)?;
                self.record = ActiveRecord::Bullet(record);
            }
            ShapeCategory::Amortizing => {
                let mut record = AmortizingRecord::default();
                self.amortizing_mapper
                    .populate(&mut record, &source, &*self.lookup_cache, sink)?;
                self.record = ActiveRecord::Amortizing(record);
            }
            ShapeCategory::SpreadEvenly => {
                let mut record = SpreadEvenlyRecord::default();
                self.spread_evenly_mapper
                    .populate(&mut record, &source, &*self.lookup_cache, sink)?;
                self.record = ActiveRecord::SpreadEvenly(record);
            }
            ShapeCategory::None => {
                debug!(instrument_key, raw_type_code, "no shape mapping for type code");
                return Ok(ShapeCategory::None);
            }
        }

        apply_business_rules(&mut self.record, self.processing_month);
        self.shape = shape;
        debug!(instrument_key, shape = shape.as_str(), "instrument selected");
        Ok(shape)
    }

    /// Runs the projection engine for the current instrument, filling
    /// whichever result buffers are supplied.
    ///
    /// Control flags follow buffer presence: cash flow iff a cash-flow
    /// buffer is supplied; income accrual iff an accrual buffer is supplied
    /// (accrual starts at the processing month, 120 periods); economic value
    /// iff a slot slice is supplied and its first slot is non-empty (one
    /// valuation point at the processing month). Gap output is always
    /// disabled. With no resolved shape this is a no-op.
    pub fn invoke_projection(
        &mut self,
        cash_flow: Option<&mut CashFlowSeries>,
        income_accrual: Option<&mut IncomeAccrualSeries>,
        economic_value: Option<&mut [Option<EconomicValueSlot>]>,
    ) -> Result<(), ProcessorError> {
        if self.disposed {
            return Err(ProcessorError::Disposed);
        }

        let mut flags = ControlFlags::disabled();
        flags.compute_cash_flow = cash_flow.is_some();
        if income_accrual.is_some() {
            flags.compute_income_accrual = true;
            flags.income_accrual_start = Some(self.processing_month);
            flags.income_accrual_periods = INCOME_ACCRUAL_PERIODS;
        }
        let first_slot_filled = economic_value
            .as_ref()
            .is_some_and(|slots| slots.first().is_some_and(Option::is_some));
        if first_slot_filled {
            flags.compute_economic_value = true;
            flags.economic_value_points = vec![self.processing_month];
        }

        match &self.record {
            ActiveRecord::None => Ok(()),
            ActiveRecord::Bullet(record) => {
                self.bullet_engine.reset();
                self.bullet_engine
                    .project(&flags, record, cash_flow, income_accrual, economic_value)?;
                Ok(())
            }
            ActiveRecord::Amortizing(record) => {
                self.amortizing_engine.reset();
                self.amortizing_engine
                    .project(&flags, record, cash_flow, income_accrual, economic_value)?;
                Ok(())
            }
            ActiveRecord::SpreadEvenly(record) => {
                self.spread_evenly_engine.reset();
                self.spread_evenly_engine
                    .project(&flags, record, cash_flow, income_accrual, economic_value)?;
                Ok(())
            }
        }
    }

    /// Writes the economic-value discount method into the active record.
    /// No-op when no shape is resolved.
    pub fn set_econ_value_discount_method(&mut self, method: i32) {
        self.record.set_econ_value_discount_method(method);
    }

    /// Tears the processor down: detaches the error sink exactly once and
    /// releases the lookup cache. Safe to call repeatedly; also run by
    /// `Drop`.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.error_sink = None;
        self.lookup_cache.reset();
        debug!("instrument processor disposed");
    }
}

impl Drop for InstrumentProcessor {
    fn drop(&mut self) {
        self.dispose();
    }
}
