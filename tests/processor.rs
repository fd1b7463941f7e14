//! Dispatcher suite: selection flow, per-instrument state reset, control-flag
//! assembly, error-channel relay, and teardown, exercised against stub
//! collaborators.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::NaiveDate;

use openalm::core::{
    CashFlowSeries, ControlFlags, EconomicValueSlot, IncomeAccrualSeries, ProjectionEngine,
    RawInstrumentRow, ShapeCategory,
};
use openalm::instruments::{ActiveRecord, AmortizingRecord, BulletRecord, SpreadEvenlyRecord};
use openalm::processor::{Collaborators, InstrumentProcessor, ProcessorError};
use openalm::store::{
    DataErrorKind, DataErrorSink, DataQualityError, InstrumentMapper, LookupCache, LookupContext,
    MappingContext, RecordSource, StoreError, StoreSession,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Shared observation log the stubs write into.
#[derive(Debug, Default)]
struct Log {
    mapper_calls: Vec<String>,
    mapper_tables: Vec<(String, String)>,
    engine_calls: Vec<String>,
    captured_flags: Option<ControlFlags>,
    cache_inits: u32,
    cache_resets: u32,
    relayed: Vec<DataQualityError>,
}

type SharedLog = Rc<RefCell<Log>>;

struct StubMapper<R> {
    name: &'static str,
    log: SharedLog,
    template: R,
    raise: Vec<DataQualityError>,
    fail_next: Option<StoreError>,
}

impl<R: Clone> StubMapper<R> {
    fn new(name: &'static str, log: SharedLog, template: R) -> Self {
        Self {
            name,
            log,
            template,
            raise: Vec::new(),
            fail_next: None,
        }
    }
}

impl<R: Clone> InstrumentMapper<R> for StubMapper<R> {
    fn init(
        &mut self,
        _session: &StoreSession,
        _processing_month: NaiveDate,
        instrument_table: &str,
        instrument_date_field: &str,
    ) -> Result<(), StoreError> {
        self.log
            .borrow_mut()
            .mapper_tables
            .push((instrument_table.to_string(), instrument_date_field.to_string()));
        Ok(())
    }

    fn populate(
        &mut self,
        record: &mut R,
        source: &RecordSource<'_>,
        _cache: &dyn LookupCache,
        errors: &mut dyn DataErrorSink,
    ) -> Result<(), StoreError> {
        if let Some(err) = self.fail_next.take() {
            return Err(err);
        }
        self.log
            .borrow_mut()
            .mapper_calls
            .push(format!("{}:{}", self.name, source.instrument_key()));
        *record = self.template.clone();
        for err in &self.raise {
            errors.notify(err);
        }
        Ok(())
    }
}

struct StubEngine {
    name: &'static str,
    log: SharedLog,
}

impl<R> ProjectionEngine<R> for StubEngine {
    fn reset(&mut self) {
        self.log
            .borrow_mut()
            .engine_calls
            .push(format!("reset:{}", self.name));
    }

    fn project(
        &mut self,
        flags: &ControlFlags,
        _record: &R,
        _cash_flow: Option<&mut CashFlowSeries>,
        _income_accrual: Option<&mut IncomeAccrualSeries>,
        _economic_value: Option<&mut [Option<EconomicValueSlot>]>,
    ) -> Result<(), openalm::core::EngineError> {
        let mut log = self.log.borrow_mut();
        log.engine_calls.push(format!("project:{}", self.name));
        log.captured_flags = Some(flags.clone());
        Ok(())
    }
}

struct StubCache {
    log: SharedLog,
}

impl LookupCache for StubCache {
    fn init(
        &mut self,
        _session: &StoreSession,
        _processing_month: NaiveDate,
        _context: Option<&LookupContext>,
    ) -> Result<(), StoreError> {
        self.log.borrow_mut().cache_inits += 1;
        Ok(())
    }

    fn reset(&mut self) {
        self.log.borrow_mut().cache_resets += 1;
    }
}

fn bullet_template(current: NaiveDate) -> BulletRecord {
    BulletRecord {
        current_date: current,
        maturity_date: d(2030, 6, 1),
        next_interest_payment_date: d(2025, 9, 1),
        next_repricing_date: d(2025, 12, 1),
        next_prepayment_date: d(2025, 9, 1),
        interest_payment_frequency_months: 3,
        econ_value_discount_method: 0,
        current_balance: 1_000_000.0,
        interest_rate: 0.045,
    }
}

fn amortizing_template(current: NaiveDate) -> AmortizingRecord {
    AmortizingRecord {
        current_date: current,
        maturity_date: d(2030, 6, 1),
        next_principal_interest_payment_date: d(2025, 9, 1),
        balloon_date: d(2030, 6, 1),
        next_repricing_date: d(2025, 12, 1),
        next_prepayment_date: d(2025, 9, 1),
        principal_interest_payment_frequency_months: 1,
        econ_value_discount_method: 0,
        current_balance: 250_000.0,
        interest_rate: 0.0625,
    }
}

fn spread_evenly_template(current: NaiveDate) -> SpreadEvenlyRecord {
    SpreadEvenlyRecord {
        current_date: current,
        maturity_date: d(2030, 6, 1),
        next_interest_payment_date: d(2025, 9, 1),
        next_principal_payment_date: d(2025, 9, 1),
        balloon_date: d(2030, 6, 1),
        next_repricing_date: d(2025, 12, 1),
        next_prepayment_date: d(2025, 9, 1),
        interest_payment_frequency_months: 3,
        econ_value_discount_method: 0,
        current_balance: 500_000.0,
        interest_rate: 0.051,
    }
}

struct Fixture;

impl Fixture {
    fn collaborators(log: &SharedLog) -> Collaborators {
        let current = d(2025, 8, 1);
        Collaborators {
            bullet_mapper: Box::new(StubMapper::new(
                "bullet",
                Rc::clone(log),
                bullet_template(current),
            )),
            amortizing_mapper: Box::new(StubMapper::new(
                "amortizing",
                Rc::clone(log),
                amortizing_template(current),
            )),
            spread_evenly_mapper: Box::new(StubMapper::new(
                "spread_evenly",
                Rc::clone(log),
                spread_evenly_template(current),
            )),
            bullet_engine: Box::new(StubEngine {
                name: "bullet",
                log: Rc::clone(log),
            }),
            amortizing_engine: Box::new(StubEngine {
                name: "amortizing",
                log: Rc::clone(log),
            }),
            spread_evenly_engine: Box::new(StubEngine {
                name: "spread_evenly",
                log: Rc::clone(log),
            }),
            lookup_cache: Box::new(StubCache { log: Rc::clone(log) }),
            error_sink: {
                let relay = Rc::clone(log);
                Some(Box::new(move |err: &DataQualityError| {
                    relay.borrow_mut().relayed.push(err.clone());
                }))
            },
        }
    }
}

fn processor_with_log() -> (InstrumentProcessor, SharedLog) {
    let log: SharedLog = Rc::new(RefCell::new(Log::default()));
    let processor = InstrumentProcessor::init(
        StoreSession::new("Server=alm;Database=positions"),
        d(2025, 8, 17),
        None,
        Fixture::collaborators(&log),
    )
    .unwrap();
    (processor, log)
}

// ── Initialization ──────────────────────────────────────────────────────────

#[test]
fn init_truncates_processing_date_to_month_start() {
    let (processor, _log) = processor_with_log();
    assert_eq!(processor.processing_month(), d(2025, 8, 1));
}

#[test]
fn init_binds_mappers_to_default_tables_without_context() {
    let (_processor, log) = processor_with_log();
    let log = log.borrow();
    assert_eq!(log.cache_inits, 1);
    assert_eq!(log.mapper_tables.len(), 3);
    for (table, field) in &log.mapper_tables {
        assert_eq!(table, "BP_INSTRUMENT_HISTORY");
        assert_eq!(field, "INSTRUMENT_HISTORY_D");
    }
}

#[test]
fn init_honors_mapping_context_tables() {
    let log: SharedLog = Rc::new(RefCell::new(Log::default()));
    let context = MappingContext {
        instrument_table: "SIM_INSTRUMENT".to_string(),
        instrument_date_field: "SIM_ASOF_D".to_string(),
        lookup: LookupContext {
            base_rate_table: "BASE_RATE".to_string(),
            yield_curve_table: "YIELD_CURVE".to_string(),
            yield_curve_rate_table: "YIELD_CURVE_RATE".to_string(),
            prepayment_speed_table: "PREPAY_SPEED".to_string(),
            prepayment_speed_detail_table: "PREPAY_SPEED_DETAIL".to_string(),
            speed_percentage_table: "SPEED_PCT".to_string(),
            base_rate_start_month: d(2025, 1, 1),
            base_rate_end_month: Some(d(2026, 1, 1)),
        },
    };
    let _processor = InstrumentProcessor::init(
        StoreSession::new("Server=alm"),
        d(2025, 8, 1),
        Some(&context),
        Fixture::collaborators(&log),
    )
    .unwrap();

    for (table, field) in &log.borrow().mapper_tables {
        assert_eq!(table, "SIM_INSTRUMENT");
        assert_eq!(field, "SIM_ASOF_D");
    }
}

// ── Selection ───────────────────────────────────────────────────────────────

#[test]
fn select_routes_each_code_to_its_mapper() {
    let (mut processor, log) = processor_with_log();

    assert_eq!(processor.select_instrument(11, 1).unwrap(), ShapeCategory::Bullet);
    assert_eq!(processor.select_instrument(12, 2).unwrap(), ShapeCategory::Amortizing);
    assert_eq!(processor.select_instrument(13, 3).unwrap(), ShapeCategory::Bullet);
    assert_eq!(processor.select_instrument(14, 4).unwrap(), ShapeCategory::Bullet);
    assert_eq!(processor.select_instrument(15, 5).unwrap(), ShapeCategory::SpreadEvenly);

    assert_eq!(
        log.borrow().mapper_calls,
        vec![
            "bullet:11",
            "amortizing:12",
            "bullet:13",
            "bullet:14",
            "spread_evenly:15"
        ]
    );
    assert_eq!(processor.shape(), ShapeCategory::SpreadEvenly);
    assert_eq!(processor.instrument_key(), Some(15));
}

#[test]
fn select_normalizes_the_populated_record() {
    let log: SharedLog = Rc::new(RefCell::new(Log::default()));
    let mut collaborators = Fixture::collaborators(&log);
    // Mapper hands back a record that matured before its current date.
    collaborators.bullet_mapper = Box::new(StubMapper::new(
        "bullet",
        Rc::clone(&log),
        BulletRecord {
            maturity_date: d(2024, 2, 1),
            next_interest_payment_date: d(2023, 11, 1),
            ..bullet_template(d(2025, 8, 1))
        },
    ));
    let mut processor = InstrumentProcessor::init(
        StoreSession::new("Server=alm"),
        d(2025, 8, 1),
        None,
        collaborators,
    )
    .unwrap();

    processor.select_instrument(7, 1).unwrap();

    let ActiveRecord::Bullet(record) = processor.record() else {
        panic!("expected bullet record");
    };
    assert_eq!(record.maturity_date, d(2025, 8, 1));
    assert_eq!(record.next_interest_payment_date, d(2025, 8, 1));
}

/// Scenario E: a type code with no mapping selects nothing and projects
/// nothing.
#[test]
fn select_unknown_code_skips_mapper_and_normalization() {
    let (mut processor, log) = processor_with_log();

    assert_eq!(processor.select_instrument(42, 0).unwrap(), ShapeCategory::None);
    assert!(log.borrow().mapper_calls.is_empty());
    assert_eq!(*processor.record(), ActiveRecord::None);

    let mut cash_flow = CashFlowSeries::default();
    processor.invoke_projection(Some(&mut cash_flow), None, None).unwrap();
    assert!(log.borrow().engine_calls.is_empty());
}

#[test]
fn select_resets_state_from_previous_instrument() {
    let (mut processor, _log) = processor_with_log();

    processor.select_instrument(1, 2).unwrap();
    assert_eq!(processor.shape(), ShapeCategory::Amortizing);

    // Unknown code: everything from instrument 1 must be gone.
    processor.select_instrument(2, 99).unwrap();
    assert_eq!(processor.shape(), ShapeCategory::None);
    assert_eq!(*processor.record(), ActiveRecord::None);
    assert_eq!(processor.instrument_key(), Some(2));

    // And a new shape starts from a fresh record, not the amortizing one.
    processor.select_instrument(3, 5).unwrap();
    assert!(matches!(processor.record(), ActiveRecord::SpreadEvenly(_)));
}

#[test]
fn select_by_row_reads_key_and_code_from_the_row() {
    let (mut processor, log) = processor_with_log();

    let row = RawInstrumentRow::new(901, 5);
    assert_eq!(
        processor.select_instrument_row(&row).unwrap(),
        ShapeCategory::SpreadEvenly
    );
    assert_eq!(processor.instrument_key(), Some(901));
    assert_eq!(log.borrow().mapper_calls, vec!["spread_evenly:901"]);
}

// ── Error channel ───────────────────────────────────────────────────────────

#[test]
fn mapper_data_errors_relay_to_the_sink_before_select_returns() {
    let log: SharedLog = Rc::new(RefCell::new(Log::default()));
    let mut collaborators = Fixture::collaborators(&log);
    let mut mapper = StubMapper::new(
        "amortizing",
        Rc::clone(&log),
        amortizing_template(d(2025, 8, 1)),
    );
    mapper.raise = vec![
        DataQualityError {
            instrument_key: 55,
            month: d(2025, 8, 1),
            kind: DataErrorKind::RepricingDateOutOfRange,
        },
        DataQualityError {
            instrument_key: 55,
            month: d(2025, 8, 1),
            kind: DataErrorKind::InvalidPaymentFrequency,
        },
    ];
    collaborators.amortizing_mapper = Box::new(mapper);
    let mut processor = InstrumentProcessor::init(
        StoreSession::new("Server=alm"),
        d(2025, 8, 1),
        None,
        collaborators,
    )
    .unwrap();

    // Data-quality defects are non-fatal: selection still succeeds.
    assert_eq!(processor.select_instrument(55, 2).unwrap(), ShapeCategory::Amortizing);

    let log = log.borrow();
    let relayed = &log.relayed;
    assert_eq!(relayed.len(), 2);
    assert_eq!(relayed[0].instrument_key, 55);
    assert_eq!(relayed[0].kind, DataErrorKind::RepricingDateOutOfRange);
    assert_eq!(relayed[1].kind, DataErrorKind::InvalidPaymentFrequency);
}

#[test]
fn hard_store_failure_fails_the_instrument_but_not_the_processor() {
    let log: SharedLog = Rc::new(RefCell::new(Log::default()));
    let mut collaborators = Fixture::collaborators(&log);
    let mut mapper = StubMapper::new("bullet", Rc::clone(&log), bullet_template(d(2025, 8, 1)));
    mapper.fail_next = Some(StoreError::InstrumentNotFound(77));
    collaborators.bullet_mapper = Box::new(mapper);
    let mut processor = InstrumentProcessor::init(
        StoreSession::new("Server=alm"),
        d(2025, 8, 1),
        None,
        collaborators,
    )
    .unwrap();

    let err = processor.select_instrument(77, 1).unwrap_err();
    assert_eq!(
        err,
        ProcessorError::Store(StoreError::InstrumentNotFound(77))
    );
    assert_eq!(*processor.record(), ActiveRecord::None);

    // Projection after the failed selection is a no-op.
    processor.invoke_projection(None, None, None).unwrap();
    assert!(log.borrow().engine_calls.is_empty());

    // The next instrument processes normally on the same instance.
    assert_eq!(processor.select_instrument(78, 1).unwrap(), ShapeCategory::Bullet);
}

// ── Projection dispatch ─────────────────────────────────────────────────────

/// Scenario D: only a cash-flow buffer enables only the cash-flow output.
#[test]
fn cash_flow_only_projection_flags() {
    let (mut processor, log) = processor_with_log();
    processor.select_instrument(5, 1).unwrap();

    let mut cash_flow = CashFlowSeries::default();
    processor.invoke_projection(Some(&mut cash_flow), None, None).unwrap();

    let log = log.borrow();
    assert_eq!(log.engine_calls, vec!["reset:bullet", "project:bullet"]);
    let flags = log.captured_flags.as_ref().unwrap();
    assert!(flags.compute_cash_flow);
    assert!(!flags.compute_income_accrual);
    assert!(!flags.compute_economic_value);
    assert!(!flags.compute_gap);
    assert_eq!(flags.income_accrual_start, None);
    assert_eq!(flags.income_accrual_periods, 0);
    assert!(flags.economic_value_points.is_empty());
}

#[test]
fn income_accrual_projection_sets_start_and_periods() {
    let (mut processor, log) = processor_with_log();
    processor.select_instrument(5, 2).unwrap();

    let mut accrual = IncomeAccrualSeries::default();
    processor.invoke_projection(None, Some(&mut accrual), None).unwrap();

    let log = log.borrow();
    assert_eq!(log.engine_calls, vec!["reset:amortizing", "project:amortizing"]);
    let flags = log.captured_flags.as_ref().unwrap();
    assert!(flags.compute_income_accrual);
    assert_eq!(flags.income_accrual_start, Some(d(2025, 8, 1)));
    assert_eq!(flags.income_accrual_periods, 120);
}

#[test]
fn economic_value_enabled_only_when_first_slot_is_filled() {
    let (mut processor, log) = processor_with_log();
    processor.select_instrument(5, 5).unwrap();

    let mut slots = [Some(EconomicValueSlot::pending(d(2025, 8, 1))), None];
    processor.invoke_projection(None, None, Some(&mut slots[..])).unwrap();
    {
        let log = log.borrow();
        let flags = log.captured_flags.as_ref().unwrap();
        assert!(flags.compute_economic_value);
        assert_eq!(flags.economic_value_points, vec![d(2025, 8, 1)]);
    }

    // An empty first slot leaves economic value disabled.
    let mut empty_slots: [Option<EconomicValueSlot>; 1] = [None];
    processor.invoke_projection(None, None, Some(&mut empty_slots[..])).unwrap();
    {
        let log = log.borrow();
        let flags = log.captured_flags.as_ref().unwrap();
        assert!(!flags.compute_economic_value);
        assert!(flags.economic_value_points.is_empty());
    }
}

#[test]
fn projection_routes_to_the_engine_of_the_resolved_shape() {
    let (mut processor, log) = processor_with_log();
    let mut cash_flow = CashFlowSeries::default();

    processor.select_instrument(1, 3).unwrap();
    processor.invoke_projection(Some(&mut cash_flow), None, None).unwrap();
    processor.select_instrument(2, 5).unwrap();
    processor.invoke_projection(Some(&mut cash_flow), None, None).unwrap();

    assert_eq!(
        log.borrow().engine_calls,
        vec![
            "reset:bullet",
            "project:bullet",
            "reset:spread_evenly",
            "project:spread_evenly"
        ]
    );
}

// ── Discount method ─────────────────────────────────────────────────────────

#[test]
fn set_discount_method_writes_into_the_active_record() {
    let (mut processor, _log) = processor_with_log();

    // No shape resolved yet: must be a quiet no-op.
    processor.set_econ_value_discount_method(2);

    processor.select_instrument(9, 5).unwrap();
    processor.set_econ_value_discount_method(3);
    let ActiveRecord::SpreadEvenly(record) = processor.record() else {
        panic!("expected spread-evenly record");
    };
    assert_eq!(record.econ_value_discount_method, 3);
}

// ── Teardown ────────────────────────────────────────────────────────────────

#[test]
fn dispose_is_idempotent_and_resets_the_cache_once() {
    let (mut processor, log) = processor_with_log();

    processor.dispose();
    processor.dispose();
    assert_eq!(log.borrow().cache_resets, 1);

    assert_eq!(
        processor.select_instrument(1, 1).unwrap_err(),
        ProcessorError::Disposed
    );
    assert_eq!(
        processor.invoke_projection(None, None, None).unwrap_err(),
        ProcessorError::Disposed
    );
}

#[test]
fn drop_runs_teardown() {
    let (processor, log) = processor_with_log();
    drop(processor);
    assert_eq!(log.borrow().cache_resets, 1);
}
