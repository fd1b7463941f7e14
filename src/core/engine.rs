//! Projection-engine contract: control flags, result buffers, and the engine
//! trait the dispatcher invokes once per instrument.

use chrono::NaiveDate;

/// Number of income-accrual periods requested whenever accrual output is
/// enabled (ten years of monthly periods).
pub const INCOME_ACCRUAL_PERIODS: u32 = 120;

/// Switches and parameters assembled by the dispatcher and consumed by a
/// projection engine in a single `project` call.
///
/// Which outputs are enabled follows directly from which result buffers the
/// caller supplied; gap computation is carried for engine compatibility but
/// is always disabled at this layer.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ControlFlags {
    /// Produce the cash-flow series.
    pub compute_cash_flow: bool,
    /// Produce the income-accrual series.
    pub compute_income_accrual: bool,
    /// First accrual period start; set iff `compute_income_accrual`.
    pub income_accrual_start: Option<NaiveDate>,
    /// Number of accrual periods; [`INCOME_ACCRUAL_PERIODS`] when enabled,
    /// zero otherwise.
    pub income_accrual_periods: u32,
    /// Produce economic-value output.
    pub compute_economic_value: bool,
    /// Valuation dates; a single point when economic value is enabled.
    pub economic_value_points: Vec<NaiveDate>,
    /// Repricing-gap output. Always `false` here.
    pub compute_gap: bool,
}

impl ControlFlags {
    /// Flags with every output disabled.
    pub fn disabled() -> Self {
        Self {
            compute_cash_flow: false,
            compute_income_accrual: false,
            income_accrual_start: None,
            income_accrual_periods: 0,
            compute_economic_value: false,
            economic_value_points: Vec::new(),
            compute_gap: false,
        }
    }
}

/// Projected principal and interest cash flows, one entry per period.
///
/// Filled by the engine; opaque to the core.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CashFlowSeries {
    pub period_dates: Vec<NaiveDate>,
    pub principal: Vec<f64>,
    pub interest: Vec<f64>,
}

/// Projected interest income recognized per accrual period.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IncomeAccrualSeries {
    pub period_dates: Vec<NaiveDate>,
    pub accrued_income: Vec<f64>,
}

/// A single economic-value result: present value of remaining cash flows as
/// of one valuation date.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EconomicValueSlot {
    pub valuation_date: NaiveDate,
    pub value: f64,
}

impl EconomicValueSlot {
    /// An empty slot awaiting engine output for the given valuation date.
    pub fn pending(valuation_date: NaiveDate) -> Self {
        Self {
            valuation_date,
            value: 0.0,
        }
    }
}

/// Failures raised by a projection engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The record failed the engine's own input validation.
    InvalidInput(String),
    /// The engine could not complete the requested computation.
    ComputationFailed(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid engine input: {msg}"),
            Self::ComputationFailed(msg) => write!(f, "engine computation failed: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

/// Numerical projection engine for one record shape.
///
/// One engine instance exists per shape; the dispatcher resets it and invokes
/// `project` exactly once per selected instrument. Engines are opaque black
/// boxes to the core: they read the normalized record and the control flags,
/// and fill whichever result buffers were supplied.
pub trait ProjectionEngine<R> {
    /// Clears any state left over from the previous instrument.
    fn reset(&mut self);

    /// Runs the projection, filling the supplied buffers per `flags`.
    ///
    /// The economic-value buffer is a slice of optional slots; engines write
    /// only slots that are present.
    fn project(
        &mut self,
        flags: &ControlFlags,
        record: &R,
        cash_flow: Option<&mut CashFlowSeries>,
        income_accrual: Option<&mut IncomeAccrualSeries>,
        economic_value: Option<&mut [Option<EconomicValueSlot>]>,
    ) -> Result<(), EngineError>;
}
