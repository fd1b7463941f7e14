//! Spread-evenly instrument record.

use chrono::NaiveDate;

/// Schedule record for a spread-evenly instrument: principal runs off in
/// equal portions on its own schedule, with interest paid separately.
///
/// Both payment schedules advance on the *interest* payment frequency; the
/// principal schedule has never carried a frequency of its own.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SpreadEvenlyRecord {
    /// Processing date as carried on the record.
    pub current_date: NaiveDate,
    /// Contractual end date.
    pub maturity_date: NaiveDate,
    /// Next interest cash-flow date.
    pub next_interest_payment_date: NaiveDate,
    /// Next principal cash-flow date.
    pub next_principal_payment_date: NaiveDate,
    /// Date of the final lump settlement.
    pub balloon_date: NaiveDate,
    /// Next rate-reset date.
    pub next_repricing_date: NaiveDate,
    /// Next prepayment-assumption date.
    pub next_prepayment_date: NaiveDate,
    /// Whole months between scheduled interest payments.
    pub interest_payment_frequency_months: u32,
    /// Discount-method selector consumed by the projection engine.
    pub econ_value_discount_method: i32,
    /// Outstanding principal balance.
    pub current_balance: f64,
    /// Current interest rate.
    pub interest_rate: f64,
}

impl SpreadEvenlyRecord {
    /// Restores the zeroed state, discarding the previous instrument's data.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
