//! Amortizing instrument record.

use chrono::NaiveDate;

/// Schedule record for an amortizing instrument: principal and interest are
/// paid together on a combined schedule, with an optional balloon settlement
/// at the end.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AmortizingRecord {
    /// Processing date as carried on the record.
    pub current_date: NaiveDate,
    /// Contractual end date.
    pub maturity_date: NaiveDate,
    /// Next combined principal-plus-interest cash-flow date.
    pub next_principal_interest_payment_date: NaiveDate,
    /// Date of the final lump settlement.
    pub balloon_date: NaiveDate,
    /// Next rate-reset date.
    pub next_repricing_date: NaiveDate,
    /// Next prepayment-assumption date.
    pub next_prepayment_date: NaiveDate,
    /// Whole months between scheduled principal-plus-interest payments.
    pub principal_interest_payment_frequency_months: u32,
    /// Discount-method selector consumed by the projection engine.
    pub econ_value_discount_method: i32,
    /// Outstanding principal balance.
    pub current_balance: f64,
    /// Current interest rate.
    pub interest_rate: f64,
}

impl AmortizingRecord {
    /// Restores the zeroed state, discarding the previous instrument's data.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
