//! Bullet (at-maturity) instrument record.

use chrono::NaiveDate;

/// Schedule record for a bullet instrument: principal is repaid in full at
/// maturity, with periodic interest payments in between.
///
/// Call and put instruments share this record because their repayment
/// schedule has the same shape.
///
/// A freshly reset record holds epoch dates and zero amounts; the shape
/// mapper overwrites every field during population.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BulletRecord {
    /// Processing date as carried on the record.
    pub current_date: NaiveDate,
    /// Contractual end date.
    pub maturity_date: NaiveDate,
    /// Next interest cash-flow date.
    pub next_interest_payment_date: NaiveDate,
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

impl BulletRecord {
    /// Restores the zeroed state, discarding the previous instrument's data.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
