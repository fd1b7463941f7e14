//! Business-rule normalization applied to every populated shape record
//! before projection.
//!
//! Source data routinely arrives with maturities in the past, maturities
//! centuries out, balloon dates behind the processing month, and payment
//! schedules that stalled years ago. Monthly projection grids cannot absorb
//! any of that, so the defects are repaired here exactly once, immediately
//! after retrieval, for every shape. Order matters: the maturity floor/cap
//! runs first, then the balloon floor, then schedule advancement against the
//! repaired maturity.

use chrono::{Datelike, NaiveDate};

use crate::instruments::{ActiveRecord, AmortizingRecord, BulletRecord, SpreadEvenlyRecord};

/// Maturities at or beyond this many months after the processing month are
/// rejected by the projection grid.
pub const MATURITY_HORIZON_MONTHS: u32 = 480;

/// Capped maturities land one month inside the horizon.
pub const MATURITY_CLAMP_MONTHS: u32 = 479;

/// Horizon anchors derived from the processor's processing month.
///
/// These are computed from the processor-level date, not the record's own
/// `current_date`; the two differ when the store carries stale as-of dates,
/// and the horizon must follow the run, not the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Horizon {
    /// First excluded maturity: processing month + 480 months.
    ceiling: NaiveDate,
    /// Clamp target: processing month + 479 months.
    clamp: NaiveDate,
}

impl Horizon {
    fn from_processing_month(processing_month: NaiveDate) -> Self {
        Self {
            ceiling: add_months(processing_month, MATURITY_HORIZON_MONTHS),
            clamp: add_months(processing_month, MATURITY_CLAMP_MONTHS),
        }
    }
}

/// Repairs the live shape record in place so that every date invariant the
/// projection engine depends on holds:
///
/// - `maturity_date >= current_date`
/// - `maturity_date <= processing_month + 479 months`
/// - recurring payment dates advanced to `>= current_date` in whole
///   payment-frequency increments, clamped to `maturity_date`
///
/// Applying the rules to an already-normalized record changes nothing.
/// An [`ActiveRecord::None`] holder is left untouched.
pub fn apply_business_rules(record: &mut ActiveRecord, processing_month: NaiveDate) {
    let horizon = Horizon::from_processing_month(processing_month);
    match record {
        ActiveRecord::None => {}
        ActiveRecord::Bullet(r) => normalize_bullet(r, horizon),
        ActiveRecord::Amortizing(r) => normalize_amortizing(r, horizon),
        ActiveRecord::SpreadEvenly(r) => normalize_spread_evenly(r, horizon),
    }
}

fn normalize_bullet(r: &mut BulletRecord, horizon: Horizon) {
    if r.maturity_date < r.current_date {
        r.maturity_date = r.current_date;
        r.next_interest_payment_date = r.current_date;
        r.next_repricing_date = r.current_date;
        r.next_prepayment_date = r.current_date;
    } else if r.maturity_date >= horizon.ceiling {
        r.maturity_date = horizon.clamp;
    }

    advance_schedule_date(
        &mut r.next_interest_payment_date,
        r.current_date,
        r.maturity_date,
        r.interest_payment_frequency_months,
    );
}

fn normalize_amortizing(r: &mut AmortizingRecord, horizon: Horizon) {
    if r.maturity_date < r.current_date {
        r.maturity_date = r.current_date;
        r.next_principal_interest_payment_date = r.current_date;
        r.balloon_date = r.current_date;
        r.next_repricing_date = r.current_date;
        r.next_prepayment_date = r.current_date;
    } else if r.maturity_date >= horizon.ceiling {
        r.maturity_date = horizon.clamp;
    }

    if r.balloon_date < r.current_date {
        r.next_principal_interest_payment_date = r.current_date;
        r.balloon_date = r.current_date;
        r.next_repricing_date = r.current_date;
        r.next_prepayment_date = r.current_date;
    }

    advance_schedule_date(
        &mut r.next_principal_interest_payment_date,
        r.current_date,
        r.maturity_date,
        r.principal_interest_payment_frequency_months,
    );
}

fn normalize_spread_evenly(r: &mut SpreadEvenlyRecord, horizon: Horizon) {
    if r.maturity_date < r.current_date {
        r.maturity_date = r.current_date;
        r.next_interest_payment_date = r.current_date;
        r.next_principal_payment_date = r.current_date;
        r.balloon_date = r.current_date;
        r.next_repricing_date = r.current_date;
        r.next_prepayment_date = r.current_date;
    } else if r.maturity_date >= horizon.ceiling {
        r.maturity_date = horizon.clamp;
    }

    if r.balloon_date < r.current_date {
        r.next_interest_payment_date = r.current_date;
        r.next_principal_payment_date = r.current_date;
        r.balloon_date = r.current_date;
        r.next_repricing_date = r.current_date;
        r.next_prepayment_date = r.current_date;
    }

    advance_schedule_date(
        &mut r.next_interest_payment_date,
        r.current_date,
        r.maturity_date,
        r.interest_payment_frequency_months,
    );

    // The principal schedule advances on the interest frequency; spread-evenly
    // rows have never carried a principal frequency of their own.
    advance_schedule_date(
        &mut r.next_principal_payment_date,
        r.current_date,
        r.maturity_date,
        r.interest_payment_frequency_months,
    );
}

/// Advances a stale recurring schedule date forward in whole
/// `frequency_months` steps until it reaches `current`, clamping to
/// `maturity` if an advance would pass it. Dates already at or past
/// `current` are left alone, preserving the original periodicity anchor.
///
/// A zero frequency cannot advance, so a stale date snaps straight to
/// `min(current, maturity)`; the mapper reports the bad frequency through
/// the error channel separately.
fn advance_schedule_date(
    date: &mut NaiveDate,
    current: NaiveDate,
    maturity: NaiveDate,
    frequency_months: u32,
) {
    if frequency_months == 0 {
        if *date < current {
            *date = current.min(maturity);
        }
        return;
    }

    while *date < current {
        *date = add_months(*date, frequency_months);
        if *date > maturity {
            *date = maturity;
            break;
        }
    }
}

/// Calendar-month addition with day-of-month clamping (Jan 31 + 1 month is
/// Feb 28/29).
pub(crate) fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    let total_months = date.month0() + months;
    let year = date.year() + (total_months / 12) as i32;
    let month = (total_months % 12) + 1;
    let day = date.day().min(days_in_month(year, month));

    NaiveDate::from_ymd_opt(year, month, day).expect("valid y-m-d in add_months")
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => unreachable!("invalid month"),
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
