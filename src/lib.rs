//! OpenALM normalizes and routes individual financial-instrument records
//! (loans, deposits, amortizing notes) for a bank's asset/liability
//! projection pipeline.
//!
//! The crate owns the classification, normalization, and dispatch state
//! machine: a raw instrument type code resolves to one of three
//! repayment-schedule shapes (bullet, amortizing, spread-evenly), a
//! shape-specific record is populated through a store mapper collaborator,
//! a fixed catalog of date-repair business rules restores the invariants
//! the projection grid depends on, and the normalized record plus a small
//! control-flag set is handed to an external projection engine.
//!
//! What the crate deliberately does *not* do: compute cash flows, accrued
//! income, or valuations (the engine collaborator does), persist anything,
//! or retry store access. Store mappers, the reference-data lookup cache,
//! and the projection engines are trait-shaped collaborators supplied by
//! the caller.
//!
//! # Quick Start
//! Classify a raw type code:
//! ```rust
//! use openalm::core::{classify, ShapeCategory};
//!
//! assert_eq!(classify(2), ShapeCategory::Amortizing);
//! assert_eq!(classify(7), ShapeCategory::None);
//! ```
//!
//! Normalize a stale record:
//! ```rust
//! use chrono::NaiveDate;
//! use openalm::instruments::{ActiveRecord, BulletRecord};
//! use openalm::rules::apply_business_rules;
//!
//! let current = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
//! let mut record = ActiveRecord::Bullet(BulletRecord {
//!     current_date: current,
//!     // Matured a year ago; the repair rules pull every date to today.
//!     maturity_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
//!     ..Default::default()
//! });
//! apply_business_rules(&mut record, current);
//! match record {
//!     ActiveRecord::Bullet(r) => assert_eq!(r.maturity_date, current),
//!     _ => unreachable!(),
//! }
//! ```

pub mod core;
pub mod instruments;
pub mod processor;
pub mod rules;
pub mod store;

/// Common imports for ergonomic usage.
#[allow(ambiguous_glob_reexports)]
pub mod prelude {
    pub use crate::core::*;
    pub use crate::instruments::*;
    pub use crate::processor::*;
    pub use crate::rules::apply_business_rules;
    pub use crate::store::*;
}
