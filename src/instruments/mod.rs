//! Shape-specific instrument records and the active-variant holder.
//!
//! Exactly one record shape is live per instrument. The processor used to
//! keep three always-allocated slots and zero them between instruments; the
//! [`ActiveRecord`] sum type makes the "one live shape" rule structural
//! while keeping the reset-between-instruments behavior.

pub mod amortizing;
pub mod bullet;
pub mod spread_evenly;

pub use amortizing::AmortizingRecord;
pub use bullet::BulletRecord;
pub use spread_evenly::SpreadEvenlyRecord;

use crate::core::ShapeCategory;

/// The one populated shape record for the currently selected instrument, or
/// `None` between instruments and for unclassifiable type codes.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ActiveRecord {
    /// No instrument selected, or the raw type code had no shape mapping.
    #[default]
    None,
    Bullet(BulletRecord),
    Amortizing(AmortizingRecord),
    SpreadEvenly(SpreadEvenlyRecord),
}

impl ActiveRecord {
    /// Shape category of the live variant.
    pub fn shape(&self) -> ShapeCategory {
        match self {
            Self::None => ShapeCategory::None,
            Self::Bullet(_) => ShapeCategory::Bullet,
            Self::Amortizing(_) => ShapeCategory::Amortizing,
            Self::SpreadEvenly(_) => ShapeCategory::SpreadEvenly,
        }
    }

    /// Discards the live variant; the next selection starts from `None`.
    pub fn reset(&mut self) {
        *self = Self::None;
    }

    /// Writes the economic-value discount method into the live record.
    /// No-op when no shape is live.
    pub fn set_econ_value_discount_method(&mut self, method: i32) {
        match self {
            Self::None => {}
            Self::Bullet(r) => r.econ_value_discount_method = method,
            Self::Amortizing(r) => r.econ_value_discount_method = method,
            Self::SpreadEvenly(r) => r.econ_value_discount_method = method,
        }
    }
}
