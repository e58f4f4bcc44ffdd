//! Time-entry computation: overlap-union hours with configurable rounding.
//!
//! The computer is a pure function from one day's classified events to
//! per-project entries. Identical inputs always produce identical outputs,
//! including the entry ids.

mod computer;
mod rounding;

pub use computer::{
    compute_day, entry_id, CalculationDetails, ComputedEntry, EventCalculation, EventInput,
    RangeCalculation, TIME_ENTRY_NAMESPACE,
};
pub use rounding::{round_minutes, RoundingAdjustment, RoundingConfig};
