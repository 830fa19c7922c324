//! Pure snapshot construction: validate, normalize, weight and hash.
//!
//! Nothing in this module touches storage. Builders return aggregates that
//! the repositories persist as a unit.

pub mod hash;
pub mod price;
pub mod universe;
mod validation;

pub use price::{build_price_snapshot, FactorInput, PriceInput, PriceSnapshotInput};
pub use universe::{
    build_universe_snapshot, ConstituentInput, UniverseSnapshotBuilder, UniverseSnapshotInput,
    DEFAULT_CONSTITUENT_COUNT,
};
