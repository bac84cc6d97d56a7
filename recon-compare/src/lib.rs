//! Field-level comparison of same-keyed records.
//!
//! A [`FieldComparator`] flattens both records into leaf paths, drops the
//! paths the schema ignores, and decides equality per path:
//!
//! 1. a custom predicate registered for the exact path, if any;
//! 2. for two numbers, rounding (half-up by default, or truncation) to the
//!    path's decimal precision, compared as fixed-scale strings;
//! 3. otherwise exact equality (absent equals absent).
//!
//! Every unequal path yields one `VALUE_MISMATCH` [`recon_types::Difference`].
//!
//! # Example
//!
//! ```
//! use recon_compare::{FieldComparator, SchemaPolicy};
//! use recon_types::Record;
//!
//! let policy = SchemaPolicy::keyed_by("id").with_precision("price", 2);
//! let comparator = FieldComparator::new(policy);
//!
//! let left = Record::new().with("id", "A").with("price", 10.0);
//! let right = Record::new().with("id", "A").with("price", 10.001);
//! assert!(comparator.compare(&left, &right).unwrap().is_empty());
//! ```

mod comparator;
mod error;
mod flatten;
pub mod numeric;
mod policy;

pub use comparator::FieldComparator;
pub use error::{CompareError, CompareResult};
pub use flatten::{flatten, flatten_excluding, FlatRecord};
pub use numeric::Rounding;
pub use policy::{
    FieldPredicate, PolicyConfig, PrecisionFn, PrimaryKeyFn, SchemaPolicy, DEFAULT_PRECISION,
};
