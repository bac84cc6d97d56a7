//! Core type definitions for the reconciliation engine.
//!
//! This crate defines the data model shared by every other crate:
//! - [`Record`] and [`Field`], a generic tagged tree standing in for any
//!   structured record (built explicitly or through the JSON adapter)
//! - [`Value`], the closed scalar variant carried by leaves and differences
//! - [`FieldPath`], the dotted address of a leaf
//! - [`Difference`] and [`DifferenceKind`], one detected mismatch or missing row
//! - [`Side`] and [`RunId`] for correlation bookkeeping
//!
//! Nothing here knows about any particular wire format or schema; schemas are
//! described by policies in `recon-compare`.

mod difference;
mod ids;
mod path;
mod record;
mod value;

pub use difference::{Difference, DifferenceKind, Side, MISSING_ROW_PATH};
pub use ids::RunId;
pub use path::FieldPath;
pub use record::{Field, Record};
pub use value::Value;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("expected a JSON object at the record root, found {0}")]
    NotAnObject(&'static str),

    #[error("invalid difference kind: {0}")]
    InvalidDifferenceKind(String),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),
}
