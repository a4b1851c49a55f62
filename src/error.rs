//! Errors raised while defining, validating, packing and unpacking records.
//!
//! Every error surfaces synchronously to the caller of the operation that detected it.
//! Nothing is retried and no partial record or partial byte buffer is ever returned.

use crate::order::ByteOrder;
use crate::value::Value;
use std::fmt;

pub type Result<T> = std::result::Result<T, RecordError>;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Definition: {0}")]
    Definition(#[from] DefinitionError),
    #[error("Validation: {0}")]
    Validation(#[from] ValidationError),
    #[error("Unresolved dependency: {0}")]
    UnresolvedDependency(#[from] DependencyError),
    #[error("Invalid dependency value: {field} resolved {reference} = {value}")]
    InvalidDependencyValue {
        field: String,
        reference: String,
        value: Value,
    },
    #[error("Indeterminate length: {field} depends on runtime data")]
    IndeterminateLength { field: String },
    #[error("Truncated input: {field} needs {expected} bytes, got {got}")]
    TruncatedInput {
        field: String,
        expected: usize,
        got: usize,
    },
    #[error("Unsupported source type: {0}")]
    UnsupportedSourceType(String),
    #[error("Encoding: {0}")]
    Encoding(String),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unknown field: {0}")]
    UnknownField(String),
}

/// Raised while building a record type. Always fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DefinitionError {
    #[error("{record} declares byte order {order}, which differs from base {base} ({base_order})")]
    ByteOrderConflict {
        record: String,
        order: ByteOrder,
        base: String,
        base_order: ByteOrder,
    },
    #[error("record {0} has no byte order and cannot be instantiated")]
    MissingByteOrder(String),
    #[error("{record} declares field {field} more than once")]
    DuplicateField { record: String, field: String },
    #[error("{field} references {reference}, which is declared after it")]
    ForwardReference { field: String, reference: String },
    #[error("{field}: {construct} is not supported")]
    Unsupported {
        field: String,
        construct: &'static str,
    },
    #[error("{field}: default values are only supported on primitive fields")]
    DefaultNotSupported { field: String },
    #[error("{field}: pack/unpack hooks are only supported on primitive fields")]
    HooksNotSupported { field: String },
    #[error("{field}: invalid default ({reason})")]
    InvalidDefault { field: String, reason: String },
}

/// Raised on assignment, or on pack when a value cannot be encoded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: expected {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: String,
    },
    #[error("{field}: value {value} out of range, {bound}")]
    RangeViolation {
        field: String,
        value: String,
        bound: Bound,
    },
    #[error("{field}: length {len} does not fit, allowed {allowed}")]
    LengthViolation {
        field: String,
        len: usize,
        allowed: Allowed,
    },
    #[error("{field} has no value")]
    Unset { field: String },
}

/// The bound a numeric value exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Max(i128),
    Min(i128),
    /// Magnitude beyond the largest finite `f32`.
    F32Max,
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Max(m) => write!(f, "max = {}", m),
            Bound::Min(m) => write!(f, "min = {}", m),
            Bound::F32Max => write!(f, "max = {:e}", f32::MAX),
        }
    }
}

/// Length rule a string, buffer, array or sequence value broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allowed {
    Exactly(usize),
    AtMost(usize),
}

impl fmt::Display for Allowed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Allowed::Exactly(n) => write!(f, "exactly {}", n),
            Allowed::AtMost(n) => write!(f, "at most {}", n),
        }
    }
}

/// A union selector or buffer length reference that could not be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DependencyError {
    #[error("{field} references {reference}, which is not a field of {record}")]
    NotInRecord {
        record: String,
        field: String,
        reference: String,
    },
    #[error("{field} references {reference}, which has no value")]
    Unset { field: String, reference: String },
}

impl RecordError {
    pub(crate) fn type_mismatch(field: &str, expected: &'static str, found: &Value) -> Self {
        ValidationError::TypeMismatch {
            field: field.to_string(),
            expected,
            found: found.kind_name().to_string(),
        }
        .into()
    }

    pub(crate) fn too_long(field: &str, len: usize, limit: usize) -> Self {
        ValidationError::LengthViolation {
            field: field.to_string(),
            len,
            allowed: Allowed::AtMost(limit),
        }
        .into()
    }

    pub(crate) fn unset(field: &str) -> Self {
        ValidationError::Unset {
            field: field.to_string(),
        }
        .into()
    }
}
