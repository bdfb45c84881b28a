use thiserror::Error;

use crate::conversion::FixedPointFormat;
use crate::header::FieldName;

#[derive(Error, Debug)]
pub enum SigmaDspError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("fields '{first}' and '{second}' overlap")]
    OverlappingFields { first: FieldName, second: FieldName },
    #[error("unknown operation key 0x{0:02X}")]
    UnknownOperation(u8),
    #[error("invalid value for field '{field}': {reason}")]
    InvalidFieldValue { field: FieldName, reason: String },
    #[error("header has no field '{0}'")]
    UnknownField(FieldName),

    #[error("cannot safeload {requested} words, the chip stages at most {capacity}")]
    SafeloadCapacityExceeded { requested: usize, capacity: usize },
    #[error("value {value} does not fit the {format} fixed-point format")]
    FixedPointOverflow { value: f64, format: FixedPointFormat },

    #[error("bus error: {0}")]
    Bus(String),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("DSP worker is not running")]
    WorkerGone,
    #[error("payload of {length} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge { length: usize, limit: usize },

    #[error("configuration error: {0}")]
    Config(String),
}
