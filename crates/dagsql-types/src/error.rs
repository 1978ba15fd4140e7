use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    /// A stored type tag is not one of the defined variants.
    #[error("unrecognized type tag: {0}")]
    UnrecognizedType(i64),

    /// A host value has no mapping into the stored value model.
    #[error("unsupported host type: {0}")]
    UnsupportedHostType(String),

    /// Map keys must be text.
    #[error("map keys must be strings, got {0}")]
    NonTextMapKey(String),

    /// An integer does not fit the 64-bit magnitude contract.
    #[error("integer magnitude out of range: {0}")]
    MagnitudeOverflow(String),

    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
