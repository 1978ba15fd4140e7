use dagsql_types::TypeError;

/// Errors from encoding or decoding canonical DAG-CBOR.
#[derive(Debug, thiserror::Error)]
pub enum CborError {
    /// A node or value could not be mapped to CBOR (for example an
    /// unrecognized stored type tag).
    #[error(transparent)]
    Type(#[from] TypeError),

    /// Writing to the output sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input ended inside an item.
    #[error("truncated input at offset {offset}: need {needed} more bytes")]
    Truncated { offset: usize, needed: u64 },

    /// A length or value used a longer form than necessary.
    #[error("non-minimal header at offset {offset}")]
    NonMinimalHeader { offset: usize },

    /// Reserved additional-information values 28..=30.
    #[error("malformed header byte {byte:#04x} at offset {offset}")]
    MalformedHeader { offset: usize, byte: u8 },

    #[error("indefinite-length item at offset {offset}")]
    IndefiniteLength { offset: usize },

    /// Tags (major type 6) are not part of the subset.
    #[error("unsupported major type {major} at offset {offset}")]
    UnsupportedMajorType { offset: usize, major: u8 },

    /// Only `false`, `true` and `null` are accepted; floats and other simple
    /// values are not.
    #[error("unsupported simple value {info} at offset {offset}")]
    UnsupportedSimple { offset: usize, info: u8 },

    #[error("invalid UTF-8 in text string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("map key at offset {offset} is not a text string")]
    NonTextMapKey { offset: usize },

    /// Keys must strictly increase in canonical order; equal keys are
    /// duplicates.
    #[error("map key at offset {offset} is out of canonical order or duplicated")]
    MapKeyOrder { offset: usize },

    #[error("{count} trailing bytes after the top-level item")]
    TrailingBytes { count: usize },
}

/// Result alias for CBOR operations.
pub type CborResult<T> = Result<T, CborError>;
