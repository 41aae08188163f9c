use thiserror::Error;

/// Crate-wide error type.
///
/// Variants mirror the error kinds a caller needs to distinguish: malformed
/// binary framing, a stream that ended early, a failed partial-key lookup, and
/// a solution-assembly cross-check that didn't hold. `SetMismatch` is
/// deliberately absent here; the set validator collects mismatches rather
/// than raising them (see `crate::validator`).
#[derive(Error, Debug)]
pub enum HarError {
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("unexpected end of file while reading a record")]
    UnexpectedEof,

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("data validation failed for {field}: expected {expected:?}, found {actual:?}")]
    DataValidation {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    #[error("ZIP archive error")]
    Zip(#[from] zip::result::ZipError),
}

impl HarError {
    pub fn invalid_data<S: Into<String>>(detail: S) -> Self {
        HarError::InvalidData(detail.into())
    }
}

/// Crate's Result type.
pub type Result<T> = std::result::Result<T, HarError>;
