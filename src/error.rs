use serde::Serialize;

/// Errors that reach callers of the store layer.
///
/// Malformed data and missing records are recovered inside the stores
/// (fallback values, `None`, `Ok(false)`); only conditions a UI should warn
/// about are represented here.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage not available")]
    NotAvailable,
    #[error("quota exceeded writing '{key}' ({needed} bytes needed, limit {limit})")]
    QuotaExceeded { key: String, needed: usize, limit: usize },
    #[error("encode: {0}")]
    Encode(String),
    #[error("io: {0}")]
    Io(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Encode(e.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

/// Serializable banner payload a UI layer can render as a warning.
#[derive(Debug, Serialize)]
pub struct StoreErrorBody {
    pub error: String,
    pub recoverable: bool,
}

impl StoreError {
    pub fn is_quota(&self) -> bool {
        matches!(self, StoreError::QuotaExceeded { .. })
    }

    pub fn body(&self) -> StoreErrorBody {
        StoreErrorBody {
            error: self.to_string(),
            recoverable: !matches!(self, StoreError::Io(_)),
        }
    }
}
