//! Error taxonomy for table-schema extraction

use crate::db::ProviderError;

/// Why an extraction failed. An extraction either fully succeeds or fails
/// with exactly one of these.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Schema or table name could not be resolved from the input
    #[error("{0}")]
    Configuration(String),

    /// The table or schema does not exist in the target database
    #[error("{0}")]
    NotFound(String),

    /// Connectivity, authentication, timeout or provider-internal failure
    #[error("database unavailable: {0:#}")]
    ProviderUnavailable(anyhow::Error),

    /// Key metadata disagrees with the column list
    #[error("inconsistent metadata for table '{table}': {detail}")]
    Malformed { table: String, detail: String },
}

impl From<ProviderError> for SchemaError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(msg) => SchemaError::NotFound(msg),
            ProviderError::Unavailable(e) => SchemaError::ProviderUnavailable(e),
        }
    }
}

impl SchemaError {
    /// Process exit code the CLI reports for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            SchemaError::Configuration(_) => 2,
            SchemaError::NotFound(_)
            | SchemaError::ProviderUnavailable(_)
            | SchemaError::Malformed { .. } => 1,
        }
    }
}
