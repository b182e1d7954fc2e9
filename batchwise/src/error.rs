//! Error types for the batchwise library.
//!
//! All errors raised while partitioning, expanding and materializing batches are
//! represented by the [`BatchError`] enum. Errors fall into four families:
//!
//! - **configuration** errors, raised when a descriptor, asset or datasource is
//!   constructed with values that can never work;
//! - **invalid request** errors, raised when batch request options do not line
//!   up with the partitioner in use;
//! - **unimplemented partitioner** errors, raised when a backend family has no
//!   concrete implementation for an abstract partitioner;
//! - **connectivity/backend** errors, which wrap or forward failures from the
//!   execution engine.
//!
//! None of these are retried by the library.

use thiserror::Error;

/// The main error type for the batchwise library.
#[derive(Error, Debug)]
pub enum BatchError {
    /// A descriptor, asset or datasource was configured with invalid values.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Batch request options do not match the keys allowed by the partitioner.
    #[error("Invalid batch request: {message}")]
    InvalidBatchRequest {
        /// Human-readable error message
        message: String,
        /// Option keys the partitioner allows
        allowed: Vec<String>,
        /// Option keys the request actually carried
        actual: Vec<String>,
    },

    /// A parameter required to identify a batch is absent from the options.
    #[error("'{option}' must be specified in the batch request options")]
    MissingBatchOption {
        /// Name of the missing option
        option: String,
    },

    /// The backend family has no implementation for the requested partitioner.
    #[error(
        "Requested partitioner `{method_name}` is not implemented for {datasource_type} data assets"
    )]
    PartitionerNotImplemented {
        /// Method name of the abstract partitioner
        method_name: String,
        /// Datasource family that lacks the implementation
        datasource_type: String,
    },

    /// An asset with the given name does not belong to the datasource.
    #[error("Data asset '{asset}' not found in datasource '{datasource}'")]
    AssetNotFound { datasource: String, asset: String },

    /// A connectivity check against the backend failed.
    #[error("Test connection failed: {message}")]
    TestConnection {
        /// Detailed error message, including the asset or table identity
        message: String,
        /// Underlying backend error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The backend connection handle could not be created.
    #[error("Unable to create an execution engine: {message}")]
    EngineCreation {
        /// Detailed error message
        message: String,
        /// Underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from the SQLite backend.
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Security-related error.
    #[error("Security error: {0}")]
    SecurityError(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, BatchError>`.
pub type Result<T> = std::result::Result<T, BatchError>;

impl BatchError {
    /// Creates an invalid batch request error from the allowed and actual key sets.
    pub fn invalid_batch_request(
        message: impl Into<String>,
        allowed: impl IntoIterator<Item = impl Into<String>>,
        actual: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::InvalidBatchRequest {
            message: message.into(),
            allowed: allowed.into_iter().map(Into::into).collect(),
            actual: actual.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a missing batch option error.
    pub fn missing_option(option: impl Into<String>) -> Self {
        Self::MissingBatchOption {
            option: option.into(),
        }
    }

    /// Creates a test connection error without an underlying cause.
    pub fn test_connection(message: impl Into<String>) -> Self {
        Self::TestConnection {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a test connection error wrapping the backend error.
    pub fn test_connection_with_source(
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::TestConnection {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates an engine creation error wrapping the underlying cause.
    pub fn engine_creation_with_source(
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::EngineCreation {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Returns true if this error signals a malformed batch request.
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            BatchError::InvalidBatchRequest { .. } | BatchError::MissingBatchOption { .. }
        )
    }

    /// Returns true if the operation should be retried.
    ///
    /// Discovery and materialization failures are configuration or connectivity
    /// problems, so nothing raised by this crate is retryable.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

impl From<serde_json::Error> for BatchError {
    fn from(e: serde_json::Error) -> Self {
        BatchError::Serialization(e.to_string())
    }
}
