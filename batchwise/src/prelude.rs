//! Prelude for commonly used types and traits in batchwise.

pub use crate::assets::{DataAsset, QueryAsset, SqlAsset, TableAsset};
pub use crate::config::{ConfigProvider, ConfigStr, EnvConfigProvider, MapConfigProvider};
pub use crate::core::{
    options_from, Batch, BatchRequest, BatchRequestOptions, BatchSlice, DatePart, PartitionValue,
    Partitioner, Sorter,
};
pub use crate::datasource::{AssetHandle, DatasourceConfig, DatasourceKind, SqlDatasource};
pub use crate::engine::{DataFusionEngineFactory, EngineFactory, ExecutionEngine};
#[cfg(feature = "sqlite")]
pub use crate::engine::SqliteEngineFactory;
pub use crate::error::{BatchError, Result};
pub use crate::logging::LogConfig;
