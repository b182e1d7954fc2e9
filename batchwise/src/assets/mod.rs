//! Data assets: the logical sources batches are cut from.
//!
//! A [`TableAsset`] reads a physical table, a [`QueryAsset`] wraps a `SELECT`
//! statement. Both implement [`SqlAsset`], which is all the partitioning and
//! materialization code needs to know about an asset.

use crate::core::{BatchRequestOptions, BatchSpec, Selectable, Sorter};
use crate::engine::ExecutionEngine;
use crate::error::{BatchError, Result};
use crate::partitioners::SqlPartitioner;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

mod query;
mod table;

pub use query::QueryAsset;
pub use table::{TableAsset, TableName};

/// Free-form metadata attached to every batch of an asset.
///
/// String values may contain `${VAR}` placeholders, substituted when a batch
/// is built.
pub type BatchMetadata = BTreeMap<String, serde_json::Value>;

/// Capabilities shared by SQL-backed assets.
#[async_trait]
pub trait SqlAsset: Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Default sort order for batch lists.
    fn order_by(&self) -> &[Sorter];

    fn batch_metadata(&self) -> &BatchMetadata;

    /// The unpartitioned spec for this asset.
    fn batch_spec_kwargs(&self) -> BatchSpec;

    /// The `FROM` target used for discovery and materialization.
    fn as_selectable(&self) -> Selectable;

    /// Checks that the asset is reachable through `engine`.
    async fn test_connection(&self, engine: &dyn ExecutionEngine) -> Result<()>;

    /// Builds the batch spec for one concrete request.
    fn create_batch_spec(
        &self,
        partitioner: Option<&SqlPartitioner>,
        options: &BatchRequestOptions,
    ) -> Result<BatchSpec> {
        let mut spec = self.batch_spec_kwargs();
        if let Some(partitioner) = partitioner {
            spec.partitioner_method = Some(partitioner.method());
            spec.partitioner_kwargs = Some(partitioner.partitioner_method_kwargs());
            spec.batch_identifiers
                .extend(partitioner.batch_request_options_to_batch_identifiers(options)?);
        }
        Ok(spec)
    }
}

/// Any asset a SQL datasource can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DataAsset {
    Table(TableAsset),
    Query(QueryAsset),
}

impl DataAsset {
    pub fn name(&self) -> &str {
        self.as_sql_asset().name()
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            DataAsset::Table(_) => "table",
            DataAsset::Query(_) => "query",
        }
    }

    pub fn as_sql_asset(&self) -> &dyn SqlAsset {
        match self {
            DataAsset::Table(asset) => asset,
            DataAsset::Query(asset) => asset,
        }
    }
}

impl From<TableAsset> for DataAsset {
    fn from(asset: TableAsset) -> Self {
        DataAsset::Table(asset)
    }
}

impl From<QueryAsset> for DataAsset {
    fn from(asset: QueryAsset) -> Self {
        DataAsset::Query(asset)
    }
}

pub(crate) fn validate_asset_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(BatchError::Configuration(
            "data asset name cannot be empty".to_string(),
        ));
    }
    Ok(())
}
