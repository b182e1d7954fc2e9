//! Query assets.

use super::{validate_asset_name, BatchMetadata, SqlAsset};
use crate::core::{BatchIdentifiers, BatchSource, BatchSpec, Selectable, Sorter};
use crate::engine::ExecutionEngine;
use crate::error::{BatchError, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static SELECT_PREFIX: Lazy<Regex> = Lazy::new(|| {
    // This regex is compile-time constant and known to be valid
    #[allow(clippy::expect_used)]
    Regex::new(r"(?i)^\s*SELECT\s").expect("Hard-coded regex pattern should be valid")
});

/// An asset defined by a `SELECT` statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "QueryAssetConfig", into = "QueryAssetConfig")]
pub struct QueryAsset {
    name: String,
    query: String,
    order_by: Vec<Sorter>,
    batch_metadata: BatchMetadata,
}

impl QueryAsset {
    /// Creates a query asset. The query must start with `SELECT` followed by whitespace.
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let query = query.into();
        validate_asset_name(&name)?;
        if !SELECT_PREFIX.is_match(&query) {
            return Err(BatchError::Configuration(
                "query must start with 'SELECT' followed by a whitespace.".to_string(),
            ));
        }
        Ok(Self {
            name,
            query,
            order_by: Vec::new(),
            batch_metadata: BatchMetadata::new(),
        })
    }

    pub fn with_order_by(mut self, order_by: Vec<Sorter>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn with_batch_metadata(mut self, batch_metadata: BatchMetadata) -> Self {
        self.batch_metadata = batch_metadata;
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

#[async_trait]
impl SqlAsset for QueryAsset {
    fn name(&self) -> &str {
        &self.name
    }

    fn order_by(&self) -> &[Sorter] {
        &self.order_by
    }

    fn batch_metadata(&self) -> &BatchMetadata {
        &self.batch_metadata
    }

    fn batch_spec_kwargs(&self) -> BatchSpec {
        BatchSpec {
            data_asset_name: self.name.clone(),
            source: BatchSource::RuntimeQuery {
                query: self.query.clone(),
                temp_table_schema_name: None,
            },
            partitioner_method: None,
            partitioner_kwargs: None,
            batch_identifiers: BatchIdentifiers::new(),
        }
    }

    fn as_selectable(&self) -> Selectable {
        Selectable::Query(self.query.clone())
    }

    async fn test_connection(&self, _engine: &dyn ExecutionEngine) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct QueryAssetConfig {
    name: String,
    query: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    order_by: Vec<Sorter>,
    #[serde(default, skip_serializing_if = "BatchMetadata::is_empty")]
    batch_metadata: BatchMetadata,
}

impl TryFrom<QueryAssetConfig> for QueryAsset {
    type Error = BatchError;

    fn try_from(config: QueryAssetConfig) -> Result<Self> {
        Ok(QueryAsset::new(config.name, config.query)?
            .with_order_by(config.order_by)
            .with_batch_metadata(config.batch_metadata))
    }
}

impl From<QueryAsset> for QueryAssetConfig {
    fn from(asset: QueryAsset) -> Self {
        Self {
            name: asset.name,
            query: asset.query,
            order_by: asset.order_by,
            batch_metadata: asset.batch_metadata,
        }
    }
}
