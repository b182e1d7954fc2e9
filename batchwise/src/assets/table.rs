//! Table assets.

use super::{validate_asset_name, BatchMetadata, SqlAsset};
use crate::core::{BatchIdentifiers, BatchSource, BatchSpec, Selectable, Sorter};
use crate::engine::ExecutionEngine;
use crate::error::{BatchError, Result};
use crate::security::SqlSecurity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, instrument};

/// A table name, remembering whether the user quoted it.
///
/// A name bracketed by one matching pair of `'` or `"` is stored without the
/// quotes and rendered double-quoted, preserving its case. Anything else must
/// be a plain identifier and is rendered as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    name: String,
    quoted: bool,
}

impl TableName {
    pub fn parse(raw: &str) -> Result<Self> {
        for quote in ['"', '\''] {
            if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
                let inner = &raw[1..raw.len() - 1];
                if inner.is_empty() {
                    return Err(BatchError::Configuration(
                        "table name cannot be an empty quoted string".to_string(),
                    ));
                }
                return Ok(Self {
                    name: inner.to_string(),
                    quoted: true,
                });
            }
        }
        SqlSecurity::validate_identifier(raw)?;
        Ok(Self {
            name: raw.to_string(),
            quoted: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_quoted(&self) -> bool {
        self.quoted
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quoted {
            write!(f, "\"{}\"", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// An asset backed by a physical table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TableAssetConfig", into = "TableAssetConfig")]
pub struct TableAsset {
    name: String,
    table_name: TableName,
    schema_name: Option<String>,
    order_by: Vec<Sorter>,
    batch_metadata: BatchMetadata,
}

impl TableAsset {
    /// Creates a table asset; an empty `table_name` defaults to `name`.
    pub fn new(name: impl Into<String>, table_name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let table_name = table_name.into();
        let effective = if table_name.is_empty() {
            name.as_str()
        } else {
            table_name.as_str()
        };
        if effective.is_empty() {
            return Err(BatchError::Configuration(
                "table_name cannot be empty and should default to name if not provided"
                    .to_string(),
            ));
        }
        let table_name = TableName::parse(effective)?;
        validate_asset_name(&name)?;
        Ok(Self {
            name,
            table_name,
            schema_name: None,
            order_by: Vec::new(),
            batch_metadata: BatchMetadata::new(),
        })
    }

    pub fn with_schema_name(mut self, schema_name: impl Into<String>) -> Result<Self> {
        let schema_name = schema_name.into();
        SqlSecurity::validate_identifier(&schema_name)?;
        self.schema_name = Some(schema_name);
        Ok(self)
    }

    pub fn with_order_by(mut self, order_by: Vec<Sorter>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn with_batch_metadata(mut self, batch_metadata: BatchMetadata) -> Self {
        self.batch_metadata = batch_metadata;
        self
    }

    pub fn table_name(&self) -> &TableName {
        &self.table_name
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.schema_name.as_deref()
    }

    /// `schema.table` or `table`.
    pub fn qualified_name(&self) -> String {
        match &self.schema_name {
            Some(schema) => format!("{schema}.{}", self.table_name),
            None => self.table_name.to_string(),
        }
    }
}

#[async_trait]
impl SqlAsset for TableAsset {
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
            source: BatchSource::Table {
                table_name: self.table_name.name.clone(),
                schema_name: self.schema_name.clone(),
                quoted: self.table_name.quoted,
            },
            partitioner_method: None,
            partitioner_kwargs: None,
            batch_identifiers: BatchIdentifiers::new(),
        }
    }

    fn as_selectable(&self) -> Selectable {
        Selectable::Table {
            name: self.table_name.name.clone(),
            schema: self.schema_name.clone(),
            quoted: self.table_name.quoted,
        }
    }

    #[instrument(skip(self, engine), fields(asset = %self.name))]
    async fn test_connection(&self, engine: &dyn ExecutionEngine) -> Result<()> {
        let qualified_name = self.qualified_name();

        if let Some(schema) = &self.schema_name {
            let schemas = engine.schema_names().await.map_err(|e| {
                BatchError::test_connection_with_source(
                    format!("Attempt to list schemas for table: {qualified_name} failed"),
                    Box::new(e),
                )
            })?;
            if !schemas.iter().any(|s| s == schema) {
                return Err(BatchError::test_connection(format!(
                    "Attempt to connect to table: \"{qualified_name}\" failed because the schema \"{schema}\" does not exist."
                )));
            }
        }

        let sql = format!("SELECT 1 FROM {} LIMIT 1", self.as_selectable().render()?);
        if let Err(query_error) = engine.execute(&sql).await {
            info!(error = %query_error, "{} test_connection query failed", self.name);
            return Err(BatchError::test_connection_with_source(
                format!(
                    "Attempt to connect to table: {qualified_name} failed because the test query failed. \
                     Ensure the table exists and the user has access to select data from the table: {query_error}"
                ),
                Box::new(query_error),
            ));
        }
        Ok(())
    }
}

/// Serialized form of a [`TableAsset`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableAssetConfig {
    name: String,
    #[serde(default)]
    table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    order_by: Vec<Sorter>,
    #[serde(default, skip_serializing_if = "BatchMetadata::is_empty")]
    batch_metadata: BatchMetadata,
}

impl TryFrom<TableAssetConfig> for TableAsset {
    type Error = BatchError;

    fn try_from(config: TableAssetConfig) -> Result<Self> {
        let mut asset = TableAsset::new(config.name, config.table_name)?
            .with_order_by(config.order_by)
            .with_batch_metadata(config.batch_metadata);
        if let Some(schema_name) = config.schema_name {
            asset = asset.with_schema_name(schema_name)?;
        }
        Ok(asset)
    }
}

impl From<TableAsset> for TableAssetConfig {
    fn from(asset: TableAsset) -> Self {
        Self {
            table_name: asset.table_name.to_string(),
            name: asset.name,
            schema_name: asset.schema_name,
            order_by: asset.order_by,
            batch_metadata: asset.batch_metadata,
        }
    }
}
