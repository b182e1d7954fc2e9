//! Materialized batches.

use super::options::BatchIdentifiers;
use super::request::BatchRequest;
use super::spec::BatchSpec;
use super::value::PartitionValue;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Data connector name recorded on every [`BatchDefinition`].
pub const FLUENT_DATA_CONNECTOR_NAME: &str = "fluent";

/// Rows selected for one batch, together with the statement that produced them.
#[derive(Debug, Clone)]
pub struct BatchData {
    pub sql: String,
    pub schema: SchemaRef,
    pub record_batches: Vec<RecordBatch>,
}

impl BatchData {
    pub fn num_rows(&self) -> usize {
        self.record_batches.iter().map(RecordBatch::num_rows).sum()
    }
}

/// Provenance markers recorded when a batch is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchMarkers {
    pub load_time: DateTime<Utc>,
    /// SHA-256 of the executed statement, hex encoded.
    pub fingerprint: String,
}

impl BatchMarkers {
    pub fn for_sql(sql: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(sql.as_bytes());
        Self {
            load_time: Utc::now(),
            fingerprint: hex::encode(hasher.finalize()),
        }
    }
}

/// Identity record kept for consumers that address batches by connector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchDefinition {
    pub datasource_name: String,
    pub data_connector_name: String,
    pub data_asset_name: String,
    pub batch_identifiers: BatchIdentifiers,
}

/// One materialized, addressable batch.
#[derive(Debug, Clone)]
pub struct Batch {
    id: String,
    datasource_name: String,
    data_asset_name: String,
    batch_request: BatchRequest,
    data: BatchData,
    metadata: BTreeMap<String, PartitionValue>,
    batch_markers: BatchMarkers,
    batch_spec: BatchSpec,
    batch_definition: BatchDefinition,
}

impl Batch {
    pub(crate) fn new(
        batch_request: BatchRequest,
        data: BatchData,
        metadata: BTreeMap<String, PartitionValue>,
        batch_markers: BatchMarkers,
        batch_spec: BatchSpec,
    ) -> Self {
        let datasource_name = batch_request.datasource_name.clone();
        let data_asset_name = batch_request.data_asset_name.clone();

        let mut id = format!("{datasource_name}-{data_asset_name}");
        for (key, value) in &batch_request.options {
            id.push_str(&format!("-{key}_{value}"));
        }

        let batch_definition = BatchDefinition {
            datasource_name: datasource_name.clone(),
            data_connector_name: FLUENT_DATA_CONNECTOR_NAME.to_string(),
            data_asset_name: data_asset_name.clone(),
            batch_identifiers: batch_spec.batch_identifiers.clone(),
        };

        Self {
            id,
            datasource_name,
            data_asset_name,
            batch_request,
            data,
            metadata,
            batch_markers,
            batch_spec,
            batch_definition,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn datasource_name(&self) -> &str {
        &self.datasource_name
    }

    pub fn data_asset_name(&self) -> &str {
        &self.data_asset_name
    }

    /// The concrete request this batch was materialized from.
    pub fn batch_request(&self) -> &BatchRequest {
        &self.batch_request
    }

    pub fn data(&self) -> &BatchData {
        &self.data
    }

    pub fn metadata(&self) -> &BTreeMap<String, PartitionValue> {
        &self.metadata
    }

    pub fn batch_markers(&self) -> &BatchMarkers {
        &self.batch_markers
    }

    pub fn batch_spec(&self) -> &BatchSpec {
        &self.batch_spec
    }

    pub fn batch_definition(&self) -> &BatchDefinition {
        &self.batch_definition
    }

    pub fn num_rows(&self) -> usize {
        self.data.num_rows()
    }
}
