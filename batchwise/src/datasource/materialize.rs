//! Turning concrete batch requests into sorted, sliced batch lists.

use super::expand::fully_specified_batch_requests;
use crate::assets::SqlAsset;
use crate::config::{substitute_json, ConfigProvider};
use crate::core::{Batch, BatchRequest, PartitionValue, Sorter};
use crate::engine::ExecutionEngine;
use crate::error::{BatchError, Result};
use crate::logging::LogConfig;
use crate::partitioners::SqlPartitioner;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// Everything the materializer needs besides the asset and the request.
pub(crate) struct MaterializeContext<'a> {
    pub engine: &'a dyn ExecutionEngine,
    pub config_provider: &'a dyn ConfigProvider,
    pub log_config: &'a LogConfig,
}

/// Expands, materializes, sorts and slices the batches for `request`.
pub(crate) async fn get_batch_list(
    asset: &dyn SqlAsset,
    partitioner: Option<&SqlPartitioner>,
    request: &BatchRequest,
    ctx: MaterializeContext<'_>,
) -> Result<Vec<Batch>> {
    let sorters: &[Sorter] = if request.sorters.is_empty() {
        asset.order_by()
    } else {
        &request.sorters
    };
    validate_sort_keys(asset, partitioner, sorters)?;

    let requests =
        fully_specified_batch_requests(asset, partitioner, request, ctx.engine, ctx.log_config)
            .await?;
    crate::perf_debug!(
        ctx.log_config,
        data_asset_name = asset.name(),
        requests = requests.len(),
        "Expanded batch request"
    );

    let mut batches = Vec::with_capacity(requests.len());
    for concrete in requests {
        let metadata = batch_metadata(asset, &concrete, ctx.config_provider)?;
        let spec = asset.create_batch_spec(partitioner, &concrete.options)?;
        let (data, markers) = ctx.engine.get_batch_data_and_markers(&spec).await?;
        crate::log_data_op!(
            ctx.log_config,
            data_asset_name = asset.name(),
            rows = data.num_rows(),
            fingerprint = %markers.fingerprint,
            "Materialized batch"
        );
        batches.push(Batch::new(concrete, data, metadata, markers, spec));
    }

    sort_batches(&mut batches, sorters);
    Ok(match request.batch_slice {
        Some(slice) => slice.apply(batches),
        None => batches,
    })
}

/// Asset metadata with config substitution applied, overridden by the request options.
fn batch_metadata(
    asset: &dyn SqlAsset,
    request: &BatchRequest,
    provider: &dyn ConfigProvider,
) -> Result<BTreeMap<String, PartitionValue>> {
    let mut metadata = BTreeMap::new();
    for (key, value) in asset.batch_metadata() {
        metadata.insert(key.clone(), PartitionValue::from(substitute_json(value, provider)?));
    }
    metadata.extend(
        request
            .options
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    Ok(metadata)
}

/// Fails when a sort key can be resolved neither from options nor metadata.
fn validate_sort_keys(
    asset: &dyn SqlAsset,
    partitioner: Option<&SqlPartitioner>,
    sorters: &[Sorter],
) -> Result<()> {
    let mut known: HashSet<String> = asset.batch_metadata().keys().cloned().collect();
    if let Some(partitioner) = partitioner {
        known.extend(partitioner.param_names());
    }
    for sorter in sorters {
        if !known.contains(&sorter.key) {
            let mut available: Vec<&String> = known.iter().collect();
            available.sort();
            return Err(BatchError::Configuration(format!(
                "Cannot sort batches of '{}' by '{}': the key is not a batch request option or metadata key. Available keys: {available:?}",
                asset.name(),
                sorter.key
            )));
        }
    }
    Ok(())
}

static MISSING_SORT_VALUE: PartitionValue = PartitionValue::Null;

fn sort_value<'a>(batch: &'a Batch, key: &str) -> &'a PartitionValue {
    batch
        .batch_request()
        .options
        .get(key)
        .or_else(|| batch.metadata().get(key))
        .unwrap_or(&MISSING_SORT_VALUE)
}

/// Stable multi-key sort; earlier sorters take precedence.
pub(crate) fn sort_batches(batches: &mut [Batch], sorters: &[Sorter]) {
    if sorters.is_empty() {
        return;
    }
    batches.sort_by(|a, b| {
        for sorter in sorters {
            let ordering = sort_value(a, &sorter.key).total_cmp(sort_value(b, &sorter.key));
            let ordering = if sorter.reverse {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}
