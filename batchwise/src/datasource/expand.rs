//! Expansion of template batch requests into concrete ones.

use crate::assets::SqlAsset;
use crate::core::{BatchRequest, BatchRequestOptions, PartitionValue};
use crate::engine::ExecutionEngine;
use crate::error::Result;
use crate::logging::{truncate_field, LogConfig};
use crate::partitioners::SqlPartitioner;

/// Whether a discovered partition satisfies the caller's options.
///
/// `Null` requested values are wildcards and match anything, including a
/// discovered `Null`. Temporal values compare in their string form.
pub fn matches_request_options(
    candidate: &BatchRequestOptions,
    requested: &BatchRequestOptions,
) -> bool {
    requested.iter().all(|(key, wanted)| {
        if wanted.is_null() {
            return true;
        }
        match candidate.get(key) {
            Some(found) => found
                .clone()
                .coerce_temporal()
                .loosely_equals(&wanted.clone().coerce_temporal()),
            None => false,
        }
    })
}

/// Replaces a template request with one concrete request per matching partition.
///
/// Without a partitioner the request is returned as-is. Discovery order is
/// kept and duplicates are not removed.
pub async fn fully_specified_batch_requests(
    asset: &dyn SqlAsset,
    partitioner: Option<&SqlPartitioner>,
    request: &BatchRequest,
    engine: &dyn ExecutionEngine,
    log_config: &LogConfig,
) -> Result<Vec<BatchRequest>> {
    let Some(partitioner) = partitioner else {
        return Ok(vec![request.clone()]);
    };

    let mut requests = Vec::new();
    for params in partitioner.param_defaults(asset, engine).await? {
        let params: BatchRequestOptions = params
            .into_iter()
            .map(|(k, v)| (k, PartitionValue::coerce_temporal(v)))
            .collect();
        if !matches_request_options(&params, &request.options) {
            continue;
        }
        crate::log_partition!(
            log_config,
            data_asset_name = asset.name(),
            options = %truncate_field(&format!("{params:?}"), log_config.max_field_length),
            "Partition matches batch request"
        );
        let mut options = request.options.clone();
        options.extend(params);
        requests.push(request.with_concrete_options(options));
    }
    Ok(requests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::TableAsset;
    use crate::core::{
        options_from, BatchIdentifiers, Partitioner, PartitionerKwargs, PartitionerMethod,
        Selectable,
    };
    use crate::datasource::DatasourceKind;
    use crate::engine::SqlDialect;
    use crate::error::BatchError;
    use arrow::datatypes::SchemaRef;
    use arrow::record_batch::RecordBatch;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    /// Replays fixed discovery records, in order, without running SQL.
    #[derive(Debug)]
    struct ReplayEngine {
        records: Vec<BatchIdentifiers>,
    }

    #[async_trait]
    impl ExecutionEngine for ReplayEngine {
        fn dialect(&self) -> SqlDialect {
            SqlDialect::DataFusion
        }

        async fn execute(&self, sql: &str) -> Result<(SchemaRef, Vec<RecordBatch>)> {
            Err(BatchError::Internal(format!("unexpected statement: {sql}")))
        }

        async fn schema_names(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn get_data_for_batch_identifiers(
            &self,
            _selectable: &Selectable,
            _method: PartitionerMethod,
            _kwargs: &PartitionerKwargs,
        ) -> Result<Vec<BatchIdentifiers>> {
            Ok(self.records.clone())
        }
    }

    fn vendor_record(vendor: &str) -> BatchIdentifiers {
        BatchIdentifiers::from([("vendor".to_string(), PartitionValue::from(vendor).into())])
    }

    #[tokio::test]
    async fn test_discovery_order_and_duplicates_are_kept() {
        let engine = ReplayEngine {
            records: vec![vendor_record("VTS"), vendor_record("CMT"), vendor_record("VTS")],
        };
        let asset = TableAsset::new("trips", "trips").unwrap();
        let partitioner = SqlPartitioner::for_family(
            &Partitioner::column_value("vendor").unwrap(),
            DatasourceKind::Sql,
        )
        .unwrap();

        let requests = fully_specified_batch_requests(
            &asset,
            Some(&partitioner),
            &BatchRequest::new("db", "trips"),
            &engine,
            &LogConfig::default(),
        )
        .await
        .unwrap();

        let vendors: Vec<String> = requests
            .iter()
            .map(|r| r.options["vendor"].to_string())
            .collect();
        assert_eq!(vendors, vec!["VTS", "CMT", "VTS"]);

        let only_vts = fully_specified_batch_requests(
            &asset,
            Some(&partitioner),
            &BatchRequest::new("db", "trips").with_options(options_from([("vendor", "VTS")])),
            &engine,
            &LogConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(only_vts.len(), 2);
    }

    #[test]
    fn test_null_is_wildcard() {
        let requested = options_from([
            ("year", PartitionValue::Int(2020)),
            ("month", PartitionValue::Null),
        ]);
        assert!(matches_request_options(
            &options_from([("year", 2020), ("month", 1)]),
            &requested
        ));
        assert!(!matches_request_options(
            &options_from([("year", 2021), ("month", 1)]),
            &requested
        ));
    }

    #[test]
    fn test_null_wildcard_also_matches_discovered_null() {
        // a requested null cannot distinguish "any value" from "the null partition"
        let requested = options_from([("vendor", PartitionValue::Null)]);
        assert!(matches_request_options(
            &options_from([("vendor", PartitionValue::Null)]),
            &requested
        ));
        assert!(matches_request_options(
            &options_from([("vendor", "CMT")]),
            &requested
        ));
    }

    #[test]
    fn test_dates_compare_as_strings() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let candidate = options_from([("pickup_date", PartitionValue::Date(date))]);
        assert!(matches_request_options(
            &candidate,
            &options_from([("pickup_date", "2020-01-01")])
        ));
        assert!(matches_request_options(
            &candidate,
            &options_from([("pickup_date", PartitionValue::Date(date))])
        ));
    }

    #[test]
    fn test_numeric_matching_is_loose() {
        assert!(matches_request_options(
            &options_from([("remainder", PartitionValue::Int(2))]),
            &options_from([("remainder", PartitionValue::Float(2.0))])
        ));
    }
}
