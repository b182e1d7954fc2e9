//! Batch materialization against a file-backed SQLite database.

#![cfg(feature = "sqlite")]

use arrow::array::{Array, Int64Array};
use batchwise::prelude::*;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn create_database() -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    let conn = rusqlite::Connection::open(file.path()).unwrap();
    conn.execute_batch(
        "CREATE TABLE trips (
            id INTEGER PRIMARY KEY,
            vendor TEXT,
            fare REAL NOT NULL,
            pickup_datetime TEXT NOT NULL
        );
        INSERT INTO trips (id, vendor, fare, pickup_datetime) VALUES
            (1, 'CMT', 7.5, '2020-01-03 10:00:00'),
            (2, 'VTS', 12.0, '2020-01-15 12:30:00'),
            (3, 'CMT', 5.25, '2020-01-15 23:59:59'),
            (4, 'VTS', 30.0, '2020-02-01 00:00:00'),
            (5, NULL, 8.0, '2020-02-11 08:30:00'),
            (6, 'CMT', 16.5, '2021-03-04 06:00:00');",
    )
    .unwrap();
    file
}

fn connection_string(file: &NamedTempFile) -> String {
    // sqlite:// followed by an absolute path yields four slashes
    format!("sqlite:///{}", file.path().display())
}

fn datasource(file: &NamedTempFile) -> SqlDatasource {
    let mut datasource = SqlDatasource::sqlite("local", connection_string(file)).unwrap();
    datasource
        .add_table_asset(TableAsset::new("trips", "trips").unwrap())
        .unwrap();
    datasource
}

fn ids(batch: &Batch) -> Vec<i64> {
    let mut ids = Vec::new();
    for rb in &batch.data().record_batches {
        let column = rb
            .column_by_name("id")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        ids.extend((0..column.len()).map(|i| column.value(i)));
    }
    ids.sort_unstable();
    ids
}

#[tokio::test]
async fn test_converted_datetime_partitions() {
    let file = create_database();
    let datasource = datasource(&file);
    let trips = datasource.asset("trips").unwrap();
    let request = trips
        .build_batch_request(
            None,
            None,
            Some(Partitioner::converted_datetime("pickup_datetime", "%Y-%m").unwrap()),
            Some(vec![Sorter::ascending("datetime")]),
        )
        .unwrap();

    let batches = trips.get_batch_list_from_batch_request(&request).await.unwrap();
    let keys: Vec<_> = batches
        .iter()
        .map(|b| b.metadata()["datetime"].clone())
        .collect();
    assert_eq!(
        keys,
        vec![
            PartitionValue::from("2020-01"),
            PartitionValue::from("2020-02"),
            PartitionValue::from("2021-03"),
        ]
    );
    assert_eq!(ids(&batches[0]), vec![1, 2, 3]);
    assert!(batches[0]
        .data()
        .sql
        .contains(r#"strftime('%Y-%m', "pickup_datetime")"#));
}

#[tokio::test]
async fn test_converted_datetime_with_requested_value() {
    let file = create_database();
    let datasource = datasource(&file);
    let trips = datasource.asset("trips").unwrap();
    let request = trips
        .build_batch_request(
            Some(options_from([("datetime", "2020-02")])),
            None,
            Some(Partitioner::converted_datetime("pickup_datetime", "%Y-%m").unwrap()),
            None,
        )
        .unwrap();

    let batches = trips.get_batch_list_from_batch_request(&request).await.unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(ids(&batches[0]), vec![4, 5]);
}

#[tokio::test]
async fn test_datetime_parts_with_wildcard() {
    let file = create_database();
    let datasource = datasource(&file);
    let trips = datasource.asset("trips").unwrap();
    let request = trips
        .build_batch_request(
            Some(options_from([
                ("year", PartitionValue::Int(2020)),
                ("day", PartitionValue::Null),
            ])),
            None,
            Some(Partitioner::datetime_part("pickup_datetime", ["year", "day"]).unwrap()),
            Some(Sorter::parse_all(["+day"]).unwrap()),
        )
        .unwrap();

    let batches = trips.get_batch_list_from_batch_request(&request).await.unwrap();
    let days: Vec<_> = batches.iter().map(|b| b.metadata()["day"].clone()).collect();
    assert_eq!(
        days,
        vec![
            PartitionValue::Int(1),
            PartitionValue::Int(3),
            PartitionValue::Int(11),
            PartitionValue::Int(15),
        ]
    );
    // the 15th holds both January rows of that day
    assert_eq!(ids(&batches[3]), vec![2, 3]);
}

#[tokio::test]
async fn test_year_month_day_single_batch() {
    let file = create_database();
    let datasource = datasource(&file);
    let trips = datasource.asset("trips").unwrap();
    let request = trips
        .build_batch_request(
            Some(options_from([("year", 2021), ("month", 3), ("day", 4)])),
            None,
            Some(Partitioner::year_and_month_and_day("pickup_datetime").unwrap()),
            None,
        )
        .unwrap();

    let batches = trips.get_batch_list_from_batch_request(&request).await.unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(ids(&batches[0]), vec![6]);
    assert_eq!(batches[0].id(), "local-trips-day_4-month_3-year_2021");
}

#[tokio::test]
async fn test_connection_string_substitution() {
    let file = create_database();
    let mut datasource = SqlDatasource::sqlite("local", "sqlite:///${TRIPS_DB}")
        .unwrap()
        .with_config_provider(Arc::new(
            MapConfigProvider::new().with_value("TRIPS_DB", file.path().display().to_string()),
        ));
    datasource
        .add_table_asset(TableAsset::new("trips", "trips").unwrap())
        .unwrap();
    datasource.test_connection(true).await.unwrap();

    let batches = datasource
        .get_batch_list_from_batch_request(&BatchRequest::new("local", "trips"))
        .await
        .unwrap();
    assert_eq!(batches[0].num_rows(), 6);
}

#[tokio::test]
async fn test_unreachable_database() {
    let datasource =
        SqlDatasource::sqlite("local", "sqlite:////nonexistent-dir/nested/trips.db").unwrap();
    let err = datasource.test_connection(false).await.unwrap_err();
    assert!(matches!(err, BatchError::TestConnection { .. }));
    assert!(err
        .to_string()
        .contains("Attempt to connect to datasource failed with the following error message"));
}

#[tokio::test]
async fn test_missing_schema_and_table() {
    let file = create_database();
    let mut datasource = datasource(&file);
    datasource
        .add_table_asset(
            TableAsset::new("archived", "trips")
                .unwrap()
                .with_schema_name("archive")
                .unwrap(),
        )
        .unwrap();
    datasource
        .add_table_asset(TableAsset::new("ghost", "no_such_table").unwrap())
        .unwrap();

    datasource.asset("trips").unwrap().test_connection().await.unwrap();

    let err = datasource
        .asset("archived")
        .unwrap()
        .test_connection()
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Test connection failed: Attempt to connect to table: \"archive.trips\" failed because the schema \"archive\" does not exist."
    );

    let err = datasource
        .asset("ghost")
        .unwrap()
        .test_connection()
        .await
        .unwrap_err();
    assert!(err.to_string().contains("failed because the test query failed"));
}

#[tokio::test]
async fn test_main_schema_is_listed() {
    let file = create_database();
    let mut datasource = datasource(&file);
    datasource
        .add_table_asset(
            TableAsset::new("main_trips", "trips")
                .unwrap()
                .with_schema_name("main")
                .unwrap(),
        )
        .unwrap();
    datasource.test_connection(true).await.unwrap();
}
