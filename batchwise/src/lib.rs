//! # Batchwise - Reproducible SQL batches
//!
//! Batchwise partitions SQL tables and queries into addressable batches. A
//! batch is the slice of an asset selected by one concrete set of partition
//! values, for example the rows of `trips` whose `pickup_datetime` falls in
//! March 2020. Batches are what data validation runs against.
//!
//! ## Overview
//!
//! A [`SqlDatasource`](datasource::SqlDatasource) names a connection and owns
//! assets: [`TableAsset`](assets::TableAsset)s and
//! [`QueryAsset`](assets::QueryAsset)s. A [`BatchRequest`](core::BatchRequest)
//! against an asset may carry a [`Partitioner`](core::Partitioner). Options
//! that leave partition parameters unset (or `Null`) act as wildcards; the
//! datasource discovers the distinct partition values in the backend and
//! expands the request into one concrete batch per match.
//!
//! ## Quick Start
//!
//! ```rust
//! use batchwise::prelude::*;
//! use datafusion::prelude::SessionContext;
//!
//! # async fn example() -> batchwise::error::Result<()> {
//! let ctx = SessionContext::new();
//! ctx.sql(
//!     "CREATE TABLE trips (id BIGINT, pickup_datetime TIMESTAMP) AS VALUES \
//!      (1, TIMESTAMP '2020-01-03 10:00:00'), (2, TIMESTAMP '2020-02-11 08:30:00')",
//! )
//! .await?;
//!
//! let mut datasource = SqlDatasource::datafusion("warehouse", ctx)?;
//! datasource.add_table_asset(TableAsset::new("trips", "trips")?)?;
//!
//! let trips = datasource.asset("trips")?;
//! let request = trips.build_batch_request(
//!     Some(options_from([("year", PartitionValue::Int(2020)), ("month", PartitionValue::Null)])),
//!     None,
//!     Some(Partitioner::year_and_month("pickup_datetime")?),
//!     None,
//! )?;
//!
//! // One batch per month of 2020 present in the table.
//! let batches = trips.get_batch_list_from_batch_request(&request).await?;
//! for batch in &batches {
//!     println!("{}: {} rows", batch.id(), batch.num_rows());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Partitioners
//!
//! - **Column value**: one batch per distinct value of a column
//! - **Multi column value**: one batch per distinct tuple of several columns
//! - **Divided integer** and **mod integer**: integer buckets of a column
//! - **Year / year and month / year, month and day**: calendar buckets
//! - **Datetime part**: any combination of year, month, week, day, hour, minute, second
//! - **Converted datetime**: a formatted datetime string (SQLite only)
//!
//! Requesting a partitioner the backend family does not implement fails with
//! [`BatchError::PartitionerNotImplemented`](error::BatchError::PartitionerNotImplemented).
//!
//! ## Backends
//!
//! SQL is executed through an [`ExecutionEngine`](engine::ExecutionEngine).
//! Two are provided: [`DataFusionEngine`](engine::DataFusionEngine) over a
//! `SessionContext`, and `SqliteEngine` over `rusqlite` (feature `sqlite`,
//! on by default). Engines are built by an
//! [`EngineFactory`](engine::EngineFactory) and cached per datasource until
//! the resolved connection details change.
//!
//! ## Configuration
//!
//! Connection strings, engine kwargs and batch metadata may contain `${VAR}`
//! references. They are resolved through a
//! [`ConfigProvider`](config::ConfigProvider), by default the process
//! environment, and resolved secrets are held in
//! [`SecureString`](security::SecureString)s.
//!
//! ## Architecture
//!
//! - **`core`**: requests, partitioners, sorters, slices, batch specs and batches
//! - **`assets`**: table and query assets
//! - **`partitioners`**: backend-specific partitioner resolution and parameter discovery
//! - **`engine`**: SQL dialects, partition SQL rendering and execution engines
//! - **`datasource`**: datasources, request expansion and batch materialization
//! - **`config`**, **`security`**, **`logging`**: ambient support

pub mod assets;
pub mod config;
pub mod core;
pub mod datasource;
pub mod engine;
pub mod error;
pub mod logging;
pub mod partitioners;
pub mod prelude;
pub mod security;
