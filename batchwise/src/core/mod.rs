//! Core types for describing, requesting and holding batches.
//!
//! ## Overview
//!
//! - **[`Partitioner`]**: how an asset is split into batches
//! - **[`BatchRequest`]**: which batches a caller wants, with optional
//!   [`BatchSlice`] and [`Sorter`]s
//! - **[`BatchSpec`]**: the executable description of a single batch
//! - **[`Batch`]**: a materialized batch with its data, metadata and markers
//!
//! ```text
//! BatchRequest ──expand──▶ [BatchRequest; N] ──spec──▶ [BatchSpec; N] ──execute──▶ [Batch; N]
//! ```
//!
//! ## Example
//!
//! ```rust
//! use batchwise::core::{options_from, BatchRequest, BatchSlice, Partitioner, PartitionValue};
//!
//! # fn example() -> batchwise::error::Result<()> {
//! let request = BatchRequest::new("warehouse", "trips")
//!     .with_partitioner(Partitioner::year_and_month("pickup_datetime")?)
//!     .with_options(options_from([
//!         ("year", PartitionValue::Int(2020)),
//!         ("month", PartitionValue::Null),
//!     ]))
//!     .with_batch_slice("[-1:]".parse::<BatchSlice>()?);
//! assert_eq!(request.options.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod options;
pub mod partitioner;
pub mod request;
pub mod sorter;
pub mod spec;
pub mod value;

pub use batch::{Batch, BatchData, BatchDefinition, BatchMarkers, FLUENT_DATA_CONNECTOR_NAME};
pub use options::{
    identifiers_to_json, options_from, BatchIdentifiers, BatchRequestOptions, IdentifierValue,
};
pub use partitioner::{DatePart, Partitioner};
pub use request::{BatchRequest, BatchSlice};
pub use sorter::Sorter;
pub use spec::{
    BatchSource, BatchSpec, PartitionerKwargs, PartitionerMethod, Selectable,
    QUERY_SUBQUERY_ALIAS,
};
pub use value::PartitionValue;
