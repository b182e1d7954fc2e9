//! Batch specifications: the executable description of one batch.

use super::options::BatchIdentifiers;
use super::partitioner::DatePart;
use crate::error::{BatchError, Result};
use crate::security::SqlSecurity;
use serde::Serialize;
use std::fmt;

/// Alias given to a wrapped query when it is used as a selectable.
pub const QUERY_SUBQUERY_ALIAS: &str = "batch_subquery";

/// A concrete SQL partitioning method, as carried by a [`BatchSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PartitionerMethod {
    #[serde(rename = "partition_on_column_value")]
    ColumnValue,
    #[serde(rename = "partition_on_multi_column_values")]
    MultiColumnValues,
    #[serde(rename = "partition_on_divided_integer")]
    DividedInteger,
    #[serde(rename = "partition_on_mod_integer")]
    ModInteger,
    #[serde(rename = "partition_on_year")]
    Year,
    #[serde(rename = "partition_on_year_and_month")]
    YearAndMonth,
    #[serde(rename = "partition_on_year_and_month_and_day")]
    YearAndMonthAndDay,
    #[serde(rename = "partition_on_date_parts")]
    DateParts,
    #[serde(rename = "partition_on_converted_datetime")]
    ConvertedDatetime,
}

impl PartitionerMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionerMethod::ColumnValue => "partition_on_column_value",
            PartitionerMethod::MultiColumnValues => "partition_on_multi_column_values",
            PartitionerMethod::DividedInteger => "partition_on_divided_integer",
            PartitionerMethod::ModInteger => "partition_on_mod_integer",
            PartitionerMethod::Year => "partition_on_year",
            PartitionerMethod::YearAndMonth => "partition_on_year_and_month",
            PartitionerMethod::YearAndMonthAndDay => "partition_on_year_and_month_and_day",
            PartitionerMethod::DateParts => "partition_on_date_parts",
            PartitionerMethod::ConvertedDatetime => "partition_on_converted_datetime",
        }
    }

    /// Fixed datetime parts for the year/month/day methods.
    pub fn implied_date_parts(&self) -> Option<&'static [DatePart]> {
        match self {
            PartitionerMethod::Year => Some(&[DatePart::Year]),
            PartitionerMethod::YearAndMonth => Some(&[DatePart::Year, DatePart::Month]),
            PartitionerMethod::YearAndMonthAndDay => {
                Some(&[DatePart::Year, DatePart::Month, DatePart::Day])
            }
            _ => None,
        }
    }
}

impl fmt::Display for PartitionerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword arguments that parameterize a [`PartitionerMethod`].
///
/// Only the fields the method needs are set; renderers fail with a
/// configuration error when a required one is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartitionerKwargs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub divisor: Option<i64>,
    #[serde(rename = "mod", skip_serializing_if = "Option::is_none")]
    pub modulus: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_parts: Option<Vec<DatePart>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_format_string: Option<String>,
}

impl PartitionerKwargs {
    pub fn for_column(column_name: impl Into<String>) -> Self {
        Self {
            column_name: Some(column_name.into()),
            ..Self::default()
        }
    }

    pub fn require_column_name(&self, method: PartitionerMethod) -> Result<&str> {
        self.column_name
            .as_deref()
            .ok_or_else(|| missing_kwarg(method, "column_name"))
    }

    pub fn require_column_names(&self, method: PartitionerMethod) -> Result<&[String]> {
        self.column_names
            .as_deref()
            .ok_or_else(|| missing_kwarg(method, "column_names"))
    }

    pub fn require_divisor(&self, method: PartitionerMethod) -> Result<i64> {
        self.divisor.ok_or_else(|| missing_kwarg(method, "divisor"))
    }

    pub fn require_mod(&self, method: PartitionerMethod) -> Result<i64> {
        self.modulus.ok_or_else(|| missing_kwarg(method, "mod"))
    }

    pub fn require_date_parts(&self, method: PartitionerMethod) -> Result<&[DatePart]> {
        self.date_parts
            .as_deref()
            .ok_or_else(|| missing_kwarg(method, "date_parts"))
    }

    pub fn require_date_format_string(&self, method: PartitionerMethod) -> Result<&str> {
        self.date_format_string
            .as_deref()
            .ok_or_else(|| missing_kwarg(method, "date_format_string"))
    }
}

fn missing_kwarg(method: PartitionerMethod, kwarg: &str) -> BatchError {
    BatchError::Configuration(format!("{method} requires the '{kwarg}' partitioner kwarg"))
}

/// Something that can appear after `FROM`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selectable {
    /// A physical table, optionally schema-qualified.
    Table {
        name: String,
        schema: Option<String>,
        /// The name was quoted by the user and must be rendered quoted.
        quoted: bool,
    },
    /// A `SELECT` statement used as a derived table.
    Query(String),
}

impl Selectable {
    /// Renders the `FROM` target.
    pub fn render(&self) -> Result<String> {
        match self {
            Selectable::Table {
                name,
                schema,
                quoted,
            } => {
                let table = if *quoted {
                    SqlSecurity::quote_identifier(name)?
                } else {
                    SqlSecurity::validate_identifier(name)?;
                    name.clone()
                };
                match schema {
                    Some(schema) => {
                        SqlSecurity::validate_identifier(schema)?;
                        Ok(format!("{schema}.{table}"))
                    }
                    None => Ok(table),
                }
            }
            Selectable::Query(query) => Ok(format!("({query}) AS {QUERY_SUBQUERY_ALIAS}")),
        }
    }
}

/// Where a batch's rows come from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchSource {
    Table {
        table_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        schema_name: Option<String>,
        #[serde(skip)]
        quoted: bool,
    },
    RuntimeQuery {
        query: String,
        temp_table_schema_name: Option<String>,
    },
}

/// Executable description of one batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSpec {
    pub data_asset_name: String,
    #[serde(flatten)]
    pub source: BatchSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partitioner_method: Option<PartitionerMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partitioner_kwargs: Option<PartitionerKwargs>,
    pub batch_identifiers: BatchIdentifiers,
}

impl BatchSpec {
    pub fn is_runtime_query(&self) -> bool {
        matches!(self.source, BatchSource::RuntimeQuery { .. })
    }

    /// The `FROM` target for this spec.
    pub fn selectable(&self) -> Selectable {
        match &self.source {
            BatchSource::Table {
                table_name,
                schema_name,
                quoted,
            } => Selectable::Table {
                name: table_name.clone(),
                schema: schema_name.clone(),
                quoted: *quoted,
            },
            BatchSource::RuntimeQuery { query, .. } => Selectable::Query(query.clone()),
        }
    }

    /// Method and kwargs when the batch is partitioned.
    pub fn partitioning(&self) -> Option<(PartitionerMethod, &PartitionerKwargs)> {
        match (&self.partitioner_method, &self.partitioner_kwargs) {
            (Some(method), Some(kwargs)) => Some((*method, kwargs)),
            _ => None,
        }
    }
}
