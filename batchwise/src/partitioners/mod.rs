//! Concrete SQL partitioners.
//!
//! Every backend family maps the abstract [`Partitioner`] descriptors it
//! supports to a [`SqlPartitioner`]. The concrete partitioner knows which
//! batch request option keys it accepts, how those options become batch
//! identifiers, and how to discover every partition that exists in an asset.
//!
//! Discovery and identifier construction are symmetric: each options map
//! returned by [`SqlPartitioner::param_defaults`] is accepted unchanged by
//! [`SqlPartitioner::batch_request_options_to_batch_identifiers`].

use crate::assets::SqlAsset;
use crate::core::{
    BatchIdentifiers, BatchRequestOptions, DatePart, IdentifierValue, Partitioner,
    PartitionerKwargs, PartitionerMethod,
};
use crate::datasource::DatasourceKind;
use crate::engine::ExecutionEngine;
use crate::error::{BatchError, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// A backend family's implementation of a [`Partitioner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlPartitioner {
    ColumnValue {
        column_name: String,
    },
    MultiColumnValue {
        column_names: Vec<String>,
    },
    DividedInteger {
        column_name: String,
        divisor: i64,
    },
    ModInteger {
        column_name: String,
        modulus: i64,
    },
    Year {
        column_name: String,
    },
    YearAndMonth {
        column_name: String,
    },
    YearAndMonthAndDay {
        column_name: String,
    },
    DatetimePart {
        column_name: String,
        datetime_parts: Vec<DatePart>,
    },
    /// Formats the column with a strftime-style string; SQLite family only.
    SqliteConvertedDatetime {
        column_name: String,
        date_format_string: String,
    },
}

impl SqlPartitioner {
    /// Maps an abstract partitioner to `kind`'s implementation.
    pub fn for_family(partitioner: &Partitioner, kind: DatasourceKind) -> Result<Self> {
        let concrete = match partitioner.clone() {
            Partitioner::ColumnValue { column_name } => SqlPartitioner::ColumnValue { column_name },
            Partitioner::MultiColumnValue { column_names } => {
                SqlPartitioner::MultiColumnValue { column_names }
            }
            Partitioner::DividedInteger {
                column_name,
                divisor,
            } => SqlPartitioner::DividedInteger {
                column_name,
                divisor,
            },
            Partitioner::ModInteger {
                column_name,
                modulus,
            } => SqlPartitioner::ModInteger {
                column_name,
                modulus,
            },
            Partitioner::Year { column_name } => SqlPartitioner::Year { column_name },
            Partitioner::YearAndMonth { column_name } => SqlPartitioner::YearAndMonth { column_name },
            Partitioner::YearAndMonthAndDay { column_name } => {
                SqlPartitioner::YearAndMonthAndDay { column_name }
            }
            Partitioner::DatetimePart {
                column_name,
                datetime_parts,
            } => SqlPartitioner::DatetimePart {
                column_name,
                datetime_parts,
            },
            Partitioner::ConvertedDatetime {
                column_name,
                date_format_string,
            } => match kind {
                DatasourceKind::Sqlite => SqlPartitioner::SqliteConvertedDatetime {
                    column_name,
                    date_format_string,
                },
                DatasourceKind::Sql => {
                    return Err(BatchError::PartitionerNotImplemented {
                        method_name: partitioner.method_name().to_string(),
                        datasource_type: kind.type_name().to_string(),
                    })
                }
            },
        };
        Ok(concrete)
    }

    pub fn method(&self) -> PartitionerMethod {
        match self {
            SqlPartitioner::ColumnValue { .. } => PartitionerMethod::ColumnValue,
            SqlPartitioner::MultiColumnValue { .. } => PartitionerMethod::MultiColumnValues,
            SqlPartitioner::DividedInteger { .. } => PartitionerMethod::DividedInteger,
            SqlPartitioner::ModInteger { .. } => PartitionerMethod::ModInteger,
            SqlPartitioner::Year { .. } => PartitionerMethod::Year,
            SqlPartitioner::YearAndMonth { .. } => PartitionerMethod::YearAndMonth,
            SqlPartitioner::YearAndMonthAndDay { .. } => PartitionerMethod::YearAndMonthAndDay,
            SqlPartitioner::DatetimePart { .. } => PartitionerMethod::DateParts,
            SqlPartitioner::SqliteConvertedDatetime { .. } => PartitionerMethod::ConvertedDatetime,
        }
    }

    /// Source columns, in declaration order.
    pub fn columns(&self) -> Vec<String> {
        match self {
            SqlPartitioner::MultiColumnValue { column_names } => column_names.clone(),
            SqlPartitioner::ColumnValue { column_name }
            | SqlPartitioner::DividedInteger { column_name, .. }
            | SqlPartitioner::ModInteger { column_name, .. }
            | SqlPartitioner::Year { column_name }
            | SqlPartitioner::YearAndMonth { column_name }
            | SqlPartitioner::YearAndMonthAndDay { column_name }
            | SqlPartitioner::DatetimePart { column_name, .. }
            | SqlPartitioner::SqliteConvertedDatetime { column_name, .. } => {
                vec![column_name.clone()]
            }
        }
    }

    fn date_parts(&self) -> Option<Vec<DatePart>> {
        match self {
            SqlPartitioner::DatetimePart { datetime_parts, .. } => Some(datetime_parts.clone()),
            other => other.method().implied_date_parts().map(<[DatePart]>::to_vec),
        }
    }

    /// Name of the single option carried by one-parameter partitioners.
    fn single_param(&self) -> Option<&'static str> {
        match self {
            SqlPartitioner::DividedInteger { .. } => Some("quotient"),
            SqlPartitioner::ModInteger { .. } => Some("remainder"),
            SqlPartitioner::SqliteConvertedDatetime { .. } => Some("datetime"),
            _ => None,
        }
    }

    /// The batch request option keys this partitioner accepts.
    pub fn param_names(&self) -> Vec<String> {
        if let Some(parts) = self.date_parts() {
            return parts.iter().map(|p| p.as_str().to_string()).collect();
        }
        match self.single_param() {
            Some(param) => vec![param.to_string()],
            None => self.columns(),
        }
    }

    /// Kwargs recorded on the batch spec and used to render SQL.
    pub fn partitioner_method_kwargs(&self) -> PartitionerKwargs {
        match self {
            SqlPartitioner::ColumnValue { column_name }
            | SqlPartitioner::Year { column_name }
            | SqlPartitioner::YearAndMonth { column_name }
            | SqlPartitioner::YearAndMonthAndDay { column_name } => {
                PartitionerKwargs::for_column(column_name.clone())
            }
            SqlPartitioner::MultiColumnValue { column_names } => PartitionerKwargs {
                column_names: Some(column_names.clone()),
                ..PartitionerKwargs::default()
            },
            SqlPartitioner::DividedInteger {
                column_name,
                divisor,
            } => PartitionerKwargs {
                divisor: Some(*divisor),
                ..PartitionerKwargs::for_column(column_name.clone())
            },
            SqlPartitioner::ModInteger {
                column_name,
                modulus,
            } => PartitionerKwargs {
                modulus: Some(*modulus),
                ..PartitionerKwargs::for_column(column_name.clone())
            },
            SqlPartitioner::DatetimePart {
                column_name,
                datetime_parts,
            } => PartitionerKwargs {
                date_parts: Some(datetime_parts.clone()),
                ..PartitionerKwargs::for_column(column_name.clone())
            },
            SqlPartitioner::SqliteConvertedDatetime {
                column_name,
                date_format_string,
            } => PartitionerKwargs {
                date_format_string: Some(date_format_string.clone()),
                ..PartitionerKwargs::for_column(column_name.clone())
            },
        }
    }

    /// Converts concrete batch request options into batch identifiers.
    pub fn batch_request_options_to_batch_identifiers(
        &self,
        options: &BatchRequestOptions,
    ) -> Result<BatchIdentifiers> {
        if let SqlPartitioner::MultiColumnValue { column_names } = self {
            if !column_names.iter().all(|c| options.contains_key(c)) {
                return Err(BatchError::invalid_batch_request(
                    format!(
                        "All column names, {column_names:?}, must be specified in the batch request options"
                    ),
                    column_names.iter().cloned(),
                    options.keys().cloned(),
                ));
            }
            return Ok(column_names
                .iter()
                .map(|c| (c.clone(), IdentifierValue::Value(options[c].clone())))
                .collect());
        }

        let mut values = BTreeMap::new();
        for param in self.param_names() {
            let value = options
                .get(&param)
                .ok_or_else(|| BatchError::missing_option(param.clone()))?;
            values.insert(param, value.clone());
        }

        let column = self.columns().remove(0);
        let identifier = if self.date_parts().is_some() {
            IdentifierValue::Parts(values)
        } else {
            let param = self.single_param().unwrap_or(column.as_str()).to_string();
            let value = values
                .remove(&param)
                .ok_or_else(|| BatchError::missing_option(param))?;
            IdentifierValue::Value(value)
        };
        Ok(BatchIdentifiers::from([(column, identifier)]))
    }

    /// Converts discovered identifiers back into batch request options.
    fn identifiers_to_options(&self, identifiers: BatchIdentifiers) -> Result<BatchRequestOptions> {
        if self.date_parts().is_some() {
            let column = self.columns().remove(0);
            return match identifiers.get(&column) {
                Some(IdentifierValue::Parts(parts)) => Ok(parts.clone()),
                _ => Err(BatchError::Internal(format!(
                    "discovery did not return datetime parts for column '{column}'"
                ))),
            };
        }

        let mut options = BatchRequestOptions::new();
        for (column, identifier) in identifiers {
            let value = identifier.as_value().cloned().ok_or_else(|| {
                BatchError::Internal(format!(
                    "discovery returned datetime parts for column '{column}'"
                ))
            })?;
            let key = self.single_param().map_or(column, str::to_string);
            options.insert(key, value);
        }
        Ok(options)
    }

    /// Discovers one options map per distinct partition present in `asset`.
    pub async fn param_defaults(
        &self,
        asset: &dyn SqlAsset,
        engine: &dyn ExecutionEngine,
    ) -> Result<Vec<BatchRequestOptions>> {
        let identifiers = engine
            .get_data_for_batch_identifiers(
                &asset.as_selectable(),
                self.method(),
                &self.partitioner_method_kwargs(),
            )
            .await?;
        debug!(
            data_asset_name = asset.name(),
            method = %self.method(),
            partitions = identifiers.len(),
            "Discovered partitions"
        );
        identifiers
            .into_iter()
            .map(|ids| self.identifiers_to_options(ids))
            .collect()
    }
}
