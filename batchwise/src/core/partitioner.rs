//! Backend-independent partitioner descriptors.
//!
//! A [`Partitioner`] describes *how* an asset should be split into batches.
//! It is what callers put on a batch request and what gets stored in
//! configuration. Each backend family maps it to a concrete
//! [`SqlPartitioner`](crate::partitioners::SqlPartitioner) before any SQL is
//! generated.
//!
//! Descriptors are validated when they are constructed, whether through the
//! constructor functions or through deserialization.

use crate::error::{BatchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// A datetime part that a datetime partitioner may group on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePart {
    Year,
    Quarter,
    Month,
    Week,
    WeekDay,
    Day,
    DayOfYear,
    Hour,
    Minute,
    Second,
}

impl DatePart {
    pub const ALL: [DatePart; 10] = [
        DatePart::Year,
        DatePart::Quarter,
        DatePart::Month,
        DatePart::Week,
        DatePart::WeekDay,
        DatePart::Day,
        DatePart::DayOfYear,
        DatePart::Hour,
        DatePart::Minute,
        DatePart::Second,
    ];

    /// The option/parameter name for this part.
    pub fn as_str(&self) -> &'static str {
        match self {
            DatePart::Year => "year",
            DatePart::Quarter => "quarter",
            DatePart::Month => "month",
            DatePart::Week => "week",
            DatePart::WeekDay => "week_day",
            DatePart::Day => "day",
            DatePart::DayOfYear => "day_of_year",
            DatePart::Hour => "hour",
            DatePart::Minute => "minute",
            DatePart::Second => "second",
        }
    }
}

impl fmt::Display for DatePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatePart {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        DatePart::ALL
            .into_iter()
            .find(|part| part.as_str() == lower)
            .ok_or_else(|| {
                let allowed: Vec<&str> = DatePart::ALL.iter().map(|p| p.as_str()).collect();
                BatchError::Configuration(format!(
                    "Invalid datetime part '{s}'. Only the following parts are allowed: {allowed:?}"
                ))
            })
    }
}

/// An abstract partitioning strategy.
///
/// Serialized with a literal `method_name` discriminator so stored
/// configuration round-trips to the right variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method_name", try_from = "RawPartitioner")]
pub enum Partitioner {
    /// One batch per distinct value of a column.
    #[serde(rename = "partition_on_column_value")]
    ColumnValue { column_name: String },
    /// One batch per distinct combination of several columns.
    #[serde(rename = "partition_on_multi_column_values")]
    MultiColumnValue { column_names: Vec<String> },
    /// One batch per distinct `column / divisor` quotient.
    #[serde(rename = "partition_on_divided_integer")]
    DividedInteger { column_name: String, divisor: i64 },
    /// One batch per distinct `column % mod` remainder.
    #[serde(rename = "partition_on_mod_integer")]
    ModInteger {
        column_name: String,
        #[serde(rename = "mod")]
        modulus: i64,
    },
    #[serde(rename = "partition_on_year")]
    Year { column_name: String },
    #[serde(rename = "partition_on_year_and_month")]
    YearAndMonth { column_name: String },
    #[serde(rename = "partition_on_year_and_month_and_day")]
    YearAndMonthAndDay { column_name: String },
    /// One batch per distinct combination of arbitrary datetime parts.
    #[serde(rename = "partition_on_date_parts")]
    DatetimePart {
        column_name: String,
        datetime_parts: Vec<DatePart>,
    },
    /// One batch per distinct formatted datetime string.
    ///
    /// The format string cannot be checked until it meets real values.
    #[serde(rename = "partition_on_converted_datetime")]
    ConvertedDatetime {
        column_name: String,
        date_format_string: String,
    },
}

impl Partitioner {
    pub fn column_value(column_name: impl Into<String>) -> Result<Self> {
        Self::validated(Partitioner::ColumnValue {
            column_name: column_name.into(),
        })
    }

    pub fn multi_column_value<S: Into<String>>(
        column_names: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        Self::validated(Partitioner::MultiColumnValue {
            column_names: column_names.into_iter().map(Into::into).collect(),
        })
    }

    pub fn divided_integer(column_name: impl Into<String>, divisor: i64) -> Result<Self> {
        Self::validated(Partitioner::DividedInteger {
            column_name: column_name.into(),
            divisor,
        })
    }

    pub fn mod_integer(column_name: impl Into<String>, modulus: i64) -> Result<Self> {
        Self::validated(Partitioner::ModInteger {
            column_name: column_name.into(),
            modulus,
        })
    }

    pub fn year(column_name: impl Into<String>) -> Result<Self> {
        Self::validated(Partitioner::Year {
            column_name: column_name.into(),
        })
    }

    pub fn year_and_month(column_name: impl Into<String>) -> Result<Self> {
        Self::validated(Partitioner::YearAndMonth {
            column_name: column_name.into(),
        })
    }

    pub fn year_and_month_and_day(column_name: impl Into<String>) -> Result<Self> {
        Self::validated(Partitioner::YearAndMonthAndDay {
            column_name: column_name.into(),
        })
    }

    /// Builds a datetime-part partitioner from part names.
    ///
    /// Unknown part names fail here, not at discovery time.
    pub fn datetime_part<S: AsRef<str>>(
        column_name: impl Into<String>,
        datetime_parts: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        let parts = datetime_parts
            .into_iter()
            .map(|p| p.as_ref().parse::<DatePart>())
            .collect::<Result<Vec<_>>>()?;
        Self::validated(Partitioner::DatetimePart {
            column_name: column_name.into(),
            datetime_parts: parts,
        })
    }

    pub fn converted_datetime(
        column_name: impl Into<String>,
        date_format_string: impl Into<String>,
    ) -> Result<Self> {
        Self::validated(Partitioner::ConvertedDatetime {
            column_name: column_name.into(),
            date_format_string: date_format_string.into(),
        })
    }

    fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    /// The stable method name used for dispatch and serialization.
    pub fn method_name(&self) -> &'static str {
        match self {
            Partitioner::ColumnValue { .. } => "partition_on_column_value",
            Partitioner::MultiColumnValue { .. } => "partition_on_multi_column_values",
            Partitioner::DividedInteger { .. } => "partition_on_divided_integer",
            Partitioner::ModInteger { .. } => "partition_on_mod_integer",
            Partitioner::Year { .. } => "partition_on_year",
            Partitioner::YearAndMonth { .. } => "partition_on_year_and_month",
            Partitioner::YearAndMonthAndDay { .. } => "partition_on_year_and_month_and_day",
            Partitioner::DatetimePart { .. } => "partition_on_date_parts",
            Partitioner::ConvertedDatetime { .. } => "partition_on_converted_datetime",
        }
    }

    /// Source columns this partitioner operates over, in order.
    pub fn columns(&self) -> Vec<String> {
        match self {
            Partitioner::MultiColumnValue { column_names } => column_names.clone(),
            Partitioner::ColumnValue { column_name }
            | Partitioner::DividedInteger { column_name, .. }
            | Partitioner::ModInteger { column_name, .. }
            | Partitioner::Year { column_name }
            | Partitioner::YearAndMonth { column_name }
            | Partitioner::YearAndMonthAndDay { column_name }
            | Partitioner::DatetimePart { column_name, .. }
            | Partitioner::ConvertedDatetime { column_name, .. } => vec![column_name.clone()],
        }
    }

    /// Checks the construction-time invariants of the descriptor.
    pub fn validate(&self) -> Result<()> {
        let columns = self.columns();
        if columns.is_empty() {
            return Err(BatchError::Configuration(format!(
                "{} requires at least one column name",
                self.method_name()
            )));
        }
        if let Some(empty) = columns.iter().find(|c| c.trim().is_empty()) {
            return Err(BatchError::Configuration(format!(
                "{} was given an empty column name: {empty:?}",
                self.method_name()
            )));
        }
        let unique: HashSet<&String> = columns.iter().collect();
        if unique.len() != columns.len() {
            return Err(BatchError::Configuration(format!(
                "{} was given duplicate column names: {columns:?}",
                self.method_name()
            )));
        }

        match self {
            Partitioner::DividedInteger { divisor: 0, .. } => Err(BatchError::Configuration(
                "partition_on_divided_integer requires a non-zero divisor".to_string(),
            )),
            Partitioner::ModInteger { modulus: 0, .. } => Err(BatchError::Configuration(
                "partition_on_mod_integer requires a non-zero mod".to_string(),
            )),
            Partitioner::DatetimePart { datetime_parts, .. } => {
                if datetime_parts.is_empty() {
                    return Err(BatchError::Configuration(
                        "partition_on_date_parts requires at least one datetime part".to_string(),
                    ));
                }
                let unique: HashSet<&DatePart> = datetime_parts.iter().collect();
                if unique.len() != datetime_parts.len() {
                    return Err(BatchError::Configuration(format!(
                        "partition_on_date_parts was given duplicate datetime parts: {datetime_parts:?}"
                    )));
                }
                Ok(())
            }
            Partitioner::ConvertedDatetime {
                date_format_string, ..
            } if date_format_string.is_empty() => Err(BatchError::Configuration(
                "partition_on_converted_datetime requires a date format string".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Deserialization mirror of [`Partitioner`]; converted through `validate`.
#[derive(Deserialize)]
#[serde(tag = "method_name")]
enum RawPartitioner {
    #[serde(rename = "partition_on_column_value")]
    ColumnValue { column_name: String },
    #[serde(rename = "partition_on_multi_column_values")]
    MultiColumnValue { column_names: Vec<String> },
    #[serde(rename = "partition_on_divided_integer")]
    DividedInteger { column_name: String, divisor: i64 },
    #[serde(rename = "partition_on_mod_integer")]
    ModInteger {
        column_name: String,
        #[serde(rename = "mod")]
        modulus: i64,
    },
    #[serde(rename = "partition_on_year")]
    Year { column_name: String },
    #[serde(rename = "partition_on_year_and_month")]
    YearAndMonth { column_name: String },
    #[serde(rename = "partition_on_year_and_month_and_day")]
    YearAndMonthAndDay { column_name: String },
    #[serde(rename = "partition_on_date_parts")]
    DatetimePart {
        column_name: String,
        datetime_parts: Vec<DatePart>,
    },
    #[serde(rename = "partition_on_converted_datetime")]
    ConvertedDatetime {
        column_name: String,
        date_format_string: String,
    },
}

impl TryFrom<RawPartitioner> for Partitioner {
    type Error = BatchError;

    fn try_from(raw: RawPartitioner) -> Result<Self> {
        let partitioner = match raw {
            RawPartitioner::ColumnValue { column_name } => Partitioner::ColumnValue { column_name },
            RawPartitioner::MultiColumnValue { column_names } => {
                Partitioner::MultiColumnValue { column_names }
            }
            RawPartitioner::DividedInteger {
                column_name,
                divisor,
            } => Partitioner::DividedInteger {
                column_name,
                divisor,
            },
            RawPartitioner::ModInteger {
                column_name,
                modulus,
            } => Partitioner::ModInteger {
                column_name,
                modulus,
            },
            RawPartitioner::Year { column_name } => Partitioner::Year { column_name },
            RawPartitioner::YearAndMonth { column_name } => Partitioner::YearAndMonth { column_name },
            RawPartitioner::YearAndMonthAndDay { column_name } => {
                Partitioner::YearAndMonthAndDay { column_name }
            }
            RawPartitioner::DatetimePart {
                column_name,
                datetime_parts,
            } => Partitioner::DatetimePart {
                column_name,
                datetime_parts,
            },
            RawPartitioner::ConvertedDatetime {
                column_name,
                date_format_string,
            } => Partitioner::ConvertedDatetime {
                column_name,
                date_format_string,
            },
        };
        partitioner.validated()
    }
}
