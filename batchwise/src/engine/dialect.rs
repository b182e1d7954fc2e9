//! SQL dialect differences between execution backends.

use crate::core::{DatePart, PartitionValue};
use crate::security::SqlSecurity;
use std::fmt;

/// The SQL dialect spoken by an execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDialect {
    /// Apache DataFusion SQL.
    DataFusion,
    /// SQLite SQL.
    Sqlite,
}

impl SqlDialect {
    pub fn name(&self) -> &'static str {
        match self {
            SqlDialect::DataFusion => "datafusion",
            SqlDialect::Sqlite => "sqlite",
        }
    }

    /// Integer expression extracting `part` from an already quoted column.
    pub fn date_part_expr(&self, part: DatePart, column: &str) -> String {
        match self {
            SqlDialect::DataFusion => {
                let field = match part {
                    DatePart::Year => "year",
                    DatePart::Quarter => "quarter",
                    DatePart::Month => "month",
                    DatePart::Week => "week",
                    DatePart::WeekDay => "dow",
                    DatePart::Day => "day",
                    DatePart::DayOfYear => "doy",
                    DatePart::Hour => "hour",
                    DatePart::Minute => "minute",
                    DatePart::Second => "second",
                };
                format!("CAST(date_part('{field}', {column}) AS BIGINT)")
            }
            SqlDialect::Sqlite => {
                let format = match part {
                    // sqlite has no quarter specifier
                    DatePart::Quarter => {
                        return format!(
                            "((CAST(strftime('%m', {column}) AS INTEGER) + 2) / 3)"
                        )
                    }
                    DatePart::Year => "%Y",
                    DatePart::Month => "%m",
                    DatePart::Week => "%W",
                    DatePart::WeekDay => "%w",
                    DatePart::Day => "%d",
                    DatePart::DayOfYear => "%j",
                    DatePart::Hour => "%H",
                    DatePart::Minute => "%M",
                    DatePart::Second => "%S",
                };
                format!("CAST(strftime('{format}', {column}) AS INTEGER)")
            }
        }
    }

    /// Truncating integer division.
    pub fn divided_integer_expr(&self, column: &str, divisor: i64) -> String {
        let target = match self {
            SqlDialect::DataFusion => "BIGINT",
            SqlDialect::Sqlite => "INTEGER",
        };
        format!("CAST({column} / {divisor} AS {target})")
    }

    pub fn mod_integer_expr(&self, column: &str, modulus: i64) -> String {
        format!("{column} % {modulus}")
    }

    /// Formats a datetime column as a string using a strftime-style format.
    pub fn converted_datetime_expr(&self, column: &str, format: &str) -> String {
        let format = SqlSecurity::quote_literal(format);
        match self {
            SqlDialect::DataFusion => format!("to_char({column}, {format})"),
            SqlDialect::Sqlite => format!("strftime({format}, {column})"),
        }
    }

    /// Renders a value as a SQL literal.
    pub fn literal(&self, value: &PartitionValue) -> String {
        match (self, value) {
            (_, PartitionValue::Null) => "NULL".to_string(),
            (SqlDialect::Sqlite, PartitionValue::Bool(b)) => u8::from(*b).to_string(),
            (SqlDialect::DataFusion, PartitionValue::Bool(b)) => b.to_string().to_uppercase(),
            (_, PartitionValue::Int(i)) => i.to_string(),
            (_, PartitionValue::Float(f)) => f.to_string(),
            (_, PartitionValue::String(s)) => SqlSecurity::quote_literal(s),
            (SqlDialect::DataFusion, PartitionValue::Date(_)) => {
                format!("DATE {}", SqlSecurity::quote_literal(&value.to_string()))
            }
            (SqlDialect::DataFusion, PartitionValue::Timestamp(_)) => {
                format!("TIMESTAMP {}", SqlSecurity::quote_literal(&value.to_string()))
            }
            (SqlDialect::Sqlite, temporal) => SqlSecurity::quote_literal(&temporal.to_string()),
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_date_part_expressions() {
        assert_eq!(
            SqlDialect::DataFusion.date_part_expr(DatePart::Year, "\"ts\""),
            "CAST(date_part('year', \"ts\") AS BIGINT)"
        );
        assert_eq!(
            SqlDialect::DataFusion.date_part_expr(DatePart::WeekDay, "\"ts\""),
            "CAST(date_part('dow', \"ts\") AS BIGINT)"
        );
        assert_eq!(
            SqlDialect::Sqlite.date_part_expr(DatePart::Month, "\"ts\""),
            "CAST(strftime('%m', \"ts\") AS INTEGER)"
        );
        assert_eq!(
            SqlDialect::Sqlite.date_part_expr(DatePart::Quarter, "\"ts\""),
            "((CAST(strftime('%m', \"ts\") AS INTEGER) + 2) / 3)"
        );
    }

    #[test]
    fn test_integer_expressions() {
        assert_eq!(
            SqlDialect::DataFusion.divided_integer_expr("\"id\"", 10),
            "CAST(\"id\" / 10 AS BIGINT)"
        );
        assert_eq!(
            SqlDialect::Sqlite.divided_integer_expr("\"id\"", 10),
            "CAST(\"id\" / 10 AS INTEGER)"
        );
        assert_eq!(SqlDialect::Sqlite.mod_integer_expr("\"id\"", 3), "\"id\" % 3");
    }

    #[test]
    fn test_converted_datetime_escapes_format() {
        assert_eq!(
            SqlDialect::Sqlite.converted_datetime_expr("\"ts\"", "%Y-%m"),
            "strftime('%Y-%m', \"ts\")"
        );
        assert_eq!(
            SqlDialect::DataFusion.converted_datetime_expr("\"ts\"", "%Y'x"),
            "to_char(\"ts\", '%Y''x')"
        );
    }

    #[test]
    fn test_literals() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        assert_eq!(SqlDialect::DataFusion.literal(&PartitionValue::Null), "NULL");
        assert_eq!(SqlDialect::Sqlite.literal(&PartitionValue::Bool(true)), "1");
        assert_eq!(
            SqlDialect::DataFusion.literal(&PartitionValue::Date(date)),
            "DATE '2020-01-02'"
        );
        assert_eq!(
            SqlDialect::Sqlite.literal(&PartitionValue::Date(date)),
            "'2020-01-02'"
        );
        assert_eq!(
            SqlDialect::Sqlite.literal(&PartitionValue::from("O'Hare")),
            "'O''Hare'"
        );
    }
}
