//! Rendering of partition discovery and batch selection statements.

use super::dialect::SqlDialect;
use crate::core::{
    BatchIdentifiers, BatchSpec, DatePart, IdentifierValue, PartitionValue, PartitionerKwargs,
    PartitionerMethod, Selectable,
};
use crate::error::{BatchError, Result};
use crate::security::SqlSecurity;
use std::collections::BTreeMap;

/// One expression selected by a discovery query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionExpr {
    /// Source column the expression is derived from.
    pub column: String,
    /// Datetime part, for datetime methods.
    pub part: Option<DatePart>,
    /// Rendered SQL expression.
    pub sql: String,
    /// Output alias in the discovery query.
    pub alias: String,
}

/// Renders partitioning SQL for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct SqlPartitionRenderer {
    dialect: SqlDialect,
}

impl SqlPartitionRenderer {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    /// The expressions that identify a partition for `method`.
    pub fn partition_exprs(
        &self,
        method: PartitionerMethod,
        kwargs: &PartitionerKwargs,
    ) -> Result<Vec<PartitionExpr>> {
        let mut exprs = Vec::new();
        let mut push = |column: &str, part: Option<DatePart>, sql: String| {
            let alias = format!("partition_{}", exprs.len());
            exprs.push(PartitionExpr {
                column: column.to_string(),
                part,
                sql,
                alias,
            });
        };

        match method {
            PartitionerMethod::ColumnValue => {
                let column = kwargs.require_column_name(method)?;
                push(column, None, SqlSecurity::quote_identifier(column)?);
            }
            PartitionerMethod::MultiColumnValues => {
                for column in kwargs.require_column_names(method)? {
                    push(column, None, SqlSecurity::quote_identifier(column)?);
                }
            }
            PartitionerMethod::DividedInteger => {
                let column = kwargs.require_column_name(method)?;
                let divisor = kwargs.require_divisor(method)?;
                let quoted = SqlSecurity::quote_identifier(column)?;
                push(column, None, self.dialect.divided_integer_expr(&quoted, divisor));
            }
            PartitionerMethod::ModInteger => {
                let column = kwargs.require_column_name(method)?;
                let modulus = kwargs.require_mod(method)?;
                let quoted = SqlSecurity::quote_identifier(column)?;
                push(column, None, self.dialect.mod_integer_expr(&quoted, modulus));
            }
            PartitionerMethod::Year
            | PartitionerMethod::YearAndMonth
            | PartitionerMethod::YearAndMonthAndDay
            | PartitionerMethod::DateParts => {
                let column = kwargs.require_column_name(method)?;
                let parts = match method.implied_date_parts() {
                    Some(parts) => parts,
                    None => kwargs.require_date_parts(method)?,
                };
                let quoted = SqlSecurity::quote_identifier(column)?;
                for part in parts {
                    push(column, Some(*part), self.dialect.date_part_expr(*part, &quoted));
                }
            }
            PartitionerMethod::ConvertedDatetime => {
                let column = kwargs.require_column_name(method)?;
                let format = kwargs.require_date_format_string(method)?;
                let quoted = SqlSecurity::quote_identifier(column)?;
                push(column, None, self.dialect.converted_datetime_expr(&quoted, format));
            }
        }

        Ok(exprs)
    }

    /// `SELECT DISTINCT` over the partition expressions.
    ///
    /// Rows come back in engine order; callers sort afterwards.
    pub fn discovery_query(&self, selectable: &Selectable, exprs: &[PartitionExpr]) -> Result<String> {
        let projection = exprs
            .iter()
            .map(|e| Ok(format!("{} AS {}", e.sql, SqlSecurity::quote_identifier(&e.alias)?)))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        Ok(format!("SELECT DISTINCT {projection} FROM {}", selectable.render()?))
    }

    /// Builds identifier records from discovered rows.
    ///
    /// Each row holds one value per expression, in expression order.
    pub fn rows_to_identifiers(
        exprs: &[PartitionExpr],
        rows: Vec<Vec<PartitionValue>>,
    ) -> Result<Vec<BatchIdentifiers>> {
        rows.into_iter()
            .map(|row| {
                if row.len() != exprs.len() {
                    return Err(BatchError::Internal(format!(
                        "discovery row has {} values but {} partition expressions were selected",
                        row.len(),
                        exprs.len()
                    )));
                }
                let mut identifiers = BatchIdentifiers::new();
                for (expr, value) in exprs.iter().zip(row) {
                    match expr.part {
                        None => {
                            identifiers.insert(expr.column.clone(), IdentifierValue::Value(value));
                        }
                        Some(part) => {
                            let entry = identifiers
                                .entry(expr.column.clone())
                                .or_insert_with(|| IdentifierValue::Parts(BTreeMap::new()));
                            if let IdentifierValue::Parts(parts) = entry {
                                parts.insert(part.as_str().to_string(), value);
                            }
                        }
                    }
                }
                Ok(identifiers)
            })
            .collect()
    }

    /// `WHERE` predicate selecting the rows of one partition.
    pub fn where_clause(
        &self,
        method: PartitionerMethod,
        kwargs: &PartitionerKwargs,
        identifiers: &BatchIdentifiers,
    ) -> Result<String> {
        let exprs = self.partition_exprs(method, kwargs)?;
        let mut predicates = Vec::with_capacity(exprs.len());
        for expr in &exprs {
            let identifier = identifiers
                .get(&expr.column)
                .ok_or_else(|| BatchError::missing_option(expr.column.clone()))?;
            let value = match (expr.part, identifier) {
                (None, IdentifierValue::Value(v)) => v,
                (Some(part), IdentifierValue::Parts(parts)) => parts
                    .get(part.as_str())
                    .ok_or_else(|| BatchError::missing_option(part.as_str()))?,
                _ => {
                    return Err(BatchError::Configuration(format!(
                        "batch identifier for column '{}' does not match {method}",
                        expr.column
                    )))
                }
            };
            predicates.push(if value.is_null() {
                format!("{} IS NULL", expr.sql)
            } else {
                format!("{} = {}", expr.sql, self.dialect.literal(value))
            });
        }
        Ok(predicates.join(" AND "))
    }

    /// The statement that materializes the batch described by `spec`.
    pub fn batch_query(&self, spec: &BatchSpec) -> Result<String> {
        let from = spec.selectable().render()?;
        match spec.partitioning() {
            Some((method, kwargs)) => {
                let predicate = self.where_clause(method, kwargs, &spec.batch_identifiers)?;
                Ok(format!("SELECT * FROM {from} WHERE {predicate}"))
            }
            None => Ok(format!("SELECT * FROM {from}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BatchSource;

    fn table(name: &str) -> Selectable {
        Selectable::Table {
            name: name.into(),
            schema: None,
            quoted: false,
        }
    }

    #[test]
    fn test_year_and_month_discovery_query() {
        let renderer = SqlPartitionRenderer::new(SqlDialect::DataFusion);
        let exprs = renderer
            .partition_exprs(
                PartitionerMethod::YearAndMonth,
                &PartitionerKwargs::for_column("pickup_datetime"),
            )
            .unwrap();
        let sql = renderer.discovery_query(&table("trips"), &exprs).unwrap();
        assert_eq!(
            sql,
            "SELECT DISTINCT CAST(date_part('year', \"pickup_datetime\") AS BIGINT) AS \"partition_0\", \
             CAST(date_part('month', \"pickup_datetime\") AS BIGINT) AS \"partition_1\" FROM trips"
        );
    }

    #[test]
    fn test_missing_kwarg_fails_before_sql() {
        let renderer = SqlPartitionRenderer::new(SqlDialect::Sqlite);
        let err = renderer
            .partition_exprs(PartitionerMethod::DividedInteger, &PartitionerKwargs::for_column("id"))
            .unwrap_err();
        assert!(matches!(err, BatchError::Configuration(_)));
    }

    #[test]
    fn test_rows_to_identifiers_nests_datetime_parts() {
        let renderer = SqlPartitionRenderer::new(SqlDialect::Sqlite);
        let exprs = renderer
            .partition_exprs(PartitionerMethod::YearAndMonth, &PartitionerKwargs::for_column("ts"))
            .unwrap();
        let identifiers = SqlPartitionRenderer::rows_to_identifiers(
            &exprs,
            vec![vec![PartitionValue::Int(2020), PartitionValue::Int(2)]],
        )
        .unwrap();
        let parts = identifiers[0]["ts"].as_parts().unwrap();
        assert_eq!(parts["year"], PartitionValue::Int(2020));
        assert_eq!(parts["month"], PartitionValue::Int(2));
    }

    #[test]
    fn test_where_clause_handles_nulls() {
        let renderer = SqlPartitionRenderer::new(SqlDialect::Sqlite);
        let kwargs = PartitionerKwargs {
            column_names: Some(vec!["vendor".into(), "zone".into()]),
            ..PartitionerKwargs::default()
        };
        let identifiers = BatchIdentifiers::from([
            ("vendor".to_string(), IdentifierValue::Value(PartitionValue::from("CMT"))),
            ("zone".to_string(), IdentifierValue::Value(PartitionValue::Null)),
        ]);
        let clause = renderer
            .where_clause(PartitionerMethod::MultiColumnValues, &kwargs, &identifiers)
            .unwrap();
        assert_eq!(clause, "\"vendor\" = 'CMT' AND \"zone\" IS NULL");
    }

    #[test]
    fn test_where_clause_requires_identifier() {
        let renderer = SqlPartitionRenderer::new(SqlDialect::Sqlite);
        let err = renderer
            .where_clause(
                PartitionerMethod::ColumnValue,
                &PartitionerKwargs::for_column("vendor"),
                &BatchIdentifiers::new(),
            )
            .unwrap_err();
        assert!(err.is_invalid_request());
    }

    #[test]
    fn test_batch_query_for_query_source() {
        let renderer = SqlPartitionRenderer::new(SqlDialect::DataFusion);
        let spec = BatchSpec {
            data_asset_name: "recent".into(),
            source: BatchSource::RuntimeQuery {
                query: "SELECT * FROM trips".into(),
                temp_table_schema_name: None,
            },
            partitioner_method: Some(PartitionerMethod::ModInteger),
            partitioner_kwargs: Some(PartitionerKwargs {
                modulus: Some(3),
                ..PartitionerKwargs::for_column("id")
            }),
            batch_identifiers: BatchIdentifiers::from([(
                "id".to_string(),
                IdentifierValue::Value(PartitionValue::Int(2)),
            )]),
        };
        assert_eq!(
            renderer.batch_query(&spec).unwrap(),
            "SELECT * FROM (SELECT * FROM trips) AS batch_subquery WHERE \"id\" % 3 = 2"
        );
    }
}
