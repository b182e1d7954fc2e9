//! SQLite-backed execution engine.
//!
//! SQLite values are dynamically typed, so result columns are typed from the
//! values they actually hold: all-integer columns become `Int64`, numeric
//! columns with any real become `Float64`, and everything else becomes `Utf8`.

use super::{EngineFactory, ExecutionEngine, ResolvedConnection, SqlDialect};
use crate::error::{BatchError, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

/// URL scheme accepted by [`SqliteEngineFactory`].
pub const SQLITE_SCHEME: &str = "sqlite";

/// Runs statements on a single SQLite connection.
pub struct SqliteEngine {
    conn: Mutex<Connection>,
}

impl SqliteEngine {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| BatchError::Internal(format!("Failed to acquire SQLite connection lock: {e}")))
    }

    /// Runs statements that return no rows, such as DDL for fixtures.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }
}

impl std::fmt::Debug for SqliteEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteEngine").finish_non_exhaustive()
    }
}

#[async_trait]
impl ExecutionEngine for SqliteEngine {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    #[instrument(skip(self), fields(engine = "sqlite"))]
    async fn execute(&self, sql: &str) -> Result<(SchemaRef, Vec<RecordBatch>)> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut columns: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            for (i, column) in columns.iter_mut().enumerate() {
                column.push(row.get::<_, Value>(i)?);
            }
        }

        let (fields, arrays): (Vec<Field>, Vec<ArrayRef>) = names
            .into_iter()
            .zip(columns)
            .map(|(name, values)| column_to_array(name, values))
            .unzip();
        let schema = Arc::new(Schema::new(fields));
        let row_count = arrays.first().map_or(0, |a| a.len());
        debug!(rows = row_count, "Statement executed");

        if row_count == 0 {
            return Ok((schema, Vec::new()));
        }
        let batch = RecordBatch::try_new(schema.clone(), arrays)?;
        Ok((schema, vec![batch]))
    }

    async fn schema_names(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("PRAGMA database_list")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }
}

fn column_to_array(name: String, values: Vec<Value>) -> (Field, ArrayRef) {
    let all_int = values
        .iter()
        .all(|v| matches!(v, Value::Null | Value::Integer(_)));
    let all_numeric = values
        .iter()
        .all(|v| matches!(v, Value::Null | Value::Integer(_) | Value::Real(_)));

    if all_int {
        let array: Int64Array = values
            .iter()
            .map(|v| match v {
                Value::Integer(i) => Some(*i),
                _ => None,
            })
            .collect();
        (Field::new(name, DataType::Int64, true), Arc::new(array))
    } else if all_numeric {
        let array: Float64Array = values
            .iter()
            .map(|v| match v {
                Value::Integer(i) => Some(*i as f64),
                Value::Real(f) => Some(*f),
                _ => None,
            })
            .collect();
        (Field::new(name, DataType::Float64, true), Arc::new(array))
    } else {
        let array: StringArray = values
            .iter()
            .map(|v| match v {
                Value::Null => None,
                Value::Integer(i) => Some(i.to_string()),
                Value::Real(f) => Some(f.to_string()),
                Value::Text(s) => Some(s.clone()),
                Value::Blob(b) => Some(hex::encode(b)),
            })
            .collect();
        (Field::new(name, DataType::Utf8, true), Arc::new(array))
    }
}

/// Opens SQLite databases from `sqlite://` connection strings.
///
/// `sqlite://:memory:` (or `sqlite://`) opens an in-memory database. Otherwise
/// the path follows the three-slash convention: `sqlite:///data.db` is
/// relative, `sqlite:////var/data.db` is absolute.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteEngineFactory;

impl SqliteEngineFactory {
    fn database_path(connection_string: &str) -> Result<Option<&str>> {
        let rest = connection_string
            .strip_prefix(SQLITE_SCHEME)
            .and_then(|r| r.strip_prefix("://"))
            .ok_or_else(|| {
                BatchError::Configuration(format!(
                    "SQLite connection strings must start with '{SQLITE_SCHEME}://'"
                ))
            })?;
        let path = rest.strip_prefix('/').unwrap_or(rest);
        if path.is_empty() || path == ":memory:" {
            Ok(None)
        } else {
            Ok(Some(path))
        }
    }
}

impl EngineFactory for SqliteEngineFactory {
    fn create_engine(&self, connection: &ResolvedConnection) -> Result<Arc<dyn ExecutionEngine>> {
        let engine = match Self::database_path(connection.connection_string.expose())? {
            None => SqliteEngine::in_memory(),
            Some(path) => SqliteEngine::open(Path::new(path)),
        }
        .map_err(|e| BatchError::engine_creation_with_source("failed to open SQLite database", Box::new(e)))?;
        debug!("Created SQLite engine");
        Ok(Arc::new(engine))
    }
}
