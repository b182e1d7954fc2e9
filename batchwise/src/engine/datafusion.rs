//! DataFusion-backed execution engine.

use super::{EngineFactory, ExecutionEngine, ResolvedConnection, SqlDialect};
use crate::error::Result;
use ::datafusion::arrow::datatypes::SchemaRef;
use ::datafusion::arrow::record_batch::RecordBatch;
use ::datafusion::prelude::SessionContext;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Runs statements against tables registered in a DataFusion [`SessionContext`].
#[derive(Clone)]
pub struct DataFusionEngine {
    ctx: SessionContext,
}

impl DataFusionEngine {
    pub fn new(ctx: SessionContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }
}

impl std::fmt::Debug for DataFusionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFusionEngine")
            .field("session_id", &self.ctx.session_id())
            .finish()
    }
}

#[async_trait]
impl ExecutionEngine for DataFusionEngine {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::DataFusion
    }

    #[instrument(skip(self), fields(engine = "datafusion"))]
    async fn execute(&self, sql: &str) -> Result<(SchemaRef, Vec<RecordBatch>)> {
        let df = self.ctx.sql(sql).await?;
        let schema: SchemaRef = Arc::new(df.schema().as_arrow().clone());
        let batches = df.collect().await?;
        debug!(batches = batches.len(), "Statement executed");
        Ok((schema, batches))
    }

    async fn schema_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for catalog_name in self.ctx.catalog_names() {
            if let Some(catalog) = self.ctx.catalog(&catalog_name) {
                names.extend(catalog.schema_names());
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }
}

/// Hands out engines that share one [`SessionContext`].
///
/// The connection string only labels the context; tables must already be
/// registered on it.
#[derive(Clone, Default)]
pub struct DataFusionEngineFactory {
    ctx: SessionContext,
}

impl DataFusionEngineFactory {
    pub fn new(ctx: SessionContext) -> Self {
        Self { ctx }
    }
}

impl std::fmt::Debug for DataFusionEngineFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFusionEngineFactory")
            .field("session_id", &self.ctx.session_id())
            .finish()
    }
}

impl EngineFactory for DataFusionEngineFactory {
    fn create_engine(&self, connection: &ResolvedConnection) -> Result<Arc<dyn ExecutionEngine>> {
        debug!(scheme = ?connection.scheme(), "Creating DataFusion engine");
        Ok(Arc::new(DataFusionEngine::new(self.ctx.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_execute_and_ping() {
        let engine = DataFusionEngine::new(SessionContext::new());
        engine.ping().await.unwrap();
        let (schema, batches) = engine.execute("SELECT 1 AS one").await.unwrap();
        assert_eq!(schema.field(0).name(), "one");
        assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 1);
    }

    #[tokio::test]
    async fn test_schema_names_include_default() {
        let engine = DataFusionEngine::new(SessionContext::new());
        let names = engine.schema_names().await.unwrap();
        assert!(names.contains(&"public".to_string()));
    }

    #[tokio::test]
    async fn test_factory_shares_context() {
        let ctx = SessionContext::new();
        ctx.sql("CREATE TABLE t AS VALUES (1), (2)")
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();
        let factory = DataFusionEngineFactory::new(ctx);
        let engine = factory
            .create_engine(&ResolvedConnection::new("datafusion://local"))
            .unwrap();
        let (_, batches) = engine.execute("SELECT * FROM t").await.unwrap();
        assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 2);
    }
}
