//! SQL datasources: named connections that own assets and a cached engine.
//!
//! ```rust,no_run
//! use batchwise::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> batchwise::error::Result<()> {
//! let mut datasource = SqlDatasource::new(
//!     "warehouse",
//!     DatasourceKind::Sqlite,
//!     "sqlite:////var/data/${DB_NAME}.db",
//!     Arc::new(SqliteEngineFactory),
//! )?;
//! datasource.add_table_asset(TableAsset::new("trips", "yellow_trips")?)?;
//!
//! let trips = datasource.asset("trips")?;
//! let request = trips.build_batch_request(
//!     None,
//!     Some("[-1:]".parse()?),
//!     Some(Partitioner::year_and_month("pickup_datetime")?),
//!     None,
//! )?;
//! let batches = trips.get_batch_list_from_batch_request(&request).await?;
//! # Ok(())
//! # }
//! ```

use crate::assets::{DataAsset, QueryAsset, SqlAsset, TableAsset};
use crate::config::{ConfigProvider, ConfigStr, EnvConfigProvider};
use crate::core::{Batch, BatchRequest, BatchRequestOptions, BatchSlice, Partitioner, Sorter};
use crate::engine::{EngineFactory, ExecutionEngine, ResolvedConnection};
use crate::error::{BatchError, Result};
use crate::logging::LogConfig;
use crate::partitioners::SqlPartitioner;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};

pub mod expand;
mod materialize;

use materialize::{get_batch_list, MaterializeContext};

/// Backend family of a datasource; decides which partitioners are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasourceKind {
    /// Generic SQL backend.
    Sql,
    /// SQLite, which adds the converted-datetime partitioner.
    Sqlite,
}

impl DatasourceKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            DatasourceKind::Sql => "sql",
            DatasourceKind::Sqlite => "sqlite",
        }
    }

    fn display_name(&self) -> &'static str {
        match self {
            DatasourceKind::Sql => "SqlDatasource",
            DatasourceKind::Sqlite => "SqliteDatasource",
        }
    }

    /// The family a connection string's scheme points at, if more specific than `sql`.
    fn for_scheme(scheme: &str) -> Option<Self> {
        let connector = scheme.split('+').next().unwrap_or(scheme);
        match connector {
            "sqlite" => Some(DatasourceKind::Sqlite),
            _ => None,
        }
    }
}

impl fmt::Display for DatasourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Serialized form of a [`SqlDatasource`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasourceConfig {
    #[serde(rename = "type")]
    pub kind: DatasourceKind,
    pub name: String,
    pub connection_string: ConfigStr,
    #[serde(default)]
    pub create_temp_table: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub kwargs: BTreeMap<String, ConfigStr>,
    #[serde(default)]
    pub assets: Vec<DataAsset>,
}

/// Holds at most one engine, keyed by the resolved connection it was built from.
#[derive(Default)]
pub struct EngineCache {
    cell: Mutex<Option<(ResolvedConnection, Arc<dyn ExecutionEngine>)>>,
}

impl EngineCache {
    /// Returns the cached engine if `connection` is unchanged, else builds a new one.
    pub fn get_or_create(
        &self,
        connection: ResolvedConnection,
        create: impl FnOnce(&ResolvedConnection) -> Result<Arc<dyn ExecutionEngine>>,
    ) -> Result<Arc<dyn ExecutionEngine>> {
        let mut cell = self
            .cell
            .lock()
            .map_err(|e| BatchError::Internal(format!("Failed to acquire engine cache lock: {e}")))?;

        if let Some((cached, engine)) = cell.as_ref() {
            if *cached == connection {
                return Ok(Arc::clone(engine));
            }
            info!("Connection details changed, rebuilding execution engine");
        }

        let engine = create(&connection).map_err(|e| match e {
            e @ BatchError::EngineCreation { .. } => e,
            other => BatchError::engine_creation_with_source(other.to_string(), Box::new(other)),
        })?;
        *cell = Some((connection, Arc::clone(&engine)));
        Ok(engine)
    }

    pub fn is_cached(&self) -> bool {
        self.cell.lock().map(|c| c.is_some()).unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut cell) = self.cell.lock() {
            *cell = None;
        }
    }
}

impl fmt::Debug for EngineCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineCache")
            .field("cached", &self.is_cached())
            .finish()
    }
}

/// A named SQL connection with its assets.
#[derive(Debug)]
pub struct SqlDatasource {
    name: String,
    kind: DatasourceKind,
    connection_string: ConfigStr,
    create_temp_table: bool,
    kwargs: BTreeMap<String, ConfigStr>,
    assets: Vec<DataAsset>,
    engine_factory: Arc<dyn EngineFactory>,
    config_provider: Arc<dyn ConfigProvider>,
    log_config: LogConfig,
    engine_cache: EngineCache,
}

impl SqlDatasource {
    pub fn new(
        name: impl Into<String>,
        kind: DatasourceKind,
        connection_string: impl Into<ConfigStr>,
        engine_factory: Arc<dyn EngineFactory>,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BatchError::Configuration(
                "datasource name cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            name,
            kind,
            connection_string: connection_string.into(),
            create_temp_table: false,
            kwargs: BTreeMap::new(),
            assets: Vec::new(),
            engine_factory,
            config_provider: Arc::new(EnvConfigProvider),
            log_config: LogConfig::default(),
            engine_cache: EngineCache::default(),
        })
    }

    /// A generic datasource over a DataFusion session.
    pub fn datafusion(name: impl Into<String>, ctx: ::datafusion::prelude::SessionContext) -> Result<Self> {
        Self::new(
            name,
            DatasourceKind::Sql,
            "datafusion://session",
            Arc::new(crate::engine::DataFusionEngineFactory::new(ctx)),
        )
    }

    /// A SQLite datasource for a `sqlite://` connection string.
    #[cfg(feature = "sqlite")]
    pub fn sqlite(name: impl Into<String>, connection_string: impl Into<ConfigStr>) -> Result<Self> {
        Self::new(
            name,
            DatasourceKind::Sqlite,
            connection_string,
            Arc::new(crate::engine::SqliteEngineFactory),
        )
    }

    pub fn with_kwargs(mut self, kwargs: BTreeMap<String, ConfigStr>) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn with_create_temp_table(mut self, create_temp_table: bool) -> Self {
        self.create_temp_table = create_temp_table;
        self
    }

    pub fn with_config_provider(mut self, provider: Arc<dyn ConfigProvider>) -> Self {
        self.config_provider = provider;
        self
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Rebuilds a datasource from its serialized form.
    pub fn from_config(config: DatasourceConfig, engine_factory: Arc<dyn EngineFactory>) -> Result<Self> {
        let mut datasource = Self::new(config.name, config.kind, config.connection_string, engine_factory)?
            .with_kwargs(config.kwargs)
            .with_create_temp_table(config.create_temp_table);
        for asset in config.assets {
            datasource.add_asset(asset)?;
        }
        Ok(datasource)
    }

    pub fn to_config(&self) -> DatasourceConfig {
        DatasourceConfig {
            kind: self.kind,
            name: self.name.clone(),
            connection_string: self.connection_string.clone(),
            create_temp_table: self.create_temp_table,
            kwargs: self.kwargs.clone(),
            assets: self.assets.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DatasourceKind {
        self.kind
    }

    pub fn connection_string(&self) -> &ConfigStr {
        &self.connection_string
    }

    /// Changes the connection string; the cached engine is rebuilt on next use.
    pub fn set_connection_string(&mut self, connection_string: impl Into<ConfigStr>) {
        self.connection_string = connection_string.into();
    }

    pub fn asset_names(&self) -> Vec<&str> {
        self.assets.iter().map(DataAsset::name).collect()
    }

    pub fn add_table_asset(&mut self, asset: TableAsset) -> Result<AssetHandle<'_>> {
        self.add_asset(DataAsset::Table(asset))
    }

    pub fn add_query_asset(&mut self, asset: QueryAsset) -> Result<AssetHandle<'_>> {
        self.add_asset(DataAsset::Query(asset))
    }

    fn add_asset(&mut self, asset: DataAsset) -> Result<AssetHandle<'_>> {
        if self.assets.iter().any(|a| a.name() == asset.name()) {
            return Err(BatchError::Configuration(format!(
                "'{}' already contains an asset named '{}'",
                self.name,
                asset.name()
            )));
        }
        self.assets.push(asset);
        let asset = self
            .assets
            .last()
            .ok_or_else(|| BatchError::Internal("asset was not stored".to_string()))?;
        Ok(AssetHandle {
            datasource: self,
            asset,
        })
    }

    /// Looks up an asset by name.
    pub fn asset(&self, name: &str) -> Result<AssetHandle<'_>> {
        self.assets
            .iter()
            .find(|a| a.name() == name)
            .map(|asset| AssetHandle {
                datasource: self,
                asset,
            })
            .ok_or_else(|| BatchError::AssetNotFound {
                datasource: self.name.clone(),
                asset: name.to_string(),
            })
    }

    fn resolve_connection(&self) -> Result<ResolvedConnection> {
        let provider = self.config_provider.as_ref();
        let mut kwargs = BTreeMap::new();
        for (key, value) in &self.kwargs {
            kwargs.insert(key.clone(), value.resolve(provider)?);
        }
        Ok(ResolvedConnection {
            connection_string: self.connection_string.resolve(provider)?,
            kwargs,
        })
    }

    /// The execution engine for the current connection details.
    ///
    /// The engine is cached and only rebuilt when the resolved connection
    /// string or kwargs change.
    pub fn get_engine(&self) -> Result<Arc<dyn ExecutionEngine>> {
        let connection = self.resolve_connection()?;
        self.engine_cache.get_or_create(connection, |resolved| {
            self.warn_for_more_specific_datasource_type(resolved);
            self.engine_factory.create_engine(resolved)
        })
    }

    fn warn_for_more_specific_datasource_type(&self, connection: &ResolvedConnection) {
        if self.kind != DatasourceKind::Sql {
            return;
        }
        if let Some(specific) = connection.scheme().and_then(DatasourceKind::for_scheme) {
            warn!(
                datasource = %self.name,
                "You are using a generic SqlDatasource but a more specific {} may be more appropriate",
                specific.display_name()
            );
        }
    }

    /// Checks connectivity, then each asset when `test_assets` is set.
    #[instrument(skip(self), fields(datasource = %self.name))]
    pub async fn test_connection(&self, test_assets: bool) -> Result<()> {
        let wrap = |e: BatchError| {
            BatchError::test_connection_with_source(
                format!("Attempt to connect to datasource failed with the following error message: {e}"),
                Box::new(e),
            )
        };
        let engine = self.get_engine().map_err(wrap)?;
        engine.ping().await.map_err(wrap)?;

        if test_assets {
            for asset in &self.assets {
                asset.as_sql_asset().test_connection(engine.as_ref()).await?;
            }
        }
        Ok(())
    }

    /// Resolves the request's asset and returns its batches.
    pub async fn get_batch_list_from_batch_request(&self, request: &BatchRequest) -> Result<Vec<Batch>> {
        self.asset(&request.data_asset_name)?
            .get_batch_list_from_batch_request(request)
            .await
    }
}

/// An asset bound to the datasource that owns it.
#[derive(Debug, Clone, Copy)]
pub struct AssetHandle<'a> {
    datasource: &'a SqlDatasource,
    asset: &'a DataAsset,
}

impl<'a> AssetHandle<'a> {
    pub fn name(&self) -> &'a str {
        self.asset.name()
    }

    pub fn asset(&self) -> &'a DataAsset {
        self.asset
    }

    pub fn datasource(&self) -> &'a SqlDatasource {
        self.datasource
    }

    fn sql_partitioner(&self, partitioner: &Partitioner) -> Result<SqlPartitioner> {
        SqlPartitioner::for_family(partitioner, self.datasource.kind)
    }

    /// Option keys accepted by batch requests using `partitioner`.
    pub fn get_batch_request_options_keys(&self, partitioner: Option<&Partitioner>) -> Result<Vec<String>> {
        match partitioner {
            Some(p) => Ok(self.sql_partitioner(p)?.param_names()),
            None => Ok(Vec::new()),
        }
    }

    fn options_are_valid(&self, options: &BatchRequestOptions, partitioner: Option<&Partitioner>) -> Result<bool> {
        if options.is_empty() {
            return Ok(true);
        }
        let allowed: BTreeSet<String> = self
            .get_batch_request_options_keys(partitioner)?
            .into_iter()
            .collect();
        let actual: BTreeSet<String> = options.keys().cloned().collect();
        Ok(allowed == actual)
    }

    /// Builds a request for this asset, validating the options against the partitioner.
    pub fn build_batch_request(
        &self,
        options: Option<BatchRequestOptions>,
        batch_slice: Option<BatchSlice>,
        partitioner: Option<Partitioner>,
        sorters: Option<Vec<Sorter>>,
    ) -> Result<BatchRequest> {
        let options = options.unwrap_or_default();
        if !self.options_are_valid(&options, partitioner.as_ref())? {
            let allowed = self.get_batch_request_options_keys(partitioner.as_ref())?;
            let actual: Vec<String> = options.keys().cloned().collect();
            return Err(BatchError::invalid_batch_request(
                format!(
                    "Batch request options should only contain keys from the following set: {allowed:?} \
                     but your specified keys {actual:?} do not match that set"
                ),
                allowed,
                actual,
            ));
        }

        Ok(BatchRequest {
            datasource_name: self.datasource.name.clone(),
            data_asset_name: self.name().to_string(),
            options,
            partitioner,
            batch_slice,
            sorters: sorters.unwrap_or_default(),
        })
    }

    fn validate_batch_request(&self, request: &BatchRequest) -> Result<()> {
        let form_matches = request.datasource_name == self.datasource.name
            && request.data_asset_name == self.name()
            && self.options_are_valid(&request.options, request.partitioner.as_ref())?;
        if !form_matches {
            let allowed = self.get_batch_request_options_keys(request.partitioner.as_ref())?;
            return Err(BatchError::invalid_batch_request(
                format!(
                    "BatchRequest should target datasource '{}', asset '{}' with options {allowed:?}, \
                     but targets datasource '{}', asset '{}' with options {:?}",
                    self.datasource.name,
                    self.name(),
                    request.datasource_name,
                    request.data_asset_name,
                    request.options.keys().collect::<Vec<_>>()
                ),
                allowed,
                request.options.keys().cloned(),
            ));
        }
        Ok(())
    }

    /// Materializes every batch matching `request`, sorted and sliced.
    #[instrument(skip(self, request), fields(datasource = %self.datasource.name, asset = %self.name()))]
    pub async fn get_batch_list_from_batch_request(&self, request: &BatchRequest) -> Result<Vec<Batch>> {
        self.validate_batch_request(request)?;
        let partitioner = request
            .partitioner
            .as_ref()
            .map(|p| self.sql_partitioner(p))
            .transpose()?;
        let engine = self.datasource.get_engine()?;

        get_batch_list(
            self.asset.as_sql_asset(),
            partitioner.as_ref(),
            request,
            MaterializeContext {
                engine: engine.as_ref(),
                config_provider: self.datasource.config_provider.as_ref(),
                log_config: &self.datasource.log_config,
            },
        )
        .await
    }

    /// Checks that this asset is reachable.
    pub async fn test_connection(&self) -> Result<()> {
        let engine = self.datasource.get_engine()?;
        self.asset.as_sql_asset().test_connection(engine.as_ref()).await
    }
}
