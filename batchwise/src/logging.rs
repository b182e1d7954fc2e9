//! Logging utilities and configuration for batchwise.
//!
//! Library code logs through `tracing`. [`LogConfig`] controls how chatty the
//! partitioning pipeline is; [`setup`] installs a `tracing-subscriber` for
//! applications that do not bring their own.

use tracing::Level;

/// Logging configuration for the batch pipeline.
///
/// This configuration allows fine-grained control over logging behavior
/// to keep discovery and materialization quiet in production.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level for batchwise components
    pub base_level: Level,
    /// Whether to log discovery SQL and discovered partition values
    pub log_partition_details: bool,
    /// Whether to log batch materialization
    pub log_data_operations: bool,
    /// Maximum length for logged field values such as SQL text
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_partition_details: false,
            log_data_operations: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Creates a verbose configuration suitable for debugging.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_partition_details: true,
            log_data_operations: true,
            max_field_length: 1024,
        }
    }

    /// Creates a minimal configuration for production with lowest overhead.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_partition_details: false,
            log_data_operations: false,
            max_field_length: 128,
        }
    }

    /// Creates a balanced configuration suitable for most use cases.
    pub fn balanced() -> Self {
        Self::default()
    }
}

/// Macro for performance-sensitive debug logging.
///
/// This macro only evaluates its arguments if debug logging is enabled,
/// avoiding the overhead of formatting when logs won't be emitted.
#[macro_export]
macro_rules! perf_debug {
    ($config:expr, $($arg:tt)*) => {
        if $config.base_level >= tracing::Level::DEBUG {
            tracing::debug!($($arg)*);
        }
    };
}

/// Macro for conditional partition discovery logging.
#[macro_export]
macro_rules! log_partition {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_partition_details {
            tracing::debug!($($arg)*);
        }
    };
}

/// Macro for conditional data operation logging.
#[macro_export]
macro_rules! log_data_op {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_data_operations {
            tracing::info!($($arg)*);
        }
    };
}

/// Truncates a string to the maximum field length if needed.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        value.to_string()
    } else {
        let mut end = max_length;
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...(truncated)", &value[..end])
    }
}

/// Utilities for setting up structured logging.
pub mod setup {
    use tracing::Level;

    /// Configuration for the global subscriber.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for the application
        pub level: Level,
        /// Log level for batchwise components specifically
        pub batchwise_level: Level,
        /// Whether to use JSON output format
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                batchwise_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// Creates a configuration for production use.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                batchwise_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        /// Creates a configuration for development use.
        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                batchwise_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        /// Sets the log level for the application.
        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        /// Sets the log level for batchwise components.
        pub fn with_batchwise_level(mut self, level: Level) -> Self {
            self.batchwise_level = level;
            self
        }

        /// Sets whether to use JSON output format.
        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        /// Sets a custom environment filter.
        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            if let Some(ref filter) = self.env_filter {
                filter.clone()
            } else {
                format!(
                    "{},batchwise={}",
                    self.level.as_str().to_lowercase(),
                    self.batchwise_level.as_str().to_lowercase()
                )
            }
        }
    }

    /// Initializes the global `tracing` subscriber.
    ///
    /// `RUST_LOG` takes precedence over the configured filter.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use batchwise::logging::setup::{LoggingConfig, init_logging};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::setup::LoggingConfig;
    use super::*;

    #[test]
    fn test_log_config_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.base_level, Level::INFO);
        assert!(!config.log_partition_details);
        assert!(config.log_data_operations);
        assert_eq!(config.max_field_length, 256);
    }

    #[test]
    fn test_log_config_presets() {
        let verbose = LogConfig::verbose();
        assert_eq!(verbose.base_level, Level::DEBUG);
        assert!(verbose.log_partition_details);

        let production = LogConfig::production();
        assert_eq!(production.base_level, Level::WARN);
        assert!(!production.log_data_operations);
        assert_eq!(production.max_field_length, 128);
    }

    #[test]
    fn test_truncate_field() {
        assert_eq!(truncate_field("hello", 10), "hello");
        assert_eq!(
            truncate_field("SELECT DISTINCT year FROM orders", 15),
            "SELECT DISTINCT...(truncated)"
        );
    }

    #[test]
    fn test_env_filter() {
        let config = LoggingConfig::default();
        assert_eq!(config.env_filter(), "info,batchwise=debug");

        let custom = LoggingConfig::production().with_env_filter("batchwise=trace");
        assert_eq!(custom.env_filter(), "batchwise=trace");
    }
}
