//! Configuration strings with `${VAR}` substitution.
//!
//! Connection strings, engine kwargs and batch metadata may reference
//! variables that are only resolved when an engine is built. The resolved
//! value (not the raw template) is what the datasource's engine cache compares,
//! so a changed credential triggers a rebuild even when the template is
//! unchanged.

use crate::error::{BatchError, Result};
use crate::security::SecureString;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

static SUBSTITUTION_REGEX: Lazy<Regex> = Lazy::new(|| {
    // This regex is compile-time constant and known to be valid
    #[allow(clippy::expect_used)]
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("Hard-coded regex pattern should be valid")
});

/// Source of values for `${VAR}` placeholders.
pub trait ConfigProvider: fmt::Debug + Send + Sync {
    /// Returns the value for `key`, if the provider knows it.
    fn get(&self, key: &str) -> Option<String>;
}

/// Resolves placeholders from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfigProvider;

impl ConfigProvider for EnvConfigProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Resolves placeholders from an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct MapConfigProvider {
    values: BTreeMap<String, String>,
}

impl MapConfigProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a value.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl ConfigProvider for MapConfigProvider {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// A configuration value that may contain `${VAR}` placeholders.
///
/// The raw template is what gets serialized; the resolved value is only ever
/// handed out as a [`SecureString`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigStr(String);

impl fmt::Debug for ConfigStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConfigStr").field(&self.0).finish()
    }
}

impl ConfigStr {
    /// Wraps a raw template.
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// The raw, unresolved template.
    pub fn template(&self) -> &str {
        &self.0
    }

    /// Returns true if the template contains at least one placeholder.
    pub fn needs_substitution(&self) -> bool {
        SUBSTITUTION_REGEX.is_match(&self.0)
    }

    /// Names of the variables referenced by the template, in order of appearance.
    pub fn variables(&self) -> Vec<String> {
        SUBSTITUTION_REGEX
            .captures_iter(&self.0)
            .map(|c| c[1].to_string())
            .collect()
    }

    /// Resolves every placeholder through `provider`.
    ///
    /// Fails with a configuration error naming the first variable the
    /// provider cannot supply.
    pub fn resolve(&self, provider: &dyn ConfigProvider) -> Result<SecureString> {
        if !self.needs_substitution() {
            return Ok(SecureString::new(self.0.clone()));
        }

        let mut missing: Option<String> = None;
        let resolved = SUBSTITUTION_REGEX.replace_all(&self.0, |caps: &Captures| {
            let key = &caps[1];
            match provider.get(key) {
                Some(value) => value,
                None => {
                    missing.get_or_insert_with(|| key.to_string());
                    String::new()
                }
            }
        });

        if let Some(key) = missing {
            return Err(BatchError::Configuration(format!(
                "Unable to substitute config variable '${{{key}}}': no value was provided"
            )));
        }

        Ok(SecureString::new(resolved.into_owned()))
    }
}

impl From<&str> for ConfigStr {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ConfigStr {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Substitutes placeholders inside string leaves of a JSON value.
pub(crate) fn substitute_json(
    value: &serde_json::Value,
    provider: &dyn ConfigProvider,
) -> Result<serde_json::Value> {
    use serde_json::Value;

    Ok(match value {
        Value::String(s) => Value::String(ConfigStr::new(s.as_str()).resolve(provider)?.into_string()),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| substitute_json(item, provider))
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), substitute_json(v, provider)?);
            }
            Value::Object(out)
        }
        other => other.clone(),
    })
}
