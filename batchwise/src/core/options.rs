//! Batch request options and batch identifier records.

use super::value::PartitionValue;
use serde::Serialize;
use std::collections::BTreeMap;

/// Mapping of option name to value carried by a batch request.
///
/// A `Null` value is a wildcard when the request is expanded.
pub type BatchRequestOptions = BTreeMap<String, PartitionValue>;

/// Mapping of column name to the value(s) that characterize one batch.
pub type BatchIdentifiers = BTreeMap<String, IdentifierValue>;

/// The value recorded for one column of a batch identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IdentifierValue {
    /// One parameter derived from the column (raw value, quotient, remainder, ...).
    Value(PartitionValue),
    /// Several datetime parts derived from a single column.
    Parts(BTreeMap<String, PartitionValue>),
}

impl IdentifierValue {
    /// Returns the scalar value, if this is not a datetime-parts record.
    pub fn as_value(&self) -> Option<&PartitionValue> {
        match self {
            IdentifierValue::Value(v) => Some(v),
            IdentifierValue::Parts(_) => None,
        }
    }

    /// Returns the datetime parts, if this is a datetime-parts record.
    pub fn as_parts(&self) -> Option<&BTreeMap<String, PartitionValue>> {
        match self {
            IdentifierValue::Parts(parts) => Some(parts),
            IdentifierValue::Value(_) => None,
        }
    }
}

impl From<PartitionValue> for IdentifierValue {
    fn from(value: PartitionValue) -> Self {
        IdentifierValue::Value(value)
    }
}

/// Builds a [`BatchRequestOptions`] map from `(key, value)` pairs.
///
/// ```rust
/// use batchwise::core::{options_from, PartitionValue};
///
/// let options = options_from([("year", PartitionValue::Int(2020)), ("month", PartitionValue::Null)]);
/// assert_eq!(options.len(), 2);
/// ```
pub fn options_from<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> BatchRequestOptions
where
    K: Into<String>,
    V: Into<PartitionValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Renders identifiers as JSON.
pub fn identifiers_to_json(identifiers: &BatchIdentifiers) -> serde_json::Value {
    let mut map = serde_json::Map::with_capacity(identifiers.len());
    for (column, value) in identifiers {
        let json = match value {
            IdentifierValue::Value(v) => v.to_json(),
            IdentifierValue::Parts(parts) => serde_json::Value::Object(
                parts.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        };
        map.insert(column.clone(), json);
    }
    serde_json::Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_value_accessors() {
        let scalar = IdentifierValue::from(PartitionValue::Int(3));
        assert_eq!(scalar.as_value(), Some(&PartitionValue::Int(3)));
        assert!(scalar.as_parts().is_none());

        let parts = IdentifierValue::Parts(BTreeMap::from([(
            "year".to_string(),
            PartitionValue::Int(2020),
        )]));
        assert!(parts.as_value().is_none());
        assert_eq!(parts.as_parts().map(|p| p.len()), Some(1));
    }

    #[test]
    fn test_identifiers_to_json() {
        let identifiers = BatchIdentifiers::from([
            (
                "pickup_datetime".to_string(),
                IdentifierValue::Parts(BTreeMap::from([
                    ("year".to_string(), PartitionValue::Int(2020)),
                    ("month".to_string(), PartitionValue::Int(1)),
                ])),
            ),
            ("vendor_id".to_string(), IdentifierValue::from(PartitionValue::from("CMT"))),
        ]);
        assert_eq!(
            identifiers_to_json(&identifiers),
            serde_json::json!({
                "pickup_datetime": {"month": 1, "year": 2020},
                "vendor_id": "CMT"
            })
        );
    }
}
