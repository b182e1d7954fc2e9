//! Dynamically typed partition values.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// A single value appearing in batch request options, batch identifiers or
/// batch metadata.
///
/// `Null` has a special meaning in caller-supplied options: it is a wildcard
/// that matches any discovered value.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PartitionValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl PartitionValue {
    pub fn is_null(&self) -> bool {
        matches!(self, PartitionValue::Null)
    }

    /// Returns true for `Date` and `Timestamp` values.
    pub fn is_temporal(&self) -> bool {
        matches!(self, PartitionValue::Date(_) | PartitionValue::Timestamp(_))
    }

    /// Converts dates and timestamps to their string form; other values are unchanged.
    ///
    /// Discovered temporal values are compared and merged into options in
    /// this form, so `2020-01-01` survives a round trip through options.
    pub fn coerce_temporal(self) -> Self {
        if self.is_temporal() {
            PartitionValue::String(self.to_string())
        } else {
            self
        }
    }

    /// Loose equality: integers and floats compare numerically, everything
    /// else compares within its own variant.
    pub fn loosely_equals(&self, other: &PartitionValue) -> bool {
        use PartitionValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Float(b)) | (Float(b), Int(a)) => (*a as f64) == *b,
            (String(a), String(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (Timestamp(a), Timestamp(b)) => a == b,
            _ => false,
        }
    }

    /// Total order used when sorting batches.
    ///
    /// Bool < numbers < String < Date < Timestamp < Null, so null partitions
    /// come last in ascending order and first in descending order.
    pub fn total_cmp(&self, other: &PartitionValue) -> Ordering {
        use PartitionValue::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Int(_) | Float(_), Int(_) | Float(_)) => {
                self.as_f64().unwrap_or(f64::NAN).total_cmp(&other.as_f64().unwrap_or(f64::NAN))
            }
            (String(a), String(b)) => a.cmp(b),
            (Date(a), Date(b)) => a.cmp(b),
            (Timestamp(a), Timestamp(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            PartitionValue::Int(v) => Some(*v as f64),
            PartitionValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            PartitionValue::Bool(_) => 0,
            PartitionValue::Int(_) | PartitionValue::Float(_) => 1,
            PartitionValue::String(_) => 2,
            PartitionValue::Date(_) => 3,
            PartitionValue::Timestamp(_) => 4,
            PartitionValue::Null => 5,
        }
    }

    /// Converts to JSON; temporal values become strings.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            PartitionValue::Null => Value::Null,
            PartitionValue::Bool(b) => Value::Bool(*b),
            PartitionValue::Int(i) => Value::from(*i),
            PartitionValue::Float(f) => {
                serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number)
            }
            PartitionValue::String(s) => Value::String(s.clone()),
            temporal => Value::String(temporal.to_string()),
        }
    }
}

impl PartialEq for PartitionValue {
    fn eq(&self, other: &Self) -> bool {
        self.loosely_equals(other)
    }
}

impl fmt::Display for PartitionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionValue::Null => write!(f, "None"),
            PartitionValue::Bool(b) => write!(f, "{b}"),
            PartitionValue::Int(i) => write!(f, "{i}"),
            PartitionValue::Float(v) => write!(f, "{v}"),
            PartitionValue::String(s) => write!(f, "{s}"),
            PartitionValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            PartitionValue::Timestamp(ts) => {
                let nanos = ts.nanosecond();
                if nanos == 0 {
                    write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S"))
                } else if nanos % 1_000 == 0 {
                    write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.6f"))
                } else {
                    write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.9f"))
                }
            }
        }
    }
}

impl From<serde_json::Value> for PartitionValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => PartitionValue::Null,
            Value::Bool(b) => PartitionValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PartitionValue::Int(i),
                None => PartitionValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => PartitionValue::String(s),
            other => PartitionValue::String(other.to_string()),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for PartitionValue {
            fn from(value: $t) -> Self {
                PartitionValue::Int(i64::from(value))
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for PartitionValue {
    fn from(value: f64) -> Self {
        PartitionValue::Float(value)
    }
}

impl From<bool> for PartitionValue {
    fn from(value: bool) -> Self {
        PartitionValue::Bool(value)
    }
}

impl From<&str> for PartitionValue {
    fn from(value: &str) -> Self {
        PartitionValue::String(value.to_string())
    }
}

impl From<String> for PartitionValue {
    fn from(value: String) -> Self {
        PartitionValue::String(value)
    }
}

impl From<NaiveDate> for PartitionValue {
    fn from(value: NaiveDate) -> Self {
        PartitionValue::Date(value)
    }
}

impl From<NaiveDateTime> for PartitionValue {
    fn from(value: NaiveDateTime) -> Self {
        PartitionValue::Timestamp(value)
    }
}

impl<T: Into<PartitionValue>> From<Option<T>> for PartitionValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(PartitionValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loose_numeric_equality() {
        assert_eq!(PartitionValue::Int(2), PartitionValue::Float(2.0));
        assert_ne!(PartitionValue::Int(2), PartitionValue::String("2".into()));
        assert_ne!(PartitionValue::Null, PartitionValue::Int(0));
    }

    #[test]
    fn test_temporal_coercion() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        assert_eq!(
            PartitionValue::Date(date).coerce_temporal(),
            PartitionValue::String("2020-01-31".into())
        );

        let ts = date.and_hms_opt(10, 30, 0).unwrap();
        assert_eq!(
            PartitionValue::Timestamp(ts).coerce_temporal(),
            PartitionValue::String("2020-01-31 10:30:00".into())
        );

        let precise = date.and_hms_micro_opt(10, 30, 0, 250).unwrap();
        assert_eq!(
            PartitionValue::Timestamp(precise).to_string(),
            "2020-01-31 10:30:00.000250"
        );

        let nanos = date.and_hms_nano_opt(10, 30, 0, 1).unwrap();
        assert_eq!(
            PartitionValue::Timestamp(nanos).coerce_temporal(),
            PartitionValue::String("2020-01-31 10:30:00.000000001".into())
        );
        assert_ne!(
            PartitionValue::Timestamp(nanos).to_string(),
            PartitionValue::Timestamp(date.and_hms_nano_opt(10, 30, 0, 2).unwrap()).to_string()
        );
        assert_eq!(PartitionValue::Int(5).coerce_temporal(), PartitionValue::Int(5));
    }

    #[test]
    fn test_total_order() {
        let mut values = vec![
            PartitionValue::String("b".into()),
            PartitionValue::Int(3),
            PartitionValue::Null,
            PartitionValue::Float(2.5),
            PartitionValue::Bool(true),
        ];
        values.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(
            values,
            vec![
                PartitionValue::Bool(true),
                PartitionValue::Float(2.5),
                PartitionValue::Int(3),
                PartitionValue::String("b".into()),
                PartitionValue::Null,
            ]
        );
        assert!(matches!(values.last(), Some(PartitionValue::Null)));
    }

    #[test]
    fn test_json_conversion() {
        assert_eq!(PartitionValue::from(serde_json::json!(7)), PartitionValue::Int(7));
        assert_eq!(PartitionValue::from(serde_json::json!(null)), PartitionValue::Null);
        let date = NaiveDate::from_ymd_opt(2021, 3, 4).unwrap();
        assert_eq!(PartitionValue::Date(date).to_json(), serde_json::json!("2021-03-04"));
        assert_eq!(PartitionValue::from(None::<i64>), PartitionValue::Null);
    }
}
