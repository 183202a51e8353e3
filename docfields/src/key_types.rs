//! Record key type
//!
//! Storage collaborators address rows by a `RecordKey`, which covers the
//! primary key shapes a document table is likely to use.

use sea_orm::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A key identifying one row of a table that carries document columns
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordKey {
    Int(i64),
    String(String),
    Uuid(Uuid),
}

impl RecordKey {
    /// Convert to a sea_orm::Value for database operations
    pub fn to_db_value(&self) -> Value {
        match self {
            Self::Int(value) => Value::BigInt(Some(*value)),
            Self::String(value) => Value::String(Some(Box::new(value.clone()))),
            Self::Uuid(value) => Value::Uuid(Some(Box::new(*value))),
        }
    }

    /// Create from a sea_orm::Value
    pub fn from_db_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(Some(i)) => Some(Self::Int(i64::from(*i))),
            Value::BigInt(Some(i)) => Some(Self::Int(*i)),
            Value::String(Some(s)) => {
                // Try to parse as UUID first, then fall back to string
                if let Ok(uuid) = Uuid::parse_str(s) {
                    Some(Self::Uuid(uuid))
                } else {
                    Some(Self::String((**s).clone()))
                }
            }
            Value::Uuid(Some(uuid)) => Some(Self::Uuid(**uuid)),
            _ => None,
        }
    }

    /// Read the key column of a query row, trying integer, uuid and text in turn
    pub fn from_row(row: &sea_orm::QueryResult, column: &str) -> Option<Self> {
        if let Ok(v) = row.try_get::<i64>("", column) {
            return Some(Self::Int(v));
        }
        if let Ok(v) = row.try_get::<Uuid>("", column) {
            return Some(Self::Uuid(v));
        }
        if let Ok(v) = row.try_get::<String>("", column) {
            return Some(match Uuid::parse_str(&v) {
                Ok(uuid) => Self::Uuid(uuid),
                Err(_) => Self::String(v),
            });
        }
        None
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{}", value),
            Self::String(value) => write!(f, "{}", value),
            Self::Uuid(value) => write!(f, "{}", value),
        }
    }
}

impl FromStr for RecordKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("empty record key".to_string());
        }
        if let Ok(value) = s.parse::<i64>() {
            return Ok(Self::Int(value));
        }
        if let Ok(uuid) = Uuid::parse_str(s) {
            return Ok(Self::Uuid(uuid));
        }
        Ok(Self::String(s.to_string()))
    }
}

impl From<i64> for RecordKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for RecordKey {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<String> for RecordKey {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for RecordKey {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<Uuid> for RecordKey {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<RecordKey> for sea_orm::Value {
    fn from(key: RecordKey) -> Self {
        key.to_db_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_conversion() {
        let key: RecordKey = 42i64.into();
        assert_eq!(key, RecordKey::Int(42));

        let key: RecordKey = "sku-1".into();
        assert_eq!(key, RecordKey::String("sku-1".to_string()));

        let uuid = Uuid::new_v4();
        let key: RecordKey = uuid.into();
        assert_eq!(key, RecordKey::Uuid(uuid));
    }

    #[test]
    fn test_serde_round_trip() {
        let uuid = Uuid::new_v4();
        for key in [RecordKey::Int(3), RecordKey::from("a"), RecordKey::Uuid(uuid)] {
            let encoded = serde_json::to_string(&key).unwrap();
            assert_eq!(serde_json::from_str::<RecordKey>(&encoded).unwrap(), key);
        }
        assert_eq!(serde_json::to_string(&RecordKey::Int(3)).unwrap(), r#"{"Int":3}"#);
    }

    #[test]
    fn test_db_value_conversion() {
        let key = RecordKey::Int(42);
        assert_eq!(key.to_db_value(), Value::BigInt(Some(42)));
        assert_eq!(RecordKey::from_db_value(&key.to_db_value()), Some(key));

        let key = RecordKey::String("test".to_string());
        assert_eq!(
            key.to_db_value(),
            Value::String(Some(Box::new("test".to_string())))
        );
        assert_eq!(RecordKey::from_db_value(&Value::Int(Some(7))), Some(RecordKey::Int(7)));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("12".parse::<RecordKey>().unwrap(), RecordKey::Int(12));
        assert_eq!(
            "abc".parse::<RecordKey>().unwrap(),
            RecordKey::String("abc".to_string())
        );
        assert!("".parse::<RecordKey>().is_err());
    }
}
