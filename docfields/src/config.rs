//! Runtime configuration shared by every schema resolved from one registry.

use std::env;
use std::str::FromStr;

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DocFieldsError, DocResult};

pub const STORAGE_TZ_ENV: &str = "DOCFIELDS_STORAGE_TZ";
pub const PASSENGER_POLICY_ENV: &str = "DOCFIELDS_PASSENGER_POLICY";
pub const DIALECT_ENV: &str = "DOCFIELDS_DIALECT";

/// What happens to undeclared document keys when a whole document is assigned
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassengerPolicy {
    /// Keep passenger keys from the prior document and carry incoming
    /// undeclared keys along as passenger data.
    #[default]
    Preserve,
    /// The new document holds declared storage keys only.
    Replace,
}

impl FromStr for PassengerPolicy {
    type Err = DocFieldsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preserve" => Ok(Self::Preserve),
            "replace" => Ok(Self::Replace),
            other => Err(DocFieldsError::invalid_configuration(
                "passenger_policy",
                format!("expected `preserve` or `replace`, got `{}`", other),
            )),
        }
    }
}

/// SQL shape used when building predicates against a document column
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    Sqlite,
}

impl FromStr for Dialect {
    type Err = DocFieldsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(DocFieldsError::invalid_configuration(
                "dialect",
                format!("expected `postgres` or `sqlite`, got `{}`", other),
            )),
        }
    }
}

impl From<sea_orm::DatabaseBackend> for Dialect {
    fn from(backend: sea_orm::DatabaseBackend) -> Self {
        match backend {
            sea_orm::DatabaseBackend::Sqlite => Self::Sqlite,
            _ => Self::Postgres,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocFieldsConfig {
    /// Offset used when writing datetimes into documents and when reading
    /// datetimes that carry no offset of their own.
    pub storage_offset: FixedOffset,
    pub passenger_policy: PassengerPolicy,
    pub dialect: Dialect,
}

impl Default for DocFieldsConfig {
    fn default() -> Self {
        Self {
            storage_offset: utc(),
            passenger_policy: PassengerPolicy::default(),
            dialect: Dialect::default(),
        }
    }
}

impl DocFieldsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage_offset(mut self, offset: FixedOffset) -> Self {
        self.storage_offset = offset;
        self
    }

    pub fn with_passenger_policy(mut self, policy: PassengerPolicy) -> Self {
        self.passenger_policy = policy;
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Build a configuration from `DOCFIELDS_*` environment variables,
    /// falling back to defaults for unset ones.
    pub fn from_env() -> DocResult<Self> {
        let mut config = Self::default();
        if let Ok(tz) = env::var(STORAGE_TZ_ENV) {
            config.storage_offset = parse_offset(&tz)?;
        }
        if let Ok(policy) = env::var(PASSENGER_POLICY_ENV) {
            config.passenger_policy = policy.parse()?;
        }
        if let Ok(dialect) = env::var(DIALECT_ENV) {
            config.dialect = dialect.parse()?;
        }
        log::debug!("docfields configuration loaded: {:?}", config);
        Ok(config)
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// Parse `UTC`, `Z` or a `+HH:MM` / `-HH:MM` offset
pub fn parse_offset(value: &str) -> DocResult<FixedOffset> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("utc") || trimmed.eq_ignore_ascii_case("z") {
        return Ok(utc());
    }
    let invalid = || {
        DocFieldsError::invalid_configuration(
            "storage_offset",
            format!("expected `UTC` or `+HH:MM`, got `{}`", trimmed),
        )
    };
    let (sign, rest) = match trimmed.chars().next() {
        Some('+') => (1, &trimmed[1..]),
        Some('-') => (-1, &trimmed[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_offset() {
        assert_eq!(parse_offset("UTC").unwrap(), utc());
        assert_eq!(
            parse_offset("+02:00").unwrap(),
            FixedOffset::east_opt(7200).unwrap()
        );
        assert_eq!(
            parse_offset("-03:30").unwrap(),
            FixedOffset::west_opt(3 * 3600 + 1800).unwrap()
        );
        assert!(matches!(
            parse_offset("Europe/Berlin"),
            Err(DocFieldsError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_policy_and_dialect_parsing() {
        assert_eq!("Replace".parse::<PassengerPolicy>().unwrap(), PassengerPolicy::Replace);
        assert_eq!("postgresql".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert!("mysql".parse::<Dialect>().is_err());
        assert_eq!(serde_json::to_string(&Dialect::Sqlite).unwrap(), "\"sqlite\"");
        assert_eq!(
            serde_json::from_str::<PassengerPolicy>("\"preserve\"").unwrap(),
            PassengerPolicy::Preserve
        );
    }

    #[test]
    fn test_builder() {
        let config = DocFieldsConfig::new()
            .with_dialect(Dialect::Sqlite)
            .with_passenger_policy(PassengerPolicy::Replace);
        assert_eq!(config.dialect, Dialect::Sqlite);
        assert_eq!(config.passenger_policy, PassengerPolicy::Replace);
        assert_eq!(config.storage_offset, utc());
    }
}
