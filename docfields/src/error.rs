//! Error types for schema declaration, casting, querying and storage.

/// Crate-wide result alias
pub type DocResult<T> = std::result::Result<T, DocFieldsError>;

/// Typed docfields errors that can be converted into `sea_orm::DbErr`
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DocFieldsError {
    // Schema declaration errors
    #[error("field '{field}' is declared more than once on column '{column}'")]
    DuplicateField { column: String, field: String },

    #[error("accessor '{accessor}' is declared more than once on record type '{scope}'")]
    DuplicateAccessor { scope: String, accessor: String },

    #[error("store key '{store_key}' is used by more than one field on column '{column}'")]
    DuplicateStoreKey { column: String, store_key: String },

    #[error("accessor '{accessor}' collides with a reserved name on record type '{record_type}'")]
    ReservedAccessor {
        record_type: String,
        accessor: String,
    },

    #[error("unknown type '{type_name}'")]
    UnknownType { type_name: String },

    #[error("invalid default for field '{field}': {message}")]
    InvalidDefault { field: String, message: String },

    #[error("record type '{name}' is not registered")]
    UnknownRecordType { name: String },

    #[error("record type '{name}' is already registered")]
    DuplicateRecordType { name: String },

    // Type system errors
    #[error("cannot cast '{value}' to {type_name}")]
    Cast { type_name: String, value: String },

    #[error(
        "unable to set value '{value}' on '{field}': expected a map, null, or a matching nested document"
    )]
    UnknownValue { field: String, value: String },

    #[error("'{field}' is not a declared field")]
    UnknownField { field: String },

    // Query validation errors
    #[error("a column named `{column}` does not exist on the `{table}` table")]
    InvalidColumnName { table: String, column: String },

    #[error(
        "`{field}` is not a valid field name, valid field names include: {}",
        format_valid(.valid)
    )]
    InvalidFieldName { field: String, valid: Vec<String> },

    #[error(
        "`{direction}` is not a valid direction for ordering, only `asc` and `desc` are accepted"
    )]
    InvalidDirection { direction: String },

    #[error("{operation} does not accept {value} for `{field}` field")]
    NotSupported {
        operation: String,
        field: String,
        value: String,
    },

    // Configuration errors
    #[error("invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    // Storage errors
    #[error("storage {operation} failed: {message}")]
    Storage { operation: String, message: String },

    #[error("no row with key '{key}' in table '{table}'")]
    RecordNotFound { table: String, key: String },

    #[error("record of type '{record_type}' has no key")]
    MissingKey { record_type: String },
}

fn format_valid(valid: &[String]) -> String {
    valid
        .iter()
        .map(|key| format!("`{}`", key))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<DocFieldsError> for sea_orm::DbErr {
    fn from(err: DocFieldsError) -> Self {
        sea_orm::DbErr::Custom(err.to_string())
    }
}

impl From<sea_orm::DbErr> for DocFieldsError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Storage {
            operation: "query".to_string(),
            message: err.to_string(),
        }
    }
}

impl DocFieldsError {
    /// Create a cast error for a value that cannot be coerced
    pub fn cast(type_name: impl Into<String>, value: impl std::fmt::Display) -> Self {
        Self::Cast {
            type_name: type_name.into(),
            value: value.to_string(),
        }
    }

    /// Create an unknown value error for a nested assignment
    pub fn unknown_value(field: impl Into<String>, value: impl std::fmt::Display) -> Self {
        Self::UnknownValue {
            field: field.into(),
            value: value.to_string(),
        }
    }

    /// Create an unknown field error
    pub fn unknown_field(field: impl Into<String>) -> Self {
        Self::UnknownField {
            field: field.into(),
        }
    }

    /// Create an unknown type error
    pub fn unknown_type(type_name: impl Into<String>) -> Self {
        Self::UnknownType {
            type_name: type_name.into(),
        }
    }

    /// Create a not-supported query error
    pub fn not_supported(
        operation: impl Into<String>,
        field: impl Into<String>,
        value: impl std::fmt::Display,
    ) -> Self {
        Self::NotSupported {
            operation: operation.into(),
            field: field.into(),
            value: value.to_string(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Errors raised while declaring or resolving schemas
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateField { .. }
                | Self::DuplicateAccessor { .. }
                | Self::DuplicateStoreKey { .. }
                | Self::ReservedAccessor { .. }
                | Self::UnknownType { .. }
                | Self::InvalidDefault { .. }
                | Self::UnknownRecordType { .. }
                | Self::DuplicateRecordType { .. }
        )
    }

    /// Errors raised while validating a query request
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidColumnName { .. }
                | Self::InvalidFieldName { .. }
                | Self::InvalidDirection { .. }
                | Self::NotSupported { .. }
        )
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Cast { type_name, value } => {
                format!("The value '{}' is not a valid {}", value, type_name)
            }
            Self::UnknownValue { field, value } => {
                format!("'{}' cannot be assigned to the nested field '{}'", value, field)
            }
            Self::InvalidFieldName { field, valid } => {
                format!(
                    "'{}' is not a field of this document. Try one of: {}",
                    field,
                    valid.join(", ")
                )
            }
            Self::Storage { operation, message } => {
                format!("Database {} operation failed: {}", operation, message)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_field_name_lists_valid_keys() {
        let err = DocFieldsError::InvalidFieldName {
            field: "nope".to_string(),
            valid: vec!["t".to_string(), "r".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "`nope` is not a valid field name, valid field names include: `t`, `r`"
        );
        assert!(err.is_query_error());
        assert!(!err.is_schema_error());
    }

    #[test]
    fn test_into_db_err() {
        let err = DocFieldsError::unknown_type("money");
        let db_err: sea_orm::DbErr = err.into();
        assert_eq!(db_err.to_string(), "Custom Error: unknown type 'money'");
    }
}
