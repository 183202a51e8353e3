//! Field declarations for one document column.
//!
//! A [`FieldSchema`] is built once from an ordered list of [`FieldSpec`]s and
//! is immutable afterwards. Nested specs produce child schemas that are shared
//! through `Arc` by every nested document created from them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use heck::ToUpperCamelCase;

use crate::config::DocFieldsConfig;
use crate::error::{DocFieldsError, DocResult};
use crate::types::{cast_for_runtime, EnumType, TypeTag, TypedValue};

pub type DefaultThunk = Arc<dyn Fn() -> TypedValue + Send + Sync>;

/// Default of a field: a literal, or a thunk evaluated on every construction
#[derive(Clone)]
pub enum DefaultValue {
    Literal(TypedValue),
    Thunk(DefaultThunk),
}

impl DefaultValue {
    pub fn evaluate(&self) -> TypedValue {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Thunk(thunk) => thunk(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Thunk(_) => f.write_str("Thunk(..)"),
        }
    }
}

#[derive(Debug, Clone)]
enum Affix {
    Literal(String),
    /// The document column name (or the parent field name inside a nested schema)
    Column,
}

#[derive(Debug, Clone)]
enum SpecKind {
    Typed(String),
    Enumeration(Vec<(String, i64)>),
    Nested(Vec<FieldSpec>),
}

/// Builder describing one declared field
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    kind: SpecKind,
    store_key: Option<String>,
    default: Option<DefaultValue>,
    prefix: Option<Affix>,
    suffix: Option<Affix>,
    array: bool,
}

impl FieldSpec {
    fn with_kind(name: impl Into<String>, kind: SpecKind) -> Self {
        Self {
            name: name.into(),
            kind,
            store_key: None,
            default: None,
            prefix: None,
            suffix: None,
            array: false,
        }
    }

    /// A field of a named type from the type table
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::with_kind(name, SpecKind::Typed(type_name.into()))
    }

    /// A nested group of fields stored as an object under one key
    pub fn nested(name: impl Into<String>, specs: Vec<FieldSpec>) -> Self {
        Self::with_kind(name, SpecKind::Nested(specs))
    }

    /// An enumeration, labels at runtime and codes in the document
    pub fn enumeration<I, L>(name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = (L, i64)>,
        L: Into<String>,
    {
        let variants = variants
            .into_iter()
            .map(|(label, code)| (label.into(), code))
            .collect();
        Self::with_kind(name, SpecKind::Enumeration(variants))
    }

    pub fn store_key(mut self, key: impl Into<String>) -> Self {
        self.store_key = Some(key.into());
        self
    }

    pub fn default(mut self, value: impl Into<TypedValue>) -> Self {
        self.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    pub fn default_with<F>(mut self, thunk: F) -> Self
    where
        F: Fn() -> TypedValue + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Thunk(Arc::new(thunk)));
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(Affix::Literal(prefix.into()));
        self
    }

    pub fn prefix_column(mut self) -> Self {
        self.prefix = Some(Affix::Column);
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(Affix::Literal(suffix.into()));
        self
    }

    pub fn suffix_column(mut self) -> Self {
        self.suffix = Some(Affix::Column);
        self
    }

    /// Wrap the declared type in an array
    pub fn array(mut self) -> Self {
        self.array = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn accessor_name(&self, column: &str) -> String {
        let render = |affix: &Affix| match affix {
            Affix::Literal(s) => s.clone(),
            Affix::Column => column.to_string(),
        };
        let mut parts = Vec::with_capacity(3);
        if let Some(prefix) = &self.prefix {
            parts.push(render(prefix));
        }
        parts.push(self.name.clone());
        if let Some(suffix) = &self.suffix {
            parts.push(render(suffix));
        }
        parts.join("_")
    }
}

#[derive(Debug, Clone)]
pub enum FieldKind {
    Scalar(TypeTag),
    Nested(Arc<FieldSchema>),
}

/// A resolved field: type, storage key, accessor and default
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: String,
    pub storage_key: String,
    pub accessor_name: String,
    pub kind: FieldKind,
    pub default: Option<DefaultValue>,
}

impl FieldDefinition {
    pub fn type_tag(&self) -> Option<&TypeTag> {
        match &self.kind {
            FieldKind::Scalar(tag) => Some(tag),
            FieldKind::Nested(_) => None,
        }
    }

    pub fn nested_schema(&self) -> Option<&Arc<FieldSchema>> {
        match &self.kind {
            FieldKind::Nested(schema) => Some(schema),
            FieldKind::Scalar(_) => None,
        }
    }

    pub fn is_nested(&self) -> bool {
        matches!(self.kind, FieldKind::Nested(_))
    }
}

/// Ordered, immutable set of fields stored in one document
#[derive(Debug, Clone)]
pub struct FieldSchema {
    column: String,
    scope: String,
    fields: Vec<FieldDefinition>,
    by_name: HashMap<String, usize>,
    by_accessor: HashMap<String, usize>,
    by_storage_key: HashMap<String, usize>,
}

impl FieldSchema {
    /// Declare the fields of `column` with a scope derived from the column alone
    pub fn declare(column: impl Into<String>, specs: Vec<FieldSpec>) -> DocResult<Self> {
        let column = column.into();
        let scope = column.to_upper_camel_case();
        Self::declare_in_scope(column, scope, specs, false)
    }

    /// Declare the fields of `column` under `owner` (usually the record type name)
    pub fn declare_for(
        owner: &str,
        column: impl Into<String>,
        specs: Vec<FieldSpec>,
    ) -> DocResult<Self> {
        let column = column.into();
        let scope = format!(
            "{}::{}",
            owner.to_upper_camel_case(),
            column.to_upper_camel_case()
        );
        Self::declare_in_scope(column, scope, specs, false)
    }

    fn declare_in_scope(
        column: String,
        scope: String,
        specs: Vec<FieldSpec>,
        nested: bool,
    ) -> DocResult<Self> {
        let validation_config = DocFieldsConfig::default();
        let mut definitions = Vec::with_capacity(specs.len());
        let mut seen_names: Vec<&str> = Vec::with_capacity(specs.len());

        for spec in &specs {
            if seen_names.contains(&spec.name.as_str()) {
                return Err(DocFieldsError::DuplicateField {
                    column: column.clone(),
                    field: spec.name.clone(),
                });
            }
            seen_names.push(&spec.name);
            if nested && spec.default.is_some() {
                return Err(DocFieldsError::InvalidDefault {
                    field: spec.name.clone(),
                    message: "defaults are only supported on top-level fields".to_string(),
                });
            }
            definitions.push(Self::define(&column, &scope, spec, &validation_config)?);
        }

        let schema = Self::from_definitions(column, scope, definitions)?;
        log::debug!(
            "declared {} field(s) on column '{}' ({})",
            schema.len(),
            schema.column,
            schema.scope
        );
        Ok(schema)
    }

    fn define(
        column: &str,
        scope: &str,
        spec: &FieldSpec,
        config: &DocFieldsConfig,
    ) -> DocResult<FieldDefinition> {
        let kind = match &spec.kind {
            SpecKind::Typed(type_name) => {
                let tag = TypeTag::lookup(type_name)?;
                FieldKind::Scalar(if spec.array {
                    TypeTag::array_of(tag)
                } else {
                    tag
                })
            }
            SpecKind::Enumeration(variants) => {
                let enum_type = EnumType::new(spec.name.to_upper_camel_case(), variants.clone())?;
                let tag = TypeTag::Enum(Arc::new(enum_type));
                FieldKind::Scalar(if spec.array {
                    TypeTag::array_of(tag)
                } else {
                    tag
                })
            }
            SpecKind::Nested(children) => {
                if spec.array {
                    return Err(DocFieldsError::unknown_type(format!(
                        "{}_array",
                        spec.name
                    )));
                }
                let child_scope = format!("{}::{}", scope, spec.name.to_upper_camel_case());
                let child =
                    Self::declare_in_scope(spec.name.clone(), child_scope, children.clone(), true)?;
                FieldKind::Nested(Arc::new(child))
            }
        };

        if let Some(DefaultValue::Literal(value)) = &spec.default {
            validate_default(&spec.name, &kind, value, config)?;
        }

        Ok(FieldDefinition {
            name: spec.name.clone(),
            storage_key: spec.store_key.clone().unwrap_or_else(|| spec.name.clone()),
            accessor_name: spec.accessor_name(column),
            kind,
            default: spec.default.clone(),
        })
    }

    /// Build a schema from already resolved definitions, checking uniqueness
    pub(crate) fn from_definitions(
        column: String,
        scope: String,
        fields: Vec<FieldDefinition>,
    ) -> DocResult<Self> {
        let mut by_name = HashMap::with_capacity(fields.len());
        let mut by_accessor = HashMap::with_capacity(fields.len());
        let mut by_storage_key = HashMap::with_capacity(fields.len());

        for (index, field) in fields.iter().enumerate() {
            if by_name.insert(field.name.clone(), index).is_some() {
                return Err(DocFieldsError::DuplicateField {
                    column,
                    field: field.name.clone(),
                });
            }
            if by_accessor.insert(field.accessor_name.clone(), index).is_some() {
                return Err(DocFieldsError::DuplicateAccessor {
                    scope,
                    accessor: field.accessor_name.clone(),
                });
            }
            if by_storage_key.insert(field.storage_key.clone(), index).is_some() {
                return Err(DocFieldsError::DuplicateStoreKey {
                    column,
                    store_key: field.storage_key.clone(),
                });
            }
        }

        Ok(Self {
            column,
            scope,
            fields,
            by_name,
            by_accessor,
            by_storage_key,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Unique name of this schema, e.g. `Product::Options::Doc`
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn scalar_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| !f.is_nested())
    }

    pub fn nested_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.is_nested())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn index_of_accessor(&self, accessor: &str) -> Option<usize> {
        self.by_accessor.get(accessor).copied()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    pub fn field_by_accessor(&self, accessor: &str) -> Option<&FieldDefinition> {
        self.by_accessor.get(accessor).map(|&i| &self.fields[i])
    }

    pub fn field_by_storage_key(&self, key: &str) -> Option<&FieldDefinition> {
        self.by_storage_key.get(key).map(|&i| &self.fields[i])
    }

    /// Field addressed by name, or by storage key when no name matches
    pub fn resolve_key(&self, key: &str) -> Option<&FieldDefinition> {
        self.field(key).or_else(|| self.field_by_storage_key(key))
    }

    /// Storage key for `key` given as name or storage key; unknown keys pass through
    pub fn storage_key_for<'a>(&'a self, key: &'a str) -> &'a str {
        self.field(key).map_or(key, |f| f.storage_key.as_str())
    }

    pub fn storage_keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.storage_key.as_str())
    }

    pub fn is_declared_key(&self, storage_key: &str) -> bool {
        self.by_storage_key.contains_key(storage_key)
    }

    /// `storage_key -> default` pairs in declaration order
    pub fn defaults(&self) -> impl Iterator<Item = (&str, &DefaultValue)> {
        self.fields
            .iter()
            .filter_map(|f| f.default.as_ref().map(|d| (f.storage_key.as_str(), d)))
    }
}

fn validate_default(
    field: &str,
    kind: &FieldKind,
    value: &TypedValue,
    config: &DocFieldsConfig,
) -> DocResult<()> {
    let invalid = |message: String| DocFieldsError::InvalidDefault {
        field: field.to_string(),
        message,
    };
    match kind {
        FieldKind::Scalar(tag) => cast_for_runtime(tag, value.clone(), config)
            .map(|_| ())
            .map_err(|err| invalid(err.to_string())),
        FieldKind::Nested(_) => match value {
            TypedValue::Null | TypedValue::Value(serde_json::Value::Object(_)) => Ok(()),
            other => Err(invalid(format!(
                "nested defaults must be objects, got '{}'",
                other
            ))),
        },
    }
}
