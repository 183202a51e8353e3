//! Nested documents.
//!
//! A nested field holds a [`NestedDocument`]: a value object parametrized by
//! the nested [`FieldSchema`]. Documents have no link back to their owner.
//! Writes go through a [`NestedHandle`] borrowed from the record, which knows
//! the path from the root field and re-serializes that root field into the
//! owning document after every change.

use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use crate::config::DocFieldsConfig;
use crate::error::{DocFieldsError, DocResult};
use crate::record::binding::DocumentBinding;
use crate::schema::{FieldDefinition, FieldKind, FieldSchema};
use crate::types::{cast_for_runtime, storable, TypedValue};

/// Runtime value of one declared field
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Slot {
    Scalar(TypedValue),
    Nested(NestedDocument),
}

impl Slot {
    /// Derive the runtime value of `field` from its raw document value
    pub(crate) fn derive(
        field: &FieldDefinition,
        raw: Option<&JsonValue>,
        config: &DocFieldsConfig,
    ) -> DocResult<Slot> {
        match &field.kind {
            FieldKind::Scalar(tag) => {
                let raw = raw.cloned().map_or(TypedValue::Null, TypedValue::Value);
                Ok(Slot::Scalar(cast_for_runtime(tag, raw, config)?))
            }
            FieldKind::Nested(schema) => match raw {
                None | Some(JsonValue::Null) => {
                    Ok(Slot::Nested(NestedDocument::new(schema.clone())))
                }
                Some(JsonValue::Object(map)) => Ok(Slot::Nested(NestedDocument::from_map(
                    schema.clone(),
                    map,
                    config,
                )?)),
                Some(other) => Err(DocFieldsError::unknown_value(&field.name, other)),
            },
        }
    }

    /// Form written into the document under the field's storage key
    pub(crate) fn stored(&self, field: &FieldDefinition, config: &DocFieldsConfig) -> JsonValue {
        match (self, &field.kind) {
            (Slot::Scalar(value), FieldKind::Scalar(tag)) => storable(tag, value, config),
            (Slot::Nested(doc), _) => doc.to_json(config),
            (Slot::Scalar(value), FieldKind::Nested(_)) => value.to_json(&config.storage_offset),
        }
    }

    /// Value reported by change tracking
    pub(crate) fn tracked(&self, config: &DocFieldsConfig) -> TypedValue {
        match self {
            Slot::Scalar(value) => value.clone(),
            Slot::Nested(doc) => match doc.to_json(config) {
                JsonValue::Null => TypedValue::Null,
                json => TypedValue::Value(json),
            },
        }
    }
}

pub(crate) fn derive_slots(
    schema: &FieldSchema,
    document: &Map<String, JsonValue>,
    config: &DocFieldsConfig,
) -> DocResult<Vec<Slot>> {
    schema
        .fields()
        .iter()
        .map(|field| Slot::derive(field, document.get(&field.storage_key), config))
        .collect()
}

/// Instance of a nested schema
#[derive(Debug, Clone)]
pub struct NestedDocument {
    schema: Arc<FieldSchema>,
    slots: Vec<Slot>,
}

impl PartialEq for NestedDocument {
    fn eq(&self, other: &Self) -> bool {
        self.schema.scope() == other.schema.scope() && self.slots == other.slots
    }
}

impl NestedDocument {
    /// Empty instance: every scalar is null, every child is materialized
    pub fn new(schema: Arc<FieldSchema>) -> Self {
        let slots = schema
            .fields()
            .iter()
            .map(|field| match &field.kind {
                FieldKind::Scalar(_) => Slot::Scalar(TypedValue::Null),
                FieldKind::Nested(child) => Slot::Nested(NestedDocument::new(child.clone())),
            })
            .collect();
        Self { schema, slots }
    }

    /// Build from an object whose keys are field names or storage keys.
    /// Keys matching neither are dropped.
    pub fn from_map(
        schema: Arc<FieldSchema>,
        map: &Map<String, JsonValue>,
        config: &DocFieldsConfig,
    ) -> DocResult<Self> {
        let mut keyed = Map::new();
        for (key, value) in map {
            if let Some(field) = schema.resolve_key(key) {
                keyed.insert(field.storage_key.clone(), value.clone());
            }
        }
        let slots = derive_slots(&schema, &keyed, config)?;
        Ok(Self { schema, slots })
    }

    pub fn schema(&self) -> &Arc<FieldSchema> {
        &self.schema
    }

    pub fn scope(&self) -> &str {
        self.schema.scope()
    }

    /// Scalar value of a field
    pub fn get(&self, name: &str) -> DocResult<&TypedValue> {
        match self.slot(name)? {
            Slot::Scalar(value) => Ok(value),
            Slot::Nested(_) => Err(DocFieldsError::unknown_field(format!(
                "{}::{} is nested, use child()",
                self.scope(),
                name
            ))),
        }
    }

    /// Child document of a nested field; never absent
    pub fn child(&self, name: &str) -> DocResult<&NestedDocument> {
        match self.slot(name)? {
            Slot::Nested(doc) => Ok(doc),
            Slot::Scalar(_) => Err(DocFieldsError::unknown_field(format!(
                "{}::{} is not nested",
                self.scope(),
                name
            ))),
        }
    }

    /// True when every scalar is null and every child is empty
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|slot| match slot {
            Slot::Scalar(value) => value.is_null(),
            Slot::Nested(doc) => doc.is_empty(),
        })
    }

    /// Object keyed by storage keys, or null when empty
    pub fn to_json(&self, config: &DocFieldsConfig) -> JsonValue {
        if self.is_empty() {
            return JsonValue::Null;
        }
        let object = self
            .schema
            .fields()
            .iter()
            .zip(&self.slots)
            .map(|(field, slot)| (field.storage_key.clone(), slot.stored(field, config)))
            .collect();
        JsonValue::Object(object)
    }

    fn slot(&self, name: &str) -> DocResult<&Slot> {
        self.schema
            .index_of(name)
            .and_then(|index| self.slots.get(index))
            .ok_or_else(|| {
                DocFieldsError::unknown_field(format!("{}::{}", self.schema.scope(), name))
            })
    }

    pub(crate) fn child_at_mut(&mut self, index: usize) -> Option<&mut NestedDocument> {
        match self.slots.get_mut(index) {
            Some(Slot::Nested(doc)) => Some(doc),
            _ => None,
        }
    }

    pub(crate) fn child_at(&self, index: usize) -> Option<&NestedDocument> {
        match self.slots.get(index) {
            Some(Slot::Nested(doc)) => Some(doc),
            _ => None,
        }
    }

    /// Assign a field of this document, casting scalars and converting nested input
    pub(crate) fn set(
        &mut self,
        name: &str,
        value: NestedValue,
        config: &DocFieldsConfig,
    ) -> DocResult<()> {
        let index = self.schema.index_of(name).ok_or_else(|| {
            DocFieldsError::unknown_field(format!("{}::{}", self.schema.scope(), name))
        })?;
        let field = &self.schema.fields()[index];
        let slot = match &field.kind {
            FieldKind::Scalar(tag) => {
                let raw = value.into_typed(&field.name)?;
                Slot::Scalar(cast_for_runtime(tag, raw, config)?)
            }
            FieldKind::Nested(child) => {
                let value = match value {
                    NestedValue::Other(raw) => NestedValue::from(raw),
                    other => other,
                };
                Slot::Nested(value.into_document(&field.name, child, config)?)
            }
        };
        self.slots[index] = slot;
        Ok(())
    }
}

/// Input accepted when assigning a nested field
#[derive(Debug, Clone)]
pub enum NestedValue {
    Map(Map<String, JsonValue>),
    Document(NestedDocument),
    None,
    /// Anything else; rejected for nested fields
    Other(TypedValue),
}

impl NestedValue {
    /// Convert to the document for a nested field of `schema`
    pub(crate) fn into_document(
        self,
        field: &str,
        schema: &Arc<FieldSchema>,
        config: &DocFieldsConfig,
    ) -> DocResult<NestedDocument> {
        match self {
            NestedValue::Map(map) => NestedDocument::from_map(schema.clone(), &map, config),
            NestedValue::None => Ok(NestedDocument::new(schema.clone())),
            NestedValue::Document(doc) if doc.scope() == schema.scope() => Ok(doc),
            NestedValue::Document(doc) => Err(DocFieldsError::unknown_value(
                field,
                format!("{} instance", doc.scope()),
            )),
            NestedValue::Other(value) => Err(DocFieldsError::unknown_value(field, value)),
        }
    }

    /// Convert back to a plain value for scalar fields
    pub(crate) fn into_typed(self, field: &str) -> DocResult<TypedValue> {
        match self {
            NestedValue::Other(value) => Ok(value),
            NestedValue::None => Ok(TypedValue::Null),
            NestedValue::Map(map) => Ok(TypedValue::Value(JsonValue::Object(map))),
            NestedValue::Document(doc) => Err(DocFieldsError::unknown_value(
                field,
                format!("{} instance", doc.scope()),
            )),
        }
    }
}

impl From<TypedValue> for NestedValue {
    fn from(value: TypedValue) -> Self {
        match value {
            TypedValue::Null | TypedValue::Value(JsonValue::Null) => NestedValue::None,
            TypedValue::Value(JsonValue::Object(map)) => NestedValue::Map(map),
            other => NestedValue::Other(other),
        }
    }
}

impl From<JsonValue> for NestedValue {
    fn from(value: JsonValue) -> Self {
        NestedValue::from(TypedValue::Value(value))
    }
}

impl From<Map<String, JsonValue>> for NestedValue {
    fn from(map: Map<String, JsonValue>) -> Self {
        NestedValue::Map(map)
    }
}

impl From<NestedDocument> for NestedValue {
    fn from(doc: NestedDocument) -> Self {
        NestedValue::Document(doc)
    }
}

impl From<Option<NestedDocument>> for NestedValue {
    fn from(doc: Option<NestedDocument>) -> Self {
        doc.map_or(NestedValue::None, NestedValue::Document)
    }
}

/// Mutable view of a nested document inside a record.
///
/// Every write re-serializes the root nested field into the owning document.
pub struct NestedHandle<'a> {
    binding: &'a mut DocumentBinding,
    root: usize,
    path: Vec<usize>,
    config: &'a DocFieldsConfig,
}

impl<'a> NestedHandle<'a> {
    pub(crate) fn new(
        binding: &'a mut DocumentBinding,
        root: usize,
        config: &'a DocFieldsConfig,
    ) -> Self {
        Self {
            binding,
            root,
            path: Vec::new(),
            config,
        }
    }

    fn lost(&self) -> DocFieldsError {
        DocFieldsError::unknown_field(format!(
            "nested path {:?} of field #{}",
            self.path, self.root
        ))
    }

    /// The document this handle points at
    pub fn document(&self) -> DocResult<&NestedDocument> {
        let mut doc = self.binding.nested_at(self.root).ok_or_else(|| self.lost())?;
        for &index in &self.path {
            doc = doc.child_at(index).ok_or_else(|| self.lost())?;
        }
        Ok(doc)
    }

    fn document_mut(&mut self) -> DocResult<&mut NestedDocument> {
        let lost = self.lost();
        let mut doc = self.binding.nested_at_mut(self.root).ok_or_else(|| lost.clone())?;
        for &index in &self.path {
            doc = doc.child_at_mut(index).ok_or_else(|| lost.clone())?;
        }
        Ok(doc)
    }

    pub fn get(&self, name: &str) -> DocResult<&TypedValue> {
        self.document()?.get(name)
    }

    /// Cast and store a scalar field, then push the root field into the document
    pub fn set(&mut self, name: &str, value: impl Into<TypedValue>) -> DocResult<()> {
        self.write(name, NestedValue::Other(value.into()))
    }

    /// Replace a child nested document from a map, `None` or a matching document
    pub fn assign(&mut self, name: &str, value: impl Into<NestedValue>) -> DocResult<()> {
        self.write(name, value.into())
    }

    fn write(&mut self, name: &str, value: NestedValue) -> DocResult<()> {
        let config = self.config;
        self.document_mut()?.set(name, value, config)?;
        self.binding.sync_field(self.root, config);
        log::trace!(
            "updated nested field {} through '{}'",
            name,
            self.binding.column()
        );
        Ok(())
    }

    /// Handle to a child nested document, extending the path
    pub fn child(&mut self, name: &str) -> DocResult<NestedHandle<'_>> {
        let index = {
            let doc = self.document()?;
            match doc.schema().index_of(name) {
                Some(index) if doc.child_at(index).is_some() => index,
                _ => {
                    return Err(DocFieldsError::unknown_field(format!(
                        "{}::{}",
                        doc.scope(),
                        name
                    )))
                }
            }
        };
        let mut path = self.path.clone();
        path.push(index);
        Ok(NestedHandle {
            binding: &mut *self.binding,
            root: self.root,
            path,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;
    use serde_json::json;

    fn schema() -> Arc<FieldSchema> {
        let root = FieldSchema::declare_for(
            "product",
            "options",
            vec![FieldSpec::nested(
                "doc",
                vec![
                    FieldSpec::new("title", "string").store_key("t"),
                    FieldSpec::nested("inner", vec![FieldSpec::new("value", "integer")]),
                ],
            )],
        )
        .unwrap();
        root.field("doc").unwrap().nested_schema().unwrap().clone()
    }

    #[test]
    fn test_fresh_document_is_null_safe() {
        let doc = NestedDocument::new(schema());
        assert_eq!(doc.get("title").unwrap(), &TypedValue::Null);
        assert_eq!(
            doc.child("inner").unwrap().get("value").unwrap(),
            &TypedValue::Null
        );
        assert!(doc.is_empty());
        assert_eq!(doc.to_json(&DocFieldsConfig::default()), JsonValue::Null);
    }

    #[test]
    fn test_from_map_accepts_names_and_storage_keys() {
        let config = DocFieldsConfig::default();
        let map = json!({"title": "a", "inner": {"value": "5"}, "junk": 1});
        let doc = NestedDocument::from_map(schema(), map.as_object().unwrap(), &config).unwrap();
        assert_eq!(doc.get("title").unwrap(), &TypedValue::from("a"));
        assert_eq!(
            doc.child("inner").unwrap().get("value").unwrap(),
            &TypedValue::Integer(5)
        );
        assert_eq!(
            doc.to_json(&config),
            json!({"t": "a", "inner": {"value": 5}})
        );

        let by_key = NestedDocument::from_map(
            schema(),
            json!({"t": "a", "inner": {"value": 5}}).as_object().unwrap(),
            &config,
        )
        .unwrap();
        assert_eq!(by_key, doc);
    }

    #[test]
    fn test_nested_value_rejects_foreign_input() {
        let config = DocFieldsConfig::default();
        let err = NestedValue::from(TypedValue::from("nope"))
            .into_document("doc", &schema(), &config)
            .unwrap_err();
        assert!(matches!(err, DocFieldsError::UnknownValue { .. }));

        let other_schema = Arc::new(
            FieldSchema::declare("other", vec![FieldSpec::new("title", "string")]).unwrap(),
        );
        let foreign = NestedDocument::new(other_schema);
        assert!(NestedValue::from(foreign)
            .into_document("doc", &schema(), &config)
            .is_err());

        let same = NestedDocument::new(schema());
        assert!(NestedValue::from(same)
            .into_document("doc", &schema(), &config)
            .is_ok());
    }
}
