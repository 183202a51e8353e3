//! One document column of a record and the typed values derived from it.

use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use crate::config::{DocFieldsConfig, PassengerPolicy};
use crate::error::{DocFieldsError, DocResult};
use crate::nested::{derive_slots, NestedDocument, NestedValue, Slot};
use crate::schema::{FieldKind, FieldSchema};
use crate::types::{cast_for_runtime, storable, TypedValue};

/// Keeps the typed values of one schema and its document consistent
#[derive(Debug, Clone)]
pub struct DocumentBinding {
    schema: Arc<FieldSchema>,
    document: Map<String, JsonValue>,
    slots: Vec<Slot>,
}

impl DocumentBinding {
    /// Derive every field from `seed` and write the canonical forms back, so
    /// the document holds every declared key plus any passenger keys.
    pub(crate) fn construct(
        schema: Arc<FieldSchema>,
        seed: Map<String, JsonValue>,
        config: &DocFieldsConfig,
    ) -> DocResult<Self> {
        let slots = derive_slots(&schema, &seed, config)?;
        let mut binding = Self {
            schema,
            document: seed,
            slots,
        };
        binding.sync_all(config);
        Ok(binding)
    }

    pub fn column(&self) -> &str {
        self.schema.column()
    }

    pub fn schema(&self) -> &Arc<FieldSchema> {
        &self.schema
    }

    pub fn document(&self) -> &Map<String, JsonValue> {
        &self.document
    }

    /// Scalar value by field name
    pub fn value(&self, name: &str) -> Option<&TypedValue> {
        match self.schema.index_of(name).and_then(|i| self.slots.get(i)) {
            Some(Slot::Scalar(value)) => Some(value),
            _ => None,
        }
    }

    /// Nested document by field name
    pub fn nested(&self, name: &str) -> Option<&NestedDocument> {
        self.schema.index_of(name).and_then(|i| self.nested_at(i))
    }

    pub(crate) fn scalar_at(&self, index: usize) -> Option<&TypedValue> {
        match self.slots.get(index) {
            Some(Slot::Scalar(value)) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn nested_at(&self, index: usize) -> Option<&NestedDocument> {
        match self.slots.get(index) {
            Some(Slot::Nested(doc)) => Some(doc),
            _ => None,
        }
    }

    pub(crate) fn nested_at_mut(&mut self, index: usize) -> Option<&mut NestedDocument> {
        match self.slots.get_mut(index) {
            Some(Slot::Nested(doc)) => Some(doc),
            _ => None,
        }
    }

    /// Cast and store one field, then merge its storage form into the
    /// document. Returns the value change tracking reports for the field.
    pub(crate) fn set_field(
        &mut self,
        index: usize,
        raw: TypedValue,
        config: &DocFieldsConfig,
    ) -> DocResult<TypedValue> {
        let field = self
            .schema
            .fields()
            .get(index)
            .ok_or_else(|| DocFieldsError::unknown_field(format!("#{}", index)))?;

        let (slot, stored) = match &field.kind {
            FieldKind::Scalar(tag) => {
                let canonical = cast_for_runtime(tag, raw, config)?;
                let stored = storable(tag, &canonical, config);
                (Slot::Scalar(canonical), stored)
            }
            FieldKind::Nested(schema) => {
                let doc = NestedValue::from(raw).into_document(&field.name, schema, config)?;
                let stored = doc.to_json(config);
                (Slot::Nested(doc), stored)
            }
        };

        let tracked = slot.tracked(config);
        self.document.insert(field.storage_key.clone(), stored);
        self.slots[index] = slot;
        Ok(tracked)
    }

    /// New binding for a whole-document assignment.
    ///
    /// Incoming names are converted to storage keys and every declared key
    /// not supplied becomes null. Undeclared keys follow `policy`.
    pub(crate) fn replaced(
        &self,
        incoming: Option<Map<String, JsonValue>>,
        policy: PassengerPolicy,
        config: &DocFieldsConfig,
    ) -> DocResult<Self> {
        let mut document: Map<String, JsonValue> = self
            .schema
            .storage_keys()
            .map(|key| (key.to_string(), JsonValue::Null))
            .collect();

        if policy == PassengerPolicy::Preserve {
            for (key, value) in &self.document {
                if !self.schema.is_declared_key(key) {
                    document.insert(key.clone(), value.clone());
                }
            }
        }

        for (key, value) in incoming.unwrap_or_default() {
            let storage_key = self.schema.storage_key_for(&key).to_string();
            if self.schema.is_declared_key(&storage_key) || policy == PassengerPolicy::Preserve {
                document.insert(storage_key, value);
            } else {
                log::trace!("dropping undeclared key '{}' from '{}'", key, self.column());
            }
        }

        Self::construct(self.schema.clone(), document, config)
    }

    /// New binding for a freshly fetched document. Stored keys are kept,
    /// missing declared keys become null and values are rewritten canonically.
    pub(crate) fn reloaded(
        &self,
        fetched: Map<String, JsonValue>,
        config: &DocFieldsConfig,
    ) -> DocResult<Self> {
        Self::construct(self.schema.clone(), fetched, config)
    }

    /// Write the storage form of field `index` into the document
    pub(crate) fn sync_field(&mut self, index: usize, config: &DocFieldsConfig) {
        let field = self.schema.fields().get(index);
        if let (Some(field), Some(slot)) = (field, self.slots.get(index)) {
            self.document
                .insert(field.storage_key.clone(), slot.stored(field, config));
        }
    }

    fn sync_all(&mut self, config: &DocFieldsConfig) {
        for index in 0..self.slots.len() {
            self.sync_field(index, config);
        }
    }

    /// Values reported by change tracking, in field order
    pub(crate) fn tracked_values(&self, config: &DocFieldsConfig) -> Vec<TypedValue> {
        self.slots.iter().map(|slot| slot.tracked(config)).collect()
    }
}
