//! Records: typed fields kept in step with their document columns.
//!
//! A [`Record`] owns one [`DocumentBinding`] per document column of its
//! resolved type. Every public mutation computes the new state before
//! committing it, so a failed cast or store call leaves the record as it was.

pub mod binding;
pub mod hooks;
pub mod tracker;

pub use binding::DocumentBinding;
pub use hooks::{AfterSet, BeforeSet, SetterHook};
pub use tracker::FieldChange;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use crate::error::{DocFieldsError, DocResult};
use crate::key_types::RecordKey;
use crate::nested::{NestedDocument, NestedHandle, NestedValue};
use crate::registry::ResolvedType;
use crate::storage::{into_object, DocumentStore};
use crate::types::TypedValue;
use tracker::ChangeTracker;

/// Lifecycle position of a record
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RecordStatus {
    /// Constructed in memory, never saved or loaded
    New,
    /// Refreshed from storage
    Hydrated,
    /// Holds changes not yet persisted
    Dirty,
    /// Matches what was last saved or loaded
    Persisted,
}

/// Initial attributes for [`Record::with_attributes`]
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    documents: Vec<(String, JsonValue)>,
    fields: Vec<(String, TypedValue)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a whole document column; keys may be field names or storage keys
    pub fn document(mut self, column: impl Into<String>, document: JsonValue) -> Self {
        self.documents.push((column.into(), document));
        self
    }

    /// Assign a field through the public setter after construction
    pub fn field(mut self, accessor: impl Into<String>, value: impl Into<TypedValue>) -> Self {
        self.fields.push((accessor.into(), value.into()));
        self
    }
}

#[derive(Debug)]
pub struct Record {
    ty: Arc<ResolvedType>,
    key: Option<RecordKey>,
    bindings: Vec<DocumentBinding>,
    tracker: ChangeTracker,
    status: RecordStatus,
}

impl Record {
    pub fn new(ty: Arc<ResolvedType>) -> DocResult<Self> {
        Self::with_attributes(ty, Attributes::new())
    }

    /// Construct with defaults, document overrides and field assignments
    pub fn with_attributes(ty: Arc<ResolvedType>, attributes: Attributes) -> DocResult<Self> {
        let config = ty.config();
        let mut overrides: HashMap<String, Map<String, JsonValue>> = HashMap::new();
        for (column, document) in attributes.documents {
            if ty.schema(&column).is_none() {
                return Err(DocFieldsError::unknown_field(column));
            }
            let document = into_object(&column, Some(document))?;
            overrides.entry(column).or_default().extend(document);
        }

        let mut bindings = Vec::with_capacity(ty.schemas().len());
        for schema in ty.schemas() {
            let mut seed = Map::new();
            for (storage_key, default) in schema.defaults() {
                seed.insert(
                    storage_key.to_string(),
                    default.evaluate().to_json(&config.storage_offset),
                );
            }
            if let Some(document) = overrides.remove(schema.column()) {
                for (key, value) in document {
                    seed.insert(schema.storage_key_for(&key).to_string(), value);
                }
            }
            bindings.push(DocumentBinding::construct(schema.clone(), seed, config)?);
        }

        let tracker = ChangeTracker::blank(&bindings);
        let mut record = Self {
            ty,
            key: None,
            bindings,
            tracker,
            status: RecordStatus::New,
        };
        for (accessor, value) in attributes.fields {
            record.set(&accessor, value)?;
        }
        log::debug!("constructed new {}", record.ty.name());
        Ok(record)
    }

    /// Build from stored documents without applying defaults. Columns missing
    /// from `documents` start empty. Documents are completed and rewritten in
    /// their canonical form, which becomes the clean baseline.
    pub fn from_storage<I>(ty: Arc<ResolvedType>, key: RecordKey, documents: I) -> DocResult<Self>
    where
        I: IntoIterator<Item = (String, JsonValue)>,
    {
        let mut stored: HashMap<String, JsonValue> = documents.into_iter().collect();
        let bindings = ty
            .schemas()
            .iter()
            .map(|schema| {
                let document = into_object(schema.column(), stored.remove(schema.column()))?;
                DocumentBinding::construct(schema.clone(), document, ty.config())
            })
            .collect::<DocResult<Vec<_>>>()?;

        let tracker = ChangeTracker::capture(&bindings, ty.config());
        Ok(Self {
            ty,
            key: Some(key),
            bindings,
            tracker,
            status: RecordStatus::Persisted,
        })
    }

    /// Fetch every document column of `key` and build the record from them
    pub async fn load(
        ty: Arc<ResolvedType>,
        key: RecordKey,
        store: &dyn DocumentStore,
    ) -> DocResult<Self> {
        let mut documents = Vec::with_capacity(ty.schemas().len());
        for schema in ty.schemas() {
            let document = store
                .fetch_document(ty.table(), &key, schema.column())
                .await?;
            documents.push((schema.column().to_string(), document.unwrap_or(JsonValue::Null)));
        }
        log::debug!("loaded {} {}", ty.name(), key);
        Self::from_storage(ty, key, documents)
    }

    pub fn record_type(&self) -> &Arc<ResolvedType> {
        &self.ty
    }

    pub fn key(&self) -> Option<&RecordKey> {
        self.key.as_ref()
    }

    pub fn set_key(&mut self, key: impl Into<RecordKey>) {
        self.key = Some(key.into());
    }

    pub fn with_key(mut self, key: impl Into<RecordKey>) -> Self {
        self.set_key(key);
        self
    }

    pub fn bindings(&self) -> &[DocumentBinding] {
        &self.bindings
    }

    pub fn binding(&self, column: &str) -> Option<&DocumentBinding> {
        self.ty.column_index(column).map(|ci| &self.bindings[ci])
    }

    /// Assign a field by accessor name: pre-hooks, cast, document sync, post-hooks
    pub fn set(&mut self, accessor: &str, value: impl Into<TypedValue>) -> DocResult<()> {
        let (ci, fi) = self.locate(accessor)?;
        let mut value = value.into();
        for hook in self.ty.hooks() {
            hook.before_set(accessor, &mut value)?;
        }
        let stored = self.bindings[ci].set_field(fi, value, self.ty.config())?;
        for hook in self.ty.hooks() {
            hook.after_set(accessor, &stored);
        }
        log::trace!("set {}.{} = {}", self.ty.name(), accessor, stored);
        Ok(())
    }

    /// Assign a nested field from a map, `None` or a document of the same scope
    pub fn set_nested(&mut self, accessor: &str, value: impl Into<NestedValue>) -> DocResult<()> {
        let (ci, fi) = self.locate(accessor)?;
        let field = &self.ty.schemas()[ci].fields()[fi];
        let value = match field.nested_schema() {
            Some(schema) => {
                let document = value
                    .into()
                    .into_document(&field.name, schema, self.ty.config())?;
                TypedValue::from(document.to_json(self.ty.config()))
            }
            None => value.into().into_typed(&field.name)?,
        };
        self.set(accessor, value)
    }

    /// Current value of a scalar field
    pub fn get(&self, accessor: &str) -> DocResult<&TypedValue> {
        let (ci, fi) = self.locate(accessor)?;
        self.bindings[ci]
            .scalar_at(fi)
            .ok_or_else(|| DocFieldsError::unknown_field(accessor))
    }

    pub fn nested(&self, accessor: &str) -> DocResult<&NestedDocument> {
        let (ci, fi) = self.locate(accessor)?;
        self.bindings[ci]
            .nested_at(fi)
            .ok_or_else(|| DocFieldsError::unknown_field(accessor))
    }

    /// Writable view of a nested field; writes re-serialize into the document
    pub fn nested_mut(&mut self, accessor: &str) -> DocResult<NestedHandle<'_>> {
        let (ci, fi) = self.locate(accessor)?;
        if self.bindings[ci].nested_at(fi).is_none() {
            return Err(DocFieldsError::unknown_field(accessor));
        }
        Ok(NestedHandle::new(&mut self.bindings[ci], fi, self.ty.config()))
    }

    pub fn document(&self, column: &str) -> DocResult<&Map<String, JsonValue>> {
        self.binding(column)
            .map(DocumentBinding::document)
            .ok_or_else(|| DocFieldsError::unknown_field(column))
    }

    /// Replace a whole document column. `None` and JSON null clear every
    /// declared field.
    pub fn assign_document(&mut self, column: &str, document: Option<JsonValue>) -> DocResult<()> {
        let ci = self
            .ty
            .column_index(column)
            .ok_or_else(|| DocFieldsError::unknown_field(column))?;
        let incoming = match document {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::Object(map)) => Some(map),
            Some(other) => return Err(DocFieldsError::unknown_value(column, other)),
        };
        let config = self.ty.config();
        let replaced = self.bindings[ci].replaced(incoming, config.passenger_policy, config)?;
        self.bindings[ci] = replaced;
        log::debug!("assigned document {}.{}", self.ty.name(), column);
        Ok(())
    }

    /// Replace every document with its stored form and clear dirty state
    pub async fn reload(&mut self, store: &dyn DocumentStore) -> DocResult<()> {
        let key = self.require_key()?.clone();
        let mut fetched = Vec::with_capacity(self.bindings.len());
        for binding in &self.bindings {
            let document = store
                .fetch_document(self.ty.table(), &key, binding.column())
                .await?;
            fetched.push(into_object(binding.column(), document)?);
        }

        let bindings = self
            .bindings
            .iter()
            .zip(fetched)
            .map(|(binding, document)| binding.reloaded(document, self.ty.config()))
            .collect::<DocResult<Vec<_>>>()?;

        self.tracker = ChangeTracker::capture(&bindings, self.ty.config());
        self.bindings = bindings;
        self.status = RecordStatus::Hydrated;
        log::debug!("reloaded {} {}", self.ty.name(), key);
        Ok(())
    }

    /// Persist every document column. Dirty state clears only when all succeed.
    pub async fn save(&mut self, store: &dyn DocumentStore) -> DocResult<()> {
        let key = self.require_key()?.clone();
        for binding in &self.bindings {
            let document = JsonValue::Object(binding.document().clone());
            store
                .persist(self.ty.table(), &key, binding.column(), &document)
                .await
                .map_err(|err| {
                    log::warn!(
                        "saving {}.{} for {} failed: {}",
                        self.ty.name(),
                        binding.column(),
                        key,
                        err
                    );
                    err
                })?;
        }
        self.tracker = ChangeTracker::capture(&self.bindings, self.ty.config());
        self.status = RecordStatus::Persisted;
        log::debug!("saved {} {}", self.ty.name(), key);
        Ok(())
    }

    /// Changed fields and documents since the last save or load
    pub fn changes(&self) -> Vec<FieldChange> {
        self.tracker.changes(&self.bindings, self.ty.config())
    }

    pub fn changed(&self, accessor: &str) -> bool {
        self.tracker.changed(accessor, &self.bindings, self.ty.config())
    }

    pub fn is_dirty(&self) -> bool {
        self.tracker.is_dirty(&self.bindings, self.ty.config())
    }

    pub fn status(&self) -> RecordStatus {
        if self.is_dirty() {
            RecordStatus::Dirty
        } else {
            self.status
        }
    }

    /// Every field by accessor name; nested fields appear as their JSON form
    pub fn attributes(&self) -> Vec<(String, TypedValue)> {
        let config = self.ty.config();
        let mut attributes = Vec::new();
        for binding in &self.bindings {
            for (fi, field) in binding.schema().fields().iter().enumerate() {
                let value = match binding.nested_at(fi) {
                    Some(doc) => match doc.to_json(config) {
                        JsonValue::Null => TypedValue::Null,
                        json => TypedValue::Value(json),
                    },
                    None => binding.scalar_at(fi).cloned().unwrap_or_default(),
                };
                attributes.push((field.accessor_name.clone(), value));
            }
        }
        attributes
    }

    fn locate(&self, accessor: &str) -> DocResult<(usize, usize)> {
        self.ty
            .locate(accessor)
            .ok_or_else(|| DocFieldsError::unknown_field(accessor))
    }

    fn require_key(&self) -> DocResult<&RecordKey> {
        self.key.as_ref().ok_or_else(|| DocFieldsError::MissingKey {
            record_type: self.ty.name().to_string(),
        })
    }
}
