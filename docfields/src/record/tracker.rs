//! Dirty tracking against the last persisted snapshot.

use serde_json::Value as JsonValue;

use crate::config::DocFieldsConfig;
use crate::record::binding::DocumentBinding;
use crate::types::TypedValue;

/// One changed field or document column. For a whole column, `field` is the
/// column name and the values are the documents.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub column: String,
    pub field: String,
    pub old: TypedValue,
    pub new: TypedValue,
}

#[derive(Debug, Clone)]
struct ColumnSnapshot {
    document: TypedValue,
    fields: Vec<TypedValue>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ChangeTracker {
    baseline: Vec<ColumnSnapshot>,
}

impl ChangeTracker {
    /// Baseline of a record that has never been persisted: everything null
    pub(crate) fn blank(bindings: &[DocumentBinding]) -> Self {
        let baseline = bindings
            .iter()
            .map(|binding| ColumnSnapshot {
                document: TypedValue::Null,
                fields: vec![TypedValue::Null; binding.schema().len()],
            })
            .collect();
        Self { baseline }
    }

    /// Baseline equal to the current state
    pub(crate) fn capture(bindings: &[DocumentBinding], config: &DocFieldsConfig) -> Self {
        let baseline = bindings
            .iter()
            .map(|binding| ColumnSnapshot {
                document: document_value(binding),
                fields: binding.tracked_values(config),
            })
            .collect();
        Self { baseline }
    }

    pub(crate) fn changes(
        &self,
        bindings: &[DocumentBinding],
        config: &DocFieldsConfig,
    ) -> Vec<FieldChange> {
        let mut changes = Vec::new();
        for (binding, snapshot) in bindings.iter().zip(&self.baseline) {
            let document = document_value(binding);
            if document != snapshot.document {
                changes.push(FieldChange {
                    column: binding.column().to_string(),
                    field: binding.column().to_string(),
                    old: snapshot.document.clone(),
                    new: document,
                });
            }

            let current = binding.tracked_values(config);
            for ((field, old), new) in binding
                .schema()
                .fields()
                .iter()
                .zip(&snapshot.fields)
                .zip(current)
            {
                if *old != new {
                    changes.push(FieldChange {
                        column: binding.column().to_string(),
                        field: field.accessor_name.clone(),
                        old: old.clone(),
                        new,
                    });
                }
            }
        }
        changes
    }

    pub(crate) fn changed(
        &self,
        accessor: &str,
        bindings: &[DocumentBinding],
        config: &DocFieldsConfig,
    ) -> bool {
        self.changes(bindings, config)
            .iter()
            .any(|change| change.field == accessor)
    }

    pub(crate) fn is_dirty(&self, bindings: &[DocumentBinding], config: &DocFieldsConfig) -> bool {
        !self.changes(bindings, config).is_empty()
    }
}

/// A document holding nothing but nulls compares equal to no document
fn document_value(binding: &DocumentBinding) -> TypedValue {
    let document = binding.document();
    if document.values().all(JsonValue::is_null) {
        TypedValue::Null
    } else {
        TypedValue::Value(JsonValue::Object(document.clone()))
    }
}
