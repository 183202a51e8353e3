//! Storage collaborators that fetch and persist document columns.

mod memory;
mod sea_orm_store;

pub use memory::MemoryStore;
pub use sea_orm_store::SeaOrmStore;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use crate::error::{DocFieldsError, DocResult};
use crate::key_types::RecordKey;
use crate::registry::TableInfo;

/// Row-level access to document columns.
///
/// `fetch_document` fails with `RecordNotFound` when the row is missing and
/// returns `None` when the column holds SQL `NULL`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn fetch_document(
        &self,
        table: &TableInfo,
        key: &RecordKey,
        column: &str,
    ) -> DocResult<Option<JsonValue>>;

    /// Insert or update the document of one row
    async fn persist(
        &self,
        table: &TableInfo,
        key: &RecordKey,
        column: &str,
        document: &JsonValue,
    ) -> DocResult<()>;

    async fn column_exists(&self, table: &TableInfo, column: &str) -> DocResult<bool>;
}

/// Interpret a fetched column value as a document object
pub(crate) fn into_object(
    column: &str,
    value: Option<JsonValue>,
) -> DocResult<Map<String, JsonValue>> {
    match value {
        None | Some(JsonValue::Null) => Ok(Map::new()),
        Some(JsonValue::Object(map)) => Ok(map),
        Some(other) => Err(DocFieldsError::unknown_value(column, other)),
    }
}
