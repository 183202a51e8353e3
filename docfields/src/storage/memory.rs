use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;

use super::DocumentStore;
use crate::error::{DocFieldsError, DocResult};
use crate::key_types::RecordKey;
use crate::registry::{ColumnCatalog, TableInfo};

type RowKey = (String, RecordKey);

/// In-process store keyed by table and record key
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<String, TableInfo>,
    rows: RwLock<HashMap<RowKey, HashMap<String, JsonValue>>>,
}

impl MemoryStore {
    pub fn new<I>(tables: I) -> Self
    where
        I: IntoIterator<Item = TableInfo>,
    {
        Self {
            tables: tables
                .into_iter()
                .map(|table| (table.name().to_string(), table))
                .collect(),
            rows: RwLock::new(HashMap::new()),
        }
    }

    fn check_column(&self, table: &TableInfo, column: &str) -> DocResult<()> {
        let known = self
            .tables
            .get(table.name())
            .is_some_and(|t| t.column_exists(column));
        if known {
            Ok(())
        } else {
            Err(DocFieldsError::InvalidColumnName {
                table: table.name().to_string(),
                column: column.to_string(),
            })
        }
    }

    /// Number of stored rows across all tables
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch_document(
        &self,
        table: &TableInfo,
        key: &RecordKey,
        column: &str,
    ) -> DocResult<Option<JsonValue>> {
        self.check_column(table, column)?;
        let rows = self.rows.read().await;
        let row = rows
            .get(&(table.name().to_string(), key.clone()))
            .ok_or_else(|| DocFieldsError::RecordNotFound {
                table: table.name().to_string(),
                key: key.to_string(),
            })?;
        Ok(row.get(column).cloned())
    }

    async fn persist(
        &self,
        table: &TableInfo,
        key: &RecordKey,
        column: &str,
        document: &JsonValue,
    ) -> DocResult<()> {
        self.check_column(table, column)?;
        let mut rows = self.rows.write().await;
        rows.entry((table.name().to_string(), key.clone()))
            .or_default()
            .insert(column.to_string(), document.clone());
        log::trace!("memory store wrote {}.{} for key {}", table.name(), column, key);
        Ok(())
    }

    async fn column_exists(&self, table: &TableInfo, column: &str) -> DocResult<bool> {
        Ok(self.check_column(table, column).is_ok())
    }
}
