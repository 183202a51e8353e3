use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Condition, Expr, OnConflict, Order, Query, SimpleExpr};
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection};
use serde_json::Value as JsonValue;

use super::DocumentStore;
use crate::config::Dialect;
use crate::error::{DocFieldsError, DocResult};
use crate::key_types::RecordKey;
use crate::registry::TableInfo;

const DOCUMENT_ALIAS: &str = "document";
const KEY_ALIAS: &str = "record_key";

/// Document store over a sea-orm connection (SQLite or PostgreSQL)
#[derive(Debug, Clone)]
pub struct SeaOrmStore {
    conn: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.conn.get_database_backend()
    }

    pub fn dialect(&self) -> Dialect {
        Dialect::from(self.backend())
    }

    /// Keys of the rows matching `condition`, sorted by `order`
    pub async fn find_keys(
        &self,
        table: &TableInfo,
        condition: Condition,
        order: Vec<(SimpleExpr, Order)>,
    ) -> DocResult<Vec<RecordKey>> {
        let db_backend = self.backend();
        let mut select = Query::select();
        select
            .expr_as(
                Expr::col((Alias::new(table.name()), Alias::new(table.primary_key()))),
                Alias::new(KEY_ALIAS),
            )
            .from(Alias::new(table.name()))
            .cond_where(condition);
        for (expr, direction) in order {
            select.order_by_expr(expr, direction);
        }
        let stmt = db_backend.build(&select);
        log::debug!("find_keys: {}", stmt);

        let rows = self.conn.query_all(stmt).await?;
        rows.iter()
            .map(|row| {
                RecordKey::from_row(row, KEY_ALIAS).ok_or_else(|| {
                    DocFieldsError::storage(
                        "find_keys",
                        format!("unsupported key type in {}", table.name()),
                    )
                })
            })
            .collect()
    }
}

#[async_trait]
impl DocumentStore for SeaOrmStore {
    async fn fetch_document(
        &self,
        table: &TableInfo,
        key: &RecordKey,
        column: &str,
    ) -> DocResult<Option<JsonValue>> {
        let db_backend = self.backend();
        let select = Query::select()
            .expr_as(
                Expr::col((Alias::new(table.name()), Alias::new(column))),
                Alias::new(DOCUMENT_ALIAS),
            )
            .from(Alias::new(table.name()))
            .and_where(
                Expr::col((Alias::new(table.name()), Alias::new(table.primary_key())))
                    .eq(key.to_db_value()),
            )
            .to_owned();
        let stmt = db_backend.build(&select);

        let row = self
            .conn
            .query_one(stmt)
            .await?
            .ok_or_else(|| DocFieldsError::RecordNotFound {
                table: table.name().to_string(),
                key: key.to_string(),
            })?;

        match db_backend {
            DatabaseBackend::Postgres => Ok(row.try_get::<Option<JsonValue>>("", DOCUMENT_ALIAS)?),
            _ => {
                // JSON1 columns come back as text
                let text = row.try_get::<Option<String>>("", DOCUMENT_ALIAS)?;
                text.map(|t| {
                    serde_json::from_str(&t)
                        .map_err(|e| DocFieldsError::storage("fetch_document", e.to_string()))
                })
                .transpose()
            }
        }
    }

    async fn persist(
        &self,
        table: &TableInfo,
        key: &RecordKey,
        column: &str,
        document: &JsonValue,
    ) -> DocResult<()> {
        let db_backend = self.backend();
        let encoded = document.to_string();
        let value: SimpleExpr = match db_backend {
            DatabaseBackend::Postgres => Expr::cust_with_values("CAST($1 AS jsonb)", [encoded]),
            _ => Expr::val(encoded).into(),
        };

        let insert = Query::insert()
            .into_table(Alias::new(table.name()))
            .columns([Alias::new(table.primary_key()), Alias::new(column)])
            .values([key.to_db_value().into(), value])
            .map_err(|e| DocFieldsError::storage("persist", e.to_string()))?
            .on_conflict(
                OnConflict::column(Alias::new(table.primary_key()))
                    .update_column(Alias::new(column))
                    .to_owned(),
            )
            .to_owned();
        let stmt = db_backend.build(&insert);

        self.conn.execute(stmt).await?;
        log::debug!("persisted {}.{} for key {}", table.name(), column, key);
        Ok(())
    }

    async fn column_exists(&self, table: &TableInfo, column: &str) -> DocResult<bool> {
        let db_backend = self.backend();
        let stmt = match db_backend {
            DatabaseBackend::Sqlite => sea_orm::Statement::from_sql_and_values(
                db_backend,
                "SELECT COUNT(*) AS hits FROM pragma_table_info(?) WHERE name = ?",
                [table.name().into(), column.into()],
            ),
            _ => sea_orm::Statement::from_sql_and_values(
                db_backend,
                "SELECT COUNT(*) AS hits FROM information_schema.columns \
                 WHERE table_name = $1 AND column_name = $2",
                [table.name().into(), column.into()],
            ),
        };
        let hits = match self.conn.query_one(stmt).await? {
            Some(row) => row.try_get::<i64>("", "hits")?,
            None => 0,
        };
        Ok(hits > 0)
    }
}
