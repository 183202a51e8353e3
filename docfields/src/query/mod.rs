//! Predicate and ordering builders over document fields.
//!
//! Builders validate identifiers against the bound record type, quote them
//! with [`crate::raw`] and bind every value as a parameter. The output is
//! plain sea-query `Condition`s and `(SimpleExpr, Order)` pairs that plug into
//! any sea-orm select.

pub mod args;
pub mod operators;

pub use args::{Direction, OrderArgs, QueryValue, RangeLiteral, SortOrder, WhereArgs};
pub use operators::{Comparison, OperatorClass};

use std::sync::Arc;

use sea_orm::sea_query::{Condition, Expr, Order, SimpleExpr};
use sea_orm::{EntityTrait, QueryFilter, QueryOrder, Select, Value};
use serde_json::{Map, Value as JsonValue};

use crate::config::Dialect;
use crate::error::{DocFieldsError, DocResult};
use crate::raw::{self, Inline};
use crate::registry::{ColumnCatalog, ResolvedType};
use crate::schema::FieldSchema;
use crate::types::{cast_for_runtime, cast_for_storage, TypeTag, TypedValue};

const WHERE_NOT: &str = "`where_not`";

/// A sort key ready for `order_by`
pub type OrderClause = (SimpleExpr, Order);

/// Builds filters and orderings for the document columns of one record type
#[derive(Debug, Clone)]
pub struct PredicateBuilder {
    ty: Arc<ResolvedType>,
    dialect: Dialect,
}

impl PredicateBuilder {
    pub fn new(ty: Arc<ResolvedType>) -> Self {
        let dialect = ty.config().dialect;
        Self { ty, dialect }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn record_type(&self) -> &Arc<ResolvedType> {
        &self.ty
    }

    /// Rows whose document holds every `(storage key, value)` pair
    pub fn build_contains(
        &self,
        column: &str,
        values: &Map<String, JsonValue>,
    ) -> DocResult<Condition> {
        let column_ref = self.column_ref(column)?;
        log::trace!(
            "contains on {}: {}",
            column_ref,
            JsonValue::Object(values.clone())
        );

        match self.dialect {
            Dialect::Postgres => {
                let encoded = JsonValue::Object(values.clone()).to_string();
                let expr = crate::raw!(
                    self.dialect,
                    "{} @> ({})::jsonb",
                    Inline(column_ref),
                    encoded
                )?;
                Ok(Condition::all().add(expr))
            }
            Dialect::Sqlite => {
                let mut condition = Condition::all();
                for (key, value) in values {
                    let fmt = match value {
                        JsonValue::Object(_) | JsonValue::Array(_) => {
                            "json_extract({}, {}) IS json({})"
                        }
                        _ => "json_extract({}, {}) IS {}",
                    };
                    let expr = crate::raw!(
                        self.dialect,
                        fmt,
                        Inline(column_ref.clone()),
                        raw::json_path(key),
                        sqlite_value(value),
                    )?;
                    condition = condition.add(expr);
                }
                Ok(condition)
            }
        }
    }

    /// Negation of [`build_contains`](Self::build_contains)
    pub fn build_excludes(
        &self,
        column: &str,
        values: &Map<String, JsonValue>,
    ) -> DocResult<Condition> {
        Ok(self.build_contains(column, values)?.not())
    }

    /// Comparison dispatched on the operator token's class
    pub fn build_range(
        &self,
        column: &str,
        store_key: &str,
        operator: &str,
        value: impl Into<TypedValue>,
    ) -> DocResult<Condition> {
        if Comparison::from_number_token(operator).is_some() {
            self.build_number_range(column, store_key, operator, value)
        } else if Comparison::from_time_token(operator).is_some() {
            self.build_time_range(column, store_key, operator, value)
        } else {
            Err(DocFieldsError::not_supported(
                "range comparison",
                store_key,
                operator,
            ))
        }
    }

    pub fn build_range_not(
        &self,
        column: &str,
        store_key: &str,
        operator: &str,
        value: impl Into<TypedValue>,
    ) -> DocResult<Condition> {
        Ok(self.build_range(column, store_key, operator, value)?.not())
    }

    pub fn build_number_range(
        &self,
        column: &str,
        store_key: &str,
        operator: &str,
        value: impl Into<TypedValue>,
    ) -> DocResult<Condition> {
        let column_ref = self.column_ref(column)?;
        let comparison = Comparison::from_number_token(operator).ok_or_else(|| {
            DocFieldsError::not_supported("number comparison", store_key, operator)
        })?;
        let value = value.into();
        let number = cast_for_runtime(&TypeTag::Float, value.clone(), self.ty.config())?
            .as_f64()
            .ok_or_else(|| DocFieldsError::cast("float", &value))?;

        let fmt = match self.dialect {
            Dialect::Postgres => format!("({{}} ->> {{}})::float {} {{}}", comparison.sql()),
            Dialect::Sqlite => format!(
                "CAST(json_extract({{}}, {{}}) AS REAL) {} {{}}",
                comparison.sql()
            ),
        };
        let expr = crate::raw!(
            self.dialect,
            &fmt,
            Inline(column_ref),
            self.key_arg(store_key),
            number,
        )?;
        Ok(Condition::all().add(expr))
    }

    pub fn build_number_range_not(
        &self,
        column: &str,
        store_key: &str,
        operator: &str,
        value: impl Into<TypedValue>,
    ) -> DocResult<Condition> {
        Ok(self.build_number_range(column, store_key, operator, value)?.not())
    }

    pub fn build_time_range(
        &self,
        column: &str,
        store_key: &str,
        operator: &str,
        value: impl Into<TypedValue>,
    ) -> DocResult<Condition> {
        let column_ref = self.column_ref(column)?;
        let comparison = Comparison::from_time_token(operator).ok_or_else(|| {
            DocFieldsError::not_supported("time comparison", store_key, operator)
        })?;
        let value = value.into();
        let instant = cast_for_runtime(&TypeTag::DateTime, value.clone(), self.ty.config())?
            .as_datetime()
            .ok_or_else(|| DocFieldsError::cast("datetime", &value))?;

        let (fmt, bound): (String, Value) = match self.dialect {
            Dialect::Postgres => (
                format!("({{}} ->> {{}})::timestamptz {} {{}}", comparison.sql()),
                instant.into(),
            ),
            Dialect::Sqlite => (
                format!(
                    "datetime(json_extract({{}}, {{}})) {} datetime({{}})",
                    comparison.sql()
                ),
                instant
                    .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
                    .into(),
            ),
        };
        let expr = crate::raw!(
            self.dialect,
            &fmt,
            Inline(column_ref),
            self.key_arg(store_key),
            bound,
        )?;
        Ok(Condition::all().add(expr))
    }

    pub fn build_time_range_not(
        &self,
        column: &str,
        store_key: &str,
        operator: &str,
        value: impl Into<TypedValue>,
    ) -> DocResult<Condition> {
        Ok(self.build_time_range(column, store_key, operator, value)?.not())
    }

    /// Sort key over one declared storage key
    pub fn build_order(
        &self,
        column: &str,
        store_key: &str,
        direction: impl Into<Direction>,
    ) -> DocResult<OrderClause> {
        let column_ref = self.column_ref(column)?;
        let schema = self.schema_for(column)?;
        let field = schema
            .field_by_storage_key(store_key)
            .ok_or_else(|| DocFieldsError::InvalidFieldName {
                field: store_key.to_string(),
                valid: schema.storage_keys().map(str::to_string).collect(),
            })?;
        let order = direction.into().resolve()?;

        let sql = match self.dialect {
            Dialect::Postgres => format!("({} -> {})", column_ref, raw::literal(store_key)),
            Dialect::Sqlite => format!(
                "CAST(json_extract({}, {}) AS {})",
                column_ref,
                raw::literal(&raw::json_path(store_key)),
                sqlite_affinity(field.type_tag())
            ),
        };
        Ok((Expr::cust(sql), order.into()))
    }

    /// Successive sort keys; fields may be given by name or storage key
    pub fn build_orders(&self, column: &str, args: &OrderArgs) -> DocResult<Vec<OrderClause>> {
        let schema = self.schema_for(column)?;
        args.keys()
            .into_iter()
            .map(|(field, direction)| {
                let store_key = schema.storage_key_for(&field);
                self.build_order(column, store_key, direction)
            })
            .collect()
    }

    /// Filter built from field names, dispatching each entry on its value
    pub fn build_where(&self, column: &str, args: &WhereArgs) -> DocResult<Condition> {
        self.column_ref(column)?;
        let schema = self.schema_for(column)?;
        let mut condition = Condition::all();
        let mut contained = Map::new();

        for (field, value) in args.entries() {
            let store_key = self.store_key(schema, field)?;
            match value {
                QueryValue::Operators(ops) => match operators::classify(ops) {
                    Some(OperatorClass::Number) => {
                        for (token, operand) in ops {
                            let part =
                                self.build_number_range(column, store_key, token, operand.clone())?;
                            condition = condition.add(part);
                        }
                    }
                    Some(OperatorClass::Time) => {
                        for (token, operand) in ops {
                            let part =
                                self.build_time_range(column, store_key, token, operand.clone())?;
                            condition = condition.add(part);
                        }
                    }
                    None => {
                        contained.insert(store_key.to_string(), self.operators_json(ops));
                    }
                },
                QueryValue::Range(range) => {
                    for (token, operand) in expand_range(field, range)? {
                        let part = self.build_range(column, store_key, token, operand)?;
                        condition = condition.add(part);
                    }
                }
                QueryValue::Value(value) => {
                    let json = self.contained_json(schema, store_key, value);
                    contained.insert(store_key.to_string(), json);
                }
            }
        }

        if !contained.is_empty() {
            condition = condition.add(self.build_contains(column, &contained)?);
        }
        log::debug!(
            "where on {}.{}: {} entries",
            self.ty.table_name(),
            column,
            args.entries().len()
        );
        Ok(condition)
    }

    /// Each entry negated; ranges are rejected
    pub fn build_where_not(&self, column: &str, args: &WhereArgs) -> DocResult<Condition> {
        self.column_ref(column)?;
        let schema = self.schema_for(column)?;
        let mut condition = Condition::all();
        let mut excluded = Map::new();

        for (field, value) in args.entries() {
            let store_key = self.store_key(schema, field)?;
            match value {
                QueryValue::Range(range) => {
                    return Err(DocFieldsError::not_supported(
                        WHERE_NOT,
                        field.as_str(),
                        range,
                    ));
                }
                QueryValue::Operators(ops) => match operators::classify(ops) {
                    Some(OperatorClass::Number) => {
                        for (token, operand) in ops {
                            let part = self.build_number_range_not(
                                column,
                                store_key,
                                token,
                                operand.clone(),
                            )?;
                            condition = condition.add(part);
                        }
                    }
                    Some(OperatorClass::Time) => {
                        for (token, operand) in ops {
                            let part = self.build_time_range_not(
                                column,
                                store_key,
                                token,
                                operand.clone(),
                            )?;
                            condition = condition.add(part);
                        }
                    }
                    None => {
                        excluded.insert(store_key.to_string(), self.operators_json(ops));
                    }
                },
                QueryValue::Value(value) => {
                    let json = self.contained_json(schema, store_key, value);
                    excluded.insert(store_key.to_string(), json);
                }
            }
        }

        if !excluded.is_empty() {
            condition = condition.add(self.build_excludes(column, &excluded)?);
        }
        log::debug!(
            "where_not on {}.{}: {} entries",
            self.ty.table_name(),
            column,
            args.entries().len()
        );
        Ok(condition)
    }

    fn column_ref(&self, column: &str) -> DocResult<String> {
        if self.ty.column_exists(column) {
            Ok(raw::column_ref(self.ty.table_name(), column))
        } else {
            Err(DocFieldsError::InvalidColumnName {
                table: self.ty.table_name().to_string(),
                column: column.to_string(),
            })
        }
    }

    fn schema_for(&self, column: &str) -> DocResult<&FieldSchema> {
        self.ty
            .schema(column)
            .map(|schema| schema.as_ref())
            .ok_or_else(|| DocFieldsError::unknown_field(column))
    }

    fn store_key<'a>(&self, schema: &'a FieldSchema, field: &str) -> DocResult<&'a str> {
        schema
            .resolve_key(field)
            .map(|definition| definition.storage_key.as_str())
            .ok_or_else(|| DocFieldsError::InvalidFieldName {
                field: field.to_string(),
                valid: schema.fields().iter().map(|f| f.name.clone()).collect(),
            })
    }

    // Postgres addresses keys directly, SQLite through a JSON path
    fn key_arg(&self, store_key: &str) -> String {
        match self.dialect {
            Dialect::Postgres => store_key.to_string(),
            Dialect::Sqlite => raw::json_path(store_key),
        }
    }

    /// Value as it would be written into the document, raw when it does not cast
    fn contained_json(
        &self,
        schema: &FieldSchema,
        store_key: &str,
        value: &TypedValue,
    ) -> JsonValue {
        let offset = &self.ty.config().storage_offset;
        match schema.field_by_storage_key(store_key).and_then(|f| f.type_tag()) {
            Some(tag) => cast_for_storage(tag, value.clone(), self.ty.config())
                .unwrap_or_else(|_| value.to_json(offset)),
            None => value.to_json(offset),
        }
    }

    fn operators_json(&self, ops: &[(String, TypedValue)]) -> JsonValue {
        let offset = &self.ty.config().storage_offset;
        JsonValue::Object(
            ops.iter()
                .map(|(token, value)| (token.clone(), value.to_json(offset)))
                .collect(),
        )
    }
}

/// Comparator pairs equivalent to a range literal
fn expand_range(
    field: &str,
    range: &RangeLiteral,
) -> DocResult<Vec<(&'static str, TypedValue)>> {
    let numeric = matches!(
        range.start,
        TypedValue::Integer(_) | TypedValue::Float(_) | TypedValue::Decimal(_)
    );
    let temporal = matches!(range.start, TypedValue::Date(_) | TypedValue::DateTime(_));

    if numeric {
        let upper = if range.inclusive {
            "less_than_or_equal_to"
        } else {
            "less_than"
        };
        Ok(vec![
            ("greater_than_or_equal_to", range.start.clone()),
            (upper, range.end.clone()),
        ])
    } else if temporal {
        Ok(vec![
            ("before", range.end.clone()),
            ("after", range.start.clone()),
        ])
    } else {
        Err(DocFieldsError::not_supported("`where`", field, range))
    }
}

/// What `json_extract` yields for a scalar JSON value
fn sqlite_value(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::String(None),
        JsonValue::Bool(b) => Value::BigInt(Some(i64::from(*b))),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::BigInt(Some(i)),
            None => Value::Double(n.as_f64()),
        },
        JsonValue::String(s) => Value::String(Some(Box::new(s.clone()))),
        other => Value::String(Some(Box::new(other.to_string()))),
    }
}

fn sqlite_affinity(tag: Option<&TypeTag>) -> &'static str {
    match tag {
        Some(TypeTag::Integer | TypeTag::Boolean | TypeTag::Enum(_)) => "INTEGER",
        Some(TypeTag::Float | TypeTag::Decimal) => "REAL",
        _ => "TEXT",
    }
}

/// Document filters and orderings on sea-orm selects
pub trait DocumentQueryExt: Sized {
    fn where_document(
        self,
        builder: &PredicateBuilder,
        column: &str,
        args: &WhereArgs,
    ) -> DocResult<Self>;

    fn where_not_document(
        self,
        builder: &PredicateBuilder,
        column: &str,
        args: &WhereArgs,
    ) -> DocResult<Self>;

    fn order_by_document(
        self,
        builder: &PredicateBuilder,
        column: &str,
        args: &OrderArgs,
    ) -> DocResult<Self>;
}

impl<E> DocumentQueryExt for Select<E>
where
    E: EntityTrait,
{
    fn where_document(
        self,
        builder: &PredicateBuilder,
        column: &str,
        args: &WhereArgs,
    ) -> DocResult<Self> {
        Ok(self.filter(builder.build_where(column, args)?))
    }

    fn where_not_document(
        self,
        builder: &PredicateBuilder,
        column: &str,
        args: &WhereArgs,
    ) -> DocResult<Self> {
        Ok(self.filter(builder.build_where_not(column, args)?))
    }

    fn order_by_document(
        self,
        builder: &PredicateBuilder,
        column: &str,
        args: &OrderArgs,
    ) -> DocResult<Self> {
        let orders = builder.build_orders(column, args)?;
        Ok(orders
            .into_iter()
            .fold(self, |query, (expr, order)| query.order_by(expr, order)))
    }
}
