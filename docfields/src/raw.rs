//! Small helpers for composing raw SQL fragments with bound parameters.

use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::Value;

use crate::config::Dialect;
use crate::error::{DocFieldsError, DocResult};

/// Quote an identifier, doubling embedded quotes
pub fn ident(name: &str) -> String {
    let escaped = name.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// `"table"."column"`
pub fn column_ref(table: &str, column: &str) -> String {
    format!("{}.{}", ident(table), ident(column))
}

/// Quote a string literal, doubling embedded single quotes
pub fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// JSON1 path selecting one top-level key
pub fn json_path(key: &str) -> String {
    let simple = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        format!("$.{}", key)
    } else {
        format!("$.\"{}\"", key.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

/// Marks identifier or raw SQL to be inlined, not bound
pub struct Inline(pub String);

pub enum RawArg {
    Bind(Value),
    Inline(String),
}

impl From<Inline> for RawArg {
    fn from(v: Inline) -> Self {
        RawArg::Inline(v.0)
    }
}

// Any type that SeaORM can turn into a Value becomes a bound parameter
impl<T> From<T> for RawArg
where
    Value: From<T>,
{
    fn from(v: T) -> Self {
        RawArg::Bind(Value::from(v))
    }
}

/// Replace each `{}` in `fmt` with inline text or a placeholder in the
/// dialect's style (`$n` for PostgreSQL, `?` for SQLite)
pub fn finalize_sql_with_args(
    dialect: Dialect,
    fmt: &str,
    args: Vec<RawArg>,
) -> DocResult<(String, Vec<Value>)> {
    let mut sql = String::with_capacity(fmt.len() + args.len() * 2);
    let mut params: Vec<Value> = Vec::new();
    let mut pieces = fmt.split("{}");
    let supplied = args.len();
    let mut args = args.into_iter();
    let placeholders = fmt.matches("{}").count();

    if let Some(first) = pieces.next() {
        sql.push_str(first);
    }
    for piece in pieces {
        match args.next() {
            Some(RawArg::Bind(v)) => {
                params.push(v);
                match dialect {
                    Dialect::Postgres => sql.push_str(&format!("${}", params.len())),
                    Dialect::Sqlite => sql.push('?'),
                }
            }
            Some(RawArg::Inline(s)) => sql.push_str(&s),
            None => return Err(arity_error(placeholders, supplied)),
        }
        sql.push_str(piece);
    }
    if supplied > placeholders {
        return Err(arity_error(placeholders, supplied));
    }
    Ok((sql, params))
}

/// Custom expression with bound values
pub fn raw_expr(dialect: Dialect, fmt: &str, args: Vec<RawArg>) -> DocResult<SimpleExpr> {
    let (sql, params) = finalize_sql_with_args(dialect, fmt, args)?;
    Ok(Expr::cust_with_values(sql, params))
}

fn arity_error(placeholders: usize, args: usize) -> DocFieldsError {
    DocFieldsError::invalid_configuration(
        "raw sql",
        format!("{} placeholders but {} arguments", placeholders, args),
    )
}
