//! Typed fields stored inside JSON document columns.
//!
//! Declare fields per document column with [`FieldSpec`], collect them per
//! record type in a [`SchemaRegistry`], then work with [`Record`]s whose typed
//! values and documents never drift apart. [`PredicateBuilder`] turns field
//! filters and orderings into sea-query conditions for PostgreSQL or SQLite.

pub mod config;
pub mod error;
pub mod key_types;
pub mod nested;
pub mod query;
pub mod raw;
pub mod record;
pub mod registry;
pub mod schema;
pub mod storage;
pub mod types;

pub use config::{DocFieldsConfig, Dialect, PassengerPolicy};
pub use error::{DocFieldsError, DocResult};
pub use key_types::RecordKey;
pub use nested::{NestedDocument, NestedHandle, NestedValue};
pub use query::{
    Direction, DocumentQueryExt, OrderArgs, OrderClause, PredicateBuilder, QueryValue, RangeLiteral,
    SortOrder, WhereArgs,
};
pub use record::{AfterSet, Attributes, BeforeSet, FieldChange, Record, RecordStatus, SetterHook};
pub use registry::{merge, ColumnCatalog, ResolvedType, SchemaRegistry, TableInfo};
pub use schema::{DefaultValue, FieldDefinition, FieldKind, FieldSchema, FieldSpec};
pub use storage::{DocumentStore, MemoryStore, SeaOrmStore};
pub use types::{cast_for_runtime, cast_for_storage, EnumType, TypeTag, TypedValue};

// ===== Raw SQL macros =====

/// Custom sea-query expression from a format string: each `{}` takes the
/// next argument, inlined for [`raw::Inline`] and bound otherwise.
#[macro_export]
macro_rules! raw {
    ($dialect:expr, $fmt:expr $(, $arg:expr )* $(,)?) => {{
        let mut __args: ::std::vec::Vec<$crate::raw::RawArg> = ::std::vec![];
        $( __args.push(($arg).into()); )*
        $crate::raw::raw_expr($dialect, $fmt, __args)
    }};
}

#[macro_export]
macro_rules! ident {
    ($name:expr) => {{
        $crate::raw::Inline($crate::raw::ident($name))
    }};
}
