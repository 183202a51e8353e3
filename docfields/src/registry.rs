//! Record types, their tables, and inheritance-aware field resolution.
//!
//! Declarations are collected per record type and column through
//! `&mut SchemaRegistry` during startup. [`SchemaRegistry::resolve`] merges a
//! type's lineage root-first into an immutable [`ResolvedType`] that records
//! and query builders share.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::DocFieldsConfig;
use crate::error::{DocFieldsError, DocResult};
use crate::record::hooks::SetterHook;
use crate::schema::{FieldDefinition, FieldSchema, FieldSpec};

/// Columns of the relation a record type is stored in
pub trait ColumnCatalog {
    fn table_name(&self) -> &str;
    fn column_exists(&self, column: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    name: String,
    primary_key: String,
    columns: Vec<String>,
}

impl TableInfo {
    pub fn new<I, S>(name: impl Into<String>, primary_key: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let primary_key = primary_key.into();
        let mut columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if !columns.contains(&primary_key) {
            columns.insert(0, primary_key.clone());
        }
        Self {
            name: name.into(),
            primary_key,
            columns,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl ColumnCatalog for TableInfo {
    fn table_name(&self) -> &str {
        &self.name
    }

    fn column_exists(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

struct RecordTypeDef {
    parent: Option<String>,
    table: Option<TableInfo>,
    declarations: Vec<FieldSchema>,
    hooks: Vec<Arc<dyn SetterHook>>,
    reserved: Vec<String>,
}

/// Startup-time collection of record types and their field declarations
pub struct SchemaRegistry {
    config: DocFieldsConfig,
    types: HashMap<String, RecordTypeDef>,
}

impl SchemaRegistry {
    pub fn new(config: DocFieldsConfig) -> Self {
        Self {
            config,
            types: HashMap::new(),
        }
    }

    pub fn config(&self) -> &DocFieldsConfig {
        &self.config
    }

    /// Register a root record type stored in `table`
    pub fn define_type(&mut self, name: impl Into<String>, table: TableInfo) -> DocResult<()> {
        self.insert_type(name.into(), None, Some(table))
    }

    /// Register a record type inheriting `parent`'s table and declarations
    pub fn define_subtype(
        &mut self,
        name: impl Into<String>,
        parent: impl Into<String>,
    ) -> DocResult<()> {
        let parent = parent.into();
        if !self.types.contains_key(&parent) {
            return Err(DocFieldsError::UnknownRecordType { name: parent });
        }
        self.insert_type(name.into(), Some(parent), None)
    }

    fn insert_type(
        &mut self,
        name: String,
        parent: Option<String>,
        table: Option<TableInfo>,
    ) -> DocResult<()> {
        if self.types.contains_key(&name) {
            return Err(DocFieldsError::DuplicateRecordType { name });
        }
        log::debug!("defining record type '{}' (parent: {:?})", name, parent);
        self.types.insert(
            name,
            RecordTypeDef {
                parent,
                table,
                declarations: Vec::new(),
                hooks: Vec::new(),
                reserved: Vec::new(),
            },
        );
        Ok(())
    }

    /// Names accessors of this type (and its descendants) may not use
    pub fn reserve_accessors<I, S>(&mut self, type_name: &str, names: I) -> DocResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let def = self.def_mut(type_name)?;
        def.reserved.extend(names.into_iter().map(Into::into));
        Ok(())
    }

    /// Declare fields stored in `column`. Repeated declarations on the same
    /// column accumulate.
    pub fn declare_fields(
        &mut self,
        type_name: &str,
        column: &str,
        specs: Vec<FieldSpec>,
    ) -> DocResult<()> {
        let table = self.table_for(type_name)?;
        if !table.column_exists(column) {
            return Err(DocFieldsError::InvalidColumnName {
                table: table.name().to_string(),
                column: column.to_string(),
            });
        }

        let additions = FieldSchema::declare_for(type_name, column, specs)?;
        let def = self.def_mut(type_name)?;
        let previous = def
            .declarations
            .iter()
            .position(|schema| schema.column() == column);
        let snapshot = def.declarations.clone();
        match previous {
            Some(index) => {
                let merged = merge(Some(&def.declarations[index]), &additions)?;
                def.declarations[index] = merged;
            }
            None => def.declarations.push(additions),
        }

        // Surface accessor collisions at declaration time and leave the
        // registry unchanged when they occur.
        if let Err(err) = self.resolve(type_name) {
            if let Ok(def) = self.def_mut(type_name) {
                def.declarations = snapshot;
            }
            return Err(err);
        }
        log::debug!("declared fields on {}.{}", type_name, column);
        Ok(())
    }

    pub fn add_hook(&mut self, type_name: &str, hook: Arc<dyn SetterHook>) -> DocResult<()> {
        self.def_mut(type_name)?.hooks.push(hook);
        Ok(())
    }

    /// Merge the lineage of `type_name` root-first into a resolved type
    pub fn resolve(&self, type_name: &str) -> DocResult<Arc<ResolvedType>> {
        let lineage = self.lineage(type_name)?;
        let table = self.table_for(type_name)?;

        let mut columns: Vec<FieldSchema> = Vec::new();
        let mut hooks: Vec<Arc<dyn SetterHook>> = Vec::new();
        let mut reserved: Vec<String> = table.columns().to_vec();

        for name in &lineage {
            let def = self.def(name)?;
            for additions in &def.declarations {
                match columns
                    .iter()
                    .position(|schema| schema.column() == additions.column())
                {
                    Some(index) => columns[index] = merge(Some(&columns[index]), additions)?,
                    None => columns.push(merge(None, additions)?),
                }
            }
            hooks.extend(def.hooks.iter().cloned());
            reserved.extend(def.reserved.iter().cloned());
        }

        let mut seen: HashMap<&str, &str> = HashMap::new();
        for schema in &columns {
            for field in schema.fields() {
                if reserved.iter().any(|r| *r == field.accessor_name) {
                    return Err(DocFieldsError::ReservedAccessor {
                        record_type: type_name.to_string(),
                        accessor: field.accessor_name.clone(),
                    });
                }
                if seen
                    .insert(field.accessor_name.as_str(), schema.column())
                    .is_some()
                {
                    return Err(DocFieldsError::DuplicateAccessor {
                        scope: type_name.to_string(),
                        accessor: field.accessor_name.clone(),
                    });
                }
            }
        }

        log::trace!(
            "resolved '{}' with {} document column(s)",
            type_name,
            columns.len()
        );
        Ok(Arc::new(ResolvedType {
            name: type_name.to_string(),
            lineage,
            table,
            columns: columns.into_iter().map(Arc::new).collect(),
            hooks,
            config: self.config.clone(),
        }))
    }

    fn def(&self, type_name: &str) -> DocResult<&RecordTypeDef> {
        self.types
            .get(type_name)
            .ok_or_else(|| DocFieldsError::UnknownRecordType {
                name: type_name.to_string(),
            })
    }

    fn def_mut(&mut self, type_name: &str) -> DocResult<&mut RecordTypeDef> {
        self.types
            .get_mut(type_name)
            .ok_or_else(|| DocFieldsError::UnknownRecordType {
                name: type_name.to_string(),
            })
    }

    /// Root-first chain ending with `type_name`
    fn lineage(&self, type_name: &str) -> DocResult<Vec<String>> {
        let mut chain = vec![type_name.to_string()];
        let mut current = self.def(type_name)?;
        while let Some(parent) = &current.parent {
            chain.push(parent.clone());
            current = self.def(parent)?;
        }
        chain.reverse();
        Ok(chain)
    }

    fn table_for(&self, type_name: &str) -> DocResult<TableInfo> {
        let mut current = self.def(type_name)?;
        loop {
            if let Some(table) = &current.table {
                return Ok(table.clone());
            }
            match &current.parent {
                Some(parent) => current = self.def(parent)?,
                None => {
                    return Err(DocFieldsError::UnknownRecordType {
                        name: type_name.to_string(),
                    })
                }
            }
        }
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.types.keys().collect();
        names.sort();
        f.debug_struct("SchemaRegistry")
            .field("config", &self.config)
            .field("types", &names)
            .finish()
    }
}

/// Merge `additions` over `ancestor`: same-name fields are replaced in place,
/// new fields are appended.
pub fn merge(ancestor: Option<&FieldSchema>, additions: &FieldSchema) -> DocResult<FieldSchema> {
    let Some(ancestor) = ancestor else {
        return Ok(additions.clone());
    };

    let mut fields: Vec<FieldDefinition> = ancestor.fields().to_vec();
    for field in additions.fields() {
        match ancestor.index_of(&field.name) {
            Some(index) => fields[index] = field.clone(),
            None => fields.push(field.clone()),
        }
    }
    FieldSchema::from_definitions(
        additions.column().to_string(),
        additions.scope().to_string(),
        fields,
    )
}

/// The merged, immutable view of one record type
pub struct ResolvedType {
    name: String,
    lineage: Vec<String>,
    table: TableInfo,
    columns: Vec<Arc<FieldSchema>>,
    hooks: Vec<Arc<dyn SetterHook>>,
    config: DocFieldsConfig,
}

impl ResolvedType {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this type is `type_name` or descends from it
    pub fn is_a(&self, type_name: &str) -> bool {
        self.lineage.iter().any(|n| n == type_name)
    }

    pub fn table(&self) -> &TableInfo {
        &self.table
    }

    pub fn config(&self) -> &DocFieldsConfig {
        &self.config
    }

    pub fn hooks(&self) -> &[Arc<dyn SetterHook>] {
        &self.hooks
    }

    /// Document columns in first-declaration order
    pub fn schemas(&self) -> &[Arc<FieldSchema>] {
        &self.columns
    }

    pub fn schema(&self, column: &str) -> Option<&Arc<FieldSchema>> {
        self.columns.iter().find(|s| s.column() == column)
    }

    pub(crate) fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|s| s.column() == column)
    }

    /// `(column index, field index)` of an accessor
    pub(crate) fn locate(&self, accessor: &str) -> Option<(usize, usize)> {
        self.columns
            .iter()
            .enumerate()
            .find_map(|(ci, schema)| schema.index_of_accessor(accessor).map(|fi| (ci, fi)))
    }

    pub fn field_by_accessor(&self, accessor: &str) -> Option<(&FieldSchema, &FieldDefinition)> {
        let (ci, fi) = self.locate(accessor)?;
        let schema = &self.columns[ci];
        Some((schema.as_ref(), &schema.fields()[fi]))
    }

    pub fn accessors(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .flat_map(|s| s.fields().iter().map(|f| f.accessor_name.as_str()))
    }
}

impl ColumnCatalog for ResolvedType {
    fn table_name(&self) -> &str {
        self.table.name()
    }

    fn column_exists(&self, column: &str) -> bool {
        self.table.column_exists(column)
    }
}

impl fmt::Debug for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedType")
            .field("name", &self.name)
            .field("lineage", &self.lineage)
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypedValue;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new(DocFieldsConfig::default());
        registry
            .define_type(
                "product",
                TableInfo::new("products", "id", ["id", "name", "options", "data"]),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_merge_keeps_ancestor_position() {
        let ancestor = FieldSchema::declare(
            "options",
            vec![
                FieldSpec::new("a", "string"),
                FieldSpec::new("b", "integer").default(1i64),
            ],
        )
        .unwrap();
        let additions = FieldSchema::declare(
            "options",
            vec![
                FieldSpec::new("c", "boolean"),
                FieldSpec::new("a", "integer").store_key("aa"),
            ],
        )
        .unwrap();
        let merged = merge(Some(&ancestor), &additions).unwrap();
        let names: Vec<_> = merged.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(merged.field("a").unwrap().storage_key, "aa");
        assert_eq!(merged.defaults().count(), 1);
    }

    #[test]
    fn test_subtype_sees_both_levels() {
        let mut registry = registry();
        registry
            .declare_fields(
                "product",
                "options",
                vec![FieldSpec::new("title", "string").default("base")],
            )
            .unwrap();
        registry.define_subtype("shirt", "product").unwrap();
        registry
            .declare_fields(
                "shirt",
                "options",
                vec![
                    FieldSpec::new("size", "string"),
                    FieldSpec::new("title", "string").default("shirt"),
                ],
            )
            .unwrap();

        let shirt = registry.resolve("shirt").unwrap();
        let schema = shirt.schema("options").unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(
            schema.field("title").unwrap().default.as_ref().unwrap().evaluate(),
            TypedValue::from("shirt")
        );
        assert!(shirt.is_a("product"));
        assert_eq!(shirt.table().name(), "products");

        let product = registry.resolve("product").unwrap();
        assert_eq!(product.schema("options").unwrap().len(), 1);
    }

    #[test]
    fn test_reserved_and_cross_column_accessors() {
        let mut registry = registry();
        let reserved = registry.declare_fields(
            "product",
            "options",
            vec![FieldSpec::new("name", "string")],
        );
        assert!(matches!(
            reserved,
            Err(DocFieldsError::ReservedAccessor { .. })
        ));

        registry
            .declare_fields("product", "options", vec![FieldSpec::new("color", "string")])
            .unwrap();
        let collision =
            registry.declare_fields("product", "data", vec![FieldSpec::new("color", "string")]);
        assert!(matches!(
            collision,
            Err(DocFieldsError::DuplicateAccessor { .. })
        ));
        // failed declarations leave the type untouched
        let product = registry.resolve("product").unwrap();
        assert!(product.schema("data").is_none());

        registry
            .declare_fields(
                "product",
                "data",
                vec![FieldSpec::new("color", "string").prefix_column()],
            )
            .unwrap();
        assert!(registry.resolve("product").unwrap().locate("data_color").is_some());
    }

    #[test]
    fn test_reserved_accessors_reject_fields() {
        let mut registry = registry();
        registry
            .declare_fields("product", "options", vec![FieldSpec::new("save", "string")])
            .unwrap();
        registry.define_subtype("shirt", "product").unwrap();
        registry.reserve_accessors("shirt", ["save", "reload"]).unwrap();

        assert!(registry.resolve("product").is_ok());
        let err = registry.resolve("shirt").unwrap_err();
        assert!(matches!(
            err,
            DocFieldsError::ReservedAccessor { ref record_type, ref accessor }
                if record_type == "shirt" && accessor == "save"
        ));

        // reserved on the subtype only
        let allowed =
            registry.declare_fields("product", "data", vec![FieldSpec::new("reload", "string")]);
        assert!(allowed.is_ok());
        registry.reserve_accessors("product", ["status"]).unwrap();
        let rejected =
            registry.declare_fields("product", "data", vec![FieldSpec::new("status", "string")]);
        assert!(matches!(
            rejected,
            Err(DocFieldsError::ReservedAccessor { .. })
        ));
        assert!(matches!(
            registry.reserve_accessors("missing", ["x"]),
            Err(DocFieldsError::UnknownRecordType { .. })
        ));
    }

    #[test]
    fn test_unknown_types_and_columns() {
        let mut registry = registry();
        assert!(matches!(
            registry.define_subtype("x", "missing"),
            Err(DocFieldsError::UnknownRecordType { .. })
        ));
        assert!(matches!(
            registry.define_type("product", TableInfo::new("p", "id", ["id"])),
            Err(DocFieldsError::DuplicateRecordType { .. })
        ));
        assert!(matches!(
            registry.declare_fields("product", "nope", vec![]),
            Err(DocFieldsError::InvalidColumnName { .. })
        ));
    }
}
