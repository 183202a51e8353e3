use docfields::{Dialect, DocFieldsConfig, FieldSpec, SchemaRegistry, TableInfo};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

pub mod product {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "products")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i64,
        #[sea_orm(nullable)]
        pub name: Option<String>,
        #[sea_orm(nullable)]
        pub options: Option<String>,
        #[sea_orm(nullable)]
        pub data: Option<String>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[allow(dead_code)]
pub async fn setup_test_db() -> DatabaseConnection {
    init_logging();

    // Use SQLite in-memory database
    let db = Database::connect("sqlite::memory:").await.unwrap();

    let schema = Schema::new(db.get_database_backend());
    let mut product_table = schema.create_table_from_entity(product::Entity);
    let create_products = product_table.if_not_exists();
    let create_products_sql = db.get_database_backend().build(create_products);
    db.execute(create_products_sql).await.unwrap();

    db
}

#[allow(dead_code)]
pub fn products_table() -> TableInfo {
    TableInfo::new("products", "id", ["name", "options", "data"])
}

#[allow(dead_code)]
pub fn sqlite_config() -> DocFieldsConfig {
    DocFieldsConfig::default().with_dialect(Dialect::Sqlite)
}

/// `Product` with `title`, `rank` and `made_at` stored under short keys
#[allow(dead_code)]
pub fn product_registry(config: DocFieldsConfig) -> SchemaRegistry {
    let mut registry = SchemaRegistry::new(config);
    registry.define_type("Product", products_table()).unwrap();
    registry
        .declare_fields(
            "Product",
            "options",
            vec![
                FieldSpec::new("title", "string").store_key("t"),
                FieldSpec::new("rank", "integer").store_key("r"),
                FieldSpec::new("made_at", "datetime").store_key("ma"),
            ],
        )
        .unwrap();
    registry
}
