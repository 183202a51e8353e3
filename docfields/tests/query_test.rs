mod helpers;

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use docfields::{
    DocFieldsError, DocumentQueryExt, FieldSpec, OrderArgs, PredicateBuilder, Record, RecordKey,
    ResolvedType, SeaOrmStore, SortOrder, TypedValue, WhereArgs,
};
use helpers::{product, product_registry, products_table, setup_test_db, sqlite_config};
use sea_query::Condition;
use sea_orm::EntityTrait;

struct Fixture {
    store: SeaOrmStore,
    ty: Arc<ResolvedType>,
    builder: PredicateBuilder,
}

impl Fixture {
    async fn new() -> Self {
        let store = SeaOrmStore::new(setup_test_db().await);
        let ty = product_registry(sqlite_config()).resolve("Product").unwrap();
        let builder = PredicateBuilder::new(ty.clone());
        Self { store, ty, builder }
    }

    async fn insert(&self, key: i64, fields: &[(&str, TypedValue)]) {
        let mut record = Record::new(self.ty.clone()).unwrap().with_key(key);
        for (accessor, value) in fields {
            record.set(accessor, value.clone()).unwrap();
        }
        record.save(&self.store).await.unwrap();
    }

    async fn keys(&self, condition: Condition) -> Vec<RecordKey> {
        let mut keys = self
            .store
            .find_keys(&products_table(), condition, vec![])
            .await
            .unwrap();
        keys.sort_by_key(|key| key.to_string());
        keys
    }

    async fn ordered(&self, args: &OrderArgs) -> Vec<RecordKey> {
        let order = self.builder.build_orders("options", args).unwrap();
        self.store
            .find_keys(&products_table(), Condition::all(), order)
            .await
            .unwrap()
    }
}

/// A: matching title, rank 4, made now. B: other title, rank 3, made three
/// years ago. C: nothing set.
async fn three_records() -> Fixture {
    let fixture = Fixture::new().await;
    let now = Utc::now();
    fixture
        .insert(
            1,
            &[
                ("title", "title".into()),
                ("rank", 4.into()),
                ("made_at", now.into()),
            ],
        )
        .await;
    fixture
        .insert(
            2,
            &[
                ("title", "ignored".into()),
                ("rank", 3.into()),
                ("made_at", (now - Duration::days(3 * 365)).into()),
            ],
        )
        .await;
    fixture.insert(3, &[]).await;
    fixture
}

#[tokio::test]
async fn test_where_combines_containment_and_ranges() {
    let fixture = three_records().await;
    let now = Utc::now();
    let args = WhereArgs::new()
        .eq("title", "title")
        .ops("rank", [("gt", 3), ("lt", 7)])
        .ops(
            "made_at",
            [
                ("before", now + Duration::days(2)),
                ("after", now - Duration::days(2)),
            ],
        );
    let condition = fixture.builder.build_where("options", &args).unwrap();
    assert_eq!(fixture.keys(condition).await, vec![RecordKey::Int(1)]);
}

#[tokio::test]
async fn test_range_literals_expand_to_comparisons() {
    let fixture = three_records().await;

    let half_open = WhereArgs::new().range("rank", 3..4);
    let condition = fixture.builder.build_where("options", &half_open).unwrap();
    assert_eq!(fixture.keys(condition).await, vec![RecordKey::Int(2)]);

    let closed = WhereArgs::new().range("rank", 3..=4);
    let condition = fixture.builder.build_where("options", &closed).unwrap();
    assert_eq!(
        fixture.keys(condition).await,
        vec![RecordKey::Int(1), RecordKey::Int(2)]
    );

    let today = Utc::now().date_naive();
    let last_month = (today - Duration::days(30))..(today + Duration::days(2));
    let recent = WhereArgs::new().range("made_at", last_month);
    let condition = fixture.builder.build_where("options", &recent).unwrap();
    assert_eq!(fixture.keys(condition).await, vec![RecordKey::Int(1)]);
}

#[tokio::test]
async fn test_string_ranges_not_supported() {
    let fixture = Fixture::new().await;
    let err = fixture
        .builder
        .build_where("options", &WhereArgs::new().range("title", "a".."m"))
        .unwrap_err();
    assert!(matches!(err, DocFieldsError::NotSupported { ref field, .. } if field == "title"));
    assert!(err.is_query_error());
}

#[tokio::test]
async fn test_where_not_negates_each_part() {
    let fixture = three_records().await;

    let not_title = WhereArgs::new().eq("title", "title");
    let condition = fixture.builder.build_where_not("options", &not_title).unwrap();
    assert_eq!(
        fixture.keys(condition).await,
        vec![RecordKey::Int(2), RecordKey::Int(3)]
    );

    let not_ranked = WhereArgs::new().ops("rank", [("gte", 4)]);
    let condition = fixture.builder.build_where_not("options", &not_ranked).unwrap();
    assert_eq!(fixture.keys(condition).await, vec![RecordKey::Int(2)]);

    let err = fixture
        .builder
        .build_where_not("options", &WhereArgs::new().range("rank", 1..=2))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "`where_not` does not accept 1..=2 for `rank` field"
    );
}

#[tokio::test]
async fn test_order_by_multiple_keys() {
    let fixture = Fixture::new().await;
    fixture
        .insert(1, &[("title", "b".into()), ("rank", 2.into())])
        .await;
    fixture
        .insert(2, &[("title", "a".into()), ("rank", 2.into())])
        .await;
    fixture
        .insert(3, &[("title", "c".into()), ("rank", 10.into())])
        .await;

    let by_rank_then_title = OrderArgs::new().field("r").direction("t", "DESC");
    assert_eq!(
        fixture.ordered(&by_rank_then_title).await,
        vec![RecordKey::Int(1), RecordKey::Int(2), RecordKey::Int(3)]
    );

    // explicit direction keeps the bare position
    let rank_desc = OrderArgs::new()
        .field("rank")
        .field("title")
        .direction("rank", SortOrder::Desc);
    assert_eq!(
        fixture.ordered(&rank_desc).await,
        vec![RecordKey::Int(3), RecordKey::Int(2), RecordKey::Int(1)]
    );

    let err = fixture
        .builder
        .build_order("options", "r", "upward")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "`upward` is not a valid direction for ordering, only `asc` and `desc` are accepted"
    );
}

#[tokio::test]
async fn test_adversarial_values_are_bound() {
    let fixture = Fixture::new().await;
    let hostile = "x'); DROP TABLE products; --";
    fixture.insert(1, &[("title", hostile.into())]).await;
    fixture.insert(2, &[("title", "plain".into())]).await;

    let condition = fixture
        .builder
        .build_where("options", &WhereArgs::new().eq("title", hostile))
        .unwrap();
    assert_eq!(fixture.keys(condition).await, vec![RecordKey::Int(1)]);

    let err = fixture
        .builder
        .build_where("options\"; DROP TABLE products; --", &WhereArgs::new().eq("title", "x"))
        .unwrap_err();
    assert!(matches!(err, DocFieldsError::InvalidColumnName { .. }));

    let remaining = fixture.keys(Condition::all()).await;
    assert_eq!(remaining.len(), 2);
}

#[tokio::test]
async fn test_quoted_storage_keys_order_safely() {
    let mut registry = product_registry(sqlite_config());
    registry
        .declare_fields(
            "Product",
            "data",
            vec![FieldSpec::new("weird", "integer").store_key("it's odd")],
        )
        .unwrap();
    let ty = registry.resolve("Product").unwrap();
    let store = SeaOrmStore::new(setup_test_db().await);
    for (key, weird) in [(1, 5), (2, 1)] {
        let mut record = Record::new(ty.clone()).unwrap().with_key(key);
        record.set("weird", weird).unwrap();
        record.save(&store).await.unwrap();
    }

    let builder = PredicateBuilder::new(ty);
    let order = builder
        .build_orders("data", &OrderArgs::new().field("weird"))
        .unwrap();
    let keys = store
        .find_keys(&products_table(), Condition::all(), order)
        .await
        .unwrap();
    assert_eq!(keys, vec![RecordKey::Int(2), RecordKey::Int(1)]);

    let condition = builder
        .build_where("data", &WhereArgs::new().ops("weird", [("gt", 2)]))
        .unwrap();
    let keys = store
        .find_keys(&products_table(), condition, vec![])
        .await
        .unwrap();
    assert_eq!(keys, vec![RecordKey::Int(1)]);
}

#[tokio::test]
async fn test_unknown_field_lists_valid_keys() {
    let fixture = Fixture::new().await;
    let err = fixture
        .builder
        .build_order("options", "title", SortOrder::Asc)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "`title` is not a valid field name, valid field names include: `t`, `r`, `ma`"
    );

    let err = fixture
        .builder
        .build_contains("missing", &serde_json::Map::new())
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "a column named `missing` does not exist on the `products` table"
    );
}

#[tokio::test]
async fn test_select_extension_filters_entities() {
    let fixture = three_records().await;
    let since = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();

    let models = product::Entity::find()
        .where_document(
            &fixture.builder,
            "options",
            &WhereArgs::new().ops("made_at", [("after", since)]),
        )
        .unwrap()
        .order_by_document(
            &fixture.builder,
            "options",
            &OrderArgs::new().direction("rank", "desc"),
        )
        .unwrap()
        .all(fixture.store.connection())
        .await
        .unwrap();
    let ids: Vec<i64> = models.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 2]);

    let models = product::Entity::find()
        .where_not_document(
            &fixture.builder,
            "options",
            &WhereArgs::new().eq("title", "ignored"),
        )
        .unwrap()
        .all(fixture.store.connection())
        .await
        .unwrap();
    assert_eq!(models.len(), 2);
}
