use contentweave_core::db::open_db_in_memory;
use contentweave_core::{
    get_references_from, Address, Content, ContentCollator, ContentTypeDef, ContentTypeRegistry,
    ItemId, ItemVersion, ItemVersionedId, PersistOptions, PropertyPath, Reference,
    ReferenceError, ReferenceGetter, ReferenceLookup, SqliteContainerRepository, Summary,
    TypeName, TypedReference, VersionContext,
};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn registry() -> Arc<ContentTypeRegistry> {
    let registry = ContentTypeRegistry::new()
        .with(ContentTypeDef::new("Shop.Product").segments(&["Slug"]))
        .and_then(|r| {
            r.with(
                ContentTypeDef::new("Shop.Review")
                    .segments(&["Slug"])
                    .implements("Feedback")
                    .reference_field("Product"),
            )
        })
        .and_then(|r| {
            r.with(
                ContentTypeDef::new("Shop.Note")
                    .segments(&["Slug"])
                    .implements("Feedback"),
            )
        })
        .unwrap();
    Arc::new(registry)
}

fn collator(conn: &Connection) -> ContentCollator<SqliteContainerRepository<'_>> {
    ContentCollator::new(SqliteContainerRepository::try_new(conn).unwrap(), registry())
}

fn save(
    collator: &ContentCollator<SqliteContainerRepository<'_>>,
    data_type: &str,
    path: &str,
    data: Value,
) -> ItemId {
    let mut ctx = VersionContext::default();
    let address: Address = collator
        .registry()
        .address_from_path(&TypeName::from(data_type), path);
    let mut content = Content::new(TypeName::from(data_type), ItemVersion::new(), data);
    collator
        .set(&mut ctx, Some(&address), &mut content, PersistOptions::default())
        .unwrap();
    collator
        .get_summaries(&ctx, &[address])
        .unwrap()
        .remove(0)
        .item_id
}

fn titles(summaries: &[Summary]) -> Vec<&str> {
    let mut titles: Vec<&str> = summaries.iter().map(|s| s.title.as_str()).collect();
    titles.sort_unstable();
    titles
}

#[test]
fn referencing_items_are_found_in_object_and_string_form() {
    let conn = open_db_in_memory().unwrap();
    let collator = collator(&conn);
    let widget = save(&collator, "Shop.Product", "/widget", json!({"Title": "Widget"}));
    let gadget = save(&collator, "Shop.Product", "/gadget", json!({"Title": "Gadget"}));

    let as_object = serde_json::to_value(Reference::from_item_id(&widget)).unwrap();
    save(&collator, "Shop.Review", "/great", json!({"Title": "Great", "Product": as_object}));
    save(
        &collator,
        "Shop.Review",
        "/meh",
        json!({"Title": "Meh", "Product": widget.to_string()}),
    );
    save(
        &collator,
        "Shop.Review",
        "/other",
        json!({"Title": "Other", "Product": gadget.to_string()}),
    );
    save(&collator, "Shop.Review", "/none", json!({"Title": "None"}));

    let mut ctx = VersionContext::default();
    let found = Reference::from_item_id(&widget)
        .get_referencing_items(
            &collator,
            &mut ctx,
            ItemVersion::new(),
            "Shop.Review",
            "Product",
            &ReferenceLookup::default(),
        )
        .unwrap();
    assert_eq!(titles(&found), vec!["Great", "Meh"]);
    assert_eq!(ctx.depth(), 0);
}

#[test]
fn undeclared_reference_property_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let collator = collator(&conn);
    let widget = save(&collator, "Shop.Product", "/widget", json!({"Title": "Widget"}));
    let target = ItemVersionedId::new(widget, ItemVersion::new());
    let mut ctx = VersionContext::default();
    let lookup = ReferenceLookup::default();

    for (referencing_type, property) in [
        ("Shop.Review", "Title"),
        ("Feedback", "Product"),
        ("Nothing", "Product"),
    ] {
        assert!(
            matches!(
                get_references_from(&collator, &mut ctx, &target, referencing_type, property, &lookup),
                Err(ReferenceError::InvalidArgument(_))
            ),
            "{referencing_type}.{property} should be rejected"
        );
    }
}

struct IndexedGetter {
    calls: AtomicUsize,
}

impl ReferenceGetter for IndexedGetter {
    fn referencing_items(
        &self,
        target: &ItemVersionedId,
        types: &[TypeName],
        property: &PropertyPath,
    ) -> Result<Vec<Summary>, ReferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(types, &[TypeName::from("Shop.Review")]);
        assert_eq!(property.as_str(), "Product");
        Ok(vec![Summary {
            item_id: ItemId::new(TypeName::from("Shop.Review"), 7_i64).unwrap(),
            path: "/indexed".to_string(),
            version: target.version.clone(),
            title: "Indexed".to_string(),
        }])
    }
}

#[test]
fn custom_getter_replaces_predicate_scan() {
    let conn = open_db_in_memory().unwrap();
    let collator = collator(&conn);
    let widget = save(&collator, "Shop.Product", "/widget", json!({"Title": "Widget"}));
    let getter = Arc::new(IndexedGetter {
        calls: AtomicUsize::new(0),
    });
    let mut ctx = VersionContext::default();

    let found = get_references_from(
        &collator,
        &mut ctx,
        &ItemVersionedId::new(widget, ItemVersion::new()),
        "Shop.Review",
        "Product",
        &ReferenceLookup::Getter(getter.clone()),
    )
    .unwrap();
    assert_eq!(titles(&found), vec!["Indexed"]);
    assert_eq!(getter.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn reference_title_resolves_through_collator() {
    let conn = open_db_in_memory().unwrap();
    let collator = collator(&conn);
    let widget = save(&collator, "Shop.Product", "/widget", json!({"Title": "Widget"}));
    let ctx = VersionContext::default();

    let reference = Reference::from_item_id(&widget);
    assert_eq!(reference.title(&collator, &ctx).unwrap(), "Widget");
    assert!(!reference.is_empty(&collator, &ctx).unwrap());

    let dangling = Reference::new("Shop.Product", &uuid::Uuid::new_v4().to_string());
    assert!(dangling.is_empty(&collator, &ctx).unwrap());
    assert_eq!(dangling.title(&collator, &ctx).unwrap(), "");
}

#[test]
fn typed_reference_accepts_only_assignable_types() {
    let registry = registry();
    let mut feedback = TypedReference::new(&registry, "Feedback").unwrap();
    assert!(!feedback.fixed_data_type());
    assert_eq!(feedback.assignable_types().len(), 2);

    feedback.set_data_type(Some("Shop.Note")).unwrap();
    assert!(matches!(
        feedback.set_data_type(Some("Shop.Product")),
        Err(ReferenceError::InvalidArgument(_))
    ));
    assert!(matches!(
        TypedReference::new(&registry, "Unknown"),
        Err(ReferenceError::InvalidArgument(_))
    ));
}
