use contentweave_core::db::open_db_in_memory;
use contentweave_core::{
    Address, CollateError, Content, ContentCollator, ContentTypeDef, ContentTypeRegistry,
    EventHub, EventPayload, ItemId, ItemVersion, PersistOptions, SqliteContainerRepository,
    TypeName, VersionContext, EVENT_CONTENT_MOVE,
};
use rusqlite::Connection;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const STORY: &str = "News.Story";

fn registry() -> Arc<ContentTypeRegistry> {
    let registry = ContentTypeRegistry::new()
        .with(
            ContentTypeDef::new(STORY)
                .segments(&["Category", "Slug"])
                .address_field("Category", "Meta.Category")
                .address_field("Slug", "Slug"),
        )
        .unwrap();
    Arc::new(registry)
}

fn collator(conn: &Connection, events: EventHub) -> ContentCollator<SqliteContainerRepository<'_>> {
    ContentCollator::new(SqliteContainerRepository::try_new(conn).unwrap(), registry())
        .with_events(events)
}

fn story_address(category: &str, slug: &str) -> Address {
    Address::from_segments(TypeName::from(STORY), [("Category", category), ("Slug", slug)])
}

fn save_story(
    collator: &ContentCollator<SqliteContainerRepository<'_>>,
    category: &str,
    slug: &str,
) -> ItemId {
    let mut ctx = VersionContext::default();
    let mut story = Content::new(
        TypeName::from(STORY),
        ItemVersion::new(),
        json!({"Title": slug, "Slug": slug, "Meta": {"Category": category}}),
    );
    collator
        .set(&mut ctx, None, &mut story, PersistOptions::default())
        .unwrap();
    collator
        .get_summaries(&ctx, &[story_address(category, slug)])
        .unwrap()
        .remove(0)
        .item_id
}

fn stored_paths(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT path FROM containers ORDER BY path;")
        .unwrap();
    let rows = stmt.query_map([], |row| row.get::<_, String>(0)).unwrap();
    let paths = rows.map(Result::unwrap).collect();
    paths
}

#[test]
fn address_fields_determine_storage_path() {
    let conn = open_db_in_memory().unwrap();
    let collator = collator(&conn, EventHub::new());
    save_story(&collator, "World", "Big");

    assert_eq!(stored_paths(&conn), vec!["/world/big".to_string()]);
    let address = collator
        .get_address(&Content::new(
            TypeName::from(STORY),
            ItemVersion::new(),
            json!({"Slug": "big", "Meta": {"Category": "world"}}),
        ))
        .unwrap();
    assert_eq!(address, story_address("world", "big"));
}

#[test]
fn move_to_free_address_rewrites_path_and_fields() {
    let conn = open_db_in_memory().unwrap();
    let moves = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&moves);
    let mut events = EventHub::new();
    events.register(
        EVENT_CONTENT_MOVE,
        Arc::new(move |_: &str, payload: EventPayload| {
            counter.fetch_add(1, Ordering::SeqCst);
            payload
        }),
    );
    let collator = collator(&conn, events);
    let id = save_story(&collator, "world", "big");

    collator
        .move_address(&id, &story_address("Sport", "big"))
        .unwrap();

    assert_eq!(moves.load(Ordering::SeqCst), 1);
    assert_eq!(stored_paths(&conn), vec!["/sport/big".to_string()]);
    let mut ctx = VersionContext::default();
    let moved = collator.get_by_ids(&mut ctx, &[id]).unwrap();
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].data["Meta"]["Category"], json!("sport"));
    assert_eq!(moved[0].str_field("Slug"), Some("big"));
}

#[test]
fn move_onto_occupied_address_is_prohibited() {
    let conn = open_db_in_memory().unwrap();
    let collator = collator(&conn, EventHub::new());
    let id = save_story(&collator, "world", "big");
    save_story(&collator, "world", "taken");

    assert!(matches!(
        collator.move_address(&id, &story_address("world", "taken")),
        Err(CollateError::ProhibitedAction(_))
    ));
    assert_eq!(
        stored_paths(&conn),
        vec!["/world/big".to_string(), "/world/taken".to_string()]
    );
    let mut ctx = VersionContext::default();
    let original = collator.get_by_ids(&mut ctx, &[id]).unwrap();
    assert_eq!(original[0].data["Meta"]["Category"], json!("world"));
}

#[test]
fn moving_unknown_item_reports_not_found() {
    let conn = open_db_in_memory().unwrap();
    let collator = collator(&conn, EventHub::new());
    let unknown = ItemId::new(TypeName::from(STORY), uuid::Uuid::new_v4()).unwrap();

    assert!(matches!(
        collator.move_address(&unknown, &story_address("world", "gone")),
        Err(CollateError::NotFound(_))
    ));
}

#[test]
fn address_change_handler_can_realign_content() {
    let conn = open_db_in_memory().unwrap();
    let mut events = EventHub::new();
    events.register(
        EVENT_CONTENT_MOVE,
        Arc::new(|_: &str, payload: EventPayload| match payload {
            EventPayload::AddressChanged { to, mut content } => {
                if let Some(slug) = to.get("Slug") {
                    content.data["Slug"] = json!(slug);
                }
                if let Some(category) = to.get("Category") {
                    content.data["Meta"]["Category"] = json!(category);
                }
                EventPayload::AddressChanged { to, content }
            }
            other => other,
        }),
    );
    let collator = collator(&conn, events);
    let mut ctx = VersionContext::default();
    let mut story = Content::new(
        TypeName::from(STORY),
        ItemVersion::new(),
        json!({"Title": "Moved", "Slug": "old", "Meta": {"Category": "world"}}),
    );

    collator
        .set(
            &mut ctx,
            Some(&story_address("sport", "new")),
            &mut story,
            PersistOptions::default(),
        )
        .unwrap();
    assert_eq!(stored_paths(&conn), vec!["/sport/new".to_string()]);
}
