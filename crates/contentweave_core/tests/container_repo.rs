use contentweave_core::db::open_db_in_memory;
use contentweave_core::{
    Address, Container, ContainerStore, ItemId, ItemVersion, PersistOptions, RepoError,
    SqliteContainerRepository, TypeName,
};
use rusqlite::Connection;
use serde_json::json;

fn container(data_type: &str, path: &str, version: ItemVersion) -> Container {
    let mut container = Container::new(TypeName::from(data_type));
    container.path = path.to_string();
    container.version = version;
    container.title = Some(format!("{data_type} at {path}"));
    container.content = json!({"Title": path});
    container
}

fn lang(value: &str) -> ItemVersion {
    ItemVersion::new().with("lang", value)
}

#[test]
fn uninitialized_connection_is_rejected() {
    let conn = Connection::open_in_memory().unwrap();
    match SqliteContainerRepository::try_new(&conn) {
        Err(RepoError::UninitializedConnection { actual_version, .. }) => {
            assert_eq!(actual_version, 0)
        }
        other => panic!("unexpected result: {:?}", other.err()),
    }
}

#[test]
fn persist_assigns_row_ids_and_updates_in_place() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContainerRepository::try_new(&conn).unwrap();

    let mut batch = vec![
        container("Blog.Post", "/a", ItemVersion::new()),
        container("Blog.Post", "/b", ItemVersion::new()),
    ];
    let created = repo.persist(&mut batch, PersistOptions::default()).unwrap();
    assert_eq!(created, vec![true, true]);
    assert!(batch.iter().all(|c| c.row_id.is_some()));

    batch[0].content = json!({"Title": "changed"});
    let created = repo.persist(&mut batch[..1], PersistOptions::default()).unwrap();
    assert_eq!(created, vec![false]);
    assert_eq!(repo.count().unwrap(), 2);

    let fetched = repo
        .fetch_by_path(&TypeName::from("Blog.Post"), "/a", &ItemVersion::new())
        .unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].content, json!({"Title": "changed"}));
    assert_eq!(fetched[0].identity, batch[0].identity);
}

#[test]
fn fetches_filter_by_version_scope() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContainerRepository::try_new(&conn).unwrap();
    let mut batch = vec![
        container("Site.Page", "/home", lang("en")),
        container("Site.Page", "/home", lang("fr")),
        container("Site.Shared", "/footer", ItemVersion::new()),
    ];
    repo.persist(&mut batch, PersistOptions::default()).unwrap();

    let page = TypeName::from("Site.Page");
    let everything = repo.fetch_by_path(&page, "/home", &ItemVersion::new()).unwrap();
    assert_eq!(everything.len(), 2);

    let english = repo.fetch_by_path(&page, "/home", &lang("en")).unwrap();
    assert_eq!(english.len(), 1);
    assert_eq!(english[0].version, lang("en"));

    let addresses = vec![
        Address::from_segments(page.clone(), [("_0", "home")]),
        Address::from_segments(TypeName::from("Site.Shared"), [("_0", "footer")]),
    ];
    let mixed = repo.fetch_by_addresses(&addresses, &lang("fr")).unwrap();
    assert_eq!(mixed.len(), 2);

    let all_pages = repo.fetch_all(&[page], &ItemVersion::new()).unwrap();
    assert_eq!(all_pages.len(), 2);
}

#[test]
fn fetch_by_ids_accepts_identity_and_row_id() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContainerRepository::try_new(&conn).unwrap();
    let mut batch = vec![
        container("Blog.Post", "/a", lang("en")),
        container("Blog.Post", "/a", lang("fr")),
    ];
    batch[1].identity = batch[0].identity;
    repo.persist(&mut batch, PersistOptions::default()).unwrap();

    let by_identity = ItemId::new(TypeName::from("Blog.Post"), batch[0].identity).unwrap();
    let versions = repo.fetch_by_ids(&[by_identity], &ItemVersion::new()).unwrap();
    assert_eq!(versions.len(), 2);

    let row_id = batch[1].row_id.unwrap();
    let by_row = ItemId::new(TypeName::from("Blog.Post"), row_id).unwrap();
    let single = repo.fetch_by_ids(&[by_row], &ItemVersion::new()).unwrap();
    assert_eq!(single.len(), 1);
    assert_eq!(single[0].version, lang("fr"));
}

#[test]
fn persist_validates_unless_bypassed() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContainerRepository::try_new(&conn).unwrap();

    let mut invalid = vec![container("Blog.Post", "relative", ItemVersion::new())];
    assert!(matches!(
        repo.persist(&mut invalid, PersistOptions::default()),
        Err(RepoError::InvalidData(_))
    ));
    let created = repo
        .persist(&mut invalid, PersistOptions { bypass_checks: true })
        .unwrap();
    assert_eq!(created, vec![true]);
}

#[test]
fn delete_missing_container_reports_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContainerRepository::try_new(&conn).unwrap();
    let mut batch = vec![container("Blog.Post", "/a", ItemVersion::new())];
    repo.persist(&mut batch, PersistOptions::default()).unwrap();

    repo.delete(&batch[0], false).unwrap();
    assert_eq!(repo.count().unwrap(), 0);
    assert!(matches!(
        repo.delete(&batch[0], false),
        Err(RepoError::NotFound(_))
    ));
    repo.delete(&batch[0], true).unwrap();
}
