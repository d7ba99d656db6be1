use linkdo_core::db::open_db_in_memory;
use linkdo_core::{
    Item, ItemPatch, ItemRepository, ListKind, ListRecord, RepoError, SqliteItemRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn make_list(conn: &Connection, owner: Uuid) -> ListRecord {
    let repo = SqliteItemRepository::try_new(conn).unwrap();
    let list = ListRecord::new(owner, ListKind::Todo, "Inbox");
    repo.create_list(&list).unwrap();
    list
}

fn make_item(conn: &Connection, list: &ListRecord, content: &str) -> Item {
    let repo = SqliteItemRepository::try_new(conn).unwrap();
    let item = Item::new(list.uuid, list.owner_uuid, content);
    repo.create_item(&item).unwrap();
    item
}

#[test]
fn create_and_get_round_trip() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let item = make_item(&conn, &list, "Write report");

    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let loaded = repo.get_item(item.uuid, false).unwrap().unwrap();
    assert_eq!(loaded.uuid, item.uuid);
    assert_eq!(loaded.list_uuid, list.uuid);
    assert_eq!(loaded.owner_uuid, list.owner_uuid);
    assert_eq!(loaded.content, "Write report");
    assert!(!loaded.is_completed);
    assert!(loaded.completed_at.is_none());
    assert!(loaded.links.is_empty());
    assert!(loaded.created_at > 0);
}

#[test]
fn get_item_respects_soft_delete_flag() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let item = make_item(&conn, &list, "Old task");

    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    repo.soft_delete_item(item.uuid).unwrap();

    assert!(repo.get_item(item.uuid, false).unwrap().is_none());
    let tombstone = repo.get_item(item.uuid, true).unwrap().unwrap();
    assert!(tombstone.is_deleted);
    assert!(!tombstone.is_active());
}

#[test]
fn soft_deleting_twice_errors() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let item = make_item(&conn, &list, "Once");

    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    repo.soft_delete_item(item.uuid).unwrap();
    let err = repo.soft_delete_item(item.uuid).unwrap_err();
    assert!(matches!(err, RepoError::ItemNotFound(id) if id == item.uuid));
}

#[test]
fn get_items_preserves_input_order_and_omits_missing() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let first = make_item(&conn, &list, "first");
    let second = make_item(&conn, &list, "second");

    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let items = repo
        .get_items(&[second.uuid, Uuid::new_v4(), first.uuid])
        .unwrap();
    let ids: Vec<Uuid> = items.iter().map(|item| item.uuid).collect();
    assert_eq!(ids, vec![second.uuid, first.uuid]);
}

#[test]
fn update_patch_only_touches_named_fields() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let item = make_item(&conn, &list, "Draft");

    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let patch = ItemPatch {
        content: Some("Final".to_string()),
        ..ItemPatch::default()
    };
    let updated = repo.update_item(item.uuid, &patch).unwrap();
    assert_eq!(updated.content, "Final");
    assert!(!updated.is_completed);
    assert_eq!(updated.position, 0);
    assert!(updated.links.is_empty());
}

#[test]
fn completion_patch_couples_timestamp() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let item = make_item(&conn, &list, "Do it");

    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let completed = repo
        .update_item(item.uuid, &ItemPatch::completion(true))
        .unwrap();
    assert!(completed.is_completed);
    assert!(completed.completed_at.is_some());

    let reset = repo
        .update_item(item.uuid, &ItemPatch::completion(false))
        .unwrap();
    assert!(!reset.is_completed);
    assert!(reset.completed_at.is_none());
}

#[test]
fn empty_patch_returns_current_row() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let item = make_item(&conn, &list, "Unchanged");

    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let before = repo.get_item(item.uuid, false).unwrap().unwrap();
    let after = repo.update_item(item.uuid, &ItemPatch::default()).unwrap();
    assert_eq!(before, after);
}

#[test]
fn updating_a_missing_item_errors() {
    let conn = setup();
    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let missing = Uuid::new_v4();
    let err = repo
        .update_item(missing, &ItemPatch::completion(true))
        .unwrap_err();
    assert!(matches!(err, RepoError::ItemNotFound(id) if id == missing));
}

#[test]
fn find_items_referencing_checks_decoded_membership() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let target = make_item(&conn, &list, "target");
    let referrer = make_item(&conn, &list, "referrer");
    let bystander = make_item(&conn, &list, "bystander");

    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let mut links = referrer.links.clone();
    links.children.insert(target.uuid);
    repo.update_item(referrer.uuid, &ItemPatch::link_set(links))
        .unwrap();

    let mut other_links = bystander.links.clone();
    other_links.children.insert(Uuid::new_v4());
    repo.update_item(bystander.uuid, &ItemPatch::link_set(other_links))
        .unwrap();

    let found = repo.find_items_referencing(target.uuid).unwrap();
    let ids: Vec<Uuid> = found.iter().map(|item| item.uuid).collect();
    assert_eq!(ids, vec![referrer.uuid]);
}

#[test]
fn find_items_referencing_skips_soft_deleted_referrers() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let target = make_item(&conn, &list, "target");
    let referrer = make_item(&conn, &list, "referrer");

    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let mut links = referrer.links.clone();
    links.bidirectional.insert(target.uuid);
    repo.update_item(referrer.uuid, &ItemPatch::link_set(links))
        .unwrap();
    repo.soft_delete_item(referrer.uuid).unwrap();

    assert!(repo.find_items_referencing(target.uuid).unwrap().is_empty());
}

#[test]
fn repo_rejects_an_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteItemRepository::try_new(&conn).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn invalid_persisted_links_surface_as_invalid_data() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let item = make_item(&conn, &list, "Corrupt");

    conn.execute(
        "UPDATE items SET links = '42' WHERE uuid = ?1;",
        [item.uuid.to_string()],
    )
    .unwrap();

    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let err = repo.get_item(item.uuid, false).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}
