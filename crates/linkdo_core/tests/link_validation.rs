use linkdo_core::db::open_db_in_memory;
use linkdo_core::{
    Item, ItemPatch, ItemRepository, LimitScope, LinkService, LinkSet, LinkValidator, LinkViolation,
    LinkWarning, ListKind, ListRecord, SqliteItemRepository, MAX_CHILDREN_PER_CREATE,
    MAX_LINKS_PER_ITEM,
};
use rusqlite::Connection;
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn make_list(conn: &Connection, owner: Uuid) -> ListRecord {
    let repo = SqliteItemRepository::try_new(conn).unwrap();
    let list = ListRecord::new(owner, ListKind::Grocery, "Weekly shop");
    repo.create_list(&list).unwrap();
    list
}

fn make_item(conn: &Connection, list: &ListRecord, content: &str) -> Uuid {
    let repo = SqliteItemRepository::try_new(conn).unwrap();
    let item = Item::new(list.uuid, list.owner_uuid, content);
    repo.create_item(&item).unwrap()
}

fn validator(conn: &Connection) -> LinkValidator<SqliteItemRepository<'_>> {
    LinkValidator::new(SqliteItemRepository::try_new(conn).unwrap())
}

fn link(conn: &Connection, parent: Uuid, child: Uuid) {
    let service = LinkService::new(SqliteItemRepository::try_new(conn).unwrap());
    service.create_links(parent, &[child]).unwrap();
}

#[test]
fn empty_child_list_is_a_valid_no_op() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let parent = make_item(&conn, &list, "Dinner");

    let report = validator(&conn).validate_create(parent, &[]).unwrap();
    assert!(report.is_valid());
    assert!(report.accepted.is_empty());
    assert!(report.warnings.contains(&LinkWarning::NoChildrenRequested));
}

#[test]
fn rejects_more_than_twenty_children_per_operation() {
    let conn = setup();
    let children: Vec<Uuid> = (0..MAX_CHILDREN_PER_CREATE + 1)
        .map(|_| Uuid::new_v4())
        .collect();

    let report = validator(&conn)
        .validate_create(Uuid::new_v4(), &children)
        .unwrap();
    assert!(!report.is_valid());
    assert!(matches!(
        report.errors[0],
        LinkViolation::MaxLimit {
            scope: LimitScope::PerOperation,
            limit: MAX_CHILDREN_PER_CREATE,
            attempted: 21,
        }
    ));
    assert_eq!(report.verdicts.len(), 21);
    assert!(report
        .verdicts
        .iter()
        .all(|verdict| verdict.rejected_with == Some("max_limit")));
}

#[test]
fn rejects_self_link() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let item = make_item(&conn, &list, "Steak");

    let report = validator(&conn).validate_create(item, &[item]).unwrap();
    assert!(!report.is_valid());
    assert!(report
        .errors
        .contains(&LinkViolation::SelfLink { item }));
    assert_eq!(report.verdicts[0].rejected_with, Some("self_link"));
    assert!(report.accepted.is_empty());
}

#[test]
fn missing_parent_rejects_every_child() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let child = make_item(&conn, &list, "Steak");
    let missing_parent = Uuid::new_v4();

    let report = validator(&conn)
        .validate_create(missing_parent, &[child])
        .unwrap();
    assert!(!report.is_valid());
    assert!(report.errors.contains(&LinkViolation::NotFound {
        item: missing_parent
    }));
    assert_eq!(report.verdicts[0].rejected_with, Some("not_found"));
}

#[test]
fn rejects_per_item_link_ceiling() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let parent = make_item(&conn, &list, "Everything list");
    let child = make_item(&conn, &list, "One more");

    // Saturate the parent's control-link ceiling with synthetic children.
    let mut links = LinkSet::default();
    for _ in 0..MAX_LINKS_PER_ITEM {
        links.children.insert(Uuid::new_v4());
    }
    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    repo.update_item(parent, &ItemPatch::link_set(links)).unwrap();

    let report = validator(&conn).validate_create(parent, &[child]).unwrap();
    assert!(!report.is_valid());
    assert!(report.errors.contains(&LinkViolation::MaxLimit {
        scope: LimitScope::PerItem,
        limit: MAX_LINKS_PER_ITEM,
        attempted: MAX_LINKS_PER_ITEM + 1,
    }));
}

#[test]
fn missing_children_are_dropped_with_warnings() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let parent = make_item(&conn, &list, "Dinner");
    let real = make_item(&conn, &list, "Steak");
    let ghost = Uuid::new_v4();

    let report = validator(&conn)
        .validate_create(parent, &[real, ghost])
        .unwrap();
    assert!(report.is_valid());
    assert_eq!(report.accepted, vec![real]);
    assert!(report.warnings.contains(&LinkWarning::MissingChild(ghost)));
    assert_eq!(report.verdicts[0].rejected_with, None);
    assert_eq!(report.verdicts[1].rejected_with, Some("not_found"));
}

#[test]
fn all_children_missing_is_invalid() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let parent = make_item(&conn, &list, "Dinner");
    let ghosts = [Uuid::new_v4(), Uuid::new_v4()];

    let report = validator(&conn).validate_create(parent, &ghosts).unwrap();
    assert!(!report.is_valid());
    assert_eq!(report.errors.len(), 2);
    assert!(report
        .errors
        .iter()
        .all(|error| error.code() == "not_found"));
    assert!(report.accepted.is_empty());
}

#[test]
fn rejects_direct_cycle_with_chain() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let dinner = make_item(&conn, &list, "Steak dinner");
    let steak = make_item(&conn, &list, "Steak");
    link(&conn, dinner, steak);

    // Steak is controlled by Dinner; making Dinner a child of Steak would
    // close the loop.
    let report = validator(&conn).validate_create(steak, &[dinner]).unwrap();
    assert!(!report.is_valid());
    assert!(report.errors.contains(&LinkViolation::Circular {
        parent: steak,
        child: dinner,
        chain: vec![dinner, steak],
    }));
    assert_eq!(report.verdicts[0].rejected_with, Some("circular"));
}

#[test]
fn rejects_transitive_cycle_with_full_chain() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let plan = make_item(&conn, &list, "Meal plan");
    let dinner = make_item(&conn, &list, "Dinner");
    let steak = make_item(&conn, &list, "Steak");
    link(&conn, plan, dinner);
    link(&conn, dinner, steak);

    let report = validator(&conn).validate_create(steak, &[plan]).unwrap();
    assert!(!report.is_valid());
    assert!(report.errors.contains(&LinkViolation::Circular {
        parent: steak,
        child: plan,
        chain: vec![plan, dinner, steak],
    }));
}

#[test]
fn grandparent_as_sibling_child_stays_acyclic() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let plan = make_item(&conn, &list, "Meal plan");
    let dinner = make_item(&conn, &list, "Dinner");
    let dessert = make_item(&conn, &list, "Dessert");
    link(&conn, plan, dinner);

    // plan -> dessert alongside plan -> dinner is a diamond, not a cycle.
    let report = validator(&conn).validate_create(plan, &[dessert]).unwrap();
    assert!(report.is_valid());
    assert_eq!(report.accepted, vec![dessert]);
}

#[test]
fn rejects_cross_owner_children() {
    let conn = setup();
    let mine = make_list(&conn, Uuid::new_v4());
    let theirs = make_list(&conn, Uuid::new_v4());
    let parent = make_item(&conn, &mine, "Dinner");
    let child = make_item(&conn, &theirs, "Their steak");

    let report = validator(&conn).validate_create(parent, &[child]).unwrap();
    assert!(!report.is_valid());
    assert!(report
        .errors
        .contains(&LinkViolation::CrossUser { parent, child }));
    assert_eq!(report.verdicts[0].rejected_with, Some("cross_user"));
}

#[test]
fn duplicate_request_ids_collapse_to_one_candidate() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let parent = make_item(&conn, &list, "Dinner");
    let child = make_item(&conn, &list, "Steak");

    let report = validator(&conn)
        .validate_create(parent, &[child, child, child])
        .unwrap();
    assert!(report.is_valid());
    assert_eq!(report.verdicts.len(), 1);
    assert_eq!(report.accepted, vec![child]);
}

#[test]
fn existing_edge_warns_but_stays_valid() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let parent = make_item(&conn, &list, "Dinner");
    let child = make_item(&conn, &list, "Steak");
    link(&conn, parent, child);

    let report = validator(&conn).validate_create(parent, &[child]).unwrap();
    assert!(report.is_valid());
    assert!(report
        .warnings
        .contains(&LinkWarning::EdgePresent { parent, child }));
    assert_eq!(report.accepted, vec![child]);
}

#[test]
fn validation_is_a_dry_run() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let parent = make_item(&conn, &list, "Dinner");
    let child = make_item(&conn, &list, "Steak");

    let report = validator(&conn).validate_create(parent, &[child]).unwrap();
    assert!(report.is_valid());

    let repo = SqliteItemRepository::try_new(&conn).unwrap();
    let parent_row = repo.get_item(parent, false).unwrap().unwrap();
    let child_row = repo.get_item(child, false).unwrap().unwrap();
    assert!(parent_row.links.is_empty());
    assert!(child_row.links.is_empty());
}

#[test]
fn validate_remove_warns_on_absent_edge() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let parent = make_item(&conn, &list, "Dinner");
    let child = make_item(&conn, &list, "Steak");

    let report = validator(&conn).validate_remove(parent, child).unwrap();
    assert!(report.is_valid());
    assert!(report
        .warnings
        .contains(&LinkWarning::EdgeAbsent { parent, child }));
}

#[test]
fn validate_remove_warns_on_missing_endpoints() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let parent = make_item(&conn, &list, "Dinner");
    let ghost = Uuid::new_v4();

    let report = validator(&conn).validate_remove(parent, ghost).unwrap();
    assert!(report.is_valid());
    assert!(report.warnings.contains(&LinkWarning::MissingItem(ghost)));
}

#[test]
fn bidirectional_validation_rejects_self_and_cross_owner() {
    let conn = setup();
    let mine = make_list(&conn, Uuid::new_v4());
    let theirs = make_list(&conn, Uuid::new_v4());
    let item = make_item(&conn, &mine, "Steak");
    let foreign = make_item(&conn, &theirs, "Their wine");

    let self_report = validator(&conn).validate_bidirectional(item, item).unwrap();
    assert!(!self_report.is_valid());
    assert!(self_report
        .errors
        .contains(&LinkViolation::SelfLink { item }));

    let cross_report = validator(&conn)
        .validate_bidirectional(item, foreign)
        .unwrap();
    assert!(!cross_report.is_valid());
    assert_eq!(cross_report.reason_codes(), "cross_user");
}

#[test]
fn bidirectional_validation_requires_both_endpoints() {
    let conn = setup();
    let list = make_list(&conn, Uuid::new_v4());
    let item = make_item(&conn, &list, "Steak");
    let ghost = Uuid::new_v4();

    let report = validator(&conn).validate_bidirectional(item, ghost).unwrap();
    assert!(!report.is_valid());
    assert!(report
        .errors
        .contains(&LinkViolation::NotFound { item: ghost }));
}
