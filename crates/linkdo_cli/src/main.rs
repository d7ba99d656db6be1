//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `linkdo_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

use linkdo_core::db::open_db_in_memory;
use linkdo_core::{
    Item, ItemRepository, LinkService, ListKind, ListRecord, SqliteItemRepository, StatusService,
};
use uuid::Uuid;

fn main() {
    println!("linkdo_core version={}", linkdo_core::core_version());

    // Tiny end-to-end probe: link two items and cascade an un-complete.
    let conn = match open_db_in_memory() {
        Ok(conn) => conn,
        Err(err) => {
            eprintln!("failed to open in-memory database: {err}");
            std::process::exit(1);
        }
    };
    if let Err(err) = run_probe(&conn) {
        eprintln!("probe failed: {err}");
        std::process::exit(1);
    }
}

fn run_probe(conn: &rusqlite::Connection) -> Result<(), Box<dyn std::error::Error>> {
    let owner = Uuid::new_v4();
    let repo = SqliteItemRepository::try_new(conn)?;
    let list = ListRecord::new(owner, ListKind::Grocery, "Dinner");
    repo.create_list(&list)?;

    let dinner = Item::new(list.uuid, owner, "Steak dinner");
    let steak = Item::new(list.uuid, owner, "Steak");
    repo.create_item(&dinner)?;
    repo.create_item(&steak)?;

    let links = LinkService::new(SqliteItemRepository::try_new(conn)?);
    let created = links.create_links(dinner.uuid, &[steak.uuid])?;
    println!("links created={}", created.created);

    let status = StatusService::new(SqliteItemRepository::try_new(conn)?);
    status.set_completed(steak.uuid, true)?;
    status.set_completed(dinner.uuid, true)?;
    let outcome = status.set_completed(dinner.uuid, false)?;
    println!("propagated={}", outcome.propagated.len());

    Ok(())
}
