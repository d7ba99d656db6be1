//! Item store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide the storage-agnostic item store consumed by link validation,
//!   link mutation, and status propagation.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - `update_item` is atomic for a single item (one SQL statement).
//! - `completed_at` is coupled to the completion flag here: set when the
//!   flag is written true, cleared when it is written false.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::item::{Item, ItemId, ListId, ListKind, ListRecord};
use crate::model::link_set::{encode_links, LinkDecodeError, LinkSet, StoredLinks};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const ITEM_SELECT_SQL: &str = "SELECT
    uuid,
    list_uuid,
    owner_uuid,
    content,
    is_completed,
    completed_at,
    position,
    links,
    is_deleted,
    created_at,
    updated_at
FROM items";

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for item persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    ItemNotFound(ItemId),
    ListNotFound(ListId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::ItemNotFound(id) => write!(f, "item not found: {id}"),
            Self::ListNotFound(id) => write!(f, "list not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted item data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::ItemNotFound(_) => None,
            Self::ListNotFound(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<LinkDecodeError> for RepoError {
    fn from(value: LinkDecodeError) -> Self {
        Self::InvalidData(value.to_string())
    }
}

/// Partial field update for one item.
///
/// `None` fields are left untouched. The completion timestamp is never set
/// directly; it follows the `completed` flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPatch {
    pub content: Option<String>,
    pub completed: Option<bool>,
    pub position: Option<i64>,
    pub links: Option<LinkSet>,
}

impl ItemPatch {
    /// Patch that only flips the completion flag.
    pub fn completion(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    /// Patch that only replaces the link attribute.
    pub fn link_set(links: LinkSet) -> Self {
        Self {
            links: Some(links),
            ..Self::default()
        }
    }

    fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.completed.is_none()
            && self.position.is_none()
            && self.links.is_none()
    }
}

/// Item store contract consumed by link/status services.
///
/// The backing store only needs id-indexed access plus a reverse lookup
/// over link-set contents; all graph traversal happens by id in the
/// services, never through live references.
pub trait ItemRepository {
    /// Creates one list (plumbing for denormalized query context).
    fn create_list(&self, list: &ListRecord) -> RepoResult<ListId>;
    /// Loads one list by id.
    fn get_list(&self, id: ListId) -> RepoResult<Option<ListRecord>>;
    /// Creates one item and returns its stable id.
    fn create_item(&self, item: &Item) -> RepoResult<ItemId>;
    /// Loads one item by id.
    fn get_item(&self, id: ItemId, include_deleted: bool) -> RepoResult<Option<Item>>;
    /// Loads many items by id; missing ids are silently omitted and input
    /// order is preserved for the ids that exist.
    fn get_items(&self, ids: &[ItemId]) -> RepoResult<Vec<Item>>;
    /// Applies a partial update atomically and returns the updated item.
    fn update_item(&self, id: ItemId, patch: &ItemPatch) -> RepoResult<Item>;
    /// Finds active items whose link attribute references `id`.
    fn find_items_referencing(&self, id: ItemId) -> RepoResult<Vec<Item>>;
    /// Soft-deletes an item. Link cleanup is the caller's pre-delete step.
    fn soft_delete_item(&self, id: ItemId) -> RepoResult<()>;
}

/// SQLite-backed item repository.
#[derive(Debug)]
pub struct SqliteItemRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteItemRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_item_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ItemRepository for SqliteItemRepository<'_> {
    fn create_list(&self, list: &ListRecord) -> RepoResult<ListId> {
        self.conn.execute(
            "INSERT INTO lists (uuid, owner_uuid, title, kind, is_deleted)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                list.uuid.to_string(),
                list.owner_uuid.to_string(),
                list.title.as_str(),
                list_kind_to_db(list.kind),
                bool_to_int(list.is_deleted),
            ],
        )?;
        Ok(list.uuid)
    }

    fn get_list(&self, id: ListId) -> RepoResult<Option<ListRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, owner_uuid, title, kind, is_deleted, created_at, updated_at
             FROM lists
             WHERE uuid = ?1
               AND is_deleted = 0;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_list_row(row)?));
        }
        Ok(None)
    }

    fn create_item(&self, item: &Item) -> RepoResult<ItemId> {
        let links = if item.links.is_empty() {
            None
        } else {
            Some(encode_links(&item.links)?)
        };
        self.conn.execute(
            "INSERT INTO items (
                uuid,
                list_uuid,
                owner_uuid,
                content,
                is_completed,
                completed_at,
                position,
                links,
                is_deleted
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                item.uuid.to_string(),
                item.list_uuid.to_string(),
                item.owner_uuid.to_string(),
                item.content.as_str(),
                bool_to_int(item.is_completed),
                item.completed_at,
                item.position,
                links.as_deref(),
                bool_to_int(item.is_deleted),
            ],
        )?;
        Ok(item.uuid)
    }

    fn get_item(&self, id: ItemId, include_deleted: bool) -> RepoResult<Option<Item>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL}
             WHERE uuid = ?1
               AND (?2 = 1 OR is_deleted = 0);"
        ))?;
        let mut rows = stmt.query(params![id.to_string(), bool_to_int(include_deleted)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_item_row(row)?));
        }
        Ok(None)
    }

    fn get_items(&self, ids: &[ItemId]) -> RepoResult<Vec<Item>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL}
             WHERE uuid IN ({placeholders})
               AND is_deleted = 0;"
        ))?;
        let bind_values: Vec<Value> = ids.iter().map(|id| Value::Text(id.to_string())).collect();
        let mut rows = stmt.query(params_from_iter(bind_values))?;

        let mut by_id = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let item = parse_item_row(row)?;
            by_id.insert(item.uuid, item);
        }

        // Preserve caller order; duplicates in the input collapse to one row.
        let mut items = Vec::with_capacity(by_id.len());
        for id in ids {
            if let Some(item) = by_id.remove(id) {
                items.push(item);
            }
        }
        Ok(items)
    }

    fn update_item(&self, id: ItemId, patch: &ItemPatch) -> RepoResult<Item> {
        if patch.is_empty() {
            return load_required_item(self.conn, id);
        }

        let mut assignments = Vec::new();
        let mut bind_values: Vec<Value> = vec![Value::Text(id.to_string())];

        if let Some(content) = &patch.content {
            bind_values.push(Value::Text(content.clone()));
            assignments.push(format!("content = ?{}", bind_values.len()));
        }
        if let Some(completed) = patch.completed {
            if completed {
                assignments.push(
                    "is_completed = 1, completed_at = (strftime('%s', 'now') * 1000)".to_string(),
                );
            } else {
                assignments.push("is_completed = 0, completed_at = NULL".to_string());
            }
        }
        if let Some(position) = patch.position {
            bind_values.push(Value::Integer(position));
            assignments.push(format!("position = ?{}", bind_values.len()));
        }
        if let Some(links) = &patch.links {
            bind_values.push(Value::Text(encode_links(links)?));
            assignments.push(format!("links = ?{}", bind_values.len()));
        }
        assignments.push("updated_at = (strftime('%s', 'now') * 1000)".to_string());

        let sql = format!(
            "UPDATE items
             SET {}
             WHERE uuid = ?1
               AND is_deleted = 0;",
            assignments.join(", ")
        );
        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        if changed == 0 {
            return Err(RepoError::ItemNotFound(id));
        }

        load_required_item(self.conn, id)
    }

    fn find_items_referencing(&self, id: ItemId) -> RepoResult<Vec<Item>> {
        // LIKE is a coarse prefilter over the JSON text; the decoded link
        // set is the source of truth for membership.
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL}
             WHERE links LIKE '%' || ?1 || '%'
               AND is_deleted = 0
             ORDER BY uuid ASC;"
        ))?;
        let mut rows = stmt.query([id.to_string()])?;

        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let item = parse_item_row(row)?;
            if item.links.references(id) {
                items.push(item);
            }
        }
        Ok(items)
    }

    fn soft_delete_item(&self, id: ItemId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE items
             SET is_deleted = 1,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
               AND is_deleted = 0;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::ItemNotFound(id));
        }
        Ok(())
    }
}

fn load_required_item(conn: &Connection, id: ItemId) -> RepoResult<Item> {
    let mut stmt = conn.prepare(&format!(
        "{ITEM_SELECT_SQL}
         WHERE uuid = ?1
           AND is_deleted = 0;"
    ))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return parse_item_row(row);
    }
    Err(RepoError::ItemNotFound(id))
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<Item> {
    let uuid = parse_uuid(&row.get::<_, String>("uuid")?, "items.uuid")?;
    let list_uuid = parse_uuid(&row.get::<_, String>("list_uuid")?, "items.list_uuid")?;
    let owner_uuid = parse_uuid(&row.get::<_, String>("owner_uuid")?, "items.owner_uuid")?;

    let links = match row.get::<_, Option<String>>("links")? {
        Some(raw) => StoredLinks::decode(&raw)?.into_link_set(),
        None => LinkSet::default(),
    };

    Ok(Item {
        uuid,
        list_uuid,
        owner_uuid,
        content: row.get("content")?,
        is_completed: parse_flag(row.get("is_completed")?, "items.is_completed")?,
        completed_at: row.get("completed_at")?,
        position: row.get("position")?,
        links,
        is_deleted: parse_flag(row.get("is_deleted")?, "items.is_deleted")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_list_row(row: &Row<'_>) -> RepoResult<ListRecord> {
    let uuid = parse_uuid(&row.get::<_, String>("uuid")?, "lists.uuid")?;
    let owner_uuid = parse_uuid(&row.get::<_, String>("owner_uuid")?, "lists.owner_uuid")?;

    let kind_text: String = row.get("kind")?;
    let kind = parse_list_kind(&kind_text)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid list kind `{kind_text}` in lists.kind")))?;

    Ok(ListRecord {
        uuid,
        owner_uuid,
        title: row.get("title")?,
        kind,
        is_deleted: parse_flag(row.get("is_deleted")?, "lists.is_deleted")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn list_kind_to_db(kind: ListKind) -> &'static str {
    match kind {
        ListKind::Todo => "todo",
        ListKind::Grocery => "grocery",
    }
}

fn parse_list_kind(value: &str) -> Option<ListKind> {
    match value {
        "todo" => Some(ListKind::Todo),
        "grocery" => Some(ListKind::Grocery),
        _ => None,
    }
}

fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn parse_flag(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_item_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::InvalidData(format!(
            "item repository requires schema version {expected_version}, got {actual_version}"
        )));
    }

    for table in ["lists", "items"] {
        if !table_exists(conn, table)? {
            return Err(RepoError::InvalidData(format!(
                "item repository requires table `{table}`"
            )));
        }
    }

    for column in [
        "uuid",
        "list_uuid",
        "owner_uuid",
        "content",
        "is_completed",
        "completed_at",
        "position",
        "links",
        "is_deleted",
    ] {
        if !table_has_column(conn, "items", column)? {
            return Err(RepoError::InvalidData(format!(
                "item repository requires column `{column}` in table `items`"
            )));
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1
             FROM sqlite_master
             WHERE type = 'table' AND name = ?1;",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(exists.is_some())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
