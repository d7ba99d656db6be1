//! Item and list domain records.
//!
//! # Responsibility
//! - Define the canonical item record shared by every list projection.
//! - Provide lifecycle helpers for soft-delete and completion semantics.
//!
//! # Invariants
//! - `uuid` is stable and never reused for another item.
//! - `completed_at` is set exactly when `is_completed` becomes true and
//!   cleared when it becomes false.
//! - `owner_uuid` is the ownership domain; linked items must share it.

use crate::model::link_set::LinkSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a list item.
pub type ItemId = Uuid;

/// Stable identifier for a list.
pub type ListId = Uuid;

/// Stable identifier for an owning account.
pub type OwnerId = Uuid;

/// List category used by presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    /// Free-form todo list.
    Todo,
    /// Shopping/grocery list.
    Grocery,
}

/// Minimal list read model.
///
/// List CRUD itself is plumbing outside this crate's core; this record
/// exists so linked-item queries can return denormalized list context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRecord {
    /// Stable list id.
    pub uuid: ListId,
    /// Owning account id.
    pub owner_uuid: OwnerId,
    /// User-facing title.
    pub title: String,
    /// List category.
    pub kind: ListKind,
    /// Soft-delete marker.
    pub is_deleted: bool,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl ListRecord {
    /// Creates a new list record with a generated stable id.
    pub fn new(owner_uuid: OwnerId, kind: ListKind, title: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            owner_uuid,
            title: title.into(),
            kind,
            is_deleted: false,
            created_at: 0,
            updated_at: 0,
        }
    }
}

/// Canonical domain record for one list item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Stable global id used for linking and auditing.
    pub uuid: ItemId,
    /// Owning list id.
    pub list_uuid: ListId,
    /// Ownership domain. Denormalized from the list so link validation
    /// needs no extra lookup.
    pub owner_uuid: OwnerId,
    /// Item text content.
    pub content: String,
    /// Completion flag.
    pub is_completed: bool,
    /// Epoch ms completion timestamp; present iff `is_completed`.
    pub completed_at: Option<i64>,
    /// Position within the owning list.
    pub position: i64,
    /// Per-item link attribute. Starts empty at creation and is mutated
    /// only by the link service and the status propagation engine.
    pub links: LinkSet,
    /// Soft-delete marker.
    pub is_deleted: bool,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Item {
    /// Creates a new item with a generated stable id and empty link set.
    pub fn new(list_uuid: ListId, owner_uuid: OwnerId, content: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), list_uuid, owner_uuid, content)
    }

    /// Creates a new item with a caller-provided stable id.
    ///
    /// Used by import/replay paths where identity already exists externally.
    pub fn with_id(
        uuid: ItemId,
        list_uuid: ListId,
        owner_uuid: OwnerId,
        content: impl Into<String>,
    ) -> Self {
        Self {
            uuid,
            list_uuid,
            owner_uuid,
            content: content.into(),
            is_completed: false,
            completed_at: None,
            position: 0,
            links: LinkSet::default(),
            is_deleted: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Returns whether this item should be considered visible/active.
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}
