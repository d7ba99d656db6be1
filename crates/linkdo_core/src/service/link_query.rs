//! Read-only link aggregation for presentation layers.
//!
//! # Responsibility
//! - Resolve an item's link sets into denormalized records a UI can render
//!   without further lookups.
//!
//! # Invariants
//! - These calls never mutate.
//! - Dangling link targets are omitted; counts reflect the returned
//!   records, so the arrays and counts always agree.

use crate::model::item::{ItemId, ListId, ListKind, ListRecord};
use crate::repo::item_repo::{ItemRepository, RepoError};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from link query operations.
#[derive(Debug)]
pub enum QueryError {
    /// Target item does not exist.
    ItemNotFound(ItemId),
    /// A linked item's owning list is missing; the store is inconsistent.
    ListNotFound(ListId),
    /// Store failure.
    Store(RepoError),
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ItemNotFound(id) => write!(f, "item not found: {id}"),
            Self::ListNotFound(id) => write!(f, "list not found for linked item: {id}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for QueryError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

/// Denormalized linked-item record for direct presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedItemRecord {
    pub item: ItemId,
    pub content: String,
    pub is_completed: bool,
    pub list_uuid: ListId,
    pub list_title: String,
    pub list_kind: ListKind,
}

/// Combined link summary for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSummary {
    pub children_count: usize,
    pub parents_count: usize,
    pub bidirectional_count: usize,
    pub total_links: usize,
    pub children: Vec<LinkedItemRecord>,
    pub parents: Vec<LinkedItemRecord>,
    pub bidirectional: Vec<LinkedItemRecord>,
}

/// Read-only link query service facade.
pub struct LinkQueryService<R: ItemRepository> {
    repo: R,
}

impl<R: ItemRepository> LinkQueryService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Lists the items controlled by `item_id`.
    pub fn get_children(&self, item_id: ItemId) -> Result<Vec<LinkedItemRecord>, QueryError> {
        let item = self.require_item(item_id)?;
        let mut lists = BTreeMap::new();
        self.resolve_records(&item.links.children, &mut lists)
    }

    /// Lists the items controlling `item_id`.
    pub fn get_parents(&self, item_id: ItemId) -> Result<Vec<LinkedItemRecord>, QueryError> {
        let item = self.require_item(item_id)?;
        let mut lists = BTreeMap::new();
        self.resolve_records(&item.links.parents, &mut lists)
    }

    /// Full link summary with counts and all three record lists.
    pub fn get_summary(&self, item_id: ItemId) -> Result<LinkSummary, QueryError> {
        let item = self.require_item(item_id)?;
        let mut lists = BTreeMap::new();

        let children = self.resolve_records(&item.links.children, &mut lists)?;
        let parents = self.resolve_records(&item.links.parents, &mut lists)?;
        let bidirectional = self.resolve_records(&item.links.bidirectional, &mut lists)?;

        Ok(LinkSummary {
            children_count: children.len(),
            parents_count: parents.len(),
            bidirectional_count: bidirectional.len(),
            total_links: children.len() + parents.len() + bidirectional.len(),
            children,
            parents,
            bidirectional,
        })
    }

    fn require_item(&self, item_id: ItemId) -> Result<crate::model::item::Item, QueryError> {
        self.repo
            .get_item(item_id, false)?
            .ok_or(QueryError::ItemNotFound(item_id))
    }

    /// Resolves a set of linked ids into presentation records, caching list
    /// lookups across the three collections of one summary call.
    fn resolve_records(
        &self,
        ids: &BTreeSet<ItemId>,
        lists: &mut BTreeMap<ListId, ListRecord>,
    ) -> Result<Vec<LinkedItemRecord>, QueryError> {
        let id_vec: Vec<ItemId> = ids.iter().copied().collect();
        let items = self.repo.get_items(&id_vec)?;

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            if !lists.contains_key(&item.list_uuid) {
                let list = self
                    .repo
                    .get_list(item.list_uuid)?
                    .ok_or(QueryError::ListNotFound(item.list_uuid))?;
                lists.insert(item.list_uuid, list);
            }
            let list = &lists[&item.list_uuid];
            records.push(LinkedItemRecord {
                item: item.uuid,
                content: item.content,
                is_completed: item.is_completed,
                list_uuid: list.uuid,
                list_title: list.title.clone(),
                list_kind: list.kind,
            });
        }
        Ok(records)
    }
}
