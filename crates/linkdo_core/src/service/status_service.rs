//! Completion status updates with descendant propagation.
//!
//! # Responsibility
//! - Apply completion flag changes to one item.
//! - Cascade completed -> not-completed resets through the full descendant
//!   closure of `children` edges.
//!
//! # Invariants
//! - Propagation is one-directional and conditional: only a true -> false
//!   transition on the target triggers it, and parents are never touched.
//! - The target's own update is recorded before any descendant's update.
//! - Each item is processed at most once per traversal (visited set), so
//!   fan-in cannot double-apply.
//! - Every applied step is individually complete; a retried call converges.

use crate::model::item::{Item, ItemId};
use crate::repo::item_repo::{ItemPatch, ItemRepository, RepoError};
use log::info;
use std::collections::{BTreeSet, VecDeque};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from status update operations.
#[derive(Debug)]
pub enum StatusError {
    /// Target item does not exist.
    ItemNotFound(ItemId),
    /// A descendant write failed mid-traversal; reissue the same call to
    /// converge (already-applied steps are idempotent no-ops).
    Incomplete { item: ItemId, source: RepoError },
    /// Store failure outside the traversal writes.
    Store(RepoError),
}

impl StatusError {
    /// Whether reissuing the same call can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Incomplete { .. } | Self::Store(_))
    }
}

impl Display for StatusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ItemNotFound(id) => write!(f, "item not found: {id}"),
            Self::Incomplete { item, source } => write!(
                f,
                "propagation incomplete at item {item}, retry to converge: {source}"
            ),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StatusError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ItemNotFound(_) => None,
            Self::Incomplete { source, .. } => Some(source),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<RepoError> for StatusError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

/// One descendant flipped by a propagation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagatedUpdate {
    pub item: ItemId,
    pub was_completed: bool,
    pub is_completed: bool,
}

/// Result of a status update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusOutcome {
    /// The target item after its own update.
    pub item: Item,
    /// Descendants flipped by this call, in traversal order. Empty when the
    /// transition did not trigger propagation or nothing was left completed.
    pub propagated: Vec<PropagatedUpdate>,
}

/// Dry-run result for a proposed status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationPreview {
    /// Whether the proposed change is a propagation-triggering transition.
    pub would_propagate: bool,
    /// Completed descendants that the change would reset, traversal order.
    pub affected: Vec<ItemId>,
}

/// Status propagation engine.
pub struct StatusService<R: ItemRepository> {
    repo: R,
}

impl<R: ItemRepository> StatusService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Sets the completion flag on one item, cascading resets to completed
    /// descendants when the flag transitions from true to false.
    ///
    /// A call that does not change the flag writes nothing and propagates
    /// nothing, which is what makes concurrent triggers from multiple
    /// parents of a shared descendant safe.
    pub fn set_completed(
        &self,
        item_id: ItemId,
        completed: bool,
    ) -> Result<StatusOutcome, StatusError> {
        let current = self
            .repo
            .get_item(item_id, false)?
            .ok_or(StatusError::ItemNotFound(item_id))?;

        if current.is_completed == completed {
            return Ok(StatusOutcome {
                item: current,
                propagated: Vec::new(),
            });
        }

        // Target first: observers may rely on the parent's change being
        // visible no later than any child's.
        let updated = self
            .repo
            .update_item(item_id, &ItemPatch::completion(completed))?;

        if completed {
            return Ok(StatusOutcome {
                item: updated,
                propagated: Vec::new(),
            });
        }

        let mut propagated = Vec::new();
        self.walk_descendants(&updated, |node| {
            if node.is_completed {
                self.repo
                    .update_item(node.uuid, &ItemPatch::completion(false))
                    .map_err(|source| StatusError::Incomplete {
                        item: node.uuid,
                        source,
                    })?;
                propagated.push(PropagatedUpdate {
                    item: node.uuid,
                    was_completed: true,
                    is_completed: false,
                });
            }
            Ok(())
        })?;

        info!(
            "event=status_propagated module=links item={item_id} affected={}",
            propagated.len()
        );
        Ok(StatusOutcome {
            item: updated,
            propagated,
        })
    }

    /// Dry run: reports which descendants a proposed change would reset.
    pub fn preview(
        &self,
        item_id: ItemId,
        completed: bool,
    ) -> Result<PropagationPreview, StatusError> {
        let current = self
            .repo
            .get_item(item_id, false)?
            .ok_or(StatusError::ItemNotFound(item_id))?;

        let would_propagate = current.is_completed && !completed;
        if !would_propagate {
            return Ok(PropagationPreview {
                would_propagate,
                affected: Vec::new(),
            });
        }

        let mut affected = Vec::new();
        self.walk_descendants(&current, |node| {
            if node.is_completed {
                affected.push(node.uuid);
            }
            Ok(())
        })?;

        Ok(PropagationPreview {
            would_propagate,
            affected,
        })
    }

    /// Breadth-first traversal over `children` edges.
    ///
    /// Every reachable item is visited exactly once, including items that
    /// are already not completed: a false node may still have completed
    /// descendants reachable only through it, so branches are never pruned
    /// on the node's own flag. Dangling child ids are skipped.
    fn walk_descendants(
        &self,
        root: &Item,
        mut visit: impl FnMut(&Item) -> Result<(), StatusError>,
    ) -> Result<(), StatusError> {
        let mut visited: BTreeSet<ItemId> = BTreeSet::new();
        visited.insert(root.uuid);

        let mut queue: VecDeque<ItemId> = root.links.children.iter().copied().collect();
        while let Some(next) = queue.pop_front() {
            if !visited.insert(next) {
                continue;
            }
            let Some(node) = self.repo.get_item(next, false)? else {
                continue;
            };
            visit(&node)?;
            for child in &node.links.children {
                if !visited.contains(child) {
                    queue.push_back(*child);
                }
            }
        }
        Ok(())
    }
}
