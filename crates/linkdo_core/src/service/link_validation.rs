//! Link graph validation rules.
//!
//! # Responsibility
//! - Decide whether a proposed link mutation is legal before it is applied.
//! - Keep the `children`-edge graph a DAG across all items.
//!
//! # Invariants
//! - Validation never mutates; it is the dry-run surface for callers.
//! - Rule failures are structured data in the report, never `Err`; `Err` is
//!   reserved for store faults.
//! - Only "parent not found" short-circuits; all other rules collect.

use crate::model::item::{Item, ItemId};
use crate::repo::item_repo::{ItemRepository, RepoResult};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::{Display, Formatter};

/// Maximum number of new children accepted in one create operation.
pub const MAX_CHILDREN_PER_CREATE: usize = 20;

/// Maximum links an item may carry per edge kind (parents + children for
/// control edges, or bidirectional for informational edges).
pub const MAX_LINKS_PER_ITEM: usize = 50;

/// Which ceiling a `max_limit` violation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitScope {
    /// Too many children requested in a single operation.
    PerOperation,
    /// The item's total link count would exceed its ceiling.
    PerItem,
}

/// One validation rule failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkViolation {
    /// Parent id equals child id.
    SelfLink { item: ItemId },
    /// Proposed edge would close a cycle; `chain` is the existing path from
    /// the candidate child down to the proposed parent.
    Circular {
        parent: ItemId,
        child: ItemId,
        chain: Vec<ItemId>,
    },
    /// Referenced item does not exist.
    NotFound { item: ItemId },
    /// Parent and child belong to different ownership domains.
    CrossUser { parent: ItemId, child: ItemId },
    /// Per-operation or per-item ceiling exceeded.
    MaxLimit {
        scope: LimitScope,
        limit: usize,
        attempted: usize,
    },
}

impl LinkViolation {
    /// Stable reason code surfaced to callers for user-facing messaging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SelfLink { .. } => "self_link",
            Self::Circular { .. } => "circular",
            Self::NotFound { .. } => "not_found",
            Self::CrossUser { .. } => "cross_user",
            Self::MaxLimit { .. } => "max_limit",
        }
    }
}

impl Display for LinkViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfLink { item } => write!(f, "item cannot be linked to itself: {item}"),
            Self::Circular {
                parent,
                child,
                chain,
            } => {
                let path = chain
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(" -> ");
                write!(
                    f,
                    "linking {parent} -> {child} would create a cycle via {path}"
                )
            }
            Self::NotFound { item } => write!(f, "linked item not found: {item}"),
            Self::CrossUser { parent, child } => {
                write!(f, "items {parent} and {child} belong to different owners")
            }
            Self::MaxLimit {
                scope,
                limit,
                attempted,
            } => {
                let what = match scope {
                    LimitScope::PerOperation => "children in one operation",
                    LimitScope::PerItem => "links on one item",
                };
                write!(f, "too many {what}: {attempted} exceeds limit {limit}")
            }
        }
    }
}

/// Non-fatal validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkWarning {
    /// Create was called with an empty child list; the operation is a no-op.
    NoChildrenRequested,
    /// A requested child does not exist and was dropped from the operation.
    MissingChild(ItemId),
    /// A remove endpoint does not exist; the surviving side is still cleaned.
    MissingItem(ItemId),
    /// The edge to remove is not present; removal is an idempotent no-op.
    EdgeAbsent { parent: ItemId, child: ItemId },
    /// The requested edge already exists; creating it again changes nothing.
    EdgePresent { parent: ItemId, child: ItemId },
}

impl Display for LinkWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoChildrenRequested => write!(f, "no children requested; nothing to link"),
            Self::MissingChild(id) => write!(f, "child not found, dropped from operation: {id}"),
            Self::MissingItem(id) => write!(f, "item not found during removal: {id}"),
            Self::EdgeAbsent { parent, child } => {
                write!(f, "edge {parent} -> {child} does not exist")
            }
            Self::EdgePresent { parent, child } => {
                write!(f, "edge {parent} -> {child} already exists")
            }
        }
    }
}

/// Per-child accept/reject outcome for dry-run callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildVerdict {
    pub child: ItemId,
    /// `None` when accepted, otherwise the rejecting reason code.
    pub rejected_with: Option<&'static str>,
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<LinkViolation>,
    pub warnings: Vec<LinkWarning>,
    /// One verdict per distinct requested child, in request order.
    pub verdicts: Vec<ChildVerdict>,
    /// Children that survived every rule, in request order.
    pub accepted: Vec<ItemId>,
}

impl ValidationReport {
    /// The operation may be applied as long as no rule failed.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Comma-joined reason codes, for log events.
    pub fn reason_codes(&self) -> String {
        let mut codes: Vec<&'static str> = self.errors.iter().map(LinkViolation::code).collect();
        codes.dedup();
        codes.join(",")
    }
}

/// Validates link mutations against the current state of the item store.
pub struct LinkValidator<R: ItemRepository> {
    repo: R,
}

impl<R: ItemRepository> LinkValidator<R> {
    /// Creates a validator using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Read access for services composing on top of this validator.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Validates creating `parent -> child` edges for every requested child.
    ///
    /// Rules run in a fixed order; only a missing parent stops the pass
    /// early so the report carries every applicable finding at once.
    pub fn validate_create(
        &self,
        parent_id: ItemId,
        child_ids: &[ItemId],
    ) -> RepoResult<ValidationReport> {
        let mut report = ValidationReport::default();

        if child_ids.is_empty() {
            report.warnings.push(LinkWarning::NoChildrenRequested);
            return Ok(report);
        }

        // Duplicates in the request collapse to one candidate.
        let mut candidates: Vec<ItemId> = Vec::new();
        for id in child_ids {
            if !candidates.contains(id) {
                candidates.push(*id);
            }
        }

        if candidates.len() > MAX_CHILDREN_PER_CREATE {
            report.errors.push(LinkViolation::MaxLimit {
                scope: LimitScope::PerOperation,
                limit: MAX_CHILDREN_PER_CREATE,
                attempted: candidates.len(),
            });
            reject_all(&mut report, &candidates, "max_limit");
            return Ok(report);
        }

        let mut rejected: BTreeMap<ItemId, &'static str> = BTreeMap::new();

        for id in &candidates {
            if *id == parent_id {
                report.errors.push(LinkViolation::SelfLink { item: *id });
                rejected.insert(*id, "self_link");
            }
        }

        let Some(parent) = self.repo.get_item(parent_id, false)? else {
            report
                .errors
                .push(LinkViolation::NotFound { item: parent_id });
            reject_all(&mut report, &candidates, "not_found");
            return Ok(report);
        };

        let new_distinct: Vec<ItemId> = candidates
            .iter()
            .filter(|id| !rejected.contains_key(id) && !parent.links.children.contains(id))
            .copied()
            .collect();
        let prospective_total = parent.links.hierarchical_count() + new_distinct.len();
        if prospective_total > MAX_LINKS_PER_ITEM {
            report.errors.push(LinkViolation::MaxLimit {
                scope: LimitScope::PerItem,
                limit: MAX_LINKS_PER_ITEM,
                attempted: prospective_total,
            });
        }

        let lookup_ids: Vec<ItemId> = candidates
            .iter()
            .filter(|id| !rejected.contains_key(id))
            .copied()
            .collect();
        let found = self.repo.get_items(&lookup_ids)?;
        let found_ids: BTreeSet<ItemId> = found.iter().map(|item| item.uuid).collect();
        let missing: Vec<ItemId> = lookup_ids
            .iter()
            .filter(|id| !found_ids.contains(id))
            .copied()
            .collect();

        if !missing.is_empty() && found.is_empty() {
            // Every requested child is gone; a create that can do nothing is
            // a caller bug rather than a partial drop.
            for id in &missing {
                report.errors.push(LinkViolation::NotFound { item: *id });
                rejected.insert(*id, "not_found");
            }
        } else {
            for id in &missing {
                report.warnings.push(LinkWarning::MissingChild(*id));
                rejected.insert(*id, "not_found");
            }
        }

        let ancestors = self.ancestor_closure(&parent)?;
        for child in &found {
            if let Some(chain) = ancestors.chain_to(child.uuid) {
                report.errors.push(LinkViolation::Circular {
                    parent: parent_id,
                    child: child.uuid,
                    chain,
                });
                rejected.insert(child.uuid, "circular");
            }
        }

        for child in &found {
            if child.owner_uuid != parent.owner_uuid {
                report.errors.push(LinkViolation::CrossUser {
                    parent: parent_id,
                    child: child.uuid,
                });
                rejected.insert(child.uuid, "cross_user");
            }
        }

        for id in &candidates {
            if parent.links.children.contains(id) && !rejected.contains_key(id) {
                report.warnings.push(LinkWarning::EdgePresent {
                    parent: parent_id,
                    child: *id,
                });
            }
        }

        for id in &candidates {
            report.verdicts.push(ChildVerdict {
                child: *id,
                rejected_with: rejected.get(id).copied(),
            });
            if !rejected.contains_key(id) {
                report.accepted.push(*id);
            }
        }

        Ok(report)
    }

    /// Validates removing one `parent -> child` edge.
    ///
    /// Removal is idempotent by contract: missing items or a missing edge
    /// produce warnings, never errors.
    pub fn validate_remove(
        &self,
        parent_id: ItemId,
        child_id: ItemId,
    ) -> RepoResult<ValidationReport> {
        let mut report = ValidationReport::default();

        let parent = self.repo.get_item(parent_id, false)?;
        let child = self.repo.get_item(child_id, false)?;

        if parent.is_none() {
            report.warnings.push(LinkWarning::MissingItem(parent_id));
        }
        if child.is_none() {
            report.warnings.push(LinkWarning::MissingItem(child_id));
        }

        if let (Some(parent), Some(child)) = (&parent, &child) {
            let edge_exists = parent.links.children.contains(&child_id)
                || child.links.parents.contains(&parent_id);
            if !edge_exists {
                report.warnings.push(LinkWarning::EdgeAbsent {
                    parent: parent_id,
                    child: child_id,
                });
            }
        }

        Ok(report)
    }

    /// Validates creating an informational link between `a` and `b`.
    pub fn validate_bidirectional(&self, a: ItemId, b: ItemId) -> RepoResult<ValidationReport> {
        let mut report = ValidationReport::default();

        if a == b {
            report.errors.push(LinkViolation::SelfLink { item: a });
            return Ok(report);
        }

        let first = self.repo.get_item(a, false)?;
        let second = self.repo.get_item(b, false)?;
        for (id, loaded) in [(a, &first), (b, &second)] {
            if loaded.is_none() {
                report.errors.push(LinkViolation::NotFound { item: id });
            }
        }
        let (Some(first), Some(second)) = (first, second) else {
            return Ok(report);
        };

        if first.owner_uuid != second.owner_uuid {
            report.errors.push(LinkViolation::CrossUser {
                parent: a,
                child: b,
            });
        }

        for item in [&first, &second] {
            if !item.links.bidirectional.contains(&other_of(item.uuid, a, b))
                && item.links.bidirectional.len() + 1 > MAX_LINKS_PER_ITEM
            {
                report.errors.push(LinkViolation::MaxLimit {
                    scope: LimitScope::PerItem,
                    limit: MAX_LINKS_PER_ITEM,
                    attempted: item.links.bidirectional.len() + 1,
                });
            }
        }

        Ok(report)
    }

    /// Walks `parents` edges upward from `parent`, recording how each
    /// ancestor was reached so a concrete cycle chain can be reported.
    ///
    /// Adding `parent -> child` closes a cycle exactly when the candidate
    /// child already appears in this closure (a path `child -> ... ->
    /// parent` exists through `children` edges). The visited set also guards
    /// the walk itself against an already-corrupt cyclic graph.
    fn ancestor_closure(&self, parent: &Item) -> RepoResult<AncestorClosure> {
        let mut came_from: BTreeMap<ItemId, ItemId> = BTreeMap::new();
        let mut visited: BTreeSet<ItemId> = BTreeSet::new();
        visited.insert(parent.uuid);

        let mut queue: VecDeque<ItemId> = VecDeque::new();
        for ancestor in &parent.links.parents {
            came_from.insert(*ancestor, parent.uuid);
            queue.push_back(*ancestor);
        }

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            // Dangling parent ids are skipped; they cannot extend a path.
            let Some(node) = self.repo.get_item(current, false)? else {
                continue;
            };
            for ancestor in &node.links.parents {
                if !visited.contains(ancestor) {
                    came_from.entry(*ancestor).or_insert(current);
                    queue.push_back(*ancestor);
                }
            }
        }

        Ok(AncestorClosure {
            root: parent.uuid,
            came_from,
        })
    }
}

/// Ancestor set of one item with predecessor links for chain reconstruction.
struct AncestorClosure {
    root: ItemId,
    /// ancestor id -> the node it was reached from (one step closer to root).
    came_from: BTreeMap<ItemId, ItemId>,
}

impl AncestorClosure {
    /// Existing path from `id` down to the closure root, when `id` is an
    /// ancestor of the root. The chain is the cycle evidence for the error.
    fn chain_to(&self, id: ItemId) -> Option<Vec<ItemId>> {
        if !self.came_from.contains_key(&id) {
            return None;
        }
        let mut chain = vec![id];
        let mut cursor = id;
        while let Some(next) = self.came_from.get(&cursor) {
            chain.push(*next);
            if *next == self.root {
                break;
            }
            cursor = *next;
        }
        Some(chain)
    }
}

fn reject_all(report: &mut ValidationReport, candidates: &[ItemId], code: &'static str) {
    for id in candidates {
        report.verdicts.push(ChildVerdict {
            child: *id,
            rejected_with: Some(code),
        });
    }
}

fn other_of(current: ItemId, a: ItemId, b: ItemId) -> ItemId {
    if current == a {
        b
    } else {
        a
    }
}
